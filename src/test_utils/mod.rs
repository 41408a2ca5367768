//! In-memory [`Engine`] for exercising the queues without a real database.
//!
//! Every submitted statement is recorded. Failures can be scripted per statement
//! (by SQL pattern or by 1-based position in the history) or per batch (transport
//! failure). The engine also tracks how many batches were in flight at once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::engine::{Engine, NativeOutcome, NativeStatement};
use crate::error::SqlSequencerError;

#[derive(Default)]
struct MockState {
    history: Vec<NativeStatement>,
    batches: Vec<Vec<String>>,
    read_only_flags: Vec<bool>,
    pattern_outcomes: Vec<(Regex, NativeOutcome)>,
    nth_failures: HashMap<usize, String>,
    transport_failures: VecDeque<String>,
    truncate_next: bool,
    delay: Option<Duration>,
    closed: Vec<String>,
}

/// Scriptable engine that records everything it is asked to run.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEngine {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn compile(pattern: &str) -> Regex {
        Regex::new(&format!("(?i){pattern}")).expect("mock engine pattern")
    }

    /// Report a statement error for every statement matching `pattern` (case-insensitive).
    pub fn fail_when_sql_matches(&self, pattern: &str) {
        let message = format!("Mock failure on {pattern}");
        self.respond_when_sql_matches(pattern, NativeOutcome::failure(message));
    }

    /// Answer statements matching `pattern` with `outcome`. Earlier scripts win.
    pub fn respond_when_sql_matches(&self, pattern: &str, outcome: NativeOutcome) {
        self.lock()
            .pattern_outcomes
            .push((Self::compile(pattern), outcome));
    }

    /// Report a statement error for the `n`-th (1-based) statement ever submitted.
    ///
    /// # Panics
    /// Panics if `n` is zero.
    pub fn fail_on_nth_statement(&self, n: usize) {
        assert!(n >= 1, "statement positions are 1-based");
        self.lock()
            .nth_failures
            .insert(n, format!("Mock failure on statement {n}"));
    }

    /// Fail the next submitted batch as a whole.
    pub fn fail_next_batch(&self, message: impl Into<String>) {
        self.lock().transport_failures.push_back(message.into());
    }

    /// Drop the last outcome of the next batch.
    pub fn truncate_next_batch(&self) {
        self.lock().truncate_next = true;
    }

    /// Sleep this long inside every batch call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// SQL of every submitted statement, in the order the engine received them.
    #[must_use]
    pub fn sql_history(&self) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    #[must_use]
    pub fn statement_history(&self) -> Vec<NativeStatement> {
        self.lock().history.clone()
    }

    /// SQL grouped by engine call.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.lock().batches.clone()
    }

    #[must_use]
    pub fn read_only_flags(&self) -> Vec<bool> {
        self.lock().read_only_flags.clone()
    }

    /// Number of recorded statements matching `pattern` (case-insensitive).
    #[must_use]
    pub fn count_matching(&self, pattern: &str) -> usize {
        let regex = Self::compile(pattern);
        self.lock()
            .history
            .iter()
            .filter(|statement| regex.is_match(&statement.sql))
            .count()
    }

    /// Highest number of batches that were inside the engine at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn closed_databases(&self) -> Vec<String> {
        self.lock().closed.clone()
    }

    pub fn reset_history(&self) {
        let mut state = self.lock();
        state.history.clear();
        state.batches.clear();
        state.read_only_flags.clear();
    }

    fn evaluate(
        &self,
        statements: Vec<NativeStatement>,
        read_only: bool,
    ) -> Result<Vec<NativeOutcome>, SqlSequencerError> {
        let mut state = self.lock();
        state
            .batches
            .push(statements.iter().map(|s| s.sql.clone()).collect());
        state.read_only_flags.push(read_only);

        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            state.history.push(statement);
            let position = state.history.len();
            let sql = &state.history[position - 1].sql;
            let outcome = if let Some(message) = state.nth_failures.get(&position) {
                NativeOutcome::failure(message.clone())
            } else if let Some((_, scripted)) = state
                .pattern_outcomes
                .iter()
                .find(|(pattern, _)| pattern.is_match(sql))
            {
                scripted.clone()
            } else {
                NativeOutcome::success(None, 0, Vec::new(), Vec::new())
            };
            outcomes.push(outcome);
        }

        if let Some(message) = state.transport_failures.pop_front() {
            return Err(SqlSequencerError::Transport(message));
        }
        if state.truncate_next {
            state.truncate_next = false;
            outcomes.pop();
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn submit_batch(
        &self,
        _database: &str,
        statements: Vec<NativeStatement>,
        read_only: bool,
    ) -> Result<Vec<NativeOutcome>, SqlSequencerError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = self.evaluate(statements, read_only);
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn close_database(&self, database: &str) -> Result<(), SqlSequencerError> {
        self.lock().closed.push(database.to_owned());
        Ok(())
    }
}
