use thiserror::Error;

/// Errors surfaced by database handles, transactions and engines.
///
/// The type is `Clone` because a single transport failure is delivered to every
/// statement of the affected batch.
#[derive(Debug, Clone, Error)]
pub enum SqlSequencerError {
    #[error("Cannot execute operations on closed database: {0}")]
    ClosedDatabase(String),

    #[error("Statement is not {expected}: {sql}")]
    TypeMismatch { expected: &'static str, sql: String },

    #[error("SQL statement error: {0}")]
    Statement(String),

    #[error("Engine transport error: {0}")]
    Transport(String),

    #[error("Could not begin transaction: {0}")]
    TransactionBegin(Box<SqlSequencerError>),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(Box<SqlSequencerError>),

    #[error("Transaction already finished")]
    TransactionFinished,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlSequencerError {
    /// Strip transaction wrappers and return the error that started the failure.
    #[must_use]
    pub fn root_cause(&self) -> &SqlSequencerError {
        match self {
            Self::TransactionBegin(inner) | Self::TransactionAborted(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// `true` when the error came from the engine executing one statement.
    #[must_use]
    pub fn is_statement_error(&self) -> bool {
        matches!(self.root_cause(), Self::Statement(_))
    }

    pub(crate) fn closed(name: &str) -> Self {
        Self::ClosedDatabase(name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_transaction_errors() {
        let err = SqlSequencerError::TransactionAborted(Box::new(
            SqlSequencerError::TransactionBegin(Box::new(SqlSequencerError::Statement(
                "database is locked".into(),
            ))),
        ));
        assert!(err.is_statement_error());
        assert!(matches!(
            err.root_cause(),
            SqlSequencerError::Statement(msg) if msg == "database is locked"
        ));
    }

    #[test]
    fn type_mismatch_message_names_expected_kind() {
        let err = SqlSequencerError::TypeMismatch {
            expected: "SELECT",
            sql: "DELETE FROM users".into(),
        };
        assert_eq!(err.to_string(), "Statement is not SELECT: DELETE FROM users");
    }
}
