use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::SqlSequencerError;
use crate::results::ResultSet;

/// Future for a request that was queued when it was created.
///
/// The request is already in its queue before this value exists, so awaiting it
/// late (or never) does not change execution order. Dropping it does not cancel
/// the request.
pub struct Pending<T> {
    inner: Inner<T>,
}

/// Outcome of one queued statement.
pub type PendingResult = Pending<ResultSet>;
/// Outcomes of a raw batch, one per submitted query.
pub type PendingBatch = Pending<Vec<Result<ResultSet, SqlSequencerError>>>;
/// Completion of a queued transaction.
pub type PendingTransaction = Pending<()>;

enum Inner<T> {
    Failed(Option<SqlSequencerError>),
    Waiting(oneshot::Receiver<Result<T, SqlSequencerError>>),
}

impl<T> Pending<T> {
    pub(crate) fn failed(err: SqlSequencerError) -> Self {
        Self {
            inner: Inner::Failed(Some(err)),
        }
    }

    pub(crate) fn waiting(receiver: oneshot::Receiver<Result<T, SqlSequencerError>>) -> Self {
        Self {
            inner: Inner::Waiting(receiver),
        }
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T, SqlSequencerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Failed(err) => Poll::Ready(Err(err.take().unwrap_or_else(|| {
                SqlSequencerError::Other("pending request polled after completion".into())
            }))),
            Inner::Waiting(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(_)) => Poll::Ready(Err(SqlSequencerError::Transport(
                    "queue worker dropped the request before answering".into(),
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner {
            Inner::Failed(_) => "failed",
            Inner::Waiting(_) => "waiting",
        };
        f.debug_struct("Pending").field("state", &state).finish()
    }
}
