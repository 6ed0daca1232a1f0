use crate::error::RunError;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;

/// Outcome of one pool run.
pub type RunOutcome<E> = Result<(), RunError<E>>;

/// The aggregate result of a single pool run.
///
/// Resolves to `Ok(())` once the producer is exhausted and every admitted task
/// has succeeded, or to the first failure observed. Clones share the same
/// outcome, so several callers may await one run.
pub struct Settlement<E> {
  inner: Shared<BoxFuture<'static, RunOutcome<E>>>,
}

impl<E: Send + Sync + 'static> Settlement<E> {
  /// Creates the resolving half (kept by the pool) and the awaitable half.
  pub(crate) fn channel() -> (oneshot::Sender<RunOutcome<E>>, Self) {
    let (tx, rx) = oneshot::channel::<RunOutcome<E>>();
    let inner = rx
      .map(|received| match received {
        Ok(outcome) => outcome,
        // Sender dropped without settling.
        Err(_) => Err(RunError::Abandoned),
      })
      .boxed()
      .shared();
    (tx, Self { inner })
  }

  /// Returns the outcome if the run has settled and this settlement (or a clone)
  /// has already been polled to completion.
  pub fn peek(&self) -> Option<&RunOutcome<E>> {
    self.inner.peek()
  }
}

impl<E> Clone for Settlement<E> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<E> Future for Settlement<E> {
  type Output = RunOutcome<E>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.inner).poll(cx)
  }
}

impl<E> fmt::Debug for Settlement<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Settlement")
      .field("settled", &self.inner.peek().is_some())
      .finish()
  }
}
