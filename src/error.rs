use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors returned synchronously by `FuturePool` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Invalid pool configuration: {0}")]
  InvalidConfiguration(String),

  #[error("Pool already has an active run; wait for its settlement before starting again")]
  AlreadyActive,
}

/// The reason a pool run settled as rejected.
///
/// Task errors are held behind an `Arc` so that every clone of a
/// [`Settlement`](crate::Settlement) observes the very same error value.
#[derive(Error)]
pub enum RunError<E> {
  /// A task completed with `Err`. The first such error rejects the run.
  #[error("Task failed: {0}")]
  Task(Arc<E>),

  /// A task panicked. Carries the panic message, or `"unknown error"` when the
  /// payload had none.
  #[error("Task panicked: {0}")]
  TaskPanicked(String),

  /// Processing a task's outcome (listener dispatch or refilling the pool) panicked.
  #[error("Task outcome processing failed: {0}")]
  ObserverFailed(String),

  /// The run was dropped before it could settle (e.g. the runtime shut down).
  #[error("Pool run was abandoned before it settled")]
  Abandoned,
}

impl<E> RunError<E> {
  /// Returns the task's own error if this run failed because a task returned `Err`.
  pub fn task_error(&self) -> Option<&E> {
    match self {
      RunError::Task(error) => Some(error.as_ref()),
      _ => None,
    }
  }
}

impl<E> Clone for RunError<E> {
  fn clone(&self) -> Self {
    match self {
      RunError::Task(error) => RunError::Task(error.clone()),
      RunError::TaskPanicked(message) => RunError::TaskPanicked(message.clone()),
      RunError::ObserverFailed(message) => RunError::ObserverFailed(message.clone()),
      RunError::Abandoned => RunError::Abandoned,
    }
  }
}

impl<E: fmt::Debug> fmt::Debug for RunError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunError::Task(error) => f.debug_tuple("Task").field(error).finish(),
      RunError::TaskPanicked(message) => f.debug_tuple("TaskPanicked").field(message).finish(),
      RunError::ObserverFailed(message) => f.debug_tuple("ObserverFailed").field(message).finish(),
      RunError::Abandoned => f.write_str("Abandoned"),
    }
  }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown error".to_string()
  }
}
