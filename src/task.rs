use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Identifies one admitted task in events and logs. Unique within the process.
pub type TaskId = u64;

/// The type of future that the pool executes.
/// It must be `Send` and `'static`, and complete with `Ok(T)` or `Err(E)`.
pub type TaskToExecute<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

pub(crate) fn next_task_id() -> TaskId {
  NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}
