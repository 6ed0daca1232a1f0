//! Callback-style construction.
//!
//! Older callers configure a pool with a pair of per-task callbacks instead of
//! event listeners. [`LegacyOptions`] turns those callbacks into ordinary
//! listeners through the pool's public event API, and [`create_pool`] is the
//! one-call entry point: build, wire, start, and hand back the settlement.

use crate::error::{PoolError, RunError};
use crate::notifier::{PoolEvent, PoolEventKind, PoolEventListener, PoolEventPayload};
use crate::pool::{FuturePool, PoolConfig};
use crate::producer::Producer;
use crate::settlement::Settlement;
use crate::task::TaskId;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Called for each task that succeeds: `(run settlement, task id, value)`.
pub type ResolveCallback<T, E> = Arc<dyn Fn(Option<Settlement<E>>, TaskId, &T) + Send + Sync + 'static>;

/// Called for the task failure that rejects a run: `(run settlement, task id, error)`.
pub type RejectCallback<E> = Arc<dyn Fn(Option<Settlement<E>>, TaskId, &RunError<E>) + Send + Sync + 'static>;

/// Pool configuration plus optional per-task callbacks.
pub struct LegacyOptions<T, E> {
  config: PoolConfig,
  on_resolve: Option<ResolveCallback<T, E>>,
  on_reject: Option<RejectCallback<E>>,
}

impl<T, E> Default for LegacyOptions<T, E> {
  fn default() -> Self {
    Self {
      config: PoolConfig::default(),
      on_resolve: None,
      on_reject: None,
    }
  }
}

impl<T, E> LegacyOptions<T, E> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: PoolConfig) -> Self {
    self.config = config;
    self
  }

  pub fn on_resolve(mut self, callback: impl Fn(Option<Settlement<E>>, TaskId, &T) + Send + Sync + 'static) -> Self {
    self.on_resolve = Some(Arc::new(callback));
    self
  }

  pub fn on_reject(mut self, callback: impl Fn(Option<Settlement<E>>, TaskId, &RunError<E>) + Send + Sync + 'static) -> Self {
    self.on_reject = Some(Arc::new(callback));
    self
  }
}

impl<T: 'static, E: 'static> LegacyOptions<T, E> {
  /// Registers the configured callbacks on `pool` as event listeners and
  /// returns the listeners, so they can later be removed with
  /// [`FuturePool::remove_event_listener`].
  pub fn attach(&self, pool: &FuturePool<T, E>) -> Vec<(PoolEventKind, PoolEventListener<T, E>)> {
    let mut attached = Vec::new();

    if let Some(callback) = self.on_resolve.clone() {
      let listener: PoolEventListener<T, E> = Arc::new(move |event: &PoolEvent<T, E>| {
        if let PoolEventPayload::Fulfilled { task_id, result } = event.payload() {
          callback(event.pool().promise(), *task_id, result);
        }
      });
      pool.add_event_listener(PoolEventKind::Fulfilled, listener.clone());
      attached.push((PoolEventKind::Fulfilled, listener));
    }

    if let Some(callback) = self.on_reject.clone() {
      let listener: PoolEventListener<T, E> = Arc::new(move |event: &PoolEvent<T, E>| {
        if let PoolEventPayload::Rejected { task_id, error } = event.payload() {
          callback(event.pool().promise(), *task_id, error);
        }
      });
      pool.add_event_listener(PoolEventKind::Rejected, listener.clone());
      attached.push((PoolEventKind::Rejected, listener));
    }

    debug!(pool_name = %pool.name(), count = attached.len(), "Attached legacy callbacks.");
    attached
  }
}

impl<T, E> fmt::Debug for LegacyOptions<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LegacyOptions")
      .field("config", &self.config)
      .field("on_resolve", &self.on_resolve.is_some())
      .field("on_reject", &self.on_reject.is_some())
      .finish()
  }
}

/// Builds a pool over `producer`, attaches any callbacks from `options`, starts
/// it, and returns the run's settlement.
///
/// Use [`FuturePool`] directly to change concurrency mid-run or inspect `size()`.
///
/// # Errors
/// Returns `PoolError::InvalidConfiguration` for a zero `concurrency` or a
/// missing runtime.
pub fn create_pool<T, E>(
  producer: Producer<T, E>,
  concurrency: usize,
  options: LegacyOptions<T, E>,
) -> Result<Settlement<E>, PoolError>
where
  T: Send + 'static,
  E: Send + Sync + 'static,
{
  let pool = FuturePool::new(producer, concurrency, options.config.clone())?;
  // Callbacks stay registered for the pool's lifetime; nothing detaches them.
  let _attached = options.attach(&pool);
  pool.start()
}
