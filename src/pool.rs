use crate::error::{panic_message, PoolError, RunError};
use crate::notifier::{EventHub, PoolEvent, PoolEventKind, PoolEventListener, PoolEventPayload};
use crate::producer::Producer;
use crate::settlement::{RunOutcome, Settlement};
use crate::task::{next_task_id, TaskId, TaskToExecute};

use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::ReentrantMutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

const DEFAULT_POOL_NAME: &str = "future_pool";

/// Construction-time settings for a [`FuturePool`].
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
  name: Option<String>,
  runtime: Option<TokioHandle>,
}

impl PoolConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Name used in log records and spans. Defaults to `"future_pool"`.
  pub fn name(mut self, name: &str) -> Self {
    self.name = Some(name.to_string());
    self
  }

  /// Runtime on which admitted tasks are spawned. Defaults to the runtime
  /// current at construction.
  pub fn runtime(mut self, handle: TokioHandle) -> Self {
    self.runtime = Some(handle);
    self
  }
}

/// The settlement side of the run in progress.
struct ActiveRun<E> {
  settlement: Settlement<E>,
  resolver: oneshot::Sender<RunOutcome<E>>,
}

struct PoolState<E> {
  concurrency: usize,
  in_flight: usize,
  producer_exhausted: bool,
  /// Bumped on every `start`, so outcomes from earlier runs can be told apart.
  generation: u64,
  run: Option<ActiveRun<E>>,
}

/// All mutable pool data. The producer, the counters and the listener registry
/// live in separate cells so that a producer or listener calling back into the
/// pool on the same thread never finds a cell already borrowed.
struct PoolCore<T, E> {
  state: RefCell<PoolState<E>>,
  producer: RefCell<Producer<T, E>>,
  listeners: RefCell<EventHub<T, E>>,
}

struct PoolShared<T, E> {
  pool_name: Arc<String>,
  tokio_handle: TokioHandle,
  core: ReentrantMutex<PoolCore<T, E>>,
}

/// Runs futures pulled from a [`Producer`] with at most `concurrency` in flight.
///
/// Cloning is cheap; all clones drive the same pool.
pub struct FuturePool<T, E> {
  shared: Arc<PoolShared<T, E>>,
}

impl<T, E> Clone for FuturePool<T, E> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<T, E> FuturePool<T, E> {
  pub fn name(&self) -> &str {
    &self.shared.pool_name
  }

  /// Current concurrency limit.
  pub fn concurrency(&self) -> usize {
    let core = self.shared.core.lock();
    let concurrency = core.state.borrow().concurrency;
    concurrency
  }

  /// Number of admitted tasks that have not completed yet.
  pub fn size(&self) -> usize {
    let core = self.shared.core.lock();
    let in_flight = core.state.borrow().in_flight;
    in_flight
  }

  /// Whether a run is in progress.
  pub fn is_active(&self) -> bool {
    let core = self.shared.core.lock();
    let active = core.state.borrow().run.is_some();
    active
  }

  /// The settlement of the run in progress, or `None` when idle.
  pub fn promise(&self) -> Option<Settlement<E>> {
    let core = self.shared.core.lock();
    let settlement = core.state.borrow().run.as_ref().map(|run| run.settlement.clone());
    settlement
  }

  /// Registers `listener` for `kind`. Returns `false` if this same listener
  /// (by identity) was already registered for that kind.
  pub fn add_event_listener(&self, kind: PoolEventKind, listener: PoolEventListener<T, E>) -> bool {
    let core = self.shared.core.lock();
    let added = core.listeners.borrow_mut().add(kind, listener);
    if added {
      debug!(pool_name = %*self.shared.pool_name, ?kind, "Added event listener. Total for kind: {}", core.listeners.borrow().len(kind));
    }
    added
  }

  /// Unregisters `listener` from `kind`. Returns `false` if it was not registered.
  pub fn remove_event_listener(&self, kind: PoolEventKind, listener: &PoolEventListener<T, E>) -> bool {
    let core = self.shared.core.lock();
    let removed = core.listeners.borrow_mut().remove(kind, listener);
    if removed {
      debug!(pool_name = %*self.shared.pool_name, ?kind, "Removed event listener.");
    }
    removed
  }
}

impl<T: Send + 'static, E: Send + Sync + 'static> FuturePool<T, E> {
  /// Creates an idle pool.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfiguration` if `concurrency` is zero, or if no
  /// runtime was configured and none is current.
  pub fn new(producer: Producer<T, E>, concurrency: usize, config: PoolConfig) -> Result<Self, PoolError> {
    if concurrency == 0 {
      return Err(PoolError::InvalidConfiguration(
        "concurrency must be a positive integer, got 0".to_string(),
      ));
    }
    let tokio_handle = match config.runtime {
      Some(handle) => handle,
      None => TokioHandle::try_current().map_err(|e| {
        PoolError::InvalidConfiguration(format!("no Tokio runtime configured or current: {}", e))
      })?,
    };
    let pool_name = Arc::new(config.name.unwrap_or_else(|| DEFAULT_POOL_NAME.to_string()));

    debug!(pool_name = %*pool_name, concurrency, producer = producer.kind(), "Created pool.");

    Ok(Self {
      shared: Arc::new(PoolShared {
        pool_name,
        tokio_handle,
        core: ReentrantMutex::new(PoolCore {
          state: RefCell::new(PoolState {
            concurrency,
            in_flight: 0,
            producer_exhausted: false,
            generation: 0,
            run: None,
          }),
          producer: RefCell::new(producer),
          listeners: RefCell::new(EventHub::new()),
        }),
      }),
    })
  }

  /// Changes the concurrency limit. During a run, a higher limit admits more
  /// tasks before this call returns; a lower one only throttles later admissions.
  ///
  /// If the producer panics while refilling, the run is rejected with
  /// `RunError::ObserverFailed` and this call still returns `Ok(())`.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfiguration` if `concurrency` is zero.
  pub fn set_concurrency(&self, concurrency: usize) -> Result<(), PoolError> {
    if concurrency == 0 {
      return Err(PoolError::InvalidConfiguration(
        "concurrency must be a positive integer, got 0".to_string(),
      ));
    }
    let core = self.shared.core.lock();
    let active = {
      let mut state = core.state.borrow_mut();
      debug!(pool_name = %*self.shared.pool_name, from = state.concurrency, to = concurrency, "Changing concurrency limit.");
      state.concurrency = concurrency;
      state.run.is_some()
    };
    if active {
      self.shared.proceed_or_reject(&core);
    }
    Ok(())
  }

  /// Begins a run and admits the first batch of tasks before returning.
  ///
  /// A producer panic during that first admission does not escape: the
  /// returned settlement is already rejected with `RunError::ObserverFailed`
  /// and the pool is idle again.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadyActive` if a run is already in progress.
  pub fn start(&self) -> Result<Settlement<E>, PoolError> {
    let core = self.shared.core.lock();
    let settlement = {
      let mut state = core.state.borrow_mut();
      if state.run.is_some() {
        warn!(pool_name = %*self.shared.pool_name, "Start: Pool already has an active run.");
        return Err(PoolError::AlreadyActive);
      }
      let (resolver, settlement) = Settlement::channel();
      state.generation += 1;
      state.in_flight = 0;
      state.producer_exhausted = false;
      state.run = Some(ActiveRun {
        settlement: settlement.clone(),
        resolver,
      });
      info!(pool_name = %*self.shared.pool_name, generation = state.generation, concurrency = state.concurrency, "Run started.");
      settlement
    };
    self.shared.proceed_or_reject(&core);
    Ok(settlement)
  }
}

impl<T: Send + 'static, E: Send + Sync + 'static> PoolShared<T, E> {
  /// Runs the admission loop for a caller-initiated transition. A panic from
  /// the producer rejects the active run instead of leaving it stuck.
  fn proceed_or_reject(self: &Arc<Self>, core: &PoolCore<T, E>) {
    if let Err(panic_payload) = catch_unwind(AssertUnwindSafe(|| self.proceed(core))) {
      let message = panic_message(panic_payload.as_ref());
      error!(pool_name = %*self.pool_name, "Producer panicked during admission: {}", message);
      self.settle(core, Err(RunError::ObserverFailed(message)));
    }
  }

  /// The admission loop: pulls and spawns tasks while slots are free, then
  /// fulfills the run if the producer is exhausted and nothing is in flight.
  fn proceed(self: &Arc<Self>, core: &PoolCore<T, E>) {
    let Ok(mut producer) = core.producer.try_borrow_mut() else {
      // A pull is already underway further up this thread's stack; it re-checks
      // the slot count on its next iteration.
      trace!(pool_name = %*self.pool_name, "Admission already in progress. Skipping nested call.");
      return;
    };

    loop {
      let generation = {
        let state = core.state.borrow();
        if state.run.is_none() || state.producer_exhausted || state.in_flight >= state.concurrency {
          break;
        }
        state.generation
      };

      // No state borrow is held while the producer runs.
      let next = producer.next_task();

      let mut state = core.state.borrow_mut();
      match next {
        Some(task) => {
          state.in_flight += 1;
          let task_id = next_task_id();
          debug!(pool_name = %*self.pool_name, %task_id, in_flight = state.in_flight, limit = state.concurrency, "Admitted task.");
          drop(state);
          self.track(generation, task_id, task);
        }
        None => {
          debug!(pool_name = %*self.pool_name, producer = producer.kind(), "Producer exhausted.");
          state.producer_exhausted = true;
          break;
        }
      }
    }
    drop(producer);

    let finished = {
      let state = core.state.borrow();
      state.run.is_some() && state.producer_exhausted && state.in_flight == 0
    };
    if finished {
      self.settle(core, Ok(()));
    }
  }

  fn track(self: &Arc<Self>, generation: u64, task_id: TaskId, task: TaskToExecute<T, E>) {
    let shared = self.clone();
    self.tokio_handle.spawn(
      async move {
        let outcome = match AssertUnwindSafe(task).catch_unwind().await {
          Ok(Ok(result)) => Ok(result),
          Ok(Err(e)) => Err(RunError::Task(Arc::new(e))),
          Err(panic_payload) => {
            let message = panic_message(panic_payload.as_ref());
            error!(pool_name = %*shared.pool_name, %task_id, "Task panicked during execution: {}", message);
            Err(RunError::TaskPanicked(message))
          }
        };
        shared.on_task_completed(generation, task_id, outcome);
      }
      .instrument(info_span!("pool_task", pool_name = %*self.pool_name, %task_id)),
    );
  }

  fn on_task_completed(self: &Arc<Self>, generation: u64, task_id: TaskId, outcome: Result<T, RunError<E>>) {
    let core = self.core.lock();
    {
      let mut state = core.state.borrow_mut();
      if state.run.is_none() || state.generation != generation {
        trace!(pool_name = %*self.pool_name, %task_id, "Task finished after its run settled. Outcome discarded.");
        return;
      }
      state.in_flight -= 1;
      debug!(pool_name = %*self.pool_name, %task_id, success = outcome.is_ok(), in_flight = state.in_flight, "Task completed.");
    }

    let processed = catch_unwind(AssertUnwindSafe(|| match outcome {
      Ok(result) => {
        self.fire(&core, PoolEventPayload::Fulfilled { task_id, result });
        self.proceed(&core);
      }
      Err(error) => {
        self.fire(
          &core,
          PoolEventPayload::Rejected {
            task_id,
            error: error.clone(),
          },
        );
        warn!(pool_name = %*self.pool_name, %task_id, "Task failed; rejecting run: {}", describe(&error));
        self.settle(&core, Err(error));
      }
    }));

    if let Err(panic_payload) = processed {
      let message = panic_message(panic_payload.as_ref());
      error!(pool_name = %*self.pool_name, %task_id, "Processing task outcome panicked: {}", message);
      self.settle(&core, Err(RunError::ObserverFailed(message)));
    }
  }

  fn fire(self: &Arc<Self>, core: &PoolCore<T, E>, payload: PoolEventPayload<T, E>) {
    let event = PoolEvent {
      pool: FuturePool { shared: self.clone() },
      payload,
    };
    let listeners = core.listeners.borrow().snapshot(event.kind());
    if listeners.is_empty() {
      trace!(pool_name = %*self.pool_name, task_id = event.task_id(), "No listeners for event kind {:?}.", event.kind());
      return;
    }
    for listener in listeners {
      listener(&event);
    }
  }

  /// Resolves the active run, if any, and returns the pool to idle.
  /// Later calls for the same run are no-ops.
  fn settle(&self, core: &PoolCore<T, E>, outcome: RunOutcome<E>) {
    let run = core.state.borrow_mut().run.take();
    let Some(run) = run else {
      trace!(pool_name = %*self.pool_name, "Settle: No active run. Ignoring.");
      return;
    };
    match &outcome {
      Ok(()) => info!(pool_name = %*self.pool_name, "Run fulfilled."),
      Err(e) => info!(pool_name = %*self.pool_name, "Run rejected: {}", describe(e)),
    }
    if run.resolver.send(outcome).is_err() {
      trace!(pool_name = %*self.pool_name, "Settlement receiver already dropped.");
    }
  }
}

fn describe<E>(error: &RunError<E>) -> &'static str {
  match error {
    RunError::Task(_) => "task returned an error",
    RunError::TaskPanicked(_) => "task panicked",
    RunError::ObserverFailed(_) => "outcome processing failed",
    RunError::Abandoned => "abandoned",
  }
}

impl<T, E> fmt::Debug for FuturePool<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = f.debug_struct("FuturePool");
    out.field("pool_name", &*self.shared.pool_name);
    // Avoid panicking on a re-entrant borrow from inside a listener.
    let core = self.shared.core.lock();
    if let Ok(state) = core.state.try_borrow() {
      out
        .field("concurrency", &state.concurrency)
        .field("in_flight", &state.in_flight)
        .field("producer_exhausted", &state.producer_exhausted)
        .field("active", &state.run.is_some());
    }
    out.finish_non_exhaustive()
  }
}
