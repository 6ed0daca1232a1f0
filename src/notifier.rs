use crate::error::RunError;
use crate::pool::FuturePool;
use crate::task::TaskId;

use std::fmt;
use std::sync::Arc;

// --- Public Event Types for Listeners ---

/// The two things that can happen to a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolEventKind {
  Fulfilled,
  Rejected,
}

/// Outcome carried by a [`PoolEvent`].
#[derive(Debug)]
pub enum PoolEventPayload<T, E> {
  Fulfilled { task_id: TaskId, result: T },
  Rejected { task_id: TaskId, error: RunError<E> },
}

/// An immutable record of one task outcome, delivered to every listener
/// registered for its kind.
pub struct PoolEvent<T, E> {
  pub(crate) pool: FuturePool<T, E>,
  pub(crate) payload: PoolEventPayload<T, E>,
}

impl<T, E> PoolEvent<T, E> {
  /// The pool that admitted the task.
  pub fn pool(&self) -> &FuturePool<T, E> {
    &self.pool
  }

  pub fn kind(&self) -> PoolEventKind {
    match self.payload {
      PoolEventPayload::Fulfilled { .. } => PoolEventKind::Fulfilled,
      PoolEventPayload::Rejected { .. } => PoolEventKind::Rejected,
    }
  }

  pub fn task_id(&self) -> TaskId {
    match self.payload {
      PoolEventPayload::Fulfilled { task_id, .. } | PoolEventPayload::Rejected { task_id, .. } => task_id,
    }
  }

  pub fn payload(&self) -> &PoolEventPayload<T, E> {
    &self.payload
  }

  /// The task's value, for `Fulfilled` events.
  pub fn result(&self) -> Option<&T> {
    match &self.payload {
      PoolEventPayload::Fulfilled { result, .. } => Some(result),
      PoolEventPayload::Rejected { .. } => None,
    }
  }

  /// The task's failure, for `Rejected` events.
  pub fn error(&self) -> Option<&RunError<E>> {
    match &self.payload {
      PoolEventPayload::Rejected { error, .. } => Some(error),
      PoolEventPayload::Fulfilled { .. } => None,
    }
  }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for PoolEvent<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PoolEvent")
      .field("pool_name", &self.pool.name())
      .field("payload", &self.payload)
      .finish()
  }
}

/// A registered event observer. Identity (the `Arc` allocation) is what
/// de-duplicates and removes listeners, so keep a clone to unregister later.
pub type PoolEventListener<T, E> = Arc<dyn Fn(&PoolEvent<T, E>) + Send + Sync + 'static>;

// --- Listener registry (crate-internal) ---

pub(crate) struct EventHub<T, E> {
  fulfilled: Vec<PoolEventListener<T, E>>,
  rejected: Vec<PoolEventListener<T, E>>,
}

impl<T, E> EventHub<T, E> {
  pub(crate) fn new() -> Self {
    Self {
      fulfilled: Vec::new(),
      rejected: Vec::new(),
    }
  }

  fn listeners_mut(&mut self, kind: PoolEventKind) -> &mut Vec<PoolEventListener<T, E>> {
    match kind {
      PoolEventKind::Fulfilled => &mut self.fulfilled,
      PoolEventKind::Rejected => &mut self.rejected,
    }
  }

  /// Returns `false` if this exact listener is already registered for `kind`.
  pub(crate) fn add(&mut self, kind: PoolEventKind, listener: PoolEventListener<T, E>) -> bool {
    let listeners = self.listeners_mut(kind);
    if listeners.iter().any(|existing| same_listener(existing, &listener)) {
      return false;
    }
    listeners.push(listener);
    true
  }

  /// Returns `false` if the listener was not registered for `kind`.
  pub(crate) fn remove(&mut self, kind: PoolEventKind, listener: &PoolEventListener<T, E>) -> bool {
    let listeners = self.listeners_mut(kind);
    match listeners.iter().position(|existing| same_listener(existing, listener)) {
      Some(index) => {
        listeners.remove(index);
        true
      }
      None => false,
    }
  }

  /// Copies the current listeners for `kind`, so dispatch is unaffected by
  /// listeners registering or removing others while it runs.
  pub(crate) fn snapshot(&self, kind: PoolEventKind) -> Vec<PoolEventListener<T, E>> {
    match kind {
      PoolEventKind::Fulfilled => self.fulfilled.clone(),
      PoolEventKind::Rejected => self.rejected.clone(),
    }
  }

  pub(crate) fn len(&self, kind: PoolEventKind) -> usize {
    match kind {
      PoolEventKind::Fulfilled => self.fulfilled.len(),
      PoolEventKind::Rejected => self.rejected.len(),
    }
  }
}

fn same_listener<T, E>(a: &PoolEventListener<T, E>, b: &PoolEventListener<T, E>) -> bool {
  // Compare data pointers only; vtable pointers for one closure may differ across codegen units.
  std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<T, E> fmt::Debug for EventHub<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventHub")
      .field("fulfilled_listeners", &self.fulfilled.len())
      .field("rejected_listeners", &self.rejected.len())
      .finish()
  }
}
