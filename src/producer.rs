//! Task sources.
//!
//! A pool pulls its work from a [`Producer`]. Callers build one from whichever
//! shape their work naturally has:
//!
//! - a pull function that hands out the next future or `None` when done,
//! - an iterator of futures, resumed one step per pull,
//! - a single future (or a plain value), handed out exactly once.
//!
//! Whatever the shape, the pool only ever sees [`Producer::next_task`].

use crate::task::TaskToExecute;

use std::fmt;
use std::future::Future;

use futures::future;

type PullFn<T, E> = Box<dyn FnMut() -> Option<TaskToExecute<T, E>> + Send + 'static>;
type StepIter<T, E> = Box<dyn Iterator<Item = TaskToExecute<T, E>> + Send + 'static>;

enum Source<T, E> {
  Pull(PullFn<T, E>),
  Steps(StepIter<T, E>),
  Single(Option<TaskToExecute<T, E>>),
}

/// A normalized source of tasks: every pull yields the next task or `None`.
pub struct Producer<T, E> {
  source: Source<T, E>,
}

impl<T: Send + 'static, E: Send + 'static> Producer<T, E> {
  /// Wraps a pull function. Returning `None` signals that no more tasks remain.
  pub fn from_fn<F, Fut>(mut pull: F) -> Self
  where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    Self {
      source: Source::Pull(Box::new(move || {
        pull().map(|task| Box::pin(task) as TaskToExecute<T, E>)
      })),
    }
  }

  /// Instantiates the iterable once and resumes it one step per pull.
  ///
  /// The iterator is fused, so once it has finished it keeps reporting
  /// exhaustion even if the underlying iterator would resume.
  pub fn from_steps<I, Fut>(tasks: I) -> Self
  where
    I: IntoIterator<Item = Fut>,
    I::IntoIter: Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let steps = tasks
      .into_iter()
      .fuse()
      .map(|task| Box::pin(task) as TaskToExecute<T, E>);
    Self {
      source: Source::Steps(Box::new(steps)),
    }
  }

  /// Yields `task` on the first pull and `None` on every pull after it.
  pub fn from_future<Fut>(task: Fut) -> Self
  where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    Self {
      source: Source::Single(Some(Box::pin(task))),
    }
  }

  /// Lifts a plain value into an already-completed task, then behaves like
  /// [`Producer::from_future`].
  pub fn from_value(value: T) -> Self {
    Self::from_future(future::ready(Ok(value)))
  }
}

impl<T, E> Producer<T, E> {
  /// Pulls the next task, or `None` once the source is exhausted.
  pub fn next_task(&mut self) -> Option<TaskToExecute<T, E>> {
    match &mut self.source {
      Source::Pull(pull) => pull(),
      Source::Steps(steps) => steps.next(),
      Source::Single(task) => task.take(),
    }
  }

  pub(crate) fn kind(&self) -> &'static str {
    match self.source {
      Source::Pull(_) => "pull_fn",
      Source::Steps(_) => "iterator",
      Source::Single(_) => "single",
    }
  }
}

impl<T, E> fmt::Debug for Producer<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Producer")
      .field("kind", &self.kind())
      .finish_non_exhaustive()
  }
}
