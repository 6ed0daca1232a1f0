//! A Tokio-based pool that pulls futures from a producer and runs at most N of
//! them at once, settling a single aggregate result when the producer is
//! exhausted and all admitted futures have finished, or on the first failure.

mod error;
mod legacy;
mod notifier;
mod pool;
mod producer;
mod settlement;
mod task;

pub use error::{PoolError, RunError};
pub use legacy::{create_pool, LegacyOptions, RejectCallback, ResolveCallback};
pub use notifier::{PoolEvent, PoolEventKind, PoolEventListener, PoolEventPayload};
pub use pool::{FuturePool, PoolConfig};
pub use producer::Producer;
pub use settlement::{RunOutcome, Settlement};
pub use task::{TaskId, TaskToExecute};
