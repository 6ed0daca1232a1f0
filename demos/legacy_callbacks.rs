use futures_pool::{create_pool, LegacyOptions, PoolConfig, Producer, RunError, TaskToExecute};
use std::time::Duration;
use tracing::{info, warn};

fn job(id: u32) -> TaskToExecute<u32, String> {
  Box::pin(async move {
    tokio::time::sleep(Duration::from_millis(50 * id as u64)).await;
    if id == 4 {
      return Err(format!("job {} could not finish", id));
    }
    Ok(id * id)
  })
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Legacy Callbacks Example ---");

  let options = LegacyOptions::new()
    .config(PoolConfig::new().name("legacy_pool"))
    .on_resolve(|_settlement, task_id, value: &u32| info!("Task {} resolved with {}", task_id, value))
    .on_reject(|_settlement, task_id, error: &RunError<String>| warn!("Task {} rejected: {}", task_id, error));

  let settlement = create_pool(Producer::from_steps((1..=6).map(job)), 2, options).expect("valid pool configuration");

  // Job 4 fails, so the run rejects; jobs already in flight are left to finish unobserved.
  match settlement.await {
    Ok(()) => info!("Every job succeeded."),
    Err(e) => warn!("Run rejected: {}", e),
  }
  info!("--- Legacy Callbacks Example End ---");
}
