use futures_pool::{FuturePool, PoolConfig, Producer};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Dynamic Concurrency Example ---");

  let mut next = 0u32;
  let producer = Producer::from_fn(move || {
    if next == 12 {
      return None;
    }
    next += 1;
    let id = next;
    Some(async move {
      tokio::time::sleep(Duration::from_millis(300)).await;
      Ok::<u32, String>(id)
    })
  });

  let pool = FuturePool::new(producer, 1, PoolConfig::new().name("dynamic_pool")).expect("valid pool configuration");
  let settlement = pool.start().expect("pool is idle");
  info!("Limit {}, in flight {}", pool.concurrency(), pool.size());

  tokio::time::sleep(Duration::from_millis(100)).await;
  pool.set_concurrency(4).expect("positive limit");
  info!("Raised limit to {}, in flight {}", pool.concurrency(), pool.size());

  match settlement.await {
    Ok(()) => info!("Run complete."),
    Err(e) => info!("Run failed: {}", e),
  }
  info!("--- Dynamic Concurrency Example End ---");
}
