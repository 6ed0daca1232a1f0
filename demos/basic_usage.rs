use futures_pool::{FuturePool, PoolConfig, PoolEvent, PoolEventKind, Producer};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

async fn fetch_page(page: u32) -> Result<String, String> {
  info!("Fetching page {}", page);
  tokio::time::sleep(Duration::from_millis(200)).await;
  Ok(format!("contents of page {}", page))
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example (Limit: 3) ---");

  let producer = Producer::from_steps((1..=10).map(fetch_page));
  let pool = FuturePool::new(producer, 3, PoolConfig::new().name("basic_pool")).expect("valid pool configuration");

  pool.add_event_listener(
    PoolEventKind::Fulfilled,
    Arc::new(|event: &PoolEvent<String, String>| {
      info!("Task {} fulfilled: {:?}", event.task_id(), event.result());
    }),
  );

  let settlement = pool.start().expect("pool is idle");
  info!("Started. {} tasks in flight.", pool.size());

  match settlement.await {
    Ok(()) => info!("All pages fetched."),
    Err(e) => info!("Run failed: {}", e),
  }
  info!("--- Basic Usage Example End ---");
}
