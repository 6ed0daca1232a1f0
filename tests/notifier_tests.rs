use futures_pool::{
  FuturePool, PoolConfig, PoolEvent, PoolEventKind, PoolEventListener, PoolEventPayload, Producer, RunError,
  TaskToExecute,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type TestTask = TaskToExecute<u32, String>;

fn ready_task(value: u32) -> TestTask {
  Box::pin(async move { Ok(value) })
}

// Helper to initialize tracing for tests
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,futures_pool=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .finish()
      .try_init()
      .ok();
  });
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
  Fulfilled { task_id: u64, result: u32, pool_name: String },
  Rejected { task_id: u64, error: String },
}

// Helper for collecting events in tests
fn create_collecting_listener() -> (Arc<Mutex<Vec<Seen>>>, PoolEventListener<u32, String>) {
  let collected = Arc::new(Mutex::new(Vec::new()));
  let collected_clone = collected.clone();
  let listener: PoolEventListener<u32, String> = Arc::new(move |event: &PoolEvent<u32, String>| {
    tracing::debug!("Test Collecting Listener: Received {:?} for task_id: {}", event.kind(), event.task_id());
    let seen = match event.payload() {
      PoolEventPayload::Fulfilled { task_id, result } => Seen::Fulfilled {
        task_id: *task_id,
        result: *result,
        pool_name: event.pool().name().to_string(),
      },
      PoolEventPayload::Rejected { task_id, error } => Seen::Rejected {
        task_id: *task_id,
        error: error.to_string(),
      },
    };
    collected_clone.lock().unwrap().push(seen);
  });
  (collected, listener)
}

fn counter_listener(counter: Arc<AtomicUsize>) -> PoolEventListener<u32, String> {
  Arc::new(move |_event: &PoolEvent<u32, String>| {
    counter.fetch_add(1, Ordering::SeqCst);
  })
}

#[tokio::test]
async fn test_fulfilled_events_carry_task_and_result() {
  setup_tracing_for_test();
  let pool_name = "test_events_fulfilled";
  let pool = FuturePool::new(
    Producer::from_steps(vec![ready_task(7), ready_task(8)]),
    1,
    PoolConfig::new().name(pool_name),
  )
  .unwrap();
  let (events, listener) = create_collecting_listener();
  pool.add_event_listener(PoolEventKind::Fulfilled, listener);

  assert!(pool.start().unwrap().await.is_ok());

  let events = events.lock().unwrap();
  assert_eq!(events.len(), 2);
  let mut results = Vec::new();
  let mut ids = Vec::new();
  for seen in events.iter() {
    match seen {
      Seen::Fulfilled { task_id, result, pool_name: name } => {
        assert_eq!(name, pool_name);
        results.push(*result);
        ids.push(*task_id);
      }
      other => panic!("Expected only fulfilled events, got {:?}", other),
    }
  }
  // Concurrency 1 completes in pull order.
  assert_eq!(results, vec![7, 8]);
  assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_rejected_event_carries_error() {
  setup_tracing_for_test();
  let failing: TestTask = Box::pin(async { Err("broken".to_string()) });
  let pool = FuturePool::new(Producer::from_future(failing), 1, PoolConfig::new().name("test_events_rejected")).unwrap();
  let (events, listener) = create_collecting_listener();
  pool.add_event_listener(PoolEventKind::Rejected, listener.clone());
  pool.add_event_listener(PoolEventKind::Fulfilled, listener);

  let outcome = pool.start().unwrap().await;
  assert!(matches!(outcome, Err(RunError::Task(_))));

  let events = events.lock().unwrap();
  assert_eq!(events.len(), 1);
  match &events[0] {
    Seen::Rejected { error, .. } => assert!(error.contains("broken")),
    other => panic!("Expected a rejected event, got {:?}", other),
  }
}

#[tokio::test]
async fn test_duplicate_listener_registration_is_ignored() {
  setup_tracing_for_test();
  let counter = Arc::new(AtomicUsize::new(0));
  let listener = counter_listener(counter.clone());
  let pool = FuturePool::new(
    Producer::from_steps((0..3).map(ready_task)),
    2,
    PoolConfig::new().name("test_events_dedup"),
  )
  .unwrap();

  assert!(pool.add_event_listener(PoolEventKind::Fulfilled, listener.clone()));
  assert!(!pool.add_event_listener(PoolEventKind::Fulfilled, listener.clone()));
  // Same listener under another kind is a separate registration.
  assert!(pool.add_event_listener(PoolEventKind::Rejected, listener.clone()));

  assert!(pool.start().unwrap().await.is_ok());
  assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_removed_listener_is_not_called() {
  setup_tracing_for_test();
  let kept = Arc::new(AtomicUsize::new(0));
  let removed = Arc::new(AtomicUsize::new(0));
  let kept_listener = counter_listener(kept.clone());
  let removed_listener = counter_listener(removed.clone());
  let pool = FuturePool::new(
    Producer::from_steps((0..4).map(ready_task)),
    2,
    PoolConfig::new().name("test_events_remove"),
  )
  .unwrap();

  pool.add_event_listener(PoolEventKind::Fulfilled, kept_listener);
  pool.add_event_listener(PoolEventKind::Fulfilled, removed_listener.clone());
  assert!(pool.remove_event_listener(PoolEventKind::Fulfilled, &removed_listener));
  assert!(!pool.remove_event_listener(PoolEventKind::Fulfilled, &removed_listener));
  assert!(!pool.remove_event_listener(PoolEventKind::Rejected, &removed_listener));

  assert!(pool.start().unwrap().await.is_ok());
  assert_eq!(kept.load(Ordering::SeqCst), 4);
  assert_eq!(removed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dispatch_uses_snapshot_of_listeners() {
  setup_tracing_for_test();
  let second_calls = Arc::new(AtomicUsize::new(0));
  let second = counter_listener(second_calls.clone());
  let late_calls = Arc::new(AtomicUsize::new(0));
  let late = counter_listener(late_calls.clone());

  let pool = FuturePool::new(
    Producer::from_steps(vec![ready_task(1), ready_task(2)]),
    1,
    PoolConfig::new().name("test_events_snapshot"),
  )
  .unwrap();

  let fired_once = Arc::new(AtomicUsize::new(0));
  let first: PoolEventListener<u32, String> = {
    let second = second.clone();
    let late = late.clone();
    let fired_once = fired_once.clone();
    Arc::new(move |event: &PoolEvent<u32, String>| {
      if fired_once.fetch_add(1, Ordering::SeqCst) == 0 {
        // Changes made during dispatch only apply to the next event.
        event.pool().remove_event_listener(PoolEventKind::Fulfilled, &second);
        event.pool().add_event_listener(PoolEventKind::Fulfilled, late.clone());
      }
    })
  };
  pool.add_event_listener(PoolEventKind::Fulfilled, first);
  pool.add_event_listener(PoolEventKind::Fulfilled, second);

  assert!(pool.start().unwrap().await.is_ok());
  assert_eq!(second_calls.load(Ordering::SeqCst), 1);
  assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_listeners_run_in_registration_order() {
  setup_tracing_for_test();
  let order = Arc::new(Mutex::new(Vec::new()));
  let pool = FuturePool::new(
    Producer::<u32, String>::from_value(1),
    1,
    PoolConfig::new().name("test_events_order"),
  )
  .unwrap();
  for label in ["a", "b", "c"] {
    let order = order.clone();
    pool.add_event_listener(
      PoolEventKind::Fulfilled,
      Arc::new(move |_event: &PoolEvent<u32, String>| order.lock().unwrap().push(label)),
    );
  }

  assert!(pool.start().unwrap().await.is_ok());
  assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_listener_observes_active_run() {
  setup_tracing_for_test();
  let observed = Arc::new(Mutex::new(Vec::new()));
  let observed_clone = observed.clone();
  let pool = FuturePool::new(
    Producer::from_steps(vec![ready_task(1), ready_task(2)]),
    1,
    PoolConfig::new().name("test_events_active"),
  )
  .unwrap();
  pool.add_event_listener(
    PoolEventKind::Fulfilled,
    Arc::new(move |event: &PoolEvent<u32, String>| {
      let pool = event.pool();
      observed_clone
        .lock()
        .unwrap()
        .push((pool.is_active(), pool.promise().is_some(), pool.size()));
    }),
  );

  assert!(pool.start().unwrap().await.is_ok());
  // Events fire before the pool refills, so the finished task's slot is already free.
  assert_eq!(*observed.lock().unwrap(), vec![(true, true, 0), (true, true, 0)]);
}
