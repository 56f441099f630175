use chanload::{
    Dispatch, Error, IdPool, MetricsSink, RemoteService, Scheduler, SchedulerConfig, Throttle,
    Traffic,
};
use chanload_mock::{MockState, router};
use chanload_runner::runner::http::HttpService;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

async fn spawn_mock() -> (MockState, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state = MockState::default();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, addr)
}

fn client(addr: &str) -> HttpService {
    HttpService::new(&[addr.to_owned()], Duration::from_secs(5)).unwrap()
}

#[derive(Default)]
struct CountingSink {
    increments: AtomicUsize,
}

impl MetricsSink for CountingSink {
    fn increment(&self, _name: &str) {
        self.increments.fetch_add(1, Ordering::Relaxed);
    }

    fn timing(&self, _name: &str, _millis: u64) {}
}

#[tokio::test]
async fn create_subscribe_and_list_round_trip() {
    let (state, addr) = spawn_mock().await;
    let service = client(&addr);

    let a = service.create_channel("chanload-a").await.unwrap();
    let b = service.create_channel("chanload-b").await.unwrap();
    assert_ne!(a, b);
    assert_eq!(state.channel_count(), 2);

    assert_eq!(service.list_subscriptions(&a).await.unwrap(), Some(vec![]));

    service.create_subscription(&a, &b).await.unwrap();
    assert_eq!(state.subscription_count(), 1);
    assert_eq!(service.list_subscriptions(&a).await.unwrap(), Some(vec![b]));
}

#[tokio::test]
async fn unknown_channel_lists_as_none() {
    let (_state, addr) = spawn_mock().await;
    let service = client(&addr);

    assert_eq!(service.list_subscriptions("missing").await.unwrap(), None);
}

#[tokio::test]
async fn not_found_maps_to_unexpected_status() {
    let (_state, addr) = spawn_mock().await;
    let service = client(&addr);

    let err = service
        .create_subscription("missing", "also-missing")
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::UnexpectedStatus { status: 404, .. }),
        "unexpected error {err:?}"
    );
}

#[tokio::test]
async fn refused_connection_maps_to_transport() {
    // Bind then drop to get a port nobody is listening on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let service = client(&addr);

    let err = service.create_channel("chanload-x").await.unwrap_err();
    assert!(
        matches!(err, Error::Transport { .. }),
        "unexpected error {err:?}"
    );
}

#[tokio::test]
async fn scheduler_drives_traffic_against_mock() {
    let (state, addr) = spawn_mock().await;
    let traffic = Traffic::new(
        client(&addr),
        CountingSink::default(),
        IdPool::new(1.0),
        IdPool::new(1.0),
    );
    let config = SchedulerConfig {
        throttle: Throttle::uniform(Duration::from_millis(10)),
        start_jitter: Duration::ZERO,
        dispatch: Dispatch::Inline,
    };
    let scheduler = Scheduler::new(Arc::new(traffic), config);
    scheduler.start(4);

    tokio::time::sleep(Duration::from_millis(500)).await;
    scheduler.shutdown(Duration::from_secs(2)).await;

    assert!(state.channel_count() > 0);
    assert_eq!(
        scheduler.traffic().channels().len(),
        state.channel_count()
    );
    assert!(scheduler.traffic().metrics().increments.load(Ordering::Relaxed) > 0);
}
