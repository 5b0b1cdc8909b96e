//! End-to-end behaviour of the crawler pieces wired together through the
//! public API: discovery, executor, workers, orchestrator and the store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lib_common::core::{
    ClaimedItem, ItemId, ObservationExit, Orchestrator, OrchestratorConfig, OwnerId, RawPage,
    Registry, ScheduleExecutor, Worker,
};
use lib_common::ingestors::{Discovery, FeedSource, FreshFeed, FreshItem, SiteFetcher, SnapshotFetcher};
use lib_common::storage::{ItemRecordState, SnapshotStore};
use lib_common::CrawlerResult;
use tokio_util::sync::CancellationToken;

/// Item page status per repetition (1-based); owner pages always succeed.
struct ScriptedFetcher {
    calls: AtomicU32,
    item_status: fn(u32) -> u16,
}

impl ScriptedFetcher {
    fn new(item_status: fn(u32) -> u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            item_status,
        })
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_item(&self, id: ItemId) -> CrawlerResult<RawPage> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RawPage {
            status: (self.item_status)(n),
            body: format!("<html>photo {}</html>", id),
        })
    }

    async fn fetch_owner(&self, owner: &OwnerId) -> CrawlerResult<RawPage> {
        Ok(RawPage {
            status: 200,
            body: format!("<html>{}</html>", owner),
        })
    }
}

/// Hands out the queued ids in order, then repeats the last one.
struct QueueFeed {
    ids: Mutex<VecDeque<u64>>,
}

impl QueueFeed {
    fn new(ids: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            ids: Mutex::new(ids.iter().copied().collect()),
        })
    }
}

#[async_trait]
impl FeedSource for QueueFeed {
    async fn latest(&self) -> CrawlerResult<Option<FreshItem>> {
        let mut ids = self.ids.lock().unwrap();
        let id = if ids.len() > 1 { ids.pop_front() } else { ids.front().copied() };
        Ok(id.map(|id| FreshItem {
            id: ItemId(id),
            owner: OwnerId(format!("owner{}", id)),
        }))
    }
}

fn item(id: u64) -> ClaimedItem {
    ClaimedItem {
        id: ItemId(id),
        owner: OwnerId(format!("owner{}", id)),
    }
}

#[tokio::test(start_paused = true)]
async fn completed_schedule_writes_ok_and_evenly_spaced_snapshots() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let executor = ScheduleExecutor::new("10x3".parse().unwrap(), ScriptedFetcher::new(|_| 200), store.clone());

    let report = executor.observe(&item(5), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.exit, ObservationExit::Completed);
    let stamps = store.snapshot_timestamps(ItemId(5)).await.unwrap();
    let t0 = stamps[0];
    assert_eq!(stamps, vec![t0, t0 + 10, t0 + 20]);
    assert_eq!(store.record_state(ItemId(5)).await.unwrap(), ItemRecordState::Ok);

    let first = store.record_dir(ItemId(5)).join(t0.to_string());
    assert_eq!(
        std::fs::read_to_string(first.join("photo.html")).unwrap(),
        "<html>photo 5</html>"
    );
    assert_eq!(std::fs::read_to_string(first.join("user.html")).unwrap(), "<html>owner5</html>");
}

#[tokio::test(start_paused = true)]
async fn persistent_failures_stop_after_threshold_is_exceeded() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let fetcher = ScriptedFetcher::new(|n| if n == 1 { 200 } else { 404 });
    let executor = ScheduleExecutor::new("10x5".parse().unwrap(), fetcher.clone(), store.clone())
        .with_error_threshold(3);

    let report = executor.observe(&item(9), &CancellationToken::new()).await.unwrap();

    assert_eq!(report.exit, ObservationExit::TooManyErrors);
    assert_eq!(report.snapshots, 1);
    assert_eq!(report.errors.len(), 4);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    assert_eq!(store.record_state(ItemId(9)).await.unwrap(), ItemRecordState::Error);

    let error_file = std::fs::read_to_string(store.record_dir(ItemId(9)).join("error")).unwrap();
    let lines: Vec<&str> = error_file.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|l| l.ends_with(": 404, 200")));
}

#[tokio::test(start_paused = true)]
async fn two_workers_never_share_an_item() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let cancel = CancellationToken::new();
    let discovery = Arc::new(Discovery::new(QueueFeed::new(&[1, 1, 2, 2, 3]), Arc::new(Registry::new())));
    let executor = Arc::new(ScheduleExecutor::new(
        "10x2".parse().unwrap(),
        ScriptedFetcher::new(|_| 200),
        store.clone(),
    ));

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        stopper.cancel();
    });

    let mut a = Worker::new(0, discovery.clone(), executor.clone(), cancel.clone());
    let mut b = Worker::new(1, discovery.clone(), executor.clone(), cancel.clone());
    let (ra, rb) = tokio::join!(a.run(), b.run());

    // Three distinct ids, each observed exactly once.
    assert_eq!(ra.unwrap().items_finished + rb.unwrap().items_finished, 3);
    for id in 1..=3 {
        assert_eq!(store.snapshot_timestamps(ItemId(id)).await.unwrap().len(), 2);
        assert_eq!(store.record_state(ItemId(id)).await.unwrap(), ItemRecordState::Ok);
    }
}

#[tokio::test(start_paused = true)]
async fn seeded_registry_skips_items_already_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("7")).unwrap();
    std::fs::create_dir(tmp.path().join("8-old")).unwrap();

    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let registry = Arc::new(Registry::seeded(store.existing_item_ids().await.unwrap()));
    let discovery = Discovery::new(QueueFeed::new(&[7, 8, 9]), registry);

    let claimed = discovery
        .next_new_item(&CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, ItemId(9));
}

#[tokio::test(start_paused = true)]
async fn orchestrator_with_immediate_interrupt_observes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let discovery = Arc::new(Discovery::new(QueueFeed::new(&[1, 2, 3]), Arc::new(Registry::new())));
    let executor = Arc::new(ScheduleExecutor::new(
        "10x3".parse().unwrap(),
        ScriptedFetcher::new(|_| 200),
        store.clone(),
    ));
    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            workers: 3,
            stagger_min: Duration::ZERO,
            stagger_max: Duration::ZERO,
        },
        discovery,
        executor,
    );
    orchestrator.cancellation().cancel();

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.workers_started, 3);
    assert_eq!(report.items_finished, 0);
    assert!(store.existing_item_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn http_pipeline_against_mock_site() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discovery/fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "photos": [{"id": 42, "user": {"username": "alice"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photo/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>42</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>alice</html>"))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(tmp.path()));
    let feed = FreshFeed::new(&format!("{}/discovery/fresh?page=1&rpp=1", server.uri())).unwrap();
    let fetcher = SiteFetcher::new(&format!("{}/", server.uri())).unwrap();
    let discovery = Arc::new(
        Discovery::new(Arc::new(feed), Arc::new(Registry::new()))
            .with_poll_interval(Duration::from_millis(50)),
    );
    let executor = Arc::new(ScheduleExecutor::new("1x2".parse().unwrap(), Arc::new(fetcher), store.clone()));
    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            workers: 1,
            stagger_min: Duration::ZERO,
            stagger_max: Duration::ZERO,
        },
        discovery,
        executor,
    );

    let stopper = orchestrator.cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stopper.cancel();
    });

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.items_finished, 1);
    let stamps = store.snapshot_timestamps(ItemId(42)).await.unwrap();
    assert_eq!(stamps.len(), 2);
    assert_eq!(stamps[1] - stamps[0], 1);
    assert_eq!(store.record_state(ItemId(42)).await.unwrap(), ItemRecordState::Ok);
}
