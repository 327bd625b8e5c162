use async_trait::async_trait;
use serde_json::{json, Value};
use spoofer_core::{
    CollectionObserver, CollectionOutcome, CollectionSummary, Collector, CollectorConfig,
    CollectorSettings, HttpPageSource, ProgressSnapshot, RetryPolicy, Sleeper, SpooferError,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_DATE: &str = "2024-06-30";

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl CollectionObserver for RecordingObserver {
    fn on_start(&self, start_date: &str, _routed_path: &Path, _private_path: &Path) {
        self.push(format!("start:{}", start_date));
    }

    fn on_retry(&self, attempt: u32, _max_attempts: u32, delay: Duration, _error: &SpooferError) {
        self.push(format!("retry:{}:{}", attempt, delay.as_secs()));
    }

    fn on_fetch_failed(&self, attempts: u32, _error: &SpooferError) {
        self.push(format!("failed:{}", attempts));
    }

    fn on_total_pages_estimated(&self, total_pages: u64) {
        self.push(format!("total:{}", total_pages));
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.push(format!(
            "page:{}:{}:{}",
            snapshot.page, snapshot.routed_matches, snapshot.private_matches
        ));
    }

    fn on_stopped(&self) {
        self.push("stopped".to_string());
    }

    fn on_finished(&self, summary: &CollectionSummary) {
        self.push(format!("finished:{:?}", summary.outcome));
    }
}

struct Harness {
    server: MockServer,
    dir: TempDir,
    sleeper: Arc<RecordingSleeper>,
}

impl Harness {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
            sleeper: Arc::new(RecordingSleeper::default()),
        }
    }

    fn routed_path(&self) -> PathBuf {
        self.dir.path().join("out").join("routed.txt")
    }

    fn private_path(&self) -> PathBuf {
        self.dir.path().join("out").join("private.txt")
    }

    fn collector(&self) -> Collector<HttpPageSource> {
        let mut config = CollectorConfig::default();
        config.api.base_url = self.server.uri();
        config.output.routed_path = self.routed_path();
        config.output.private_path = self.private_path();

        let mut settings = CollectorSettings::from_config(&config, chrono::Utc::now()).unwrap();
        settings.start_date = START_DATE.to_string();

        Collector::new(
            HttpPageSource::new(Duration::from_secs(5)).unwrap(),
            RetryPolicy::default(),
            settings,
        )
        .with_sleeper(self.sleeper.clone())
    }

    fn delays(&self) -> Vec<Duration> {
        self.sleeper.delays.lock().unwrap().clone()
    }
}

fn session(id: i64, client4: &str, routed: &str, private: &str) -> Value {
    json!({
        "@id": format!("/sessions/{}", id),
        "session": id,
        "timestamp": "2024-07-01T10:00:00+00:00",
        "client4": client4,
        "asn4": 64496,
        "country": "nld",
        "routedspoof": routed,
        "privatespoof": private
    })
}

fn page(members: Vec<Value>, next: Option<&str>, last: Option<&str>) -> Value {
    let mut view = json!({ "@id": "/sessions?page=1" });
    if let Some(next) = next {
        view["hydra:next"] = json!(next);
    }
    if let Some(last) = last {
        view["hydra:last"] = json!(last);
    }

    let total = members.len();
    json!({
        "@context": "/contexts/Session",
        "@type": "hydra:Collection",
        "hydra:totalItems": total,
        "hydra:member": members,
        "hydra:view": view
    })
}

fn first_page() -> Value {
    page(
        vec![
            session(101, "192.0.2.0/24", "received", "blocked"),
            session(102, "198.51.100.0/24", "blocked", "received"),
            session(103, "203.0.113.0/24", "blocked", "rewritten"),
        ],
        Some("/sessions?timestamp%5Bafter%5D=2024-06-30&page=2"),
        Some("/sessions?timestamp%5Bafter%5D=2024-06-30&page=2"),
    )
}

async fn mount_first_page(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("timestamp[after]", START_DATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn data_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_two_page_collection() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], None, None)))
        .with_priority(1)
        .expect(1)
        .mount(&harness.server)
        .await;
    mount_first_page(&harness.server, first_page()).await;

    let observer = RecordingObserver::default();
    let summary = harness.collector().run(&observer).await.unwrap();

    assert_eq!(summary.outcome, CollectionOutcome::Completed);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.routed_matches, 1);
    assert_eq!(summary.private_matches, 1);
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.estimated_total_pages, Some(2));

    let routed = data_lines(&harness.routed_path());
    assert_eq!(routed.len(), 1);
    assert!(routed[0].starts_with("Session: https://spoofer.caida.org/report.php?sessionid=101,"));
    assert!(routed[0].contains("Client4: 192.0.2.0/24"));

    let private = data_lines(&harness.private_path());
    assert_eq!(private.len(), 1);
    assert!(private[0].contains("Client4: 198.51.100.0/24"));

    let header = std::fs::read_to_string(harness.routed_path()).unwrap();
    assert!(header.starts_with("# IPv4 clients that can spoof - Data from CAIDA Spoofer API\n"));
    assert!(header.contains("# Data period: 2024-06-30 to present\n"));

    assert_eq!(
        observer.events(),
        vec![
            "start:2024-06-30",
            "total:2",
            "page:1:1:1",
            "page:2:1:1",
            "finished:Completed",
        ]
    );
    assert!(harness.delays().is_empty());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&harness.server)
        .await;
    let only_page = page(
        vec![session(7, "192.0.2.0/24", "received", "received")],
        None,
        None,
    );
    mount_first_page(&harness.server, only_page).await;

    let observer = RecordingObserver::default();
    let summary = harness.collector().run(&observer).await.unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.routed_matches, 1);
    assert_eq!(summary.private_matches, 1);
    assert_eq!(
        harness.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );

    let events = observer.events();
    assert!(events.contains(&"retry:1:2".to_string()));
    assert!(events.contains(&"retry:2:4".to_string()));
    assert!(!events.iter().any(|e| e.starts_with("failed")));
}

#[tokio::test]
async fn test_persistent_failure_keeps_partial_output() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .expect(3)
        .mount(&harness.server)
        .await;
    mount_first_page(&harness.server, first_page()).await;

    let observer = RecordingObserver::default();
    let summary = harness.collector().run(&observer).await.unwrap();

    assert_eq!(summary.outcome, CollectionOutcome::FetchFailed);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(data_lines(&harness.routed_path()).len(), 1);
    assert_eq!(data_lines(&harness.private_path()).len(), 1);
    assert_eq!(
        harness.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );

    let events = observer.events();
    let tail: Vec<&str> = events.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["failed:3", "stopped", "finished:FetchFailed"]);
}

#[tokio::test]
async fn test_malformed_payload_is_not_retried() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&harness.server)
        .await;

    let observer = RecordingObserver::default();
    let summary = harness.collector().run(&observer).await.unwrap();

    assert_eq!(summary.outcome, CollectionOutcome::FetchFailed);
    assert_eq!(summary.total_records, 0);
    assert!(harness.delays().is_empty());

    // Both files still carry their headers.
    let routed = std::fs::read_to_string(harness.routed_path()).unwrap();
    let private = std::fs::read_to_string(harness.private_path()).unwrap();
    assert_eq!(routed.lines().filter(|l| l.starts_with('#')).count(), 4);
    assert!(private.starts_with("# IPv4 clients that can spoof - Data from CAIDA Spoofer API\n"));
    assert_eq!(routed, private);
    assert!(data_lines(&harness.routed_path()).is_empty());

    assert_eq!(
        observer.events(),
        vec!["start:2024-06-30", "failed:1", "stopped", "finished:FetchFailed"]
    );
}

#[tokio::test]
async fn test_absolute_next_reference() {
    let harness = Harness::start().await;
    let next = format!("{}/archive/sessions?page=2", harness.server.uri());

    Mock::given(method("GET"))
        .and(path("/archive/sessions"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![session(201, "192.0.2.128/25", "received", "blocked")],
            None,
            None,
        )))
        .expect(1)
        .mount(&harness.server)
        .await;
    mount_first_page(&harness.server, page(vec![], Some(&next), None)).await;

    let observer = RecordingObserver::default();
    let summary = harness.collector().run(&observer).await.unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.estimated_total_pages, None);
    assert_eq!(summary.total_records, 1);
    assert_eq!(data_lines(&harness.routed_path()).len(), 1);
    assert!(data_lines(&harness.private_path()).is_empty());
}

#[tokio::test]
async fn test_unwritable_output_fails_before_fetching() {
    let harness = Harness::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first_page()))
        .expect(0)
        .mount(&harness.server)
        .await;

    // "out" exists as a regular file, so neither output can be created.
    std::fs::write(harness.dir.path().join("out"), "blocker").unwrap();

    let observer = RecordingObserver::default();
    let err = harness.collector().run(&observer).await.unwrap_err();

    assert!(matches!(err, SpooferError::OutputSetupFailed { .. }));
    assert!(observer.events().is_empty());
}
