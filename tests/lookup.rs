//! Integration tests for the cache-aside lookup policy
//!
//! Uses in-process fakes for the cache store and weather source so call counts
//! and injected failures can be asserted directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use weathercache::data::{Condition, Current, Location};
use weathercache::{
    cache_key, CacheError, CacheStore, LookupEvent, LookupObserver, WeatherError, WeatherRecord,
    WeatherService, WeatherSource,
};

fn record(name: &str, temp_c: f64) -> WeatherRecord {
    WeatherRecord {
        location: Location {
            name: name.to_string(),
            region: "Region".to_string(),
            country: "Country".to_string(),
            lat: 51.52,
            lon: -0.11,
            localtime: "2024-07-15 14:00".to_string(),
        },
        current: Current {
            temp_c,
            temp_f: temp_c * 9.0 / 5.0 + 32.0,
            condition: Condition {
                text: "Partly cloudy".to_string(),
                icon: "//cdn.weatherapi.com/weather/64x64/day/116.png".to_string(),
            },
            wind_kph: 13.0,
            wind_dir: "WSW".to_string(),
            humidity: 72,
            cloud: 50,
            feelslike_c: temp_c - 0.7,
            uv: 4.0,
        },
    }
}

/// In-memory store with switchable failures
#[derive(Default)]
struct FakeStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    ttls: Mutex<Vec<Duration>>,
    fail_get: bool,
    fail_set: bool,
    get_delay: Option<Duration>,
    set_delay: Option<Duration>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl FakeStore {
    fn with_entry(key: &str, value: Vec<u8>) -> Self {
        let store = Self::default();
        store.entries.lock().unwrap().insert(key.to_string(), value);
        store
    }

    fn entry(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl CacheStore for FakeStore {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_get {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.set_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_set {
            return Err(CacheError::Unavailable("connection reset".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        self.ttls.lock().unwrap().push(ttl);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        if self.fail_get {
            Err(CacheError::Unavailable("down".to_string()))
        } else {
            Ok(())
        }
    }
}

enum Reply {
    Record(WeatherRecord),
    Status(u16),
    BadBody,
}

/// Weather source that counts calls and replies from a script
struct FakeSource {
    reply: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn returning(record: WeatherRecord) -> Self {
        Self {
            reply: Reply::Record(record),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_with_status(code: u16) -> Self {
        Self {
            reply: Reply::Status(code),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_bad_body() -> Self {
        Self {
            reply: Reply::BadBody,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for FakeSource {
    async fn fetch(&self, _city: &str) -> Result<WeatherRecord, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Record(record) => Ok(record.clone()),
            Reply::Status(code) => Err(WeatherError::Status(*code)),
            Reply::BadBody => {
                let err = serde_json::from_str::<WeatherRecord>(r#"{"error":{"code":1006}}"#)
                    .unwrap_err();
                Err(WeatherError::Decode(err))
            }
        }
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<LookupEvent>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<LookupEvent> {
        self.events.lock().unwrap().clone()
    }

    fn saw(&self, predicate: impl Fn(&LookupEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }
}

impl LookupObserver for RecordingObserver {
    fn observe(&self, event: &LookupEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    service: WeatherService,
    store: Arc<FakeStore>,
    source: Arc<FakeSource>,
    observer: Arc<RecordingObserver>,
}

fn harness(store: FakeStore, source: FakeSource) -> Harness {
    let store = Arc::new(store);
    let source = Arc::new(source);
    let observer = Arc::new(RecordingObserver::default());
    let service = WeatherService::new(source.clone())
        .with_cache(Some(store.clone()))
        .with_observer(observer.clone());
    Harness {
        service,
        store,
        source,
        observer,
    }
}

#[tokio::test]
async fn test_miss_fetches_upstream_and_populates_cache() {
    let h = harness(FakeStore::default(), FakeSource::returning(record("London", 15.5)));

    let result = h.service.lookup("London").await.expect("lookup should succeed");

    assert_eq!(result.location.name, "London");
    assert!((result.current.temp_c - 15.5).abs() < f64::EPSILON);
    assert_eq!(h.source.calls(), 1);

    let stored = h.store.entry("weather:London").expect("entry should be cached");
    assert_eq!(stored, serde_json::to_vec(&result).unwrap());
    let cached: WeatherRecord = serde_json::from_slice(&stored).unwrap();
    assert_eq!(cached, result);

    assert!(h.observer.saw(|e| matches!(e, LookupEvent::CacheMiss { key } if key == "weather:London")));
    assert!(h.observer.saw(|e| matches!(e, LookupEvent::Cached { .. })));
}

#[tokio::test]
async fn test_cache_write_uses_configured_ttl() {
    let store = Arc::new(FakeStore::default());
    let service = WeatherService::new(Arc::new(FakeSource::returning(record("Oslo", 3.0))))
        .with_cache(Some(store.clone()))
        .with_cache_ttl(Duration::from_secs(5 * 60));

    service.lookup("Oslo").await.expect("lookup should succeed");

    assert_eq!(*store.ttls.lock().unwrap(), vec![Duration::from_secs(300)]);
}

#[tokio::test]
async fn test_hit_returns_cached_record_without_upstream_call() {
    let paris = record("Paris", 24.0);
    let store = FakeStore::with_entry("weather:Paris", serde_json::to_vec(&paris).unwrap());
    let h = harness(store, FakeSource::returning(record("Wrong", 0.0)));

    let result = h.service.lookup("Paris").await.expect("lookup should succeed");

    assert_eq!(result, paris);
    assert_eq!(h.source.calls(), 0, "cache hit must not call upstream");
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 0);
    assert!(h.observer.saw(|e| matches!(e, LookupEvent::CacheHit { .. })));
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let h = harness(FakeStore::default(), FakeSource::returning(record("Rome", 28.0)));

    let first = h.service.lookup("Rome").await.expect("first lookup");
    let second = h.service.lookup("Rome").await.expect("second lookup");

    assert_eq!(first, second);
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn test_status_error_is_returned_and_nothing_is_cached() {
    let h = harness(FakeStore::default(), FakeSource::failing_with_status(404));

    let err = h.service.lookup("Nowhere").await.unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert!(err.to_string().contains("404"));
    assert!(h.store.entry("weather:Nowhere").is_none());
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 0);
    assert!(h.observer.saw(|e| matches!(e, LookupEvent::UpstreamFailed { city, .. } if city == "Nowhere")));
}

#[tokio::test]
async fn test_upstream_decode_error_is_returned_and_nothing_is_cached() {
    let h = harness(FakeStore::default(), FakeSource::with_bad_body());

    let err = h.service.lookup("Atlantis").await.unwrap_err();

    assert!(matches!(err, WeatherError::Decode(_)));
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pass_through_mode_without_cache() {
    let source = Arc::new(FakeSource::returning(record("Berlin", 19.0)));
    let service = WeatherService::new(source.clone()).with_cache(None);

    let first = service.lookup("Berlin").await.expect("lookup should succeed");
    let second = service.lookup("Berlin").await.expect("lookup should succeed");

    assert_eq!(first.location.name, "Berlin");
    assert_eq!(first, second);
    assert_eq!(source.calls(), 2, "every lookup calls upstream without a cache");
}

#[tokio::test]
async fn test_pass_through_mode_surfaces_upstream_errors() {
    let service = WeatherService::new(Arc::new(FakeSource::failing_with_status(500)));

    let err = service.lookup("Berlin").await.unwrap_err();

    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn test_cache_write_failure_is_swallowed() {
    let store = FakeStore {
        fail_set: true,
        ..Default::default()
    };
    let h = harness(store, FakeSource::returning(record("Madrid", 31.0)));

    let result = h.service.lookup("Madrid").await.expect("write failure must not fail lookup");

    assert_eq!(result.location.name, "Madrid");
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 1);
    assert!(h.observer.saw(|e| matches!(
        e,
        LookupEvent::CacheWriteFailed { key, reason } if key == "weather:Madrid" && reason.contains("connection reset")
    )));
}

#[tokio::test]
async fn test_cache_read_failure_is_treated_as_miss() {
    let store = FakeStore {
        fail_get: true,
        ..Default::default()
    };
    let h = harness(store, FakeSource::returning(record("Lisbon", 22.0)));

    let result = h.service.lookup("Lisbon").await.expect("read failure must not fail lookup");

    assert_eq!(result.location.name, "Lisbon");
    assert_eq!(h.source.calls(), 1);
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 1, "fresh record is still written back");
    assert!(h.observer.saw(|e| matches!(e, LookupEvent::CacheReadFailed { .. })));
    assert!(!h.observer.saw(|e| matches!(e, LookupEvent::CacheMiss { .. })));
}

#[tokio::test]
async fn test_undecodable_cache_entry_is_treated_as_miss_and_replaced() {
    let store = FakeStore::with_entry("weather:Vienna", b"{\"truncated\":".to_vec());
    let h = harness(store, FakeSource::returning(record("Vienna", 17.0)));

    let result = h.service.lookup("Vienna").await.expect("lookup should succeed");

    assert_eq!(h.source.calls(), 1);
    assert!(h.observer.saw(|e| matches!(e, LookupEvent::CacheDecodeFailed { .. })));
    let stored: WeatherRecord =
        serde_json::from_slice(&h.store.entry("weather:Vienna").unwrap()).unwrap();
    assert_eq!(stored, result);
}

#[tokio::test]
async fn test_cache_keys_are_case_sensitive() {
    let store = FakeStore::with_entry(
        "weather:London",
        serde_json::to_vec(&record("London", 15.5)).unwrap(),
    );
    let h = harness(store, FakeSource::returning(record("london", 15.5)));

    h.service.lookup("london").await.expect("lookup should succeed");

    assert_eq!(h.source.calls(), 1, "\"london\" must not hit the \"London\" entry");
    assert!(h.store.entry(&cache_key("london")).is_some());
}

#[tokio::test]
async fn test_slow_upstream_hits_deadline() {
    let source = FakeSource::returning(record("Tokyo", 26.0)).delayed(Duration::from_secs(5));
    let h = harness(FakeStore::default(), source);
    let service = h.service.with_request_timeout(Duration::from_millis(100));

    let started = Instant::now();
    let err = service.lookup("Tokyo").await.unwrap_err();

    assert!(matches!(err, WeatherError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hung_cache_read_still_returns_upstream_record() {
    let store = FakeStore {
        get_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let source = FakeSource::returning(record("Cairo", 35.0)).delayed(Duration::from_millis(1));
    let h = harness(store, source);
    let service = h.service.clone().with_request_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let result = service.lookup("Cairo").await.expect("hung cache must not fail the lookup");

    assert_eq!(result.location.name, "Cairo");
    assert_eq!(h.source.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(h.observer.saw(|e| matches!(
        e,
        LookupEvent::CacheReadFailed { reason, .. } if reason.contains("timed out")
    )));
}

#[tokio::test]
async fn test_hung_cache_read_is_capped_by_cache_timeout() {
    let store = FakeStore {
        get_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let source = FakeSource::returning(record("Lima", 19.0)).delayed(Duration::from_millis(150));
    let h = harness(store, source);
    let service = h
        .service
        .clone()
        .with_request_timeout(Duration::from_millis(400))
        .with_cache_timeout(Duration::from_millis(50));

    let result = service.lookup("Lima").await.expect("upstream keeps its budget");

    assert_eq!(result.location.name, "Lima");
}

#[tokio::test]
async fn test_hung_cache_write_is_reported_and_ignored() {
    let store = FakeStore {
        set_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let h = harness(store, FakeSource::returning(record("Madrid", 31.0)));
    let service = h.service.clone().with_request_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let result = service.lookup("Madrid").await.expect("write stall must not fail the lookup");

    assert_eq!(result.location.name, "Madrid");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(h.store.entry(&cache_key("Madrid")).is_none());
    assert!(h.observer.saw(|e| matches!(
        e,
        LookupEvent::CacheWriteFailed { reason, .. } if reason.contains("timed out")
    )));
    assert!(!h.observer.saw(|e| matches!(e, LookupEvent::Cached { .. })));
}

#[tokio::test]
async fn test_concurrent_misses_each_call_upstream() {
    let source = FakeSource::returning(record("Sydney", 12.0)).delayed(Duration::from_millis(50));
    let h = harness(FakeStore::default(), source);

    let (a, b) = tokio::join!(h.service.lookup("Sydney"), h.service.lookup("Sydney"));

    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(h.source.calls(), 2, "identical lookups are not de-duplicated");
    assert_eq!(h.store.sets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_health_reports_cache_status() {
    let up = harness(FakeStore::default(), FakeSource::returning(record("A", 1.0)));
    let report = up.service.health().await;
    assert_eq!(report.cache.to_string(), "connected");
    assert_eq!(report.cache_backend, Some("fake"));

    let down = harness(
        FakeStore {
            fail_get: true,
            ..Default::default()
        },
        FakeSource::returning(record("A", 1.0)),
    );
    let report = down.service.health().await;
    assert_eq!(report.cache.to_string(), "disconnected");
}
