//! End-to-end tests for the metrics retrieval workflow.
//!
//! Collaborators are replaced with instrumented doubles so the tests can
//! assert which of them were touched, and the clock is driven manually
//! so the daily window can be crossed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use dapa_checker::checker::Checker;
use dapa_checker::domain_age::{DisabledDomainAge, DomainAgeLookup};
use dapa_checker_core::clock::ManualClock;
use dapa_checker_core::error::CheckError;
use dapa_checker_core::metrics::{MetricsSource, RandomMetrics};
use dapa_checker_core::models::{
    Collection, Identity, Record, SiteMetrics, AUTHORITY_MAX, SPAM_SCORE_MAX, UNKNOWN_DOMAIN_AGE,
};
use dapa_checker_core::quota::{QuotaPolicy, QuotaScope};
use dapa_checker_core::store::memory::InMemoryStore;
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError, StoreResult};

// ─── Test doubles ───────────────────────────────────────────────────

/// Wraps the in-memory store and counts every call.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
    fail_inserts: AtomicBool,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        self.hit();
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert rejected".into()));
        }
        self.inner.insert(record).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        self.hit();
        self.inner.find(collection, filter, sort, limit).await
    }

    async fn count(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        self.hit();
        self.inner.count(collection, filter).await
    }

    async fn delete(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        self.hit();
        self.inner.delete(collection, filter).await
    }

    async fn replace(&self, record: &Record) -> StoreResult<()> {
        self.hit();
        self.inner.replace(record).await
    }
}

/// Wraps the in-memory store; the selected operations never finish.
#[derive(Default)]
struct StalledStore {
    inner: InMemoryStore,
    stall_counts: AtomicBool,
    stall_inserts: AtomicBool,
    stall_deletes: AtomicBool,
}

impl StalledStore {
    async fn maybe_stall(flag: &AtomicBool) {
        if flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    }
}

#[async_trait]
impl RecordStore for StalledStore {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        Self::maybe_stall(&self.stall_inserts).await;
        self.inner.insert(record).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        self.inner.find(collection, filter, sort, limit).await
    }

    async fn count(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        Self::maybe_stall(&self.stall_counts).await;
        self.inner.count(collection, filter).await
    }

    async fn delete(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        Self::maybe_stall(&self.stall_deletes).await;
        self.inner.delete(collection, filter).await
    }

    async fn replace(&self, record: &Record) -> StoreResult<()> {
        self.inner.replace(record).await
    }
}

#[derive(Default)]
struct CountingMetrics {
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsSource for CountingMetrics {
    async fn fetch(&self, domain: &str) -> Result<SiteMetrics, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RandomMetrics.fetch(domain).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct FailingMetrics;

#[async_trait]
impl MetricsSource for FailingMetrics {
    async fn fetch(&self, _domain: &str) -> Result<SiteMetrics, String> {
        Err("connection reset by peer".into())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct StalledMetrics;

#[async_trait]
impl MetricsSource for StalledMetrics {
    async fn fetch(&self, _domain: &str) -> Result<SiteMetrics, String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(RandomMetrics::generate())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

struct OutOfRangeMetrics;

#[async_trait]
impl MetricsSource for OutOfRangeMetrics {
    async fn fetch(&self, _domain: &str) -> Result<SiteMetrics, String> {
        Ok(SiteMetrics {
            domain_authority: 140,
            page_authority: 10,
            spam_score: 1,
            backlinks: 5,
        })
    }

    fn name(&self) -> &str {
        "out-of-range"
    }
}

struct StalledDomainAge;

#[async_trait]
impl DomainAgeLookup for StalledDomainAge {
    async fn lookup(&self, _domain: &str) -> Result<Option<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Some("12 years".into()))
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

struct FailingDomainAge;

#[async_trait]
impl DomainAgeLookup for FailingDomainAge {
    async fn lookup(&self, _domain: &str) -> Result<Option<String>> {
        anyhow::bail!("whois server refused connection")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct FixedDomainAge;

#[async_trait]
impl DomainAgeLookup for FixedDomainAge {
    async fn lookup(&self, _domain: &str) -> Result<Option<String>> {
        Ok(Some("7 years".into()))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn morning() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-03-01T10:00:00+02:00").unwrap()
}

fn checker_with(
    store: Arc<dyn RecordStore>,
    metrics: Arc<dyn MetricsSource>,
    domain_age: Arc<dyn DomainAgeLookup>,
    clock: Arc<ManualClock>,
) -> Checker {
    Checker::new(store, metrics, domain_age)
        .with_clock(clock)
        .with_timeout(Duration::from_millis(100))
}

fn u1() -> Identity {
    Identity::new("u1")
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_valid_url_returns_metrics_in_range() {
    let clock = Arc::new(ManualClock::new(morning()));
    let checker = checker_with(
        Arc::new(InMemoryStore::new()),
        Arc::new(RandomMetrics),
        Arc::new(FixedDomainAge),
        clock,
    );

    for url in [
        "https://example.com",
        "http://Sub.Example.co.uk/path?q=1#top",
        "https://example.com:8443/",
    ] {
        let rec = checker.fetch_metrics(url, None).await.unwrap();
        assert!(rec.domain_authority <= AUTHORITY_MAX);
        assert!(rec.page_authority <= AUTHORITY_MAX);
        assert!(rec.spam_score <= SPAM_SCORE_MAX);
        assert_eq!(rec.url, url);
        assert_eq!(rec.domain_age, "7 years");
    }

    let rec = checker
        .fetch_metrics("http://Sub.Example.co.uk/path?q=1#top", None)
        .await
        .unwrap();
    assert_eq!(rec.domain, "sub.example.co.uk");
}

#[tokio::test]
async fn test_malformed_url_touches_nothing() {
    let store = Arc::new(CountingStore::default());
    let metrics = Arc::new(CountingMetrics::default());
    let checker = checker_with(
        store.clone(),
        metrics.clone(),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    for url in [
        "example.com",
        "https://",
        "ftp://example.com",
        "https://localhost",
        "https://exa mple.com",
        "日本語.com",
        "https://user@example.com",
        "",
    ] {
        let err = checker.fetch_metrics(url, Some(&u1())).await.unwrap_err();
        assert!(matches!(err, CheckError::InvalidUrl(_)), "{}: {:?}", url, err);
    }

    assert_eq!(store.calls(), 0);
    assert_eq!(metrics.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fourth_search_in_a_day_is_refused_then_resets() {
    let store = Arc::new(CountingStore::default());
    let metrics = Arc::new(CountingMetrics::default());
    let clock = Arc::new(ManualClock::new(morning()));
    let checker = checker_with(
        store.clone(),
        metrics.clone(),
        Arc::new(DisabledDomainAge),
        clock.clone(),
    );

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let rec = checker
            .fetch_metrics("https://example.com", Some(&u1()))
            .await
            .unwrap();
        seen.insert(rec.id);
        clock.advance(chrono::Duration::minutes(30));
    }
    assert_eq!(seen.len(), 3);

    let err = checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap_err();
    assert_eq!(err, CheckError::QuotaExceeded { limit: 3 });
    let msg = err.to_string();
    assert!(msg.contains('3'), "{}", msg);
    assert!(msg.contains("per day"), "{}", msg);
    assert_eq!(metrics.calls.load(Ordering::SeqCst), 3);

    // Another identity is unaffected.
    checker
        .fetch_metrics("https://example.com", Some(&Identity::new("u2")))
        .await
        .unwrap();

    // Just after local midnight the window is fresh.
    clock.set(DateTime::parse_from_rfc3339("2024-03-02T00:00:01+02:00").unwrap());
    checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_anonymous_callers_are_not_limited() {
    let store = Arc::new(CountingStore::default());
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    for _ in 0..10 {
        let rec = checker
            .fetch_metrics("https://example.com", None)
            .await
            .unwrap();
        assert!(rec.identity.is_anonymous());
    }
    assert_eq!(store.calls(), 0, "anonymous searches never reach the store");
}

#[tokio::test]
async fn test_all_callers_scope_pools_anonymous_searches() {
    let store = Arc::new(InMemoryStore::new());
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    )
    .with_policy(QuotaPolicy::new(2, QuotaScope::AllCallers));

    checker.fetch_metrics("https://a.com", None).await.unwrap();
    checker.fetch_metrics("https://b.com", None).await.unwrap();
    let err = checker.fetch_metrics("https://c.com", None).await.unwrap_err();
    assert_eq!(err, CheckError::QuotaExceeded { limit: 2 });

    let pooled = store
        .count(
            Collection::SearchHistory,
            &RecordFilter::for_identity(&Identity::anonymous()),
        )
        .await
        .unwrap();
    assert_eq!(pooled, 2);
}

#[tokio::test]
async fn test_quota_fails_closed_when_store_is_down() {
    let store = Arc::new(InMemoryStore::new());
    store.set_unavailable(true);
    let checker = checker_with(
        store,
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let err = checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::QuotaExceeded { .. }));
}

#[tokio::test]
async fn test_stalled_quota_count_denies_search() {
    let store = Arc::new(StalledStore::default());
    store.stall_counts.store(true, Ordering::SeqCst);
    let metrics = Arc::new(CountingMetrics::default());
    let checker = checker_with(
        store,
        metrics.clone(),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let err = checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::QuotaExceeded { limit: 3 }));
    assert_eq!(metrics.calls.load(Ordering::SeqCst), 0);

    // Anonymous callers skip the count under the default scope.
    assert!(checker.fetch_metrics("https://example.com", None).await.is_ok());
}

#[tokio::test]
async fn test_stalled_insert_still_returns_record() {
    let store = Arc::new(StalledStore::default());
    store.stall_inserts.store(true, Ordering::SeqCst);
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(FixedDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let rec = checker
        .fetch_metrics("https://example.com/pricing", Some(&u1()))
        .await
        .unwrap();
    assert_eq!(rec.identity, u1());
    assert_eq!(rec.domain, "example.com");
    assert_eq!(rec.domain_age, "7 years");
    assert!(checker.get_history(Some(&u1())).await.is_empty());
}

#[tokio::test]
async fn test_stalled_clear_history_reports_unavailable() {
    let store = Arc::new(StalledStore::default());
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );
    checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap();

    store.stall_deletes.store(true, Ordering::SeqCst);
    let err = checker.clear_history(&u1()).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert_eq!(checker.get_history(Some(&u1())).await.len(), 1);
}

#[tokio::test]
async fn test_history_is_bounded_and_newest_first() {
    let clock = Arc::new(ManualClock::new(morning()));
    let checker = checker_with(
        Arc::new(InMemoryStore::new()),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        clock.clone(),
    )
    .with_policy(QuotaPolicy::new(100, QuotaScope::IdentifiedOnly));

    for i in 0..12 {
        checker
            .fetch_metrics(&format!("https://site{}.com", i), Some(&u1()))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(1));
    }

    let history = checker.get_history(Some(&u1())).await;
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].domain, "site11.com");
    for pair in history.windows(2) {
        assert!(pair[0].check_timestamp > pair[1].check_timestamp);
    }

    assert!(checker.get_history(None).await.is_empty());
}

#[tokio::test]
async fn test_history_degrades_to_empty_on_outage() {
    let store = Arc::new(InMemoryStore::new());
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );
    checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap();

    store.set_unavailable(true);
    assert!(checker.get_history(Some(&u1())).await.is_empty());
}

#[tokio::test]
async fn test_insert_failure_still_returns_record() {
    let store = Arc::new(CountingStore::default());
    store.fail_inserts.store(true, Ordering::SeqCst);
    let checker = checker_with(
        store.clone(),
        Arc::new(RandomMetrics),
        Arc::new(DisabledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let rec = checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap();
    assert_eq!(rec.identity, u1());
    assert!(rec.spam_score <= SPAM_SCORE_MAX);
    assert!(checker.get_history(Some(&u1())).await.is_empty());
}

#[tokio::test]
async fn test_domain_age_timeout_yields_unknown() {
    let checker = checker_with(
        Arc::new(InMemoryStore::new()),
        Arc::new(RandomMetrics),
        Arc::new(StalledDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let rec = checker
        .fetch_metrics("https://example.com", Some(&u1()))
        .await
        .unwrap();
    assert_eq!(rec.domain_age, UNKNOWN_DOMAIN_AGE);
}

#[tokio::test]
async fn test_domain_age_error_yields_unknown() {
    let checker = checker_with(
        Arc::new(InMemoryStore::new()),
        Arc::new(RandomMetrics),
        Arc::new(FailingDomainAge),
        Arc::new(ManualClock::new(morning())),
    );

    let rec = checker
        .fetch_metrics("https://example.com", None)
        .await
        .unwrap();
    assert_eq!(rec.domain_age, UNKNOWN_DOMAIN_AGE);
}

#[tokio::test]
async fn test_metrics_failures_are_upstream_failures() {
    let sources: Vec<Arc<dyn MetricsSource>> = vec![
        Arc::new(FailingMetrics),
        Arc::new(StalledMetrics),
        Arc::new(OutOfRangeMetrics),
    ];
    for source in sources {
        let store = Arc::new(InMemoryStore::new());
        let checker = checker_with(
            store.clone(),
            source.clone(),
            Arc::new(DisabledDomainAge),
            Arc::new(ManualClock::new(morning())),
        );
        let err = checker
            .fetch_metrics("https://example.com", Some(&u1()))
            .await
            .unwrap_err();
        assert_eq!(err, CheckError::UpstreamFailure, "source {}", source.name());
        assert!(!err.to_string().contains("connection reset"));
        assert_eq!(
            store
                .count(Collection::SearchHistory, &RecordFilter::all())
                .await
                .unwrap(),
            0
        );
    }
}
