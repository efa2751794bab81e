//! Metrics retrieval workflow.
//!
//! [`Checker::fetch_metrics`] runs, in order:
//!
//! 1. URL validation (no store or network access on failure)
//! 2. the daily quota check (fails closed)
//! 3. domain derivation
//! 4. the domain-age lookup (best effort, `"Unknown"` on failure)
//! 5. the metrics source (hard failure)
//! 6. record construction, stamped with the check time
//! 7. persistence (best effort, logged, never fails the call)
//!
//! Every collaborator call is bounded by the configured timeout and a
//! timeout takes the same path as that collaborator's failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;

use dapa_checker_core::clock::{Clock, SystemClock};
use dapa_checker_core::error::CheckError;
use dapa_checker_core::metrics::MetricsSource;
use dapa_checker_core::models::{Collection, Identity, Record, SearchRecord, UNKNOWN_DOMAIN_AGE};
use dapa_checker_core::quota::{QuotaPolicy, QuotaUsage};
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError};
use dapa_checker_core::url;

use crate::domain_age::DomainAgeLookup;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Checker {
    store: Arc<dyn RecordStore>,
    metrics: Arc<dyn MetricsSource>,
    domain_age: Arc<dyn DomainAgeLookup>,
    clock: Arc<dyn Clock>,
    policy: QuotaPolicy,
    history_limit: usize,
    timeout: Duration,
}

impl Checker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        metrics: Arc<dyn MetricsSource>,
        domain_age: Arc<dyn DomainAgeLookup>,
    ) -> Self {
        Self {
            store,
            metrics,
            domain_age,
            clock: Arc::new(SystemClock),
            policy: QuotaPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        timeout(self.timeout, fut).await.ok()
    }

    /// Look up metrics for `url` on behalf of `identity`.
    pub async fn fetch_metrics(
        &self,
        url: &str,
        identity: Option<&Identity>,
    ) -> Result<SearchRecord, CheckError> {
        let target = url::validate(url)?;

        let now = self.clock.now();
        let subject = self.policy.subject(identity);
        if subject.is_some() {
            let allowed = self
                .bounded(self.policy.can_search(self.store.as_ref(), identity, now))
                .await
                .unwrap_or_else(|| {
                    tracing::warn!(identity = ?identity.map(Identity::as_str), "quota check timed out, denying search");
                    false
                });
            if !allowed {
                return Err(CheckError::QuotaExceeded {
                    limit: self.policy.daily_limit,
                });
            }
        }

        let domain = target.domain;

        let domain_age = match self.bounded(self.domain_age.lookup(&domain)).await {
            Some(Ok(Some(age))) => age,
            Some(Ok(None)) => {
                tracing::debug!(%domain, provider = self.domain_age.name(), "domain age not found");
                UNKNOWN_DOMAIN_AGE.to_string()
            }
            Some(Err(e)) => {
                tracing::warn!(%domain, provider = self.domain_age.name(), error = %e, "domain age lookup failed");
                UNKNOWN_DOMAIN_AGE.to_string()
            }
            None => {
                tracing::warn!(%domain, provider = self.domain_age.name(), "domain age lookup timed out");
                UNKNOWN_DOMAIN_AGE.to_string()
            }
        };

        let metrics = match self.bounded(self.metrics.fetch(&domain)).await {
            Some(Ok(m)) if m.in_range() => m,
            Some(Ok(m)) => {
                tracing::error!(%domain, source = self.metrics.name(), metrics = ?m, "metrics source returned out-of-range values");
                return Err(CheckError::UpstreamFailure);
            }
            Some(Err(e)) => {
                tracing::error!(%domain, source = self.metrics.name(), error = %e, "metrics source failed");
                return Err(CheckError::UpstreamFailure);
            }
            None => {
                tracing::error!(%domain, source = self.metrics.name(), "metrics source timed out");
                return Err(CheckError::UpstreamFailure);
            }
        };

        let record = SearchRecord::new(
            subject.clone().unwrap_or_else(Identity::anonymous),
            domain,
            target.url,
            metrics,
            domain_age,
            now.with_timezone(&Utc),
        );

        if subject.is_some() {
            let saved = Record::Search(record.clone());
            match self.bounded(self.store.insert(&saved)).await {
                Some(Ok(())) => {
                    tracing::info!(identity = %record.identity, domain = %record.domain, "search recorded");
                }
                Some(Err(e)) => {
                    tracing::warn!(identity = %record.identity, error = %e, "failed to persist search, returning result anyway");
                }
                None => {
                    tracing::warn!(identity = %record.identity, "persisting search timed out, returning result anyway");
                }
            }
        }

        Ok(record)
    }

    /// The caller's most recent searches, newest first, at most one page.
    ///
    /// Anonymous callers have no history. Store failures degrade to an
    /// empty page.
    pub async fn get_history(&self, identity: Option<&Identity>) -> Vec<SearchRecord> {
        let Some(identity) = identity else {
            return Vec::new();
        };
        let filter = RecordFilter::for_identity(identity);
        let query = self.store.find(
            Collection::SearchHistory,
            &filter,
            SortOrder::NewestFirst,
            Some(self.history_limit),
        );
        match self.bounded(query).await {
            Some(Ok(records)) => records.into_iter().filter_map(Record::into_search).collect(),
            Some(Err(e)) => {
                tracing::warn!(%identity, error = %e, "history query failed, returning empty history");
                Vec::new()
            }
            None => {
                tracing::warn!(%identity, "history query timed out, returning empty history");
                Vec::new()
            }
        }
    }

    /// Searches used and left today.
    pub async fn quota_usage(&self, identity: Option<&Identity>) -> Result<QuotaUsage, StoreError> {
        let now = self.clock.now();
        self.bounded(self.policy.usage(self.store.as_ref(), identity, now))
            .await
            .unwrap_or_else(|| Err(StoreError::Unavailable("quota usage timed out".to_string())))
    }

    /// Delete every search record owned by `identity`.
    pub async fn clear_history(&self, identity: &Identity) -> Result<u64, StoreError> {
        let filter = RecordFilter::for_identity(identity);
        let removed = self
            .bounded(self.store.delete(Collection::SearchHistory, &filter))
            .await
            .unwrap_or_else(|| Err(StoreError::Unavailable("clearing history timed out".to_string())))?;
        tracing::info!(%identity, removed, "search history cleared");
        Ok(removed)
    }
}
