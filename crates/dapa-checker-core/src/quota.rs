//! Daily search quota.
//!
//! A recognized identity may run `daily_limit` searches per local day.
//! The count is taken from the identity's search records created since
//! local midnight, so it resets at the caller's midnight.
//!
//! # Known gap: check-then-insert race
//!
//! The count and the later insert are separate store calls. Two
//! concurrent requests from one identity can both observe
//! `daily_limit - 1` and both proceed, leaving `daily_limit + 1` records
//! for that day. Strict enforcement would need a single atomic
//! conditional increment in the store; this policy does not do that.
//!
//! # Scope
//!
//! [`QuotaScope::IdentifiedOnly`] exempts anonymous callers entirely.
//! [`QuotaScope::AllCallers`] counts them too, pooled under the
//! anonymous sentinel identity.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Collection, Identity};
use crate::store::{RecordFilter, RecordStore};

pub const DEFAULT_DAILY_LIMIT: u32 = 3;

/// Which callers the daily limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// Only recognized identities are limited.
    #[default]
    #[serde(alias = "identified")]
    IdentifiedOnly,
    /// Anonymous callers share one pooled allowance.
    #[serde(alias = "all")]
    AllCallers,
}

/// Searches used and left in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub used: u64,
    /// `None` when the caller is not subject to the limit.
    pub limit: Option<u32>,
    pub remaining: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub daily_limit: u32,
    pub scope: QuotaScope,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            scope: QuotaScope::IdentifiedOnly,
        }
    }
}

impl QuotaPolicy {
    pub fn new(daily_limit: u32, scope: QuotaScope) -> Self {
        Self { daily_limit, scope }
    }

    /// The identity a caller's searches are counted (and persisted) under,
    /// or `None` when the caller is not tracked at all.
    pub fn subject(&self, identity: Option<&Identity>) -> Option<Identity> {
        match (identity, self.scope) {
            (Some(id), _) => Some(id.clone()),
            (None, QuotaScope::AllCallers) => Some(Identity::anonymous()),
            (None, QuotaScope::IdentifiedOnly) => None,
        }
    }

    /// Whether the caller may run another search at `now`.
    ///
    /// Fails closed: a store error denies the search.
    pub async fn can_search(
        &self,
        store: &dyn RecordStore,
        identity: Option<&Identity>,
        now: DateTime<FixedOffset>,
    ) -> bool {
        let Some(subject) = self.subject(identity) else {
            return true;
        };
        match searches_today(store, &subject, now).await {
            Ok(count) => {
                tracing::debug!(identity = %subject, count, limit = self.daily_limit, "quota check");
                count < u64::from(self.daily_limit)
            }
            Err(e) => {
                tracing::warn!(identity = %subject, error = %e, "quota check failed, denying search");
                false
            }
        }
    }

    /// Usage report for the caller. Store errors propagate.
    pub async fn usage(
        &self,
        store: &dyn RecordStore,
        identity: Option<&Identity>,
        now: DateTime<FixedOffset>,
    ) -> Result<QuotaUsage, crate::store::StoreError> {
        let Some(subject) = self.subject(identity) else {
            return Ok(QuotaUsage {
                used: 0,
                limit: None,
                remaining: None,
            });
        };
        let used = searches_today(store, &subject, now).await?;
        Ok(QuotaUsage {
            used,
            limit: Some(self.daily_limit),
            remaining: Some(u64::from(self.daily_limit).saturating_sub(used)),
        })
    }
}

/// Local midnight of `now`'s own day, expressed in UTC.
pub fn window_start(now: DateTime<FixedOffset>) -> DateTime<Utc> {
    let local_midnight = now.date_naive().and_time(NaiveTime::MIN);
    let offset = Duration::seconds(i64::from(now.offset().local_minus_utc()));
    (local_midnight - offset).and_utc()
}

async fn searches_today(
    store: &dyn RecordStore,
    subject: &Identity,
    now: DateTime<FixedOffset>,
) -> Result<u64, crate::store::StoreError> {
    let filter = RecordFilter::for_identity(subject).since(window_start(now));
    store.count(Collection::SearchHistory, &filter).await
}
