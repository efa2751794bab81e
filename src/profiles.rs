//! User profile sync.
//!
//! A profile is created lazily the first time an authenticated identity
//! is seen. There is no registration step at this layer and profiles are
//! never updated afterwards.

use chrono::{DateTime, Utc};
use dapa_checker_core::models::{Collection, Record, UserProfile};
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError};

use crate::identity::Principal;

/// Create the principal's profile if it does not exist yet.
///
/// Returns `true` when a profile was created. Losing a race against a
/// concurrent first sight counts as success.
pub async fn sync_profile(
    store: &dyn RecordStore,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let existing = store
        .count(
            Collection::Profiles,
            &RecordFilter::for_identity(&principal.identity),
        )
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let profile = UserProfile {
        id: principal.identity.clone(),
        email: principal.email.clone(),
        created_at: now,
    };
    match store.insert(&Record::Profile(profile)).await {
        Ok(()) => {
            tracing::info!(identity = %principal.identity, "profile created");
            Ok(true)
        }
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Most recently created profiles.
pub async fn recent_profiles(
    store: &dyn RecordStore,
    limit: usize,
) -> Result<Vec<UserProfile>, StoreError> {
    let records = store
        .find(
            Collection::Profiles,
            &RecordFilter::all(),
            SortOrder::NewestFirst,
            Some(limit),
        )
        .await?;
    Ok(records.into_iter().filter_map(Record::into_profile).collect())
}
