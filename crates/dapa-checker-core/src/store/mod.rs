//! Storage abstraction for the DA/PA Checker.
//!
//! The [`RecordStore`] trait is the only persistence contract the
//! workflow depends on. It treats the backend as an opaque document
//! collection reached through simple filter/sort/limit queries, so the
//! same code runs against SQLite, the in-memory store, or anything else
//! that can answer these calls.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Collection, Identity, Record};

/// Failures a store may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached or the query failed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated (profile id, blog slug).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not defined for this collection.
    #[error("unsupported operation on {0}")]
    Unsupported(Collection),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Record selection. Unset fields match everything; set fields are ANDed.
///
/// `identity` applies to search records (owner) and profiles (id).
/// `since` is inclusive and compares against the creation timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub identity: Option<Identity>,
    pub since: Option<DateTime<Utc>>,
    pub id: Option<String>,
    pub exclude_id: Option<String>,
    pub slug: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            identity: Some(identity.clone()),
            ..Self::default()
        }
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    /// Evaluate the filter against a record. Shared by in-process stores.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(since) = self.since {
            if record.created_at() < since {
                return false;
            }
        }
        let (id, owner, slug) = match record {
            Record::Search(r) => (r.id.as_str(), Some(&r.identity), None),
            Record::Profile(p) => (p.id.as_str(), Some(&p.id), None),
            Record::BlogPost(b) => (b.id.as_str(), None, Some(b.slug.as_str())),
        };
        if let Some(want) = &self.identity {
            if owner != Some(want) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if id != want {
                return false;
            }
        }
        if let Some(skip) = &self.exclude_id {
            if id == skip {
                return false;
            }
        }
        if let Some(want) = &self.slug {
            if slug != Some(want.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Ordering over a record kind's creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Abstract record store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](RecordStore::insert) | Append a record to its collection |
/// | [`find`](RecordStore::find) | Filtered, sorted, limited query |
/// | [`count`](RecordStore::count) | Number of matching records |
/// | [`delete`](RecordStore::delete) | Remove every matching record |
/// | [`replace`](RecordStore::replace) | Overwrite a blog post by id |
///
/// Search records and profiles have no update path. Blog slugs are unique:
/// `insert` and `replace` return [`StoreError::Conflict`] on collision.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &Record) -> StoreResult<()>;

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>>;

    async fn count(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64>;

    /// Returns the number of removed records.
    async fn delete(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64>;

    async fn replace(&self, record: &Record) -> StoreResult<()>;
}
