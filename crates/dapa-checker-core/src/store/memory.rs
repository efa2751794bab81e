//! In-memory [`RecordStore`] implementation for tests, demos, and
//! single-process deployments that do not need durability.
//!
//! Records live in per-collection `Vec`s behind a `std::sync::RwLock`.
//! An availability switch lets tests simulate a storage outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::{Collection, Record};

use super::{RecordFilter, RecordStore, SortOrder, StoreError, StoreResult};

/// In-memory store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Record>>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    /// (or succeed again when `false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

fn slug_taken(records: &[Record], slug: &str, except_id: Option<&str>) -> bool {
    records.iter().any(|r| match r {
        Record::BlogPost(b) => b.slug == slug && Some(b.id.as_str()) != except_id,
        _ => false,
    })
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, record: &Record) -> StoreResult<()> {
        self.check_available()?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let rows = collections.entry(record.collection()).or_default();

        match record {
            Record::Profile(p) => {
                let exists = rows
                    .iter()
                    .any(|r| matches!(r, Record::Profile(existing) if existing.id == p.id));
                if exists {
                    return Err(StoreError::Conflict(format!("profile {} exists", p.id)));
                }
            }
            Record::BlogPost(b) => {
                if slug_taken(rows, &b.slug, None) {
                    return Err(StoreError::Conflict(format!("slug '{}' is taken", b.slug)));
                }
            }
            Record::Search(_) => {}
        }

        rows.push(record.clone());
        Ok(())
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let Some(rows) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        // Insertion index breaks timestamp ties so ordering is total.
        let mut matched: Vec<(usize, &Record)> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .collect();
        matched.sort_by_key(|(i, r)| (r.created_at(), *i));
        if sort == SortOrder::NewestFirst {
            matched.reverse();
        }

        let limit = limit.unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn count(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        self.check_available()?;
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).count() as u64)
            .unwrap_or(0))
    }

    async fn delete(&self, collection: Collection, filter: &RecordFilter) -> StoreResult<u64> {
        self.check_available()?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let Some(rows) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok((before - rows.len()) as u64)
    }

    async fn replace(&self, record: &Record) -> StoreResult<()> {
        self.check_available()?;
        let Record::BlogPost(post) = record else {
            return Err(StoreError::Unsupported(record.collection()));
        };
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let rows = collections.entry(Collection::BlogPosts).or_default();

        if slug_taken(rows, &post.slug, Some(&post.id)) {
            return Err(StoreError::Conflict(format!("slug '{}' is taken", post.slug)));
        }
        let slot = rows
            .iter_mut()
            .find(|r| matches!(r, Record::BlogPost(b) if b.id == post.id))
            .ok_or_else(|| StoreError::NotFound(format!("blog post {}", post.id)))?;
        *slot = record.clone();
        Ok(())
    }
}
