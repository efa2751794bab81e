//! Blog service: listing, lookup by slug, related posts, and editing.
//!
//! Slugs are unique. The store enforces it, and a collision surfaces as
//! [`BlogError::SlugTaken`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dapa_checker_core::blog::{edit_post, new_post, DraftError};
use dapa_checker_core::models::{BlogDraft, BlogPost, Collection, Record};
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError};
use thiserror::Error;

pub const RECENT_POSTS: usize = 3;
pub const RELATED_POSTS: usize = 3;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error(transparent)]
    Invalid(#[from] DraftError),

    #[error("blog post not found: {0}")]
    NotFound(String),

    #[error("slug '{0}' is already in use")]
    SlugTaken(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for BlogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => BlogError::NotFound(what),
            other => BlogError::Storage(other),
        }
    }
}

pub struct BlogService {
    store: Arc<dyn RecordStore>,
}

impl BlogService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn newest(&self, filter: &RecordFilter, limit: Option<usize>) -> Result<Vec<BlogPost>, BlogError> {
        let records = self
            .store
            .find(Collection::BlogPosts, filter, SortOrder::NewestFirst, limit)
            .await?;
        Ok(records.into_iter().filter_map(Record::into_blog_post).collect())
    }

    /// All posts, newest first, optionally narrowed to those whose title or
    /// excerpt contains `search_term` (case-insensitive).
    pub async fn list(&self, search_term: Option<&str>) -> Result<Vec<BlogPost>, BlogError> {
        let posts = self.newest(&RecordFilter::all(), None).await?;
        let term = search_term.map(|t| t.trim().to_lowercase()).unwrap_or_default();
        if term.is_empty() {
            return Ok(posts);
        }
        Ok(posts
            .into_iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&term) || p.excerpt.to_lowercase().contains(&term)
            })
            .collect())
    }

    pub async fn recent(&self) -> Result<Vec<BlogPost>, BlogError> {
        self.newest(&RecordFilter::all(), Some(RECENT_POSTS)).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<BlogPost, BlogError> {
        self.newest(&RecordFilter::with_slug(slug), Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BlogError::NotFound(slug.to_string()))
    }

    async fn get_by_id(&self, id: &str) -> Result<BlogPost, BlogError> {
        self.newest(&RecordFilter::with_id(id), Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BlogError::NotFound(id.to_string()))
    }

    /// Newest posts other than the one at `slug`.
    pub async fn related(&self, slug: &str) -> Result<Vec<BlogPost>, BlogError> {
        let post = self.get_by_slug(slug).await?;
        self.newest(&RecordFilter::all().excluding(post.id), Some(RELATED_POSTS))
            .await
    }

    pub async fn create(&self, draft: &BlogDraft, now: DateTime<Utc>) -> Result<BlogPost, BlogError> {
        let post = new_post(draft, now)?;
        self.store
            .insert(&Record::BlogPost(post.clone()))
            .await
            .map_err(|e| slug_conflict(e, &post.slug))?;
        tracing::info!(id = %post.id, slug = %post.slug, "blog post created");
        Ok(post)
    }

    pub async fn update(
        &self,
        id: &str,
        draft: &BlogDraft,
        now: DateTime<Utc>,
    ) -> Result<BlogPost, BlogError> {
        let existing = self.get_by_id(id).await?;
        let post = edit_post(&existing, draft, now)?;
        self.store
            .replace(&Record::BlogPost(post.clone()))
            .await
            .map_err(|e| slug_conflict(e, &post.slug))?;
        tracing::info!(id = %post.id, slug = %post.slug, "blog post updated");
        Ok(post)
    }

    pub async fn delete(&self, id: &str) -> Result<(), BlogError> {
        let removed = self
            .store
            .delete(Collection::BlogPosts, &RecordFilter::with_id(id))
            .await?;
        if removed == 0 {
            return Err(BlogError::NotFound(id.to_string()));
        }
        tracing::info!(%id, "blog post deleted");
        Ok(())
    }

    /// Insert the three introductory posts when the blog is empty.
    ///
    /// Returns how many posts were inserted.
    pub async fn seed_samples(&self, now: DateTime<Utc>) -> Result<usize, BlogError> {
        if self
            .store
            .count(Collection::BlogPosts, &RecordFilter::all())
            .await?
            > 0
        {
            return Ok(0);
        }
        let samples = sample_drafts();
        for (age_days, draft) in samples.iter().enumerate() {
            self.create(draft, now - Duration::days(age_days as i64)).await?;
        }
        Ok(samples.len())
    }
}

fn slug_conflict(e: StoreError, slug: &str) -> BlogError {
    match e {
        StoreError::Conflict(_) => BlogError::SlugTaken(slug.to_string()),
        other => other.into(),
    }
}

fn sample_drafts() -> Vec<BlogDraft> {
    let draft = |title: &str, content: &str| BlogDraft {
        title: title.to_string(),
        content: content.to_string(),
        ..Default::default()
    };
    vec![
        draft(
            "Understanding Domain Authority",
            "<p>Domain Authority (DA) is a search engine ranking score that predicts how likely a website is to rank in search engine result pages (SERPs).</p>",
        ),
        draft(
            "How to Improve Your Website's SEO",
            "<p>Improving your website's SEO involves multiple strategies including quality content, good technical structure, and backlink building.</p>",
        ),
        draft(
            "The Importance of Backlinks",
            "<p>Backlinks are a crucial factor in determining a website's authority and ranking in search results.</p>",
        ),
    ]
}
