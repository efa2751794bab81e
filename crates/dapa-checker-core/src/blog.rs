//! Blog post helpers: slug derivation, default excerpts, and turning a
//! [`BlogDraft`] into a [`BlogPost`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BlogDraft, BlogPost};

pub const EXCERPT_CHARS: usize = 150;
pub const DEFAULT_AUTHOR: &str = "Admin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("slug '{0}' has no URL-safe characters")]
    EmptySlug(String),
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn collapse_whitespace(kept: &str) -> String {
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Derive a slug from a title: lowercase, drop everything that is not a
/// word character or whitespace, join words with `-`.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| is_word(*c) || c.is_whitespace())
        .collect();
    collapse_whitespace(&kept)
}

/// Clean a user-supplied slug. Like [`slugify`] but keeps hyphens.
pub fn sanitize_slug(input: &str) -> String {
    let kept: String = input
        .to_lowercase()
        .chars()
        .filter(|c| is_word(*c) || c.is_whitespace() || *c == '-')
        .collect();
    collapse_whitespace(&kept)
}

/// The first 150 characters of the title followed by an ellipsis.
pub fn default_excerpt(title: &str) -> String {
    let head: String = title.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head)
}

fn resolve_fields(draft: &BlogDraft) -> Result<(String, String, String), DraftError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(DraftError::MissingField("title"));
    }
    if draft.content.trim().is_empty() {
        return Err(DraftError::MissingField("content"));
    }

    let slug = match draft.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => sanitize_slug(s),
        _ => slugify(title),
    };
    if slug.is_empty() {
        return Err(DraftError::EmptySlug(
            draft.slug.clone().unwrap_or_else(|| title.to_string()),
        ));
    }

    let excerpt = match draft.excerpt.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => e.to_string(),
        _ => default_excerpt(title),
    };
    Ok((title.to_string(), slug, excerpt))
}

/// Build a new post from a draft.
pub fn new_post(draft: &BlogDraft, now: DateTime<Utc>) -> Result<BlogPost, DraftError> {
    let (title, slug, excerpt) = resolve_fields(draft)?;
    Ok(BlogPost {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        slug,
        content: draft.content.clone(),
        excerpt,
        author: draft
            .author
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        created_at: now,
        updated_at: now,
    })
}

/// Apply a draft to an existing post, keeping its id, author, and
/// creation time unless the draft overrides the author.
pub fn edit_post(
    existing: &BlogPost,
    draft: &BlogDraft,
    now: DateTime<Utc>,
) -> Result<BlogPost, DraftError> {
    let (title, slug, excerpt) = resolve_fields(draft)?;
    Ok(BlogPost {
        id: existing.id.clone(),
        title,
        slug,
        content: draft.content.clone(),
        excerpt,
        author: draft
            .author
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| existing.author.clone()),
        created_at: existing.created_at,
        updated_at: now,
    })
}
