//! Core data models used throughout the DA/PA Checker.
//!
//! Three record kinds are persisted: [`SearchRecord`] (one metrics
//! lookup), [`UserProfile`] (created on first sight of an identity), and
//! [`BlogPost`]. Search records and profiles are immutable once written.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound (inclusive) for domain and page authority.
pub const AUTHORITY_MAX: u8 = 100;
/// Upper bound (inclusive) for the spam score.
pub const SPAM_SCORE_MAX: u8 = 15;
/// Identity string that owns persisted anonymous searches.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";
/// Domain age reported when the lookup fails or finds nothing.
pub const UNKNOWN_DOMAIN_AGE: &str = "Unknown";

/// Opaque token identifying an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The sentinel that owns anonymous searches when they are tracked.
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_IDENTITY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_IDENTITY
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The four numeric metrics produced by a metrics source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub domain_authority: u8,
    pub page_authority: u8,
    pub spam_score: u8,
    pub backlinks: u64,
}

impl SiteMetrics {
    /// Returns `true` when every value lies inside its documented range.
    pub fn in_range(&self) -> bool {
        self.domain_authority <= AUTHORITY_MAX
            && self.page_authority <= AUTHORITY_MAX
            && self.spam_score <= SPAM_SCORE_MAX
    }
}

/// Immutable record of one metrics lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    pub identity: Identity,
    /// Lowercased hostname, scheme and path stripped.
    pub domain: String,
    /// Original scheme-qualified input.
    pub url: String,
    pub domain_authority: u8,
    pub page_authority: u8,
    pub spam_score: u8,
    pub backlinks: u64,
    /// Free-text duration such as "3 years". Not parseable in general.
    pub domain_age: String,
    pub check_timestamp: DateTime<Utc>,
}

impl SearchRecord {
    pub fn new(
        identity: Identity,
        domain: String,
        url: String,
        metrics: SiteMetrics,
        domain_age: String,
        check_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity,
            domain,
            url,
            domain_authority: metrics.domain_authority,
            page_authority: metrics.page_authority,
            spam_score: metrics.spam_score,
            backlinks: metrics.backlinks,
            domain_age,
            check_timestamp,
        }
    }
}

/// Profile row created the first time an authenticated identity is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Identity,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A published blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    /// URL-safe, unique across all posts.
    pub slug: String,
    /// Rich text (HTML).
    pub content: String,
    pub excerpt: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or editing a blog post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Logical collection names in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    SearchHistory,
    Profiles,
    BlogPosts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::SearchHistory => "search_history",
            Collection::Profiles => "profiles",
            Collection::BlogPosts => "blog_posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any record the store can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Search(SearchRecord),
    Profile(UserProfile),
    BlogPost(BlogPost),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Search(_) => Collection::SearchHistory,
            Record::Profile(_) => Collection::Profiles,
            Record::BlogPost(_) => Collection::BlogPosts,
        }
    }

    /// Creation timestamp, the sort key for every collection.
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Search(r) => r.check_timestamp,
            Record::Profile(p) => p.created_at,
            Record::BlogPost(b) => b.created_at,
        }
    }

    pub fn into_search(self) -> Option<SearchRecord> {
        match self {
            Record::Search(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_profile(self) -> Option<UserProfile> {
        match self {
            Record::Profile(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_blog_post(self) -> Option<BlogPost> {
        match self {
            Record::BlogPost(b) => Some(b),
            _ => None,
        }
    }
}
