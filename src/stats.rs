//! Admin overview.
//!
//! Totals per collection plus the most recent searches and profiles. The
//! HTTP server returns [`Overview`] from `GET /admin/overview`, and
//! `dapa stats` prints it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use dapa_checker_core::models::{Collection, Record, SearchRecord, UserProfile};
use dapa_checker_core::store::{RecordFilter, RecordStore, SortOrder, StoreError};

use crate::app::App;
use crate::profiles::recent_profiles;

/// Rows shown in each "recent" list.
pub const RECENT_ROWS: usize = 10;

#[derive(Debug, Serialize)]
pub struct Totals {
    pub searches: u64,
    pub profiles: u64,
    pub blog_posts: u64,
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub totals: Totals,
    pub recent_searches: Vec<SearchRecord>,
    pub recent_profiles: Vec<UserProfile>,
}

pub async fn overview(store: &dyn RecordStore) -> Result<Overview, StoreError> {
    let all = RecordFilter::all();
    let totals = Totals {
        searches: store.count(Collection::SearchHistory, &all).await?,
        profiles: store.count(Collection::Profiles, &all).await?,
        blog_posts: store.count(Collection::BlogPosts, &all).await?,
    };

    let recent_searches = store
        .find(
            Collection::SearchHistory,
            &all,
            SortOrder::NewestFirst,
            Some(RECENT_ROWS),
        )
        .await?
        .into_iter()
        .filter_map(Record::into_search)
        .collect();

    Ok(Overview {
        totals,
        recent_searches,
        recent_profiles: recent_profiles(store, RECENT_ROWS).await?,
    })
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(app: &App) -> Result<()> {
    let o = overview(app.store.as_ref()).await?;

    println!("DA/PA Checker — Overview");
    println!("========================");
    println!();
    println!("  Backend:     {}", app.config.db.backend);
    if app.config.db.backend == "sqlite" {
        let db_size = std::fs::metadata(&app.config.db.path)
            .map(|m| m.len())
            .unwrap_or(0);
        println!("  Database:    {}", app.config.db.path.display());
        println!("  Size:        {}", format_bytes(db_size));
    }
    println!();
    println!("  Searches:    {}", o.totals.searches);
    println!("  Profiles:    {}", o.totals.profiles);
    println!("  Blog posts:  {}", o.totals.blog_posts);

    if !o.recent_searches.is_empty() {
        println!();
        println!("  Recent searches:");
        println!(
            "  {:<28} {:<20} {:>4} {:>4} {:>5}   {}",
            "DOMAIN", "USER", "DA", "PA", "SPAM", "WHEN"
        );
        println!("  {}", "-".repeat(80));
        for s in &o.recent_searches {
            println!(
                "  {:<28} {:<20} {:>4} {:>4} {:>5}   {}",
                truncate(&s.domain, 28),
                truncate(s.identity.as_str(), 20),
                s.domain_authority,
                s.page_authority,
                s.spam_score,
                format_relative(s.check_timestamp, Utc::now())
            );
        }
    }

    if !o.recent_profiles.is_empty() {
        println!();
        println!("  Recent profiles:");
        for p in &o.recent_profiles {
            println!(
                "  {:<28} {:<32} {}",
                truncate(p.id.as_str(), 28),
                truncate(&p.email, 32),
                format_relative(p.created_at, Utc::now())
            );
        }
    }

    println!();
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - at).num_seconds();
    if delta < 0 {
        return at.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dapa_checker_core::models::{Identity, SiteMetrics};
    use dapa_checker_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_overview_caps_recent_lists() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for i in 0..12 {
            let rec = SearchRecord::new(
                Identity::new("u1"),
                format!("site{}.com", i),
                format!("https://site{}.com", i),
                SiteMetrics {
                    domain_authority: 1,
                    page_authority: 1,
                    spam_score: 1,
                    backlinks: 1,
                },
                "Unknown".to_string(),
                base + Duration::seconds(i),
            );
            store.insert(&Record::Search(rec)).await.unwrap();
        }

        let o = overview(&store).await.unwrap();
        assert_eq!(o.totals.searches, 12);
        assert_eq!(o.totals.profiles, 0);
        assert_eq!(o.recent_searches.len(), RECENT_ROWS);
        assert_eq!(o.recent_searches[0].domain, "site11.com");
    }

    #[test]
    fn test_format_relative() {
        let now = Utc::now();
        assert_eq!(format_relative(now, now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1), now), "1 min ago");
        assert_eq!(format_relative(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2 days ago");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
