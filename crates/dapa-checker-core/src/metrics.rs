//! Metrics source abstraction.
//!
//! A [`MetricsSource`] turns a hostname into [`SiteMetrics`]. The only
//! implementation shipped here is [`RandomMetrics`], a pseudo-random
//! generator standing in for a real authority API. It draws fresh values
//! on every call; nothing about it is reproducible.

use async_trait::async_trait;
use rand::Rng;

use crate::models::{SiteMetrics, AUTHORITY_MAX, SPAM_SCORE_MAX};

/// Exclusive upper bound for generated backlink counts.
pub const BACKLINKS_CEILING: u64 = 10_000;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch metrics for `domain`. The error string is for logs only.
    async fn fetch(&self, domain: &str) -> Result<SiteMetrics, String>;

    fn name(&self) -> &str;
}

/// Uniform pseudo-random metrics within the documented ranges.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMetrics;

impl RandomMetrics {
    pub fn generate() -> SiteMetrics {
        let mut rng = rand::thread_rng();
        SiteMetrics {
            domain_authority: rng.gen_range(0..=AUTHORITY_MAX),
            page_authority: rng.gen_range(0..=AUTHORITY_MAX),
            spam_score: rng.gen_range(0..=SPAM_SCORE_MAX),
            backlinks: rng.gen_range(0..BACKLINKS_CEILING),
        }
    }
}

#[async_trait]
impl MetricsSource for RandomMetrics {
    async fn fetch(&self, _domain: &str) -> Result<SiteMetrics, String> {
        Ok(Self::generate())
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_values_stay_in_range() {
        for _ in 0..500 {
            let m = RandomMetrics::generate();
            assert!(m.in_range(), "{:?}", m);
            assert!(m.backlinks < BACKLINKS_CEILING);
        }
    }

    #[tokio::test]
    async fn test_fetch_draws_fresh_values() {
        let source = RandomMetrics;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            seen.insert(source.fetch("example.com").await.unwrap());
        }
        assert!(seen.len() > 1);
    }
}
