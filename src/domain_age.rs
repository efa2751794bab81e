//! Domain-age lookup collaborator.
//!
//! Domain age is best-effort enrichment: the workflow substitutes
//! `"Unknown"` whenever a lookup fails, times out, or finds nothing.
//!
//! # Providers
//!
//! | Provider | Behavior |
//! |----------|----------|
//! | `rdap` | `GET {base_url}/domain/{domain}`, reads the `registration` event |
//! | `mock` | `"N years"` with N drawn from 1..=20 |
//! | `disabled` | always not-found |
//!
//! Use [`create_domain_age`] to build the provider named in the config.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::Deserialize;

use crate::config::DomainAgeConfig;

#[async_trait]
pub trait DomainAgeLookup: Send + Sync {
    /// Human-readable age of `domain`, or `None` when it is not known.
    async fn lookup(&self, domain: &str) -> Result<Option<String>>;

    fn name(&self) -> &str;
}

/// Build the provider selected by `[domain_age].provider`.
pub fn create_domain_age(config: &DomainAgeConfig) -> Result<Box<dyn DomainAgeLookup>> {
    match config.provider.as_str() {
        "rdap" => Ok(Box::new(RdapDomainAge::new(config)?)),
        "mock" => Ok(Box::new(MockDomainAge)),
        "disabled" => Ok(Box::new(DisabledDomainAge)),
        other => bail!("Unknown domain_age provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledDomainAge;

#[async_trait]
impl DomainAgeLookup for DisabledDomainAge {
    async fn lookup(&self, _domain: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

// ============ Mock ============

/// Random whole-year ages, for demos without network access.
pub struct MockDomainAge;

#[async_trait]
impl DomainAgeLookup for MockDomainAge {
    async fn lookup(&self, _domain: &str) -> Result<Option<String>> {
        let years = rand::thread_rng().gen_range(1..=20u32);
        Ok(Some(plural(years, "year")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============ RDAP ============

/// Registration-date lookup over RDAP (the JSON successor to WHOIS).
pub struct RdapDomainAge {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate")]
    date: String,
}

impl RdapDomainAge {
    pub fn new(config: &DomainAgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DomainAgeLookup for RdapDomainAge {
    async fn lookup(&self, domain: &str) -> Result<Option<String>> {
        let url = format!("{}/domain/{}", self.base_url, domain);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/rdap+json")
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            bail!("RDAP lookup for {} returned {}", domain, resp.status());
        }

        let body: RdapDomain = resp.json().await?;
        let registered = body
            .events
            .iter()
            .find(|e| e.action.eq_ignore_ascii_case("registration"))
            .and_then(|e| DateTime::parse_from_rfc3339(&e.date).ok());

        Ok(registered.map(|at| format_age(at.date_naive(), Utc::now().date_naive())))
    }

    fn name(&self) -> &str {
        "rdap"
    }
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Render the time between `registered` and `today` in its largest whole
/// unit: years, then months, then days.
pub fn format_age(registered: NaiveDate, today: NaiveDate) -> String {
    if registered >= today {
        return plural(0, "day");
    }
    let mut months = (today.year() - registered.year()) * 12
        + (today.month() as i32 - registered.month() as i32);
    if today.day() < registered.day() {
        months -= 1;
    }
    let months = months.max(0) as u32;
    if months >= 12 {
        plural(months / 12, "year")
    } else if months >= 1 {
        plural(months, "month")
    } else {
        let days = (today - registered).num_days().max(0) as u32;
        plural(days, "day")
    }
}
