//! Wiring: turns a [`Config`] into the services the CLI and server share.

use std::sync::Arc;

use anyhow::Result;
use dapa_checker_core::metrics::{MetricsSource, RandomMetrics};
use dapa_checker_core::store::memory::InMemoryStore;
use dapa_checker_core::store::RecordStore;

use crate::blog::BlogService;
use crate::checker::Checker;
use crate::config::Config;
use crate::db;
use crate::domain_age::{create_domain_age, DomainAgeLookup};
use crate::identity::{ConfiguredIdentities, IdentityProvider};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Shared service handles. Cheap to clone.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub checker: Arc<Checker>,
    pub blog: Arc<BlogService>,
    pub identities: Arc<dyn IdentityProvider>,
}

impl App {
    /// Open the configured store (running migrations for SQLite) and build
    /// every service on top of it.
    pub async fn build(config: &Config) -> Result<Self> {
        let store = open_store(config).await?;
        let domain_age: Arc<dyn DomainAgeLookup> = Arc::from(create_domain_age(&config.domain_age)?);
        Ok(Self::with_parts(
            config,
            store,
            Arc::new(RandomMetrics),
            domain_age,
        ))
    }

    /// Assemble from explicit collaborators. Used by tests to substitute
    /// the metrics source or domain-age lookup.
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn RecordStore>,
        metrics: Arc<dyn MetricsSource>,
        domain_age: Arc<dyn DomainAgeLookup>,
    ) -> Self {
        let checker = Checker::new(store.clone(), metrics, domain_age)
            .with_policy(config.checker.quota_policy())
            .with_history_limit(config.checker.history_limit)
            .with_timeout(config.checker.timeout());

        Self {
            config: config.clone(),
            store: store.clone(),
            checker: Arc::new(checker),
            blog: Arc::new(BlogService::new(store)),
            identities: Arc::new(ConfiguredIdentities::from_config(&config.auth)),
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    match config.db.backend.as_str() {
        "memory" => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let pool = db::connect(config).await?;
            migrate::apply(&pool).await?;
            tracing::info!(path = %config.db.path.display(), "using sqlite store");
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}
