//! # DA/PA Checker
//!
//! Backend for a website-metrics checker: callers submit a URL and get
//! Domain Authority, Page Authority, Spam Score, backlinks, and domain age.
//! Identified callers are limited to a few searches per local day and
//! get a short history of their lookups. A small blog rides along.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌──────────────┐
//! │   CLI    │──▶│    Checker    │──▶│ RecordStore  │
//! │  (dapa)  │   │ quota → age → │   │ SQLite / mem │
//! └──────────┘   │   metrics     │   └──────────────┘
//! ┌──────────┐   └───────────────┘          ▲
//! │   HTTP   │──▶ BlogService / profiles ───┘
//! │  (axum)  │
//! └──────────┘
//! ```
//!
//! Data types, URL validation, the quota policy and the store trait live
//! in `dapa-checker-core`; this crate adds persistence, collaborators with
//! timeouts, and the outer surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! dapa init --seed
//! dapa check example.com --identity alice
//! dapa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Builds the shared services from config |
//! | [`checker`] | Metrics retrieval workflow and history |
//! | [`domain_age`] | Domain-age lookup (RDAP, mock, disabled) |
//! | [`identity`] | Bearer token → principal |
//! | [`profiles`] | Profile creation on first sight |
//! | [`blog`] | Blog service |
//! | [`stats`] | Admin overview |
//! | [`export`] | CSV / JSON history export |
//! | [`server`] | HTTP API |
//! | [`sqlite_store`] | SQLite `RecordStore` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod app;
pub mod blog;
pub mod checker;
pub mod config;
pub mod db;
pub mod domain_age;
pub mod export;
pub mod identity;
pub mod logging;
pub mod migrate;
pub mod profiles;
pub mod server;
pub mod sqlite_store;
pub mod stats;
