//! # DA/PA Checker Core
//!
//! Shared, runtime-agnostic logic for the DA/PA Checker: data models,
//! URL validation, the record store abstraction, the daily quota policy,
//! the metrics source trait, and blog slug helpers.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! The retrieval workflow that bounds collaborator calls with timeouts
//! lives in the `dapa-checker` crate on top of these pieces.

pub mod blog;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod models;
pub mod quota;
pub mod store;
pub mod url;

pub use error::CheckError;
pub use models::{Identity, SearchRecord, SiteMetrics};
pub use store::{RecordStore, StoreError};
