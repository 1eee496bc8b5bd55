//! Proxy Subs - Subscription Fetcher and Config Store
//!
//! Fetches proxy subscription lists, decodes the share links they contain
//! and keeps every config in a local SQLite database.
//! Multiple subscriptions are fetched concurrently.

pub mod config;
pub mod database;
pub mod error;
pub mod link;
pub mod models;
pub mod subscription;

pub use config::{FetchConfig, SourceSelector};
pub use error::{Error, Result};
pub use models::*;
pub use subscription::*;

/// Default database file path
pub const DEFAULT_DATABASE: &str = "subs.db";
