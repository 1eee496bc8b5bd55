//! Subscription module for fetching and storing proxy configs
//!
//! This module provides functionality for:
//! - Retrieving subscription bodies over HTTP (plain or base64)
//! - Removing repeated links within one retrieval
//! - Fetching many subscriptions concurrently and persisting the results

pub mod dedupe;
pub mod fetcher;
pub mod retriever;

pub use dedupe::dedupe;
pub use fetcher::{parse_links, BatchResult, FetchOutcome, Source, SubscriptionFetcher};
pub use retriever::{decode_body, split_links, HttpRetriever, Retriever, RetrieverConfig};
