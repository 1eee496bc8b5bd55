//! Fetch run configuration

use crate::error::{Error, Result};
use std::path::PathBuf;
use url::Url;

/// Default number of concurrent source fetches
pub const DEFAULT_WORKERS: usize = 3;

/// Upper bound on concurrent source fetches
pub const MAX_WORKERS: usize = 20;

/// Which sources a fetch run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    /// One stored subscription
    ById(i64),
    /// One ad-hoc URL, not linked to a subscription
    ByUrl(String),
    /// Every enabled stored subscription
    AllEnabled,
    /// URLs listed one per line in a file, not linked to a subscription
    FromFile(PathBuf),
}

impl SourceSelector {
    /// Build a selector from mutually exclusive command-line flags
    pub fn from_flags(
        id: Option<i64>,
        url: Option<String>,
        all: bool,
        file: Option<PathBuf>,
    ) -> Result<Self> {
        let mut selected = Vec::with_capacity(1);
        if let Some(id) = id {
            selected.push(SourceSelector::ById(id));
        }
        if let Some(url) = url {
            selected.push(SourceSelector::ByUrl(url));
        }
        if all {
            selected.push(SourceSelector::AllEnabled);
        }
        if let Some(file) = file {
            selected.push(SourceSelector::FromFile(file));
        }

        match selected.len() {
            0 => Err(Error::Config(
                "one of --id, --url, --all, or --file must be provided".to_string(),
            )),
            1 => Ok(selected.remove(0)),
            _ => Err(Error::Config(
                "--id, --url, --all and --file are mutually exclusive".to_string(),
            )),
        }
    }
}

/// Configuration for a fetch run, built once and handed to the fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub selector: SourceSelector,
    /// Overrides every source's stored user agent
    pub user_agent: Option<String>,
    /// Outbound proxy URL used for every request
    pub proxy: Option<String>,
    /// Upper bound on concurrent fetches, in `1..=MAX_WORKERS`
    pub workers: usize,
    /// File receiving every persisted link
    pub output: Option<PathBuf>,
    /// Report duplicate counts at info level
    pub verbose: bool,
}

impl FetchConfig {
    pub fn new(selector: SourceSelector) -> Self {
        Self {
            selector,
            user_agent: None,
            proxy: None,
            workers: DEFAULT_WORKERS,
            output: None,
            verbose: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent.filter(|ua| !ua.is_empty());
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check option ranges before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 {
            return Err(Error::Config(format!(
                "--workers must be at least 1, got {}",
                self.workers
            )));
        }
        if self.workers > MAX_WORKERS {
            return Err(Error::Config(format!(
                "--workers must be at most {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if let Some(proxy) = &self.proxy {
            Url::parse(proxy)
                .map_err(|e| Error::Config(format!("invalid proxy URL {:?}: {}", proxy, e)))?;
        }
        if let SourceSelector::ById(id) = self.selector {
            if id <= 0 {
                return Err(Error::Config(format!("invalid subscription id {}", id)));
            }
        }
        Ok(())
    }

    /// Worker count for `sources` sources, never above the source count
    pub fn effective_workers(&self, sources: usize) -> usize {
        self.workers.min(sources).max(1)
    }
}
