//! Fetch orchestrator driving retrieval, decoding and persistence
//!
//! Multi-source runs fan out over a bounded number of concurrent fetches.
//! Every source yields exactly one [`FetchOutcome`]; the outcomes are folded
//! into a [`BatchResult`] once all of them have completed.

use crate::config::{FetchConfig, SourceSelector};
use crate::database::SubscriptionStore;
use crate::error::{Error, Result};
use crate::link;
use crate::models::{NewSubscriptionConfig, Subscription};
use crate::subscription::dedupe::dedupe;
use crate::subscription::retriever::{split_links, Retriever};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// One subscription or ad-hoc URL to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    /// Stored user agent, used when no global override is set
    pub user_agent: Option<String>,
    /// Owning subscription for the resulting configs
    pub subscription_id: Option<i64>,
    /// Name used in progress messages
    pub label: String,
}

impl Source {
    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self {
            url: subscription.url.clone(),
            user_agent: subscription.user_agent.clone().filter(|ua| !ua.is_empty()),
            subscription_id: Some(subscription.id),
            label: subscription.display_name(),
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            user_agent: None,
            subscription_id: None,
            label: url.to_string(),
        }
    }
}

/// Result of fetching a single source
#[derive(Debug)]
pub struct FetchOutcome {
    pub source: Source,
    /// Configs that were persisted for this source
    pub configs: Vec<NewSubscriptionConfig>,
    /// Links retrieved before deduplication and decoding
    pub raw_count: usize,
    pub error: Option<Error>,
}

impl FetchOutcome {
    pub fn success(source: Source, raw_count: usize, configs: Vec<NewSubscriptionConfig>) -> Self {
        Self {
            source,
            configs,
            raw_count,
            error: None,
        }
    }

    pub fn failure(source: Source, raw_count: usize, error: Error) -> Self {
        Self {
            source,
            configs: Vec::new(),
            raw_count,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate over every source of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub sources: usize,
    pub raw_links: usize,
    pub persisted_configs: usize,
    pub failed: usize,
    /// Raw text of every persisted link, in aggregation order
    pub links: Vec<String>,
}

impl BatchResult {
    /// Fold one outcome into the totals
    pub fn record(&mut self, outcome: FetchOutcome) {
        self.sources += 1;
        if outcome.is_success() {
            self.raw_links += outcome.raw_count;
            self.persisted_configs += outcome.configs.len();
            self.links
                .extend(outcome.configs.into_iter().map(|c| c.config_link));
        } else {
            self.failed += 1;
        }
    }

    pub fn succeeded(&self) -> usize {
        self.sources - self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Fail if any source failed; persisted data is kept either way
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::BatchFailed {
                failed: self.failed,
                total: self.sources,
            })
        }
    }
}

impl FromIterator<FetchOutcome> for BatchResult {
    fn from_iter<I: IntoIterator<Item = FetchOutcome>>(outcomes: I) -> Self {
        let mut batch = BatchResult::default();
        for outcome in outcomes {
            batch.record(outcome);
        }
        batch
    }
}

/// Orchestrates one fetch run described by a [`FetchConfig`]
pub struct SubscriptionFetcher {
    config: FetchConfig,
    store: Arc<dyn SubscriptionStore>,
    retriever: Arc<dyn Retriever>,
}

impl SubscriptionFetcher {
    /// Create a fetcher, rejecting invalid configuration up front
    pub fn new(
        config: FetchConfig,
        store: Arc<dyn SubscriptionStore>,
        retriever: Arc<dyn Retriever>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            retriever,
        })
    }

    /// Run the configured mode.
    ///
    /// Single-source modes return their failure as the error. Multi-source
    /// modes always return the batch; use [`BatchResult::ensure_success`] to
    /// turn failed sources into an error.
    pub async fn run(&self) -> Result<BatchResult> {
        let span = tracing::info_span!("fetch_run", run_id = %Uuid::new_v4());

        async {
            match &self.config.selector {
                SourceSelector::ById(id) => {
                    let subscription = self.store.get_subscription(*id).await?;
                    tracing::info!(
                        "Fetching from DB subscription ID {}: {}",
                        subscription.id,
                        subscription.url
                    );
                    self.run_single(Source::from_subscription(&subscription)).await
                }
                SourceSelector::ByUrl(url) => {
                    tracing::info!("Fetching from URL: {}", url);
                    tracing::warn!("One-off fetch: configs will not be linked to any subscription");
                    self.run_single(Source::from_url(url)).await
                }
                SourceSelector::AllEnabled => {
                    let enabled: Vec<Source> = self
                        .store
                        .list_subscriptions()
                        .await?
                        .iter()
                        .filter(|s| s.enabled)
                        .map(Source::from_subscription)
                        .collect();

                    if enabled.is_empty() {
                        tracing::warn!("No enabled subscriptions found in the database");
                        return Ok(BatchResult::default());
                    }
                    self.run_many(enabled).await
                }
                SourceSelector::FromFile(path) => {
                    let sources = read_url_file(path)?;
                    tracing::info!("Found {} URL(s) in {:?}", sources.len(), path);
                    self.run_many(sources).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_single(&self, source: Source) -> Result<BatchResult> {
        let mut outcome = self.fetch_source(&source).await;
        if let Some(error) = outcome.error.take() {
            return Err(error);
        }

        let batch: BatchResult = std::iter::once(outcome).collect();
        self.finish(&batch)?;
        Ok(batch)
    }

    async fn run_many(&self, sources: Vec<Source>) -> Result<BatchResult> {
        let total = sources.len();
        let workers = self.config.effective_workers(total);
        tracing::info!("Fetching from {} source(s) with {} worker(s)", total, workers);

        let started = AtomicUsize::new(0);
        let batch: BatchResult = stream::iter(sources)
            .map(|source| {
                let started = &started;
                async move {
                    let index = started.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!("[{}/{}] Fetching {:?} ({})", index, total, source.label, source.url);
                    self.fetch_source(&source).await
                }
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        self.finish(&batch)?;
        Ok(batch)
    }

    /// Fetch, decode and persist one source. Never fails the caller; errors
    /// are carried in the outcome.
    pub async fn fetch_source(&self, source: &Source) -> FetchOutcome {
        let user_agent = self
            .config
            .user_agent
            .as_deref()
            .or(source.user_agent.as_deref());

        let links = match self
            .retriever
            .fetch(&source.url, user_agent, self.config.proxy.as_deref())
            .await
        {
            Ok(links) => links,
            Err(e) => {
                tracing::error!("Failed to fetch {} ({}): {}", source.label, source.url, e);
                return FetchOutcome::failure(source.clone(), 0, e);
            }
        };

        let raw_count = links.len();
        let configs = parse_links(
            &dedupe(links, self.config.verbose),
            source.subscription_id,
            Utc::now(),
        );

        if configs.is_empty() {
            tracing::warn!("{}: no valid configs found", source.label);
        } else if let Err(e) = self.store.upsert_configs(&configs).await {
            tracing::error!("Failed to save configs for {}: {}", source.label, e);
            return FetchOutcome::failure(source.clone(), raw_count, e);
        }

        if let Some(id) = source.subscription_id {
            if let Err(e) = self.store.update_subscription_fetched_at(id, Utc::now()).await {
                tracing::warn!("Failed to update last fetched timestamp for {}: {}", id, e);
            }
        }

        tracing::info!(
            "{}: fetched {} links, saved {} configs ({} decoded)",
            source.label,
            raw_count,
            configs.len(),
            configs.iter().filter(|c| c.is_decoded()).count()
        );
        FetchOutcome::success(source.clone(), raw_count, configs)
    }

    fn finish(&self, batch: &BatchResult) -> Result<()> {
        tracing::info!(
            "All done: {} links fetched, {} configs saved, {} failed",
            batch.raw_links,
            batch.persisted_configs,
            batch.failed
        );

        if let Some(path) = &self.config.output {
            if batch.persisted_configs > 0 {
                save_links_to_file(&batch.links, path)?;
                tracing::info!("{} configs have been written into {:?}", batch.links.len(), path);
            }
        }
        Ok(())
    }
}

/// Decode every link into an upsert candidate.
///
/// Links that fail to decode are kept with protocol and remark absent.
pub fn parse_links(
    links: &[String],
    subscription_id: Option<i64>,
    seen_at: DateTime<Utc>,
) -> Vec<NewSubscriptionConfig> {
    links
        .iter()
        .map(|raw| {
            let mut config = NewSubscriptionConfig::new(raw.clone(), subscription_id, seen_at);
            match link::decode(raw) {
                Ok(summary) => {
                    config.protocol = Some(summary.protocol.to_string());
                    config.remark = Some(summary.remark).filter(|r| !r.is_empty());
                }
                Err(e) => tracing::debug!("keeping undecodable link: {}", e),
            }
            config
        })
        .collect()
}

/// Read a URL list, one per line, blank lines ignored
pub fn read_url_file(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)?;
    let sources: Vec<Source> = split_links(&content)
        .iter()
        .map(|url| Source::from_url(url))
        .collect();

    if sources.is_empty() {
        return Err(Error::Config(format!("no URLs found in file {:?}", path)));
    }
    Ok(sources)
}

/// Write links one per line with a trailing newline
pub fn save_links_to_file<P: AsRef<Path>>(links: &[String], path: P) -> Result<()> {
    let mut content = links.join("\n");
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SubscriptionDatabase;
    use crate::subscription::retriever::decode_body;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    /// One recorded `fetch` call
    #[derive(Debug, Clone)]
    struct Call {
        url: String,
        user_agent: Option<String>,
        proxy: Option<String>,
    }

    /// Serves canned bodies or HTTP statuses per URL
    #[derive(Default)]
    struct FakeRetriever {
        responses: HashMap<String, std::result::Result<String, u16>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeRetriever {
        fn with_body(mut self, url: &str, body: &str) -> Self {
            self.responses.insert(url.to_string(), Ok(body.to_string()));
            self
        }

        fn with_status(mut self, url: &str, status: u16) -> Self {
            self.responses.insert(url.to_string(), Err(status));
            self
        }

        fn user_agent_for(&self, url: &str) -> Option<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|call| call.url == url)
                .and_then(|call| call.user_agent.clone())
        }

        fn proxies(&self) -> Vec<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|call| call.proxy.clone())
                .collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn fetch(
            &self,
            url: &str,
            user_agent: Option<&str>,
            proxy: Option<&str>,
        ) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(Call {
                url: url.to_string(),
                user_agent: user_agent.map(String::from),
                proxy: proxy.map(String::from),
            });
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(split_links(&decode_body(body))),
                Some(Err(status)) => Err(Error::RemoteStatus {
                    url: url.to_string(),
                    status: *status,
                }),
                None => Err(Error::RemoteStatus {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    /// Store whose upsert fails for batches containing `poisoned`
    struct PoisonedStore {
        inner: SubscriptionDatabase,
        poisoned: String,
    }

    #[async_trait]
    impl SubscriptionStore for PoisonedStore {
        async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
            self.inner.list_subscriptions().await
        }

        async fn get_subscription(&self, id: i64) -> Result<Subscription> {
            self.inner.get_subscription(id).await
        }

        async fn upsert_configs(&self, configs: &[NewSubscriptionConfig]) -> Result<()> {
            if configs.iter().any(|c| c.config_link == self.poisoned) {
                return Err(Error::Store(sqlx::Error::PoolClosed));
            }
            self.inner.upsert_configs(configs).await
        }

        async fn update_subscription_fetched_at(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
            self.inner.update_subscription_fetched_at(id, at).await
        }
    }

    fn sub_url(i: usize) -> String {
        format!("https://sub{}.example/list", i)
    }

    fn fetcher(
        config: FetchConfig,
        db: &SubscriptionDatabase,
        retriever: &Arc<FakeRetriever>,
    ) -> SubscriptionFetcher {
        SubscriptionFetcher::new(config, Arc::new(db.clone()), retriever.clone()).unwrap()
    }

    #[test]
    fn test_parse_links_keeps_undecodable_links() {
        let links = vec![
            "vless://u@h:443?type=tcp#A".to_string(),
            "vmess://x".to_string(),
            "garbage".to_string(),
        ];
        let configs = parse_links(&links, Some(4), Utc::now());

        assert_eq!(configs.len(), 3);
        assert_eq!(configs[0].protocol.as_deref(), Some("vless"));
        assert_eq!(configs[0].remark.as_deref(), Some("A"));
        assert!(configs[1].protocol.is_none() && configs[1].remark.is_none());
        assert!(configs[2].protocol.is_none());
        assert!(configs.iter().all(|c| c.subscription_id == Some(4)));
    }

    #[test]
    fn test_batch_result_accumulates_outcomes() {
        let seen = Utc::now();
        let ok = FetchOutcome::success(
            Source::from_url("https://a"),
            3,
            parse_links(&["vless://u@h:1".to_string()], None, seen),
        );
        let failed = FetchOutcome::failure(
            Source::from_url("https://b"),
            0,
            Error::RemoteStatus {
                url: "https://b".into(),
                status: 500,
            },
        );

        let batch: BatchResult = vec![ok, failed].into_iter().collect();
        assert_eq!(batch.sources, 2);
        assert_eq!(batch.succeeded(), 1);
        assert_eq!(batch.raw_links, 3);
        assert_eq!(batch.persisted_configs, 1);
        assert!(matches!(
            batch.ensure_success(),
            Err(Error::BatchFailed { failed: 1, total: 2 })
        ));
    }

    #[tokio::test]
    async fn test_invalid_worker_count_rejected_before_fetching() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let retriever = Arc::new(FakeRetriever::default());
        let config = FetchConfig::new(SourceSelector::AllEnabled).with_workers(21);

        let result = SubscriptionFetcher::new(config, Arc::new(db), retriever.clone());
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn test_by_url_decodes_and_keeps_unknown_links() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let body = STANDARD.encode("vless://u@h:443?type=tcp#A\nvmess://x\n");
        let retriever = Arc::new(FakeRetriever::default().with_body(&sub_url(1), &body));

        let batch = fetcher(FetchConfig::new(SourceSelector::ByUrl(sub_url(1))), &db, &retriever)
            .run()
            .await
            .unwrap();

        assert_eq!(batch.raw_links, 2);
        assert_eq!(batch.persisted_configs, 2);
        let vless = db.get_config_by_link("vless://u@h:443?type=tcp#A").await.unwrap().unwrap();
        assert_eq!(vless.protocol.as_deref(), Some("vless"));
        assert!(vless.subscription_id.is_none());
        let vmess = db.get_config_by_link("vmess://x").await.unwrap().unwrap();
        assert!(vmess.protocol.is_none());
        assert!(vmess.remark.is_none());
    }

    #[tokio::test]
    async fn test_by_url_failure_is_the_run_error() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let retriever = Arc::new(FakeRetriever::default().with_status(&sub_url(1), 403));

        let err = fetcher(FetchConfig::new(SourceSelector::ByUrl(sub_url(1))), &db, &retriever)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_by_id_links_configs_and_updates_timestamp() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let id = db.add_subscription(&sub_url(1), Some("Main"), None).await.unwrap();
        let retriever = Arc::new(
            FakeRetriever::default().with_body(&sub_url(1), "trojan://pw@h:443#T\nss://bad\n"),
        );

        let batch = fetcher(FetchConfig::new(SourceSelector::ById(id)), &db, &retriever)
            .run()
            .await
            .unwrap();

        assert_eq!(batch.persisted_configs, 2);
        assert_eq!(db.count_subscription_configs(id).await.unwrap(), 2);
        assert!(db.get_subscription(id).await.unwrap().last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_by_id_missing_subscription() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let retriever = Arc::new(FakeRetriever::default());

        let err = fetcher(FetchConfig::new(SourceSelector::ById(7)), &db, &retriever)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(7)));
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn test_by_id_failed_fetch_leaves_timestamp_unset() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let id = db.add_subscription(&sub_url(1), None, None).await.unwrap();
        let retriever = Arc::new(FakeRetriever::default().with_status(&sub_url(1), 500));

        let result = fetcher(FetchConfig::new(SourceSelector::ById(id)), &db, &retriever)
            .run()
            .await;
        assert!(result.is_err());
        assert!(db.get_subscription(id).await.unwrap().last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_all_enabled_partial_failure() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let mut retriever = FakeRetriever::default();
        for i in 1..=5 {
            db.add_subscription(&sub_url(i), None, None).await.unwrap();
            retriever = if i == 2 {
                retriever.with_status(&sub_url(i), 404)
            } else {
                retriever.with_body(&sub_url(i), &format!("vless://u{}@h{}:443#S{}\n", i, i, i))
            };
        }
        let retriever = Arc::new(retriever);

        let config = FetchConfig::new(SourceSelector::AllEnabled).with_workers(3);
        let batch = fetcher(config, &db, &retriever).run().await.unwrap();

        assert_eq!(batch.sources, 5);
        assert_eq!(batch.succeeded(), 4);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.persisted_configs, 4);
        assert!(matches!(
            batch.ensure_success(),
            Err(Error::BatchFailed { failed: 1, total: 5 })
        ));
        assert_eq!(db.count_configs().await.unwrap(), 4);
        assert!(db.get_config_by_link("vless://u2@h2:443#S2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_enabled_skips_disabled_and_handles_none() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let id = db.add_subscription(&sub_url(1), None, None).await.unwrap();
        let update = crate::models::SubscriptionUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        db.update_subscription(id, &update).await.unwrap();
        let retriever = Arc::new(FakeRetriever::default());

        let batch = fetcher(FetchConfig::new(SourceSelector::AllEnabled), &db, &retriever)
            .run()
            .await
            .unwrap();

        assert_eq!(batch, BatchResult::default());
        assert!(batch.ensure_success().is_ok());
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn test_user_agent_override_precedence() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        db.add_subscription(&sub_url(1), None, Some("stored-ua")).await.unwrap();
        db.add_subscription(&sub_url(2), None, None).await.unwrap();
        let retriever = Arc::new(
            FakeRetriever::default()
                .with_body(&sub_url(1), "link-a\n")
                .with_body(&sub_url(2), "link-b\n"),
        );

        fetcher(FetchConfig::new(SourceSelector::AllEnabled), &db, &retriever)
            .run()
            .await
            .unwrap();
        assert_eq!(retriever.user_agent_for(&sub_url(1)).as_deref(), Some("stored-ua"));
        assert_eq!(retriever.user_agent_for(&sub_url(2)), None);

        let retriever = Arc::new(FakeRetriever::default().with_body(&sub_url(1), "link-a\n"));
        let config = FetchConfig::new(SourceSelector::AllEnabled)
            .with_user_agent(Some("override".to_string()));
        fetcher(config, &db, &retriever).run().await.unwrap();
        assert_eq!(retriever.user_agent_for(&sub_url(1)).as_deref(), Some("override"));
    }

    #[tokio::test]
    async fn test_proxy_reaches_every_source() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let mut retriever = FakeRetriever::default();
        for i in 1..=3 {
            db.add_subscription(&sub_url(i), None, None).await.unwrap();
            retriever = retriever.with_body(&sub_url(i), &format!("trojan://p{}@h:443#T\n", i));
        }
        let retriever = Arc::new(retriever);

        let config = FetchConfig::new(SourceSelector::AllEnabled)
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_workers(2);
        fetcher(config, &db, &retriever).run().await.unwrap();

        let proxies = retriever.proxies();
        assert_eq!(proxies.len(), 3);
        assert!(proxies
            .iter()
            .all(|p| p.as_deref() == Some("socks5://127.0.0.1:1080")));

        let retriever = Arc::new(FakeRetriever::default().with_body(&sub_url(1), "link-a\n"));
        fetcher(FetchConfig::new(SourceSelector::ByUrl(sub_url(1))), &db, &retriever)
            .run()
            .await
            .unwrap();
        assert_eq!(retriever.proxies(), vec![None]);
    }

    #[tokio::test]
    async fn test_store_failure_is_isolated_to_its_source() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        for i in 1..=3 {
            db.add_subscription(&sub_url(i), None, None).await.unwrap();
        }
        let retriever = Arc::new(
            FakeRetriever::default()
                .with_body(&sub_url(1), "vless://a@h:1#A\n")
                .with_body(&sub_url(2), "vless://poison@h:1#P\n")
                .with_body(&sub_url(3), "vless://c@h:1#C\n"),
        );
        let store = Arc::new(PoisonedStore {
            inner: db.clone(),
            poisoned: "vless://poison@h:1#P".to_string(),
        });

        let batch = SubscriptionFetcher::new(
            FetchConfig::new(SourceSelector::AllEnabled).with_workers(2),
            store,
            retriever,
        )
        .unwrap()
        .run()
        .await
        .unwrap();

        assert_eq!(batch.failed, 1);
        assert_eq!(batch.persisted_configs, 2);
        assert_eq!(db.count_configs().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_from_file_writes_output() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let mut url_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(url_file, "{}\n\n   \n{}", sub_url(1), sub_url(2)).unwrap();
        let output = tempfile::NamedTempFile::new().unwrap();

        let retriever = Arc::new(
            FakeRetriever::default()
                .with_body(&sub_url(1), "vless://a@h:1#A\nvless://a@h:1#A\n")
                .with_body(&sub_url(2), "trojan://b@h:2#B\n"),
        );
        let config = FetchConfig::new(SourceSelector::FromFile(url_file.path().to_path_buf()))
            .with_output(Some(output.path().to_path_buf()));

        let batch = fetcher(config, &db, &retriever).run().await.unwrap();

        assert_eq!(batch.sources, 2);
        assert_eq!(batch.raw_links, 3);
        assert_eq!(batch.persisted_configs, 2);

        let written = fs::read_to_string(output.path()).unwrap();
        assert!(written.ends_with('\n'));
        let mut lines: Vec<&str> = written.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["trojan://b@h:2#B", "vless://a@h:1#A"]);

        let configs = db
            .list_subscription_configs(&crate::models::ConfigFilter::default())
            .await
            .unwrap();
        assert!(configs.iter().all(|c| c.subscription_id.is_none()));
    }

    #[tokio::test]
    async fn test_from_empty_file_is_config_error() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let mut url_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(url_file, "\n  \n").unwrap();
        let retriever = Arc::new(FakeRetriever::default());

        let config = FetchConfig::new(SourceSelector::FromFile(url_file.path().to_path_buf()));
        let err = fetcher(config, &db, &retriever).run().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_no_output_written_without_persisted_configs() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("configs.txt");
        let retriever = Arc::new(FakeRetriever::default().with_status(&sub_url(1), 404));
        db.add_subscription(&sub_url(1), None, None).await.unwrap();

        let config = FetchConfig::new(SourceSelector::AllEnabled).with_output(Some(output.clone()));
        let batch = fetcher(config, &db, &retriever).run().await.unwrap();

        assert_eq!(batch.failed, 1);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_refetch_same_link_keeps_single_row() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let link = "vless://u@h:443?type=tcp#A";
        let retriever = Arc::new(FakeRetriever::default().with_body(&sub_url(1), link));
        let config = FetchConfig::new(SourceSelector::ByUrl(sub_url(1)));

        fetcher(config.clone(), &db, &retriever).run().await.unwrap();
        let first = db.get_config_by_link(link).await.unwrap().unwrap();
        fetcher(config, &db, &retriever).run().await.unwrap();
        let second = db.get_config_by_link(link).await.unwrap().unwrap();

        assert_eq!(db.count_configs().await.unwrap(), 1);
        assert_eq!(first.id, second.id);
        assert!(second.last_seen_at >= first.last_seen_at);
    }

    #[tokio::test]
    async fn test_unlinked_fetch_does_not_unlink_stored_config() {
        let db = SubscriptionDatabase::in_memory().await.unwrap();
        let id = db.add_subscription(&sub_url(1), None, None).await.unwrap();
        let link = "trojan://pw@h:443#T";
        let retriever = Arc::new(
            FakeRetriever::default()
                .with_body(&sub_url(1), link)
                .with_body(&sub_url(2), link),
        );

        fetcher(FetchConfig::new(SourceSelector::ById(id)), &db, &retriever)
            .run()
            .await
            .unwrap();
        fetcher(FetchConfig::new(SourceSelector::ByUrl(sub_url(2))), &db, &retriever)
            .run()
            .await
            .unwrap();

        let config = db.get_config_by_link(link).await.unwrap().unwrap();
        assert_eq!(config.subscription_id, Some(id));
    }
}
