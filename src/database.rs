//! SQLite persistence for subscriptions and fetched configs

use crate::error::{Error, Result};
use crate::models::{
    ConfigFilter, NewSubscriptionConfig, Subscription, SubscriptionConfig, SubscriptionUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use url::Url;

/// Storage operations the fetch path relies on
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Fails with [`Error::NotFound`] for an unknown id
    async fn get_subscription(&self, id: i64) -> Result<Subscription>;

    /// Insert or refresh configs keyed by their raw link text.
    ///
    /// An existing row keeps its id. Its owning subscription is only replaced
    /// by a non-empty one, so unlinked fetches never detach a config.
    async fn upsert_configs(&self, configs: &[NewSubscriptionConfig]) -> Result<()>;

    async fn update_subscription_fetched_at(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SubscriptionDatabase {
    pool: SqlitePool,
}

impl SubscriptionDatabase {
    /// Open (creating if needed) the database file and run migrations
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                remark TEXT,
                user_agent TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_fetched_at TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscription_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscription_id INTEGER REFERENCES subscriptions(id) ON DELETE CASCADE,
                config_link TEXT NOT NULL UNIQUE,
                protocol TEXT,
                remark TEXT,
                last_seen_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_configs_subscription ON subscription_configs(subscription_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_configs_protocol ON subscription_configs(protocol)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register a subscription and return its id
    pub async fn add_subscription(
        &self,
        url: &str,
        remark: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<i64> {
        Url::parse(url).map_err(|source| Error::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (url, remark, user_agent, enabled, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(url)
        .bind(remark.filter(|r| !r.is_empty()))
        .bind(user_agent.filter(|ua| !ua.is_empty()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Apply the given field changes. Empty strings clear `remark` and
    /// `user_agent`.
    pub async fn update_subscription(&self, id: i64, update: &SubscriptionUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(Error::Config(
                "at least one field must be specified to update (--url, --remark, --user-agent, --enabled)"
                    .to_string(),
            ));
        }
        if let Some(url) = &update.url {
            Url::parse(url).map_err(|source| Error::InvalidUrl {
                url: url.clone(),
                source,
            })?;
        }

        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                url = COALESCE(?, url),
                remark = CASE WHEN ? THEN ? ELSE remark END,
                user_agent = CASE WHEN ? THEN ? ELSE user_agent END,
                enabled = COALESCE(?, enabled)
            WHERE id = ?
            "#,
        )
        .bind(update.url.as_deref())
        .bind(update.remark.is_some())
        .bind(update.remark.as_deref().filter(|r| !r.is_empty()))
        .bind(update.user_agent.is_some())
        .bind(update.user_agent.as_deref().filter(|ua| !ua.is_empty()))
        .bind(update.enabled)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    /// Delete a subscription together with its configs
    pub async fn delete_subscription(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    pub async fn count_subscription_configs(&self, id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscription_configs WHERE subscription_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stored configs, most recently seen first
    pub async fn list_subscription_configs(&self, filter: &ConfigFilter) -> Result<Vec<SubscriptionConfig>> {
        let protocol = filter.protocol.as_deref().filter(|p| !p.is_empty());
        let configs = sqlx::query_as::<_, SubscriptionConfig>(
            r#"
            SELECT id, subscription_id, config_link, protocol, remark, last_seen_at
            FROM subscription_configs
            WHERE (? IS NULL OR subscription_id = ?)
              AND (? IS NULL OR protocol = ?)
            ORDER BY last_seen_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(filter.subscription_id)
        .bind(filter.subscription_id)
        .bind(protocol)
        .bind(protocol)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }

    pub async fn get_config_by_link(&self, link: &str) -> Result<Option<SubscriptionConfig>> {
        let config = sqlx::query_as::<_, SubscriptionConfig>(
            r#"
            SELECT id, subscription_id, config_link, protocol, remark, last_seen_at
            FROM subscription_configs WHERE config_link = ?
            "#,
        )
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn count_configs(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription_configs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionDatabase {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, url, remark, user_agent, enabled, last_fetched_at, created_at
            FROM subscriptions ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn get_subscription(&self, id: i64) -> Result<Subscription> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, url, remark, user_agent, enabled, last_fetched_at, created_at
            FROM subscriptions WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound(id))
    }

    async fn upsert_configs(&self, configs: &[NewSubscriptionConfig]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for config in configs {
            sqlx::query(
                r#"
                INSERT INTO subscription_configs
                    (subscription_id, config_link, protocol, remark, last_seen_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(config_link) DO UPDATE SET
                    subscription_id = COALESCE(excluded.subscription_id, subscription_configs.subscription_id),
                    protocol = excluded.protocol,
                    remark = excluded.remark,
                    last_seen_at = excluded.last_seen_at
                "#,
            )
            .bind(config.subscription_id)
            .bind(&config.config_link)
            .bind(config.protocol.as_deref())
            .bind(config.remark.as_deref())
            .bind(config.last_seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_subscription_fetched_at(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE subscriptions SET last_fetched_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }
}
