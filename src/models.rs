//! Subscription and config data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A registered source of proxy links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub url: String,
    pub remark: Option<String>,
    pub user_agent: Option<String>,
    pub enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Remark if set, otherwise `#<id>`
    pub fn display_name(&self) -> String {
        match self.remark.as_deref() {
            Some(remark) if !remark.is_empty() => remark.to_string(),
            _ => format!("#{}", self.id),
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.url)
    }
}

/// Field-level changes to a subscription; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub url: Option<String>,
    pub remark: Option<String>,
    pub user_agent: Option<String>,
    pub enabled: Option<bool>,
}

impl SubscriptionUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.remark.is_none()
            && self.user_agent.is_none()
            && self.enabled.is_none()
    }
}

/// A stored proxy link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SubscriptionConfig {
    pub id: i64,
    pub subscription_id: Option<i64>,
    pub config_link: String,
    pub protocol: Option<String>,
    pub remark: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// A decoded link waiting to be upserted, keyed by `config_link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscriptionConfig {
    pub subscription_id: Option<i64>,
    pub config_link: String,
    pub protocol: Option<String>,
    pub remark: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}

impl NewSubscriptionConfig {
    /// Create a candidate with unknown protocol and remark
    pub fn new(config_link: String, subscription_id: Option<i64>, seen_at: DateTime<Utc>) -> Self {
        Self {
            subscription_id,
            config_link,
            protocol: None,
            remark: None,
            last_seen_at: seen_at,
        }
    }

    /// Whether the link was recognised by a decoder
    pub fn is_decoded(&self) -> bool {
        self.protocol.is_some()
    }
}

/// Filter for listing stored configs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFilter {
    pub subscription_id: Option<i64>,
    pub protocol: Option<String>,
    pub limit: i64,
}

impl Default for ConfigFilter {
    fn default() -> Self {
        Self {
            subscription_id: None,
            protocol: None,
            limit: 50,
        }
    }
}
