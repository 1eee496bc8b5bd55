use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_subs::{
    config::{FetchConfig, SourceSelector, DEFAULT_WORKERS},
    database::{SubscriptionDatabase, SubscriptionStore},
    link,
    models::{ConfigFilter, SubscriptionUpdate},
    subscription::{HttpRetriever, RetrieverConfig, SubscriptionFetcher},
    DEFAULT_DATABASE,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Fetch proxy subscriptions and keep their configs in a local database
#[derive(Parser)]
#[command(name = "proxy-subs")]
#[command(about = "Fetch proxy subscriptions and keep their configs in a local database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file path
    #[arg(short, long, default_value = DEFAULT_DATABASE, global = true)]
    database: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a subscription URL
    Add {
        /// Subscription URL
        url: String,
        /// Human readable name
        #[arg(short, long)]
        remark: Option<String>,
        /// User agent sent when fetching this subscription
        #[arg(short = 'a', long)]
        user_agent: Option<String>,
    },
    /// Show all subscriptions, or one by ID
    Show {
        /// Subscription ID
        id: Option<i64>,
    },
    /// Change fields of a subscription
    Update {
        /// Subscription ID
        id: i64,
        #[arg(long)]
        url: Option<String>,
        /// New remark (empty string clears it)
        #[arg(short, long)]
        remark: Option<String>,
        /// New user agent (empty string clears it)
        #[arg(short = 'a', long)]
        user_agent: Option<String>,
        /// Enable or disable the subscription
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Remove a subscription and its configs
    Rm {
        /// Subscription ID
        id: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List stored configs
    ListConfigs {
        /// Only configs of this subscription
        #[arg(long)]
        id: Option<i64>,
        /// Only configs of this protocol
        #[arg(long)]
        protocol: Option<String>,
        /// Maximum number of configs to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Fetch subscriptions and store their configs
    Fetch {
        /// Fetch one stored subscription
        #[arg(long)]
        id: Option<i64>,
        /// Fetch one URL without linking it to a subscription
        #[arg(long)]
        url: Option<String>,
        /// Fetch every enabled subscription
        #[arg(long)]
        all: bool,
        /// File containing subscription URLs (one URL per line)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
        /// User agent overriding every stored one
        #[arg(short = 'a', long)]
        user_agent: Option<String>,
        /// Proxy URL used for every request (http, https, socks5)
        #[arg(short, long)]
        proxy: Option<String>,
        /// Number of concurrent fetches
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        /// Output file for every saved config link
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout in seconds for HTTP requests
        #[arg(long, default_value = "30")]
        timeout: u64,
        /// Report duplicate counts
        #[arg(short, long)]
        verbose: bool,
    },
    /// Decode a single share link
    Decode {
        /// Link such as vless://... or ss://...
        link: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Decoding needs no database
    if let Commands::Decode { link: share_link } = &cli.command {
        match link::decode(share_link) {
            Ok(summary) => println!("{}", summary),
            Err(e) => println!("Cannot decode link: {}", e),
        }
        return Ok(());
    }

    let db = SubscriptionDatabase::new(&cli.database).await?;

    match cli.command {
        Commands::Add {
            url,
            remark,
            user_agent,
        } => {
            let id = db
                .add_subscription(&url, remark.as_deref(), user_agent.as_deref())
                .await?;
            println!("Subscription added: {}", id);
        }
        Commands::Show { id: Some(id) } => {
            let subscription = db.get_subscription(id).await?;
            let configs = db.count_subscription_configs(id).await?;
            println!("ID:           {}", subscription.id);
            println!("URL:          {}", subscription.url);
            println!("Remark:       {}", subscription.remark.as_deref().unwrap_or("-"));
            println!("User agent:   {}", subscription.user_agent.as_deref().unwrap_or("-"));
            println!("Enabled:      {}", subscription.enabled);
            match subscription.last_fetched_at {
                Some(at) => println!("Last fetched: {}", at.format("%Y-%m-%d %H:%M:%S")),
                None => println!("Last fetched: never"),
            }
            println!("Configs:      {}", configs);
        }
        Commands::Show { id: None } => {
            let subscriptions = db.list_subscriptions().await?;
            if subscriptions.is_empty() {
                println!("No subscriptions found.");
            } else {
                for subscription in subscriptions {
                    let status = if subscription.enabled { "✓" } else { "○" };
                    println!("{} {} - {}", status, subscription, subscription.id);
                }
            }
        }
        Commands::Update {
            id,
            url,
            remark,
            user_agent,
            enabled,
        } => {
            let update = SubscriptionUpdate {
                url,
                remark,
                user_agent,
                enabled,
            };
            db.update_subscription(id, &update).await?;
            println!("Subscription updated: {}", id);
        }
        Commands::Rm { id, yes } => {
            let subscription = db.get_subscription(id).await?;
            if !yes {
                println!("Subscription ID {}:", subscription.id);
                println!("  URL:    {}", subscription.url);
                println!("  Remark: {}", subscription.remark.as_deref().unwrap_or("N/A"));
                let configs = db.count_subscription_configs(id).await?;
                if configs > 0 {
                    println!("  Configs: {} (will also be deleted)", configs);
                }

                print!("\nAre you sure you want to delete this subscription? [y/N]: ");
                io::stdout().flush()?;
                let mut answer = String::new();
                io::stdin().read_line(&mut answer)?;
                if !is_confirmed(&answer) {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            db.delete_subscription(id).await?;
            println!("Subscription deleted: {}", subscription);
        }
        Commands::ListConfigs {
            id,
            protocol,
            limit,
        } => {
            let filter = ConfigFilter {
                subscription_id: id,
                protocol,
                limit,
            };
            let configs = db.list_subscription_configs(&filter).await?;
            if configs.is_empty() {
                println!("No configs found.");
            } else {
                for config in configs {
                    let summary = link::decode(&config.config_link)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| config.config_link.clone());
                    println!("{:>6}  {}", config.id, summary);
                }
            }
        }
        Commands::Fetch {
            id,
            url,
            all,
            file,
            user_agent,
            proxy,
            workers,
            output,
            timeout,
            verbose,
        } => {
            let selector = SourceSelector::from_flags(id, url, all, file)?;
            let config = FetchConfig::new(selector)
                .with_user_agent(user_agent)
                .with_proxy(proxy)
                .with_workers(workers)
                .with_output(output)
                .with_verbose(verbose);

            let retriever = HttpRetriever::with_config(
                RetrieverConfig::new().with_timeout(Duration::from_secs(timeout)),
            );
            let fetcher =
                SubscriptionFetcher::new(config, Arc::new(db), Arc::new(retriever))?;

            let batch = fetcher.run().await?;
            println!(
                "Fetched {} source(s): {} links, {} configs saved, {} failed",
                batch.sources, batch.raw_links, batch.persisted_configs, batch.failed
            );
            batch.ensure_success()?;
        }
        Commands::Decode { .. } => {}
    }

    Ok(())
}

/// Only an explicit yes confirms a prompt
fn is_confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
