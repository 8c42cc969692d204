//! review-router
//!
//! Operator CLI over the provider resilience core.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ RouterConfig ──┬──▶ ProviderDirectory ─┐
//!                                  │                       ▼
//!   Store (file | memory) ─────────┼──▶ RateLimiter ──▶ Registry.select ──▶ ids
//!                                  │                       ▲
//!                                  └──▶ ReliabilityTracker ┘
//!                                            │
//!                                            └──▶ CircuitBreaker (per-id lock)
//!
//!   record / rate-limit ──▶ FeedbackRouter ──▶ RateLimiter | ReliabilityTracker
//! ```

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use review_router::clock::{Clock, SystemClock};
use review_router::config::{load_config, RouterConfig, StorageBackend};
use review_router::error::ProviderError;
use review_router::observability::{logging, metrics};
use review_router::providers::{DryRunFactory, ProviderDirectory};
use review_router::selection::{OpenRouterDiscovery, Registry};
use review_router::storage::{FileStore, MemoryStore, Store};
use review_router::{RateLimiter, ReliabilityTracker};

#[derive(Parser)]
#[command(name = "review-router")]
#[command(about = "Provider selection and resilience state for code review", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the providers selected for the next review round
    Select,
    /// Rank providers by reliability score
    Rank { ids: Vec<String> },
    /// Report the outcome of one provider call
    Record {
        id: String,
        #[arg(long, conflicts_with = "failure", required_unless_present = "failure")]
        success: bool,
        #[arg(long)]
        failure: bool,
        #[arg(long)]
        duration_ms: Option<u64>,
        #[arg(long)]
        error: Option<String>,
    },
    /// Report a false-positive finding
    FalsePositive {
        id: String,
        #[arg(long)]
        finding: Option<String>,
    },
    /// Put a provider on cooldown
    RateLimit {
        id: String,
        #[arg(long)]
        minutes: u64,
        #[arg(long)]
        reason: String,
    },
    /// Show circuit, cooldown and reliability state as JSON
    Status { ids: Vec<String> },
    /// Recompute reliability stats now
    Aggregate,
    /// Clear state for one provider, or all reliability data
    Clear { id: Option<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::File => Arc::new(FileStore::open(&config.storage.path).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tracker = Arc::new(ReliabilityTracker::new(
        store.clone(),
        clock.clone(),
        config.reliability.clone(),
        config.circuit_breaker.clone(),
    ));
    let rate_limiter = RateLimiter::new(store.clone(), clock.clone());
    let directory = ProviderDirectory::new(config.credentials.to_credentials(), Arc::new(DryRunFactory));

    let mut registry = Registry::new(directory, rate_limiter.clone(), tracker.clone(), clock);
    if config.discovery.enabled {
        let discovery = OpenRouterDiscovery::new(&config.discovery, config.credentials.openrouter_api_key.clone())?;
        registry = registry.with_discovery(Arc::new(discovery), Duration::from_secs(config.discovery.ttl_secs));
    }
    let feedback = registry.feedback(config.rate_limit.clone());

    match cli.command {
        Commands::Select => {
            for handle in registry.select(&config.selection).await? {
                println!("{}", handle.id());
            }
        }
        Commands::Rank { ids } => {
            for (id, score) in tracker.rank_providers(&ids).await? {
                println!("{} {:.4}", id, score);
            }
        }
        Commands::Record {
            id,
            success,
            duration_ms,
            error,
            ..
        } => {
            if success {
                feedback.report_success(&id, duration_ms).await?;
            } else {
                let err = ProviderError::Failed(error.unwrap_or_else(|| "unknown error".into()));
                let class = feedback.report_failure(&id, duration_ms, &err).await?;
                println!("{:?}", class);
            }
        }
        Commands::FalsePositive { id, finding } => {
            feedback.record_false_positive(&id, finding.as_deref()).await?;
        }
        Commands::RateLimit { id, minutes, reason } => {
            rate_limiter.mark_rate_limited(&id, minutes, &reason).await?;
        }
        Commands::Status { ids } => {
            let mut out = serde_json::Map::new();
            for id in ids {
                let entry = json!({
                    "circuit": tracker.breaker().state(&id).await?,
                    "rateLimit": rate_limiter.status(&id).await?,
                    "stats": tracker.stats(&id).await?,
                    "score": tracker.reliability_score(&id).await?,
                });
                out.insert(id, entry);
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        }
        Commands::Aggregate => {
            tracker.aggregate_stats().await?;
            let stats = tracker.all_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Clear { id: Some(id) } => {
            tracker.breaker().clear(&id).await?;
            rate_limiter.clear(&id).await?;
        }
        Commands::Clear { id: None } => {
            tracker.clear().await?;
        }
    }

    Ok(())
}
