// pagegen-poolctl
//
// Standalone entry point for the pool/pre-generation subsystem. Loads the
// pool configuration, brings every pool and generator up through the
// coordinator, and prints periodic stats snapshots until interrupted.
//
// The relational store and alerting collector are out-of-scope collaborators
// (spec.md section 1); this binary wires up in-memory stand-ins so the
// subsystem is runnable on its own. A real deployment supplies its own
// `PoolDataSource` and `AlertSink` and calls into `pagegen_pool` as a library.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use pagegen_pool::alert::TracingAlertSink;
use pagegen_pool::config::PoolSystemConfig;
use pagegen_pool::coordinator::PoolCoordinator;
use pagegen_pool::datasource::{ConsumableRow, ConsumableTag, PoolDataSource};
use pagegen_pool::{Result, VERSION};
use tracing::info;

/// Stands in for the relational store until a real one is wired up: no
/// consumable rows to drain, a handful of seed keywords/images so the
/// composite generators and renderer have something to work with.
struct SeedDataSource;

#[async_trait]
impl PoolDataSource for SeedDataSource {
    async fn fetch_consumable(
        &self,
        _tag: ConsumableTag,
        _group_id: i64,
        _limit: i64,
    ) -> Result<Vec<ConsumableRow>> {
        Ok(vec![])
    }

    async fn mark_consumed(&self, _tag: ConsumableTag, _id: i64) -> Result<()> {
        Ok(())
    }

    async fn fetch_keywords(&self, _group_id: i64) -> Result<Vec<String>> {
        Ok(vec![
            "rust".into(),
            "async".into(),
            "pool".into(),
            "render".into(),
            "template".into(),
        ])
    }

    async fn fetch_images(&self, _group_id: i64) -> Result<Vec<String>> {
        Ok(vec!["/static/hero.png".into(), "/static/banner.png".into()])
    }

    async fn load_pool_config(&self) -> Result<Option<PoolSystemConfig>> {
        Ok(None)
    }

    async fn upsert_pool_config(&self, _cfg: &PoolSystemConfig) -> Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    print_banner();

    let install_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_path = install_dir.join("pagegen-pool.toml");

    let config = load_config(&config_path);
    print_config(&config);

    let datasource = Arc::new(SeedDataSource);
    let alert_sink = Arc::new(TracingAlertSink);
    let coordinator = PoolCoordinator::with_alert_sink(config, datasource, alert_sink);

    info!("starting pool coordinator");
    coordinator.start().await;

    println!();
    println!("╭─────────────────────────────────────────────────────────╮");
    println!("│  pagegen-pool is running                                 │");
    println!("│  press ctrl-c to shut down                               │");
    println!("╰─────────────────────────────────────────────────────────╯");
    println!();

    let stats_coordinator = coordinator.clone();
    let stats_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(10));
        loop {
            tick.tick().await;
            print_stats(&stats_coordinator);
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c, shutting down anyway");
    }

    stats_task.abort();
    info!("shutdown signal received, stopping pool coordinator");
    coordinator.stop().await;
    info!("shutdown complete");

    Ok(())
}

fn load_config(path: &PathBuf) -> PoolSystemConfig {
    match std::fs::read_to_string(path) {
        Ok(raw) => match PoolSystemConfig::from_toml_str(&raw) {
            Ok(cfg) => {
                info!(path = %path.display(), "loaded pool configuration");
                cfg
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                PoolSystemConfig::default()
            }
        },
        Err(_) => {
            info!(path = %path.display(), "no config file found, using defaults");
            PoolSystemConfig::default()
        }
    }
}

fn print_banner() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║         pagegen-pool - SEO page render pool subsystem       ║");
    println!("║         version {}                                    ║", VERSION);
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_config(config: &PoolSystemConfig) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ POOL CONFIGURATION                                          │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│   content pool size:      {:<30} │", config.content_pool_size);
    println!("│   cls pool size:          {:<30} │", config.cls_pool_size);
    println!("│   url pool size:          {:<30} │", config.url_pool_size);
    println!("│   title pool size:        {:<30} │", config.title_pool_size);
    println!("│   keyword-emoji pool size:{:<30} │", config.keyword_emoji_pool_size);
    println!("│   keywords group size:    {:<30} │", config.keywords_size);
    println!("│   images group size:      {:<30} │", config.images_size);
    println!("│   target qps:             {:<30} │", config.target_qps);
    println!("│   safety factor:          {:<30} │", config.safety_factor);
    println!("└─────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_stats(coordinator: &Arc<PoolCoordinator>) {
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ POOL STATS                                                  │");
    println!("├─────────────────────────────────────────────────────────────┤");
    for stat in coordinator.pools_stats() {
        println!(
            "│ {:<12} used={:<6} size={:<6} util={:>5.1}% workers={:<3} │",
            stat.name,
            stat.used,
            stat.size,
            stat.utilization * 100.0,
            stat.num_workers
        );
    }
    println!("└─────────────────────────────────────────────────────────────┘");
}
