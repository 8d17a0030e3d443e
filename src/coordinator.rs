// Pool coordinator (C10): owns every pool/generator, the analyzer, and the
// renderer. Exposes the unified lifecycle (`start`/`stop`/`reload`) and the
// proxy accessors the renderer and front end use to avoid poking at
// individual pools directly.

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::alert::{AlertSink, NullAlertSink};
use crate::analyzer::TemplateAnalyzer;
use crate::config::PoolSystemConfig;
use crate::datasource::{ConsumableTag, PoolDataSource};
use crate::pool::batcher::{BatcherConfig, UpdateBatcher};
use crate::pool::composite::{CompositeConfig, CompositeGenerator, CompositeKind};
use crate::pool::consumable::{ConsumablePool, ConsumablePoolConfig};
use crate::pool::generated::{GeneratedPool, GeneratedPoolConfig};
use crate::pool::number_range::NumberRangePool;
use crate::pool::reusable::ReusablePool;
use crate::pool::PoolComponent;
use crate::render::FastRenderer;
use crate::stats::PoolStatSnapshot;

/// Ranges pre-enumerated at construction for C5. Chosen to cover the common
/// small-integer draws (CSS class suffixes, pagination-style numbers, and a
/// four-digit range used by `{number:1000-9999}`-style placeholders).
const DEFAULT_NUMBER_RANGES: &[(i64, i64)] = &[(1, 100), (100, 999), (1000, 9999)];

/// Returns `Arc<str>` rather than `String` so `GeneratedPool::get` on the
/// pool this feeds is a refcount bump, not a heap allocation, on every draw.
fn class_name() -> Arc<str> {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let s: String = (0..8)
        .map(|_| LETTERS[rand::Rng::gen_range(&mut rng, 0..LETTERS.len())] as char)
        .collect();
    Arc::from(s)
}

fn random_url() -> Arc<str> {
    let n: u32 = rand::Rng::gen_range(&mut rand::thread_rng(), 0..1_000_000);
    Arc::from(format!("/p/{n:06}"))
}

pub struct PoolCoordinator {
    config: AsyncMutex<PoolSystemConfig>,
    datasource: Arc<dyn PoolDataSource>,
    alert_sink: Arc<dyn AlertSink>,

    content_pool: Arc<ConsumablePool>,
    cls_pool: Arc<GeneratedPool<Arc<str>>>,
    url_pool: Arc<GeneratedPool<Arc<str>>>,
    keywords: Arc<ReusablePool>,
    images: Arc<ReusablePool>,
    title_generator: Arc<CompositeGenerator>,
    keyword_emoji_generator: Arc<CompositeGenerator>,
    number_ranges: Arc<NumberRangePool>,
    batcher: Arc<UpdateBatcher>,
    analyzer: Arc<TemplateAnalyzer>,
    renderer: Arc<FastRenderer>,

    reload_lock: AsyncMutex<()>,
    refresh_handle: SyncMutex<Option<JoinHandle<()>>>,
}

impl PoolCoordinator {
    pub fn new(config: PoolSystemConfig, datasource: Arc<dyn PoolDataSource>) -> Arc<Self> {
        Self::with_alert_sink(config, datasource, Arc::new(NullAlertSink))
    }

    pub fn with_alert_sink(
        config: PoolSystemConfig,
        datasource: Arc<dyn PoolDataSource>,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Arc<Self> {
        let content_pool = ConsumablePool::new(
            "content",
            ConsumableTag::Contents,
            1,
            ConsumablePoolConfig {
                max_size: config.content_pool_size,
                threshold: config.content_threshold,
                refill_interval: Duration::from_millis(config.content_refill_interval_ms),
            },
        );

        let cls_pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig {
                capacity: config.cls_pool_size,
                threshold: config.cls_threshold,
                worker_count: config.cls_workers,
                check_interval: Duration::from_millis(config.cls_refill_interval_ms),
            },
            Arc::new(class_name),
        );

        let url_pool = GeneratedPool::new(
            "url",
            GeneratedPoolConfig {
                capacity: config.url_pool_size,
                threshold: config.url_threshold,
                worker_count: config.url_workers,
                check_interval: Duration::from_millis(config.url_refill_interval_ms),
            },
            Arc::new(random_url),
        );

        let keywords = ReusablePool::new("keywords");
        let images = ReusablePool::new("images");

        let title_generator = CompositeGenerator::new(
            "title",
            CompositeKind::Title,
            keywords.clone(),
            CompositeConfig {
                capacity: config.title_pool_size,
                worker_count: config.title_workers,
                threshold: config.title_threshold,
                tick_interval: Duration::from_millis(config.title_refill_interval_ms),
            },
        );

        let keyword_emoji_generator = CompositeGenerator::new(
            "keyword-emoji",
            CompositeKind::KeywordEmoji,
            keywords.clone(),
            CompositeConfig {
                capacity: config.keyword_emoji_pool_size,
                worker_count: config.keyword_emoji_workers,
                threshold: config.keyword_emoji_threshold,
                tick_interval: Duration::from_millis(config.keyword_emoji_refill_interval_ms),
            },
        );

        let number_ranges = NumberRangePool::new(DEFAULT_NUMBER_RANGES, GeneratedPoolConfig::default());

        let batcher = UpdateBatcher::start(BatcherConfig::default(), datasource.clone());
        let analyzer = TemplateAnalyzer::new(config.target_qps, config.safety_factor);
        let renderer = Arc::new(FastRenderer::new());

        Arc::new(Self {
            config: AsyncMutex::new(config),
            datasource,
            alert_sink,
            content_pool,
            cls_pool,
            url_pool,
            keywords,
            images,
            title_generator,
            keyword_emoji_generator,
            number_ranges,
            batcher,
            analyzer,
            renderer,
            reload_lock: AsyncMutex::new(()),
            refresh_handle: SyncMutex::new(None),
        })
    }

    pub async fn start(self: &Arc<Self>) {
        self.content_pool.spawn_refill_loop(self.datasource.clone());
        self.content_pool.start().await;
        self.cls_pool.spawn_refill_loop();
        self.cls_pool.start().await;
        self.url_pool.spawn_refill_loop();
        self.url_pool.start().await;
        self.number_ranges.start_all().await;
        self.title_generator.start().await;
        self.keyword_emoji_generator.start().await;

        let cfg = self.config.lock().await;
        let keywords_size = cfg.keywords_size;
        let images_size = cfg.images_size;
        if let Ok(mut raw) = self.datasource.fetch_keywords(1).await {
            raw.truncate(keywords_size);
            if !raw.is_empty() {
                self.keywords.load_group(1, raw);
            }
        }
        if let Ok(mut raw) = self.datasource.fetch_images(1).await {
            raw.truncate(images_size);
            if !raw.is_empty() {
                self.images.load_group(1, raw);
            }
        }
        tracing::info!(
            content = cfg.content_pool_size,
            cls = cfg.cls_pool_size,
            url = cfg.url_pool_size,
            "pool coordinator started"
        );
        drop(cfg);

        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let interval_ms = coordinator.config.lock().await.refresh_interval_ms;
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                coordinator.refresh_keyword_and_image_groups().await;
            }
        });
        *self.refresh_handle.lock() = Some(handle);
    }

    /// Re-fetches every known keyword/image group id, capped at the
    /// configured group size, on the cadence named by `refresh_interval_ms`.
    /// Re-reads both the interval and the size caps from `config` on every
    /// iteration, so a reload takes effect without restarting this task.
    async fn refresh_keyword_and_image_groups(&self) {
        let (keywords_size, images_size) = {
            let cfg = self.config.lock().await;
            (cfg.keywords_size, cfg.images_size)
        };
        for gid in self.keywords.group_ids() {
            if let Ok(mut raw) = self.datasource.fetch_keywords(gid).await {
                raw.truncate(keywords_size);
                if !raw.is_empty() {
                    self.keywords.reload_group(gid, raw);
                }
            }
        }
        for gid in self.images.group_ids() {
            if let Ok(mut raw) = self.datasource.fetch_images(gid).await {
                raw.truncate(images_size);
                if !raw.is_empty() {
                    self.images.reload_group(gid, raw);
                }
            }
        }
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.refresh_handle.lock().take() {
            handle.abort();
        }
        self.content_pool.stop().await;
        self.cls_pool.stop().await;
        self.url_pool.stop().await;
        self.number_ranges.stop_all().await;
        self.title_generator.stop().await;
        self.keyword_emoji_generator.stop().await;
        self.batcher.stop().await;
        tracing::info!("pool coordinator stopped");
    }

    /// Re-entrant-safe: concurrent reloads are serialized by `reload_lock`.
    pub async fn reload(&self, new_config: PoolSystemConfig) {
        let _guard = self.reload_lock.lock().await;
        crate::reload::apply_reload(
            &self.content_pool,
            &self.cls_pool,
            &self.url_pool,
            &self.title_generator,
            &self.keyword_emoji_generator,
            &self.alert_sink,
            &new_config,
        )
        .await;
        self.analyzer.set_target_qps(new_config.target_qps);
        self.analyzer.set_safety_factor(new_config.safety_factor);
        *self.config.lock().await = new_config;
    }

    pub fn pools_stats(&self) -> Vec<PoolStatSnapshot> {
        use crate::pool::PoolStats;
        vec![
            self.content_pool.stats(),
            self.cls_pool.stats(),
            self.url_pool.stats(),
            self.keywords.stats(),
            self.images.stats(),
            self.title_generator.stats(),
            self.keyword_emoji_generator.stats(),
        ]
    }

    pub fn keyword_group_ids(&self) -> Vec<i64> {
        self.keywords.group_ids()
    }

    pub fn all_raw_keywords(&self, gid: i64) -> Vec<String> {
        self.keywords.get_all(gid)
    }

    pub fn random_image(&self, gid: i64) -> Option<String> {
        self.images.get_random(gid)
    }

    pub fn analyzer(&self) -> &Arc<TemplateAnalyzer> {
        &self.analyzer
    }

    pub fn renderer(&self) -> &Arc<FastRenderer> {
        &self.renderer
    }

    pub fn keywords(&self) -> &Arc<ReusablePool> {
        &self.keywords
    }

    pub fn images(&self) -> &Arc<ReusablePool> {
        &self.images
    }

    pub fn cls_pool(&self) -> &Arc<GeneratedPool<Arc<str>>> {
        &self.cls_pool
    }

    pub fn url_pool(&self) -> &Arc<GeneratedPool<Arc<str>>> {
        &self.url_pool
    }

    pub fn title_generator(&self) -> &Arc<CompositeGenerator> {
        &self.title_generator
    }

    pub fn keyword_emoji_generator(&self) -> &Arc<CompositeGenerator> {
        &self.keyword_emoji_generator
    }

    pub fn number_ranges(&self) -> &Arc<NumberRangePool> {
        &self.number_ranges
    }

    pub fn batcher(&self) -> &Arc<UpdateBatcher> {
        &self.batcher
    }

    pub fn pop_content(&self) -> crate::Result<crate::pool::consumable::ConsumableItem> {
        self.content_pool.pop_with_writeback(&self.batcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSystemConfig;
    use crate::datasource::ConsumableRow;
    use crate::error::Result;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl PoolDataSource for EmptySource {
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
            Ok(vec!["alpha".into(), "beta".into(), "gamma".into()])
        }
        async fn fetch_images(&self, _group_id: i64) -> Result<Vec<String>> {
            Ok(vec!["a.png".into()])
        }
        async fn load_pool_config(&self) -> Result<Option<PoolSystemConfig>> {
            Ok(None)
        }
        async fn upsert_pool_config(&self, _cfg: &PoolSystemConfig) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_loads_keyword_and_image_groups() {
        let coordinator = PoolCoordinator::new(PoolSystemConfig::default(), Arc::new(EmptySource));
        coordinator.start().await;
        assert!(coordinator.all_raw_keywords(1).len() >= 3);
        assert!(coordinator.random_image(1).is_some());
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn pools_stats_reports_every_managed_pool() {
        let coordinator = PoolCoordinator::new(PoolSystemConfig::default(), Arc::new(EmptySource));
        let stats = coordinator.pools_stats();
        assert_eq!(stats.len(), 7);
    }

    #[tokio::test]
    async fn reload_is_reentrant_safe_under_concurrent_calls() {
        let coordinator = PoolCoordinator::new(PoolSystemConfig::default(), Arc::new(EmptySource));
        coordinator.start().await;
        let mut cfg_a = PoolSystemConfig::default();
        cfg_a.cls_pool_size = 3000;
        let mut cfg_b = PoolSystemConfig::default();
        cfg_b.cls_pool_size = 4000;
        let c1 = coordinator.clone();
        let c2 = coordinator.clone();
        let (r1, r2) = tokio::join!(c1.reload(cfg_a), c2.reload(cfg_b));
        let _ = (r1, r2);
        assert!(matches!(coordinator.cls_pool().capacity(), 3000 | 4000));
        coordinator.stop().await;
    }
}
