// Hot-reload controller (C9): applies a new configuration record to every
// running pool without stopping service. Threshold, worker-count, and
// refill-interval changes happen under each pool's own lock; a capacity
// change triggers that pool's `Resize` (C2/C3) or, for composite generators,
// a full stop -> reset -> restart. The coordinator serializes concurrent
// reloads with its own lock before calling in here.

use std::sync::Arc;
use std::time::Duration;

use crate::alert::{AlertLevel, AlertRecord, AlertSink};
use crate::config::PoolSystemConfig;
use crate::pool::composite::{CompositeConfig, CompositeGenerator};
use crate::pool::consumable::ConsumablePool;
use crate::pool::generated::GeneratedPool;

pub async fn apply_reload(
    content_pool: &Arc<ConsumablePool>,
    cls_pool: &Arc<GeneratedPool<Arc<str>>>,
    url_pool: &Arc<GeneratedPool<Arc<str>>>,
    title_generator: &Arc<CompositeGenerator>,
    keyword_emoji_generator: &Arc<CompositeGenerator>,
    alert_sink: &Arc<dyn AlertSink>,
    new_config: &PoolSystemConfig,
) {
    content_pool.update_config(
        new_config.content_pool_size,
        new_config.content_threshold,
        Duration::from_millis(new_config.content_refill_interval_ms),
    );
    tracing::info!(pool = "content", size = new_config.content_pool_size, "reload applied");

    cls_pool.update_config(
        new_config.cls_pool_size,
        new_config.cls_threshold,
        new_config.cls_workers,
        Duration::from_millis(new_config.cls_refill_interval_ms),
    );
    tracing::info!(pool = "cls", size = new_config.cls_pool_size, "reload applied");

    url_pool.update_config(
        new_config.url_pool_size,
        new_config.url_threshold,
        new_config.url_workers,
        Duration::from_millis(new_config.url_refill_interval_ms),
    );
    tracing::info!(pool = "url", size = new_config.url_pool_size, "reload applied");

    reload_composite(
        title_generator,
        "title",
        new_config.title_pool_size,
        new_config.title_workers,
        new_config.title_threshold,
        Duration::from_millis(new_config.title_refill_interval_ms),
    )
    .await;

    reload_composite(
        keyword_emoji_generator,
        "keyword-emoji",
        new_config.keyword_emoji_pool_size,
        new_config.keyword_emoji_workers,
        new_config.keyword_emoji_threshold,
        Duration::from_millis(new_config.keyword_emoji_refill_interval_ms),
    )
    .await;

    alert_sink.emit(AlertRecord::new(
        "pool-reload",
        AlertLevel::Info,
        "pool_reload",
        "pool configuration reload applied",
        0.0,
        0.0,
    ));
}

async fn reload_composite(
    generator: &Arc<CompositeGenerator>,
    label: &str,
    capacity: usize,
    worker_count: usize,
    threshold: f64,
    tick_interval: Duration,
) {
    if generator.capacity() == capacity {
        generator.update_runtime_config(worker_count, threshold, tick_interval);
        tracing::info!(pool = label, worker_count, threshold, "reload applied in place");
        return;
    }
    generator
        .reload(CompositeConfig {
            capacity,
            worker_count,
            threshold,
            tick_interval,
        })
        .await;
    tracing::info!(pool = label, capacity, worker_count, "reload applied (full restart)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::NullAlertSink;
    use crate::pool::generated::GeneratedPoolConfig;
    use crate::pool::reusable::ReusablePool;
    use crate::pool::composite::CompositeKind;
    use crate::datasource::ConsumableTag;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn capacity_change_triggers_composite_full_restart() {
        let keywords = ReusablePool::new("keywords");
        keywords.load_group(1, vec!["a".into(), "b".into(), "c".into()]);
        let title_generator = CompositeGenerator::new(
            "titles",
            CompositeKind::Title,
            keywords.clone(),
            CompositeConfig {
                capacity: 100,
                worker_count: 1,
                ..Default::default()
            },
        );
        let keyword_emoji_generator = CompositeGenerator::new(
            "kw-emoji",
            CompositeKind::KeywordEmoji,
            keywords,
            CompositeConfig::default(),
        );

        let counter = Arc::new(AtomicU64::new(0));
        let c1 = counter.clone();
        let cls_pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig::default(),
            Arc::new(move || -> Arc<str> {
                Arc::from(format!("cls-{}", c1.fetch_add(1, Ordering::Relaxed)))
            }),
        );
        let c2 = counter.clone();
        let url_pool = GeneratedPool::new(
            "url",
            GeneratedPoolConfig::default(),
            Arc::new(move || -> Arc<str> {
                Arc::from(format!("url-{}", c2.fetch_add(1, Ordering::Relaxed)))
            }),
        );
        let content_pool = ConsumablePool::new(
            "content",
            ConsumableTag::Contents,
            1,
            Default::default(),
        );
        let alert_sink: Arc<dyn AlertSink> = Arc::new(NullAlertSink);

        let mut new_config = PoolSystemConfig::default();
        new_config.title_pool_size = 200;

        apply_reload(
            &content_pool,
            &cls_pool,
            &url_pool,
            &title_generator,
            &keyword_emoji_generator,
            &alert_sink,
            &new_config,
        )
        .await;

        assert_eq!(title_generator.capacity(), 200);
    }
}
