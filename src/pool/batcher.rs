// Update batcher (spec.md section 4.3): a shared service that coalesces
// `UpdateTask` status write-backs and flushes them to the backing store in
// batches, bounded by either `max_batch` or `flush_interval`, whichever
// triggers first. The work queue never blocks the caller: when full, the
// oldest task is dropped and a warning counter is incremented.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::datasource::{ConsumableTag, PoolDataSource};

#[derive(Debug, Clone, Copy)]
pub struct UpdateTask {
    pub tag: ConsumableTag,
    pub id: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    pub max_batch: usize,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch: 200,
            flush_interval: Duration::from_secs(2),
            queue_capacity: 10_000,
        }
    }
}

struct Inner {
    queue: VecDeque<UpdateTask>,
}

pub struct UpdateBatcher {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    dropped_count: Arc<AtomicU64>,
    flushed_count: Arc<AtomicU64>,
    capacity: usize,
    shutdown: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateBatcher {
    pub fn start(config: BatcherConfig, source: Arc<dyn PoolDataSource>) -> Arc<Self> {
        let inner = Arc::new(Mutex::new(Inner {
            queue: VecDeque::with_capacity(config.queue_capacity.min(1024)),
        }));
        let notify = Arc::new(Notify::new());
        let dropped_count = Arc::new(AtomicU64::new(0));
        let flushed_count = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_inner = inner.clone();
        let worker_notify = notify.clone();
        let worker_shutdown = shutdown.clone();
        let worker_flushed = flushed_count.clone();
        let max_batch = config.max_batch;
        let worker = tokio::spawn(async move {
            let mut ticker = interval(config.flush_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::drain_and_flush(&worker_inner, &source, usize::MAX, &worker_flushed).await;
                    }
                    _ = worker_notify.notified() => {
                        let len = worker_inner.lock().queue.len();
                        if len >= max_batch {
                            Self::drain_and_flush(&worker_inner, &source, max_batch, &worker_flushed).await;
                        }
                    }
                }
                if worker_shutdown.load(Ordering::SeqCst) {
                    Self::drain_and_flush(&worker_inner, &source, usize::MAX, &worker_flushed).await;
                    break;
                }
            }
        });

        Arc::new(Self {
            inner,
            notify,
            dropped_count,
            flushed_count,
            capacity: config.queue_capacity,
            shutdown,
            worker: Mutex::new(Some(worker)),
        })
    }

    async fn drain_and_flush(
        inner: &Arc<Mutex<Inner>>,
        source: &Arc<dyn PoolDataSource>,
        max: usize,
        flushed_count: &Arc<AtomicU64>,
    ) {
        let batch: Vec<UpdateTask> = {
            let mut guard = inner.lock();
            let n = guard.queue.len().min(max);
            guard.queue.drain(..n).collect()
        };
        if batch.is_empty() {
            return;
        }
        let mut failures = 0usize;
        for task in &batch {
            if let Err(e) = source.mark_consumed(task.tag, task.id).await {
                failures += 1;
                tracing::debug!(id = task.id, error = %e, "status write-back failed");
            }
        }
        flushed_count.fetch_add(batch.len() as u64, Ordering::Relaxed);
        if failures > 0 {
            tracing::warn!(batch_size = batch.len(), failures, "batch flush had failures, not retried");
        } else {
            tracing::debug!(batch_size = batch.len(), "flushed update batch");
        }
    }

    /// Never blocks. Drops the oldest queued task and increments the
    /// dropped-task counter when the queue is at capacity.
    pub fn push(&self, task: UpdateTask) {
        let mut guard = self.inner.lock();
        if guard.queue.len() >= self.capacity {
            guard.queue.pop_front();
            self.dropped_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("update batcher queue full, dropped oldest task");
        }
        guard.queue.push_back(task);
        drop(guard);
        self.notify.notify_one();
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn flushed_count(&self) -> u64 {
        self.flushed_count.load(Ordering::Relaxed)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Drains, flushes once, and only then returns.
    pub async fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.await;
        }
    }
}
