// FIFO consumable pool (C3): a database-backed queue where every item is
// consumed at most once. `loaded-ids` tracks every ID that has ever entered
// the pool so a later refill silently drops duplicates; it is never evicted
// except by `Clear` (spec.md section 9, open question — unbounded growth is
// accepted for the deployed workload and documented rather than worked
// around).

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::datasource::{ConsumableTag, PoolDataSource};
use crate::memory::{sized_bytes, MemoryTracker};
use crate::pool::batcher::{UpdateBatcher, UpdateTask};
use crate::pool::{LifecycleState, PoolComponent, PoolStats};
use crate::stats::{now_epoch_secs, PoolKind, PoolStatSnapshot, PoolStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumableItem {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ConsumablePoolConfig {
    pub max_size: i64,
    pub threshold: f64,
    pub refill_interval: Duration,
}

impl Default for ConsumablePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 2000,
            threshold: 0.3,
            refill_interval: Duration::from_secs(2),
        }
    }
}

struct Inner {
    queue: VecDeque<ConsumableItem>,
    loaded_ids: HashSet<i64>,
}

pub struct ConsumablePool {
    name: String,
    tag: ConsumableTag,
    group_id: i64,
    inner: Mutex<Inner>,
    max_size: AtomicI64,
    threshold: Mutex<f64>,
    refill_interval: Mutex<Duration>,
    memory: MemoryTracker,
    consumed_count: AtomicU64,
    running: AtomicBool,
    stopped: AtomicBool,
    refill_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConsumablePool {
    pub fn new(
        name: impl Into<String>,
        tag: ConsumableTag,
        group_id: i64,
        config: ConsumablePoolConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            tag,
            group_id,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                loaded_ids: HashSet::new(),
            }),
            max_size: AtomicI64::new(config.max_size),
            threshold: Mutex::new(config.threshold),
            refill_interval: Mutex::new(config.refill_interval),
            memory: MemoryTracker::new(),
            consumed_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            refill_handle: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends items in order, silently dropping any item whose ID is
    /// already in `loaded_ids`, and silently truncating the incoming batch
    /// if the pool would exceed `max_size`.
    pub fn push(&self, items: Vec<ConsumableItem>) {
        let max_size = self.max_size.load(Ordering::Relaxed);
        let mut guard = self.inner.lock();
        for item in items {
            if guard.loaded_ids.contains(&item.id) {
                continue;
            }
            if guard.queue.len() as i64 >= max_size {
                continue;
            }
            guard.loaded_ids.insert(item.id);
            self.memory.add(sized_bytes(item.text.len()));
            guard.queue.push_back(item);
        }
    }

    pub fn pop(&self) -> Option<ConsumableItem> {
        let mut guard = self.inner.lock();
        let item = guard.queue.pop_front();
        if let Some(item) = &item {
            self.memory.sub(sized_bytes(item.text.len()));
            self.consumed_count.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn len(&self) -> i64 {
        self.inner.lock().queue.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resize(&self, max_size: i64) {
        if max_size <= 0 {
            tracing::warn!(pool = %self.name, max_size, "resize no-op: max_size must be > 0");
            return;
        }
        self.max_size.store(max_size, Ordering::Relaxed);
        let mut guard = self.inner.lock();
        while guard.queue.len() as i64 > max_size {
            if let Some(item) = guard.queue.pop_back() {
                self.memory.sub(sized_bytes(item.text.len()));
            }
        }
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.queue.clear();
        guard.loaded_ids.clear();
        self.memory.reset();
    }

    pub fn memory_bytes(&self) -> i64 {
        self.memory.bytes()
    }

    pub fn consumed_count(&self) -> u64 {
        self.consumed_count.load(Ordering::Relaxed)
    }

    pub fn update_config(&self, max_size: i64, threshold: f64, refill_interval: Duration) {
        *self.threshold.lock() = threshold;
        *self.refill_interval.lock() = refill_interval;
        if max_size != self.max_size.load(Ordering::Relaxed) {
            self.resize(max_size);
        }
    }

    async fn refill_once(self: &Arc<Self>, source: &Arc<dyn PoolDataSource>) {
        let (threshold, max_size) = (*self.threshold.lock(), self.max_size.load(Ordering::Relaxed));
        let len = self.len();
        if (len as f64) >= threshold * max_size as f64 {
            return;
        }
        let limit = max_size - len;
        if limit <= 0 {
            return;
        }
        match source
            .fetch_consumable(self.tag, self.group_id, limit)
            .await
        {
            Ok(rows) => {
                let items = rows
                    .into_iter()
                    .map(|r| ConsumableItem {
                        id: r.id,
                        text: r.text,
                    })
                    .collect();
                self.push(items);
            }
            Err(e) => {
                tracing::warn!(pool = %self.name, error = %e, "consumable refill failed, serving from memory");
            }
        }
    }

    /// Pops and, if successful, enqueues the matching status write-back onto
    /// `batcher` (never blocking). Returns `PoolEmpty` when the in-memory
    /// queue has nothing to offer.
    pub fn pop_with_writeback(&self, batcher: &UpdateBatcher) -> crate::Result<ConsumableItem> {
        match self.pop() {
            Some(item) => {
                batcher.push(UpdateTask {
                    tag: self.tag,
                    id: item.id,
                });
                Ok(item)
            }
            None => Err(crate::PoolError::PoolEmpty),
        }
    }

    pub fn spawn_refill_loop(self: &Arc<Self>, source: Arc<dyn PoolDataSource>) {
        self.running.store(true, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        let pool = self.clone();
        let refill_interval = *pool.refill_interval.lock();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(refill_interval);
            loop {
                ticker.tick().await;
                if pool.stopped.load(Ordering::SeqCst) {
                    break;
                }
                pool.refill_once(&source).await;
            }
        });
        *self.refill_handle.lock() = Some(handle);
    }

    pub fn lifecycle(&self) -> LifecycleState {
        if self.running.load(Ordering::Relaxed) {
            LifecycleState::Running
        } else if self.stopped.load(Ordering::Relaxed) {
            LifecycleState::Stopped
        } else {
            LifecycleState::Created
        }
    }
}

#[async_trait::async_trait]
impl PoolComponent for ConsumablePool {
    async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
    }

    async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.refill_handle.lock().take() {
            handle.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl PoolStats for ConsumablePool {
    fn stats(&self) -> PoolStatSnapshot {
        let size = self.max_size.load(Ordering::Relaxed);
        let used = self.len();
        let available = (size - used).max(0);
        PoolStatSnapshot {
            name: self.name.clone(),
            pool_type: PoolKind::Consumable,
            size,
            available,
            used,
            utilization: PoolStatSnapshot::utilization_of(used, size),
            status: if self.is_running() {
                PoolStatus::Running
            } else {
                PoolStatus::Stopped
            },
            num_workers: 0,
            last_refresh: now_epoch_secs(),
            memory_bytes: self.memory_bytes(),
            groups: None,
            source: None,
        }
    }
}
