// Generated-string pool (C2): a ring buffer behind a single atomic snapshot
// pointer, lock-free `Get`, and a background refill coordinator that spawns
// parallel producer workers when the live window drops below threshold.
//
// `Get` deliberately tolerates a consumer overtaking the producer: if `head`
// runs past `tail` the slot read is whatever the last producer wrote there,
// never uninitialized, because the initial prefill fills every slot and
// every subsequent write lands before the logical advance of `head` is
// observed by any reader. See spec.md section 4.1 and the "ring with torn
// reads" design note.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::memory::MemoryTracker;
use crate::pool::{LifecycleState, PoolComponent, PoolStats};
use crate::stats::{now_epoch_secs, PoolKind, PoolStatSnapshot, PoolStatus};

struct RingSnapshot<T> {
    data: Vec<ArcSwap<T>>,
    capacity: i64,
}

impl<T: Clone + Send + Sync + 'static> RingSnapshot<T> {
    fn filled(capacity: i64, mut generate: impl FnMut() -> T) -> Self {
        let data = (0..capacity)
            .map(|_| ArcSwap::from_pointee(generate()))
            .collect();
        Self { data, capacity }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratedPoolConfig {
    pub capacity: i64,
    pub threshold: f64,
    pub worker_count: usize,
    pub check_interval: Duration,
}

impl Default for GeneratedPoolConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            threshold: 0.3,
            worker_count: 4,
            check_interval: Duration::from_millis(500),
        }
    }
}

/// Lock-free ring-buffer pool of values produced by an infallible generator
/// function (random class, random URL, uniform integer in a range, ...).
pub struct GeneratedPool<T: Clone + Send + Sync + 'static> {
    name: String,
    snapshot: ArcSwap<RingSnapshot<T>>,
    head: AtomicI64,
    tail: AtomicI64,
    generated_count: AtomicU64,
    consumed_count: AtomicU64,
    generator: Arc<dyn Fn() -> T + Send + Sync>,
    byte_sizer: Option<Arc<dyn Fn(&T) -> i64 + Send + Sync>>,
    memory: MemoryTracker,
    config: Mutex<GeneratedPoolConfig>,
    resize_lock: Mutex<()>,
    stopped: AtomicBool,
    running: AtomicBool,
    refill_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> GeneratedPool<T> {
    pub fn new(
        name: impl Into<String>,
        config: GeneratedPoolConfig,
        generator: Arc<dyn Fn() -> T + Send + Sync>,
    ) -> Arc<Self> {
        Self::with_byte_sizer(name, config, generator, None)
    }

    pub fn with_byte_sizer(
        name: impl Into<String>,
        config: GeneratedPoolConfig,
        generator: Arc<dyn Fn() -> T + Send + Sync>,
        byte_sizer: Option<Arc<dyn Fn(&T) -> i64 + Send + Sync>>,
    ) -> Arc<Self> {
        let capacity = config.capacity.max(1);
        let gen_clone = generator.clone();
        let snapshot = RingSnapshot::filled(capacity, move || gen_clone());
        let memory = MemoryTracker::new();
        if let Some(sizer) = &byte_sizer {
            for slot in &snapshot.data {
                memory.add(sizer(&slot.load()));
            }
        }
        Arc::new(Self {
            name: name.into(),
            snapshot: ArcSwap::from_pointee(snapshot),
            head: AtomicI64::new(0),
            tail: AtomicI64::new(capacity),
            generated_count: AtomicU64::new(capacity as u64),
            consumed_count: AtomicU64::new(0),
            generator,
            byte_sizer,
            memory,
            config: Mutex::new(GeneratedPoolConfig { capacity, ..config }),
            resize_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
            refill_handle: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock-free, wait-free on the hot path. Allocation-free too, provided
    /// `T`'s `Clone` is a refcount bump rather than a deep copy — instantiate
    /// with `T = Arc<str>` (or similarly `Arc`-wrapped) rather than `String`
    /// for any pool actually drawn from on a render's hot path.
    pub fn get(&self) -> T {
        let idx = self.head.fetch_add(1, Ordering::Relaxed);
        let snap = self.snapshot.load();
        let slot = (idx.rem_euclid(snap.capacity)) as usize;
        self.consumed_count.fetch_add(1, Ordering::Relaxed);
        snap.data[slot].load_full().as_ref().clone()
    }

    pub fn available(&self) -> i64 {
        let live = self.tail.load(Ordering::Relaxed) - self.head.load(Ordering::Relaxed);
        live.clamp(0, self.capacity())
    }

    pub fn capacity(&self) -> i64 {
        self.snapshot.load().capacity
    }

    pub fn consumed_count(&self) -> u64 {
        self.consumed_count.load(Ordering::Relaxed)
    }

    pub fn generated_count(&self) -> u64 {
        self.generated_count.load(Ordering::Relaxed)
    }

    pub fn memory_bytes(&self) -> i64 {
        self.memory.bytes()
    }

    /// Under the exclusive resize lock: allocate a new ring, copy up to
    /// `min(live, new_capacity)` items read via the *old* snapshot's modulus,
    /// construct the new snapshot fully, then swap the pointer — in that
    /// order, so a `Get` that already holds the old Arc never observes a
    /// half-built snapshot (see spec.md section 9, "open question").
    pub fn resize(&self, new_capacity: i64) {
        if new_capacity <= 0 {
            tracing::warn!(pool = %self.name, new_capacity, "resize no-op: capacity must be > 0");
            return;
        }
        let _guard = self.resize_lock.lock();
        let old_snap = self.snapshot.load();
        let live = self.available();
        let copied = live.min(new_capacity);
        let head = self.head.load(Ordering::Relaxed);

        let mut new_data = Vec::with_capacity(new_capacity as usize);
        for i in 0..copied {
            let old_idx = (head + i).rem_euclid(old_snap.capacity) as usize;
            new_data.push(ArcSwap::new(old_snap.data[old_idx].load_full()));
        }
        for _ in copied..new_capacity {
            new_data.push(ArcSwap::from_pointee((self.generator)()));
        }
        let new_snapshot = RingSnapshot {
            data: new_data,
            capacity: new_capacity,
        };

        self.snapshot.store(Arc::new(new_snapshot));
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(copied, Ordering::Relaxed);
        self.config.lock().capacity = new_capacity;
        tracing::info!(pool = %self.name, new_capacity, copied, "resized generated pool");
    }

    pub fn clear(&self) {
        let _guard = self.resize_lock.lock();
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        self.memory.reset();
    }

    pub fn update_config(
        &self,
        capacity: i64,
        threshold: f64,
        worker_count: usize,
        check_interval: Duration,
    ) {
        let capacity_changed = capacity != self.capacity();
        {
            let mut cfg = self.config.lock();
            cfg.threshold = threshold;
            cfg.worker_count = worker_count.max(1);
            cfg.check_interval = check_interval;
        }
        if capacity_changed {
            self.resize(capacity);
        }
    }

    async fn refill_tick(self: &Arc<Self>) {
        let (threshold, worker_count, capacity) = {
            let cfg = self.config.lock();
            (cfg.threshold, cfg.worker_count.max(1), self.capacity())
        };
        let live = self.available();
        if (live as f64) >= threshold * capacity as f64 {
            return;
        }
        let need = (capacity - live).max(0);
        if need == 0 {
            return;
        }
        let per_worker = (need + worker_count as i64 - 1) / worker_count as i64;
        let mut handles = Vec::with_capacity(worker_count);
        for w in 0..worker_count {
            let remaining = need - per_worker * w as i64;
            if remaining <= 0 {
                break;
            }
            let this_worker_count = per_worker.min(remaining);
            let pool = self.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..this_worker_count {
                    let value = (pool.generator)();
                    let idx = pool.tail.fetch_add(1, Ordering::Relaxed);
                    let snap = pool.snapshot.load();
                    let slot = (idx.rem_euclid(snap.capacity)) as usize;
                    if let Some(sizer) = &pool.byte_sizer {
                        pool.memory.add(sizer(&value));
                    }
                    snap.data[slot].store(Arc::new(value));
                    pool.generated_count.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            let _ = h.await;
        }
        tracing::debug!(pool = %self.name, need, "refilled generated pool");
    }
}

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> PoolComponent for GeneratedPool<T> {
    async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
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

impl<T: Clone + Send + Sync + 'static> GeneratedPool<T> {
    /// Spawn the coordinator task. Kept separate from `PoolComponent::start`
    /// because it needs `Arc<Self>`, not `&self`.
    pub fn spawn_refill_loop(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        let pool = self.clone();
        let check_interval = pool.config.lock().check_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            loop {
                ticker.tick().await;
                if pool.stopped.load(Ordering::SeqCst) {
                    break;
                }
                pool.refill_tick().await;
            }
        });
        *self.refill_handle.lock() = Some(handle);
    }

    pub fn lifecycle(&self) -> LifecycleState {
        if self.is_running() {
            LifecycleState::Running
        } else if self.stopped.load(Ordering::Relaxed) {
            LifecycleState::Stopped
        } else {
            LifecycleState::Created
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PoolStats for GeneratedPool<T> {
    fn stats(&self) -> PoolStatSnapshot {
        let capacity = self.capacity();
        let available = self.available();
        let used = capacity - available;
        PoolStatSnapshot {
            name: self.name.clone(),
            pool_type: PoolKind::Generated,
            size: capacity,
            available,
            used,
            utilization: PoolStatSnapshot::utilization_of(used, capacity),
            status: if self.is_running() {
                PoolStatus::Running
            } else {
                PoolStatus::Stopped
            },
            num_workers: self.config.lock().worker_count,
            last_refresh: now_epoch_secs(),
            memory_bytes: self.memory_bytes(),
            groups: None,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as Counter;

    fn counting_generator() -> (Arc<dyn Fn() -> String + Send + Sync>, Arc<Counter>) {
        let counter = Arc::new(Counter::new(0));
        let c = counter.clone();
        let gen: Arc<dyn Fn() -> String + Send + Sync> =
            Arc::new(move || format!("item-{}", c.fetch_add(1, Ordering::Relaxed)));
        (gen, counter)
    }

    #[tokio::test]
    async fn get_never_returns_uninitialized_and_counts_consumption() {
        let (gen, _counter) = counting_generator();
        let pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig {
                capacity: 100,
                ..Default::default()
            },
            gen,
        );
        for _ in 0..50 {
            let v = pool.get();
            assert!(!v.is_empty());
        }
        assert_eq!(pool.consumed_count(), 50);
    }

    #[tokio::test]
    async fn resize_preserves_live_window() {
        let (gen, _counter) = counting_generator();
        let pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig {
                capacity: 100,
                ..Default::default()
            },
            gen,
        );
        for _ in 0..40 {
            pool.get();
        }
        let live_before = pool.available();
        assert_eq!(live_before, 60);
        pool.resize(30);
        assert_eq!(pool.available(), 30.min(live_before));
        assert_eq!(pool.capacity(), 30);
    }

    #[tokio::test]
    async fn invalid_resize_is_a_no_op() {
        let (gen, _counter) = counting_generator();
        let pool = GeneratedPool::new("cls", GeneratedPoolConfig::default(), gen);
        let before = pool.capacity();
        pool.resize(0);
        pool.resize(-5);
        assert_eq!(pool.capacity(), before);
    }

    #[tokio::test]
    async fn refill_replenishes_below_threshold() {
        let (gen, _counter) = counting_generator();
        let pool = GeneratedPool::new(
            "cls",
            GeneratedPoolConfig {
                capacity: 100,
                threshold: 0.3,
                worker_count: 4,
                check_interval: Duration::from_millis(20),
            },
            gen,
        );
        pool.spawn_refill_loop();
        for _ in 0..90 {
            pool.get();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pool.available() >= 70);
        pool.stop().await;
    }
}
