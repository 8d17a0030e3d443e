// Composite generator (C6): synthesizes titles and keyword+emoji strings
// from a raw-keyword upstream pool, via per-group worker families writing
// into bounded queues. `pop` never reports "unavailable" — on an empty queue
// it falls back to generating exactly one item synchronously.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::memory::{sized_bytes, MemoryTracker};
use crate::pool::reusable::ReusablePool;
use crate::pool::{LifecycleState, PoolComponent, PoolStats};
use crate::render::emoji::EMOJI_TABLE;
use crate::stats::{now_epoch_secs, GroupStat, PoolKind, PoolStatSnapshot, PoolStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Title,
    KeywordEmoji,
}

#[derive(Debug, Clone, Copy)]
pub struct CompositeConfig {
    pub capacity: usize,
    pub worker_count: usize,
    pub threshold: f64,
    pub tick_interval: Duration,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            worker_count: 2,
            threshold: 0.3,
            tick_interval: Duration::from_millis(200),
        }
    }
}

fn entity_encode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii() {
                c.to_string()
            } else {
                format!("&#{};", c as u32)
            }
        })
        .collect()
}

fn pick_distinct_emojis(count: usize) -> Vec<char> {
    let mut rng = rand::thread_rng();
    let mut indices: Vec<usize> = (0..EMOJI_TABLE.len()).collect();
    let take = count.min(indices.len());
    for i in 0..take {
        let j = rand::Rng::gen_range(&mut rng, i..indices.len());
        indices.swap(i, j);
    }
    indices[..take].iter().map(|&i| EMOJI_TABLE[i]).collect()
}

fn insert_emojis_at_random_positions(keyword: &str, emojis: &[char]) -> String {
    let mut chars: Vec<char> = keyword.chars().collect();
    let mut rng = rand::thread_rng();
    let mut positions: Vec<usize> = emojis
        .iter()
        .map(|_| rand::Rng::gen_range(&mut rng, 0..=chars.len()))
        .collect();
    positions.sort_unstable_by(|a, b| b.cmp(a));
    for (pos, emoji) in positions.into_iter().zip(emojis.iter()) {
        chars.insert(pos.min(chars.len()), *emoji);
    }
    chars.into_iter().collect()
}

/// `keyword₁ + emoji₁ + keyword₂ + emoji₂ + keyword₃`, two distinct emojis.
fn build_title(keywords: &[String]) -> Option<String> {
    if keywords.len() < 3 {
        return None;
    }
    let emojis = pick_distinct_emojis(2);
    if emojis.len() < 2 {
        return None;
    }
    Some(format!(
        "{}{}{}{}{}",
        keywords[0], emojis[0], keywords[1], emojis[1], keywords[2]
    ))
}

/// 1-2 distinct emojis inserted at random rune positions in a raw keyword,
/// then entity-encoded.
fn build_keyword_emoji(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let count = if rand::Rng::gen_bool(&mut rand::thread_rng(), 0.5) {
        1
    } else {
        2
    };
    let emojis = pick_distinct_emojis(count);
    if emojis.is_empty() {
        return None;
    }
    let composed = insert_emojis_at_random_positions(raw, &emojis);
    Some(entity_encode(&composed))
}

struct CompositeGroup {
    tx: mpsc::Sender<String>,
    rx: parking_lot::Mutex<mpsc::Receiver<String>>,
    len: Arc<AtomicUsize>,
    capacity: usize,
    memory: MemoryTracker,
    consumed_count: AtomicU64,
    generated_count: AtomicU64,
    fallback_count: AtomicU64,
    worker_handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    stopped: Arc<AtomicBool>,
}

impl CompositeGroup {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: parking_lot::Mutex::new(rx),
            len: Arc::new(AtomicUsize::new(0)),
            capacity,
            memory: MemoryTracker::new(),
            consumed_count: AtomicU64::new(0),
            generated_count: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            worker_handles: parking_lot::Mutex::new(Vec::new()),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn drain(&self) {
        let mut rx = self.rx.lock();
        while let Ok(item) = rx.try_recv() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            self.memory.sub(sized_bytes(item.len()));
        }
    }

    fn abort_workers(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        for handle in self.worker_handles.lock().drain(..) {
            handle.abort();
        }
    }
}

pub struct CompositeGenerator {
    name: String,
    kind: CompositeKind,
    keywords: Arc<ReusablePool>,
    config: parking_lot::Mutex<CompositeConfig>,
    groups: DashMap<i64, Arc<CompositeGroup>>,
    running: AtomicBool,
}

impl CompositeGenerator {
    pub fn new(
        name: impl Into<String>,
        kind: CompositeKind,
        keywords: Arc<ReusablePool>,
        config: CompositeConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind,
            keywords,
            config: parking_lot::Mutex::new(config),
            groups: DashMap::new(),
            running: AtomicBool::new(false),
        })
    }

    fn generate_one(&self, gid: i64) -> Option<String> {
        match self.kind {
            CompositeKind::Title => {
                let keywords = self.keywords.get_random_n(gid, 3);
                build_title(&keywords)
            }
            CompositeKind::KeywordEmoji => {
                let raw = self.keywords.get_random(gid)?;
                build_keyword_emoji(&raw)
            }
        }
    }

    /// Retries `generate_one` against a non-empty upstream group: the only
    /// ways it can return `None` with keywords present are a transient
    /// unlucky draw (e.g. an empty raw keyword string), never sustained
    /// exhaustion, so a handful of retries is enough to never hand a caller
    /// a falsy empty result while real data exists. Returns `None` only when
    /// the upstream group itself has zero keywords loaded.
    fn generate_one_retrying(&self, gid: i64) -> Option<String> {
        if self.keywords.group_count(gid) == 0 {
            return None;
        }
        const ATTEMPTS: usize = 8;
        (0..ATTEMPTS).find_map(|_| self.generate_one(gid))
    }

    fn spawn_group_workers(self: &Arc<Self>, gid: i64, group: Arc<CompositeGroup>) {
        let worker_count = self.config.lock().worker_count;
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let this = self.clone();
            let group = group.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let (tick_interval, threshold) = {
                        let cfg = this.config.lock();
                        (cfg.tick_interval, cfg.threshold)
                    };
                    tokio::time::sleep(tick_interval).await;
                    if group.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    let len = group.len.load(Ordering::Relaxed);
                    if (len as f64) >= threshold * group.capacity as f64 {
                        continue;
                    }
                    if this.keywords.group_count(gid) == 0 {
                        continue;
                    }
                    loop {
                        let Some(item) = this.generate_one(gid) else {
                            break;
                        };
                        let bytes = sized_bytes(item.len());
                        match group.tx.try_send(item) {
                            Ok(()) => {
                                group.len.fetch_add(1, Ordering::Relaxed);
                                group.memory.add(bytes);
                                group.generated_count.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(_) => break,
                        }
                    }
                }
            });
            handles.push(handle);
        }
        *group.worker_handles.lock() = handles;
    }

    fn group_or_create(self: &Arc<Self>, gid: i64) -> Arc<CompositeGroup> {
        if let Some(g) = self.groups.get(&gid) {
            return g.clone();
        }
        let capacity = self.config.lock().capacity;
        let group = Arc::new(CompositeGroup::new(capacity));
        self.groups.insert(gid, group.clone());
        if self.running.load(Ordering::Relaxed) {
            self.spawn_group_workers(gid, group.clone());
        }
        group
    }

    /// Non-blocking. Falls back to a synchronous single-item generation when
    /// the group's queue is empty, so callers never see "unavailable".
    pub fn pop(self: &Arc<Self>, gid: i64) -> String {
        let group = self.group_or_create(gid);
        let popped = {
            let mut rx = group.rx.lock();
            rx.try_recv().ok()
        };
        match popped {
            Some(item) => {
                group.len.fetch_sub(1, Ordering::Relaxed);
                group.memory.sub(sized_bytes(item.len()));
                group.consumed_count.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                group.fallback_count.fetch_add(1, Ordering::Relaxed);
                group.consumed_count.fetch_add(1, Ordering::Relaxed);
                // Only a genuinely empty upstream group (0 keywords) reaches
                // `unwrap_or_default`; see `generate_one_retrying`.
                self.generate_one_retrying(gid).unwrap_or_default()
            }
        }
    }

    /// Drains the queue, adjusting memory accounting, then lets the next
    /// worker tick refill it from scratch.
    pub fn reload_group(self: &Arc<Self>, gid: i64) {
        let group = self.group_or_create(gid);
        group.drain();
    }

    /// Ensures every group id in `group_ids` has a running worker family,
    /// without disturbing groups already present.
    pub fn sync_groups(self: &Arc<Self>, group_ids: &[i64]) {
        for &gid in group_ids {
            self.group_or_create(gid);
        }
    }

    pub async fn reload(self: &Arc<Self>, config: CompositeConfig) {
        self.stop().await;
        *self.config.lock() = config;
        let gids: Vec<i64> = self.groups.iter().map(|e| *e.key()).collect();
        self.groups.clear();
        self.running.store(true, Ordering::SeqCst);
        for gid in gids {
            self.group_or_create(gid);
        }
    }

    pub fn group_ids(&self) -> Vec<i64> {
        self.groups.iter().map(|e| *e.key()).collect()
    }

    pub fn capacity(&self) -> usize {
        self.config.lock().capacity
    }

    /// In-place threshold/worker-count/tick-interval update, picked up by
    /// worker loops on their next iteration without a restart. Capacity is
    /// untouched here — a capacity change goes through [`Self::reload`].
    pub fn update_runtime_config(&self, worker_count: usize, threshold: f64, tick_interval: Duration) {
        let mut cfg = self.config.lock();
        cfg.worker_count = worker_count;
        cfg.threshold = threshold;
        cfg.tick_interval = tick_interval;
    }

    pub fn memory_bytes(&self) -> i64 {
        self.groups.iter().map(|e| e.value().memory.bytes()).sum()
    }
}

#[async_trait::async_trait]
impl PoolComponent for CompositeGenerator {
    async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for entry in self.groups.iter() {
            entry.value().abort_workers();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl PoolStats for CompositeGenerator {
    fn stats(&self) -> PoolStatSnapshot {
        let groups: Vec<GroupStat> = self
            .groups
            .iter()
            .map(|e| {
                let g = e.value();
                let used = g.len.load(Ordering::Relaxed) as i64;
                GroupStat {
                    id: e.key().to_string(),
                    name: e.key().to_string(),
                    count: used,
                    size: Some(g.capacity as i64),
                    available: Some(used),
                    used: Some(used),
                    utilization: Some(PoolStatSnapshot::utilization_of(used, g.capacity as i64)),
                    memory_bytes: Some(g.memory.bytes()),
                }
            })
            .collect();
        let size: i64 = groups.iter().filter_map(|g| g.size).sum();
        let used: i64 = groups.iter().map(|g| g.count).sum();
        PoolStatSnapshot {
            name: self.name.clone(),
            pool_type: PoolKind::Generated,
            size,
            available: used,
            used,
            utilization: PoolStatSnapshot::utilization_of(used, size),
            status: if self.is_running() {
                PoolStatus::Running
            } else {
                PoolStatus::Stopped
            },
            num_workers: self.config.lock().worker_count * self.groups.len(),
            last_refresh: now_epoch_secs(),
            memory_bytes: self.memory_bytes(),
            groups: Some(groups),
            source: None,
        }
    }
}

impl CompositeGenerator {
    pub fn lifecycle(&self) -> LifecycleState {
        if self.running.load(Ordering::Relaxed) {
            LifecycleState::Running
        } else {
            LifecycleState::Stopped
        }
    }
}
