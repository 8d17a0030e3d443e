// Reusable collection pool (C4): a group-id -> Vec<String> mapping held
// behind one atomic pointer. Every mutation builds a new top-level mapping
// and swaps it in with a compare-and-swap retry loop; reads load the
// pointer once and never observe a torn slice. Per-group round-robin
// indices live outside the snapshot so replacing it never disturbs a
// consumer's position in `NextInGroup`.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::memory::{sized_bytes, MemoryTracker};
use crate::pool::PoolStats;
use crate::stats::{now_epoch_secs, GroupStat, PoolKind, PoolStatSnapshot, PoolStatus};

/// Group consulted when a requested group-id is absent or empty — a
/// deliberate default-group convention so renderer call sites never need to
/// special-case an unconfigured site.
pub const DEFAULT_GROUP_ID: i64 = 1;

type Snapshot = HashMap<i64, Arc<Vec<String>>>;

pub struct ReusablePool {
    name: String,
    snapshot: ArcSwap<Snapshot>,
    round_robin: DashMap<i64, AtomicUsize>,
    memory: MemoryTracker,
}

impl ReusablePool {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            round_robin: DashMap::new(),
            memory: MemoryTracker::new(),
        })
    }

    fn bytes_of(items: &[String]) -> i64 {
        items.iter().map(|s| sized_bytes(s.len())).sum()
    }

    /// Replaces a group wholesale (used for initial load and full reload).
    pub fn load_group(&self, gid: i64, items: Vec<String>) {
        let added_bytes = Self::bytes_of(&items);
        let mut removed_bytes = 0i64;
        self.snapshot.rcu(|current| {
            let mut next = (**current).clone();
            if let Some(old) = next.insert(gid, Arc::new(items.clone())) {
                removed_bytes = Self::bytes_of(&old);
            }
            next
        });
        self.memory.add(added_bytes - removed_bytes);
    }

    pub fn append_to_group(&self, gid: i64, items: Vec<String>) {
        let added_bytes = Self::bytes_of(&items);
        self.snapshot.rcu(|current| {
            let mut next = (**current).clone();
            let mut merged = next.get(&gid).map(|v| (**v).clone()).unwrap_or_default();
            merged.extend(items.clone());
            next.insert(gid, Arc::new(merged));
            next
        });
        self.memory.add(added_bytes);
    }

    /// Replaces the group, or deletes it entirely if `items` is empty.
    pub fn reload_group(&self, gid: i64, items: Vec<String>) {
        let added_bytes = Self::bytes_of(&items);
        let mut removed_bytes = 0i64;
        self.snapshot.rcu(|current| {
            let mut next = (**current).clone();
            let old = if items.is_empty() {
                next.remove(&gid)
            } else {
                next.insert(gid, Arc::new(items.clone()))
            };
            if let Some(old) = old {
                removed_bytes = Self::bytes_of(&old);
            }
            next
        });
        self.memory.add(added_bytes - removed_bytes);
        self.round_robin.remove(&gid);
    }

    fn resolve_group(&self, gid: i64) -> Option<Arc<Vec<String>>> {
        let snap = self.snapshot.load();
        if let Some(v) = snap.get(&gid) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
        snap.get(&DEFAULT_GROUP_ID).cloned()
    }

    pub fn get_random(&self, gid: i64) -> Option<String> {
        let group = self.resolve_group(gid)?;
        if group.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..group.len());
        Some(group[idx].clone())
    }

    pub fn get_random_n(&self, gid: i64, n: usize) -> Vec<String> {
        let Some(group) = self.resolve_group(gid) else {
            return Vec::new();
        };
        if group.is_empty() {
            return Vec::new();
        }
        let mut rng = rand::thread_rng();
        (0..n)
            .map(|_| group[rng.gen_range(0..group.len())].clone())
            .collect()
    }

    /// Partial Fisher-Yates shuffle yielding `min(n, size)` distinct elements.
    pub fn get_unique(&self, gid: i64, n: usize) -> Vec<String> {
        let Some(group) = self.resolve_group(gid) else {
            return Vec::new();
        };
        let take = n.min(group.len());
        if take == 0 {
            return Vec::new();
        }
        let mut indices: Vec<usize> = (0..group.len()).collect();
        let mut rng = rand::thread_rng();
        for i in 0..take {
            let j = rng.gen_range(i..indices.len());
            indices.swap(i, j);
        }
        indices[..take].iter().map(|&i| group[i].clone()).collect()
    }

    pub fn get_all(&self, gid: i64) -> Vec<String> {
        self.resolve_group(gid)
            .map(|v| (*v).clone())
            .unwrap_or_default()
    }

    pub fn group_count(&self, gid: i64) -> usize {
        self.resolve_group(gid).map(|v| v.len()).unwrap_or(0)
    }

    /// Deterministic round-robin access, independent of snapshot identity.
    pub fn next_in_group(&self, gid: i64) -> Option<String> {
        let group = self.resolve_group(gid)?;
        if group.is_empty() {
            return None;
        }
        let counter = self
            .round_robin
            .entry(gid)
            .or_insert_with(|| AtomicUsize::new(0));
        let idx = counter.fetch_add(1, Ordering::Relaxed) % group.len();
        Some(group[idx].clone())
    }

    pub fn memory_bytes(&self) -> i64 {
        self.memory.bytes()
    }

    pub fn group_ids(&self) -> Vec<i64> {
        self.snapshot.load().keys().copied().collect()
    }
}

impl PoolStats for ReusablePool {
    fn stats(&self) -> PoolStatSnapshot {
        let snap = self.snapshot.load();
        let total: i64 = snap.values().map(|v| v.len() as i64).sum();
        let groups: Vec<GroupStat> = snap
            .iter()
            .map(|(gid, v)| GroupStat {
                id: gid.to_string(),
                name: gid.to_string(),
                count: v.len() as i64,
                size: None,
                available: None,
                used: None,
                utilization: None,
                memory_bytes: Some(Self::bytes_of(v)),
            })
            .collect();
        PoolStatSnapshot {
            name: self.name.clone(),
            pool_type: PoolKind::Reusable,
            size: total,
            available: total,
            used: total,
            utilization: 1.0,
            status: PoolStatus::Running,
            num_workers: 0,
            last_refresh: now_epoch_secs(),
            memory_bytes: self.memory_bytes(),
            groups: Some(groups),
            source: None,
        }
    }
}
