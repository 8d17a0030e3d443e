// Emitted stats record (spec.md section 6) — the homogeneous shape every
// pool type reports through so the coordinator can collect `Vec<PoolStatSnapshot>`
// without branching on pool type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    Consumable,
    Reusable,
    Static,
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStat {
    pub id: String,
    pub name: String,
    pub count: i64,
    pub size: Option<i64>,
    pub available: Option<i64>,
    pub used: Option<i64>,
    pub utilization: Option<f64>,
    pub memory_bytes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatSnapshot {
    pub name: String,
    pub pool_type: PoolKind,
    pub size: i64,
    pub available: i64,
    pub used: i64,
    pub utilization: f64,
    pub status: PoolStatus,
    pub num_workers: usize,
    pub last_refresh: u64,
    pub memory_bytes: i64,
    pub groups: Option<Vec<GroupStat>>,
    pub source: Option<String>,
}

impl PoolStatSnapshot {
    pub fn utilization_of(used: i64, size: i64) -> f64 {
        if size <= 0 {
            0.0
        } else {
            used as f64 / size as f64
        }
    }
}

pub fn now_epoch_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
