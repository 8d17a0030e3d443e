// Pool types: generated strings (C2), FIFO consumables (C3), the update
// batcher (C3's write-back queue), reusable collections (C4), number ranges
// (C5), and composite generators (C6).

pub mod batcher;
pub mod composite;
pub mod consumable;
pub mod generated;
pub mod number_range;
pub mod reusable;

use crate::stats::PoolStatSnapshot;

/// Lifecycle shared by every pool type: `created -> running -> stopped`.
/// An adaptation of the teacher's `Component` trait, narrowed to the
/// three-state machine these pools actually need.
#[async_trait::async_trait]
pub trait PoolComponent: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Every pool type reports through this so the coordinator can build a
/// homogeneous stats list without per-type branching.
pub trait PoolStats {
    fn stats(&self) -> PoolStatSnapshot;
}

/// `created -> running -> stopped`, matching spec.md section 4.1's state
/// machine. `Stop` is idempotent via CAS on the `stopped` flag in each pool;
/// this just names the three observable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
}
