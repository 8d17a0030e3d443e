// Number-range pool registry (C5): a fixed set of (min, max) ranges declared
// at construction, each backed by its own C2 generated-integer pool. A
// registry miss falls back to generating inline rather than failing.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use crate::pool::generated::{GeneratedPool, GeneratedPoolConfig};
use crate::pool::PoolComponent;

pub type Range = (i64, i64);

fn uniform_in_range(min: i64, max: i64) -> i64 {
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

pub struct NumberRangePool {
    pools: HashMap<Range, Arc<GeneratedPool<i64>>>,
}

impl NumberRangePool {
    pub fn new(ranges: &[Range], config: GeneratedPoolConfig) -> Arc<Self> {
        let mut pools = HashMap::new();
        for &(min, max) in ranges {
            let name = format!("number-range-{min}-{max}");
            let generator: Arc<dyn Fn() -> i64 + Send + Sync> =
                Arc::new(move || uniform_in_range(min, max));
            pools.insert((min, max), GeneratedPool::new(name, config, generator));
        }
        Arc::new(Self { pools })
    }

    /// Looks up the registry by the literal `(min, max)` pair; on miss,
    /// generates inline rather than failing.
    pub fn get(&self, min: i64, max: i64) -> i64 {
        match self.pools.get(&(min, max)) {
            Some(pool) => pool.get(),
            None => uniform_in_range(min, max),
        }
    }

    pub fn pool_for(&self, min: i64, max: i64) -> Option<&Arc<GeneratedPool<i64>>> {
        self.pools.get(&(min, max))
    }

    pub async fn start_all(&self) {
        for pool in self.pools.values() {
            pool.spawn_refill_loop();
            pool.start().await;
        }
    }

    pub async fn stop_all(&self) {
        for pool in self.pools.values() {
            pool.stop().await;
        }
    }

    pub fn ranges(&self) -> impl Iterator<Item = &Range> {
        self.pools.keys()
    }
}
