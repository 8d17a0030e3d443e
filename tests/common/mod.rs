// Shared `PoolDataSource` fake for integration tests: in-memory rows, no
// real backend. Mirrors the unit-test fakes in `src/` but lives here so every
// integration test file can share one implementation.

use async_trait::async_trait;
use pagegen_pool::config::PoolSystemConfig;
use pagegen_pool::datasource::{ConsumableRow, ConsumableTag, PoolDataSource};
use pagegen_pool::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct FakeDataSource {
    pub consumable_rows: Mutex<VecDeque<ConsumableRow>>,
    pub keywords: Vec<String>,
    pub images: Vec<String>,
    pub marked_consumed: Mutex<Vec<i64>>,
}

impl FakeDataSource {
    pub fn new(keywords: Vec<String>, images: Vec<String>) -> Self {
        Self {
            consumable_rows: Mutex::new(VecDeque::new()),
            keywords,
            images,
            marked_consumed: Mutex::new(Vec::new()),
        }
    }

    pub fn seed_consumable(&self, rows: Vec<ConsumableRow>) {
        self.consumable_rows.lock().extend(rows);
    }
}

#[async_trait]
impl PoolDataSource for FakeDataSource {
    async fn fetch_consumable(
        &self,
        _tag: ConsumableTag,
        _group_id: i64,
        limit: i64,
    ) -> Result<Vec<ConsumableRow>> {
        let mut guard = self.consumable_rows.lock();
        let n = (limit.max(0) as usize).min(guard.len());
        Ok(guard.drain(..n).collect())
    }

    async fn mark_consumed(&self, _tag: ConsumableTag, id: i64) -> Result<()> {
        self.marked_consumed.lock().push(id);
        Ok(())
    }

    async fn fetch_keywords(&self, _group_id: i64) -> Result<Vec<String>> {
        Ok(self.keywords.clone())
    }

    async fn fetch_images(&self, _group_id: i64) -> Result<Vec<String>> {
        Ok(self.images.clone())
    }

    async fn load_pool_config(&self) -> Result<Option<PoolSystemConfig>> {
        Ok(None)
    }

    async fn upsert_pool_config(&self, _cfg: &PoolSystemConfig) -> Result<()> {
        Ok(())
    }
}
