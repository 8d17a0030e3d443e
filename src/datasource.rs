// Collaborator boundary toward the relational store (spec.md section 6).
//
// The core never speaks SQL directly; every table access goes through this
// trait so the crate builds and tests without a live database. Table
// identifiers used for status write-back are validated against the closed
// `ConsumableTag` allowlist before any implementation is allowed to
// interpolate them into a query.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PoolSystemConfig;
use crate::error::{PoolError, Result};

/// Closed set of recognized consumable pool-type tags. The tag gates which
/// backing table is queried; arbitrary strings must never reach a query
/// builder, so callers go through [`ConsumableTag::from_str_checked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsumableTag {
    Contents,
}

impl ConsumableTag {
    /// The allowlist gate: the only place a free-form string is allowed to
    /// become a tag. Returns `InvalidPoolType` for anything not recognized.
    pub fn from_str_checked(s: &str) -> Result<Self> {
        match s {
            "contents" => Ok(ConsumableTag::Contents),
            other => Err(PoolError::InvalidPoolType(other.to_string())),
        }
    }

    /// Backing table name for this tag.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConsumableTag::Contents => "contents",
        }
    }
}

/// A single row fetched by a refill query: `(id, text)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumableRow {
    pub id: i64,
    pub text: String,
}

/// The relational-store collaborator. Implementations own connection
/// pooling, retries, and timeouts; the pool/generator layer above only calls
/// these methods and treats any `Err` as `BackendUnavailable`-class failure
/// that degrades gracefully (logged, not propagated).
#[async_trait]
pub trait PoolDataSource: Send + Sync {
    /// `SELECT id, content FROM <table> WHERE group_id = ? AND status = 1
    ///  ORDER BY batch_id DESC, id ASC LIMIT ?`
    async fn fetch_consumable(
        &self,
        tag: ConsumableTag,
        group_id: i64,
        limit: i64,
    ) -> Result<Vec<ConsumableRow>>;

    /// `UPDATE <table> SET status = 0 WHERE id = ?`
    async fn mark_consumed(&self, tag: ConsumableTag, id: i64) -> Result<()>;

    /// Bulk read for C4 keyword snapshots.
    async fn fetch_keywords(&self, group_id: i64) -> Result<Vec<String>>;

    /// Bulk read for C4 image snapshots.
    async fn fetch_images(&self, group_id: i64) -> Result<Vec<String>>;

    /// Pool configuration upserted via a key-1 row; `None` if absent (the
    /// caller falls back to `PoolSystemConfig::default()`).
    async fn load_pool_config(&self) -> Result<Option<PoolSystemConfig>>;

    async fn upsert_pool_config(&self, cfg: &PoolSystemConfig) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_rejects_unknown_tags() {
        assert!(ConsumableTag::from_str_checked("contents").is_ok());
        assert!(matches!(
            ConsumableTag::from_str_checked("contents; DROP TABLE users"),
            Err(PoolError::InvalidPoolType(_))
        ));
    }
}
