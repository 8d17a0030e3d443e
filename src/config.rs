// Configuration record recognized by the pool coordinator and hot-reload
// controller (spec.md section 6). Every field carries the default called out
// in the spec; the whole record is `Deserialize` so it can be loaded from a
// TOML file or upserted into the pool-configuration table's key-1 row.

use serde::{Deserialize, Serialize};

fn default_content_pool_size() -> i64 {
    2000
}
fn default_content_threshold() -> f64 {
    0.3
}
fn default_content_refill_interval_ms() -> u64 {
    2000
}

fn default_title_pool_size() -> usize {
    500
}
fn default_title_workers() -> usize {
    4
}
fn default_title_refill_interval_ms() -> u64 {
    1000
}
fn default_title_threshold() -> f64 {
    0.3
}

fn default_keyword_emoji_pool_size() -> usize {
    500
}
fn default_keyword_emoji_workers() -> usize {
    4
}
fn default_keyword_emoji_refill_interval_ms() -> u64 {
    1000
}
fn default_keyword_emoji_threshold() -> f64 {
    0.3
}

fn default_cls_pool_size() -> i64 {
    2000
}
fn default_cls_workers() -> usize {
    4
}
fn default_cls_refill_interval_ms() -> u64 {
    500
}
fn default_cls_threshold() -> f64 {
    0.3
}

fn default_url_pool_size() -> i64 {
    2000
}
fn default_url_workers() -> usize {
    4
}
fn default_url_refill_interval_ms() -> u64 {
    500
}
fn default_url_threshold() -> f64 {
    0.3
}

fn default_keywords_size() -> usize {
    5000
}
fn default_images_size() -> usize {
    5000
}
fn default_refresh_interval_ms() -> u64 {
    60_000
}

fn default_target_qps() -> f64 {
    500.0
}
fn default_safety_factor() -> f64 {
    1.5
}

/// Configuration record recognized by the pool system (spec.md section 6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSystemConfig {
    #[serde(default = "default_content_pool_size")]
    pub content_pool_size: i64,
    #[serde(default = "default_content_threshold")]
    pub content_threshold: f64,
    #[serde(default = "default_content_refill_interval_ms")]
    pub content_refill_interval_ms: u64,

    #[serde(default = "default_title_pool_size")]
    pub title_pool_size: usize,
    #[serde(default = "default_title_workers")]
    pub title_workers: usize,
    #[serde(default = "default_title_refill_interval_ms")]
    pub title_refill_interval_ms: u64,
    #[serde(default = "default_title_threshold")]
    pub title_threshold: f64,

    #[serde(default = "default_keyword_emoji_pool_size")]
    pub keyword_emoji_pool_size: usize,
    #[serde(default = "default_keyword_emoji_workers")]
    pub keyword_emoji_workers: usize,
    #[serde(default = "default_keyword_emoji_refill_interval_ms")]
    pub keyword_emoji_refill_interval_ms: u64,
    #[serde(default = "default_keyword_emoji_threshold")]
    pub keyword_emoji_threshold: f64,

    #[serde(default = "default_cls_pool_size")]
    pub cls_pool_size: i64,
    #[serde(default = "default_cls_workers")]
    pub cls_workers: usize,
    #[serde(default = "default_cls_refill_interval_ms")]
    pub cls_refill_interval_ms: u64,
    #[serde(default = "default_cls_threshold")]
    pub cls_threshold: f64,

    #[serde(default = "default_url_pool_size")]
    pub url_pool_size: i64,
    #[serde(default = "default_url_workers")]
    pub url_workers: usize,
    #[serde(default = "default_url_refill_interval_ms")]
    pub url_refill_interval_ms: u64,
    #[serde(default = "default_url_threshold")]
    pub url_threshold: f64,

    #[serde(default = "default_keywords_size")]
    pub keywords_size: usize,
    #[serde(default = "default_images_size")]
    pub images_size: usize,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Analyzer-level setting feeding `PoolSize(kind) = calls * targetQps * safetyFactor`.
    #[serde(default = "default_target_qps")]
    pub target_qps: f64,
    #[serde(default = "default_safety_factor")]
    pub safety_factor: f64,
}

impl Default for PoolSystemConfig {
    fn default() -> Self {
        Self {
            content_pool_size: default_content_pool_size(),
            content_threshold: default_content_threshold(),
            content_refill_interval_ms: default_content_refill_interval_ms(),
            title_pool_size: default_title_pool_size(),
            title_workers: default_title_workers(),
            title_refill_interval_ms: default_title_refill_interval_ms(),
            title_threshold: default_title_threshold(),
            keyword_emoji_pool_size: default_keyword_emoji_pool_size(),
            keyword_emoji_workers: default_keyword_emoji_workers(),
            keyword_emoji_refill_interval_ms: default_keyword_emoji_refill_interval_ms(),
            keyword_emoji_threshold: default_keyword_emoji_threshold(),
            cls_pool_size: default_cls_pool_size(),
            cls_workers: default_cls_workers(),
            cls_refill_interval_ms: default_cls_refill_interval_ms(),
            cls_threshold: default_cls_threshold(),
            url_pool_size: default_url_pool_size(),
            url_workers: default_url_workers(),
            url_refill_interval_ms: default_url_refill_interval_ms(),
            url_threshold: default_url_threshold(),
            keywords_size: default_keywords_size(),
            images_size: default_images_size(),
            refresh_interval_ms: default_refresh_interval_ms(),
            target_qps: default_target_qps(),
            safety_factor: default_safety_factor(),
        }
    }
}

impl PoolSystemConfig {
    pub fn from_toml_str(s: &str) -> crate::Result<Self> {
        toml::from_str(s).map_err(crate::PoolError::from)
    }
}
