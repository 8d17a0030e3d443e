// Alert record emitted toward the alerting/metrics collaborator (spec.md
// section 6). The core never evaluates alert rules itself — that lives in
// the out-of-scope alerting collector — but it does need a sink trait to
// push samples through without taking a hard dependency on that collector.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub level: AlertLevel,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: u64,
    pub resolved: bool,
}

impl AlertRecord {
    pub fn new(
        id: impl Into<String>,
        level: AlertLevel,
        kind: impl Into<String>,
        message: impl Into<String>,
        value: f64,
        threshold: f64,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: id.into(),
            level,
            kind: kind.into(),
            message: message.into(),
            value,
            threshold,
            timestamp,
            resolved: false,
        }
    }
}

/// Boundary toward the alerting collaborator named in spec.md section 1/6.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: AlertRecord);
}

/// Discards everything; the default when no alerting collector is wired up.
#[derive(Debug, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn emit(&self, _alert: AlertRecord) {}
}

/// Routes alerts through `tracing` so they show up in structured logs even
/// without a real alerting collector attached.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn emit(&self, alert: AlertRecord) {
        match alert.level {
            AlertLevel::Info => tracing::info!(
                kind = %alert.kind, value = alert.value, threshold = alert.threshold,
                "{}", alert.message
            ),
            AlertLevel::Warning => tracing::warn!(
                kind = %alert.kind, value = alert.value, threshold = alert.threshold,
                "{}", alert.message
            ),
            AlertLevel::Error => tracing::error!(
                kind = %alert.kind, value = alert.value, threshold = alert.threshold,
                "{}", alert.message
            ),
        }
    }
}
