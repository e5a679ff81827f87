use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Active,
    Ended,
    Error,
}

/// Durable call record as seen by the core: an opaque identifier for
/// annotation plus the session key it was registered under.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub id: i64,
    pub session_id: String,
}

/// Persistence seam for call records. The core only reads existence and
/// writes per-frame risk plus lifecycle status; storage itself lives
/// outside this service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn find_call(&self, session_id: &str) -> Result<Option<CallRecord>>;
    async fn record_risk(&self, call_id: i64, risk_score: f64) -> Result<()>;
    async fn update_status(&self, call_id: i64, status: CallStatus) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct HighRiskAlert {
    pub call_id: i64,
    pub alert_type: &'static str,
    pub message: String,
    pub risk_score: f64,
}

impl HighRiskAlert {
    pub fn new(call_id: i64, risk_score: f64) -> Self {
        Self {
            call_id,
            alert_type: "HIGH_RISK_DETECTED",
            message: format!("High risk score detected: {risk_score:.2}"),
            risk_score,
        }
    }
}

/// Side-channel alert delivery. Fire-and-forget from the protocol loop's
/// point of view: delivery failure never fails the frame's own response.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise_alert(&self, alert: HighRiskAlert) -> Result<()>;
}

/// Alert sink that records the alert in the log, matching the auto-alert
/// behavior expected by operators tailing the service.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise_alert(&self, alert: HighRiskAlert) -> Result<()> {
        tracing::warn!(
            "Auto-alert triggered for call {}: {}",
            alert.call_id,
            serde_json::to_string(&alert)?
        );
        Ok(())
    }
}

#[derive(Debug)]
struct StoredCall {
    id: i64,
    risk_score: f64,
    status: CallStatus,
}

/// In-process call store used by the binary and tests; real deployments
/// substitute a database-backed implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryCallStore {
    calls: Mutex<HashMap<String, StoredCall>>,
    next_id: AtomicI64,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a durable call for the given session id and returns it.
    pub async fn register(&self, session_id: &str) -> CallRecord {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut calls = self.calls.lock().await;
        calls.insert(
            session_id.to_string(),
            StoredCall {
                id,
                risk_score: 0.0,
                status: CallStatus::Active,
            },
        );
        CallRecord {
            id,
            session_id: session_id.to_string(),
        }
    }

    pub async fn risk_score(&self, session_id: &str) -> Option<f64> {
        let calls = self.calls.lock().await;
        calls.get(session_id).map(|c| c.risk_score)
    }

    pub async fn status(&self, session_id: &str) -> Option<CallStatus> {
        let calls = self.calls.lock().await;
        calls.get(session_id).map(|c| c.status)
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn find_call(&self, session_id: &str) -> Result<Option<CallRecord>> {
        let calls = self.calls.lock().await;
        Ok(calls.get(session_id).map(|c| CallRecord {
            id: c.id,
            session_id: session_id.to_string(),
        }))
    }

    async fn record_risk(&self, call_id: i64, risk_score: f64) -> Result<()> {
        let mut calls = self.calls.lock().await;
        if let Some(call) = calls.values_mut().find(|c| c.id == call_id) {
            call.risk_score = risk_score;
        }
        Ok(())
    }

    async fn update_status(&self, call_id: i64, status: CallStatus) -> Result<()> {
        let mut calls = self.calls.lock().await;
        if let Some(call) = calls.values_mut().find(|c| c.id == call_id) {
            call.status = status;
        }
        Ok(())
    }
}
