use serde::{Deserialize, Serialize};

/// Wire identifiers for every error the stream can report to a client.
///
/// The strings are part of the protocol; clients match on them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "Invalid session")]
    InvalidSession,
    #[serde(rename = "receive_timeout")]
    ReceiveTimeout,
    #[serde(rename = "invalid_json")]
    InvalidJson,
    #[serde(rename = "validation_error")]
    ValidationError,
    #[serde(rename = "invalid_audio_data")]
    InvalidAudioData,
    #[serde(rename = "invalid_data_format")]
    InvalidDataFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDetail {
    pub field: String,
    pub reason: String,
}

/// Error frame sent back on the same stream; the connection stays open for
/// transient errors and closes after session-fatal ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationDetail>>,
}

impl ErrorFrame {
    pub fn new(error: ErrorCode) -> Self {
        Self {
            error,
            details: None,
        }
    }

    pub fn with_details(error: ErrorCode, details: Vec<ValidationDetail>) -> Self {
        Self {
            error,
            details: Some(details),
        }
    }
}

/// Successful per-frame response. `analysis` is an opaque JSON document by
/// the time it reaches the sender; the sender never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisUpdate {
    pub risk_score: f64,
    pub analysis: serde_json::Value,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}
