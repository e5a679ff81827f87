use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::analysis::{RiskAssessment, HIGH_RISK_THRESHOLD};
use crate::audio;
use crate::server::{AppState, StreamParams};
use crate::store::{CallStatus, HighRiskAlert};
use crate::types::{
    AnalysisUpdate, AudioFrame, ErrorCode, ErrorFrame, InboundFrame, TranscriptFrame,
    ValidationDetail,
};

/// How the receive loop ended, which decides the stored call status.
enum Outcome {
    /// Peer closed or went idle past the receive timeout.
    Ended,
    /// Transport failure mid-stream.
    Failed,
}

/// Drives one call stream from admission to teardown.
pub async fn run(
    state: Arc<AppState>,
    mut socket: WebSocket,
    params: StreamParams,
    user: Option<String>,
) {
    let call_id = match admit(&state, &params).await {
        Ok(call_id) => call_id,
        Err(frame) => {
            if let Ok(text) = serde_json::to_string(&frame) {
                let _ = socket.send(Message::Text(text.into())).await;
            }
            let _ = socket.close().await;
            return;
        }
    };

    let session_id = params.session_id;
    info!(
        "call stream opened for session {session_id} (durable: {})",
        call_id.is_some()
    );

    let (sink, mut receiver) = socket.split();
    let epoch = state.registry.connect(&session_id, sink).await;

    let outcome = loop {
        let received =
            match tokio::time::timeout(state.config.receive_timeout, receiver.next()).await {
                Ok(received) => received,
                Err(_) => {
                    debug!("session {session_id} idle past receive timeout");
                    let frame = ErrorFrame::new(ErrorCode::ReceiveTimeout);
                    send_json(&state, &session_id, &frame).await;
                    break Outcome::Ended;
                }
            };

        match received {
            Some(Ok(Message::Text(text))) => {
                handle_frame(&state, &session_id, call_id, user.as_deref(), &text).await;
            }
            Some(Ok(Message::Close(_))) | None => break Outcome::Ended,
            Some(Ok(_)) => {} // pings and binary noise
            Some(Err(e)) => {
                warn!("transport error on session {session_id}: {e}");
                break Outcome::Failed;
            }
        }
    };

    if let Some(call_id) = call_id {
        let status = match outcome {
            Outcome::Ended => CallStatus::Ended,
            Outcome::Failed => CallStatus::Error,
        };
        if let Err(e) = state.store.update_status(call_id, status).await {
            error!("failed to record final status for call {call_id}: {e}");
        }
    }
    state.registry.disconnect(&session_id, epoch).await;
    info!("call stream closed for session {session_id}");
}

/// Resolves the session to a durable call, or admits it transiently when
/// the client asked for that and the deployment allows it. `Err` carries
/// the refusal frame to deliver before closing.
async fn admit(state: &AppState, params: &StreamParams) -> Result<Option<i64>, ErrorFrame> {
    match state.store.find_call(&params.session_id).await {
        Ok(Some(record)) => Ok(Some(record.id)),
        Ok(None) => {
            if params.create_if_missing && state.config.allow_transient_sessions {
                debug!("admitting transient session {}", params.session_id);
                Ok(None)
            } else {
                Err(ErrorFrame::new(ErrorCode::InvalidSession))
            }
        }
        Err(e) => {
            error!("call lookup failed for session {}: {e}", params.session_id);
            Err(ErrorFrame::new(ErrorCode::InvalidSession))
        }
    }
}

async fn handle_frame(
    state: &AppState,
    session_id: &str,
    call_id: Option<i64>,
    user: Option<&str>,
    text: &str,
) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            send_json(state, session_id, &ErrorFrame::new(ErrorCode::InvalidJson)).await;
            return;
        }
    };
    let frame: InboundFrame = match serde_json::from_value(value) {
        Ok(frame) => frame,
        Err(_) => {
            send_json(
                state,
                session_id,
                &ErrorFrame::new(ErrorCode::InvalidDataFormat),
            )
            .await;
            return;
        }
    };

    let assessment = match frame {
        InboundFrame::Audio(frame) => analyze_audio(state, session_id, frame).await,
        InboundFrame::Transcript(frame) => analyze_transcript(state, session_id, frame).await,
    };
    let Some(assessment) = assessment else {
        return;
    };

    if let Some(call_id) = call_id {
        if let Err(e) = state.store.record_risk(call_id, assessment.risk_score).await {
            error!("failed to record risk for call {call_id}: {e}");
        }
    }

    if assessment.risk_score > HIGH_RISK_THRESHOLD {
        let alert = HighRiskAlert::new(call_id.unwrap_or(0), assessment.risk_score);
        let alerts = Arc::clone(&state.alerts);
        tokio::spawn(async move {
            if let Err(e) = alerts.raise_alert(alert).await {
                error!("alert delivery failed: {e}");
            }
        });
    }

    let update = AnalysisUpdate {
        risk_score: assessment.risk_score,
        analysis: match serde_json::to_value(&assessment) {
            Ok(value) => value,
            Err(e) => {
                error!("assessment failed to serialize: {e}");
                return;
            }
        },
        timestamp: Utc::now().to_rfc3339(),
        user: user.map(str::to_string),
    };
    send_json(state, session_id, &update).await;
}

async fn analyze_transcript(
    state: &AppState,
    session_id: &str,
    frame: TranscriptFrame,
) -> Option<RiskAssessment> {
    if !transcript_within_limit(state, session_id, &frame.transcript).await {
        return None;
    }
    Some(state.engine.analyze_transcript(&frame.transcript))
}

async fn analyze_audio(
    state: &AppState,
    session_id: &str,
    frame: AudioFrame,
) -> Option<RiskAssessment> {
    if let Some(transcript) = &frame.transcript {
        if !transcript_within_limit(state, session_id, transcript).await {
            return None;
        }
    }
    let samples = match audio::decode_pcm16(&frame.audio_data) {
        Ok(samples) => samples,
        Err(e) => {
            debug!("rejecting audio frame on session {session_id}: {e}");
            send_json(
                state,
                session_id,
                &ErrorFrame::new(ErrorCode::InvalidAudioData),
            )
            .await;
            return None;
        }
    };
    Some(state.engine.analyze_audio(&samples, frame.transcript.as_deref()))
}

async fn transcript_within_limit(state: &AppState, session_id: &str, transcript: &str) -> bool {
    let limit = state.config.transcript_max_length;
    let length = transcript.chars().count();
    if length <= limit {
        return true;
    }
    let frame = ErrorFrame::with_details(
        ErrorCode::ValidationError,
        vec![ValidationDetail {
            field: "transcript".to_string(),
            reason: format!("length {length} exceeds maximum of {limit} characters"),
        }],
    );
    send_json(state, session_id, &frame).await;
    false
}

async fn send_json<T: serde::Serialize>(state: &AppState, session_id: &str, payload: &T) {
    match serde_json::to_string(payload) {
        Ok(text) => {
            if !state.registry.send(session_id, text).await {
                debug!("no live connection for session {session_id}; response dropped");
            }
        }
        Err(e) => error!("outbound payload failed to serialize: {e}"),
    }
}
