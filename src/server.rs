use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::auth;
use crate::config::Config;
use crate::registry::SessionRegistry;
use crate::store::{AlertSink, CallStore};
use crate::stream;

/// Shared state handed to every connection handler.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub engine: AnalysisEngine,
    pub store: Arc<dyn CallStore>,
    pub alerts: Arc<dyn AlertSink>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CallStore>, alerts: Arc<dyn AlertSink>) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            config.send_queue_capacity,
            config.send_timeout,
        ));
        Self {
            config,
            registry,
            engine: AnalysisEngine::new(),
            store,
            alerts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub session_id: String,
    #[serde(default)]
    pub create_if_missing: bool,
    pub token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/call/stream", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Upgrades a call stream connection. Bearer credentials are checked
/// before the upgrade so a bad token is refused at the HTTP layer and
/// never reaches the session registry.
async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let user = match auth::bearer_from_request(&headers, params.token.as_deref()) {
        Some(token) => match auth::verify_bearer(&token, &state.config.secret_key) {
            Ok(subject) => {
                info!("authenticated stream for session {}: {subject}", params.session_id);
                Some(subject)
            }
            Err(e) => {
                warn!("rejected stream for session {}: {e}", params.session_id);
                return StatusCode::UNAUTHORIZED.into_response();
            }
        },
        None => None,
    };

    ws.on_upgrade(move |socket| stream::run(state, socket, params, user))
}
