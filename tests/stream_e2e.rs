use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use async_trait::async_trait;
use callguard::audio::encode_pcm16;
use callguard::auth::Claims;
use callguard::server::AppState;
use callguard::store::{AlertSink, CallStatus, HighRiskAlert, InMemoryCallStore, LogAlertSink};
use callguard::{router, Config};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "e2e-secret";

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().expect("valid address"),
        secret_key: SecretString::from(SECRET),
        allow_transient_sessions: true,
        receive_timeout: Duration::from_secs(15),
        send_timeout: Duration::from_secs(2),
        send_queue_capacity: 10,
        transcript_max_length: 5000,
        log_level: tracing::Level::INFO,
    }
}

async fn spawn_server(config: Config) -> (SocketAddr, Arc<AppState>, Arc<InMemoryCallStore>) {
    spawn_server_with_alerts(config, Arc::new(LogAlertSink)).await
}

async fn spawn_server_with_alerts(
    config: Config,
    alerts: Arc<dyn AlertSink>,
) -> (SocketAddr, Arc<AppState>, Arc<InMemoryCallStore>) {
    let store = Arc::new(InMemoryCallStore::new());
    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&store) as Arc<dyn callguard::store::CallStore>,
        alerts,
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("binds");
    let addr = listener.local_addr().expect("has local addr");
    let app = router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });
    (addr, state, store)
}

async fn connect(addr: SocketAddr, query: &str) -> WsClient {
    let url = format!("ws://{addr}/call/stream?{query}");
    let (client, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket connects");
    client
}

async fn read_json(client: &mut WsClient) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("response arrives in time")
        .expect("stream is open")
        .expect("frame is readable");
    match message {
        Message::Text(text) => serde_json::from_str(&text).expect("response is JSON"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn send_json(client: &mut WsClient, payload: Value) {
    client
        .send(Message::Text(payload.to_string().into()))
        .await
        .expect("send succeeds");
}

fn mint_token(sub: &str) -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
        + 3600;
    let claims = Claims {
        sub: Some(sub.to_string()),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token encodes")
}

/// Forwards every raised alert to a channel the test can observe.
struct RecordingAlertSink(tokio::sync::mpsc::UnboundedSender<HighRiskAlert>);

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn raise_alert(&self, alert: HighRiskAlert) -> anyhow::Result<()> {
        self.0
            .send(alert)
            .map_err(|_| anyhow::anyhow!("alert receiver closed"))?;
        Ok(())
    }
}

struct FailingAlertSink;

#[async_trait]
impl AlertSink for FailingAlertSink {
    async fn raise_alert(&self, _alert: HighRiskAlert) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("alert channel unavailable"))
    }
}

/// Loaded with keywords, scripted openers, and pressure tactics so that,
/// combined with a maximally uniform waveform, the overall score clears
/// the high-risk tier.
const HIGH_RISK_TRANSCRIPT: &str = "URGENT urgent urgent urgent: my name is alex, \
    i'm calling from your bank, this is regarding your bank account. act now with a \
    wire transfer, verify your identity with your password and credit card. do not \
    tell anyone, this is confidential and needs immediate action or legal action \
    follows!!!";

/// Alternating full-swing samples: flat per-frame energy and a maximal,
/// uniform zero-crossing rate.
fn synthetic_waveform(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
        .collect()
}

#[tokio::test]
async fn transcript_frame_yields_analysis_update() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=t1&create_if_missing=true").await;

    send_json(
        &mut client,
        json!({"transcript": "This is urgent, please make a wire transfer right away"}),
    )
    .await;

    let update = read_json(&mut client).await;
    let risk = update["risk_score"].as_f64().expect("risk is a number");
    assert!((0.0..=1.0).contains(&risk));
    let keywords: Vec<&str> = update["analysis"]["detected_keywords"]
        .as_array()
        .expect("keywords present")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(keywords.contains(&"urgent"));
    assert!(keywords.contains(&"wire transfer"));
    assert!(update["timestamp"].as_str().is_some());
    assert!(update.get("user").is_none());
}

#[tokio::test]
async fn malformed_json_reports_error_and_keeps_connection() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=t2&create_if_missing=true").await;

    client
        .send(Message::Text("this is not json".into()))
        .await
        .expect("send succeeds");
    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "invalid_json");

    // The connection survives transient errors.
    send_json(&mut client, json!({"transcript": "hello there"})).await;
    let update = read_json(&mut client).await;
    assert!(update["risk_score"].is_number());
}

#[tokio::test]
async fn unknown_frame_shape_reports_invalid_data_format() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=t3&create_if_missing=true").await;

    send_json(&mut client, json!({"foo": 1})).await;
    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "invalid_data_format");
}

#[tokio::test]
async fn oversized_transcript_reports_validation_error() {
    let mut config = test_config();
    config.transcript_max_length = 50;
    let (addr, _state, _store) = spawn_server(config).await;
    let mut client = connect(addr, "session_id=t4&create_if_missing=true").await;

    send_json(&mut client, json!({"transcript": "x".repeat(51)})).await;
    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "validation_error");
    assert_eq!(error["details"][0]["field"], "transcript");

    send_json(&mut client, json!({"transcript": "short enough"})).await;
    let update = read_json(&mut client).await;
    assert!(update["risk_score"].is_number());
}

#[tokio::test]
async fn unknown_session_without_opt_in_is_refused() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=nobody").await;

    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "Invalid session");

    let next = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("close arrives in time");
    match next {
        None | Some(Ok(Message::Close(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_sessions_can_be_disabled() {
    let mut config = test_config();
    config.allow_transient_sessions = false;
    let (addr, _state, _store) = spawn_server(config).await;
    let mut client = connect(addr, "session_id=t5&create_if_missing=true").await;

    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "Invalid session");
}

#[tokio::test]
async fn bad_bearer_token_is_refused_before_upgrade() {
    let (addr, state, _store) = spawn_server(test_config()).await;
    let url = format!("ws://{addr}/call/stream?session_id=t6&create_if_missing=true&token=garbage");
    let result = tokio_tungstenite::connect_async(url).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("expected HTTP 401 rejection, got {other:?}"),
    }
    assert!(!state.registry.is_connected("t6").await);
}

#[tokio::test]
async fn valid_bearer_token_attributes_updates() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let token = mint_token("analyst-1");
    let mut client = connect(
        addr,
        &format!("session_id=t7&create_if_missing=true&token={token}"),
    )
    .await;

    send_json(&mut client, json!({"transcript": "hello"})).await;
    let update = read_json(&mut client).await;
    assert_eq!(update["user"], "analyst-1");
}

#[tokio::test]
async fn audio_frame_yields_analysis_update() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=t8&create_if_missing=true").await;

    let samples: Vec<f32> = (0..1024)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect();
    send_json(&mut client, json!({"audio_data": encode_pcm16(&samples)})).await;
    let update = read_json(&mut client).await;
    let risk = update["risk_score"].as_f64().expect("risk is a number");
    assert!((0.0..=1.0).contains(&risk));
    assert!(update["analysis"]["sub_scores"]["acoustic"]
        .as_f64()
        .expect("acoustic present")
        > 0.0);
}

#[tokio::test]
async fn undecodable_audio_reports_invalid_audio_data() {
    let (addr, _state, _store) = spawn_server(test_config()).await;
    let mut client = connect(addr, "session_id=t9&create_if_missing=true").await;

    send_json(&mut client, json!({"audio_data": "%%%not-base64%%%"})).await;
    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "invalid_audio_data");
}

#[tokio::test]
async fn durable_sessions_persist_risk_and_final_status() {
    let (addr, _state, store) = spawn_server(test_config()).await;
    store.register("known-call").await;

    let mut client = connect(addr, "session_id=known-call").await;
    send_json(
        &mut client,
        json!({"transcript": "urgent wire transfer from your bank account"}),
    )
    .await;
    let update = read_json(&mut client).await;
    let risk = update["risk_score"].as_f64().expect("risk is a number");
    assert_eq!(store.risk_score("known-call").await, Some(risk));

    client.close(None).await.expect("close succeeds");
    // Teardown runs after the server sees the close.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.status("known-call").await == Some(CallStatus::Ended) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("status reaches ended");
}

#[tokio::test]
async fn high_risk_frame_raises_an_alert() {
    let (alert_tx, mut alert_rx) = tokio::sync::mpsc::unbounded_channel();
    let (addr, _state, _store) =
        spawn_server_with_alerts(test_config(), Arc::new(RecordingAlertSink(alert_tx))).await;
    let mut client = connect(addr, "session_id=a1&create_if_missing=true").await;

    send_json(
        &mut client,
        json!({
            "audio_data": encode_pcm16(&synthetic_waveform(1024)),
            "transcript": HIGH_RISK_TRANSCRIPT,
        }),
    )
    .await;
    let update = read_json(&mut client).await;
    let risk = update["risk_score"].as_f64().expect("risk is a number");
    assert!(risk > 0.7, "scenario should clear the alert threshold, got {risk}");

    let alert = tokio::time::timeout(Duration::from_secs(5), alert_rx.recv())
        .await
        .expect("alert arrives in time")
        .expect("alert channel is open");
    assert_eq!(alert.alert_type, "HIGH_RISK_DETECTED");
    assert!((alert.risk_score - risk).abs() < 1e-9);

    // A frame below the threshold raises nothing.
    send_json(&mut client, json!({"transcript": "hello there"})).await;
    let update = read_json(&mut client).await;
    assert!(update["risk_score"].as_f64().expect("risk is a number") <= 0.7);
    assert!(alert_rx.try_recv().is_err());
}

#[tokio::test]
async fn alert_delivery_failure_does_not_affect_responses() {
    let (addr, _state, _store) =
        spawn_server_with_alerts(test_config(), Arc::new(FailingAlertSink)).await;
    let mut client = connect(addr, "session_id=a2&create_if_missing=true").await;

    send_json(
        &mut client,
        json!({
            "audio_data": encode_pcm16(&synthetic_waveform(1024)),
            "transcript": HIGH_RISK_TRANSCRIPT,
        }),
    )
    .await;
    let update = read_json(&mut client).await;
    assert!(update["risk_score"].as_f64().expect("risk is a number") > 0.7);

    // The connection stays healthy after the failed fan-out.
    send_json(&mut client, json!({"transcript": "see you tomorrow"})).await;
    let update = read_json(&mut client).await;
    assert!(update["risk_score"].is_number());
}

#[tokio::test]
async fn idle_connection_times_out_with_error_frame() {
    let mut config = test_config();
    config.receive_timeout = Duration::from_millis(200);
    let (addr, state, _store) = spawn_server(config).await;
    let mut client = connect(addr, "session_id=t10&create_if_missing=true").await;

    let error = read_json(&mut client).await;
    assert_eq!(error["error"], "receive_timeout");

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.registry.is_connected("t10").await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry entry is cleaned up");
}
