use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Write half of a client connection. The registry only needs to push
/// text frames, so the seam is a single method; tests substitute channel
/// or stalling sinks here.
#[async_trait]
pub trait MessageSink: Send {
    async fn send_text(&mut self, message: String) -> Result<()>;
}

#[async_trait]
impl MessageSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, message: String) -> Result<()> {
        self.send(Message::Text(message.into())).await?;
        Ok(())
    }
}

struct SessionEntry {
    tx: mpsc::Sender<String>,
    task: JoinHandle<()>,
    /// Monotonic connection generation. A sender task only removes the
    /// entry it was spawned for; a newer connection under the same id
    /// keeps its entry when the old task winds down.
    epoch: u64,
    created_at: DateTime<Utc>,
}

/// Tracks the single live connection per session id and owns the
/// per-session sender task that drains a bounded outbound queue.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    next_epoch: AtomicU64,
    queue_capacity: usize,
    send_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize, send_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(0),
            queue_capacity,
            send_timeout,
        }
    }

    /// Registers a connection under `session_id`, displacing any prior
    /// connection with the same id. The spawned sender task drains the
    /// queue into `sink` until the queue closes or the sink errors. The
    /// returned epoch identifies this connection for [`Self::disconnect`].
    pub async fn connect<S>(self: &Arc<Self>, session_id: &str, sink: S) -> u64
    where
        S: MessageSink + 'static,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(Arc::clone(self).sender_loop(
            session_id.to_string(),
            epoch,
            rx,
            sink,
        ));

        let mut sessions = self.sessions.lock().await;
        let entry = SessionEntry {
            tx,
            task,
            epoch,
            created_at: Utc::now(),
        };
        if let Some(previous) = sessions.insert(session_id.to_string(), entry) {
            debug!(
                "replacing connection for session {session_id} (connected {})",
                previous.created_at
            );
            previous.task.abort();
        }
        epoch
    }

    /// Queues a message for the session. Returns false when the session
    /// has no live connection. A full queue drops the message rather than
    /// stalling the caller.
    pub async fn send(&self, session_id: &str, message: String) -> bool {
        let sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get(session_id) else {
            return false;
        };
        match entry.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("send queue full for session {session_id}; dropping message");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Tears down the connection registered under `epoch`, if it is still
    /// the live one. A lingering protocol loop tearing down after a
    /// reconnect must not evict its replacement. Closing the queue lets
    /// the sender task drain what was already accepted before it exits.
    pub async fn disconnect(&self, session_id: &str, epoch: u64) {
        self.remove_if_current(session_id, epoch).await;
    }

    pub async fn is_connected(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn sender_loop<S>(
        self: Arc<Self>,
        session_id: String,
        epoch: u64,
        mut rx: mpsc::Receiver<String>,
        mut sink: S,
    ) where
        S: MessageSink,
    {
        while let Some(message) = rx.recv().await {
            match tokio::time::timeout(self.send_timeout, sink.send_text(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("write to session {session_id} failed: {e}");
                    break;
                }
                Err(_) => {
                    // Slow consumer. The message is lost but the
                    // connection may recover, so keep draining.
                    warn!(
                        "write to session {session_id} timed out after {:?}",
                        self.send_timeout
                    );
                }
            }
        }
        self.remove_if_current(&session_id, epoch).await;
    }

    /// Removes the registry entry only if it still belongs to `epoch`.
    /// Without this guard a dying task could evict the connection that
    /// replaced it.
    async fn remove_if_current(&self, session_id: &str, epoch: u64) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(session_id)
            .is_some_and(|entry| entry.epoch == epoch)
        {
            sessions.remove(session_id);
            debug!("removed session {session_id}");
        }
    }
}
