// crates/server/src/registry.rs
//! Live-update subscribers: at most one WebSocket connection per session.
//!
//! Each connection is represented by the sending half of an unbounded channel
//! drained by that socket's writer task, so pushing a frame never blocks while
//! the registry lock is held. All access goes through one mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use docflow_core::{ProgressEvent, ProgressSink};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics;

/// A frame queued for one socket's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Send a close frame and stop writing.
    Close,
}

/// JSON text frames sent on the live-update channel, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage<'a> {
    Connected {
        session_id: &'a str,
        message: &'a str,
    },
    Progress(&'a ProgressEvent),
    Ping,
}

impl LiveMessage<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Push {
    Sent,
    Absent,
    Evicted,
}

struct Subscriber {
    connection_id: u64,
    tx: mpsc::UnboundedSender<Outbound>,
    connected_at: Instant,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<String, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Subscriber registry mutex poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Install `tx` as the session's connection, closing any previous one.
    /// Returns the id identifying this registration.
    pub fn register(&self, session_id: &str, tx: mpsc::UnboundedSender<Outbound>) -> u64 {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let count = {
            let mut subscribers = self.subscribers();
            let previous = subscribers.insert(
                session_id.to_string(),
                Subscriber {
                    connection_id,
                    tx,
                    connected_at: Instant::now(),
                },
            );
            if let Some(old) = previous {
                // The old writer may already be gone.
                let _ = old.tx.send(Outbound::Close);
                info!(
                    session_id,
                    replaced = old.connection_id,
                    "Replaced existing live connection"
                );
            }
            subscribers.len()
        };
        metrics::set_live_connections(count);
        info!(session_id, connection_id, total = count, "Live connection registered");
        connection_id
    }

    /// Queue a text frame for the session, evicting the connection when its
    /// writer has gone away. Lookup and send happen under one guard.
    fn push(&self, session_id: &str, text: String) -> Push {
        let count = {
            let mut subscribers = self.subscribers();
            let Some(subscriber) = subscribers.get(session_id) else {
                return Push::Absent;
            };
            if subscriber.tx.send(Outbound::Text(text)).is_ok() {
                return Push::Sent;
            }
            subscribers.remove(session_id);
            subscribers.len()
        };
        metrics::set_live_connections(count);
        warn!(session_id, "Removed dead live connection");
        Push::Evicted
    }

    /// Close and remove every registration older than `threshold`.
    pub fn reap_stale(&self, threshold: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(threshold) else {
            return 0;
        };
        let (reaped, count) = {
            let mut subscribers = self.subscribers();
            let before = subscribers.len();
            subscribers.retain(|session_id, sub| {
                if sub.connected_at < cutoff {
                    let _ = sub.tx.send(Outbound::Close);
                    debug!(session_id = %session_id, "Reaping stale live connection");
                    false
                } else {
                    true
                }
            });
            (before - subscribers.len(), subscribers.len())
        };
        if reaped > 0 {
            metrics::set_live_connections(count);
            info!(reaped, remaining = count, "Reaped stale live connections");
        }
        reaped
    }

    /// Remove and close the session's connection.
    pub fn unregister(&self, session_id: &str) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers();
            let removed = subscribers.remove(session_id);
            (removed, subscribers.len())
        };
        match removed {
            Some(sub) => {
                let _ = sub.tx.send(Outbound::Close);
                metrics::set_live_connections(count);
                true
            }
            None => false,
        }
    }

    /// Remove the session's registration only if it is still `connection_id`.
    /// A socket that was superseded must not evict its replacement.
    pub fn unregister_connection(&self, session_id: &str, connection_id: u64) -> bool {
        let count = {
            let mut subscribers = self.subscribers();
            match subscribers.get(session_id) {
                Some(sub) if sub.connection_id == connection_id => {
                    subscribers.remove(session_id);
                }
                _ => return false,
            }
            subscribers.len()
        };
        metrics::set_live_connections(count);
        info!(session_id, connection_id, remaining = count, "Live connection closed");
        true
    }

    pub fn len(&self) -> usize {
        self.subscribers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_registered(&self, session_id: &str) -> bool {
        self.subscribers().contains_key(session_id)
    }
}

impl ProgressSink for SubscriberRegistry {
    fn deliver(&self, session_id: &str, event: &ProgressEvent) -> bool {
        let text = match LiveMessage::Progress(event).to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(session_id, error = %e, "Failed to encode progress event");
                return false;
            }
        };

        let delivered = match self.push(session_id, text) {
            Push::Sent => true,
            Push::Evicted => false,
            Push::Absent => {
                warn!(
                    session_id,
                    document_id = %event.job_id,
                    stage = %event.stage,
                    "No live connection for session"
                );
                false
            }
        };
        metrics::record_progress_event(delivered);
        delivered
    }
}
