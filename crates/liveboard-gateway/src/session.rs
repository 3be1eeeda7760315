//! Broadcast session: one subscriber, one producer, one ordered event queue.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use liveboard_core::{NormalizedEvent, SessionId, StreamMode};
use liveboard_upstream::{ChannelSink, ConnectionManager, SyntheticGenerator};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppState;

/// Entry in the gateway's active-session table.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub handle: String,
    pub mode: StreamMode,
    pub started_at: DateTime<Utc>,
}

enum Producer {
    Live {
        manager: Arc<ConnectionManager>,
        connect: JoinHandle<()>,
    },
    Demo {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
}

/// Owns the producer feeding one subscriber.
///
/// Dropping the session closes it: the producer is torn down before `drop`
/// returns and nothing it emits afterwards reaches the queue.
pub struct BroadcastSession {
    id: SessionId,
    state: Arc<AppState>,
    sink: ChannelSink,
    producer: Producer,
    /// Fired when the producer gave up (failed initial connect).
    finished: CancellationToken,
    closed: AtomicBool,
}

impl BroadcastSession {
    /// Register a session and start its producer.
    pub fn start(
        state: Arc<AppState>,
        handle: &str,
        mode: StreamMode,
    ) -> (Self, mpsc::UnboundedReceiver<NormalizedEvent>) {
        let id = SessionId::new();
        let (sink, rx) = ChannelSink::new();
        let finished = CancellationToken::new();

        let producer = match mode {
            StreamMode::Live => {
                let manager = Arc::new(ConnectionManager::new(
                    Arc::clone(&state.live),
                    Arc::new(sink.clone()),
                ));
                let connect = tokio::spawn({
                    let manager = Arc::clone(&manager);
                    let handle = handle.to_string();
                    let finished = finished.clone();
                    async move {
                        if manager.connect(&handle).await.is_err() {
                            finished.cancel();
                        }
                    }
                });
                Producer::Live { manager, connect }
            }
            StreamMode::Demo => {
                let cancel = CancellationToken::new();
                let tick = Duration::from_millis(state.config.demo.tick_ms);
                let task = SyntheticGenerator::new(handle, tick)
                    .spawn(Arc::new(sink.clone()), cancel.clone());
                Producer::Demo { cancel, task }
            }
        };

        state.sessions.insert(
            id.clone(),
            SessionMeta {
                handle: handle.to_string(),
                mode,
                started_at: Utc::now(),
            },
        );
        info!(session_id = %id, handle, mode = %mode, "broadcast session started");

        (
            Self {
                id,
                state,
                sink,
                producer,
                finished,
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Resolves once the producer will emit nothing more on its own.
    pub async fn finished(&self) {
        self.finished.cancelled().await
    }

    /// Tear down the producer and unregister. Runs at most once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.close();
        match &self.producer {
            Producer::Live { manager, connect } => {
                connect.abort();
                manager.disconnect();
            }
            Producer::Demo { cancel, task } => {
                cancel.cancel();
                task.abort();
            }
        }
        if self.state.sessions.remove(&self.id).is_none() {
            warn!(session_id = %self.id, "session missing from table on close");
        }
        info!(session_id = %self.id, "broadcast session closed");
    }
}

impl Drop for BroadcastSession {
    fn drop(&mut self) {
        self.close();
    }
}
