//! WebSocket session stream
//!
//! Clients send `submit`, `review`, `cancel` and `answer` frames and receive
//! session notifications as they happen. A review pauses on a `question`
//! frame until the client answers it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use agent_core::{Confirmer, ErrorKind, Notification, Observer, SessionId, SessionManager};

use crate::handlers::{outcome_label, working_dir};
use crate::state::AppState;

/// Frames accepted from the client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Submit {
        message: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        working_dir: Option<String>,
    },
    Review {
        message: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        working_dir: Option<String>,
    },
    Cancel,
    Answer {
        approved: bool,
    },
}

/// Frames sent to the client
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Notification(Notification),
    Control(Control),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// The session a socket is bound to
    Session { session_id: String },
    /// A review wants a yes/no answer
    Question { question: String },
    /// A submission finished
    Finished { session_id: String, outcome: &'static str },
}

type Outbox = mpsc::UnboundedSender<ServerFrame>;

fn push(outbox: &Outbox, frame: ServerFrame) {
    if outbox.send(frame).is_err() {
        tracing::debug!("Socket writer gone");
    }
}

/// Forwards session notifications onto the socket
struct SocketObserver(Outbox);

impl Observer for SocketObserver {
    fn notify(&self, notification: Notification) {
        push(&self.0, ServerFrame::Notification(notification));
    }
}

/// Confirmer answered by the client's next `answer` frame
///
/// An abandoned question (socket closed, answer never sent) counts as "no".
pub struct SocketConfirmer {
    outbox: Outbox,
    pending: Mutex<Option<oneshot::Sender<bool>>>,
}

impl SocketConfirmer {
    fn new(outbox: Outbox) -> Self {
        Self {
            outbox,
            pending: Mutex::new(None),
        }
    }

    /// Deliver an answer; false when nothing was waiting
    pub fn answer(&self, approved: bool) -> bool {
        let waiting = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        waiting.is_some_and(|tx| tx.send(approved).is_ok())
    }

    /// Drop any waiting question
    pub fn abandon(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[async_trait]
impl Confirmer for SocketConfirmer {
    async fn ask_yes_no(&self, question: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        push(
            &self.outbox,
            ServerFrame::Control(Control::Question {
                question: question.to_string(),
            }),
        );
        rx.await.unwrap_or(false)
    }
}

/// Sessions a socket has driven; the latest one is the default target
struct Bindings {
    current: SessionId,
    touched: HashSet<SessionId>,
}

impl Bindings {
    fn new() -> Self {
        let current = SessionId::new();
        Self {
            touched: HashSet::from([current.clone()]),
            current,
        }
    }

    /// Switch to a client-named session, announcing the change
    fn rebind(&mut self, requested: Option<String>, outbox: &Outbox) -> SessionId {
        if let Some(id) = requested.filter(|id| id != self.current.as_str()) {
            self.current = SessionId::from_string(id);
            self.touched.insert(self.current.clone());
            push(
                outbox,
                ServerFrame::Control(Control::Session {
                    session_id: self.current.to_string(),
                }),
            );
        }
        self.current.clone()
    }

    /// Stop generation in every session this socket touched
    fn cancel_all(&self, sessions: &SessionManager) -> usize {
        self.touched.iter().filter(|id| sessions.cancel(id)).count()
    }
}

/// WebSocket endpoint
pub async fn chat_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, inbox) = mpsc::unbounded_channel::<ServerFrame>();

    let writer = tokio::spawn(async move {
        let mut frames = UnboundedReceiverStream::new(inbox);
        while let Some(frame) = frames.next().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let confirmer = Arc::new(SocketConfirmer::new(outbox.clone()));
    let mut bindings = Bindings::new();
    push(
        &outbox,
        ServerFrame::Control(Control::Session {
            session_id: bindings.current.to_string(),
        }),
    );
    tracing::info!(session = %bindings.current, "Stream opened");

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                push(&outbox, protocol_error(format!("Invalid frame: {e}")));
                continue;
            }
        };

        match frame {
            ClientFrame::Submit {
                message,
                session_id,
                working_dir: dir,
            } => {
                let Some(root) = resolve_dir(&state, dir.as_deref(), &outbox) else {
                    continue;
                };
                let id = bindings.rebind(session_id, &outbox);
                let (state, outbox) = (state.clone(), outbox.clone());
                tokio::spawn(async move {
                    let observer = SocketObserver(outbox.clone());
                    let outcome = state.sessions.submit(&id, &message, root, &observer).await;
                    finished(&outbox, &id, outcome_label(outcome));
                });
            }
            ClientFrame::Review {
                message,
                session_id,
                working_dir: dir,
            } => {
                let Some(root) = resolve_dir(&state, dir.as_deref(), &outbox) else {
                    continue;
                };
                let id = bindings.rebind(session_id, &outbox);
                let (state, outbox) = (state.clone(), outbox.clone());
                let confirmer: Arc<dyn Confirmer> = confirmer.clone();
                tokio::spawn(async move {
                    let observer = SocketObserver(outbox.clone());
                    let outcome = state
                        .sessions
                        .review(&id, &message, root, confirmer, &observer)
                        .await;
                    finished(&outbox, &id, outcome_label(outcome));
                });
            }
            ClientFrame::Cancel => {
                let cancelled = state.sessions.cancel(&bindings.current);
                tracing::info!(session = %bindings.current, cancelled, "Cancel requested");
            }
            ClientFrame::Answer { approved } => {
                if !confirmer.answer(approved) {
                    push(&outbox, protocol_error("No question is waiting for an answer"));
                }
            }
        }
    }

    // Unblock a waiting review and stop whatever is still generating.
    // Running submissions keep outbox clones, so the writer is aborted
    // rather than drained.
    confirmer.abandon();
    let cancelled = bindings.cancel_all(&state.sessions);
    writer.abort();
    tracing::info!(session = %bindings.current, cancelled, "Stream closed");
}

fn resolve_dir(state: &AppState, dir: Option<&str>, outbox: &Outbox) -> Option<std::path::PathBuf> {
    match working_dir(state, dir) {
        Ok(root) => Some(root),
        Err((_, body)) => {
            push(outbox, protocol_error(body.0.error));
            None
        }
    }
}

fn finished(outbox: &Outbox, id: &SessionId, outcome: &'static str) {
    push(
        outbox,
        ServerFrame::Control(Control::Finished {
            session_id: id.to_string(),
            outcome,
        }),
    );
}

fn protocol_error(detail: impl Into<String>) -> ServerFrame {
    ServerFrame::Notification(Notification::Error {
        kind: ErrorKind::Generic,
        detail: detail.into(),
    })
}
