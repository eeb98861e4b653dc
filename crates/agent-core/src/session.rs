//! Session Management
//!
//! A session owns one conversation history, its operating mode and the
//! working directory its tools act on. The [`SessionManager`] maps session
//! ids to sessions; each session processes one submission at a time while
//! different sessions run concurrently and share no mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{Agent, Outcome, Submission};
use crate::events::Observer;
use crate::gate::{Confirmer, InteractionGate};
use crate::message::{Conversation, Role, Turn};
use crate::tool::{DiffNotifier, ToolContext};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating mode gating destructive tools
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Destructive tools are withheld
    DryRun,
    /// Destructive tools execute
    ApplyFix,
}

/// A complete agent session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Conversation history
    pub conversation: Conversation,

    pub mode: Mode,

    /// Directory tools resolve relative paths against
    pub working_dir: PathBuf,

    /// Session title (user-set)
    pub title: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session
    pub fn new(id: SessionId, working_dir: impl Into<PathBuf>, mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation: Conversation::new(),
            mode,
            working_dir: working_dir.into(),
            title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Get or generate title
    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            // Generate from first user instruction
            self.conversation
                .turns()
                .iter()
                .find(|t| t.is_instruction())
                .map(|t| {
                    let text = t.text();
                    let preview: String = text.chars().take(50).collect();
                    if text.chars().count() > 50 {
                        format!("{}...", preview)
                    } else {
                        preview
                    }
                })
                .unwrap_or_else(|| format!("Session {}", self.id.0.chars().take(8).collect::<String>()))
        })
    }

    /// Number of turns in history
    pub fn turn_count(&self) -> usize {
        self.conversation.len()
    }

    /// Host-facing record: instruction and model text turns only
    pub fn to_record(&self) -> ConversationRecord {
        let messages = self
            .conversation
            .turns()
            .iter()
            .filter(|t| !t.has_tool_calls() && !t.has_tool_results())
            .map(|t| RecordMessage {
                text: t.text(),
                sender: match t.role {
                    Role::User => Sender::User,
                    Role::Model => Sender::Model,
                },
            })
            .collect();

        ConversationRecord {
            id: self.id.to_string(),
            title: self.title(),
            timestamp: self.updated_at,
            messages,
        }
    }
}

/// Who wrote a record message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub text: String,
    pub sender: Sender,
}

/// Minimal persisted conversation entity, owned by the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<RecordMessage>,
}

/// Record store trait for persistence
pub trait RecordStore: Send + Sync {
    /// Save a record
    fn save(&self, record: &ConversationRecord) -> crate::Result<()>;

    /// Load a record by ID
    fn load(&self, id: &str) -> crate::Result<Option<ConversationRecord>>;

    /// Delete a record
    fn delete(&self, id: &str) -> crate::Result<()>;

    /// Most recent records first
    fn list(&self, limit: usize) -> crate::Result<Vec<ConversationRecord>>;
}

/// In-memory record store (for development/testing)
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&self, record: &ConversationRecord) -> crate::Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> crate::Result<Option<ConversationRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(id).cloned())
    }

    fn delete(&self, id: &str) -> crate::Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.remove(id);
        Ok(())
    }

    fn list(&self, limit: usize) -> crate::Result<Vec<ConversationRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<_> = records.values().cloned().collect();

        // Sort by timestamp descending
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        result.truncate(limit);

        Ok(result)
    }
}

/// A session plus its cancellation slot
///
/// The token lives outside the session lock so it can be fired while a
/// submission holds the session.
pub struct SessionHandle {
    session: tokio::sync::Mutex<Session>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            cancel: Mutex::new(None),
        }
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn disarm(&self) {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Fire the in-flight token; false when nothing is running
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Owns every live session
pub struct SessionManager {
    agent: Arc<Agent>,
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    records: Option<Arc<dyn RecordStore>>,
    diff: Option<Arc<dyn DiffNotifier>>,
}

impl SessionManager {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            sessions: RwLock::new(HashMap::new()),
            records: None,
            diff: None,
        }
    }

    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_diff(mut self, diff: Arc<dyn DiffNotifier>) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Start or continue a chat session
    pub async fn submit(
        &self,
        id: &SessionId,
        text: &str,
        working_dir: impl Into<PathBuf>,
        observer: &dyn Observer,
    ) -> Outcome {
        let working_dir = working_dir.into();
        let handle = self.handle(id, &working_dir);
        let mut session = handle.session.lock().await;
        session.working_dir = working_dir;

        let cancel = handle.arm();
        let ctx = self.tool_context(&session.working_dir);
        let run = Submission {
            ctx: &ctx,
            cancel: &cancel,
            observer,
        };

        tracing::info!(session = %id, "Submission started");
        let outcome = self.agent.submit(&mut session, text, &run).await;
        handle.disarm();
        tracing::info!(session = %id, ?outcome, "Submission finished");

        self.persist(&session);
        outcome
    }

    /// Single-shot review with external confirmation
    pub async fn review(
        &self,
        id: &SessionId,
        instruction: &str,
        working_dir: impl Into<PathBuf>,
        confirmer: Arc<dyn Confirmer>,
        observer: &dyn Observer,
    ) -> Outcome {
        let working_dir = working_dir.into();
        let handle = self.handle(id, &working_dir);
        let mut session = handle.session.lock().await;
        session.working_dir = working_dir;

        let cancel = handle.arm();
        let ctx = self.tool_context(&session.working_dir);
        let gate = InteractionGate::new(confirmer);
        let run = Submission {
            ctx: &ctx,
            cancel: &cancel,
            observer,
        };

        tracing::info!(session = %id, "Review started");
        let outcome = self.agent.review(&mut session, instruction, &gate, &run).await;
        handle.disarm();
        tracing::info!(session = %id, ?outcome, "Review finished");

        self.persist(&session);
        outcome
    }

    /// Stop the in-flight provider call of a session
    pub fn cancel(&self, id: &SessionId) -> bool {
        self.get(id).is_some_and(|handle| handle.cancel())
    }

    /// Replace a session with a fresh one; the old history is abandoned
    pub fn reset(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(old) = sessions.get(id).cloned() else {
            return false;
        };
        old.cancel();

        let working_dir = old
            .session
            .try_lock()
            .map(|s| s.working_dir.clone())
            .unwrap_or_default();
        let fresh = Session::new(id.clone(), working_dir, self.agent.config().chat_mode);
        sessions.insert(id.clone(), Arc::new(SessionHandle::new(fresh)));
        tracing::info!(session = %id, "Session reset");
        true
    }

    /// Drop a session entirely
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of a session's history
    pub async fn history(&self, id: &SessionId) -> Option<Vec<Turn>> {
        let handle = self.get(id)?;
        let session = handle.session.lock().await;
        Some(session.conversation.turns().to_vec())
    }

    pub async fn record(&self, id: &SessionId) -> Option<ConversationRecord> {
        let handle = self.get(id)?;
        let session = handle.session.lock().await;
        Some(session.to_record())
    }

    fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Get or create the session for `id`
    fn handle(&self, id: &SessionId, working_dir: &Path) -> Arc<SessionHandle> {
        if let Some(handle) = self.get(id) {
            return handle;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::info!(session = %id, "Creating session");
                Arc::new(SessionHandle::new(Session::new(
                    id.clone(),
                    working_dir,
                    self.agent.config().chat_mode,
                )))
            })
            .clone()
    }

    fn tool_context(&self, working_dir: &Path) -> ToolContext {
        let ctx = ToolContext::new(working_dir);
        match &self.diff {
            Some(diff) => ctx.with_diff(diff.clone()),
            None => ctx,
        }
    }

    fn persist(&self, session: &Session) {
        if let Some(records) = &self.records {
            if let Err(e) = records.save(&session.to_record()) {
                tracing::warn!(session = %session.id, error = %e, "Failed to save conversation record");
            }
        }
    }
}
