//! Stream sessions and the registry that owns them
//!
//! Lifecycle per client: `Idle → Active → Closed`. Chunk handling keeps a
//! session `Active`; ending the stream or disconnecting closes it and drops
//! it from the registry.
//!
//! Each session has a turn lock. Chunks from one client are processed one at
//! a time, and `end_stream` waits for the turn too, so an in-flight chunk
//! always finishes (and is answered) before its session is torn down.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::chunk::AudioChunk;
use super::pipeline::{PipelineResult, VoicePipeline};
use crate::error::Stage;
use crate::{Error, Result};

/// Lifecycle state of a stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Connected, no stream started yet
    Idle,
    /// Stream started, chunks accepted
    Active,
    /// Stream ended; terminal
    Closed,
}

/// How to treat a chunk from a client without an active stream
///
/// `Recreate` tolerates reconnecting clients that skip `startStream` or
/// keep talking after `endStream`: a fresh session is opened implicitly.
/// `Reject` answers such chunks with [`Error::UnknownSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownSessionPolicy {
    #[default]
    Recreate,
    Reject,
}

impl FromStr for UnknownSessionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "recreate" => Ok(Self::Recreate),
            "reject" => Ok(Self::Reject),
            other => Err(Error::Config(format!(
                "unknown session policy '{other}', expected 'recreate' or 'reject'"
            ))),
        }
    }
}

#[derive(Debug)]
struct SessionStatus {
    state: SessionState,
    last_activity: DateTime<Utc>,
    chunks_processed: u64,
}

/// One client's voice stream
#[derive(Debug)]
pub struct Session {
    client_id: String,
    started_at: DateTime<Utc>,
    status: Mutex<SessionStatus>,
    turn: tokio::sync::Mutex<()>,
}

impl Session {
    fn new(client_id: &str, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            client_id: client_id.to_string(),
            started_at: now,
            status: Mutex::new(SessionStatus {
                state,
                last_activity: now,
                chunks_processed: 0,
            }),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.with_status(|s| s.state)
    }

    #[must_use]
    pub fn chunks_processed(&self) -> u64 {
        self.with_status(|s| s.chunks_processed)
    }

    /// Point-in-time view for listings
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        self.with_status(|s| SessionInfo {
            client_id: self.client_id.clone(),
            state: s.state,
            started_at: self.started_at,
            last_activity: s.last_activity,
            chunks_processed: s.chunks_processed,
        })
    }

    fn set_state(&self, state: SessionState) {
        self.with_status(|s| {
            s.state = state;
            s.last_activity = Utc::now();
        });
    }

    /// Note chunk activity; only answered chunks count as processed
    fn record_chunk(&self, answered: bool) {
        self.with_status(|s| {
            if answered {
                s.chunks_processed += 1;
            }
            s.last_activity = Utc::now();
        });
    }

    fn with_status<T>(&self, f: impl FnOnce(&mut SessionStatus) -> T) -> T {
        // Status updates can't panic midway, so a poisoned lock still holds valid data
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut status)
    }
}

/// Serializable session summary
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub client_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub chunks_processed: u64,
}

/// Process-wide table of client sessions
///
/// Create one at startup and hand clones to whoever needs it; clones share
/// the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session by client ID
    pub async fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(client_id).cloned()
    }

    /// Register an idle session for a newly connected client
    ///
    /// Existing sessions are left untouched.
    pub async fn register(&self, client_id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(client_id, SessionState::Idle))),
        )
    }

    /// Mark the client's session active, creating it if needed
    ///
    /// Returns the session and whether a new one was created.
    pub async fn activate(&self, client_id: &str) -> (Arc<Session>, bool) {
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get(client_id) {
            if existing.state() != SessionState::Closed {
                existing.set_state(SessionState::Active);
                return (Arc::clone(existing), false);
            }
        }

        let session = Arc::new(Session::new(client_id, SessionState::Active));
        sessions.insert(client_id.to_string(), Arc::clone(&session));
        (session, true)
    }

    /// Remove the entry only if it is still `session`
    ///
    /// Protects a session created after `session` was closed.
    pub async fn remove_if_same(&self, client_id: &str, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(client_id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(client_id);
                true
            }
            _ => false,
        }
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Summaries of all registered sessions, oldest first
    pub async fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| s.info())
            .collect();
        infos.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.client_id.cmp(&b.client_id))
        });
        infos
    }
}

/// Sequences the voice pipeline for each client's stream
pub struct SessionManager {
    registry: SessionRegistry,
    pipeline: Arc<VoicePipeline>,
    policy: UnknownSessionPolicy,
}

impl SessionManager {
    #[must_use]
    pub fn new(registry: SessionRegistry, pipeline: Arc<VoicePipeline>) -> Self {
        Self {
            registry,
            pipeline,
            policy: UnknownSessionPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: UnknownSessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn policy(&self) -> UnknownSessionPolicy {
        self.policy
    }

    /// Register a newly connected client
    pub async fn connect(&self, client_id: &str) {
        self.registry.register(client_id).await;
        tracing::info!(client_id, "client connected");
    }

    /// Start (or keep) the client's stream
    ///
    /// Calling this twice before `end_stream` keeps the single session.
    pub async fn start_stream(&self, client_id: &str) -> SessionInfo {
        let (session, created) = self.registry.activate(client_id).await;
        tracing::info!(client_id, created, "voice stream started");
        session.info()
    }

    /// Process one chunk for a client
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error, or [`Error::UnknownSession`] when
    /// the policy is `Reject` and the client has no active stream
    pub async fn handle_chunk(&self, client_id: &str, chunk: AudioChunk) -> Result<PipelineResult> {
        loop {
            let session = self.active_session(client_id).await?;
            let _turn = session.turn.lock().await;

            // The stream may have ended while this chunk waited its turn
            if session.state() == SessionState::Closed {
                continue;
            }

            tracing::debug!(
                client_id,
                bytes = chunk.len(),
                mime_type = %chunk.mime_type,
                "processing voice chunk"
            );

            let result = self.pipeline.process(&chunk).await;
            session.record_chunk(matches!(&result, Ok(r) if !r.is_advisory()));

            if let Err(e) = &result {
                tracing::error!(
                    client_id,
                    stage = e.stage().map_or("pipeline", Stage::as_str),
                    error = %e,
                    "error processing voice chunk"
                );
            }

            return result;
        }
    }

    /// End the client's stream, waiting for any in-flight chunk first
    ///
    /// Returns `false` if the client had no session.
    pub async fn end_stream(&self, client_id: &str) -> bool {
        let Some(session) = self.registry.get(client_id).await else {
            tracing::debug!(client_id, "end requested for unknown stream");
            return false;
        };

        let _turn = session.turn.lock().await;
        session.set_state(SessionState::Closed);
        self.registry.remove_if_same(client_id, &session).await;

        tracing::info!(
            client_id,
            chunks = session.chunks_processed(),
            "voice stream ended"
        );
        true
    }

    /// Release the client's session after the connection drops
    pub async fn disconnect(&self, client_id: &str) {
        self.end_stream(client_id).await;
        tracing::info!(client_id, "client disconnected");
    }

    async fn active_session(&self, client_id: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.registry.get(client_id).await {
            if session.state() == SessionState::Active {
                return Ok(session);
            }
        }

        match self.policy {
            UnknownSessionPolicy::Reject => Err(Error::UnknownSession(client_id.to_string())),
            UnknownSessionPolicy::Recreate => {
                let (session, created) = self.registry.activate(client_id).await;
                tracing::info!(
                    client_id,
                    created,
                    "implicitly opened voice stream for chunk"
                );
                Ok(session)
            }
        }
    }
}
