//! In-memory session store.
//!
//! Sessions are sharded by id in a [`DashMap`], so work on different
//! sessions never contends on a shared lock. Each slot carries its own
//! FIFO turn lock that keeps turns of one session in arrival order.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use wayfarer_core::types::{Role, Session, SessionId, TravelMode, Turn};

use crate::error::ChatError;
use crate::types::SessionSummary;

/// Held for the duration of one turn; dropping it admits the next turn.
pub type TurnGuard = OwnedMutexGuard<()>;

struct SessionSlot {
    session: Mutex<Session>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Owner of all live sessions.
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create a store whose sessions expire after `idle_timeout` without activity.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    /// Start a new, empty session.
    pub fn create(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .insert(id, Arc::new(SessionSlot::new(Session::new(id))));
        info!(session_id = %id, "Session created");
        id
    }

    /// Snapshot of a session.
    pub fn get(&self, id: SessionId) -> Result<Session, ChatError> {
        self.with_session(id, |session| session.clone())
    }

    /// Whether a live (non-expired) session exists.
    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_ok()
    }

    /// Wait for this session's previous turns to finish, then claim it.
    pub async fn begin_turn(&self, id: SessionId) -> Result<TurnGuard, ChatError> {
        let slot = self.slot(id)?;
        let guard = Arc::clone(&slot.turn_lock).lock_owned().await;
        // The session may have been removed while we queued.
        self.slot(id)?;
        Ok(guard)
    }

    /// Append a turn. Timestamps never go backwards within a session.
    pub fn append_turn(
        &self,
        id: SessionId,
        role: Role,
        text: impl Into<String>,
    ) -> Result<Turn, ChatError> {
        let text = text.into();
        self.with_session(id, move |session| {
            let mut timestamp = Utc::now();
            if let Some(last) = session.turns.last() {
                if timestamp < last.timestamp {
                    timestamp = last.timestamp;
                }
            }
            let turn = Turn {
                role,
                text,
                timestamp,
            };
            session.turns.push(turn.clone());
            turn
        })
    }

    /// Set the destination. A session without a mode moves to `Chat`.
    pub fn set_city(&self, id: SessionId, city: impl Into<String>) -> Result<(), ChatError> {
        let city = city.into();
        self.with_session(id, |session| {
            debug!(session_id = %id, city = %city, "City set");
            session.city = Some(city);
            if session.mode.is_unset() {
                session.mode = TravelMode::Chat;
            }
        })
    }

    /// Set the conversational mode.
    ///
    /// Refuses a concrete mode while no city is known, and refuses to
    /// clear the mode once a city exists.
    pub fn set_mode(&self, id: SessionId, mode: TravelMode) -> Result<(), ChatError> {
        self.with_session(id, |session| {
            match (session.city.is_some(), mode.is_unset()) {
                (false, false) => {
                    return Err(ChatError::InvalidModeTransition(format!(
                        "cannot set {} before a city is known",
                        mode
                    )))
                }
                (true, true) => {
                    return Err(ChatError::InvalidModeTransition(
                        "cannot unset the mode of a session with a city".to_string(),
                    ))
                }
                _ => {}
            }
            session.mode = mode;
            Ok(())
        })?
    }

    /// Record activity on a session.
    pub fn touch(&self, id: SessionId) -> Result<(), ChatError> {
        self.with_session(id, |session| {
            session.last_active_at = Utc::now();
        })
    }

    /// Delete a session.
    pub fn remove(&self, id: SessionId) -> Result<(), ChatError> {
        match self.sessions.remove(&id) {
            Some(_) => {
                info!(session_id = %id, "Session removed");
                Ok(())
            }
            None => Err(ChatError::SessionNotFound(id)),
        }
    }

    /// Summaries of all live sessions.
    pub fn list(&self) -> Vec<SessionSummary> {
        let slots: Vec<Arc<SessionSlot>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        slots
            .iter()
            .map(|slot| lock(&slot.session))
            .filter(|session| !self.is_expired(session))
            .map(|session| SessionSummary {
                id: session.id,
                city: session.city.clone(),
                mode: session.mode,
                turn_count: session.turns.len(),
                created_at: session.created_at,
                last_active_at: session.last_active_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether a session has been idle past the configured timeout.
    pub fn is_expired(&self, session: &Session) -> bool {
        let idle = Utc::now().signed_duration_since(session.last_active_at);
        idle.to_std().map(|d| d > self.idle_timeout).unwrap_or(false)
    }

    /// Drop idle sessions. Sessions with a turn in flight are kept.
    pub fn evict_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| {
            let busy = slot.turn_lock.try_lock().is_err();
            busy || !self.is_expired(&lock(&slot.session))
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    // -- Private helpers --

    fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>, ChatError> {
        let slot = self
            .sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ChatError::SessionNotFound(id))?;
        if self.is_expired(&lock(&slot.session)) {
            debug!(session_id = %id, "Session expired");
            return Err(ChatError::SessionNotFound(id));
        }
        Ok(slot)
    }

    pub(crate) fn with_session<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, ChatError> {
        let slot = self.slot(id)?;
        let mut session = lock(&slot.session);
        Ok(f(&mut session))
    }
}

fn lock(session: &Mutex<Session>) -> std::sync::MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Tests
// =============================================================================
