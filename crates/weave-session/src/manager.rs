//! Session manager with LRU eviction.
//!
//! Live conversations are cached as actor handles. Evicting one shuts its
//! actor down; its reducer state is rebuilt by replaying the conversation
//! history into a fresh session.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::actor::{SessionHandle, spawn_session};
use crate::error::SessionError;
use crate::preferences::StorePreferences;
use crate::session_id::SessionId;

/// Configuration for the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionManagerConfig {
    /// Maximum number of live sessions.
    pub max_active_sessions: usize,

    /// Command queue depth of each session actor.
    pub command_buffer: usize,

    /// Broadcast capacity for session updates.
    pub update_buffer: usize,
}

impl SessionManagerConfig {
    pub fn new() -> Self {
        StorePreferences::default().into()
    }

    pub fn with_max_active(mut self, max: usize) -> Self {
        self.max_active_sessions = max;
        self
    }

    pub fn with_command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size;
        self
    }

    pub fn with_update_buffer(mut self, size: usize) -> Self {
        self.update_buffer = size;
        self
    }
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<StorePreferences> for SessionManagerConfig {
    fn from(prefs: StorePreferences) -> Self {
        Self {
            max_active_sessions: prefs.max_active_sessions,
            command_buffer: prefs.command_buffer,
            update_buffer: prefs.update_buffer,
        }
    }
}

pub struct SessionManager {
    active: LruCache<SessionId, SessionHandle>,
    config: SessionManagerConfig,
    shutting_down: bool,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Result<Self, SessionError> {
        let capacity = NonZeroUsize::new(config.max_active_sessions)
            .ok_or_else(|| SessionError::invalid_config("max_active_sessions must be > 0"))?;
        if config.command_buffer == 0 {
            return Err(SessionError::invalid_config("command_buffer must be > 0"));
        }
        if config.update_buffer == 0 {
            return Err(SessionError::invalid_config("update_buffer must be > 0"));
        }

        Ok(Self {
            active: LruCache::new(capacity),
            config,
            shutting_down: false,
        })
    }

    /// Returns the live handle for `session_id`, spawning a fresh session if
    /// there is none. May evict the least recently used session.
    pub fn get_or_create(&mut self, session_id: SessionId) -> Result<SessionHandle, SessionError> {
        if self.shutting_down {
            return Err(SessionError::ShuttingDown);
        }

        if let Some(handle) = self.active.get(&session_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
            tracing::debug!(session_id = %session_id, "Replacing stopped session");
            self.active.pop(&session_id);
        }

        if self.active.len() >= self.config.max_active_sessions {
            self.evict_lru();
        }

        let handle = spawn_session(
            session_id,
            self.config.command_buffer,
            self.config.update_buffer,
        );
        self.active.put(session_id, handle.clone());
        Ok(handle)
    }

    /// Get a session if it's already live.
    pub fn get(&mut self, session_id: SessionId) -> Option<SessionHandle> {
        self.active
            .get(&session_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.active.contains(&session_id)
    }

    /// Shuts down and forgets a session. Returns whether it was live.
    pub fn remove(&mut self, session_id: SessionId) -> bool {
        match self.active.pop(&session_id) {
            Some(handle) => {
                handle.shutdown();
                tracing::debug!(session_id = %session_id, "Removed session");
                true
            }
            None => false,
        }
    }

    /// Force eviction of the least recently used session.
    ///
    /// Returns the evicted session ID, if any.
    pub fn evict_lru(&mut self) -> Option<SessionId> {
        let (session_id, handle) = self.active.pop_lru()?;
        handle.shutdown();
        tracing::debug!(session_id = %session_id, "Evicted LRU session");
        Some(session_id)
    }

    /// Stops every session and refuses new ones.
    pub fn shutdown_all(&mut self) {
        self.shutting_down = true;
        while let Some((session_id, handle)) = self.active.pop_lru() {
            handle.shutdown();
            tracing::debug!(session_id = %session_id, "Stopped session");
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn capacity(&self) -> usize {
        self.config.max_active_sessions
    }
}
