//! Per-session conversational memory
//!
//! Bounded FIFO window of recent exchanges per session. Appends beyond the
//! window evict the oldest entry. Safe under concurrent access from the
//! same session (two browser tabs): appends never lose each other, though
//! their relative order follows completion order. Sessions idle past the
//! expiry read back as empty; the store itself never deletes a session on
//! a failed query.

use crate::errors::{RagError, Result};
use crate::types::Exchange;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct SessionMemory {
    exchanges: VecDeque<Exchange>,
    last_active: Instant,
}

/// Bounded per-session exchange history
pub struct MemoryWindow {
    sessions: RwLock<HashMap<String, SessionMemory>>,
    window: usize,
    idle_expiry: Duration,
}

impl MemoryWindow {
    pub fn new(window: usize, idle_expiry: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window,
            idle_expiry,
        }
    }

    /// Append an exchange, evicting the oldest when the window is full
    pub fn append(&self, session_id: &str, exchange: Exchange) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| RagError::Cache("Memory store lock poisoned".to_string()))?;

        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionMemory {
                exchanges: VecDeque::with_capacity(self.window),
                last_active: Instant::now(),
            });

        // An expired session starts fresh rather than resuming stale history
        if session.last_active.elapsed() > self.idle_expiry {
            session.exchanges.clear();
        }

        if session.exchanges.len() >= self.window {
            session.exchanges.pop_front();
        }
        session.exchanges.push_back(exchange);
        session.last_active = Instant::now();

        Ok(())
    }

    /// Recent exchanges for a session, oldest first. Unknown or expired
    /// sessions read as empty.
    pub fn get(&self, session_id: &str) -> Result<Vec<Exchange>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| RagError::Cache("Memory store lock poisoned".to_string()))?;

        let exchanges = sessions
            .get(session_id)
            .filter(|s| s.last_active.elapsed() <= self.idle_expiry)
            .map(|s| s.exchanges.iter().cloned().collect())
            .unwrap_or_default();

        Ok(exchanges)
    }

    /// Drop a session's history (logout or explicit reset)
    pub fn clear(&self, session_id: &str) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| RagError::Cache("Memory store lock poisoned".to_string()))?;
        sessions.remove(session_id);
        Ok(())
    }

    /// Number of sessions currently tracked
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }
}
