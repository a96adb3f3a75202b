//! Query result cache
//!
//! Keys are SHA-256 hashes of the normalized (trimmed, lower-cased)
//! question text. With the default global scope the key is independent of
//! the session, so identical questions from different users share a hit.
//! That sharing is a deliberate, documented trade-off; session scope folds
//! the session id into the key for callers that cannot accept it.
//!
//! Entries expire passively: an entry past its TTL is removed on read and
//! never returned. `invalidate_all` is atomic with respect to concurrent
//! readers; a reader sees the cache either before or after the clear.

use crate::config::CacheScope;
use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Cached outcome of a successful query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    /// Session that originally computed the answer
    pub session_id: String,
}

struct CacheEntry {
    value: CachedAnswer,
    created_at: Instant,
}

/// In-memory query cache with TTL
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    scope: CacheScope,
}

/// Trim whitespace and lower-case, so trivially different phrasings of the
/// same question share a key
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

impl QueryCache {
    pub fn new(ttl: Duration, scope: CacheScope) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            scope,
        }
    }

    /// Cache key for a question under the configured scope
    pub fn key(&self, question: &str, session_id: &str) -> String {
        let normalized = normalize_question(question);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        if self.scope == CacheScope::Session {
            hasher.update(b"\x00");
            hasher.update(session_id.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Look up a previously computed answer. Expired entries are evicted
    /// here and never returned.
    pub fn get(&self, question: &str, session_id: &str) -> Result<Option<CachedAnswer>> {
        let key = self.key(question, session_id);

        {
            let entries = self
                .entries
                .read()
                .map_err(|_| RagError::Cache("Cache lock poisoned".to_string()))?;
            match entries.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.created_at.elapsed() <= self.ttl => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RagError::Cache("Cache lock poisoned".to_string()))?;
        if let Some(entry) = entries.get(&key) {
            if entry.created_at.elapsed() > self.ttl {
                entries.remove(&key);
            } else {
                // A concurrent put refreshed it in the meantime
                return Ok(Some(entry.value.clone()));
            }
        }
        Ok(None)
    }

    /// Store an answer. Last writer wins; the TTL restarts on every write.
    pub fn put(&self, question: &str, session_id: &str, value: CachedAnswer) -> Result<()> {
        let key = self.key(question, session_id);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RagError::Cache("Cache lock poisoned".to_string()))?;
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Drop every entry. Called by the ingestion pipeline whenever the
    /// corpus changes.
    pub fn invalidate_all(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RagError::Cache("Cache lock poisoned".to_string()))?;
        entries.clear();
        Ok(())
    }

    /// Number of live entries (expired ones may still be counted until
    /// their next read)
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str) -> CachedAnswer {
        CachedAnswer {
            answer: text.to_string(),
            sources: vec!["https://drive.google.com/doc1".to_string()],
            session_id: "s1".to_string(),
        }
    }

    fn cache() -> QueryCache {
        QueryCache::new(Duration::from_secs(3600), CacheScope::Global)
    }

    #[test]
    fn test_normalization() {
        assert_eq!(
            normalize_question("  How do I Create an Invoice?  "),
            "how do i create an invoice?"
        );
    }

    #[test]
    fn test_hit_after_put() {
        let cache = cache();
        cache.put("How do I invoice?", "s1", answer("Use the billing tab.")).unwrap();
        let hit = cache.get("how do i invoice?", "s2").unwrap().unwrap();
        assert_eq!(hit.answer, "Use the billing tab.");
    }

    #[test]
    fn test_global_scope_shares_across_sessions() {
        let cache = cache();
        assert_eq!(cache.key("Q?", "alice"), cache.key("Q?", "bob"));
    }

    #[test]
    fn test_session_scope_separates_sessions() {
        let cache = QueryCache::new(Duration::from_secs(3600), CacheScope::Session);
        assert_ne!(cache.key("Q?", "alice"), cache.key("Q?", "bob"));
        cache.put("Q?", "alice", answer("a")).unwrap();
        assert!(cache.get("Q?", "bob").unwrap().is_none());
        assert!(cache.get("Q?", "alice").unwrap().is_some());
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let cache = QueryCache::new(Duration::from_millis(10), CacheScope::Global);
        cache.put("Q?", "s1", answer("a")).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("Q?", "s1").unwrap().is_none());
        // Evicted on read
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = cache();
        cache.put("one", "s1", answer("1")).unwrap();
        cache.put("two", "s1", answer("2")).unwrap();
        assert_eq!(cache.len(), 2);
        cache.invalidate_all().unwrap();
        assert!(cache.is_empty());
        assert!(cache.get("one", "s1").unwrap().is_none());
    }

    #[test]
    fn test_put_resets_ttl() {
        let cache = QueryCache::new(Duration::from_millis(50), CacheScope::Global);
        cache.put("Q?", "s1", answer("old")).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        cache.put("Q?", "s1", answer("new")).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        // 60ms since first put, 30ms since refresh
        let hit = cache.get("Q?", "s1").unwrap().unwrap();
        assert_eq!(hit.answer, "new");
    }
}
