//! Request cache with stale-while-revalidate semantics.
//!
//! Entries stay readable after [`QueryCache::invalidate_all`]; they are only
//! marked stale, and the next [`QueryCache::run`] re-fetches them. A re-fetch
//! whose content fingerprint matches the cached payload keeps the cached `Arc`,
//! so derivations keyed on pointer identity do not recompute. A failed re-fetch
//! keeps the last good payload next to the error as [`QueryState::Stale`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{Query, QueryState};
use crate::emr::{EmrApi, EmrError};

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fingerprint: String,
    stale: bool,
}

/// Cache of query results keyed by request key.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
}

/// SHA-256 of the serialized payload, hex encoded.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a query: cached if fresh, otherwise fetched and stored.
    pub fn run<Q: Query>(&mut self, api: &dyn EmrApi, query: &Q) -> QueryState<Q::Output> {
        let Some(key) = query.key() else {
            return QueryState::NoQuery;
        };
        if !query.is_applicable(api) {
            debug!(key = %key, "query not applicable");
            return QueryState::NotApplicable;
        }
        if !self.is_stale(&key) {
            if let Some(value) = self.cached::<Q::Output>(&key) {
                debug!(key = %key, "cache hit");
                return QueryState::Ready(value);
            }
        }

        let outcome = query
            .fetch(api)
            .and_then(|value| self.store(&key, value).map_err(EmrError::Decode));
        match outcome {
            Ok(value) => QueryState::Ready(value),
            Err(err) => {
                let error = Arc::new(err);
                match self.cached::<Q::Output>(&key) {
                    Some(data) => {
                        warn!(key = %key, error = %error, "revalidation failed, keeping last payload");
                        QueryState::Stale { data, error }
                    }
                    None => {
                        warn!(key = %key, error = %error, "query failed");
                        QueryState::Failed(error)
                    }
                }
            }
        }
    }

    /// Store a payload, reusing the cached `Arc` when the content is unchanged.
    fn store<T: Serialize + Send + Sync + 'static>(
        &mut self,
        key: &str,
        value: T,
    ) -> Result<Arc<T>, serde_json::Error> {
        let fingerprint = fingerprint(&value)?;

        if let Some(entry) = self.entries.get_mut(key) {
            if entry.fingerprint == fingerprint {
                if let Ok(existing) = Arc::clone(&entry.value).downcast::<T>() {
                    entry.stale = false;
                    debug!(key, "revalidated, payload unchanged");
                    return Ok(existing);
                }
            }
        }

        let value = Arc::new(value);
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
                fingerprint,
                stale: false,
            },
        );
        debug!(key, "stored new payload");
        Ok(value)
    }

    /// Last stored payload for a key, stale or not.
    fn cached<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .get(key)
            .and_then(|e| Arc::clone(&e.value).downcast::<T>().ok())
    }

    fn is_stale(&self, key: &str) -> bool {
        self.entries.get(key).map_or(true, |e| e.stale)
    }

    /// Mark every entry stale; the next run of each query re-fetches it.
    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
    }
}
