//! Locally dereferenceable `blob:` handles for blob store records.
//!
//! A handle stays valid until it is revoked. Resolving the same record version
//! twice returns the same handle; resolving a newer version of a record revokes
//! the handle of the older one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::models::MediaRecord;

const HANDLE_PREFIX: &str = "blob:suiyuan/";

/// Payload behind a live handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUrl {
    pub url: String,
    /// Record the handle was created for
    pub name: String,
    pub mime_type: String,
    /// Record version (`last_updated_at`) the handle was created for
    pub last_updated_at: i64,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_url: HashMap<String, ObjectUrl>,
    /// Record name -> live handle for its latest resolved version
    by_name: HashMap<String, String>,
}

/// Shared registry of live object URL handles.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle for `record`, creating one if this version has none yet.
    pub fn resolve(&self, record: &MediaRecord) -> String {
        let mut state = self.lock();

        if let Some(existing) = state.by_name.get(&record.name).cloned() {
            let same_version = state
                .by_url
                .get(&existing)
                .is_some_and(|entry| entry.last_updated_at == record.last_updated_at);
            if same_version {
                return existing;
            }
            state.by_url.remove(&existing);
            tracing::debug!(slot = %record.name, url = %existing, "Revoked stale object URL");
        }

        let url = format!("{HANDLE_PREFIX}{}", Uuid::now_v7());
        state.by_url.insert(
            url.clone(),
            ObjectUrl {
                url: url.clone(),
                name: record.name.clone(),
                mime_type: record.mime_type.clone(),
                last_updated_at: record.last_updated_at,
                bytes: Arc::from(record.blob.as_slice()),
            },
        );
        state.by_name.insert(record.name.clone(), url.clone());
        url
    }

    /// Payload behind a live handle.
    pub fn dereference(&self, url: &str) -> Option<ObjectUrl> {
        self.lock().by_url.get(url).cloned()
    }

    /// Release a handle. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.by_url.remove(url) else {
            return false;
        };
        if state.by_name.get(&entry.name).is_some_and(|live| live == url) {
            state.by_name.remove(&entry.name);
        }
        true
    }

    /// Release the handle for a record name, if any.
    pub fn revoke_name(&self, name: &str) -> bool {
        let url = self.lock().by_name.get(name).cloned();
        url.is_some_and(|url| self.revoke(&url))
    }

    pub fn live_count(&self) -> usize {
        self.lock().by_url.len()
    }

    /// Whether `value` looks like a handle produced by a registry.
    pub fn is_handle(value: &str) -> bool {
        value.starts_with("blob:")
    }
}
