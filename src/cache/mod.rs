//! Two-tier preview-image cache.
//!
//! A fast in-process map in front of a durable-for-the-session key/value
//! store. Once a page has been resolved — to an image URL or to an explicit
//! negative — the outcome is final for the session: no expiry, no re-fetch.
//!
//! All durable-tier failures are swallowed here. This is the one place
//! StorageDegraded is handled; callers see a cache that quietly became
//! volatile-only.

pub mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::Result;
use crate::domain::Resolution;

pub use sqlite::SqliteSessionStore;

/// Durable per-session string store. Best-effort by contract: implementations
/// report failures, the cache decides to ignore them.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

const KEY_PREFIX: &str = "thumb::";

pub struct ThumbnailCache {
    mem: Mutex<HashMap<String, Resolution>>,
    durable: Arc<dyn SessionStore>,
}

impl ThumbnailCache {
    pub fn new(durable: Arc<dyn SessionStore>) -> Self {
        Self {
            mem: Mutex::new(HashMap::new()),
            durable,
        }
    }

    /// Look up a page URL. Consults the in-process tier first; on miss, the
    /// durable tier, populating the in-process tier on a hit there.
    /// `None` means "not yet resolved" — a cached negative comes back as
    /// `Some(Resolution::NoImage)`.
    pub fn get(&self, page_url: &str) -> Option<Resolution> {
        if let Some(hit) = self.lock_mem().get(page_url) {
            return Some(hit.clone());
        }

        match self.durable.get(&durable_key(page_url)) {
            Ok(Some(stored)) => {
                let resolution = Resolution::decode(&stored);
                self.lock_mem()
                    .insert(page_url.to_string(), resolution.clone());
                Some(resolution)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("session store read failed for {}: {}", page_url, e);
                None
            }
        }
    }

    /// Record an outcome in both tiers.
    pub fn set(&self, page_url: &str, value: &Resolution) {
        self.lock_mem()
            .insert(page_url.to_string(), value.clone());

        if let Err(e) = self.durable.set(&durable_key(page_url), value.encode()) {
            tracing::warn!("session store write failed, caching in memory only: {}", e);
        }
    }

    fn lock_mem(&self) -> std::sync::MutexGuard<'_, HashMap<String, Resolution>> {
        self.mem.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn durable_key(page_url: &str) -> String {
    format!("{}{}", KEY_PREFIX, page_url)
}
