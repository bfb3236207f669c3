use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::Result;
use crate::cache::{SessionStore, SqliteSessionStore, ThumbnailCache};
use crate::composer::DocumentComposer;
use crate::config::Config;
use crate::extractor::ImageExtractor;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::resolver::ThumbnailResolver;
use crate::scheduler::{spawn_fetch_scheduler, ThumbSink, VisibilityTracker};

pub struct AppContext {
    pub config: Config,
    pub cache: Arc<ThumbnailCache>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub resolver: Arc<ThumbnailResolver>,
    pub composer: DocumentComposer,
}

impl AppContext {
    /// Wire up the full pipeline. The session cache is in-memory unless a
    /// database path is given, in which case the host controls how long a
    /// "session" lives.
    pub fn new(config: Config, cache_db: Option<PathBuf>) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match cache_db {
            Some(path) => Arc::new(SqliteSessionStore::new(path)?),
            None => Arc::new(SqliteSessionStore::in_memory()?),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let cache = Arc::new(ThumbnailCache::new(store));
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::with_config(&config.fetcher));
        let extractor = ImageExtractor::new(config.scoring.clone());
        let resolver = Arc::new(ThumbnailResolver::new(
            fetcher.clone(),
            cache.clone(),
            extractor,
        ));
        let composer = DocumentComposer::new(fetcher.clone());

        Ok(Self {
            config,
            cache,
            fetcher,
            resolver,
            composer,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Config::default(), None)
    }

    /// Spawn the fetch scheduler delivering to `sink` and return a tracker
    /// for registering cards. Must be called from within a tokio runtime.
    pub fn spawn_scheduler<S: ThumbSink + 'static>(&self, sink: Arc<S>) -> VisibilityTracker {
        let handle = spawn_fetch_scheduler(
            self.resolver.clone(),
            sink,
            self.config.scheduler.concurrency,
        );
        VisibilityTracker::new(handle)
    }
}
