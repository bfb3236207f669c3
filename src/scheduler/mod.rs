//! Concurrency-limited, visibility-triggered fetch scheduling.
//!
//! The scheduler is an actor owning all queue state: a FIFO of pending tasks
//! and the count of active resolutions. Tasks move pending → active → done;
//! at every point `active <= limit`. Each completion, successful or not,
//! releases its slot, hands the outcome to the presentation sink, and
//! promotes the next pending task in enqueue order. A failing task can never
//! stall the queue.
//!
//! Enqueue-once is not enforced here; the [`VisibilityTracker`] consumes a
//! card's watch when it fires, so a target can only ever be reported once.

pub mod visibility;

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::{CardHandle, Resolution};
use crate::resolver::ThumbnailResolver;

pub use visibility::VisibilityTracker;

pub const DEFAULT_CONCURRENCY: usize = 3;

/// Scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum simultaneously in-flight resolutions (default: 3)
    pub concurrency: usize,

    /// Look-ahead distance in pixels. The embedding host arms its visibility
    /// observer with this margin so fetches start slightly before a card
    /// scrolls into view (default: 400).
    pub lookahead_margin_px: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            lookahead_margin_px: 400,
        }
    }
}

/// Presentation callback: invoked exactly once per completed task.
pub trait ThumbSink: Send + Sync {
    fn deliver(&self, handle: &CardHandle, outcome: &Resolution);
}

#[derive(Debug)]
enum SchedulerMessage {
    BecameVisible { target: String, handle: CardHandle },
    TaskDone { handle: CardHandle, outcome: Resolution },
    SetLimit(usize),
    Shutdown,
}

/// Handle to feed events into the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerMessage>,
}

impl SchedulerHandle {
    /// Enqueue a resolution task for `target`. Callers go through
    /// [`VisibilityTracker`], which guarantees this fires at most once per
    /// card.
    pub async fn report_visible(&self, target: String, handle: CardHandle) {
        let msg = SchedulerMessage::BecameVisible { target, handle };
        if let Err(e) = self.tx.send(msg).await {
            warn!("Failed to enqueue visibility event: {}", e);
        }
    }

    /// Change the concurrency limit. Takes effect immediately; newly freed
    /// headroom promotes pending tasks at once.
    pub async fn set_limit(&self, limit: usize) {
        let _ = self.tx.send(SchedulerMessage::SetLimit(limit)).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SchedulerMessage::Shutdown).await;
    }
}

struct FetchTask {
    target: String,
    handle: CardHandle,
}

/// The scheduler actor. Sole owner and writer of the pending queue and the
/// active count.
pub struct FetchScheduler<S: ThumbSink + 'static> {
    resolver: Arc<ThumbnailResolver>,
    sink: Arc<S>,
    rx: mpsc::Receiver<SchedulerMessage>,
    tx: mpsc::Sender<SchedulerMessage>,
    pending: VecDeque<FetchTask>,
    active: usize,
    limit: usize,
}

impl<S: ThumbSink + 'static> FetchScheduler<S> {
    pub fn new(
        resolver: Arc<ThumbnailResolver>,
        sink: Arc<S>,
        limit: usize,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(100);
        let handle = SchedulerHandle { tx: tx.clone() };
        let scheduler = Self {
            resolver,
            sink,
            rx,
            tx,
            pending: VecDeque::new(),
            active: 0,
            limit: limit.max(1),
        };
        (scheduler, handle)
    }

    /// Run the scheduler loop until shutdown or until every handle is gone.
    pub async fn run(mut self) {
        info!("Fetch scheduler started (limit {})", self.limit);

        while let Some(msg) = self.rx.recv().await {
            match msg {
                SchedulerMessage::BecameVisible { target, handle } => {
                    debug!("Card {} became visible, queueing {}", handle, target);
                    self.pending.push_back(FetchTask { target, handle });
                    self.promote();
                }
                SchedulerMessage::TaskDone { handle, outcome } => {
                    self.active -= 1;
                    self.sink.deliver(&handle, &outcome);
                    self.promote();
                }
                SchedulerMessage::SetLimit(limit) => {
                    self.limit = limit.max(1);
                    self.promote();
                }
                SchedulerMessage::Shutdown => {
                    info!("Fetch scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Promote pending tasks while slots are free, FIFO.
    fn promote(&mut self) {
        while self.active < self.limit {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            self.active += 1;

            let resolver = self.resolver.clone();
            let tx = self.tx.clone();
            let FetchTask { target, handle } = task;

            tokio::spawn(async move {
                // An inner spawn isolates panics in the resolution path;
                // the slot is released either way.
                let inner = {
                    let resolver = resolver.clone();
                    let target = target.clone();
                    tokio::spawn(async move { resolver.resolve(&target).await })
                };
                let outcome = match inner.await {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        error!("Thumbnail task for {} failed: {}", target, e);
                        Resolution::NoImage
                    }
                };
                let _ = tx.send(SchedulerMessage::TaskDone { handle, outcome }).await;
            });
        }
    }
}

/// Spawn the scheduler as a tokio task and return its handle.
pub fn spawn_fetch_scheduler<S: ThumbSink + 'static>(
    resolver: Arc<ThumbnailResolver>,
    sink: Arc<S>,
    limit: usize,
) -> SchedulerHandle {
    let (scheduler, handle) = FetchScheduler::new(resolver, sink, limit);

    tokio::spawn(async move {
        scheduler.run().await;
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::cache::{SessionStore, SqliteSessionStore, ThumbnailCache};
    use crate::extractor::ImageExtractor;
    use crate::fetcher::{FetchError, FetchedPage, Fetcher};

    /// Fetcher double that records the maximum number of concurrent calls.
    struct GaugeFetcher {
        current: AtomicUsize,
        max_seen: AtomicUsize,
        fail: bool,
    }

    impl GaugeFetcher {
        fn new(fail: bool) -> Self {
            Self {
                current: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for GaugeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(FetchError::Timeout);
            }
            Ok(FetchedPage {
                status: 200,
                final_url: url.to_string(),
                body: r#"<meta property="og:image" content="/og.png">"#.into(),
            })
        }
    }

    struct ChannelSink {
        tx: mpsc::UnboundedSender<(CardHandle, Resolution)>,
    }

    impl ThumbSink for ChannelSink {
        fn deliver(&self, handle: &CardHandle, outcome: &Resolution) {
            let _ = self.tx.send((handle.clone(), outcome.clone()));
        }
    }

    fn pipeline(
        fetcher: Arc<GaugeFetcher>,
        limit: usize,
    ) -> (
        SchedulerHandle,
        mpsc::UnboundedReceiver<(CardHandle, Resolution)>,
    ) {
        let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::in_memory().unwrap());
        let resolver = Arc::new(ThumbnailResolver::new(
            fetcher,
            Arc::new(ThumbnailCache::new(store)),
            ImageExtractor::default(),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_fetch_scheduler(resolver, Arc::new(ChannelSink { tx }), limit);
        (handle, rx)
    }

    #[tokio::test]
    async fn test_active_count_never_exceeds_limit() {
        let fetcher = Arc::new(GaugeFetcher::new(false));
        let (scheduler, mut rx) = pipeline(fetcher.clone(), 2);

        for i in 0..6 {
            scheduler
                .report_visible(
                    format!("https://site{}.example/post", i),
                    CardHandle(format!("card-{}", i)),
                )
                .await;
        }
        for _ in 0..6 {
            rx.recv().await.expect("delivery");
        }

        assert!(fetcher.max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_tasks_promoted_in_fifo_order() {
        let fetcher = Arc::new(GaugeFetcher::new(false));
        let (scheduler, mut rx) = pipeline(fetcher, 1);

        for name in ["a", "b", "c"] {
            scheduler
                .report_visible(
                    format!("https://{}.example/post", name),
                    CardHandle(name.to_string()),
                )
                .await;
        }

        let mut order = Vec::new();
        for _ in 0..3 {
            let (handle, _) = rx.recv().await.expect("delivery");
            order.push(handle.0);
        }
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failures_release_slots_and_drain_queue() {
        let fetcher = Arc::new(GaugeFetcher::new(true));
        let (scheduler, mut rx) = pipeline(fetcher, 1);

        for i in 0..3 {
            scheduler
                .report_visible(
                    format!("https://down{}.example/post", i),
                    CardHandle(format!("card-{}", i)),
                )
                .await;
        }

        // All three must complete negatively despite every fetch failing.
        for _ in 0..3 {
            let (_, outcome) = rx.recv().await.expect("delivery");
            assert_eq!(outcome, Resolution::NoImage);
        }
    }

    #[tokio::test]
    async fn test_successful_resolution_delivered_to_sink() {
        let fetcher = Arc::new(GaugeFetcher::new(false));
        let (scheduler, mut rx) = pipeline(fetcher, 3);

        scheduler
            .report_visible(
                "https://site.example/post".into(),
                CardHandle("card-1".into()),
            )
            .await;

        let (handle, outcome) = rx.recv().await.expect("delivery");
        assert_eq!(handle, CardHandle("card-1".into()));
        assert_eq!(
            outcome,
            Resolution::Image("https://site.example/og.png".into())
        );
    }

    #[tokio::test]
    async fn test_raising_limit_promotes_pending_tasks() {
        let fetcher = Arc::new(GaugeFetcher::new(false));
        let (scheduler, mut rx) = pipeline(fetcher.clone(), 1);

        for i in 0..4 {
            scheduler
                .report_visible(
                    format!("https://site{}.example/post", i),
                    CardHandle(format!("card-{}", i)),
                )
                .await;
        }
        scheduler.set_limit(4).await;

        for _ in 0..4 {
            rx.recv().await.expect("delivery");
        }
        assert!(fetcher.max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_default_scheduler_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.lookahead_margin_px, 400);
    }
}
