use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::app::{AppContext, Result, VignetteError};
use crate::domain::{CardHandle, Resolution, Story};
use crate::scheduler::{spawn_fetch_scheduler, ThumbSink, VisibilityTracker};

struct ChannelSink {
    tx: mpsc::UnboundedSender<(CardHandle, Resolution)>,
}

impl ThumbSink for ChannelSink {
    fn deliver(&self, handle: &CardHandle, outcome: &Resolution) {
        let _ = self.tx.send((handle.clone(), outcome.clone()));
    }
}

/// Resolve preview images for the given pages through the full
/// tracker → scheduler → resolver pipeline, printing each outcome as it
/// completes.
pub async fn resolve_thumbs(
    ctx: &AppContext,
    urls: &[String],
    concurrency: Option<usize>,
) -> Result<()> {
    let limit = concurrency.unwrap_or(ctx.config.scheduler.concurrency);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = spawn_fetch_scheduler(ctx.resolver.clone(), Arc::new(ChannelSink { tx }), limit);
    let tracker = VisibilityTracker::new(scheduler.clone());

    let mut targets: HashMap<CardHandle, String> = HashMap::new();
    for (i, raw) in urls.iter().enumerate() {
        let url = Url::parse(raw)?;

        let mut story = Story::new((i + 1).to_string(), raw.clone(), raw.clone());
        story.domain = url.host_str().map(String::from);
        story.rank = i + 1;

        if !tracker.watch_story(&story) {
            println!("{}\t(skipped: no resolvable domain)", raw);
            continue;
        }

        let handle = CardHandle::for_story(&story);
        targets.insert(handle.clone(), raw.clone());
        // The CLI has no viewport; every card is "visible" immediately.
        tracker.report_visible(&handle).await;
    }

    for _ in 0..targets.len() {
        let (handle, outcome) = rx
            .recv()
            .await
            .ok_or_else(|| VignetteError::Other("scheduler stopped early".into()))?;
        let page = targets
            .get(&handle)
            .map(String::as_str)
            .unwrap_or("(unknown)");
        match outcome {
            Resolution::Image(image) => println!("{}\t{}", page, image),
            Resolution::NoImage => println!("{}\t(no image)", page),
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

/// Compose a page into a self-contained document and write its markup.
pub async fn compose_page(ctx: &AppContext, url: &str, output: Option<PathBuf>) -> Result<()> {
    let url = Url::parse(url)?;
    let doc = ctx.composer.compose(&url).await;

    match output {
        Some(path) => {
            std::fs::write(&path, &doc.markup)?;
            println!("Wrote composed document for {} to {}", doc.base_url, path.display());
        }
        None => println!("{}", doc.markup),
    }

    Ok(())
}
