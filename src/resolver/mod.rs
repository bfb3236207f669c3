//! Single-page preview resolution: cache lookup, fetch, extraction, cache
//! write.
//!
//! `resolve` never fails. Network and timeout errors collapse into
//! [`Resolution::NoImage`], and that negative outcome is cached like a
//! positive one so the page is not fetched again this session. Concurrent
//! calls for the same key are not deduplicated here; the scheduler's
//! enqueue-once policy guarantees at most one call per page.

use std::sync::Arc;

use url::Url;

use crate::cache::ThumbnailCache;
use crate::domain::Resolution;
use crate::extractor::ImageExtractor;
use crate::fetcher::{FetchedPage, Fetcher};

pub struct ThumbnailResolver {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    cache: Arc<ThumbnailCache>,
    extractor: ImageExtractor,
}

impl ThumbnailResolver {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        cache: Arc<ThumbnailCache>,
        extractor: ImageExtractor,
    ) -> Self {
        Self {
            fetcher,
            cache,
            extractor,
        }
    }

    pub async fn resolve(&self, page_url: &str) -> Resolution {
        if let Some(hit) = self.cache.get(page_url) {
            tracing::debug!("thumbnail cache hit for {}", page_url);
            return hit;
        }

        let resolution = match self.fetcher.fetch(page_url).await {
            Ok(page) => self.extract_from_page(page_url, &page),
            Err(e) => {
                tracing::debug!("fetch of {} failed: {}", page_url, e);
                Resolution::NoImage
            }
        };

        self.cache.set(page_url, &resolution);
        resolution
    }

    fn extract_from_page(&self, page_url: &str, page: &FetchedPage) -> Resolution {
        // Relative references resolve against the post-redirect URL, falling
        // back to the requested one if the fetcher reported something unparsable.
        let base = Url::parse(&page.final_url).or_else(|_| Url::parse(page_url));
        let Ok(base) = base else {
            return Resolution::NoImage;
        };

        Resolution::from_option(self.extractor.extract(&page.body, &base).map(String::from))
    }
}
