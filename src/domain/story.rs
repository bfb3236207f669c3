use serde::{Deserialize, Serialize};

/// A single entry of the story listing, as handed over by the listing parser.
///
/// The listing parser itself lives outside this crate; this is the boundary
/// record it produces. `is_self` distinguishes discussion-only entries (whose
/// link points back into the listing site) from external articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    /// Absolute URL of the linked page.
    pub url: String,
    /// Site domain of the linked page, when one could be derived.
    pub domain: Option<String>,
    /// True for self-referential discussion entries.
    pub is_self: bool,
    /// Absolute URL of the entry's discussion thread.
    pub comments_url: String,
    /// 1-based position in the listing.
    pub rank: usize,
}

impl Story {
    pub fn new(id: impl Into<String>, url: impl Into<String>, comments_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            url: url.into(),
            domain: None,
            is_self: false,
            comments_url: comments_url.into(),
            rank: 0,
        }
    }

    /// Whether this entry is eligible for preview-image resolution.
    ///
    /// Only external links with a resolvable domain are; self posts and
    /// domain-less entries keep their fallback visual.
    pub fn wants_thumbnail(&self) -> bool {
        !self.is_self && self.domain.is_some()
    }

    /// The URL the reader's article pane should load: the linked page for
    /// external entries, the discussion thread for self posts.
    pub fn article_url(&self) -> &str {
        if self.is_self {
            &self.comments_url
        } else {
            &self.url
        }
    }
}

/// Opaque handle tying a scheduled fetch back to its presentation element.
///
/// The scheduler never inspects it; it is carried through the task state
/// machine and handed back to the presentation sink on completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardHandle(pub String);

impl CardHandle {
    pub fn for_story(story: &Story) -> Self {
        Self(story.id.clone())
    }
}

impl std::fmt::Display for CardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a preview-image resolution.
///
/// `NoImage` is a first-class value, not an error: a page without a usable
/// image resolves negatively exactly once and the outcome is cached like any
/// other. Fetch failures are folded into `NoImage` by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute URL of the representative image.
    Image(String),
    /// The page was inspected and yielded no usable image.
    NoImage,
}

impl Resolution {
    pub fn from_option(url: Option<String>) -> Self {
        match url {
            Some(u) => Resolution::Image(u),
            None => Resolution::NoImage,
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            Resolution::Image(u) => Some(u),
            Resolution::NoImage => None,
        }
    }

    /// Encoding used by the durable cache tier. `NoImage` becomes the empty
    /// string so a negative outcome is distinguishable from an absent key.
    pub fn encode(&self) -> &str {
        match self {
            Resolution::Image(u) => u,
            Resolution::NoImage => "",
        }
    }

    pub fn decode(stored: &str) -> Self {
        if stored.is_empty() {
            Resolution::NoImage
        } else {
            Resolution::Image(stored.to_string())
        }
    }
}
