//! # Vignette
//!
//! Preview-image resolution and sandbox-ready document composition for
//! story listings.
//!
//! ## Architecture
//!
//! ```text
//! visibility event → FetchScheduler → ThumbnailResolver → presentation sink
//!                                          │
//!                            ThumbnailCache ┴ Fetcher → ImageExtractor
//!
//! reader open → DocumentComposer → ComposedDocument (injected, not navigated)
//! ```
//!
//! - [`scheduler`]: bounded-concurrency fetch queue fed by one-shot
//!   visibility triggers
//! - [`resolver`]: per-page cache → fetch → extract orchestration
//! - [`extractor`]: two-pass heuristic image extraction from raw markup
//! - [`cache`]: in-process map over a durable-for-the-session store
//! - [`composer`]: stylesheet-inlining composition for the sandboxed reader

/// Application context and error handling.
pub mod app;

/// Two-tier thumbnail cache and its SQLite session tier.
pub mod cache;

/// Command-line interface definitions.
pub mod cli;

/// Document composition for the reader pane.
pub mod composer;

/// Configuration loaded from `~/.config/vignette/config.toml`.
pub mod config;

/// Boundary types shared with the (external) listing parser and
/// presentation layer.
pub mod domain;

/// Preview-image extraction heuristics.
pub mod extractor;

/// HTTP fetching.
pub mod fetcher;

/// Single-page thumbnail resolution.
pub mod resolver;

/// Visibility-triggered, concurrency-limited scheduling.
pub mod scheduler;
