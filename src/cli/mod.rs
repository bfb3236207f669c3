pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vignette")]
#[command(about = "Preview images and sandbox-ready documents for story listings", long_about = None)]
pub struct Cli {
    /// SQLite file for the session thumbnail cache (default: in-memory)
    #[arg(long, global = true)]
    pub cache_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve preview images for one or more pages
    Thumb {
        /// Page URLs to resolve
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum simultaneous fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Compose a page into a self-contained, sandbox-ready document
    Compose {
        /// Page URL to compose
        url: String,

        /// Write the markup to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
