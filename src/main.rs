use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vignette::app::AppContext;
use vignette::cli::{commands, Cli, Commands};
use vignette::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(config, cli.cache_db.clone())?;

    match cli.command {
        Commands::Thumb { urls, concurrency } => {
            commands::resolve_thumbs(&ctx, &urls, concurrency).await?;
        }
        Commands::Compose { url, output } => {
            commands::compose_page(&ctx, &url, output).await?;
        }
    }

    Ok(())
}
