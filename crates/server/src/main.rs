use clap::Parser;
use tracing_subscriber::EnvFilter;

use flagdeck_server::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flagdeck_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let args = Cli::parse();
    let config = flagdeck_core::Config::from_env();
    cli::dispatch(&config, args).await
}
