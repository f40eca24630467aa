mod adapters;
mod api;
mod config;
mod events;
mod openapi;
mod startup;
mod state;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "playqueue-server", version)]
pub(crate) struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:3000
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,playqueue_server=info")
        }))
        .init();

    startup::run(args).await
}
