use std::path::PathBuf;

use ::tracing::{error, info_span};
use anyhow::{anyhow, Result};
use clap::Parser;
use service::Service;

mod auth;
mod config;
mod coordinator;
mod gateway;
mod http_objects;
mod locks;
mod middleware;
mod reclaimer;
mod routes;
mod service;
mod tracing;
use tracing::setup_tracing;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| anyhow!("config path is not valid UTF-8: {:?}", path))?;
            config::ServerConfig::from_path(path)?
        }
        None => config::ServerConfig::from_env()?,
    };

    let tracing_provider = setup_tracing(&config).inspect_err(|e| {
        eprintln!("Error setting up tracing: {:?}", e);
    })?;

    let root_span = info_span!(
        "blobgate",
        env = config.env,
        "blobgate-instance" = config.instance_id()
    );
    let _guard = root_span.enter();

    match Service::new(config).await {
        Ok(service) => {
            if let Err(err) = service.start().await {
                error!("Error starting service: {:?}", err);
            }
        }
        Err(err) => error!("Error creating service: {:?}", err),
    }

    // export traces before shutdown
    if let Some(tracer_provider) = tracing_provider {
        if let Err(err) = tracer_provider.force_flush() {
            error!("Error flushing traces: {:?}", err);
        }
        if let Err(err) = tracer_provider.shutdown() {
            error!("Error shutting down tracer provider: {:?}", err);
        }
    }
    Ok(())
}
