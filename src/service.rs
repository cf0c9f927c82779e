use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use axum_server::Handle;
use blob_store::BlobStoreRegistry;
use metadata_store::MetadataStoreTS;
use tokio::{self, signal, sync::watch};
use tracing::{error, info};

use crate::{
    auth::StaticTokens,
    config::ServerConfig,
    coordinator::Coordinator,
    gateway::Gateway,
    middleware::RequestSpan,
    reclaimer::{ReclaimQueue, Reclaimer},
    routes::{create_routes, RouteState},
};

#[derive(Clone)]
pub struct Service {
    pub config: ServerConfig,
    pub shutdown_tx: watch::Sender<()>,
    pub gateway: Arc<Gateway>,
    pub reclaimer: Arc<Reclaimer>,
    pub reclaim_queue: ReclaimQueue,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let backends = BlobStoreRegistry::from_config(&config.blob_storage)
            .context("error initializing blob storage")?;
        let metadata = metadata_store::from_config(&config.metadata_store)
            .context("error initializing metadata store")?;
        Ok(Self::with_stores(config, backends, metadata))
    }

    /// Wire the service around already constructed stores.
    pub fn with_stores(
        config: ServerConfig,
        backends: BlobStoreRegistry,
        metadata: MetadataStoreTS,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let reclaim_queue = ReclaimQueue::default();

        let coordinator = Arc::new(Coordinator::new(
            backends.clone(),
            metadata.clone(),
            reclaim_queue.clone(),
            &config.coordinator,
        ));
        let reclaimer = Arc::new(Reclaimer::new(
            reclaim_queue.clone(),
            backends,
            metadata,
            coordinator.locks(),
            config.coordinator.call_timeout(),
            &config.reclaimer,
            shutdown_rx,
        ));
        let gateway = Arc::new(Gateway::new(coordinator.clone()));

        Self {
            config,
            shutdown_tx,
            gateway,
            reclaimer,
            reclaim_queue,
        }
    }

    pub fn routes(&self) -> Router {
        create_routes(RouteState {
            gateway: self.gateway.clone(),
            tokens: Arc::new(StaticTokens::new(self.config.api_tokens.iter().cloned())),
            max_body_bytes: self.config.max_body_bytes,
            request_span: RequestSpan::new(&self.config.env, &self.config.instance_id()),
        })
    }

    pub async fn start(&self) -> Result<()> {
        let reclaimer = self.reclaimer.clone();
        tokio::spawn(async move {
            reclaimer.start().await;
        });

        let handle = Handle::new();
        let handle_sh = handle.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh, shutdown_tx).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!(
            backends = ?self.gateway.backends(),
            "server api listening on {}", self.config.listen_addr
        );
        axum_server::bind(addr)
            .handle(handle)
            .serve(self.routes().into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle, shutdown_tx: watch::Sender<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {:?}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {:?}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.graceful_shutdown(None);
    if shutdown_tx.send(()).is_err() {
        error!("background tasks already stopped");
    }
    info!("signal received, shutting down server gracefully");
}
