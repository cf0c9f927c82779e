use std::{env, net::SocketAddr};

use anyhow::{anyhow, Result};
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use metadata_store::MetadataStoreConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{coordinator::CoordinatorConfig, reclaimer::ReclaimerConfig};

const ENV_PREFIX: &str = "BLOBGATE_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Bearer tokens accepted on `/v1`.
    #[serde(default = "default_api_tokens")]
    pub api_tokens: Vec<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default)]
    pub metadata_store: MetadataStoreConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub reclaimer: ReclaimerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    #[serde(default)]
    pub enable_tracing: bool,
    /// OTLP collector, e.g. `http://localhost:4317`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Log JSON lines instead of compact text.
    #[serde(default)]
    pub structured_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: default_env(),
            instance_id: None,
            listen_addr: default_listen_addr(),
            api_tokens: default_api_tokens(),
            max_body_bytes: default_max_body_bytes(),
            blob_storage: Default::default(),
            metadata_store: Default::default(),
            coordinator: Default::default(),
            reclaimer: Default::default(),
            telemetry: Default::default(),
        }
    }
}

fn default_env() -> String {
    "local".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8900".to_string()
}

fn default_api_tokens() -> Vec<String> {
    vec!["hello1234".to_string()]
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

impl ServerConfig {
    /// Load a YAML file, overridden by `BLOBGATE_` environment variables.
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::extract(Figment::new().merge(Yaml::string(&config_str)))
    }

    /// Defaults overridden by `BLOBGATE_` environment variables.
    pub fn from_env() -> Result<ServerConfig> {
        Self::extract(Figment::from(Serialized::defaults(ServerConfig::default())))
    }

    fn extract(figment: Figment) -> Result<ServerConfig> {
        let config: ServerConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        if self.api_tokens.iter().all(|token| token.trim().is_empty()) {
            return Err(anyhow!("at least one api token is required"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than zero"));
        }
        if self.coordinator.call_timeout_ms == 0 {
            return Err(anyhow!("coordinator.call_timeout_ms must be greater than zero"));
        }
        if self.reclaimer.interval_ms == 0 {
            return Err(anyhow!("reclaimer.interval_ms must be greater than zero"));
        }
        if let Some(object_store) = &self.blob_storage.object_store {
            let endpoint = Url::parse(&object_store.endpoint)
                .map_err(|e| anyhow!("invalid object store endpoint {}: {}", object_store.endpoint, e))?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "object store endpoint must be http or https: {}",
                    object_store.endpoint
                ));
            }
            if object_store.bucket.is_empty() {
                return Err(anyhow!("object store bucket must not be empty"));
            }
            if object_store.request_timeout_ms == 0 {
                return Err(anyhow!(
                    "blob_storage.object_store.request_timeout_ms must be greater than zero"
                ));
            }
        }
        if self.blob_storage.local.is_none()
            && self.blob_storage.table.is_none()
            && self.blob_storage.object_store.is_none()
        {
            return Err(anyhow!("at least one blob storage backend is required"));
        }
        Ok(())
    }

    pub fn instance_id(&self) -> String {
        self.instance_id.clone().unwrap_or_else(|| {
            let host = env::var("HOSTNAME").unwrap_or_else(|_| "blobgate".to_string());
            format!("{}-{}", host, std::process::id())
        })
    }

    pub fn structured_logging(&self) -> bool {
        self.telemetry.structured_logging
    }
}
