//! S3-style object store backend over plain HTTP.

use std::{future::Future, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use data_model::BackendKind;
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::{BlobError, BlobResult, BlobStore, ObjectStoreConfig};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Objects live at `<endpoint>/<bucket>/<prefix>/<id>`.
///
/// Any 2xx answer is treated as committed. 404 maps to `NotFound`, other 4xx
/// answers are fatal, and 5xx answers, transport errors and timeouts are
/// retried with exponential backoff up to `max_retries` times.
pub struct ObjectStoreBlobStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    prefix: String,
    request_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ObjectStoreBlobStore {
    pub fn new(config: &ObjectStoreConfig) -> BlobResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| BlobError::Other {
            source: anyhow!("invalid object store endpoint {}: {}", config.endpoint, e),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(BlobError::Other {
                source: anyhow!("object store endpoint must be an http(s) URL"),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BlobError::Other {
                source: anyhow!("unable to build object store client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    fn object_url(&self, id: &str) -> BlobResult<Url> {
        // `.` and `..` would be folded away by the URL encoder and address the
        // prefix itself.
        if id.is_empty() || id == "." || id == ".." {
            return Err(BlobError::InvalidId {
                id: id.to_string(),
                reason: "id is not a valid object key".to_string(),
            });
        }
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| BlobError::Other {
                source: anyhow!("object store endpoint cannot be a base URL"),
            })?;
            segments.pop_if_empty().push(&self.bucket);
            for part in self.prefix.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
            segments.push(id);
        }
        Ok(url)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_BACKOFF)
    }

    fn transport_error(&self, operation: &'static str, err: reqwest::Error) -> BlobError {
        if err.is_timeout() {
            return BlobError::Timeout {
                operation,
                after: self.request_timeout,
            };
        }
        BlobError::Unavailable {
            source: anyhow!("object store {} failed: {}", operation, err),
        }
    }

    async fn execute(
        &self,
        operation: &'static str,
        id: &str,
        request: RequestBuilder,
    ) -> BlobResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound { id: id.to_string() });
        }
        if status.is_server_error() {
            return Err(BlobError::Unavailable {
                source: anyhow!("object store {} returned {}", operation, status),
            });
        }
        Err(BlobError::Rejected {
            status: status.as_u16(),
        })
    }

    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        id: &str,
        mut attempt_fn: F,
    ) -> BlobResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BlobResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        id,
                        attempt,
                        ?delay,
                        error = %err,
                        "retrying object store request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()> {
        let url = self.object_url(id)?;
        let size = data.len();
        self.with_retries("put", id, move || {
            let request = self.client.put(url.clone()).body(data.clone());
            async move { self.execute("put", id, request).await.map(|_| ()) }
        })
        .await?;
        debug!(id, size, "stored object");
        Ok(())
    }

    async fn get(&self, id: &str) -> BlobResult<Bytes> {
        let url = self.object_url(id)?;
        self.with_retries("get", id, move || {
            let request = self.client.get(url.clone());
            async move {
                let response = self.execute("get", id, request).await?;
                response
                    .bytes()
                    .await
                    .map_err(|e| self.transport_error("get", e))
            }
        })
        .await
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let url = self.object_url(id)?;
        self.with_retries("delete", id, move || {
            let request = self.client.delete(url.clone());
            async move { self.execute("delete", id, request).await.map(|_| ()) }
        })
        .await?;
        debug!(id, "deleted object");
        Ok(())
    }
}
