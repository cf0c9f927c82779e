//! Metrics for backend adapter operations.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use data_model::BackendKind;
use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

use crate::{BlobResult, BlobStore};

/// Metrics for backend operations.
#[derive(Clone)]
pub struct BlobMetrics {
    /// Histogram for operation latencies.
    pub operations: Histogram<f64>,

    /// Counter for operation errors. Misses (`NotFound`) are not errors.
    pub errors: Counter<u64>,
}

impl BlobMetrics {
    pub fn new(meter: &Meter) -> Self {
        let operations = meter
            .f64_histogram("blob_backend_operation_duration_seconds")
            .with_description("Duration of backend operations in seconds")
            .build();

        let errors = meter
            .u64_counter("blob_backend_errors_total")
            .with_description("Total number of backend operation errors")
            .build();

        Self { operations, errors }
    }
}

/// Timer for measuring operation duration, recorded on drop.
pub struct Timer {
    start: Instant,
    histogram: Histogram<f64>,
    labels: Vec<KeyValue>,
}

impl Timer {
    pub fn start_with_labels(histogram: &Histogram<f64>, labels: &[KeyValue]) -> Self {
        Self {
            start: Instant::now(),
            histogram: histogram.clone(),
            labels: labels.to_vec(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.record(duration, &self.labels);
    }
}

/// Wraps an adapter and records latency and error counts per operation.
pub struct InstrumentedBlobStore {
    inner: Arc<dyn BlobStore>,
    metrics: BlobMetrics,
    backend: BackendKind,
}

impl InstrumentedBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>, metrics: BlobMetrics) -> Self {
        let backend = inner.kind();
        Self {
            inner,
            metrics,
            backend,
        }
    }

    fn labels(&self, operation: &'static str) -> [KeyValue; 2] {
        [
            KeyValue::new("backend", self.backend.to_string()),
            KeyValue::new("operation", operation),
        ]
    }

    fn observe<T>(&self, operation: &'static str, result: &BlobResult<T>) {
        if let Err(err) = result {
            if !err.is_not_found() {
                let [backend, operation] = self.labels(operation);
                self.metrics
                    .errors
                    .add(1, &[backend, operation, KeyValue::new("kind", err.kind())]);
            }
        }
    }
}

#[async_trait]
impl BlobStore for InstrumentedBlobStore {
    fn kind(&self) -> BackendKind {
        self.backend
    }

    async fn put(&self, id: &str, data: Bytes) -> BlobResult<()> {
        let _timer = Timer::start_with_labels(&self.metrics.operations, &self.labels("put"));
        let result = self.inner.put(id, data).await;
        self.observe("put", &result);
        result
    }

    async fn get(&self, id: &str) -> BlobResult<Bytes> {
        let _timer = Timer::start_with_labels(&self.metrics.operations, &self.labels("get"));
        let result = self.inner.get(id).await;
        self.observe("get", &result);
        result
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let _timer = Timer::start_with_labels(&self.metrics.operations, &self.labels("delete"));
        let result = self.inner.delete(id).await;
        self.observe("delete", &result);
        result
    }
}
