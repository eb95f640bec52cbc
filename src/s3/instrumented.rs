//! Call logging for storage clients
//!
//! [`LoggingClient`] wraps any [`ObjectStoreApi`] and reports every call to
//! an operation the wrapped client declares in its [`OperationNameSet`].
//! Arguments are captured before the call and the outcome after it; both go
//! to a [`CallObserver`]. Undeclared operations and helper methods pass
//! straight through, and nothing about a call is ever changed.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tracing::Instrument;

use crate::error::ApiResult;
use crate::s3::api::{ObjectStoreApi, Operation, OperationNameSet};
use crate::s3::types::{
    Bucket, DeleteObjectsOutput, DeleteObjectsRequest, ListVersionsRequest, ObjectRetention,
    ObjectVersionRef, VersionListing,
};

/// How an observed call ended
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Returned(Value),
    Failed(String),
}

/// One observed storage call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub operation: Operation,
    pub arguments: Value,
    pub outcome: CallOutcome,
}

/// Receives a record for every observed call
pub trait CallObserver: Send + Sync {
    fn record(&self, record: CallRecord);
}

/// Emits each call as a `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn record(&self, record: CallRecord) {
        match &record.outcome {
            CallOutcome::Returned(response) => tracing::info!(
                operation = %record.operation,
                arguments = %record.arguments,
                response = %response,
                "storage request completed"
            ),
            CallOutcome::Failed(error) => tracing::warn!(
                operation = %record.operation,
                arguments = %record.arguments,
                error = %error,
                "storage request failed"
            ),
        }
    }
}

/// Keeps records in memory, e.g. to attach them to a test report
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<CallRecord>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Drain the records collected so far
    pub fn take(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CallObserver for RecordingObserver {
    fn record(&self, record: CallRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| Value::String(format!("<unserializable: {}>", err)))
}

/// Storage client that logs the operations its inner client declares
pub struct LoggingClient<C> {
    inner: C,
    logged: OperationNameSet,
    observer: Arc<dyn CallObserver>,
}

impl<C: ObjectStoreApi> LoggingClient<C> {
    /// Wrap `inner`, logging through `tracing`
    pub fn new(inner: C) -> Self {
        Self::with_observer(inner, Arc::new(TracingObserver))
    }

    pub fn with_observer(inner: C, observer: Arc<dyn CallObserver>) -> Self {
        let logged = inner.operation_names();
        Self {
            inner,
            logged,
            observer,
        }
    }

    /// Operations this wrapper observes
    pub fn logged_operations(&self) -> &OperationNameSet {
        &self.logged
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    async fn observe<T, A, F>(&self, operation: Operation, arguments: A, call: F) -> ApiResult<T>
    where
        T: Serialize,
        A: FnOnce() -> Value,
        F: Future<Output = ApiResult<T>>,
    {
        if !self.logged.contains(operation) {
            return call.await;
        }

        let arguments = arguments();
        let span = tracing::info_span!("storage_request", operation = %operation);
        async move {
            tracing::debug!(arguments = %arguments, "sending request");
            let result = call.await;
            let outcome = match &result {
                Ok(response) => CallOutcome::Returned(to_json(response)),
                Err(err) => CallOutcome::Failed(err.to_string()),
            };
            self.observer.record(CallRecord {
                operation,
                arguments,
                outcome,
            });
            result
        }
        .instrument(span)
        .await
    }
}

impl<C> Deref for LoggingClient<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ObjectStoreApi> ObjectStoreApi for LoggingClient<C> {
    fn operation_names(&self) -> OperationNameSet {
        self.inner.operation_names()
    }

    fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint()
    }

    async fn list_buckets(&self) -> ApiResult<Vec<Bucket>> {
        self.observe(
            Operation::ListBuckets,
            || serde_json::json!({}),
            self.inner.list_buckets(),
        )
        .await
    }

    async fn list_object_versions(&self, request: &ListVersionsRequest) -> ApiResult<VersionListing> {
        self.observe(
            Operation::ListObjectVersions,
            || to_json(request),
            self.inner.list_object_versions(request),
        )
        .await
    }

    async fn delete_objects(&self, request: &DeleteObjectsRequest) -> ApiResult<DeleteObjectsOutput> {
        self.observe(
            Operation::DeleteObjects,
            || to_json(request),
            self.inner.delete_objects(request),
        )
        .await
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
    ) -> ApiResult<ObjectRetention> {
        self.observe(
            Operation::GetObjectRetention,
            || serde_json::json!({ "bucket": bucket, "object": object }),
            self.inner.get_object_retention(bucket, object),
        )
        .await
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()> {
        self.observe(
            Operation::DeleteBucket,
            || serde_json::json!({ "bucket": bucket }),
            self.inner.delete_bucket(bucket),
        )
        .await
    }
}
