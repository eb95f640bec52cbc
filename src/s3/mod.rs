//! S3 access layer
//!
//! This module provides:
//! - [`api::ObjectStoreApi`] - the storage operations reclamation depends on
//! - [`client::S3Client`] - aws-sdk-s3 implementation of that interface
//! - [`instrumented::LoggingClient`] - call logging around any implementation
//! - [`credentials::ClientFactory`] - logged clients for the test identities
//! - [`types`] - request, response and batch types

pub mod api;
pub mod client;
pub mod credentials;
pub mod instrumented;
pub mod types;

// Re-export commonly used types
pub use api::{ObjectStoreApi, Operation, OperationNameSet};
pub use client::{S3Client, S3ClientConfig};
pub use credentials::{ClientFactory, Identity};
pub use instrumented::{CallObserver, CallOutcome, CallRecord, LoggingClient, RecordingObserver, TracingObserver};
pub use types::{Bucket, DeleteBatch, ObjectVersionRef};
