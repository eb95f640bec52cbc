//! S3 test-environment reclamation
//!
//! Returns an S3-compatible service to a clean state after a test run: every
//! bucket in the run's namespace is emptied of all object versions and
//! delete markers, waited out if short object-lock retention holds remain,
//! and deleted. The public modules are also used by the integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod naming;
pub mod reclaim;
pub mod s3;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ReclaimConfig;
pub use error::{ApiError, ReclaimError};
pub use naming::{choose_bucket_prefix, BucketNamer};
pub use reclaim::{reclaim_bucket, reclaim_prefixed, ReclaimPolicy, Reclaimer};
pub use s3::{ClientFactory, Identity, LoggingClient, ObjectStoreApi, S3Client};
