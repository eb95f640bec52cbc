//! Test-environment reclamation
//!
//! Drives buckets back to an empty, deleted state:
//! - [`lister::list_versions`] - paginated stream of delete batches
//! - [`Reclaimer::reclaim_bucket`] - two-pass delete with bounded retention wait
//! - [`Reclaimer::reclaim_prefixed`] - sweep every bucket of a test-run namespace

pub mod bucket;
pub mod lister;
pub mod namespace;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ReclaimError, Result};
use crate::s3::api::ObjectStoreApi;
use crate::s3::types::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};

pub use bucket::{RetentionHold, RetentionWait};
pub use lister::{list_versions, PaginationCursor};
pub use namespace::{matching_buckets, NamespaceReport, ReclamationOutcome};

/// Longest retention hold reclamation is willing to sleep through
pub const DEFAULT_MAX_RETENTION_WAIT: Duration = Duration::from_secs(60);

/// Source of wall-clock time for retention decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tuning for one reclamation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimPolicy {
    pub batch_size: usize,
    pub max_retention_wait: Duration,
}

impl Default for ReclaimPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retention_wait: DEFAULT_MAX_RETENTION_WAIT,
        }
    }
}

impl ReclaimPolicy {
    pub fn new(batch_size: usize, max_retention_wait: Duration) -> Result<Self> {
        let policy = Self {
            batch_size,
            max_retention_wait,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ReclaimError::InvalidBatchSize {
                size: self.batch_size,
                max: MAX_BATCH_SIZE,
            });
        }
        Ok(())
    }
}

/// Reclaims buckets through one client
///
/// Holds the client by reference so the same client (possibly wrapped in a
/// [`crate::s3::LoggingClient`]) can be reused across buckets and identities.
pub struct Reclaimer<'a, C: ?Sized> {
    client: &'a C,
    policy: ReclaimPolicy,
    clock: Arc<dyn Clock>,
}

impl<'a, C: ObjectStoreApi + ?Sized> Reclaimer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            policy: ReclaimPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policy(mut self, policy: ReclaimPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &ReclaimPolicy {
        &self.policy
    }

    pub fn client(&self) -> &'a C {
        self.client
    }
}

/// Empty and delete one bucket with the default policy
pub async fn reclaim_bucket<C: ObjectStoreApi + ?Sized>(client: &C, bucket: &str) -> Result<()> {
    Reclaimer::new(client).reclaim_bucket(bucket).await
}

/// Reclaim every bucket whose name contains `prefix`, returning the last failure if any
pub async fn reclaim_prefixed<C: ObjectStoreApi + ?Sized>(prefix: &str, client: &C) -> Result<Vec<String>> {
    Reclaimer::new(client).reclaim_prefixed(prefix).await
}
