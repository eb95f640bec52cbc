//! Namespace-wide reclamation
//!
//! A test run names all of its buckets with a shared random prefix. Sweeping
//! the namespace reclaims every such bucket, continuing past failures so one
//! stuck bucket does not leak the rest.

use tracing::{info, warn};

use super::Reclaimer;
use crate::error::{ReclaimError, Result};
use crate::s3::api::ObjectStoreApi;

/// Names of the client's buckets that contain `prefix`
///
/// Matching is by substring, not anchored at the start of the name.
pub async fn matching_buckets<C: ObjectStoreApi + ?Sized>(client: &C, prefix: &str) -> Result<Vec<String>> {
    let buckets = client.list_buckets().await.map_err(ReclaimError::ListBuckets)?;

    Ok(buckets
        .into_iter()
        .map(|b| b.name)
        .filter(|name| name.contains(prefix))
        .collect())
}

/// Result of reclaiming one bucket during a sweep
#[derive(Debug)]
pub enum ReclamationOutcome {
    Reclaimed(String),
    Failed { bucket: String, error: ReclaimError },
}

impl ReclamationOutcome {
    pub fn bucket(&self) -> &str {
        match self {
            ReclamationOutcome::Reclaimed(bucket) => bucket,
            ReclamationOutcome::Failed { bucket, .. } => bucket,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReclamationOutcome::Failed { .. })
    }
}

/// Every per-bucket outcome of one namespace sweep, in processing order
#[derive(Debug, Default)]
pub struct NamespaceReport {
    pub outcomes: Vec<ReclamationOutcome>,
}

impl NamespaceReport {
    pub fn reclaimed(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            ReclamationOutcome::Reclaimed(bucket) => Some(bucket.as_str()),
            ReclamationOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ReclaimError)> {
        self.outcomes.iter().filter_map(|o| match o {
            ReclamationOutcome::Failed { bucket, error } => Some((bucket.as_str(), error)),
            ReclamationOutcome::Reclaimed(_) => None,
        })
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// Reclaimed bucket names, or the last failure when any bucket failed
    ///
    /// Earlier failures are dropped here; they were logged when they happened.
    pub fn into_result(self) -> Result<Vec<String>> {
        let mut reclaimed = Vec::new();
        let mut last_error = None;

        for outcome in self.outcomes {
            match outcome {
                ReclamationOutcome::Reclaimed(bucket) => reclaimed.push(bucket),
                ReclamationOutcome::Failed { error, .. } => last_error = Some(error),
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(reclaimed),
        }
    }
}

impl<'a, C: ObjectStoreApi + ?Sized> Reclaimer<'a, C> {
    /// Reclaim every bucket whose name contains `prefix`
    ///
    /// All matching buckets are attempted. If any failed, the last failure is
    /// returned after the sweep completes.
    pub async fn reclaim_prefixed(&self, prefix: &str) -> Result<Vec<String>> {
        self.reclaim_prefixed_report(prefix).await?.into_result()
    }

    /// Like [`Reclaimer::reclaim_prefixed`], but keeps every outcome
    ///
    /// Only a failure to list the buckets is returned as an error.
    pub async fn reclaim_prefixed_report(&self, prefix: &str) -> Result<NamespaceReport> {
        let buckets = matching_buckets(self.client, prefix).await?;
        info!(prefix, count = buckets.len(), "reclaiming bucket namespace");

        let mut report = NamespaceReport::default();
        for bucket in buckets {
            match self.reclaim_bucket(&bucket).await {
                Ok(()) => report.outcomes.push(ReclamationOutcome::Reclaimed(bucket)),
                Err(error) => {
                    warn!(bucket = %bucket, error = %error, "bucket reclamation failed, continuing");
                    report.outcomes.push(ReclamationOutcome::Failed { bucket, error });
                }
            }
        }

        Ok(report)
    }
}
