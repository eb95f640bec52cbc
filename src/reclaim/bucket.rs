//! Single-bucket reclamation
//!
//! Retention locks only show up as `AccessDenied` failures when a delete is
//! attempted, so a bucket is emptied in up to two passes:
//!
//! 1. delete every version with governance bypass, remembering denials;
//! 2. probe the denied versions for their retention date, wait out the
//!    longest hold if it ends within the policy bound, and delete again.
//!
//! The bucket itself is deleted last.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::pin::pin;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::lister::list_versions;
use super::Reclaimer;
use crate::error::{ReclaimError, Result};
use crate::s3::api::ObjectStoreApi;
use crate::s3::types::{DeleteFailure, DeleteObjectsRequest};

/// Latest retention date found among the versions that refused deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionHold {
    pub retain_until: DateTime<Utc>,
}

/// What to do about a retention hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionWait {
    /// The hold has already lapsed
    Expired,
    /// Sleep this long, then retry
    Wait(Duration),
    /// The hold outlives the bound by this remaining time
    Exceeded(Duration),
}

impl RetentionHold {
    /// Keep the later of the current hold and `retain_until`
    pub fn extend(hold: Option<Self>, retain_until: DateTime<Utc>) -> Self {
        match hold {
            Some(current) if current.retain_until >= retain_until => current,
            _ => Self { retain_until },
        }
    }

    pub fn wait_policy(&self, now: DateTime<Utc>, bound: Duration) -> RetentionWait {
        let delta = self.retain_until - now;
        if delta <= chrono::Duration::zero() {
            return RetentionWait::Expired;
        }
        // positive here, so the conversion cannot fail
        let remaining = delta.to_std().unwrap_or_default();
        if remaining > bound {
            RetentionWait::Exceeded(remaining)
        } else {
            RetentionWait::Wait(remaining)
        }
    }
}

impl<'a, C: ObjectStoreApi + ?Sized> Reclaimer<'a, C> {
    /// Delete every version and delete marker in `bucket`, then the bucket
    pub async fn reclaim_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket, "reclaiming bucket");

        let denied = self.delete_pass(bucket).await?;
        if let Some(hold) = self.probe_holds(bucket, &denied).await {
            self.wait_out(bucket, hold).await?;
            let leftover = self.delete_pass(bucket).await?;
            if !leftover.is_empty() {
                debug!(bucket, count = leftover.len(), "versions still refused deletion after waiting");
            }
        }

        self.client
            .delete_bucket(bucket)
            .await
            .map_err(|source| ReclaimError::BucketDelete {
                bucket: bucket.to_string(),
                source,
            })?;

        info!(bucket, "bucket reclaimed");
        Ok(())
    }

    /// One full listing with bypassing deletes; returns the per-object failures
    async fn delete_pass(&self, bucket: &str) -> Result<Vec<DeleteFailure>> {
        let mut failures = Vec::new();
        let mut batches = pin!(list_versions(self.client, bucket, self.policy.batch_size));

        while let Some(batch) = batches.try_next().await? {
            let request = DeleteObjectsRequest::bypassing_retention(bucket, batch);
            let output = self
                .client
                .delete_objects(&request)
                .await
                .map_err(|source| ReclaimError::Delete {
                    bucket: bucket.to_string(),
                    source,
                })?;
            failures.extend(output.errors);
        }

        Ok(failures)
    }

    /// Probe every `AccessDenied` failure for its retention date
    async fn probe_holds(&self, bucket: &str, failures: &[DeleteFailure]) -> Option<RetentionHold> {
        let mut hold = None;

        for failure in failures.iter().filter(|f| f.is_access_denied()) {
            match self.client.get_object_retention(bucket, &failure.object).await {
                Ok(retention) => {
                    if let Some(retain_until) = retention.retain_until {
                        hold = Some(RetentionHold::extend(hold, retain_until));
                    }
                }
                Err(err) => {
                    debug!(
                        bucket,
                        key = %failure.object.key,
                        version_id = %failure.object.version_id,
                        error = %err,
                        "retention probe failed"
                    );
                }
            }
        }

        hold
    }

    async fn wait_out(&self, bucket: &str, hold: RetentionHold) -> Result<()> {
        match hold.wait_policy(self.clock.now(), self.policy.max_retention_wait) {
            RetentionWait::Expired => Ok(()),
            RetentionWait::Wait(delay) => {
                warn!(
                    bucket,
                    seconds = delay.as_secs_f64(),
                    "waiting for object retention to expire"
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            RetentionWait::Exceeded(remaining) => Err(ReclaimError::UnresolvedRetention {
                bucket: bucket.to_string(),
                remaining,
            }),
        }
    }
}
