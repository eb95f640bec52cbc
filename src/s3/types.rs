//! S3 data types used by reclamation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of object versions deleted per `DeleteObjects` call
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Upper bound S3 puts on keys per `DeleteObjects` call
pub const MAX_BATCH_SIZE: usize = 1000;

/// Version id S3 assigns to objects written while versioning was off
pub const NULL_VERSION_ID: &str = "null";

/// Represents an S3 bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

impl Bucket {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: None,
        }
    }
}

/// One version or delete marker of an object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectVersionRef {
    pub key: String,
    pub version_id: String,
}

impl ObjectVersionRef {
    pub fn new(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
        }
    }

    /// Build a ref from listing fields, mapping a missing version id to `"null"`
    pub fn from_listing(key: &str, version_id: Option<&str>) -> Self {
        Self::new(key, version_id.unwrap_or(NULL_VERSION_ID))
    }
}

/// A non-empty group of object versions deleted by one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeleteBatch(Vec<ObjectVersionRef>);

impl DeleteBatch {
    /// Returns `None` for an empty list; batches are never empty
    pub fn new(objects: Vec<ObjectVersionRef>) -> Option<Self> {
        if objects.is_empty() {
            None
        } else {
            Some(Self(objects))
        }
    }

    /// Split a page of refs into batches of at most `batch_size` entries, preserving order
    pub fn chunked(objects: Vec<ObjectVersionRef>, batch_size: usize) -> Vec<Self> {
        if objects.len() <= batch_size {
            return Self::new(objects).into_iter().collect();
        }
        objects
            .chunks(batch_size)
            .map(|chunk| Self(chunk.to_vec()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn objects(&self) -> &[ObjectVersionRef] {
        &self.0
    }

    pub fn into_objects(self) -> Vec<ObjectVersionRef> {
        self.0
    }
}

/// Parameters of one `ListObjectVersions` page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListVersionsRequest {
    pub bucket: String,
    pub max_keys: usize,
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// One page of `ListObjectVersions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionListing {
    pub versions: Vec<ObjectVersionRef>,
    pub delete_markers: Vec<ObjectVersionRef>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
}

impl VersionListing {
    /// Versions followed by delete markers
    pub fn into_objects(self) -> Vec<ObjectVersionRef> {
        let mut objects = self.versions;
        objects.extend(self.delete_markers);
        objects
    }
}

/// Parameters of one `DeleteObjects` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteObjectsRequest {
    pub bucket: String,
    pub objects: DeleteBatch,
    pub quiet: bool,
    pub bypass_governance_retention: bool,
}

impl DeleteObjectsRequest {
    /// Quiet delete that overrides governance-mode retention
    pub fn bypassing_retention(bucket: &str, objects: DeleteBatch) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects,
            quiet: true,
            bypass_governance_retention: true,
        }
    }
}

/// Per-object failure reported inside a `DeleteObjects` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub object: ObjectVersionRef,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl DeleteFailure {
    pub fn is_access_denied(&self) -> bool {
        self.code.as_deref() == Some(crate::error::ACCESS_DENIED)
    }
}

/// Response of a quiet `DeleteObjects` call: only failures are reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteObjectsOutput {
    pub errors: Vec<DeleteFailure>,
}

/// Object-lock retention of one object version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRetention {
    /// `GOVERNANCE` or `COMPLIANCE`
    pub mode: Option<String>,
    pub retain_until: Option<DateTime<Utc>>,
}
