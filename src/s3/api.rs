//! Storage capability consumed by reclamation
//!
//! [`ObjectStoreApi`] is the fixed method set reclamation needs from an
//! S3-compatible service. Every implementation also declares which of those
//! methods are genuine remote operations through [`OperationNameSet`]; the
//! logging decorator uses that declaration to decide what to observe.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ApiResult;
use crate::s3::types::{
    Bucket, DeleteObjectsOutput, DeleteObjectsRequest, ListVersionsRequest, ObjectRetention,
    ObjectVersionRef, VersionListing,
};

/// Remote operations of [`ObjectStoreApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    ListBuckets,
    ListObjectVersions,
    DeleteObjects,
    GetObjectRetention,
    DeleteBucket,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::ListBuckets,
        Operation::ListObjectVersions,
        Operation::DeleteObjects,
        Operation::GetObjectRetention,
        Operation::DeleteBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListBuckets => "list_buckets",
            Operation::ListObjectVersions => "list_object_versions",
            Operation::DeleteObjects => "delete_objects",
            Operation::GetObjectRetention => "get_object_retention",
            Operation::DeleteBucket => "delete_bucket",
        }
    }

    /// Look up an operation by its declared name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a client declares as genuine remote calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationNameSet(BTreeSet<Operation>);

impl OperationNameSet {
    pub fn all() -> Self {
        Self(Operation::ALL.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    /// Membership test by name; helper and unknown names are never members
    pub fn contains_name(&self, name: &str) -> bool {
        Operation::from_name(name).is_some_and(|op| self.contains(op))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(Operation::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Operation> for OperationNameSet {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// S3-compatible storage operations used to reclaim buckets
#[async_trait]
pub trait ObjectStoreApi: Send + Sync {
    /// Operations this client performs remotely
    fn operation_names(&self) -> OperationNameSet {
        OperationNameSet::all()
    }

    /// Endpoint the client talks to, if known. Not a remote operation.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    async fn list_buckets(&self) -> ApiResult<Vec<Bucket>>;

    async fn list_object_versions(&self, request: &ListVersionsRequest) -> ApiResult<VersionListing>;

    async fn delete_objects(&self, request: &DeleteObjectsRequest) -> ApiResult<DeleteObjectsOutput>;

    /// Fails when the version has no retention configured
    async fn get_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
    ) -> ApiResult<ObjectRetention>;

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()>;
}

#[async_trait]
impl<T: ObjectStoreApi + ?Sized> ObjectStoreApi for &T {
    fn operation_names(&self) -> OperationNameSet {
        (**self).operation_names()
    }

    fn endpoint(&self) -> Option<&str> {
        (**self).endpoint()
    }

    async fn list_buckets(&self) -> ApiResult<Vec<Bucket>> {
        (**self).list_buckets().await
    }

    async fn list_object_versions(&self, request: &ListVersionsRequest) -> ApiResult<VersionListing> {
        (**self).list_object_versions(request).await
    }

    async fn delete_objects(&self, request: &DeleteObjectsRequest) -> ApiResult<DeleteObjectsOutput> {
        (**self).delete_objects(request).await
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
    ) -> ApiResult<ObjectRetention> {
        (**self).get_object_retention(bucket, object).await
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()> {
        (**self).delete_bucket(bucket).await
    }
}
