//! AWS S3 client wrapper

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketVersioningStatus, ChecksumAlgorithm, Delete, ObjectIdentifier, ObjectLockRetention,
    ObjectLockRetentionMode, VersioningConfiguration,
};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::error::{ApiError, ApiResult};
use crate::s3::api::{ObjectStoreApi, Operation};
use crate::s3::types::{
    Bucket, DeleteFailure, DeleteObjectsOutput, DeleteObjectsRequest, ListVersionsRequest,
    ObjectRetention, ObjectVersionRef, VersionListing,
};

const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// S3 client wrapper implementing the reclamation operations
pub struct S3Client {
    client: Client,
    endpoint: Option<String>,
    current_region: String,
}

impl S3Client {
    /// Create a client for an explicit endpoint and credentials
    ///
    /// Missing credentials fall back to the default AWS provider chain.
    pub async fn with_config(config: S3ClientConfig) -> Result<Self> {
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "s3-reclaim",
            ));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(endpoint = ?config.endpoint_url, region = %region, "created S3 client");

        Ok(Self {
            client: Client::from_conf(s3_config),
            endpoint: config.endpoint_url,
            current_region: region,
        })
    }

    /// Get the current region
    pub fn region(&self) -> &str {
        &self.current_region
    }

    /// Create a bucket, optionally with object lock enabled (which also enables versioning)
    pub async fn create_bucket(&self, bucket: &str, object_lock: bool) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if object_lock {
            request = request.object_lock_enabled_for_bucket(true);
        }
        request
            .send()
            .await
            .with_context(|| format!("Failed to create bucket {}", bucket))?;
        Ok(())
    }

    /// Turn on versioning for a bucket
    pub async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        let configuration = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();
        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(configuration)
            .send()
            .await
            .with_context(|| format!("Failed to enable versioning on {}", bucket))?;
        Ok(())
    }

    /// Upload bytes as an object, returning the new version
    pub async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<ObjectVersionRef> {
        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to put {}/{}", bucket, key))?;

        Ok(ObjectVersionRef::from_listing(key, response.version_id()))
    }

    /// Delete a key without a version id, leaving a delete marker in a versioned bucket
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete {}/{}", bucket, key))?;
        Ok(())
    }

    /// Lock one object version until `retain_until`
    pub async fn put_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
        compliance: bool,
        retain_until: DateTime<Utc>,
    ) -> Result<()> {
        let mode = if compliance {
            ObjectLockRetentionMode::Compliance
        } else {
            ObjectLockRetentionMode::Governance
        };
        let retention = ObjectLockRetention::builder()
            .mode(mode)
            .retain_until_date(aws_sdk_s3::primitives::DateTime::from_secs(retain_until.timestamp()))
            .build();

        self.client
            .put_object_retention()
            .bucket(bucket)
            .key(&object.key)
            .version_id(&object.version_id)
            .retention(retention)
            .send()
            .await
            .with_context(|| format!("Failed to set retention on {}/{}", bucket, object.key))?;
        Ok(())
    }

    /// Check whether a bucket is listed for this identity
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let buckets = ObjectStoreApi::list_buckets(self).await?;
        Ok(buckets.iter().any(|b| b.name == bucket))
    }
}

fn api_error<E>(operation: Operation, err: E) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = err
        .message()
        .map(|m| m.to_string())
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ApiError::new(operation.as_str(), err.code().map(|c| c.to_string()), message)
}

fn to_chrono(date: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(date.secs(), date.subsec_nanos()).unwrap_or_default()
}

#[async_trait]
impl ObjectStoreApi for S3Client {
    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    async fn list_buckets(&self) -> ApiResult<Vec<Bucket>> {
        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| api_error(Operation::ListBuckets, e))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| Bucket {
                name: b.name().unwrap_or_default().to_string(),
                creation_date: b.creation_date().map(to_chrono),
            })
            .collect();

        Ok(buckets)
    }

    async fn list_object_versions(&self, request: &ListVersionsRequest) -> ApiResult<VersionListing> {
        let response = self
            .client
            .list_object_versions()
            .bucket(&request.bucket)
            .max_keys(i32::try_from(request.max_keys).unwrap_or(i32::MAX))
            .set_key_marker(request.key_marker.clone())
            .set_version_id_marker(request.version_id_marker.clone())
            .send()
            .await
            .map_err(|e| api_error(Operation::ListObjectVersions, e))?;

        let versions = response
            .versions()
            .iter()
            .filter_map(|v| v.key().map(|key| ObjectVersionRef::from_listing(key, v.version_id())))
            .collect();
        let delete_markers = response
            .delete_markers()
            .iter()
            .filter_map(|m| m.key().map(|key| ObjectVersionRef::from_listing(key, m.version_id())))
            .collect();

        Ok(VersionListing {
            versions,
            delete_markers,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_key_marker: response.next_key_marker().map(|s| s.to_string()),
            next_version_id_marker: response.next_version_id_marker().map(|s| s.to_string()),
        })
    }

    async fn delete_objects(&self, request: &DeleteObjectsRequest) -> ApiResult<DeleteObjectsOutput> {
        let op = Operation::DeleteObjects;

        let objects = request
            .objects
            .objects()
            .iter()
            .map(|o| {
                ObjectIdentifier::builder()
                    .key(&o.key)
                    .version_id(&o.version_id)
                    .build()
                    .map_err(|e| ApiError::new(op.as_str(), None, e.to_string()))
            })
            .collect::<ApiResult<Vec<_>>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(request.quiet)
            .build()
            .map_err(|e| ApiError::new(op.as_str(), None, e.to_string()))?;

        // Multi-object delete must carry an integrity checksum
        let response = self
            .client
            .delete_objects()
            .bucket(&request.bucket)
            .delete(delete)
            .bypass_governance_retention(request.bypass_governance_retention)
            .checksum_algorithm(ChecksumAlgorithm::Crc32)
            .send()
            .await
            .map_err(|e| api_error(op, e))?;

        let errors = response
            .errors()
            .iter()
            .filter_map(|e| {
                e.key().map(|key| DeleteFailure {
                    object: ObjectVersionRef::from_listing(key, e.version_id()),
                    code: e.code().map(|c| c.to_string()),
                    message: e.message().map(|m| m.to_string()),
                })
            })
            .collect();

        Ok(DeleteObjectsOutput { errors })
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
    ) -> ApiResult<ObjectRetention> {
        let response = self
            .client
            .get_object_retention()
            .bucket(bucket)
            .key(&object.key)
            .version_id(&object.version_id)
            .send()
            .await
            .map_err(|e| api_error(Operation::GetObjectRetention, e))?;

        let retention = response.retention();
        Ok(ObjectRetention {
            mode: retention
                .and_then(|r| r.mode())
                .map(|m| m.as_str().to_string()),
            retain_until: retention
                .and_then(|r| r.retain_until_date())
                .map(to_chrono),
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| api_error(Operation::DeleteBucket, e))?;

        Ok(())
    }
}
