//! In-memory storage fake and a pausable clock for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, ApiResult, ACCESS_DENIED};
use crate::reclaim::{Clock, SystemClock};
use crate::s3::api::{ObjectStoreApi, Operation, OperationNameSet};
use crate::s3::types::{
    Bucket, DeleteFailure, DeleteObjectsOutput, DeleteObjectsRequest, ListVersionsRequest,
    ObjectRetention, ObjectVersionRef, VersionListing,
};

/// Wall clock that advances with tokio's (pausable) clock
pub(crate) struct TokioClock {
    origin: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Utc::now(),
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockMode {
    Governance,
    Compliance,
}

impl LockMode {
    fn as_str(&self) -> &'static str {
        match self {
            LockMode::Governance => "GOVERNANCE",
            LockMode::Compliance => "COMPLIANCE",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredVersion {
    object: ObjectVersionRef,
    delete_marker: bool,
    lock: Option<(LockMode, DateTime<Utc>)>,
}

#[derive(Debug, Default)]
struct StoredBucket {
    // sorted by (key, version_id)
    versions: Vec<StoredVersion>,
    deny_delete: bool,
    fail_listing: bool,
    empty_leading_pages: usize,
    probe_failures: BTreeSet<String>,
    // key -> per-object error code returned by delete_objects
    delete_failures: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, StoredBucket>,
    fail_list_buckets: bool,
    next_version: u64,
    calls: Vec<(Operation, String)>,
    list_requests: Vec<ListVersionsRequest>,
}

/// Versioned, object-locking bucket store kept in memory
pub(crate) struct MemoryStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    declared: OperationNameSet,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            declared: OperationNameSet::all(),
        }
    }

    /// Restrict the operations this store declares as remote
    pub(crate) fn declaring(mut self, declared: OperationNameSet) -> Self {
        self.declared = declared;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn create_bucket(&self, name: &str) {
        self.lock().buckets.entry(name.to_string()).or_default();
    }

    fn insert(&self, bucket: &str, key: &str, delete_marker: bool, lock: Option<(LockMode, DateTime<Utc>)>) -> ObjectVersionRef {
        let mut state = self.lock();
        state.next_version += 1;
        let object = ObjectVersionRef::new(key, format!("v{:08}", state.next_version));
        let stored = state.buckets.get_mut(bucket).expect("bucket must exist");
        stored.versions.push(StoredVersion {
            object: object.clone(),
            delete_marker,
            lock,
        });
        stored.versions.sort_by(|a, b| a.object.cmp(&b.object));
        object
    }

    pub(crate) fn put_version(&self, bucket: &str, key: &str) -> ObjectVersionRef {
        self.insert(bucket, key, false, None)
    }

    pub(crate) fn put_delete_marker(&self, bucket: &str, key: &str) -> ObjectVersionRef {
        self.insert(bucket, key, true, None)
    }

    pub(crate) fn put_locked_version(
        &self,
        bucket: &str,
        key: &str,
        mode: LockMode,
        retain_until: DateTime<Utc>,
    ) -> ObjectVersionRef {
        self.insert(bucket, key, false, Some((mode, retain_until)))
    }

    pub(crate) fn fail_list_buckets(&self) {
        self.lock().fail_list_buckets = true;
    }

    pub(crate) fn deny_bucket_delete(&self, bucket: &str) {
        self.lock().buckets.get_mut(bucket).expect("bucket must exist").deny_delete = true;
    }

    pub(crate) fn fail_listing(&self, bucket: &str) {
        self.lock().buckets.get_mut(bucket).expect("bucket must exist").fail_listing = true;
    }

    pub(crate) fn fail_retention_probe(&self, bucket: &str, key: &str) {
        self.lock()
            .buckets
            .get_mut(bucket)
            .expect("bucket must exist")
            .probe_failures
            .insert(key.to_string());
    }

    /// Refuse every delete of `key` with the per-object error `code`
    pub(crate) fn fail_delete_with(&self, bucket: &str, key: &str, code: &str) {
        self.lock()
            .buckets
            .get_mut(bucket)
            .expect("bucket must exist")
            .delete_failures
            .insert(key.to_string(), code.to_string());
    }

    /// Serve `pages` empty, truncated pages before the real listing
    pub(crate) fn empty_leading_pages(&self, bucket: &str, pages: usize) {
        self.lock().buckets.get_mut(bucket).expect("bucket must exist").empty_leading_pages = pages;
    }

    pub(crate) fn has_bucket(&self, name: &str) -> bool {
        self.lock().buckets.contains_key(name)
    }

    pub(crate) fn version_count(&self, bucket: &str) -> usize {
        self.lock().buckets.get(bucket).map_or(0, |b| b.versions.len())
    }

    pub(crate) fn all_versions(&self, bucket: &str) -> Vec<ObjectVersionRef> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|b| b.versions.iter().map(|v| v.object.clone()).collect())
            .unwrap_or_default()
    }

    /// Operations invoked so far, with the bucket each targeted
    pub(crate) fn calls(&self) -> Vec<(Operation, String)> {
        self.lock().calls.clone()
    }

    pub(crate) fn operations(&self) -> Vec<Operation> {
        self.lock().calls.iter().map(|(op, _)| *op).collect()
    }

    pub(crate) fn list_requests(&self) -> Vec<ListVersionsRequest> {
        self.lock().list_requests.clone()
    }
}

fn no_such_bucket(operation: Operation, bucket: &str) -> ApiError {
    ApiError::with_code(
        operation.as_str(),
        "NoSuchBucket",
        format!("The specified bucket does not exist: {}", bucket),
    )
}

#[async_trait]
impl ObjectStoreApi for MemoryStore {
    fn operation_names(&self) -> OperationNameSet {
        self.declared.clone()
    }

    fn endpoint(&self) -> Option<&str> {
        Some("memory://")
    }

    async fn list_buckets(&self) -> ApiResult<Vec<Bucket>> {
        let mut state = self.lock();
        state.calls.push((Operation::ListBuckets, String::new()));
        if state.fail_list_buckets {
            return Err(ApiError::with_code(Operation::ListBuckets.as_str(), ACCESS_DENIED, "Access Denied"));
        }
        Ok(state.buckets.keys().map(Bucket::named).collect())
    }

    async fn list_object_versions(&self, request: &ListVersionsRequest) -> ApiResult<VersionListing> {
        let op = Operation::ListObjectVersions;
        let mut state = self.lock();
        state.calls.push((op, request.bucket.clone()));
        state.list_requests.push(request.clone());

        let bucket = state
            .buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| no_such_bucket(op, &request.bucket))?;
        if bucket.fail_listing {
            return Err(ApiError::with_code(op.as_str(), "InternalError", "injected listing failure"));
        }
        if bucket.empty_leading_pages > 0 {
            bucket.empty_leading_pages -= 1;
            return Ok(VersionListing {
                is_truncated: true,
                ..Default::default()
            });
        }

        let start = match &request.key_marker {
            None => 0,
            Some(key) => {
                let version_id = request.version_id_marker.as_deref().unwrap_or_default();
                bucket
                    .versions
                    .iter()
                    .position(|v| {
                        (v.object.key.as_str(), v.object.version_id.as_str()) > (key.as_str(), version_id)
                    })
                    .unwrap_or(bucket.versions.len())
            }
        };
        let page: Vec<&StoredVersion> = bucket.versions[start..].iter().take(request.max_keys).collect();
        let is_truncated = start + page.len() < bucket.versions.len();

        let mut listing = VersionListing {
            is_truncated,
            ..Default::default()
        };
        if is_truncated {
            if let Some(last) = page.last() {
                listing.next_key_marker = Some(last.object.key.clone());
                listing.next_version_id_marker = Some(last.object.version_id.clone());
            }
        }
        for version in page {
            if version.delete_marker {
                listing.delete_markers.push(version.object.clone());
            } else {
                listing.versions.push(version.object.clone());
            }
        }
        Ok(listing)
    }

    async fn delete_objects(&self, request: &DeleteObjectsRequest) -> ApiResult<DeleteObjectsOutput> {
        let op = Operation::DeleteObjects;
        let now = self.clock.now();
        let mut state = self.lock();
        state.calls.push((op, request.bucket.clone()));

        let bucket = state
            .buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| no_such_bucket(op, &request.bucket))?;

        let mut output = DeleteObjectsOutput::default();
        for object in request.objects.objects() {
            let Some(index) = bucket.versions.iter().position(|v| v.object == *object) else {
                continue;
            };
            if let Some(code) = bucket.delete_failures.get(&object.key) {
                output.errors.push(DeleteFailure {
                    object: object.clone(),
                    code: Some(code.clone()),
                    message: Some("injected delete failure".to_string()),
                });
                continue;
            }
            let locked = match bucket.versions[index].lock {
                Some((mode, until)) if until > now => {
                    mode == LockMode::Compliance || !request.bypass_governance_retention
                }
                _ => false,
            };
            if locked {
                output.errors.push(DeleteFailure {
                    object: object.clone(),
                    code: Some(ACCESS_DENIED.to_string()),
                    message: Some("Access Denied because object protected by object lock.".to_string()),
                });
            } else {
                bucket.versions.remove(index);
            }
        }
        Ok(output)
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        object: &ObjectVersionRef,
    ) -> ApiResult<ObjectRetention> {
        let op = Operation::GetObjectRetention;
        let mut state = self.lock();
        state.calls.push((op, bucket.to_string()));

        let stored = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(op, bucket))?;
        if stored.probe_failures.contains(&object.key) {
            return Err(ApiError::with_code(op.as_str(), "InternalError", "injected retention probe failure"));
        }
        let version = stored
            .versions
            .iter()
            .find(|v| v.object == *object)
            .ok_or_else(|| ApiError::with_code(op.as_str(), "NoSuchVersion", "The specified version does not exist."))?;
        match version.lock {
            Some((mode, until)) => Ok(ObjectRetention {
                mode: Some(mode.as_str().to_string()),
                retain_until: Some(until),
            }),
            None => Err(ApiError::with_code(
                op.as_str(),
                "NoSuchObjectLockConfiguration",
                "The specified object does not have a ObjectLock configuration",
            )),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> ApiResult<()> {
        let op = Operation::DeleteBucket;
        let mut state = self.lock();
        state.calls.push((op, bucket.to_string()));

        let stored = state.buckets.get(bucket).ok_or_else(|| no_such_bucket(op, bucket))?;
        if stored.deny_delete {
            return Err(ApiError::with_code(op.as_str(), ACCESS_DENIED, "Access Denied"));
        }
        if !stored.versions.is_empty() {
            return Err(ApiError::with_code(
                op.as_str(),
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }
}
