//! Paginated enumeration of object versions as delete batches

use futures::stream::{self, Stream};
use std::collections::VecDeque;

use crate::error::{ReclaimError, Result};
use crate::s3::api::ObjectStoreApi;
use crate::s3::types::{DeleteBatch, ListVersionsRequest, VersionListing, MAX_BATCH_SIZE};

/// Next-page markers of a version listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationCursor {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
    pub truncated: bool,
}

impl PaginationCursor {
    /// Cursor for the first page: no markers, more to fetch
    pub fn start() -> Self {
        Self {
            key_marker: None,
            version_id_marker: None,
            truncated: true,
        }
    }

    pub fn request(&self, bucket: &str, max_keys: usize) -> ListVersionsRequest {
        ListVersionsRequest {
            bucket: bucket.to_string(),
            max_keys,
            key_marker: self.key_marker.clone(),
            version_id_marker: self.version_id_marker.clone(),
        }
    }

    /// Take the markers of `listing` verbatim
    pub fn advance(&mut self, listing: &VersionListing) {
        self.key_marker = listing.next_key_marker.clone();
        self.version_id_marker = listing.next_version_id_marker.clone();
        self.truncated = listing.is_truncated;
    }
}

struct ListState {
    cursor: PaginationCursor,
    pending: VecDeque<DeleteBatch>,
}

/// Lazily list every version and delete marker of `bucket` as delete batches
///
/// Each call starts from the first page. Pages come back as batches of at
/// most `batch_size` refs, versions before delete markers; empty pages are
/// skipped. A listing error ends the stream.
pub fn list_versions<'a, C: ObjectStoreApi + ?Sized>(
    client: &'a C,
    bucket: &'a str,
    batch_size: usize,
) -> impl Stream<Item = Result<DeleteBatch>> + Send + 'a {
    let state = ListState {
        cursor: PaginationCursor::start(),
        pending: VecDeque::new(),
    };

    stream::try_unfold(state, move |mut state| async move {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(ReclaimError::InvalidBatchSize {
                size: batch_size,
                max: MAX_BATCH_SIZE,
            });
        }

        loop {
            if let Some(batch) = state.pending.pop_front() {
                return Ok(Some((batch, state)));
            }
            if !state.cursor.truncated {
                return Ok(None);
            }

            let request = state.cursor.request(bucket, batch_size);
            let listing = client
                .list_object_versions(&request)
                .await
                .map_err(|source| ReclaimError::Listing {
                    bucket: bucket.to_string(),
                    source,
                })?;
            state.cursor.advance(&listing);

            let objects = listing.into_objects();
            tracing::debug!(
                bucket,
                count = objects.len(),
                truncated = state.cursor.truncated,
                "listed object versions"
            );
            state.pending.extend(DeleteBatch::chunked(objects, batch_size));
        }
    })
}
