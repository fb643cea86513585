//! Feed snapshots and last-request-wins admission.
//!
//! Each fetch of the library feed is tagged with a request id. Only the
//! newest admitted snapshot drives the shelves, so a slow response for an old
//! request cannot overwrite a newer one.

use crate::document::Document;
use crate::shelves::{ShelfSet, classify};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const SNAPSHOT_SIGNATURE_REV: &str = "feed-snapshot-v1";

/// One atomic read of an owner's documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub request_id: u64,
    pub owner: String,
    pub signature: String,
    pub documents: Vec<Document>,
}

impl FeedSnapshot {
    pub fn capture(request_id: u64, owner: impl Into<String>, documents: Vec<Document>) -> Self {
        let owner = owner.into();
        let signature = snapshot_signature(&owner, &documents);
        Self {
            request_id,
            owner,
            signature,
            documents,
        }
    }
}

fn snapshot_signature(owner: &str, documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SNAPSHOT_SIGNATURE_REV.as_bytes());
    hasher.update(owner.as_bytes());
    hasher.update([0u8]);
    for doc in documents {
        // Document has no maps or custom serializers, so this never errors.
        let encoded = serde_json::to_vec(doc).unwrap_or_default();
        hasher.update(&encoded);
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Whether request `id` was allocated before `current`, allowing for the
/// counter wrapping past `u64::MAX`.
fn is_older(id: u64, current: u64) -> bool {
    (id.wrapping_sub(current) as i64) < 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newer content; shelves were recomputed.
    Reclassified,
    /// Newer request with identical content; shelves kept.
    Unchanged,
    /// Older than the last admitted request; ignored.
    Stale,
}

/// The current snapshot and its shelves.
#[derive(Debug, Default)]
pub struct LibraryState {
    next_request_id: u64,
    current: Option<FeedSnapshot>,
    shelves: ShelfSet,
    /// `recent_limit` the current shelves were classified with.
    shelves_limit: usize,
}

impl LibraryState {
    pub fn new() -> Self {
        Self {
            next_request_id: 1,
            ..Self::default()
        }
    }

    /// Allocate the id for the next feed request.
    pub fn allocate_request_id(&mut self) -> u64 {
        let request_id = self.next_request_id.max(1);
        self.next_request_id = request_id.wrapping_add(1).max(1);
        request_id
    }

    pub fn admit(&mut self, snapshot: FeedSnapshot, recent_limit: usize) -> Admission {
        if let Some(current) = &self.current {
            if is_older(snapshot.request_id, current.request_id) {
                debug!(
                    request_id = snapshot.request_id,
                    current = current.request_id,
                    "Ignoring stale feed snapshot"
                );
                return Admission::Stale;
            }
            if snapshot.owner == current.owner
                && snapshot.signature == current.signature
                && recent_limit == self.shelves_limit
            {
                debug!(request_id = snapshot.request_id, "Feed snapshot unchanged");
                self.current = Some(snapshot);
                return Admission::Unchanged;
            }
        }

        self.shelves = classify(&snapshot.documents, recent_limit);
        self.shelves_limit = recent_limit;
        info!(
            request_id = snapshot.request_id,
            owner = %snapshot.owner,
            documents = snapshot.documents.len(),
            "Admitted feed snapshot"
        );
        self.current = Some(snapshot);
        Admission::Reclassified
    }

    pub fn snapshot(&self) -> Option<&FeedSnapshot> {
        self.current.as_ref()
    }

    pub fn shelves(&self) -> &ShelfSet {
        &self.shelves
    }

    pub fn documents(&self) -> &[Document] {
        self.current
            .as_ref()
            .map(|snapshot| snapshot.documents.as_slice())
            .unwrap_or(&[])
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents()
            .iter()
            .find(|doc| doc.document_id == document_id)
    }
}
