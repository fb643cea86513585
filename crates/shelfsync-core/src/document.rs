//! Documents known to the local system and their links to audiobook items.

use crate::progress::Progress;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;

/// One unit of reading material, optionally linked to an audiobook item.
///
/// A document without `linked_item_id` never carries `remote_progress`;
/// [`crate::feed`] and [`apply_link`] keep that true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub owner: String,
    pub document_id: String,
    pub linked_item_id: Option<String>,
    pub local_progress: Option<Progress>,
    pub remote_progress: Option<Progress>,
    /// Unix seconds.
    pub last_updated: Option<f64>,
    pub metadata: Option<ItemMetadata>,
}

/// Display and duration data for the linked audiobook item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub publish_year: Option<PublishYear>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub tags: Option<Vec<String>>,
}

/// Publication year, reported either as a number or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum PublishYear {
    Year(i64),
    Label(String),
}

impl Document {
    pub fn new(owner: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            document_id: document_id.into(),
            ..Self::default()
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked_item_id.is_some()
    }

    /// Duration of the linked audio in seconds, from item metadata first and
    /// the remote progress record second.
    pub fn audio_duration(&self) -> Option<f64> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.duration)
            .or_else(|| {
                self.remote_progress
                    .as_ref()
                    .and_then(|progress| progress.total_seconds)
            })
            .filter(|duration| duration.is_finite() && *duration > 0.0)
    }
}

/// Link request as posted by the dashboard. A null item id unlinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LinkRequest {
    pub document: String,
    pub library_item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("document {0:?} is not known for this account")]
    UnknownDocument(String),
}

impl LinkError {
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::UnknownDocument(_) => "unknown_document",
        }
    }
}

/// Apply a link or unlink to the matching document and return it.
///
/// Switching to a different item drops remote progress and metadata, which
/// described the previous item.
pub fn apply_link<'a>(
    documents: &'a mut [Document],
    request: &LinkRequest,
    linked_at: f64,
) -> Result<&'a Document, LinkError> {
    let doc = documents
        .iter_mut()
        .find(|doc| doc.document_id == request.document)
        .ok_or_else(|| LinkError::UnknownDocument(request.document.clone()))?;

    let target = request
        .library_item_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    if doc.linked_item_id == target {
        debug!(document = %doc.document_id, "Link unchanged");
        return Ok(doc);
    }

    doc.remote_progress = None;
    doc.metadata = None;
    match &target {
        Some(item) => info!(document = %doc.document_id, item = %item, "Linked document"),
        None => info!(document = %doc.document_id, "Unlinked document"),
    }
    if target.is_some() {
        doc.last_updated = Some(linked_at);
    }
    doc.linked_item_id = target;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_doc(id: &str, item: &str) -> Document {
        Document {
            linked_item_id: Some(item.to_string()),
            remote_progress: Some(Progress::from_elapsed(60.0, 120.0)),
            metadata: Some(ItemMetadata {
                title: Some("Dune".to_string()),
                duration: Some(120.0),
                ..ItemMetadata::default()
            }),
            last_updated: Some(10.0),
            ..Document::new("reader", id)
        }
    }

    fn request(document: &str, item: Option<&str>) -> LinkRequest {
        LinkRequest {
            document: document.to_string(),
            library_item_id: item.map(str::to_string),
        }
    }

    #[test]
    fn linking_sets_item_and_timestamp() {
        let mut docs = vec![Document::new("reader", "doc-a")];
        let doc = apply_link(&mut docs, &request("doc-a", Some("itm1")), 500.0).unwrap();
        assert_eq!(doc.linked_item_id.as_deref(), Some("itm1"));
        assert_eq!(doc.last_updated, Some(500.0));
    }

    #[test]
    fn unlinking_drops_remote_state() {
        let mut docs = vec![linked_doc("doc-a", "itm1")];
        let doc = apply_link(&mut docs, &request("doc-a", None), 500.0).unwrap();
        assert!(!doc.is_linked());
        assert!(doc.remote_progress.is_none());
        assert!(doc.metadata.is_none());
        assert_eq!(doc.last_updated, Some(10.0));
    }

    #[test]
    fn relinking_same_item_is_a_no_op() {
        let mut docs = vec![linked_doc("doc-a", "itm1")];
        let before = docs[0].clone();
        let doc = apply_link(&mut docs, &request("doc-a", Some("itm1")), 500.0).unwrap();
        assert_eq!(*doc, before);
    }

    #[test]
    fn switching_items_clears_previous_remote_progress() {
        let mut docs = vec![linked_doc("doc-a", "itm1")];
        let doc = apply_link(&mut docs, &request("doc-a", Some("itm2")), 500.0).unwrap();
        assert_eq!(doc.linked_item_id.as_deref(), Some("itm2"));
        assert!(doc.remote_progress.is_none());
    }

    #[test]
    fn blank_item_id_unlinks() {
        let mut docs = vec![linked_doc("doc-a", "itm1")];
        let doc = apply_link(&mut docs, &request("doc-a", Some("  ")), 500.0).unwrap();
        assert!(!doc.is_linked());
    }

    #[test]
    fn unknown_document_is_reported() {
        let mut docs = vec![Document::new("reader", "doc-a")];
        let err = apply_link(&mut docs, &request("doc-z", Some("itm1")), 1.0).unwrap_err();
        assert_eq!(err, LinkError::UnknownDocument("doc-z".to_string()));
        assert_eq!(err.code(), "unknown_document");
    }

    #[test]
    fn audio_duration_prefers_metadata() {
        let mut doc = linked_doc("doc-a", "itm1");
        assert_eq!(doc.audio_duration(), Some(120.0));
        doc.metadata = None;
        doc.remote_progress = Some(Progress::from_elapsed(5.0, 90.0));
        assert_eq!(doc.audio_duration(), Some(90.0));
        doc.remote_progress = Some(Progress::from_elapsed(5.0, 0.0));
        assert_eq!(doc.audio_duration(), None);
    }
}
