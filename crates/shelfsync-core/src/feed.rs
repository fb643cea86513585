//! Decoding of the library item feed into [`Document`]s.

use crate::document::{Document, ItemMetadata};
use crate::progress::Progress;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use ts_rs::TS;

/// Progress record in the shape both sources report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub device: Option<String>,
    #[serde(default, rename = "device_id", skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub current_time: Option<f64>,
}

/// One entry of the library feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FeedItem {
    pub username: String,
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub library_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub local_progress: Option<ProgressRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub remote_progress: Option<ProgressRecord>,
    /// Why the audiobook progress could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub remote_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub metadata_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub metadata: Option<ItemMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub last_updated: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedPayload {
    Items(Vec<FeedItem>),
    Response { items: Vec<FeedItem> },
}

/// Parse a feed body: either a bare item array or an object with `items`.
pub fn parse_feed(body: &str) -> Result<Vec<FeedItem>> {
    let payload: FeedPayload =
        serde_json::from_str(body).context("failed to parse library feed JSON")?;
    Ok(match payload {
        FeedPayload::Items(items) => items,
        FeedPayload::Response { items } => items,
    })
}

/// Build documents from feed items, preserving feed order.
///
/// A repeated `(username, document)` pair keeps its first occurrence, and
/// remote progress reported for an unlinked item is dropped.
pub fn ingest(items: Vec<FeedItem>) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(items.len());
    for item in items {
        if !seen.insert((item.username.clone(), item.document.clone())) {
            warn!(
                owner = %item.username,
                document = %item.document,
                "Skipping duplicate document in feed"
            );
            continue;
        }
        documents.push(document_from_item(item));
    }
    debug!(count = documents.len(), "Ingested library feed");
    documents
}

/// Keep only the documents belonging to `owner`.
pub fn documents_for_owner(documents: Vec<Document>, owner: &str) -> Vec<Document> {
    documents
        .into_iter()
        .filter(|doc| doc.owner == owner)
        .collect()
}

fn document_from_item(item: FeedItem) -> Document {
    let linked_item_id = item
        .library_item_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let duration = item.metadata.as_ref().and_then(|meta| meta.duration);

    let mut remote_progress = item
        .remote_progress
        .map(|record| progress_from_record(record, duration));
    if linked_item_id.is_none() && remote_progress.take().is_some() {
        warn!(
            document = %item.document,
            "Dropping remote progress reported for an unlinked document"
        );
    }

    Document {
        owner: item.username,
        document_id: item.document,
        linked_item_id,
        local_progress: item
            .local_progress
            .map(|record| progress_from_record(record, None)),
        remote_progress,
        last_updated: item.last_updated,
        metadata: item.metadata,
    }
}

fn progress_from_record(record: ProgressRecord, total_seconds: Option<f64>) -> Progress {
    Progress {
        fraction: record.percentage,
        raw_label: record.progress,
        elapsed_seconds: record.current_time,
        total_seconds,
        observed_at: record.timestamp,
        source_device: record.device.or(record.device_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PublishYear;

    #[test]
    fn parses_bare_array_and_response_object() {
        let bare = r#"[{"username":"ana","document":"d1"}]"#;
        let wrapped = r#"{"shelves":{},"items":[{"username":"ana","document":"d1"}]}"#;
        assert_eq!(parse_feed(bare).unwrap().len(), 1);
        assert_eq!(parse_feed(wrapped).unwrap().len(), 1);
        assert!(parse_feed("{\"nope\":1}").is_err());
    }

    #[test]
    fn maps_wire_fields_onto_progress() {
        let body = r#"[{
            "username": "ana",
            "document": "d1",
            "libraryItemId": "itm1",
            "localProgress": {"percentage": 0.4, "progress": "/body/p[2]", "device": "kobo", "timestamp": 100},
            "remoteProgress": {"currentTime": 30, "device_id": "phone", "timestamp": 200},
            "metadata": {"title": "Dune", "duration": 120},
            "lastUpdated": 300
        }]"#;
        let docs = ingest(parse_feed(body).unwrap());
        let doc = &docs[0];
        assert_eq!(doc.owner, "ana");
        assert_eq!(doc.linked_item_id.as_deref(), Some("itm1"));

        let local = doc.local_progress.as_ref().unwrap();
        assert_eq!(local.fraction, Some(0.4));
        assert_eq!(local.raw_label.as_deref(), Some("/body/p[2]"));
        assert_eq!(local.source_device.as_deref(), Some("kobo"));
        assert_eq!(local.observed_at, Some(100.0));

        let remote = doc.remote_progress.as_ref().unwrap();
        assert_eq!(remote.total_seconds, Some(120.0));
        assert_eq!(remote.source_device.as_deref(), Some("phone"));
        assert_eq!(remote.fraction(), Some(0.25));
        assert_eq!(doc.last_updated, Some(300.0));
    }

    #[test]
    fn error_and_cover_fields_pass_through() {
        let body = r#"[{
            "username": "ana",
            "document": "d1",
            "libraryItemId": "itm1",
            "remoteError": "audiobook server timed out",
            "metadataError": "item not found",
            "coverUrl": "/covers/itm1.jpg",
            "metadata": {
                "title": "Dune",
                "coverUrl": "/covers/itm1-small.jpg",
                "description": "Desert planet.",
                "publishYear": "1965",
                "tags": ["sci-fi", "classic"]
            }
        }]"#;
        let items = parse_feed(body).unwrap();
        let item = &items[0];
        assert_eq!(item.remote_error.as_deref(), Some("audiobook server timed out"));
        assert_eq!(item.metadata_error.as_deref(), Some("item not found"));
        assert_eq!(item.cover_url.as_deref(), Some("/covers/itm1.jpg"));
        let meta = item.metadata.as_ref().unwrap();
        assert_eq!(meta.publish_year, Some(PublishYear::Label("1965".to_string())));
        assert_eq!(
            meta.tags.as_deref(),
            Some(&["sci-fi".to_string(), "classic".to_string()][..])
        );

        let echoed = serde_json::to_value(&items).unwrap();
        assert_eq!(echoed[0]["remoteError"], "audiobook server timed out");
        assert_eq!(echoed[0]["metadataError"], "item not found");
        assert_eq!(echoed[0]["coverUrl"], "/covers/itm1.jpg");
        assert_eq!(echoed[0]["metadata"]["coverUrl"], "/covers/itm1-small.jpg");
        assert_eq!(echoed[0]["metadata"]["description"], "Desert planet.");
        assert_eq!(echoed[0]["metadata"]["publishYear"], "1965");
        assert_eq!(parse_feed(&echoed.to_string()).unwrap(), items);

        let numeric = parse_feed(r#"[{"username":"ana","document":"d2","metadata":{"publishYear":1965}}]"#)
            .unwrap();
        assert_eq!(
            numeric[0].metadata.as_ref().unwrap().publish_year,
            Some(PublishYear::Year(1965))
        );
    }

    #[test]
    fn unlinked_items_lose_remote_progress() {
        let items = vec![FeedItem {
            username: "ana".to_string(),
            document: "d1".to_string(),
            library_item_id: Some("   ".to_string()),
            remote_progress: Some(ProgressRecord {
                percentage: Some(0.5),
                ..ProgressRecord::default()
            }),
            ..FeedItem::default()
        }];
        let docs = ingest(items);
        assert!(docs[0].linked_item_id.is_none());
        assert!(docs[0].remote_progress.is_none());
    }

    #[test]
    fn duplicates_keep_first_occurrence_per_owner() {
        let item = |owner: &str, doc: &str, pct: f64| FeedItem {
            username: owner.to_string(),
            document: doc.to_string(),
            local_progress: Some(ProgressRecord {
                percentage: Some(pct),
                ..ProgressRecord::default()
            }),
            ..FeedItem::default()
        };
        let docs = ingest(vec![
            item("ana", "d1", 0.1),
            item("bob", "d1", 0.2),
            item("ana", "d1", 0.9),
            item("ana", "d2", 0.3),
        ]);
        let ids: Vec<_> = docs
            .iter()
            .map(|doc| (doc.owner.as_str(), doc.document_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("ana", "d1"), ("bob", "d1"), ("ana", "d2")]);
        assert_eq!(docs[0].local_progress.as_ref().unwrap().fraction, Some(0.1));

        let ana = documents_for_owner(docs, "ana");
        assert_eq!(ana.len(), 2);
    }
}
