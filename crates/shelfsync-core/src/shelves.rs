//! Shelf classification.
//!
//! A [`ShelfSet`] is a fixed-order mapping from [`Shelf`] to documents. Every
//! shelf other than [`Shelf::All`] stores positions into the `all` list, so a
//! document can only appear on a shelf if it is also in `all`.

use crate::document::Document;
use crate::feed::FeedItem;
use crate::progress::{is_in_progress, normalize};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;
use ts_rs::TS;

/// Named shelves in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shelf {
    Unlinked,
    ContinueListening,
    ContinueReading,
    RecentlyLinked,
    All,
}

impl Shelf {
    pub const ORDER: [Shelf; 5] = [
        Shelf::Unlinked,
        Shelf::ContinueListening,
        Shelf::ContinueReading,
        Shelf::RecentlyLinked,
        Shelf::All,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Shelf::Unlinked => "unlinked",
            Shelf::ContinueListening => "continueListening",
            Shelf::ContinueReading => "continueReading",
            Shelf::RecentlyLinked => "recentlyLinked",
            Shelf::All => "all",
        }
    }
}

/// Categorized view of one owner's documents at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShelfSet {
    all: Vec<String>,
    unlinked: Vec<usize>,
    continue_listening: Vec<usize>,
    continue_reading: Vec<usize>,
    recently_linked: Vec<usize>,
}

impl ShelfSet {
    /// Positions into the `all` list for the given shelf.
    pub fn positions(&self, shelf: Shelf) -> Vec<usize> {
        match shelf {
            Shelf::Unlinked => self.unlinked.clone(),
            Shelf::ContinueListening => self.continue_listening.clone(),
            Shelf::ContinueReading => self.continue_reading.clone(),
            Shelf::RecentlyLinked => self.recently_linked.clone(),
            Shelf::All => (0..self.all.len()).collect(),
        }
    }

    pub fn ids(&self, shelf: Shelf) -> Vec<&str> {
        self.positions(shelf)
            .into_iter()
            .map(|idx| self.all[idx].as_str())
            .collect()
    }

    pub fn len(&self, shelf: Shelf) -> usize {
        match shelf {
            Shelf::Unlinked => self.unlinked.len(),
            Shelf::ContinueListening => self.continue_listening.len(),
            Shelf::ContinueReading => self.continue_reading.len(),
            Shelf::RecentlyLinked => self.recently_linked.len(),
            Shelf::All => self.all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Shelves with their document ids, in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = (Shelf, Vec<&str>)> + '_ {
        Shelf::ORDER.into_iter().map(|shelf| (shelf, self.ids(shelf)))
    }
}

/// Partition `documents` into shelves.
///
/// Bucket membership is non-exclusive and `all` keeps input order. Only
/// `recently_linked` is reordered and truncated to `recent_limit`.
pub fn classify(documents: &[Document], recent_limit: usize) -> ShelfSet {
    let mut set = ShelfSet {
        all: documents.iter().map(|doc| doc.document_id.clone()).collect(),
        ..ShelfSet::default()
    };

    let mut linked = Vec::new();
    for (idx, doc) in documents.iter().enumerate() {
        if !doc.is_linked() {
            set.unlinked.push(idx);
        } else {
            linked.push(idx);
            if is_in_progress(normalize(doc.remote_progress.as_ref())) {
                set.continue_listening.push(idx);
            }
        }
        if is_in_progress(normalize(doc.local_progress.as_ref())) {
            set.continue_reading.push(idx);
        }
    }

    linked.sort_by(|&a, &b| recency_order(&documents[a], &documents[b]));
    linked.truncate(recent_limit);
    set.recently_linked = linked;

    debug!(
        all = set.all.len(),
        unlinked = set.unlinked.len(),
        continue_listening = set.continue_listening.len(),
        continue_reading = set.continue_reading.len(),
        recently_linked = set.recently_linked.len(),
        "Classified documents"
    );
    set
}

/// Most recently updated first; undated entries last; ties by document id.
fn recency_order(a: &Document, b: &Document) -> Ordering {
    let by_time = match (a.last_updated, b.last_updated) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.document_id.cmp(&b.document_id))
}

/// Dashboard card for one document on one shelf.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LibraryCard {
    pub document: String,
    pub library_item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub media_type: Option<String>,
    pub ebook_progress: Option<f64>,
    pub audio_progress: Option<f64>,
    pub last_updated: Option<f64>,
}

impl LibraryCard {
    pub fn from_document(doc: &Document) -> Self {
        let meta = doc.metadata.clone().unwrap_or_default();
        Self {
            document: doc.document_id.clone(),
            library_item_id: doc.linked_item_id.clone(),
            title: meta.title,
            author: meta.author,
            duration: meta.duration,
            cover_path: meta.cover_path,
            cover_url: meta.cover_url,
            media_type: meta.media_type,
            ebook_progress: normalize(doc.local_progress.as_ref()),
            audio_progress: normalize(doc.remote_progress.as_ref()),
            last_updated: doc.last_updated,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LibraryShelves {
    pub continue_listening: Vec<LibraryCard>,
    pub continue_reading: Vec<LibraryCard>,
    pub recently_linked: Vec<LibraryCard>,
    pub unlinked: Vec<LibraryCard>,
    pub all: Vec<LibraryCard>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct LibraryShelvesResponse {
    pub shelves: LibraryShelves,
    pub items: Vec<FeedItem>,
}

/// Render a classified set into dashboard cards.
///
/// `documents` must be the slice `set` was classified from.
pub fn render_shelves(
    set: &ShelfSet,
    documents: &[Document],
    items: Vec<FeedItem>,
) -> LibraryShelvesResponse {
    let cards = |shelf: Shelf| -> Vec<LibraryCard> {
        set.positions(shelf)
            .into_iter()
            .filter_map(|idx| documents.get(idx))
            .map(LibraryCard::from_document)
            .collect()
    };
    LibraryShelvesResponse {
        shelves: LibraryShelves {
            continue_listening: cards(Shelf::ContinueListening),
            continue_reading: cards(Shelf::ContinueReading),
            recently_linked: cards(Shelf::RecentlyLinked),
            unlinked: cards(Shelf::Unlinked),
            all: cards(Shelf::All),
        },
        items,
    }
}
