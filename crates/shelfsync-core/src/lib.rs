//! Progress reconciliation between an e-reader and an audiobook service.
//!
//! - [`progress`] turns raw progress records into comparable fractions.
//! - [`shelves`] buckets an owner's documents into dashboard shelves.
//! - [`sync`] advises which way a sync should flow for one document.
//!
//! The remaining modules decode the JSON feed, apply links, gate feed
//! snapshots and load configuration.

pub mod bindings;
pub mod config;
pub mod document;
pub mod feed;
pub mod progress;
pub mod shelves;
pub mod snapshot;
pub mod sync;

pub use document::{Document, ItemMetadata, LinkError, LinkRequest, PublishYear, apply_link};
pub use feed::{FeedItem, ProgressRecord, documents_for_owner, ingest, parse_feed};
pub use progress::{Progress, normalize};
pub use shelves::{LibraryShelvesResponse, Shelf, ShelfSet, classify, render_shelves};
pub use sync::{
    RequestedDirection, SyncDecision, SyncDirection, SyncError, SyncPolicy, SyncRequest,
    SyncResponse, decide,
};
