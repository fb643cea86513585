//! TypeScript bindings for the wire types, consumed by the dashboard.

use crate::{document, feed, shelves, sync};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use ts_rs::TS;

/// Failure payload returned in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&sync::SyncError> for ErrorPayload {
    fn from(err: &sync::SyncError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<&document::LinkError> for ErrorPayload {
    fn from(err: &document::LinkError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Write one `.ts` file per wire type plus an `index.ts` into `out_dir`.
///
/// Stale `.ts` files in `out_dir` are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<feed::ProgressRecord>(out_dir)?;
    export_single_type::<feed::FeedItem>(out_dir)?;
    export_single_type::<document::ItemMetadata>(out_dir)?;
    export_single_type::<document::PublishYear>(out_dir)?;
    export_single_type::<document::LinkRequest>(out_dir)?;
    export_single_type::<shelves::LibraryCard>(out_dir)?;
    export_single_type::<shelves::LibraryShelves>(out_dir)?;
    export_single_type::<shelves::LibraryShelvesResponse>(out_dir)?;
    export_single_type::<sync::SyncDirection>(out_dir)?;
    export_single_type::<sync::RequestedDirection>(out_dir)?;
    export_single_type::<sync::SyncRequest>(out_dir)?;
    export_single_type::<sync::SyncResponse>(out_dir)?;
    export_single_type::<ErrorPayload>(out_dir)?;

    let index_content = r#"export type { ProgressRecord } from "./ProgressRecord";
export type { FeedItem } from "./FeedItem";
export type { ItemMetadata } from "./ItemMetadata";
export type { PublishYear } from "./PublishYear";
export type { LinkRequest } from "./LinkRequest";
export type { LibraryCard } from "./LibraryCard";
export type { LibraryShelves } from "./LibraryShelves";
export type { LibraryShelvesResponse } from "./LibraryShelvesResponse";
export type { SyncDirection } from "./SyncDirection";
export type { RequestedDirection } from "./RequestedDirection";
export type { SyncRequest } from "./SyncRequest";
export type { SyncResponse } from "./SyncResponse";
export type { ErrorPayload } from "./ErrorPayload";
"#;

    fs::write(out_dir.join("index.ts"), index_content).map_err(|err| {
        format!(
            "Failed to write {}: {err}",
            out_dir.join("index.ts").display()
        )
    })?;

    Ok(())
}
