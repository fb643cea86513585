//! Entry point for the shelfsync command-line tool.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Read the library feed from a file or the remote API.
//! - Run the requested command and print its JSON result on stdout.

mod cli;
mod remote;

use crate::cli::{Command, FeedSource, Invocation, parse_args};
use crate::remote::{RemoteLibrary, SessionContext};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use shelfsync_core::bindings::ErrorPayload;
use shelfsync_core::config::{AppConfig, load_config};
use shelfsync_core::snapshot::{FeedSnapshot, LibraryState};
use shelfsync_core::{
    Document, FeedItem, LinkRequest, RequestedDirection, SyncDecision, SyncRequest, SyncResponse,
    apply_link, decide, documents_for_owner, ingest, parse_feed, render_shelves,
};
use std::env;
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// JSON printed on stdout plus whether the command succeeded.
struct Outcome {
    json: String,
    success: bool,
}

impl Outcome {
    fn ok(value: &impl Serialize) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_string_pretty(value).context("failed to encode result")?,
            success: true,
        })
    }

    fn failed(payload: ErrorPayload) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_string_pretty(&payload).context("failed to encode error")?,
            success: false,
        })
    }
}

fn main() {
    let reload_handle = init_tracing();
    match run(&reload_handle) {
        Ok(outcome) => {
            println!("{}", outcome.json);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!("{err:?}");
            std::process::exit(1);
        }
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<Outcome> {
    let Invocation {
        config_path,
        command,
    } = parse_args(env::args().skip(1))?;
    let config = load_config(&config_path);
    if env::var_os("RUST_LOG").is_none() {
        set_log_level(reload_handle, config.log_level.as_filter_str());
    }
    info!(
        config = %config_path.display(),
        threshold = config.tie_break_threshold,
        recent_limit = config.recent_limit,
        log_level = %config.log_level,
        "Starting shelfsync"
    );

    match command {
        Command::Shelves { feed } => {
            let (items, documents) = load_documents(&feed, &config)?;
            let state = library_state(documents, &config);
            for (shelf, ids) in state.shelves().iter() {
                debug!(shelf = shelf.key(), count = ids.len(), "Shelf contents");
            }
            Outcome::ok(&render_shelves(state.shelves(), state.documents(), items))
        }
        Command::Decide {
            feed,
            document,
            direction,
        } => {
            let (_, documents) = load_documents(&feed, &config)?;
            let state = library_state(documents, &config);
            let doc = find_document(&state, &document)?;
            match evaluate(doc, direction, &config) {
                Ok(response) => Outcome::ok(&response),
                Err(payload) => Outcome::failed(payload),
            }
        }
        Command::Sync {
            feed,
            document,
            direction,
        } => run_sync(&feed, document, direction, &config),
        Command::Link {
            feed,
            document,
            item,
        } => run_link(&feed, document, item, &config),
    }
}

fn run_sync(
    feed: &FeedSource,
    document: String,
    direction: RequestedDirection,
    config: &AppConfig,
) -> Result<Outcome> {
    let FeedSource::Remote(base) = feed else {
        return Err(anyhow!("sync needs a remote feed; use `decide` for files"));
    };
    let ctx = SessionContext::from_env()?;
    let remote = remote_library(base.as_deref(), config)?;
    let (_, documents) = restrict_to_owner(remote.fetch_feed(&ctx)?, Some(&ctx.owner));
    let state = library_state(documents, config);
    let doc = find_document(&state, &document)?;

    let preview = match decide(doc, direction, &config.sync_policy()) {
        Ok(decision) => decision,
        Err(err) => {
            warn!(document = %document, "Sync not possible: {err}");
            return Outcome::failed(ErrorPayload::from(&err));
        }
    };
    if !needs_remote_sync(&preview) {
        match &preview.error {
            Some(err) => warn!(document = %document, "Not sending sync: {err}"),
            None => info!(document = %document, "Already in sync; not sending"),
        }
        return Outcome::ok(&SyncResponse::from(&preview));
    }

    let response = remote.sync(
        &ctx,
        &SyncRequest {
            document,
            direction,
        },
    )?;
    info!(direction = %response.direction, "Sync applied");
    Outcome::ok(&response)
}

fn run_link(
    feed: &FeedSource,
    document: String,
    item: Option<String>,
    config: &AppConfig,
) -> Result<Outcome> {
    let request = LinkRequest {
        document,
        library_item_id: item,
    };
    match feed {
        FeedSource::Remote(base) => {
            let ctx = SessionContext::from_env()?;
            let remote = remote_library(base.as_deref(), config)?;
            let confirmed = remote.link(&ctx, &request)?;
            Outcome::ok(&confirmed)
        }
        FeedSource::File(_) => {
            let (_, mut documents) = load_documents(feed, config)?;
            match apply_link(&mut documents, &request, now_unix_secs()) {
                Ok(doc) => Outcome::ok(doc),
                Err(err) => Outcome::failed(ErrorPayload::from(&err)),
            }
        }
    }
}

/// Only a clear decision that changes the target is sent to the server.
fn needs_remote_sync(decision: &SyncDecision) -> bool {
    decision.requires_action && decision.error.is_none()
}

fn evaluate(
    doc: &Document,
    direction: RequestedDirection,
    config: &AppConfig,
) -> std::result::Result<SyncResponse, ErrorPayload> {
    decide(doc, direction, &config.sync_policy())
        .map(|decision| SyncResponse::from(&decision))
        .map_err(|err| {
            warn!(document = %doc.document_id, "Sync not possible: {err}");
            ErrorPayload::from(&err)
        })
}

/// Admit one owner's documents as the current snapshot and classify them.
fn library_state(documents: Vec<Document>, config: &AppConfig) -> LibraryState {
    let owner = documents
        .first()
        .map(|doc| doc.owner.clone())
        .unwrap_or_default();
    let mut state = LibraryState::new();
    let request_id = state.allocate_request_id();
    state.admit(
        FeedSnapshot::capture(request_id, owner, documents),
        config.recent_limit,
    );
    if let Some(snapshot) = state.snapshot() {
        debug!(signature = %snapshot.signature, "Feed snapshot ready");
    }
    state
}

fn find_document<'a>(state: &'a LibraryState, document_id: &str) -> Result<&'a Document> {
    state
        .document(document_id)
        .ok_or_else(|| anyhow!("document {document_id:?} is not in the feed"))
}

/// Read the feed and reduce it to one owner's items and documents.
fn load_documents(feed: &FeedSource, config: &AppConfig) -> Result<(Vec<FeedItem>, Vec<Document>)> {
    let (items, owner) = match feed {
        FeedSource::File(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("failed to read feed {}", path.display()))?;
            (parse_feed(&body)?, SessionContext::owner_from_env())
        }
        FeedSource::Remote(base) => {
            let ctx = SessionContext::from_env()?;
            let remote = remote_library(base.as_deref(), config)?;
            (remote.fetch_feed(&ctx)?, Some(ctx.owner))
        }
    };
    Ok(restrict_to_owner(items, owner.as_deref()))
}

/// Keep one account's items; without an explicit owner the first item's
/// account is used.
fn restrict_to_owner(
    mut items: Vec<FeedItem>,
    owner: Option<&str>,
) -> (Vec<FeedItem>, Vec<Document>) {
    let owner = owner
        .map(str::to_string)
        .or_else(|| items.first().map(|item| item.username.clone()));
    let Some(owner) = owner else {
        return (Vec::new(), Vec::new());
    };
    info!(%owner, "Restricting feed to one account");
    items.retain(|item| item.username == owner);
    let documents = documents_for_owner(ingest(items.clone()), &owner);
    (items, documents)
}

fn remote_library(base: Option<&str>, config: &AppConfig) -> Result<RemoteLibrary> {
    RemoteLibrary::new(
        base.unwrap_or(&config.base_url),
        Duration::from_secs(config.timeout_secs),
    )
}

fn now_unix_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
