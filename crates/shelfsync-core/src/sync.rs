//! Sync direction advice for a single linked document.
//!
//! [`decide`] compares the normalized local (e-reader) and remote (audiobook)
//! fractions and reports which side should overwrite the other. It never
//! mutates anything; the caller applies the decision.

use crate::document::Document;
use crate::progress::normalize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;

pub const DEFAULT_TIE_BREAK_THRESHOLD: f64 = 0.01;

/// Absorbs float error so a gap of exactly the threshold counts as in sync.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Which progress source overwrites the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SyncDirection {
    /// Push e-reader progress to the audiobook.
    #[serde(rename = "to_audiobook")]
    ToRemote,
    /// Pull audiobook progress into the e-reader.
    #[serde(rename = "from_audiobook")]
    FromRemote,
}

impl SyncDirection {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            SyncDirection::ToRemote => "to_audiobook",
            SyncDirection::FromRemote => "from_audiobook",
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// Direction asked for by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RequestedDirection {
    ToAudio,
    FromAudio,
    Auto,
}

impl RequestedDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "to_audio" | "to_audiobook" | "to_remote" => Some(RequestedDirection::ToAudio),
            "from_audio" | "from_audiobook" | "from_remote" => {
                Some(RequestedDirection::FromAudio)
            }
            "auto" => Some(RequestedDirection::Auto),
            _ => None,
        }
    }

    /// Path segment used by the remote sync endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            RequestedDirection::ToAudio => "to-audio",
            RequestedDirection::FromAudio => "from-audio",
            RequestedDirection::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Side::Local => "ebook",
            Side::Remote => "audiobook",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("document {document:?} is not linked to an audiobook item")]
    NotLinked { document: String },
    #[error("document {document:?} has no usable {side} progress")]
    MissingSource { document: String, side: Side },
    #[error(
        "ebook at {local:.3} and audiobook at {remote:.3} disagree with no recency to break the tie; suggested {suggested}"
    )]
    AmbiguousDirection {
        local: f64,
        remote: f64,
        suggested: SyncDirection,
    },
}

impl SyncError {
    /// Error kind as reported in a sync response.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NotLinked { .. } => "NotLinked",
            SyncError::MissingSource { .. } => "MissingSource",
            SyncError::AmbiguousDirection { .. } => "AmbiguousDirection",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SyncError::NotLinked { .. } => "not_linked",
            SyncError::MissingSource { .. } => "missing_source",
            SyncError::AmbiguousDirection { .. } => "ambiguous_direction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPolicy {
    /// Fractions closer than this are already in sync.
    pub tie_break_threshold: f64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            tie_break_threshold: DEFAULT_TIE_BREAK_THRESHOLD,
        }
    }
}

/// Outcome of evaluating one document.
///
/// `target_fraction` and `target_elapsed_seconds` describe the target side
/// after the decision is applied; when `requires_action` is false they are
/// the target's current values.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDecision {
    pub direction: SyncDirection,
    pub source_fraction: f64,
    pub target_fraction: f64,
    pub target_elapsed_seconds: Option<f64>,
    pub target_duration_seconds: Option<f64>,
    pub error: Option<SyncError>,
    pub suggested_direction: Option<SyncDirection>,
    pub requires_action: bool,
}

/// Decide how `doc` should be synchronized.
///
/// `NotLinked` and `MissingSource` fail outright. An ambiguous `Auto`
/// request succeeds with `error` and `suggested_direction` set and nothing to
/// apply; the caller must re-issue an explicit direction.
pub fn decide(
    doc: &Document,
    requested: RequestedDirection,
    policy: &SyncPolicy,
) -> Result<SyncDecision, SyncError> {
    if !doc.is_linked() {
        return Err(SyncError::NotLinked {
            document: doc.document_id.clone(),
        });
    }

    let view = ProgressView::of(doc);
    let missing = |side| SyncError::MissingSource {
        document: doc.document_id.clone(),
        side,
    };

    let decision = match requested {
        RequestedDirection::ToAudio => {
            let local = view.local.ok_or_else(|| missing(Side::Local))?;
            view.apply(SyncDirection::ToRemote, local)
        }
        RequestedDirection::FromAudio => {
            let remote = view.remote.ok_or_else(|| missing(Side::Remote))?;
            view.apply(SyncDirection::FromRemote, remote)
        }
        RequestedDirection::Auto => match (view.local, view.remote) {
            (None, None) => return Err(missing(Side::Local)),
            (Some(local), None) => view.apply(SyncDirection::ToRemote, local),
            (None, Some(remote)) => view.apply(SyncDirection::FromRemote, remote),
            (Some(local), Some(remote)) => {
                auto_with_both(&view, local, remote, doc, policy.tie_break_threshold)
            }
        },
    };

    debug!(
        document = %doc.document_id,
        requested = ?requested,
        direction = %decision.direction,
        requires_action = decision.requires_action,
        error = decision.error.as_ref().map(SyncError::kind),
        "Evaluated sync direction"
    );
    Ok(decision)
}

fn auto_with_both(
    view: &ProgressView,
    local: f64,
    remote: f64,
    doc: &Document,
    threshold: f64,
) -> SyncDecision {
    let newer = newer_side(doc);
    if (local - remote).abs() <= threshold + THRESHOLD_EPSILON {
        let direction = match newer {
            Some(Side::Remote) => SyncDirection::FromRemote,
            Some(Side::Local) => SyncDirection::ToRemote,
            None => higher_side(local, remote),
        };
        return view.hold(direction, None);
    }

    match newer {
        Some(Side::Local) => view.apply(SyncDirection::ToRemote, local),
        Some(Side::Remote) => view.apply(SyncDirection::FromRemote, remote),
        None => {
            let suggested = higher_side(local, remote);
            view.hold(
                suggested,
                Some(SyncError::AmbiguousDirection {
                    local,
                    remote,
                    suggested,
                }),
            )
        }
    }
}

fn higher_side(local: f64, remote: f64) -> SyncDirection {
    if remote > local {
        SyncDirection::FromRemote
    } else {
        SyncDirection::ToRemote
    }
}

/// The side observed more recently, if both timestamps exist and differ.
fn newer_side(doc: &Document) -> Option<Side> {
    let local = doc.local_progress.as_ref()?.observed_at?;
    let remote = doc.remote_progress.as_ref()?.observed_at?;
    match local.total_cmp(&remote) {
        Ordering::Greater => Some(Side::Local),
        Ordering::Less => Some(Side::Remote),
        Ordering::Equal => None,
    }
}

/// Both normalized fractions plus the audio timing of one document.
struct ProgressView {
    local: Option<f64>,
    remote: Option<f64>,
    remote_elapsed: Option<f64>,
    duration: Option<f64>,
}

impl ProgressView {
    fn of(doc: &Document) -> Self {
        let duration = doc.audio_duration();
        let remote = normalize(doc.remote_progress.as_ref());
        let remote_elapsed = match (remote, duration) {
            (Some(fraction), Some(duration)) => Some(fraction * duration),
            _ => doc
                .remote_progress
                .as_ref()
                .and_then(|progress| progress.elapsed_seconds),
        };
        Self {
            local: normalize(doc.local_progress.as_ref()),
            remote,
            remote_elapsed,
            duration,
        }
    }

    fn apply(&self, direction: SyncDirection, source: f64) -> SyncDecision {
        let target_elapsed_seconds = match direction {
            SyncDirection::ToRemote => self.duration.map(|duration| source * duration),
            SyncDirection::FromRemote => self.remote_elapsed,
        };
        SyncDecision {
            direction,
            source_fraction: source,
            target_fraction: source,
            target_elapsed_seconds,
            target_duration_seconds: self.duration,
            error: None,
            suggested_direction: None,
            requires_action: true,
        }
    }

    /// A decision that leaves both sides as they are.
    fn hold(&self, direction: SyncDirection, error: Option<SyncError>) -> SyncDecision {
        let (source, target) = match direction {
            SyncDirection::ToRemote => (self.local, self.remote),
            SyncDirection::FromRemote => (self.remote, self.local),
        };
        let suggested_direction = error.as_ref().map(|_| direction);
        SyncDecision {
            direction,
            source_fraction: source.unwrap_or_default(),
            target_fraction: target.unwrap_or_default(),
            target_elapsed_seconds: self.remote_elapsed,
            target_duration_seconds: self.duration,
            error,
            suggested_direction,
            requires_action: false,
        }
    }
}

/// Sync request as posted by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncRequest {
    pub document: String,
    pub direction: RequestedDirection,
}

/// Sync result as returned to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncResponse {
    pub direction: SyncDirection,
    pub ebook_percentage: f64,
    pub audio_current_time: f64,
    pub audio_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
    /// Usually `to_audiobook` or `from_audiobook`; other values from a server
    /// are kept as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub suggested_direction: Option<String>,
}

impl From<&SyncDecision> for SyncResponse {
    fn from(decision: &SyncDecision) -> Self {
        let ebook_percentage = match decision.direction {
            SyncDirection::ToRemote => decision.source_fraction,
            SyncDirection::FromRemote => decision.target_fraction,
        };
        Self {
            direction: decision.direction,
            ebook_percentage,
            audio_current_time: decision.target_elapsed_seconds.unwrap_or_default(),
            audio_duration: decision.target_duration_seconds.unwrap_or_default(),
            error: decision.error.as_ref().map(|err| err.kind().to_string()),
            suggested_direction: decision
                .suggested_direction
                .map(|direction| direction.as_wire_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ItemMetadata;
    use crate::progress::Progress;

    fn linked(local: Option<Progress>, remote: Option<Progress>) -> Document {
        Document {
            linked_item_id: Some("itm1".to_string()),
            local_progress: local,
            remote_progress: remote,
            metadata: Some(ItemMetadata {
                duration: Some(1000.0),
                ..ItemMetadata::default()
            }),
            ..Document::new("reader", "doc-1")
        }
    }

    fn auto(doc: &Document) -> Result<SyncDecision, SyncError> {
        decide(doc, RequestedDirection::Auto, &SyncPolicy::default())
    }

    #[test]
    fn unlinked_document_is_rejected() {
        let doc = Document {
            local_progress: Some(Progress::from_fraction(0.5)),
            ..Document::new("reader", "doc-1")
        };
        let err = decide(&doc, RequestedDirection::ToAudio, &SyncPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), "NotLinked");
    }

    #[test]
    fn auto_with_only_local_pushes_to_remote() {
        let doc = linked(Some(Progress::from_fraction(0.6)), None);
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.direction, SyncDirection::ToRemote);
        assert_eq!(decision.target_fraction, 0.6);
        assert_eq!(decision.target_elapsed_seconds, Some(600.0));
        assert!(decision.error.is_none());
        assert!(decision.requires_action);
    }

    #[test]
    fn auto_with_only_remote_pulls_from_remote() {
        let doc = linked(None, Some(Progress::from_elapsed(250.0, 1000.0)));
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.direction, SyncDirection::FromRemote);
        assert_eq!(decision.target_fraction, 0.25);
        assert_eq!(decision.target_elapsed_seconds, Some(250.0));
    }

    #[test]
    fn more_recent_source_wins() {
        let doc = linked(
            Some(Progress::from_fraction(0.3).observed_at(100.0)),
            Some(Progress::from_fraction(0.8).observed_at(200.0)),
        );
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.direction, SyncDirection::FromRemote);
        assert_eq!(decision.target_fraction, 0.8);
        assert!(decision.error.is_none());

        let doc = linked(
            Some(Progress::from_fraction(0.3).observed_at(300.0)),
            Some(Progress::from_fraction(0.8).observed_at(200.0)),
        );
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.direction, SyncDirection::ToRemote);
        assert_eq!(decision.target_fraction, 0.3);
    }

    #[test]
    fn missing_recency_is_ambiguous() {
        let doc = linked(
            Some(Progress::from_fraction(0.3)),
            Some(Progress::from_fraction(0.8)),
        );
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.error.as_ref().map(SyncError::kind), Some("AmbiguousDirection"));
        assert_eq!(decision.suggested_direction, Some(SyncDirection::FromRemote));
        assert!(!decision.requires_action);
        assert_eq!(decision.target_fraction, 0.3);
    }

    #[test]
    fn equal_recency_is_ambiguous() {
        let doc = linked(
            Some(Progress::from_fraction(0.9).observed_at(100.0)),
            Some(Progress::from_fraction(0.2).observed_at(100.0)),
        );
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.suggested_direction, Some(SyncDirection::ToRemote));
        assert!(matches!(
            decision.error,
            Some(SyncError::AmbiguousDirection { .. })
        ));
    }

    #[test]
    fn close_fractions_are_already_in_sync() {
        let doc = linked(
            Some(Progress::from_fraction(0.500).observed_at(100.0)),
            Some(Progress::from_fraction(0.505).observed_at(200.0)),
        );
        let decision = auto(&doc).unwrap();
        assert_eq!(decision.direction, SyncDirection::FromRemote);
        assert!(decision.error.is_none());
        assert!(decision.suggested_direction.is_none());
        assert!(!decision.requires_action);
        assert!((decision.source_fraction - decision.target_fraction).abs() <= 0.01);
    }

    #[test]
    fn gap_equal_to_threshold_is_in_sync() {
        let doc = linked(
            Some(Progress::from_fraction(0.30)),
            Some(Progress::from_fraction(0.31)),
        );
        let decision = auto(&doc).unwrap();
        assert!(decision.error.is_none());
        assert!(!decision.requires_action);
        assert_eq!(decision.direction, SyncDirection::FromRemote);

        let doc = linked(
            Some(Progress::from_fraction(0.30)),
            Some(Progress::from_fraction(0.32)),
        );
        assert!(auto(&doc).unwrap().error.is_some());
    }

    #[test]
    fn threshold_comes_from_policy() {
        let doc = linked(
            Some(Progress::from_fraction(0.50).observed_at(100.0)),
            Some(Progress::from_fraction(0.55).observed_at(200.0)),
        );
        let loose = SyncPolicy {
            tie_break_threshold: 0.1,
        };
        let decision = decide(&doc, RequestedDirection::Auto, &loose).unwrap();
        assert!(!decision.requires_action);
        assert!(auto(&doc).unwrap().requires_action);
    }

    #[test]
    fn auto_without_any_progress_fails() {
        let doc = linked(None, Some(Progress::from_elapsed(10.0, 0.0)));
        let err = auto(&doc).unwrap_err();
        assert_eq!(err.kind(), "MissingSource");
    }

    #[test]
    fn explicit_directions_require_their_source() {
        let doc = linked(None, Some(Progress::from_fraction(0.4)));
        let err = decide(&doc, RequestedDirection::ToAudio, &SyncPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingSource {
                side: Side::Local,
                ..
            }
        ));

        let doc = linked(Some(Progress::from_fraction(0.4)), None);
        let err = decide(&doc, RequestedDirection::FromAudio, &SyncPolicy::default()).unwrap_err();
        assert_eq!(err.code(), "missing_source");
    }

    #[test]
    fn explicit_direction_overrides_recency() {
        let doc = linked(
            Some(Progress::from_fraction(0.3).observed_at(100.0)),
            Some(Progress::from_fraction(0.8).observed_at(200.0)),
        );
        let decision =
            decide(&doc, RequestedDirection::ToAudio, &SyncPolicy::default()).unwrap();
        assert_eq!(decision.direction, SyncDirection::ToRemote);
        assert_eq!(decision.target_fraction, 0.3);
        assert_eq!(decision.target_elapsed_seconds, Some(300.0));
        assert!(decision.suggested_direction.is_none());
    }

    #[test]
    fn response_uses_wire_vocabulary() {
        let doc = linked(
            Some(Progress::from_fraction(0.3)),
            Some(Progress::from_fraction(0.8)),
        );
        let response = SyncResponse::from(&auto(&doc).unwrap());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["direction"], "from_audiobook");
        assert_eq!(json["error"], "AmbiguousDirection");
        assert_eq!(json["suggested_direction"], "from_audiobook");
        assert_eq!(json["ebook_percentage"], 0.3);
        assert_eq!(json["audio_current_time"], 800.0);
        assert_eq!(json["audio_duration"], 1000.0);
    }

    #[test]
    fn response_keeps_unfamiliar_suggestions() {
        let body = r#"{
            "direction": "to_audiobook",
            "ebook_percentage": 0.4,
            "audio_current_time": 400,
            "audio_duration": 1000,
            "error": "AmbiguousDirection",
            "suggested_direction": "to_audio"
        }"#;
        let response: SyncResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.direction, SyncDirection::ToRemote);
        assert_eq!(response.suggested_direction.as_deref(), Some("to_audio"));
    }

    #[test]
    fn request_parses_wire_directions() {
        let request: SyncRequest =
            serde_json::from_str(r#"{"document":"doc-1","direction":"from_audio"}"#).unwrap();
        assert_eq!(request.direction, RequestedDirection::FromAudio);
        assert_eq!(RequestedDirection::parse("to-audio"), Some(RequestedDirection::ToAudio));
        assert_eq!(RequestedDirection::parse("AUTO"), Some(RequestedDirection::Auto));
        assert_eq!(RequestedDirection::parse("sideways"), None);
    }
}
