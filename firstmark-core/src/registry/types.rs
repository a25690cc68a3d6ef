use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FirstmarkError, Result};
use crate::fingerprint::{ExactHash, FingerprintTriple};

/// Opaque identity of an owner, accuser, or role holder.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Like [`new`](Self::new), but rejects the empty identity.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let principal = Self::new(id);
        if principal.is_empty() {
            return Err(FirstmarkError::InvalidIdentity(
                "identity must not be empty".into(),
            ));
        }
        Ok(principal)
    }

    /// Blank identities are the "zero" principal.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The durable registration entry binding an exact hash to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Registering party
    pub owner: Principal,
    /// Fingerprint at registration time
    pub fingerprint: FingerprintTriple,
    /// Opaque pointer to where the full object can be fetched; never
    /// interpreted by the registry
    pub locator: String,
    /// Registration time, non-decreasing across a registry
    pub created_at: DateTime<Utc>,
    /// Set while the record is under (or lost) a dispute
    pub disputed: bool,
    /// Number of recorded views
    pub view_count: u64,
}

impl Record {
    pub fn exact(&self) -> ExactHash {
        self.fingerprint.exact
    }
}

/// Which tier produced a detection hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    ExactDuplicate,
    VisualMatch,
    AudioMatch,
    Original,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExactDuplicate => "EXACT_DUPLICATE",
            Self::VisualMatch => "VISUAL_MATCH",
            Self::AudioMatch => "AUDIO_MATCH",
            Self::Original => "ORIGINAL",
        };
        f.write_str(name)
    }
}

/// The canonical (earliest) record a submission collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRecord {
    pub owner: Principal,
    pub locator: String,
    pub matched_hash: ExactHash,
}

/// Outcome of [`Registry::detect`](super::Registry::detect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResult {
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedRecord>,
}

impl DetectResult {
    pub fn original() -> Self {
        Self {
            kind: MatchKind::Original,
            matched: None,
        }
    }

    pub(crate) fn hit(kind: MatchKind, record: &Record) -> Self {
        Self {
            kind,
            matched: Some(MatchedRecord {
                owner: record.owner.clone(),
                locator: record.locator.clone(),
                matched_hash: record.exact(),
            }),
        }
    }

    pub fn is_match(&self) -> bool {
        self.kind != MatchKind::Original
    }

    pub fn owner(&self) -> Option<&Principal> {
        self.matched.as_ref().map(|m| &m.owner)
    }
}

/// Outcome of an atomic detect-then-register submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The content was already known; nothing was registered.
    Duplicate(DetectResult),
    /// The content was new and is now owned by the submitter.
    Registered(Record),
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_registered: u64,
    pub total_duplicates_detected: u64,
    pub total_disputes: u64,
}

/// A registered record close to a query hash.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarRecord {
    pub record: Record,
    /// Hamming distance from the query (0 = identical perceptual hash)
    pub hamming_distance: u32,
}
