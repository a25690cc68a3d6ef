//! Firstmark Core - content fingerprinting and first-registrant ownership
//!
//! This crate fingerprints media objects and keeps a registry that binds
//! each fingerprint to the first party who registered it.
//!
//! # Features
//!
//! - Three-tier fingerprints: SHA3-256 exact hash, dHash perceptual hash,
//!   opaque audio token
//! - Tier-ordered duplicate detection (exact, then visual, then audio)
//! - Ownership disputes settled by arbitrators
//! - CBOR/JSON snapshots for persistence
//! - Bounded, cancellable decoding on the tokio blocking pool (`runtime`
//!   feature)
//!
//! # Example
//!
//! ```no_run
//! use firstmark_core::{FingerprintEngine, MatchKind, MediaKind, Principal, Registry};
//!
//! # fn example() -> firstmark_core::Result<()> {
//! let engine = FingerprintEngine::default();
//! let registry = Registry::new(Principal::new("root"))?;
//!
//! let photo = std::fs::read("photo.png").expect("read photo");
//! let fingerprint = engine.compute(&photo, MediaKind::Image)?;
//!
//! let result = registry.detect(&fingerprint);
//! if result.kind == MatchKind::Original {
//!     registry.register(&Principal::new("alice"), fingerprint, "ipfs://photo")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod registry;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use error::{FirstmarkError, Result, CURRENT_SNAPSHOT_VERSION, MAX_SNAPSHOT_SIZE};
pub use fingerprint::{
    compute_fingerprint, dhash, hamming_distance, similarity_percent, AudioFingerprinter,
    AudioToken, CancelToken, EmbeddedFrameExtractor, ExactHash, FingerprintEngine,
    FingerprintTriple, FrameExtractor, MediaKind, PcmAudioFingerprinter, PerceptualHash,
    DEFAULT_SIMILARITY_THRESHOLD, MAX_FRAME_CANDIDATES,
};
pub use registry::{
    DetectResult, Dispute, DisputeStatus, EventLog, MatchKind, MatchedRecord, Principal, Record,
    Registry, RegistryEvent, RegistryEventKind, RegistryObserver, RegistrySnapshot,
    SimilarRecord, Stats, SubmitOutcome, TracingObserver,
};
