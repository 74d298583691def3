//! Shared data model and error taxonomy for the AniVault engine.
//!
//! This crate has no I/O and no async dependencies: it exists so
//! `anivault-core`'s components and `anivault-cli` can exchange values
//! without depending on each other's internals, the same role
//! `ferrex-model` plays for the teacher workspace.

pub mod cache;
pub mod error;
pub mod group;
pub mod ids;
pub mod metadata;
pub mod plan;
pub mod rate_limit;
pub mod scan;

pub mod prelude {
    pub use crate::cache::{CacheEntry, CacheStats};
    pub use crate::error::{BlockedState, EngineError, EngineResult, ErrorContext};
    pub use crate::group::{Group, GroupingEvidence, ScoreResult};
    pub use crate::ids::{GroupId, PlanId};
    pub use crate::metadata::{EnrichStatus, EnrichedMetadata, MediaKind};
    pub use crate::plan::{ConflictPolicy, JournalEntry, JournalPhase, Operation, Plan, PlanItem};
    pub use crate::rate_limit::RateLimitState;
    pub use crate::scan::{ParseResult, ParserProvenance, ScannedFile};
}
