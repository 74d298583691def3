//! Organizer/rollback data model: `spec.md` §3 `Plan`, `PlanItem`,
//! `JournalEntry`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PlanId;

/// Filesystem operation a [`PlanItem`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Move,
    Copy,
    Link,
}

/// What to do when a plan item's destination already exists (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    Skip,
    Overwrite,
    Suffix,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Skip
    }
}

/// One reorganization job (`spec.md` §3 `PlanItem`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub operation: Operation,
    pub conflict_policy: ConflictPolicy,
    /// Reference to the `EnrichedMetadata`/`Group` this item was produced
    /// from, opaque to the organizer (`spec.md` plan file format `metadata_ref`).
    pub metadata_ref: Option<String>,
}

/// An ordered reorganization plan (`spec.md` §3 `Plan`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn new(items: Vec<PlanItem>, created_at: DateTime<Utc>) -> Self {
        Self {
            plan_id: PlanId::new_v4(),
            created_at,
            items,
        }
    }
}

/// Which half of a plan item's execution a [`JournalEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalPhase {
    /// Recorded before the filesystem operation runs.
    Intent,
    /// Recorded after the filesystem operation completes (success or failure).
    Outcome,
}

/// One executed plan item, recorded before (intent) and after (outcome)
/// execution (`spec.md` §3 `JournalEntry`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub plan_id: PlanId,
    pub item_index: usize,
    pub phase: JournalPhase,
    pub recorded_at: DateTime<Utc>,
    pub item: PlanItem,
    /// Populated on `Outcome` entries: `Ok(())` or an error message.
    pub result: Option<Result<(), String>>,
}
