//! Append-only execution journal and rollback (`spec.md` §4.8).
//!
//! One journal file per plan, content-addressed by plan ID, written as
//! newline-delimited JSON and flushed after every record so a crash mid-run
//! leaves a readable prefix rather than a truncated record.

use std::path::{Path, PathBuf};

use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::ids::PlanId;
use anivault_model::plan::{JournalEntry, JournalPhase, Operation, Plan, PlanItem};
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::fs::FileSystem;
use crate::organize;

/// Handle to a plan's journal directory.
#[derive(Debug, Clone)]
pub struct Journal {
    root: PathBuf,
}

impl Journal {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, plan_id: PlanId) -> PathBuf {
        self.root.join(format!("{plan_id}.jsonl"))
    }

    /// Executes every item in `plan` against `fs`, writing an intent record
    /// before each item and an outcome record after it.
    pub async fn apply(&self, fs: &dyn FileSystem, plan: &Plan) -> EngineResult<usize> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| journal_err("journal.apply", self.root.display().to_string(), e))?;

        let path = self.path_for(plan.plan_id);
        let mut file = open_append(&path).await?;
        let mut applied = 0usize;

        for (index, item) in plan.items.iter().enumerate() {
            let intent = JournalEntry {
                plan_id: plan.plan_id,
                item_index: index,
                phase: JournalPhase::Intent,
                recorded_at: Utc::now(),
                item: item.clone(),
                result: None,
            };
            write_record(&mut file, &intent).await?;

            let result = organize::apply_item(fs, item).await;
            let (ok, message) = match &result {
                Ok(performed) => (true, if *performed { None } else { Some("skipped".to_string()) }),
                Err(err) => (false, Some(err.to_string())),
            };
            if ok {
                applied += 1;
            }

            let outcome = JournalEntry {
                plan_id: plan.plan_id,
                item_index: index,
                phase: JournalPhase::Outcome,
                recorded_at: Utc::now(),
                item: item.clone(),
                result: Some(if ok { Ok(()) } else { Err(message.unwrap_or_default()) }),
            };
            write_record(&mut file, &outcome).await?;

            result?;
        }

        Ok(applied)
    }

    /// Replays a plan's outcome records in reverse, moving each
    /// successfully-applied `Move` back to its original source
    /// (`spec.md` §4.8). Returns the count of items reversed.
    pub async fn reverse(&self, fs: &dyn FileSystem, plan_id: PlanId) -> EngineResult<usize> {
        let path = self.path_for(plan_id);
        if !fs.path_exists(&path).await && !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(EngineError::not_found(
                ErrorContext::new("journal.reverse").with_subject(plan_id.to_string()),
                "journal file missing",
            ));
        }

        let entries = read_entries(&path).await?;
        let mut reversed = 0usize;

        for entry in entries.into_iter().rev() {
            if entry.phase != JournalPhase::Outcome {
                continue;
            }
            let Some(Ok(())) = entry.result else {
                continue;
            };
            if entry.item.operation != Operation::Move {
                continue;
            }
            if reverse_move(fs, &entry.item).await.is_ok() {
                reversed += 1;
            }
        }

        Ok(reversed)
    }
}

async fn reverse_move(fs: &dyn FileSystem, item: &PlanItem) -> EngineResult<()> {
    if !fs.path_exists(&item.destination).await {
        return Err(EngineError::not_found(
            ErrorContext::new("journal.reverse.move"),
            "plan item destination no longer exists",
        ));
    }
    if let Some(parent) = item.source.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| journal_err("journal.reverse.move", parent.display().to_string(), e))?;
    }
    tokio::fs::rename(&item.destination, &item.source)
        .await
        .map_err(|e| journal_err("journal.reverse.move", item.source.display().to_string(), e))
}

async fn open_append(path: &Path) -> EngineResult<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| journal_err("journal.open", path.display().to_string(), e))
}

async fn write_record(file: &mut tokio::fs::File, entry: &JournalEntry) -> EngineResult<()> {
    let mut line = serde_json::to_string(entry)
        .map_err(|e| journal_err("journal.write", "serialize journal entry".to_string(), std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    line.push('\n');
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| journal_err("journal.write", "append journal record".to_string(), e))?;
    file.flush()
        .await
        .map_err(|e| journal_err("journal.write", "flush journal record".to_string(), e))
}

async fn read_entries(path: &Path) -> EngineResult<Vec<JournalEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| journal_err("journal.read", path.display().to_string(), e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                journal_err(
                    "journal.read",
                    "parse journal record".to_string(),
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })
        })
        .collect()
}

fn journal_err(operation: &'static str, subject: String, source: std::io::Error) -> EngineError {
    EngineError::storage_failure(
        ErrorContext::new(operation).with_subject(subject),
        source.to_string(),
        Some(Box::new(source)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;
    use anivault_model::plan::ConflictPolicy;
    use tempfile::tempdir;

    fn sample_item(source: &str, destination: &str) -> PlanItem {
        PlanItem {
            source: PathBuf::from(source),
            destination: PathBuf::from(destination),
            operation: Operation::Move,
            conflict_policy: ConflictPolicy::Skip,
            metadata_ref: None,
        }
    }

    #[tokio::test]
    async fn apply_then_reverse_round_trips_a_move() {
        let tmp = tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        let src_path = src_dir.join("a.mkv");
        tokio::fs::write(&src_path, b"data").await.unwrap();
        let dst_path = dst_dir.join("a.mkv");

        let fs = crate::fs::RealFs::new();
        let item = sample_item(src_path.to_str().unwrap(), dst_path.to_str().unwrap());
        let plan = Plan::new(vec![item], Utc::now());

        let journal = Journal::new(tmp.path().join("journal"));
        let applied = journal.apply(&fs, &plan).await.unwrap();
        assert_eq!(applied, 1);
        assert!(tokio::fs::try_exists(&dst_path).await.unwrap());

        let reversed = journal.reverse(&fs, plan.plan_id).await.unwrap();
        assert_eq!(reversed, 1);
        assert!(tokio::fs::try_exists(&src_path).await.unwrap());
        assert!(!tokio::fs::try_exists(&dst_path).await.unwrap());
    }

    #[tokio::test]
    async fn reverse_on_missing_journal_is_not_found() {
        let tmp = tempdir().unwrap();
        let journal = Journal::new(tmp.path().join("journal"));
        let fs = InMemoryFs::new();
        let result = journal.reverse(&fs, PlanId::new_v4()).await;
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
