use std::path::PathBuf;
use std::sync::Arc;

use anivault_core::prelude::{
    default_matchers, group_files, organize, scan as run_scan, EngineConfig, Enricher,
    EnricherConfig, FileSystem, GroupingConfig, Journal, OrganizeOptions, RealFs, ScanConfig,
};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::group::Group;
use anivault_model::metadata::EnrichedMetadata;
use anivault_model::plan::ConflictPolicy;
use tokio_util::sync::CancellationToken;

use super::build_tmdb_client;

pub async fn run(
    config: &EngineConfig,
    path: PathBuf,
    target: PathBuf,
    dry_run: bool,
    by_resolution: bool,
    conflict_policy: ConflictPolicy,
) -> EngineResult<i32> {
    if !path.exists() {
        return Err(EngineError::validation(
            ErrorContext::new("cli.organize").with_subject(path.display().to_string()),
            "path does not exist",
        ));
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFs::new());
    let scan_outcome = run_scan(
        Arc::clone(&fs),
        ScanConfig::new(vec![path]),
        CancellationToken::new(),
    )
    .await?;

    let matchers = default_matchers();
    let grouping_config = GroupingConfig::default();
    let groups = group_files(scan_outcome.files, &matchers, &grouping_config);

    let enriched: Vec<(Group, EnrichedMetadata)> = match config.tmdb_api_key.clone() {
        Some(api_key) => {
            let client = build_tmdb_client(config, api_key).await?;
            let enricher = Enricher::new(client, EnricherConfig::default());
            let metadatas = enricher.enrich_all(&groups).await;
            groups.into_iter().zip(metadatas).collect()
        }
        None => groups
            .into_iter()
            .map(|group| {
                let metadata = EnrichedMetadata::not_found(group.canonical_title.clone());
                (group, metadata)
            })
            .collect(),
    };

    let mut options = OrganizeOptions::new(target);
    options.conflict_policy = conflict_policy;
    options.organize_by_resolution = by_resolution;

    let plan = organize::plan(&enriched, &options);

    if dry_run {
        let rendered = serde_json::to_string_pretty(&plan).map_err(|e| {
            EngineError::validation(ErrorContext::new("cli.organize"), format!("serialize plan: {e}"))
        })?;
        println!("{rendered}");
        return Ok(0);
    }

    let mut conflicts = 0usize;
    if conflict_policy == ConflictPolicy::Skip {
        for item in &plan.items {
            if fs.path_exists(&item.destination).await {
                conflicts += 1;
            }
        }
    }

    tokio::fs::create_dir_all(config.plans_dir())
        .await
        .map_err(|e| {
            EngineError::storage_failure(
                ErrorContext::new("cli.organize").with_subject(config.plans_dir().display().to_string()),
                e.to_string(),
                Some(Box::new(e)),
            )
        })?;
    let plan_path = config.plans_dir().join(format!("{}.json", plan.plan_id));
    let serialized = serde_json::to_vec_pretty(&plan).map_err(|e| {
        EngineError::validation(ErrorContext::new("cli.organize"), format!("serialize plan: {e}"))
    })?;
    tokio::fs::write(&plan_path, serialized).await.map_err(|e| {
        EngineError::storage_failure(
            ErrorContext::new("cli.organize").with_subject(plan_path.display().to_string()),
            e.to_string(),
            Some(Box::new(e)),
        )
    })?;

    let journal = Journal::new(config.journal_dir());
    let applied = journal.apply(fs.as_ref(), &plan).await?;
    println!(
        "plan {} written to {}; {applied}/{} item(s) processed",
        plan.plan_id,
        plan_path.display(),
        plan.items.len()
    );

    if conflicts > 0 {
        Ok(65)
    } else {
        Ok(0)
    }
}
