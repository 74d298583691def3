//! End-to-end scenarios spanning scan, group, organize, and rollback
//! without touching the network (TMDB enrichment is exercised at the
//! unit level inside `enrich`/`tmdb`, since it needs live credentials).

use std::sync::Arc;

use anivault_core::fs::RealFs;
use anivault_core::grouping::{default_matchers, group_files, GroupingConfig};
use anivault_core::journal::Journal;
use anivault_core::organize::{self, OrganizeOptions};
use anivault_core::scan::{scan, ScanConfig};
use anivault_model::metadata::{EnrichStatus, EnrichedMetadata, MediaKind};
use anivault_model::plan::{ConflictPolicy, Operation};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn matched(canonical_title: &str) -> EnrichedMetadata {
    EnrichedMetadata {
        canonical_title: canonical_title.to_string(),
        remote_id: Some(95479),
        media_kind: Some(MediaKind::Tv),
        first_air_date: None,
        scores: Vec::new(),
        overall_score: 0.95,
        status: EnrichStatus::Matched,
    }
}

#[tokio::test]
async fn happy_path_scan_group_and_dry_run_organize() {
    let root = tempdir().unwrap();
    let filename = "[SubsPlease] Jujutsu Kaisen - 24 (1080p) [E82B1F6A].mkv";
    tokio::fs::write(root.path().join(filename), b"data")
        .await
        .unwrap();

    let fs: Arc<dyn anivault_core::fs::FileSystem> = Arc::new(RealFs::new());
    let config = ScanConfig::new(vec![root.path().to_path_buf()]);
    let outcome = scan(fs, config, CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.failures.is_empty());
    let scanned = &outcome.files[0];
    assert_eq!(scanned.path, root.path().join(filename));
    assert_eq!(scanned.parsed.title, "Jujutsu Kaisen");
    assert_eq!(scanned.parsed.episode, Some(24));
    assert_eq!(scanned.parsed.quality.as_deref(), Some("1080p"));

    let matchers = default_matchers();
    let groups = group_files(outcome.files, &matchers, &GroupingConfig::default());
    assert_eq!(groups.len(), 1);
    let evidence = groups[0].evidence.as_ref().unwrap();
    assert_eq!(evidence.selected_matcher, "title");

    let target = tempdir().unwrap();
    let options = OrganizeOptions::new(target.path().to_path_buf());
    let enriched = vec![(groups[0].clone(), matched("Jujutsu Kaisen"))];
    let plan = organize::plan(&enriched, &options);

    assert_eq!(plan.items.len(), 1);
    let item = &plan.items[0];
    assert_eq!(item.operation, Operation::Move);
    assert_eq!(
        item.destination,
        target
            .path()
            .join("series")
            .join("Jujutsu Kaisen")
            .join("Season 01")
            .join("Jujutsu Kaisen - S01E24 - 1080p.mkv")
    );

    // dry-run never touches the filesystem
    assert!(tokio::fs::try_exists(&item.source).await.unwrap());
    assert!(!tokio::fs::try_exists(&item.destination).await.unwrap());
}

#[tokio::test]
async fn duplicate_episode_resolution_survives_full_grouping() {
    let root = tempdir().unwrap();
    let loser = "[Group] Show - 01 (720p) v1.mkv";
    let winner = "[Group] Show - 01 (1080p) v2.mkv";
    tokio::fs::write(root.path().join(loser), vec![0u8; 600])
        .await
        .unwrap();
    tokio::fs::write(root.path().join(winner), vec![0u8; 1500])
        .await
        .unwrap();

    let fs: Arc<dyn anivault_core::fs::FileSystem> = Arc::new(RealFs::new());
    let config = ScanConfig::new(vec![root.path().to_path_buf()]);
    let outcome = scan(fs, config, CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.files.len(), 2);

    let matchers = default_matchers();
    let groups = group_files(outcome.files, &matchers, &GroupingConfig::default());
    assert_eq!(groups.len(), 1);

    let group = &groups[0];
    assert!(group.has_duplicates);
    assert_eq!(group.files.len(), 1);
    assert_eq!(group.duplicate_losers.len(), 1);
    assert_eq!(group.files[0].parsed.version, Some(2));
    assert_eq!(group.duplicate_losers[0].parsed.version, Some(1));
}

#[tokio::test]
async fn rollback_returns_every_moved_file_to_its_source() {
    let root = tempdir().unwrap();
    let target = tempdir().unwrap();
    let cache_root = tempdir().unwrap();

    let names = ["a.mkv", "b.mkv", "c.mkv"];
    for name in names {
        tokio::fs::write(root.path().join(name), b"payload")
            .await
            .unwrap();
    }

    let fs: Arc<dyn anivault_core::fs::FileSystem> = Arc::new(RealFs::new());
    let config = ScanConfig::new(vec![root.path().to_path_buf()]);
    let outcome = scan(Arc::clone(&fs), config, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.files.len(), 3);

    let mut options = OrganizeOptions::new(target.path().to_path_buf());
    options.conflict_policy = ConflictPolicy::Overwrite;
    let enriched = outcome
        .files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let mut file = file.clone();
            file.parsed.episode = Some(index as u32 + 1);
            let mut group = anivault_model::group::Group::new("Show");
            group.files.push(file);
            (group, matched("Show"))
        })
        .collect::<Vec<_>>();
    let plan = organize::plan(&enriched, &options);
    assert_eq!(plan.items.len(), 3);

    let journal = Journal::new(cache_root.path().join("journal"));
    let applied = journal.apply(fs.as_ref(), &plan).await.unwrap();
    assert_eq!(applied, 3);

    for item in &plan.items {
        assert!(tokio::fs::try_exists(&item.destination).await.unwrap());
        assert!(!tokio::fs::try_exists(&item.source).await.unwrap());
    }

    let reversed = journal.reverse(fs.as_ref(), plan.plan_id).await.unwrap();
    assert_eq!(reversed, 3);

    for item in &plan.items {
        assert!(tokio::fs::try_exists(&item.source).await.unwrap());
        assert!(!tokio::fs::try_exists(&item.destination).await.unwrap());
    }

    let journal_path = cache_root
        .path()
        .join("journal")
        .join(format!("{}.jsonl", plan.plan_id));
    let raw = tokio::fs::read_to_string(&journal_path).await.unwrap();
    let outcome_records = raw.lines().filter(|line| line.contains("\"outcome\"")).count();
    assert_eq!(outcome_records, 3);
}
