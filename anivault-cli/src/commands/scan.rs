use std::path::PathBuf;
use std::sync::Arc;

use anivault_core::prelude::{scan as run_scan, FileSystem, RealFs, ScanConfig};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use tokio_util::sync::CancellationToken;

pub async fn run(path: PathBuf, ext: Option<Vec<String>>, workers: usize) -> EngineResult<i32> {
    if !path.exists() {
        return Err(EngineError::validation(
            ErrorContext::new("cli.scan").with_subject(path.display().to_string()),
            "path does not exist",
        ));
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFs::new());
    let mut config = ScanConfig::new(vec![path]);
    if let Some(ext) = ext {
        config.extensions = ext;
    }
    config.worker_count = workers.max(1);

    let outcome = run_scan(fs, config, CancellationToken::new()).await?;

    for file in &outcome.files {
        println!(
            "{}  title={:?} season={:?} episode={:?} confidence={:.2}",
            file.path.display(),
            file.parsed.title,
            file.parsed.season,
            file.parsed.episode,
            file.parsed.confidence,
        );
    }
    for (path, message) in &outcome.failures {
        eprintln!("failed: {} ({message})", path.display());
    }

    println!(
        "scanned {} file(s), {} failure(s)",
        outcome.files.len(),
        outcome.failures.len()
    );

    if outcome.failures.is_empty() {
        Ok(0)
    } else {
        Ok(2)
    }
}
