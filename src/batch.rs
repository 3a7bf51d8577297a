//! Parallel shock scoring over a set of signal files.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;

use crate::input::{self, InputError};
use crate::shock::{self, ShockScore};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Shock score for one signal file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSignal {
    pub video_id: String,
    pub path: PathBuf,
    pub onsets: usize,
    #[serde(flatten)]
    pub score: ShockScore,
}

pub struct BatchResult {
    /// In the same order as the input paths
    pub scored: Vec<ScoredSignal>,
    pub failed: u64,
}

fn score_file(path: &Path) -> Result<ScoredSignal, InputError> {
    let signal = input::load_signal(path)?;
    let score = shock::score(&signal.onsets, signal.energy.as_deref());
    Ok(ScoredSignal {
        video_id: signal.id_or_stem(path),
        path: path.to_path_buf(),
        onsets: signal.onsets.len(),
        score,
    })
}

/// Score every file on a pool of `jobs` workers. Files that can't be read
/// or parsed are logged and counted, never fatal.
pub fn score_signal_files(files: &[PathBuf], jobs: usize, show_progress: bool) -> Result<BatchResult, BatchError> {
    if files.is_empty() {
        log::info!("No signal files to score");
        return Ok(BatchResult {
            scored: Vec::new(),
            failed: 0,
        });
    }

    log::info!("Scoring {} signal files with {} workers", files.len(), jobs);

    let pb = if show_progress {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build()?;

    let results: Vec<Result<ScoredSignal, InputError>> = pool.install(|| {
        use rayon::prelude::*;
        files
            .par_iter()
            .map(|path| {
                let result = score_file(path);
                pb.inc(1);
                result
            })
            .collect()
    });

    let mut scored = Vec::with_capacity(results.len());
    let mut failed: u64 = 0;
    for result in results {
        match result {
            Ok(s) => scored.push(s),
            Err(e) => {
                log::warn!("Skipping signal file: {}", e);
                failed += 1;
            }
        }
    }

    pb.finish_with_message(format!("Done: {} scored, {} failed", scored.len(), failed));

    Ok(BatchResult { scored, failed })
}
