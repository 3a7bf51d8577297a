//! Reading video collections and per-video signal files from disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::models::VideoRecord;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Duplicate video id {0:?}")]
    DuplicateId(String),
}

pub type Result<T> = std::result::Result<T, InputError>;

/// A collection is either a bare array or wrapped as `{"videos": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Collection {
    Bare(Vec<VideoRecord>),
    Wrapped { videos: Vec<VideoRecord> },
}

/// Parse a video collection, rejecting duplicate ids.
pub fn parse_videos(contents: &str) -> std::result::Result<Vec<VideoRecord>, ParseError> {
    let videos = match serde_json::from_str::<Collection>(contents)? {
        Collection::Bare(v) | Collection::Wrapped { videos: v } => v,
    };
    let mut seen = HashSet::new();
    for v in &videos {
        if !seen.insert(v.id.as_str()) {
            return Err(ParseError::DuplicateId(v.id.clone()));
        }
    }
    Ok(videos)
}

/// Parse failure before a path is attached.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Duplicate video id {0:?}")]
    DuplicateId(String),
}

impl ParseError {
    fn at(self, path: &Path) -> InputError {
        match self {
            Self::Json(source) => InputError::Json {
                path: path.display().to_string(),
                source,
            },
            Self::DuplicateId(id) => InputError::DuplicateId(id),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load a video collection file.
pub fn load_videos(path: &Path) -> Result<Vec<VideoRecord>> {
    let videos = parse_videos(&read(path)?).map_err(|e| e.at(path))?;
    log::debug!("Loaded {} videos from {}", videos.len(), path.display());
    Ok(videos)
}

/// Sort by id so rank ties resolve the same way regardless of source order.
pub fn canonical_order(videos: &mut [VideoRecord]) {
    videos.sort_by(|a, b| a.id.cmp(&b.id));
}

/// Onset times and optional energy envelope extracted from one video's audio.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalFile {
    #[serde(default)]
    pub video_id: Option<String>,
    /// Seconds from the start of the clip
    pub onsets: Vec<f64>,
    /// Per-frame energy in dB, if the extractor produced one
    #[serde(default)]
    pub energy: Option<Vec<f64>>,
}

impl SignalFile {
    /// `video_id`, or the file stem when absent.
    pub fn id_or_stem(&self, path: &Path) -> String {
        self.video_id.clone().unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string()
        })
    }
}

pub fn load_signal(path: &Path) -> Result<SignalFile> {
    serde_json::from_str(&read(path)?).map_err(|source| InputError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Expand files and directories into a sorted list of `.json` signal files.
pub fn collect_signal_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_json = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            if is_json {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}
