use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// Share of analyzed videos treated as the top cohort.
pub const DEFAULT_TOP_COHORT_FRACTION: f64 = 0.3;

/// Feature-values backed by fewer videos than this are never reported.
pub const MIN_SAMPLE_SIZE: usize = 2;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Parallel workers for batch shock scoring. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Cohort and sample-size settings for the lift/rank report.
    pub analysis: AnalysisSettings,
    /// Deployment-specific numeric bucket boundaries.
    pub buckets: BucketConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub top_cohort_fraction: f64,
    pub min_sample_size: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            top_cohort_fraction: DEFAULT_TOP_COHORT_FRACTION,
            min_sample_size: MIN_SAMPLE_SIZE,
        }
    }
}

impl AnalysisSettings {
    /// Effective minimum group size; configuration can raise it but never below 2.
    pub fn min_sample_size(&self) -> usize {
        self.min_sample_size.max(MIN_SAMPLE_SIZE)
    }

    /// `ceil(fraction × n)`, always at least 1 and at most n.
    pub fn top_cohort_size(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let size = (self.top_cohort_fraction * n as f64).ceil() as usize;
        size.clamp(1, n)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum BucketError {
    #[error("expected {expected} labels for {bounds} bounds, got {labels}")]
    LabelCount {
        bounds: usize,
        labels: usize,
        expected: usize,
    },
    #[error("bound #{index} is not a finite number")]
    NonFinite { index: usize },
    #[error("bound #{index} is not greater than the previous bound")]
    NotIncreasing { index: usize },
}

/// Ordered numeric buckets: `v < bounds[0]` → `labels[0]`,
/// `v <= bounds[i]` → `labels[i]`, anything larger → the last label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumericBuckets {
    pub bounds: Vec<f64>,
    pub labels: Vec<String>,
}

impl NumericBuckets {
    pub fn new(bounds: &[f64], labels: &[&str]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Boundaries must be finite and strictly increasing, with one more label
    /// than there are boundaries, so every value lands in exactly one bucket.
    pub fn validate(&self) -> Result<(), BucketError> {
        let expected = self.bounds.len() + 1;
        if self.labels.len() != expected {
            return Err(BucketError::LabelCount {
                bounds: self.bounds.len(),
                labels: self.labels.len(),
                expected,
            });
        }
        for (index, b) in self.bounds.iter().enumerate() {
            if !b.is_finite() {
                return Err(BucketError::NonFinite { index });
            }
            if index > 0 && *b <= self.bounds[index - 1] {
                return Err(BucketError::NotIncreasing { index });
            }
        }
        Ok(())
    }

    pub fn label_for(&self, value: f64) -> &str {
        let idx = match self.bounds.first() {
            Some(&first) if value < first => 0,
            _ => self
                .bounds
                .iter()
                .skip(1)
                .position(|&b| value <= b)
                .map(|p| p + 1)
                .unwrap_or(self.bounds.len()),
        };
        self.labels
            .get(idx)
            .or(self.labels.last())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Artist follower count
    pub artist_size: NumericBuckets,
    /// Catalog popularity score (0-100)
    pub track_popularity: NumericBuckets,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            artist_size: default_artist_size(),
            track_popularity: default_track_popularity(),
        }
    }
}

fn default_artist_size() -> NumericBuckets {
    NumericBuckets::new(
        &[10_000.0, 100_000.0, 1_000_000.0],
        &["<10K", "10K–100K", "100K–1M", ">1M"],
    )
}

fn default_track_popularity() -> NumericBuckets {
    NumericBuckets::new(&[30.0, 60.0, 80.0], &["low", "medium", "high", "very_high"])
}

impl AppConfig {
    /// Load config from `path`, or `~/.config/drumstats/config.toml` when None.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::from_toml_str(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Parse and sanitize a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    /// Replace invalid settings with defaults, warning about each.
    fn sanitize(&mut self) {
        let fraction = self.analysis.top_cohort_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            log::warn!(
                "top_cohort_fraction {} outside (0, 1], using {}",
                fraction,
                DEFAULT_TOP_COHORT_FRACTION
            );
            self.analysis.top_cohort_fraction = DEFAULT_TOP_COHORT_FRACTION;
        }
        if let Err(e) = self.buckets.artist_size.validate() {
            log::warn!("Invalid artist_size buckets: {}. Using defaults.", e);
            self.buckets.artist_size = default_artist_size();
        }
        if let Err(e) = self.buckets.track_popularity.validate() {
            log::warn!("Invalid track_popularity buckets: {}. Using defaults.", e);
            self.buckets.track_popularity = default_track_popularity();
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buckets_are_valid() {
        let b = BucketConfig::default();
        assert_eq!(b.artist_size.validate(), Ok(()));
        assert_eq!(b.track_popularity.validate(), Ok(()));
    }

    #[test]
    fn test_label_for_boundaries() {
        let b = NumericBuckets::new(&[15.0, 30.0, 60.0], &["a", "b", "c", "d"]);
        assert_eq!(b.label_for(14.99), "a");
        assert_eq!(b.label_for(15.0), "b");
        assert_eq!(b.label_for(30.0), "b");
        assert_eq!(b.label_for(30.5), "c");
        assert_eq!(b.label_for(60.0), "c");
        assert_eq!(b.label_for(60.01), "d");
        assert_eq!(b.label_for(-1e9), "a");
        assert_eq!(b.label_for(1e12), "d");
    }

    #[test]
    fn test_single_bucket_covers_everything() {
        let b = NumericBuckets::new(&[], &["all"]);
        assert_eq!(b.validate(), Ok(()));
        assert_eq!(b.label_for(-5.0), "all");
        assert_eq!(b.label_for(5.0), "all");
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        let wrong_labels = NumericBuckets::new(&[1.0, 2.0], &["a", "b"]);
        assert!(matches!(
            wrong_labels.validate(),
            Err(BucketError::LabelCount { expected: 3, .. })
        ));

        let unsorted = NumericBuckets::new(&[5.0, 2.0], &["a", "b", "c"]);
        assert_eq!(unsorted.validate(), Err(BucketError::NotIncreasing { index: 1 }));

        let duplicate = NumericBuckets::new(&[2.0, 2.0], &["a", "b", "c"]);
        assert_eq!(duplicate.validate(), Err(BucketError::NotIncreasing { index: 1 }));

        let nan = NumericBuckets::new(&[f64::NAN], &["a", "b"]);
        assert_eq!(nan.validate(), Err(BucketError::NonFinite { index: 0 }));
    }

    #[test]
    fn test_top_cohort_size() {
        let s = AnalysisSettings::default();
        assert_eq!(s.top_cohort_size(0), 0);
        assert_eq!(s.top_cohort_size(1), 1);
        assert_eq!(s.top_cohort_size(3), 1);
        assert_eq!(s.top_cohort_size(4), 2);
        assert_eq!(s.top_cohort_size(10), 3);
        assert_eq!(s.top_cohort_size(15), 5);
    }

    #[test]
    fn test_min_sample_size_never_below_two() {
        let s = AnalysisSettings {
            min_sample_size: 0,
            ..AnalysisSettings::default()
        };
        assert_eq!(s.min_sample_size(), 2);
        let s = AnalysisSettings {
            min_sample_size: 4,
            ..AnalysisSettings::default()
        };
        assert_eq!(s.min_sample_size(), 4);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            workers = 4

            [analysis]
            top_cohort_fraction = 0.25
            min_sample_size = 3

            [buckets.artist_size]
            bounds = [1000, 50000]
            labels = ["tiny", "mid", "big"]
        "#;
        let c = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(c.workers, 4);
        assert_eq!(c.resolve_workers(), 4);
        assert!((c.analysis.top_cohort_fraction - 0.25).abs() < 1e-12);
        assert_eq!(c.analysis.min_sample_size(), 3);
        assert_eq!(c.buckets.artist_size.label_for(60_000.0), "big");
        // Untouched section keeps its default
        assert_eq!(c.buckets.track_popularity, default_track_popularity());
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let toml = r#"
            [analysis]
            top_cohort_fraction = 1.5

            [buckets.track_popularity]
            bounds = [80, 20]
            labels = ["a", "b", "c"]
        "#;
        let c = AppConfig::from_toml_str(toml).unwrap();
        assert!((c.analysis.top_cohort_fraction - DEFAULT_TOP_COHORT_FRACTION).abs() < 1e-12);
        assert_eq!(c.buckets.track_popularity, default_track_popularity());
    }

    #[test]
    fn test_empty_config_is_default() {
        let c = AppConfig::from_toml_str("").unwrap();
        assert_eq!(c.workers, 0);
        assert!(c.resolve_workers() >= 1);
        assert_eq!(c.analysis.min_sample_size(), 2);
    }
}
