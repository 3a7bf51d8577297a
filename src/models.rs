use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Engagement counters for one platform. Either count may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PlatformStats {
    pub views: Option<f64>,
    pub likes: Option<f64>,
}

/// Descriptive fields for a video, each independently optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoMetadata {
    /// Seconds
    pub duration: Option<f64>,
    pub bpm: Option<f64>,
    /// 0.0-1.0 track energy from the music catalog
    pub energy: Option<f64>,
    /// 0-100, produced by `shock::score`
    pub shock_value: Option<f64>,
    pub genres: Option<Vec<String>>,
    pub hashtags: Option<Vec<String>>,
    pub artist_followers: Option<f64>,
    /// 0-100 catalog popularity
    pub track_popularity: Option<f64>,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD`
    pub posted_date: Option<String>,
    pub video_type: Option<String>,
}

/// One performance video: the unit of analysis. Never mutated by the engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub instagram: Option<PlatformStats>,
    #[serde(default)]
    pub tiktok: Option<PlatformStats>,
    /// Missing and `null` both read as empty metadata
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: VideoMetadata,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Platform whose numbers were used for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorical `(feature, value)` pair, e.g. `(bpm_bucket, "100–120")`.
///
/// Ordered by feature then value so grouped output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FeatureValue {
    pub feature: String,
    pub value: String,
}

impl FeatureValue {
    pub fn new(feature: &str, value: impl Into<String>) -> Self {
        Self {
            feature: feature.to_string(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.feature, self.value)
    }
}
