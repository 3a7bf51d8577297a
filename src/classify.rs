//! Bucket raw video metadata into categorical feature-values.
//!
//! A missing field produces no feature at all (never an "unknown" bucket),
//! so absent data can't masquerade as a shared attribute.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;

use crate::config::BucketConfig;
use crate::models::{FeatureValue, VideoMetadata};

pub const VIDEO_LENGTH_BUCKET: &str = "video_length_bucket";
pub const BPM_BUCKET: &str = "bpm_bucket";
pub const ENERGY_LEVEL: &str = "energy_level";
pub const SHOCK_VALUE_BUCKET: &str = "shock_value_bucket";
pub const ARTIST_SIZE: &str = "artist_size";
pub const TRACK_POPULARITY: &str = "track_popularity";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const IS_WEEKEND: &str = "is_weekend";
pub const GENRE: &str = "genre";
pub const HASHTAG: &str = "hashtag";
pub const HAS_HASHTAGS: &str = "has_hashtags";
pub const VIDEO_TYPE: &str = "video_type";

// Tags in one field are separated by whitespace, commas or a fresh `#`
static HASHTAG_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,#]+").unwrap());

// Anything outside the token alphabet is dropped from inside a tag
static HASHTAG_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").unwrap());

/// Seconds → length bucket. 15 and 60 fall in the lower-inclusive bucket.
pub fn video_length_bucket(duration: f64) -> &'static str {
    if duration < 15.0 {
        "<15s"
    } else if duration <= 30.0 {
        "15–30s"
    } else if duration <= 60.0 {
        "30–60s"
    } else {
        ">60s"
    }
}

pub fn bpm_bucket(bpm: f64) -> &'static str {
    if bpm < 100.0 {
        "<100"
    } else if bpm <= 120.0 {
        "100–120"
    } else if bpm <= 140.0 {
        "120–140"
    } else {
        ">140"
    }
}

pub fn energy_level(energy: f64) -> &'static str {
    if energy < 0.3 {
        "low"
    } else if energy <= 0.6 {
        "medium"
    } else {
        "high"
    }
}

pub fn shock_value_bucket(shock: f64) -> &'static str {
    if shock <= 50.0 {
        "0-50"
    } else if shock <= 75.0 {
        "51-75"
    } else if shock <= 85.0 {
        "76-85"
    } else {
        "86-100"
    }
}

/// Parse a posting date: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// or a bare `YYYY-MM-DD`. Timestamps with an offset keep the poster's local date.
pub fn parse_posted_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Split a raw hashtag field into one lowercase `[a-z0-9_]` token per tag:
/// `"#Drum-Cover #fyp"` → `["drumcover", "fyp"]`.
pub fn hashtag_tokens(raw: &str) -> Vec<String> {
    HASHTAG_SEPARATOR_RE
        .split(raw)
        .map(|tag| HASHTAG_STRIP_RE.replace_all(&tag.to_lowercase(), "").into_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

fn normalize_label(raw: &str) -> Option<String> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() { None } else { Some(s) }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// All feature-values for one video. A set, so a video supports each
/// feature-value at most once however often it repeats a genre or tag.
pub fn classify_video(meta: &VideoMetadata, buckets: &BucketConfig) -> BTreeSet<FeatureValue> {
    let mut features = BTreeSet::new();

    if let Some(d) = finite(meta.duration) {
        features.insert(FeatureValue::new(VIDEO_LENGTH_BUCKET, video_length_bucket(d)));
    }
    if let Some(bpm) = finite(meta.bpm) {
        features.insert(FeatureValue::new(BPM_BUCKET, bpm_bucket(bpm)));
    }
    if let Some(e) = finite(meta.energy) {
        features.insert(FeatureValue::new(ENERGY_LEVEL, energy_level(e)));
    }
    if let Some(s) = finite(meta.shock_value) {
        features.insert(FeatureValue::new(SHOCK_VALUE_BUCKET, shock_value_bucket(s)));
    }
    if let Some(f) = finite(meta.artist_followers) {
        features.insert(FeatureValue::new(ARTIST_SIZE, buckets.artist_size.label_for(f)));
    }
    if let Some(p) = finite(meta.track_popularity) {
        features.insert(FeatureValue::new(
            TRACK_POPULARITY,
            buckets.track_popularity.label_for(p),
        ));
    }

    if let Some(raw) = meta.posted_date.as_deref() {
        match parse_posted_date(raw) {
            Some(date) => {
                let day = date.weekday();
                features.insert(FeatureValue::new(DAY_OF_WEEK, weekday_name(day)));
                let weekend = matches!(day, Weekday::Sat | Weekday::Sun);
                features.insert(FeatureValue::new(IS_WEEKEND, weekend.to_string()));
            }
            None => log::debug!("Unparseable postedDate {:?}, skipping day features", raw),
        }
    }

    if let Some(genres) = &meta.genres {
        for g in genres.iter().filter_map(|g| normalize_label(g)) {
            features.insert(FeatureValue::new(GENRE, g));
        }
    }

    if let Some(tags) = &meta.hashtags {
        let tokens: BTreeSet<String> = tags.iter().flat_map(|t| hashtag_tokens(t)).collect();
        features.insert(FeatureValue::new(HAS_HASHTAGS, (!tokens.is_empty()).to_string()));
        for token in tokens {
            features.insert(FeatureValue::new(HASHTAG, token));
        }
    }

    if let Some(t) = meta.video_type.as_deref().and_then(normalize_label) {
        features.insert(FeatureValue::new(VIDEO_TYPE, t));
    }

    features
}
