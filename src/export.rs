//! Flat CSV of the per-video comparison, one row per analyzed video.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::models::FeatureValue;
use crate::report::VideoComparison;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Column order of `CsvRow`, written even when there are no rows.
const HEADER: [&str; 18] = [
    "video_id",
    "track_name",
    "artist_name",
    "platform",
    "views",
    "likes",
    "engagement_proxy",
    "views_relative",
    "likes_relative",
    "high_view",
    "high_like",
    "views_rank",
    "likes_rank",
    "engagement_rank",
    "performance_rank",
    "in_top_cohort",
    "overlapping_features",
    "unique_features",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    video_id: &'a str,
    track_name: &'a str,
    artist_name: &'a str,
    platform: &'static str,
    views: f64,
    likes: f64,
    engagement_proxy: f64,
    views_relative: f64,
    likes_relative: f64,
    high_view: bool,
    high_like: bool,
    views_rank: usize,
    likes_rank: usize,
    engagement_rank: usize,
    performance_rank: f64,
    in_top_cohort: bool,
    overlapping_features: String,
    unique_features: String,
}

fn join(features: &[FeatureValue]) -> String {
    features
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

impl<'a> From<&'a VideoComparison> for CsvRow<'a> {
    fn from(v: &'a VideoComparison) -> Self {
        Self {
            video_id: &v.video_id,
            track_name: v.track_name.as_deref().unwrap_or(""),
            artist_name: v.artist_name.as_deref().unwrap_or(""),
            platform: v.platform.as_str(),
            views: v.views,
            likes: v.likes,
            engagement_proxy: v.engagement_proxy,
            views_relative: v.views_relative,
            likes_relative: v.likes_relative,
            high_view: v.high_view,
            high_like: v.high_like,
            views_rank: v.ranks.views_rank,
            likes_rank: v.ranks.likes_rank,
            engagement_rank: v.ranks.engagement_rank,
            performance_rank: v.ranks.performance_rank,
            in_top_cohort: v.in_top_cohort,
            overlapping_features: join(&v.overlapping_features),
            unique_features: join(&v.unique_features),
        }
    }
}

/// Write the header plus one row per video. Returns the number of rows.
pub fn write_comparison_csv<W: Write>(out: W, videos: &[VideoComparison]) -> Result<usize, ExportError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(HEADER)?;
    for v in videos {
        writer.serialize(CsvRow::from(v))?;
    }
    writer.flush()?;
    Ok(videos.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use crate::report::RankBreakdown;

    fn comparison(id: &str, overlapping: Vec<FeatureValue>) -> VideoComparison {
        VideoComparison {
            video_id: id.to_string(),
            track_name: Some("Rosanna, live".to_string()),
            artist_name: None,
            platform: Platform::Tiktok,
            views: 1500.0,
            likes: 120.0,
            engagement_proxy: 0.08,
            views_relative: 1.5,
            likes_relative: 1.2,
            high_view: true,
            high_like: true,
            ranks: RankBreakdown {
                views_rank: 1,
                likes_rank: 2,
                engagement_rank: 1,
                performance_rank: 4.0 / 3.0,
            },
            in_top_cohort: true,
            overlapping_features: overlapping,
            unique_features: vec![],
        }
    }

    #[test]
    fn test_write_rows() {
        let rows = vec![
            comparison(
                "v1",
                vec![FeatureValue::new("genre", "funk"), FeatureValue::new("is_weekend", "true")],
            ),
            comparison("v2", vec![]),
        ];
        let mut buf = Vec::new();
        assert_eq!(write_comparison_csv(&mut buf, &rows).unwrap(), 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("video_id,track_name,artist_name,platform,views"));
        assert!(lines[0].ends_with("overlapping_features,unique_features"));
        // Embedded comma is quoted
        assert!(lines[1].starts_with("v1,\"Rosanna, live\",,tiktok,1500"));
        assert!(lines[1].contains("genre=funk;is_weekend=true"));
    }

    #[test]
    fn test_empty_still_writes_header() {
        let mut buf = Vec::new();
        assert_eq!(write_comparison_csv(&mut buf, &[]).unwrap(), 0);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, format!("{}\n", HEADER.join(",")));
    }

    #[test]
    fn test_header_matches_row_width() {
        let mut buf = Vec::new();
        write_comparison_csv(&mut buf, &[comparison("v1", vec![])]).unwrap();
        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(&row[0], "v1");
        assert_eq!(&row[15], "true");
    }
}
