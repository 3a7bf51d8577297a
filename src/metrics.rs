//! Engagement normalization and ranking.
//!
//! Each video contributes the numbers of exactly one platform (Instagram
//! first, then TikTok). Views and likes are expressed relative to that
//! platform's median across the collection, then every analyzed video is
//! ranked on views, likes and likes/views.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Platform, PlatformStats, VideoRecord};

/// The platform numbers chosen for one video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementSelection {
    pub platform: Platform,
    pub views: f64,
    pub likes: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlatformMedians {
    pub views_median: f64,
    pub likes_median: f64,
}

/// Medians for every platform, recomputed on each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MedianTable {
    pub instagram: PlatformMedians,
    pub tiktok: PlatformMedians,
}

impl MedianTable {
    pub fn get(&self, platform: Platform) -> PlatformMedians {
        match platform {
            Platform::Instagram => self.instagram,
            Platform::Tiktok => self.tiktok,
        }
    }
}

/// Derived numbers for one analyzed video.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    /// Position of the video in the input collection
    pub index: usize,
    pub selection: EngagementSelection,
    pub engagement_proxy: f64,
    pub views_relative: f64,
    pub likes_relative: f64,
    pub high_view: bool,
    pub high_like: bool,
    pub views_rank: usize,
    pub likes_rank: usize,
    pub engagement_rank: usize,
    /// Mean of the three ranks; lower is better
    pub performance_rank: f64,
}

/// Output of one normalization pass.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMetrics {
    /// Analyzed videos only, in input order
    pub rows: Vec<DerivedMetrics>,
    pub medians: MedianTable,
}

/// A usable count: finite, clamped at zero.
fn count(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite()).map(|x| x.max(0.0))
}

fn select_from(stats: Option<&PlatformStats>, platform: Platform) -> Option<EngagementSelection> {
    let stats = stats?;
    let views = count(stats.views)?;
    Some(EngagementSelection {
        platform,
        views,
        // Views without likes still count; likes read as 0
        likes: count(stats.likes).unwrap_or(0.0),
    })
}

/// Pick the platform numbers for a video: Instagram when it has views,
/// otherwise TikTok when it has views, otherwise nothing.
pub fn select_engagement(video: &VideoRecord) -> Option<EngagementSelection> {
    select_from(video.instagram.as_ref(), Platform::Instagram)
        .or_else(|| select_from(video.tiktok.as_ref(), Platform::Tiktok))
}

/// Standard median; 0 for an empty list.
pub fn calculate_median(values: &[f64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let n = v.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

/// Median of the strictly positive values only.
fn positive_median(values: impl Iterator<Item = f64>) -> f64 {
    let positive: Vec<f64> = values.filter(|v| *v > 0.0).collect();
    calculate_median(&positive)
}

fn medians_for(selections: &[EngagementSelection], platform: Platform) -> PlatformMedians {
    let on_platform: Vec<&EngagementSelection> =
        selections.iter().filter(|s| s.platform == platform).collect();
    PlatformMedians {
        views_median: positive_median(on_platform.iter().map(|s| s.views)),
        likes_median: positive_median(on_platform.iter().map(|s| s.likes)),
    }
}

pub fn platform_medians(selections: &[EngagementSelection]) -> MedianTable {
    MedianTable {
        instagram: medians_for(selections, Platform::Instagram),
        tiktok: medians_for(selections, Platform::Tiktok),
    }
}

fn relative(value: f64, median: f64) -> f64 {
    if median > 0.0 { value / median } else { 0.0 }
}

/// Select, normalize and rank every video with engagement data.
pub fn normalize(videos: &[VideoRecord]) -> NormalizedMetrics {
    let selected: Vec<(usize, EngagementSelection)> = videos
        .iter()
        .enumerate()
        .filter_map(|(i, v)| select_engagement(v).map(|s| (i, s)))
        .collect();

    if selected.len() < videos.len() {
        log::debug!(
            "{} of {} videos have no engagement data and are excluded",
            videos.len() - selected.len(),
            videos.len()
        );
    }

    let selections: Vec<EngagementSelection> = selected.iter().map(|(_, s)| *s).collect();
    let medians = platform_medians(&selections);

    let mut rows: Vec<DerivedMetrics> = selected
        .into_iter()
        .map(|(index, selection)| {
            let m = medians.get(selection.platform);
            DerivedMetrics {
                index,
                selection,
                engagement_proxy: if selection.views > 0.0 {
                    selection.likes / selection.views
                } else {
                    0.0
                },
                views_relative: relative(selection.views, m.views_median),
                likes_relative: relative(selection.likes, m.likes_median),
                // Strict: a video exactly at the median is not "high"
                high_view: selection.views > m.views_median,
                high_like: selection.likes > m.likes_median,
                views_rank: 0,
                likes_rank: 0,
                engagement_rank: 0,
                performance_rank: 0.0,
            }
        })
        .collect();

    assign_ranks(&mut rows);

    NormalizedMetrics { rows, medians }
}

/// 1-based ranks by `key` descending. The sort is stable, so equal values
/// keep their input order instead of sharing a rank.
fn rank_by(rows: &[DerivedMetrics], key: fn(&DerivedMetrics) -> f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        key(&rows[b])
            .partial_cmp(&key(&rows[a]))
            .unwrap_or(Ordering::Equal)
    });
    let mut ranks = vec![0; rows.len()];
    for (pos, &i) in order.iter().enumerate() {
        ranks[i] = pos + 1;
    }
    ranks
}

/// Fill in per-metric ranks and the combined performance rank.
pub fn assign_ranks(rows: &mut [DerivedMetrics]) {
    let views = rank_by(rows, |r| r.selection.views);
    let likes = rank_by(rows, |r| r.selection.likes);
    let engagement = rank_by(rows, |r| r.engagement_proxy);

    for (i, row) in rows.iter_mut().enumerate() {
        row.views_rank = views[i];
        row.likes_rank = likes[i];
        row.engagement_rank = engagement[i];
        row.performance_rank = (views[i] + likes[i] + engagement[i]) as f64 / 3.0;
    }
}
