//! Assemble the full lift/rank report for a video collection.
//!
//! Pure function of its input: the same videos in the same order always
//! produce the same report. Rank ties are broken by input position, so
//! callers wanting run-to-run stability across differently ordered sources
//! should sort the collection first (see `input::canonical_order`).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::classify::classify_video;
use crate::config::{AnalysisSettings, BucketConfig};
use crate::lift::{self, Baseline, DistributionRecord, FeatureGroups, LiftRecord, RankRecord};
use crate::metrics::{self, DerivedMetrics, MedianTable};
use crate::models::{FeatureValue, Platform, VideoRecord};

pub const NO_ENGAGEMENT_ERROR: &str = "No videos with usable engagement data to analyze";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlatformCounts {
    pub instagram: usize,
    pub tiktok: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub total_videos: usize,
    pub analyzed_videos: usize,
    pub excluded_videos: usize,
    pub platform_counts: PlatformCounts,
    pub platform_medians: MedianTable,
    pub baseline_high_view_rate: f64,
    pub baseline_high_like_rate: f64,
    pub global_median_performance_rank: f64,
    pub top_cohort_size: usize,
    pub min_sample_size: usize,
    pub distinct_feature_values: usize,
}

/// A lift row that beats the baseline on views or likes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkingSignal {
    #[serde(flatten)]
    pub lift: LiftRecord,
    /// Share of the top cohort carrying this feature-value
    pub consistency_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankBreakdown {
    pub views_rank: usize,
    pub likes_rank: usize,
    pub engagement_rank: usize,
    pub performance_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoComparison {
    pub video_id: String,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub platform: Platform,
    pub views: f64,
    pub likes: f64,
    pub engagement_proxy: f64,
    pub views_relative: f64,
    pub likes_relative: f64,
    pub high_view: bool,
    pub high_like: bool,
    pub ranks: RankBreakdown,
    pub in_top_cohort: bool,
    /// Feature-values shared with at least one other top-cohort video
    pub overlapping_features: Vec<FeatureValue>,
    pub unique_features: Vec<FeatureValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_metadata: AnalysisMetadata,
    pub early_signal_summary: Vec<LiftRecord>,
    pub what_seems_working: Vec<WorkingSignal>,
    pub per_video_comparison: Vec<VideoComparison>,
    pub rank_association: Vec<RankRecord>,
    pub distribution_summary: Vec<DistributionRecord>,
}

impl AnalysisReport {
    /// Typed empty result for a collection with nothing to analyze.
    fn empty(total_videos: usize, min_sample_size: usize) -> Self {
        Self {
            error: Some(NO_ENGAGEMENT_ERROR.to_string()),
            analysis_metadata: AnalysisMetadata {
                total_videos,
                excluded_videos: total_videos,
                min_sample_size,
                ..AnalysisMetadata::default()
            },
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_some()
    }
}

/// How many videos carry a feature-value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSupport {
    #[serde(flatten)]
    pub feature: FeatureValue,
    /// Videos in the collection with this feature-value
    pub videos: usize,
    /// Of those, videos with engagement data
    pub analyzed: usize,
    /// Below the minimum sample size, so absent from every report table
    pub suppressed: bool,
}

fn ascending(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Run the full analysis over a collection.
pub fn generate_structured_outputs(
    videos: &[VideoRecord],
    settings: &AnalysisSettings,
    buckets: &BucketConfig,
) -> AnalysisReport {
    let min_sample_size = settings.min_sample_size();

    let features: Vec<BTreeSet<FeatureValue>> = videos
        .iter()
        .map(|v| classify_video(&v.metadata, buckets))
        .collect();
    let normalized = metrics::normalize(videos);
    let rows = &normalized.rows;

    if rows.is_empty() {
        log::info!("{} videos, none with engagement data", videos.len());
        return AnalysisReport::empty(videos.len(), min_sample_size);
    }

    let row_features: Vec<&BTreeSet<FeatureValue>> = rows.iter().map(|r| &features[r.index]).collect();
    let groups = FeatureGroups::build(&row_features);

    let early_signal_summary = lift::analyze_lift(rows, &groups, min_sample_size);
    let rank_association = lift::associate_ranks(rows, &groups, min_sample_size);
    let distribution_summary = lift::summarize_distribution(rows, &groups, min_sample_size);

    let cohort = top_cohort(rows, settings.top_cohort_size(rows.len()));
    let what_seems_working = working_signals(&early_signal_summary, &cohort, &row_features);
    let per_video_comparison = compare_videos(videos, rows, &row_features, &cohort);

    let base: Baseline = lift::baseline(rows);
    let platform_counts = rows.iter().fold(PlatformCounts::default(), |mut c, r| {
        match r.selection.platform {
            Platform::Instagram => c.instagram += 1,
            Platform::Tiktok => c.tiktok += 1,
        }
        c
    });

    let analysis_metadata = AnalysisMetadata {
        total_videos: videos.len(),
        analyzed_videos: rows.len(),
        excluded_videos: videos.len() - rows.len(),
        platform_counts,
        platform_medians: normalized.medians,
        baseline_high_view_rate: base.high_view_rate,
        baseline_high_like_rate: base.high_like_rate,
        global_median_performance_rank: lift::global_median_rank(rows),
        top_cohort_size: cohort.len(),
        min_sample_size,
        distinct_feature_values: groups.len(),
    };

    log::info!(
        "Analyzed {}/{} videos: {} feature-values, {} reportable, {} above baseline",
        rows.len(),
        videos.len(),
        groups.len(),
        early_signal_summary.len(),
        what_seems_working.len()
    );

    AnalysisReport {
        error: None,
        analysis_metadata,
        early_signal_summary,
        what_seems_working,
        per_video_comparison,
        rank_association,
        distribution_summary,
    }
}

/// Row positions ordered best performance rank first (stable on ties).
fn by_performance(rows: &[DerivedMetrics]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| ascending(rows[a].performance_rank, rows[b].performance_rank));
    order
}

/// The best `size` rows by performance rank.
fn top_cohort(rows: &[DerivedMetrics], size: usize) -> Vec<usize> {
    let mut order = by_performance(rows);
    order.truncate(size);
    order
}

/// Lift rows above 1.0 on either metric, with their top-cohort consistency.
fn working_signals(
    lifts: &[LiftRecord],
    cohort: &[usize],
    row_features: &[&BTreeSet<FeatureValue>],
) -> Vec<WorkingSignal> {
    let mut cohort_counts: BTreeMap<&FeatureValue, usize> = BTreeMap::new();
    for &row in cohort {
        for fv in row_features[row].iter() {
            *cohort_counts.entry(fv).or_insert(0) += 1;
        }
    }
    let cohort_size = cohort.len().max(1) as f64;

    let mut signals: Vec<WorkingSignal> = lifts
        .iter()
        .filter(|l| l.lift_views > 1.0 || l.lift_likes > 1.0)
        .map(|l| WorkingSignal {
            consistency_score: cohort_counts.get(&l.feature).copied().unwrap_or(0) as f64 / cohort_size,
            lift: l.clone(),
        })
        .collect();

    signals.sort_by(|a, b| {
        ascending(b.lift.mean_lift, a.lift.mean_lift)
            .then_with(|| ascending(b.consistency_score, a.consistency_score))
    });
    signals
}

/// Per-video breakdown, best performance rank first.
fn compare_videos(
    videos: &[VideoRecord],
    rows: &[DerivedMetrics],
    row_features: &[&BTreeSet<FeatureValue>],
    cohort: &[usize],
) -> Vec<VideoComparison> {
    by_performance(rows)
        .into_iter()
        .map(|i| {
            let row = &rows[i];
            let video = &videos[row.index];

            // Features held by the top cohort, excluding this video itself
            let cohort_features: BTreeSet<&FeatureValue> = cohort
                .iter()
                .filter(|&&c| c != i)
                .flat_map(|&c| row_features[c].iter())
                .collect();
            let (overlapping_features, unique_features): (Vec<FeatureValue>, Vec<FeatureValue>) =
                row_features[i]
                    .iter()
                    .cloned()
                    .partition(|fv| cohort_features.contains(fv));

            VideoComparison {
                video_id: video.id.clone(),
                track_name: video.track_name.clone(),
                artist_name: video.artist_name.clone(),
                platform: row.selection.platform,
                views: row.selection.views,
                likes: row.selection.likes,
                engagement_proxy: row.engagement_proxy,
                views_relative: row.views_relative,
                likes_relative: row.likes_relative,
                high_view: row.high_view,
                high_like: row.high_like,
                ranks: RankBreakdown {
                    views_rank: row.views_rank,
                    likes_rank: row.likes_rank,
                    engagement_rank: row.engagement_rank,
                    performance_rank: row.performance_rank,
                },
                in_top_cohort: cohort.contains(&i),
                overlapping_features,
                unique_features,
            }
        })
        .collect()
}

/// Support counts for every feature-value in the collection, most common first.
pub fn feature_support(
    videos: &[VideoRecord],
    settings: &AnalysisSettings,
    buckets: &BucketConfig,
) -> Vec<FeatureSupport> {
    let min_sample_size = settings.min_sample_size();
    let analyzed: BTreeSet<usize> = metrics::normalize(videos).rows.iter().map(|r| r.index).collect();

    let mut counts: BTreeMap<FeatureValue, (usize, usize)> = BTreeMap::new();
    for (i, video) in videos.iter().enumerate() {
        for fv in classify_video(&video.metadata, buckets) {
            let entry = counts.entry(fv).or_insert((0, 0));
            entry.0 += 1;
            if analyzed.contains(&i) {
                entry.1 += 1;
            }
        }
    }

    let mut support: Vec<FeatureSupport> = counts
        .into_iter()
        .map(|(feature, (videos, analyzed))| FeatureSupport {
            feature,
            videos,
            analyzed,
            suppressed: analyzed < min_sample_size,
        })
        .collect();
    support.sort_by(|a, b| b.analyzed.cmp(&a.analyzed).then_with(|| b.videos.cmp(&a.videos)));
    support
}
