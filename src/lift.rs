//! Per feature-value statistics: lift over the baseline, average rank, and
//! median relative performance.
//!
//! Groups backed by fewer than the minimum sample size (never below 2) are
//! dropped before any statistic is computed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::metrics::{DerivedMetrics, calculate_median};
use crate::models::FeatureValue;

/// Analyzed-row positions grouped by the feature-values they carry.
#[derive(Debug, Default)]
pub struct FeatureGroups {
    groups: BTreeMap<FeatureValue, Vec<usize>>,
}

impl FeatureGroups {
    /// `row_features[i]` holds the feature-values of analyzed row `i`.
    pub fn build(row_features: &[&BTreeSet<FeatureValue>]) -> Self {
        let mut groups: BTreeMap<FeatureValue, Vec<usize>> = BTreeMap::new();
        for (row, features) in row_features.iter().enumerate() {
            for fv in features.iter() {
                groups.entry(fv.clone()).or_default().push(row);
            }
        }
        Self { groups }
    }

    /// Every observed feature-value with its supporting rows.
    pub fn all(&self) -> impl Iterator<Item = (&FeatureValue, &[usize])> {
        self.groups.iter().map(|(fv, rows)| (fv, rows.as_slice()))
    }

    /// Only groups with at least `min_sample_size` rows.
    pub fn supported(&self, min_sample_size: usize) -> impl Iterator<Item = (&FeatureValue, &[usize])> {
        self.all().filter(move |(_, rows)| rows.len() >= min_sample_size)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Unconditional share of analyzed videos above their platform median.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Baseline {
    pub high_view_rate: f64,
    pub high_like_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiftRecord {
    #[serde(flatten)]
    pub feature: FeatureValue,
    pub sample_size: usize,
    pub high_view_rate: f64,
    pub high_like_rate: f64,
    pub lift_views: f64,
    pub lift_likes: f64,
    pub mean_lift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRecord {
    #[serde(flatten)]
    pub feature: FeatureValue,
    pub sample_size: usize,
    pub avg_rank: f64,
    /// Positive means worse than the typical video
    pub vs_median_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRecord {
    #[serde(flatten)]
    pub feature: FeatureValue,
    pub sample_size: usize,
    pub median_views_relative: f64,
    pub median_engagement_proxy: f64,
}

fn rate(rows: &[DerivedMetrics], members: impl Iterator<Item = usize>, flag: fn(&DerivedMetrics) -> bool) -> f64 {
    let (hits, total) = members.fold((0usize, 0usize), |(h, t), i| {
        (h + usize::from(flag(&rows[i])), t + 1)
    });
    if total == 0 { 0.0 } else { hits as f64 / total as f64 }
}

pub fn baseline(rows: &[DerivedMetrics]) -> Baseline {
    Baseline {
        high_view_rate: rate(rows, 0..rows.len(), |r| r.high_view),
        high_like_rate: rate(rows, 0..rows.len(), |r| r.high_like),
    }
}

fn lift(conditional: f64, base: f64) -> f64 {
    if base > 0.0 { conditional / base } else { 0.0 }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Lift of each supported feature-value, best mean lift first.
pub fn analyze_lift(rows: &[DerivedMetrics], groups: &FeatureGroups, min_sample_size: usize) -> Vec<LiftRecord> {
    let base = baseline(rows);

    let mut records: Vec<LiftRecord> = groups
        .supported(min_sample_size)
        .map(|(fv, members)| {
            let high_view_rate = rate(rows, members.iter().copied(), |r| r.high_view);
            let high_like_rate = rate(rows, members.iter().copied(), |r| r.high_like);
            let lift_views = lift(high_view_rate, base.high_view_rate);
            let lift_likes = lift(high_like_rate, base.high_like_rate);
            LiftRecord {
                feature: fv.clone(),
                sample_size: members.len(),
                high_view_rate,
                high_like_rate,
                lift_views,
                lift_likes,
                mean_lift: (lift_views + lift_likes) / 2.0,
            }
        })
        .collect();

    records.sort_by(|a, b| descending(a.mean_lift, b.mean_lift));
    records
}

/// Median performance rank across all analyzed videos.
pub fn global_median_rank(rows: &[DerivedMetrics]) -> f64 {
    let ranks: Vec<f64> = rows.iter().map(|r| r.performance_rank).collect();
    calculate_median(&ranks)
}

/// Mean performance rank per supported feature-value, highest (worst) first.
pub fn associate_ranks(rows: &[DerivedMetrics], groups: &FeatureGroups, min_sample_size: usize) -> Vec<RankRecord> {
    let median_rank = global_median_rank(rows);

    let mut records: Vec<RankRecord> = groups
        .supported(min_sample_size)
        .map(|(fv, members)| {
            let avg_rank = members.iter().map(|&i| rows[i].performance_rank).sum::<f64>()
                / members.len() as f64;
            RankRecord {
                feature: fv.clone(),
                sample_size: members.len(),
                avg_rank,
                vs_median_rank: avg_rank - median_rank,
            }
        })
        .collect();

    records.sort_by(|a, b| descending(a.avg_rank, b.avg_rank));
    records
}

/// Median relative views and engagement per supported feature-value.
pub fn summarize_distribution(
    rows: &[DerivedMetrics],
    groups: &FeatureGroups,
    min_sample_size: usize,
) -> Vec<DistributionRecord> {
    let mut records: Vec<DistributionRecord> = groups
        .supported(min_sample_size)
        .map(|(fv, members)| {
            let views: Vec<f64> = members.iter().map(|&i| rows[i].views_relative).collect();
            let engagement: Vec<f64> = members.iter().map(|&i| rows[i].engagement_proxy).collect();
            DistributionRecord {
                feature: fv.clone(),
                sample_size: members.len(),
                median_views_relative: calculate_median(&views),
                median_engagement_proxy: calculate_median(&engagement),
            }
        })
        .collect();

    records.sort_by(|a, b| descending(a.median_views_relative, b.median_views_relative));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EngagementSelection;
    use crate::models::Platform;

    fn make_row(index: usize, high_view: bool, high_like: bool, rank: f64, views_relative: f64) -> DerivedMetrics {
        DerivedMetrics {
            index,
            selection: EngagementSelection {
                platform: Platform::Instagram,
                views: 100.0,
                likes: 10.0,
            },
            engagement_proxy: 0.1 * (index + 1) as f64,
            views_relative,
            likes_relative: 1.0,
            high_view,
            high_like,
            views_rank: 0,
            likes_rank: 0,
            engagement_rank: 0,
            performance_rank: rank,
        }
    }

    fn fv(feature: &str, value: &str) -> FeatureValue {
        FeatureValue::new(feature, value)
    }

    fn sets(rows: &[&[(&str, &str)]]) -> Vec<BTreeSet<FeatureValue>> {
        rows.iter()
            .map(|row| row.iter().map(|(f, v)| fv(f, v)).collect())
            .collect()
    }

    /// Four videos: two funk (both high), two metal (neither high).
    fn fixture() -> (Vec<DerivedMetrics>, Vec<BTreeSet<FeatureValue>>) {
        let rows = vec![
            make_row(0, true, true, 1.0, 2.0),
            make_row(1, true, false, 2.0, 1.5),
            make_row(2, false, true, 3.0, 0.8),
            make_row(3, false, false, 4.0, 0.5),
        ];
        let features = sets(&[
            &[("genre", "funk"), ("hashtag", "solo")],
            &[("genre", "funk")],
            &[("genre", "metal")],
            &[("genre", "metal"), ("hashtag", "fyp")],
        ]);
        (rows, features)
    }

    fn groups_for(features: &[BTreeSet<FeatureValue>]) -> FeatureGroups {
        let refs: Vec<&BTreeSet<FeatureValue>> = features.iter().collect();
        FeatureGroups::build(&refs)
    }

    #[test]
    fn test_baseline_rates() {
        let (rows, _) = fixture();
        let b = baseline(&rows);
        assert_eq!(b.high_view_rate, 0.5);
        assert_eq!(b.high_like_rate, 0.5);
        assert_eq!(baseline(&[]), Baseline::default());
    }

    #[test]
    fn test_lift_values_and_order() {
        let (rows, features) = fixture();
        let groups = groups_for(&features);
        let lifts = analyze_lift(&rows, &groups, 2);

        assert_eq!(lifts.len(), 2);
        let funk = &lifts[0];
        assert_eq!(funk.feature, fv("genre", "funk"));
        assert_eq!(funk.sample_size, 2);
        // p(high_view | funk) = 1.0 over baseline 0.5
        assert!((funk.lift_views - 2.0).abs() < 1e-12);
        assert!((funk.lift_likes - 1.0).abs() < 1e-12);
        assert!((funk.mean_lift - 1.5).abs() < 1e-12);

        let metal = &lifts[1];
        assert_eq!(metal.lift_views, 0.0);
        assert!((metal.lift_likes - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_video_features_are_suppressed() {
        let (rows, features) = fixture();
        let groups = groups_for(&features);
        let solo = fv("hashtag", "solo");

        assert!(groups.all().any(|(f, _)| *f == solo));
        assert!(analyze_lift(&rows, &groups, 2).iter().all(|r| r.feature != solo));
        assert!(associate_ranks(&rows, &groups, 2).iter().all(|r| r.feature != solo));
        assert!(summarize_distribution(&rows, &groups, 2).iter().all(|r| r.feature != solo));
    }

    #[test]
    fn test_zero_baseline_gives_zero_lift() {
        let rows = vec![
            make_row(0, false, false, 1.0, 1.0),
            make_row(1, false, false, 2.0, 1.0),
        ];
        let features = sets(&[&[("genre", "jazz")], &[("genre", "jazz")]]);
        let lifts = analyze_lift(&rows, &groups_for(&features), 2);
        assert_eq!(lifts.len(), 1);
        assert_eq!(lifts[0].lift_views, 0.0);
        assert_eq!(lifts[0].lift_likes, 0.0);
    }

    #[test]
    fn test_rank_association() {
        let (rows, features) = fixture();
        let ranks = associate_ranks(&rows, &groups_for(&features), 2);
        assert_eq!(global_median_rank(&rows), 2.5);

        // Sorted by avg_rank descending: metal (3.5) then funk (1.5)
        assert_eq!(ranks[0].feature, fv("genre", "metal"));
        assert!((ranks[0].avg_rank - 3.5).abs() < 1e-12);
        assert!((ranks[0].vs_median_rank - 1.0).abs() < 1e-12);
        assert_eq!(ranks[1].feature, fv("genre", "funk"));
        assert!((ranks[1].vs_median_rank + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distribution_summary() {
        let (rows, features) = fixture();
        let dist = summarize_distribution(&rows, &groups_for(&features), 2);
        assert_eq!(dist[0].feature, fv("genre", "funk"));
        assert!((dist[0].median_views_relative - 1.75).abs() < 1e-12);
        // engagement proxies 0.1 and 0.2
        assert!((dist[0].median_engagement_proxy - 0.15).abs() < 1e-12);
        assert_eq!(dist[1].feature, fv("genre", "metal"));
        assert!((dist[1].median_views_relative - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_higher_minimum_sample_size() {
        let (rows, features) = fixture();
        let groups = groups_for(&features);
        assert!(analyze_lift(&rows, &groups, 3).is_empty());
        assert_eq!(groups.len(), 4);
        assert_eq!(groups.supported(2).count(), 2);
    }
}
