//! Shock value (0-100): how rhythmically and dynamically unpredictable a
//! performance is, from detected onsets and an optional energy series.
//!
//! Three sub-scores feed a weighted composite. When no usable energy series
//! exists the volume sub-score is forced to 0 and its weight is redistributed
//! to the onset-based sub-scores.

use std::collections::BTreeSet;

use serde::Serialize;

/// Minimum onsets for interval-based sub-scores (gives at least 2 intervals).
const MIN_ONSETS: usize = 3;

/// Minimum energy readings for the volume sub-score.
const MIN_ENERGY_SAMPLES: usize = 3;

/// An interval shorter than this fraction of the mean interval is a tempo spike.
const TEMPO_SPIKE_RATIO: f64 = 0.6;

/// An energy reading above mean + this many σ is a volume spike.
const VOLUME_SPIKE_SIGMA: f64 = 1.5;

/// Interval CV that maps to a full cv score.
const CV_FULL_SCALE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockComponents {
    pub tempo_spikes: f64,
    pub volume_spikes: f64,
    pub unusual_patterns: f64,
}

/// Which weight set produced a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightRegime {
    /// Energy series had enough samples
    EnergyAvailable,
    /// Energy missing or too short; onsets only
    OnsetsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub tempo: f64,
    pub volume: f64,
    pub unusual: f64,
}

impl WeightRegime {
    pub fn weights(self) -> Weights {
        match self {
            Self::EnergyAvailable => Weights {
                tempo: 0.3,
                volume: 0.3,
                unusual: 0.4,
            },
            Self::OnsetsOnly => Weights {
                tempo: 0.4,
                volume: 0.0,
                unusual: 0.6,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EnergyAvailable => "energy",
            Self::OnsetsOnly => "onsets",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShockScore {
    #[serde(flatten)]
    pub components: ShockComponents,
    pub shock_value: u8,
    pub regime: WeightRegime,
}

/// Score one video's signal. Never fails: missing or degenerate data gives 0
/// for the affected sub-score only.
pub fn score(onsets: &[f64], energy: Option<&[f64]>) -> ShockScore {
    let onsets = clean_onsets(onsets);
    let intervals = onset_intervals(&onsets);

    let energy: Option<Vec<f64>> = energy
        .map(|e| e.iter().copied().filter(|v| v.is_finite()).collect::<Vec<_>>())
        .filter(|e| e.len() >= MIN_ENERGY_SAMPLES);

    let components = ShockComponents {
        tempo_spikes: contained("tempo_spikes", || tempo_spikes(&intervals)),
        volume_spikes: contained("volume_spikes", || {
            energy.as_deref().and_then(volume_spikes)
        }),
        unusual_patterns: contained("unusual_patterns", || unusual_patterns(&intervals)),
    };

    let regime = if energy.is_some() {
        WeightRegime::EnergyAvailable
    } else {
        WeightRegime::OnsetsOnly
    };

    ShockScore {
        components,
        shock_value: composite(&components, regime),
        regime,
    }
}

/// Weighted sum of the components, clamped and rounded.
pub fn composite(c: &ShockComponents, regime: WeightRegime) -> u8 {
    let w = regime.weights();
    let raw = w.tempo * c.tempo_spikes + w.volume * c.volume_spikes + w.unusual * c.unusual_patterns;
    if !raw.is_finite() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

/// Run one sub-score computation, substituting 0 for no result or a
/// non-finite one. The other sub-scores are unaffected.
fn contained(name: &str, compute: impl FnOnce() -> Option<f64>) -> f64 {
    match compute() {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        Some(v) => {
            log::debug!("{name}: non-finite result {v}, scoring 0");
            0.0
        }
        None => 0.0,
    }
}

/// Drop negative/non-finite timestamps and anything not strictly after the
/// previous kept onset.
fn clean_onsets(onsets: &[f64]) -> Vec<f64> {
    let mut cleaned: Vec<f64> = Vec::with_capacity(onsets.len());
    for &t in onsets {
        if !t.is_finite() || t < 0.0 {
            continue;
        }
        if cleaned.last().is_some_and(|&prev| t <= prev) {
            continue;
        }
        cleaned.push(t);
    }
    if cleaned.len() < onsets.len() {
        log::debug!("Filtered {} malformed onsets", onsets.len() - cleaned.len());
    }
    cleaned
}

fn onset_intervals(onsets: &[f64]) -> Vec<f64> {
    if onsets.len() < MIN_ONSETS {
        return Vec::new();
    }
    onsets.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Positive, finite mean interval, or None.
fn usable_mean_interval(intervals: &[f64]) -> Option<f64> {
    if intervals.len() < MIN_ONSETS - 1 {
        return None;
    }
    mean(intervals).filter(|avg| avg.is_finite() && *avg > 0.0)
}

// ── Tempo spikes ──────────────────────────────────────────────────────
// Sudden rushes: intervals much shorter than the typical gap.
// Half frequency of spikes, half how extreme they are.
fn tempo_spikes(intervals: &[f64]) -> Option<f64> {
    let avg = usable_mean_interval(intervals)?;
    let threshold = avg * TEMPO_SPIKE_RATIO;

    let spikes: Vec<f64> = intervals.iter().copied().filter(|&i| i < threshold).collect();
    if spikes.is_empty() {
        return Some(0.0);
    }

    let frequency = spikes.len() as f64 / intervals.len() as f64 * 100.0;
    // An interval at 50% of the mean already saturates intensity
    let intensity = spikes
        .iter()
        .map(|&i| (((avg - i) / avg) * 200.0).clamp(0.0, 100.0))
        .sum::<f64>()
        / spikes.len() as f64;

    Some((0.5 * frequency + 0.5 * intensity).clamp(0.0, 100.0))
}

// ── Volume spikes ─────────────────────────────────────────────────────
// Energy readings well above the series mean.
fn volume_spikes(energy: &[f64]) -> Option<f64> {
    let mean = mean(energy)?;
    let sigma = std_dev(energy, mean);
    let threshold = mean + VOLUME_SPIKE_SIGMA * sigma;

    let spikes: Vec<f64> = energy.iter().copied().filter(|&v| v > threshold).collect();
    if spikes.is_empty() {
        return Some(0.0);
    }

    let frequency = spikes.len() as f64 / energy.len() as f64 * 100.0;
    // Relative to |mean| so dB (negative) series work; a zero mean saturates
    let intensity = spikes
        .iter()
        .map(|&v| (((v - mean) / mean.abs()) * 50.0).clamp(0.0, 100.0))
        .sum::<f64>()
        / spikes.len() as f64;

    Some((0.5 * frequency + 0.5 * intensity).clamp(0.0, 100.0))
}

// ── Unusual patterns ──────────────────────────────────────────────────
// Irregular timing (interval CV, 60%) plus variety of distinct gaps (40%).
fn unusual_patterns(intervals: &[f64]) -> Option<f64> {
    let avg = usable_mean_interval(intervals)?;

    let cv = std_dev(intervals, avg) / avg;
    let cv_score = (cv / CV_FULL_SCALE * 100.0).clamp(0.0, 100.0);

    // Distinct intervals at 10ms resolution
    let distinct: BTreeSet<i64> = intervals
        .iter()
        .map(|&i| (i * 100.0).round() as i64)
        .collect();
    let diversity = distinct.len() as f64 / intervals.len() as f64 * 100.0;
    let diversity_score = (diversity * 2.0).clamp(0.0, 100.0);

    Some(0.6 * cv_score + 0.4 * diversity_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BURSTY: [f64; 5] = [0.0, 0.5, 1.0, 1.05, 1.5];
    const STEADY: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];

    fn assert_in_range(s: &ShockScore) {
        for (name, v) in [
            ("tempo", s.components.tempo_spikes),
            ("volume", s.components.volume_spikes),
            ("unusual", s.components.unusual_patterns),
        ] {
            assert!((0.0..=100.0).contains(&v), "{name}={v}");
        }
        assert!(s.shock_value <= 100, "shock={}", s.shock_value);
    }

    #[test]
    fn test_short_onsets_score_zero() {
        for onsets in [&[][..], &[1.0][..], &[0.0, 0.4][..]] {
            let s = score(onsets, None);
            assert_eq!(s.components.tempo_spikes, 0.0);
            assert_eq!(s.components.unusual_patterns, 0.0);
            assert_eq!(s.shock_value, 0);
        }
    }

    #[test]
    fn test_bursty_onsets_produce_tempo_spike() {
        let intervals = onset_intervals(&BURSTY);
        let avg = mean(&intervals).unwrap();
        assert!((avg - 0.375).abs() < 1e-9, "avg={avg}");

        let s = score(&BURSTY, None);
        // One spike of four intervals (25%), intensity saturated at 100
        assert!((s.components.tempo_spikes - 62.5).abs() < 1e-9, "tempo={}", s.components.tempo_spikes);
        // cv ≈ 0.50 saturates; 3 distinct of 4 intervals saturates diversity
        assert!((s.components.unusual_patterns - 100.0).abs() < 1e-9);
        assert_eq!(s.regime, WeightRegime::OnsetsOnly);
        // 0.4 × 62.5 + 0.6 × 100
        assert_eq!(s.shock_value, 85);
    }

    #[test]
    fn test_steady_onsets_have_no_tempo_spikes() {
        let s = score(&STEADY, None);
        assert_eq!(s.components.tempo_spikes, 0.0);
        // cv = 0, one distinct interval of four → diversity 25% → 50 pts × 0.4
        assert!((s.components.unusual_patterns - 20.0).abs() < 1e-9);
        assert_eq!(s.shock_value, 12);
    }

    #[test]
    fn test_missing_energy_uses_fallback_weights() {
        let mut energy = vec![-20.0; 9];
        energy.push(-5.0);

        let with_energy = score(&STEADY, Some(&energy));
        let without = score(&STEADY, None);
        let too_short = score(&STEADY, Some(&[-20.0, -5.0]));

        assert_eq!(with_energy.regime, WeightRegime::EnergyAvailable);
        assert!(with_energy.components.volume_spikes > 20.0, "volume={}", with_energy.components.volume_spikes);
        // 0.3 × 23.24 + 0.4 × 20 ≈ 14.97
        assert_eq!(with_energy.shock_value, 15);

        for s in [without, too_short] {
            assert_eq!(s.regime, WeightRegime::OnsetsOnly);
            assert_eq!(s.components.volume_spikes, 0.0);
            assert_eq!(s.shock_value, 12);
        }
    }

    #[test]
    fn test_volume_spike_math() {
        let mut energy = vec![-20.0; 9];
        energy.push(-5.0);
        // mean -18.5, σ 4.5, threshold -11.75 → one spike of ten
        // intensity = 13.5 / 18.5 × 50
        let expected = 0.5 * 10.0 + 0.5 * (13.5 / 18.5 * 50.0);
        let v = volume_spikes(&energy).unwrap();
        assert!((v - expected).abs() < 1e-9, "volume={v} expected={expected}");
    }

    #[test]
    fn test_flat_energy_has_no_volume_spikes() {
        let energy = [0.5; 8];
        let s = score(&STEADY, Some(&energy));
        assert_eq!(s.regime, WeightRegime::EnergyAvailable);
        assert_eq!(s.components.volume_spikes, 0.0);
    }

    #[test]
    fn test_zero_mean_energy_saturates_intensity() {
        // mean 0, σ 2, threshold 3: the single 4.0 reading spikes
        let centered = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -4.0, 4.0];
        let v = volume_spikes(&centered).unwrap();
        assert!((v - 55.0).abs() < 1e-9, "volume={v}");
    }

    #[test]
    fn test_malformed_onsets_are_filtered() {
        let dirty = [0.0, f64::NAN, 0.5, -1.0, 1.0, 0.9, f64::INFINITY, 1.05, 1.5];
        let clean = score(&BURSTY, None);
        let filtered = score(&dirty, None);
        assert_eq!(clean, filtered);
    }

    #[test]
    fn test_non_finite_energy_readings_are_dropped() {
        let energy = [f64::NAN, -20.0, f64::NEG_INFINITY];
        // Only one finite reading left: fallback regime
        let s = score(&STEADY, Some(&energy));
        assert_eq!(s.regime, WeightRegime::OnsetsOnly);
    }

    #[test]
    fn test_all_scores_in_range_for_extreme_inputs() {
        let cases: Vec<(Vec<f64>, Option<Vec<f64>>)> = vec![
            (vec![0.0, 1e-9, 2e-9, 100.0], Some(vec![1e300, -1e300, 0.0, 5.0])),
            (vec![0.0, 0.001, 50.0, 50.002, 99.0], Some(vec![0.0; 5])),
            ((0..200).map(|i| i as f64 * 0.01 + (i % 7) as f64 * 0.003).collect(), None),
            (vec![5.0, 5.0, 5.0, 5.0], Some(vec![-60.0, -10.0, -60.0, -60.0])),
        ];
        for (onsets, energy) in &cases {
            let s = score(onsets, energy.as_deref());
            assert_in_range(&s);
        }
    }

    #[test]
    fn test_composite_weights() {
        let c = ShockComponents {
            tempo_spikes: 100.0,
            volume_spikes: 100.0,
            unusual_patterns: 0.0,
        };
        assert_eq!(composite(&c, WeightRegime::EnergyAvailable), 60);
        assert_eq!(composite(&c, WeightRegime::OnsetsOnly), 40);
    }

    #[test]
    fn test_contained_substitutes_zero() {
        assert_eq!(contained("x", || None), 0.0);
        assert_eq!(contained("x", || Some(f64::NAN)), 0.0);
        assert_eq!(contained("x", || Some(150.0)), 100.0);
        assert_eq!(contained("x", || Some(42.0)), 42.0);
    }
}
