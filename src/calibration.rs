use serde::{Deserialize, Serialize};

use crate::decision::{Tier, TierTable};
use crate::walkforward::OutOfSamplePrediction;

/// Candidate confidence cutpoints, in percent of the line.
pub const DEFAULT_THRESHOLDS: [f64; 14] = [
    0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 12.0, 15.0, 20.0,
];

/// Cutpoints the tier table is built from, strongest first.
pub const TIER_CUTPOINTS: [(f64, &str); 3] =
    [(10.0, "strong"), (6.0, "moderate"), (3.0, "weak")];

/// American-odds pricing for the ROI simulation: a win returns 100, a loss
/// costs the 110 staked.
const WIN_PAYOUT: f64 = 100.0;
const STAKE: f64 = 110.0;

/// Minimum retained games before a threshold is considered trustworthy.
pub const MIN_CALIBRATION_GAMES: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub threshold: f64,
    pub games: usize,
    pub wins: usize,
    pub losses: usize,
    pub accuracy: f64,
    pub roi: f64,
}

/// Evaluates each candidate threshold against the walk-forward out-of-sample
/// pool: keep only predictions whose line-relative confidence meets the
/// threshold, then score the over/under call against the actual total.
/// Thresholds that retain no games are omitted.
pub fn sweep_thresholds(
    predictions: &[OutOfSamplePrediction],
    line: f64,
    thresholds: &[f64],
) -> Vec<ThresholdReport> {
    thresholds
        .iter()
        .filter_map(|&threshold| evaluate_threshold(predictions, line, threshold))
        .collect()
}

fn evaluate_threshold(
    predictions: &[OutOfSamplePrediction],
    line: f64,
    threshold: f64,
) -> Option<ThresholdReport> {
    let mut games = 0usize;
    let mut wins = 0usize;

    for p in predictions {
        let confidence = (p.predicted - line).abs() / line.abs().max(1e-9) * 100.0;
        if confidence < threshold {
            continue;
        }
        games += 1;
        if (p.actual > line) == (p.predicted > line) {
            wins += 1;
        }
    }

    if games == 0 {
        return None;
    }

    let losses = games - wins;
    let profit = wins as f64 * WIN_PAYOUT - losses as f64 * STAKE;
    Some(ThresholdReport {
        threshold,
        games,
        wins,
        losses,
        accuracy: wins as f64 / games as f64 * 100.0,
        roi: profit / (games as f64 * STAKE) * 100.0,
    })
}

/// The lowest threshold that is profitable on a sample worth trusting;
/// `None` when nothing qualifies, in which case callers should keep paper
/// trading rather than force a cutpoint.
pub fn recommend_threshold(reports: &[ThresholdReport]) -> Option<&ThresholdReport> {
    reports
        .iter()
        .filter(|r| r.roi > 0.0 && r.games >= MIN_CALIBRATION_GAMES)
        .min_by(|a, b| {
            a.threshold
                .partial_cmp(&b.threshold)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Builds the decision tier table from a sweep, attaching each canonical
/// cutpoint's observed accuracy/ROI. Cutpoints absent from the sweep fall
/// back to zeros so the table never silently invents history.
pub fn tier_table_from_sweep(reports: &[ThresholdReport]) -> TierTable {
    let tiers = TIER_CUTPOINTS
        .iter()
        .map(|&(cutpoint, label)| {
            let observed = reports
                .iter()
                .find(|r| (r.threshold - cutpoint).abs() < f64::EPSILON);
            Tier {
                min_confidence: cutpoint,
                label: label.to_string(),
                expected_accuracy: observed.map(|r| r.accuracy).unwrap_or(0.0),
                expected_roi: observed.map(|r| r.roi).unwrap_or(0.0),
            }
        })
        .collect();
    TierTable::new(tiers)
}
