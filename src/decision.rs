use serde::{Deserialize, Serialize};

/// Absolute deviation beyond which a prediction is treated as a probable
/// feature or data defect rather than an opportunity.
pub const DEFAULT_ANOMALY_BOUND: f64 = 20.0;

/// Out-of-sample mean absolute error used for the informational
/// MAE-relative confidence figure when no calibrated value is supplied.
pub const DEFAULT_HISTORICAL_MAE: f64 = 17.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Over => "OVER",
            Direction::Under => "UNDER",
        }
    }
}

/// A named confidence bucket with the accuracy/ROI observed for it during
/// calibration against out-of-sample predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min_confidence: f64,
    pub label: String,
    pub expected_accuracy: f64,
    pub expected_roi: f64,
}

/// Thresholds held sorted descending so the first tier whose floor the
/// confidence meets is the strongest one it qualifies for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by(|a, b| {
            b.min_confidence
                .partial_cmp(&a.min_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        tiers.dedup_by(|a, b| a.min_confidence == b.min_confidence);
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn select(&self, confidence: f64) -> Option<&Tier> {
        self.tiers.iter().find(|t| confidence >= t.min_confidence)
    }

    /// Position of a tier from strongest (0) down; used to compare verdict
    /// strength.
    fn rank(&self, tier: &Tier) -> usize {
        self.tiers
            .iter()
            .position(|t| t.min_confidence == tier.min_confidence)
            .unwrap_or(self.tiers.len())
    }
}

/// The cutpoints the source system settled on after threshold calibration.
pub fn default_tier_table() -> TierTable {
    TierTable::new(vec![
        Tier {
            min_confidence: 10.0,
            label: "strong".to_string(),
            expected_accuracy: 77.8,
            expected_roi: 48.5,
        },
        Tier {
            min_confidence: 6.0,
            label: "moderate".to_string(),
            expected_accuracy: 76.8,
            expected_roi: 46.7,
        },
        Tier {
            min_confidence: 3.0,
            label: "weak".to_string(),
            expected_accuracy: 0.0,
            expected_roi: 0.0,
        },
    ])
}

#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub tiers: TierTable,
    pub anomaly_bound: f64,
    pub historical_mae: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            tiers: default_tier_table(),
            anomaly_bound: DEFAULT_ANOMALY_BOUND,
            historical_mae: DEFAULT_HISTORICAL_MAE,
        }
    }
}

/// Terminal classification of a graded prediction. There is no retry or
/// recovery transition out of any of these; new inputs mean a new grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Actionable { tier: Tier },
    Anomalous,
    Rejected,
}

impl Verdict {
    pub fn is_actionable(&self) -> bool {
        matches!(self, Verdict::Actionable { .. })
    }
}

/// One prediction graded against one line. Ephemeral: produced per request,
/// never persisted or patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub predicted_total: f64,
    pub line: f64,
    pub deviation: f64,
    /// Deviation as a percentage of the line; this figure governs tiering.
    pub confidence: f64,
    /// Deviation as a percentage of the historical out-of-sample MAE,
    /// carried as an informational cross-check only.
    pub confidence_vs_mae: f64,
    pub direction: Direction,
    pub verdict: Verdict,
}

/// Grades one predicted total against one posted line. Pure: same inputs,
/// same grade. The anomaly guard runs before tier selection so an absurd
/// deviation can never surface as a strong recommendation.
pub fn grade(predicted_total: f64, line: f64, cfg: &DecisionConfig) -> Grade {
    let deviation = predicted_total - line;
    let confidence = deviation.abs() / line.abs().max(1e-9) * 100.0;
    let confidence_vs_mae = deviation.abs() / cfg.historical_mae.max(1e-9) * 100.0;
    let direction = if deviation > 0.0 {
        Direction::Over
    } else {
        Direction::Under
    };

    let verdict = if deviation.abs() > cfg.anomaly_bound {
        Verdict::Anomalous
    } else {
        match cfg.tiers.select(confidence) {
            Some(tier) => Verdict::Actionable { tier: tier.clone() },
            None => Verdict::Rejected,
        }
    };

    Grade {
        predicted_total,
        line,
        deviation,
        confidence,
        confidence_vs_mae,
        direction,
        verdict,
    }
}

/// One slate entry for bulk grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlateGame {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub predicted_total: f64,
    pub line: f64,
}

#[derive(Debug, Clone)]
pub struct GradedGame {
    pub game: SlateGame,
    pub grade: Grade,
}

/// Bulk output, split by terminal status. Actionable entries come strongest
/// first; anomalous ones are routed for inspection, never recommended.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub actionable: Vec<GradedGame>,
    pub anomalous: Vec<GradedGame>,
    pub rejected: Vec<GradedGame>,
}

pub fn scan(games: &[SlateGame], cfg: &DecisionConfig) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for game in games {
        let graded = GradedGame {
            game: game.clone(),
            grade: grade(game.predicted_total, game.line, cfg),
        };
        match graded.grade.verdict {
            Verdict::Actionable { .. } => outcome.actionable.push(graded),
            Verdict::Anomalous => outcome.anomalous.push(graded),
            Verdict::Rejected => outcome.rejected.push(graded),
        }
    }
    outcome.actionable.sort_by(|a, b| {
        b.grade
            .confidence
            .partial_cmp(&a.grade.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    outcome
}

/// True when `stronger` is at least as strong an action as `weaker` under
/// `table`; used by the monotonicity property tests.
pub fn at_least_as_strong(table: &TierTable, stronger: &Verdict, weaker: &Verdict) -> bool {
    match (stronger, weaker) {
        (Verdict::Actionable { tier: a }, Verdict::Actionable { tier: b }) => {
            table.rank(a) <= table.rank(b)
        }
        (Verdict::Actionable { .. }, Verdict::Rejected) => true,
        (Verdict::Rejected, Verdict::Rejected) => true,
        (Verdict::Rejected, Verdict::Actionable { .. }) => false,
        // Anomalies sit outside the action ordering entirely.
        (Verdict::Anomalous, _) | (_, Verdict::Anomalous) => false,
    }
}
