use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::decision::{self, DecisionConfig, Grade};
use crate::error::CoreError;
use crate::features::{FEATURE_NAMES, MatchupAssembler};
use crate::injury::{InjuryAdapter, UnavailablePlayer};
use crate::records::TeamGameRecord;
use crate::rolling::{WINDOWS, snapshot_as_of};

/// A totals question: one matchup, one as-of instant, one or more posted
/// lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsRequest {
    pub home_team: String,
    pub away_team: String,
    pub as_of: NaiveDate,
    pub lines: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsResponse {
    pub home_team: String,
    pub away_team: String,
    pub as_of: NaiveDate,
    pub predicted_total: f64,
    /// One grade per requested line, in request order.
    pub grades: Vec<Grade>,
    /// Prior-game counts behind the prediction, for callers that want to
    /// weigh thin histories themselves.
    pub home_prior_games: usize,
    pub away_prior_games: usize,
}

/// The serving path: a loaded artifact wrapped with the one check that makes
/// it safe to use. Construction fails on any feature-layout drift; a missing
/// artifact never gets this far (`load_artifact` reports that).
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: ModelArtifact,
    offset: f64,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact) -> Result<Self, CoreError> {
        artifact.check_schema(&FEATURE_NAMES)?;
        Ok(Self {
            artifact,
            offset: 0.0,
        })
    }

    /// Additive correction applied to every predicted total, for callers
    /// that have measured a systematic bias against closing numbers.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Builds both sides' snapshots from history strictly earlier than the
    /// request date, assembles the inference vector in the artifact's
    /// recorded order, and grades the prediction against each line. Teams
    /// with no prior games degrade to zero-substituted features rather than
    /// failing.
    pub fn predict(
        &self,
        history: &[TeamGameRecord],
        unavailable: &[UnavailablePlayer],
        injuries: &InjuryAdapter,
        request: &TotalsRequest,
        decisions: &DecisionConfig,
    ) -> TotalsResponse {
        let home_history: Vec<TeamGameRecord> = history
            .iter()
            .filter(|r| r.team_code == request.home_team)
            .cloned()
            .collect();
        let away_history: Vec<TeamGameRecord> = history
            .iter()
            .filter(|r| r.team_code == request.away_team)
            .cloned()
            .collect();

        let home = snapshot_as_of(&home_history, request.as_of, &WINDOWS);
        let away = snapshot_as_of(&away_history, request.as_of, &WINDOWS);
        if home.prior_games == 0 {
            tracing::warn!(team = %request.home_team, "no history before as-of date");
        }
        if away.prior_games == 0 {
            tracing::warn!(team = %request.away_team, "no history before as-of date");
        }

        let assembler = MatchupAssembler::new(injuries, unavailable);
        let vector = assembler.build_inference(
            &request.home_team,
            &request.away_team,
            request.as_of,
            &home,
            &away,
        );

        let predicted_total = self.artifact.model.predict_one(&vector.values) + self.offset;
        let grades = request
            .lines
            .iter()
            .map(|&line| decision::grade(predicted_total, line, decisions))
            .collect();

        TotalsResponse {
            home_team: request.home_team.clone(),
            away_team: request.away_team.clone(),
            as_of: request.as_of,
            predicted_total,
            grades,
            home_prior_games: home.prior_games,
            away_prior_games: away.prior_games,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ARTIFACT_VERSION, ValidationSummary};
    use crate::injury::PlayerPointsTable;
    use crate::model::{LinearModel, RegressionMetrics};
    use crate::synthetic::{SyntheticConfig, synthetic_season};

    fn flat_artifact(intercept: f64) -> ModelArtifact {
        ModelArtifact {
            version: ARTIFACT_VERSION,
            trained_at: "2025-01-01T00:00:00Z".to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model: LinearModel {
                feature_means: vec![0.0; FEATURE_NAMES.len()],
                feature_stds: vec![1.0; FEATURE_NAMES.len()],
                coeffs: vec![0.0; FEATURE_NAMES.len()],
                intercept,
            },
            validation: ValidationSummary {
                folds: Vec::new(),
                mean: RegressionMetrics::default(),
                out_of_sample_rows: 0,
            },
            train_rows: 0,
        }
    }

    #[test]
    fn schema_drift_is_fatal_at_construction() {
        let mut artifact = flat_artifact(220.0);
        artifact.feature_names.swap(3, 4);
        assert!(matches!(
            Predictor::new(artifact),
            Err(CoreError::FeatureSchemaMismatch { .. })
        ));
    }

    #[test]
    fn predicts_and_grades_each_line() {
        let season = synthetic_season(&SyntheticConfig::default());
        let predictor = Predictor::new(flat_artifact(228.0)).unwrap();
        let injuries = InjuryAdapter::new(PlayerPointsTable::default());
        let request = TotalsRequest {
            home_team: "T00".to_string(),
            away_team: "T01".to_string(),
            as_of: "2025-02-01".parse().unwrap(),
            lines: vec![215.0, 225.0, 240.0],
        };
        let response = predictor.predict(
            &season,
            &[],
            &injuries,
            &request,
            &DecisionConfig::default(),
        );
        assert_eq!(response.grades.len(), 3);
        assert!(response.home_prior_games > 0);
        assert_eq!(response.predicted_total, 228.0);
        assert_eq!(response.grades[0].line, 215.0);
    }

    #[test]
    fn unknown_team_degrades_to_zero_features() {
        let season = synthetic_season(&SyntheticConfig::default());
        let predictor = Predictor::new(flat_artifact(210.0)).unwrap();
        let injuries = InjuryAdapter::new(PlayerPointsTable::default());
        let request = TotalsRequest {
            home_team: "ZZZ".to_string(),
            away_team: "T01".to_string(),
            as_of: "2025-02-01".parse().unwrap(),
            lines: vec![215.0],
        };
        let response = predictor.predict(
            &season,
            &[],
            &injuries,
            &request,
            &DecisionConfig::default(),
        );
        assert_eq!(response.home_prior_games, 0);
        assert_eq!(response.predicted_total, 210.0);
    }
}
