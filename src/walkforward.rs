use std::ops::Range;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;
use crate::error::CoreError;
use crate::features::MatchupFeatureVector;
use crate::model::{self, FitConfig, RegressionMetrics};

/// Minimum rows each of the K validation blocks and the seed training block
/// must hold.
pub const MIN_FOLD_ROWS: usize = 1;

/// One fold of the fixed expanding-window partition. Training is everything
/// strictly before the validation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSpec {
    pub index: usize,
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub index: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub metrics: RegressionMetrics,
}

/// A validation-block prediction, the only kind that may ever be called
/// out-of-sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutOfSamplePrediction {
    pub game_id: String,
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone)]
pub struct WalkForwardReport {
    pub folds: Vec<FoldReport>,
    /// Mean of the per-fold validation metrics, computed before any final
    /// refit. This is the only legitimate generalization estimate.
    pub aggregate: RegressionMetrics,
    pub predictions: Vec<OutOfSamplePrediction>,
    pub warnings: Vec<String>,
}

/// Chronologically partitions `n` rows into `k` expanding-window folds.
/// Validation blocks are contiguous, non-overlapping and strictly increasing;
/// the division remainder enlarges the first training block.
pub fn expanding_folds(n: usize, k: usize) -> Result<Vec<FoldSpec>, CoreError> {
    let needed = (k + 1) * MIN_FOLD_ROWS;
    if k == 0 || n < needed {
        return Err(CoreError::InsufficientFoldData {
            rows: n,
            folds: k,
            needed: needed.max(2),
        });
    }

    let block = n / (k + 1);
    let first_train_end = n - k * block;

    let mut folds = Vec::with_capacity(k);
    for i in 0..k {
        let val_start = first_train_end + i * block;
        folds.push(FoldSpec {
            index: i + 1,
            train: 0..val_start,
            validation: val_start..val_start + block,
        });
    }
    Ok(folds)
}

/// Runs the full expanding-window pass: fit per fold, score its validation
/// block, pool every out-of-sample pair. The partition is fixed before any
/// fold executes, so folds evaluate in parallel without changing what each
/// one can see. A fold that cannot be evaluated is reported and skipped; it
/// never poisons its siblings.
pub fn run_walk_forward(
    vectors: &[MatchupFeatureVector],
    k: usize,
    cfg: &FitConfig,
) -> Result<WalkForwardReport, CoreError> {
    let mut warnings = Vec::new();
    let labeled = labeled_rows(vectors, &mut warnings);
    let folds = expanding_folds(labeled.len(), k)?;

    let xs: Vec<&[f64]> = labeled.iter().map(|v| v.values.as_slice()).collect();
    let ys: Vec<f64> = labeled.iter().map(|v| v.label.unwrap_or(0.0)).collect();

    let fold_outputs: Vec<Result<(FoldReport, Vec<OutOfSamplePrediction>), String>> = folds
        .par_iter()
        .map(|spec| evaluate_fold(spec, &labeled, &xs, &ys, cfg))
        .collect();

    let mut reports = Vec::new();
    let mut predictions = Vec::new();
    for output in fold_outputs {
        match output {
            Ok((report, mut fold_preds)) => {
                reports.push(report);
                predictions.append(&mut fold_preds);
            }
            Err(warning) => {
                tracing::warn!(%warning, "fold failed");
                warnings.push(warning);
            }
        }
    }
    reports.sort_by_key(|r| r.index);
    predictions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.game_id.cmp(&b.game_id)));

    Ok(WalkForwardReport {
        aggregate: aggregate_metrics(&reports),
        folds: reports,
        predictions,
        warnings,
    })
}

/// Walk-forward evaluation plus the deployable refit on the entire ordered
/// dataset. The artifact carries the pre-refit validation summary; the final
/// model's own training error is never measured here, on purpose.
pub fn train_final(
    vectors: &[MatchupFeatureVector],
    k: usize,
    cfg: &FitConfig,
) -> Result<(ModelArtifact, WalkForwardReport), CoreError> {
    let report = run_walk_forward(vectors, k, cfg)?;

    let mut warnings = Vec::new();
    let labeled = labeled_rows(vectors, &mut warnings);
    let xs: Vec<Vec<f64>> = labeled.iter().map(|v| v.values.clone()).collect();
    let ys: Vec<f64> = labeled.iter().map(|v| v.label.unwrap_or(0.0)).collect();
    let final_model = model::fit(&xs, &ys, cfg);

    let artifact = ModelArtifact::new(final_model, &report, labeled.len());
    Ok((artifact, report))
}

fn labeled_rows<'a>(
    vectors: &'a [MatchupFeatureVector],
    warnings: &mut Vec<String>,
) -> Vec<&'a MatchupFeatureVector> {
    let mut labeled = Vec::with_capacity(vectors.len());
    for vector in vectors {
        if vector.label.is_some() {
            labeled.push(vector);
        } else {
            warnings.push(format!(
                "game {}: unlabeled vector excluded from training",
                vector.game_id
            ));
        }
    }
    labeled
}

fn evaluate_fold(
    spec: &FoldSpec,
    labeled: &[&MatchupFeatureVector],
    xs: &[&[f64]],
    ys: &[f64],
    cfg: &FitConfig,
) -> Result<(FoldReport, Vec<OutOfSamplePrediction>), String> {
    if spec.train.is_empty() || spec.validation.is_empty() {
        return Err(format!("fold {}: empty partition", spec.index));
    }

    let train_xs: Vec<Vec<f64>> = xs[spec.train.clone()].iter().map(|x| x.to_vec()).collect();
    let train_ys = ys[spec.train.clone()].to_vec();
    let fitted = model::fit(&train_xs, &train_ys, cfg);

    let val_rows = &labeled[spec.validation.clone()];
    let actual = ys[spec.validation.clone()].to_vec();
    let predicted: Vec<f64> = val_rows
        .iter()
        .map(|v| fitted.predict_one(&v.values))
        .collect();

    let predictions = val_rows
        .iter()
        .zip(actual.iter().zip(&predicted))
        .map(|(vector, (a, p))| OutOfSamplePrediction {
            game_id: vector.game_id.clone(),
            date: vector.date,
            actual: *a,
            predicted: *p,
        })
        .collect();

    Ok((
        FoldReport {
            index: spec.index,
            train_rows: spec.train.len(),
            validation_rows: spec.validation.len(),
            metrics: model::evaluate(&actual, &predicted),
        },
        predictions,
    ))
}

fn aggregate_metrics(folds: &[FoldReport]) -> RegressionMetrics {
    if folds.is_empty() {
        return RegressionMetrics::default();
    }
    let n = folds.len() as f64;
    RegressionMetrics {
        samples: folds.iter().map(|f| f.metrics.samples).sum(),
        mae: folds.iter().map(|f| f.metrics.mae).sum::<f64>() / n,
        rmse: folds.iter().map(|f| f.metrics.rmse).sum::<f64>() / n,
        r2: folds.iter().map(|f| f.metrics.r2).sum::<f64>() / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_partition_expands_and_never_overlaps() {
        let folds = expanding_folds(1000, 5).unwrap();
        assert_eq!(folds.len(), 5);
        for pair in folds.windows(2) {
            let (earlier, later) = (&pair[0], &pair[1]);
            assert_eq!(earlier.validation.end, later.validation.start);
            assert!(later.train.end > earlier.train.end);
            assert_eq!(later.train.start, 0);
        }
        // Fold 1 trains on the least data; every validation row follows its
        // entire training block.
        assert!(folds[0].train.len() < folds[4].train.len());
        for fold in &folds {
            assert_eq!(fold.train.end, fold.validation.start);
        }
        assert_eq!(folds[4].validation.end, 1000);
    }

    #[test]
    fn remainder_goes_to_first_training_block() {
        let folds = expanding_folds(103, 5).unwrap();
        // 103 / 6 = 17 per validation block, 103 - 85 = 18 seed rows.
        assert_eq!(folds[0].train.len(), 18);
        assert!(folds.iter().all(|f| f.validation.len() == 17));
    }

    #[test]
    fn too_few_rows_fails_fast() {
        let err = expanding_folds(5, 5).unwrap_err();
        match err {
            CoreError::InsufficientFoldData { rows, folds, .. } => {
                assert_eq!(rows, 5);
                assert_eq!(folds, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_folds_is_rejected() {
        assert!(expanding_folds(100, 0).is_err());
    }
}
