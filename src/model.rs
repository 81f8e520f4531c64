use serde::{Deserialize, Serialize};

const LR_DECAY: f64 = 0.003;
const CHECK_EVERY: usize = 20;
const STALL_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub l2: f64,
    pub max_iters: usize,
    pub lr_start: f64,
    /// Relative train-loss improvement below which a check counts as stalled.
    pub tol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            l2: 0.05,
            max_iters: 2000,
            lr_start: 0.05,
            tol: 1e-6,
        }
    }
}

/// Linear regressor over standardized inputs:
/// `y = intercept + sum(coeffs[i] * (x[i] - mean[i]) / std[i])`.
/// Standardization stats come from the training block only, so the model is
/// self-contained at inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict_one(&self, x: &[f64]) -> f64 {
        let mut sum = self.intercept;
        for (idx, coeff) in self.coeffs.iter().enumerate() {
            let raw = x.get(idx).copied().unwrap_or(0.0);
            sum += coeff * standardized(raw, self.feature_means[idx], self.feature_stds[idx]);
        }
        sum
    }

    pub fn predict(&self, xs: &[Vec<f64>]) -> Vec<f64> {
        xs.iter().map(|x| self.predict_one(x)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Explained variance, 1 - SS_res / SS_tot; 0 when the target is flat.
    pub r2: f64,
}

/// Fits by batch gradient descent on mean squared error with L2 shrinkage on
/// the coefficients (not the intercept), decaying learning rate, and a
/// train-loss stall stop. Validation data never enters this function; folds
/// stay honest by construction.
pub fn fit(xs: &[Vec<f64>], ys: &[f64], cfg: &FitConfig) -> LinearModel {
    assert_eq!(xs.len(), ys.len(), "feature/target length mismatch");
    let n_features = xs.first().map(|x| x.len()).unwrap_or(0);
    let (means, stds) = feature_norm_stats(xs, n_features);

    let zs: Vec<Vec<f64>> = xs
        .iter()
        .map(|x| {
            (0..n_features)
                .map(|j| standardized(x[j], means[j], stds[j]))
                .collect()
        })
        .collect();

    let n = ys.len().max(1) as f64;
    let mut coeffs = vec![0.0; n_features];
    let mut intercept = ys.iter().sum::<f64>() / n;

    let mut best_loss = f64::INFINITY;
    let mut stalled = 0usize;

    for iter in 0..cfg.max_iters {
        let mut grad = vec![0.0; n_features];
        let mut grad_intercept = 0.0;

        for (z, y) in zs.iter().zip(ys) {
            let mut pred = intercept;
            for (j, c) in coeffs.iter().enumerate() {
                pred += c * z[j];
            }
            let residual = pred - y;
            grad_intercept += residual;
            for (j, g) in grad.iter_mut().enumerate() {
                *g += residual * z[j];
            }
        }

        let lr = cfg.lr_start / (1.0 + iter as f64 * LR_DECAY);
        intercept -= lr * grad_intercept / n;
        for (j, c) in coeffs.iter_mut().enumerate() {
            *c -= lr * (grad[j] / n + cfg.l2 * *c);
        }

        if iter % CHECK_EVERY == 0 || iter + 1 == cfg.max_iters {
            let loss = mse(&zs, ys, &coeffs, intercept);
            let improved = loss < best_loss * (1.0 - cfg.tol);
            if improved {
                best_loss = loss;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= STALL_LIMIT {
                    break;
                }
            }
        }
    }

    LinearModel {
        feature_means: means,
        feature_stds: stds,
        coeffs,
        intercept,
    }
}

pub fn evaluate(actual: &[f64], predicted: &[f64]) -> RegressionMetrics {
    if actual.is_empty() || actual.len() != predicted.len() {
        return RegressionMetrics::default();
    }
    let n = actual.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (a, p) in actual.iter().zip(predicted) {
        let err = a - p;
        abs_sum += err.abs();
        sq_sum += err * err;
    }

    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let r2 = if ss_tot > f64::EPSILON {
        1.0 - sq_sum / ss_tot
    } else {
        0.0
    };

    RegressionMetrics {
        samples: actual.len(),
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        r2,
    }
}

fn feature_norm_stats(xs: &[Vec<f64>], n_features: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; n_features];
    let mut stds = vec![1.0; n_features];
    if xs.is_empty() {
        return (means, stds);
    }

    let n = xs.len() as f64;
    for x in xs {
        for j in 0..n_features {
            means[j] += x[j];
        }
    }
    for m in &mut means {
        *m /= n;
    }

    for (j, std) in stds.iter_mut().enumerate() {
        let var = xs.iter().map(|x| (x[j] - means[j]).powi(2)).sum::<f64>() / n;
        *std = var.sqrt().max(1e-6);
    }
    (means, stds)
}

fn standardized(raw: f64, mean: f64, std: f64) -> f64 {
    (raw - mean) / std.max(1e-6)
}

fn mse(zs: &[Vec<f64>], ys: &[f64], coeffs: &[f64], intercept: f64) -> f64 {
    if ys.is_empty() {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for (z, y) in zs.iter().zip(ys) {
        let mut pred = intercept;
        for (j, c) in coeffs.iter().enumerate() {
            pred += c * z[j];
        }
        sum += (pred - y).powi(2);
    }
    sum / ys.len() as f64
}
