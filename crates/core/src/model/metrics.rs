//! Held-out evaluation for the spread models

use serde::Serialize;
use std::fmt;

/// Share of matching labels
pub fn accuracy(truth: &[u8], predicted: &[u8]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / truth.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic
///
/// Tied scores share their average rank. Returns `None` when only one class
/// is present.
pub fn roc_auc(truth: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = truth.iter().filter(|&&t| t == 1).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based: the tied block covers start+1 ..= end
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += order[start..end]
            .iter()
            .filter(|&&i| truth[i] == 1)
            .count() as f64
            * avg_rank;
        start = end;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// 2×2 confusion matrix, rows = truth, columns = prediction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[u8], predicted: &[u8]) -> Self {
        let mut m = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == 1, p == 1) {
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_positive += 1,
                (true, false) => m.false_negative += 1,
                (true, true) => m.true_positive += 1,
            }
        }
        m
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[{:>6} {:>6}]", self.true_negative, self.false_positive)?;
        write!(f, " [{:>6} {:>6}]]", self.false_negative, self.true_positive)
    }
}

/// Precision/recall/F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassScores {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Per-class report for the binary spread label
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub no_spread: ClassScores,
    pub spread: ClassScores,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn new(truth: &[u8], predicted: &[u8]) -> Self {
        let c = ConfusionMatrix::from_labels(truth, predicted);
        Self {
            no_spread: ClassScores::new(c.true_negative, c.false_negative, c.false_positive),
            spread: ClassScores::new(c.true_positive, c.false_positive, c.false_negative),
            accuracy: accuracy(truth, predicted),
            confusion: c,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, s) in [("No Spread", self.no_spread), ("Spread", self.spread)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, s.precision, s.recall, s.f1, s.support
            )?;
        }
        write!(
            f,
            "{:>12} {:>29.2} {:>9}",
            "accuracy",
            self.accuracy,
            self.no_spread.support + self.spread.support
        )
    }
}

/// Regression error summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionScores {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionScores {
    pub fn new(truth: &[f64], predicted: &[f64]) -> Self {
        let mse = mean_squared_error(truth, predicted);
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(truth, predicted),
            r2: r2_score(truth, predicted),
        }
    }
}

impl fmt::Display for RegressionScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MSE: {:.4}  RMSE: {:.4}  MAE: {:.4}  R²: {:.4}",
            self.mse, self.rmse, self.mae, self.r2
        )
    }
}

pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / truth.len() as f64
}

pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / truth.len() as f64
}

/// Coefficient of determination; 0 for a constant target predicted exactly
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}
