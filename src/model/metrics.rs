//! Classification metrics used to judge a trained model.

use std::fmt::Write as _;

use ndarray::{Array1, Array2};

/// Metrics for a single-label multi-class prediction.
///
/// `precision`, `recall` and `f1` are micro-averaged over all classes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Sorted class labels indexing the confusion matrix.
    pub labels: Vec<i64>,
    /// `confusion[[actual, predicted]]` counts.
    pub confusion: Array2<u64>,
}

impl ClassificationMetrics {
    /// Compares `predicted` against `actual`.
    pub fn evaluate(actual: &Array1<i64>, predicted: &Array1<i64>) -> Self {
        let mut labels: Vec<i64> = actual.iter().chain(predicted.iter()).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let index = |label: &i64| labels.binary_search(label).unwrap_or(0);
        let mut confusion = Array2::<u64>::zeros((labels.len(), labels.len()));
        for (a, p) in actual.iter().zip(predicted.iter()) {
            confusion[[index(a), index(p)]] += 1;
        }

        let total: u64 = confusion.sum();
        let true_positives: u64 = confusion.diag().sum();
        // Every miss is one false positive and one false negative.
        let false_positives = total - true_positives;
        let false_negatives = total - true_positives;

        let accuracy = ratio(true_positives, total);
        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, true_positives + false_negatives);
        let f1 = harmonic_mean(precision, recall);

        Self {
            accuracy,
            precision,
            recall,
            f1,
            labels,
            confusion,
        }
    }

    /// Confusion matrix with each row normalized to percentages.
    pub fn confusion_percent(&self) -> Array2<f64> {
        let mut percent = self.confusion.mapv(|v| v as f64);
        for mut row in percent.rows_mut() {
            let sum: f64 = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| 100.0 * v / sum);
            }
        }
        percent
    }

    /// Per-class precision/recall/f1/support table.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>10} {:>10} {:>10} {:>10} {:>10}",
            "class", "precision", "recall", "f1-score", "support"
        );
        for (i, label) in self.labels.iter().enumerate() {
            let tp = self.confusion[[i, i]];
            let predicted: u64 = self.confusion.column(i).sum();
            let support: u64 = self.confusion.row(i).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let _ = writeln!(
                out,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label,
                precision,
                recall,
                harmonic_mean(precision, recall),
                support
            );
        }
        let _ = writeln!(
            out,
            "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "micro avg",
            self.precision,
            self.recall,
            self.f1,
            self.confusion.sum()
        );
        out
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let actual = array![0, 1, 2, 1];
        let m = ClassificationMetrics::evaluate(&actual, &actual);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.labels, vec![0, 1, 2]);
        assert_eq!(m.confusion.diag().sum(), 4);
    }

    #[test]
    fn test_micro_scores_match_accuracy() {
        let actual = array![0, 0, 1, 1];
        let predicted = array![0, 1, 1, 1];
        let m = ClassificationMetrics::evaluate(&actual, &predicted);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.precision - 0.75).abs() < 1e-12);
        assert!((m.recall - 0.75).abs() < 1e-12);
        assert!((m.f1 - 0.75).abs() < 1e-12);
        assert_eq!(m.confusion, array![[1u64, 1], [0, 2]]);
    }

    #[test]
    fn test_empty_input() {
        let empty = Array1::<i64>::zeros(0);
        let m = ClassificationMetrics::evaluate(&empty, &empty);
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!(m.labels.is_empty());
    }

    #[test]
    fn test_confusion_percent_rows() {
        let m = ClassificationMetrics::evaluate(&array![0, 0, 1, 1], &array![0, 1, 1, 1]);
        let pct = m.confusion_percent();
        assert_eq!(pct[[0, 0]], 50.0);
        assert_eq!(pct[[1, 1]], 100.0);
    }

    #[test]
    fn test_report_lists_classes() {
        let m = ClassificationMetrics::evaluate(&array![3, 4], &array![3, 3]);
        let report = m.report();
        assert!(report.contains("precision"));
        assert!(report.lines().any(|l| l.trim_start().starts_with('3')));
        assert!(report.lines().any(|l| l.trim_start().starts_with('4')));
        assert!(report.contains("micro avg"));
    }
}
