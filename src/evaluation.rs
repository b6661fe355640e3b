//! Offline evaluation of a loaded detector against labelled data

use crate::dataset::Dataset;
use crate::error::InferenceError;
use crate::models::FraudDetector;
use crate::types::Label;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::info;

/// Binary confusion matrix with fraud as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, truth: Label, predicted: Label) {
        match (truth, predicted) {
            (Label::Legitimate, Label::Legitimate) => self.true_negative += 1,
            (Label::Legitimate, Label::Fraud) => self.false_positive += 1,
            (Label::Fraud, Label::Legitimate) => self.false_negative += 1,
            (Label::Fraud, Label::Fraud) => self.true_positive += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Build from paired truth/prediction sequences.
    pub fn from_pairs<I: IntoIterator<Item = (Label, Label)>>(pairs: I) -> Self {
        let mut matrix = Self::default();
        for (truth, predicted) in pairs {
            matrix.record(truth, predicted);
        }
        matrix
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: true_pos + false_neg,
        }
    }
}

/// Undefined ratios count as zero.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Per-class and averaged classification metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub legitimate: ClassMetrics,
    pub fraud: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let c = confusion;
        let legitimate = ClassMetrics::from_counts(c.true_negative, c.false_negative, c.false_positive);
        let fraud = ClassMetrics::from_counts(c.true_positive, c.false_positive, c.false_negative);
        let total = c.total();

        let macro_avg = ClassMetrics {
            precision: (legitimate.precision + fraud.precision) / 2.0,
            recall: (legitimate.recall + fraud.recall) / 2.0,
            f1: (legitimate.f1 + fraud.f1) / 2.0,
            support: total,
        };

        let weight = |metric: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                (metric(&legitimate) * legitimate.support as f64
                    + metric(&fraud) * fraud.support as f64)
                    / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
            support: total,
        };

        Self {
            legitimate,
            fraud,
            accuracy: ratio(c.true_negative + c.true_positive, total),
            macro_avg,
            weighted_avg,
            confusion,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )
        };

        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        row(f, "0", &self.legitimate)?;
        row(f, "1", &self.fraud)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.confusion.total()
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)?;
        writeln!(f)?;
        writeln!(
            f,
            "confusion: tn={} fp={} fn={} tp={}",
            self.confusion.true_negative,
            self.confusion.false_positive,
            self.confusion.false_negative,
            self.confusion.true_positive
        )
    }
}

/// Run the detector over every record and score its predictions.
pub fn evaluate(
    detector: &FraudDetector,
    dataset: &Dataset,
) -> Result<ClassificationReport, InferenceError> {
    let start_time = Instant::now();
    let mut confusion = ConfusionMatrix::default();

    for (record, truth) in dataset.iter() {
        let predicted = detector.predict_record(record)?.prediction;
        confusion.record(truth, predicted);
    }

    let report = ClassificationReport::from_confusion(confusion);
    info!(
        model = %detector.model_name(),
        rows = dataset.len(),
        accuracy = report.accuracy,
        fraud_recall = report.fraud.recall,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Evaluation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureVector;
    use crate::models::Classifier;
    use crate::types::TransactionRecord;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_report_metrics() {
        let confusion = ConfusionMatrix {
            true_negative: 90,
            false_positive: 2,
            false_negative: 3,
            true_positive: 5,
        };
        let report = ClassificationReport::from_confusion(confusion);

        assert!(close(report.fraud.precision, 5.0 / 7.0));
        assert!(close(report.fraud.recall, 5.0 / 8.0));
        assert_eq!(report.fraud.support, 8);
        assert!(close(report.legitimate.precision, 90.0 / 93.0));
        assert!(close(report.legitimate.recall, 90.0 / 92.0));
        assert_eq!(report.legitimate.support, 92);
        assert!(close(report.accuracy, 0.95));

        let p = 5.0 / 7.0;
        let r = 5.0 / 8.0;
        assert!(close(report.fraud.f1, 2.0 * p * r / (p + r)));
        assert!(close(
            report.macro_avg.recall,
            (90.0 / 92.0 + 5.0 / 8.0) / 2.0
        ));
        assert!(close(
            report.weighted_avg.recall,
            (90.0 / 92.0 * 92.0 + 5.0 / 8.0 * 8.0) / 100.0
        ));
    }

    #[test]
    fn test_zero_division_is_zero() {
        let confusion = ConfusionMatrix::from_pairs(vec![
            (Label::Legitimate, Label::Legitimate),
            (Label::Fraud, Label::Legitimate),
        ]);
        let report = ClassificationReport::from_confusion(confusion);
        assert_eq!(report.fraud.precision, 0.0);
        assert_eq!(report.fraud.recall, 0.0);
        assert_eq!(report.fraud.f1, 0.0);
        assert!(close(report.accuracy, 0.5));

        let empty = ClassificationReport::from_confusion(ConfusionMatrix::default());
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.weighted_avg.f1, 0.0);
    }

    #[test]
    fn test_report_renders() {
        let confusion = ConfusionMatrix::from_pairs(vec![
            (Label::Legitimate, Label::Legitimate),
            (Label::Fraud, Label::Fraud),
        ]);
        let text = ClassificationReport::from_confusion(confusion).to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("tn=1 fp=0 fn=0 tp=1"));
    }

    #[test]
    fn test_evaluate_runs_detector() {
        struct AmountRule;
        impl Classifier for AmountRule {
            fn classify(&self, features: &FeatureVector) -> Result<Label, InferenceError> {
                Ok(Label::from_probability(features.as_slice()[1] as f64, 500.0))
            }
            fn name(&self) -> &str {
                "amount-rule"
            }
        }

        let mut dataset = Dataset::new();
        for (amount, label) in [
            (10.0, Label::Legitimate),
            (900.0, Label::Fraud),
            (1200.0, Label::Legitimate),
            (20.0, Label::Fraud),
        ] {
            dataset.push(TransactionRecord::neutral(amount).unwrap(), label);
        }

        let detector = FraudDetector::with_classifier(AmountRule);
        let report = evaluate(&detector, &dataset).unwrap();
        assert_eq!(
            report.confusion,
            ConfusionMatrix {
                true_negative: 1,
                false_positive: 1,
                false_negative: 1,
                true_positive: 1,
            }
        );
        assert!(close(report.accuracy, 0.5));
    }
}
