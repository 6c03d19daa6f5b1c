use std::fmt;

use serde::Serialize;

use crate::error::PipelineError;

/// Counts of (actual, predicted) pairs. Rows are actual labels, columns are
/// predicted labels, both over the sorted union of labels seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<u8>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[u8], predicted: &[u8]) -> Result<Self, PipelineError> {
        if actual.len() != predicted.len() {
            return Err(PipelineError::LabelMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        let mut labels: Vec<u8> = actual.iter().chain(predicted).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let k = labels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (a, p) in actual.iter().zip(predicted) {
            let (Ok(row), Ok(col)) = (labels.binary_search(a), labels.binary_search(p)) else {
                continue;
            };
            counts[row][col] += 1;
        }
        Ok(Self { labels, counts })
    }

    pub fn get(&self, actual: u8, predicted: u8) -> usize {
        let (Ok(row), Ok(col)) = (
            self.labels.binary_search(&actual),
            self.labels.binary_search(&predicted),
        ) else {
            return 0;
        };
        self.counts[row][col]
    }

    /// Non-zero misclassification cells as `(actual, predicted, count)`.
    pub fn off_diagonal(&self) -> Vec<(u8, u8, usize)> {
        let mut out = Vec::new();
        for (row, actual) in self.labels.iter().enumerate() {
            for (col, predicted) in self.labels.iter().enumerate() {
                let count = self.counts[row][col];
                if row != col && count > 0 {
                    out.push((*actual, *predicted, count));
                }
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}", "predicted")?;
        for label in &self.labels {
            write!(f, "{label:>6}")?;
        }
        writeln!(f)?;
        writeln!(f, "actual")?;
        for (row, label) in self.labels.iter().enumerate() {
            write!(f, "{label:<10}")?;
            for count in &self.counts[row] {
                write!(f, "{count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassPrecision {
    pub label: u8,
    pub precision: f64,
    pub support: usize,
    pub predicted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub samples: usize,
    pub accuracy: f64,
    pub weighted_precision: f64,
    pub per_class: Vec<ClassPrecision>,
    pub confusion: ConfusionMatrix,
}

/// Accuracy, support-weighted precision and the confusion matrix.
///
/// A class that is never predicted has precision 0.
pub fn evaluate(actual: &[u8], predicted: &[u8]) -> Result<Evaluation, PipelineError> {
    let confusion = ConfusionMatrix::from_labels(actual, predicted)?;
    if actual.is_empty() {
        return Err(PipelineError::EmptyEvaluation);
    }
    let n = actual.len();
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();

    let mut per_class = Vec::with_capacity(confusion.labels.len());
    let mut weighted = 0.0_f64;
    for (idx, label) in confusion.labels.iter().enumerate() {
        let support: usize = confusion.counts[idx].iter().sum();
        let predicted_n: usize = confusion.counts.iter().map(|row| row[idx]).sum();
        let hits = confusion.counts[idx][idx];
        let precision = if predicted_n == 0 {
            0.0
        } else {
            hits as f64 / predicted_n as f64
        };
        weighted += precision * support as f64;
        per_class.push(ClassPrecision {
            label: *label,
            precision,
            support,
            predicted: predicted_n,
        });
    }

    Ok(Evaluation {
        samples: n,
        accuracy: correct as f64 / n as f64,
        weighted_precision: weighted / n as f64,
        per_class,
        confusion,
    })
}
