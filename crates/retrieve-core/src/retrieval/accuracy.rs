//! Top-k retrieval accuracy.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// Fraction of queries whose ground-truth class appears among the first `k`
/// matched classes.
///
/// Rows shorter than `k` are used as-is. Queries without a ground-truth class
/// are left out of both numerator and denominator; `Ok(None)` means no query
/// could be scored.
pub fn topk_accuracy<T: PartialEq>(
    ground_truth: &[Option<T>],
    matched: &[Vec<Option<T>>],
    k: usize,
) -> Result<Option<f64>, RetrievalError> {
    if k == 0 {
        return Err(RetrievalError::InvalidK(k));
    }
    if ground_truth.len() != matched.len() {
        return Err(RetrievalError::LengthMismatch {
            ground_truth: ground_truth.len(),
            matched: matched.len(),
        });
    }

    let mut total = 0usize;
    let mut correct = 0usize;
    for (gt, row) in ground_truth.iter().zip(matched) {
        let Some(gt) = gt else { continue };
        total += 1;
        if row
            .iter()
            .take(k)
            .any(|m| m.as_ref().is_some_and(|m| m == gt))
        {
            correct += 1;
        }
    }

    if total == 0 {
        return Ok(None);
    }
    Ok(Some(correct as f64 / total as f64))
}

/// Accuracy at one cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopK {
    pub k: usize,
    pub accuracy: f64,
}

/// Accuracies of one retrieval run at every reported cut-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Number of labelled queries scored
    pub evaluated: usize,
    pub entries: Vec<TopK>,
}

impl AccuracyReport {
    /// Score `matched` at every `k` in `ks`. `Ok(None)` when nothing is labelled.
    pub fn compute<T: PartialEq>(
        ground_truth: &[Option<T>],
        matched: &[Vec<Option<T>>],
        ks: &[usize],
    ) -> Result<Option<Self>, RetrievalError> {
        let evaluated = ground_truth.iter().filter(|g| g.is_some()).count();
        let mut entries = Vec::with_capacity(ks.len());
        for &k in ks {
            match topk_accuracy(ground_truth, matched, k)? {
                Some(accuracy) => entries.push(TopK { k, accuracy }),
                None => return Ok(None),
            }
        }
        Ok(Some(Self { evaluated, entries }))
    }

    /// Accuracy at `k`, if it was reported.
    pub fn at(&self, k: usize) -> Option<f64> {
        self.entries.iter().find(|e| e.k == k).map(|e| e.accuracy)
    }
}
