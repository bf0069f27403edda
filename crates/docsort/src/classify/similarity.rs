use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::features::FeatureSet;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Relative importance of each fingerprint component. Injected rather than
/// hard-coded so alternate weightings stay testable; validated once at
/// scorer construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub correspondent: f64,
    pub document_type: f64,
    pub amount_range: f64,
    pub keywords: f64,
    pub tags: f64,
    pub file_type: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            correspondent: 0.30,
            document_type: 0.25,
            amount_range: 0.15,
            keywords: 0.15,
            tags: 0.10,
            file_type: 0.05,
        }
    }
}

impl SimilarityWeights {
    fn sum(&self) -> f64 {
        self.correspondent
            + self.document_type
            + self.amount_range
            + self.keywords
            + self.tags
            + self.file_type
    }

    /// Weights must be non-negative and sum to 1.0. A violation is a
    /// programmer error surfaced at startup, never per document.
    pub fn validate(&self) -> Result<(), WeightError> {
        let components = [
            self.correspondent,
            self.document_type,
            self.amount_range,
            self.keywords,
            self.tags,
            self.file_type,
        ];
        if components.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(WeightError::NegativeComponent);
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::SumMismatch { sum });
        }

        Ok(())
    }
}

/// Invalid similarity weight table.
#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("similarity weights must sum to 1.0, got {sum}")]
    SumMismatch { sum: f64 },
    #[error("similarity weights must be finite and non-negative")]
    NegativeComponent,
}

/// Weighted fingerprint comparison producing a score in [0, 1]. Symmetric by
/// construction; identical fingerprints short-circuit to exactly 1.0 (the
/// component table alone cannot reach 1.0 for a featureless document).
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
}

impl SimilarityScorer {
    pub fn new(weights: SimilarityWeights) -> Result<Self, WeightError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    pub fn score(&self, a: &FeatureSet, b: &FeatureSet) -> f64 {
        if a == b {
            return 1.0;
        }

        let mut score = 0.0;

        if both_equal(a.correspondent_id, b.correspondent_id) {
            score += self.weights.correspondent;
        }
        if both_equal(a.document_type_id, b.document_type_id) {
            score += self.weights.document_type;
        }
        if both_equal(a.amount_range, b.amount_range) {
            score += self.weights.amount_range;
        }

        let keywords_a: BTreeSet<&str> = a.keywords.iter().map(String::as_str).collect();
        let keywords_b: BTreeSet<&str> = b.keywords.iter().map(String::as_str).collect();
        score += self.weights.keywords * jaccard(&keywords_a, &keywords_b);

        let tags_a: BTreeSet<&i64> = a.tag_ids.iter().collect();
        let tags_b: BTreeSet<&i64> = b.tag_ids.iter().collect();
        score += self.weights.tags * jaccard(&tags_a, &tags_b);

        if a.file_type == b.file_type {
            score += self.weights.file_type;
        }

        score.min(1.0)
    }
}

fn both_equal<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    matches!((a, b), (Some(lhs), Some(rhs)) if lhs == rhs)
}

/// |intersection| / |union|; 0.0 when both sets are empty.
fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
