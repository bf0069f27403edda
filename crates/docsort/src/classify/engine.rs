use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    AttributeField, AttributeValue, Correction, DocumentRecord, Suggestion, Vote, VoteSource,
};
use super::features::FeatureExtractor;
use super::rules::{self, AttributionRule};
use super::similarity::{SimilarityScorer, SimilarityWeights, WeightError};

/// Engine dials, validated once at construction. Defaults follow the
/// production tuning; tests inject alternates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub weights: SimilarityWeights,
    /// Minimum similarity before a corpus document may vote.
    pub similarity_threshold: f64,
    /// Weight of one firing rule's vote. Kept at or above 1.0 (the ceiling of
    /// a similarity vote) so explicit admin intent always dominates inference.
    pub rule_vote_weight: f64,
    pub keyword_limit: usize,
    /// Most recent corrections considered per predicted field.
    pub corpus_window: usize,
    /// Winners below this confidence are reported as skipped, not suggested.
    pub suggestion_threshold: f64,
    /// Winners at or above this confidence may be applied without review.
    pub auto_apply_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: SimilarityWeights::default(),
            similarity_threshold: 0.3,
            rule_vote_weight: 2.0,
            keyword_limit: 20,
            corpus_window: 200,
            suggestion_threshold: 0.5,
            auto_apply_threshold: 0.85,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        self.weights.validate()?;

        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("suggestion_threshold", self.suggestion_threshold),
            ("auto_apply_threshold", self.auto_apply_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EngineConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.auto_apply_threshold < self.suggestion_threshold {
            return Err(EngineConfigError::ThresholdOrdering);
        }

        if !self.rule_vote_weight.is_finite() || self.rule_vote_weight < 1.0 {
            return Err(EngineConfigError::RuleVoteWeight {
                value: self.rule_vote_weight,
            });
        }

        if self.keyword_limit == 0 {
            return Err(EngineConfigError::ZeroLimit {
                name: "keyword_limit",
            });
        }
        if self.corpus_window == 0 {
            return Err(EngineConfigError::ZeroLimit {
                name: "corpus_window",
            });
        }

        Ok(())
    }
}

/// Misconfigured engine. Raised at construction, never while classifying a
/// document.
#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    #[error(transparent)]
    Weights(#[from] WeightError),
    #[error("{name} must lie in [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("auto_apply_threshold must be at least suggestion_threshold")]
    ThresholdOrdering,
    #[error("rule_vote_weight must be >= 1.0, got {value}")]
    RuleVoteWeight { value: f64 },
    #[error("{name} must be at least 1")]
    ZeroLimit { name: &'static str },
}

/// Merges explicit rule matches with similarity-derived evidence into ranked,
/// confidence-scored attribute suggestions. Stateless between calls; one
/// instance can serve concurrent classification passes.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    scorer: SimilarityScorer,
}

impl AttributionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineConfigError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.keyword_limit);
        let scorer = SimilarityScorer::new(config.weights.clone())?;

        Ok(Self {
            config,
            extractor,
            scorer,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Produce ranked suggestions for the document, one per predicted field,
    /// ordered by descending confidence. Fields without any supporting
    /// evidence are absent rather than reported at zero confidence.
    pub fn suggest(
        &self,
        document: &DocumentRecord,
        rules: &[AttributionRule],
        corpus: &[Correction],
    ) -> Vec<Suggestion> {
        let mut votes = self.rule_votes(document, rules);
        votes.extend(self.similarity_votes(document, corpus));
        aggregate(votes)
    }

    fn rule_votes(&self, document: &DocumentRecord, rules: &[AttributionRule]) -> Vec<Vote> {
        let mut votes = Vec::new();

        for rule_match in rules::evaluate_rules(rules, document) {
            for action in &rule_match.actions {
                let (field, value) = action.vote_target();
                votes.push(Vote {
                    field,
                    value,
                    weight: self.config.rule_vote_weight,
                    source: VoteSource::Rule {
                        rule_id: rule_match.rule_id,
                        rule_name: rule_match.rule_name.clone(),
                    },
                });
            }
        }

        votes
    }

    fn similarity_votes(&self, document: &DocumentRecord, corpus: &[Correction]) -> Vec<Vote> {
        let target = self.extractor.extract(document);
        let mut votes = Vec::new();
        let mut seen_per_field: BTreeMap<AttributeField, usize> = BTreeMap::new();

        for correction in recent_first(corpus) {
            // Never let a document vote for itself.
            if correction.document_id.is_some() && correction.document_id == document.id {
                continue;
            }

            if !correction.confidence.is_finite()
                || correction.confidence <= 0.0
                || correction.confidence > 1.0
            {
                warn!(
                    document_id = ?correction.document_id,
                    field = correction.field.label(),
                    confidence = correction.confidence,
                    "skipping corpus entry with invalid confidence"
                );
                continue;
            }

            let seen = seen_per_field.entry(correction.field).or_insert(0);
            if *seen >= self.config.corpus_window {
                continue;
            }
            *seen += 1;

            let score = self.scorer.score(&target, &correction.features);
            if score <= self.config.similarity_threshold {
                continue;
            }

            votes.push(Vote {
                field: correction.field,
                value: correction.new_value.clone(),
                weight: score * correction.confidence,
                source: VoteSource::Similarity {
                    document_id: correction.document_id,
                    score,
                },
            });
        }

        votes
    }
}

/// Corpus entries ordered newest first so the window keeps the most recent
/// ground truth regardless of how the caller sorted its fetch.
fn recent_first(corpus: &[Correction]) -> Vec<&Correction> {
    let mut ordered: Vec<&Correction> = corpus.iter().collect();
    ordered.sort_by(|a, b| b.corrected_at.cmp(&a.corrected_at));
    ordered
}

/// Group votes per (field, candidate), sum weights, and crown the candidate
/// with the strictly greatest total. Exact ties resolve to the smallest
/// candidate in its natural order, which the BTreeMap iteration provides.
pub(crate) fn aggregate(votes: Vec<Vote>) -> Vec<Suggestion> {
    let mut tallies: BTreeMap<AttributeField, BTreeMap<AttributeValue, (f64, Vec<Vote>)>> =
        BTreeMap::new();

    for vote in votes {
        let (weight, supporters) = tallies
            .entry(vote.field)
            .or_default()
            .entry(vote.value.clone())
            .or_insert_with(|| (0.0, Vec::new()));
        *weight += vote.weight;
        supporters.push(vote);
    }

    let mut suggestions = Vec::new();

    for (field, candidates) in tallies {
        let total: f64 = candidates.values().map(|(weight, _)| *weight).sum();
        if total <= 0.0 {
            continue;
        }

        let mut winner: Option<(AttributeValue, f64, Vec<Vote>)> = None;
        for (value, (weight, supporters)) in candidates {
            let beats_current = winner
                .as_ref()
                .map_or(true, |(_, best_weight, _)| weight > *best_weight);
            if beats_current {
                winner = Some((value, weight, supporters));
            }
        }

        if let Some((value, weight, supporting_votes)) = winner {
            suggestions.push(Suggestion {
                field,
                value,
                confidence: (weight / total).min(1.0),
                supporting_votes,
            });
        }
    }

    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.field.cmp(&b.field))
    });

    suggestions
}
