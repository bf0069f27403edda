use super::common::*;
use crate::classify::domain::DocumentRecord;
use crate::classify::features::{FeatureExtractor, FeatureSet, FileTypeClass};
use crate::classify::similarity::{SimilarityScorer, SimilarityWeights, WeightError};

fn scorer() -> SimilarityScorer {
    SimilarityScorer::new(SimilarityWeights::default()).expect("default weights are valid")
}

fn features_of(document: &DocumentRecord) -> FeatureSet {
    FeatureExtractor::default().extract(document)
}

#[test]
fn identical_feature_sets_score_exactly_one() {
    let scorer = scorer();

    let invoice = features_of(&invoice_document());
    assert_eq!(scorer.score(&invoice, &invoice), 1.0);

    // Reflexivity holds even for a featureless document.
    let empty = features_of(&DocumentRecord::default());
    assert_eq!(scorer.score(&empty, &empty), 1.0);
}

#[test]
fn score_is_symmetric() {
    let scorer = scorer();
    let a = features_of(&invoice_document());
    let b = features_of(&classified_invoice(41, 12));

    assert_eq!(scorer.score(&a, &b), scorer.score(&b, &a));
}

#[test]
fn documents_differing_in_every_signal_score_below_threshold() {
    let scorer = scorer();

    let invoice = features_of(&classified_invoice(41, 12));
    let photo = features_of(&DocumentRecord {
        correspondent_id: Some(99),
        document_type_id: Some(8),
        amount: Some(15.0),
        content: Some("Photo chantier toiture nord".to_string()),
        mime_type: Some("image/jpeg".to_string()),
        tag_ids: [50, 51].into_iter().collect(),
        ..DocumentRecord::default()
    });

    assert!(scorer.score(&invoice, &photo) < 0.3);
}

#[test]
fn near_duplicate_invoices_score_high() {
    let scorer = scorer();

    // Same correspondent, type, bucket, tags and file type; four keywords
    // sharing three gives a Jaccard of 3/5.
    let base = FeatureSet {
        correspondent_id: Some(12),
        document_type_id: Some(3),
        amount_range: Some(crate::classify::features::AmountRange::UpTo1k),
        keywords: vec![
            "facture".to_string(),
            "consulting".to_string(),
            "maintenance".to_string(),
            "juin".to_string(),
        ],
        tag_ids: [3].into_iter().collect(),
        file_type: FileTypeClass::Pdf,
        content_hash: "aaaaaaaaaaaaaaaa".to_string(),
    };
    let other = FeatureSet {
        keywords: vec![
            "facture".to_string(),
            "consulting".to_string(),
            "maintenance".to_string(),
            "mai".to_string(),
        ],
        content_hash: "bbbbbbbbbbbbbbbb".to_string(),
        ..base.clone()
    };

    let score = scorer.score(&base, &other);
    assert!(score > 0.85, "expected a confident match, got {score}");
    assert!(score < 1.0);
}

#[test]
fn null_fields_contribute_nothing() {
    let scorer = scorer();

    // Both sides missing correspondent/type/amount and empty keyword/tag
    // sets: only the file-type component can score.
    let a = FeatureSet {
        correspondent_id: None,
        document_type_id: None,
        amount_range: None,
        keywords: Vec::new(),
        tag_ids: Default::default(),
        file_type: FileTypeClass::Pdf,
        content_hash: "aaaaaaaaaaaaaaaa".to_string(),
    };
    let b = FeatureSet {
        content_hash: "bbbbbbbbbbbbbbbb".to_string(),
        ..a.clone()
    };

    let score = scorer.score(&a, &b);
    assert!((score - 0.05).abs() < 1e-9, "only file_type should count, got {score}");
}

#[test]
fn keyword_overlap_scales_with_jaccard() {
    let scorer = scorer();

    let mut a = features_of(&DocumentRecord::default());
    let mut b = a.clone();
    a.keywords = vec!["facture".to_string(), "consulting".to_string()];
    b.keywords = vec!["facture".to_string(), "avoir".to_string()];
    // intersection 1, union 3, same file type
    let score = scorer.score(&a, &b);
    assert!((score - (0.15 / 3.0 + 0.05)).abs() < 1e-9, "got {score}");
}

#[test]
fn invalid_weight_tables_fail_at_construction() {
    let lopsided = SimilarityWeights {
        correspondent: 0.9,
        ..SimilarityWeights::default()
    };
    match SimilarityScorer::new(lopsided) {
        Err(WeightError::SumMismatch { .. }) => {}
        other => panic!("expected sum mismatch, got {other:?}"),
    }

    let negative = SimilarityWeights {
        correspondent: -0.1,
        document_type: 0.65,
        ..SimilarityWeights::default()
    };
    match SimilarityScorer::new(negative) {
        Err(WeightError::NegativeComponent) => {}
        other => panic!("expected negative component error, got {other:?}"),
    }
}
