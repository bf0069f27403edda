use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::features::FeatureSet;

/// Identifier wrapper for documents flowing through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

/// Snapshot of a document as produced by ingestion/OCR. Read-only to the
/// engine; absent fields stay `None` and are never confused with
/// present-but-empty values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub correspondent_id: Option<i64>,
    #[serde(default)]
    pub document_type_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Extracted OCR text. `None` means extraction never ran; `Some("")`
    /// means it ran and found nothing.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub tag_ids: BTreeSet<i64>,
    #[serde(default)]
    pub doc_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl Default for DocumentRecord {
    fn default() -> Self {
        Self {
            id: None,
            title: None,
            correspondent_id: None,
            document_type_id: None,
            amount: None,
            currency: None,
            content: None,
            mime_type: None,
            filename: None,
            tag_ids: BTreeSet::new(),
            doc_date: None,
            created_at: None,
            custom_fields: BTreeMap::new(),
        }
    }
}

/// Attributes the engine knows how to predict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttributeField {
    Correspondent,
    DocumentType,
    Tag,
}

impl AttributeField {
    pub const fn label(self) -> &'static str {
        match self {
            AttributeField::Correspondent => "correspondent",
            AttributeField::DocumentType => "document_type",
            AttributeField::Tag => "tag",
        }
    }

    pub const ALL: [AttributeField; 3] = [
        AttributeField::Correspondent,
        AttributeField::DocumentType,
        AttributeField::Tag,
    ];
}

/// Candidate value for a predicted attribute. Ids cover the reference fields
/// (correspondents, types, tags); text covers free-form values arriving from
/// legacy correction exports. The `Ord` impl doubles as the documented
/// tie-break order: numeric ids ascending, then text lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Id(i64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Id(id) => write!(f, "{id}"),
            AttributeValue::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Where a correction (or an audited change) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionSource {
    Manual,
    Rules,
    Ml,
}

impl CorrectionSource {
    pub const fn label(self) -> &'static str {
        match self {
            CorrectionSource::Manual => "manual",
            CorrectionSource::Rules => "rules",
            CorrectionSource::Ml => "ml",
        }
    }
}

/// One historical ground-truth record: a user (or the engine itself) fixed an
/// attribute on a document. The feature fingerprint is captured at recording
/// time so the similarity corpus never re-reads documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    pub field: AttributeField,
    #[serde(default)]
    pub old_value: Option<AttributeValue>,
    pub new_value: AttributeValue,
    pub source: CorrectionSource,
    /// Source confidence in [0,1]; manual corrections carry 1.0.
    pub confidence: f64,
    pub corrected_at: NaiveDateTime,
    pub features: FeatureSet,
}

/// Single piece of evidence behind a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub field: AttributeField,
    pub value: AttributeValue,
    pub weight: f64,
    pub source: VoteSource,
}

/// Provenance of a vote, kept on the suggestion for transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteSource {
    Rule {
        rule_id: i64,
        rule_name: String,
    },
    Similarity {
        document_id: Option<DocumentId>,
        score: f64,
    },
}

/// Ranked prediction for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub field: AttributeField,
    pub value: AttributeValue,
    /// Winning candidate's share of the total vote weight for this field.
    pub confidence: f64,
    pub supporting_votes: Vec<Vote>,
}
