use std::collections::BTreeSet;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use super::normalizer::normalize_code;
use crate::classify::domain::{DocumentId, DocumentRecord};

#[derive(Debug)]
pub(crate) struct BackfillRecord {
    pub(crate) normalized_field: String,
    pub(crate) value: Option<String>,
    pub(crate) previous_value: Option<String>,
    pub(crate) normalized_source: String,
    pub(crate) confidence: Option<f64>,
    pub(crate) corrected_at: Option<NaiveDateTime>,
    pub(crate) document: DocumentRecord,
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<BackfillRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for record in csv_reader.deserialize::<BackfillRow>() {
        let row = record?;
        records.push(BackfillRecord {
            normalized_field: normalize_code(&row.field),
            value: row.value.clone(),
            previous_value: row.previous_value.clone(),
            normalized_source: row
                .source
                .as_deref()
                .map(normalize_code)
                .unwrap_or_default(),
            confidence: row.confidence.as_deref().and_then(parse_confidence),
            corrected_at: row.corrected_at.as_deref().and_then(parse_datetime),
            document: row.into_document(),
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct BackfillRow {
    #[serde(rename = "Document ID", default, deserialize_with = "empty_string_as_none")]
    document_id: Option<String>,
    #[serde(rename = "Field")]
    field: String,
    #[serde(rename = "Value", default, deserialize_with = "empty_string_as_none")]
    value: Option<String>,
    #[serde(
        rename = "Previous Value",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    previous_value: Option<String>,
    #[serde(rename = "Source", default, deserialize_with = "empty_string_as_none")]
    source: Option<String>,
    #[serde(rename = "Confidence", default, deserialize_with = "empty_string_as_none")]
    confidence: Option<String>,
    #[serde(
        rename = "Corrected At",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    corrected_at: Option<String>,
    #[serde(
        rename = "Correspondent ID",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    correspondent_id: Option<String>,
    #[serde(
        rename = "Document Type ID",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    document_type_id: Option<String>,
    #[serde(rename = "Amount", default, deserialize_with = "empty_string_as_none")]
    amount: Option<String>,
    #[serde(rename = "Mime Type", default, deserialize_with = "empty_string_as_none")]
    mime_type: Option<String>,
    #[serde(rename = "Filename", default, deserialize_with = "empty_string_as_none")]
    filename: Option<String>,
    #[serde(rename = "Tags", default, deserialize_with = "empty_string_as_none")]
    tags: Option<String>,
    #[serde(rename = "Content", default, deserialize_with = "empty_string_as_none")]
    content: Option<String>,
}

impl BackfillRow {
    /// Rebuild the classified document's snapshot from the export columns so
    /// the importer can derive a fresh feature fingerprint.
    fn into_document(self) -> DocumentRecord {
        DocumentRecord {
            id: self
                .document_id
                .as_deref()
                .and_then(|raw| raw.trim().parse::<i64>().ok())
                .map(DocumentId),
            correspondent_id: self
                .correspondent_id
                .as_deref()
                .and_then(|raw| raw.trim().parse::<i64>().ok()),
            document_type_id: self
                .document_type_id
                .as_deref()
                .and_then(|raw| raw.trim().parse::<i64>().ok()),
            amount: self
                .amount
                .as_deref()
                .and_then(|raw| raw.trim().parse::<f64>().ok()),
            content: self.content,
            mime_type: self.mime_type,
            filename: self.filename,
            tag_ids: self
                .tags
                .as_deref()
                .map(parse_tag_ids)
                .unwrap_or_default(),
            ..DocumentRecord::default()
        }
    }
}

/// Tag columns are exported as `;`-joined ids (`12;40;7`).
fn parse_tag_ids(raw: &str) -> BTreeSet<i64> {
    raw.split(';')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

fn parse_confidence(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

#[cfg(test)]
pub(crate) fn parse_datetime_for_tests(value: &str) -> Option<NaiveDateTime> {
    parse_datetime(value)
}
