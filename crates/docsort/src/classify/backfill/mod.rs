//! Importer for legacy classification exports. Seeds the similarity corpus
//! from a CSV of historical field corrections plus the document attributes
//! needed to rebuild each fingerprint.

mod mapping;
mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;

use crate::classify::domain::Correction;
use crate::classify::features::FeatureExtractor;

#[derive(Debug)]
pub enum BackfillImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for BackfillImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackfillImportError::Io(err) => {
                write!(f, "failed to read classification export: {}", err)
            }
            BackfillImportError::Csv(err) => write!(f, "invalid classification CSV data: {}", err),
        }
    }
}

impl std::error::Error for BackfillImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackfillImportError::Io(err) => Some(err),
            BackfillImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for BackfillImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BackfillImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct CorrectionBackfillImporter;

impl CorrectionBackfillImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        extractor: &FeatureExtractor,
    ) -> Result<Vec<Correction>, BackfillImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, extractor)
    }

    /// Parse the export and produce storable corrections. Rows with unknown
    /// field codes, missing values, missing timestamps, or out-of-range
    /// confidence are dropped; one bad row never sinks the import.
    pub fn from_reader<R: Read>(
        reader: R,
        extractor: &FeatureExtractor,
    ) -> Result<Vec<Correction>, BackfillImportError> {
        let mut corrections = Vec::new();

        for record in parser::parse_records(reader)? {
            let Some(field) = mapping::field_for_normalized(&record.normalized_field) else {
                continue;
            };
            let Some(value) = record.value.as_deref() else {
                continue;
            };
            let Some(corrected_at) = record.corrected_at else {
                continue;
            };

            let confidence = record.confidence.unwrap_or(1.0);
            if !confidence.is_finite() || confidence <= 0.0 || confidence > 1.0 {
                continue;
            }

            corrections.push(Correction {
                document_id: record.document.id,
                field,
                old_value: record.previous_value.as_deref().map(mapping::parse_value),
                new_value: mapping::parse_value(value),
                source: mapping::source_for_normalized(&record.normalized_source),
                confidence,
                corrected_at,
                features: extractor.extract(&record.document),
            });
        }

        Ok(corrections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::domain::{AttributeField, AttributeValue, CorrectionSource, DocumentId};
    use chrono::NaiveDate;
    use std::io::Cursor;

    const HEADER: &str = "Document ID,Field,Value,Previous Value,Source,Confidence,Corrected At,\
Correspondent ID,Document Type ID,Amount,Mime Type,Filename,Tags,Content\n";

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::default()
    }

    #[test]
    fn parse_datetime_supports_rfc3339_and_date_strings() {
        let rfc = parser::parse_datetime_for_tests("2025-06-12T09:30:00Z").expect("parse rfc");
        assert_eq!(
            rfc,
            NaiveDate::from_ymd_opt(2025, 6, 12)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );

        let sql = parser::parse_datetime_for_tests("2025-06-12 09:30:00").expect("parse sql");
        assert_eq!(sql, rfc);

        let date = parser::parse_datetime_for_tests("2025-06-30").expect("parse date");
        assert_eq!(
            date,
            NaiveDate::from_ymd_opt(2025, 6, 30)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );

        assert!(parser::parse_datetime_for_tests("  ").is_none());
        assert!(parser::parse_datetime_for_tests("not-a-date").is_none());
    }

    #[test]
    fn normalize_code_removes_whitespace_and_case() {
        let source = "\u{feff}Document  Type ";
        assert_eq!(normalizer::normalize_for_tests(source), "document_type");
    }

    #[test]
    fn mapping_recognizes_known_field_codes() {
        assert_eq!(
            mapping::lookup_for_tests("Correspondent ID"),
            Some(AttributeField::Correspondent)
        );
        assert_eq!(
            mapping::lookup_for_tests("Document Type"),
            Some(AttributeField::DocumentType)
        );
        assert_eq!(mapping::lookup_for_tests("Tags"), Some(AttributeField::Tag));
        assert_eq!(mapping::lookup_for_tests("Compte Comptable"), None);
    }

    #[test]
    fn importer_builds_corrections_with_fresh_features() {
        let csv = format!(
            "{HEADER}41,correspondent,12,,manual,1.0,2025-06-12T09:30:00Z,12,3,450.00,application/pdf,facture.pdf,7;9,Facture mensuelle services informatiques\n"
        );

        let corrections = CorrectionBackfillImporter::from_reader(Cursor::new(csv), &extractor())
            .expect("import succeeds");

        assert_eq!(corrections.len(), 1);
        let correction = &corrections[0];
        assert_eq!(correction.document_id, Some(DocumentId(41)));
        assert_eq!(correction.field, AttributeField::Correspondent);
        assert_eq!(correction.new_value, AttributeValue::Id(12));
        assert_eq!(correction.source, CorrectionSource::Manual);
        assert_eq!(correction.features.correspondent_id, Some(12));
        assert_eq!(
            correction.features.file_type.label(),
            "pdf",
            "mime column should drive the fingerprint"
        );
        assert_eq!(
            correction.features.tag_ids,
            [7, 9].into_iter().collect()
        );
        assert!(correction
            .features
            .keywords
            .iter()
            .any(|keyword| keyword == "facture"));
    }

    #[test]
    fn importer_skips_unknown_fields_and_incomplete_rows() {
        let csv = format!(
            "{HEADER}1,compte_comptable,606300,,manual,1.0,2025-06-12,,,,,,,\n\
2,correspondent,,,manual,1.0,2025-06-12,,,,,,,\n\
3,correspondent,12,,manual,1.0,,,,,,,,\n\
4,correspondent,12,,manual,1.7,2025-06-12,,,,,,,\n\
5,correspondent,12,,manual,1.0,2025-06-12,,,,,,,\n"
        );

        let corrections = CorrectionBackfillImporter::from_reader(Cursor::new(csv), &extractor())
            .expect("import succeeds");

        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].document_id, Some(DocumentId(5)));
    }

    #[test]
    fn importer_defaults_source_and_confidence() {
        let csv = format!("{HEADER}6,tags,7,,,,2025-06-12,,,,,,,\n");

        let corrections = CorrectionBackfillImporter::from_reader(Cursor::new(csv), &extractor())
            .expect("import succeeds");

        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].source, CorrectionSource::Manual);
        assert_eq!(corrections[0].confidence, 1.0);
        assert_eq!(corrections[0].field, AttributeField::Tag);
    }

    #[test]
    fn importer_from_path_propagates_io_errors() {
        let error = CorrectionBackfillImporter::from_path("./does-not-exist.csv", &extractor())
            .expect_err("expected io error");

        match error {
            BackfillImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
