use crate::classify::domain::{AttributeField, AttributeValue, CorrectionSource};

/// Map a normalized legacy field code onto the closed attribute enum. Codes
/// outside the map are skipped by the importer rather than guessed at.
pub(crate) fn field_for_normalized(code: &str) -> Option<AttributeField> {
    match code {
        "correspondent" | "correspondent_id" => Some(AttributeField::Correspondent),
        "document_type" | "document_type_id" | "doctype" => Some(AttributeField::DocumentType),
        "tag" | "tags" | "tag_id" => Some(AttributeField::Tag),
        _ => None,
    }
}

/// Legacy exports label the change origin inconsistently; unknown labels fall
/// back to `manual`, the conservative choice for training weight.
pub(crate) fn source_for_normalized(code: &str) -> CorrectionSource {
    match code {
        "rules" | "rule" => CorrectionSource::Rules,
        "ml" | "ai" | "machine" => CorrectionSource::Ml,
        _ => CorrectionSource::Manual,
    }
}

/// Numeric values become ids (the reference fields store integer keys), any
/// other value is carried as text.
pub(crate) fn parse_value(raw: &str) -> AttributeValue {
    match raw.trim().parse::<i64>() {
        Ok(id) => AttributeValue::Id(id),
        Err(_) => AttributeValue::Text(raw.trim().to_string()),
    }
}

#[cfg(test)]
pub(crate) fn lookup_for_tests(raw: &str) -> Option<AttributeField> {
    field_for_normalized(&super::normalizer::normalize_code(raw))
}
