/// Normalize a field or source code coming out of a legacy export: strip BOM
/// and zero-width characters, collapse whitespace, lowercase, and join words
/// with underscores so `" Document  Type "` matches `document_type`.
pub(crate) fn normalize_code(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[cfg(test)]
pub(crate) fn normalize_for_tests(value: &str) -> String {
    normalize_code(value)
}
