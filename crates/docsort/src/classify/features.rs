use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use super::domain::DocumentRecord;

/// Function words ignored during keyword extraction. The corpus is mostly
/// French business documents with occasional English attachments, so both
/// lists are carried.
const STOPWORDS: &[&str] = &[
    // French
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "en", "au", "aux", "ce", "cette",
    "ces", "son", "sa", "ses", "leur", "leurs", "mon", "ma", "mes", "ton", "ta", "tes", "notre",
    "nos", "votre", "vos", "qui", "que", "quoi", "dont", "où", "pour", "par", "sur", "sous",
    "avec", "sans", "dans", "entre", "vers", "chez", "il", "elle", "on", "nous", "vous", "ils",
    "elles", "je", "tu", "est", "sont", "être", "avoir", "fait", "faire", "dit", "dire", "peut",
    "pouvoir", "tout", "tous", "toute", "toutes", "autre", "autres", "même", "aussi", "plus",
    "moins", "très", "bien", "mal", "peu", "trop", "comme", "mais", "ou", "donc", "car", "ni",
    "si", "non", "oui", "pas", "ne", "se", "lui", "y", "ci", "là", "ici", "cela", "ceci",
    "celui", "celle", "ceux", "celles", "quelque", "chaque", "quel", "quelle", "quels",
    "quelles", "ainsi", "alors", "après", "avant", "encore", "déjà", "toujours", "jamais",
    "souvent", "parfois", "depuis", "jusqu",
    // English
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may",
    "might", "must", "shall", "can", "need", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "each", "few", "more", "most", "other", "some", "such", "no", "not", "only", "own",
    "same", "so", "than", "too", "very", "just", "this", "that", "these", "those",
];

const DEFAULT_KEYWORD_LIMIT: usize = 20;
const MIN_TOKEN_CHARS: usize = 3;

/// Named amount bucket. Boundaries are upper-inclusive: exactly 100 lands in
/// `0-100`, exactly 500 in `100-500`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountRange {
    #[serde(rename = "0-100")]
    UpTo100,
    #[serde(rename = "100-500")]
    UpTo500,
    #[serde(rename = "500-1k")]
    UpTo1k,
    #[serde(rename = "1k-5k")]
    UpTo5k,
    #[serde(rename = "5k-10k")]
    UpTo10k,
    #[serde(rename = "10k+")]
    Over10k,
}

impl AmountRange {
    pub const fn label(self) -> &'static str {
        match self {
            AmountRange::UpTo100 => "0-100",
            AmountRange::UpTo500 => "100-500",
            AmountRange::UpTo1k => "500-1k",
            AmountRange::UpTo5k => "1k-5k",
            AmountRange::UpTo10k => "5k-10k",
            AmountRange::Over10k => "10k+",
        }
    }

    /// Bucket an amount by absolute value.
    pub fn bucket(amount: f64) -> Self {
        let amount = amount.abs();
        if amount <= 100.0 {
            AmountRange::UpTo100
        } else if amount <= 500.0 {
            AmountRange::UpTo500
        } else if amount <= 1_000.0 {
            AmountRange::UpTo1k
        } else if amount <= 5_000.0 {
            AmountRange::UpTo5k
        } else if amount <= 10_000.0 {
            AmountRange::UpTo10k
        } else {
            AmountRange::Over10k
        }
    }
}

/// Coarse file-type class used as a weak similarity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypeClass {
    Pdf,
    Image,
    Word,
    Excel,
    Other,
}

impl FileTypeClass {
    pub const fn label(self) -> &'static str {
        match self {
            FileTypeClass::Pdf => "pdf",
            FileTypeClass::Image => "image",
            FileTypeClass::Word => "word",
            FileTypeClass::Excel => "excel",
            FileTypeClass::Other => "other",
        }
    }
}

/// Normalized, comparable fingerprint of a document. Derived on demand, never
/// persisted as authoritative state, and always reproducible from the same
/// `DocumentRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub correspondent_id: Option<i64>,
    pub document_type_id: Option<i64>,
    pub amount_range: Option<AmountRange>,
    /// Ranked by frequency then first occurrence; capped at the extractor's
    /// keyword limit; duplicates removed.
    pub keywords: Vec<String>,
    pub tag_ids: BTreeSet<i64>,
    pub file_type: FileTypeClass,
    /// Digest of the normalized content, used only as an equality signal.
    pub content_hash: String,
}

/// Stateless feature derivation. The only dial is the keyword cap, injected
/// so tests can pin small limits.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    keyword_limit: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_LIMIT)
    }
}

impl FeatureExtractor {
    pub fn new(keyword_limit: usize) -> Self {
        Self {
            keyword_limit: keyword_limit.max(1),
        }
    }

    pub fn extract(&self, document: &DocumentRecord) -> FeatureSet {
        let content = document.content.as_deref().unwrap_or("");

        FeatureSet {
            correspondent_id: document.correspondent_id,
            document_type_id: document.document_type_id,
            amount_range: document.amount.map(AmountRange::bucket),
            keywords: self.extract_keywords(content, self.keyword_limit),
            tag_ids: document.tag_ids.clone(),
            file_type: classify_file_type(
                document.mime_type.as_deref(),
                document.filename.as_deref(),
            ),
            content_hash: content_hash(content),
        }
    }

    /// Tokenize on non-alphanumeric boundaries, drop short tokens and stop
    /// words, rank by (frequency desc, first occurrence asc), cap at `limit`.
    pub fn extract_keywords(&self, text: &str, limit: usize) -> Vec<String> {
        if text.is_empty() || limit == 0 {
            return Vec::new();
        }

        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
            .collect();

        let mut occurrences: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, token) in normalized.split_whitespace().enumerate() {
            if token.chars().count() < MIN_TOKEN_CHARS || STOPWORDS.contains(&token) {
                continue;
            }
            let entry = occurrences.entry(token).or_insert((0, position));
            entry.0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = occurrences.into_iter().collect();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(token, _)| token.to_string())
            .collect()
    }
}

/// MIME type wins when present; otherwise the filename extension decides.
/// Anything outside the fixed lookup lands in `Other`.
pub fn classify_file_type(mime_type: Option<&str>, filename: Option<&str>) -> FileTypeClass {
    if let Some(raw) = mime_type.filter(|raw| !raw.trim().is_empty()) {
        return match raw.trim().parse::<mime::Mime>() {
            Ok(parsed) => classify_mime(&parsed),
            Err(_) => FileTypeClass::Other,
        };
    }

    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| classify_extension(&extension.to_ascii_lowercase()))
        .unwrap_or(FileTypeClass::Other)
}

fn classify_mime(parsed: &mime::Mime) -> FileTypeClass {
    if *parsed == mime::APPLICATION_PDF {
        return FileTypeClass::Pdf;
    }
    if parsed.type_() == mime::IMAGE {
        return FileTypeClass::Image;
    }

    match parsed.essence_str() {
        "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            FileTypeClass::Word
        }
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            FileTypeClass::Excel
        }
        _ => FileTypeClass::Other,
    }
}

fn classify_extension(extension: &str) -> FileTypeClass {
    match extension {
        "pdf" => FileTypeClass::Pdf,
        "jpg" | "jpeg" | "png" | "gif" | "tiff" => FileTypeClass::Image,
        "doc" | "docx" => FileTypeClass::Word,
        "xls" | "xlsx" => FileTypeClass::Excel,
        _ => FileTypeClass::Other,
    }
}

/// Stable digest over normalized content: lowercased, punctuation stripped,
/// whitespace collapsed. Two scans of the same letter differ only in noise
/// and hash identically.
pub fn content_hash(content: &str) -> String {
    let normalized: String = content
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    format!("{:016x}", xxh3_64(collapsed.as_bytes()))
}
