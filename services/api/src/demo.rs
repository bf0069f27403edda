use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;

use docsort::classify::{
    AttributeField, AttributeValue, AttributionEngine, AttributionRule, ClassificationService,
    CorrectionBackfillImporter, CorrectionSource, DocumentId, DocumentRecord, FeatureExtractor,
    SkipReason, Suggestion, SuggestionReport,
};
use docsort::error::AppError;

use crate::infra::{default_engine_config, demo_rules, InMemoryAuditSink, InMemoryClassificationStore};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Let the demo auto-apply high-confidence winners instead of only
    /// listing them
    #[arg(long)]
    pub(crate) auto_apply: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SuggestArgs {
    /// Document record as JSON (fields: amount, content, mime_type, ...)
    #[arg(long)]
    pub(crate) document: PathBuf,
    /// Optional attribution rule set as JSON
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// Optional legacy classification export (CSV) to use as the corpus
    #[arg(long)]
    pub(crate) corrections: Option<PathBuf>,
}

pub(crate) fn run_suggest(args: SuggestArgs) -> Result<(), AppError> {
    let SuggestArgs {
        document,
        rules,
        corrections,
    } = args;

    let raw = std::fs::read_to_string(document)?;
    let mut document: DocumentRecord = serde_json::from_str(&raw)?;

    // Exports rarely carry a MIME type; infer one from the filename so the
    // file-type similarity signal still fires.
    if document.mime_type.is_none() {
        if let Some(filename) = document.filename.clone() {
            if let Some(guess) = mime_guess::from_path(&filename).first() {
                document.mime_type = Some(guess.essence_str().to_string());
            }
        }
    }

    let rules: Vec<AttributionRule> = match rules {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let extractor = FeatureExtractor::default();
    let corpus = match corrections {
        Some(path) => CorrectionBackfillImporter::from_path(path, &extractor)?,
        None => Vec::new(),
    };

    let engine = AttributionEngine::new(default_engine_config())?;
    let suggestions = engine.suggest(&document, &rules, &corpus);

    println!(
        "Evaluated {} rule(s) and {} correction(s)",
        rules.len(),
        corpus.len()
    );
    render_suggestions(&suggestions);

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryClassificationStore::with_rules(demo_rules()));
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = ClassificationService::new(store, audit, default_engine_config())?;

    println!("Document attribution demo");
    println!("Seeded {} starter rules", demo_rules().len());

    // A clerk corrects two historical invoices; the engine learns from both.
    for (document, field, value) in demo_corrections() {
        service.record_correction(&document, field, value, CorrectionSource::Manual, 1.0)?;
    }
    println!("Recorded 3 historical corrections\n");

    let incoming = incoming_invoice();
    println!(
        "Incoming document: {} ({} EUR)",
        incoming.title.as_deref().unwrap_or("untitled"),
        incoming.amount.unwrap_or_default()
    );

    let report = service.suggest_for(&incoming, args.auto_apply)?;

    render_report(&report);
    Ok(())
}

fn render_suggestions(suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        println!("\nSuggestions: none");
        return;
    }

    println!("\nSuggestions");
    for suggestion in suggestions {
        println!(
            "- {}: {} ({:.0}% confidence, {} supporting vote(s))",
            suggestion.field.label(),
            suggestion.value,
            suggestion.confidence * 100.0,
            suggestion.supporting_votes.len()
        );
    }
}

fn render_report(report: &SuggestionReport) {
    render_suggestions(&report.suggestions);

    if !report.auto_applied.is_empty() {
        println!("\nAuto-applied");
        for applied in &report.auto_applied {
            println!(
                "- {}: {} ({:.0}% confidence)",
                applied.field.label(),
                applied.value,
                applied.confidence * 100.0
            );
        }
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped");
        for skipped in &report.skipped {
            let reason = match &skipped.reason {
                SkipReason::AlreadyAssigned { current } => {
                    format!("already assigned to {current}")
                }
                SkipReason::ConfidenceTooLow { confidence } => {
                    format!("confidence too low ({:.0}%)", confidence * 100.0)
                }
            };
            println!("- {}: {}", skipped.field.label(), reason);
        }
    }
}

fn incoming_invoice() -> DocumentRecord {
    DocumentRecord {
        id: Some(DocumentId(500)),
        title: Some("Facture consulting juillet".to_string()),
        amount: Some(820.0),
        currency: Some("EUR".to_string()),
        content: Some(
            "Facture pour services de consulting informatique. Prestation consulting \
             mensuelle, maintenance serveurs."
                .to_string(),
        ),
        mime_type: Some("application/pdf".to_string()),
        filename: Some("facture-juillet.pdf".to_string()),
        tag_ids: [3].into_iter().collect(),
        doc_date: NaiveDate::from_ymd_opt(2025, 7, 8),
        ..DocumentRecord::default()
    }
}

fn demo_corrections() -> Vec<(DocumentRecord, AttributeField, AttributeValue)> {
    let may_invoice = DocumentRecord {
        id: Some(DocumentId(401)),
        title: Some("Facture consulting mai".to_string()),
        correspondent_id: Some(12),
        document_type_id: Some(3),
        amount: Some(780.0),
        content: Some(
            "Facture consulting informatique. Prestation mensuelle, maintenance serveurs."
                .to_string(),
        ),
        mime_type: Some("application/pdf".to_string()),
        filename: Some("facture-mai.pdf".to_string()),
        tag_ids: [3].into_iter().collect(),
        doc_date: NaiveDate::from_ymd_opt(2025, 5, 12),
        ..DocumentRecord::default()
    };

    let june_invoice = DocumentRecord {
        id: Some(DocumentId(402)),
        title: Some("Facture consulting juin".to_string()),
        doc_date: NaiveDate::from_ymd_opt(2025, 6, 11),
        ..may_invoice.clone()
    };

    vec![
        (
            may_invoice.clone(),
            AttributeField::Correspondent,
            AttributeValue::Id(12),
        ),
        (
            june_invoice.clone(),
            AttributeField::Correspondent,
            AttributeValue::Id(12),
        ),
        (june_invoice, AttributeField::DocumentType, AttributeValue::Id(3)),
    ]
}
