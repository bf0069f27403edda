use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::DocumentRecord;

/// Document field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Correspondent,
    DocumentType,
    Tag,
    Amount,
    Content,
    Date,
    CustomField,
}

impl FieldKind {
    pub const fn label(self) -> &'static str {
        match self {
            FieldKind::Correspondent => "correspondent",
            FieldKind::DocumentType => "document_type",
            FieldKind::Tag => "tag",
            FieldKind::Amount => "amount",
            FieldKind::Content => "content",
            FieldKind::Date => "date",
            FieldKind::CustomField => "custom_field",
        }
    }
}

/// Closed operator set. Adding a variant forces every match below to be
/// revisited, which keeps the support matrix exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
}

impl ConditionOperator {
    pub const fn label(self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not_contains",
            ConditionOperator::StartsWith => "starts_with",
            ConditionOperator::EndsWith => "ends_with",
            ConditionOperator::Regex => "regex",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::GreaterOrEqual => "greater_or_equal",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::LessOrEqual => "less_or_equal",
            ConditionOperator::Between => "between",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
            ConditionOperator::IsEmpty => "is_empty",
            ConditionOperator::IsNotEmpty => "is_not_empty",
        }
    }

    /// Operator/field support matrix. Anything outside it evaluates to a
    /// non-match instead of an error, so one misconfigured condition cannot
    /// poison a whole rule set.
    pub fn supported_for(self, field: FieldKind) -> bool {
        use ConditionOperator::*;
        match field {
            FieldKind::Correspondent | FieldKind::DocumentType => {
                matches!(self, Equals | NotEquals | In | NotIn | IsEmpty | IsNotEmpty)
            }
            FieldKind::Tag => matches!(
                self,
                Contains | NotContains | In | NotIn | IsEmpty | IsNotEmpty
            ),
            FieldKind::Amount => matches!(
                self,
                Equals
                    | NotEquals
                    | GreaterThan
                    | GreaterOrEqual
                    | LessThan
                    | LessOrEqual
                    | Between
                    | IsEmpty
                    | IsNotEmpty
            ),
            FieldKind::Content => {
                matches!(self, Contains | NotContains | StartsWith | EndsWith | Regex)
            }
            FieldKind::Date => matches!(self, Equals | NotEquals | Between | IsEmpty | IsNotEmpty),
            FieldKind::CustomField => true,
        }
    }
}

/// Single admin-authored predicate. The value is kept as the raw authored
/// string and decoded leniently at evaluation time (JSON scalar, JSON array,
/// or plain text), matching how the rule editor stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldKind,
    /// Only meaningful for `FieldKind::CustomField`.
    #[serde(default)]
    pub field_name: Option<String>,
    pub operator: ConditionOperator,
    pub value: String,
}

/// Outcome of evaluating one condition against one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionOutcome {
    pub matched: bool,
    pub detail: String,
}

impl ConditionOutcome {
    fn matched(condition: &Condition) -> Self {
        Self {
            matched: true,
            detail: format!(
                "match: {} {} {}",
                condition.field.label(),
                condition.operator.label(),
                condition.value
            ),
        }
    }

    fn missed(condition: &Condition, reason: &str) -> Self {
        Self {
            matched: false,
            detail: format!(
                "no match: {} {} {} ({reason})",
                condition.field.label(),
                condition.operator.label(),
                condition.value
            ),
        }
    }
}

/// Decoded condition operand.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Text(String),
    List(Vec<Operand>),
    Null,
}

impl Operand {
    fn parse(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_json(value),
            Err(_) => Operand::Text(raw.to_string()),
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(number) => number
                .as_f64()
                .map(Operand::Number)
                .unwrap_or(Operand::Null),
            serde_json::Value::String(text) => Operand::Text(text),
            serde_json::Value::Array(items) => {
                Operand::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Bool(flag) => Operand::Text(flag.to_string()),
            serde_json::Value::Null | serde_json::Value::Object(_) => Operand::Null,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(number) => Some(*number),
            Operand::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn as_id(&self) -> Option<i64> {
        match self {
            Operand::Number(number) if number.fract() == 0.0 => Some(*number as i64),
            Operand::Text(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Operand::Text(text) => Some(text.clone()),
            Operand::Number(number) => Some(format_number(*number)),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        self.as_text()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
    }

    /// Scalars are promoted to single-element lists, as the legacy rule editor
    /// stored `in` operands either way.
    fn as_list(&self) -> Vec<Operand> {
        match self {
            Operand::List(items) => items.clone(),
            Operand::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

/// Evaluate one condition against one document. Total over well-formed
/// structs: malformed operands degrade to a non-match with a reason in the
/// detail instead of failing the whole evaluation pass.
pub fn evaluate(condition: &Condition, document: &DocumentRecord) -> ConditionOutcome {
    if !condition.operator.supported_for(condition.field) {
        return ConditionOutcome::missed(condition, "operator not supported for field");
    }

    let operand = Operand::parse(&condition.value);

    let matched = match condition.field {
        FieldKind::Correspondent => {
            evaluate_reference(document.correspondent_id, condition.operator, &operand)
        }
        FieldKind::DocumentType => {
            evaluate_reference(document.document_type_id, condition.operator, &operand)
        }
        FieldKind::Tag => evaluate_tags(document, condition.operator, &operand),
        FieldKind::Amount => evaluate_amount(document.amount, condition.operator, &operand),
        FieldKind::Content => {
            let content = document.content.as_deref().unwrap_or("");
            return evaluate_content(condition, content, &operand);
        }
        FieldKind::Date => evaluate_date(document, condition.operator, &operand),
        FieldKind::CustomField => evaluate_custom(document, condition, &operand),
    };

    if matched {
        ConditionOutcome::matched(condition)
    } else {
        ConditionOutcome::missed(condition, "value comparison failed")
    }
}

/// Correspondent / document type: string-normalized id equality, so a
/// document id of 5 matches both `5` and `"5"`.
fn evaluate_reference(
    document_id: Option<i64>,
    operator: ConditionOperator,
    operand: &Operand,
) -> bool {
    match operator {
        ConditionOperator::Equals => matches!(
            (document_id, operand.as_id()),
            (Some(doc), Some(wanted)) if doc == wanted
        ),
        ConditionOperator::NotEquals => {
            !evaluate_reference(document_id, ConditionOperator::Equals, operand)
        }
        ConditionOperator::In => match document_id {
            Some(doc) => operand
                .as_list()
                .iter()
                .filter_map(Operand::as_id)
                .any(|wanted| wanted == doc),
            None => false,
        },
        ConditionOperator::NotIn => {
            document_id.is_some()
                && !evaluate_reference(document_id, ConditionOperator::In, operand)
        }
        ConditionOperator::IsEmpty => document_id.is_none(),
        ConditionOperator::IsNotEmpty => document_id.is_some(),
        _ => false,
    }
}

fn evaluate_tags(document: &DocumentRecord, operator: ConditionOperator, operand: &Operand) -> bool {
    let tags = &document.tag_ids;
    let wanted = || {
        operand
            .as_list()
            .iter()
            .filter_map(Operand::as_id)
            .collect::<Vec<_>>()
    };

    match operator {
        ConditionOperator::Contains | ConditionOperator::In => {
            wanted().iter().any(|id| tags.contains(id))
        }
        ConditionOperator::NotContains | ConditionOperator::NotIn => {
            let wanted = wanted();
            !wanted.is_empty() && !wanted.iter().any(|id| tags.contains(id))
        }
        ConditionOperator::IsEmpty => tags.is_empty(),
        ConditionOperator::IsNotEmpty => !tags.is_empty(),
        _ => false,
    }
}

/// Numeric comparisons require a present amount; an absent amount never
/// matches a comparison, only `is_empty`.
fn evaluate_amount(amount: Option<f64>, operator: ConditionOperator, operand: &Operand) -> bool {
    match operator {
        ConditionOperator::IsEmpty => return amount.is_none(),
        ConditionOperator::IsNotEmpty => return amount.is_some(),
        _ => {}
    }

    let Some(amount) = amount else {
        return false;
    };

    match operator {
        ConditionOperator::Equals => operand.as_number() == Some(amount),
        ConditionOperator::NotEquals => {
            matches!(operand.as_number(), Some(wanted) if wanted != amount)
        }
        ConditionOperator::GreaterThan => {
            matches!(operand.as_number(), Some(bound) if amount > bound)
        }
        ConditionOperator::GreaterOrEqual => {
            matches!(operand.as_number(), Some(bound) if amount >= bound)
        }
        ConditionOperator::LessThan => {
            matches!(operand.as_number(), Some(bound) if amount < bound)
        }
        ConditionOperator::LessOrEqual => {
            matches!(operand.as_number(), Some(bound) if amount <= bound)
        }
        ConditionOperator::Between => match bounds(operand, Operand::as_number) {
            Some((low, high)) => amount >= low && amount <= high,
            None => false,
        },
        _ => false,
    }
}

fn evaluate_content(condition: &Condition, content: &str, operand: &Operand) -> ConditionOutcome {
    let Some(pattern) = operand.as_text() else {
        return ConditionOutcome::missed(condition, "operand is not text");
    };

    let matched = match condition.operator {
        ConditionOperator::Contains => contains_ci(content, &pattern),
        ConditionOperator::NotContains => !contains_ci(content, &pattern),
        ConditionOperator::StartsWith => content.to_lowercase().starts_with(&pattern.to_lowercase()),
        ConditionOperator::EndsWith => content.to_lowercase().ends_with(&pattern.to_lowercase()),
        ConditionOperator::Regex => match Regex::new(&pattern) {
            Ok(regex) => regex.is_match(content),
            Err(_) => {
                return ConditionOutcome::missed(condition, "invalid regex pattern");
            }
        },
        _ => false,
    };

    if matched {
        ConditionOutcome::matched(condition)
    } else {
        ConditionOutcome::missed(condition, "value comparison failed")
    }
}

fn evaluate_date(document: &DocumentRecord, operator: ConditionOperator, operand: &Operand) -> bool {
    let date = document
        .doc_date
        .or_else(|| document.created_at.map(|at| at.date()));

    match operator {
        ConditionOperator::IsEmpty => return date.is_none(),
        ConditionOperator::IsNotEmpty => return date.is_some(),
        _ => {}
    }

    let Some(date) = date else {
        return false;
    };

    match operator {
        ConditionOperator::Equals => operand.as_date() == Some(date),
        ConditionOperator::NotEquals => {
            matches!(operand.as_date(), Some(wanted) if wanted != date)
        }
        ConditionOperator::Between => match bounds(operand, Operand::as_date) {
            Some((start, end)) => date >= start && date <= end,
            None => false,
        },
        _ => false,
    }
}

/// Custom fields are free-form strings; numeric operators apply when both
/// sides parse as numbers, text operators apply case-insensitively.
fn evaluate_custom(
    document: &DocumentRecord,
    condition: &Condition,
    operand: &Operand,
) -> bool {
    let value = condition
        .field_name
        .as_deref()
        .and_then(|name| document.custom_fields.get(name))
        .map(String::as_str);

    match condition.operator {
        ConditionOperator::IsEmpty => return value.map_or(true, str::is_empty),
        ConditionOperator::IsNotEmpty => return value.is_some_and(|text| !text.is_empty()),
        _ => {}
    }

    let Some(value) = value else {
        return false;
    };

    match condition.operator {
        ConditionOperator::Equals => match (value.trim().parse::<f64>().ok(), operand.as_number()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => operand
                .as_text()
                .is_some_and(|text| text.eq_ignore_ascii_case(value)),
        },
        ConditionOperator::NotEquals => {
            !evaluate_custom(
                document,
                &Condition {
                    operator: ConditionOperator::Equals,
                    ..condition.clone()
                },
                operand,
            )
        }
        ConditionOperator::Contains => operand
            .as_text()
            .is_some_and(|pattern| contains_ci(value, &pattern)),
        ConditionOperator::NotContains => operand
            .as_text()
            .is_some_and(|pattern| !contains_ci(value, &pattern)),
        ConditionOperator::StartsWith => operand
            .as_text()
            .is_some_and(|pattern| value.to_lowercase().starts_with(&pattern.to_lowercase())),
        ConditionOperator::EndsWith => operand
            .as_text()
            .is_some_and(|pattern| value.to_lowercase().ends_with(&pattern.to_lowercase())),
        ConditionOperator::Regex => match operand.as_text().map(|pattern| Regex::new(&pattern)) {
            Some(Ok(regex)) => regex.is_match(value),
            _ => false,
        },
        ConditionOperator::GreaterThan
        | ConditionOperator::GreaterOrEqual
        | ConditionOperator::LessThan
        | ConditionOperator::LessOrEqual
        | ConditionOperator::Between => {
            evaluate_amount(value.trim().parse::<f64>().ok(), condition.operator, operand)
        }
        ConditionOperator::In => operand
            .as_list()
            .iter()
            .filter_map(Operand::as_text)
            .any(|item| item.eq_ignore_ascii_case(value)),
        ConditionOperator::NotIn => {
            let items: Vec<String> = operand
                .as_list()
                .iter()
                .filter_map(Operand::as_text)
                .collect();
            !items.is_empty() && !items.iter().any(|item| item.eq_ignore_ascii_case(value))
        }
        // Handled by the early return above.
        ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty => false,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn bounds<T, F>(operand: &Operand, convert: F) -> Option<(T, T)>
where
    F: Fn(&Operand) -> Option<T>,
{
    match operand {
        Operand::List(items) if items.len() == 2 => {
            Some((convert(&items[0])?, convert(&items[1])?))
        }
        _ => None,
    }
}
