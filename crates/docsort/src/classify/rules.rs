use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::conditions::{self, Condition, ConditionOutcome};
use super::domain::{AttributeField, AttributeValue, DocumentRecord};

/// Condition plus the group it belongs to. Conditions inside one group are
/// ANDed; a rule fires when any group matches in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default)]
    pub group: u32,
    #[serde(flatten)]
    pub condition: Condition,
}

/// Outcome a firing rule casts votes for. Only actions that feed a predicted
/// attribute are modeled; persistence-side actions (folder moves, bespoke
/// field writes) belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum RuleAction {
    SetCorrespondent(i64),
    SetDocumentType(i64),
    AddTag(i64),
}

impl RuleAction {
    pub fn vote_target(self) -> (AttributeField, AttributeValue) {
        match self {
            RuleAction::SetCorrespondent(id) => {
                (AttributeField::Correspondent, AttributeValue::Id(id))
            }
            RuleAction::SetDocumentType(id) => {
                (AttributeField::DocumentType, AttributeValue::Id(id))
            }
            RuleAction::AddTag(id) => (AttributeField::Tag, AttributeValue::Id(id)),
        }
    }
}

/// Admin-authored attribution rule: ordered condition groups plus outcome
/// actions. Higher priority evaluates first; `stop_on_match` ends the pass
/// once this rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRule {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub stop_on_match: bool,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

const fn default_priority() -> i32 {
    100
}

const fn default_true() -> bool {
    true
}

/// Per-group evaluation trace, kept for rule test harnesses and audits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTrace {
    pub group: u32,
    pub matched: bool,
    pub conditions: Vec<ConditionOutcome>,
}

/// Result of evaluating one rule against one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleEvaluation {
    pub rule_id: i64,
    pub rule_name: String,
    pub matched: bool,
    pub groups: Vec<GroupTrace>,
}

/// A rule that fired, with the actions it wants applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_id: i64,
    pub rule_name: String,
    pub actions: Vec<RuleAction>,
    pub groups: Vec<GroupTrace>,
}

/// Evaluate a single rule: AND inside each condition group, OR across groups.
/// A rule without conditions always matches.
pub fn evaluate_rule(rule: &AttributionRule, document: &DocumentRecord) -> RuleEvaluation {
    if rule.conditions.is_empty() {
        return RuleEvaluation {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            matched: true,
            groups: Vec::new(),
        };
    }

    let mut grouped: BTreeMap<u32, Vec<&Condition>> = BTreeMap::new();
    for rule_condition in &rule.conditions {
        grouped
            .entry(rule_condition.group)
            .or_default()
            .push(&rule_condition.condition);
    }

    let mut groups = Vec::with_capacity(grouped.len());
    let mut any_group_matched = false;

    for (group, group_conditions) in grouped {
        let outcomes: Vec<ConditionOutcome> = group_conditions
            .iter()
            .map(|condition| conditions::evaluate(condition, document))
            .collect();
        let matched = outcomes.iter().all(|outcome| outcome.matched);
        if matched {
            any_group_matched = true;
        }
        groups.push(GroupTrace {
            group,
            matched,
            conditions: outcomes,
        });
    }

    RuleEvaluation {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        matched: any_group_matched,
        groups,
    }
}

/// Run every active rule against the document in (priority desc, name asc)
/// order, collecting the rules that fired. A firing rule with `stop_on_match`
/// halts the pass, mirroring how admins order short-circuit rules first.
pub fn evaluate_rules(rules: &[AttributionRule], document: &DocumentRecord) -> Vec<RuleMatch> {
    let mut ordered: Vec<&AttributionRule> = rules.iter().filter(|rule| rule.active).collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

    let mut matches = Vec::new();

    for rule in ordered {
        let evaluation = evaluate_rule(rule, document);
        debug!(
            rule_id = rule.id,
            rule_name = %rule.name,
            matched = evaluation.matched,
            "attribution rule evaluated"
        );

        if !evaluation.matched {
            continue;
        }

        matches.push(RuleMatch {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            actions: rule.actions.clone(),
            groups: evaluation.groups,
        });

        if rule.stop_on_match {
            break;
        }
    }

    matches
}
