//! Alert-rule normalization
//!
//! Converts a backend-agnostic [`AlertSuggestion`] into the metric alert-rule
//! payload Sentry accepts. Everything here is pure: the same suggestion and
//! project always produce the same payload.

use crate::models::{
    Action, AlertRulePayload, AlertSuggestion, PayloadAction, ThresholdType, Trigger, TriggerLabel,
};

/// Datasets passed through unchanged; anything else maps to transactions
const KNOWN_DATASETS: &[&str] = &["transactions", "errors", "sessions"];
const FALLBACK_DATASET: &str = "transactions";

const EMAIL_ACTION: &str = "email";
const RECOGNISED_TARGET_TYPES: &[&str] = &["specific", "team"];

/// Map a suggestion dataset onto a backend dataset
pub fn map_dataset(dataset: &str) -> &'static str {
    KNOWN_DATASETS
        .iter()
        .find(|known| **known == dataset)
        .copied()
        .unwrap_or(FALLBACK_DATASET)
}

/// 0 compares above, 1 compares below
pub fn threshold_type_value(threshold_type: ThresholdType) -> u8 {
    match threshold_type {
        ThresholdType::Above => 0,
        ThresholdType::Below => 1,
    }
}

/// Keep email actions with a recognised target type, in order
pub fn build_actions(actions: &[Action]) -> Vec<PayloadAction> {
    actions
        .iter()
        .filter(|a| a.action_type == EMAIL_ACTION)
        .filter(|a| RECOGNISED_TARGET_TYPES.contains(&a.target_type.as_str()))
        .map(|a| PayloadAction {
            action_type: EMAIL_ACTION.to_string(),
            target_type: a.target_type.clone(),
            target_identifier: a.target_identifier.clone(),
        })
        .collect()
}

/// Build the rule payload for `suggestion` in `project`
///
/// Triggers are critical first, then warning; each carries the full
/// action list.
pub fn build_payload(suggestion: &AlertSuggestion, project: &str) -> AlertRulePayload {
    let actions = build_actions(&suggestion.actions);

    let tiers = [
        (TriggerLabel::Critical, suggestion.thresholds.critical),
        (TriggerLabel::Warning, suggestion.thresholds.warning),
    ];
    let triggers = tiers
        .into_iter()
        .filter_map(|(label, threshold)| {
            threshold.map(|alert_threshold| Trigger {
                label,
                alert_threshold,
                actions: actions.clone(),
            })
        })
        .collect();

    AlertRulePayload {
        name: suggestion.name.clone(),
        dataset: map_dataset(&suggestion.dataset).to_string(),
        query: suggestion.query.clone(),
        aggregate: suggestion.aggregate.clone(),
        time_window: suggestion.time_window,
        threshold_type: threshold_type_value(suggestion.threshold_type),
        triggers,
        projects: vec![project.to_string()],
        environment: suggestion.environment.clone(),
    }
}
