use std::collections::HashMap;

use chrono::{DateTime, Utc};

use flagdeck_core::{Experiment, FeatureRule, RuleKind};

/// Experiments keyed by id, for resolving `experiment-ref` rules.
pub type ExperimentMap = HashMap<String, Experiment>;

pub fn experiments_by_id(experiments: &[Experiment]) -> ExperimentMap {
    experiments.iter().map(|e| (e.id.clone(), e.clone())).collect()
}

/// Whether a rule is currently inert: switched off, past a schedule that
/// ended disabled, or pointing at an experiment that is gone or archived.
pub fn is_rule_disabled(rule: &FeatureRule, experiments: &ExperimentMap, now: DateTime<Utc>) -> bool {
    if !rule.enabled {
        return true;
    }

    if let Some(last) = rule.schedule_rules.last() {
        if !last.enabled && last.timestamp.is_some_and(|ts| ts < now) {
            return true;
        }
    }

    match &rule.kind {
        RuleKind::ExperimentRef { experiment_id } => {
            experiments.get(experiment_id).map_or(true, |e| e.archived)
        }
        _ => false,
    }
}
