use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use flagdeck_core::{Environment, Feature, FeatureRule};

use super::RuleTabs;
use crate::badge::{Badge, BadgeColor, BadgeRadius, BadgeVariant};
use crate::disabled::{is_rule_disabled, ExperimentMap};

/// Environment count at which the tab strip gives way to a dropdown.
pub const DROPDOWN_MIN_ENVIRONMENTS: usize = 6;

/// An environment needs more rules than this before hidden rules get a toggle.
pub const SHOW_HIDDEN_RULE_THRESHOLD: usize = 3;

pub const EMPTY_STATE_TEXT: &str = "No rules for this environment yet";
pub const COMPARE_LINK_LABEL: &str = "Compare environments";

/// Everything the view needs besides the controller's own state.
pub struct RuleTabsInput<'a> {
    pub environments: &'a [Environment],
    pub feature: &'a Feature,
    pub experiments: &'a ExperimentMap,
    pub is_locked: bool,
    pub can_edit_drafts: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    TabStrip,
    Dropdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabView {
    pub environment: String,
    pub selected: bool,
    pub badge: Badge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareLink {
    pub label: String,
    /// Nudged upward so it clears the show-hidden toggle.
    pub lifted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddRuleAffordance {
    pub heading: String,
    pub button: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub environment: String,
    pub rules: Vec<FeatureRule>,
    pub show_disabled_toggle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_rule: Option<AddRuleAffordance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTabsView {
    pub layout: Layout,
    pub selected: Option<String>,
    pub tabs: Vec<TabView>,
    pub compare_link: CompareLink,
    pub show_hidden_toggle: bool,
    pub panels: Vec<PanelView>,
}

fn rules_by_environment(input: &RuleTabsInput<'_>) -> (IndexMap<String, Vec<FeatureRule>>, bool) {
    let mut show_hidden = false;
    let mut by_env = IndexMap::with_capacity(input.environments.len());
    for env in input.environments {
        let rules = input.feature.rules(&env.id).to_vec();
        let any_disabled = rules
            .iter()
            .any(|r| is_rule_disabled(r, input.experiments, input.now));
        // One busy environment turns the toggle on for every tab.
        if rules.len() > SHOW_HIDDEN_RULE_THRESHOLD && any_disabled {
            show_hidden = true;
        }
        by_env.insert(env.id.clone(), rules);
    }
    (by_env, show_hidden)
}

fn strip_badge(count: usize) -> Badge {
    Badge::new(count.to_string())
        .ml("2")
        .radius(BadgeRadius::Full)
        .variant(BadgeVariant::Solid)
        .color(BadgeColor::Violet)
}

fn dropdown_badge(count: usize) -> Badge {
    let plural = if count == 1 { "" } else { "s" };
    Badge::new(format!("{} Rule{} applied", count, plural)).ml("2")
}

impl RuleTabs {
    /// Render against `input.environments`, repairing the selection first so
    /// it always names one of the rendered tabs.
    pub fn view(&mut self, input: &RuleTabsInput<'_>) -> RuleTabsView {
        self.sync_environments(input.environments);
        let (by_env, show_hidden) = rules_by_environment(input);
        let layout = if input.environments.len() < DROPDOWN_MIN_ENVIRONMENTS {
            Layout::TabStrip
        } else {
            Layout::Dropdown
        };
        let selected = self.selected().map(str::to_string);

        let tabs = by_env
            .iter()
            .map(|(env, rules)| TabView {
                environment: env.clone(),
                selected: selected.as_deref() == Some(env.as_str()),
                badge: match layout {
                    Layout::TabStrip => strip_badge(rules.len()),
                    Layout::Dropdown => dropdown_badge(rules.len()),
                },
            })
            .collect();

        let can_add = input.can_edit_drafts && !input.is_locked;
        let panels = by_env
            .into_iter()
            .map(|(env, rules)| {
                // The heading names the selected tab; panels only show while selected.
                let target = selected.clone().unwrap_or_else(|| env.clone());
                PanelView {
                    empty_text: rules.is_empty().then(|| EMPTY_STATE_TEXT.to_string()),
                    add_rule: can_add.then(|| AddRuleAffordance {
                        heading: format!("Add Rule to {}", target),
                        button: "Add Rule".to_string(),
                    }),
                    show_disabled_toggle: show_hidden && !rules.is_empty(),
                    environment: env,
                    rules,
                }
            })
            .collect();

        RuleTabsView {
            layout,
            selected,
            tabs,
            compare_link: CompareLink {
                label: COMPARE_LINK_LABEL.to_string(),
                lifted: layout == Layout::TabStrip && show_hidden,
            },
            show_hidden_toggle: show_hidden,
            panels,
        }
    }
}
