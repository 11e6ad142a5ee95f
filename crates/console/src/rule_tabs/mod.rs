//! Per-environment rule tabs for a feature.
//!
//! [`RuleTabs`] owns the interaction state (selected environment and the
//! add/copy/compare modals); [`RuleTabs::view`] turns that state plus the
//! feature data into a render-ready [`RuleTabsView`].

mod view;


use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use flagdeck_core::{Environment, Feature, FeatureRule};

use crate::track::{TrackEvent, Tracker, TracingTracker};

pub use view::{
    AddRuleAffordance, CompareLink, Layout, PanelView, RuleTabsInput, RuleTabsView, TabView,
};

/// Add/edit rule modal. `index` is the slot the rule will occupy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleModal {
    pub index: usize,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyRuleModal {
    pub environment: String,
    pub rules: Vec<FeatureRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareModal {
    pub source_env: Option<String>,
    pub target_env: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Rule,
    CopyRule,
    Compare,
}

pub struct RuleTabs {
    environments: Vec<String>,
    selected: Option<String>,
    rule_modal: Option<RuleModal>,
    copy_rule_modal: Option<CopyRuleModal>,
    compare_modal: Option<CompareModal>,
    tracker: Arc<dyn Tracker>,
}

impl RuleTabs {
    /// `remembered` is the environment selected last time, if any. It is
    /// only honoured while it names a current environment.
    pub fn new(tracker: Arc<dyn Tracker>, remembered: Option<String>) -> Self {
        Self {
            environments: Vec::new(),
            selected: remembered,
            rule_modal: None,
            copy_rule_modal: None,
            compare_modal: None,
            tracker,
        }
    }

    pub fn with_tracing(remembered: Option<String>) -> Self {
        Self::new(Arc::new(TracingTracker), remembered)
    }

    /// Take in the current environment set and repair the selection. Call
    /// this every time the set may have changed; an empty set leaves the
    /// selection untouched.
    pub fn sync_environments(&mut self, environments: &[Environment]) {
        self.environments = environments.iter().map(|e| e.id.clone()).collect();
        let Some(first) = self.environments.first() else {
            return;
        };
        let valid = self
            .selected
            .as_ref()
            .is_some_and(|s| self.environments.contains(s));
        if !valid {
            debug!(previous = ?self.selected, selected = %first, "Environment selection reset");
            self.selected = Some(first.clone());
        }
    }

    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Switch tabs. Unknown environments are ignored.
    pub fn select(&mut self, environment: &str) -> bool {
        if !self.environments.iter().any(|e| e == environment) {
            debug!(environment, "Ignoring selection of unknown environment");
            return false;
        }
        self.selected = Some(environment.to_string());
        true
    }

    /// Open the add-rule modal on the selected environment, appending after
    /// its existing rules.
    pub fn open_add_rule(&mut self, feature: &Feature) -> Option<&RuleModal> {
        let environment = self.selected.clone()?;
        let index = feature.rules(&environment).len();
        self.tracker.track(TrackEvent::new(
            "Viewed Rule Modal",
            serde_json::json!({ "source": "add-rule", "type": "force" }),
        ));
        self.rule_modal = Some(RuleModal {
            index,
            environment,
            default_type: None,
        });
        self.rule_modal.as_ref()
    }

    /// Open the rule modal on an existing rule slot, e.g. to edit it.
    pub fn open_rule(&mut self, environment: &str, index: usize, default_type: Option<String>) {
        self.rule_modal = Some(RuleModal {
            index,
            environment: environment.to_string(),
            default_type,
        });
    }

    pub fn open_copy_rule(&mut self, environment: &str, rules: Vec<FeatureRule>) {
        self.copy_rule_modal = Some(CopyRuleModal {
            environment: environment.to_string(),
            rules,
        });
    }

    pub fn open_compare(&mut self) {
        self.compare_modal = Some(CompareModal {
            source_env: self.selected.clone(),
            target_env: None,
        });
    }

    pub fn set_compare_source(&mut self, environment: &str) {
        if let Some(modal) = self.compare_modal.as_mut() {
            modal.source_env = Some(environment.to_string());
        }
    }

    pub fn set_compare_target(&mut self, environment: &str) {
        if let Some(modal) = self.compare_modal.as_mut() {
            modal.target_env = Some(environment.to_string());
        }
    }

    pub fn close(&mut self, kind: ModalKind) {
        match kind {
            ModalKind::Rule => self.rule_modal = None,
            ModalKind::CopyRule => self.copy_rule_modal = None,
            ModalKind::Compare => self.compare_modal = None,
        }
    }

    pub fn rule_modal(&self) -> Option<&RuleModal> {
        self.rule_modal.as_ref()
    }

    pub fn copy_rule_modal(&self) -> Option<&CopyRuleModal> {
        self.copy_rule_modal.as_ref()
    }

    pub fn compare_modal(&self) -> Option<&CompareModal> {
        self.compare_modal.as_ref()
    }
}
