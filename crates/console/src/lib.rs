//! Admin console view logic: the per-environment rule tabs of a feature and
//! the design-system pieces they render with.

pub mod badge;
pub mod disabled;
pub mod rule_tabs;
pub mod track;

pub use badge::{Badge, BadgeColor, BadgeRadius, BadgeVariant, Margin};
pub use disabled::{experiments_by_id, is_rule_disabled, ExperimentMap};
pub use rule_tabs::{
    AddRuleAffordance, CompareLink, CompareModal, CopyRuleModal, Layout, ModalKind, PanelView,
    RuleModal, RuleTabs, RuleTabsInput, RuleTabsView, TabView,
};
pub use track::{RecordingTracker, TrackEvent, Tracker, TracingTracker};
