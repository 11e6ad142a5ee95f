use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::FlagdeckError;
use crate::experiment::{Experiment, ExperimentChanges};
use crate::metric::Metric;

/// Organization role. Later variants grant strictly more than earlier ones,
/// except `Engineer`, which manages features but not analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    ReadOnly,
    Collaborator,
    Engineer,
    Analyst,
    Experimenter,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "readonly" | "read_only" | "read-only" => Ok(Role::ReadOnly),
            "collaborator" => Ok(Role::Collaborator),
            "engineer" => Ok(Role::Engineer),
            "analyst" => Ok(Role::Analyst),
            "experimenter" => Ok(Role::Experimenter),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A single capability checked by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ReadData,
    CreateAnalyses,
    ManageMetrics,
    ManageFeatures,
}

impl Role {
    pub fn grants(&self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::ReadOnly => matches!(permission, ReadData),
            Role::Collaborator => matches!(permission, ReadData),
            Role::Engineer => matches!(permission, ReadData | ManageFeatures),
            Role::Analyst => matches!(permission, ReadData | CreateAnalyses | ManageMetrics),
            Role::Experimenter | Role::Admin => true,
        }
    }
}

/// Global role plus per-project overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permissions {
    pub role: Role,
    #[serde(default)]
    pub project_roles: HashMap<String, Role>,
}

impl Permissions {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            project_roles: HashMap::new(),
        }
    }

    pub fn with_project_role(mut self, project: impl Into<String>, role: Role) -> Self {
        self.project_roles.insert(project.into(), role);
        self
    }

    /// Effective role within a project: the override if one exists, else the
    /// global role.
    pub fn role_for(&self, project: Option<&str>) -> Role {
        project
            .and_then(|p| self.project_roles.get(p).copied())
            .unwrap_or(self.role)
    }

    pub fn allows(&self, permission: Permission, project: Option<&str>) -> bool {
        self.role_for(project).grants(permission)
    }

    /// Every listed project must allow the permission; an empty list means
    /// "all projects" and checks the global role.
    pub fn allows_all(&self, permission: Permission, projects: &[String]) -> bool {
        if projects.is_empty() {
            return self.role.grants(permission);
        }
        projects.iter().all(|p| self.allows(permission, Some(p)))
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::new(Role::ReadOnly)
    }
}

/// Decides whether an actor may perform a mutation.
pub trait PermissionEvaluator: Send + Sync {
    fn can_update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> bool;

    fn can_create_metric(&self, ctx: &RequestContext, projects: &[String]) -> bool;

    fn can_delete_metric(&self, ctx: &RequestContext, metric: &Metric) -> bool;

    /// Failing variant: turn a negative decision into `PermissionDenied`.
    fn require(&self, allowed: bool) -> Result<(), FlagdeckError> {
        if allowed {
            Ok(())
        } else {
            Err(FlagdeckError::PermissionDenied)
        }
    }
}

/// Role-table evaluator reading permissions off the request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl PermissionEvaluator for RolePolicy {
    fn can_update_experiment(
        &self,
        ctx: &RequestContext,
        experiment: &Experiment,
        changes: &ExperimentChanges,
    ) -> bool {
        let perms = &ctx.permissions;
        if !perms.allows(Permission::CreateAnalyses, experiment.project.as_deref()) {
            return false;
        }
        // Moving an experiment also needs rights in the destination project.
        match &changes.project {
            Some(target) if target.as_deref() != experiment.project.as_deref() => {
                perms.allows(Permission::CreateAnalyses, target.as_deref())
            }
            _ => true,
        }
    }

    fn can_create_metric(&self, ctx: &RequestContext, projects: &[String]) -> bool {
        ctx.permissions.allows_all(Permission::ManageMetrics, projects)
    }

    fn can_delete_metric(&self, ctx: &RequestContext, metric: &Metric) -> bool {
        ctx.permissions.allows_all(Permission::ManageMetrics, &metric.projects)
    }
}
