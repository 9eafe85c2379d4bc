//! The `audit` command.

use crate::config::ProjectSettings;
use crate::errors::SugarResult;
use crate::query::coverage::{audit_model, audit_project, ModelAudit, ProjectAudit};
use crate::query::resolver::{ensure_not_excluded, resolve_model, ModelResolution};
use crate::store::yaml::read_descriptor;
use crate::task::ProjectContext;

#[derive(Clone, Debug, PartialEq)]
pub enum AuditOutcome {
    ModelNotFound(String),
    ModelNotDocumented(String),
    Model(ModelAudit),
    Project(ProjectAudit),
}

impl AuditOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ModelNotFound(_) | Self::ModelNotDocumented(_) => 1,
            Self::Model(_) | Self::Project(_) => 0,
        }
    }
}

/// Audit one model, or the whole project when `model` is `None`.
pub fn run_audit(settings: &ProjectSettings, model: Option<&str>) -> SugarResult<AuditOutcome> {
    let project = ProjectContext::load(settings)?;
    let Some(model) = model else {
        tracing::info!(project = %settings.project_dir.display(), "auditing project");
        return Ok(AuditOutcome::Project(audit_project(&project.index)?));
    };

    ensure_not_excluded(&project.policy, model)?;
    tracing::info!(model, "auditing model");
    match resolve_model(&project.tree, &project.index, model) {
        ModelResolution::SourceNotFound => {
            tracing::info!(
                model,
                project = %settings.project_dir.display(),
                "model not found in the project"
            );
            Ok(AuditOutcome::ModelNotFound(model.to_string()))
        }
        ModelResolution::Undocumented { .. } => {
            tracing::info!(model, "the model is not documented");
            Ok(AuditOutcome::ModelNotDocumented(model.to_string()))
        }
        ModelResolution::Documented { descriptor, .. } => {
            let content = read_descriptor(&descriptor)?;
            Ok(AuditOutcome::Model(audit_model(&content, model, &project.index)))
        }
    }
}
