//! The `bootstrap` command: placeholder documentation for every model.

use std::path::PathBuf;

use crate::config::ProjectSettings;
use crate::connectors::Connector;
use crate::document::ordering::normalize;
use crate::document::reconcile::Reconciler;
use crate::errors::SugarResult;
use crate::query::resolver::{resolve_model, ModelResolution};
use crate::store::yaml::{read_descriptor_if_exists, write_descriptor};
use crate::task::ProjectContext;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub written: Vec<(String, PathBuf)>,
    /// Models with no table in the warehouse.
    pub missing_tables: Vec<String>,
}

/// Reconcile every non-excluded model with its table, without prompting.
pub fn run_bootstrap(settings: &ProjectSettings, connector: &dyn Connector) -> SugarResult<BootstrapReport> {
    let project = ProjectContext::load(settings)?;
    let reconciler = Reconciler::new(&project.index, settings.description_reuse);
    let mut report = BootstrapReport::default();

    for source in project.tree.model_sources() {
        let Some(model) = source.stem() else {
            continue;
        };
        if project.policy.is_model_excluded(model) {
            tracing::debug!(model, "excluded model skipped");
            continue;
        }
        let columns = connector.list_columns(model, settings.schema())?;
        if columns.is_empty() {
            tracing::info!(model, "no table found in the database; skipped");
            report.missing_tables.push(model.to_string());
            continue;
        }

        let resolution = resolve_model(&project.tree, &project.index, model);
        let Some(descriptor) = resolution.descriptor_path().map(PathBuf::from) else {
            continue;
        };
        // A descriptor created earlier in this run is not in the tree yet.
        let content = read_descriptor_if_exists(&descriptor)?;
        let already_documented = matches!(resolution, ModelResolution::Documented { .. });
        let document = normalize(reconciler.reconcile(already_documented, content, model, &columns));
        if write_descriptor(&descriptor, &document)? {
            report.written.push((model.to_string(), descriptor));
        }
    }

    tracing::info!(
        models = report.written.len(),
        missing = report.missing_tables.len(),
        "bootstrap finished"
    );
    Ok(report)
}
