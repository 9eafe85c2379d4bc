//! The `doc` command: document one model end to end.
//!
//! Index, resolve, reconcile with the warehouse, collect answers, normalize
//! and persist, add primary-key tests, verify the proposed tests, and finally
//! push the new descriptions to every other descriptor. Nothing is written
//! until collection has finished, so an aborted collection leaves every file
//! untouched.

use std::path::PathBuf;

use crate::collector::{DocumentationCollector, DocumentationMode};
use crate::config::ProjectSettings;
use crate::connectors::{AssertionKind, Connector};
use crate::document::ordering::normalize;
use crate::document::primary_key::synthesize_primary_key_tests;
use crate::document::propagate::{propagate, PropagationReport};
use crate::document::reconcile::{apply_payload, set_model_description, Reconciler};
use crate::document::verification::{PendingVerification, VerificationOutcome};
use crate::errors::{SugarError, SugarResult};
use crate::models::ColumnUpdatePayload;
use crate::query::coverage::{documented_columns, undocumented_columns};
use crate::query::resolver::{ensure_not_excluded, resolve_model, ModelResolution};
use crate::runner::TestRunner;
use crate::store::yaml::{read_descriptor_if_exists, write_descriptor};
use crate::task::ProjectContext;

/// What a documentation run did.
#[derive(Clone, Debug, PartialEq)]
pub struct DocReport {
    pub model: String,
    pub descriptor: PathBuf,
    pub already_documented: bool,
    pub payload: ColumnUpdatePayload,
    /// `None` when verification was switched off.
    pub verification: Option<VerificationOutcome>,
    pub propagation: PropagationReport,
}

pub struct DocumentationTask<'a> {
    settings: &'a ProjectSettings,
    connector: &'a dyn Connector,
    collector: &'a mut dyn DocumentationCollector,
    runner: Option<&'a dyn TestRunner>,
}

impl<'a> DocumentationTask<'a> {
    pub fn new(
        settings: &'a ProjectSettings,
        connector: &'a dyn Connector,
        collector: &'a mut dyn DocumentationCollector,
        runner: Option<&'a dyn TestRunner>,
    ) -> Self {
        Self {
            settings,
            connector,
            collector,
            runner,
        }
    }

    pub fn run(&mut self, model: &str) -> SugarResult<DocReport> {
        let policy = self.settings.exclusion_policy()?;
        ensure_not_excluded(&policy, model)?;

        let mut project = ProjectContext::load(self.settings)?;
        let resolution = resolve_model(&project.tree, &project.index, model);
        let (source, descriptor) = match &resolution {
            ModelResolution::SourceNotFound => {
                return Err(SugarError::ModelNotFound {
                    model: model.to_string(),
                    root: self.settings.project_dir.clone(),
                })
            }
            ModelResolution::Undocumented {
                source, descriptor, ..
            }
            | ModelResolution::Documented { source, descriptor } => (source.clone(), descriptor.clone()),
        };
        let already_documented = resolution.is_already_documented();
        tracing::info!(
            model,
            descriptor = %descriptor.display(),
            already_documented,
            "documenting model"
        );

        let schema = self.settings.schema();
        let columns = self.connector.list_columns(model, schema)?;
        if columns.is_empty() {
            return Err(SugarError::Connector(format!(
                "table {schema}.{model} was not found in the database"
            )));
        }

        let content = if resolution.descriptor_exists() {
            read_descriptor_if_exists(&descriptor)?
        } else {
            None
        };
        let reconciler = Reconciler::new(&project.index, self.settings.description_reuse);
        let mut document = reconciler.reconcile(already_documented, content, model, &columns);

        // Collection
        let current = document.model(model).and_then(|m| m.description.clone());
        if let Some(description) = self.collector.model_description(model, current.as_deref())? {
            set_model_description(&mut document, model, &description)?;
        }
        let mut payload = self.collector.collect_columns(
            model,
            &undocumented_columns(&document, model),
            DocumentationMode::Undocumented,
        )?;
        payload.extend(self.collector.collect_columns(
            model,
            &documented_columns(&document, model),
            DocumentationMode::AlreadyDocumented,
        )?);

        apply_payload(&mut document, model, &payload, &mut project.index)?;
        let mut document = normalize(document);
        write_descriptor(&descriptor, &document)?;

        if self.settings.always_enforce_tests {
            payload = synthesize_primary_key_tests(&source, model, &document, payload)?;
            apply_payload(&mut document, model, &payload, &mut project.index)?;
            document = normalize(document);
        }

        let mut verification = PendingVerification::new(descriptor.clone(), model, &payload);
        verification.write(&document)?;
        let verification = match self.runner {
            Some(runner) => Some(verification.verify(runner)?),
            None => {
                tracing::info!(model, "test verification skipped");
                None
            }
        };

        let propagation = propagate(&project.tree, &payload)?;
        Ok(DocReport {
            model: model.to_string(),
            descriptor,
            already_documented,
            payload,
            verification,
            propagation,
        })
    }

    /// Evaluate one data assertion directly against the warehouse.
    pub fn check_assertion(&self, kind: &str, table: &str, column: &str) -> SugarResult<bool> {
        let kind: AssertionKind = kind.parse()?;
        let passed = self
            .connector
            .run_assertion(kind, self.settings.schema(), table, column)?;
        if !passed {
            tracing::warn!(%kind, table, column, "assertion failed");
        }
        Ok(passed)
    }
}
