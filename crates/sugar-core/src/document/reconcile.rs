//! Merging warehouse columns and collected answers into descriptor entries.
//!
//! Everything here is additive: a model or column that already exists in a
//! descriptor is never removed, even when the warehouse no longer has it.

use crate::errors::{SugarError, SugarResult};
use crate::indexer::descriptors::{DescriptionReuse, DescriptorIndex};
use crate::models::{ColumnEntry, ColumnUpdatePayload, DescriptorFile, ModelEntry, MODEL_NOT_DOCUMENTED};

/// Column prefill rules for one run.
#[derive(Clone, Copy, Debug)]
pub struct Reconciler<'a> {
    index: &'a DescriptorIndex,
    reuse: DescriptionReuse,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a DescriptorIndex, reuse: DescriptionReuse) -> Self {
        Self { index, reuse }
    }

    fn new_column(&self, model: &str, column: &str) -> ColumnEntry {
        ColumnEntry::new(column, &self.index.description_for(model, column, self.reuse))
    }

    /// Bring `content` up to date with the warehouse columns of `model`.
    ///
    /// A documented model gets its missing columns appended; anything else
    /// gets a fresh entry, wrapped in a new document when there is none.
    pub fn reconcile(
        &self,
        already_documented: bool,
        content: Option<DescriptorFile>,
        model: &str,
        db_columns: &[String],
    ) -> DescriptorFile {
        match content {
            Some(mut document) if already_documented && document.contains_model(model) => {
                self.update_model(&mut document, model, db_columns);
                document
            }
            content => self.create_new_model(content, model, db_columns),
        }
    }

    /// Append warehouse columns the entry does not list yet.
    /// Returns the names of the columns added.
    pub fn update_model(
        &self,
        document: &mut DescriptorFile,
        model: &str,
        db_columns: &[String],
    ) -> Vec<String> {
        let mut added = Vec::new();
        let Some(entry) = document.model_mut(model) else {
            return added;
        };
        for column in db_columns {
            if entry.has_column(column) {
                continue;
            }
            entry.push_column(self.new_column(model, column));
            added.push(column.clone());
        }
        if !added.is_empty() {
            tracing::info!(model, columns = ?added, "new columns added to descriptor");
        }
        added
    }

    /// Build a fresh entry for `model` and add it to `content`.
    pub fn create_new_model(
        &self,
        content: Option<DescriptorFile>,
        model: &str,
        db_columns: &[String],
    ) -> DescriptorFile {
        let mut entry = ModelEntry::new(model);
        for column in db_columns {
            entry.push_column(self.new_column(model, column));
        }
        let mut document = content.unwrap_or_else(DescriptorFile::new);
        if !document.push_model(entry) {
            tracing::debug!(model, "model already present; entry left as is");
        }
        document
    }
}

/// Write collected answers into the model's columns.
///
/// Descriptions replace the current text (and are recorded in the index);
/// tests and tags are merged with the answers first, existing entries after.
pub fn apply_payload(
    document: &mut DescriptorFile,
    model: &str,
    payload: &ColumnUpdatePayload,
    index: &mut DescriptorIndex,
) -> SugarResult<()> {
    let entry = document
        .model_mut(model)
        .ok_or_else(|| SugarError::ModelNotInDescriptor(model.to_string()))?;

    for (name, update) in payload {
        let Some(column) = entry.column_mut(name) else {
            tracing::warn!(model, column = %name, "answer for a column the model does not have");
            continue;
        };
        if let Some(description) = &update.description {
            index.record_description(model, name, Some(description));
            column.description = Some(index.description_for(model, name, DescriptionReuse::ModelScoped));
        }
        column.merge_tests(&update.tests);
        column.merge_tags(&update.tags);
    }
    Ok(())
}

/// Replace the model-level description. A blank answer leaves the sentinel.
pub fn set_model_description(
    document: &mut DescriptorFile,
    model: &str,
    description: &str,
) -> SugarResult<()> {
    let entry = document
        .model_mut(model)
        .ok_or_else(|| SugarError::ModelNotInDescriptor(model.to_string()))?;
    let description = if description.trim().is_empty() {
        MODEL_NOT_DOCUMENTED
    } else {
        description
    };
    entry.description = Some(description.to_string());
    Ok(())
}
