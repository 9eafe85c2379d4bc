//! Pushing freshly written column descriptions to every other descriptor.

use crate::errors::SugarResult;
use crate::indexer::filesystem::ProjectTree;
use crate::models::{is_documented_description, ColumnUpdatePayload, DescriptorFile};
use crate::store::yaml::{read_descriptor, write_descriptor};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub files_updated: usize,
    pub columns_updated: usize,
}

/// The payload's description for `column`, if it carries real text.
/// Blank answers and the sentinel are never broadcast.
fn documented_answer<'p>(payload: &'p ColumnUpdatePayload, column: &str) -> Option<&'p String> {
    payload
        .get(column)
        .and_then(|update| update.description.as_ref())
        .filter(|description| is_documented_description(Some(description.as_str())))
}

/// Overwrite the description of every same-named column in `document`.
/// Only descriptions are touched; tests and tags stay per-model.
pub fn propagate_into(document: &mut DescriptorFile, payload: &ColumnUpdatePayload) -> usize {
    let mut updated = 0;
    for model in &mut document.models {
        for column in &mut model.columns {
            let Some(description) = documented_answer(payload, &column.name) else {
                continue;
            };
            if column.description.as_ref() != Some(description) {
                column.description = Some(description.clone());
                updated += 1;
            }
        }
    }
    updated
}

/// Apply the payload's descriptions to every descriptor file in the tree.
/// Files with nothing to change are left untouched on disk.
pub fn propagate(tree: &ProjectTree, payload: &ColumnUpdatePayload) -> SugarResult<PropagationReport> {
    let mut report = PropagationReport::default();
    if payload.keys().all(|column| documented_answer(payload, column).is_none()) {
        return Ok(report);
    }
    for node in tree.descriptor_files() {
        let mut document = read_descriptor(&node.path)?;
        let updated = propagate_into(&mut document, payload);
        if updated == 0 {
            continue;
        }
        if write_descriptor(&node.path, &document)? {
            tracing::debug!(path = %node.path.display(), columns = updated, "descriptions propagated");
            report.files_updated += 1;
            report.columns_updated += updated;
        }
    }
    tracing::info!(
        files = report.files_updated,
        columns = report.columns_updated,
        "column descriptions propagated"
    );
    Ok(report)
}
