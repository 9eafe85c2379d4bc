//! Canonical ordering of descriptor documents.
//!
//! Key order inside an entry is fixed by the models' serializers (`name`,
//! `description`, then the other keys in the order they were read). This module
//! sorts the lists: columns within a model, models within a document, both
//! by case-insensitive name. Sorting is stable, so the result is idempotent.

use crate::models::{DescriptorFile, ModelEntry};

fn sort_key(name: &str) -> String {
    name.to_lowercase()
}

pub fn sort_columns(model: &mut ModelEntry) {
    model
        .columns
        .sort_by(|a, b| sort_key(&a.name).cmp(&sort_key(&b.name)));
}

/// Sort columns, then models, in place.
pub fn normalize_in_place(document: &mut DescriptorFile) {
    for model in &mut document.models {
        sort_columns(model);
    }
    document
        .models
        .sort_by(|a, b| sort_key(&a.name).cmp(&sort_key(&b.name)));
}

pub fn normalize(mut document: DescriptorFile) -> DescriptorFile {
    normalize_in_place(&mut document);
    document
}
