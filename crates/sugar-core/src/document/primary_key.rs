//! Primary-key test synthesis from a model's configuration block.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SugarResult;
use crate::models::{
    merge_identifiers, ColumnUpdatePayload, DescriptorFile, NOT_NULL_TEST, UNIQUE_TEST,
};

static CONFIG_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{\s*config\s*\((.*?)\)\s*\}\}").unwrap());

static UNIQUE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"unique_key\s*=\s*['"]([^'"]+)['"]"#).unwrap());

/// The single-column `unique_key` declared in a `{{ config(...) }}` block.
///
/// Composite keys (lists) are not treated as a primary key.
pub fn extract_primary_key(source: &str) -> Option<String> {
    CONFIG_BLOCK_RE
        .captures_iter(source)
        .filter_map(|block| {
            let body = block.get(1)?.as_str();
            UNIQUE_KEY_RE
                .captures(body)
                .and_then(|key| key.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .find(|key| !key.is_empty())
}

/// Add `unique` and `not_null` to the pending tests of the model's key
/// column when either is missing from the descriptor. Both are added, so the
/// one already present is verified again along with the new one.
///
/// A model without a declared key, or whose key column is already fully
/// tested, leaves the payload unchanged.
pub fn synthesize_primary_key_tests(
    source_path: &Path,
    model: &str,
    content: &DescriptorFile,
    mut payload: ColumnUpdatePayload,
) -> SugarResult<ColumnUpdatePayload> {
    let source = fs::read_to_string(source_path)?;
    let Some(key) = extract_primary_key(&source) else {
        tracing::info!(model, "no unique_key configured; no primary key tests added");
        return Ok(payload);
    };

    let column = content.model(model).and_then(|entry| entry.column(&key));
    let fully_tested = [UNIQUE_TEST, NOT_NULL_TEST]
        .into_iter()
        .all(|test| column.is_some_and(|c| c.has_test(test)));
    if fully_tested {
        tracing::info!(model, column = %key, "primary key already tested");
        return Ok(payload);
    }

    let integrity = [UNIQUE_TEST.to_string(), NOT_NULL_TEST.to_string()];
    let update = payload.entry(key.clone()).or_default();
    update.tests = merge_identifiers(&update.tests, &integrity);
    tracing::info!(model, column = %key, tests = ?update.tests, "primary key tests added");
    Ok(payload)
}
