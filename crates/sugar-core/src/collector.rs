//! Collection of documentation answers.
//!
//! The interactive prompt layer lives outside the core. Anything that can
//! turn a list of candidate columns into a [`ColumnUpdatePayload`] plugs in
//! through [`DocumentationCollector`]; the CLI ships a collector that reads
//! prepared answers from a YAML file.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::{SugarError, SugarResult};
use crate::models::{ColumnUpdate, ColumnUpdatePayload};

/// Which columns are being offered to the collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentationMode {
    /// Columns still carrying the placeholder description.
    Undocumented,
    /// Columns that already have a real description and may be revised.
    AlreadyDocumented,
}

/// Which kinds of answers a collector should gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectOptions {
    pub ask_tests: bool,
    pub ask_tags: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            ask_tests: true,
            ask_tags: true,
        }
    }
}

pub trait DocumentationCollector {
    /// A new model-level description, or `None` to keep the current one.
    fn model_description(&mut self, model: &str, current: Option<&str>) -> SugarResult<Option<String>>;

    /// Updates for any subset of `candidates`.
    fn collect_columns(
        &mut self,
        model: &str,
        candidates: &[String],
        mode: DocumentationMode,
    ) -> SugarResult<ColumnUpdatePayload>;
}

// ---------------------------------------------------------------------------
// Answers file
// ---------------------------------------------------------------------------

/// Prepared answers for one documentation run.
///
/// ```yaml
/// model_description: Orders placed on the web shop.
/// columns:
///   order_id:
///     description: Primary key of the order.
///     tests: [unique, not_null]
///   status:
///     description: Current fulfilment status.
///     tags: [ops]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AnswersFile {
    #[serde(default)]
    pub model_description: Option<String>,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnUpdate>,
}

impl AnswersFile {
    pub fn load(path: &Path) -> SugarResult<Self> {
        let source = fs::read_to_string(path).map_err(|err| {
            SugarError::Collector(format!("cannot read answers file {}: {err}", path.display()))
        })?;
        let value: Value = serde_yaml::from_str(&source)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }
}

#[derive(Clone, Debug)]
pub struct AnswersFileCollector {
    path: PathBuf,
    answers: AnswersFile,
    options: CollectOptions,
}

impl AnswersFileCollector {
    pub fn load(path: &Path, options: CollectOptions) -> SugarResult<Self> {
        Ok(Self::new(path.to_path_buf(), AnswersFile::load(path)?, options))
    }

    pub fn new(path: PathBuf, answers: AnswersFile, options: CollectOptions) -> Self {
        Self {
            path,
            answers,
            options,
        }
    }
}

impl DocumentationCollector for AnswersFileCollector {
    fn model_description(&mut self, model: &str, current: Option<&str>) -> SugarResult<Option<String>> {
        let description = self
            .answers
            .model_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty() && Some(*d) != current)
            .map(str::to_string);
        if description.is_some() {
            tracing::debug!(model, "model description taken from answers file");
        }
        Ok(description)
    }

    fn collect_columns(
        &mut self,
        model: &str,
        candidates: &[String],
        mode: DocumentationMode,
    ) -> SugarResult<ColumnUpdatePayload> {
        let mut payload = ColumnUpdatePayload::new();
        for column in candidates {
            let Some(answer) = self.answers.columns.get(column) else {
                continue;
            };
            let mut update = answer.clone();
            if !self.options.ask_tests {
                update.tests.clear();
            }
            if !self.options.ask_tags {
                update.tags.clear();
            }
            if update == ColumnUpdate::default() {
                continue;
            }
            payload.insert(column.clone(), update);
        }
        tracing::debug!(
            model,
            ?mode,
            answers = %self.path.display(),
            collected = payload.len(),
            "column answers collected"
        );
        Ok(payload)
    }
}
