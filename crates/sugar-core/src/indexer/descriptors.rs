//! Project-wide knowledge base built from every descriptor file.
//!
//! One pass over the [`ProjectTree`] records where each model is documented,
//! what each column has been described as, and which tests every model's
//! columns carry. Reconciliation reads from it to prefill new columns.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::SugarResult;
use crate::indexer::filesystem::{ExclusionPolicy, ProjectTree};
use crate::models::{
    is_documented_description, ColumnTests, DescriptorFile, COLUMN_NOT_DOCUMENTED,
};
use crate::store::yaml::read_descriptor;

/// Where prefilled column descriptions may come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionReuse {
    /// Any column with the same bare name, whatever model it belongs to.
    #[default]
    Global,
    /// Only the same model's own column. The global map is still available
    /// through [`DescriptorIndex::suggest_description`].
    ModelScoped,
}

#[derive(Clone, Debug, Default)]
pub struct DescriptorIndex {
    model_location: IndexMap<String, PathBuf>,
    column_description: IndexMap<String, String>,
    model_column_description: IndexMap<(String, String), String>,
    model_tests: IndexMap<String, Vec<ColumnTests>>,
}

impl DescriptorIndex {
    /// Walk `root` once and index every descriptor file found.
    pub fn build(root: &Path, policy: &ExclusionPolicy) -> SugarResult<Self> {
        let tree = ProjectTree::scan(root, policy)?;
        Self::from_tree(&tree, policy)
    }

    /// Index the descriptor files of an already scanned tree.
    ///
    /// An unreadable or empty descriptor aborts the build.
    pub fn from_tree(tree: &ProjectTree, policy: &ExclusionPolicy) -> SugarResult<Self> {
        let mut index = Self::default();
        let mut files = 0usize;
        for node in tree.descriptor_files() {
            let document = read_descriptor(&node.path)?;
            index.load_descriptor(&document, &node.path, policy);
            files += 1;
        }
        tracing::info!(
            files,
            models = index.model_location.len(),
            columns = index.column_description.len(),
            "descriptor index built"
        );
        Ok(index)
    }

    /// Register every non-excluded model of one parsed descriptor.
    pub fn load_descriptor(
        &mut self,
        document: &DescriptorFile,
        path: &Path,
        policy: &ExclusionPolicy,
    ) {
        for model in &document.models {
            if policy.is_model_excluded(&model.name) {
                tracing::debug!(model = %model.name, "skipping excluded model");
                continue;
            }
            if let Some(previous) = self
                .model_location
                .insert(model.name.clone(), path.to_path_buf())
            {
                if previous != path {
                    tracing::warn!(
                        model = %model.name,
                        previous = %previous.display(),
                        current = %path.display(),
                        "model documented in more than one descriptor file; keeping the last one"
                    );
                }
            }
            for column in &model.columns {
                self.record_description(&model.name, &column.name, column.description.as_deref());
                self.model_tests
                    .entry(model.name.clone())
                    .or_default()
                    .push(ColumnTests {
                        name: column.name.clone(),
                        tests: column.test_names(),
                    });
            }
            self.model_tests.entry(model.name.clone()).or_default();
        }
    }

    /// Record a description for `column` of `model`.
    ///
    /// A missing or blank description is stored as the sentinel, and a
    /// sentinel never replaces a real description in the global map.
    pub fn record_description(&mut self, model: &str, column: &str, description: Option<&str>) {
        let documented = is_documented_description(description);
        let text = match description {
            Some(text) if documented => text.to_string(),
            _ => COLUMN_NOT_DOCUMENTED.to_string(),
        };

        let keep_global = !documented
            && self
                .column_description
                .get(column)
                .is_some_and(|existing| existing != COLUMN_NOT_DOCUMENTED);
        if !keep_global {
            self.column_description
                .insert(column.to_string(), text.clone());
        }
        self.model_column_description
            .insert((model.to_string(), column.to_string()), text);
    }

    /// Prefill text for a new column under the given reuse strategy.
    pub fn description_for(&self, model: &str, column: &str, reuse: DescriptionReuse) -> String {
        let found = match reuse {
            DescriptionReuse::Global => self.column_description.get(column),
            DescriptionReuse::ModelScoped => self
                .model_column_description
                .get(&(model.to_string(), column.to_string())),
        };
        found
            .cloned()
            .unwrap_or_else(|| COLUMN_NOT_DOCUMENTED.to_string())
    }

    /// A documented description seen for any column of this name.
    pub fn suggest_description(&self, column: &str) -> Option<&str> {
        self.column_description
            .get(column)
            .map(String::as_str)
            .filter(|d| *d != COLUMN_NOT_DOCUMENTED)
    }

    pub fn model_location(&self, model: &str) -> Option<&Path> {
        self.model_location.get(model).map(PathBuf::as_path)
    }

    pub fn models(&self) -> &IndexMap<String, PathBuf> {
        &self.model_location
    }

    pub fn column_descriptions(&self) -> &IndexMap<String, String> {
        &self.column_description
    }

    pub fn model_tests(&self, model: &str) -> Option<&[ColumnTests]> {
        self.model_tests.get(model).map(Vec::as_slice)
    }

    pub fn all_model_tests(&self) -> &IndexMap<String, Vec<ColumnTests>> {
        &self.model_tests
    }

    pub fn is_empty(&self) -> bool {
        self.model_location.is_empty()
            && self.column_description.is_empty()
            && self.model_tests.is_empty()
    }
}

/// Drop excluded models from a parsed document.
pub fn remove_excluded_models(document: &mut DescriptorFile, policy: &ExclusionPolicy) {
    document
        .models
        .retain(|model| !policy.is_model_excluded(&model.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(source: &str) -> DescriptorFile {
        serde_yaml::from_str(source).unwrap()
    }

    fn policy_excluding(models: &[&str]) -> ExclusionPolicy {
        let models: Vec<String> = models.iter().map(|m| m.to_string()).collect();
        ExclusionPolicy::new(&[], &models).unwrap()
    }

    #[test]
    fn test_load_descriptor_registers_everything() {
        let doc = parse(
            "models:\n  - name: testmodel\n    columns:\n      - name: columnE\n        description: descriptionE\n        tests: [unique]\n      - name: columnF\n",
        );
        let mut index = DescriptorIndex::default();
        index.load_descriptor(&doc, Path::new("models/schema.yml"), &ExclusionPolicy::default());

        assert_eq!(
            index.model_location("testmodel"),
            Some(Path::new("models/schema.yml"))
        );
        assert_eq!(index.column_descriptions()["columnE"], "descriptionE");
        assert_eq!(index.column_descriptions()["columnF"], COLUMN_NOT_DOCUMENTED);
        let tests = index.model_tests("testmodel").unwrap();
        assert_eq!(tests[0].tests, vec!["unique"]);
        assert!(tests[1].tests.is_empty());
    }

    #[test]
    fn test_excluded_models_never_indexed() {
        let doc = parse(
            "models:\n  - name: test_model\n    columns:\n      - name: a\n        description: kept\n  - name: excluded_model\n    columns:\n      - name: secret\n        description: hidden\n",
        );
        let mut index = DescriptorIndex::default();
        index.load_descriptor(&doc, Path::new("schema.yml"), &policy_excluding(&["excluded_model"]));

        assert!(index.model_location("excluded_model").is_none());
        assert!(index.model_tests("excluded_model").is_none());
        assert!(!index.column_descriptions().contains_key("secret"));
        assert!(index.model_location("test_model").is_some());
    }

    #[test]
    fn test_remove_excluded_models() {
        let mut doc = parse("models:\n  - name: test_model\n  - name: excluded_model\n");
        remove_excluded_models(&mut doc, &policy_excluding(&["excluded_model"]));
        let names: Vec<&str> = doc.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["test_model"]);

        let mut doc = parse("models:\n  - name: test_model\n  - name: excluded_model\n");
        remove_excluded_models(&mut doc, &ExclusionPolicy::default());
        assert_eq!(doc.models.len(), 2);
    }

    #[test]
    fn test_record_description_sentinel_does_not_clobber() {
        let mut index = DescriptorIndex::default();
        index.record_description("a", "amount", Some("USD amount"));
        index.record_description("b", "amount", None);
        assert_eq!(index.column_descriptions()["amount"], "USD amount");
        assert_eq!(
            index.description_for("b", "amount", DescriptionReuse::ModelScoped),
            COLUMN_NOT_DOCUMENTED
        );

        index.record_description("c", "columnC", Some("descriptionC"));
        assert_eq!(index.column_descriptions()["columnC"], "descriptionC");
        index.record_description("c", "columnD", None);
        assert_eq!(index.column_descriptions()["columnD"], COLUMN_NOT_DOCUMENTED);
    }

    #[test]
    fn test_description_strategies() {
        let mut index = DescriptorIndex::default();
        index.record_description("a", "amount", Some("USD amount"));

        assert_eq!(
            index.description_for("b", "amount", DescriptionReuse::Global),
            "USD amount"
        );
        assert_eq!(
            index.description_for("b", "amount", DescriptionReuse::ModelScoped),
            COLUMN_NOT_DOCUMENTED
        );
        assert_eq!(
            index.description_for("a", "amount", DescriptionReuse::ModelScoped),
            "USD amount"
        );
        assert_eq!(index.suggest_description("amount"), Some("USD amount"));
        assert_eq!(
            index.description_for("a", "unseen", DescriptionReuse::Global),
            COLUMN_NOT_DOCUMENTED
        );
    }

    #[test]
    fn test_build_on_empty_project() {
        let dir = TempDir::new().unwrap();
        let index = DescriptorIndex::build(dir.path(), &ExclusionPolicy::default()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_build_fails_on_empty_descriptor() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/schema.yml"), "").unwrap();
        assert!(DescriptorIndex::build(dir.path(), &ExclusionPolicy::default()).is_err());
    }
}
