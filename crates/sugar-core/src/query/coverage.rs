//! Documentation and test coverage of models and projects.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::SugarResult;
use crate::indexer::descriptors::DescriptorIndex;
use crate::models::{DescriptorFile, COLUMN_NOT_DOCUMENTED};
use crate::store::yaml::read_descriptor;

/// Columns of `model` with a real description, in document order.
pub fn documented_columns(content: &DescriptorFile, model: &str) -> Vec<String> {
    content
        .model(model)
        .map(|entry| {
            entry
                .columns
                .iter()
                .filter(|c| c.is_documented())
                .map(|c| c.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Columns of `model` with a missing, blank or placeholder description.
pub fn undocumented_columns(content: &DescriptorFile, model: &str) -> Vec<String> {
    content
        .model(model)
        .map(|entry| {
            entry
                .columns
                .iter()
                .filter(|c| !c.is_documented())
                .map(|c| c.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Share of covered items, rounded to one decimal. Zero items is `0.0`.
pub fn coverage_percentage(misses: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = 1.0 - misses as f64 / total as f64;
    (ratio * 1000.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coverage {
    pub percentage: f64,
    pub missing: Vec<String>,
}

impl Coverage {
    fn from_missing(missing: Vec<String>, total: usize) -> Self {
        Self {
            percentage: coverage_percentage(missing.len(), total),
            missing,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelAudit {
    pub model: String,
    /// `None` when the model's entry lists no column.
    pub documentation: Option<Coverage>,
    /// `None` when the index has no entry for the model.
    pub tests: Option<Coverage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectAudit {
    pub documentation: IndexMap<String, f64>,
    pub documentation_total: f64,
    pub tests: IndexMap<String, f64>,
    pub tests_total: f64,
}

pub fn audit_model(content: &DescriptorFile, model: &str, index: &DescriptorIndex) -> ModelAudit {
    let undocumented = undocumented_columns(content, model);
    let total = undocumented.len() + documented_columns(content, model).len();
    let documentation = (total > 0).then(|| Coverage::from_missing(undocumented, total));

    let tests = index.model_tests(model).filter(|c| !c.is_empty()).map(|columns| {
        let untested: Vec<String> = columns
            .iter()
            .filter(|c| c.tests.is_empty())
            .map(|c| c.name.clone())
            .collect();
        Coverage::from_missing(untested, columns.len())
    });
    if tests.is_none() {
        tracing::info!(model, "no documentation entry for this model; run `doc` first");
    }

    ModelAudit {
        model: model.to_string(),
        documentation,
        tests,
    }
}

/// Per-model and overall coverage of every indexed model.
///
/// The overall documentation figure is taken over the index's column
/// descriptions, so a column name shared by several models counts once.
pub fn audit_project(index: &DescriptorIndex) -> SugarResult<ProjectAudit> {
    let mut documents: HashMap<PathBuf, DescriptorFile> = HashMap::new();
    let mut documentation = IndexMap::new();
    for (model, path) in index.models() {
        if !documents.contains_key(path) {
            documents.insert(path.clone(), read_descriptor(path)?);
        }
        let Some(content) = documents.get(path) else {
            continue;
        };
        let misses = undocumented_columns(content, model).len();
        let total = misses + documented_columns(content, model).len();
        documentation.insert(model.clone(), coverage_percentage(misses, total));
    }

    let descriptions = index.column_descriptions();
    let undocumented = descriptions
        .values()
        .filter(|d| d.as_str() == COLUMN_NOT_DOCUMENTED)
        .count();
    let documentation_total = coverage_percentage(undocumented, descriptions.len());

    let mut tests = IndexMap::new();
    let (mut untested, mut columns) = (0usize, 0usize);
    for (model, entries) in index.all_model_tests() {
        let misses = entries.iter().filter(|c| c.tests.is_empty()).count();
        untested += misses;
        columns += entries.len();
        tests.insert(model.clone(), coverage_percentage(misses, entries.len()));
    }

    Ok(ProjectAudit {
        documentation,
        documentation_total,
        tests,
        tests_total: coverage_percentage(untested, columns),
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn percent(value: f64) -> String {
    format!("{value:.1}")
}

/// Right-aligned two-column table.
pub fn render_table(title: &str, headers: [&str; 2], rows: &[(String, String)]) -> String {
    let left = rows
        .iter()
        .map(|(l, _)| l.len())
        .chain([headers[0].len()])
        .max()
        .unwrap_or(0);
    let right = rows
        .iter()
        .map(|(_, r)| r.len())
        .chain([headers[1].len()])
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "{title:^width$}", width = left + right + 3);
    let _ = writeln!(out, " {:>left$}   {:>right$}", headers[0], headers[1]);
    let _ = writeln!(out, " {}   {}", "-".repeat(left), "-".repeat(right));
    for (l, r) in rows {
        let _ = writeln!(out, " {l:>left$}   {r:>right$}");
    }
    out
}

/// Listed items followed by a blank row and the total; a fully covered
/// model shows `None`.
fn listing_rows(coverage: &Coverage) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = if coverage.missing.is_empty() {
        vec![("None".to_string(), String::new())]
    } else {
        coverage
            .missing
            .iter()
            .map(|c| (c.clone(), String::new()))
            .collect()
    };
    rows.push((String::new(), String::new()));
    rows.push(("Total".to_string(), percent(coverage.percentage)));
    rows
}

fn summary_rows(per_model: &IndexMap<String, f64>, total: f64) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = per_model
        .iter()
        .map(|(model, value)| (model.clone(), percent(*value)))
        .collect();
    rows.push((String::new(), String::new()));
    rows.push(("Total".to_string(), percent(total)));
    rows
}

impl ModelAudit {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(documentation) = &self.documentation {
            out.push_str(&render_table(
                "Documentation Coverage",
                ["Undocumented Columns", "% coverage"],
                &listing_rows(documentation),
            ));
        }
        if let Some(tests) = &self.tests {
            out.push('\n');
            out.push_str(&render_table(
                "Test Coverage",
                ["Untested Columns", "% coverage"],
                &listing_rows(tests),
            ));
        }
        out
    }
}

impl ProjectAudit {
    pub fn render(&self) -> String {
        let mut out = render_table(
            "Documentation Coverage",
            ["Model Name", "% coverage"],
            &summary_rows(&self.documentation, self.documentation_total),
        );
        out.push('\n');
        out.push_str(&render_table(
            "Test Coverage",
            ["Model Name", "% coverage"],
            &summary_rows(&self.tests, self.tests_total),
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::filesystem::ExclusionPolicy;
    use std::fs;
    use tempfile::TempDir;

    const CONTENT: &str = "\
models:
  - name: my_first_dbt_model
    columns:
      - name: id
        description: No description for this column.
        tests: [unique, not_null]
      - name: answer
        description: The answer.
      - name: question
        description: ''
";

    #[test]
    fn test_coverage_percentage() {
        assert_eq!(coverage_percentage(0, 0), 0.0);
        assert_eq!(coverage_percentage(1, 3), 66.7);
        assert_eq!(coverage_percentage(0, 4), 100.0);
        assert_eq!(coverage_percentage(4, 4), 0.0);
    }

    #[test]
    fn test_documented_and_undocumented_columns() {
        let content: DescriptorFile = serde_yaml::from_str(CONTENT).unwrap();
        assert_eq!(documented_columns(&content, "my_first_dbt_model"), vec!["answer"]);
        assert_eq!(
            undocumented_columns(&content, "my_first_dbt_model"),
            vec!["id", "question"]
        );
        assert!(documented_columns(&content, "missing").is_empty());
    }

    fn indexed_project() -> (TempDir, DescriptorIndex) {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();
        fs::write(models.join("schema.yml"), CONTENT).unwrap();
        fs::write(
            models.join("other.yml"),
            "models:\n  - name: second\n    columns:\n      - name: answer\n        description: The answer.\n        tests: [not_null]\n",
        )
        .unwrap();
        let index = DescriptorIndex::build(dir.path(), &ExclusionPolicy::default()).unwrap();
        (dir, index)
    }

    #[test]
    fn test_audit_model() {
        let (dir, index) = indexed_project();
        let content = read_descriptor(&dir.path().join("models/schema.yml")).unwrap();
        let audit = audit_model(&content, "my_first_dbt_model", &index);

        let documentation = audit.documentation.clone().unwrap();
        assert_eq!(documentation.percentage, 33.3);
        assert_eq!(documentation.missing, vec!["id", "question"]);
        let tests = audit.tests.clone().unwrap();
        assert_eq!(tests.percentage, 33.3);
        assert_eq!(tests.missing, vec!["answer", "question"]);

        let rendered = audit.render();
        assert!(rendered.contains("Documentation Coverage"));
        assert!(rendered.contains("Total"));
        assert!(rendered.contains("33.3"));
    }

    #[test]
    fn test_audit_project() {
        let (_dir, index) = indexed_project();
        let audit = audit_project(&index).unwrap();
        assert_eq!(audit.documentation["my_first_dbt_model"], 33.3);
        assert_eq!(audit.documentation["second"], 100.0);
        assert_eq!(audit.tests["second"], 100.0);
        assert_eq!(audit.tests_total, 50.0);
        // id, answer, question: only answer is documented.
        assert_eq!(audit.documentation_total, 33.3);

        let json = serde_json::to_value(&audit).unwrap();
        assert_eq!(json["tests_total"], 50.0);
    }

    #[test]
    fn test_render_table_alignment() {
        let rendered = render_table(
            "Test Coverage",
            ["Model Name", "% coverage"],
            &[("a".to_string(), "100.0".to_string())],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], " Model Name   % coverage");
        assert_eq!(lines[3], "          a        100.0");
    }
}
