//! Whole-pipeline scenarios against real files on disk.

use std::fs;
use std::path::Path;

use sugar_core::document::ordering::normalize;
use sugar_core::document::reconcile::Reconciler;
use sugar_core::document::verification::{PendingVerification, VerificationState};
use sugar_core::indexer::descriptors::{DescriptionReuse, DescriptorIndex};
use sugar_core::indexer::filesystem::{ExclusionPolicy, ProjectTree};
use sugar_core::models::{ColumnUpdate, ColumnUpdatePayload, COLUMN_NOT_DOCUMENTED};
use sugar_core::query::resolver::{resolve_model, ModelResolution};
use sugar_core::runner::{TestRunReport, TestRunner};
use sugar_core::store::yaml::{read_descriptor, read_descriptor_if_exists, write_descriptor};
use sugar_core::SugarResult;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn index(root: &Path) -> (ProjectTree, DescriptorIndex) {
    let policy = ExclusionPolicy::default();
    let tree = ProjectTree::scan(root, &policy).unwrap();
    let index = DescriptorIndex::from_tree(&tree, &policy).unwrap();
    (tree, index)
}

#[test]
fn test_empty_project_yields_empty_index() {
    let dir = TempDir::new().unwrap();
    let (_, index) = index(dir.path());
    assert!(index.models().is_empty());
    assert!(index.column_descriptions().is_empty());
    assert!(index.all_model_tests().is_empty());
}

#[test]
fn test_reconcile_documented_model_against_warehouse() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/orders.sql", "select 1");
    write(
        dir.path(),
        "models/schema.yml",
        "version: 2\nmodels:\n  - name: orders\n    columns:\n      - name: id\n        description: order id\n",
    );
    let (tree, index) = index(dir.path());
    let resolution = resolve_model(&tree, &index, "orders");
    let descriptor = resolution.descriptor_path().unwrap().to_path_buf();
    assert!(resolution.is_already_documented());

    let reconciler = Reconciler::new(&index, DescriptionReuse::Global);
    let content = read_descriptor_if_exists(&descriptor).unwrap();
    let document = normalize(reconciler.reconcile(true, content, "orders", &columns(&["total", "id"])));
    write_descriptor(&descriptor, &document).unwrap();

    let written = read_descriptor(&descriptor).unwrap();
    let orders = written.model("orders").unwrap();
    let names: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "total"]);
    assert_eq!(orders.column("id").unwrap().description.as_deref(), Some("order id"));
    assert_eq!(
        orders.column("total").unwrap().description.as_deref(),
        Some(COLUMN_NOT_DOCUMENTED)
    );
}

#[test]
fn test_global_reuse_bleeds_across_models() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "models/a/schema.yml",
        "version: 2\nmodels:\n  - name: model_a\n    columns:\n      - name: amount\n        description: USD amount\n",
    );
    write(
        dir.path(),
        "models/b/schema.yml",
        "version: 2\nmodels:\n  - name: model_b_existing\n    columns:\n      - name: amount\n",
    );
    write(dir.path(), "models/b/model_b.sql", "select 1");
    let (tree, index) = index(dir.path());
    assert_eq!(index.column_descriptions()["amount"], "USD amount");

    let resolution = resolve_model(&tree, &index, "model_b");
    assert!(matches!(resolution, ModelResolution::Undocumented { descriptor_exists: true, .. }));
    let content = read_descriptor_if_exists(resolution.descriptor_path().unwrap()).unwrap();

    let global = Reconciler::new(&index, DescriptionReuse::Global);
    let document = global.reconcile(false, content.clone(), "model_b", &columns(&["amount"]));
    let amount = document.model("model_b").unwrap().column("amount").unwrap();
    assert_eq!(amount.description.as_deref(), Some("USD amount"));

    let scoped = Reconciler::new(&index, DescriptionReuse::ModelScoped);
    let document = scoped.reconcile(false, content, "model_b", &columns(&["amount"]));
    let amount = document.model("model_b").unwrap().column("amount").unwrap();
    assert_eq!(amount.description.as_deref(), Some(COLUMN_NOT_DOCUMENTED));
    assert_eq!(index.suggest_description("amount"), Some("USD amount"));
}

#[test]
fn test_create_path_never_writes_empty_descriptions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/fresh.sql", "select 1");
    let (tree, index) = index(dir.path());
    let resolution = resolve_model(&tree, &index, "fresh");
    assert_eq!(
        resolution.as_tuple(),
        (Some(dir.path().join("models/schema.yml")), false, false)
    );

    let reconciler = Reconciler::new(&index, DescriptionReuse::Global);
    let document = reconciler.reconcile(false, None, "fresh", &columns(&["a", "b"]));
    for column in &document.model("fresh").unwrap().columns {
        assert_eq!(column.description.as_deref(), Some(COLUMN_NOT_DOCUMENTED));
    }
}

struct ReportOnly(&'static str);

impl TestRunner for ReportOnly {
    fn run_model_tests(&self, _model: &str) -> SugarResult<TestRunReport> {
        Ok(TestRunReport::from_output(self.0))
    }
}

fn tests(names: &[&str]) -> ColumnUpdate {
    ColumnUpdate {
        tests: columns(names),
        ..ColumnUpdate::default()
    }
}

#[test]
fn test_failed_tests_are_rolled_back_once() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/model.sql", "select 1");
    let (_, index) = index(dir.path());
    let descriptor = dir.path().join("models/schema.yml");

    let reconciler = Reconciler::new(&index, DescriptionReuse::Global);
    let mut document = reconciler.reconcile(false, None, "model", &columns(&["A", "B"]));
    let mut payload = ColumnUpdatePayload::new();
    payload.insert("A".to_string(), tests(&["unique", "not_null"]));
    payload.insert("B".to_string(), tests(&["unique"]));
    let mut scratch = index.clone();
    sugar_core::document::reconcile::apply_payload(&mut document, "model", &payload, &mut scratch).unwrap();

    let mut verification = PendingVerification::new(descriptor.clone(), "model", &payload);
    verification.write(&normalize(document)).unwrap();
    let outcome = verification
        .verify(&ReportOnly("1 of 3 PASS unique_model_A ....... [PASS in 0.02s]"))
        .unwrap();
    assert_eq!(outcome.state, VerificationState::PartiallyRolledBack);

    let rolled_back = fs::read_to_string(&descriptor).unwrap();
    let document = read_descriptor(&descriptor).unwrap();
    let model = document.model("model").unwrap();
    assert_eq!(model.column("A").unwrap().test_names(), vec!["unique"]);
    assert!(model.column("B").unwrap().tests.is_none());

    // A second rollback with the same failures leaves the file byte for byte.
    assert!(!sugar_core::document::verification::delete_failed_tests(&descriptor, "model", &outcome.deleted).unwrap());
    assert_eq!(fs::read_to_string(&descriptor).unwrap(), rolled_back);
}
