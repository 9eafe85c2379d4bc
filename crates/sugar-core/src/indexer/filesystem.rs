//! Filesystem scanning for a dbt project.
//!
//! The project is walked once per run into an arena of [`FileNode`]s that
//! reference each other by index. Indexing, model resolution and description
//! propagation are all answered from that snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::errors::{SugarError, SugarResult};

/// Directories dbt itself writes into; never scanned.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &["target", "dbt_modules"];

/// YAML files that live in a project but never describe models.
const EXCLUDED_DESCRIPTOR_FILES: &[&str] = &[
    "dbt_project.yml",
    "packages.yml",
    "dependencies.yml",
    "selectors.yml",
    "profiles.yml",
];

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git"];

const DESCRIPTOR_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Extension of model source files.
pub const MODEL_SOURCE_EXTENSION: &str = "sql";

/// File name given to descriptor files the engine creates itself.
pub const DEFAULT_DESCRIPTOR_FILENAME: &str = "schema.yml";

// ---------------------------------------------------------------------------
// Exclusion policy
// ---------------------------------------------------------------------------

/// Which paths, files and models a run must ignore.
#[derive(Clone, Debug)]
pub struct ExclusionPolicy {
    folder_pattern: Regex,
    excluded_files: Vec<String>,
    excluded_models: Vec<String>,
}

impl ExclusionPolicy {
    pub fn new(excluded_folders: &[String], excluded_models: &[String]) -> SugarResult<Self> {
        let folder_pattern = build_folder_pattern(excluded_folders);
        let folder_pattern = Regex::new(&folder_pattern)
            .map_err(|e| SugarError::Config(format!("invalid excluded folder pattern: {e}")))?;
        Ok(Self {
            folder_pattern,
            excluded_files: EXCLUDED_DESCRIPTOR_FILES
                .iter()
                .map(|f| f.to_string())
                .collect(),
            excluded_models: excluded_models.to_vec(),
        })
    }

    /// The compiled folder pattern, e.g. `\/target\/|\/dbt_modules\/`.
    pub fn folder_pattern(&self) -> &str {
        self.folder_pattern.as_str()
    }

    /// `relative` is the path below the project root, `/`-separated.
    pub fn is_excluded_dir(&self, relative: &str) -> bool {
        if relative.is_empty() {
            return false;
        }
        self.folder_pattern.is_match(&format!("/{relative}/"))
    }

    pub fn is_descriptor_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext));
        has_extension && !self.excluded_files.iter().any(|f| f == name)
    }

    pub fn is_model_excluded(&self, model: &str) -> bool {
        self.excluded_models.iter().any(|m| m == model)
    }

    pub fn excluded_models(&self) -> &[String] {
        &self.excluded_models
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            folder_pattern: Regex::new(&build_folder_pattern(&[]))
                .expect("default folder pattern is valid"),
            excluded_files: EXCLUDED_DESCRIPTOR_FILES
                .iter()
                .map(|f| f.to_string())
                .collect(),
            excluded_models: Vec::new(),
        }
    }
}

fn build_folder_pattern(excluded_folders: &[String]) -> String {
    DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(|d| d.to_string())
        .chain(
            excluded_folders
                .iter()
                .map(|f| f.trim().trim_matches('/').to_string())
                .filter(|f| !f.is_empty()),
        )
        .map(|folder| format!(r"\/{}\/", regex::escape(&folder)))
        .collect::<Vec<_>>()
        .join("|")
}

// ---------------------------------------------------------------------------
// Arena tree
// ---------------------------------------------------------------------------

pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Dir,
    File,
}

#[derive(Clone, Debug)]
pub struct FileNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeKind,
    pub is_descriptor: bool,
}

impl FileNode {
    /// File name without its extension, i.e. the model name for a source.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some(extension)
    }
}

/// One-pass snapshot of the project tree. Node 0 is the root directory;
/// node order is depth-first walk order (files before subdirectories,
/// each group by name).
#[derive(Clone, Debug)]
pub struct ProjectTree {
    root: PathBuf,
    nodes: Vec<FileNode>,
    by_path: HashMap<PathBuf, NodeId>,
}

impl ProjectTree {
    pub fn scan(root: &Path, policy: &ExclusionPolicy) -> SugarResult<Self> {
        let mut nodes: Vec<FileNode> = Vec::new();
        let mut by_path: HashMap<PathBuf, NodeId> = HashMap::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if IMPLICIT_IGNORED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                !policy.is_excluded_dir(&relative_path(root, entry.path()))
            });

        for entry in walker {
            let entry = entry?;
            let path = entry.path().to_path_buf();
            let kind = if entry.file_type().is_dir() {
                NodeKind::Dir
            } else {
                NodeKind::File
            };
            let parent = if entry.depth() == 0 {
                None
            } else {
                path.parent().and_then(|p| by_path.get(p).copied())
            };
            let id = nodes.len();
            let is_descriptor = kind == NodeKind::File && policy.is_descriptor_file(&path);

            nodes.push(FileNode {
                id,
                parent,
                children: Vec::new(),
                name: entry.file_name().to_string_lossy().into_owned(),
                path: path.clone(),
                kind,
                is_descriptor,
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(id);
            }
            by_path.insert(path, id);
        }

        tracing::debug!(root = %root.display(), nodes = nodes.len(), "project tree scanned");
        Ok(Self {
            root: root.to_path_buf(),
            nodes,
            by_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node(&self, id: NodeId) -> &FileNode {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes[id].parent.map(|p| &self.nodes[p])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &FileNode> {
        self.nodes[id].children.iter().map(|c| &self.nodes[*c])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, path: &Path) -> Option<&FileNode> {
        self.by_path.get(path).map(|id| &self.nodes[*id])
    }

    /// Descriptor files in walk order.
    pub fn descriptor_files(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.iter().filter(|n| n.is_descriptor)
    }

    /// Model source files in walk order.
    pub fn model_sources(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::File && n.has_extension(MODEL_SOURCE_EXTENSION))
    }

    /// First source file whose stem is exactly `model`.
    pub fn find_model_source(&self, model: &str) -> Option<&FileNode> {
        self.model_sources().find(|n| n.stem() == Some(model))
    }

    /// Path of `file_name` inside the directory holding node `id`.
    pub fn sibling_path(&self, id: NodeId, file_name: &str) -> PathBuf {
        match self.parent(id) {
            Some(dir) => dir.path.join(file_name),
            None => self.root.join(file_name),
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_folder_pattern() {
        let policy = ExclusionPolicy::new(&["folder_to_exclude".to_string()], &[]).unwrap();
        assert_eq!(
            policy.folder_pattern(),
            r"\/target\/|\/dbt_modules\/|\/folder_to_exclude\/"
        );
        assert!(policy.is_excluded_dir("models/folder_to_exclude"));
        assert!(policy.is_excluded_dir("target"));
        assert!(!policy.is_excluded_dir("models/targets"));
    }

    #[test]
    fn test_is_descriptor_file() {
        let policy = ExclusionPolicy::default();
        assert!(policy.is_descriptor_file(Path::new("models/schema.yml")));
        assert!(policy.is_descriptor_file(Path::new("models/docs.yaml")));
        assert!(!policy.is_descriptor_file(Path::new("dbt_project.yml")));
        assert!(!policy.is_descriptor_file(Path::new("models/orders.sql")));
    }

    #[test]
    fn test_scan_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "dbt_project.yml");
        touch(dir.path(), "models/schema.yml");
        touch(dir.path(), "models/orders.sql");
        touch(dir.path(), "target/compiled/schema.yml");
        touch(dir.path(), "models/legacy/schema.yml");

        let policy = ExclusionPolicy::new(&["legacy".to_string()], &[]).unwrap();
        let tree = ProjectTree::scan(dir.path(), &policy).unwrap();

        let descriptors: Vec<PathBuf> = tree.descriptor_files().map(|n| n.path.clone()).collect();
        assert_eq!(descriptors, vec![dir.path().join("models/schema.yml")]);
        assert!(tree.lookup(&dir.path().join("target")).is_none());
    }

    #[test]
    fn test_walk_order_files_before_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "models/a/orders.sql");
        touch(dir.path(), "models/orders.sql");

        let tree = ProjectTree::scan(dir.path(), &ExclusionPolicy::default()).unwrap();
        let found = tree.find_model_source("orders").unwrap();
        assert_eq!(found.path, dir.path().join("models/orders.sql"));
    }

    #[test]
    fn test_parent_links_and_sibling_path() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "models/staging/stg_orders.sql");

        let tree = ProjectTree::scan(dir.path(), &ExclusionPolicy::default()).unwrap();
        let source = tree.find_model_source("stg_orders").unwrap();
        let parent = tree.parent(source.id).unwrap();
        assert_eq!(parent.name, "staging");
        assert!(tree.children(parent.id).any(|c| c.id == source.id));
        assert_eq!(
            tree.sibling_path(source.id, DEFAULT_DESCRIPTOR_FILENAME),
            dir.path().join("models/staging/schema.yml")
        );
        assert!(tree.node(0).parent.is_none());
    }
}
