//! Descriptor file persistence.
//!
//! Reads go through `serde_yaml` into the typed [`DescriptorFile`]; writes
//! serialize the whole document into a sibling temp file and rename it over
//! the target, so a model's entry is never left half-written.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::errors::{SugarError, SugarResult};
use crate::models::DescriptorFile;

/// Read any YAML document, failing on a missing file or one with no content.
pub fn open_yaml<T: DeserializeOwned>(path: &Path) -> SugarResult<T> {
    if !path.is_file() {
        return Err(SugarError::DescriptorNotFound(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), "opening yaml");
    let source = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&source)?;
    if is_empty_document(&value) {
        return Err(SugarError::DescriptorEmpty(path.to_path_buf()));
    }
    Ok(serde_yaml::from_value(value)?)
}

fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Mapping(map) => map.is_empty(),
        Value::Sequence(seq) => seq.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parse a descriptor file.
pub fn read_descriptor(path: &Path) -> SugarResult<DescriptorFile> {
    open_yaml(path)
}

/// Parse a descriptor file if one sits at `path`.
pub fn read_descriptor_if_exists(path: &Path) -> SugarResult<Option<DescriptorFile>> {
    if path.is_file() {
        read_descriptor(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Persist a descriptor document.
///
/// Documents without any model entry are never written, so a stray call can
/// not truncate an unrelated YAML file. Returns whether the file was written.
pub fn write_descriptor(path: &Path, document: &DescriptorFile) -> SugarResult<bool> {
    if document.models.is_empty() {
        tracing::debug!(path = %path.display(), "skipping write of descriptor without models");
        return Ok(false);
    }
    let rendered = serde_yaml::to_string(document)?;
    let staging = staging_path(path);
    fs::write(&staging, rendered.as_bytes())?;
    fs::rename(&staging, path)?;
    tracing::debug!(path = %path.display(), "descriptor written");
    Ok(true)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".sugar-tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnEntry, ModelEntry};
    use tempfile::TempDir;

    #[test]
    fn test_read_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.yml");
        fs::write(
            &path,
            "models:\n  - name: model1\n    columns:\n      - name: column1\n        description: description1\n",
        )
        .unwrap();
        let doc = read_descriptor(&path).unwrap();
        let column = doc.model("model1").unwrap().column("column1").unwrap();
        assert_eq!(column.description.as_deref(), Some("description1"));
    }

    #[test]
    fn test_read_empty_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.yml");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_descriptor(&path),
            Err(SugarError::DescriptorEmpty(_))
        ));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_descriptor(&dir.path().join("nope.yml")),
            Err(SugarError::DescriptorNotFound(_))
        ));
        assert!(read_descriptor_if_exists(&dir.path().join("nope.yml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.yml");
        let mut doc = DescriptorFile::new();
        let mut model = ModelEntry::new("model1");
        model.push_column(ColumnEntry::new("column1", "description1"));
        doc.push_model(model);

        assert!(write_descriptor(&path, &doc).unwrap());
        assert_eq!(read_descriptor(&path).unwrap(), doc);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_write_without_models_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packages.yml");
        fs::write(&path, "packages:\n  - package: dbt-labs/dbt_utils\n").unwrap();

        let doc = DescriptorFile::new();
        assert!(!write_descriptor(&path, &doc).unwrap());
        let untouched = fs::read_to_string(&path).unwrap();
        assert!(untouched.contains("dbt_utils"));
    }
}
