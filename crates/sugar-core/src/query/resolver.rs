//! Model name to source file and descriptor file resolution.

use std::path::{Path, PathBuf};

use crate::errors::{SugarError, SugarResult};
use crate::indexer::descriptors::DescriptorIndex;
use crate::indexer::filesystem::{ExclusionPolicy, ProjectTree, DEFAULT_DESCRIPTOR_FILENAME};

/// Documentation state of a model, as far as the project tree tells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelResolution {
    /// No `<model>.sql` anywhere in the project.
    SourceNotFound,
    /// The source exists but no descriptor mentions the model yet. The
    /// descriptor path is the conventional file next to the source, which
    /// may or may not exist already.
    Undocumented {
        source: PathBuf,
        descriptor: PathBuf,
        descriptor_exists: bool,
    },
    /// The index knows which descriptor documents the model.
    Documented { source: PathBuf, descriptor: PathBuf },
}

impl ModelResolution {
    pub fn descriptor_path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound => None,
            Self::Undocumented { descriptor, .. } | Self::Documented { descriptor, .. } => {
                Some(descriptor.as_path())
            }
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        match self {
            Self::SourceNotFound => None,
            Self::Undocumented { source, .. } | Self::Documented { source, .. } => Some(source.as_path()),
        }
    }

    pub fn descriptor_exists(&self) -> bool {
        match self {
            Self::SourceNotFound => false,
            Self::Undocumented {
                descriptor_exists, ..
            } => *descriptor_exists,
            Self::Documented { .. } => true,
        }
    }

    pub fn is_already_documented(&self) -> bool {
        matches!(self, Self::Documented { .. })
    }

    /// `(descriptor path, descriptor exists, already documented)`.
    pub fn as_tuple(&self) -> (Option<PathBuf>, bool, bool) {
        (
            self.descriptor_path().map(Path::to_path_buf),
            self.descriptor_exists(),
            self.is_already_documented(),
        )
    }
}

/// Find a model's source and descriptor.
///
/// The first source file in walk order wins; duplicates elsewhere in the
/// tree are not detected.
pub fn resolve_model(tree: &ProjectTree, index: &DescriptorIndex, model: &str) -> ModelResolution {
    let Some(source) = tree.find_model_source(model) else {
        tracing::debug!(model, "no source file found");
        return ModelResolution::SourceNotFound;
    };

    match index.model_location(model) {
        Some(descriptor) => ModelResolution::Documented {
            source: source.path.clone(),
            descriptor: descriptor.to_path_buf(),
        },
        None => {
            let descriptor = tree.sibling_path(source.id, DEFAULT_DESCRIPTOR_FILENAME);
            let descriptor_exists = tree.lookup(&descriptor).is_some() || descriptor.is_file();
            ModelResolution::Undocumented {
                source: source.path.clone(),
                descriptor,
                descriptor_exists,
            }
        }
    }
}

/// Refuse to work on a model the project explicitly excludes.
pub fn ensure_not_excluded(policy: &ExclusionPolicy, model: &str) -> SugarResult<()> {
    if policy.is_model_excluded(model) {
        return Err(SugarError::ModelExcluded(model.to_string()));
    }
    Ok(())
}
