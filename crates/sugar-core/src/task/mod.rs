//! Whole-run orchestration for the CLI commands.

pub mod audit;
pub mod bootstrap;
pub mod doc;

use crate::config::ProjectSettings;
use crate::errors::SugarResult;
use crate::indexer::descriptors::DescriptorIndex;
use crate::indexer::filesystem::{ExclusionPolicy, ProjectTree};

/// The scanned project every task starts from.
#[derive(Debug)]
pub struct ProjectContext {
    pub policy: ExclusionPolicy,
    pub tree: ProjectTree,
    pub index: DescriptorIndex,
}

impl ProjectContext {
    /// Scan the project once and index its descriptors.
    pub fn load(settings: &ProjectSettings) -> SugarResult<Self> {
        let policy = settings.exclusion_policy()?;
        let tree = ProjectTree::scan(&settings.project_dir, &policy)?;
        let index = DescriptorIndex::from_tree(&tree, &policy)?;
        Ok(Self {
            policy,
            tree,
            index,
        })
    }
}
