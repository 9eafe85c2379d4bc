//! Project configuration.
//!
//! A config file holds one or more *syrups*: named bundles of settings
//! pointing at a dbt project. A run picks one syrup (by flag or by the
//! file's default) and flattens it into [`ProjectSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{SugarError, SugarResult};
use crate::indexer::descriptors::DescriptionReuse;
use crate::indexer::filesystem::ExclusionPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "sugar_config.yml";
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 600;

fn default_true() -> bool {
    true
}

fn default_test_command() -> Vec<String> {
    ["dbt", "test", "--models"].iter().map(|s| s.to_string()).collect()
}

fn default_test_timeout() -> u64 {
    DEFAULT_TEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub syrup: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DbtProjectConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub excluded_models: Vec<String>,
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    /// SQLite database holding the project's built models.
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub schema: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Syrup {
    pub name: String,
    #[serde(default)]
    pub dbt_projects: Vec<DbtProjectConfig>,
    #[serde(default = "default_true")]
    pub always_enforce_tests: bool,
    #[serde(default = "default_true")]
    pub always_add_tags: bool,
    #[serde(default)]
    pub description_reuse: DescriptionReuse,
    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SugarConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub syrups: Vec<Syrup>,
    /// Directory relative project paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl SugarConfig {
    pub fn load(path: &Path) -> SugarResult<Self> {
        if !path.is_file() {
            return Err(SugarError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        let source = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(path = %path.display(), "loading config");
        Self::parse(&source, base_dir)
    }

    pub fn parse(source: &str, base_dir: PathBuf) -> SugarResult<Self> {
        let mut config: Self = serde_yaml::from_str(source)?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Pick a syrup and flatten it with its single dbt project.
    pub fn select(&self, syrup: Option<&str>) -> SugarResult<ProjectSettings> {
        let name = syrup
            .or(self.defaults.syrup.as_deref())
            .ok_or(SugarError::NoSyrupProvided)?;
        let syrup = self
            .syrups
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SugarError::SyrupNotFound(name.to_string()))?;

        let project = match syrup.dbt_projects.as_slice() {
            [] => return Err(SugarError::MissingDbtProjects(syrup.name.clone())),
            [project] => project,
            _ => return Err(SugarError::MultipleDbtProjects(syrup.name.clone())),
        };

        let project_dir = self.resolve(&project.path);
        tracing::info!(syrup = %syrup.name, project = %project.name, dir = %project_dir.display(), "syrup selected");
        Ok(ProjectSettings {
            syrup: syrup.name.clone(),
            project_name: project.name.clone(),
            project_dir,
            excluded_models: project.excluded_models.clone(),
            excluded_folders: project.excluded_folders.clone(),
            database: project.database.as_deref().map(|p| self.resolve(p)),
            schema: project.schema.clone(),
            always_enforce_tests: syrup.always_enforce_tests,
            always_add_tags: syrup.always_add_tags,
            description_reuse: syrup.description_reuse,
            test_command: syrup.test_command.clone(),
            test_timeout: Duration::from_secs(syrup.test_timeout_secs),
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Everything a run needs to know about the selected project.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSettings {
    pub syrup: String,
    pub project_name: String,
    pub project_dir: PathBuf,
    pub excluded_models: Vec<String>,
    pub excluded_folders: Vec<String>,
    pub database: Option<PathBuf>,
    pub schema: Option<String>,
    pub always_enforce_tests: bool,
    pub always_add_tags: bool,
    pub description_reuse: DescriptionReuse,
    pub test_command: Vec<String>,
    pub test_timeout: Duration,
}

impl ProjectSettings {
    /// Settings for a bare project directory with every default applied.
    pub fn for_project(project_dir: PathBuf) -> Self {
        Self {
            syrup: String::new(),
            project_name: String::new(),
            project_dir,
            excluded_models: Vec::new(),
            excluded_folders: Vec::new(),
            database: None,
            schema: None,
            always_enforce_tests: true,
            always_add_tags: true,
            description_reuse: DescriptionReuse::default(),
            test_command: default_test_command(),
            test_timeout: Duration::from_secs(DEFAULT_TEST_TIMEOUT_SECS),
        }
    }

    /// `--no-ask-tests` / `--no-ask-tags` turn the syrup switches off.
    pub fn apply_cli_overrides(&mut self, no_ask_tests: bool, no_ask_tags: bool) {
        if no_ask_tests {
            self.always_enforce_tests = false;
        }
        if no_ask_tags {
            self.always_add_tags = false;
        }
    }

    pub fn exclusion_policy(&self) -> SugarResult<ExclusionPolicy> {
        ExclusionPolicy::new(&self.excluded_folders, &self.excluded_models)
    }

    /// Schema to look tables up in; SQLite's primary schema by default.
    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(crate::connectors::sqlite::DEFAULT_SCHEMA)
    }
}
