//! Error types for the sugar core library.

use std::path::PathBuf;

/// Top-level error enum for the sugar core library.
#[derive(Debug, thiserror::Error)]
pub enum SugarError {
    #[error("Descriptor file {0} was not found")]
    DescriptorNotFound(PathBuf),

    #[error("Descriptor file {0} seems empty")]
    DescriptorEmpty(PathBuf),

    #[error("Could not find model '{model}' in the project at {root}")]
    ModelNotFound { model: String, root: PathBuf },

    #[error("Model '{0}' is listed in excluded_models and cannot be targeted")]
    ModelExcluded(String),

    #[error("Model '{0}' has no entry in the descriptor document")]
    ModelNotInDescriptor(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Syrup '{0}' could not be found in the config file")]
    SyrupNotFound(String),

    #[error("No syrup was passed and the config file has no default syrup")]
    NoSyrupProvided,

    #[error("Syrup '{0}' does not declare any dbt project")]
    MissingDbtProjects(String),

    #[error("Syrup '{0}' declares more than one dbt project; only one project per syrup is supported")]
    MultipleDbtProjects(String),

    #[error("Test runner error: {0}")]
    TestRunner(String),

    #[error("Test run for model '{model}' did not finish within {seconds}s")]
    TestRunnerTimeout { model: String, seconds: u64 },

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type SugarResult<T> = Result<T, SugarError>;
