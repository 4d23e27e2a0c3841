use std::path::PathBuf;

use omop_model::{ModelError, TableTarget};

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("rule {rule} targets {table}, which is not rule-driven")]
    UnsupportedTarget { rule: String, table: TableTarget },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RuleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }
}
