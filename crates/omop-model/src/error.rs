use thiserror::Error;

use crate::record::OmopColumn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("record is missing required column {0}")]
    MissingColumn(OmopColumn),
    #[error("unrecognized target column name: {0}")]
    UnknownColumn(String),
    #[error("unrecognized target table name: {0}")]
    UnknownTable(String),
}
