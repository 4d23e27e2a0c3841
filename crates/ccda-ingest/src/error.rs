use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML: {source}")]
    Xml {
        #[from]
        source: quick_xml::Error,
    },

    #[error("malformed attribute: {source}")]
    Attr {
        #[from]
        source: quick_xml::events::attributes::AttrError,
    },

    #[error("invalid character reference: {source}")]
    Escape {
        #[from]
        source: quick_xml::escape::EscapeError,
    },

    #[error("document has no root element")]
    NoRootElement,
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
