use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse yaml {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A schema record is structurally wrong (e.g. `func` is not a string).
    #[error("{loc}: {message}")]
    SchemaMalformed { loc: String, message: String },
    #[error("invalid function schema `{text}`: {reason}")]
    SchemaParse { text: String, reason: String },
    #[error("operator {0} is not declared in the native functions")]
    UnknownOperator(String),
    #[error("invalid operator selection: {0}")]
    InvalidSelector(String),
    #[error("unknown dispatch key {0}")]
    UnknownDispatchKey(String),
    #[error("target {target} is not handled by {generator}")]
    UnsupportedTarget {
        target: String,
        generator: &'static str,
    },
    #[error("cannot translate argument `{goal}` for {context}")]
    Translate { goal: String, context: String },
}

impl CodegenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CodegenError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        CodegenError::Yaml {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn schema_parse(text: &str, reason: impl Into<String>) -> Self {
        CodegenError::SchemaParse {
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(loc: impl Into<String>, message: impl Into<String>) -> Self {
        CodegenError::SchemaMalformed {
            loc: loc.into(),
            message: message.into(),
        }
    }
}
