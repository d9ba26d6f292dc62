use thiserror::Error;

pub type FormResult<T> = Result<T, FormError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("YAML error: {0}")]
    YamlError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate id '{id}': component ids must be unique across all stores")]
    DuplicateId { id: String },

    #[error("Component '{id}' is owned by both '{first}' and '{second}'")]
    SharedChild {
        id: String,
        first: String,
        second: String,
    },

    #[error("{kind} '{parent}' references missing child '{child}'")]
    MissingChild {
        kind: String,
        parent: String,
        child: String,
    },

    #[error("{kind} '{id}' not found")]
    ComponentNotFound { kind: String, id: String },

    #[error("Unknown component kind '{0}'")]
    UnknownKind(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path '{path}' is read-only")]
    ReadOnlyPath { path: String },

    #[error("A {parent} cannot contain a {child}")]
    InvalidChild { parent: String, child: String },

    #[error("Unknown control '{0}'")]
    UnknownControl(String),

    #[error("Invalid width '{value}': expected a percentage such as '50.0%'")]
    InvalidWidth { value: String },

    #[error("Invalid component address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("A drag operation is already in progress")]
    DragInProgress,

    #[error("No drag operation is in progress")]
    NoActiveDrag,

    #[error("Resource '{location}' could not be loaded: {reason}")]
    ResourceUnavailable { location: String, reason: String },
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        FormError::ParseError {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for FormError {
    fn from(err: serde_yaml::Error) -> Self {
        FormError::YamlError(err.to_string())
    }
}
