//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("release config map is missing expected data key: '{key}'")]
    MissingReleaseKey { key: String },

    #[error("release data is malformed: {message}")]
    MalformedReleaseData { message: String },

    #[error("unknown environment type '{0}', expected one of: dev, staging, prod")]
    UnknownEnvType(String),

    #[error("invalid settings: {}", .problems.join(", "))]
    InvalidSettings { problems: Vec<String> },
}

pub type Result<T> = std::result::Result<T, CoreError>;
