use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}

/// Failures that indicate the normalized graph broke an invariant.
///
/// Recoverable conditions never end up here; they are reported as diagnostics.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("dangling reference {ref_path} at {location}")]
    DanglingReference { ref_path: String, location: String },

    #[error("invalid reference format: {0}")]
    InvalidRefFormat(String),

    #[error("record not found in component schemas: {0}")]
    UnknownRecord(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml_ng::Error,
    },
}
