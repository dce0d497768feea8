use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level normalization configuration loaded from `.oasnorm.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub naming: NamingConfig,
    pub flatten: PassToggle,
    pub sanitize: PassToggle,
    pub resolve_fields: PassToggle,
    pub responses: ResponsePolicy,
}

/// Identifier rules shared by schema and path-parameter names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefixed to identifiers that start with a digit, are reserved, or are empty.
    pub marker: String,
    /// Compared case-insensitively against the sanitized identifier.
    pub reserved_words: Vec<String>,
    /// Prefixed to a path parameter whose sanitized name shadows a schema name.
    pub parameter_collision_prefix: String,
    /// Stem for generated names when no identifier can be derived at all.
    pub fallback: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            marker: "X".to_string(),
            reserved_words: DEFAULT_RESERVED_WORDS
                .iter()
                .map(|w| w.to_string())
                .collect(),
            parameter_collision_prefix: "path".to_string(),
            fallback: "Unnamed".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn is_reserved(&self, ident: &str) -> bool {
        self.reserved_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case(ident))
    }
}

const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "abstract", "as", "async", "await", "boolean", "break", "const", "continue", "else",
    "enum", "extern", "false", "fn", "for", "function", "if", "impl", "import", "in", "int",
    "let", "loop", "map", "match", "mod", "null", "object", "record", "return", "self",
    "static", "string", "struct", "super", "table", "trait", "true", "type", "use", "where",
    "while",
];

/// Enables or disables a single pipeline pass.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PassToggle {
    pub enabled: bool,
}

impl Default for PassToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which status codes are expected to carry no response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponsePolicy {
    pub bodyless_status_codes: Vec<String>,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            bodyless_status_codes: ["1XX", "100", "101", "102", "103", "204", "205", "304"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ResponsePolicy {
    pub fn is_bodyless(&self, status: &str) -> bool {
        self.bodyless_status_codes
            .iter()
            .any(|code| code.eq_ignore_ascii_case(status))
    }
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".oasnorm.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<NormalizeConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: NormalizeConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# oasnorm configuration
naming:
  marker: X                       # prefix for digit-leading, reserved or empty names
  parameter_collision_prefix: path
  fallback: Unnamed
  # reserved_words: [type, record, string]

flatten:
  enabled: true        # extract inline objects and composed schemas into components
sanitize:
  enabled: true        # canonical schema and path parameter names
resolve_fields:
  enabled: true        # merge fields inherited through allOf

responses:
  bodyless_status_codes: ["1XX", "100", "101", "102", "103", "204", "205", "304"]
"#
}
