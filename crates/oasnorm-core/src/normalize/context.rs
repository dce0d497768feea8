use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::NormalizeConfig;

use super::signature::SignatureStore;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    FieldTypeConflict,
    NameCollision,
    EmptyResponseWithBody,
    NamingFallback,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::FieldTypeConflict => "FIELD_TYPE_CONFLICT",
            DiagnosticKind::NameCollision => "NAME_COLLISION",
            DiagnosticKind::EmptyResponseWithBody => "EMPTY_RESPONSE_WITH_BODY",
            DiagnosticKind::NamingFallback => "NAMING_FALLBACK",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable problem found while normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Where in the document the problem was found, e.g. `#/components/schemas/Pet`.
    pub location: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.message, self.location)
    }
}

/// Original identifier -> sanitized identifier for one namespace.
///
/// An assignment never changes once made, and no two originals share a sanitized name.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMapping {
    assigned: IndexMap<String, String>,
    taken: HashSet<String>,
}

impl IdentifierMapping {
    pub fn get(&self, original: &str) -> Option<&str> {
        self.assigned.get(original).map(String::as_str)
    }

    pub fn is_taken(&self, sanitized: &str) -> bool {
        self.taken.contains(sanitized)
    }

    /// Record `original -> sanitized`. Returns `false` if either side is already bound.
    pub fn assign(&mut self, original: &str, sanitized: &str) -> bool {
        if self.assigned.contains_key(original) || self.taken.contains(sanitized) {
            return false;
        }
        self.taken.insert(sanitized.to_string());
        self.assigned
            .insert(original.to_string(), sanitized.to_string());
        true
    }

    /// Only the entries whose name actually changed.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assigned
            .iter()
            .filter(|(from, to)| from != to)
            .map(|(from, to)| (from.as_str(), to.as_str()))
    }
}

/// State threaded through every pass of one normalization run.
///
/// Each document gets its own context; nothing is shared between runs.
#[derive(Debug, Default)]
pub struct NormalizationContext {
    pub config: NormalizeConfig,
    pub signatures: SignatureStore,
    pub schema_names: IdentifierMapping,
    pub parameter_names: IdentifierMapping,
    diagnostics: Vec<Diagnostic>,
}

impl NormalizationContext {
    pub fn new(config: NormalizeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        message: impl Into<String>,
        location: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
            location: location.into(),
        };
        log::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_assignments_are_immutable() {
        let mut mapping = IdentifierMapping::default();
        assert!(mapping.assign("pet_owner", "PetOwner"));
        assert!(!mapping.assign("pet_owner", "Other"));
        assert!(!mapping.assign("pet-owner", "PetOwner"));
        assert_eq!(mapping.get("pet_owner"), Some("PetOwner"));
        assert!(mapping.is_taken("PetOwner"));
    }

    #[test]
    fn renames_skip_identity_entries() {
        let mut mapping = IdentifierMapping::default();
        mapping.assign("Pet", "Pet");
        mapping.assign("pet_owner", "PetOwner");
        let renames: Vec<_> = mapping.renames().collect();
        assert_eq!(renames, vec![("pet_owner", "PetOwner")]);
        assert_eq!(mapping.get("Pet"), Some("Pet"));
    }

    #[test]
    fn diagnostic_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&DiagnosticKind::FieldTypeConflict).unwrap();
        assert_eq!(json, "\"FIELD_TYPE_CONFLICT\"");
    }

    #[test]
    fn report_accumulates_in_order() {
        let mut ctx = NormalizationContext::default();
        ctx.report(DiagnosticKind::NameCollision, "first", "#/a");
        ctx.report(DiagnosticKind::EmptyResponseWithBody, "second", "#/b");
        let kinds: Vec<_> = ctx.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::NameCollision,
                DiagnosticKind::EmptyResponseWithBody
            ]
        );
    }
}
