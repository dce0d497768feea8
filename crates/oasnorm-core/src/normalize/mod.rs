pub mod context;
pub mod fields;
pub mod flatten;
pub mod naming;
pub mod responses;
pub mod sanitize;
pub mod signature;
pub mod walk;

use serde::Serialize;

use crate::config::NormalizeConfig;
use crate::error::NormalizeError;
use crate::parse::components::Components;
use crate::parse::reference::{ComponentSection, split_component_ref};
use crate::parse::spec::OpenApiSpec;

pub use context::{Diagnostic, DiagnosticKind, IdentifierMapping, NormalizationContext};
pub use fields::{ResolvedRecord, resolve, resolve_all};
pub use flatten::flatten;
pub use responses::check_bodyless_responses;
pub use sanitize::sanitize;

/// Outcome of a successful normalization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    /// Number of component schemas created by extraction.
    pub extracted: usize,
    /// `original -> sanitized` for every schema whose name changed.
    pub schema_renames: Vec<(String, String)>,
    /// `original -> sanitized` for every path parameter whose name changed.
    pub parameter_renames: Vec<(String, String)>,
    /// Records whose inherited fields were resolved.
    pub records: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the full pipeline on `spec` in place: bodyless response check, then
/// flatten, sanitize and field resolution, then a reference integrity check.
///
/// Recoverable problems end up in [`NormalizeReport::diagnostics`]; an `Err`
/// means the resulting document would contain a dangling reference.
pub fn normalize(
    spec: &mut OpenApiSpec,
    config: &NormalizeConfig,
) -> Result<NormalizeReport, NormalizeError> {
    let mut ctx = NormalizationContext::new(config.clone());

    check_bodyless_responses(spec, &mut ctx);

    let before = schema_count(spec);
    if ctx.config.flatten.enabled {
        flatten(spec, &mut ctx);
    }
    let extracted = schema_count(spec).saturating_sub(before);

    if ctx.config.sanitize.enabled {
        sanitize(spec, &mut ctx);
    }

    let records = if ctx.config.resolve_fields.enabled {
        resolve_all(spec, &mut ctx)?.len()
    } else {
        0
    };

    verify_references(spec)?;

    let schema_renames = owned_renames(&ctx.schema_names);
    let parameter_renames = owned_renames(&ctx.parameter_names);
    log::debug!(
        "normalized {}: {} extracted, {} schemas renamed, {} parameters renamed, {} records",
        spec.info.title,
        extracted,
        schema_renames.len(),
        parameter_renames.len(),
        records
    );

    Ok(NormalizeReport {
        extracted,
        schema_renames,
        parameter_renames,
        records,
        diagnostics: ctx.into_diagnostics(),
    })
}

/// Check that every internal `#/components/...` reference names an existing
/// entry, and that a pointer into an entry (`.../Pet/properties/name`)
/// lands on something.
pub fn verify_references(spec: &OpenApiSpec) -> Result<(), NormalizeError> {
    let empty = Components::default();
    let components = spec.components.as_ref().unwrap_or(&empty);

    for site in walk::collect_refs(spec) {
        let Some(pointer) = split_component_ref(&site.ref_path)? else {
            continue;
        };
        let resolves = match component_value(components, pointer.section, &pointer.name) {
            Some(value) => pointer.tail.is_empty() || value.pointer(&pointer.tail).is_some(),
            None => false,
        };
        if !resolves {
            return Err(NormalizeError::DanglingReference {
                ref_path: site.ref_path,
                location: site.location,
            });
        }
    }
    Ok(())
}

/// The named entry of a components section as plain JSON, for pointer lookups.
fn component_value(
    components: &Components,
    section: ComponentSection,
    name: &str,
) -> Option<serde_json::Value> {
    let value = match section {
        ComponentSection::Schemas => serde_json::to_value(components.schemas.get(name)?),
        ComponentSection::Responses => serde_json::to_value(components.responses.get(name)?),
        ComponentSection::Parameters => serde_json::to_value(components.parameters.get(name)?),
        ComponentSection::Examples => Ok(components.examples.get(name)?.clone()),
        ComponentSection::RequestBodies => {
            serde_json::to_value(components.request_bodies.get(name)?)
        }
        ComponentSection::Headers => serde_json::to_value(components.headers.get(name)?),
        ComponentSection::SecuritySchemes => {
            serde_json::to_value(components.security_schemes.get(name)?)
        }
        ComponentSection::Links => Ok(components.links.get(name)?.clone()),
        ComponentSection::Callbacks => serde_json::to_value(components.callbacks.get(name)?),
        ComponentSection::PathItems => serde_json::to_value(components.path_items.get(name)?),
    };
    value.ok()
}

fn schema_count(spec: &OpenApiSpec) -> usize {
    spec.components.as_ref().map_or(0, |c| c.schemas.len())
}

fn owned_renames(mapping: &IdentifierMapping) -> Vec<(String, String)> {
    mapping
        .renames()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::parse::schema::SchemaOrRef;

    #[test]
    fn dangling_reference_is_an_error() {
        let spec = parse::from_yaml(
            r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Pet:
      properties:
        owner: {$ref: "#/components/schemas/Owner"}
"##,
        )
        .unwrap();
        let err = verify_references(&spec).unwrap_err();
        match err {
            NormalizeError::DanglingReference { ref_path, location } => {
                assert_eq!(ref_path, "#/components/schemas/Owner");
                assert_eq!(location, "#/components/schemas/Pet/properties/owner");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pointers_into_components_are_resolved() {
        let mut spec = parse::from_yaml(
            r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Owner:
      properties:
        name: {type: string}
    Pet:
      properties:
        owner_name: {$ref: "#/components/schemas/Owner/properties/name"}
"##,
        )
        .unwrap();
        assert!(verify_references(&spec).is_ok());

        if let Some(SchemaOrRef::Schema(pet)) =
            spec.components.as_mut().unwrap().schemas.get_mut("Pet")
        {
            pet.properties.insert(
                "owner_age".to_string(),
                SchemaOrRef::Ref {
                    ref_path: "#/components/schemas/Owner/properties/age".to_string(),
                    siblings: Default::default(),
                },
            );
        }
        match verify_references(&spec).unwrap_err() {
            NormalizeError::DanglingReference { location, .. } => {
                assert_eq!(location, "#/components/schemas/Pet/properties/owner_age");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn external_references_are_not_checked() {
        let spec = parse::from_yaml(
            r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Pet:
      properties:
        owner: {$ref: "common.yaml#/Owner"}
"##,
        )
        .unwrap();
        assert!(verify_references(&spec).is_ok());
    }

    #[test]
    fn disabled_passes_leave_document_untouched() {
        let doc = r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /pets/{pet_id}:
    get:
      parameters:
        - {name: pet_id, in: path, required: true, schema: {type: string}}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                properties:
                  name: {type: string}
"#;
        let mut spec = parse::from_yaml(doc).unwrap();
        let original = spec.clone();
        let mut config = NormalizeConfig::default();
        config.flatten.enabled = false;
        config.sanitize.enabled = false;
        config.resolve_fields.enabled = false;

        let report = normalize(&mut spec, &config).unwrap();
        assert_eq!(spec, original);
        assert_eq!(report.extracted, 0);
        assert!(report.schema_renames.is_empty());
    }
}
