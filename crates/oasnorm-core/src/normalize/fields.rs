//! Effective field sets for `allOf` records.
//!
//! A record is a component schema whose `allOf` lists at least one reference.
//! Its fields come from three places: its own `properties`, the properties of
//! its inline `allOf` members, and everything the referenced members contribute
//! (transitively). The first two are direct declarations and always win.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::NormalizeError;
use crate::parse::reference::{ComponentSection, component_ref};
use crate::parse::schema::{
    AdditionalProperties, CompositionKind, Schema, SchemaKind, SchemaOrRef, TypeSet,
};
use crate::parse::spec::OpenApiSpec;

use super::context::{Diagnostic, DiagnosticKind, NormalizationContext};

/// Where a resolved field's definition came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOrigin {
    /// Declared on the record itself or one of its inline `allOf` members.
    Direct,
    /// Adopted from an included component.
    Inherited { source: String },
}

/// One field of a resolved record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub origin: FieldOrigin,
    pub schema: SchemaOrRef,
    pub required: bool,
    /// Whether the definition was copied into the record's own `properties`.
    pub written_back: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub name: String,
    pub fields: Vec<ResolvedField>,
    /// Diagnostics raised while resolving this record (also kept in the context).
    pub diagnostics: Vec<Diagnostic>,
}

/// A single source's definition of a field.
#[derive(Debug, Clone)]
struct Contribution {
    source: String,
    schema: SchemaOrRef,
    required: bool,
}

/// field name -> contributions in source-traversal order.
type Provenance = IndexMap<String, Vec<Contribution>>;

/// Resolve the effective fields of `record_name` and write adopted inherited
/// fields back into its `properties`.
pub fn resolve(
    record_name: &str,
    spec: &mut OpenApiSpec,
    ctx: &mut NormalizationContext,
) -> Result<ResolvedRecord, NormalizeError> {
    let first_diagnostic = ctx.diagnostics().len();
    let schemas = spec
        .components
        .as_mut()
        .map(|c| &mut c.schemas)
        .ok_or_else(|| NormalizeError::UnknownRecord(record_name.to_string()))?;

    let record = match schemas.get(record_name) {
        Some(SchemaOrRef::Schema(record)) => record,
        Some(SchemaOrRef::Ref { .. }) => {
            // An alias has no fields of its own.
            return Ok(ResolvedRecord {
                name: record_name.to_string(),
                fields: Vec::new(),
                diagnostics: Vec::new(),
            });
        }
        None => return Err(NormalizeError::UnknownRecord(record_name.to_string())),
    };

    let direct = direct_fields(record);
    let mut provenance = Provenance::new();
    let mut visited = HashSet::from([record_name.to_string()]);
    for member in &record.all_of {
        if let Some(source) = member.ref_name() {
            collect_source(&source, schemas, &mut visited, &mut provenance);
        }
    }

    let mut fields: Vec<ResolvedField> = direct
        .iter()
        .map(|(name, (schema, required))| ResolvedField {
            name: name.clone(),
            origin: FieldOrigin::Direct,
            schema: schema.clone(),
            required: *required,
            written_back: false,
        })
        .collect();

    for (field, contributions) in provenance {
        if direct.contains_key(&field) {
            continue;
        }
        let Some(first) = contributions.first() else {
            continue;
        };

        let mut write_back = carries_metadata(&first.schema);
        if contributions.len() > 1 {
            let first_type = type_text(&first.schema);
            let conflicting: Vec<String> = contributions
                .iter()
                .filter(|c| type_text(&c.schema) != first_type)
                .map(|c| format!("{} from {}", type_text(&c.schema), c.source))
                .collect();
            if !conflicting.is_empty() {
                ctx.report(
                    DiagnosticKind::FieldTypeConflict,
                    format!(
                        "field `{}` of record `{}` has conflicting types: {} from {} vs {}; keeping {}",
                        field,
                        record_name,
                        first_type,
                        first.source,
                        conflicting.join(", "),
                        first_type
                    ),
                    format!(
                        "{}/properties/{}",
                        component_ref(ComponentSection::Schemas, record_name),
                        field
                    ),
                );
                write_back = true;
            }
        }

        fields.push(ResolvedField {
            name: field,
            origin: FieldOrigin::Inherited {
                source: first.source.clone(),
            },
            schema: first.schema.clone(),
            required: first.required,
            written_back: write_back,
        });
    }

    if let Some(SchemaOrRef::Schema(record)) = schemas.get_mut(record_name) {
        for field in fields.iter().filter(|f| f.written_back) {
            log::debug!("adopting field {} into record {}", field.name, record_name);
            record
                .properties
                .insert(field.name.clone(), field.schema.clone());
            if field.required && !record.required.contains(&field.name) {
                record.required.push(field.name.clone());
            }
        }
    }

    Ok(ResolvedRecord {
        name: record_name.to_string(),
        fields,
        diagnostics: ctx.diagnostics()[first_diagnostic..].to_vec(),
    })
}

/// Resolve every component schema that includes another through `allOf`.
pub fn resolve_all(
    spec: &mut OpenApiSpec,
    ctx: &mut NormalizationContext,
) -> Result<Vec<ResolvedRecord>, NormalizeError> {
    let records: Vec<String> = match spec.components.as_ref() {
        Some(components) => components
            .schemas
            .iter()
            .filter(|(_, node)| {
                node.as_schema()
                    .is_some_and(|s| s.all_of.iter().any(|m| m.ref_name().is_some()))
            })
            .map(|(name, _)| name.clone())
            .collect(),
        None => return Ok(Vec::new()),
    };

    records
        .iter()
        .map(|name| resolve(name, spec, ctx))
        .collect()
}

/// The record's own properties followed by those of its inline `allOf` members.
fn direct_fields(record: &Schema) -> IndexMap<String, (SchemaOrRef, bool)> {
    let mut fields = IndexMap::new();
    let blocks = std::iter::once(record).chain(record.all_of.iter().filter_map(|m| m.as_schema()));
    for block in blocks {
        for (name, schema) in &block.properties {
            fields
                .entry(name.clone())
                .or_insert_with(|| (schema.clone(), block.required.contains(name)));
        }
    }
    fields
}

/// Gather what `source` contributes: its own properties, its inline `allOf`
/// members, then its referenced `allOf` members. A source is visited at most
/// once per resolution, so inclusion cycles stop here.
fn collect_source(
    source: &str,
    schemas: &IndexMap<String, SchemaOrRef>,
    visited: &mut HashSet<String>,
    provenance: &mut Provenance,
) {
    if !visited.insert(source.to_string()) {
        return;
    }
    let schema = match schemas.get(source) {
        Some(SchemaOrRef::Schema(schema)) => schema,
        Some(alias @ SchemaOrRef::Ref { .. }) => {
            if let Some(target) = alias.ref_name() {
                collect_source(&target, schemas, visited, provenance);
            }
            return;
        }
        None => return,
    };

    contribute_block(source, schema, provenance);
    for member in &schema.all_of {
        if let SchemaOrRef::Schema(inline) = member {
            contribute_block(source, inline, provenance);
        }
    }
    for member in &schema.all_of {
        if let Some(target) = member.ref_name() {
            collect_source(&target, schemas, visited, provenance);
        }
    }
}

fn contribute_block(source: &str, block: &Schema, provenance: &mut Provenance) {
    for (name, schema) in &block.properties {
        let contributions = provenance.entry(name.clone()).or_default();
        // One contribution per field per source.
        if contributions.iter().any(|c| c.source == source) {
            continue;
        }
        contributions.push(Contribution {
            source: source.to_string(),
            schema: schema.clone(),
            required: block.required.contains(name),
        });
    }
}

fn carries_metadata(node: &SchemaOrRef) -> bool {
    match node {
        SchemaOrRef::Schema(schema) => schema.has_metadata(),
        // `{$ref, description}` annotates the reference itself
        SchemaOrRef::Ref { siblings, .. } => ["description", "summary"]
            .iter()
            .any(|key| siblings.contains_key(*key)),
    }
}

/// Human-readable declared type of a field, used to decide whether two
/// definitions agree: `string`, `integer(int64)`, `Pet`, `array<Pet>`,
/// `map<string>`, `oneOf<A|B>`.
pub fn type_text(node: &SchemaOrRef) -> String {
    let schema = match node {
        SchemaOrRef::Ref { ref_path, .. } => {
            return node.ref_name().unwrap_or_else(|| ref_path.clone());
        }
        SchemaOrRef::Schema(schema) => schema,
    };

    let text = match schema.composition() {
        Some(kind) => {
            let members = match kind {
                CompositionKind::AllOf => &schema.all_of,
                CompositionKind::OneOf => &schema.one_of,
                CompositionKind::AnyOf => &schema.any_of,
            };
            let parts: Vec<String> = members.iter().map(type_text).collect();
            format!("{}<{}>", kind.keyword(), parts.join("|"))
        }
        None => match schema.kind() {
            SchemaKind::Array => {
                let item = schema
                    .items
                    .as_deref()
                    .map(type_text)
                    .unwrap_or_else(|| "any".to_string());
                format!("array<{item}>")
            }
            SchemaKind::Object => object_text(schema),
            SchemaKind::Primitive | SchemaKind::Composed => primitive_text(schema),
        },
    };

    if schema.nullable == Some(true) {
        format!("{text}?")
    } else {
        text
    }
}

fn object_text(schema: &Schema) -> String {
    if schema.properties.is_empty() {
        return match &schema.additional_properties {
            Some(AdditionalProperties::Schema(value)) => format!("map<{}>", type_text(value)),
            Some(AdditionalProperties::Bool(true)) => "map<any>".to_string(),
            _ => "object".to_string(),
        };
    }
    let fields: Vec<String> = schema
        .properties
        .iter()
        .map(|(name, prop)| format!("{}:{}", name, type_text(prop)))
        .collect();
    format!("object{{{}}}", fields.join(","))
}

fn primitive_text(schema: &Schema) -> String {
    let base = match &schema.schema_type {
        Some(TypeSet::Single(t)) => t.as_str().to_string(),
        Some(TypeSet::Multiple(ts)) => ts
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("|"),
        None => "any".to_string(),
    };
    match &schema.format {
        Some(format) => format!("{base}({format})"),
        None => base,
    }
}
