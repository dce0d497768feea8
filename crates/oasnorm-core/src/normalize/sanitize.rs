use std::collections::HashMap;

use indexmap::IndexMap;

use crate::config::NamingConfig;
use crate::parse::parameter::ParameterOrRef;
use crate::parse::reference::{ComponentSection, component_ref, split_component_ref};
use crate::parse::schema::SchemaOrRef;
use crate::parse::spec::OpenApiSpec;

use super::context::{DiagnosticKind, IdentifierMapping, NormalizationContext};
use super::naming::{
    IdentCase, Sanitized, is_canonical, parameter_name, rewrite_template, sanitize_identifier,
    schema_name, template_params,
};
use super::walk::for_each_schema_mut;

/// Give every component schema and every path parameter a canonical name and
/// rewrite all references to match.
pub fn sanitize<'a>(
    spec: &'a mut OpenApiSpec,
    ctx: &mut NormalizationContext,
) -> &'a mut OpenApiSpec {
    rename_schemas(spec, ctx);
    rename_path_parameters(spec, ctx);
    spec
}

fn rename_schemas(spec: &mut OpenApiSpec, ctx: &mut NormalizationContext) {
    let Some(components) = spec.components.as_mut() else {
        return;
    };
    let names: Vec<String> = components.schemas.keys().cloned().collect();

    // Names that are already canonical keep them; everyone else queues behind.
    for name in &names {
        if is_canonical(name, IdentCase::Upper, &ctx.config.naming) {
            ctx.schema_names.assign(name, name);
        }
    }
    for name in &names {
        if ctx.schema_names.get(name).is_none() {
            let sanitized = schema_name(name, &ctx.config.naming);
            assign_disambiguated(ctx, Namespace::Schema, name, sanitized);
        }
    }

    let renames: HashMap<String, String> = ctx
        .schema_names
        .renames()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
    if renames.is_empty() {
        return;
    }
    for (from, to) in &renames {
        log::debug!("renaming schema {} to {}", from, to);
    }

    let old = std::mem::take(&mut components.schemas);
    components.schemas = old
        .into_iter()
        .map(|(name, schema)| match renames.get(&name) {
            Some(to) => (to.clone(), schema),
            None => (name, schema),
        })
        .collect();

    rewrite_schema_refs(spec, &renames);
}

/// Point every schema reference (and discriminator mapping) at its new name.
///
/// Pointers into a renamed component keep their tail:
/// `#/components/schemas/pet_owner/properties/name` follows `pet_owner` to
/// `PetOwner` and still ends in `/properties/name`.
pub fn rewrite_schema_refs(spec: &mut OpenApiSpec, renames: &HashMap<String, String>) {
    for_each_schema_mut(spec, &mut |node| match node {
        SchemaOrRef::Ref { ref_path, .. } => {
            if let Some(renamed) = renamed_schema_ref(ref_path, renames) {
                *ref_path = renamed;
            }
        }
        SchemaOrRef::Schema(schema) => {
            if let Some(discriminator) = schema.discriminator.as_mut() {
                for target in discriminator.mapping.values_mut() {
                    if let Some(renamed) = renamed_schema_ref(target, renames) {
                        *target = renamed;
                    } else if let Some(to) = renames.get(target.as_str()) {
                        *target = to.clone();
                    }
                }
            }
        }
    });
}

fn renamed_schema_ref(ref_path: &str, renames: &HashMap<String, String>) -> Option<String> {
    let pointer = split_component_ref(ref_path).ok().flatten()?;
    if pointer.section != ComponentSection::Schemas {
        return None;
    }
    renames.get(&pointer.name).map(|to| pointer.with_name(to))
}

fn rename_path_parameters(spec: &mut OpenApiSpec, ctx: &mut NormalizationContext) {
    let originals = collect_path_parameter_names(spec);
    if originals.is_empty() {
        return;
    }

    let schema_names: Vec<String> = spec
        .components
        .as_ref()
        .map(|c| c.schemas.keys().cloned().collect())
        .unwrap_or_default();
    let shadows_schema =
        |name: &str| schema_names.iter().any(|s| s.eq_ignore_ascii_case(name));

    for name in &originals {
        if is_canonical(name, IdentCase::Lower, &ctx.config.naming) && !shadows_schema(name) {
            ctx.parameter_names.assign(name, name);
        }
    }
    for name in &originals {
        if ctx.parameter_names.get(name).is_some() {
            continue;
        }
        let mut sanitized = parameter_name(name, &ctx.config.naming);
        if let Sanitized::Ident(ref ident) = sanitized {
            if shadows_schema(ident) {
                let prefixed = format!("{}_{}", ctx.config.naming.parameter_collision_prefix, ident);
                sanitized = parameter_name(&prefixed, &ctx.config.naming);
            }
        }
        assign_disambiguated(ctx, Namespace::Parameter, name, sanitized);
    }

    let renames: HashMap<String, String> = ctx
        .parameter_names
        .renames()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
    if renames.is_empty() {
        return;
    }
    for (from, to) in &renames {
        log::debug!("renaming path parameter {} to {}", from, to);
    }

    let old = std::mem::take(&mut spec.paths);
    spec.paths = old
        .into_iter()
        .map(|(path, mut item)| {
            for param in &mut item.parameters {
                rename_path_parameter(param, &renames);
            }
            for (_, op) in item.operations_mut() {
                for param in &mut op.parameters {
                    rename_path_parameter(param, &renames);
                }
            }
            let path = rewrite_template(&path, |p| renames.get(p).map(String::as_str));
            (path, item)
        })
        .collect::<IndexMap<_, _>>();

    if let Some(components) = spec.components.as_mut() {
        for param in components.parameters.values_mut() {
            rename_path_parameter(param, &renames);
        }
    }
}

fn rename_path_parameter(param: &mut ParameterOrRef, renames: &HashMap<String, String>) {
    if let ParameterOrRef::Parameter(p) = param {
        if p.is_path() {
            if let Some(to) = renames.get(&p.name) {
                p.name = to.clone();
            }
        }
    }
}

/// Path parameter names in first-seen order: template variables, path-level
/// and operation-level `in: path` parameters, then reusable component parameters.
fn collect_path_parameter_names(spec: &OpenApiSpec) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for (path, item) in &spec.paths {
        for param in template_params(path) {
            push(param);
        }
        let operation_params = item
            .operations()
            .into_iter()
            .flat_map(|(_, op)| op.parameters.iter());
        for param in item.parameters.iter().chain(operation_params) {
            if let ParameterOrRef::Parameter(p) = param {
                if p.is_path() {
                    push(&p.name);
                }
            }
        }
    }
    if let Some(components) = spec.components.as_ref() {
        for param in components.parameters.values() {
            if let ParameterOrRef::Parameter(p) = param {
                if p.is_path() {
                    push(&p.name);
                }
            }
        }
    }
    names
}

#[derive(Debug, Clone, Copy)]
enum Namespace {
    Schema,
    Parameter,
}

impl Namespace {
    fn label(&self) -> &'static str {
        match self {
            Namespace::Schema => "schema",
            Namespace::Parameter => "path parameter",
        }
    }

    fn location(&self, name: &str) -> String {
        match self {
            Namespace::Schema => component_ref(ComponentSection::Schemas, name),
            Namespace::Parameter => format!("#/paths/*/{{{name}}}"),
        }
    }
}

/// Bind `original` to its sanitized form, appending a numeric suffix when a
/// different original already owns that form.
fn assign_disambiguated(
    ctx: &mut NormalizationContext,
    namespace: Namespace,
    original: &str,
    sanitized: Sanitized,
) {
    let (base, first_suffix) = match sanitized {
        Sanitized::Ident(ident) => (ident, None),
        Sanitized::Fallback => {
            let fallback = fallback_stem(&ctx.config.naming, namespace);
            ctx.report(
                DiagnosticKind::NamingFallback,
                format!(
                    "{} name `{}` has no identifier characters; using generated name",
                    namespace.label(),
                    original
                ),
                namespace.location(original),
            );
            (fallback, Some(1))
        }
    };

    let mapping = match namespace {
        Namespace::Schema => &mut ctx.schema_names,
        Namespace::Parameter => &mut ctx.parameter_names,
    };

    if first_suffix.is_none() && mapping.assign(original, &base) {
        return;
    }

    let chosen = next_free(mapping, &base, first_suffix.unwrap_or(2));
    mapping.assign(original, &chosen);

    if first_suffix.is_none() {
        ctx.report(
            DiagnosticKind::NameCollision,
            format!(
                "{} `{}` sanitizes to `{}`, which is already taken; renamed to `{}`",
                namespace.label(),
                original,
                base,
                chosen
            ),
            namespace.location(original),
        );
    }
}

fn next_free(mapping: &IdentifierMapping, base: &str, start: usize) -> String {
    let mut i = start;
    loop {
        let candidate = format!("{}{}", base, i);
        if !mapping.is_taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

fn fallback_stem(naming: &NamingConfig, namespace: Namespace) -> String {
    let case = match namespace {
        Namespace::Schema => IdentCase::Upper,
        Namespace::Parameter => IdentCase::Lower,
    };
    match sanitize_identifier(&naming.fallback, case, naming) {
        Sanitized::Ident(s) => s,
        Sanitized::Fallback => match case {
            IdentCase::Upper => "Unnamed".to_string(),
            IdentCase::Lower => "unnamed".to_string(),
        },
    }
}
