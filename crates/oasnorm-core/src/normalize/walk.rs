//! Whole-document traversal shared by the passes.
//!
//! References are leaves: nothing here follows a `$ref`, so cyclic component
//! graphs are walked exactly once per occurrence.

use indexmap::IndexMap;

use crate::parse::header::HeaderOrRef;
use crate::parse::media_type::MediaType;
use crate::parse::operation::{CallbackOrRef, Operation, PathItem};
use crate::parse::parameter::ParameterOrRef;
use crate::parse::request_body::RequestBodyOrRef;
use crate::parse::response::ResponseOrRef;
use crate::parse::schema::{AdditionalProperties, Schema, SchemaOrRef};
use crate::parse::spec::OpenApiSpec;

/// A `$ref` string together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    pub ref_path: String,
    pub location: String,
}

/// Call `visit` on every schema node in the document, nested nodes included,
/// parents before children.
pub fn for_each_schema_mut(spec: &mut OpenApiSpec, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    if let Some(components) = spec.components.as_mut() {
        for schema in components.schemas.values_mut() {
            walk_schema_mut(schema, visit);
        }
        for param in components.parameters.values_mut() {
            walk_parameter_mut(param, visit);
        }
        for body in components.request_bodies.values_mut() {
            if let RequestBodyOrRef::RequestBody(rb) = body {
                walk_content_mut(&mut rb.content, visit);
            }
        }
        for response in components.responses.values_mut() {
            walk_response_mut(response, visit);
        }
        for header in components.headers.values_mut() {
            walk_header_mut(header, visit);
        }
        for callback in components.callbacks.values_mut() {
            walk_callback_mut(callback, visit);
        }
        for item in components.path_items.values_mut() {
            walk_path_item_mut(item, visit);
        }
    }

    for item in spec.paths.values_mut() {
        walk_path_item_mut(item, visit);
    }
    for item in spec.webhooks.values_mut() {
        walk_path_item_mut(item, visit);
    }
}

fn walk_path_item_mut(item: &mut PathItem, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    for param in &mut item.parameters {
        walk_parameter_mut(param, visit);
    }
    for (_, op) in item.operations_mut() {
        walk_operation_mut(op, visit);
    }
}

fn walk_callback_mut(callback: &mut CallbackOrRef, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    if let CallbackOrRef::Callback(items) = callback {
        for item in items.values_mut() {
            walk_path_item_mut(item, visit);
        }
    }
}

fn walk_operation_mut(op: &mut Operation, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    for param in &mut op.parameters {
        walk_parameter_mut(param, visit);
    }
    if let Some(RequestBodyOrRef::RequestBody(rb)) = op.request_body.as_mut() {
        walk_content_mut(&mut rb.content, visit);
    }
    for response in op.responses.values_mut() {
        walk_response_mut(response, visit);
    }
    for callback in op.callbacks.values_mut() {
        walk_callback_mut(callback, visit);
    }
}

fn walk_parameter_mut(param: &mut ParameterOrRef, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    if let ParameterOrRef::Parameter(p) = param {
        if let Some(schema) = p.schema.as_mut() {
            walk_schema_mut(schema, visit);
        }
        walk_content_mut(&mut p.content, visit);
    }
}

fn walk_response_mut(response: &mut ResponseOrRef, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    if let ResponseOrRef::Response(r) = response {
        walk_content_mut(&mut r.content, visit);
        for header in r.headers.values_mut() {
            walk_header_mut(header, visit);
        }
    }
}

fn walk_header_mut(header: &mut HeaderOrRef, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    if let HeaderOrRef::Header(h) = header {
        if let Some(schema) = h.schema.as_mut() {
            walk_schema_mut(schema, visit);
        }
        walk_content_mut(&mut h.content, visit);
    }
}

fn walk_content_mut(
    content: &mut IndexMap<String, MediaType>,
    visit: &mut dyn FnMut(&mut SchemaOrRef),
) {
    for mt in content.values_mut() {
        if let Some(schema) = mt.schema.as_mut() {
            walk_schema_mut(schema, visit);
        }
        if let Some(schema) = mt.item_schema.as_mut() {
            walk_schema_mut(schema, visit);
        }
        for encoding in mt.encoding.values_mut() {
            for header in encoding.headers.values_mut() {
                walk_header_mut(header, visit);
            }
        }
    }
}

/// Visit `node` and everything nested below it.
pub fn walk_schema_mut(node: &mut SchemaOrRef, visit: &mut dyn FnMut(&mut SchemaOrRef)) {
    visit(node);
    if let SchemaOrRef::Schema(schema) = node {
        for child in children_mut(schema) {
            walk_schema_mut(child, visit);
        }
    }
}

/// Direct schema children of an inline schema, in document order.
pub fn children_mut(schema: &mut Schema) -> Vec<&mut SchemaOrRef> {
    let Schema {
        properties,
        additional_properties,
        items,
        all_of,
        one_of,
        any_of,
        not,
        ..
    } = schema;
    let mut children: Vec<&mut SchemaOrRef> = properties.values_mut().collect();
    if let Some(AdditionalProperties::Schema(s)) = additional_properties.as_mut() {
        children.push(s);
    }
    if let Some(item) = items.as_mut() {
        children.push(item);
    }
    children.extend(all_of.iter_mut());
    children.extend(one_of.iter_mut());
    children.extend(any_of.iter_mut());
    if let Some(n) = not.as_mut() {
        children.push(n);
    }
    children
}

/// Every `$ref` in the document (schemas, parameters, bodies, responses,
/// headers, callbacks, path items, discriminator mappings) with a
/// JSON-pointer-like location.
pub fn collect_refs(spec: &OpenApiSpec) -> Vec<RefSite> {
    let mut out = Vec::new();

    if let Some(components) = spec.components.as_ref() {
        for (name, schema) in &components.schemas {
            refs_in_schema(schema, &format!("#/components/schemas/{name}"), &mut out);
        }
        for (name, param) in &components.parameters {
            refs_in_parameter(param, &format!("#/components/parameters/{name}"), &mut out);
        }
        for (name, body) in &components.request_bodies {
            refs_in_request_body(body, &format!("#/components/requestBodies/{name}"), &mut out);
        }
        for (name, response) in &components.responses {
            refs_in_response(response, &format!("#/components/responses/{name}"), &mut out);
        }
        for (name, header) in &components.headers {
            refs_in_header(header, &format!("#/components/headers/{name}"), &mut out);
        }
        for (name, callback) in &components.callbacks {
            refs_in_callback(callback, &format!("#/components/callbacks/{name}"), &mut out);
        }
        for (name, item) in &components.path_items {
            refs_in_path_item(item, &format!("#/components/pathItems/{name}"), &mut out);
        }
    }

    for (path, item) in &spec.paths {
        refs_in_path_item(item, &format!("#/paths/{path}"), &mut out);
    }
    for (name, item) in &spec.webhooks {
        refs_in_path_item(item, &format!("#/webhooks/{name}"), &mut out);
    }

    out
}

fn refs_in_path_item(item: &PathItem, base: &str, out: &mut Vec<RefSite>) {
    if let Some(ref_path) = item.ref_path.as_deref() {
        push(out, ref_path, base);
    }
    for (i, param) in item.parameters.iter().enumerate() {
        refs_in_parameter(param, &format!("{base}/parameters/{i}"), out);
    }
    for (method, op) in item.operations() {
        let op_base = format!("{base}/{}", method.as_str().to_lowercase());
        for (i, param) in op.parameters.iter().enumerate() {
            refs_in_parameter(param, &format!("{op_base}/parameters/{i}"), out);
        }
        if let Some(body) = op.request_body.as_ref() {
            refs_in_request_body(body, &format!("{op_base}/requestBody"), out);
        }
        for (status, response) in &op.responses {
            refs_in_response(response, &format!("{op_base}/responses/{status}"), out);
        }
        for (name, callback) in &op.callbacks {
            refs_in_callback(callback, &format!("{op_base}/callbacks/{name}"), out);
        }
    }
}

fn refs_in_callback(callback: &CallbackOrRef, location: &str, out: &mut Vec<RefSite>) {
    match callback {
        CallbackOrRef::Ref { ref_path, .. } => push(out, ref_path, location),
        CallbackOrRef::Callback(items) => {
            for (expression, item) in items {
                refs_in_path_item(item, &format!("{location}/{expression}"), out);
            }
        }
    }
}

fn push(out: &mut Vec<RefSite>, ref_path: &str, location: &str) {
    out.push(RefSite {
        ref_path: ref_path.to_string(),
        location: location.to_string(),
    });
}

fn refs_in_parameter(param: &ParameterOrRef, location: &str, out: &mut Vec<RefSite>) {
    match param {
        ParameterOrRef::Ref { ref_path, .. } => push(out, ref_path, location),
        ParameterOrRef::Parameter(p) => {
            if let Some(schema) = p.schema.as_ref() {
                refs_in_schema(schema, &format!("{location}/schema"), out);
            }
            refs_in_content(&p.content, location, out);
        }
    }
}

fn refs_in_request_body(body: &RequestBodyOrRef, location: &str, out: &mut Vec<RefSite>) {
    match body {
        RequestBodyOrRef::Ref { ref_path, .. } => push(out, ref_path, location),
        RequestBodyOrRef::RequestBody(rb) => refs_in_content(&rb.content, location, out),
    }
}

fn refs_in_response(response: &ResponseOrRef, location: &str, out: &mut Vec<RefSite>) {
    match response {
        ResponseOrRef::Ref { ref_path, .. } => push(out, ref_path, location),
        ResponseOrRef::Response(r) => {
            refs_in_content(&r.content, location, out);
            for (name, header) in &r.headers {
                refs_in_header(header, &format!("{location}/headers/{name}"), out);
            }
        }
    }
}

fn refs_in_header(header: &HeaderOrRef, location: &str, out: &mut Vec<RefSite>) {
    match header {
        HeaderOrRef::Ref { ref_path, .. } => push(out, ref_path, location),
        HeaderOrRef::Header(h) => {
            if let Some(schema) = h.schema.as_ref() {
                refs_in_schema(schema, &format!("{location}/schema"), out);
            }
            refs_in_content(&h.content, location, out);
        }
    }
}

fn refs_in_content(content: &IndexMap<String, MediaType>, location: &str, out: &mut Vec<RefSite>) {
    for (media, mt) in content {
        let base = format!("{location}/content/{media}");
        if let Some(schema) = mt.schema.as_ref() {
            refs_in_schema(schema, &format!("{base}/schema"), out);
        }
        if let Some(schema) = mt.item_schema.as_ref() {
            refs_in_schema(schema, &format!("{base}/itemSchema"), out);
        }
        for (field, encoding) in &mt.encoding {
            for (name, header) in &encoding.headers {
                refs_in_header(
                    header,
                    &format!("{base}/encoding/{field}/headers/{name}"),
                    out,
                );
            }
        }
    }
}

fn refs_in_schema(node: &SchemaOrRef, location: &str, out: &mut Vec<RefSite>) {
    let schema = match node {
        SchemaOrRef::Ref { ref_path, .. } => return push(out, ref_path, location),
        SchemaOrRef::Schema(schema) => schema,
    };

    for (name, prop) in &schema.properties {
        refs_in_schema(prop, &format!("{location}/properties/{name}"), out);
    }
    if let Some(AdditionalProperties::Schema(s)) = schema.additional_properties.as_ref() {
        refs_in_schema(s, &format!("{location}/additionalProperties"), out);
    }
    if let Some(items) = schema.items.as_ref() {
        refs_in_schema(items, &format!("{location}/items"), out);
    }
    for (keyword, members) in [
        ("allOf", &schema.all_of),
        ("oneOf", &schema.one_of),
        ("anyOf", &schema.any_of),
    ] {
        for (i, member) in members.iter().enumerate() {
            refs_in_schema(member, &format!("{location}/{keyword}/{i}"), out);
        }
    }
    if let Some(not) = schema.not.as_ref() {
        refs_in_schema(not, &format!("{location}/not"), out);
    }
    if let Some(discriminator) = schema.discriminator.as_ref() {
        for (key, target) in &discriminator.mapping {
            if target.starts_with("#/") {
                push(out, target, &format!("{location}/discriminator/mapping/{key}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    const DOC: &str = r##"
openapi: "3.1.0"
info: {title: Walk, version: "1"}
paths:
  /pets/{id}:
    parameters:
      - $ref: "#/components/parameters/Id"
    get:
      responses:
        "200":
          description: ok
          headers:
            X-Rate:
              schema: {$ref: "#/components/schemas/Rate"}
          content:
            application/json:
              schema:
                type: array
                items: {$ref: "#/components/schemas/Pet"}
components:
  parameters:
    Id: {name: id, in: path, required: true, schema: {type: string}}
  schemas:
    Rate: {type: integer}
    Pet:
      oneOf:
        - $ref: "#/components/schemas/Cat"
      discriminator:
        propertyName: kind
        mapping: {cat: "#/components/schemas/Cat", dog: Dog}
    Cat: {properties: {lives: {type: integer}}}
"##;

    #[test]
    fn collects_refs_with_locations() {
        let spec = parse::from_yaml(DOC).unwrap();
        let sites = collect_refs(&spec);
        let pairs: Vec<(&str, &str)> = sites
            .iter()
            .map(|s| (s.ref_path.as_str(), s.location.as_str()))
            .collect();
        assert!(pairs.contains(&(
            "#/components/schemas/Cat",
            "#/components/schemas/Pet/oneOf/0"
        )));
        assert!(pairs.contains(&(
            "#/components/schemas/Cat",
            "#/components/schemas/Pet/discriminator/mapping/cat"
        )));
        assert!(pairs.contains(&("#/components/parameters/Id", "#/paths//pets/{id}/parameters/0")));
        assert!(pairs.contains(&(
            "#/components/schemas/Rate",
            "#/paths//pets/{id}/get/responses/200/headers/X-Rate/schema"
        )));
        assert!(pairs.contains(&(
            "#/components/schemas/Pet",
            "#/paths//pets/{id}/get/responses/200/content/application/json/schema/items"
        )));
        // Bare discriminator names are not references
        assert_eq!(sites.len(), 5);
    }

    #[test]
    fn visits_nested_schema_nodes() {
        let mut spec = parse::from_yaml(DOC).unwrap();
        let mut refs = 0;
        let mut inline = 0;
        for_each_schema_mut(&mut spec, &mut |node| match node {
            SchemaOrRef::Ref { .. } => refs += 1,
            SchemaOrRef::Schema(_) => inline += 1,
        });
        // Rate header ref, Pet item ref, Cat oneOf ref
        assert_eq!(refs, 3);
        // Rate, Pet, Cat, Cat.lives, Id schema, response array
        assert_eq!(inline, 6);
    }

    #[test]
    fn callbacks_webhooks_and_path_item_refs_are_walked() {
        let spec = parse::from_yaml(
            r##"
openapi: "3.1.0"
info: {title: Walk, version: "1"}
paths:
  /hooks:
    $ref: "#/components/pathItems/Hooks"
  /subscribe:
    post:
      responses:
        "202": {description: accepted}
      callbacks:
        done:
          "{$request.body#/url}":
            post:
              requestBody:
                content:
                  application/json:
                    schema: {$ref: "#/components/schemas/Event"}
              responses:
                "200": {description: ok}
        shared: {$ref: "#/components/callbacks/Shared"}
webhooks:
  ping:
    post:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Event"}
components:
  schemas:
    Event: {properties: {id: {type: string}}}
"##,
        )
        .unwrap();
        let sites = collect_refs(&spec);
        let locations: Vec<&str> = sites.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(
            locations,
            vec![
                "#/paths//hooks",
                "#/paths//subscribe/post/callbacks/done/{$request.body#/url}/post/requestBody/content/application/json/schema",
                "#/paths//subscribe/post/callbacks/shared",
                "#/webhooks/ping/post/responses/200/content/application/json/schema",
            ]
        );

        let mut spec = spec;
        let mut refs = 0;
        for_each_schema_mut(&mut spec, &mut |node| {
            if matches!(node, SchemaOrRef::Ref { .. }) {
                refs += 1;
            }
        });
        assert_eq!(refs, 2);
    }
}
