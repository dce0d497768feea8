use std::collections::{HashMap, HashSet};

use heck::ToPascalCase;
use indexmap::IndexMap;

use crate::parse::header::HeaderOrRef;
use crate::parse::media_type::MediaType;
use crate::parse::operation::{CallbackOrRef, Operation, PathItem};
use crate::parse::parameter::ParameterOrRef;
use crate::parse::request_body::RequestBodyOrRef;
use crate::parse::response::ResponseOrRef;
use crate::parse::schema::{AdditionalProperties, Schema, SchemaOrRef};
use crate::parse::spec::OpenApiSpec;

use super::context::NormalizationContext;
use super::naming::{Sanitized, operation_context, schema_name, unique_name};
use super::sanitize::rewrite_schema_refs;
use super::signature::{Signature, signature_of};

/// Replace every anonymous object, array-of-object item and composed schema in
/// the document with a reference to a named component.
///
/// Structurally identical shapes collapse onto one component; a shape equal to
/// an existing component schema links to that component, wherever that
/// component is declared. Traversal order is fixed (components, then paths in
/// document order, operations in method order, then webhooks) so the same
/// input always yields the same names.
pub fn flatten<'a>(
    spec: &'a mut OpenApiSpec,
    ctx: &mut NormalizationContext,
) -> &'a mut OpenApiSpec {
    let used_names: HashSet<String> = match spec.components.as_ref() {
        Some(components) => components
            .schemas
            .keys()
            .flat_map(|name| {
                let sanitized = match schema_name(name, &ctx.config.naming) {
                    Sanitized::Ident(s) => Some(s),
                    Sanitized::Fallback => None,
                };
                std::iter::once(name.clone()).chain(sanitized)
            })
            .collect(),
        None => HashSet::new(),
    };

    let mut extractor = Extractor {
        ctx: &mut *ctx,
        used_names,
        new_schemas: IndexMap::new(),
    };

    // Phase 1: reusable components
    if let Some(components) = spec.components.as_mut() {
        for (name, node) in components.schemas.iter_mut() {
            if let SchemaOrRef::Schema(schema) = node {
                extractor.flatten_children(schema, name, true);
                if schema.is_extractable() {
                    extractor.register_existing(&**schema, name);
                }
            }
        }
        for (key, param) in components.parameters.iter_mut() {
            extractor.flatten_parameter(param, &format!("{}Param", key.to_pascal_case()));
        }
        for (key, body) in components.request_bodies.iter_mut() {
            if let RequestBodyOrRef::RequestBody(rb) = body {
                let context = format!("{}Body", key.to_pascal_case());
                extractor.flatten_content(&mut rb.content, &context);
            }
        }
        for (key, response) in components.responses.iter_mut() {
            extractor.flatten_response(response, &format!("{}Response", key.to_pascal_case()));
        }
        for (key, header) in components.headers.iter_mut() {
            extractor.flatten_header(header, &format!("{}Header", key.to_pascal_case()));
        }
        for (key, callback) in components.callbacks.iter_mut() {
            extractor.flatten_callback(callback, &format!("{}Callback", key.to_pascal_case()));
        }
        for (key, item) in components.path_items.iter_mut() {
            extractor.flatten_path_item(item, key);
        }
    }

    // Phase 2: paths and their operations
    for (path, item) in spec.paths.iter_mut() {
        extractor.flatten_path_item(item, path);
    }

    // Phase 3: webhooks, named like routes
    for (name, item) in spec.webhooks.iter_mut() {
        extractor.flatten_path_item(item, name);
    }

    let new_schemas = extractor.new_schemas;
    if !new_schemas.is_empty() {
        let created: HashSet<String> = new_schemas.keys().cloned().collect();
        spec.components
            .get_or_insert_with(Default::default)
            .schemas
            .extend(new_schemas);
        merge_late_duplicates(spec, ctx, &created);
    }
    spec
}

/// Fold extracted components into equal declared components.
///
/// A declared component only becomes a dedup target once the traversal has
/// reached it, so an inline shape met earlier is extracted on its own. Those
/// extractions are redirected here until no extracted component equals an
/// earlier holder of its signature.
fn merge_late_duplicates(
    spec: &mut OpenApiSpec,
    ctx: &mut NormalizationContext,
    created: &HashSet<String>,
) {
    loop {
        let Some(components) = spec.components.as_ref() else {
            return;
        };

        let mut owners: HashMap<Signature, &str> = HashMap::new();
        let mut redirects: HashMap<String, String> = HashMap::new();
        let mut rebinds: Vec<(Signature, String)> = Vec::new();
        let declared = components
            .schemas
            .iter()
            .filter(|(name, _)| !created.contains(*name));
        let extracted = components
            .schemas
            .iter()
            .filter(|(name, _)| created.contains(*name));
        for (name, node) in declared.chain(extracted) {
            let Some(schema) = node.as_schema().filter(|s| s.is_extractable()) else {
                continue;
            };
            let signature = signature_of(schema);
            match owners.get(&signature) {
                Some(owner) if created.contains(name) => {
                    redirects.insert(name.clone(), owner.to_string());
                    rebinds.push((signature, owner.to_string()));
                }
                Some(_) => {}
                None => {
                    owners.insert(signature, name.as_str());
                }
            }
        }
        if redirects.is_empty() {
            return;
        }

        for (from, to) in &redirects {
            log::debug!("extracted schema {} equals component {}; merging", from, to);
        }
        if let Some(components) = spec.components.as_mut() {
            components
                .schemas
                .retain(|name, _| !redirects.contains_key(name));
        }
        rewrite_schema_refs(spec, &redirects);
        for (signature, owner) in rebinds {
            ctx.signatures.register(signature, &owner);
        }
    }
}

struct Extractor<'c> {
    ctx: &'c mut NormalizationContext,
    used_names: HashSet<String>,
    new_schemas: IndexMap<String, SchemaOrRef>,
}

impl Extractor<'_> {
    /// `route` is a path template, a webhook name or a component key.
    fn flatten_path_item(&mut self, item: &mut PathItem, route: &str) {
        let path_context = route.to_pascal_case();
        for param in &mut item.parameters {
            self.flatten_parameter_in(param, &path_context);
        }
        for (method, op) in item.operations_mut() {
            let op_context = operation_context(op.operation_id.as_deref(), method.as_str(), route);
            self.flatten_operation(op, &op_context);
        }
    }

    /// Callback keys are runtime expressions, not routes, so unnamed callback
    /// operations are named after the callback and their method.
    fn flatten_callback(&mut self, callback: &mut CallbackOrRef, context: &str) {
        let CallbackOrRef::Callback(items) = callback else {
            return;
        };
        for item in items.values_mut() {
            for param in &mut item.parameters {
                self.flatten_parameter_in(param, context);
            }
            for (method, op) in item.operations_mut() {
                let op_context = match op.operation_id.as_deref() {
                    Some(id) if !id.trim().is_empty() => id.to_pascal_case(),
                    _ => format!("{context}{}", method.as_str().to_pascal_case()),
                };
                self.flatten_operation(op, &op_context);
            }
        }
    }

    fn flatten_operation(&mut self, op: &mut Operation, op_context: &str) {
        for param in &mut op.parameters {
            self.flatten_parameter_in(param, op_context);
        }

        if let Some(RequestBodyOrRef::RequestBody(rb)) = op.request_body.as_mut() {
            self.flatten_content(&mut rb.content, &format!("{op_context}Body"));
        }

        for (status, response) in op.responses.iter_mut() {
            let context = if status.starts_with('2') {
                format!("{op_context}Response")
            } else {
                format!("{op_context}{}Response", status.to_pascal_case())
            };
            self.flatten_response(response, &context);
        }

        for (name, callback) in op.callbacks.iter_mut() {
            let context = format!("{op_context}{}", name.to_pascal_case());
            self.flatten_callback(callback, &context);
        }
    }

    /// An inline parameter named after its owner and its own name.
    fn flatten_parameter_in(&mut self, param: &mut ParameterOrRef, owner_context: &str) {
        if let ParameterOrRef::Parameter(p) = param {
            let context = format!("{owner_context}{}", p.name.to_pascal_case());
            self.flatten_parameter(param, &context);
        }
    }

    fn flatten_parameter(&mut self, param: &mut ParameterOrRef, context: &str) {
        if let ParameterOrRef::Parameter(p) = param {
            if let Some(schema) = p.schema.as_mut() {
                self.visit(schema, context);
            }
            self.flatten_content(&mut p.content, context);
        }
    }

    fn flatten_response(&mut self, response: &mut ResponseOrRef, context: &str) {
        if let ResponseOrRef::Response(r) = response {
            self.flatten_content(&mut r.content, context);
            for (name, header) in r.headers.iter_mut() {
                let header_context = format!("{context}{}Header", name.to_pascal_case());
                self.flatten_header(header, &header_context);
            }
        }
    }

    fn flatten_header(&mut self, header: &mut HeaderOrRef, context: &str) {
        if let HeaderOrRef::Header(h) = header {
            if let Some(schema) = h.schema.as_mut() {
                self.visit(schema, context);
            }
            self.flatten_content(&mut h.content, context);
        }
    }

    fn flatten_content(&mut self, content: &mut IndexMap<String, MediaType>, context: &str) {
        for mt in content.values_mut() {
            if let Some(schema) = mt.schema.as_mut() {
                self.visit(schema, context);
            }
            if let Some(schema) = mt.item_schema.as_mut() {
                self.visit(schema, &format!("{context}Event"));
            }
            for (field, encoding) in mt.encoding.iter_mut() {
                for (name, header) in encoding.headers.iter_mut() {
                    let header_context = format!(
                        "{context}{}{}Header",
                        field.to_pascal_case(),
                        name.to_pascal_case()
                    );
                    self.flatten_header(header, &header_context);
                }
            }
        }
    }

    /// Flatten one schema location, extracting the node itself if it qualifies.
    fn visit(&mut self, node: &mut SchemaOrRef, context: &str) {
        let SchemaOrRef::Schema(schema) = node else {
            return;
        };
        self.flatten_children(schema, context, false);
        if schema.is_extractable() {
            let taken = std::mem::take(schema.as_mut());
            let name = self.extract(taken, context);
            *node = SchemaOrRef::component(&name);
        }
    }

    /// Flatten everything below `schema` (bottom-up, so children are already
    /// references when the parent's signature is computed).
    ///
    /// `own_all_of` keeps inline `allOf` members in place: on a named
    /// component they are the record's own declaration block.
    fn flatten_children(&mut self, schema: &mut Schema, context: &str, own_all_of: bool) {
        for (key, prop) in schema.properties.iter_mut() {
            self.visit(prop, &format!("{context}{}", key.to_pascal_case()));
        }
        if let Some(AdditionalProperties::Schema(value)) = schema.additional_properties.as_mut() {
            self.visit(value, &format!("{context}Value"));
        }
        if let Some(item) = schema.items.as_mut() {
            self.visit(item, &format!("{context}Item"));
        }

        for (i, member) in schema.all_of.iter_mut().enumerate() {
            if own_all_of {
                if let SchemaOrRef::Schema(inner) = member {
                    self.flatten_children(inner, context, false);
                    continue;
                }
            }
            self.visit(member, &format!("{context}Variant{}", i + 1));
        }
        for (i, member) in schema.one_of.iter_mut().enumerate() {
            self.visit(member, &format!("{context}Variant{}", i + 1));
        }
        for (i, member) in schema.any_of.iter_mut().enumerate() {
            self.visit(member, &format!("{context}Variant{}", i + 1));
        }
        if let Some(not) = schema.not.as_mut() {
            self.visit(not, &format!("{context}Not"));
        }
    }

    /// Link to an equal component, or create a new one. Returns the component name.
    fn extract(&mut self, schema: Schema, context: &str) -> String {
        let signature = signature_of(&schema);
        if let Some(existing) = self.ctx.signatures.lookup(&signature) {
            log::debug!("inline schema at {} reuses component {}", context, existing);
            return existing.to_string();
        }

        let base = match schema_name(context, &self.ctx.config.naming) {
            Sanitized::Ident(s) => s,
            Sanitized::Fallback => self.ctx.config.naming.fallback.clone(),
        };
        let name = unique_name(&base, &mut self.used_names);
        log::debug!("extracted inline schema at {} as component {}", context, name);

        self.ctx.signatures.register(signature, &name);
        self.new_schemas
            .insert(name.clone(), SchemaOrRef::Schema(Box::new(schema)));
        name
    }

    /// Make an existing component the dedup target for inline shapes equal to it.
    fn register_existing(&mut self, schema: &Schema, name: &str) {
        let signature = signature_of(schema);
        if self.ctx.signatures.lookup(&signature).is_none() {
            self.ctx.signatures.register(signature, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use crate::parse::schema::SchemaType;

    fn run(yaml: &str) -> OpenApiSpec {
        let mut spec = parse::from_yaml(yaml).unwrap();
        let mut ctx = NormalizationContext::default();
        flatten(&mut spec, &mut ctx);
        spec
    }

    fn component<'a>(spec: &'a OpenApiSpec, name: &str) -> &'a Schema {
        spec.components.as_ref().unwrap().schemas[name]
            .as_schema()
            .unwrap_or_else(|| panic!("{name} should be inline"))
    }

    fn property<'a>(schema: &'a Schema, name: &str) -> &'a SchemaOrRef {
        &schema.properties[name]
    }

    #[test]
    fn promotes_inline_object_in_component_property() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Pet:
      type: object
      properties:
        owner:
          type: object
          properties:
            name: {type: string}
            age: {type: integer}
"#);
        let pet = component(&spec, "Pet");
        assert_eq!(property(pet, "owner").ref_name().as_deref(), Some("PetOwner"));
        let owner = component(&spec, "PetOwner");
        assert_eq!(owner.properties.len(), 2);
        assert_eq!(spec.components.as_ref().unwrap().schemas.len(), 2);
    }

    #[test]
    fn promotes_nested_objects_bottom_up() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Order:
      properties:
        shipping:
          properties:
            address:
              properties:
                city: {type: string}
"#);
        let shipping = component(&spec, "OrderShipping");
        assert_eq!(
            property(shipping, "address").ref_name().as_deref(),
            Some("OrderShippingAddress")
        );
        let names: Vec<&String> = spec.components.as_ref().unwrap().schemas.keys().collect();
        // Children are extracted before their parents
        assert_eq!(names, vec!["Order", "OrderShippingAddress", "OrderShipping"]);
    }

    #[test]
    fn array_items_are_extracted_but_not_the_array() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Page:
      properties:
        items:
          type: array
          items:
            properties:
              id: {type: integer}
        tags:
          type: array
          items: {type: string}
"#);
        let page = component(&spec, "Page");
        let items = property(page, "items").as_schema().unwrap();
        assert_eq!(
            items.items.as_ref().unwrap().ref_name().as_deref(),
            Some("PageItemsItem")
        );
        let tags = property(page, "tags").as_schema().unwrap();
        assert!(tags.items.as_ref().unwrap().as_schema().is_some());
        assert_eq!(spec.components.as_ref().unwrap().schemas.len(), 2);
    }

    #[test]
    fn does_not_promote_empty_objects() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Config:
      properties:
        metadata: {type: object}
        labels:
          type: object
          additionalProperties: {type: string}
"#);
        let config = component(&spec, "Config");
        assert!(property(config, "metadata").as_schema().is_some());
        assert!(property(config, "labels").as_schema().is_some());
        assert_eq!(spec.components.as_ref().unwrap().schemas.len(), 1);
    }

    #[test]
    fn map_values_with_properties_are_extracted() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Registry:
      properties:
        entries:
          type: object
          additionalProperties:
            properties:
              url: {type: string}
"#);
        let registry = component(&spec, "Registry");
        let entries = property(registry, "entries").as_schema().unwrap();
        match entries.additional_properties.as_ref() {
            Some(AdditionalProperties::Schema(value)) => {
                assert_eq!(value.ref_name().as_deref(), Some("RegistryEntriesValue"));
            }
            other => panic!("expected schema map value, got {other:?}"),
        }
    }

    #[test]
    fn deduplicates_identical_shapes_and_keeps_distinct_ones() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    A:
      properties:
        ref: {properties: {id: {type: integer}}}
    B:
      properties:
        ref: {properties: {id: {type: integer}}}
    C:
      properties:
        ref: {properties: {id: {type: string}}}
"#);
        assert_eq!(
            property(component(&spec, "A"), "ref").ref_name().as_deref(),
            Some("ARef")
        );
        assert_eq!(
            property(component(&spec, "B"), "ref").ref_name().as_deref(),
            Some("ARef")
        );
        assert_eq!(
            property(component(&spec, "C"), "ref").ref_name().as_deref(),
            Some("CRef")
        );
        assert_eq!(spec.components.as_ref().unwrap().schemas.len(), 5);
    }

    #[test]
    fn links_to_existing_equal_component() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /people:
    post:
      operationId: addPerson
      requestBody:
        content:
          application/json:
            schema:
              properties:
                name: {type: string}
      responses:
        "204": {description: done}
components:
  schemas:
    Person:
      properties:
        name: {type: string}
"#);
        let op = spec.paths["/people"].post.as_ref().unwrap();
        let Some(RequestBodyOrRef::RequestBody(rb)) = op.request_body.as_ref() else {
            panic!("expected inline body");
        };
        let schema = rb.content["application/json"].schema.as_ref().unwrap();
        assert_eq!(schema.ref_name().as_deref(), Some("Person"));
        assert_eq!(spec.components.as_ref().unwrap().schemas.len(), 1);
    }

    #[test]
    fn composed_branches_are_flattened_independently() {
        let spec = run(r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Shape:
      oneOf:
        - type: string
        - $ref: "#/components/schemas/Circle"
        - properties:
            side: {type: number}
    Circle:
      properties:
        radius: {type: number}
"##);
        let shape = component(&spec, "Shape");
        assert!(matches!(
            shape.one_of[0].as_schema().and_then(|s| s.schema_type.clone()),
            Some(parse::schema::TypeSet::Single(SchemaType::String))
        ));
        assert_eq!(shape.one_of[1].ref_name().as_deref(), Some("Circle"));
        assert_eq!(shape.one_of[2].ref_name().as_deref(), Some("ShapeVariant3"));
    }

    #[test]
    fn inline_composed_property_is_extracted() {
        let spec = run(r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Owner:
      properties:
        pet:
          anyOf:
            - $ref: "#/components/schemas/Cat"
            - $ref: "#/components/schemas/Dog"
    Cat: {properties: {lives: {type: integer}}}
    Dog: {properties: {good: {type: boolean}}}
"##);
        let owner = component(&spec, "Owner");
        assert_eq!(property(owner, "pet").ref_name().as_deref(), Some("OwnerPet"));
        assert_eq!(component(&spec, "OwnerPet").any_of.len(), 2);
    }

    #[test]
    fn record_all_of_members_stay_inline() {
        let spec = run(r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Base: {properties: {id: {type: integer}}}
    Dog:
      allOf:
        - $ref: "#/components/schemas/Base"
        - properties:
            collar:
              properties:
                color: {type: string}
"##);
        let dog = component(&spec, "Dog");
        let own = dog.all_of[1].as_schema().expect("own block stays inline");
        assert_eq!(property(own, "collar").ref_name().as_deref(), Some("DogCollar"));
    }

    #[test]
    fn names_avoid_existing_components() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    PetOwner: {type: string}
    Pet:
      properties:
        owner: {properties: {name: {type: string}}}
"#);
        let pet = component(&spec, "Pet");
        assert_eq!(property(pet, "owner").ref_name().as_deref(), Some("PetOwner2"));
    }

    #[test]
    fn operation_locations_use_operation_context() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /pets/{id}:
    get:
      parameters:
        - name: filter
          in: query
          schema:
            properties:
              tag: {type: string}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                properties:
                  id: {type: integer}
        "404":
          description: missing
          content:
            application/json:
              schema:
                properties:
                  message: {type: string}
"#);
        let names: Vec<&String> = spec.components.as_ref().unwrap().schemas.keys().collect();
        assert_eq!(
            names,
            vec!["GetPetFilter", "GetPetResponse", "GetPet404Response"]
        );
    }

    #[test]
    fn links_to_equal_component_declared_later() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Order:
      properties:
        customer:
          properties:
            id: {type: integer}
    Customer:
      properties:
        id: {type: integer}
"#);
        let names: Vec<&String> = spec.components.as_ref().unwrap().schemas.keys().collect();
        assert_eq!(names, vec!["Order", "Customer"]);
        assert_eq!(
            property(component(&spec, "Order"), "customer").ref_name().as_deref(),
            Some("Customer")
        );
    }

    #[test]
    fn merging_cascades_to_parents() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
components:
  schemas:
    Invoice:
      properties:
        billing:
          properties:
            address:
              properties:
                city: {type: string}
    Billing:
      properties:
        address:
          properties:
            city: {type: string}
"#);
        let names: Vec<&String> = spec.components.as_ref().unwrap().schemas.keys().collect();
        assert_eq!(names, vec!["Invoice", "Billing", "InvoiceBillingAddress"]);
        assert_eq!(
            property(component(&spec, "Invoice"), "billing").ref_name().as_deref(),
            Some("Billing")
        );
        assert_eq!(
            property(component(&spec, "Billing"), "address").ref_name().as_deref(),
            Some("InvoiceBillingAddress")
        );
    }

    #[test]
    fn callbacks_and_webhooks_are_flattened() {
        let spec = run(r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /subscriptions:
    post:
      operationId: subscribe
      responses:
        "201": {description: created}
      callbacks:
        onEvent:
          "{$request.body#/callbackUrl}":
            post:
              requestBody:
                content:
                  application/json:
                    schema:
                      properties:
                        kind: {type: string}
              responses:
                "200": {description: ok}
webhooks:
  newPet:
    post:
      operationId: petAdded
      requestBody:
        content:
          application/json:
            schema:
              properties:
                name: {type: string}
      responses:
        "200": {description: ok}
"#);
        let names: Vec<&String> = spec.components.as_ref().unwrap().schemas.keys().collect();
        assert_eq!(names, vec!["SubscribeOnEventPostBody", "PetAddedBody"]);

        let op = spec.paths["/subscriptions"].post.as_ref().unwrap();
        let CallbackOrRef::Callback(items) = &op.callbacks["onEvent"] else {
            panic!("expected inline callback");
        };
        let callback_op = items["{$request.body#/callbackUrl}"].post.as_ref().unwrap();
        let Some(RequestBodyOrRef::RequestBody(rb)) = callback_op.request_body.as_ref() else {
            panic!("expected inline body");
        };
        assert_eq!(
            rb.content["application/json"].schema.as_ref().unwrap().ref_name().as_deref(),
            Some("SubscribeOnEventPostBody")
        );
    }
}
