use crate::parse::reference::{ComponentSection, parse_component_ref};
use crate::parse::response::{Response, ResponseOrRef};
use crate::parse::spec::OpenApiSpec;

use super::context::{DiagnosticKind, NormalizationContext};

/// Warn about responses whose status code conventionally has no body but which
/// still declare a schema. The document is left as is.
pub fn check_bodyless_responses(spec: &OpenApiSpec, ctx: &mut NormalizationContext) {
    for (path, item) in &spec.paths {
        for (method, op) in item.operations() {
            for (status, response) in &op.responses {
                if !ctx.config.responses.is_bodyless(status) {
                    continue;
                }
                let Some(response) = lookup_response(spec, response) else {
                    continue;
                };
                for media_type in bodies_with_schema(response) {
                    ctx.report(
                        DiagnosticKind::EmptyResponseWithBody,
                        format!(
                            "{} {} declares a {} body for status {}, which carries no content",
                            method.as_str(),
                            path,
                            media_type,
                            status
                        ),
                        format!(
                            "#/paths/{}/{}/responses/{}",
                            path,
                            method.as_str().to_lowercase(),
                            status
                        ),
                    );
                }
            }
        }
    }
}

fn lookup_response<'a>(spec: &'a OpenApiSpec, response: &'a ResponseOrRef) -> Option<&'a Response> {
    match response {
        ResponseOrRef::Response(r) => Some(r),
        ResponseOrRef::Ref { ref_path, .. } => {
            let name = parse_component_ref(ref_path, ComponentSection::Responses)?;
            match spec.components.as_ref()?.responses.get(&name)? {
                ResponseOrRef::Response(r) => Some(r),
                ResponseOrRef::Ref { .. } => None,
            }
        }
    }
}

fn bodies_with_schema(response: &Response) -> impl Iterator<Item = &str> {
    response
        .content
        .iter()
        .filter(|(_, mt)| mt.schema.is_some() || mt.item_schema.is_some())
        .map(|(name, _)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn flags_schema_on_no_content_status() {
        let spec = parse::from_yaml(
            r##"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /pets/{id}:
    delete:
      responses:
        "204":
          description: deleted
          content:
            application/json:
              schema: {type: object}
        "200":
          description: ok
          content:
            application/json:
              schema: {type: object}
    put:
      responses:
        "304":
          $ref: "#/components/responses/NotModified"
components:
  responses:
    NotModified:
      description: cached
      content:
        text/plain:
          schema: {type: string}
"##,
        )
        .unwrap();
        let mut ctx = NormalizationContext::default();
        check_bodyless_responses(&spec, &mut ctx);

        let diagnostics = ctx.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::EmptyResponseWithBody)
        );
        assert_eq!(diagnostics[0].location, "#/paths//pets/{id}/put/responses/304");
        assert_eq!(diagnostics[1].location, "#/paths//pets/{id}/delete/responses/204");
    }

    #[test]
    fn bodyless_status_without_content_is_fine() {
        let spec = parse::from_yaml(
            r#"
openapi: "3.1.0"
info: {title: T, version: "1"}
paths:
  /health:
    head:
      responses:
        "204": {description: alive}
"#,
        )
        .unwrap();
        let mut ctx = NormalizationContext::default();
        check_bodyless_responses(&spec, &mut ctx);
        assert!(ctx.diagnostics().is_empty());
    }
}
