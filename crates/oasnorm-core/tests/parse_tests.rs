use oasnorm_core::parse;
use oasnorm_core::parse::operation::CallbackOrRef;

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");
const PATH_PARAMETERS: &str = include_str!("fixtures/path-parameters.yaml");

#[test]
fn parse_petstore_yaml() {
    let spec = parse::from_yaml(PETSTORE).expect("should parse petstore");
    assert_eq!(spec.openapi, "3.1.0");
    assert_eq!(spec.info.title, "Petstore");
    assert_eq!(spec.paths.len(), 3);

    let components = spec.components.as_ref().expect("should have components");
    assert_eq!(components.schemas.len(), 3);

    // Path-level parameters are kept on the path item
    let item = spec.paths.get("/pets/{pet_id}").expect("should have /pets/{pet_id}");
    assert_eq!(item.parameters.len(), 1);
    let methods: Vec<&str> = item
        .operations()
        .into_iter()
        .map(|(method, _)| method.as_str())
        .collect();
    assert_eq!(methods, vec!["GET", "DELETE"]);
}

#[test]
fn parse_path_parameters() {
    let spec = parse::from_yaml(PATH_PARAMETERS).unwrap();
    let op = spec.paths["/orders/{Order-Id}/lines/{line.no}"]
        .get
        .as_ref()
        .unwrap();
    match &op.parameters[1] {
        oasnorm_core::parse::parameter::ParameterOrRef::Parameter(p) => {
            assert_eq!(p.name, "line.no");
            assert!(p.is_path());
            assert!(p.required);
        }
        _ => panic!("expected inline parameter"),
    }
}

#[test]
fn parse_invalid_version() {
    let yaml = r#"
openapi: "2.0.0"
info:
  title: Test
  version: "1.0"
paths: {}
"#;
    let result = parse::from_yaml(yaml);
    assert!(result.is_err());
}

#[test]
fn parse_all_of_record() {
    let spec = parse::from_yaml(PETSTORE).unwrap();
    let components = spec.components.as_ref().unwrap();

    let pet = components.schemas.get("pet").unwrap();
    match pet {
        oasnorm_core::parse::schema::SchemaOrRef::Schema(s) => {
            assert_eq!(s.all_of.len(), 2);
            assert_eq!(s.all_of[0].ref_name().as_deref(), Some("pet_base"));
            match &s.all_of[1] {
                oasnorm_core::parse::schema::SchemaOrRef::Schema(own) => {
                    assert!(own.properties.contains_key("owner"));
                }
                _ => panic!("expected inline allOf member"),
            }
        }
        _ => panic!("expected inline schema"),
    }
}

#[test]
fn yaml_round_trip_keeps_extensions() {
    let yaml = r#"
openapi: "3.1.0"
info: {title: Ext, version: "1"}
components:
  schemas:
    Money:
      type: string
      x-rust-type: decimal
"#;
    let spec = parse::from_yaml(yaml).unwrap();
    let out = parse::to_yaml(&spec).unwrap();
    assert!(out.contains("x-rust-type: decimal"));
    assert_eq!(parse::from_yaml(&out).unwrap(), spec);
}

#[test]
fn unquoted_status_codes_parse_everywhere() {
    let yaml = r#"
openapi: "3.1.0"
info: {title: Callbacks, version: "1"}
paths:
  /subscribe:
    post:
      responses:
        201: {description: created}
      callbacks:
        done:
          "{$request.body#/url}":
            post:
              responses:
                200: {description: ok}
"#;
    let spec = parse::from_yaml(yaml).unwrap();
    let op = spec.paths["/subscribe"].post.as_ref().unwrap();
    assert!(op.responses.contains_key("201"));
    match &op.callbacks["done"] {
        CallbackOrRef::Callback(items) => {
            let callback_op = items["{$request.body#/url}"].post.as_ref().unwrap();
            assert!(callback_op.responses.contains_key("200"));
        }
        CallbackOrRef::Ref { .. } => panic!("expected inline callback"),
    }
}
