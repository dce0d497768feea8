//! Structural fingerprints used to deduplicate extracted schemas.
//!
//! The canonical form is compact JSON with these ordering rules:
//! - object keys are sorted lexicographically (so property order never matters),
//! - a `required` list of strings is sorted and deduplicated,
//! - every other array keeps document order (`allOf`/`oneOf` member order,
//!   `enum` values, tuple items).
//!
//! Component names never appear in a schema's own content, so the signature
//! excludes the name the schema is (or will be) registered under.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::parse::schema::Schema;

/// Canonical structural fingerprint of a schema node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the canonical signature of a schema.
pub fn signature_of(schema: &Schema) -> Signature {
    // Schema only has string-keyed maps, so conversion to a JSON value cannot fail.
    let value = serde_json::to_value(schema).unwrap_or(Value::Null);
    let mut out = String::new();
    write_canonical(&value, &mut out);
    Signature(out)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                match (key.as_str(), &map[key]) {
                    ("required", Value::Array(items)) => write_required(items, out),
                    (_, v) => write_canonical(v, out),
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_required(items: &[Value], out: &mut String) {
    let mut names: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    names.sort();
    names.dedup();
    out.push('[');
    out.push_str(&names.join(","));
    out.push(']');
}

/// Registry of signatures for schemas that already live in the component table.
#[derive(Debug, Default)]
pub struct SignatureStore {
    by_signature: HashMap<Signature, String>,
}

impl SignatureStore {
    pub fn lookup(&self, signature: &Signature) -> Option<&str> {
        self.by_signature.get(signature).map(String::as_str)
    }

    /// Bind `signature` to `name`, replacing any earlier binding of that signature.
    ///
    /// Callers check [`SignatureStore::lookup`] first; registering blindly would
    /// let a later component shadow an earlier, equal one. Merging an extracted
    /// component into its declared twin rebinds on purpose.
    pub fn register(&mut self, signature: Signature, name: &str) {
        self.by_signature.insert(signature, name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(yaml: &str) -> Schema {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn property_order_does_not_change_signature() {
        let a = schema("properties: {name: {type: string}, age: {type: integer}}");
        let b = schema("properties: {age: {type: integer}, name: {type: string}}");
        assert_eq!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn required_order_does_not_change_signature() {
        let a = schema("properties: {a: {}, b: {}}\nrequired: [a, b]");
        let b = schema("properties: {a: {}, b: {}}\nrequired: [b, a]");
        assert_eq!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn different_property_types_differ() {
        let a = schema("properties: {id: {type: integer}}");
        let b = schema("properties: {id: {type: string}}");
        assert_ne!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn composed_member_order_is_significant() {
        let a = schema("oneOf: [{type: string}, {type: integer}]");
        let b = schema("oneOf: [{type: integer}, {type: string}]");
        assert_ne!(signature_of(&a), signature_of(&b));
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let s = schema("type: object\nproperties: {b: {type: string}, a: {type: integer}}");
        insta::assert_snapshot!(
            signature_of(&s).as_str(),
            @r#"{"properties":{"a":{"type":"integer"},"b":{"type":"string"}},"type":"object"}"#
        );
    }

    #[test]
    fn register_overwrites_signature_binding() {
        let sig = signature_of(&schema("properties: {id: {type: integer}}"));
        let mut store = SignatureStore::default();
        assert!(store.lookup(&sig).is_none());
        store.register(sig.clone(), "First");
        assert_eq!(store.lookup(&sig), Some("First"));
        store.register(sig.clone(), "Second");
        assert_eq!(store.lookup(&sig), Some("Second"));
    }
}
