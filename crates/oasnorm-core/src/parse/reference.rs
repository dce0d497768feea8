use std::fmt;

use crate::error::NormalizeError;

const COMPONENTS_PREFIX: &str = "#/components/";

/// A section of the Components object that `$ref` strings can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentSection {
    Schemas,
    Responses,
    Parameters,
    Examples,
    RequestBodies,
    Headers,
    SecuritySchemes,
    Links,
    Callbacks,
    PathItems,
}

impl ComponentSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentSection::Schemas => "schemas",
            ComponentSection::Responses => "responses",
            ComponentSection::Parameters => "parameters",
            ComponentSection::Examples => "examples",
            ComponentSection::RequestBodies => "requestBodies",
            ComponentSection::Headers => "headers",
            ComponentSection::SecuritySchemes => "securitySchemes",
            ComponentSection::Links => "links",
            ComponentSection::Callbacks => "callbacks",
            ComponentSection::PathItems => "pathItems",
        }
    }

    fn from_str(section: &str) -> Option<Self> {
        match section {
            "schemas" => Some(ComponentSection::Schemas),
            "responses" => Some(ComponentSection::Responses),
            "parameters" => Some(ComponentSection::Parameters),
            "examples" => Some(ComponentSection::Examples),
            "requestBodies" => Some(ComponentSection::RequestBodies),
            "headers" => Some(ComponentSection::Headers),
            "securitySchemes" => Some(ComponentSection::SecuritySchemes),
            "links" => Some(ComponentSection::Links),
            "callbacks" => Some(ComponentSection::Callbacks),
            "pathItems" => Some(ComponentSection::PathItems),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build `#/components/<section>/<name>`, escaping the name as a JSON pointer token.
pub fn component_ref(section: ComponentSection, name: &str) -> String {
    format!(
        "{}{}/{}",
        COMPONENTS_PREFIX,
        section.as_str(),
        escape_token(name)
    )
}

/// An internal reference into the Components object.
///
/// `tail` is the still-escaped JSON pointer below the component itself
/// (`/properties/name`), empty when the reference names the whole component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPointer {
    pub section: ComponentSection,
    pub name: String,
    pub tail: String,
}

impl ComponentPointer {
    /// The same pointer re-rooted at a differently named component.
    pub fn with_name(&self, name: &str) -> String {
        format!("{}{}", component_ref(self.section, name), self.tail)
    }
}

/// Split an internal `$ref` into section, unescaped component name and the
/// pointer below it.
///
/// Returns `Ok(None)` for references that do not point into this document's
/// components (external files, other JSON pointers).
pub fn split_component_ref(ref_path: &str) -> Result<Option<ComponentPointer>, NormalizeError> {
    let Some(stripped) = ref_path.strip_prefix(COMPONENTS_PREFIX) else {
        return Ok(None);
    };
    let invalid = || NormalizeError::InvalidRefFormat(ref_path.to_string());
    let (section, rest) = stripped.split_once('/').ok_or_else(invalid)?;
    let section = ComponentSection::from_str(section).ok_or_else(invalid)?;
    let (name, tail) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    Ok(Some(ComponentPointer {
        section,
        name: unescape_token(name),
        tail: tail.to_string(),
    }))
}

/// Extract the component name from a `$ref` that names a whole component in
/// the expected section. Pointers into a component's interior yield `None`.
pub fn parse_component_ref(ref_path: &str, expected: ComponentSection) -> Option<String> {
    match split_component_ref(ref_path) {
        Ok(Some(pointer)) if pointer.section == expected && pointer.tail.is_empty() => {
            Some(pointer.name)
        }
        _ => None,
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_schema_ref() {
        let r = component_ref(ComponentSection::Schemas, "Pet");
        assert_eq!(r, "#/components/schemas/Pet");
        assert_eq!(
            parse_component_ref(&r, ComponentSection::Schemas).as_deref(),
            Some("Pet")
        );
        assert_eq!(parse_component_ref(&r, ComponentSection::Responses), None);
    }

    #[test]
    fn escapes_json_pointer_tokens() {
        let r = component_ref(ComponentSection::Schemas, "a/b~c");
        assert_eq!(r, "#/components/schemas/a~1b~0c");
        assert_eq!(
            parse_component_ref(&r, ComponentSection::Schemas).as_deref(),
            Some("a/b~c")
        );
    }

    #[test]
    fn external_refs_are_not_components() {
        assert!(matches!(split_component_ref("common.yaml#/Pet"), Ok(None)));
    }

    #[test]
    fn rejects_malformed_component_refs() {
        assert!(split_component_ref("#/components/schemas").is_err());
        assert!(split_component_ref("#/components/schemas/").is_err());
        assert!(split_component_ref("#/components/widgets/Pet").is_err());
    }

    #[test]
    fn splits_pointers_into_a_component() {
        let pointer = split_component_ref("#/components/schemas/pet_owner/properties/name")
            .unwrap()
            .unwrap();
        assert_eq!(pointer.section, ComponentSection::Schemas);
        assert_eq!(pointer.name, "pet_owner");
        assert_eq!(pointer.tail, "/properties/name");
        assert_eq!(
            pointer.with_name("PetOwner"),
            "#/components/schemas/PetOwner/properties/name"
        );
        assert_eq!(
            parse_component_ref(
                "#/components/schemas/pet_owner/properties/name",
                ComponentSection::Schemas
            ),
            None
        );
    }
}
