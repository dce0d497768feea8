use std::collections::HashSet;

use heck::{ToLowerCamelCase, ToPascalCase};

use crate::config::NamingConfig;

/// Which case the first character of a sanitized identifier must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentCase {
    /// Schema names.
    Upper,
    /// Path parameter names.
    Lower,
}

/// Result of applying the naming rule to one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    Ident(String),
    /// No identifier characters survived and there is no marker to stand in.
    Fallback,
}

/// Apply the identifier rule.
///
/// Splits on every non-alphanumeric character, upper-cases the first letter of
/// each non-empty segment and concatenates. An empty result, a leading digit
/// or a reserved word gets the configured marker prefix. Finally the first
/// character is forced to `case`.
pub fn sanitize_identifier(name: &str, case: IdentCase, naming: &NamingConfig) -> Sanitized {
    let mut stem: String = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|seg| !seg.is_empty())
        .map(title_case)
        .collect();

    let starts_with_digit = stem.chars().next().is_some_and(|c| c.is_ascii_digit());
    if stem.is_empty() || starts_with_digit || naming.is_reserved(&stem) {
        stem = format!("{}{}", title_case(&naming.marker), stem);
    }

    if stem.is_empty() {
        return Sanitized::Fallback;
    }
    Sanitized::Ident(with_first_case(&stem, case))
}

/// Canonical component schema name.
pub fn schema_name(name: &str, naming: &NamingConfig) -> Sanitized {
    sanitize_identifier(name, IdentCase::Upper, naming)
}

/// Canonical path parameter name.
pub fn parameter_name(name: &str, naming: &NamingConfig) -> Sanitized {
    sanitize_identifier(name, IdentCase::Lower, naming)
}

/// Whether `name` is already in canonical form for `case`.
pub fn is_canonical(name: &str, case: IdentCase, naming: &NamingConfig) -> bool {
    matches!(sanitize_identifier(name, case, naming), Sanitized::Ident(ref s) if s == name)
}

fn title_case(segment: &str) -> String {
    with_first_case(segment, IdentCase::Upper)
}

fn with_first_case(s: &str, case: IdentCase) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let head: String = match case {
                IdentCase::Upper => first.to_uppercase().collect(),
                IdentCase::Lower => first.to_lowercase().collect(),
            };
            head + chars.as_str()
        }
        None => String::new(),
    }
}

/// Reserve `base` in `used_names`, appending numeric suffixes if needed.
pub fn unique_name(base: &str, used_names: &mut HashSet<String>) -> String {
    if used_names.insert(base.to_string()) {
        return base.to_string();
    }
    let mut i = 2;
    loop {
        let candidate = format!("{}{}", base, i);
        if used_names.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

/// Name stem for everything extracted from one operation: the `operationId`
/// when present, otherwise a name derived from method and path.
pub fn operation_context(operation_id: Option<&str>, method: &str, path: &str) -> String {
    match operation_id {
        Some(id) if !id.trim().is_empty() => id.to_pascal_case(),
        _ => route_to_name(method, path).to_pascal_case(),
    }
}

/// Derive a camelCase operation name from HTTP method + path.
///
/// Examples:
/// - `GET /users` → `listUsers`
/// - `POST /users` → `createUsers`
/// - `GET /users/{userId}` → `getUser`
/// - `DELETE /users/{userId}` → `deleteUser`
/// - `GET /users/{userId}/messages` → `listUsersMessages`
pub fn route_to_name(method: &str, path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut resource_parts: Vec<String> = Vec::new();
    let mut ends_with_param = false;

    for seg in &segments {
        if seg.starts_with('{') && seg.ends_with('}') {
            ends_with_param = true;
        } else {
            resource_parts.push(seg.to_string());
            ends_with_param = false;
        }
    }

    let method_upper = method.to_uppercase();
    let prefix = match method_upper.as_str() {
        "GET" if ends_with_param => "get",
        "GET" => "list",
        "POST" => "create",
        "PUT" => "update",
        "DELETE" => "delete",
        "PATCH" => "patch",
        "OPTIONS" => "options",
        "HEAD" => "head",
        "TRACE" => "trace",
        other => other,
    };

    if resource_parts.is_empty() {
        return prefix.to_lower_camel_case();
    }

    let mut pascal_parts = String::new();
    for (i, part) in resource_parts.iter().enumerate() {
        let is_last = i == resource_parts.len() - 1;
        let word = if is_last && ends_with_param {
            singularize(part)
        } else {
            part.to_string()
        };
        pascal_parts.push_str(&word.to_pascal_case());
    }

    format!("{prefix}{pascal_parts}")
}

/// Naive singularization: strips trailing 's' if present.
fn singularize(word: &str) -> String {
    if word.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if word.ends_with("ses") || word.ends_with("xes") || word.ends_with("zes") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Template variables of a path, in order: `/a/{x}/b/{y}` → `["x", "y"]`.
pub fn template_params(path: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                params.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    params
}

/// Replace each `{param}` in `path` through `rename`, leaving others untouched.
pub fn rewrite_template<'a>(path: &str, rename: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let param = &after[..end];
        out.push_str(&rest[..=start]);
        out.push_str(rename(param).unwrap_or(param));
        out.push('}');
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
