//! Semantic validation rules for content descriptors.

use std::collections::HashSet;

use serde_json::Value;

use super::{ValidationIssue, ValidationResult};

/// Extensions of content files (front matter plus body).
const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown", "html", "qmd"];

/// Extensions of pure data files.
const DATA_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Formats a front matter or data file may be written in.
const DATA_FORMATS: &[&str] = &["yaml", "toml", "json"];

/// Validates a collection's format annotation and field keys.
pub fn validate_collection(entry: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Some(extension) = entry.get("extension").and_then(Value::as_str) {
        validate_format(entry, extension, &format!("{}.extension", path), path, &mut result);
    }

    result.extend(validate_field_keys(entry, path));
    result
}

/// Validates a single's format annotation and field keys.
pub fn validate_single(entry: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Some(file) = entry.get("file").and_then(Value::as_str) {
        match std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(extension) => {
                validate_format(entry, extension, &format!("{}.file", path), path, &mut result)
            }
            None => result.add(
                ValidationIssue::error(
                    format!("{}.file", path),
                    format!("File '{}' has no extension", file),
                )
                .with_suggestion(format!(
                    "Use one of: {}",
                    [CONTENT_EXTENSIONS, DATA_EXTENSIONS].concat().join(", ")
                )),
            ),
        }
    }

    result.extend(validate_field_keys(entry, path));
    result
}

/// Checks the `dataformat` annotation against the backing file extension.
///
/// Content files need a front matter format; data files may omit it, but a
/// declared format must agree with the extension.
fn validate_format(
    entry: &Value,
    extension: &str,
    extension_path: &str,
    path: &str,
    result: &mut ValidationResult,
) {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    let dataformat_path = format!("{}.dataformat", path);
    let dataformat = entry.get("dataformat").and_then(Value::as_str);

    if CONTENT_EXTENSIONS.contains(&extension.as_str()) {
        match dataformat {
            None => result.add(
                ValidationIssue::error(
                    dataformat_path,
                    format!(
                        "A dataformat is required for '{}' content files",
                        extension
                    ),
                )
                .with_suggestion(format!("Valid formats: {}", DATA_FORMATS.join(", "))),
            ),
            Some(format) if !DATA_FORMATS.contains(&normalize(format).as_str()) => result.add(
                ValidationIssue::error(
                    dataformat_path,
                    format!("Unsupported dataformat '{}'", format),
                )
                .with_suggestion(format!("Did you mean '{}'?", closest_format(format))),
            ),
            Some(_) => {}
        }
    } else if DATA_EXTENSIONS.contains(&extension.as_str()) {
        if let Some(format) = dataformat {
            if normalize(format) != normalize(&extension) {
                result.add(
                    ValidationIssue::error(
                        dataformat_path,
                        format!(
                            "Dataformat '{}' does not match the file extension '{}'",
                            format, extension
                        ),
                    )
                    .with_suggestion(format!(
                        "Set dataformat to '{}' or remove it",
                        normalize(&extension)
                    )),
                );
            }
        }
    } else {
        result.add(
            ValidationIssue::error(
                extension_path,
                format!("Unsupported extension '{}'", extension),
            )
            .with_suggestion(format!(
                "Use one of: {}",
                [CONTENT_EXTENSIONS, DATA_EXTENSIONS].concat().join(", ")
            )),
        );
    }
}

/// Validates that every field key in `entry` is a unique string, recursing
/// into nested field groups. Uniqueness is checked per list.
pub fn validate_field_keys(entry: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    if let Some(fields) = entry.get("fields").and_then(Value::as_array) {
        check_fields(fields, &format!("{}.fields", path), &mut result);
    }
    result
}

fn check_fields(fields: &[Value], path: &str, result: &mut ValidationResult) {
    let mut seen = HashSet::new();

    for (i, field) in fields.iter().enumerate() {
        let field_path = format!("{}[{}]", path, i);

        match field.get("key") {
            Some(Value::String(key)) => {
                if !seen.insert(key.as_str()) {
                    result.add(ValidationIssue::error(
                        format!("{}.key", field_path),
                        format!("Duplicate field key '{}' in {}", key, path),
                    ));
                }
            }
            Some(other) => result.add(ValidationIssue::error(
                format!("{}.key", field_path),
                format!("Field key must be a string, found {}", other),
            )),
            None => result.add(ValidationIssue::error(
                format!("{}.key", field_path),
                "Field is missing a key",
            )),
        }

        if let Some(nested) = field.get("fields").and_then(Value::as_array) {
            check_fields(nested, &format!("{}.fields", field_path), result);
        }
    }
}

/// Warns about menu items that point at no single or collection.
pub fn validate_menu(model: &Value) -> ValidationResult {
    let mut result = ValidationResult::new();

    let known: HashSet<&str> = ["singles", "collections"]
        .iter()
        .filter_map(|section| model.get(*section).and_then(Value::as_array))
        .flatten()
        .filter_map(|entry| entry.get("key").and_then(Value::as_str))
        .collect();

    let sections = model.get("menu").and_then(Value::as_array);
    for (i, section) in sections.into_iter().flatten().enumerate() {
        let items = section.get("menuItems").and_then(Value::as_array);
        for (j, item) in items.into_iter().flatten().enumerate() {
            let Some(key) = item.get("key").and_then(Value::as_str) else {
                continue;
            };
            if !known.contains(key) {
                result.add(
                    ValidationIssue::warning(
                        format!("menu[{}].menuItems[{}]", i, j),
                        format!("Menu item '{}' does not match any single or collection", key),
                    )
                    .with_suggestion("The item will not be shown"),
                );
            }
        }
    }

    result
}

fn normalize(format: &str) -> String {
    match format.to_ascii_lowercase().as_str() {
        "yml" => "yaml".to_string(),
        other => other.to_string(),
    }
}

/// Finds the most similar data format using Levenshtein distance.
fn closest_format(input: &str) -> &'static str {
    let input = input.to_ascii_lowercase();
    DATA_FORMATS
        .iter()
        .min_by_key(|format| strsim::levenshtein(&input, format))
        .copied()
        .unwrap_or("yaml")
}
