//! Workspace model validation.
//!
//! Validation runs in two layers: structural checks against JSON schemas
//! ([`schema`]) and semantic rules the schemas cannot express ([`semantic`]).
//! Issues are collected in the order they are found; the provider only
//! surfaces the first error.

pub mod report;
pub mod schema;
pub mod semantic;

use serde_json::Value;

use crate::error::ModelResult;
use schema::ModelSchemas;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Blocks the model from loading.
    Error,
    /// Logged but allows loading.
    Warning,
}

/// A validation issue found while checking a model.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Path to the problematic entry (e.g., "collections[0].fields[2]").
    pub path: String,
    /// Description of the issue.
    pub message: String,
    /// Optional suggestion for fixing the issue.
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Creates a new error-level validation issue.
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Creates a new warning-level validation issue.
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Adds a suggestion to this validation issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// One-line description used in error messages.
    pub fn describe(&self) -> String {
        let described = if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.path, self.message)
        };
        match &self.suggestion {
            Some(suggestion) => format!("{} ({})", described, suggestion),
            None => described,
        }
    }
}

/// Result of validating a model.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Creates an empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Adds an issue to the result.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Extends the result with issues from another result.
    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Returns true if there are no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over error-level issues.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Error)
    }

    /// Returns an iterator over warning-level issues.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Describes the first error, if any.
    pub fn first_error(&self) -> Option<String> {
        self.errors().next().map(ValidationIssue::describe)
    }
}

/// Validates merged models against the structural schemas and semantic rules.
pub struct ConfigValidator {
    schemas: ModelSchemas,
}

impl ConfigValidator {
    /// Compiles the model schemas.
    pub fn new() -> ModelResult<Self> {
        Ok(Self {
            schemas: ModelSchemas::compile()?,
        })
    }

    /// Runs every validation layer over a merged model.
    pub fn validate(&self, model: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        result.extend(self.schemas.validate_root(model));

        for (i, entry) in entries(model, "collections").iter().enumerate() {
            let path = format!("collections[{}]", i);
            result.extend(self.schemas.validate_collection(entry, &path));
            result.extend(semantic::validate_collection(entry, &path));
        }

        for (i, entry) in entries(model, "singles").iter().enumerate() {
            let path = format!("singles[{}]", i);
            result.extend(self.schemas.validate_single(entry, &path));
            result.extend(semantic::validate_single(entry, &path));
        }

        for (i, entry) in entries(model, "dynamics").iter().enumerate() {
            result.extend(semantic::validate_field_keys(
                entry,
                &format!("dynamics[{}]", i),
            ));
        }

        result.extend(semantic::validate_menu(model));
        result
    }

    /// Validates and returns the first error message, or `None` when valid.
    pub fn first_error(&self, model: &Value) -> Option<String> {
        let result = self.validate(model);
        for issue in result.warnings() {
            tracing::warn!(
                path = %issue.path,
                message = %issue.message,
                suggestion = ?issue.suggestion,
                "Model validation warning"
            );
        }
        result.first_error()
    }
}

fn entries<'a>(model: &'a Value, section: &str) -> &'a [Value] {
    model
        .get(section)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_model() -> Value {
        json!({
            "ssgType": "hugo",
            "serve": [{"key": "default", "config": "config.toml"}],
            "build": [{"key": "default", "config": "config.toml"}],
            "collections": [{
                "key": "posts",
                "title": "Posts",
                "folder": "content/posts",
                "extension": "md",
                "dataformat": "yaml",
                "fields": [
                    {"key": "title", "type": "string"},
                    {"key": "seo", "type": "nest", "fields": [{"key": "title", "type": "string"}]}
                ]
            }],
            "singles": [{
                "key": "mainConfig",
                "file": "config.toml",
                "fields": [{"key": "title", "type": "string"}]
            }]
        })
    }

    #[test]
    fn accepts_a_valid_model() {
        let validator = ConfigValidator::new().unwrap();
        let result = validator.validate(&valid_model());
        assert!(result.is_valid(), "{:?}", result.first_error());
        assert_eq!(validator.first_error(&valid_model()), None);
    }

    #[test]
    fn reports_duplicate_field_keys() {
        let validator = ConfigValidator::new().unwrap();
        let mut model = valid_model();
        model["singles"][0]["fields"] = json!([
            {"key": "x", "type": "string"},
            {"key": "x", "type": "number"}
        ]);

        let message = validator.first_error(&model).unwrap();
        assert!(message.contains("'x'"), "{}", message);
        assert!(message.contains("singles[0]"), "{}", message);
    }

    #[test]
    fn reports_duplicates_in_nested_groups() {
        let validator = ConfigValidator::new().unwrap();
        let mut model = valid_model();
        model["collections"][0]["fields"][1]["fields"] = json!([
            {"key": "description"},
            {"key": "description"}
        ]);

        let message = validator.first_error(&model).unwrap();
        assert!(message.contains("'description'"), "{}", message);
    }

    #[test]
    fn structural_errors_come_first() {
        let validator = ConfigValidator::new().unwrap();
        let mut model = valid_model();
        model.as_object_mut().unwrap().remove("serve");
        model["singles"][0]["fields"] = json!([{"key": "x"}, {"key": "x"}]);

        let result = validator.validate(&model);
        assert!(result.error_count() >= 2);
        assert!(result.first_error().unwrap().contains("serve"));
    }

    #[test]
    fn missing_content_dataformat_is_rejected() {
        let validator = ConfigValidator::new().unwrap();
        let mut model = valid_model();
        model["collections"][0]
            .as_object_mut()
            .unwrap()
            .remove("dataformat");

        let message = validator.first_error(&model).unwrap();
        assert!(message.contains("dataformat"), "{}", message);
    }
}
