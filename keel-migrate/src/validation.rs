//! Validation results collected from changes and generators.

use std::fmt;

/// Errors and warnings found while validating a change or statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationErrors {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Record a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record an error when a required field is missing or blank.
    pub fn check_required(&mut self, field: &str, value: Option<&str>) {
        if value.map(|v| v.trim().is_empty()).unwrap_or(true) {
            self.add_error(format!("{} is required", field));
        }
    }

    /// Record an error when a required list is empty.
    pub fn check_not_empty<T>(&mut self, field: &str, values: &[T]) {
        if values.is_empty() {
            self.add_error(format!("{} must not be empty", field));
        }
    }

    /// Record an error when two mutually exclusive fields are both set.
    pub fn check_exclusive(&mut self, first: &str, first_set: bool, second: &str, second_set: bool) {
        if first_set && second_set {
            self.add_error(format!("{} and {} are mutually exclusive", first, second));
        }
    }

    /// Append another result.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Whether any errors were recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Recorded warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_required() {
        let mut errors = ValidationErrors::new();
        errors.check_required("tableName", Some("users"));
        assert!(!errors.has_errors());

        errors.check_required("columnName", Some("  "));
        errors.check_required("newColumnName", None);
        assert_eq!(errors.errors().len(), 2);
        assert_eq!(
            errors.to_string(),
            "columnName is required; newColumnName is required"
        );
    }

    #[test]
    fn test_exclusive_and_merge() {
        let mut errors = ValidationErrors::new();
        errors.check_exclusive("sql", true, "path", false);
        assert!(!errors.has_errors());

        let mut other = ValidationErrors::new();
        other.check_exclusive("sql", true, "path", true);
        other.add_warning("deprecated");
        errors.merge(other);

        assert!(errors.has_errors());
        assert_eq!(errors.warnings(), ["deprecated".to_string()]);
    }
}
