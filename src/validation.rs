//! Field level validation errors shared by the request payloads.

use std::fmt::{self, Display};

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// The name of the field as it appears in the request body.
    pub field: &'static str,
    /// A human readable explanation.
    pub message: String,
}

/// Every field that failed validation in a payload.
///
/// Displayed as `Validation error: <message> at "<field>"; ...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Record that `field` failed validation.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Whether no field failed validation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The fields that failed validation, in the order they were checked.
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(value)` if nothing failed, otherwise these errors.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validation error: ")?;

        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }

            write!(f, "{} at \"{}\"", error.message, error.field)?;
        }

        Ok(())
    }
}

/// Unwrap a field that must be present, recording "Required" if it is not.
pub(crate) fn required<T>(
    value: Option<T>,
    field: &'static str,
    errors: &mut ValidationErrors,
) -> Option<T> {
    if value.is_none() {
        errors.push(field, "Required");
    }

    value
}

#[cfg(test)]
mod validation_errors_tests {
    use crate::validation::ValidationErrors;

    #[test]
    fn displays_every_field() {
        let mut errors = ValidationErrors::default();
        errors.push("amount", "Amount must be greater than 0");
        errors.push("category", "Please select a valid category");

        assert_eq!(
            errors.to_string(),
            "Validation error: Amount must be greater than 0 at \"amount\"; \
            Please select a valid category at \"category\""
        );
    }

    #[test]
    fn into_result_succeeds_when_empty() {
        assert_eq!(ValidationErrors::default().into_result(1), Ok(1));
    }
}
