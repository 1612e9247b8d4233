//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate request shape, mapping a garde report to `DomainError::ValidationError`
pub fn validate_request<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Run garde rules and return each failure as `(field path, message)` in report order
pub fn field_errors<T>(value: &T) -> Vec<(String, String)>
where
    T: Validate,
    T::Context: Default,
{
    match value.validate() {
        Ok(()) => Vec::new(),
        Err(report) => report
            .iter()
            .map(|(path, error)| (path.to_string(), error.message().to_string()))
            .collect(),
    }
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct ListQuery {
        #[garde(range(min = 1))]
        size: u32,
        #[garde(length(min = 1))]
        brand: String,
    }

    #[test]
    fn test_validate_success() {
        let query = ListQuery {
            size: 10,
            brand: "Apple".to_string(),
        };
        assert!(validate_request(&query).is_ok());
        assert!(field_errors(&query).is_empty());
    }

    #[test]
    fn test_validate_failure_names_field() {
        let query = ListQuery {
            size: 0,
            brand: "Apple".to_string(),
        };
        match validate_request(&query) {
            Err(DomainError::ValidationError(msg)) => assert!(msg.contains("size")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_field_errors_lists_every_failure() {
        let query = ListQuery {
            size: 0,
            brand: String::new(),
        };
        let fields: Vec<String> = field_errors(&query)
            .into_iter()
            .map(|(field, _)| field)
            .collect();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains(&"size".to_string()));
        assert!(fields.contains(&"brand".to_string()));
    }
}
