use validator::Validate;

use crate::services::errors::ServiceError;

/// Runs derived `validator` rules and folds the failures into a single
/// `ServiceError::Validation` message.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ServiceError> {
    payload.validate().map_err(|errors| {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, failures)| {
                let codes: Vec<&str> = failures.iter().map(|failure| failure.code.as_ref()).collect();
                format!("{field}: {}", codes.join(", "))
            })
            .collect();
        fields.sort();
        ServiceError::Validation(fields.join("; "))
    })
}
