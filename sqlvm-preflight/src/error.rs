//! Error kinds for argument validation.
//!
//! Every user-facing failure falls into one of three categories; the message
//! carries the argument-specific detail.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A supplied value is syntactically or semantically wrong.
    #[error("invalid argument value: {0}")]
    InvalidArgumentValue(String),

    /// An argument became required because of another argument's value.
    #[error("required argument missing: {0}")]
    RequiredArgumentMissing(String),

    /// Two or more supplied arguments conflict.
    #[error("mutually exclusive arguments: {0}")]
    MutuallyExclusiveArguments(String),
}

pub type ValidationResult<T = ()> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_the_kind() {
        let err = ValidationError::InvalidArgumentValue("bad time".into());
        assert_eq!(err.to_string(), "invalid argument value: bad time");

        let err = ValidationError::RequiredArgumentMissing("need --image-sku".into());
        assert!(err.to_string().starts_with("required argument missing:"));

        let err = ValidationError::MutuallyExclusiveArguments("--a vs --b".into());
        assert!(err.to_string().starts_with("mutually exclusive arguments:"));
    }
}
