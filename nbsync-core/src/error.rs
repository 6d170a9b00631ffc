//! Error types for reconciliation.

use thiserror::Error;

/// Problems with a desired spec that are detected before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("state '{state}' is not supported by {resource}")]
    UnsupportedState { resource: String, state: String },

    #[error("state is {state} but all of the following are missing: {}", fields.join(", "))]
    MissingRequired { state: String, fields: Vec<String> },

    #[error("unsupported parameter for {resource}: {field}")]
    UnknownField { resource: String, field: String },

    #[error("value of {field} must be one of: {}, got: {value}", choices.join(", "))]
    InvalidChoice {
        field: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("{field} must be {expected}, got: {value}")]
    InvalidType {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("parameters are required together: {}", fields.join(", "))]
    RequiredTogether { fields: Vec<String> },

    #[error("nested {resource} for {field} is missing its lookup key(s): {}", keys.join(", "))]
    NestedMissingKey {
        field: String,
        resource: String,
        keys: Vec<String>,
    },

    #[error("custom field(s) not defined for {object_type}: {}", keys.join(", "))]
    UndeclaredCustomFields {
        object_type: String,
        keys: Vec<String>,
    },
}

/// Errors raised by a [`Gateway`](crate::gateway::Gateway) implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The server answered but rejected the request.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport failure, timeout or undecodable response.
    #[error("network error: {0}")]
    Network(String),
}

/// Errors that abort a reconciliation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("could not resolve {key} in {endpoint}: no match")]
    NotFound { endpoint: String, key: String },

    #[error("could not resolve {key} in {endpoint}: {count} objects match, refusing to pick one")]
    AmbiguousReference {
        endpoint: String,
        key: String,
        count: usize,
    },

    #[error("request rejected ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

impl From<GatewayError> for Error {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Remote { status, message } => Error::Remote { status, message },
            GatewayError::Network(msg) => Error::Network(msg),
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_message() {
        let err = ValidationError::MissingRequired {
            state: "present".to_string(),
            fields: vec!["type".to_string(), "source_url".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "state is present but all of the following are missing: type, source_url"
        );
    }

    #[test]
    fn test_gateway_error_maps_to_remote() {
        let err: Error = GatewayError::Remote {
            status: 400,
            message: "name: must be unique".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Remote { status: 400, .. }));
        assert!(err.to_string().contains("must be unique"));
    }
}
