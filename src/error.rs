// Domain error type
//
// Library code returns `civica::Error`; binaries and I/O seams wrap with
// anyhow where extra context helps.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Input failed field-level validation (0-1 ranges, required fields, ...)
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status transition the lifecycle does not allow
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The gateway service could not be reached at all (connect/timeout)
    #[error("gateway unreachable at {url}: {source}")]
    GatewayUnreachable { url: String, source: reqwest::Error },

    /// The gateway answered with a non-success status
    #[error("gateway returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convenience constructor for validation failures
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = Error::validation("poverty_index must be between 0 and 1");
        assert_eq!(
            err.to_string(),
            "validation failed: poverty_index must be between 0 and 1"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("region", "R-42");
        assert_eq!(err.to_string(), "region not found: R-42");
    }

    #[test]
    fn test_transition_message() {
        let err = Error::InvalidTransition {
            from: "disbursed".to_string(),
            to: "approved".to_string(),
        };
        assert!(err.to_string().contains("disbursed -> approved"));
    }
}
