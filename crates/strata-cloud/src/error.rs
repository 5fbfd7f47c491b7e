//! Cloud provider error types

use thiserror::Error;

/// Coarse classification of a failure, stable across services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote object does not exist
    NotFound,
    /// Concurrent modification or dependency violation
    Conflict,
    /// Malformed identity string or attribute value
    InvalidInput,
    /// Network failure or throttling that outlived the transport's retries
    Transient,
    /// Anything else (auth, local IO, state file, ...)
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::InvalidInput => write!(f, "invalid-input"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Invalid import id {raw:?} for {resource_type}: {reason}")]
    InvalidImportId {
        resource_type: &'static str,
        raw: String,
        reason: String,
    },

    #[error("{resource_type} ({id}): {source}")]
    Resource {
        resource_type: String,
        id: String,
        source: Box<CloudError>,
    },

    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Classify this error, looking through resource context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::Conflict(_) | CloudError::LockError(_) => ErrorKind::Conflict,
            CloudError::InvalidInput(_)
            | CloudError::InvalidImportId { .. }
            | CloudError::InvalidConfig(_)
            | CloudError::UnsupportedResource(_)
            | CloudError::Json(_) => ErrorKind::InvalidInput,
            CloudError::Transient(_) | CloudError::Timeout(_) => ErrorKind::Transient,
            CloudError::Resource { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Attach the resource type and identity so the message is actionable.
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn for_resource(self, resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        match self {
            CloudError::Resource { .. } => self,
            other => CloudError::Resource {
                resource_type: resource_type.into(),
                id: id.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Error codes treated as conflicts regardless of service.
const CONFLICT_CODES: &[&str] = &[
    "ConflictException",
    "ConcurrentModificationException",
    "DeleteConflict",
    "AlreadyExistsException",
    "EntityAlreadyExists",
    "ResourceInUseException",
];

/// Error codes treated as transient regardless of service.
const TRANSIENT_CODES: &[&str] = &[
    "TooManyRequestsException",
    "ThrottlingException",
    "Throttling",
    "ServiceUnavailableException",
    "InternalServiceException",
    "InternalServerException",
    "ServiceFailure",
    "RequestTimeout",
];

/// Error codes treated as invalid input regardless of service.
const INVALID_INPUT_CODES: &[&str] = &[
    "BadRequestException",
    "InvalidInputException",
    "InvalidInput",
    "ValidationException",
    "MalformedPolicyDocument",
];

/// Map a vendor error code onto the error taxonomy.
///
/// `not_found_codes` lists the service-specific codes that mean the
/// addressed entity is absent.
pub fn classify(code: &str, message: impl Into<String>, not_found_codes: &[&str]) -> CloudError {
    let message = message.into();
    let detail = if message.is_empty() {
        code.to_string()
    } else {
        format!("{}: {}", code, message)
    };

    if not_found_codes.contains(&code) {
        CloudError::NotFound(detail)
    } else if CONFLICT_CODES.contains(&code) {
        CloudError::Conflict(detail)
    } else if TRANSIENT_CODES.contains(&code) {
        CloudError::Transient(detail)
    } else if INVALID_INPUT_CODES.contains(&code) {
        CloudError::InvalidInput(detail)
    } else {
        CloudError::ApiError(detail)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_service_codes() {
        let not_found = &["EntityNotFoundException"];
        assert_eq!(
            classify("EntityNotFoundException", "gone", not_found).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            classify("ConcurrentModificationException", "", not_found).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            classify("TooManyRequestsException", "slow down", not_found).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            classify("BadRequestException", "", not_found).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            classify("AccessDenied", "", not_found).kind(),
            ErrorKind::Other
        );
        // NotFoundException is only not-found for services that declare it
        assert_eq!(
            classify("NotFoundException", "", not_found).kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_resource_context_preserves_kind() {
        let err = CloudError::NotFound("stage prod".into()).for_resource(
            "aws_api_gateway_stage",
            "abc123/prod",
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("aws_api_gateway_stage (abc123/prod)"));

        // wrapping twice keeps the innermost context
        let twice = err.for_resource("other", "x");
        assert!(twice.to_string().starts_with("aws_api_gateway_stage"));
    }
}
