//! Error types for formation-kube

use thiserror::Error;

/// Result type for formation-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while talking to the object store
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Object missing from the store
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Object has no namespace or name set
    #[error("object is missing {0}")]
    MissingMetadata(&'static str),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Read cache could not be initialised
    #[error("cache error: {0}")]
    Cache(String),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    fn api_response(&self) -> Option<&kube::error::ErrorResponse> {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => Some(resp),
            _ => None,
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
            || self.api_response().is_some_and(|r| r.code == 404)
    }

    /// Check if this is a conflict error (409), including "already exists"
    pub fn is_conflict(&self) -> bool {
        self.api_response().is_some_and(|r| r.code == 409)
    }

    /// Check if a create lost the race against another creator
    pub fn is_already_exists(&self) -> bool {
        self.api_response()
            .is_some_and(|r| r.code == 409 && r.reason == "AlreadyExists")
    }

    /// Check if the store rejected the object as invalid (422)
    pub fn is_invalid(&self) -> bool {
        self.api_response()
            .is_some_and(|r| r.code == 422 || r.reason == "Invalid")
    }
}

/// Build an API error the way the API server reports it
pub fn api_error(code: u16, reason: &str, message: impl Into<String>) -> KubeError {
    KubeError::Api(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.into(),
        reason: reason.to_string(),
        code,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let exists = api_error(409, "AlreadyExists", "states \"svc\" already exists");
        assert!(exists.is_conflict());
        assert!(exists.is_already_exists());
        assert!(!exists.is_invalid());

        let conflict = api_error(409, "Conflict", "the object has been modified");
        assert!(conflict.is_conflict());
        assert!(!conflict.is_already_exists());

        let invalid = api_error(422, "Invalid", "spec.resources: Invalid value");
        assert!(invalid.is_invalid());
        assert!(!invalid.is_conflict());

        let missing = api_error(404, "NotFound", "not found");
        assert!(missing.is_not_found());

        let unavailable = api_error(503, "ServiceUnavailable", "try later");
        assert!(!unavailable.is_conflict());
        assert!(!unavailable.is_invalid());
        assert!(!unavailable.is_not_found());
    }

    #[test]
    fn test_not_found_variant() {
        let err = KubeError::NotFound {
            kind: "State".to_string(),
            name: "svc".to_string(),
            namespace: "ns".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "State 'svc' not found in namespace 'ns'");
    }
}
