//! Error types for service binding projection
//!
//! Errors are structured with fields to aid debugging in production. Each
//! variant names the binding, workload, or resource it concerns so that a
//! reconciler can surface a useful condition message without re-deriving
//! context.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for projection operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Resolving the REST mapping or the workload field mapping failed
    #[error("mapping lookup failed for {resource}: {message}")]
    Lookup {
        /// Resource being resolved (e.g. "apps/v1 Deployment", "deployments.apps")
        resource: String,
        /// Description of what failed
        message: String,
        /// Whether a later attempt may succeed (transient API failures)
        retryable: bool,
    },

    /// The stashed mapping annotation on a workload is not a valid mapping document
    #[error("failed to decode stashed mapping for binding {binding}: {source}")]
    Decode {
        /// UID of the binding whose annotation failed to decode
        binding: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A mapping snapshot could not be serialized for stashing
    #[error("failed to encode mapping for binding {binding}: {source}")]
    Encode {
        /// UID of the binding being stashed
        binding: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Writing the mutated pod template back into the workload failed
    #[error("write-back to workload {workload} failed: {message}")]
    WriteBack {
        /// Name of the workload being written
        workload: String,
        /// Description of what failed
        message: String,
    },

    /// A mapping contains a field path outside the supported JSONPath subset
    #[error("invalid field path '{path}': {message}")]
    InvalidPath {
        /// The offending path expression
        path: String,
        /// Description of what is unsupported
        message: String,
    },

    /// Workload content does not have the shape the mapping expects
    #[error("unexpected workload content at {path}: {message}")]
    View {
        /// Path (as written in the mapping) where the mismatch was found
        path: String,
        /// Description of the mismatch
        message: String,
    },

    /// The request context was cancelled while the operation was in flight
    #[error("operation cancelled [{context}]")]
    Cancelled {
        /// Operation that observed the cancellation
        context: String,
    },

    /// The request context deadline passed while the operation was in flight
    #[error("deadline exceeded [{context}]")]
    DeadlineExceeded {
        /// Operation that observed the deadline
        context: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "create_client")
        context: String,
    },
}

impl Error {
    /// Create a retryable lookup error for a resource
    pub fn lookup(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Lookup {
            resource: resource.into(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a lookup error that will not resolve itself on retry
    ///
    /// Used when the resource is simply not registered: retrying only helps
    /// once someone installs the missing CRD or mapping.
    pub fn lookup_not_found(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Lookup {
            resource: resource.into(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a decode error for a binding's stashed mapping
    pub fn decode(binding: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            binding: binding.into(),
            source,
        }
    }

    /// Create an encode error for a binding's mapping snapshot
    pub fn encode(binding: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            binding: binding.into(),
            source,
        }
    }

    /// Create a write-back error for a workload
    pub fn write_back(workload: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::WriteBack {
            workload: workload.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid field path error
    pub fn invalid_path(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a view error for unexpected workload content
    pub fn view(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::View {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Create a deadline exceeded error
    pub fn deadline_exceeded(context: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            context: context.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Decode, encode, path and view errors need a configuration or data fix
    /// and are not retryable. Cancellation is retryable: the next reconcile
    /// gets a fresh context.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Lookup { retryable, .. } => *retryable,
            Error::Decode { .. } => false,
            Error::Encode { .. } => false,
            Error::WriteBack { .. } => false,
            Error::InvalidPath { .. } => false,
            Error::View { .. } => false,
            Error::Cancelled { .. } => true,
            Error::DeadlineExceeded { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// Get the binding UID if this error is associated with a specific binding
    pub fn binding(&self) -> Option<&str> {
        match self {
            Error::Decode { binding, .. } | Error::Encode { binding, .. } => Some(binding),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{not json").unwrap_err()
    }

    /// Story: an unregistered workload kind surfaces which resource was missing
    #[test]
    fn story_lookup_error_names_the_resource() {
        let err = Error::lookup_not_found("example.com/v1 Widget", "kind is not registered");
        assert!(err.to_string().contains("example.com/v1 Widget"));
        assert!(err.to_string().contains("not registered"));
        assert!(!err.is_retryable());

        let err = Error::lookup("deployments.apps", "connection refused");
        assert!(err.is_retryable());
    }

    /// Story: a corrupted stash annotation is reported against its binding
    #[test]
    fn story_decode_error_carries_binding_uid() {
        let err = Error::decode("1234-abcd", json_error());
        assert_eq!(err.binding(), Some("1234-abcd"));
        assert!(err.to_string().contains("failed to decode stashed mapping"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_encode_error_is_not_retryable() {
        let err = Error::encode("uid", json_error());
        assert!(!err.is_retryable());
        assert_eq!(err.binding(), Some("uid"));
    }

    #[test]
    fn test_write_back_error_message() {
        let err = Error::write_back("my-app", "volumes path is not a list");
        assert!(err.to_string().contains("my-app"));
        assert!(err.to_string().contains("volumes path is not a list"));
        assert_eq!(err.binding(), None);
    }

    #[test]
    fn test_cancellation_errors_are_retryable() {
        assert!(Error::cancelled("lookup_rest_mapping").is_retryable());
        assert!(Error::deadline_exceeded("lookup_workload_mapping").is_retryable());
        assert!(Error::cancelled("write_back")
            .to_string()
            .contains("[write_back]"));
    }

    #[test]
    fn test_path_and_view_errors_are_permanent() {
        assert!(!Error::invalid_path(".spec[", "unterminated bracket").is_retryable());
        assert!(!Error::view(".spec.template.spec.volumes", "expected a list").is_retryable());
    }

    #[test]
    fn test_internal_error_default_context() {
        let err = Error::internal("unexpected state");
        assert!(err.to_string().contains("[unknown]"));
        let err = Error::internal_with_context("create_client", "no kubeconfig");
        assert!(err.to_string().contains("[create_client]"));
        assert!(err.is_retryable());
    }
}
