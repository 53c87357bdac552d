//! Error types for kompose operations
//!
//! Errors are structured with fields to aid debugging. Each variant carries
//! the service, object, or operation it belongs to so that a failure deep in
//! a conversion run can be traced back to the manifest entry that caused it.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for kompose operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid service definition or run configuration
    #[error("validation error for {service}: {message}")]
    Validation {
        /// Service whose configuration is invalid
        service: String,
        /// Description of what's invalid
        message: String,
    },

    /// Image build or push failure
    #[error("build error for {service}: {message}")]
    Build {
        /// Service whose image failed to build or push
        service: String,
        /// Description of what failed
        message: String,
    },

    /// Git metadata could not be discovered
    #[error("git error [{context}]: {message}")]
    Git {
        /// What was being discovered (e.g., "branch", "remote", "prefix")
        context: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Applying a single object to the cluster failed
    #[error("failed to create {kind} {name}: {source}")]
    Apply {
        /// Object kind (e.g., "Deployment")
        kind: String,
        /// Object name
        name: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// An error wrapped with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        /// Operation name (e.g., "transform", "initBuildConfig")
        context: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reaper", "client")
        context: String,
    },
}

impl Error {
    /// Create a validation error without service context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            service: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error for a service
    pub fn validation_for(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create a build error for a service
    pub fn build_for(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Build {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create a git discovery error
    pub fn git(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Git {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Wrap an error raised while creating a specific object
    pub fn apply(kind: impl Into<String>, name: impl Into<String>, source: Error) -> Self {
        Self::Apply {
            kind: kind.into(),
            name: name.into(),
            source: Box::new(source),
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

    /// Wrap this error with the name of the operation that produced it
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the service name if this error is associated with a specific service
    pub fn service(&self) -> Option<&str> {
        match self {
            Error::Validation { service, .. } => Some(service),
            Error::Build { service, .. } => Some(service),
            Error::Context { source, .. } | Error::Apply { source, .. } => source.service(),
            _ => None,
        }
    }

    /// Whether the API server reported the object as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            Error::Context { source, .. } | Error::Apply { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Extension trait for attaching operation context to results
pub trait ResultExt<T> {
    /// Wrap the error (if any) with the given operation name
    fn context(self, context: &str) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| e.with_context(context))
    }
}
