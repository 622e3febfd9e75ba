//! Dispatch fault taxonomy

use thiserror::Error;

/// Faults raised while dispatching a request to a handle.
///
/// Attribute reads never produce one of these; they degrade to the
/// `{"value": "error", "code": -1}` reply instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("`{handle}` is not initialized")]
    Uninitialized { handle: &'static str },

    #[error("unknown method `{method}` on `{handle}`")]
    UnknownMethod { handle: &'static str, method: String },

    #[error("invalid arguments for `{handle}.{method}`: {source}")]
    InvalidArguments {
        handle: &'static str,
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to construct `{handle}`: {source:#}")]
    Construction {
        handle: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("`{handle}.{method}` failed: {source:#}")]
    Invocation {
        handle: &'static str,
        method: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Stable machine-readable code for error responses
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::MalformedRequest(_) => "MALFORMED_REQUEST",
            DispatchError::Uninitialized { .. } => "UNINITIALIZED",
            DispatchError::UnknownMethod { .. } => "UNKNOWN_METHOD",
            DispatchError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            DispatchError::Construction { .. } => "CONSTRUCTION_FAILED",
            DispatchError::Invocation { .. } => "INVOCATION_FAILED",
        }
    }

    /// Whether the request itself was at fault, as opposed to the target
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DispatchError::MalformedRequest(_) | DispatchError::InvalidArguments { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DispatchError::Uninitialized { handle: "network" };
        assert_eq!(err.code(), "UNINITIALIZED");
        assert_eq!(err.to_string(), "`network` is not initialized");
        assert!(!err.is_validation());

        let err = DispatchError::MalformedRequest("missing func_name".to_string());
        assert_eq!(err.code(), "MALFORMED_REQUEST");
        assert!(err.is_validation());
    }

    #[test]
    fn test_invocation_message_includes_cause_chain() {
        let source = anyhow::anyhow!("shape mismatch").context("step failed");
        let err = DispatchError::Invocation {
            handle: "network",
            method: "step".to_string(),
            source,
        };
        assert_eq!(err.to_string(), "`network.step` failed: step failed: shape mismatch");
    }
}
