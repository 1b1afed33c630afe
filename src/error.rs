//! Error handling for communicator operations
//!
//! Two families of failure exist: precondition violations caught before any
//! transport call, and transport failures reported as a [`StatusCode`]. Both
//! end up as a [`CommError`] plus one warning log line. The [`translate`] /
//! [`check`] pair is the sole gateway from status codes to crate errors;
//! transport-specific codes never leak past it, only their rendered
//! description does.

use log::warn;
use thiserror::Error;

use crate::transport::{StatusCode, Transport};

/// Errors reported by communicator operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// The communicator has already been brought up by a lifecycle operation.
    #[error("communicator is already initialized")]
    AlreadyInitialized,
    /// Derivation requires an initialized parent.
    #[error("parent communicator is not initialized")]
    UninitializedParent,
    /// An empty group cannot back a communicator.
    #[error("subgroup is empty")]
    EmptyGroup,
    /// The subgroup names more processes than the parent has.
    #[error("subgroup of {len} processes exceeds the parent size {parent}")]
    OversizedGroup {
        /// Size of the rejected subgroup.
        len: usize,
        /// Size of the parent's group.
        parent: usize,
    },
    /// Transfer attempted on a communicator without a usable context.
    #[error("communicator has no active communication context")]
    NullContext,
    /// The process-wide environment has not been installed.
    #[error("communication environment is not initialized")]
    Uninitialized,
    /// The transport reported a world of zero processes.
    #[error("transport reported an empty world")]
    EmptyWorld,
    /// The transport reported a failure; `detail` is its own description of
    /// the code.
    #[error("transport error {}: {detail}", .code.as_raw())]
    Transport {
        /// The status code as returned by the transport.
        code: StatusCode,
        /// The transport's rendering of the code.
        detail: String,
    },
}

/// Translates a failed status into the crate error, logging one warning.
pub(crate) fn translate(transport: &dyn Transport, code: StatusCode) -> CommError {
    let detail = transport.error_string(code);
    warn!("transport failure ({}): {}", code.as_raw(), detail);
    CommError::Transport { code, detail }
}

/// Checks a transport status, translating failure.
pub(crate) fn check(transport: &dyn Transport, status: StatusCode) -> Result<(), CommError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(translate(transport, status))
    }
}

/// Logs and returns a precondition violation.
pub(crate) fn precondition(error: CommError) -> CommError {
    warn!("{}", error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    #[test]
    fn success_passes_check() {
        let transport = ScriptedTransport::new();
        assert!(check(&transport, StatusCode::SUCCESS).is_ok());
    }

    #[test]
    fn failure_carries_the_transport_description() {
        let transport = ScriptedTransport::new();
        let error = check(&transport, StatusCode::new(17)).unwrap_err();
        match error {
            CommError::Transport { code, detail } => {
                assert_eq!(code, StatusCode::new(17));
                assert_eq!(detail, transport.error_string(code));
            }
            other => panic!("expected a transport error, got {:?}", other),
        }
    }

    #[test]
    fn errors_render_for_logs() {
        let error = CommError::OversizedGroup { len: 9, parent: 4 };
        assert_eq!(
            error.to_string(),
            "subgroup of 9 processes exceeds the parent size 4"
        );
        let error = precondition(CommError::EmptyGroup);
        assert_eq!(error.to_string(), "subgroup is empty");
    }
}
