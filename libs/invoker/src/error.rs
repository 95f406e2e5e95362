//! Invoker Error Types
//!
//! Every failure of a remote call surfaces as an [`InvokerError`]. Faults raised
//! by the invoked code itself are carried unchanged as a [`CallFault`] inside
//! [`InvokerError::InvocationFault`].

use thiserror::Error;

/// Result type alias for invoker operations
pub type Result<T> = std::result::Result<T, InvokerError>;

/// Fault raised by a constructor or method body
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct CallFault {
    /// Short fault class such as `IllegalState`
    pub kind: String,
    pub message: String,
}

impl CallFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Fault for illegal arguments detected by the body itself
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("IllegalArgument", message)
    }

    /// Fault for operations invalid in the receiver's current state
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new("IllegalState", message)
    }
}

impl From<driver_types::ValueTypeError> for CallFault {
    fn from(error: driver_types::ValueTypeError) -> Self {
        CallFault::illegal_argument(error.to_string())
    }
}

/// Main invoker error type
#[derive(Error, Debug)]
pub enum InvokerError {
    /// Operation referenced an unknown session id
    #[error("No such session {session_id}")]
    SessionNotFound { session_id: u32 },

    /// Handle absent from every known table
    #[error(
        "No such reference with id {id}{}. It may happen if a weak reference to the variable expires. \
         Hold a session-scoped reference (open a session) for hard variable references.",
        expired_note(.expired)
    )]
    ReferenceNotFound { id: String, expired: bool },

    /// No type/constructor/method/service matched
    #[error("{message}")]
    Resolution {
        message: String,
        candidates: Vec<String>,
    },

    /// Selected target rejects the runtime argument types
    #[error(
        "Argument type mismatch for {target}, expected types are [{}], actual types are [{}]",
        join_types(.expected),
        join_types(.actual)
    )]
    ArgumentTypeMismatch {
        target: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// The invoked body raised
    #[error("Error during remote driver call {target}: {fault}")]
    InvocationFault { target: String, fault: CallFault },

    /// Request the invoker explicitly does not handle
    #[error("Unsupported: {feature}")]
    Unsupported { feature: String },
}

fn expired_note(expired: &bool) -> &'static str {
    if *expired {
        " (weak reference expired)"
    } else {
        ""
    }
}

fn join_types(types: &[String]) -> String {
    types.join(", ")
}

impl InvokerError {
    pub fn session_not_found(session_id: u32) -> Self {
        Self::SessionNotFound { session_id }
    }

    pub fn reference_not_found(id: impl Into<String>, expired: bool) -> Self {
        Self::ReferenceNotFound {
            id: id.into(),
            expired,
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            candidates: Vec::new(),
        }
    }

    /// Resolution failure listing the candidates that were considered
    pub fn resolution_with_candidates(message: impl Into<String>, candidates: Vec<String>) -> Self {
        let mut message = message.into();
        if !candidates.is_empty() {
            message.push_str(". Available candidates:\n - ");
            message.push_str(&candidates.join("\n - "));
        }
        Self::Resolution {
            message,
            candidates,
        }
    }

    pub fn argument_type_mismatch(
        target: impl Into<String>,
        expected: Vec<String>,
        actual: Vec<String>,
    ) -> Self {
        Self::ArgumentTypeMismatch {
            target: target.into(),
            expected,
            actual,
        }
    }

    pub fn invocation_fault(target: impl Into<String>, fault: CallFault) -> Self {
        Self::InvocationFault {
            target: target.into(),
            fault,
        }
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// The fault raised by the invoked body, if this error carries one
    pub fn fault(&self) -> Option<&CallFault> {
        match self {
            InvokerError::InvocationFault { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Get error category for the wire and for metrics
    pub fn category(&self) -> &'static str {
        match self {
            InvokerError::SessionNotFound { .. } => "session_not_found",
            InvokerError::ReferenceNotFound { .. } => "reference_not_found",
            InvokerError::Resolution { .. } => "resolution",
            InvokerError::ArgumentTypeMismatch { .. } => "argument_type_mismatch",
            InvokerError::InvocationFault { .. } => "invocation_fault",
            InvokerError::Unsupported { .. } => "unsupported",
        }
    }
}
