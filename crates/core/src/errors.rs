use thiserror::Error;

/// Errors that cross the HTTP boundary as explicit error responses.
///
/// Everything else in the system is converted to a value before it reaches the
/// boundary; only malformed input and unknown sessions surface to the caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String },
}

impl BoundaryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "session_not_found",
            Self::BadRequest { .. } => "bad_request",
        }
    }

    /// User-safe text; never echoes internal detail back to the caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "Invalid session ID. Start a new session first.",
            Self::BadRequest { .. } => "The request could not be processed. Check inputs and try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BoundaryError;

    #[test]
    fn session_not_found_has_explicit_code_and_safe_message() {
        let error = BoundaryError::SessionNotFound { session_id: "deadbeef".to_string() };
        assert_eq!(error.code(), "session_not_found");
        assert!(!error.user_message().contains("deadbeef"));
    }
}
