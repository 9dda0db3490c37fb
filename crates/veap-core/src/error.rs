//! Error taxonomy of the VEAP protocol
//!
//! Service errors carry a numeric code aligned with HTTP status codes, plus
//! the synthetic code 900 for failures produced inside a client (transport
//! errors, undecodable responses). Code 900 never travels on the wire.

use thiserror::Error;

/// Request processed successfully.
pub const STATUS_OK: u16 = 200;
/// A new object was created.
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_FORBIDDEN: u16 = 403;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;
/// Signals an error in VEAP client code (e.g. no connection to the server,
/// deserialization failed). Never sent on the wire.
pub const STATUS_CLIENT_ERROR: u16 = 900;

/// Result type for all VEAP service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A VEAP service error: a status code plus a human readable message.
///
/// Machine differentiation is by code only. Errors from a backend are
/// surfaced verbatim with their code; anything without a known code is
/// mapped to 500 at the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub code: u16,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(STATUS_BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(STATUS_NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(STATUS_METHOD_NOT_ALLOWED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(STATUS_INTERNAL_SERVER_ERROR, message)
    }

    /// A client-side transport or decoding error (code 900).
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(STATUS_CLIENT_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = ServiceError::not_found("Not found: /a");
        assert_eq!(err.to_string(), "Not found: /a");
        assert_eq!(err.code, STATUS_NOT_FOUND);
    }
}
