//! Centralized error types for the room coordination engine.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes (for the handful of
//!   non-WebSocket endpoints)
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Errors surfaced while controlling a room's [`Timer`](crate::timer::Timer).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimerError {
    /// The requested transition is illegal from the timer's current state
    /// (e.g. pausing a timer that isn't playing).
    #[error("invalid timer state transition")]
    InvalidState,
}

impl ErrorCode for TimerError {
    fn code(&self) -> &'static str {
        "invalid_state"
    }
}

/// Errors surfaced by [`Queue`](crate::queue::Queue) operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueError {
    /// Every stack in the queue is empty.
    #[error("queue is empty")]
    QueueEmpty,
    /// No stack exists for the requested user.
    #[error("no such stack")]
    NoSuchStack,
}

impl ErrorCode for QueueError {
    fn code(&self) -> &'static str {
        match self {
            Self::QueueEmpty => "queue_empty",
            Self::NoSuchStack => "no_such_stack",
        }
    }
}

/// Application-wide error type for the room coordination engine.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum RoomError {
    /// Referenced connection/client does not exist in the registry.
    #[error("no such client: {0}")]
    NoSuchClient(String),

    /// Referenced room has no `Playback` (guards against use-after-reap).
    #[error("no such playback: {0}")]
    NoSuchPlayback(String),

    /// Username is already claimed by another client in the namespace.
    #[error("username already taken: {0}")]
    NameTaken(String),

    /// Username is empty or all whitespace.
    #[error("invalid username: {0}")]
    InvalidName(String),

    /// Timer transition was illegal.
    #[error("invalid state: {0}")]
    InvalidState(#[from] TimerError),

    /// Queue-related failure.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Command name not recognized by the dispatcher.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Client lacks the permission required by the command.
    #[error("unauthorized")]
    Unauthorized,

    /// Command was recognized but called with the wrong shape of arguments.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Inbound message did not match any known shape.
    #[error("failed to parse message: {0}")]
    ParseError(String),

    /// An internal invariant was violated (e.g. a client has a previous
    /// username but no current one). Always a bug, never user-triggered.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl RoomError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchClient(_) => "no_such_client",
            Self::NoSuchPlayback(_) => "no_such_playback",
            Self::NameTaken(_) => "name_taken",
            Self::InvalidName(_) => "invalid_name",
            Self::InvalidState(e) => e.code(),
            Self::Queue(e) => e.code(),
            Self::UnknownCommand(_) => "unknown_command",
            Self::Unauthorized => "unauthorized",
            Self::BadArguments(_) => "bad_arguments",
            Self::ParseError(_) => "parse_error",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoSuchClient(_) | Self::NoSuchPlayback(_) => StatusCode::NOT_FOUND,
            Self::NameTaken(_) | Self::InvalidName(_) | Self::BadArguments(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::UnknownCommand(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::Queue(_) => StatusCode::CONFLICT,
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is user-facing and should be reported back to the
    /// invoking client rather than merely logged.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::ParseError(_) | Self::InvariantViolation(_))
    }
}

/// Convenient Result alias for room-engine operations.
pub type RoomResult<T> = Result<T, RoomError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_taken_returns_correct_code() {
        let err = RoomError::NameTaken("alice".into());
        assert_eq!(err.code(), "name_taken");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_user_facing());
    }

    #[test]
    fn parse_error_is_not_user_facing() {
        let err = RoomError::ParseError("bad json".into());
        assert!(!err.is_user_facing());
    }

    #[test]
    fn invariant_violation_is_internal_error() {
        let err = RoomError::InvariantViolation("previous_username without username".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_user_facing());
    }

    #[test]
    fn queue_empty_maps_through_from_impl() {
        let err: RoomError = QueueError::QueueEmpty.into();
        assert_eq!(err.code(), "queue_empty");
    }
}
