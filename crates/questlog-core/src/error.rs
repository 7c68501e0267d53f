//! Error types for questlog.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, request, protocol, and input validation errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for questlog operations.
///
/// Only an expired access credential is handled inside the client; every
/// other variant reaches the caller exactly once.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (no response at all).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (refresh failed, retry exhausted, bad login).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server answered with a non-success status other than 401.
    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    /// The server answered successfully but the body could not be used.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (invalid URL, header, method).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request(err) => Some(err.status),
            Error::Protocol(err) => err.status,
            _ => None,
        }
    }

    /// Returns true if the session is gone and the user must sign in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Auth(AuthError::AuthenticationRequired))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The session could not be refreshed and has been cleared.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The call was rejected again after a successful refresh.
    #[error("retry exhausted: credential rejected after refresh")]
    RetryExhausted,

    /// Login was rejected by the server.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// A non-success response that is not an expired credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    /// HTTP status code.
    pub status: u16,
    /// Best-effort human-readable message.
    pub message: String,
}

impl RequestError {
    /// Create a new request error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl std::error::Error for RequestError {}

/// The response could not be interpreted.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code, when a response was received.
    pub status: Option<u16>,
    /// What was wrong with the response.
    pub message: String,
}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "HTTP {}: ", status)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProtocolError {}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid HTTP header name or value.
    #[error("invalid header '{name}': {reason}")]
    Header { name: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
