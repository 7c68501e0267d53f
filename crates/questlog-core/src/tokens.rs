//! Token types for API authentication.

use std::fmt;

/// An access token attached to outbound calls as a bearer credential.
///
/// Access tokens are short-lived and are never written to durable storage.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Only exposed to build `Authorization` headers and to decode claims
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP authorization headers.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token used solely to mint a new [`CredentialPair`].
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in refresh requests and persistence.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

/// An access credential together with the refresh credential that belongs to it.
///
/// A pair is always replaced as a whole; there is no way to change one half
/// of a pair in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access: AccessToken,
    refresh: RefreshToken,
}

impl CredentialPair {
    /// Create a new credential pair.
    pub fn new(access: AccessToken, refresh: RefreshToken) -> Self {
        Self { access, refresh }
    }

    /// Returns the access half of the pair.
    pub fn access(&self) -> &AccessToken {
        &self.access
    }

    /// Returns the refresh half of the pair.
    pub fn refresh(&self) -> &RefreshToken {
        &self.refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_hides_value_in_debug() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("eyJ"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn refresh_token_hides_value_in_debug() {
        let token = RefreshToken::new("refresh_token_value_here");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("refresh_token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn pair_debug_hides_both_halves() {
        let pair = CredentialPair::new(AccessToken::new("A1"), RefreshToken::new("R1"));
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("A1"));
        assert!(!debug.contains("R1"));
    }
}
