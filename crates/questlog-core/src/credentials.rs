//! Login and registration input types.

use std::fmt;

/// Login credentials for the API.
///
/// The identifier is a username or an email address; which field name the
/// server expects is decided by the client's login encoders.
///
/// # Security
///
/// The password is never exposed in Debug output to prevent accidental logging.
///
/// # Example
///
/// ```
/// use questlog_core::Credentials;
///
/// let creds = Credentials::new("amy", "secret");
/// assert_eq!(creds.identifier(), "amy");
/// ```
#[derive(Clone)]
pub struct Credentials {
    identifier: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Returns the identifier (username or email).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the password.
    ///
    /// # Security
    ///
    /// Use this only when constructing authentication requests.
    /// Never log or display this value.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Account registration input.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    password: String,
}

impl Registration {
    /// Create a new registration request.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Credentials for the login that follows a successful registration.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_hides_password_in_debug() {
        let creds = Credentials::new("amy", "secret123");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("amy"));
        assert!(!debug.contains("secret123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn registration_yields_login_credentials() {
        let reg = Registration::new("amy", "amy@example.com", "secret");
        let creds = reg.credentials();
        assert_eq!(creds.identifier(), "amy");
        assert_eq!(creds.password(), "secret");
        assert!(!format!("{:?}", reg).contains("secret"));
    }
}
