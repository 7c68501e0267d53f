//! Authentication endpoints and their payloads.
//!
//! The backend this client grew up against has not been consistent about
//! field names, so login and refresh bodies come from an ordered list of
//! shapes that are tried until one is accepted. This is a compatibility shim:
//! a deployment with one canonical contract should configure a single shape.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use questlog_core::error::ProtocolError;
use questlog_core::{AccessToken, Credentials, Identity, RefreshToken};

/// Password login.
pub const LOGIN: &str = "/auth/login";

/// Refresh credential exchange.
pub const REFRESH: &str = "/auth/refresh";

/// Account registration.
pub const REGISTER: &str = "/auth/register";

/// Default profile endpoint.
pub const PROFILE: &str = "/auth/me";

/// Field naming for the login identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginShape {
    /// `{"username", "password"}`
    Username,
    /// `{"email", "password"}`
    Email,
    /// `{"usernameOrEmail", "password"}`
    UsernameOrEmail,
    /// `{"login", "password"}`
    Login,
}

impl LoginShape {
    /// Every shape, in the order they are tried by default.
    pub const ALL: [LoginShape; 4] = [
        LoginShape::Username,
        LoginShape::Email,
        LoginShape::UsernameOrEmail,
        LoginShape::Login,
    ];

    /// Name of the identifier field.
    pub fn field(&self) -> &'static str {
        match self {
            LoginShape::Username => "username",
            LoginShape::Email => "email",
            LoginShape::UsernameOrEmail => "usernameOrEmail",
            LoginShape::Login => "login",
        }
    }

    pub(crate) fn encode(&self, credentials: &Credentials) -> Value {
        let mut body = Map::new();
        body.insert(self.field().to_string(), json!(credentials.identifier()));
        body.insert("password".to_string(), json!(credentials.password()));
        Value::Object(body)
    }
}

/// Field naming for the refresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshShape {
    /// `{"refreshToken"}`
    RefreshToken,
    /// `{"refresh"}`
    Refresh,
    /// `{"token"}`
    Token,
}

impl RefreshShape {
    /// Every shape, in the order they are tried by default.
    pub const ALL: [RefreshShape; 3] = [
        RefreshShape::RefreshToken,
        RefreshShape::Refresh,
        RefreshShape::Token,
    ];

    /// Name of the refresh credential field.
    pub fn field(&self) -> &'static str {
        match self {
            RefreshShape::RefreshToken => "refreshToken",
            RefreshShape::Refresh => "refresh",
            RefreshShape::Token => "token",
        }
    }

    pub(crate) fn encode(&self, refresh: &RefreshToken) -> Value {
        let mut body = Map::new();
        body.insert(self.field().to_string(), json!(refresh.as_str()));
        Value::Object(body)
    }
}

/// Response from login and refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    #[serde(default, alias = "access", alias = "access_token")]
    access_token: Option<String>,
    #[serde(default, alias = "refresh", alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
    /// Some deployments put the user fields next to the tokens.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TokenResponse {
    pub(crate) fn from_body(status: u16, body: Option<Value>) -> Result<Self, ProtocolError> {
        let body = body.ok_or_else(|| ProtocolError::new(Some(status), "empty token response"))?;
        serde_json::from_value(body)
            .map_err(|e| ProtocolError::new(Some(status), format!("invalid token response: {}", e)))
    }

    pub(crate) fn access(&self, status: u16) -> Result<AccessToken, ProtocolError> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| ProtocolError::new(Some(status), "token response has no access token"))
    }

    pub(crate) fn refresh(&self) -> Option<RefreshToken> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new)
    }

    pub(crate) fn identity(&self) -> Option<Identity> {
        self.user
            .as_ref()
            .and_then(Identity::from_value)
            .or_else(|| Identity::from_value(&Value::Object(self.rest.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_shapes_keep_password_field() {
        let creds = Credentials::new("amy", "secret");
        assert_eq!(
            LoginShape::Username.encode(&creds),
            json!({"username": "amy", "password": "secret"})
        );
        assert_eq!(
            LoginShape::UsernameOrEmail.encode(&creds),
            json!({"usernameOrEmail": "amy", "password": "secret"})
        );
    }

    #[test]
    fn refresh_shapes() {
        let token = RefreshToken::new("R1");
        let bodies: Vec<_> = RefreshShape::ALL.iter().map(|s| s.encode(&token)).collect();
        assert_eq!(
            bodies,
            vec![
                json!({"refreshToken": "R1"}),
                json!({"refresh": "R1"}),
                json!({"token": "R1"}),
            ]
        );
    }

    #[test]
    fn token_response_aliases() {
        let body = json!({"access": "A2", "refresh_token": "R2"});
        let response = TokenResponse::from_body(200, Some(body)).unwrap();
        assert_eq!(response.access(200).unwrap(), AccessToken::new("A2"));
        assert_eq!(response.refresh(), Some(RefreshToken::new("R2")));
        assert!(response.identity().is_none());
    }

    #[test]
    fn token_response_identity_from_user_or_top_level() {
        let nested = json!({
            "accessToken": "A1",
            "refreshToken": "R1",
            "user": {"id": "1", "username": "amy", "roles": ["PLAYER"]}
        });
        let response = TokenResponse::from_body(200, Some(nested)).unwrap();
        assert_eq!(response.identity().unwrap().display_name, "amy");

        let flat = json!({"accessToken": "A1", "id": 7, "username": "amy", "roles": []});
        let response = TokenResponse::from_body(200, Some(flat)).unwrap();
        assert_eq!(response.identity().unwrap().id, "7");
    }

    #[test]
    fn missing_access_token_is_a_protocol_error() {
        let response = TokenResponse::from_body(200, Some(json!({"refreshToken": "R1"}))).unwrap();
        assert!(response.access(200).is_err());
        assert!(TokenResponse::from_body(204, None).is_err());
    }
}
