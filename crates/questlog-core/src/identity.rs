//! The authenticated identity and the token claims it can be derived from.
//!
//! Identity is derived data: it is read from the claims segment of a
//! JWT-shaped access token when possible, or from a profile document the
//! server returns. Both sources are loosely shaped, so extraction is tolerant
//! and returns `None` instead of failing.

use std::collections::BTreeSet;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ID_KEYS: &[&str] = &["userId", "uid", "id"];
const NAME_KEYS: &[&str] = &[
    "username",
    "displayName",
    "display_name",
    "preferred_username",
    "sub",
];
const ROLE_KEYS: &[&str] = &["roles", "authorities", "scope"];

/// A role granted to the authenticated user (e.g. `ROLE_USER`, `GM`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create a role from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated user as far as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    #[serde(rename = "username")]
    pub display_name: String,
    pub roles: BTreeSet<Role>,
}

impl Identity {
    /// Create an identity.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Returns true if the identity carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    /// Extract an identity from a claims set or a user document.
    ///
    /// Returns `None` unless both an identifier and a display name are found.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let id = ID_KEYS
            .iter()
            .find_map(|k| object.get(*k).and_then(scalar_string))?;
        let display_name = NAME_KEYS
            .iter()
            .find_map(|k| object.get(*k).and_then(scalar_string))?;
        let roles = ROLE_KEYS
            .iter()
            .find_map(|k| object.get(*k).map(parse_roles))
            .unwrap_or_default();

        Some(Self {
            id,
            display_name,
            roles,
        })
    }

    /// Serialize for the durable identity slot.
    pub fn to_json(&self) -> String {
        // A struct of strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse the durable identity slot; malformed text yields `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| Self::from_value(&v))
    }
}

/// Decode the claims segment of a `header.claims.signature` token.
///
/// Anything that is not a three-part token with a base64url JSON object in
/// the middle yields `None`.
pub fn decode_claims(token: &str) -> Option<Value> {
    let mut parts = token.split('.');
    let (_header, claims, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || claims.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('=')).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    value.is_object().then_some(value)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_roles(value: &Value) -> BTreeSet<Role> {
    match value {
        Value::String(s) => s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|r| !r.is_empty())
            .map(Role::new)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(Role::new(s.as_str())),
                // Spring serializes authorities as {"authority": "ROLE_X"}
                Value::Object(o) => o
                    .get("authority")
                    .or_else(|| o.get("name"))
                    .and_then(Value::as_str)
                    .map(Role::new),
                _ => None,
            })
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_with_claims(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn decodes_backend_style_claims() {
        let token = token_with_claims(&json!({
            "sub": "amy",
            "userId": "7b1c2f0e-0000-4000-8000-000000000001",
            "roles": ["ROLE_USER", "ROLE_GM"],
            "exp": 1700000000
        }));

        let identity = Identity::from_value(&decode_claims(&token).unwrap()).unwrap();
        assert_eq!(identity.id, "7b1c2f0e-0000-4000-8000-000000000001");
        assert_eq!(identity.display_name, "amy");
        assert!(identity.has_role("ROLE_GM"));
        assert_eq!(identity.roles.len(), 2);
    }

    #[test]
    fn username_claim_wins_over_sub() {
        let claims = json!({"sub": "amy@example.com", "username": "amy", "id": 42});
        let identity = Identity::from_value(&claims).unwrap();
        assert_eq!(identity.display_name, "amy");
        assert_eq!(identity.id, "42");
    }

    #[test]
    fn roles_from_space_or_comma_separated_string() {
        let claims = json!({"uid": "1", "preferred_username": "amy", "scope": "read write,admin"});
        let identity = Identity::from_value(&claims).unwrap();
        let roles: Vec<_> = identity.roles.iter().map(Role::as_str).collect();
        assert_eq!(roles, vec!["admin", "read", "write"]);
    }

    #[test]
    fn spring_authority_objects() {
        let claims = json!({"id": "1", "username": "amy", "authorities": [{"authority": "ROLE_USER"}]});
        let identity = Identity::from_value(&claims).unwrap();
        assert!(identity.has_role("ROLE_USER"));
    }

    #[test]
    fn missing_identifier_yields_none() {
        let token = token_with_claims(&json!({"sub": "amy"}));
        let claims = decode_claims(&token).unwrap();
        assert!(Identity::from_value(&claims).is_none());
    }

    #[test]
    fn missing_display_name_yields_none() {
        assert!(Identity::from_value(&json!({"userId": "1"})).is_none());
    }

    #[test]
    fn opaque_tokens_have_no_claims() {
        assert!(decode_claims("A1").is_none());
        assert!(decode_claims("a.b").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
        assert!(decode_claims("a.b.c.d").is_none());
        assert!(decode_claims("").is_none());
    }

    #[test]
    fn claims_must_be_an_object() {
        let body = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(decode_claims(&format!("h.{}.s", body)).is_none());
    }

    #[test]
    fn padded_segment_is_tolerated() {
        let body = base64::engine::general_purpose::URL_SAFE
            .encode(json!({"id": "1", "username": "amy"}).to_string());
        let claims = decode_claims(&format!("h.{}.s", body)).unwrap();
        assert_eq!(claims["username"], "amy");
    }

    #[test]
    fn storage_round_trip() {
        let identity = Identity::new("1", "amy", [Role::new("ROLE_USER")]);
        let raw = identity.to_json();
        assert!(raw.contains("\"username\":\"amy\""));
        assert_eq!(Identity::from_json(&raw), Some(identity));
        assert_eq!(Identity::from_json("not json"), None);
    }
}
