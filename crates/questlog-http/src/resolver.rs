//! Identity resolution: token claims first, profile endpoint second.

use tracing::{debug, instrument};

use questlog_core::identity::decode_claims;
use questlog_core::{AccessToken, Identity};

use crate::executor::{Outcome, RequestExecutor, RequestOptions};
use crate::store::CredentialStore;

/// Derives the authenticated [`Identity`].
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    executor: RequestExecutor,
    profile_path: String,
}

impl IdentityResolver {
    pub fn new(executor: RequestExecutor, profile_path: impl Into<String>) -> Self {
        Self {
            executor,
            profile_path: profile_path.into(),
        }
    }

    /// Read the identity from the access token's claims.
    ///
    /// Opaque or malformed tokens, and claims without both an identifier and
    /// a display name, yield `None`.
    pub fn from_claims(access: &AccessToken) -> Option<Identity> {
        decode_claims(access.as_str()).and_then(|claims| Identity::from_value(&claims))
    }

    /// Fetch the identity from the profile endpoint with `access`.
    ///
    /// Goes straight to the executor: a rejected credential here never starts
    /// a refresh. Every failure yields `None`.
    #[instrument(skip(self, access), fields(path = %self.profile_path))]
    pub async fn from_profile_endpoint(&self, access: &AccessToken) -> Option<Identity> {
        let outcome = self
            .executor
            .execute(&self.profile_path, &RequestOptions::get(), Some(access))
            .await;

        match outcome {
            Ok(Outcome::Success {
                body: Some(body), ..
            }) => {
                let identity = Identity::from_value(&body)
                    .or_else(|| body.get("user").and_then(Identity::from_value));
                if identity.is_none() {
                    debug!("Profile response carries no identity");
                }
                identity
            }
            Ok(other) => {
                debug!(status = %other.status(), "Profile lookup failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "Profile lookup failed");
                None
            }
        }
    }

    /// Make sure the store holds an identity for its current access credential.
    pub async fn ensure_identity(&self, store: &CredentialStore) -> Option<Identity> {
        if let Some(identity) = store.current_identity() {
            return Some(identity);
        }

        let access = store.current_access()?;
        let identity = self.from_profile_endpoint(&access).await?;
        if store.set_identity_for(&access, identity.clone()) {
            Some(identity)
        } else {
            store.current_identity()
        }
    }
}
