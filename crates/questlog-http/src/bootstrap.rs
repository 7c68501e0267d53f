//! Silent session resume at startup.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::coordinator::RefreshCoordinator;
use crate::resolver::IdentityResolver;
use crate::store::CredentialStore;

/// Resumes a session from the refresh credential kept in durable storage.
///
/// Resuming goes through the [`RefreshCoordinator`] exactly like an expired
/// call would, so concurrent resumes share one refresh and a resume after a
/// completed one does not refresh again.
#[derive(Debug, Clone)]
pub struct SessionBootstrapper {
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    resolver: IdentityResolver,
}

impl SessionBootstrapper {
    pub(crate) fn new(
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        resolver: IdentityResolver,
    ) -> Self {
        Self {
            store,
            coordinator,
            resolver,
        }
    }

    /// Try to resume. Returns whether an authenticated session is now held.
    ///
    /// A failed refresh leaves the session cleared; it is not an error.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> bool {
        if !self.store.restore() {
            debug!("No resumable session");
            return false;
        }

        // No access credential was used, so this reads as an expired one.
        match self.coordinator.handle_expired(None).await {
            Ok(()) => {
                self.resolver.ensure_identity(&self.store).await;
                info!("Session resumed");
                self.store.is_authenticated()
            }
            Err(e) => {
                info!(error = %e, "Session could not be resumed");
                false
            }
        }
    }
}
