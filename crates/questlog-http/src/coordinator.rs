//! Single-flight credential refresh.
//!
//! The coordinator is either idle or refreshing. The first caller to report
//! an expired credential while idle becomes the owner of a refresh; callers
//! that report one while a refresh is in flight join its queue and share its
//! result. The queue exists exactly while a refresh is in flight, which is
//! why it is an `Option`.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use questlog_core::error::{AuthError, Error, RequestError};
use questlog_core::{AccessToken, CredentialPair, RefreshToken, Result};

use crate::endpoints::{REFRESH, RefreshShape, TokenResponse};
use crate::events::{EventBus, SessionEvent};
use crate::executor::{Outcome, RequestExecutor};
use crate::resolver::IdentityResolver;
use crate::store::CredentialStore;

type Waiter = oneshot::Sender<std::result::Result<(), AuthError>>;

/// What a caller does after consulting the coordinator state.
enum Turn {
    /// Run the refresh and release the queue.
    Own,
    /// Wait for the refresh in flight.
    Join(oneshot::Receiver<std::result::Result<(), AuthError>>),
    /// A refresh already completed after the failing call was sent.
    Replay,
}

/// How a refresh that reached the server ended.
enum Renewal {
    /// The new pair is installed.
    Installed { has_identity: bool },
    /// The session was replaced or ended while the refresh was in flight.
    Superseded,
}

/// Owns the refresh protocol: the single-flight flag and the waiter queue.
///
/// A refresh only ever installs its result into the session it started
/// from; a login or sign-out while it is in flight wins.
pub struct RefreshCoordinator {
    pending: Mutex<Option<Vec<Waiter>>>,
    store: Arc<CredentialStore>,
    executor: RequestExecutor,
    resolver: IdentityResolver,
    shapes: Vec<RefreshShape>,
    events: EventBus,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<CredentialStore>,
        executor: RequestExecutor,
        resolver: IdentityResolver,
        shapes: Vec<RefreshShape>,
        events: EventBus,
    ) -> Self {
        Self {
            pending: Mutex::new(None),
            store,
            executor,
            resolver,
            shapes,
            events,
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<Vec<Waiter>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.pending().is_some()
    }

    /// Handle an expired credential observed by a call sent with `stale`.
    ///
    /// Returns once a usable credential is installed; the caller then replays
    /// its call exactly once. Fails with [`AuthError::AuthenticationRequired`]
    /// when the session cannot be refreshed, in which case it has been
    /// cleared.
    #[instrument(skip_all)]
    pub async fn handle_expired(&self, stale: Option<&AccessToken>) -> Result<()> {
        // Decide and transition before the first await, so two callers can
        // never both become owner.
        let turn = {
            let mut pending = self.pending();
            match pending.as_mut() {
                Some(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    debug!(position = queue.len(), "Joining refresh in flight");
                    Turn::Join(rx)
                }
                None => match self.store.current_access() {
                    Some(current) if Some(&current) != stale => Turn::Replay,
                    _ => {
                        *pending = Some(Vec::new());
                        Turn::Own
                    }
                },
            }
        };

        match turn {
            Turn::Replay => {
                debug!("Credential already renewed");
                Ok(())
            }
            Turn::Join(rx) => match rx.await {
                Ok(result) => result.map_err(Error::from),
                // The owner went away without settling.
                Err(_) => Err(AuthError::AuthenticationRequired.into()),
            },
            Turn::Own => self.own_refresh().await,
        }
    }

    async fn own_refresh(&self) -> Result<()> {
        let in_flight = InFlight {
            pending: &self.pending,
            settled: false,
        };
        let epoch = self.store.epoch();

        match self.refresh(epoch).await {
            Ok(Renewal::Installed { has_identity }) => {
                in_flight.settle(Ok(()));
                self.events.emit(SessionEvent::Refreshed);
                if !has_identity {
                    self.resolve_identity_later();
                }
                Ok(())
            }
            Ok(Renewal::Superseded) => self.follow_current_session(in_flight),
            Err(e) => {
                if !self.store.clear_since(epoch) {
                    debug!(error = %e, "Refresh failed for a session that was already replaced");
                    return self.follow_current_session(in_flight);
                }
                warn!(error = %e, "Refresh failed; session cleared");
                in_flight.settle(Err(AuthError::AuthenticationRequired));
                self.events.emit(SessionEvent::AuthenticationRequired);
                Err(AuthError::AuthenticationRequired.into())
            }
        }
    }

    /// Release the queue against whatever session replaced the one the
    /// refresh started from: replay with its credentials, or fail if the
    /// session was ended.
    fn follow_current_session(&self, in_flight: InFlight<'_>) -> Result<()> {
        if self.store.is_authenticated() {
            debug!("Session replaced during refresh; replaying with its credentials");
            in_flight.settle(Ok(()));
            Ok(())
        } else {
            debug!("Session ended during refresh");
            in_flight.settle(Err(AuthError::AuthenticationRequired));
            Err(AuthError::AuthenticationRequired.into())
        }
    }

    /// Fill in the identity off the request path; the owner replays at once.
    fn resolve_identity_later(&self) {
        let store = self.store.clone();
        let resolver = self.resolver.clone();
        tokio::spawn(async move {
            resolver.ensure_identity(&store).await;
        });
    }

    /// Exchange the refresh credential for a new pair and install it into
    /// the session identified by `epoch`.
    async fn refresh(&self, epoch: u64) -> Result<Renewal> {
        let refresh = self
            .store
            .current_refresh()
            .ok_or(AuthError::AuthenticationRequired)?;

        info!("Refreshing credentials");

        let bodies: Vec<_> = self.shapes.iter().map(|s| s.encode(&refresh)).collect();
        let outcome = self.executor.post_first_accepted(REFRESH, &bodies).await?;

        let (pair, identity) = match outcome {
            Outcome::Success { status, body } => {
                let response = TokenResponse::from_body(status.as_u16(), body)?;
                let access = response.access(status.as_u16())?;
                // Servers that do not rotate keep the previous refresh credential.
                let next: RefreshToken = response.refresh().unwrap_or(refresh);
                (CredentialPair::new(access, next), response.identity())
            }
            Outcome::CredentialExpired => return Err(AuthError::AuthenticationRequired.into()),
            Outcome::Failure { status, message } => {
                return Err(RequestError::new(status.as_u16(), message).into());
            }
        };

        match self.store.set_credentials_since(epoch, pair, identity) {
            Some(identity) => {
                debug!("Credentials refreshed");
                Ok(Renewal::Installed {
                    has_identity: identity.is_some(),
                })
            }
            None => Ok(Renewal::Superseded),
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("shapes", &self.shapes)
            .finish()
    }
}

/// The owner's hold on the queue.
///
/// Settling drains the queue in join order and returns the coordinator to
/// idle. If the owner is dropped before settling, the queue is drained with
/// closed channels, which waiters read as `AuthenticationRequired`; the
/// credentials are left as they are.
struct InFlight<'a> {
    pending: &'a Mutex<Option<Vec<Waiter>>>,
    settled: bool,
}

impl InFlight<'_> {
    fn take(&self) -> Vec<Waiter> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *pending).unwrap_or_default()
    }

    fn settle(mut self, result: std::result::Result<(), AuthError>) {
        self.settled = true;
        let waiters = self.take();
        debug!(waiters = waiters.len(), ok = result.is_ok(), "Releasing waiters");
        for waiter in waiters {
            // A waiter whose call was dropped has nobody to tell.
            let _ = waiter.send(result.clone());
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let waiters = self.take();
            warn!(waiters = waiters.len(), "Refresh abandoned");
        }
    }
}
