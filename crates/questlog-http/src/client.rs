//! The public entry point.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use questlog_core::error::{AuthError, ProtocolError, RequestError};
use questlog_core::{
    CredentialPair, Credentials, Identity, Registration, Result, SessionStorage,
};

use crate::bootstrap::SessionBootstrapper;
use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::endpoints::{LOGIN, REGISTER, TokenResponse};
use crate::events::{EventBus, SessionEvent};
use crate::executor::{Outcome, RequestExecutor, RequestOptions};
use crate::resolver::IdentityResolver;
use crate::store::CredentialStore;

/// A client for the API with managed credentials.
///
/// Clients are cheap to clone (they use internal `Arc`) and every clone
/// shares one session, one refresh coordinator and one event stream.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    executor: RequestExecutor,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    resolver: IdentityResolver,
    bootstrapper: SessionBootstrapper,
    events: EventBus,
}

impl Client {
    /// Create a client whose session is mirrored to `storage`.
    ///
    /// The session starts empty; call [`Client::resume`] to pick up a session
    /// persisted by an earlier run.
    pub fn new(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let executor = RequestExecutor::new(&config)?;
        let events = EventBus::new(config.event_capacity);
        let store = Arc::new(CredentialStore::new(storage));
        let resolver = IdentityResolver::new(executor.clone(), config.profile_path.clone());
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            executor.clone(),
            resolver.clone(),
            config.refresh_shapes.clone(),
            events.clone(),
        ));
        let bootstrapper =
            SessionBootstrapper::new(store.clone(), coordinator.clone(), resolver.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                executor,
                store,
                coordinator,
                resolver,
                bootstrapper,
                events,
            }),
        })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the credential store.
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.store
    }

    /// Returns the refresh coordinator shared by every clone of this client.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    /// Send a call and return its parsed body (`None` for empty responses).
    ///
    /// A 401 hands the call to the refresh coordinator; once a new credential
    /// is installed the call is replayed once with the same options. A 401 on
    /// the replay fails with [`AuthError::RetryExhausted`].
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Option<Value>> {
        let access = self.inner.store.current_access();
        let outcome = self
            .inner
            .executor
            .execute(path, &options, access.as_ref())
            .await?;

        if outcome != Outcome::CredentialExpired {
            return outcome.into_body();
        }

        debug!("Credential expired; waiting for refresh");
        self.inner.coordinator.handle_expired(access.as_ref()).await?;

        let access = self.inner.store.current_access();
        match self
            .inner
            .executor
            .execute(path, &options, access.as_ref())
            .await?
        {
            Outcome::CredentialExpired => {
                debug!("Replay rejected; giving up");
                Err(AuthError::RetryExhausted.into())
            }
            replayed => replayed.into_body(),
        }
    }

    /// Send a call and deserialize its body. An empty body deserializes from `null`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let body = self.request(path, options).await?.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| {
            ProtocolError::new(None, format!("unexpected response for {}: {}", path, e)).into()
        })
    }

    /// Log in with a password and install the returned credentials.
    ///
    /// Returns the identity when one could be resolved from the response, the
    /// token claims, or the profile endpoint.
    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier()))]
    pub async fn login(&self, credentials: Credentials) -> Result<Option<Identity>> {
        info!("Logging in");

        let bodies: Vec<_> = self
            .inner
            .config
            .login_shapes
            .iter()
            .map(|shape| shape.encode(&credentials))
            .collect();

        let outcome = self.inner.executor.post_first_accepted(LOGIN, &bodies).await?;

        let (status, body) = match outcome {
            Outcome::Success { status, body } => (status.as_u16(), body),
            Outcome::CredentialExpired => {
                return Err(AuthError::InvalidCredentials("login rejected".to_string()).into());
            }
            Outcome::Failure { status, message } => {
                return Err(RequestError::new(status.as_u16(), message).into());
            }
        };

        let response = TokenResponse::from_body(status, body)?;
        let access = response.access(status)?;
        let refresh = response
            .refresh()
            .ok_or_else(|| ProtocolError::new(Some(status), "login response has no refresh token"))?;

        let identity = self
            .inner
            .store
            .set_credentials(CredentialPair::new(access, refresh), response.identity());
        let identity = match identity {
            Some(identity) => Some(identity),
            None => self.inner.resolver.ensure_identity(&self.inner.store).await,
        };

        debug!(has_identity = identity.is_some(), "Logged in");
        self.inner
            .events
            .emit(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Create an account, then log in with it.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Option<Identity>> {
        info!("Registering account");

        let options = RequestOptions::post().json(&json!({
            "username": registration.username,
            "email": registration.email,
            "password": registration.password(),
        }))?;

        match self.inner.executor.execute(REGISTER, &options, None).await? {
            Outcome::Success { .. } => {}
            Outcome::CredentialExpired => {
                return Err(RequestError::new(401, "registration rejected").into());
            }
            Outcome::Failure { status, message } => {
                return Err(RequestError::new(status.as_u16(), message).into());
            }
        }

        self.login(registration.credentials()).await
    }

    /// Resume a session persisted by an earlier run. See [`SessionBootstrapper`].
    pub async fn resume(&self) -> bool {
        self.inner.bootstrapper.resume().await
    }

    /// Renew the credential pair now, sharing any refresh already in flight.
    pub async fn refresh(&self) -> Result<()> {
        let current = self.inner.store.current_access();
        self.inner.coordinator.handle_expired(current.as_ref()).await
    }

    /// End the session and notify subscribers.
    pub fn sign_out(&self) {
        info!("Signing out");
        self.inner.store.clear();
        self.inner.events.emit(SessionEvent::SignedOut);
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.store.current_identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url)
            .field("store", &self.inner.store)
            .field("coordinator", &self.inner.coordinator)
            .finish()
    }
}
