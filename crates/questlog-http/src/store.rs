//! In-memory session state mirrored to durable storage.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use questlog_core::storage::{IDENTITY_KEY, REFRESH_TOKEN_KEY};
use questlog_core::{AccessToken, CredentialPair, Identity, RefreshToken, SessionStorage};

use crate::resolver::IdentityResolver;

/// Which credentials the session currently holds.
#[derive(Debug, Clone, Default)]
enum Tokens {
    /// No session.
    #[default]
    Absent,
    /// A refresh credential restored from storage; no access credential yet.
    Dormant(RefreshToken),
    /// A live credential pair.
    Active(CredentialPair),
}

#[derive(Debug, Default)]
struct SessionState {
    tokens: Tokens,
    identity: Option<Identity>,
    /// Bumped whenever the session is replaced or ended from outside a
    /// refresh, so a refresh started against an older session can tell that
    /// its result no longer applies.
    epoch: u64,
    /// Bumped by every change the durable mirror must follow.
    revision: u64,
}

impl SessionState {
    fn snapshot(&mut self) -> Snapshot {
        self.revision += 1;
        let refresh = match &self.tokens {
            Tokens::Active(pair) => Some(pair.refresh().as_str().to_string()),
            Tokens::Dormant(refresh) => Some(refresh.as_str().to_string()),
            Tokens::Absent => None,
        };
        Snapshot {
            revision: self.revision,
            refresh,
            identity: self.identity.as_ref().map(Identity::to_json),
        }
    }
}

/// The durable slots as of one revision of the session.
struct Snapshot {
    revision: u64,
    refresh: Option<String>,
    identity: Option<String>,
}

impl Snapshot {
    fn write(&self, storage: &dyn SessionStorage) {
        match &self.refresh {
            Some(refresh) => storage.store(REFRESH_TOKEN_KEY, refresh),
            None => storage.remove(REFRESH_TOKEN_KEY),
        }
        match &self.identity {
            Some(identity) => storage.store(IDENTITY_KEY, identity),
            None => storage.remove(IDENTITY_KEY),
        }
    }
}

/// Single owner of the credential pair and the authenticated identity.
///
/// Every operation is synchronous and total: the lock is never held across
/// an await point and storage failures are logged by the storage itself.
/// The durable mirror holds only the refresh credential and the identity;
/// the access credential lives in memory only.
///
/// Storage is written after the state lock is released, so readers never wait
/// on disk I/O. Writes carry the revision they were taken at and a write that
/// lost the race to a newer one is skipped.
pub struct CredentialStore {
    state: Mutex<SessionState>,
    storage: Arc<dyn SessionStorage>,
    /// Revision of the last snapshot written to storage.
    persisted: Mutex<u64>,
}

impl CredentialStore {
    /// Create an empty store mirrored to `storage`.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            storage,
            persisted: Mutex::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, snapshot: Snapshot) {
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        if *persisted >= snapshot.revision {
            trace!(revision = snapshot.revision, "Newer session already persisted");
            return;
        }
        snapshot.write(self.storage.as_ref());
        *persisted = snapshot.revision;
    }

    /// Replace the credential pair as one unit, starting a new session.
    ///
    /// When `identity` is `None` it is re-derived from the access token's
    /// claims; if that yields nothing the identity is invalidated. Returns the
    /// identity now held. A refresh in flight for the previous session will
    /// not overwrite this pair.
    pub fn set_credentials(
        &self,
        pair: CredentialPair,
        identity: Option<Identity>,
    ) -> Option<Identity> {
        let identity = identity.or_else(|| IdentityResolver::from_claims(pair.access()));

        let snapshot = {
            let mut state = self.state();
            state.epoch = state.epoch.wrapping_add(1);
            Self::install(&mut state, pair, identity.clone())
        };
        self.persist(snapshot);
        identity
    }

    /// Replace the credential pair unless the session was replaced or ended
    /// since `epoch`.
    pub(crate) fn set_credentials_since(
        &self,
        epoch: u64,
        pair: CredentialPair,
        identity: Option<Identity>,
    ) -> Option<Option<Identity>> {
        let identity = identity.or_else(|| IdentityResolver::from_claims(pair.access()));

        let snapshot = {
            let mut state = self.state();
            if state.epoch != epoch {
                debug!("Session replaced during refresh; discarding new credentials");
                return None;
            }
            Self::install(&mut state, pair, identity.clone())
        };
        self.persist(snapshot);
        Some(identity)
    }

    fn install(
        state: &mut SessionState,
        pair: CredentialPair,
        identity: Option<Identity>,
    ) -> Snapshot {
        debug!(has_identity = identity.is_some(), "Credentials replaced");
        state.tokens = Tokens::Active(pair);
        state.identity = identity;
        state.snapshot()
    }

    /// Install an identity fetched for `access`.
    ///
    /// Ignored if the access credential changed while the identity was being
    /// fetched. Returns whether it was installed.
    pub fn set_identity_for(&self, access: &AccessToken, identity: Identity) -> bool {
        let snapshot = {
            let mut state = self.state();
            if !matches!(&state.tokens, Tokens::Active(pair) if pair.access() == access) {
                return false;
            }
            state.identity = Some(identity);
            state.snapshot()
        };
        self.persist(snapshot);
        true
    }

    /// Load the durable mirror into memory.
    ///
    /// A live session is left untouched. Otherwise the stored refresh
    /// credential (if any) becomes a dormant session together with the cached
    /// identity. Returns whether a refresh credential is now held.
    pub fn restore(&self) -> bool {
        let mut state = self.state();
        if let Tokens::Active(_) = state.tokens {
            return true;
        }

        let refresh = self
            .storage
            .load(REFRESH_TOKEN_KEY)
            .filter(|t| !t.trim().is_empty());

        match refresh {
            Some(token) => {
                state.tokens = Tokens::Dormant(RefreshToken::new(token));
                state.identity = self
                    .storage
                    .load(IDENTITY_KEY)
                    .and_then(|raw| Identity::from_json(&raw));
                debug!(has_identity = state.identity.is_some(), "Session restored from storage");
                true
            }
            None => {
                state.tokens = Tokens::Absent;
                state.identity = None;
                false
            }
        }
    }

    /// Wipe the session in memory and in durable storage.
    pub fn clear(&self) {
        let snapshot = {
            let mut state = self.state();
            Self::wipe(&mut state)
        };
        self.persist(snapshot);
    }

    /// Wipe the session unless it was replaced or ended since `epoch`.
    /// Returns whether it was wiped.
    pub(crate) fn clear_since(&self, epoch: u64) -> bool {
        let snapshot = {
            let mut state = self.state();
            if state.epoch != epoch {
                return false;
            }
            Self::wipe(&mut state)
        };
        self.persist(snapshot);
        true
    }

    fn wipe(state: &mut SessionState) -> Snapshot {
        state.tokens = Tokens::Absent;
        state.identity = None;
        state.epoch = state.epoch.wrapping_add(1);
        debug!("Session cleared");
        state.snapshot()
    }

    pub fn current_access(&self) -> Option<AccessToken> {
        match &self.state().tokens {
            Tokens::Active(pair) => Some(pair.access().clone()),
            _ => None,
        }
    }

    pub fn current_refresh(&self) -> Option<RefreshToken> {
        match &self.state().tokens {
            Tokens::Active(pair) => Some(pair.refresh().clone()),
            Tokens::Dormant(refresh) => Some(refresh.clone()),
            Tokens::Absent => None,
        }
    }

    /// Both halves of the live pair, read under one lock.
    pub fn current_pair(&self) -> Option<CredentialPair> {
        match &self.state().tokens {
            Tokens::Active(pair) => Some(pair.clone()),
            _ => None,
        }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state().identity.clone()
    }

    /// True while an access credential is held.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state().tokens, Tokens::Active(_))
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.state().epoch
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{OnceLock, Weak};

    use questlog_core::{MemoryStorage, Role};

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair::new(AccessToken::new(access), RefreshToken::new(refresh))
    }

    fn store() -> (CredentialStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (CredentialStore::new(storage.clone()), storage)
    }

    #[test]
    fn never_persists_access_token() {
        let (store, storage) = store();
        let identity = Identity::new("1", "amy", [Role::new("PLAYER")]);
        store.set_credentials(pair("A1", "R1"), Some(identity.clone()));

        assert_eq!(storage.load(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
        assert_eq!(
            storage.load(IDENTITY_KEY).and_then(|raw| Identity::from_json(&raw)),
            Some(identity)
        );
        assert_eq!(store.current_access(), Some(AccessToken::new("A1")));
        assert!(store.is_authenticated());
    }

    #[test]
    fn replacing_pair_swaps_both_halves() {
        let (store, _) = store();
        store.set_credentials(pair("A1", "R1"), None);
        store.set_credentials(pair("A2", "R2"), None);

        assert_eq!(store.current_pair(), Some(pair("A2", "R2")));
        assert_eq!(store.current_refresh(), Some(RefreshToken::new("R2")));
    }

    #[test]
    fn opaque_token_invalidates_identity() {
        let (store, storage) = store();
        store.set_credentials(pair("A1", "R1"), Some(Identity::new("1", "amy", [])));
        let identity = store.set_credentials(pair("A2", "R2"), None);

        assert!(identity.is_none());
        assert!(store.current_identity().is_none());
        assert!(storage.load(IDENTITY_KEY).is_none());
    }

    #[test]
    fn clear_wipes_memory_and_mirror() {
        let (store, storage) = store();
        store.set_credentials(pair("A1", "R1"), Some(Identity::new("1", "amy", [])));
        store.clear();

        assert!(store.current_access().is_none());
        assert!(store.current_refresh().is_none());
        assert!(store.current_identity().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn restore_builds_dormant_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store(REFRESH_TOKEN_KEY, "R1");
        storage.store(IDENTITY_KEY, r#"{"id":"1","username":"amy","roles":["PLAYER"]}"#);

        let store = CredentialStore::new(storage);
        assert!(store.restore());
        assert_eq!(store.current_refresh(), Some(RefreshToken::new("R1")));
        assert!(store.current_access().is_none());
        assert!(!store.is_authenticated());
        assert_eq!(store.current_identity().unwrap().display_name, "amy");
    }

    #[test]
    fn restore_without_refresh_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store(IDENTITY_KEY, r#"{"id":"1","username":"amy"}"#);

        let store = CredentialStore::new(storage);
        assert!(!store.restore());
        assert!(store.current_identity().is_none());
    }

    #[test]
    fn restore_keeps_live_session() {
        let (store, storage) = store();
        store.set_credentials(pair("A1", "R1"), None);
        storage.store(REFRESH_TOKEN_KEY, "R-other");

        assert!(store.restore());
        assert_eq!(store.current_pair(), Some(pair("A1", "R1")));
    }

    #[test]
    fn late_identity_is_ignored_after_rotation() {
        let (store, _) = store();
        store.set_credentials(pair("A1", "R1"), None);
        store.set_credentials(pair("A2", "R2"), None);

        let stale = store.set_identity_for(&AccessToken::new("A1"), Identity::new("1", "amy", []));
        assert!(!stale);
        assert!(store.current_identity().is_none());

        let fresh = store.set_identity_for(&AccessToken::new("A2"), Identity::new("1", "amy", []));
        assert!(fresh);
        assert!(store.current_identity().is_some());
    }

    #[test]
    fn credentials_from_before_a_clear_are_discarded() {
        let (store, _) = store();
        let epoch = store.epoch();
        store.clear();

        assert!(store.set_credentials_since(epoch, pair("A2", "R2"), None).is_none());
        assert!(store.current_pair().is_none());

        let epoch = store.epoch();
        assert!(store.set_credentials_since(epoch, pair("A2", "R2"), None).is_some());
        assert_eq!(store.current_pair(), Some(pair("A2", "R2")));
    }

    #[test]
    fn new_login_starts_a_new_session() {
        let (store, storage) = store();
        store.set_credentials(pair("A1", "R1"), None);
        let epoch = store.epoch();

        // Another account signs in while a refresh of the first is in flight.
        store.set_credentials(pair("B1", "BR1"), None);

        assert!(store.set_credentials_since(epoch, pair("A2", "R2"), None).is_none());
        assert!(!store.clear_since(epoch));
        assert_eq!(store.current_pair(), Some(pair("B1", "BR1")));
        assert_eq!(storage.load(REFRESH_TOKEN_KEY).as_deref(), Some("BR1"));
    }

    /// Storage that reads the store back while it is being written to.
    struct ReadingStorage {
        inner: MemoryStorage,
        store: OnceLock<Weak<CredentialStore>>,
        seen: Mutex<Vec<Option<AccessToken>>>,
    }

    impl SessionStorage for ReadingStorage {
        fn load(&self, key: &str) -> Option<String> {
            self.inner.load(key)
        }

        fn store(&self, key: &str, value: &str) {
            if let Some(store) = self.store.get().and_then(Weak::upgrade) {
                self.seen.lock().unwrap().push(store.current_access());
            }
            self.inner.store(key, value);
        }

        fn remove(&self, key: &str) {
            self.inner.remove(key);
        }
    }

    #[test]
    fn storage_is_written_outside_the_state_lock() {
        let storage = Arc::new(ReadingStorage {
            inner: MemoryStorage::new(),
            store: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        });
        let store = Arc::new(CredentialStore::new(storage.clone()));
        storage.store.set(Arc::downgrade(&store)).unwrap();

        store.set_credentials(pair("A1", "R1"), None);

        let seen = storage.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Some(AccessToken::new("A1"))]);
        assert_eq!(storage.inner.load(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
    }

    #[test]
    fn older_snapshot_never_overwrites_newer() {
        let (store, storage) = store();
        let older = {
            let mut state = store.state();
            CredentialStore::install(&mut state, pair("A1", "R1"), None)
        };
        store.set_credentials(pair("A2", "R2"), None);

        store.persist(older);
        assert_eq!(storage.load(REFRESH_TOKEN_KEY).as_deref(), Some("R2"));
    }
}
