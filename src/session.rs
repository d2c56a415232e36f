//! Authentication session store.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionStore` is the single owner of the access token, refresh token and
//! cached user. It is constructed once at startup (empty or restored from a
//! `KeyValueStore`), cloned into the `ApiClient` and consulted by the route
//! table. Nothing else mutates the session.
//!
//! REFRESH COALESCING
//! ==================
//! At most one refresh request is in flight per refresh token. The first
//! caller installs a shared future in `inflight`, tagged with the refresh
//! token it sends; later callers holding the same token await a clone of it
//! and observe the same token or the same error. A caller whose session now
//! holds a different token (logout then login) starts its own renewal. The
//! future clears its own slot when it completes.
//!
//! The parked future holds only a `Weak` to the store, so a renewal abandoned
//! by every waiter does not keep the store alive.
//!
//! A refresh result is applied only if the session still holds the refresh
//! token that was sent. A logout (or a new login) that lands while the
//! renewal is on the wire therefore wins over the stale outcome.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};

use crate::config::Endpoints;
use crate::error::ApiError;
use crate::storage::{ACCESS_TOKEN_KEY, KeyValueStore, REFRESH_TOKEN_KEY, StorageResult, USER_KEY};
use crate::transport::{PendingRequest, Transport};

// =============================================================================
// SESSION DATA
// =============================================================================

/// Profile cached alongside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Token and user state. `is_authenticated` holds exactly when an access
/// token is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Token issuance response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Registration response: the created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
struct RefreshedAccess {
    access: String,
}

type RefreshOutcome = Result<String, ApiError>;
type InflightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

// =============================================================================
// SESSION STORE
// =============================================================================

/// Cloneable handle to the shared session context.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    session: RwLock<Session>,
    storage: Arc<dyn KeyValueStore>,
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    /// Renewal in flight, keyed by the refresh token it was started with.
    inflight: Mutex<Option<(String, InflightRefresh)>>,
}

impl SessionStore {
    /// Create a store with an empty session. Persisted entries are ignored
    /// until the first write.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self::with_session(Session::default(), storage, transport, endpoints)
    }

    /// Create a store whose session is read back from `storage`.
    ///
    /// Unreadable entries count as absent. A `user` entry that is not a valid
    /// profile is dropped without discarding the tokens.
    #[must_use]
    pub fn restore(storage: Arc<dyn KeyValueStore>, transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        let read = |key: &str| match storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to read persisted session entry");
                None
            }
        };
        let user = read(USER_KEY).and_then(|raw| match serde_json::from_str::<UserProfile>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted user profile");
                None
            }
        });
        let session = Session { access_token: read(ACCESS_TOKEN_KEY), refresh_token: read(REFRESH_TOKEN_KEY), user };

        tracing::debug!(authenticated = session.is_authenticated(), "session restored");
        Self::with_session(session, storage, transport, endpoints)
    }

    fn with_session(
        session: Session,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(session),
                storage,
                transport,
                endpoints,
                inflight: Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Exchange credentials for a token pair and start a session.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` for rejected credentials and `Network` for
    /// transport failures. The session is untouched on error.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request = PendingRequest::post(self.inner.endpoints.token.as_str())
            .with_json(serde_json::json!({ "username": username, "password": password }));

        let response = self.inner.transport.send(&request).await?.error_for_status();
        let pair: TokenPair = match response.and_then(|r| r.json()) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::info!(%username, error = %e, "login failed");
                return Err(e);
            }
        };

        let user = UserProfile { username: username.to_owned(), email: None };
        {
            let mut session = self.write();
            session.access_token = Some(pair.access.clone());
            session.refresh_token = Some(pair.refresh.clone());
            session.user = Some(user.clone());
        }
        self.persist(ACCESS_TOKEN_KEY, &pair.access);
        self.persist(REFRESH_TOKEN_KEY, &pair.refresh);
        match serde_json::to_string(&user) {
            Ok(raw) => self.persist(USER_KEY, &raw),
            Err(e) => tracing::warn!(error = %e, "failed to serialize user profile"),
        }

        tracing::info!(%username, "login succeeded");
        Ok(pair)
    }

    /// Create an account. Does not log in and never touches the session.
    ///
    /// # Errors
    ///
    /// Returns `Validation` with the server's body when the payload is
    /// rejected, `Network` on transport failure.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<RegisteredUser, ApiError> {
        let request = PendingRequest::post(self.inner.endpoints.register.as_str()).with_json(serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
            "password2": password_confirmation,
        }));

        let response = self.inner.transport.send(&request).await?.error_for_status()?;
        let user: RegisteredUser = response.json()?;
        tracing::info!(username = %user.username, "registration succeeded");
        Ok(user)
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// Concurrent callers share one renewal. On failure the session is
    /// logged out before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the renewal failure: `Authentication` when the refresh token
    /// is missing, invalid or expired, `Network` on transport failure.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.refresh_token() else {
            tracing::info!("refresh requested without a refresh token; logging out");
            self.logout_quietly();
            return Err(ApiError::Authentication("no refresh token available".to_owned()));
        };

        let inflight = {
            let mut slot = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            let joinable = slot
                .as_ref()
                .filter(|(token, _)| *token == refresh_token)
                .map(|(_, renewal)| renewal.clone());
            if let Some(existing) = joinable {
                tracing::debug!("joining in-flight token refresh");
                existing
            } else {
                let weak = Arc::downgrade(&self.inner);
                let renewal = run_refresh(weak, refresh_token.clone()).boxed().shared();
                *slot = Some((refresh_token, renewal.clone()));
                renewal
            }
        };
        inflight.await
    }

    /// Access token to retry with after `stale` was rejected.
    ///
    /// If another request already renewed the token since `stale` was
    /// attached, the current token is returned without a second refresh.
    pub(crate) async fn renew_access_token(&self, stale: Option<&str>) -> Result<String, ApiError> {
        if let Some(current) = self.access_token() {
            if stale != Some(current.as_str()) {
                tracing::debug!("access token already renewed by a concurrent request");
                return Ok(current);
            }
        }
        self.refresh().await
    }

    /// Clear the session in memory and in storage. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure. The in-memory session is cleared
    /// and every key removal is attempted regardless.
    pub fn logout(&self) -> StorageResult<()> {
        let was_authenticated = {
            let mut session = self.write();
            let was = session.is_authenticated();
            *session = Session::default();
            was
        };
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.inner.storage.remove(key) {
                tracing::warn!(error = %e, key, "failed to remove persisted session entry");
                first_error.get_or_insert(e);
            }
        }
        if was_authenticated {
            tracing::info!("logged out");
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Logout forced by a failed renewal; the renewal error is what callers see.
    fn logout_quietly(&self) {
        if let Err(e) = self.logout() {
            tracing::warn!(error = %e, "persisted session may outlive forced logout");
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.storage.set(key, value) {
            tracing::warn!(error = %e, key, "failed to persist session entry");
        }
    }
}

// =============================================================================
// RENEWAL
// =============================================================================

fn store_dropped() -> ApiError {
    ApiError::Authentication("session store dropped".to_owned())
}

/// Body of the shared renewal future. The store is upgraded only around
/// session reads and writes, never across the network call.
async fn run_refresh(weak: Weak<Inner>, refresh_token: String) -> RefreshOutcome {
    let (transport, path) = {
        let inner = weak.upgrade().ok_or_else(store_dropped)?;
        (inner.transport.clone(), inner.endpoints.token_refresh.clone())
    };

    let request = PendingRequest::post(path).with_json(serde_json::json!({ "refresh": refresh_token }));
    let outcome = match transport.send(&request).await {
        Ok(response) => response.error_for_status().and_then(|r| r.json::<RefreshedAccess>()),
        Err(e) => Err(e),
    };

    let store = SessionStore { inner: weak.upgrade().ok_or_else(store_dropped)? };
    let result = store.apply_refresh(&refresh_token, outcome);
    store.release_inflight(&refresh_token);
    result
}

impl SessionStore {
    fn apply_refresh(&self, refresh_token: &str, outcome: Result<RefreshedAccess, ApiError>) -> RefreshOutcome {
        match outcome {
            Ok(RefreshedAccess { access }) => {
                let applied = {
                    let mut session = self.write();
                    let current = session.refresh_token.as_deref() == Some(refresh_token);
                    if current {
                        session.access_token = Some(access.clone());
                    }
                    current
                };
                if !applied {
                    tracing::info!("session changed during token refresh; discarding renewed token");
                    return Err(ApiError::Authentication("session ended during token refresh".to_owned()));
                }
                self.persist(ACCESS_TOKEN_KEY, &access);
                tracing::info!("access token refreshed");
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; logging out");
                if self.refresh_token().as_deref() == Some(refresh_token) {
                    self.logout_quietly();
                }
                Err(e)
            }
        }
    }

    /// Empty the in-flight slot if it still holds the renewal for `refresh_token`.
    fn release_inflight(&self, refresh_token: &str) {
        let mut slot = self.inner.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(token, _)| token == refresh_token) {
            *slot = None;
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
