//! Request interceptor pipeline.
//!
//! Every backend call except the auth endpoints themselves goes through
//! `ApiClient::execute`:
//!
//! 1. attach `Authorization: Bearer <access>` from the current session
//! 2. dispatch
//! 3. 2xx: return as is
//! 4. 401 with a refresh token held: renew (coalesced), rewrite the header,
//!    redispatch once. A second 401 is `AuthorizationRetryExhausted`.
//! 5. 401 without a refresh token, or any other failure: surface it
//!
//! The header is composed per request from the session at dispatch time;
//! there is no client-wide default header to keep in sync.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;
use crate::transport::{HttpTransport, PendingRequest, RawResponse, Transport};

/// Authenticated backend client. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    session: SessionStore,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    #[must_use]
    pub fn new(session: SessionStore, transport: Arc<dyn Transport>) -> Self {
        Self { session, transport }
    }

    /// Build an HTTP-backed client whose session is restored from `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::from_config(config)?);
        let session = SessionStore::restore(storage, transport.clone(), config.endpoints.clone());
        Ok(Self::new(session, transport))
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Dispatch `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the mapped failure of the (possibly retried) request, or the
    /// refresh error if renewing the access token failed.
    pub async fn execute(&self, request: PendingRequest) -> Result<RawResponse, ApiError> {
        let token = self.session.access_token();
        let outbound = compose(&request, token.as_deref());
        let response = self.transport.send(&outbound).await?;

        if !response.is_unauthorized() {
            return response.error_for_status();
        }
        if self.session.refresh_token().is_none() {
            tracing::debug!(path = %request.path, "unauthorized without refresh token");
            return response.error_for_status();
        }

        tracing::debug!(path = %request.path, "unauthorized; renewing access token");
        let renewed = self.session.renew_access_token(token.as_deref()).await?;

        let retry = request.with_bearer(&renewed);
        let response = self.transport.send(&retry).await?;
        if response.is_unauthorized() {
            tracing::warn!(path = %request.path, "retry after token refresh still unauthorized");
            return Err(ApiError::AuthorizationRetryExhausted);
        }
        response.error_for_status()
    }
}

/// Outbound copy of `request` carrying the given access token, or no
/// authorization header at all when logged out.
fn compose(request: &PendingRequest, access_token: Option<&str>) -> PendingRequest {
    match access_token {
        Some(token) => request.with_bearer(token),
        None => request.without_authorization(),
    }
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod tests;
