//! Scripted transport and fixtures shared by unit tests.

use std::sync::{Arc, Mutex};

use crate::config::Endpoints;
use crate::error::ApiError;
use crate::session::SessionStore;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::transport::{PendingRequest, RawResponse, Transport};

type Handler = dyn Fn(&PendingRequest) -> Result<RawResponse, ApiError> + Send + Sync;

/// Transport that answers with a closure and records every request.
pub struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<PendingRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&PendingRequest) -> Result<RawResponse, ApiError> + Send + Sync + 'static,
    {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> Vec<PendingRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<PendingRequest> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &PendingRequest) -> Result<RawResponse, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        // Let concurrently spawned requests reach the transport before any
        // of them gets an answer.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        (self.handler)(request)
    }
}

pub fn json_response(status: u16, body: &serde_json::Value) -> Result<RawResponse, ApiError> {
    Ok(RawResponse::new(status, body.to_string()))
}

pub fn unauthorized() -> Result<RawResponse, ApiError> {
    json_response(401, &serde_json::json!({ "detail": "Given token not valid for any token type" }))
}

pub fn bearer(request: &PendingRequest) -> Option<&str> {
    request.authorization().and_then(|value| value.strip_prefix("Bearer "))
}

pub const TOKEN_PATH: &str = "/api/auth/token/";
pub const REFRESH_PATH: &str = "/api/auth/token/refresh/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const ROOMS_PATH: &str = "/api/rooms/";
pub const BOOKINGS_PATH: &str = "/api/bookings/";

/// Store over `transport` whose persisted state already holds the given
/// tokens, as if restored after a restart.
pub fn store_with_tokens(
    transport: Arc<MockTransport>,
    access: &str,
    refresh: &str,
) -> (SessionStore, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    storage.set(crate::storage::ACCESS_TOKEN_KEY, access).unwrap();
    storage.set(crate::storage::REFRESH_TOKEN_KEY, refresh).unwrap();
    storage.set(crate::storage::USER_KEY, r#"{"username":"guest"}"#).unwrap();
    let store = SessionStore::restore(storage.clone(), transport, Endpoints::default());
    (store, storage)
}

pub fn empty_store(transport: Arc<MockTransport>) -> (SessionStore, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let store = SessionStore::new(storage.clone(), transport, Endpoints::default());
    (store, storage)
}
