//! Guesthouse booking client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Client-side auth layer for the guesthouse REST backend. A `SessionStore`
//! owns the JWT pair and cached profile and persists them through a
//! `KeyValueStore`. `ApiClient` runs every backend call through the
//! interceptor pipeline (attach bearer, refresh once on 401, retry once).
//! `RouteTable` gates navigation on the session.
//!
//! ARCHITECTURE
//! ============
//! ```text
//! guard ──► session ◄── interceptor ◄── api
//!              │             │
//!           storage      transport ──► backend
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod interceptor;
pub mod session;
pub mod storage;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{ClientConfig, ConfigError, Endpoints};
pub use error::ApiError;
pub use guard::{Navigation, Route, RouteTable};
pub use interceptor::ApiClient;
pub use session::{Session, SessionStore, UserProfile};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use transport::{HttpTransport, PendingRequest, RawResponse, Transport};
