//! Folio Client - editor core for Folio Server
//!
//! Local, optimistic editing of ordered pages and blocks with per-scope
//! undo/redo, plus a persistence synchronizer that mirrors every applied
//! mutation to the server.
//!
//! ```text
//! user action ─▶ Command (from snapshot) ─▶ EditHistory::apply ─▶ EditorState
//!                                                  │
//!                                                  ▼ Mutation
//!                                    PersistenceSynchronizer ─▶ RemoteStore (HTTP)
//!                                                  │
//!                                                  ▼
//!                                          NotificationPort
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod http;
pub mod ports;
pub mod remote;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use editor::{Command, EditHistory, EditorError, EditorSession, EditorState, Mutation, ScopeSync};
pub use error::{ClientError, ClientResult, ErrorClass};
pub use http::HttpClient;
pub use ports::{
    CredentialRefresher, NoopRefresher, NotificationPort, RefreshOutcome, TracingNotifier,
};
pub use remote::RemoteStore;
pub use sync::{EntityKey, PersistenceSynchronizer, SyncEvent, SyncFailure};

// Re-export shared types for convenience
pub use shared::models::{EntityKind, OrderedEntity, Props, ScopeKey};
