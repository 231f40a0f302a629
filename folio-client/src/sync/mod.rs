//! Persistence Synchronizer
//!
//! Mirrors locally applied mutations to the server:
//!
//! - [`debounce`]: per-entity debounced property updates
//! - [`retry`]: one-shot credential refresh + retry around every remote call
//! - [`synchronizer`]: dispatch, per-entity ordering, notifications, manual retry

pub mod debounce;
pub mod retry;
pub mod synchronizer;

pub use debounce::{Coalesce, KeyedDebouncer};
pub use retry::{SyncFailure, with_credential_retry};
pub use synchronizer::{EntityKey, PersistenceSynchronizer, RemoteWrite, SyncEvent};
