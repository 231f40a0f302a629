//! Local editing: state, commands, per-scope history and the session that
//! ties them to the synchronizer.

pub mod command;
pub mod history;
pub mod session;
pub mod state;

pub use command::{Command, Mutation};
pub use history::{DEFAULT_HISTORY_LIMIT, EditHistory};
pub use session::{EditorSession, ScopeSync};
pub use state::EditorState;

use shared::models::ScopeKey;
use thiserror::Error;

/// Local state error. The state is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("Scope {0} is not loaded")]
    UnknownScope(ScopeKey),

    #[error("{} {id} not found in {scope}", .scope.kind)]
    NotFound { scope: ScopeKey, id: i64 },

    #[error("{} {id} already exists in {scope}", .scope.kind)]
    Duplicate { scope: ScopeKey, id: i64 },

    /// Positional precondition no longer holds (entity moved since the command was built)
    #[error("{} {id} in {scope} has moved since the edit was recorded", .scope.kind)]
    Stale { scope: ScopeKey, id: i64 },
}
