//! Collaborator ports of the synchronizer
//!
//! Credential refresh and user-facing notification are owned by the host
//! application; the synchronizer only calls through these traits.

use async_trait::async_trait;

use crate::sync::SyncFailure;

/// Result of a credential refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh credential is in place; the failed call may be retried
    Refreshed,
    /// The session is over; the user has to sign in again
    FatalExpired,
}

#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> RefreshOutcome;
}

/// Refresher for hosts without credentials: every expiry is fatal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRefresher;

#[async_trait]
impl CredentialRefresher for NoopRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        RefreshOutcome::FatalExpired
    }
}

/// Save-status sink (toasts, status bar, ...)
///
/// Every dispatched write produces `notify_pending` followed by exactly one
/// of `notify_success` / `notify_failure`.
pub trait NotificationPort: Send + Sync {
    fn notify_pending(&self);
    fn notify_success(&self);
    fn notify_failure(&self, failure: &SyncFailure);
}

/// Notification sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationPort for TracingNotifier {
    fn notify_pending(&self) {
        tracing::debug!("Saving...");
    }

    fn notify_success(&self) {
        tracing::debug!("Saved");
    }

    fn notify_failure(&self, failure: &SyncFailure) {
        tracing::warn!(%failure, "Save failed");
    }
}
