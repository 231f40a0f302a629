//! One-shot credential-refresh retry
//!
//! ```text
//! op() ─ ok ──────────────────────────────▶ Ok
//!   └─ credential expired ─▶ refresh()
//!          ├─ FatalExpired ───────────────▶ AuthRequired
//!          └─ Refreshed ─▶ op() ─ ok ─────▶ Ok
//!                             ├─ expired ─▶ AuthRequired
//!                             └─ other ───▶ Remote
//! any other first error ──────────────────▶ Remote
//! ```

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;

use crate::error::ErrorClass;
use crate::ports::{CredentialRefresher, RefreshOutcome};

/// Terminal outcome of a failed remote write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// The credential could not be refreshed; the user must sign in again
    #[error("Authentication required")]
    AuthRequired,

    /// The call failed for another reason
    #[error("Remote call failed: {message}")]
    Remote { message: String, retryable: bool },
}

impl SyncFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { retryable: true, .. })
    }
}

/// Run `op`, refreshing the credential and retrying once if it expired.
pub async fn with_credential_retry<T, E, F, Fut, C>(
    mut op: F,
    classify: C,
    refresher: &dyn CredentialRefresher,
) -> Result<T, SyncFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    E: Display,
{
    let err = match op().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if classify(&err) != ErrorClass::CredentialExpired {
        return Err(remote_failure(&err, classify(&err)));
    }

    tracing::info!("Credential expired, refreshing");
    if refresher.refresh().await == RefreshOutcome::FatalExpired {
        tracing::warn!("Credential refresh rejected");
        return Err(SyncFailure::AuthRequired);
    }

    match op().await {
        Ok(value) => Ok(value),
        Err(err) => match classify(&err) {
            ErrorClass::CredentialExpired => {
                tracing::warn!("Credential still expired after refresh");
                Err(SyncFailure::AuthRequired)
            }
            class => Err(remote_failure(&err, class)),
        },
    }
}

fn remote_failure<E: Display>(err: &E, class: ErrorClass) -> SyncFailure {
    SyncFailure::Remote {
        message: err.to_string(),
        retryable: class == ErrorClass::Transient,
    }
}
