//! Retry classification for upload failures.

use serde::{Deserialize, Serialize};

/// Retry policy classification for remote API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
///
/// Classification is informational: the worker retries every failed row on the
/// next pass regardless of class (capped only by an optional attempt ceiling),
/// but logs and bookkeeping carry the class so operators can tell a flaky
/// network from a row the server keeps rejecting.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

impl SyncRetryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRetryClass::Retryable => "retryable",
            SyncRetryClass::Permanent => "permanent",
            SyncRetryClass::ReauthRequired => "reauth_required",
        }
    }
}
