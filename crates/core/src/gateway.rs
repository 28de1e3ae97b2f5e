//! Port to the remote expense service.
//!
//! The cache never talks to the network directly; everything remote goes
//! through [`RemoteGateway`]. The HTTP binding lives in the api-client crate,
//! tests substitute scripted in-memory gateways.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::{classify_http_status, SyncRetryClass};

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Upload payload for one locally created expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    /// Account identity the expense belongs to (the signed-in email).
    pub account: String,
    /// Calendar date of the expense, `YYYY-MM-DD`.
    pub date: Option<String>,
}

/// Acknowledgement for a created expense.
///
/// `id` is the server-assigned identifier echoed back so the local row can be
/// marked synced against a genuine remote reference. A server that omits it
/// violates the contract; the worker keeps the row pending rather than invent
/// an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseAck {
    pub message: String,
    pub id: Option<String>,
}

/// One expense as reported by the remote system-of-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteExpense {
    pub id: String,
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    /// ISO-like calendar date string; parse with [`parse_remote_date_ms`].
    pub date: String,
}

/// Profile payload returned by the remote system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserProfile {
    pub display_name: String,
    pub experience_points: i32,
    pub budget_limit: Option<Decimal>,
    pub profile_picture: Option<String>,
}

/// Errors that can occur while talking to the remote service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, timeout or other transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error response from the remote API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Response decoded fine but breaks the gateway contract.
    #[error("Contract violation: {0}")]
    Contract(String),
}

impl GatewayError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Transport(_) => SyncRetryClass::Retryable,
            Self::Decode(_) => SyncRetryClass::Permanent,
            Self::Contract(_) => SyncRetryClass::Permanent,
        }
    }
}

/// Abstract interface to the remote system-of-record.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Uploads one expense; the acknowledgement should echo the new id.
    async fn create_expense(
        &self,
        request: &CreateExpenseRequest,
    ) -> GatewayResult<CreateExpenseAck>;

    /// Lists the account's expenses created on or after `since`.
    async fn list_expenses(
        &self,
        account: &str,
        since: NaiveDate,
    ) -> GatewayResult<Vec<RemoteExpense>>;

    /// Fetches the account's profile.
    async fn get_user_profile(&self, account: &str) -> GatewayResult<RemoteUserProfile>;
}

/// Parses a remote calendar date into epoch milliseconds (midnight UTC).
///
/// Accepts an RFC3339 timestamp or a plain `YYYY-MM-DD` date. A string that
/// parses as neither falls back to the current time so the row still sorts
/// near the top instead of being dropped.
pub fn parse_remote_date_ms(date: &str) -> i64 {
    let trimmed = date.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.timestamp_millis();
    }

    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = day.and_hms_opt(0, 0, 0);
        if let Some(naive) = midnight {
            if let Some(dt) = Utc.from_local_datetime(&naive).single() {
                return dt.timestamp_millis();
            }
        }
    }

    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_remote_date_handles_plain_dates() {
        assert_eq!(parse_remote_date_ms("2026-01-01"), 1_767_225_600_000);
        assert_eq!(parse_remote_date_ms(" 2026-01-01 "), 1_767_225_600_000);
    }

    #[test]
    fn parse_remote_date_handles_rfc3339() {
        assert_eq!(
            parse_remote_date_ms("2026-01-01T00:00:30.000Z"),
            1_767_225_630_000
        );
    }

    #[test]
    fn parse_remote_date_falls_back_to_now() {
        let before = Utc::now().timestamp_millis();
        let parsed = parse_remote_date_ms("not-a-date");
        let after = Utc::now().timestamp_millis();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn retry_class_for_transport_error_is_retryable() {
        assert_eq!(
            GatewayError::transport("connection refused").retry_class(),
            SyncRetryClass::Retryable
        );
    }

    #[test]
    fn retry_class_for_contract_violation_is_permanent() {
        assert_eq!(
            GatewayError::contract("missing id").retry_class(),
            SyncRetryClass::Permanent
        );
    }

    #[test]
    fn retry_class_for_server_errors_is_retryable() {
        assert_eq!(
            GatewayError::api(503, "unavailable").retry_class(),
            SyncRetryClass::Retryable
        );
        assert_eq!(GatewayError::api(503, "unavailable").status_code(), Some(503));
    }
}
