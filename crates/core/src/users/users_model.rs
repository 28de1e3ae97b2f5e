//! User profile domain model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Budget applied when the remote profile carries none.
pub fn default_budget_limit() -> Decimal {
    Decimal::new(2_000, 0)
}

/// Derives the local primary key from the account email.
///
/// Single-tenant device cache: one signed-in account, so a normalized email
/// is a stable enough identity.
pub fn user_id_from_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cached profile of the signed-in account. At most one row exists locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub experience_points: i32,
    pub budget_limit: Decimal,
    /// Binary-as-text avatar blob, passed through untouched.
    pub profile_picture: Option<String>,
}
