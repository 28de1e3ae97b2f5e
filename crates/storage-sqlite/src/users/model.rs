//! Database model for the cached user profile.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use spendlog_core::users::UserProfile;
use spendlog_core::{Error, Result};

use crate::errors::StorageError;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserDB {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub experience_points: i32,
    pub budget_limit: String,
    pub profile_picture: Option<String>,
}

impl TryFrom<UserDB> for UserProfile {
    type Error = Error;

    fn try_from(db: UserDB) -> Result<Self> {
        let budget_limit = db.budget_limit.parse().map_err(|_| {
            Error::from(StorageError::Corrupt(format!(
                "Stored budget limit '{}' is not a decimal",
                db.budget_limit
            )))
        })?;
        Ok(UserProfile {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            experience_points: db.experience_points,
            budget_limit,
            profile_picture: db.profile_picture,
        })
    }
}

impl From<UserProfile> for UserDB {
    fn from(user: UserProfile) -> Self {
        UserDB {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            experience_points: user.experience_points,
            budget_limit: user.budget_limit.to_string(),
            profile_picture: user.profile_picture,
        }
    }
}
