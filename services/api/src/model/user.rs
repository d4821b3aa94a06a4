//! User accounts and roles.
use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three account roles of the platform. A user holds exactly one.
#[derive(Enum, Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Client,
    Owner,
    Delivery,
}

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    // Never exposed through the schema or the bus.
    #[graphql(skip)]
    #[serde(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
