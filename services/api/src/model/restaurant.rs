//! Restaurant records.
//!
//! Deliberately slim: restaurants exist so orders have somewhere to go and
//! owners have something to subscribe on; full menu management is out of
//! scope for this service.
use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(SimpleObject, Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub cover_img: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}
