use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    pub listing_key: String,
    pub address: Option<String>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}
