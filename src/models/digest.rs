use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DigestStats {
    pub users_processed: usize,
    pub searches_processed: usize,
    pub listings_found: usize,
    pub incomplete_listings: usize,
    pub duplicates_removed: usize,
    pub users_without_matches: usize,
    pub emails_sent: usize,
    pub skipped_addresses: Vec<SkippedAddress>,
    pub failed_queries: Vec<FailedQuery>,
    pub email_errors: Vec<EmailFailure>,
    pub duration_ms: u64,
}

impl DigestStats {
    pub fn has_failures(&self) -> bool {
        !self.failed_queries.is_empty() || !self.email_errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAddress {
    pub user_id: String,
    pub address: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedQuery {
    pub user_id: String,
    pub address: String,
    pub resource: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailFailure {
    pub user_id: String,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestReport {
    pub success: bool,
    pub stats: DigestStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub stats: DigestStats,
}
