use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: i64,
    pub user_id: String,
    pub address: String,
    pub address_key: String,
    pub created_at: NaiveDateTime,
    pub active: bool,
    pub frequency: Frequency,
    pub email_enabled: bool,
    pub last_notified_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Never,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Never => "never",
        }
    }

    pub fn lookback(&self) -> Duration {
        match self {
            Frequency::Weekly => Duration::days(7),
            _ => Duration::hours(24),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "weekly" => Frequency::Weekly,
            "never" => Frequency::Never,
            _ => Frequency::Daily,
        }
    }
}

// A scheduler firing a little early still counts as the weekly run.
const DUE_SLACK_MINUTES: i64 = 30;

const MAX_LOOKBACK_DAYS: i64 = 30;

impl SavedSearch {
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        if !self.active || !self.email_enabled {
            return false;
        }
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly => self
                .last_notified_at
                .map(|last| now - last >= Duration::days(7) - Duration::minutes(DUE_SLACK_MINUTES))
                .unwrap_or(true),
            Frequency::Never => false,
        }
    }

    /// Start of the modification window for a run at `now`. Reaches back to
    /// the last notice when that is older than the regular lookback, so a
    /// skipped or failed run leaves no gap, capped at 30 days.
    pub fn window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        let regular = now - self.frequency.lookback();
        match self.last_notified_at {
            Some(last) => last.min(regular).max(now - Duration::days(MAX_LOOKBACK_DAYS)),
            None => regular,
        }
    }
}
