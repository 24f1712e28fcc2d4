//! Daily saved-search digest.
//!
//! For every user with due saved searches, each followed building is
//! re-queried on both the active and the sold feed for listings modified
//! since the search's window start (24 hours, or 7 days for weekly
//! searches, reaching back to the last notice if that is older). Matches are deduplicated per user, rendered into a
//! single email grouped by building, and sent. Nothing short of missing
//! configuration aborts a run: bad addresses, failed queries and failed
//! sends are itemised in [`DigestStats`] and the loop moves on.

pub mod dedup;
pub mod template;

use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{DigestRun, DigestStats, EmailFailure, FailedQuery, SavedSearch, SkippedAddress, User};
use crate::services::address::parse_street_address;
use crate::services::email::OutgoingEmail;
use crate::services::listings;
use crate::services::mls::MlsResource;
use crate::state::AppState;

use dedup::{Insert, ListingSet};

const FEEDS: [MlsResource; 2] = [MlsResource::Property, MlsResource::PropertySold];

pub async fn run_saved_search_digest(
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<DigestStats, AppError> {
    state.config.require_digest_settings()?;

    let timer = Instant::now();
    let mut stats = DigestStats::default();

    let due = {
        let db = state.conn();
        queries::due_saved_searches(&db, &now.naive_utc())?
    };

    tracing::info!(users = due.len(), "starting saved-search digest");

    for (user, searches) in &due {
        stats.users_processed += 1;

        let (listings, failed) = collect_for_user(state, user, searches, now, &mut stats).await;
        // Searches whose query failed keep their window for the next run.
        let ids: Vec<i64> = searches
            .iter()
            .map(|s| s.id)
            .filter(|id| !failed.contains(id))
            .collect();

        if listings.is_empty() {
            stats.users_without_matches += 1;
            mark_notified(state, user, &ids, now);
            continue;
        }
        stats.listings_found += listings.len();

        let rendered = template::render_digest(user, &listings, &state.config.site_url, now);
        let email = OutgoingEmail {
            from: state.config.email_from.clone(),
            to: vec![user.email.clone()],
            subject: rendered.subject,
            html: rendered.html,
        };

        match state.mailer.send(&email).await {
            Ok(()) => {
                stats.emails_sent += 1;
                tracing::info!(user_id = %user.id, listings = listings.len(), "digest email sent");
                mark_notified(state, user, &ids, now);
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "failed to send digest email");
                stats.email_errors.push(EmailFailure {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    stats.duration_ms = timer.elapsed().as_millis() as u64;

    tracing::info!(
        users = stats.users_processed,
        searches = stats.searches_processed,
        listings = stats.listings_found,
        emails = stats.emails_sent,
        failed_queries = stats.failed_queries.len(),
        email_errors = stats.email_errors.len(),
        duration_ms = stats.duration_ms,
        "saved-search digest finished"
    );

    record_run(state, now, &stats);
    Ok(stats)
}

async fn collect_for_user(
    state: &AppState,
    user: &User,
    searches: &[SavedSearch],
    now: DateTime<Utc>,
    stats: &mut DigestStats,
) -> (ListingSet, Vec<i64>) {
    let mut set = ListingSet::new();
    let mut failed = vec![];

    for search in searches {
        stats.searches_processed += 1;

        let address = match parse_street_address(&search.address) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(user_id = %user.id, address = %search.address, error = %e, "skipping unparseable address");
                stats.skipped_addresses.push(SkippedAddress {
                    user_id: user.id.clone(),
                    address: search.address.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let since = Utc.from_utc_datetime(&search.window_start(now.naive_utc()));
        let building = search.address_key.clone();

        for resource in FEEDS {
            let found = match listings::modified_since(&state.mls, resource, &address, since).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::error!(
                        user_id = %user.id,
                        address = %search.address,
                        resource = resource.as_str(),
                        error = %e,
                        "digest query failed"
                    );
                    stats.failed_queries.push(FailedQuery {
                        user_id: user.id.clone(),
                        address: search.address.clone(),
                        resource: resource.as_str().to_string(),
                        error: e.to_string(),
                    });
                    if !failed.contains(&search.id) {
                        failed.push(search.id);
                    }
                    continue;
                }
            };

            let from_sold_feed = resource == MlsResource::PropertySold;
            for listing in found {
                if !listing.has_required_fields() {
                    stats.incomplete_listings += 1;
                    continue;
                }
                let category = listing.category(from_sold_feed);
                match set.insert(&building, listing, category) {
                    Insert::Added => {}
                    Insert::Upgraded | Insert::Duplicate => stats.duplicates_removed += 1,
                }
            }
        }
    }

    (set, failed)
}

fn mark_notified(state: &AppState, user: &User, ids: &[i64], now: DateTime<Utc>) {
    if ids.is_empty() {
        return;
    }
    let db = state.conn();
    if let Err(e) = queries::mark_notified(&db, ids, &now.naive_utc()) {
        tracing::error!(user_id = %user.id, error = %e, "failed to mark saved searches notified");
    }
}

fn record_run(state: &AppState, started_at: DateTime<Utc>, stats: &DigestStats) {
    let run = DigestRun {
        id: uuid::Uuid::new_v4().to_string(),
        started_at,
        finished_at: Utc::now(),
        success: !stats.has_failures(),
        stats: stats.clone(),
    };

    let db = state.conn();
    if let Err(e) = queries::insert_digest_run(&db, &run) {
        tracing::error!(error = %e, "failed to record digest run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::Frequency;
    use crate::services::email::EmailProvider;
    use crate::services::mls::{MlsClient, MlsError, MlsTokens, MlsTransport, RetryPolicy};
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::{Arc, Mutex};

    // Records every request. On the active feed, queries for `failing` get a
    // 503 and queries for `matching` get one listing. Everything else is empty.
    struct Feed {
        urls: Arc<Mutex<Vec<String>>>,
        failing: Option<&'static str>,
        matching: Option<&'static str>,
    }

    #[async_trait]
    impl MlsTransport for Feed {
        async fn get_json(&self, url: &str, _bearer: &str) -> Result<serde_json::Value, MlsError> {
            self.urls.lock().unwrap().push(url.to_string());
            let filter = decoded_filters(&[url.to_string()]).pop().unwrap_or_default();
            let street = |n: &str| filter.contains(&format!("StreetNumber eq '{n}'"));
            let active_feed = url.contains("/odata/Property?");

            if active_feed && self.failing.is_some_and(street) {
                return Err(MlsError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            if active_feed && self.matching.is_some_and(street) {
                return Ok(serde_json::json!({ "value": [{
                    "ListingKey": "K1",
                    "UnparsedAddress": "100 Harbour St #1204",
                    "ListPrice": 900000.0,
                    "StandardStatus": "Active",
                }] }));
            }
            Ok(serde_json::json!({ "value": [] }))
        }
    }

    struct Outbox {
        sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    }

    #[async_trait]
    impl EmailProvider for Outbox {
        async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: ":memory:".into(),
            admin_token: String::new(),
            api_token: String::new(),
            cron_secret: String::new(),
            site_url: "https://condos.test".into(),
            mls_base_url: "https://mls.test".into(),
            mls_property_token: "p".into(),
            mls_media_token: "m".into(),
            mls_sold_token: "s".into(),
            mls_max_retries: 0,
            mls_base_delay_ms: 0,
            mls_max_delay_ms: 0,
            mls_jitter_ms: 0,
            email_api_url: "https://mail.test".into(),
            email_api_key: "k".into(),
            email_from: "digest@condos.test".into(),
        }
    }

    fn state(feed: Feed, sent: Arc<Mutex<Vec<OutgoingEmail>>>) -> AppState {
        let config = config();
        let mls = MlsClient::new(
            Box::new(feed),
            config.mls_base_url.clone(),
            MlsTokens::from_config(&config),
            RetryPolicy::none(),
        );
        AppState {
            db: Arc::new(Mutex::new(db::init_db(":memory:").unwrap())),
            config,
            mls,
            mailer: Box::new(Outbox { sent }),
        }
    }

    fn quiet_state(urls: Arc<Mutex<Vec<String>>>) -> AppState {
        let feed = Feed {
            urls,
            failing: None,
            matching: None,
        };
        state(feed, Arc::new(Mutex::new(vec![])))
    }

    // Subscribes u1 to each address and returns the search ids in order.
    fn follow(state: &AppState, addresses: &[&str], frequency: Frequency) -> Vec<i64> {
        let db = state.conn();
        queries::upsert_user(
            &db,
            &User { id: "u1".into(), email: "a@example.com".into(), name: None },
        )
        .unwrap();
        addresses
            .iter()
            .map(|a| queries::subscribe(&db, "u1", a, frequency, true).unwrap().id)
            .collect()
    }

    fn last_notified(state: &AppState) -> Vec<(String, Option<NaiveDateTime>)> {
        queries::list_saved_searches(&state.conn(), "u1")
            .unwrap()
            .into_iter()
            .map(|s| (s.address, s.last_notified_at))
            .collect()
    }

    fn decoded_filters(urls: &[String]) -> Vec<String> {
        urls.iter()
            .filter_map(|u| {
                url::Url::parse(u)
                    .ok()?
                    .query_pairs()
                    .find(|(k, _)| k == "$filter")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_weekly_search_looks_back_seven_days() {
        let urls = Arc::new(Mutex::new(vec![]));
        let state = quiet_state(Arc::clone(&urls));
        follow(&state, &["100 Harbour St"], Frequency::Weekly);

        let now = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        let stats = run_saved_search_digest(&state, now).await.unwrap();

        assert_eq!(stats.users_processed, 1);
        assert_eq!(stats.users_without_matches, 1);
        assert_eq!(stats.emails_sent, 0);
        assert!(!stats.has_failures());

        let filters = decoded_filters(&urls.lock().unwrap());
        assert_eq!(filters.len(), FEEDS.len());
        assert!(filters
            .iter()
            .all(|f| f.contains("ModificationTimestamp ge 2026-10-10T08:00:00Z")));
    }

    #[tokio::test]
    async fn test_quiet_window_marks_searches_notified() {
        let state = quiet_state(Arc::new(Mutex::new(vec![])));
        follow(&state, &["100 Harbour St"], Frequency::Weekly);

        let now = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        run_saved_search_digest(&state, now).await.unwrap();

        // Not due again until a week has passed.
        let again = run_saved_search_digest(&state, now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(again.users_processed, 0);
    }

    #[tokio::test]
    async fn test_failed_search_is_not_marked_notified_when_email_goes_out() {
        let sent = Arc::new(Mutex::new(vec![]));
        let feed = Feed {
            urls: Arc::new(Mutex::new(vec![])),
            failing: Some("8"),
            matching: Some("100"),
        };
        let state = state(feed, Arc::clone(&sent));
        follow(&state, &["100 Harbour St", "8 Mercer St"], Frequency::Weekly);

        let now = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        let stats = run_saved_search_digest(&state, now).await.unwrap();

        assert_eq!(stats.failed_queries.len(), 1);
        assert_eq!(stats.emails_sent, 1);
        assert_eq!(sent.lock().unwrap().len(), 1);

        let notified = last_notified(&state);
        assert_eq!(notified[0], ("100 Harbour St".to_string(), Some(now.naive_utc())));
        assert_eq!(notified[1], ("8 Mercer St".to_string(), None));

        // The failed search is retried on the next run; the delivered one waits a week.
        let next = run_saved_search_digest(&state, now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(next.users_processed, 1);
        assert_eq!(next.searches_processed, 1);
    }

    #[tokio::test]
    async fn test_early_weekly_run_covers_whole_window() {
        let urls = Arc::new(Mutex::new(vec![]));
        let state = quiet_state(Arc::clone(&urls));
        let ids = follow(&state, &["100 Harbour St"], Frequency::Weekly);
        let last = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 5).unwrap();
        queries::mark_notified(&state.conn(), &ids, &last.naive_utc()).unwrap();

        // Scheduler fires five seconds before the week is up.
        let now = Utc.with_ymd_and_hms(2026, 10, 8, 8, 0, 0).unwrap();
        let stats = run_saved_search_digest(&state, now).await.unwrap();
        assert_eq!(stats.users_processed, 1);

        let filters = decoded_filters(&urls.lock().unwrap());
        assert!(filters
            .iter()
            .all(|f| f.contains("ModificationTimestamp ge 2026-10-01T08:00:00Z")));
    }

    #[tokio::test]
    async fn test_late_run_reaches_back_to_last_notice() {
        let urls = Arc::new(Mutex::new(vec![]));
        let state = quiet_state(Arc::clone(&urls));
        let ids = follow(&state, &["100 Harbour St"], Frequency::Weekly);
        let last = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 5).unwrap();
        queries::mark_notified(&state.conn(), &ids, &last.naive_utc()).unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 10, 8, 0, 0).unwrap();
        run_saved_search_digest(&state, now).await.unwrap();

        let filters = decoded_filters(&urls.lock().unwrap());
        assert_eq!(filters.len(), FEEDS.len());
        assert!(filters
            .iter()
            .all(|f| f.contains("ModificationTimestamp ge 2026-10-01T08:00:05Z")));
    }
}
