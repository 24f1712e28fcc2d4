use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    Agent, AgentBuilding, Building, DigestRun, Favorite, Frequency, NewAgent, SavedSearch, User,
};
use crate::services::address::building_key;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn now_ts() -> String {
    fmt_ts(&Utc::now().naive_utc())
}

// ── Users ──

pub fn upsert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           email = excluded.email,
           name = excluded.name,
           updated_at = datetime('now')",
        params![user.id, user.email, user.name],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Saved Searches ──

const SAVED_SEARCH_COLUMNS: &str = "id, user_id, address, address_key, created_at, active, \
     frequency, email_enabled, last_notified_at";

fn parse_saved_search_row(row: &Row) -> rusqlite::Result<SavedSearch> {
    let created_at: String = row.get(4)?;
    let frequency: String = row.get(6)?;
    let last_notified_at: Option<String> = row.get(8)?;
    Ok(SavedSearch {
        id: row.get(0)?,
        user_id: row.get(1)?,
        address: row.get(2)?,
        address_key: row.get(3)?,
        created_at: parse_ts(4, &created_at)?,
        active: row.get::<_, i32>(5)? != 0,
        frequency: Frequency::parse(&frequency),
        email_enabled: row.get::<_, i32>(7)? != 0,
        last_notified_at: last_notified_at
            .as_deref()
            .map(|ts| parse_ts(8, ts))
            .transpose()?,
    })
}

// Subscribing to a building the user already follows, however the address is
// spelled or structured, reactivates the existing row instead of creating a
// second one. The latest raw address replaces the stored one.
pub fn subscribe(
    conn: &Connection,
    user_id: &str,
    address: &str,
    frequency: Frequency,
    email_enabled: bool,
) -> anyhow::Result<SavedSearch> {
    let address = address.trim();
    let key = building_key(address).context("address has no street line")?;
    conn.execute(
        "INSERT INTO saved_searches (user_id, address, address_key, frequency, email_enabled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, address_key) DO UPDATE SET
           address = excluded.address,
           active = 1,
           frequency = excluded.frequency,
           email_enabled = excluded.email_enabled",
        params![user_id, address, key, frequency.as_str(), email_enabled as i32, now_ts()],
    )?;

    let search = conn.query_row(
        &format!(
            "SELECT {SAVED_SEARCH_COLUMNS} FROM saved_searches WHERE user_id = ?1 AND address_key = ?2"
        ),
        params![user_id, key],
        parse_saved_search_row,
    )?;
    Ok(search)
}

pub fn unsubscribe(conn: &Connection, user_id: &str, address: &str) -> anyhow::Result<bool> {
    let Some(key) = building_key(address) else {
        return Ok(false);
    };
    let count = conn.execute(
        "UPDATE saved_searches SET active = 0 WHERE user_id = ?1 AND address_key = ?2 AND active = 1",
        params![user_id, key],
    )?;
    Ok(count > 0)
}

pub fn list_saved_searches(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<SavedSearch>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAVED_SEARCH_COLUMNS} FROM saved_searches
         WHERE user_id = ?1 AND active = 1 ORDER BY created_at ASC, id ASC"
    ))?;

    let rows = stmt.query_map(params![user_id], parse_saved_search_row)?;

    let mut searches = vec![];
    for row in rows {
        searches.push(row?);
    }
    Ok(searches)
}

// Users with at least one saved search due at `now`, each with their due
// searches, ordered by user id then search id.
pub fn due_saved_searches(
    conn: &Connection,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<(User, Vec<SavedSearch>)>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.user_id, s.address, s.address_key, s.created_at, s.active, s.frequency,
                s.email_enabled, s.last_notified_at, u.email, u.name
         FROM saved_searches s
         INNER JOIN users u ON u.id = s.user_id
         WHERE s.active = 1 AND s.email_enabled = 1 AND s.frequency != 'never'
         ORDER BY s.user_id ASC, s.id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let search = parse_saved_search_row(row)?;
        let user = User {
            id: search.user_id.clone(),
            email: row.get(9)?,
            name: row.get(10)?,
        };
        Ok((user, search))
    })?;

    let mut grouped: Vec<(User, Vec<SavedSearch>)> = vec![];
    for row in rows {
        let (user, search) = row?;
        if !search.is_due(*now) {
            continue;
        }
        match grouped.last_mut() {
            Some((last, searches)) if last.id == user.id => searches.push(search),
            _ => grouped.push((user, vec![search])),
        }
    }
    Ok(grouped)
}

pub fn mark_notified(conn: &Connection, ids: &[i64], at: &NaiveDateTime) -> anyhow::Result<()> {
    let at = fmt_ts(at);
    let mut stmt = conn.prepare("UPDATE saved_searches SET last_notified_at = ?1 WHERE id = ?2")?;
    for id in ids {
        stmt.execute(params![at, id])?;
    }
    Ok(())
}

// ── Buildings ──

fn parse_building_row(row: &Row) -> rusqlite::Result<Building> {
    Ok(Building {
        address: row.get(0)?,
        name: row.get(1)?,
        neighborhood: row.get(2)?,
        city: row.get(3)?,
        postal_code: row.get(4)?,
        year_built: row.get(5)?,
        floors: row.get(6)?,
        units: row.get(7)?,
    })
}

pub fn upsert_building(conn: &Connection, building: &Building) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO buildings (address, name, neighborhood, city, postal_code, year_built, floors, units)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(address) DO UPDATE SET
           name = excluded.name,
           neighborhood = excluded.neighborhood,
           city = excluded.city,
           postal_code = excluded.postal_code,
           year_built = excluded.year_built,
           floors = excluded.floors,
           units = excluded.units,
           updated_at = datetime('now')",
        params![
            building.address.trim(),
            building.name,
            building.neighborhood,
            building.city,
            building.postal_code,
            building.year_built,
            building.floors,
            building.units,
        ],
    )?;
    Ok(())
}

pub fn get_building(conn: &Connection, address: &str) -> anyhow::Result<Option<Building>> {
    let building = conn
        .query_row(
            "SELECT address, name, neighborhood, city, postal_code, year_built, floors, units
             FROM buildings WHERE address = ?1",
            params![address.trim()],
            parse_building_row,
        )
        .optional()?;
    Ok(building)
}

pub fn list_buildings(conn: &Connection) -> anyhow::Result<Vec<Building>> {
    let mut stmt = conn.prepare(
        "SELECT address, name, neighborhood, city, postal_code, year_built, floors, units
         FROM buildings ORDER BY address ASC",
    )?;
    let rows = stmt.query_map([], parse_building_row)?;

    let mut buildings = vec![];
    for row in rows {
        buildings.push(row?);
    }
    Ok(buildings)
}

// ── Agents ──

fn parse_agent_row(row: &Row) -> rusqlite::Result<Agent> {
    let created_at: String = row.get(5)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        company: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

pub fn create_agent(conn: &Connection, agent: &NewAgent) -> anyhow::Result<Agent> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO agents (id, name, email, phone, company, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            agent.name.trim(),
            agent.email.trim(),
            agent.phone,
            agent.company,
            now_ts(),
        ],
    )?;

    get_agent(conn, &id)?.context("agent missing after insert")
}

pub fn get_agent(conn: &Connection, id: &str) -> anyhow::Result<Option<Agent>> {
    let agent = conn
        .query_row(
            "SELECT id, name, email, phone, company, created_at FROM agents WHERE id = ?1",
            params![id],
            parse_agent_row,
        )
        .optional()?;
    Ok(agent)
}

pub fn list_agents(conn: &Connection) -> anyhow::Result<Vec<Agent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, phone, company, created_at FROM agents ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], parse_agent_row)?;

    let mut agents = vec![];
    for row in rows {
        agents.push(row?);
    }
    Ok(agents)
}

// Returns false when the agent already holds this building.
pub fn assign_building(conn: &Connection, agent_id: &str, address: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT INTO agent_buildings (agent_id, building_address, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(agent_id, building_address) DO NOTHING",
        params![agent_id, address.trim(), now_ts()],
    )?;
    Ok(count > 0)
}

pub fn unassign_building(conn: &Connection, agent_id: &str, address: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM agent_buildings WHERE agent_id = ?1 AND building_address = ?2",
        params![agent_id, address.trim()],
    )?;
    Ok(count > 0)
}

pub fn buildings_for_agent(conn: &Connection, agent_id: &str) -> anyhow::Result<Vec<AgentBuilding>> {
    let mut stmt = conn.prepare(
        "SELECT agent_id, building_address, created_at FROM agent_buildings
         WHERE agent_id = ?1 ORDER BY building_address ASC",
    )?;
    let rows = stmt.query_map(params![agent_id], |row| {
        let created_at: String = row.get(2)?;
        Ok(AgentBuilding {
            agent_id: row.get(0)?,
            building_address: row.get(1)?,
            created_at: parse_ts(2, &created_at)?,
        })
    })?;

    let mut assignments = vec![];
    for row in rows {
        assignments.push(row?);
    }
    Ok(assignments)
}

pub fn agents_for_building(conn: &Connection, address: &str) -> anyhow::Result<Vec<Agent>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, a.email, a.phone, a.company, a.created_at
         FROM agents a
         INNER JOIN agent_buildings ab ON ab.agent_id = a.id
         WHERE ab.building_address = ?1
         ORDER BY ab.created_at ASC, a.name ASC",
    )?;
    let rows = stmt.query_map(params![address.trim()], parse_agent_row)?;

    let mut agents = vec![];
    for row in rows {
        agents.push(row?);
    }
    Ok(agents)
}

// ── Favorites ──

fn parse_favorite_row(row: &Row) -> rusqlite::Result<Favorite> {
    let created_at: String = row.get(3)?;
    Ok(Favorite {
        listing_key: row.get(0)?,
        address: row.get(1)?,
        note: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
    })
}

pub fn is_favorite(conn: &Connection, user_id: &str, listing_key: &str) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM favorites WHERE user_id = ?1 AND listing_key = ?2",
        params![user_id, listing_key],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn set_favorite(
    conn: &Connection,
    user_id: &str,
    listing_key: &str,
    favorited: bool,
    address: Option<&str>,
    note: Option<&str>,
) -> anyhow::Result<()> {
    if favorited {
        conn.execute(
            "INSERT INTO favorites (user_id, listing_key, address, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, listing_key) DO UPDATE SET
               address = COALESCE(excluded.address, favorites.address),
               note = COALESCE(excluded.note, favorites.note)",
            params![user_id, listing_key, address, note, now_ts()],
        )?;
    } else {
        conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND listing_key = ?2",
            params![user_id, listing_key],
        )?;
    }
    Ok(())
}

// Returns whether the listing is a favorite after the toggle.
pub fn toggle_favorite(
    conn: &Connection,
    user_id: &str,
    listing_key: &str,
    address: Option<&str>,
    note: Option<&str>,
) -> anyhow::Result<bool> {
    let now_favorited = !is_favorite(conn, user_id, listing_key)?;
    set_favorite(conn, user_id, listing_key, now_favorited, address, note)?;
    Ok(now_favorited)
}

pub fn update_favorite_note(
    conn: &Connection,
    user_id: &str,
    listing_key: &str,
    note: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE favorites SET note = ?1 WHERE user_id = ?2 AND listing_key = ?3",
        params![note, user_id, listing_key],
    )?;
    Ok(count > 0)
}

pub fn list_favorites(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Favorite>> {
    let mut stmt = conn.prepare(
        "SELECT listing_key, address, note, created_at FROM favorites
         WHERE user_id = ?1 ORDER BY created_at DESC, listing_key ASC",
    )?;
    let rows = stmt.query_map(params![user_id], parse_favorite_row)?;

    let mut favorites = vec![];
    for row in rows {
        favorites.push(row?);
    }
    Ok(favorites)
}

// ── Digest Runs ──

pub fn insert_digest_run(conn: &Connection, run: &DigestRun) -> anyhow::Result<()> {
    let stats = serde_json::to_string(&run.stats)?;
    conn.execute(
        "INSERT INTO digest_runs (id, started_at, finished_at, success, stats)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run.id,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            run.success as i32,
            stats,
        ],
    )?;
    Ok(())
}

pub fn recent_digest_runs(conn: &Connection, limit: i64) -> anyhow::Result<Vec<DigestRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, success, stats FROM digest_runs
         ORDER BY started_at DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut runs = vec![];
    for row in rows {
        let (id, started_at, finished_at, success, stats) = row?;
        runs.push(DigestRun {
            started_at: parse_rfc3339(&started_at)
                .with_context(|| format!("bad started_at on digest run {id}"))?,
            finished_at: parse_rfc3339(&finished_at)
                .with_context(|| format!("bad finished_at on digest run {id}"))?,
            success: success != 0,
            stats: serde_json::from_str(&stats)
                .with_context(|| format!("bad stats on digest run {id}"))?,
            id,
        });
    }
    Ok(runs)
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DigestStats;
    use crate::db;
    use chrono::Duration;

    fn conn_with_user(id: &str) -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        upsert_user(
            &conn,
            &User {
                id: id.to_string(),
                email: format!("{id}@example.test"),
                name: None,
            },
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_upsert_user_updates_email() {
        let conn = conn_with_user("u1");
        upsert_user(
            &conn,
            &User {
                id: "u1".into(),
                email: "new@example.test".into(),
                name: Some("Sam".into()),
            },
        )
        .unwrap();
        let user = get_user(&conn, "u1").unwrap().unwrap();
        assert_eq!(user.email, "new@example.test");
        assert_eq!(user.name.as_deref(), Some("Sam"));
        assert!(get_user(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_saved_search_unique_per_user_and_building() {
        let conn = conn_with_user("u1");
        let first = subscribe(&conn, "u1", "100 Harbour St", Frequency::Daily, true).unwrap();
        let again = subscribe(&conn, "u1", " 100 HARBOUR ST ", Frequency::Weekly, true).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.frequency, Frequency::Weekly);
        assert_eq!(list_saved_searches(&conn, "u1").unwrap().len(), 1);
    }

    #[test]
    fn test_structured_and_plain_address_are_one_building() {
        let conn = conn_with_user("u1");
        let structured =
            subscribe(&conn, "u1", r#"{"address":"100 Harbour St"}"#, Frequency::Daily, true).unwrap();
        let plain = subscribe(&conn, "u1", "100 Harbour St, Toronto", Frequency::Daily, true).unwrap();

        assert_eq!(structured.id, plain.id);
        assert_eq!(plain.address_key, "100 Harbour St");
        assert_eq!(plain.address, "100 Harbour St, Toronto");
        assert_eq!(list_saved_searches(&conn, "u1").unwrap().len(), 1);

        subscribe(&conn, "u1", r#"{"streetNumber":"8","streetName":"Mercer St"}"#, Frequency::Daily, true)
            .unwrap();
        assert!(unsubscribe(&conn, "u1", "8 mercer st").unwrap());
        assert!(unsubscribe(&conn, "u1", r#"{"address":"100 Harbour St"}"#).unwrap());
        assert!(list_saved_searches(&conn, "u1").unwrap().is_empty());
        assert!(!unsubscribe(&conn, "u1", "   ").unwrap());
    }

    #[test]
    fn test_subscribe_rejects_blank_address() {
        let conn = conn_with_user("u1");
        assert!(subscribe(&conn, "u1", "  ", Frequency::Daily, true).is_err());
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let conn = conn_with_user("u1");
        subscribe(&conn, "u1", "8 Mercer St", Frequency::Daily, true).unwrap();
        conn.execute("UPDATE saved_searches SET last_notified_at = 'yesterday'", [])
            .unwrap();

        assert!(list_saved_searches(&conn, "u1").is_err());
    }

    #[test]
    fn test_corrupt_digest_run_is_an_error() {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute(
            "INSERT INTO digest_runs (id, started_at, finished_at, success, stats)
             VALUES ('run-1', '2026-10-17T08:00:00+00:00', '2026-10-17T08:00:05+00:00', 1, 'not json')",
            [],
        )
        .unwrap();

        let err = recent_digest_runs(&conn, 10).unwrap_err();
        assert!(err.to_string().contains("run-1"));
    }

    #[test]
    fn test_unsubscribe_then_resubscribe() {
        let conn = conn_with_user("u1");
        subscribe(&conn, "u1", "8 Mercer St", Frequency::Daily, true).unwrap();

        assert!(unsubscribe(&conn, "u1", "8 Mercer St").unwrap());
        assert!(!unsubscribe(&conn, "u1", "8 Mercer St").unwrap());
        assert!(list_saved_searches(&conn, "u1").unwrap().is_empty());

        let back = subscribe(&conn, "u1", "8 Mercer St", Frequency::Daily, true).unwrap();
        assert!(back.active);
        assert_eq!(list_saved_searches(&conn, "u1").unwrap().len(), 1);
    }

    #[test]
    fn test_due_saved_searches_grouped_by_user() {
        let conn = conn_with_user("u1");
        upsert_user(
            &conn,
            &User {
                id: "u2".into(),
                email: "u2@example.test".into(),
                name: None,
            },
        )
        .unwrap();

        subscribe(&conn, "u1", "100 Harbour St", Frequency::Daily, true).unwrap();
        subscribe(&conn, "u1", "8 Mercer St", Frequency::Daily, true).unwrap();
        subscribe(&conn, "u1", "1 Bloor St E", Frequency::Daily, false).unwrap();
        subscribe(&conn, "u2", "100 Harbour St", Frequency::Never, true).unwrap();
        let weekly = subscribe(&conn, "u2", "55 Mercer St", Frequency::Weekly, true).unwrap();

        let now = Utc::now().naive_utc();
        let due = due_saved_searches(&conn, &now).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].0.id, "u1");
        assert_eq!(due[0].1.len(), 2);
        assert_eq!(due[1].0.email, "u2@example.test");
        assert_eq!(due[1].1.len(), 1);

        mark_notified(&conn, &[weekly.id], &(now - Duration::days(2))).unwrap();
        let due = due_saved_searches(&conn, &now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0.id, "u1");
    }

    #[test]
    fn test_agent_building_assignment_unique() {
        let conn = db::init_db(":memory:").unwrap();
        let agent = create_agent(
            &conn,
            &NewAgent {
                name: "Priya Shah".into(),
                email: "priya@realty.test".into(),
                phone: Some("416-555-0100".into()),
                company: Some("Harbourfront Realty".into()),
            },
        )
        .unwrap();

        assert!(assign_building(&conn, &agent.id, "100 Harbour St").unwrap());
        assert!(!assign_building(&conn, &agent.id, "100 harbour st").unwrap());
        assert!(assign_building(&conn, &agent.id, "8 Mercer St").unwrap());
        assert_eq!(buildings_for_agent(&conn, &agent.id).unwrap().len(), 2);

        let agents = agents_for_building(&conn, "100 HARBOUR ST").unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Priya Shah");

        assert!(unassign_building(&conn, &agent.id, "8 Mercer St").unwrap());
        assert!(!unassign_building(&conn, &agent.id, "8 Mercer St").unwrap());
    }

    #[test]
    fn test_assign_to_unknown_agent_fails() {
        let conn = db::init_db(":memory:").unwrap();
        assert!(assign_building(&conn, "ghost", "100 Harbour St").is_err());
    }

    #[test]
    fn test_building_upsert() {
        let conn = db::init_db(":memory:").unwrap();
        let mut building = Building {
            address: "100 Harbour St".into(),
            name: Some("Harbour Plaza".into()),
            neighborhood: Some("South Core".into()),
            city: Some("Toronto".into()),
            postal_code: Some("M5J 0B5".into()),
            year_built: Some(2019),
            floors: Some(66),
            units: None,
        };
        upsert_building(&conn, &building).unwrap();
        building.units = Some(1300);
        upsert_building(&conn, &building).unwrap();

        let stored = get_building(&conn, "100 harbour st").unwrap().unwrap();
        assert_eq!(stored.units, Some(1300));
        assert_eq!(list_buildings(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_favorite_toggle_and_set() {
        let conn = conn_with_user("u1");

        assert!(toggle_favorite(&conn, "u1", "K1", Some("100 Harbour St #1201"), None).unwrap());
        assert!(is_favorite(&conn, "u1", "K1").unwrap());
        assert!(!toggle_favorite(&conn, "u1", "K1", None, None).unwrap());
        assert!(!is_favorite(&conn, "u1", "K1").unwrap());

        set_favorite(&conn, "u1", "K2", true, None, Some("corner unit")).unwrap();
        set_favorite(&conn, "u1", "K2", true, Some("8 Mercer St #610"), None).unwrap();
        let favs = list_favorites(&conn, "u1").unwrap();
        assert_eq!(favs.len(), 1);
        assert_eq!(favs[0].note.as_deref(), Some("corner unit"));
        assert_eq!(favs[0].address.as_deref(), Some("8 Mercer St #610"));

        assert!(update_favorite_note(&conn, "u1", "K2", Some("sold?")).unwrap());
        assert!(!update_favorite_note(&conn, "u1", "K9", Some("x")).unwrap());

        set_favorite(&conn, "u1", "K2", false, None, None).unwrap();
        set_favorite(&conn, "u1", "K2", false, None, None).unwrap();
        assert!(list_favorites(&conn, "u1").unwrap().is_empty());
    }

    #[test]
    fn test_digest_run_round_trip() {
        let conn = db::init_db(":memory:").unwrap();
        let stats = DigestStats {
            users_processed: 3,
            emails_sent: 2,
            ..Default::default()
        };
        let now = Utc::now();
        insert_digest_run(
            &conn,
            &DigestRun {
                id: "run-1".into(),
                started_at: now - Duration::seconds(5),
                finished_at: now,
                success: true,
                stats: stats.clone(),
            },
        )
        .unwrap();

        let runs = recent_digest_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].success);
        assert_eq!(runs[0].stats, stats);
    }
}
