//! Database module - SQLite storage for users, results, measurements and the feed

use anyhow::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use tracing::{debug, info};

mod program;

use crate::feed::{FeedItem, FeedItemType};
use crate::history::{History, HistoryItem};
use crate::sync::{self, CloudProfile, ResultRecord};
use crate::users::{AvatarType, BodyMeasurement, Role, User, UserUpdate};

/// Name of the admin created on first start
const DEFAULT_ADMIN_NAME: &str = "Тренер";

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        info!("Database opened: {}", path);
        Ok(db)
    }

    /// In-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let db = Self { conn: Connection::open_in_memory()? };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                avatar TEXT,
                avatar_type TEXT NOT NULL DEFAULT 'emoji',
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                discipline_slug TEXT NOT NULL,
                value REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                UNIQUE (user_id, discipline_slug, recorded_at)
            );
            CREATE TABLE IF NOT EXISTS measurements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                weight REAL,
                height REAL,
                chest REAL,
                waist REAL,
                hips REAL,
                biceps REAL,
                shoulders REAL,
                glutes REAL
            );
            CREATE TABLE IF NOT EXISTS feed (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                type TEXT NOT NULL,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                text TEXT,
                discipline_slug TEXT,
                value REAL,
                video_url TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_user ON results (user_id, discipline_slug);",
        )?;
        self.conn.execute_batch(program::SCHEMA)?;

        Ok(())
    }

    // === USERS ===

    fn user_from_row(row: &Row) -> rusqlite::Result<User> {
        let role: String = row.get(3)?;
        let avatar: Option<String> = row.get(4)?;
        let avatar_type: Option<String> = row.get(5)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            role: Role::parse(&role).unwrap_or_default(),
            avatar_type: match avatar_type.as_deref() {
                Some("photo") => AvatarType::Photo,
                Some("emoji") => AvatarType::Emoji,
                _ => AvatarType::detect(avatar.as_deref()),
            },
            avatar,
            measurements: vec![],
        })
    }

    /// Add new user
    pub fn add_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, role, avatar, avatar_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.name,
                user.email,
                user.role.as_str(),
                user.avatar,
                user.avatar_type.as_str(),
                format_ts(&Utc::now()),
            ],
        )?;
        for m in &user.measurements {
            self.add_measurement(&user.id, m)?;
        }
        info!("User added: {} ({})", user.name, user.id);
        Ok(())
    }

    /// Get all users in creation order, with measurements
    pub fn get_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, role, avatar, avatar_type FROM users ORDER BY created_at, rowid"
        )?;
        let mut users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for u in &mut users {
            u.measurements = self.get_measurements(&u.id)?;
        }
        Ok(users)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = self.conn
            .query_row(
                "SELECT id, name, email, role, avatar, avatar_type FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?;

        match user {
            Some(mut u) => {
                u.measurements = self.get_measurements(&u.id)?;
                Ok(Some(u))
            }
            None => Ok(None),
        }
    }

    /// Find a user by id or exact name
    pub fn find_user(&self, key: &str) -> Result<Option<User>> {
        if let Some(u) = self.get_user(key)? {
            return Ok(Some(u));
        }
        Ok(self.get_users()?.into_iter().find(|u| u.name == key))
    }

    /// Apply a profile update. Returns false if the user does not exist.
    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<bool> {
        let Some(mut user) = self.get_user(id)? else {
            return Ok(false);
        };
        update.apply(&mut user);
        self.conn.execute(
            "UPDATE users SET name = ?2, role = ?3, avatar = ?4, avatar_type = ?5 WHERE id = ?1",
            params![
                user.id,
                user.name,
                user.role.as_str(),
                user.avatar,
                user.avatar_type.as_str(),
            ],
        )?;
        Ok(true)
    }

    /// Delete a user with all of their results and measurements
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM results WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM measurements WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM feed WHERE user_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;

        if deleted > 0 {
            info!("User deleted: {}", id);
        }
        Ok(deleted > 0)
    }

    /// On an empty database create the first user as admin
    pub fn ensure_admin(&self) -> Result<Vec<User>> {
        let users = self.get_users()?;
        if !users.is_empty() {
            return Ok(users);
        }
        let admin = User::new(DEFAULT_ADMIN_NAME, Role::Admin);
        self.add_user(&admin)?;
        Ok(vec![admin])
    }

    /// Insert or refresh users from cloud profiles (cloud is authoritative)
    pub fn import_profiles(&self, profiles: &[CloudProfile]) -> Result<usize> {
        let mut created = 0;
        for p in profiles {
            let update = UserUpdate {
                name: Some(p.name.clone()),
                avatar: p.avatar.clone(),
                avatar_type: Some(p.avatar_type),
                role: Some(p.role),
            };
            if !self.update_user(&p.id, &update)? {
                let mut user = User::with_id(p.id.clone(), &p.name, p.role);
                user.avatar = p.avatar.clone();
                user.avatar_type = p.avatar_type;
                self.add_user(&user)?;
                created += 1;
            }
        }
        Ok(created)
    }

    // === RESULTS ===

    /// Add new result
    pub fn add_result(&self, user_id: &str, slug: &str, item: &HistoryItem) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO results (user_id, discipline_slug, value, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, slug, item.value, format_ts(&item.timestamp)],
        )?;
        debug!("Result saved: {} {} = {}", user_id, slug, item.value);
        Ok(self.conn.last_insert_rowid())
    }

    fn record_from_row(row: &Row) -> rusqlite::Result<ResultRecord> {
        let recorded_at: String = row.get(4)?;
        Ok(ResultRecord {
            id: Some(row.get::<_, i64>(0)?.to_string()),
            user_id: row.get(1)?,
            discipline_slug: row.get(2)?,
            value: row.get(3)?,
            recorded_at: parse_ts(4, &recorded_at)?,
        })
    }

    /// All results, newest first
    pub fn get_results(&self) -> Result<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, discipline_slug, value, recorded_at FROM results ORDER BY recorded_at DESC"
        )?;
        let records = stmt
            .query_map([], Self::record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// One user's results, newest first
    pub fn get_user_results(&self, user_id: &str) -> Result<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, discipline_slug, value, recorded_at FROM results WHERE user_id = ?1 ORDER BY recorded_at DESC"
        )?;
        let records = stmt
            .query_map(params![user_id], Self::record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Full history store for the engines
    pub fn get_history(&self) -> Result<History> {
        Ok(sync::history_from_records(&self.get_results()?))
    }

    /// Merge remote records into the local store. Returns the number of
    /// results added; records with a known timestamp take the remote value.
    pub fn import_results(&self, records: &[ResultRecord]) -> Result<usize> {
        let local = self.get_history()?;
        let remote = sync::history_from_records(records);
        let merged = sync::merge(&local, &remote);
        let added = merged.len().saturating_sub(local.len());

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO results (user_id, discipline_slug, value, recorded_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, discipline_slug, recorded_at) DO UPDATE SET value = excluded.value"
            )?;
            for r in sync::records_from_history(&merged) {
                stmt.execute(params![r.user_id, r.discipline_slug, r.value, format_ts(&r.recorded_at)])?;
            }
        }
        tx.commit()?;

        info!("Imported {} records, {} new", records.len(), added);
        Ok(added)
    }

    // === MEASUREMENTS ===

    pub fn add_measurement(&self, user_id: &str, m: &BodyMeasurement) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO measurements (user_id, recorded_at, weight, height, chest, waist, hips, biceps, shoulders, glutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user_id,
                format_ts(&m.timestamp),
                m.weight,
                m.height,
                m.chest,
                m.waist,
                m.hips,
                m.biceps,
                m.shoulders,
                m.glutes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Measurements of a user, oldest first
    pub fn get_measurements(&self, user_id: &str) -> Result<Vec<BodyMeasurement>> {
        let mut stmt = self.conn.prepare(
            "SELECT recorded_at, weight, height, chest, waist, hips, biceps, shoulders, glutes
             FROM measurements WHERE user_id = ?1 ORDER BY recorded_at"
        )?;
        let measurements = stmt
            .query_map(params![user_id], |row| {
                let ts: String = row.get(0)?;
                Ok(BodyMeasurement {
                    timestamp: parse_ts(0, &ts)?,
                    weight: row.get(1)?,
                    height: row.get(2)?,
                    chest: row.get(3)?,
                    waist: row.get(4)?,
                    hips: row.get(5)?,
                    biceps: row.get(6)?,
                    shoulders: row.get(7)?,
                    glutes: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(measurements)
    }

    // === FEED ===

    pub fn add_feed_item(&self, item: &FeedItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO feed (id, date, type, user_id, title, text, discipline_slug, value, video_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.date.format("%Y-%m-%d").to_string(),
                item.kind.as_str(),
                item.user_id,
                item.title,
                item.text,
                item.discipline_slug,
                item.value,
                item.video_url,
                format_ts(&item.created_at),
            ],
        )?;
        debug!("Feed item added: {}", item.title);
        Ok(())
    }

    /// Latest feed items, newest first
    pub fn get_feed(&self, limit: usize) -> Result<Vec<FeedItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, type, user_id, title, text, discipline_slug, value, video_url, created_at
             FROM feed ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        )?;
        let items = stmt
            .query_map(params![limit as i64], |row| {
                let date: String = row.get(1)?;
                let kind: String = row.get(2)?;
                let created_at: String = row.get(9)?;
                Ok(FeedItem {
                    id: row.get(0)?,
                    date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?,
                    kind: FeedItemType::parse(&kind).unwrap_or(FeedItemType::Note),
                    user_id: row.get(3)?,
                    title: row.get(4)?,
                    text: row.get(5)?,
                    discipline_slug: row.get(6)?,
                    value: row.get(7)?,
                    video_url: row.get(8)?,
                    created_at: parse_ts(9, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, day, 18, 30, 0).unwrap()
    }

    fn create_record(user: &str, slug: &str, value: f64, day: u32) -> ResultRecord {
        ResultRecord {
            id: None,
            user_id: user.to_string(),
            discipline_slug: slug.to_string(),
            value,
            recorded_at: at(day),
        }
    }

    #[test]
    fn test_ensure_admin_on_empty() {
        let db = Database::open_in_memory().unwrap();
        let users = db.ensure_admin().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Тренер");
        assert!(users[0].is_admin());

        // second call does not create another admin
        assert_eq!(db.ensure_admin().unwrap().len(), 1);
    }

    #[test]
    fn test_user_crud() {
        let db = Database::open_in_memory().unwrap();
        let user = User::with_id("u1", "Атлет", Role::User);
        db.add_user(&user).unwrap();

        assert_eq!(db.get_user("u1").unwrap().unwrap().name, "Атлет");
        assert_eq!(db.find_user("Атлет").unwrap().unwrap().id, "u1");
        assert!(db.get_user("nope").unwrap().is_none());

        let update = UserUpdate { name: Some("Чемпион".to_string()), ..Default::default() };
        assert!(db.update_user("u1", &update).unwrap());
        assert_eq!(db.get_user("u1").unwrap().unwrap().name, "Чемпион");
        assert!(!db.update_user("nope", &update).unwrap());
    }

    #[test]
    fn test_delete_user_cascades() {
        let db = Database::open_in_memory().unwrap();
        db.add_user(&User::with_id("u1", "A", Role::User)).unwrap();
        db.add_user(&User::with_id("u2", "B", Role::User)).unwrap();
        db.add_result("u1", "pullups", &HistoryItem::new(at(1), 10.0)).unwrap();
        db.add_result("u2", "pullups", &HistoryItem::new(at(1), 12.0)).unwrap();
        db.add_measurement("u1", &BodyMeasurement { weight: Some(80.0), timestamp: at(1), ..Default::default() }).unwrap();

        assert!(db.delete_user("u1").unwrap());
        assert!(!db.delete_user("u1").unwrap());

        let history = db.get_history().unwrap();
        assert_eq!(history.len(), 1);
        assert!(db.get_measurements("u1").unwrap().is_empty());
    }

    #[test]
    fn test_results_history() {
        let db = Database::open_in_memory().unwrap();
        db.add_result("u1", "pullups", &HistoryItem::new(at(1), 8.0)).unwrap();
        db.add_result("u1", "pullups", &HistoryItem::new(at(5), 11.0)).unwrap();
        db.add_result("u1", "run_1km", &HistoryItem::new(at(3), 250.0)).unwrap();

        let history = db.get_history().unwrap();
        assert_eq!(history.latest_value("u1", "pullups"), Some(11.0));
        assert_eq!(history.items("u1", "pullups")[0].timestamp, at(1));

        let records = db.get_user_results("u1").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].recorded_at, at(5));
    }

    #[test]
    fn test_import_results_merges() {
        let db = Database::open_in_memory().unwrap();
        db.add_result("u1", "pullups", &HistoryItem::new(at(1), 8.0)).unwrap();

        let remote = vec![
            create_record("u1", "pullups", 9.0, 1),
            create_record("u1", "pullups", 12.0, 4),
            create_record("u2", "dips", 20.0, 2),
        ];
        let added = db.import_results(&remote).unwrap();
        assert_eq!(added, 2);

        let history = db.get_history().unwrap();
        assert_eq!(history.items("u1", "pullups").len(), 2);
        assert_eq!(history.items("u1", "pullups")[0].value, 9.0);
        assert_eq!(history.latest_value("u2", "dips"), Some(20.0));

        // importing the same dump again adds nothing
        assert_eq!(db.import_results(&remote).unwrap(), 0);
        assert_eq!(db.get_history().unwrap().len(), 3);
    }

    #[test]
    fn test_reimport_with_microsecond_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let mut record = create_record("u1", "run_1km", 245.0, 1);
        record.recorded_at = "2025-04-01T12:00:00.123456+00:00".parse().unwrap();
        let export = vec![record];

        assert_eq!(db.import_results(&export).unwrap(), 1);
        assert_eq!(db.import_results(&export).unwrap(), 0);
        assert_eq!(db.import_results(&export).unwrap(), 0);
        assert_eq!(db.get_results().unwrap().len(), 1);
    }

    #[test]
    fn test_import_profiles() {
        let db = Database::open_in_memory().unwrap();
        db.add_user(&User::with_id("u1", "Старое имя", Role::User)).unwrap();

        let profiles = vec![
            CloudProfile { id: "u1".to_string(), name: "Новое имя".to_string(), avatar: None, avatar_type: AvatarType::Emoji, role: Role::Admin },
            CloudProfile { id: "u2".to_string(), name: "Гость".to_string(), avatar: Some("🥷".to_string()), avatar_type: AvatarType::Emoji, role: Role::User },
        ];
        assert_eq!(db.import_profiles(&profiles).unwrap(), 1);

        let u1 = db.get_user("u1").unwrap().unwrap();
        assert_eq!(u1.name, "Новое имя");
        assert!(u1.is_admin());
        assert_eq!(db.get_user("u2").unwrap().unwrap().avatar.as_deref(), Some("🥷"));
    }

    #[test]
    fn test_measurements_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let mut user = User::with_id("u1", "A", Role::User);
        user.measurements = vec![
            BodyMeasurement { weight: Some(82.0), waist: Some(90.0), timestamp: at(10), ..Default::default() },
            BodyMeasurement { weight: Some(83.0), timestamp: at(2), ..Default::default() },
        ];
        db.add_user(&user).unwrap();

        let loaded = db.get_user("u1").unwrap().unwrap();
        assert_eq!(loaded.measurements.len(), 2);
        assert_eq!(loaded.measurements[0].weight, Some(83.0));
        assert_eq!(loaded.latest_measurement().unwrap().waist, Some(90.0));
    }

    #[test]
    fn test_feed_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let older = FeedItem { created_at: at(1), ..FeedItem::note("u1", "Старт сезона", None) };
        let newer = FeedItem::achievement("u2", "Выход силой", "muscle_up", 2.0, "https://video/2");
        let newest = FeedItem { created_at: at(20), ..FeedItem::note("u1", "Итоги", Some("Молодцы".to_string())) };
        db.add_feed_item(&older).unwrap();
        db.add_feed_item(&newest).unwrap();
        db.add_feed_item(&newer).unwrap();

        let feed = db.get_feed(10).unwrap();
        let titles: Vec<&str> = feed.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Выход силой", "Итоги", "Старт сезона"]);
        assert_eq!(feed[0].kind, FeedItemType::VideoAchievement);
        assert_eq!(feed[0].value, Some(2.0));
        assert_eq!(feed[1].text.as_deref(), Some("Молодцы"));

        assert_eq!(db.get_feed(1).unwrap().len(), 1);

        db.add_user(&User::with_id("u1", "A", Role::User)).unwrap();
        db.delete_user("u1").unwrap();
        assert_eq!(db.get_feed(10).unwrap().len(), 1);
    }

    #[test]
    fn test_user_email_stored_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let mut user = User::with_id("u1", "Anna", Role::User);
        user.email = Some("anna@example.com".to_string());
        db.add_user(&user).unwrap();

        let loaded = db.get_user("u1").unwrap().unwrap();
        assert_eq!(loaded.email.as_deref(), Some("anna@example.com"));
    }
}
