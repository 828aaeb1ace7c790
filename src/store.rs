use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app_dirs::AppDirs;
use crate::auth::{validate_registration, User};
use crate::error::{Error, Result};
use crate::history::{page_offset, total_pages, Aggregates, BestResult, HistoryPage, StoredResult, PAGE_SIZE};
use crate::metrics::FinalMetrics;
use crate::session::{Mode, TextSource};

/// Receives finished results for a signed-in user.
pub trait ResultSink {
    fn submit_result(&self, user: &User, metrics: &FinalMetrics) -> Result<()>;
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn submit_result(&self, user: &User, metrics: &FinalMetrics) -> Result<()> {
        (**self).submit_result(user, metrics)
    }
}

/// A sink that may not have been opened; submitting to `None` fails.
impl<S: ResultSink> ResultSink for Option<S> {
    fn submit_result(&self, user: &User, metrics: &FinalMetrics) -> Result<()> {
        match self {
            Some(sink) => sink.submit_result(user, metrics),
            None => Err(Error::StoreUnavailable),
        }
    }
}

/// Reject payloads the results table must never hold.
pub fn validate_submission(metrics: &FinalMetrics) -> Result<()> {
    if metrics.duration_sec == 0 {
        return Err(Error::Validation("durationSec must be positive".into()));
    }
    if metrics.target_value == 0 {
        return Err(Error::Validation("targetValue must be positive".into()));
    }
    if !(0.0..=1.0).contains(&metrics.accuracy) {
        return Err(Error::Validation(format!(
            "accuracy {} is outside 0..1",
            metrics.accuracy
        )));
    }
    if !metrics.wpm.is_finite() || !metrics.raw_wpm.is_finite() {
        return Err(Error::Validation("wpm values must be finite".into()));
    }
    Ok(())
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        name TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS test_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        duration_sec INTEGER NOT NULL,
        mode TEXT NOT NULL,
        target_value INTEGER NOT NULL,
        wpm REAL NOT NULL,
        raw_wpm REAL NOT NULL,
        accuracy REAL NOT NULL,
        backspaces INTEGER NOT NULL,
        errors INTEGER NOT NULL,
        chars_typed INTEGER NOT NULL,
        words_typed INTEGER NOT NULL,
        source TEXT NOT NULL,
        snippet_id TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_test_results_user_created
        ON test_results(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_test_results_user_wpm
        ON test_results(user_id, wpm);
"#;

const RESULT_COLUMNS: &str = "id, user_id, duration_sec, mode, target_value, wpm, raw_wpm, \
     accuracy, backspaces, errors, chars_typed, words_typed, source, snippet_id, created_at";

/// SQLite-backed users and test results
#[derive(Debug)]
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open the store at the default state directory location.
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("typecafe.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening result store");
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create a user after validating the registration fields.
    pub fn register_user(&self, email: &str, name: &str) -> Result<User> {
        validate_registration(email, name).map_err(Error::Validation)?;
        let email = email.trim();

        if self.find_user_by_email(email)?.is_some() {
            return Err(Error::DuplicateEmail);
        }

        let name = name.trim();
        self.conn.execute(
            "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)",
            params![email, name, now_timestamp()],
        )?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            email: email.to_string(),
            name: Some(name.to_string()),
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, email, name FROM users WHERE email = ?1",
                [email.trim()],
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

    /// Look a user up by email, registering them on first use.
    pub fn find_or_register(&self, email: &str, name: &str) -> Result<User> {
        match self.find_user_by_email(email)? {
            Some(user) => Ok(user),
            None => self.register_user(email, name),
        }
    }

    /// Validate and persist one result, returning its row id.
    pub fn insert_result(&self, user: &User, metrics: &FinalMetrics) -> Result<i64> {
        validate_submission(metrics)?;

        self.conn.execute(
            r#"
            INSERT INTO test_results
            (user_id, duration_sec, mode, target_value, wpm, raw_wpm, accuracy,
             backspaces, errors, chars_typed, words_typed, source, snippet_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                user.id,
                metrics.duration_sec,
                metrics.mode.to_string(),
                metrics.target_value,
                metrics.wpm,
                metrics.raw_wpm,
                metrics.accuracy,
                metrics.backspaces,
                metrics.errors,
                metrics.chars_typed,
                metrics.words_typed,
                metrics.source.to_string(),
                metrics.snippet_id,
                now_timestamp(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn count_results(&self, user: &User) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM test_results WHERE user_id = ?1",
            [user.id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// One page of a user's results, newest first. Pages start at 1.
    pub fn history_page(&self, user: &User, page: u32) -> Result<HistoryPage> {
        let page = page.max(1);
        let total_results = self.count_results(user)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM test_results WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let results = stmt
            .query_map(
                params![user.id, PAGE_SIZE, page_offset(page, PAGE_SIZE)],
                stored_result_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(HistoryPage {
            results,
            page,
            page_size: PAGE_SIZE,
            total_results,
            total_pages: total_pages(total_results, PAGE_SIZE),
        })
    }

    /// Every stored result for a user, newest first.
    pub fn all_results(&self, user: &User) -> Result<Vec<StoredResult>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM test_results WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let results = stmt
            .query_map([user.id], stored_result_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    /// Count, best and averages over all of a user's results.
    pub fn aggregates(&self, user: &User) -> Result<Aggregates> {
        let (total, average_wpm, average_accuracy): (i64, Option<f64>, Option<f64>) =
            self.conn.query_row(
                "SELECT COUNT(*), AVG(wpm), AVG(accuracy) FROM test_results WHERE user_id = ?1",
                [user.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let best = self
            .conn
            .query_row(
                r#"
                SELECT wpm, accuracy, mode, target_value, created_at
                FROM test_results
                WHERE user_id = ?1
                ORDER BY wpm DESC, id ASC
                LIMIT 1
                "#,
                [user.id],
                |row| {
                    Ok(BestResult {
                        wpm: row.get(0)?,
                        accuracy: row.get(1)?,
                        mode: mode_from_sql(row, 2)?,
                        target_value: row.get(3)?,
                        created_at: timestamp_from_sql(row, 4)?,
                    })
                },
            )
            .optional()?;

        Ok(Aggregates {
            total_tests: total as u64,
            best,
            average_wpm,
            average_accuracy,
        })
    }

    /// Remove every result for a user
    pub fn clear_results(&self, user: &User) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM test_results WHERE user_id = ?1", [user.id])?)
    }
}

impl ResultSink for ResultStore {
    fn submit_result(&self, user: &User, metrics: &FinalMetrics) -> Result<()> {
        let id = self.insert_result(user, metrics)?;
        debug!(user = user.id, result = id, "result stored");
        Ok(())
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn stored_result_from_row(row: &Row<'_>) -> rusqlite::Result<StoredResult> {
    Ok(StoredResult {
        id: row.get(0)?,
        user_id: row.get(1)?,
        metrics: FinalMetrics {
            duration_sec: row.get(2)?,
            mode: mode_from_sql(row, 3)?,
            target_value: row.get(4)?,
            wpm: row.get(5)?,
            raw_wpm: row.get(6)?,
            accuracy: row.get(7)?,
            backspaces: row.get(8)?,
            errors: row.get(9)?,
            chars_typed: row.get(10)?,
            words_typed: row.get(11)?,
            source: source_from_sql(row, 12)?,
            snippet_id: row.get(13)?,
        },
        created_at: timestamp_from_sql(row, 14)?,
    })
}

fn invalid_text(idx: usize, what: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, what.to_string(), rusqlite::types::Type::Text)
}

fn mode_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<Mode> {
    match row.get::<_, String>(idx)?.as_str() {
        "time" => Ok(Mode::Time),
        "chars" => Ok(Mode::Chars),
        _ => Err(invalid_text(idx, "mode")),
    }
}

fn source_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<TextSource> {
    match row.get::<_, String>(idx)?.as_str() {
        "random" => Ok(TextSource::Random),
        "custom" => Ok(TextSource::Custom),
        _ => Err(invalid_text(idx, "source")),
    }
}

fn timestamp_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Local))
        .map_err(|_| invalid_text(idx, "created_at"))
}
