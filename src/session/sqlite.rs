// src/session/sqlite.rs — SQLite turn-log operations
//
// Turns are ordered by an autoincrement `seq`, so chronological order is the
// storage order. Expiry lives on the `turn_logs` row and is checked on every
// access; expired logs are dropped lazily or by `sweep_expired`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{SessionKey, TtlPolicy, Turn, TurnMatcher, TurnTtl};
use crate::infra::errors::TripwiseError;

/// Synchronous SQLite store for turn logs. Owned by the store server task.
pub struct TurnStore {
    conn: Connection,
    ttl: TtlPolicy,
}

/// A row as stored, before validation.
struct RawTurn {
    seq: i64,
    id: Option<String>,
    role: Option<String>,
    content: Option<String>,
    created_at: Option<String>,
}

impl RawTurn {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: text(row, 1),
            role: text(row, 2),
            content: text(row, 3),
            created_at: text(row, 4),
        })
    }

    /// `None` when any column is missing or does not parse.
    fn decode(self) -> Option<Turn> {
        let role = self.role?.parse().ok()?;
        let timestamp = DateTime::parse_from_rfc3339(self.created_at.as_deref()?)
            .ok()?
            .with_timezone(&Utc);
        Some(Turn {
            id: self.id?,
            role,
            content: self.content?,
            timestamp,
        })
    }
}

fn text(row: &Row<'_>, idx: usize) -> Option<String> {
    row.get_ref(idx).ok()?.as_str().ok().map(str::to_string)
}

const SELECT_TURNS: &str = "SELECT seq, id, role, content, created_at FROM turns
     WHERE user_id = ?1 AND session_id = ?2 ORDER BY seq ASC";

impl TurnStore {
    pub fn new(conn: Connection, ttl: TtlPolicy) -> Self {
        Self { conn, ttl }
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, ttl: TtlPolicy) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        super::schema::run_migrations(&conn)?;
        Ok(Self::new(conn, ttl))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory(ttl: TtlPolicy) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        super::schema::run_migrations(&conn)?;
        Ok(Self::new(conn, ttl))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn ttl(&self) -> TtlPolicy {
        self.ttl
    }

    fn expiry_after(&self, now: DateTime<Utc>, ttl: TurnTtl) -> i64 {
        now.timestamp_millis() + self.ttl.duration(ttl).as_millis() as i64
    }

    // -- Append --

    pub fn append(&self, key: &SessionKey, turn: &Turn, ttl: TurnTtl) -> Result<(), TripwiseError> {
        self.append_at(key, turn, ttl, Utc::now())
    }

    pub fn append_at(
        &self,
        key: &SessionKey,
        turn: &Turn,
        ttl: TurnTtl,
        now: DateTime<Utc>,
    ) -> Result<(), TripwiseError> {
        let tx = self.conn.unchecked_transaction()?;

        // An expired log must not come back to life under the new expiry.
        drop_if_expired(&tx, key, now.timestamp_millis())?;

        tx.execute(
            "INSERT INTO turn_logs (user_id, session_id, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, session_id) DO UPDATE SET expires_at = excluded.expires_at",
            params![key.user_id(), key.session_id(), self.expiry_after(now, ttl)],
        )?;
        tx.execute(
            "INSERT INTO turns (id, user_id, session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                turn.id,
                key.user_id(),
                key.session_id(),
                turn.role.as_str(),
                turn.content,
                turn.timestamp.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    // -- Read --

    pub fn read_all(&self, key: &SessionKey) -> Result<Vec<Turn>, TripwiseError> {
        self.read_all_at(key, Utc::now())
    }

    pub fn read_all_at(
        &self,
        key: &SessionKey,
        now: DateTime<Utc>,
    ) -> Result<Vec<Turn>, TripwiseError> {
        match log_expiry(&self.conn, key)? {
            None => return Ok(Vec::new()),
            Some(expires_at) if expires_at <= now.timestamp_millis() => {
                delete_log(&self.conn, key)?;
                return Ok(Vec::new());
            }
            Some(_) => {}
        }

        let mut stmt = self.conn.prepare(SELECT_TURNS)?;
        let rows = stmt.query_map(params![key.user_id(), key.session_id()], RawTurn::from_row)?;

        let mut turns = Vec::new();
        for row in rows {
            let raw = match row {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(session = %key, "Skipping unreadable turn row: {e}");
                    continue;
                }
            };
            let seq = raw.seq;
            match raw.decode() {
                Some(turn) => turns.push(turn),
                None => tracing::warn!(session = %key, seq, "Skipping malformed turn"),
            }
        }
        Ok(turns)
    }

    // -- Purge --

    pub fn purge(&self, key: &SessionKey, matcher: &TurnMatcher) -> Result<usize, TripwiseError> {
        self.purge_at(key, matcher, Utc::now())
    }

    /// Remove matching turns and re-apply the standard TTL, in one transaction.
    pub fn purge_at(
        &self,
        key: &SessionKey,
        matcher: &TurnMatcher,
        now: DateTime<Utc>,
    ) -> Result<usize, TripwiseError> {
        let tx = self.conn.unchecked_transaction()?;

        if drop_if_expired(&tx, key, now.timestamp_millis())? || log_expiry(&tx, key)?.is_none() {
            tx.commit()?;
            return Ok(0);
        }

        let mut doomed = Vec::new();
        let mut survivors = 0usize;
        {
            let mut stmt = tx.prepare(SELECT_TURNS)?;
            let rows =
                stmt.query_map(params![key.user_id(), key.session_id()], RawTurn::from_row)?;
            for row in rows {
                let raw = row?;
                let seq = raw.seq;
                // Undecodable rows cannot match anything and survive untouched.
                match raw.decode() {
                    Some(turn) if matcher.matches(&turn) => doomed.push(seq),
                    _ => survivors += 1,
                }
            }
        }

        for seq in &doomed {
            tx.execute("DELETE FROM turns WHERE seq = ?1", params![seq])?;
        }

        if survivors == 0 {
            delete_log(&tx, key)?;
        } else {
            tx.execute(
                "UPDATE turn_logs SET expires_at = ?1 WHERE user_id = ?2 AND session_id = ?3",
                params![
                    self.expiry_after(now, TurnTtl::Standard),
                    key.user_id(),
                    key.session_id()
                ],
            )?;
        }

        tx.commit()?;
        Ok(doomed.len())
    }

    // -- Maintenance --

    /// Delete every expired log. Returns the number of logs removed.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize, TripwiseError> {
        let now_ms = now.timestamp_millis();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM turns WHERE EXISTS (
                SELECT 1 FROM turn_logs l
                WHERE l.user_id = turns.user_id AND l.session_id = turns.session_id
                  AND l.expires_at <= ?1)",
            params![now_ms],
        )?;
        let removed = tx.execute(
            "DELETE FROM turn_logs WHERE expires_at <= ?1",
            params![now_ms],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn sweep_expired(&self) -> Result<usize, TripwiseError> {
        self.sweep_expired_at(Utc::now())
    }

    /// Expiry of the key's log in unix millis, if the log exists.
    pub fn expires_at(&self, key: &SessionKey) -> Result<Option<i64>, TripwiseError> {
        log_expiry(&self.conn, key)
    }
}

fn log_expiry(conn: &Connection, key: &SessionKey) -> Result<Option<i64>, TripwiseError> {
    let expiry = conn
        .query_row(
            "SELECT expires_at FROM turn_logs WHERE user_id = ?1 AND session_id = ?2",
            params![key.user_id(), key.session_id()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(expiry)
}

fn delete_log(conn: &Connection, key: &SessionKey) -> Result<(), TripwiseError> {
    conn.execute(
        "DELETE FROM turns WHERE user_id = ?1 AND session_id = ?2",
        params![key.user_id(), key.session_id()],
    )?;
    conn.execute(
        "DELETE FROM turn_logs WHERE user_id = ?1 AND session_id = ?2",
        params![key.user_id(), key.session_id()],
    )?;
    Ok(())
}

/// Drop the key's log if it has expired. Returns whether it was dropped.
fn drop_if_expired(conn: &Connection, key: &SessionKey, now_ms: i64) -> Result<bool, TripwiseError> {
    match log_expiry(conn, key)? {
        Some(expires_at) if expires_at <= now_ms => {
            delete_log(conn, key)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
