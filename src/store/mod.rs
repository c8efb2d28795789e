//! Durable result store over an embedded SQLite database
//!
//! One `scans` table keyed by id plus a `findings` table keyed by the owning
//! scan id. Every write is transactional; state transitions are re-validated
//! against the currently persisted state inside the transaction, so a stale
//! writer fails instead of overwriting a newer state. A partial unique index
//! allows at most one Pending or Running row per target, which holds the
//! exclusivity invariant across every process sharing the database file.

use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{Result, ScanError};
use crate::model::{Finding, ScanRecord, ScanState, validate_transition};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scans (
    id          TEXT PRIMARY KEY,
    target      TEXT NOT NULL,
    kind        TEXT NOT NULL,
    state       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    started_at  TEXT,
    finished_at TEXT,
    error       TEXT
);

CREATE INDEX IF NOT EXISTS idx_scans_target ON scans(target);
CREATE INDEX IF NOT EXISTS idx_scans_state ON scans(state);
CREATE UNIQUE INDEX IF NOT EXISTS idx_scans_active_target
    ON scans(target) WHERE state IN ('pending', 'running');

CREATE TABLE IF NOT EXISTS findings (
    id          INTEGER PRIMARY KEY,
    scan_id     TEXT NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    seq         INTEGER NOT NULL,
    severity    TEXT NOT NULL,
    description TEXT NOT NULL,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_findings_scan ON findings(scan_id);
";

/// Transactional persistence for scan records and their findings
pub struct ScanStore {
    conn: Mutex<Connection>,
}

impl ScanStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store, used by tests and throwaway runs.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new record (and any findings it already carries) atomically.
    /// Fails with `DuplicateId` if the id exists and with `AlreadyRunning` if
    /// another record is still active for the same target.
    pub fn create(&self, record: &ScanRecord) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO scans (id, target, kind, state, created_at, started_at, finished_at, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.target,
                record.kind,
                record.state.as_str(),
                record.created_at,
                record.started_at,
                record.finished_at,
                record.error,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_id_conflict(&e) => return Err(ScanError::DuplicateId(record.id)),
            Err(e) if is_active_target_conflict(&e) => {
                return Err(ScanError::AlreadyRunning(record.target.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        insert_findings(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Persist a state transition and, atomically with it, the record's
    /// findings. Fails with `NotFound` for unknown ids and with
    /// `InvalidTransition` if the persisted state does not permit the move.
    pub fn update(&self, record: &ScanRecord) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = match tx.query_row(
            "SELECT state FROM scans WHERE id = ?1",
            params![record.id.to_string()],
            |row| row.get::<_, String>(0),
        ) {
            Ok(state) => state
                .parse::<ScanState>()
                .map_err(|e| decode_error(0, e))?,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(ScanError::NotFound(record.id));
            }
            Err(e) => return Err(e.into()),
        };
        validate_transition(current, record.state)?;

        tx.execute(
            "UPDATE scans SET state = ?2, started_at = ?3, finished_at = ?4, error = ?5
             WHERE id = ?1",
            params![
                record.id.to_string(),
                record.state.as_str(),
                record.started_at,
                record.finished_at,
                record.error,
            ],
        )?;

        insert_findings(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch one record with its findings in insertion order.
    pub fn get(&self, id: Uuid) -> Result<ScanRecord> {
        let conn = self.conn();
        load_record(&conn, id)
    }

    /// All records still holding their registry claim (Pending or Running),
    /// oldest first. Drives startup reconciliation.
    pub fn list_active(&self) -> Result<Vec<ScanRecord>> {
        let conn = self.conn();
        let ids = collect_ids(
            &conn,
            "SELECT id FROM scans WHERE state IN ('pending', 'running') ORDER BY created_at",
        )?;
        ids.into_iter().map(|id| load_record(&conn, id)).collect()
    }

    /// Most recently created records, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<ScanRecord>> {
        // Saturate instead of casting: a wrapped-negative LIMIT would mean
        // "unbounded" to SQLite.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM scans ORDER BY created_at DESC, id LIMIT ?1")?;
        let ids = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        ids.into_iter()
            .map(|id| parse_id(&id).and_then(|id| load_record(&conn, id)))
            .collect()
    }

    /// Total number of records; doubles as the health check.
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the transaction it held has already rolled back.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert_findings(tx: &rusqlite::Transaction<'_>, record: &ScanRecord) -> Result<()> {
    if record.findings.is_empty() {
        return Ok(());
    }
    let mut stmt = tx.prepare(
        "INSERT INTO findings (scan_id, seq, severity, description, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (seq, finding) in record.findings.iter().enumerate() {
        stmt.execute(params![
            record.id.to_string(),
            seq as i64,
            finding.severity.to_string(),
            finding.description,
            finding.detected_at,
        ])?;
    }
    Ok(())
}

fn load_record(conn: &Connection, id: Uuid) -> Result<ScanRecord> {
    let mut record = match conn.query_row(
        "SELECT id, target, kind, state, created_at, started_at, finished_at, error
         FROM scans WHERE id = ?1",
        params![id.to_string()],
        record_from_row,
    ) {
        Ok(record) => record,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(ScanError::NotFound(id)),
        Err(e) => return Err(e.into()),
    };
    record.findings = load_findings(conn, id)?;
    Ok(record)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScanRecord> {
    let id: String = row.get(0)?;
    let state: String = row.get(3)?;
    Ok(ScanRecord {
        id: id
            .parse()
            .map_err(|e: uuid::Error| decode_error(0, e.to_string()))?,
        target: row.get(1)?,
        kind: row.get(2)?,
        state: state.parse().map_err(|e| decode_error(3, e))?,
        created_at: row.get(4)?,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        error: row.get(7)?,
        findings: Vec::new(),
    })
}

fn load_findings(conn: &Connection, id: Uuid) -> Result<Vec<Finding>> {
    let mut stmt = conn.prepare(
        "SELECT severity, description, detected_at FROM findings
         WHERE scan_id = ?1 ORDER BY seq",
    )?;
    let findings = stmt
        .query_map(params![id.to_string()], |row| {
            let severity: String = row.get(0)?;
            Ok(Finding {
                severity: severity.parse().map_err(|e| decode_error(0, e))?,
                description: row.get(1)?,
                detected_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(findings)
}

fn collect_ids(conn: &Connection, sql: &str) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.iter().map(|id| parse_id(id)).collect()
}

fn parse_id(id: &str) -> Result<Uuid> {
    id.parse()
        .map_err(|e: uuid::Error| decode_error(0, e.to_string()).into())
}

fn is_id_conflict(e: &rusqlite::Error) -> bool {
    constraint_message(e).is_some_and(|m| m.contains("scans.id"))
}

fn is_active_target_conflict(e: &rusqlite::Error) -> bool {
    // The partial index reports the column it covers, not its name.
    constraint_message(e).is_some_and(|m| m.contains("scans.target"))
}

fn constraint_message(e: &rusqlite::Error) -> Option<&str> {
    match e {
        rusqlite::Error::SqliteFailure(f, Some(message))
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(message)
        }
        _ => None,
    }
}

fn decode_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, message.into())
}
