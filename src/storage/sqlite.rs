//! SQLite storage backend

use super::traits::{
    clamp_limit, EntityFilter, EntityPage, EntitySort, EvidenceStore, OpenStore, StorageError,
    StorageResult,
};
use crate::model::{
    AdvisorySession, AuditEvent, AuditEventType, Entity, EntityType, RiskLevel, SessionType,
    TrustHistoryPoint,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ENTITY_COLUMNS: &str = "entity_id, entity_type, source_url, title, extracted_text, risk_level, \
     analysis_json, detected_at, analyzed_at, trust_score, trust_score_delta, session_id";

/// SQLite-backed evidence store
///
/// A single database file with one table per record kind. Thread-safe via an
/// internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn ts_from_sql(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(format!("{}: {}", s, e)))
}

/// Raw entity row before JSON/enum decoding.
struct EntityRow {
    entity_id: String,
    entity_type: String,
    source_url: String,
    title: Option<String>,
    extracted_text: Option<String>,
    risk_level: String,
    analysis_json: String,
    detected_at: String,
    analyzed_at: String,
    trust_score: f64,
    trust_score_delta: f64,
    session_id: String,
}

impl EntityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entity_id: row.get(0)?,
            entity_type: row.get(1)?,
            source_url: row.get(2)?,
            title: row.get(3)?,
            extracted_text: row.get(4)?,
            risk_level: row.get(5)?,
            analysis_json: row.get(6)?,
            detected_at: row.get(7)?,
            analyzed_at: row.get(8)?,
            trust_score: row.get(9)?,
            trust_score_delta: row.get(10)?,
            session_id: row.get(11)?,
        })
    }

    fn into_entity(self) -> StorageResult<Entity> {
        Ok(Entity {
            entity_id: self.entity_id,
            entity_type: EntityType::parse(&self.entity_type),
            source_url: self.source_url,
            title: self.title,
            extracted_text: self.extracted_text,
            risk_level: RiskLevel::parse_or_low(&self.risk_level),
            analysis: serde_json::from_str(&self.analysis_json)?,
            detected_at: ts_from_sql(&self.detected_at)?,
            analyzed_at: ts_from_sql(&self.analyzed_at)?,
            trust_score: self.trust_score,
            trust_score_delta: self.trust_score_delta,
            session_id: self.session_id,
        })
    }
}

impl SqliteStore {
    /// Initialize the database schema. Tables are only ever created, never
    /// altered or dropped.
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS entities (
                entity_id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                source_url TEXT NOT NULL,
                title TEXT,
                extracted_text TEXT,
                risk_level TEXT NOT NULL,
                analysis_json TEXT NOT NULL,
                detected_at TEXT NOT NULL,
                analyzed_at TEXT NOT NULL,
                trust_score REAL NOT NULL,
                trust_score_delta REAL NOT NULL,
                session_id TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entities_detected
                ON entities(detected_at);
            CREATE INDEX IF NOT EXISTS idx_entities_type_risk
                ON entities(entity_type, risk_level);

            CREATE TABLE IF NOT EXISTS trust_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT NOT NULL,
                trust_score REAL NOT NULL,
                delta REAL NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (entity_id) REFERENCES entities(entity_id)
            );

            CREATE INDEX IF NOT EXISTS idx_trust_history_entity
                ON trust_history(entity_id, timestamp);

            CREATE TABLE IF NOT EXISTS audit_log (
                event_id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                entity_id TEXT,
                session_id TEXT,
                timestamp TEXT NOT NULL,
                metadata_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp
                ON audit_log(timestamp);

            CREATE TABLE IF NOT EXISTS advisory_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT,
                user_query TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                session_type TEXT NOT NULL,
                provider TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_advisory_entity
                ON advisory_sessions(entity_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_entities(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<Entity>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, EntityRow::read)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?.into_entity()?);
        }
        Ok(entities)
    }

    fn row_to_audit(row: &Row<'_>) -> rusqlite::Result<(String, String, Option<String>, Option<String>, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode_audit(
        (event_id, event_type, entity_id, session_id, timestamp, metadata): (
            String,
            String,
            Option<String>,
            Option<String>,
            String,
            String,
        ),
    ) -> StorageResult<AuditEvent> {
        let event_type = AuditEventType::parse(&event_type).ok_or(StorageError::InvalidValue {
            column: "audit_log.event_type",
            value: event_type,
        })?;
        Ok(AuditEvent {
            event_id,
            event_type,
            entity_id,
            session_id,
            timestamp: ts_from_sql(&timestamp)?,
            metadata: serde_json::from_str(&metadata)?,
        })
    }

    fn row_to_advisory(row: &Row<'_>) -> rusqlite::Result<(Option<String>, String, String, String, Option<String>, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode_advisory(
        (entity_id, user_query, ai_response, session_type, provider, timestamp): (
            Option<String>,
            String,
            String,
            String,
            Option<String>,
            String,
        ),
    ) -> StorageResult<AdvisorySession> {
        let session_type = SessionType::parse(&session_type).ok_or(StorageError::InvalidValue {
            column: "advisory_sessions.session_type",
            value: session_type,
        })?;
        Ok(AdvisorySession {
            entity_id,
            user_query,
            ai_response,
            session_type,
            provider,
            timestamp: ts_from_sql(&timestamp)?,
        })
    }

    fn query_advisory(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<AdvisorySession>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_advisory)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(Self::decode_advisory(row?)?);
        }
        Ok(sessions)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl EvidenceStore for SqliteStore {
    // === Entities ===

    fn upsert_entity(&self, entity: &Entity) -> StorageResult<()> {
        let analysis_json = serde_json::to_string(&entity.analysis)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entities (entity_id, entity_type, source_url, title, extracted_text, risk_level,
                 analysis_json, detected_at, analyzed_at, trust_score, trust_score_delta, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(entity_id) DO UPDATE SET
                 title = excluded.title,
                 extracted_text = excluded.extracted_text,
                 risk_level = excluded.risk_level,
                 analysis_json = excluded.analysis_json,
                 detected_at = excluded.detected_at,
                 analyzed_at = excluded.analyzed_at,
                 trust_score = excluded.trust_score,
                 trust_score_delta = excluded.trust_score_delta,
                 session_id = excluded.session_id",
            params![
                entity.entity_id,
                entity.entity_type.as_str(),
                entity.source_url,
                entity.title,
                entity.extracted_text,
                entity.risk_level.as_str(),
                analysis_json,
                ts_to_sql(&entity.detected_at),
                ts_to_sql(&entity.analyzed_at),
                entity.trust_score,
                entity.trust_score_delta,
                entity.session_id,
            ],
        )?;
        Ok(())
    }

    fn load_entity(&self, entity_id: &str) -> StorageResult<Option<Entity>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE entity_id = ?1", ENTITY_COLUMNS),
                params![entity_id],
                EntityRow::read,
            )
            .optional()?;
        row.map(EntityRow::into_entity).transpose()
    }

    fn list_entities(&self, filter: &EntityFilter) -> StorageResult<EntityPage> {
        let conn = self.conn()?;

        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(entity_type) = filter.entity_type {
            where_sql.push_str(" AND entity_type = ?");
            params_vec.push(Box::new(entity_type.as_str()));
        }
        if let Some(risk_level) = filter.risk_level {
            where_sql.push_str(" AND risk_level = ?");
            params_vec.push(Box::new(risk_level.as_str()));
        }
        if let Some(ref session_id) = filter.session_id {
            where_sql.push_str(" AND session_id = ?");
            params_vec.push(Box::new(session_id.clone()));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM entities{}", where_sql),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let order = match filter.sort {
            EntitySort::Newest => "detected_at DESC, entity_id ASC",
            EntitySort::Oldest => "detected_at ASC, entity_id ASC",
            EntitySort::HighestRisk => {
                "CASE risk_level WHEN 'HIGH' THEN 0 WHEN 'MEDIUM' THEN 1 ELSE 2 END ASC, detected_at DESC"
            }
        };
        let sql = format!(
            "SELECT {} FROM entities{} ORDER BY {} LIMIT {}",
            ENTITY_COLUMNS,
            where_sql,
            order,
            filter.effective_limit()
        );
        let entities = Self::query_entities(&conn, &sql, params_refs.as_slice())?;

        Ok(EntityPage {
            entities,
            total: total as usize,
        })
    }

    fn recent_entities(&self, limit: usize) -> StorageResult<Vec<Entity>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM entities ORDER BY detected_at DESC LIMIT ?1",
            ENTITY_COLUMNS
        );
        Self::query_entities(&conn, &sql, &[&(limit as i64)])
    }

    // === Trust history ===

    fn append_trust_point(&self, point: &TrustHistoryPoint) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trust_history (entity_id, trust_score, delta, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                point.entity_id,
                point.trust_score,
                point.delta,
                ts_to_sql(&point.timestamp)
            ],
        )?;
        Ok(())
    }

    fn trust_history(&self, entity_id: &str) -> StorageResult<Vec<TrustHistoryPoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT entity_id, trust_score, delta, timestamp FROM trust_history
             WHERE entity_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (entity_id, trust_score, delta, timestamp) = row?;
            points.push(TrustHistoryPoint {
                entity_id,
                trust_score,
                delta,
                timestamp: ts_from_sql(&timestamp)?,
            });
        }
        Ok(points)
    }

    // === Audit log ===

    fn insert_audit_event(&self, event: &AuditEvent) -> StorageResult<bool> {
        let metadata_json = serde_json::to_string(&event.metadata)?;
        let conn = self.conn()?;
        let rows = conn.execute(
            "INSERT INTO audit_log (event_id, event_type, entity_id, session_id, timestamp, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(event_id) DO NOTHING",
            params![
                event.event_id,
                event.event_type.as_str(),
                event.entity_id,
                event.session_id,
                ts_to_sql(&event.timestamp),
                metadata_json,
            ],
        )?;
        Ok(rows > 0)
    }

    fn recent_audit_events(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT event_id, event_type, entity_id, session_id, timestamp, metadata_json
             FROM audit_log ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![clamp_limit(limit) as i64], Self::row_to_audit)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(Self::decode_audit(row?)?);
        }
        Ok(events)
    }

    // === Advisory transcripts ===

    fn append_advisory_session(&self, session: &AdvisorySession) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO advisory_sessions (entity_id, user_query, ai_response, session_type, provider, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.entity_id,
                session.user_query,
                session.ai_response,
                session.session_type.as_str(),
                session.provider,
                ts_to_sql(&session.timestamp),
            ],
        )?;
        Ok(())
    }

    fn recent_advisory_sessions(&self, limit: usize) -> StorageResult<Vec<AdvisorySession>> {
        let conn = self.conn()?;
        Self::query_advisory(
            &conn,
            "SELECT entity_id, user_query, ai_response, session_type, provider, timestamp
             FROM advisory_sessions ORDER BY timestamp DESC, id DESC LIMIT ?1",
            &[&(clamp_limit(limit) as i64)],
        )
    }

    fn advisory_history(&self, entity_id: &str, limit: usize) -> StorageResult<Vec<AdvisorySession>> {
        let conn = self.conn()?;
        let mut sessions = Self::query_advisory(
            &conn,
            "SELECT entity_id, user_query, ai_response, session_type, provider, timestamp
             FROM advisory_sessions WHERE entity_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            &[&entity_id, &(limit as i64)],
        )?;
        sessions.reverse();
        Ok(sessions)
    }
}
