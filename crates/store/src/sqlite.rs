//! SQLite backend.
//!
//! Three tables:
//! - `rules`: administratively managed rules, patterns stored as a JSON array
//! - `sessions`: one row per chat session
//! - `turns`: append-only conversation turns
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so lexical order equals chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::conversation::{ConversationTurn, FeedbackScore, NewTurn, Session, SessionId, TurnKind};
use parley_core::error::StoreError;
use parley_core::message::Role;
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_core::store::{ConversationStore, RuleStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A SQLite store for rules and conversations.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` opens its own empty database, so an
        // ephemeral store is one connection that is never recycled
        let pool_options = if path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Open a database file, creating parent directories as needed.
    pub async fn open_file(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Storage(format!("Cannot create {}: {e}", parent.display())))?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rules (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                patterns    TEXT NOT NULL DEFAULT '[]',
                answer      TEXT NOT NULL,
                source      TEXT NOT NULL DEFAULT '',
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("rules table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(id),
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                kind        TEXT NOT NULL DEFAULT 'text',
                media_ref   TEXT,
                citations   TEXT,
                feedback_score INTEGER,
                correction  TEXT,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        // Databases created before feedback was recorded lack these columns
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('turns')")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("turns columns: {e}")))?;
        for (column, ty) in [("feedback_score", "INTEGER"), ("correction", "TEXT")] {
            if columns.iter().any(|c| c == column) {
                continue;
            }
            let ddl = format!("ALTER TABLE turns ADD COLUMN {column} {ty}");
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("turns.{column}: {e}")))?;
            info!(column, "Added turns column");
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session_time ON turns(session_id, created_at, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Decode the stored pattern list. A bare JSON string is one pattern;
    /// anything unreadable yields no patterns so the cache skips the rule.
    fn parse_patterns(id: i64, raw: &str) -> Vec<String> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Ok(serde_json::Value::String(s)) => vec![s],
            Ok(other) => vec![other.to_string()],
            Err(e) => {
                warn!(rule_id = id, error = %e, "Unreadable pattern list");
                Vec::new()
            }
        }
    }

    fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<Rule, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let patterns: String = row
            .try_get("patterns")
            .map_err(|e| StoreError::QueryFailed(format!("patterns column: {e}")))?;
        let answer: String = row
            .try_get("answer")
            .map_err(|e| StoreError::QueryFailed(format!("answer column: {e}")))?;
        let source: String = row
            .try_get("source")
            .map_err(|e| StoreError::QueryFailed(format!("source column: {e}")))?;
        let active: bool = row
            .try_get("active")
            .map_err(|e| StoreError::QueryFailed(format!("active column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        Ok(Rule {
            id,
            patterns: Self::parse_patterns(id, &patterns),
            answer,
            source,
            active,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let kind: String = row
            .try_get("kind")
            .map_err(|e| StoreError::QueryFailed(format!("kind column: {e}")))?;
        let media_ref: Option<String> = row
            .try_get("media_ref")
            .map_err(|e| StoreError::QueryFailed(format!("media_ref column: {e}")))?;
        let citations: Option<String> = row
            .try_get("citations")
            .map_err(|e| StoreError::QueryFailed(format!("citations column: {e}")))?;
        let feedback_score: Option<i32> = row
            .try_get("feedback_score")
            .map_err(|e| StoreError::QueryFailed(format!("feedback_score column: {e}")))?;
        let correction: Option<String> = row
            .try_get("correction")
            .map_err(|e| StoreError::QueryFailed(format!("correction column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let role = match role.as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        };

        Ok(ConversationTurn {
            id,
            session_id: SessionId(session_id),
            role,
            content,
            kind: TurnKind::from_tag(&kind),
            media_ref,
            citations,
            feedback_score: feedback_score.and_then(|score| FeedbackScore::try_from(score).ok()),
            correction,
            created_at: Self::parse_timestamp(&created_at),
        })
    }
}

#[async_trait]
impl RuleStore for SqliteStore {
    async fn load_active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let rows = sqlx::query("SELECT * FROM rules WHERE active = 1 ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Load active rules: {e}")))?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError> {
        let rows = sqlx::query("SELECT * FROM rules ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List rules: {e}")))?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn get_rule(&self, id: i64) -> Result<Option<Rule>, StoreError> {
        let row = sqlx::query("SELECT * FROM rules WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get rule: {e}")))?;
        row.as_ref().map(Self::row_to_rule).transpose()
    }

    async fn create_rule(&self, rule: NewRule) -> Result<Rule, StoreError> {
        let patterns = serde_json::to_string(&rule.patterns)
            .map_err(|e| StoreError::Storage(format!("Pattern serialization: {e}")))?;
        let now = Self::timestamp(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT INTO rules (patterns, answer, source, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&patterns)
        .bind(&rule.answer)
        .bind(&rule.source)
        .bind(rule.active)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT rule failed: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(rule_id = id, "Created rule");
        self.get_rule(id)
            .await?
            .ok_or_else(|| StoreError::Storage(format!("Rule {id} vanished after insert")))
    }

    async fn update_rule(&self, id: i64, update: RuleUpdate) -> Result<Option<Rule>, StoreError> {
        let Some(mut rule) = self.get_rule(id).await? else {
            return Ok(None);
        };
        update
            .apply(&mut rule)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let patterns = serde_json::to_string(&rule.patterns)
            .map_err(|e| StoreError::Storage(format!("Pattern serialization: {e}")))?;

        sqlx::query(
            r#"
            UPDATE rules
            SET patterns = ?1, answer = ?2, source = ?3, active = ?4, updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(&patterns)
        .bind(&rule.answer)
        .bind(&rule.source)
        .bind(rule.active)
        .bind(Self::timestamp(rule.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE rule failed: {e}")))?;

        Ok(Some(rule))
    }

    async fn delete_rule(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM rules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE rule failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_session(&self) -> Result<Session, StoreError> {
        self.ensure_session(&SessionId::new()).await
    }

    async fn ensure_session(&self, id: &SessionId) -> Result<Session, StoreError> {
        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)")
            .bind(id.as_str())
            .bind(Self::timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT session failed: {e}")))?;

        self.get_session(id)
            .await?
            .ok_or_else(|| StoreError::Storage(format!("Session {id} vanished after insert")))
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT id, created_at FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get session: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        Ok(Some(Session {
            id: id.clone(),
            created_at: Self::parse_timestamp(&created_at),
        }))
    }

    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO turns (session_id, role, content, kind, media_ref, citations, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(turn.session_id.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.kind.as_str())
        .bind(&turn.media_ref)
        .bind(&turn.citations)
        .bind(Self::timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT turn failed: {e}")))?;

        Ok(ConversationTurn {
            id: result.last_insert_rowid(),
            session_id: turn.session_id,
            role: turn.role,
            content: turn.content,
            kind: turn.kind,
            media_ref: turn.media_ref,
            citations: turn.citations,
            feedback_score: None,
            correction: None,
            created_at,
        })
    }

    async fn load_turns(&self, id: &SessionId) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM turns WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Load turns: {e}")))?;
        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn get_turn(&self, turn_id: i64) -> Result<Option<ConversationTurn>, StoreError> {
        let row = sqlx::query("SELECT * FROM turns WHERE id = ?1")
            .bind(turn_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get turn: {e}")))?;
        row.as_ref().map(Self::row_to_turn).transpose()
    }

    async fn set_feedback(
        &self,
        turn_id: i64,
        score: FeedbackScore,
    ) -> Result<Option<ConversationTurn>, StoreError> {
        let result = sqlx::query("UPDATE turns SET feedback_score = ?1 WHERE id = ?2")
            .bind(i32::from(score))
            .bind(turn_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE feedback failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_turn(turn_id).await
    }

    async fn set_correction(
        &self,
        turn_id: i64,
        correction: &str,
    ) -> Result<Option<ConversationTurn>, StoreError> {
        let result = sqlx::query("UPDATE turns SET correction = ?1 WHERE id = ?2")
            .bind(correction)
            .bind(turn_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE correction failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        debug!(turn_id, "Turn corrected");
        self.get_turn(turn_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::conversation::{InboundMessage, ReplyKind, ReplyPayload};

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_load_rules() {
        let db = test_store().await;
        let rule = db
            .create_rule(NewRule::new(
                vec![r"客服.*电话".into(), r"联系.*管理员".into()],
                "热线 400-888-8888",
                "平台服务指南",
            ))
            .await
            .unwrap();
        assert!(rule.id > 0);
        assert_eq!(rule.patterns.len(), 2);

        let active = db.load_active_rules().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].patterns[0], r"客服.*电话");
        assert_eq!(active[0].source, "平台服务指南");
    }

    #[tokio::test]
    async fn inactive_rules_are_not_loaded() {
        let db = test_store().await;
        let rule = db
            .create_rule(NewRule::new(vec!["a".into()], "A", ""))
            .await
            .unwrap();
        db.update_rule(rule.id, RuleUpdate::activate(false))
            .await
            .unwrap();
        assert!(db.load_active_rules().await.unwrap().is_empty());
        assert_eq!(db.list_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_update_persists() {
        let db = test_store().await;
        let rule = db
            .create_rule(NewRule::new(vec!["a".into()], "A", "s"))
            .await
            .unwrap();
        let update = RuleUpdate {
            answer: Some("B".into()),
            ..Default::default()
        };
        db.update_rule(rule.id, update).await.unwrap();
        let fetched = db.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(fetched.answer, "B");
        assert_eq!(fetched.source, "s");
        assert_eq!(fetched.patterns, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn delete_rule() {
        let db = test_store().await;
        let rule = db
            .create_rule(NewRule::new(vec!["a".into()], "A", ""))
            .await
            .unwrap();
        assert!(db.delete_rule(rule.id).await.unwrap());
        assert!(db.get_rule(rule.id).await.unwrap().is_none());
        assert!(!db.delete_rule(rule.id).await.unwrap());
    }

    #[tokio::test]
    async fn bare_string_pattern_column_is_one_pattern() {
        let db = test_store().await;
        sqlx::query(
            "INSERT INTO rules (patterns, answer, created_at, updated_at) VALUES (?1, 'A', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
        )
        .bind(r#""hotline""#)
        .execute(&db.pool)
        .await
        .unwrap();
        let rules = db.load_active_rules().await.unwrap();
        assert_eq!(rules[0].patterns, vec!["hotline".to_string()]);
    }

    #[tokio::test]
    async fn turns_round_trip_in_order() {
        let db = test_store().await;
        let session = db.create_session().await.unwrap();

        db.append_turn(NewTurn::from_inbound(&session.id, &InboundMessage::text("问题")))
            .await
            .unwrap();
        let mut reply = ReplyPayload::text("# 提纲").with_citations(Some("民法典".into()));
        reply.kind = ReplyKind::Diagram;
        db.append_turn(NewTurn::from_reply(&session.id, &reply))
            .await
            .unwrap();

        let turns = db.load_turns(&session.id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].kind, TurnKind::Diagram);
        assert_eq!(turns[1].citations.as_deref(), Some("民法典"));
        assert!(turns[0].id < turns[1].id);
    }

    #[tokio::test]
    async fn feedback_and_correction_persist() {
        let db = test_store().await;
        let session = db.create_session().await.unwrap();
        let reply = db
            .append_turn(NewTurn::from_reply(&session.id, &ReplyPayload::text("三年")))
            .await
            .unwrap();

        let rated = db
            .set_feedback(reply.id, FeedbackScore::Up)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rated.feedback_score, Some(FeedbackScore::Up));
        db.set_correction(reply.id, "三年，自知道权利受损之日起计算")
            .await
            .unwrap();

        let stored = db.get_turn(reply.id).await.unwrap().unwrap();
        assert_eq!(stored.feedback_score, Some(FeedbackScore::Up));
        assert_eq!(stored.correction.as_deref(), Some("三年，自知道权利受损之日起计算"));
        assert!(db.set_correction(999, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn older_turns_table_gains_feedback_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        {
            let pool = SqlitePool::connect(&url).await.unwrap();
            sqlx::query(
                "CREATE TABLE turns (id INTEGER PRIMARY KEY AUTOINCREMENT, session_id TEXT NOT NULL, role TEXT NOT NULL, content TEXT NOT NULL, kind TEXT NOT NULL DEFAULT 'text', media_ref TEXT, citations TEXT, created_at TEXT NOT NULL)",
            )
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;
        }

        let db = SqliteStore::open_file(&path).await.unwrap();
        let session = db.create_session().await.unwrap();
        let reply = db
            .append_turn(NewTurn::from_reply(&session.id, &ReplyPayload::text("a")))
            .await
            .unwrap();
        let rated = db.set_feedback(reply.id, FeedbackScore::Down).await.unwrap();
        assert_eq!(rated.unwrap().feedback_score, Some(FeedbackScore::Down));
    }

    #[tokio::test]
    async fn ensure_session_creates_once() {
        let db = test_store().await;
        let id = SessionId::from("abc");
        assert!(db.get_session(&id).await.unwrap().is_none());
        let first = db.ensure_session(&id).await.unwrap();
        let again = db.ensure_session(&id).await.unwrap();
        assert_eq!(first.created_at, again.created_at);
    }

    #[tokio::test]
    async fn turn_for_missing_session_violates_foreign_key() {
        let db = test_store().await;
        let result = db
            .append_turn(NewTurn::from_inbound(&SessionId::from("ghost"), &InboundMessage::text("x")))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn memory_database_is_shared_by_concurrent_callers() {
        let db = std::sync::Arc::new(test_store().await);
        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.create_rule(NewRule::new(vec![format!("p{i}")], "A", ""))
                    .await
                    .unwrap();
                db.list_rules().await.unwrap().len()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap() >= 1);
        }
        assert_eq!(db.list_rules().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parley.db");
        {
            let db = SqliteStore::open_file(&path).await.unwrap();
            db.create_rule(NewRule::new(vec!["a".into()], "A", ""))
                .await
                .unwrap();
        }
        let db = SqliteStore::open_file(&path).await.unwrap();
        assert_eq!(db.list_rules().await.unwrap().len(), 1);
    }
}
