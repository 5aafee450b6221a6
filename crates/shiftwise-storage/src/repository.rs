use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use tracing::{debug, error};

use shiftwise_core::domain::{
    AppliedLedgerRecord, AssistantSession, DecisionRecord, Position, Shift, User,
};
use shiftwise_core::engine::apply::ShiftWrite;
use shiftwise_core::ports::{ApplyCommit, ApplyFailureRecord, CommitOutcome, ScheduleStore};

use crate::models::{
    decision_to_str, source_to_str, version_to_str, DecisionRow, LedgerRow, SessionRow, ShiftRow,
};

pub struct SqliteScheduleStore {
    pool: SqlitePool,
}

impl SqliteScheduleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================================================================
    // Import helpers (outside the store trait)
    // ========================================================================

    pub async fn upsert_user(&self, user: &User) -> anyhow::Result<()> {
        query(
            "INSERT INTO users (id, display_name, is_active) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                is_active = excluded.is_active",
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(user.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_position(&self, position: &Position) -> anyhow::Result<()> {
        query(
            "INSERT INTO positions (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&position.id)
        .bind(&position.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_shift(&self, shift: &Shift) -> anyhow::Result<()> {
        Self::upsert_shift_in_tx_pool(&self.pool, shift).await
    }

    async fn upsert_shift_in_tx_pool<'e, E>(executor: E, shift: &Shift) -> anyhow::Result<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        query(
            "INSERT INTO shifts (id, unit_id, user_id, date_key, start_time, end_time, position_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                unit_id = excluded.unit_id,
                user_id = excluded.user_id,
                date_key = excluded.date_key,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                position_id = excluded.position_id",
        )
        .bind(&shift.id)
        .bind(&shift.unit_id)
        .bind(&shift.user_id)
        .bind(&shift.date_key)
        .bind(&shift.start_time)
        .bind(&shift.end_time)
        .bind(&shift.position_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn insert_decision_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
        record: &DecisionRecord,
    ) -> anyhow::Result<()> {
        query(
            "INSERT INTO assistant_decisions
             (session_id, suggestion_id, decision, timestamp, suggestion_version, reason, source)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id, suggestion_id) DO UPDATE SET
                decision = excluded.decision,
                timestamp = excluded.timestamp,
                suggestion_version = excluded.suggestion_version,
                reason = excluded.reason,
                source = excluded.source",
        )
        .bind(session_id)
        .bind(&record.suggestion_id)
        .bind(decision_to_str(record.decision))
        .bind(record.timestamp)
        .bind(version_to_str(record.suggestion_version))
        .bind(&record.reason)
        .bind(record.source.map(source_to_str))
        .execute(&mut **tx)
        .await?;

        query("UPDATE assistant_sessions SET updated_at = ? WHERE session_id = ?")
            .bind(record.timestamp.unwrap_or(0))
            .bind(session_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Dedupe fingerprint for a shift write.
fn fingerprint(shift: &Shift) -> (String, String, String, Option<String>, Option<String>) {
    (
        shift.user_id.clone(),
        shift.date_key.clone(),
        shift.start_time.clone(),
        shift.end_time.clone(),
        shift.position_id.clone(),
    )
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn list_shifts(&self, unit_id: &str) -> anyhow::Result<Vec<Shift>> {
        let rows = query_as::<_, ShiftRow>(
            "SELECT id, unit_id, user_id, date_key, start_time, end_time, position_id
             FROM shifts
             WHERE unit_id = ?
             ORDER BY date_key, start_time, user_id, position_id, id",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Shift::from).collect())
    }

    async fn list_positions(&self) -> anyhow::Result<Vec<Position>> {
        let rows = query_as::<_, (String, String)>("SELECT id, name FROM positions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Position { id, name })
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        let row = query_as::<_, (String, String, i64)>(
            "SELECT id, display_name, is_active FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, display_name, is_active)| User {
            id,
            display_name,
            is_active: is_active != 0,
        }))
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<AssistantSession>> {
        let Some(session) = query_as::<_, SessionRow>(
            "SELECT session_id, context_key, schema_version, created_at, updated_at, expires_at
             FROM assistant_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let decisions = query_as::<_, DecisionRow>(
            "SELECT session_id, suggestion_id, decision, timestamp, suggestion_version, reason, source
             FROM assistant_decisions
             WHERE session_id = ?
             ORDER BY suggestion_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(AssistantSession {
            session_id: session.session_id,
            decisions: decisions.into_iter().map(DecisionRow::into_record).collect(),
            schema_version: session.schema_version as u32,
            context_key: session.context_key,
            created_at: session.created_at,
            updated_at: session.updated_at,
            expires_at: session.expires_at,
        }))
    }

    async fn save_session(&self, session: &AssistantSession) -> anyhow::Result<()> {
        query(
            "INSERT INTO assistant_sessions
             (session_id, context_key, schema_version, created_at, updated_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                context_key = excluded.context_key,
                schema_version = excluded.schema_version,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at",
        )
        .bind(&session.session_id)
        .bind(&session.context_key)
        .bind(session.schema_version as i64)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_decision(
        &self,
        session_id: &str,
        record: &DecisionRecord,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_decision_in_tx(&mut tx, session_id, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_applied_ledger(
        &self,
        unit_id: &str,
        suggestion_id: &str,
    ) -> anyhow::Result<Option<AppliedLedgerRecord>> {
        let row = query_as::<_, LedgerRow>(
            "SELECT unit_id, suggestion_id, signature_hash, applied_at, applied_shift_ids
             FROM applied_ledger
             WHERE unit_id = ? AND suggestion_id = ?",
        )
        .bind(unit_id)
        .bind(suggestion_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LedgerRow::into_record))
    }

    /// Apply a suggestion's writes atomically.
    ///
    /// Everything happens inside one transaction: the ledger re-read, the
    /// shift no-op detection, and the writes. Either all of it commits or
    /// none of it does.
    async fn commit_apply(&self, commit: &ApplyCommit) -> anyhow::Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        let already = query_as::<_, LedgerRow>(
            "SELECT unit_id, suggestion_id, signature_hash, applied_at, applied_shift_ids
             FROM applied_ledger
             WHERE unit_id = ? AND suggestion_id = ?",
        )
        .bind(&commit.unit_id)
        .bind(&commit.suggestion_id)
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            debug!(suggestion_id = %commit.suggestion_id, "apply skipped, ledger hit");
            return Ok(CommitOutcome::AlreadyApplied);
        }

        let current: Vec<ShiftRow> = query_as(
            "SELECT id, unit_id, user_id, date_key, start_time, end_time, position_id
             FROM shifts WHERE unit_id = ?",
        )
        .bind(&commit.unit_id)
        .fetch_all(&mut *tx)
        .await?;
        let existing: Vec<_> = current
            .into_iter()
            .map(|row| fingerprint(&Shift::from(row)))
            .collect();

        let changes_something = commit
            .writes
            .iter()
            .any(|write| !existing.contains(&fingerprint(write.shift())));
        if !changes_something {
            Self::insert_decision_in_tx(&mut tx, &commit.session_id, &commit.decision).await?;
            tx.commit().await?;
            return Ok(CommitOutcome::Unchanged);
        }

        let mut applied_shift_ids = Vec::new();
        for write in &commit.writes {
            let shift = write.shift();
            applied_shift_ids.push(shift.id.clone());
            match write {
                ShiftWrite::Create(next) | ShiftWrite::Update { next, .. } => {
                    Self::upsert_shift_in_tx_pool(&mut *tx, next).await?;
                }
            }
        }

        query(
            "INSERT INTO applied_ledger
             (unit_id, suggestion_id, signature_hash, applied_at, applied_shift_ids)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&commit.unit_id)
        .bind(&commit.suggestion_id)
        .bind(&commit.signature_hash)
        .bind(commit.applied_at)
        .bind(serde_json::to_string(&applied_shift_ids)?)
        .execute(&mut *tx)
        .await?;

        Self::insert_decision_in_tx(&mut tx, &commit.session_id, &commit.decision).await?;
        tx.commit().await?;

        Ok(CommitOutcome::Applied)
    }

    fn log_apply_failure(&self, record: &ApplyFailureRecord) {
        error!(
            unit_id = %record.unit_id,
            suggestion_id = %record.suggestion_id,
            error = %record.error,
            "apply transaction failed"
        );
    }
}
