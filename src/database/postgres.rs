use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::database::store::{
    ApplicationStore, InterviewStore, NoteStore, SlotGuard, SlotSnapshot,
};
use crate::error::{Error, Result};
use crate::models::application::{Application, StatusChange};
use crate::models::interview::{Interview, InterviewOutcome, InterviewStatus, TimeWindow};
use crate::models::note::{ActorFlag, Note};

const APPLICATION_COLUMNS: &str = "id, job_id, company_id, candidate_id, status, version, \
     cover_letter, resume_ref, source, created_at, updated_at";

const INTERVIEW_COLUMNS: &str = "id, application_id, interviewer_id, participants, \
     interview_type, scheduled_at, duration_minutes, location, status, feedback, rating, \
     decision, completed_by, cancel_reason, cancelled_by, reschedule_reason, created_at, updated_at";

const ACTIVE_STATUSES: &str = "('scheduled', 'rescheduled')";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads the slot state for `application_id` / `interviewer_id` inside `conn`'s
    /// transaction, after the caller has taken the interviewer lock.
    async fn read_slot(
        conn: &mut PgConnection,
        application_id: Uuid,
        interviewer_id: Uuid,
        window: TimeWindow,
        moving: Option<Interview>,
    ) -> Result<SlotSnapshot> {
        let application = load_application(conn, application_id, true)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", application_id)))?;
        let moving_id = moving.as_ref().map(|i| i.id);

        let sql = format!(
            "SELECT {} FROM interviews \
             WHERE application_id = $1 AND status IN {} AND ($2::uuid IS NULL OR id <> $2)",
            INTERVIEW_COLUMNS, ACTIVE_STATUSES
        );
        let application_active = sqlx::query(&sql)
            .bind(application_id)
            .bind(moving_id)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(interview_from_row)
            .collect::<Result<Vec<_>>>()?;

        let sql = format!(
            "SELECT {} FROM interviews \
             WHERE interviewer_id = $1 AND status IN {} \
               AND scheduled_at < $3 AND ends_at > $2 \
               AND ($4::uuid IS NULL OR id <> $4) \
             ORDER BY scheduled_at",
            INTERVIEW_COLUMNS, ACTIVE_STATUSES
        );
        let interviewer_active = sqlx::query(&sql)
            .bind(interviewer_id)
            .bind(window.start)
            .bind(window.end())
            .bind(moving_id)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(interview_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(SlotSnapshot {
            application,
            moving,
            application_active,
            interviewer_active,
        })
    }
}

async fn lock_interviewer(conn: &mut PgConnection, interviewer_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(interviewer_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

async fn load_history(conn: &mut PgConnection, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<StatusChange>>> {
    let rows = sqlx::query(
        r#"SELECT application_id, status, actor_id, note, changed_at
           FROM application_status_history
           WHERE application_id = ANY($1)
           ORDER BY application_id, id"#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    let mut history: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
    for row in rows {
        let application_id: Uuid = row.try_get("application_id")?;
        let status: String = row.try_get("status")?;
        history.entry(application_id).or_default().push(StatusChange {
            status: status.parse()?,
            actor_id: row.try_get("actor_id")?,
            note: row.try_get("note")?,
            changed_at: row.try_get("changed_at")?,
        });
    }
    Ok(history)
}

async fn load_application(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> Result<Option<Application>> {
    let sql = format!(
        "SELECT {} FROM applications WHERE id = $1{}",
        APPLICATION_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };
    let mut history = load_history(conn, &[id]).await?;
    application_from_row(&row, history.remove(&id).unwrap_or_default()).map(Some)
}

fn application_from_row(row: &PgRow, status_history: Vec<StatusChange>) -> Result<Application> {
    let status: String = row.try_get("status")?;
    Ok(Application {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        company_id: row.try_get("company_id")?,
        candidate_id: row.try_get("candidate_id")?,
        status: status.parse()?,
        version: row.try_get("version")?,
        cover_letter: row.try_get("cover_letter")?,
        resume_ref: row.try_get("resume_ref")?,
        source: row.try_get("source")?,
        status_history,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn interview_from_row(row: &PgRow) -> Result<Interview> {
    let interview_type: String = row.try_get("interview_type")?;
    let status: String = row.try_get("status")?;
    let decision: Option<String> = row.try_get("decision")?;
    Ok(Interview {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        interviewer_id: row.try_get("interviewer_id")?,
        participants: row.try_get("participants")?,
        interview_type: interview_type.parse()?,
        scheduled_at: row.try_get("scheduled_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        location: row.try_get("location")?,
        status: status.parse()?,
        feedback: row.try_get("feedback")?,
        rating: row.try_get("rating")?,
        decision: decision.map(|d| d.parse()).transpose()?,
        completed_by: row.try_get("completed_by")?,
        cancel_reason: row.try_get("cancel_reason")?,
        cancelled_by: row.try_get("cancelled_by")?,
        reschedule_reason: row.try_get("reschedule_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn note_from_row(row: &PgRow) -> Result<Note> {
    let visibility: String = row.try_get("visibility")?;
    Ok(Note {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        visibility: visibility.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn flag_from_row(row: &PgRow) -> Result<ActorFlag> {
    let kind: String = row.try_get("kind")?;
    Ok(ActorFlag {
        application_id: row.try_get("application_id")?,
        actor_id: row.try_get("actor_id")?,
        kind: kind.parse()?,
        value: row.try_get("value")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn insert_application(&self, application: Application) -> Result<Application> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"INSERT INTO applications
                   (id, job_id, company_id, candidate_id, status, version,
                    cover_letter, resume_ref, source, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(application.id)
        .bind(application.job_id)
        .bind(application.company_id)
        .bind(application.candidate_id)
        .bind(application.status.as_str())
        .bind(application.version)
        .bind(&application.cover_letter)
        .bind(&application.resume_ref)
        .bind(&application.source)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Err(err) if is_unique_violation(&err) => return Err(Error::DuplicateApplication),
            other => {
                other?;
            }
        }

        for change in &application.status_history {
            insert_history(&mut tx, application.id, change).await?;
        }

        tx.commit().await?;
        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let mut conn = self.pool.acquire().await?;
        load_application(&mut conn, id, false).await
    }

    async fn list_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {} FROM applications WHERE job_id = $1 ORDER BY created_at, id",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(job_id).fetch_all(&mut *conn).await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut history = load_history(&mut conn, &ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| application_from_row(row, history.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn record_transition(
        &self,
        id: Uuid,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Application> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE applications
               SET status = $1, version = version + 1, updated_at = $2
               WHERE id = $3 AND version = $4"#,
        )
        .bind(change.status.as_str())
        .bind(change.changed_at)
        .bind(id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM applications WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                Some(actual) => Error::ConcurrentModification {
                    expected: expected_version,
                    actual,
                },
                None => Error::NotFound(format!("Application {} not found", id)),
            });
        }

        insert_history(&mut tx, id, &change).await?;
        let application = load_application(&mut tx, id, false)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;

        tx.commit().await?;
        Ok(application)
    }
}

async fn insert_history(conn: &mut PgConnection, application_id: Uuid, change: &StatusChange) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO application_status_history (application_id, status, actor_id, note, changed_at)
           VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(application_id)
    .bind(change.status.as_str())
    .bind(change.actor_id)
    .bind(&change.note)
    .bind(change.changed_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_interview(conn: &mut PgConnection, interview: &Interview) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO interviews
               (id, application_id, interviewer_id, participants, interview_type, scheduled_at,
                duration_minutes, ends_at, location, status, feedback, rating, decision,
                completed_by, cancel_reason, cancelled_by, reschedule_reason, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
           ON CONFLICT (id) DO UPDATE SET
               scheduled_at = EXCLUDED.scheduled_at,
               duration_minutes = EXCLUDED.duration_minutes,
               ends_at = EXCLUDED.ends_at,
               status = EXCLUDED.status,
               feedback = EXCLUDED.feedback,
               rating = EXCLUDED.rating,
               decision = EXCLUDED.decision,
               completed_by = EXCLUDED.completed_by,
               cancel_reason = EXCLUDED.cancel_reason,
               cancelled_by = EXCLUDED.cancelled_by,
               reschedule_reason = EXCLUDED.reschedule_reason,
               updated_at = EXCLUDED.updated_at"#,
    )
    .bind(interview.id)
    .bind(interview.application_id)
    .bind(interview.interviewer_id)
    .bind(&interview.participants)
    .bind(interview.interview_type.as_str())
    .bind(interview.scheduled_at)
    .bind(interview.duration_minutes)
    .bind(interview.window().end())
    .bind(&interview.location)
    .bind(interview.status.as_str())
    .bind(&interview.feedback)
    .bind(interview.rating)
    .bind(interview.decision.map(|d| d.as_str()))
    .bind(interview.completed_by)
    .bind(&interview.cancel_reason)
    .bind(interview.cancelled_by)
    .bind(&interview.reschedule_reason)
    .bind(interview.created_at)
    .bind(interview.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn load_interview(conn: &mut PgConnection, id: Uuid, for_update: bool) -> Result<Option<Interview>> {
    let sql = format!(
        "SELECT {} FROM interviews WHERE id = $1{}",
        INTERVIEW_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .as_ref()
        .map(interview_from_row)
        .transpose()
}

#[async_trait]
impl InterviewStore for PgStore {
    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        let mut conn = self.pool.acquire().await?;
        load_interview(&mut conn, id, false).await
    }

    async fn list_application_interviews(&self, application_id: Uuid) -> Result<Vec<Interview>> {
        let sql = format!(
            "SELECT {} FROM interviews WHERE application_id = $1 ORDER BY scheduled_at, created_at",
            INTERVIEW_COLUMNS
        );
        sqlx::query(&sql)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(interview_from_row)
            .collect()
    }

    async fn insert_interview_guarded(
        &self,
        interview: Interview,
        guard: SlotGuard,
    ) -> Result<Interview> {
        let mut tx = self.pool.begin().await?;
        lock_interviewer(&mut tx, interview.interviewer_id).await?;

        let snapshot = Self::read_slot(
            &mut tx,
            interview.application_id,
            interview.interviewer_id,
            interview.window(),
            None,
        )
        .await?;
        guard(&snapshot)?;

        write_interview(&mut tx, &interview).await?;
        tx.commit().await?;
        Ok(interview)
    }

    async fn move_interview_guarded(
        &self,
        id: Uuid,
        window: TimeWindow,
        reason: Option<String>,
        now: DateTime<Utc>,
        guard: SlotGuard,
    ) -> Result<Interview> {
        let mut tx = self.pool.begin().await?;

        let interviewer_id: Uuid =
            sqlx::query_scalar("SELECT interviewer_id FROM interviews WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))?;
        lock_interviewer(&mut tx, interviewer_id).await?;

        let current = load_interview(&mut tx, id, true)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))?;
        let application_id = current.application_id;
        let snapshot =
            Self::read_slot(&mut tx, application_id, interviewer_id, window, Some(current)).await?;
        guard(&snapshot)?;

        let mut moved = snapshot
            .moving
            .ok_or_else(|| Error::Internal("slot snapshot lost the moving interview".into()))?;
        moved.scheduled_at = window.start;
        moved.duration_minutes = window.duration_minutes;
        moved.status = InterviewStatus::Rescheduled;
        moved.reschedule_reason = reason;
        moved.updated_at = now;

        write_interview(&mut tx, &moved).await?;
        tx.commit().await?;
        Ok(moved)
    }

    async fn close_interview(
        &self,
        id: Uuid,
        outcome: InterviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<Interview> {
        let mut tx = self.pool.begin().await?;

        let mut interview = load_interview(&mut tx, id, true)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))?;
        if !interview.is_active() {
            return Err(Error::AlreadyTerminal(format!(
                "Interview {} is already {}",
                id, interview.status
            )));
        }
        outcome.apply_to(&mut interview, now);

        write_interview(&mut tx, &interview).await?;
        tx.commit().await?;
        Ok(interview)
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn insert_note(&self, note: Note) -> Result<Note> {
        sqlx::query(
            r#"INSERT INTO application_notes
                   (id, application_id, author_id, content, visibility, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(note.id)
        .bind(note.application_id)
        .bind(note.author_id)
        .bind(&note.content)
        .bind(note.visibility.as_str())
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(note)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        sqlx::query(
            r#"SELECT id, application_id, author_id, content, visibility, created_at, updated_at
               FROM application_notes WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(note_from_row)
        .transpose()
    }

    async fn update_note_content(
        &self,
        id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        let row = sqlx::query(
            r#"UPDATE application_notes SET content = $1, updated_at = $2 WHERE id = $3
               RETURNING id, application_id, author_id, content, visibility, created_at, updated_at"#,
        )
        .bind(content)
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        note_from_row(&row)
    }

    async fn list_notes(&self, application_id: Uuid) -> Result<Vec<Note>> {
        sqlx::query(
            r#"SELECT id, application_id, author_id, content, visibility, created_at, updated_at
               FROM application_notes WHERE application_id = $1
               ORDER BY created_at, id"#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(note_from_row)
        .collect()
    }

    async fn upsert_flag(&self, flag: ActorFlag) -> Result<ActorFlag> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO application_flags (application_id, actor_id, kind, value, updated_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (application_id, actor_id, kind) DO UPDATE
               SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
               WHERE application_flags.value IS DISTINCT FROM EXCLUDED.value"#,
        )
        .bind(flag.application_id)
        .bind(flag.actor_id)
        .bind(flag.kind.as_str())
        .bind(flag.value)
        .bind(flag.updated_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"SELECT application_id, actor_id, kind, value, updated_at FROM application_flags
               WHERE application_id = $1 AND actor_id = $2 AND kind = $3"#,
        )
        .bind(flag.application_id)
        .bind(flag.actor_id)
        .bind(flag.kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        flag_from_row(&row)
    }

    async fn get_flags(&self, application_id: Uuid, actor_id: Uuid) -> Result<Vec<ActorFlag>> {
        sqlx::query(
            r#"SELECT application_id, actor_id, kind, value, updated_at FROM application_flags
               WHERE application_id = $1 AND actor_id = $2
               ORDER BY kind"#,
        )
        .bind(application_id)
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(flag_from_row)
        .collect()
    }
}
