//! Persistence seams for the hiring pipeline.
//!
//! Engines depend on these traits only. `PgStore` backs them with Postgres,
//! `MemoryStore` with process memory; both must honour the same atomicity
//! contracts documented on each method.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::{Application, StatusChange};
use crate::models::interview::{Interview, InterviewOutcome, TimeWindow};
use crate::models::note::{ActorFlag, Note};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persists a fresh application together with its initial history entry.
    /// Fails with `DuplicateApplication` if the candidate already applied to the job.
    async fn insert_application(&self, application: Application) -> Result<Application>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>>;

    async fn list_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>>;

    /// Conditional write. Succeeds only while the stored version equals
    /// `expected_version`; sets the status, bumps the version and appends
    /// `change` to the history in one transaction.
    ///
    /// Fails with `NotFound` or `ConcurrentModification`.
    async fn record_transition(
        &self,
        id: Uuid,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Application>;
}

/// State read under the interviewer's scheduling lock.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub application: Application,
    /// The interview being moved, when rescheduling.
    pub moving: Option<Interview>,
    /// Other active interviews of the application.
    pub application_active: Vec<Interview>,
    /// Active interviews of the interviewer; always includes every one that
    /// overlaps the requested window. Never includes `moving`.
    pub interviewer_active: Vec<Interview>,
}

/// Validation run against a [`SlotSnapshot`] before the write commits.
pub type SlotGuard = Box<dyn FnOnce(&SlotSnapshot) -> Result<()> + Send>;

#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>>;

    async fn list_application_interviews(&self, application_id: Uuid) -> Result<Vec<Interview>>;

    /// Serialized per interviewer: takes the interviewer's lock, reads the
    /// snapshot, runs `guard`, and inserts only if the guard passes.
    async fn insert_interview_guarded(
        &self,
        interview: Interview,
        guard: SlotGuard,
    ) -> Result<Interview>;

    /// Same locking discipline as [`InterviewStore::insert_interview_guarded`];
    /// on success the interview takes `window`, status `rescheduled` and `reason`.
    async fn move_interview_guarded(
        &self,
        id: Uuid,
        window: TimeWindow,
        reason: Option<String>,
        now: DateTime<Utc>,
        guard: SlotGuard,
    ) -> Result<Interview>;

    /// Closes an active interview. Fails with `NotFound`, or `AlreadyTerminal`
    /// when the interview is no longer active.
    async fn close_interview(
        &self,
        id: Uuid,
        outcome: InterviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<Interview>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert_note(&self, note: Note) -> Result<Note>;

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>>;

    async fn update_note_content(
        &self,
        id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<Note>;

    /// All notes of an application, oldest first.
    async fn list_notes(&self, application_id: Uuid) -> Result<Vec<Note>>;

    /// Upsert keyed by `(application, actor, kind)`. Writing the value already
    /// stored leaves the row, including `updated_at`, untouched.
    async fn upsert_flag(&self, flag: ActorFlag) -> Result<ActorFlag>;

    async fn get_flags(&self, application_id: Uuid, actor_id: Uuid) -> Result<Vec<ActorFlag>>;
}
