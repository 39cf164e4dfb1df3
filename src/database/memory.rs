use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::{
    ApplicationStore, InterviewStore, NoteStore, SlotGuard, SlotSnapshot,
};
use crate::error::{Error, Result};
use crate::models::application::{Application, StatusChange};
use crate::models::interview::{Interview, InterviewOutcome, InterviewStatus, TimeWindow};
use crate::models::note::{ActorFlag, FlagKind, Note};

#[derive(Default)]
struct MemoryState {
    applications: HashMap<Uuid, Application>,
    interviews: HashMap<Uuid, Interview>,
    notes: Vec<Note>,
    flags: HashMap<(Uuid, Uuid, FlagKind), ActorFlag>,
}

impl MemoryState {
    fn snapshot(
        &self,
        application_id: Uuid,
        interviewer_id: Uuid,
        window: TimeWindow,
        moving: Option<Interview>,
    ) -> Result<SlotSnapshot> {
        let application = self
            .applications
            .get(&application_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", application_id)))?;
        let moving_id = moving.as_ref().map(|i| i.id);
        let is_other_active = |i: &&Interview| i.is_active() && Some(i.id) != moving_id;

        let application_active = self
            .interviews
            .values()
            .filter(|i| i.application_id == application_id)
            .filter(is_other_active)
            .cloned()
            .collect();

        let mut interviewer_active: Vec<Interview> = self
            .interviews
            .values()
            .filter(|i| i.interviewer_id == interviewer_id)
            .filter(is_other_active)
            .filter(|i| i.window().overlaps(&window))
            .cloned()
            .collect();
        interviewer_active.sort_by_key(|i| i.scheduled_at);

        Ok(SlotSnapshot {
            application,
            moving,
            application_active,
            interviewer_active,
        })
    }
}

/// Process-local store. Every operation runs under one mutex without awaiting,
/// which gives the same per-interviewer serialization as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store mutex poisoned".into()))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(&self, application: Application) -> Result<Application> {
        let mut state = self.lock()?;
        let duplicate = state.applications.values().any(|existing| {
            existing.job_id == application.job_id
                && existing.candidate_id == application.candidate_id
        });
        if duplicate {
            return Err(Error::DuplicateApplication);
        }
        state
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        Ok(self.lock()?.applications.get(&id).cloned())
    }

    async fn list_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>> {
        let state = self.lock()?;
        let mut applications: Vec<Application> = state
            .applications
            .values()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect();
        applications.sort_by_key(|a| (a.created_at, a.id));
        Ok(applications)
    }

    async fn record_transition(
        &self,
        id: Uuid,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Application> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;
        if application.version != expected_version {
            return Err(Error::ConcurrentModification {
                expected: expected_version,
                actual: application.version,
            });
        }
        application.status = change.status;
        application.version += 1;
        application.updated_at = change.changed_at;
        application.status_history.push(change);
        Ok(application.clone())
    }
}

#[async_trait]
impl InterviewStore for MemoryStore {
    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        Ok(self.lock()?.interviews.get(&id).cloned())
    }

    async fn list_application_interviews(&self, application_id: Uuid) -> Result<Vec<Interview>> {
        let state = self.lock()?;
        let mut interviews: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| i.application_id == application_id)
            .cloned()
            .collect();
        interviews.sort_by_key(|i| (i.scheduled_at, i.created_at));
        Ok(interviews)
    }

    async fn insert_interview_guarded(
        &self,
        interview: Interview,
        guard: SlotGuard,
    ) -> Result<Interview> {
        let mut state = self.lock()?;
        let snapshot = state.snapshot(
            interview.application_id,
            interview.interviewer_id,
            interview.window(),
            None,
        )?;
        guard(&snapshot)?;
        state.interviews.insert(interview.id, interview.clone());
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
        let mut state = self.lock()?;
        let current = state
            .interviews
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))?;
        let snapshot = state.snapshot(
            current.application_id,
            current.interviewer_id,
            window,
            Some(current.clone()),
        )?;
        guard(&snapshot)?;

        let mut moved = current;
        moved.scheduled_at = window.start;
        moved.duration_minutes = window.duration_minutes;
        moved.status = InterviewStatus::Rescheduled;
        moved.reschedule_reason = reason;
        moved.updated_at = now;
        state.interviews.insert(id, moved.clone());
        Ok(moved)
    }

    async fn close_interview(
        &self,
        id: Uuid,
        outcome: InterviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<Interview> {
        let mut state = self.lock()?;
        let interview = state
            .interviews
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))?;
        if !interview.is_active() {
            return Err(Error::AlreadyTerminal(format!(
                "Interview {} is already {}",
                id, interview.status
            )));
        }
        outcome.apply_to(interview, now);
        Ok(interview.clone())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn insert_note(&self, note: Note) -> Result<Note> {
        self.lock()?.notes.push(note.clone());
        Ok(note)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.lock()?.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn update_note_content(
        &self,
        id: Uuid,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        let mut state = self.lock()?;
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound(format!("Note {} not found", id)))?;
        note.content = content;
        note.updated_at = now;
        Ok(note.clone())
    }

    async fn list_notes(&self, application_id: Uuid) -> Result<Vec<Note>> {
        Ok(self
            .lock()?
            .notes
            .iter()
            .filter(|n| n.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn upsert_flag(&self, flag: ActorFlag) -> Result<ActorFlag> {
        let mut state = self.lock()?;
        let key = (flag.application_id, flag.actor_id, flag.kind);
        let stored = state.flags.entry(key).or_insert_with(|| flag.clone());
        if stored.value != flag.value {
            *stored = flag;
        }
        Ok(stored.clone())
    }

    async fn get_flags(&self, application_id: Uuid, actor_id: Uuid) -> Result<Vec<ActorFlag>> {
        let state = self.lock()?;
        let mut flags: Vec<ActorFlag> = state
            .flags
            .values()
            .filter(|f| f.application_id == application_id && f.actor_id == actor_id)
            .cloned()
            .collect();
        flags.sort_by_key(|f| f.kind.as_str());
        Ok(flags)
    }
}
