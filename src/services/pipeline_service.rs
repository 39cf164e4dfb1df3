//! Authorized entry point over the hiring pipeline.
//!
//! Every operation resolves the owning company, checks the actor's role
//! against it, delegates to the engine that owns the rule and only then
//! emits a notification. Failures are logged in the operation's span and
//! returned untouched.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::database::store::{ApplicationStore, InterviewStore, NoteStore};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::interview::{Interview, TimeWindow};
use crate::models::note::{ActorFlag, ActorFlags, Note, NoteVisibility};
use crate::services::authorization::{AuthorizationProvider, Permission, Role};
use crate::services::document_service::DocumentResolver;
use crate::services::interview_scheduler::{CompleteRequest, InterviewScheduler, ScheduleRequest};
use crate::services::job_directory::JobDirectory;
use crate::services::note_service::NoteService;
use crate::services::notification_service::{NotificationSink, PipelineEvent, PipelineEventKind};
use crate::services::state_machine::{AccessGate, ApplicationStateMachine, BulkTransitionReport};
use crate::utils::time::Clock;

pub const MAX_NOTE_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_bulk_size: usize,
    pub max_interview_minutes: i32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_bulk_size: 200,
            max_interview_minutes: 480,
        }
    }
}

/// Services the pipeline consults but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub authorization: Arc<dyn AuthorizationProvider>,
    pub jobs: Arc<dyn JobDirectory>,
    pub documents: Arc<dyn DocumentResolver>,
    pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Debug, Clone)]
pub struct SubmitApplication {
    pub job_id: Uuid,
    pub cover_letter: Option<String>,
    pub resume_ref: Option<String>,
    pub source: Option<String>,
}

/// Admits an application when the actor holds `permission` in its company.
struct PermissionGate<'a> {
    authorization: &'a dyn AuthorizationProvider,
    actor_id: Uuid,
    permission: Permission,
}

#[async_trait]
impl<'a> AccessGate for PermissionGate<'a> {
    async fn admit(&self, application: &Application) -> Result<()> {
        require_role(
            self.authorization,
            self.actor_id,
            application.company_id,
            self.permission.required_role(),
        )
        .await
    }
}

/// Admits only the candidate who owns the application.
struct CandidateGate {
    actor_id: Uuid,
}

#[async_trait]
impl AccessGate for CandidateGate {
    async fn admit(&self, application: &Application) -> Result<()> {
        if application.is_owned_by(self.actor_id) {
            Ok(())
        } else {
            Err(Error::NotAuthorized(
                "Only the candidate may withdraw an application".to_string(),
            ))
        }
    }
}

async fn require_role(
    authorization: &dyn AuthorizationProvider,
    actor_id: Uuid,
    company_id: Uuid,
    role: Role,
) -> Result<()> {
    if authorization.has_role(actor_id, company_id, role).await? {
        Ok(())
    } else {
        Err(Error::NotAuthorized(format!(
            "The {} role is required for this action",
            role
        )))
    }
}

fn finish<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => tracing::info!(operation, "pipeline operation succeeded"),
        Err(err) if err.status_code().is_server_error() => {
            tracing::error!(operation, error = %err, "pipeline operation failed")
        }
        Err(err) => tracing::info!(operation, code = err.code(), error = %err, "pipeline operation rejected"),
    }
    result
}

#[derive(Clone)]
pub struct PipelineService {
    applications: ApplicationStateMachine,
    interviews: InterviewScheduler,
    notes: NoteService,
    application_store: Arc<dyn ApplicationStore>,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl PipelineService {
    pub fn new<S>(
        store: Arc<S>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self
    where
        S: ApplicationStore + InterviewStore + NoteStore + 'static,
    {
        let application_store: Arc<dyn ApplicationStore> = store.clone();
        let interview_store: Arc<dyn InterviewStore> = store.clone();
        let note_store: Arc<dyn NoteStore> = store;

        Self {
            applications: ApplicationStateMachine::new(application_store.clone(), clock.clone()),
            interviews: InterviewScheduler::new(
                interview_store,
                clock.clone(),
                settings.max_interview_minutes,
            ),
            notes: NoteService::new(note_store, clock.clone()),
            application_store,
            collaborators,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    async fn authorize(&self, actor_id: Uuid, company_id: Uuid, permission: Permission) -> Result<()> {
        require_role(
            self.collaborators.authorization.as_ref(),
            actor_id,
            company_id,
            permission.required_role(),
        )
        .await
    }

    /// Employers with view access, or the candidate on their own application.
    async fn authorize_reader(&self, actor_id: Uuid, application: &Application) -> Result<()> {
        if application.is_owned_by(actor_id) {
            return Ok(());
        }
        self.authorize(actor_id, application.company_id, Permission::ViewApplications)
            .await
    }

    fn gate(&self, actor_id: Uuid, permission: Permission) -> PermissionGate<'_> {
        PermissionGate {
            authorization: self.collaborators.authorization.as_ref(),
            actor_id,
            permission,
        }
    }

    fn emit(
        &self,
        event: PipelineEventKind,
        application: &Application,
        actor_id: Uuid,
        payload: serde_json::Value,
    ) {
        self.collaborators.notifier.notify(PipelineEvent {
            event,
            application_id: application.id,
            company_id: application.company_id,
            candidate_id: application.candidate_id,
            actor_id,
            occurred_at: self.clock.now(),
            payload,
        });
    }

    fn emit_status_change(&self, application: &Application, actor_id: Uuid) {
        let from = application
            .status_history
            .iter()
            .rev()
            .nth(1)
            .map(|change| change.status);
        let note = application
            .status_history
            .last()
            .and_then(|change| change.note.clone());
        self.emit(
            PipelineEventKind::StatusChanged,
            application,
            actor_id,
            json!({
                "from": from,
                "to": application.status,
                "version": application.version,
                "note": note,
            }),
        );
    }

    fn emit_interview(&self, event: PipelineEventKind, application: &Application, interview: &Interview, actor_id: Uuid) {
        self.emit(
            event,
            application,
            actor_id,
            json!({
                "interview_id": interview.id,
                "interviewer_id": interview.interviewer_id,
                "status": interview.status,
                "scheduled_at": interview.scheduled_at,
                "duration_minutes": interview.duration_minutes,
                "decision": interview.decision,
            }),
        );
    }

    async fn interview_with_application(&self, interview_id: Uuid) -> Result<(Interview, Application)> {
        let interview = self.interviews.load(interview_id).await?;
        let application = self.applications.load(interview.application_id).await?;
        Ok((interview, application))
    }

    #[instrument(skip_all, fields(actor_id = %candidate_id, job_id = %request.job_id))]
    pub async fn submit_application(
        &self,
        candidate_id: Uuid,
        request: SubmitApplication,
    ) -> Result<Application> {
        let result = async {
            let company_id = self
                .collaborators
                .jobs
                .company_for_job(request.job_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Job {} not found", request.job_id)))?;

            if let Some(reference) = request.resume_ref.as_deref() {
                if !self.collaborators.documents.exists(reference).await? {
                    return Err(Error::BadRequest(format!(
                        "Unknown resume reference: {}",
                        reference
                    )));
                }
            }

            let application = NewApplication {
                job_id: request.job_id,
                company_id,
                candidate_id,
                cover_letter: request.cover_letter,
                resume_ref: request.resume_ref,
                source: request.source,
            }
            .into_application(self.clock.now());
            let application = self.application_store.insert_application(application).await?;

            self.emit(
                PipelineEventKind::ApplicationSubmitted,
                &application,
                candidate_id,
                json!({ "job_id": application.job_id, "source": application.source }),
            );
            Ok::<_, Error>(application)
        }
        .await;
        finish("submit_application", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id, target = %target))]
    pub async fn transition_status(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
        expected_version: i64,
        target: ApplicationStatus,
        note: Option<String>,
    ) -> Result<Application> {
        let gate = self.gate(actor_id, Permission::ManagePipeline);
        let result = self
            .applications
            .transition(application_id, expected_version, target, actor_id, note, &gate)
            .await;
        if let Ok(application) = &result {
            self.emit_status_change(application, actor_id);
        }
        finish("transition_status", result)
    }

    /// Oversized batches are refused before any item is touched; otherwise
    /// each item succeeds or fails on its own.
    #[instrument(skip_all, fields(actor_id = %actor_id, target = %target, items = application_ids.len()))]
    pub async fn bulk_transition_status(
        &self,
        actor_id: Uuid,
        application_ids: &[Uuid],
        target: ApplicationStatus,
        note: Option<String>,
    ) -> Result<BulkTransitionReport> {
        if application_ids.len() > self.settings.max_bulk_size {
            return finish(
                "bulk_transition_status",
                Err(Error::BadRequest(format!(
                    "At most {} applications can be moved at once",
                    self.settings.max_bulk_size
                ))),
            );
        }

        let gate = self.gate(actor_id, Permission::ManagePipeline);
        let report = self
            .applications
            .bulk_transition(application_ids, target, actor_id, note, &gate)
            .await;
        for application in &report.succeeded {
            self.emit_status_change(application, actor_id);
        }
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk transition finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn withdraw_application(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
        expected_version: i64,
        note: Option<String>,
    ) -> Result<Application> {
        let gate = CandidateGate { actor_id };
        let result = self
            .applications
            .transition(
                application_id,
                expected_version,
                ApplicationStatus::Withdrawn,
                actor_id,
                note,
                &gate,
            )
            .await;
        if let Ok(application) = &result {
            self.emit_status_change(application, actor_id);
        }
        finish("withdraw_application", result)
    }

    /// The interviewer must belong to the hiring team of the application's
    /// company.
    #[instrument(skip_all, fields(
        actor_id = %actor_id,
        application_id = %request.application_id,
        interviewer_id = %request.interviewer_id
    ))]
    pub async fn schedule_interview(&self, actor_id: Uuid, request: ScheduleRequest) -> Result<Interview> {
        let result = async {
            let application = self.applications.load(request.application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ManageInterviews)
                .await?;

            let interviewer_ok = self
                .collaborators
                .authorization
                .has_role(request.interviewer_id, application.company_id, Role::Interviewer)
                .await?;
            if !interviewer_ok {
                return Err(Error::BadRequest(format!(
                    "User {} cannot interview for this company",
                    request.interviewer_id
                )));
            }

            let interview = self.interviews.schedule(request).await?;
            self.emit_interview(PipelineEventKind::InterviewScheduled, &application, &interview, actor_id);
            Ok::<_, Error>(interview)
        }
        .await;
        finish("schedule_interview", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, interview_id = %interview_id))]
    pub async fn reschedule_interview(
        &self,
        actor_id: Uuid,
        interview_id: Uuid,
        window: TimeWindow,
        reason: Option<String>,
    ) -> Result<Interview> {
        let result = async {
            let (_, application) = self.interview_with_application(interview_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ManageInterviews)
                .await?;
            let interview = self.interviews.reschedule(interview_id, window, reason).await?;
            self.emit_interview(PipelineEventKind::InterviewRescheduled, &application, &interview, actor_id);
            Ok::<_, Error>(interview)
        }
        .await;
        finish("reschedule_interview", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, interview_id = %interview_id))]
    pub async fn complete_interview(
        &self,
        actor_id: Uuid,
        interview_id: Uuid,
        request: CompleteRequest,
    ) -> Result<Interview> {
        let result = async {
            let (_, application) = self.interview_with_application(interview_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ConductInterviews)
                .await?;
            let interview = self.interviews.complete(interview_id, request, actor_id).await?;
            self.emit_interview(PipelineEventKind::InterviewCompleted, &application, &interview, actor_id);
            Ok::<_, Error>(interview)
        }
        .await;
        finish("complete_interview", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, interview_id = %interview_id))]
    pub async fn cancel_interview(
        &self,
        actor_id: Uuid,
        interview_id: Uuid,
        reason: Option<String>,
    ) -> Result<Interview> {
        let result = async {
            let (_, application) = self.interview_with_application(interview_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ManageInterviews)
                .await?;
            let interview = self.interviews.cancel(interview_id, reason, actor_id).await?;
            self.emit_interview(PipelineEventKind::InterviewCancelled, &application, &interview, actor_id);
            Ok::<_, Error>(interview)
        }
        .await;
        finish("cancel_interview", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn add_note(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
        content: String,
        visibility: NoteVisibility,
    ) -> Result<Note> {
        let result = async {
            check_note_content(&content)?;
            let application = self.applications.load(application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::WriteNotes)
                .await?;
            self.notes.add(application_id, actor_id, content, visibility).await
        }
        .await;
        finish("add_note", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, note_id = %note_id))]
    pub async fn update_note(&self, actor_id: Uuid, note_id: Uuid, content: String) -> Result<Note> {
        let result = async {
            check_note_content(&content)?;
            let note = self.notes.load(note_id).await?;
            if note.author_id != actor_id {
                return Err(Error::NotAuthor);
            }
            let application = self.applications.load(note.application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::WriteNotes)
                .await?;
            self.notes.update(note_id, actor_id, content).await
        }
        .await;
        finish("update_note", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn list_notes(&self, actor_id: Uuid, application_id: Uuid) -> Result<Vec<Note>> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ViewApplications)
                .await?;
            self.notes.list_visible(application_id, actor_id).await
        }
        .await;
        finish("list_notes", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id, value = value))]
    pub async fn set_bookmark(&self, actor_id: Uuid, application_id: Uuid, value: bool) -> Result<ActorFlag> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ViewApplications)
                .await?;
            self.notes.set_bookmark(application_id, actor_id, value).await
        }
        .await;
        finish("set_bookmark", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn mark_viewed(&self, actor_id: Uuid, application_id: Uuid) -> Result<ActorFlag> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ViewApplications)
                .await?;
            self.notes.mark_viewed(application_id, actor_id).await
        }
        .await;
        finish("mark_viewed", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn get_flags(&self, actor_id: Uuid, application_id: Uuid) -> Result<ActorFlags> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize(actor_id, application.company_id, Permission::ViewApplications)
                .await?;
            self.notes.flags(application_id, actor_id).await
        }
        .await;
        finish("get_flags", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn get_application(&self, actor_id: Uuid, application_id: Uuid) -> Result<Application> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize_reader(actor_id, &application).await?;
            Ok::<_, Error>(application)
        }
        .await;
        finish("get_application", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, job_id = %job_id))]
    pub async fn list_job_applications(&self, actor_id: Uuid, job_id: Uuid) -> Result<Vec<Application>> {
        let result = async {
            let company_id = self
                .collaborators
                .jobs
                .company_for_job(job_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;
            self.authorize(actor_id, company_id, Permission::ViewApplications)
                .await?;
            self.application_store.list_job_applications(job_id).await
        }
        .await;
        finish("list_job_applications", result)
    }

    #[instrument(skip_all, fields(actor_id = %actor_id, application_id = %application_id))]
    pub async fn list_interviews(&self, actor_id: Uuid, application_id: Uuid) -> Result<Vec<Interview>> {
        let result = async {
            let application = self.applications.load(application_id).await?;
            self.authorize_reader(actor_id, &application).await?;
            self.interviews.list_for_application(application_id).await
        }
        .await;
        finish("list_interviews", result)
    }
}

fn check_note_content(content: &str) -> Result<()> {
    let len = content.chars().count();
    if content.trim().is_empty() || len > MAX_NOTE_CHARS {
        return Err(Error::BadRequest(format!(
            "Note content must be between 1 and {} characters",
            MAX_NOTE_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::services::authorization::MockAuthorizationProvider;
    use crate::services::document_service::StaticDocuments;
    use crate::services::job_directory::StaticJobDirectory;
    use crate::services::notification_service::MockNotificationSink;
    use crate::utils::time::SystemClock;

    struct Setup {
        service: PipelineService,
        job_id: Uuid,
    }

    fn setup(authorization: MockAuthorizationProvider, notifier: MockNotificationSink) -> Setup {
        let job_id = Uuid::new_v4();
        let collaborators = Collaborators {
            authorization: Arc::new(authorization),
            jobs: Arc::new(StaticJobDirectory::new().with_job(job_id, Uuid::new_v4())),
            documents: Arc::new(StaticDocuments::new().with_document("cv-1.pdf")),
            notifier: Arc::new(notifier),
        };
        Setup {
            service: PipelineService::new(
                Arc::new(MemoryStore::new()),
                collaborators,
                Arc::new(SystemClock),
                PipelineSettings::default(),
            ),
            job_id,
        }
    }

    fn submission(job_id: Uuid) -> SubmitApplication {
        SubmitApplication {
            job_id,
            cover_letter: Some("Hello".into()),
            resume_ref: Some("cv-1.pdf".into()),
            source: None,
        }
    }

    #[tokio::test]
    async fn denied_transition_writes_and_notifies_nothing() {
        let mut authorization = MockAuthorizationProvider::new();
        authorization.expect_has_role().returning(|_, _, _| Ok(false));
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_notify()
            .withf(|event| event.event == PipelineEventKind::ApplicationSubmitted)
            .times(1)
            .return_const(());

        let Setup { service, job_id } = setup(authorization, notifier);
        let candidate = Uuid::new_v4();
        let application = service
            .submit_application(candidate, submission(job_id))
            .await
            .unwrap();

        let err = service
            .transition_status(
                Uuid::new_v4(),
                application.id,
                application.version,
                ApplicationStatus::Screening,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized(_)));

        let stored = service.get_application(candidate, application.id).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, ApplicationStatus::Applied);
    }

    #[tokio::test]
    async fn successful_transition_notifies_once_with_new_status() {
        let mut authorization = MockAuthorizationProvider::new();
        authorization
            .expect_has_role()
            .withf(|_, _, role| *role == Role::Recruiter)
            .returning(|_, _, _| Ok(true));
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_notify()
            .withf(|event| event.event == PipelineEventKind::ApplicationSubmitted)
            .times(1)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|event| {
                event.event == PipelineEventKind::StatusChanged
                    && event.payload["to"] == "screening"
                    && event.payload["from"] == "applied"
            })
            .times(1)
            .return_const(());

        let Setup { service, job_id } = setup(authorization, notifier);
        let application = service
            .submit_application(Uuid::new_v4(), submission(job_id))
            .await
            .unwrap();
        let updated = service
            .transition_status(
                Uuid::new_v4(),
                application.id,
                1,
                ApplicationStatus::Screening,
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn unknown_resume_reference_is_rejected() {
        let Setup { service, job_id } =
            setup(MockAuthorizationProvider::new(), MockNotificationSink::new());
        let mut request = submission(job_id);
        request.resume_ref = Some("missing.pdf".into());

        let err = service
            .submit_application(Uuid::new_v4(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn oversized_bulk_is_refused_before_any_lookup() {
        let Setup { service, .. } =
            setup(MockAuthorizationProvider::new(), MockNotificationSink::new());
        let ids: Vec<Uuid> = (0..=service.settings().max_bulk_size)
            .map(|_| Uuid::new_v4())
            .collect();

        let err = service
            .bulk_transition_status(Uuid::new_v4(), &ids, ApplicationStatus::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn note_content_bounds() {
        assert!(check_note_content("ok").is_ok());
        assert!(check_note_content("   ").is_err());
        assert!(check_note_content(&"x".repeat(MAX_NOTE_CHARS)).is_ok());
        assert!(check_note_content(&"x".repeat(MAX_NOTE_CHARS + 1)).is_err());
    }
}
