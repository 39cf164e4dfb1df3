use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::store::{InterviewStore, SlotSnapshot};
use crate::error::{Error, Result};
use crate::models::application::ApplicationStatus;
use crate::models::interview::{
    Interview, InterviewDecision, InterviewOutcome, InterviewStatus, InterviewType, TimeWindow,
};
use crate::utils::time::Clock;

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub application_id: Uuid,
    pub interviewer_id: Uuid,
    pub participants: Vec<Uuid>,
    pub window: TimeWindow,
    pub interview_type: InterviewType,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompleteRequest {
    pub feedback: Option<String>,
    pub rating: Option<i16>,
    pub decision: InterviewDecision,
}

/// Rejects empty, oversized, past and unrepresentable windows.
pub fn check_window(window: &TimeWindow, now: DateTime<Utc>, max_minutes: i32) -> Result<()> {
    if window.duration_minutes <= 0 || window.duration_minutes > max_minutes {
        return Err(Error::BadRequest(format!(
            "Interview duration must be between 1 and {} minutes",
            max_minutes
        )));
    }
    if window.start < now {
        return Err(Error::BadRequest(
            "Interview cannot be scheduled in the past".to_string(),
        ));
    }
    if window.checked_end().is_none() {
        return Err(Error::BadRequest(
            "Interview ends outside the supported calendar range".to_string(),
        ));
    }
    Ok(())
}

/// First active interview of the interviewer that overlaps `window`.
pub fn find_conflict<'a>(
    window: &TimeWindow,
    interviewer_active: &'a [Interview],
) -> Option<&'a Interview> {
    interviewer_active
        .iter()
        .filter(|i| i.is_active() && i.window().overlaps(window))
        .min_by_key(|i| i.scheduled_at)
}

/// Validation run under the interviewer lock for a new interview.
fn check_new_slot(snapshot: &SlotSnapshot, window: &TimeWindow) -> Result<()> {
    let application = &snapshot.application;
    if application.status.is_terminal() {
        return Err(Error::AlreadyTerminal(format!(
            "Application {} is already {}",
            application.id, application.status
        )));
    }
    if !application.status.accepts_interviews() {
        return Err(Error::InvalidTransition {
            from: application.status,
            to: ApplicationStatus::Interview,
        });
    }
    if let Some(active) = snapshot.application_active.iter().find(|i| i.is_active()) {
        return Err(Error::InterviewConflict {
            interview_id: active.id,
        });
    }
    if let Some(clash) = find_conflict(window, &snapshot.interviewer_active) {
        return Err(Error::InterviewConflict {
            interview_id: clash.id,
        });
    }
    Ok(())
}

/// Validation run under the interviewer lock when moving an interview.
fn check_moved_slot(snapshot: &SlotSnapshot, window: &TimeWindow) -> Result<()> {
    let Some(moving) = snapshot.moving.as_ref() else {
        return Err(Error::Internal("reschedule without a moving interview".to_string()));
    };
    if !moving.is_active() {
        return Err(Error::AlreadyTerminal(format!(
            "Interview {} is already {}",
            moving.id, moving.status
        )));
    }
    if snapshot.application.status.is_terminal() {
        return Err(Error::AlreadyTerminal(format!(
            "Application {} is already {}",
            snapshot.application.id, snapshot.application.status
        )));
    }
    if let Some(clash) = find_conflict(window, &snapshot.interviewer_active) {
        return Err(Error::InterviewConflict {
            interview_id: clash.id,
        });
    }
    Ok(())
}

#[derive(Clone)]
pub struct InterviewScheduler {
    store: Arc<dyn InterviewStore>,
    clock: Arc<dyn Clock>,
    max_duration_minutes: i32,
}

impl InterviewScheduler {
    pub fn new(store: Arc<dyn InterviewStore>, clock: Arc<dyn Clock>, max_duration_minutes: i32) -> Self {
        Self {
            store,
            clock,
            max_duration_minutes,
        }
    }

    pub async fn load(&self, id: Uuid) -> Result<Interview> {
        self.store
            .get_interview(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", id)))
    }

    pub async fn list_for_application(&self, application_id: Uuid) -> Result<Vec<Interview>> {
        self.store.list_application_interviews(application_id).await
    }

    pub async fn schedule(&self, request: ScheduleRequest) -> Result<Interview> {
        let now = self.clock.now();
        check_window(&request.window, now, self.max_duration_minutes)?;

        let mut participants = request.participants;
        participants.retain(|p| *p != request.interviewer_id);
        participants.sort();
        participants.dedup();

        let interview = Interview {
            id: Uuid::new_v4(),
            application_id: request.application_id,
            interviewer_id: request.interviewer_id,
            participants,
            interview_type: request.interview_type,
            scheduled_at: request.window.start,
            duration_minutes: request.window.duration_minutes,
            location: request.location,
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            decision: None,
            completed_by: None,
            cancel_reason: None,
            cancelled_by: None,
            reschedule_reason: None,
            created_at: now,
            updated_at: now,
        };

        let window = request.window;
        self.store
            .insert_interview_guarded(
                interview,
                Box::new(move |snapshot: &SlotSnapshot| check_new_slot(snapshot, &window)),
            )
            .await
    }

    pub async fn reschedule(
        &self,
        interview_id: Uuid,
        window: TimeWindow,
        reason: Option<String>,
    ) -> Result<Interview> {
        let now = self.clock.now();
        check_window(&window, now, self.max_duration_minutes)?;

        self.store
            .move_interview_guarded(
                interview_id,
                window,
                reason,
                now,
                Box::new(move |snapshot: &SlotSnapshot| check_moved_slot(snapshot, &window)),
            )
            .await
    }

    /// Records the outcome. The application's stage is left as it is.
    pub async fn complete(
        &self,
        interview_id: Uuid,
        request: CompleteRequest,
        completed_by: Uuid,
    ) -> Result<Interview> {
        if let Some(rating) = request.rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::BadRequest("Rating must be between 1 and 5".to_string()));
            }
        }
        let outcome = InterviewOutcome::Completed {
            feedback: request.feedback,
            rating: request.rating,
            decision: request.decision,
            completed_by,
        };
        self.store
            .close_interview(interview_id, outcome, self.clock.now())
            .await
    }

    pub async fn cancel(
        &self,
        interview_id: Uuid,
        reason: Option<String>,
        cancelled_by: Uuid,
    ) -> Result<Interview> {
        let outcome = InterviewOutcome::Cancelled {
            reason,
            cancelled_by,
        };
        self.store
            .close_interview(interview_id, outcome, self.clock.now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::store::ApplicationStore;
    use crate::models::application::{Application, NewApplication, StatusChange};
    use crate::utils::time::FixedClock;
    use chrono::Duration;

    const MAX_MINUTES: i32 = 480;

    fn at(hhmm: &str) -> DateTime<Utc> {
        format!("2030-05-06T{}:00Z", hhmm).parse().unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        scheduler: InterviewScheduler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(at("08:00")));
        let scheduler = InterviewScheduler::new(store.clone(), clock.clone(), MAX_MINUTES);
        Fixture {
            store,
            clock,
            scheduler,
        }
    }

    async fn application_at(store: &MemoryStore, status: ApplicationStatus) -> Application {
        let mut app = NewApplication {
            job_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            cover_letter: None,
            resume_ref: None,
            source: None,
        }
        .into_application(at("07:00"));
        app.status = status;
        app.status_history.push(StatusChange {
            status,
            actor_id: Uuid::new_v4(),
            note: None,
            changed_at: at("07:00"),
        });
        store.insert_application(app).await.unwrap()
    }

    fn request(application_id: Uuid, interviewer_id: Uuid, start: &str, minutes: i32) -> ScheduleRequest {
        ScheduleRequest {
            application_id,
            interviewer_id,
            participants: Vec::new(),
            window: TimeWindow::new(at(start), minutes),
            interview_type: InterviewType::Video,
            location: Some("https://meet.example/room".into()),
        }
    }

    #[tokio::test]
    async fn overlapping_window_for_same_interviewer_conflicts() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let first_app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;
        let second_app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;

        let first = fx
            .scheduler
            .schedule(request(first_app.id, interviewer, "10:00", 30))
            .await
            .unwrap();
        let err = fx
            .scheduler
            .schedule(request(second_app.id, interviewer, "10:15", 30))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InterviewConflict { interview_id } if interview_id == first.id));
    }

    #[tokio::test]
    async fn back_to_back_windows_are_allowed() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let a = application_at(&fx.store, ApplicationStatus::Shortlisted).await;
        let b = application_at(&fx.store, ApplicationStatus::Interview).await;

        fx.scheduler
            .schedule(request(a.id, interviewer, "10:00", 30))
            .await
            .unwrap();
        fx.scheduler
            .schedule(request(b.id, interviewer, "10:30", 30))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn other_interviewers_are_independent() {
        let fx = fixture();
        let a = application_at(&fx.store, ApplicationStatus::Shortlisted).await;
        let b = application_at(&fx.store, ApplicationStatus::Shortlisted).await;

        fx.scheduler
            .schedule(request(a.id, Uuid::new_v4(), "10:00", 60))
            .await
            .unwrap();
        fx.scheduler
            .schedule(request(b.id, Uuid::new_v4(), "10:00", 60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn early_stages_cannot_be_interviewed() {
        let fx = fixture();
        let app = application_at(&fx.store, ApplicationStatus::Screening).await;
        let err = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "10:00", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        let rejected = application_at(&fx.store, ApplicationStatus::Rejected).await;
        let err = fx
            .scheduler
            .schedule(request(rejected.id, Uuid::new_v4(), "10:00", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn one_active_interview_per_application() {
        let fx = fixture();
        let app = application_at(&fx.store, ApplicationStatus::Interview).await;
        let first = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "10:00", 30))
            .await
            .unwrap();

        let err = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "14:00", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InterviewConflict { interview_id } if interview_id == first.id));
    }

    #[tokio::test]
    async fn cancel_frees_the_slot() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;

        let first = fx
            .scheduler
            .schedule(request(app.id, interviewer, "10:00", 30))
            .await
            .unwrap();
        let cancelled = fx
            .scheduler
            .cancel(first.id, Some("candidate unwell".into()), interviewer)
            .await
            .unwrap();
        assert_eq!(cancelled.status, InterviewStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("candidate unwell"));

        let again = fx
            .scheduler
            .schedule(request(app.id, interviewer, "10:00", 30))
            .await
            .unwrap();
        assert_ne!(again.id, first.id);
    }

    #[tokio::test]
    async fn reschedule_keeps_identity_and_ignores_itself() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let app = application_at(&fx.store, ApplicationStatus::Interview).await;
        let interview = fx
            .scheduler
            .schedule(request(app.id, interviewer, "10:00", 60))
            .await
            .unwrap();

        let moved = fx
            .scheduler
            .reschedule(
                interview.id,
                TimeWindow::new(at("10:30"), 60),
                Some("interviewer running late".into()),
            )
            .await
            .unwrap();

        assert_eq!(moved.id, interview.id);
        assert_eq!(moved.application_id, app.id);
        assert_eq!(moved.status, InterviewStatus::Rescheduled);
        assert_eq!(moved.scheduled_at, at("10:30"));
        assert_eq!(moved.reschedule_reason.as_deref(), Some("interviewer running late"));
    }

    #[tokio::test]
    async fn reschedule_onto_a_busy_slot_conflicts() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let a = application_at(&fx.store, ApplicationStatus::Interview).await;
        let b = application_at(&fx.store, ApplicationStatus::Interview).await;
        let busy = fx
            .scheduler
            .schedule(request(a.id, interviewer, "13:00", 60))
            .await
            .unwrap();
        let other = fx
            .scheduler
            .schedule(request(b.id, interviewer, "09:00", 30))
            .await
            .unwrap();

        let err = fx
            .scheduler
            .reschedule(other.id, TimeWindow::new(at("13:30"), 30), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InterviewConflict { interview_id } if interview_id == busy.id));

        let unchanged = fx.scheduler.load(other.id).await.unwrap();
        assert_eq!(unchanged.scheduled_at, at("09:00"));
        assert_eq!(unchanged.status, InterviewStatus::Scheduled);
    }

    #[tokio::test]
    async fn closed_interviews_cannot_change() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let app = application_at(&fx.store, ApplicationStatus::Interview).await;
        let interview = fx
            .scheduler
            .schedule(request(app.id, interviewer, "10:00", 30))
            .await
            .unwrap();

        let completed = fx
            .scheduler
            .complete(
                interview.id,
                CompleteRequest {
                    feedback: Some("solid system design".into()),
                    rating: Some(4),
                    decision: InterviewDecision::Pass,
                },
                interviewer,
            )
            .await
            .unwrap();
        assert_eq!(completed.status, InterviewStatus::Completed);
        assert_eq!(completed.decision, Some(InterviewDecision::Pass));
        assert_eq!(completed.completed_by, Some(interviewer));

        assert!(matches!(
            fx.scheduler.cancel(interview.id, None, interviewer).await,
            Err(Error::AlreadyTerminal(_))
        ));
        assert!(matches!(
            fx.scheduler
                .reschedule(interview.id, TimeWindow::new(at("15:00"), 30), None)
                .await,
            Err(Error::AlreadyTerminal(_))
        ));
    }

    #[tokio::test]
    async fn invalid_windows_and_ratings_are_rejected() {
        let fx = fixture();
        let app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;

        let past = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "07:30", 30))
            .await;
        assert!(matches!(past, Err(Error::BadRequest(_))));

        let too_long = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "10:00", MAX_MINUTES + 1))
            .await;
        assert!(matches!(too_long, Err(Error::BadRequest(_))));

        let interview = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "10:00", 30))
            .await
            .unwrap();
        let bad_rating = fx
            .scheduler
            .complete(
                interview.id,
                CompleteRequest {
                    feedback: None,
                    rating: Some(9),
                    decision: InterviewDecision::Hold,
                },
                Uuid::new_v4(),
            )
            .await;
        assert!(matches!(bad_rating, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn window_ending_past_the_calendar_is_rejected() {
        let fx = fixture();
        let app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;
        let interviewer = Uuid::new_v4();
        let mut edge = request(app.id, interviewer, "10:00", 30);
        edge.window = TimeWindow::new(DateTime::<Utc>::MAX_UTC - Duration::minutes(1), 30);

        let err = fx.scheduler.schedule(edge).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let booked = fx
            .scheduler
            .schedule(request(app.id, interviewer, "10:00", 30))
            .await
            .unwrap();
        let err = fx
            .scheduler
            .reschedule(
                booked.id,
                TimeWindow::new(DateTime::<Utc>::MAX_UTC - Duration::minutes(1), 30),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(fx.scheduler.load(booked.id).await.is_ok());
    }

    #[tokio::test]
    async fn clock_decides_what_is_past() {
        let fx = fixture();
        let app = application_at(&fx.store, ApplicationStatus::Shortlisted).await;
        fx.clock.advance(Duration::hours(3));

        let err = fx
            .scheduler
            .schedule(request(app.id, Uuid::new_v4(), "10:00", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn concurrent_bookings_never_double_book() {
        let fx = fixture();
        let interviewer = Uuid::new_v4();
        let mut apps = Vec::new();
        for _ in 0..6 {
            apps.push(application_at(&fx.store, ApplicationStatus::Shortlisted).await);
        }

        let handles: Vec<_> = apps
            .iter()
            .enumerate()
            .map(|(i, app)| {
                let scheduler = fx.scheduler.clone();
                let start = format!("10:{:02}", i * 5);
                let req = request(app.id, interviewer, &start, 30);
                tokio::spawn(async move { scheduler.schedule(req).await })
            })
            .collect();

        let mut booked = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(interview) => booked.push(interview),
                Err(err) => assert!(matches!(err, Error::InterviewConflict { .. })),
            }
        }

        assert!(!booked.is_empty());
        for (i, a) in booked.iter().enumerate() {
            for b in booked.iter().skip(i + 1) {
                assert!(!a.window().overlaps(&b.window()));
            }
        }
    }
}
