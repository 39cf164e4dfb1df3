//! Runs against a real Postgres when `DATABASE_URL` is set; otherwise each
//! test returns immediately.

use std::env;
use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use hiring_pipeline::database::postgres::PgStore;
use hiring_pipeline::error::Error;
use hiring_pipeline::models::application::ApplicationStatus;
use hiring_pipeline::models::interview::{InterviewType, TimeWindow};
use hiring_pipeline::models::note::NoteVisibility;
use hiring_pipeline::services::authorization::PgAuthorization;
use hiring_pipeline::services::document_service::PgDocumentResolver;
use hiring_pipeline::services::interview_scheduler::ScheduleRequest;
use hiring_pipeline::services::job_directory::PgJobDirectory;
use hiring_pipeline::services::notification_service::NoopNotifier;
use hiring_pipeline::services::pipeline_service::{
    Collaborators, PipelineService, PipelineSettings, SubmitApplication,
};
use hiring_pipeline::utils::time::SystemClock;

struct Seeded {
    pipeline: PipelineService,
    job_id: Uuid,
    recruiter: Uuid,
    interviewer: Uuid,
}

async fn connect() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Some(pool)
}

async fn seed(pool: PgPool) -> Seeded {
    let company_id = Uuid::new_v4();
    let job_id = Uuid::new_v4();
    let recruiter = Uuid::new_v4();
    let interviewer = Uuid::new_v4();

    sqlx::query("INSERT INTO jobs (id, company_id, title) VALUES ($1, $2, $3)")
        .bind(job_id)
        .bind(company_id)
        .bind("Backend Engineer")
        .execute(&pool)
        .await
        .expect("seed job");
    for (user_id, role) in [(recruiter, "recruiter"), (interviewer, "interviewer")] {
        sqlx::query("INSERT INTO company_members (company_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(company_id)
            .bind(user_id)
            .bind(role)
            .execute(&pool)
            .await
            .expect("seed member");
    }

    let collaborators = Collaborators {
        authorization: Arc::new(PgAuthorization::new(pool.clone())),
        jobs: Arc::new(PgJobDirectory::new(pool.clone())),
        documents: Arc::new(PgDocumentResolver::new(pool.clone())),
        notifier: Arc::new(NoopNotifier),
    };
    let pipeline = PipelineService::new(
        Arc::new(PgStore::new(pool)),
        collaborators,
        Arc::new(SystemClock),
        PipelineSettings::default(),
    );
    Seeded {
        pipeline,
        job_id,
        recruiter,
        interviewer,
    }
}

async fn shortlisted(s: &Seeded) -> Uuid {
    let mut app = s
        .pipeline
        .submit_application(
            Uuid::new_v4(),
            SubmitApplication {
                job_id: s.job_id,
                cover_letter: None,
                resume_ref: None,
                source: Some("referral".into()),
            },
        )
        .await
        .expect("submit");
    for next in [ApplicationStatus::Screening, ApplicationStatus::Shortlisted] {
        app = s
            .pipeline
            .transition_status(s.recruiter, app.id, app.version, next, None)
            .await
            .expect("advance");
    }
    app.id
}

#[tokio::test]
async fn history_and_version_survive_a_round_trip() {
    let Some(pool) = connect().await else { return };
    let s = seed(pool).await;
    let id = shortlisted(&s).await;

    let app = s.pipeline.get_application(s.recruiter, id).await.unwrap();
    assert_eq!(app.version, 3);
    assert_eq!(app.status, ApplicationStatus::Shortlisted);
    assert_eq!(app.status_history.len(), 3);
    assert!(app.history_is_consistent());

    let err = s
        .pipeline
        .transition_status(s.recruiter, id, 2, ApplicationStatus::Interview, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConcurrentModification { expected: 2, actual: 3 }));
}

#[tokio::test]
async fn concurrent_bookings_serialize_per_interviewer() {
    let Some(pool) = connect().await else { return };
    let s = seed(pool).await;
    let start = (Utc::now() + Duration::days(7))
        .duration_trunc(Duration::hours(1))
        .unwrap();

    let mut apps = Vec::new();
    for _ in 0..5 {
        apps.push(shortlisted(&s).await);
    }

    let mut handles = Vec::new();
    for application_id in apps {
        let pipeline = s.pipeline.clone();
        let recruiter = s.recruiter;
        let request = ScheduleRequest {
            application_id,
            interviewer_id: s.interviewer,
            participants: vec![],
            window: TimeWindow::new(start, 45),
            interview_type: InterviewType::Phone,
            location: None,
        };
        handles.push(tokio::spawn(async move {
            pipeline.schedule_interview(recruiter, request).await
        }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(err) => assert!(matches!(err, Error::InterviewConflict { .. }), "{:?}", err),
        }
    }
    assert_eq!(booked, 1);
}

#[tokio::test]
async fn duplicate_submission_hits_the_unique_key() {
    let Some(pool) = connect().await else { return };
    let s = seed(pool).await;
    let candidate = Uuid::new_v4();
    let request = SubmitApplication {
        job_id: s.job_id,
        cover_letter: None,
        resume_ref: None,
        source: None,
    };

    s.pipeline
        .submit_application(candidate, request.clone())
        .await
        .unwrap();
    let err = s
        .pipeline
        .submit_application(candidate, request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateApplication));
}

#[tokio::test]
async fn flags_and_notes_persist() {
    let Some(pool) = connect().await else { return };
    let s = seed(pool).await;
    let id = shortlisted(&s).await;

    s.pipeline.mark_viewed(s.recruiter, id).await.unwrap();
    let once = s.pipeline.get_flags(s.recruiter, id).await.unwrap();
    s.pipeline.mark_viewed(s.recruiter, id).await.unwrap();
    assert_eq!(s.pipeline.get_flags(s.recruiter, id).await.unwrap(), once);

    let note = s
        .pipeline
        .add_note(s.interviewer, id, "Private impression".into(), NoteVisibility::Private)
        .await
        .unwrap();
    assert!(s.pipeline.list_notes(s.recruiter, id).await.unwrap().is_empty());
    let edited = s
        .pipeline
        .update_note(s.interviewer, note.id, "Revised impression".into())
        .await
        .unwrap();
    assert_eq!(edited.content, "Revised impression");
}
