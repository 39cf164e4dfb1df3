use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::interview_dto::{
        CancelInterviewPayload, CompleteInterviewPayload, RescheduleInterviewPayload,
        ScheduleInterviewPayload,
    },
    error::Result,
    middleware::auth::Actor,
    utils::validation::validate,
    AppState,
};

#[axum::debug_handler]
pub async fn list_interviews(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let interviews = state
        .pipeline
        .list_interviews(actor.id, application_id)
        .await?;
    Ok(Json(interviews))
}

#[axum::debug_handler]
pub async fn schedule_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<ScheduleInterviewPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let interview = state
        .pipeline
        .schedule_interview(actor.id, payload.into_request(application_id))
        .await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

#[axum::debug_handler]
pub async fn reschedule_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleInterviewPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let window = payload.window();
    let interview = state
        .pipeline
        .reschedule_interview(actor.id, id, window, payload.reason)
        .await?;
    Ok(Json(interview))
}

#[axum::debug_handler]
pub async fn complete_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteInterviewPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let interview = state
        .pipeline
        .complete_interview(actor.id, id, payload.into())
        .await?;
    Ok(Json(interview))
}

#[axum::debug_handler]
pub async fn cancel_interview(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelInterviewPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let interview = state
        .pipeline
        .cancel_interview(actor.id, id, payload.reason)
        .await?;
    Ok(Json(interview))
}
