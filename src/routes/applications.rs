use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::application_dto::{
        ApplicationListResponse, ApplicationResponse, BulkTransitionPayload,
        BulkTransitionResponse, SubmitApplicationPayload, TransitionPayload, WithdrawPayload,
    },
    error::Result,
    middleware::auth::Actor,
    utils::validation::validate,
    AppState,
};

#[axum::debug_handler]
pub async fn submit_application(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<SubmitApplicationPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let application = state
        .pipeline
        .submit_application(actor.id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(ApplicationResponse::from(application))))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let application = state.pipeline.get_application(actor.id, id).await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn list_job_applications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let applications = state
        .pipeline
        .list_job_applications(actor.id, job_id)
        .await?;
    Ok(Json(ApplicationListResponse::from(applications)))
}

#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let application = state
        .pipeline
        .transition_status(
            actor.id,
            id,
            payload.expected_version,
            payload.status,
            payload.note,
        )
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn bulk_transition_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<BulkTransitionPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let report = state
        .pipeline
        .bulk_transition_status(
            actor.id,
            &payload.application_ids,
            payload.status,
            payload.note,
        )
        .await?;
    Ok(Json(BulkTransitionResponse::from(report)))
}

#[axum::debug_handler]
pub async fn withdraw_application(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WithdrawPayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let application = state
        .pipeline
        .withdraw_application(actor.id, id, payload.expected_version, payload.note)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}
