use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::note_dto::{AddNotePayload, BookmarkPayload, UpdateNotePayload},
    error::Result,
    middleware::auth::Actor,
    utils::validation::validate,
    AppState,
};

#[axum::debug_handler]
pub async fn list_notes(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let notes = state.pipeline.list_notes(actor.id, application_id).await?;
    Ok(Json(notes))
}

#[axum::debug_handler]
pub async fn add_note(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let note = state
        .pipeline
        .add_note(actor.id, application_id, payload.content, payload.visibility)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[axum::debug_handler]
pub async fn update_note(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(note_id): Path<Uuid>,
    Json(payload): Json<UpdateNotePayload>,
) -> Result<impl IntoResponse> {
    validate(&payload)?;
    let note = state
        .pipeline
        .update_note(actor.id, note_id, payload.content)
        .await?;
    Ok(Json(note))
}

#[axum::debug_handler]
pub async fn set_bookmark(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<BookmarkPayload>,
) -> Result<impl IntoResponse> {
    let flag = state
        .pipeline
        .set_bookmark(actor.id, application_id, payload.value)
        .await?;
    Ok(Json(flag))
}

#[axum::debug_handler]
pub async fn mark_viewed(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let flag = state.pipeline.mark_viewed(actor.id, application_id).await?;
    Ok(Json(flag))
}

#[axum::debug_handler]
pub async fn get_flags(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let flags = state.pipeline.get_flags(actor.id, application_id).await?;
    Ok(Json(flags))
}
