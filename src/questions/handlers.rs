use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AnswerRequest, AskRequest, QuestionEnvelope, ReviseRequest};
use super::repo_types::Question;
use super::services;
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", post(ask_question))
        .route("/questions/mine", get(list_mine))
        .route("/questions/:id", get(get_question).patch(revise_question))
        .route("/questions/:id/answer", patch(answer_question))
}

#[instrument(skip(state, payload))]
pub async fn ask_question(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuestionEnvelope>), AppError> {
    let Json(payload) = payload?;
    let question = services::ask(&state, &claim, payload).await?;
    Ok((StatusCode::CREATED, Json(QuestionEnvelope { question })))
}

#[instrument(skip(state))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
) -> Result<Json<Vec<Question>>, AppError> {
    Ok(Json(services::list_mine(&state, &claim).await?))
}

#[instrument(skip(state))]
pub async fn get_question(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<QuestionEnvelope>, AppError> {
    let Path(id) = id?;
    let question = services::view(&state, &claim, id).await?;
    Ok(Json(QuestionEnvelope { question }))
}

#[instrument(skip(state, payload))]
pub async fn revise_question(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviseRequest>, JsonRejection>,
) -> Result<Json<QuestionEnvelope>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let question = services::revise(&state, &claim, id, payload).await?;
    Ok(Json(QuestionEnvelope { question }))
}

#[instrument(skip(state, payload))]
pub async fn answer_question(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<QuestionEnvelope>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let question = services::answer(&state, &claim, id, payload).await?;
    Ok(Json(QuestionEnvelope { question }))
}
