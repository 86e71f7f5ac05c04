use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, ProfileUpdateRequest, PublicUser, RegisterRequest,
            RegisterResponse, UserEnvelope,
        },
        extractors::AuthUser,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/doctors", get(list_doctors))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(payload) = payload?;
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let (token, user) = services::login(&state, payload).await?;
    Ok(Json(AuthResponse { token, user }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = services::current_user(&state, &claim).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let Json(payload) = payload?;
    let user = services::update_profile(&state, &claim, payload).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(state))]
pub async fn list_doctors(
    State(state): State<AppState>,
    AuthUser(_claim): AuthUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(services::list_doctors(&state).await?))
}
