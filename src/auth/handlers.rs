use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::{
    AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest, UpdateProfileRequest,
    UpdateRoleRequest,
};
use crate::auth::extractors::AuthUser;
use crate::auth::services;
use crate::error::AuthError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update_me))
        .route("/users/:id/role", put(update_role))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let response = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    Ok(Json(services::refresh(&state, payload).await?))
}

#[instrument(skip_all)]
async fn logout(AuthUser(claims): AuthUser) -> StatusCode {
    services::logout(&claims);
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(services::me(&state, claims.sub).await?))
}

#[instrument(skip(state, payload))]
async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(
        services::update_profile(&state, claims.sub, payload).await?,
    ))
}

#[instrument(skip(state, payload))]
async fn update_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(
        services::update_role(&state, &claims, id, payload.role).await?,
    ))
}
