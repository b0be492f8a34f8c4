use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        avatar::gravatar_url,
        dto::{LoginRequest, RegisterRequest, TokenResponse},
        extractors::AuthUser,
        repo_types::{NewUser, User},
    },
    db::StoreError,
    error::{AppError, AppResult},
    state::AppState,
    validate::Checks,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/auth", post(login))
}

pub fn private_routes() -> Router<AppState> {
    Router::new().route("/auth", get(get_me))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let email = payload.email.as_deref().map(normalize_email);
    Checks::new()
        .required("name", payload.name.as_deref(), "Name is required")
        .email("email", email.as_deref(), "Please include a valid email")
        .min_len(
            "password",
            payload.password.as_deref(),
            6,
            "Please enter a password with 6 or more characters",
        )
        .finish()?;

    let name = payload.name.unwrap_or_default().trim().to_string();
    let email = email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = state.passwords.hash_blocking(password).await.map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal(e)
    })?;

    let avatar = Some(gravatar_url(&email));
    let user = match state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            avatar,
        })
        .await
    {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(StoreError::Duplicate(_)) => {
            return Err(AppError::Conflict("User already exists".into()))
        }
        Err(e) => return Err(e.into()),
    };

    let token = state.keys.issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let email = payload.email.as_deref().map(normalize_email);
    Checks::new()
        .email("email", email.as_deref(), "Please include a valid email")
        .required("password", payload.password.as_deref(), "Password is required")
        .finish()?;

    let email = email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let Some(user) = state.users.find_by_email(&email).await? else {
        state.passwords.verify_dummy_blocking(password).await;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let ok = state
        .passwords
        .verify_blocking(password, user.password_hash.clone())
        .await;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.keys.issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<User>> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token for a deleted user");
        AppError::not_found("User not found")
    })?;
    Ok(Json(user))
}
