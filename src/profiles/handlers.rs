use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ExperienceRequest, ProfileRequest},
    github::is_valid_username,
    repo_types::{NewExperience, Profile, ProfileFields, Social},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult, FieldError},
    state::AppState,
    validate::{non_blank, split_list, Checks},
};

const NO_PROFILE: &str = "There is no profile for this user";
const PROFILE_NOT_FOUND: &str = "Profile not found";
const EXPERIENCE_NOT_FOUND: &str = "Experience not found";
const NO_GITHUB: &str = "No Github Profile Found";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(list_profiles))
        .route("/profile/user/:user_id", get(get_profile_by_user))
        .route("/profile/github/:username", get(github_repos))
}

pub fn private_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", post(upsert_profile).delete(delete_account))
        .route("/profile/me", get(get_my_profile))
        .route("/profile/experience", put(add_experience))
        .route("/profile/experience/:exp_id", delete(remove_experience))
}

fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

#[instrument(skip(state))]
pub async fn get_my_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Profile>> {
    let profile = state
        .profiles
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::bad_request(NO_PROFILE))?;
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn upsert_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> AppResult<Json<Profile>> {
    let Json(body) = payload?;
    Checks::new()
        .required("status", body.status.as_deref(), "Status is required")
        .required("skills", body.skills.as_deref(), "Skills is required")
        .finish()?;

    let skills = split_list(body.skills.as_deref().unwrap_or_default());
    if skills.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "skills",
            "Skills is required",
        )]));
    }

    let fields = ProfileFields {
        company: non_blank(body.company),
        website: non_blank(body.website),
        location: non_blank(body.location),
        bio: non_blank(body.bio),
        status: body.status.unwrap_or_default().trim().to_string(),
        skills,
        github_username: non_blank(body.github_username),
        social: Social {
            youtube: non_blank(body.youtube),
            twitter: non_blank(body.twitter),
            facebook: non_blank(body.facebook),
            linkedin: non_blank(body.linkedin),
            instagram: non_blank(body.instagram),
        },
    };

    let profile = state.profiles.upsert(user_id, fields).await?;
    info!(%user_id, profile_id = %profile.id, "profile saved");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn list_profiles(State(state): State<AppState>) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.profiles.list().await?))
}

#[instrument(skip(state))]
pub async fn get_profile_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Profile>> {
    let user_id =
        Uuid::parse_str(&user_id).map_err(|_| AppError::bad_request(PROFILE_NOT_FOUND))?;
    let profile = state
        .profiles
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::bad_request(PROFILE_NOT_FOUND))?;
    Ok(Json(profile))
}

/// Removes the caller's account; profile and posts go with it.
#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Value>> {
    if !state.users.delete(user_id).await? {
        warn!(%user_id, "account delete for a missing user");
        return Err(AppError::not_found("User not found"));
    }
    info!(%user_id, "account deleted");
    Ok(Json(json!({ "msg": "User deleted" })))
}

#[instrument(skip(state, payload))]
pub async fn add_experience(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ExperienceRequest>, JsonRejection>,
) -> AppResult<Json<Profile>> {
    let Json(body) = payload?;
    Checks::new()
        .required("title", body.title.as_deref(), "Title is required")
        .required("company", body.company.as_deref(), "Company is required")
        .required("from", body.from.as_deref(), "From date is required")
        .finish()?;

    let mut errors = Vec::new();
    let from = body.from.as_deref().and_then(parse_date);
    if from.is_none() {
        errors.push(FieldError::new("from", "From date must be a valid date"));
    }
    let to = match non_blank(body.to) {
        Some(raw) => {
            let parsed = parse_date(&raw);
            if parsed.is_none() {
                errors.push(FieldError::new("to", "To date must be a valid date"));
            }
            parsed
        }
        None => None,
    };
    let Some(from) = from.filter(|_| errors.is_empty()) else {
        return Err(AppError::Validation(errors));
    };

    let profile = state
        .profiles
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::bad_request(NO_PROFILE))?;

    let exp = state
        .profiles
        .add_experience(
            profile.id,
            NewExperience {
                title: body.title.unwrap_or_default().trim().to_string(),
                company: body.company.unwrap_or_default().trim().to_string(),
                location: non_blank(body.location),
                from,
                to,
                current: body.current,
                description: non_blank(body.description),
            },
        )
        .await?;
    info!(%user_id, exp_id = %exp.id, "experience added");

    let profile = state
        .profiles
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::bad_request(NO_PROFILE))?;
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn remove_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(exp_id): Path<String>,
) -> AppResult<Json<Profile>> {
    let exp_id =
        Uuid::parse_str(&exp_id).map_err(|_| AppError::not_found(EXPERIENCE_NOT_FOUND))?;
    let owner = state
        .profiles
        .experience_owner(exp_id)
        .await?
        .ok_or_else(|| AppError::not_found(EXPERIENCE_NOT_FOUND))?;
    if let Err(e) = auth.ensure_owns(owner) {
        warn!(user_id = %auth.0, %exp_id, "experience delete by non-owner");
        return Err(e);
    }

    if !state.profiles.remove_experience(exp_id).await? {
        return Err(AppError::not_found(EXPERIENCE_NOT_FOUND));
    }

    let profile = state
        .profiles
        .find_by_user(auth.0)
        .await?
        .ok_or_else(|| AppError::bad_request(NO_PROFILE))?;
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn github_repos(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<Value>> {
    if !is_valid_username(&username) {
        return Err(AppError::not_found(NO_GITHUB));
    }
    match state.github.recent_repos(&username).await? {
        Some(repos) => Ok(Json(repos)),
        None => Err(AppError::not_found(NO_GITHUB)),
    }
}
