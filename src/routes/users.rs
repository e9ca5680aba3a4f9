use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::auth::UserInfo;
use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidJson,
    state::AppState,
};

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: String,
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> AppResult<Json<UserInfo>> {
    ensure_self(&user, user_id)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let updated = state
        .store()
        .update_user_name(user_id, name.to_string())
        .await?
        .ok_or_else(|| AppError::not_found_msg("user not found"))?;
    Ok(Json(UserInfo::from(updated)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ensure_self(&user, user_id)?;

    let summary = state
        .store()
        .delete_user_cascade(user_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("user not found"))?;

    info!(
        user_id = %user_id,
        projects = summary.projects,
        boards = summary.boards,
        columns = summary.columns,
        tasks = summary.tasks,
        "deleted account"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_self(user: &AuthenticatedUser, user_id: Uuid) -> AppResult<()> {
    if user.user_id == user_id {
        return Ok(());
    }
    warn!(user_id = %user.user_id, target = %user_id, "rejected change to another account");
    Err(AppError::forbidden("you can only modify your own account"))
}
