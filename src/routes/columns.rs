use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{resolve_chain, ChainTarget},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidJson,
    models::{BoardColumn, ColumnChanges, NewBoardColumn, MAX_POSITION},
    state::AppState,
    utils::json::deserialize_some,
};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateColumnRequest {
    #[serde(default)]
    pub board_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[validate(length(max = 100, message = "name must be at most 100 characters"))]
    pub name: String,
    #[validate(range(
        min = 0,
        max = 1000000,
        message = "position must be between 0 and 1000000"
    ))]
    #[serde(default)]
    pub position: Option<i32>,
    #[validate(range(min = 0, message = "wipLimit must not be negative"))]
    #[serde(default)]
    pub wip_limit: Option<i32>,
}

/// `wipLimit: null` clears the limit; an omitted key leaves it untouched.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateColumnRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub wip_limit: Option<Option<i32>>,
}

impl Validate for UpdateColumnRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        let mut errors = validator::ValidationErrors::new();
        if matches!(self.position, Some(position) if !(0..=MAX_POSITION).contains(&position)) {
            errors.add(
                "position",
                range_error("position must be between 0 and 1000000"),
            );
        }
        if matches!(self.wip_limit, Some(Some(limit)) if limit < 0) {
            errors.add("wipLimit", range_error("wipLimit must not be negative"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn range_error(message: &'static str) -> validator::ValidationError {
    let mut error = validator::ValidationError::new("range");
    error.message = Some(message.into());
    error
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub wip_limit: Option<i32>,
    pub board_id: Uuid,
}

impl From<BoardColumn> for ColumnInfo {
    fn from(column: BoardColumn) -> Self {
        Self {
            id: column.id,
            name: column.name,
            position: column.position,
            wip_limit: column.wip_limit,
            board_id: column.board_id,
        }
    }
}

pub async fn create_column(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(payload): ValidJson<CreateColumnRequest>,
) -> AppResult<(StatusCode, Json<ColumnInfo>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let store = state.store();
    let board = match (payload.board_id, payload.project_id) {
        (Some(board_id), _) => {
            let chain = resolve_chain(store, ChainTarget::Board(board_id)).await?;
            chain.authorize(user.user_id)?;
            chain
                .board
                .ok_or_else(|| AppError::not_found_msg("board not found"))?
        }
        (None, Some(project_id)) => {
            resolve_chain(store, ChainTarget::Project(project_id))
                .await?
                .authorize(user.user_id)?;
            store.ensure_default_board(project_id).await?
        }
        (None, None) => {
            return Err(AppError::bad_request("boardId or projectId is required"));
        }
    };

    let position = match payload.position {
        Some(position) => position,
        None => store.next_column_position(board.id).await?,
    };

    let column = store
        .create_column(NewBoardColumn {
            id: Uuid::new_v4(),
            name: name.to_string(),
            position,
            wip_limit: payload.wip_limit,
            board_id: board.id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ColumnInfo::from(column))))
}

pub async fn update_column(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(column_id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateColumnRequest>,
) -> AppResult<Json<ColumnInfo>> {
    let name = match payload.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("name must not be empty")),
        other => other.map(str::to_string),
    };

    let store = state.store();
    resolve_chain(store, ChainTarget::Column(column_id))
        .await?
        .authorize(user.user_id)?;

    let changes = ColumnChanges {
        name,
        position: payload.position,
        wip_limit: payload.wip_limit,
    };
    let column = store
        .update_column(column_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found_msg("column not found"))?;
    Ok(Json(ColumnInfo::from(column)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(column_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let store = state.store();
    resolve_chain(store, ChainTarget::Column(column_id))
        .await?
        .authorize(user.user_id)?;

    let removed_tasks = store
        .delete_column_cascade(column_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("column not found"))?;

    info!(column_id = %column_id, tasks = removed_tasks, "deleted column");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_rejects_negative_limits_but_allows_clearing() {
        let cleared: UpdateColumnRequest = serde_json::from_str(r#"{"wipLimit":null}"#).unwrap();
        assert!(cleared.validate().is_ok());
        assert_eq!(cleared.wip_limit, Some(None));

        let negative: UpdateColumnRequest = serde_json::from_str(r#"{"wipLimit":-1}"#).unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn update_rejects_positions_past_the_limit() {
        let edge: UpdateColumnRequest = serde_json::from_str(r#"{"position":1000000}"#).unwrap();
        assert!(edge.validate().is_ok());

        let huge: UpdateColumnRequest = serde_json::from_str(r#"{"position":2147483647}"#).unwrap();
        assert!(huge.validate().is_err());
    }
}
