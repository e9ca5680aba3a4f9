use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    access::{resolve_chain, ChainTarget},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidJson,
    models::{NewTask, Task, TaskChanges, TaskPriority},
    state::AppState,
    utils::json::deserialize_some,
};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub column_id: Uuid,
    #[validate(length(max = 500, message = "title must be at most 500 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(
        min = 0,
        max = 1000000,
        message = "position must be between 0 and 1000000"
    ))]
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,
    #[serde(default)]
    pub label_ids: Vec<Uuid>,
}

/// Omitted keys are left untouched; `startDate`/`dueDate` accept `null` to clear.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(max = 500, message = "title must be at most 500 characters"))]
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[validate(range(
        min = 0,
        max = 1000000,
        message = "position must be between 0 and 1000000"
    ))]
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub assignee_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub label_ids: Option<Vec<Uuid>>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    pub task_id: Uuid,
    pub to_column_id: Uuid,
    #[validate(range(
        min = 0,
        max = 1000000,
        message = "position must be between 0 and 1000000"
    ))]
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub position: i32,
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub created_by_id: Uuid,
    pub assignee_ids: Vec<Uuid>,
    pub label_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskInfo {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            start_date: task.start_date,
            due_date: task.due_date,
            position: task.position,
            board_id: task.board_id,
            column_id: task.column_id,
            created_by_id: task.created_by_id,
            assignee_ids: task.assignee_ids,
            label_ids: task.label_ids,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(payload): ValidJson<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskInfo>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }

    let store = state.store();
    let chain = resolve_chain(store, ChainTarget::Column(payload.column_id)).await?;
    chain.authorize(user.user_id)?;
    let column = chain
        .column
        .ok_or_else(|| AppError::not_found_msg("column not found"))?;

    let position = match payload.position {
        Some(position) => position,
        None => store.next_task_position(column.id).await?,
    };

    let task = store
        .create_task(NewTask {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: payload.description.unwrap_or_default(),
            priority: payload.priority.unwrap_or_default().as_str().to_string(),
            start_date: payload.start_date,
            due_date: payload.due_date,
            position,
            board_id: column.board_id,
            column_id: column.id,
            created_by_id: user.user_id,
            assignee_ids: payload.assignee_ids,
            label_ids: payload.label_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TaskInfo::from(task))))
}

pub async fn update_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateTaskRequest>,
) -> AppResult<Json<TaskInfo>> {
    let title = match payload.title.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("title must not be empty")),
        other => other.map(str::to_string),
    };

    let store = state.store();
    let chain = resolve_chain(store, ChainTarget::Task(task_id)).await?;
    chain.authorize(user.user_id)?;

    let changes = TaskChanges {
        title,
        description: payload.description,
        priority: payload.priority.map(|priority| priority.as_str().to_string()),
        start_date: payload.start_date,
        due_date: payload.due_date,
        position: payload.position,
        assignee_ids: payload.assignee_ids,
        label_ids: payload.label_ids,
        ..TaskChanges::default()
    };

    let task = store
        .update_task(task_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found_msg("task not found"))?;
    Ok(Json(TaskInfo::from(task)))
}

/// Moves a task into another column (possibly on another board). The caller
/// must own both the task's current project and the target column's project.
pub async fn move_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(payload): ValidJson<MoveTaskRequest>,
) -> AppResult<Json<TaskInfo>> {
    let store = state.store();

    resolve_chain(store, ChainTarget::Task(payload.task_id))
        .await?
        .authorize(user.user_id)?;

    let target = resolve_chain(store, ChainTarget::Column(payload.to_column_id)).await?;
    target.authorize(user.user_id)?;
    let column = target
        .column
        .ok_or_else(|| AppError::not_found_msg("column not found"))?;

    let position = match payload.position {
        Some(position) => position,
        None => store.next_task_position(column.id).await?,
    };

    let task = store
        .update_task(
            payload.task_id,
            TaskChanges {
                position: Some(position),
                board_id: Some(column.board_id),
                column_id: Some(column.id),
                ..TaskChanges::default()
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found_msg("task not found"))?;

    info!(task_id = %task.id, column_id = %column.id, "moved task");
    Ok(Json(TaskInfo::from(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let store = state.store();
    resolve_chain(store, ChainTarget::Task(task_id))
        .await?
        .authorize(user.user_id)?;

    if !store.delete_task(task_id).await? {
        return Err(AppError::not_found_msg("task not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_uppercase_and_defaults_to_medium() {
        let request: CreateTaskRequest = serde_json::from_str(&format!(
            r#"{{"columnId":"{}","title":"T1"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(request.priority.unwrap_or_default().as_str(), "MEDIUM");

        let high: UpdateTaskRequest = serde_json::from_str(r#"{"priority":"HIGH"}"#).unwrap();
        assert_eq!(high.priority, Some(TaskPriority::High));

        assert!(serde_json::from_str::<UpdateTaskRequest>(r#"{"priority":"urgent"}"#).is_err());
    }

    #[test]
    fn positions_are_bounded() {
        let huge: MoveTaskRequest = serde_json::from_str(&format!(
            r#"{{"taskId":"{}","toColumnId":"{}","position":2147483647}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(huge.validate().is_err());

        let negative: UpdateTaskRequest = serde_json::from_str(r#"{"position":-1}"#).unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn dates_can_be_cleared_explicitly() {
        let request: UpdateTaskRequest = serde_json::from_str(r#"{"dueDate":null}"#).unwrap();
        assert_eq!(request.due_date, Some(None));
        assert_eq!(request.start_date, None);
    }
}
