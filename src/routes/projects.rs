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

use super::{columns::ColumnInfo, tasks::TaskInfo};
use crate::{
    access::{authorize_read, resolve_chain, ChainTarget},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    extract::ValidJson,
    models::{Board, NewProject, Project, ProjectMember},
    state::AppState,
};

#[derive(Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub task_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub user_id: Uuid,
    pub role: String,
}

impl From<ProjectMember> for MemberInfo {
    fn from(member: ProjectMember) -> Self {
        Self {
            user_id: member.user_id,
            role: member.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub members: Vec<MemberInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectInfo {
    fn new(project: Project, members: Vec<ProjectMember>) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            owner_id: project.owner_id,
            members: members.into_iter().map(MemberInfo::from).collect(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    pub id: Uuid,
    pub name: String,
    pub project_id: Uuid,
    pub is_default: bool,
}

impl From<Board> for BoardInfo {
    fn from(board: Board) -> Self {
        Self {
            id: board.id,
            name: board.name,
            project_id: board.project_id,
            is_default: board.is_default,
        }
    }
}

#[derive(Serialize)]
pub struct ProjectDetailResponse {
    pub project: ProjectInfo,
    pub board: Option<BoardInfo>,
    pub columns: Vec<ColumnInfo>,
    pub tasks: Vec<TaskInfo>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ProjectSummary>>> {
    let store = state.store();
    let projects = store.list_projects_by_owner(user.user_id).await?;

    let mut summaries = Vec::with_capacity(projects.len());
    for project in projects {
        let task_count = store.count_project_tasks(project.id).await?;
        summaries.push(ProjectSummary {
            id: project.id,
            name: project.name,
            description: project.description,
            owner_id: project.owner_id,
            task_count,
            created_at: project.created_at,
            updated_at: project.updated_at,
        });
    }

    Ok(Json(summaries))
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(payload): ValidJson<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectInfo>)> {
    let name = required_name(&payload.name)?;
    let store = state.store();

    let project = store
        .create_project(NewProject {
            id: Uuid::new_v4(),
            name,
            description: payload.description.unwrap_or_default(),
            owner_id: user.user_id,
        })
        .await?;
    let members = store.list_project_members(project.id).await?;

    info!(project_id = %project.id, user_id = %user.user_id, "created project");
    Ok((StatusCode::CREATED, Json(ProjectInfo::new(project, members))))
}

pub async fn get_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<ProjectDetailResponse>> {
    let store = state.store();
    let project = store
        .find_project(project_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("project not found"))?;
    authorize_read(store, user.user_id, &project).await?;

    let members = store.list_project_members(project.id).await?;
    let board = store.find_project_board(project.id).await?;

    let (columns, tasks) = match board.as_ref() {
        Some(board) => {
            let columns = store.list_columns(board.id).await?;
            let tasks = store.list_board_tasks(board.id).await?;
            (
                columns.into_iter().map(ColumnInfo::from).collect(),
                tasks.into_iter().map(TaskInfo::from).collect(),
            )
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(Json(ProjectDetailResponse {
        project: ProjectInfo::new(project, members),
        board: board.map(BoardInfo::from),
        columns,
        tasks,
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateProjectRequest>,
) -> AppResult<Json<ProjectInfo>> {
    let name = required_name(&payload.name)?;
    let store = state.store();

    let chain = resolve_chain(store, ChainTarget::Project(project_id)).await?;
    chain.authorize(user.user_id)?;

    let description = payload
        .description
        .unwrap_or_else(|| chain.project.description.clone());
    let project = store
        .update_project(project_id, name, description)
        .await?
        .ok_or_else(|| AppError::not_found_msg("project not found"))?;
    let members = store.list_project_members(project.id).await?;

    Ok(Json(ProjectInfo::new(project, members)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let store = state.store();
    resolve_chain(store, ChainTarget::Project(project_id))
        .await?
        .authorize(user.user_id)?;

    let summary = store
        .delete_project_cascade(project_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("project not found"))?;

    info!(
        project_id = %project_id,
        boards = summary.boards,
        columns = summary.columns,
        tasks = summary.tasks,
        "deleted project"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn required_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::required_name;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(required_name("  Demo ").unwrap(), "Demo");
        assert!(required_name("   ").is_err());
    }
}
