//! Ownership-chain authorization.
//!
//! Every mutation below the project level is authorized by walking
//! task -> column -> board -> project and comparing the project's owner with
//! the caller. Nothing is cached: each call re-reads the chain from the store.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Board, BoardColumn, Project, Task},
    store::TaskStore,
};

/// Entry point of a chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainTarget {
    Task(Uuid),
    Column(Uuid),
    Board(Uuid),
    Project(Uuid),
}

/// Every entity visited while resolving a [`ChainTarget`].
#[derive(Debug, Clone)]
pub struct OwnershipChain {
    pub task: Option<Task>,
    pub column: Option<BoardColumn>,
    pub board: Option<Board>,
    pub project: Project,
}

impl OwnershipChain {
    pub fn owner_id(&self) -> Uuid {
        self.project.owner_id
    }

    /// Fails with 403 unless `user_id` owns the project at the top of the chain.
    pub fn authorize(&self, user_id: Uuid) -> AppResult<()> {
        authorize_mutation(user_id, self.owner_id())
    }
}

pub async fn resolve_chain(store: &dyn TaskStore, target: ChainTarget) -> AppResult<OwnershipChain> {
    let mut task = None;
    let mut column = None;
    let mut board = None;

    let project_id = match target {
        ChainTarget::Project(project_id) => project_id,
        ChainTarget::Board(board_id) => {
            let found = load_board(store, board_id).await?;
            let project_id = found.project_id;
            board = Some(found);
            project_id
        }
        ChainTarget::Column(column_id) => {
            let found = load_column(store, column_id).await?;
            let parent = load_board(store, found.board_id).await?;
            let project_id = parent.project_id;
            column = Some(found);
            board = Some(parent);
            project_id
        }
        ChainTarget::Task(task_id) => {
            let found = store
                .find_task(task_id)
                .await?
                .ok_or_else(|| AppError::not_found_msg("task not found"))?;
            let parent_column = load_column(store, found.column_id).await?;
            let parent_board = load_board(store, parent_column.board_id).await?;
            let project_id = parent_board.project_id;
            task = Some(found);
            column = Some(parent_column);
            board = Some(parent_board);
            project_id
        }
    };

    let project = store
        .find_project(project_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("project not found"))?;

    Ok(OwnershipChain {
        task,
        column,
        board,
        project,
    })
}

pub async fn resolve_project_owner(store: &dyn TaskStore, target: ChainTarget) -> AppResult<Uuid> {
    Ok(resolve_chain(store, target).await?.owner_id())
}

pub fn authorize_mutation(requesting_user_id: Uuid, owner_id: Uuid) -> AppResult<()> {
    if requesting_user_id == owner_id {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %requesting_user_id,
            owner_id = %owner_id,
            "mutation rejected by ownership check"
        );
        Err(AppError::forbidden(
            "you don't have permission to modify this project",
        ))
    }
}

/// Read access: the owner or any recorded project member.
pub async fn authorize_read(
    store: &dyn TaskStore,
    requesting_user_id: Uuid,
    project: &Project,
) -> AppResult<()> {
    if project.owner_id == requesting_user_id {
        return Ok(());
    }
    let members = store.list_project_members(project.id).await?;
    if members
        .iter()
        .any(|member| member.user_id == requesting_user_id)
    {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "you don't have permission to view this project",
        ))
    }
}

async fn load_board(store: &dyn TaskStore, board_id: Uuid) -> AppResult<Board> {
    store
        .find_board(board_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("board not found"))
}

async fn load_column(store: &dyn TaskStore, column_id: Uuid) -> AppResult<BoardColumn> {
    store
        .find_column(column_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("column not found"))
}
