//! Persistence seam for every collection the API touches.
//!
//! Handlers only ever see `dyn TaskStore`, so the same routes run against
//! PostgreSQL in production and against [`MemoryStore`] in tests. Operations
//! that touch more than one row (cascades, default-board provisioning, reset
//! token redemption) are single trait calls so each backend can make them
//! atomic: a database transaction for [`PgStore`], one lock scope for
//! [`MemoryStore`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Board, BoardColumn, ColumnChanges, NewBoardColumn, NewPasswordResetToken, NewProject,
    NewTask, NewUser, Project, ProjectMember, Task, TaskChanges, User,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("store operation exceeded {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Conflict(String),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counts of rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub projects: usize,
    pub boards: usize,
    pub columns: usize,
    pub tasks: usize,
}

impl CascadeSummary {
    fn absorb(&mut self, other: CascadeSummary) {
        self.projects += other.projects;
        self.boards += other.boards;
        self.columns += other.columns;
        self.tasks += other.tasks;
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Fails with [`StoreError::Conflict`] when the email is already registered.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    /// `email` must already be normalized (trimmed, lower-cased).
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user_name(&self, user_id: Uuid, name: String) -> StoreResult<Option<User>>;

    async fn update_user_password(&self, user_id: Uuid, password_hash: String)
        -> StoreResult<bool>;

    /// Removes every project the user owns (full project cascade), the user's
    /// memberships elsewhere, their reset tokens and finally the user.
    /// Returns `None` when the user does not exist.
    async fn delete_user_cascade(&self, user_id: Uuid) -> StoreResult<Option<CascadeSummary>>;

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> StoreResult<()>;

    /// Marks the token used and stores the new password hash in one step.
    /// Returns `false` when no unused, unexpired token with that hash belongs
    /// to `user_id`.
    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Deletes used or expired reset tokens.
    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize>;

    /// Inserts the project and records the owner as an ADMIN member.
    async fn create_project(&self, project: NewProject) -> StoreResult<Project>;

    async fn find_project(&self, project_id: Uuid) -> StoreResult<Option<Project>>;

    async fn list_projects_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Project>>;

    async fn update_project(
        &self,
        project_id: Uuid,
        name: String,
        description: String,
    ) -> StoreResult<Option<Project>>;

    /// Deletes tasks, columns, boards and members of the project, then the
    /// project. Returns `None` when the project does not exist.
    async fn delete_project_cascade(&self, project_id: Uuid)
        -> StoreResult<Option<CascadeSummary>>;

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>>;

    async fn count_project_tasks(&self, project_id: Uuid) -> StoreResult<i64>;

    async fn find_board(&self, board_id: Uuid) -> StoreResult<Option<Board>>;

    /// The board shown for a project: its default board if any, otherwise the
    /// oldest one.
    async fn find_project_board(&self, project_id: Uuid) -> StoreResult<Option<Board>>;

    /// Returns the project's default board, creating "Main board" when the
    /// project has none. Concurrent callers converge on the same board.
    async fn ensure_default_board(&self, project_id: Uuid) -> StoreResult<Board>;

    async fn create_column(&self, column: NewBoardColumn) -> StoreResult<BoardColumn>;

    async fn find_column(&self, column_id: Uuid) -> StoreResult<Option<BoardColumn>>;

    /// Columns of a board ordered by position, ties broken by creation time.
    async fn list_columns(&self, board_id: Uuid) -> StoreResult<Vec<BoardColumn>>;

    async fn next_column_position(&self, board_id: Uuid) -> StoreResult<i32>;

    async fn update_column(
        &self,
        column_id: Uuid,
        changes: ColumnChanges,
    ) -> StoreResult<Option<BoardColumn>>;

    /// Deletes every task in the column, then the column. Returns the number
    /// of tasks removed, or `None` when the column does not exist.
    async fn delete_column_cascade(&self, column_id: Uuid) -> StoreResult<Option<usize>>;

    async fn create_task(&self, task: NewTask) -> StoreResult<Task>;

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>>;

    /// Tasks of a board ordered by position, ties broken by creation time.
    async fn list_board_tasks(&self, board_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn next_task_position(&self, column_id: Uuid) -> StoreResult<i32>;

    async fn update_task(&self, task_id: Uuid, changes: TaskChanges)
        -> StoreResult<Option<Task>>;

    async fn delete_task(&self, task_id: Uuid) -> StoreResult<bool>;
}
