use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use super::{CascadeSummary, StoreError, StoreResult, TaskStore};
use crate::db::PgPool;
use crate::models::{
    Board, BoardColumn, ColumnChanges, NewBoard, NewBoardColumn, NewPasswordResetToken,
    NewProject, NewProjectMember, NewTask, NewUser, PasswordResetToken, Project, ProjectMember,
    Task, TaskChanges, User, DEFAULT_BOARD_NAME, ROLE_ADMIN,
};
use crate::schema::{
    board_columns, boards, password_reset_tokens, project_members, projects, tasks, users,
};

/// PostgreSQL-backed store. Diesel is synchronous, so every operation runs on
/// the blocking pool and is abandoned (not aborted) once `timeout` elapses.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

fn cascade_project(conn: &mut PgConnection, project_id: Uuid) -> StoreResult<CascadeSummary> {
    let board_ids: Vec<Uuid> = boards::table
        .filter(boards::project_id.eq(project_id))
        .select(boards::id)
        .load(conn)?;

    let tasks_deleted =
        diesel::delete(tasks::table.filter(tasks::board_id.eq_any(&board_ids))).execute(conn)?;
    let columns_deleted = diesel::delete(
        board_columns::table.filter(board_columns::board_id.eq_any(&board_ids)),
    )
    .execute(conn)?;
    let boards_deleted =
        diesel::delete(boards::table.filter(boards::project_id.eq(project_id))).execute(conn)?;
    diesel::delete(project_members::table.filter(project_members::project_id.eq(project_id)))
        .execute(conn)?;
    let projects_deleted = diesel::delete(projects::table.find(project_id)).execute(conn)?;

    Ok(CascadeSummary {
        projects: projects_deleted,
        boards: boards_deleted,
        columns: columns_deleted,
        tasks: tasks_deleted,
    })
}

fn next_position(current_max: Option<i32>) -> i32 {
    current_max
        .map(|value| value.saturating_add(1))
        .unwrap_or(0)
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.with_conn(move |conn| {
            match diesel::insert_into(users::table)
                .values(&user)
                .get_result::<User>(conn)
            {
                Ok(created) => Ok(created),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(
                    StoreError::Conflict("email is already registered".to_string()),
                ),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| Ok(users::table.find(user_id).first(conn).optional()?))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            Ok(users::table
                .filter(users::email.eq(&email))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn update_user_name(&self, user_id: Uuid, name: String) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            Ok(diesel::update(users::table.find(user_id))
                .set((users::name.eq(&name), users::updated_at.eq(Utc::now())))
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let updated = diesel::update(users::table.find(user_id))
                .set((
                    users::password_hash.eq(&password_hash),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> StoreResult<Option<CascadeSummary>> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let exists = users::table
                    .find(user_id)
                    .select(users::id)
                    .first::<Uuid>(conn)
                    .optional()?;
                if exists.is_none() {
                    return Ok(None);
                }

                let owned: Vec<Uuid> = projects::table
                    .filter(projects::owner_id.eq(user_id))
                    .select(projects::id)
                    .load(conn)?;

                let mut summary = CascadeSummary::default();
                for project_id in owned {
                    summary.absorb(cascade_project(conn, project_id)?);
                }

                diesel::delete(project_members::table.filter(project_members::user_id.eq(user_id)))
                    .execute(conn)?;
                diesel::delete(
                    password_reset_tokens::table
                        .filter(password_reset_tokens::user_id.eq(user_id)),
                )
                .execute(conn)?;
                diesel::delete(users::table.find(user_id)).execute(conn)?;

                Ok(Some(summary))
            })
        })
        .await
    }

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> StoreResult<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(password_reset_tokens::table)
                .values(&token)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let token_hash = token_hash.to_string();
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let token = password_reset_tokens::table
                    .filter(password_reset_tokens::token_hash.eq(&token_hash))
                    .filter(password_reset_tokens::user_id.eq(user_id))
                    .filter(password_reset_tokens::used.eq(false))
                    .filter(password_reset_tokens::expires_at.gt(now))
                    .for_update()
                    .first::<PasswordResetToken>(conn)
                    .optional()?;

                let Some(token) = token else {
                    return Ok(false);
                };

                diesel::update(password_reset_tokens::table.find(token.id))
                    .set(password_reset_tokens::used.eq(true))
                    .execute(conn)?;

                let updated = diesel::update(users::table.find(user_id))
                    .set((
                        users::password_hash.eq(&password_hash),
                        users::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(updated > 0)
            })
        })
        .await
    }

    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.with_conn(move |conn| {
            Ok(diesel::delete(
                password_reset_tokens::table.filter(
                    password_reset_tokens::used
                        .eq(true)
                        .or(password_reset_tokens::expires_at.le(now)),
                ),
            )
            .execute(conn)?)
        })
        .await
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let created: Project = diesel::insert_into(projects::table)
                    .values(&project)
                    .get_result(conn)?;

                diesel::insert_into(project_members::table)
                    .values(&NewProjectMember {
                        project_id: created.id,
                        user_id: created.owner_id,
                        role: ROLE_ADMIN.to_string(),
                    })
                    .execute(conn)?;

                Ok(created)
            })
        })
        .await
    }

    async fn find_project(&self, project_id: Uuid) -> StoreResult<Option<Project>> {
        self.with_conn(move |conn| Ok(projects::table.find(project_id).first(conn).optional()?))
            .await
    }

    async fn list_projects_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Project>> {
        self.with_conn(move |conn| {
            Ok(projects::table
                .filter(projects::owner_id.eq(owner_id))
                .order(projects::created_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        name: String,
        description: String,
    ) -> StoreResult<Option<Project>> {
        self.with_conn(move |conn| {
            Ok(diesel::update(projects::table.find(project_id))
                .set((
                    projects::name.eq(&name),
                    projects::description.eq(&description),
                    projects::updated_at.eq(Utc::now()),
                ))
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_project_cascade(
        &self,
        project_id: Uuid,
    ) -> StoreResult<Option<CascadeSummary>> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let summary = cascade_project(conn, project_id)?;
                Ok((summary.projects > 0).then_some(summary))
            })
        })
        .await
    }

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        self.with_conn(move |conn| {
            Ok(project_members::table
                .filter(project_members::project_id.eq(project_id))
                .order(project_members::added_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn count_project_tasks(&self, project_id: Uuid) -> StoreResult<i64> {
        self.with_conn(move |conn| {
            let board_ids = boards::table
                .filter(boards::project_id.eq(project_id))
                .select(boards::id);
            Ok(tasks::table
                .filter(tasks::board_id.eq_any(board_ids))
                .select(count_star())
                .first(conn)?)
        })
        .await
    }

    async fn find_board(&self, board_id: Uuid) -> StoreResult<Option<Board>> {
        self.with_conn(move |conn| Ok(boards::table.find(board_id).first(conn).optional()?))
            .await
    }

    async fn find_project_board(&self, project_id: Uuid) -> StoreResult<Option<Board>> {
        self.with_conn(move |conn| {
            Ok(boards::table
                .filter(boards::project_id.eq(project_id))
                .order((boards::is_default.desc(), boards::created_at.asc()))
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn ensure_default_board(&self, project_id: Uuid) -> StoreResult<Board> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                diesel::insert_into(boards::table)
                    .values(&NewBoard {
                        id: Uuid::new_v4(),
                        name: DEFAULT_BOARD_NAME.to_string(),
                        project_id,
                        is_default: true,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)?;

                Ok(boards::table
                    .filter(boards::project_id.eq(project_id))
                    .filter(boards::is_default.eq(true))
                    .first(conn)?)
            })
        })
        .await
    }

    async fn create_column(&self, column: NewBoardColumn) -> StoreResult<BoardColumn> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(board_columns::table)
                .values(&column)
                .get_result(conn)?)
        })
        .await
    }

    async fn find_column(&self, column_id: Uuid) -> StoreResult<Option<BoardColumn>> {
        self.with_conn(move |conn| {
            Ok(board_columns::table
                .find(column_id)
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_columns(&self, board_id: Uuid) -> StoreResult<Vec<BoardColumn>> {
        self.with_conn(move |conn| {
            Ok(board_columns::table
                .filter(board_columns::board_id.eq(board_id))
                .order((
                    board_columns::position.asc(),
                    board_columns::created_at.asc(),
                ))
                .load(conn)?)
        })
        .await
    }

    async fn next_column_position(&self, board_id: Uuid) -> StoreResult<i32> {
        self.with_conn(move |conn| {
            let current: Option<i32> = board_columns::table
                .filter(board_columns::board_id.eq(board_id))
                .select(max(board_columns::position))
                .first(conn)?;
            Ok(next_position(current))
        })
        .await
    }

    async fn update_column(
        &self,
        column_id: Uuid,
        changes: ColumnChanges,
    ) -> StoreResult<Option<BoardColumn>> {
        self.with_conn(move |conn| {
            if changes.is_empty() {
                return Ok(board_columns::table
                    .find(column_id)
                    .first(conn)
                    .optional()?);
            }
            Ok(diesel::update(board_columns::table.find(column_id))
                .set(&changes)
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_column_cascade(&self, column_id: Uuid) -> StoreResult<Option<usize>> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let tasks_deleted =
                    diesel::delete(tasks::table.filter(tasks::column_id.eq(column_id)))
                        .execute(conn)?;
                let columns_deleted =
                    diesel::delete(board_columns::table.find(column_id)).execute(conn)?;
                Ok((columns_deleted > 0).then_some(tasks_deleted))
            })
        })
        .await
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        self.with_conn(move |conn| {
            Ok(diesel::insert_into(tasks::table)
                .values(&task)
                .get_result(conn)?)
        })
        .await
    }

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| Ok(tasks::table.find(task_id).first(conn).optional()?))
            .await
    }

    async fn list_board_tasks(&self, board_id: Uuid) -> StoreResult<Vec<Task>> {
        self.with_conn(move |conn| {
            Ok(tasks::table
                .filter(tasks::board_id.eq(board_id))
                .order((tasks::position.asc(), tasks::created_at.asc()))
                .load(conn)?)
        })
        .await
    }

    async fn next_task_position(&self, column_id: Uuid) -> StoreResult<i32> {
        self.with_conn(move |conn| {
            let current: Option<i32> = tasks::table
                .filter(tasks::column_id.eq(column_id))
                .select(max(tasks::position))
                .first(conn)?;
            Ok(next_position(current))
        })
        .await
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        changes: TaskChanges,
    ) -> StoreResult<Option<Task>> {
        self.with_conn(move |conn| {
            Ok(diesel::update(tasks::table.find(task_id))
                .set((&changes, tasks::updated_at.eq(Utc::now())))
                .get_result(conn)
                .optional()?)
        })
        .await
    }

    async fn delete_task(&self, task_id: Uuid) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(tasks::table.find(task_id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}
