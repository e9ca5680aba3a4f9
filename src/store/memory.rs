use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CascadeSummary, StoreError, StoreResult, TaskStore};
use crate::models::{
    Board, BoardColumn, ColumnChanges, NewBoardColumn, NewPasswordResetToken, NewProject,
    NewTask, NewUser, PasswordResetToken, Project, ProjectMember, Task, TaskChanges, User,
    DEFAULT_BOARD_NAME, ROLE_ADMIN,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    members: Vec<ProjectMember>,
    boards: HashMap<Uuid, Board>,
    columns: HashMap<Uuid, BoardColumn>,
    tasks: HashMap<Uuid, Task>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

impl Tables {
    fn cascade_project(&mut self, project_id: Uuid) -> CascadeSummary {
        let board_ids: Vec<Uuid> = self
            .boards
            .values()
            .filter(|board| board.project_id == project_id)
            .map(|board| board.id)
            .collect();

        let tasks_before = self.tasks.len();
        self.tasks
            .retain(|_, task| !board_ids.contains(&task.board_id));
        let columns_before = self.columns.len();
        self.columns
            .retain(|_, column| !board_ids.contains(&column.board_id));
        for board_id in &board_ids {
            self.boards.remove(board_id);
        }
        self.members.retain(|member| member.project_id != project_id);
        let projects = usize::from(self.projects.remove(&project_id).is_some());

        CascadeSummary {
            projects,
            boards: board_ids.len(),
            columns: columns_before - self.columns.len(),
            tasks: tasks_before - self.tasks.len(),
        }
    }
}

/// In-process store with the same semantics as [`super::PgStore`]. Every
/// operation holds one lock for its whole duration, which makes the multi-row
/// operations atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn board_count(&self, project_id: Uuid) -> usize {
        let tables = self.tables.lock().await;
        tables
            .boards
            .values()
            .filter(|board| board.project_id == project_id)
            .count()
    }

    pub async fn task_count(&self) -> usize {
        self.tables.lock().await.tasks.len()
    }
}

fn next_position(positions: impl Iterator<Item = i32>) -> i32 {
    positions
        .max()
        .map(|value| value.saturating_add(1))
        .unwrap_or(0)
}

fn sort_columns(columns: &mut [BoardColumn]) {
    columns.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(StoreError::Conflict(
                "email is already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn update_user_name(&self, user_id: Uuid, name: String) -> StoreResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&user_id).map(|user| {
            user.name = name;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user_cascade(&self, user_id: Uuid) -> StoreResult<Option<CascadeSummary>> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) {
            return Ok(None);
        }

        let owned: Vec<Uuid> = tables
            .projects
            .values()
            .filter(|project| project.owner_id == user_id)
            .map(|project| project.id)
            .collect();

        let mut summary = CascadeSummary::default();
        for project_id in owned {
            summary.absorb(tables.cascade_project(project_id));
        }

        tables.members.retain(|member| member.user_id != user_id);
        tables
            .reset_tokens
            .retain(|_, token| token.user_id != user_id);
        tables.users.remove(&user_id);

        Ok(Some(summary))
    }

    async fn insert_reset_token(&self, token: NewPasswordResetToken) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .reset_tokens
            .values()
            .any(|existing| existing.token_hash == token.token_hash)
        {
            return Err(StoreError::Conflict("reset token already issued".to_string()));
        }
        tables.reset_tokens.insert(
            token.id,
            PasswordResetToken {
                id: token.id,
                user_id: token.user_id,
                email: token.email,
                token_hash: token.token_hash,
                expires_at: token.expires_at,
                used: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(token) = tables.reset_tokens.values_mut().find(|token| {
            token.token_hash == token_hash
                && token.user_id == user_id
                && !token.used
                && token.expires_at > now
        }) else {
            return Ok(false);
        };
        token.used = true;

        match tables.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.reset_tokens.len();
        tables
            .reset_tokens
            .retain(|_, token| !token.used && token.expires_at > now);
        Ok(before - tables.reset_tokens.len())
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let created = Project {
            id: project.id,
            name: project.name,
            description: project.description,
            owner_id: project.owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(created.id, created.clone());
        tables.members.push(ProjectMember {
            project_id: created.id,
            user_id: created.owner_id,
            role: ROLE_ADMIN.to_string(),
            added_at: now,
        });
        Ok(created)
    }

    async fn find_project(&self, project_id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.tables.lock().await.projects.get(&project_id).cloned())
    }

    async fn list_projects_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Project>> {
        let tables = self.tables.lock().await;
        let mut owned: Vec<Project> = tables
            .projects
            .values()
            .filter(|project| project.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        name: String,
        description: String,
    ) -> StoreResult<Option<Project>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.projects.get_mut(&project_id).map(|project| {
            project.name = name;
            project.description = description;
            project.updated_at = Utc::now();
            project.clone()
        }))
    }

    async fn delete_project_cascade(
        &self,
        project_id: Uuid,
    ) -> StoreResult<Option<CascadeSummary>> {
        let mut tables = self.tables.lock().await;
        if !tables.projects.contains_key(&project_id) {
            return Ok(None);
        }
        Ok(Some(tables.cascade_project(project_id)))
    }

    async fn list_project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .filter(|member| member.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn count_project_tasks(&self, project_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        let count = tables
            .tasks
            .values()
            .filter(|task| {
                tables
                    .boards
                    .get(&task.board_id)
                    .is_some_and(|board| board.project_id == project_id)
            })
            .count();
        Ok(count as i64)
    }

    async fn find_board(&self, board_id: Uuid) -> StoreResult<Option<Board>> {
        Ok(self.tables.lock().await.boards.get(&board_id).cloned())
    }

    async fn find_project_board(&self, project_id: Uuid) -> StoreResult<Option<Board>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .boards
            .values()
            .filter(|board| board.project_id == project_id)
            .min_by(|a, b| {
                b.is_default
                    .cmp(&a.is_default)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            })
            .cloned())
    }

    async fn ensure_default_board(&self, project_id: Uuid) -> StoreResult<Board> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .boards
            .values()
            .find(|board| board.project_id == project_id && board.is_default)
        {
            return Ok(existing.clone());
        }

        let board = Board {
            id: Uuid::new_v4(),
            name: DEFAULT_BOARD_NAME.to_string(),
            project_id,
            is_default: true,
            created_at: Utc::now(),
        };
        tables.boards.insert(board.id, board.clone());
        Ok(board)
    }

    async fn create_column(&self, column: NewBoardColumn) -> StoreResult<BoardColumn> {
        let mut tables = self.tables.lock().await;
        let created = BoardColumn {
            id: column.id,
            name: column.name,
            position: column.position,
            wip_limit: column.wip_limit,
            board_id: column.board_id,
            created_at: Utc::now(),
        };
        tables.columns.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_column(&self, column_id: Uuid) -> StoreResult<Option<BoardColumn>> {
        Ok(self.tables.lock().await.columns.get(&column_id).cloned())
    }

    async fn list_columns(&self, board_id: Uuid) -> StoreResult<Vec<BoardColumn>> {
        let tables = self.tables.lock().await;
        let mut columns: Vec<BoardColumn> = tables
            .columns
            .values()
            .filter(|column| column.board_id == board_id)
            .cloned()
            .collect();
        sort_columns(&mut columns);
        Ok(columns)
    }

    async fn next_column_position(&self, board_id: Uuid) -> StoreResult<i32> {
        let tables = self.tables.lock().await;
        Ok(next_position(
            tables
                .columns
                .values()
                .filter(|column| column.board_id == board_id)
                .map(|column| column.position),
        ))
    }

    async fn update_column(
        &self,
        column_id: Uuid,
        changes: ColumnChanges,
    ) -> StoreResult<Option<BoardColumn>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.columns.get_mut(&column_id).map(|column| {
            if let Some(name) = changes.name {
                column.name = name;
            }
            if let Some(position) = changes.position {
                column.position = position;
            }
            if let Some(wip_limit) = changes.wip_limit {
                column.wip_limit = wip_limit;
            }
            column.clone()
        }))
    }

    async fn delete_column_cascade(&self, column_id: Uuid) -> StoreResult<Option<usize>> {
        let mut tables = self.tables.lock().await;
        if !tables.columns.contains_key(&column_id) {
            return Ok(None);
        }
        let before = tables.tasks.len();
        tables.tasks.retain(|_, task| task.column_id != column_id);
        let removed = before - tables.tasks.len();
        tables.columns.remove(&column_id);
        Ok(Some(removed))
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let created = Task {
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
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tables.lock().await.tasks.get(&task_id).cloned())
    }

    async fn list_board_tasks(&self, board_id: Uuid) -> StoreResult<Vec<Task>> {
        let tables = self.tables.lock().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|task| task.board_id == board_id)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn next_task_position(&self, column_id: Uuid) -> StoreResult<i32> {
        let tables = self.tables.lock().await;
        Ok(next_position(
            tables
                .tasks
                .values()
                .filter(|task| task.column_id == column_id)
                .map(|task| task.position),
        ))
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        changes: TaskChanges,
    ) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.tasks.get_mut(&task_id).map(|task| {
            if let Some(title) = changes.title {
                task.title = title;
            }
            if let Some(description) = changes.description {
                task.description = description;
            }
            if let Some(priority) = changes.priority {
                task.priority = priority;
            }
            if let Some(start_date) = changes.start_date {
                task.start_date = start_date;
            }
            if let Some(due_date) = changes.due_date {
                task.due_date = due_date;
            }
            if let Some(position) = changes.position {
                task.position = position;
            }
            if let Some(board_id) = changes.board_id {
                task.board_id = board_id;
            }
            if let Some(column_id) = changes.column_id {
                task.column_id = column_id;
            }
            if let Some(assignee_ids) = changes.assignee_ids {
                task.assignee_ids = assignee_ids;
            }
            if let Some(label_ids) = changes.label_ids {
                task.label_ids = label_ids;
            }
            task.updated_at = Utc::now();
            task.clone()
        }))
    }

    async fn delete_task(&self, task_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.tasks.remove(&task_id).is_some())
    }
}
