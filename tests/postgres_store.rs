//! Exercises `PgStore` against a real database. Every test returns early
//! unless `TEST_DATABASE_URL` points at a disposable PostgreSQL instance.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use diesel::connection::SimpleConnection;
use once_cell::sync::Lazy;
use taskboard::db::{self, PgPool};
use taskboard::models::{
    NewBoardColumn, NewPasswordResetToken, NewProject, NewTask, NewUser, ROLE_MEMBER,
};
use taskboard::store::{PgStore, StoreError, TaskStore};
use tokio::sync::Mutex;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

async fn test_store() -> Result<Option<PgStore>> {
    Ok(test_pool()
        .await?
        .map(|pool| PgStore::new(pool, Duration::from_secs(5))))
}

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        return Ok(None);
    };

    let pool = db::init_pool_with_size(&database_url, 2)?;
    db::run_migrations(&pool)?;

    let cleanup_pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = cleanup_pool
            .get()
            .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
        conn.batch_execute(
            "TRUNCATE TABLE tasks, board_columns, boards, project_members, projects, \
             password_reset_tokens, users RESTART IDENTITY CASCADE",
        )
        .context("failed to truncate tables")?;
        Ok(())
    })
    .await
    .context("cleanup task panicked")??;

    Ok(Some(pool))
}

async fn user(store: &PgStore, email: &str) -> Result<Uuid> {
    let created = store
        .create_user(NewUser {
            id: Uuid::new_v4(),
            name: email.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: ROLE_MEMBER.to_string(),
        })
        .await?;
    Ok(created.id)
}

async fn project_with_task(store: &PgStore, owner_id: Uuid) -> Result<(Uuid, Uuid, Uuid)> {
    let project = store
        .create_project(NewProject {
            id: Uuid::new_v4(),
            name: "Demo".to_string(),
            description: String::new(),
            owner_id,
        })
        .await?;
    let board = store.ensure_default_board(project.id).await?;
    let column = store
        .create_column(NewBoardColumn {
            id: Uuid::new_v4(),
            name: "Todo".to_string(),
            position: store.next_column_position(board.id).await?,
            wip_limit: None,
            board_id: board.id,
        })
        .await?;
    let task = store
        .create_task(NewTask {
            id: Uuid::new_v4(),
            title: "T1".to_string(),
            description: String::new(),
            priority: "MEDIUM".to_string(),
            start_date: None,
            due_date: None,
            position: store.next_task_position(column.id).await?,
            board_id: board.id,
            column_id: column.id,
            created_by_id: owner_id,
            assignee_ids: Vec::new(),
            label_ids: Vec::new(),
        })
        .await?;
    Ok((project.id, column.id, task.id))
}

#[tokio::test]
async fn duplicate_emails_conflict() -> Result<()> {
    let _lock = DB_LOCK.lock().await;
    let Some(store) = test_store().await? else {
        return Ok(());
    };

    user(&store, "a@x.com").await?;
    let err = user(&store, "a@x.com").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Conflict(_))
    ));
    Ok(())
}

#[tokio::test]
async fn concurrent_default_board_requests_converge() -> Result<()> {
    let _lock = DB_LOCK.lock().await;
    let Some(store) = test_store().await? else {
        return Ok(());
    };

    let owner = user(&store, "a@x.com").await?;
    let project = store
        .create_project(NewProject {
            id: Uuid::new_v4(),
            name: "Demo".to_string(),
            description: String::new(),
            owner_id: owner,
        })
        .await?;

    let (first, second) = tokio::join!(
        store.ensure_default_board(project.id),
        store.ensure_default_board(project.id)
    );
    assert_eq!(first?.id, second?.id);

    let board = store
        .find_project_board(project.id)
        .await?
        .expect("default board");
    assert_eq!(board.name, "Main board");
    assert!(board.is_default);
    Ok(())
}

#[tokio::test]
async fn column_and_project_cascades() -> Result<()> {
    let _lock = DB_LOCK.lock().await;
    let Some(store) = test_store().await? else {
        return Ok(());
    };

    let owner = user(&store, "a@x.com").await?;
    let (project_id, column_id, task_id) = project_with_task(&store, owner).await?;

    assert_eq!(store.count_project_tasks(project_id).await?, 1);
    assert_eq!(store.delete_column_cascade(column_id).await?, Some(1));
    assert!(store.find_task(task_id).await?.is_none());
    assert_eq!(store.delete_column_cascade(column_id).await?, None);

    let (project_id, _, _) = project_with_task(&store, owner).await?;
    let summary = store
        .delete_project_cascade(project_id)
        .await?
        .expect("project existed");
    assert_eq!(
        (summary.projects, summary.boards, summary.columns, summary.tasks),
        (1, 1, 1, 1)
    );
    assert!(store.find_project(project_id).await?.is_none());
    assert!(store.list_project_members(project_id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn account_deletion_and_reset_tokens() -> Result<()> {
    let _lock = DB_LOCK.lock().await;
    let Some(store) = test_store().await? else {
        return Ok(());
    };

    let owner = user(&store, "a@x.com").await?;
    project_with_task(&store, owner).await?;

    let now = Utc::now();
    store
        .insert_reset_token(NewPasswordResetToken {
            id: Uuid::new_v4(),
            user_id: owner,
            email: "a@x.com".to_string(),
            token_hash: "f".repeat(64),
            expires_at: now + chrono::Duration::hours(1),
        })
        .await?;
    assert!(
        store
            .redeem_reset_token(&"f".repeat(64), owner, "new-hash".to_string(), now)
            .await?
    );
    assert!(
        !store
            .redeem_reset_token(&"f".repeat(64), owner, "again".to_string(), now)
            .await?
    );
    assert_eq!(store.purge_reset_tokens(now).await?, 1);

    let summary = store
        .delete_user_cascade(owner)
        .await?
        .expect("user existed");
    assert_eq!(summary.projects, 1);
    assert_eq!(summary.tasks, 1);
    assert!(store.find_user(owner).await?.is_none());
    assert!(store.delete_user_cascade(owner).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn slow_operations_time_out() -> Result<()> {
    let _lock = DB_LOCK.lock().await;
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };

    let store = PgStore::new(pool, Duration::ZERO);
    let err = store.find_user(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout(limit) if limit == Duration::ZERO));
    Ok(())
}
