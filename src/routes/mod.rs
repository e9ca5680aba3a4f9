use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod columns;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = trimmed, "ignoring invalid CORS origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let public_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        // Authenticated through the handler's `AuthenticatedUser` extractor.
        .route("/change-password", post(auth::change_password));

    let projects_routes = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        );

    let columns_routes = Router::new()
        .route("/", post(columns::create_column))
        .route(
            "/:id",
            patch(columns::update_column).delete(columns::delete_column),
        );

    // `/move` is registered before `/:id` so it never parses as a task id.
    let tasks_routes = Router::new()
        .route("/", post(tasks::create_task))
        .route("/move", patch(tasks::move_task))
        .route("/:id", patch(tasks::update_task).delete(tasks::delete_task));

    let users_routes = Router::new().route(
        "/:id",
        patch(users::update_profile).delete(users::delete_account),
    );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .nest("/projects", projects_routes)
        .nest("/columns", columns_routes)
        .nest("/tasks", tasks_routes)
        .nest("/users", users_routes)
        .route_layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let api_routes = Router::new()
        .nest("/auth", public_auth_routes)
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
}
