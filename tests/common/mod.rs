use std::sync::Arc;

use anyhow::{ensure, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskboard::auth::jwt::JwtService;
use taskboard::config::{AppConfig, StoreBackend};
use taskboard::routes;
use taskboard::state::AppState;
use taskboard::store::{MemoryStore, TaskStore};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "pw123456";

pub fn test_config() -> AppConfig {
    AppConfig {
        store_backend: StoreBackend::Memory,
        database_url: None,
        database_max_pool_size: 1,
        store_timeout_secs: 5,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        reset_token_audience: "test-reset".to_string(),
        reset_token_expiry_hours: 24,
        expose_reset_tokens: true,
        cors_allowed_origin: None,
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    store: Arc<MemoryStore>,
}

#[allow(dead_code)]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(store.clone(), store, config)
    }

    /// Routes see `routed`; `backing` is the memory store it ultimately reads.
    pub fn with_store(
        backing: Arc<MemoryStore>,
        routed: Arc<dyn TaskStore>,
        config: AppConfig,
    ) -> Self {
        let jwt = JwtService::from_config(&config);
        let state = AppState::new(routed, config, jwt);
        let router = routes::create_router(state.clone());
        Self {
            state,
            router,
            store: backing,
        }
    }

    #[allow(dead_code)]
    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserBody> {
        let response = self
            .post_json(
                "/api/v1/auth/register",
                &json!({ "name": name, "email": email, "password": password }),
                None,
            )
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "register failed with status {}",
            response.status()
        );
        read_json(response).await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/v1/auth/login",
                &LoginPayload { email, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = read_json(response).await?;
        Ok(parsed.access_token)
    }

    /// Registers a user with [`PASSWORD`] and returns its id and a session token.
    #[allow(dead_code)]
    pub async fn signed_in(&self, email: &str) -> Result<(Uuid, String)> {
        let user = self.register("Tester", email, PASSWORD).await?;
        let token = self.login_token(email, PASSWORD).await?;
        Ok((user.id, token))
    }

    #[allow(dead_code)]
    pub async fn create_project(&self, name: &str, token: &str) -> Result<Uuid> {
        let response = self
            .post_json("/api/v1/projects", &json!({ "name": name }), Some(token))
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "project creation failed with status {}",
            response.status()
        );
        let body: serde_json::Value = read_json(response).await?;
        id_of(&body)
    }

    #[allow(dead_code)]
    pub async fn create_column(
        &self,
        project_id: Uuid,
        name: &str,
        token: &str,
    ) -> Result<serde_json::Value> {
        let response = self
            .post_json(
                "/api/v1/columns",
                &json!({ "projectId": project_id, "name": name }),
                Some(token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "column creation failed with status {}",
            response.status()
        );
        read_json(response).await
    }

    #[allow(dead_code)]
    pub async fn create_task(&self, column_id: Uuid, title: &str, token: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/api/v1/tasks",
                &json!({ "columnId": column_id, "title": title }),
                Some(token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "task creation failed with status {}",
            response.status()
        );
        let body: serde_json::Value = read_json(response).await?;
        id_of(&body)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, Body::empty(), None, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, Body::empty(), None, token)
            .await
    }

    /// Sends a raw body, for requests that must bypass `serde` on the client side.
    #[allow(dead_code)]
    pub async fn post_raw(
        &self,
        path: &str,
        body: &'static str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send(
            Method::POST,
            path,
            Body::from(body),
            Some("application/json"),
            token,
        )
        .await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(method, path, Body::from(body), Some("application/json"), token)
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Body,
        content_type: Option<&str>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[allow(dead_code)]
pub fn id_of(value: &serde_json::Value) -> Result<Uuid> {
    let raw = value["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("response has no id: {value}"))?;
    Ok(raw.parse()?)
}
