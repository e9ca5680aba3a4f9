use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::MessageResponse;
use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    extract::ValidJson,
    models::{NewPasswordResetToken, NewUser, User, ROLE_MEMBER},
    state::AppState,
};

const FORGOT_PASSWORD_MESSAGE: &str =
    "if an account exists for that email, a password reset link has been sent";

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    #[serde(deserialize_with = "normalized_email")]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    #[serde(deserialize_with = "normalized_email")]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "email must be a valid address"))]
    #[serde(deserialize_with = "normalized_email")]
    pub email: String,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserInfo>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let user = state
        .store()
        .create_user(NewUser {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: payload.email,
            password_hash,
            role: ROLE_MEMBER.to_string(),
        })
        .await?;

    info!(user_id = %user.id, "registered user");
    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let Some(user) = state.store().find_user_by_email(&payload.email).await? else {
        password::verify_placeholder(&payload.password);
        return Err(invalid_credentials());
    };

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| invalid_credentials())?;
    if !valid {
        return Err(invalid_credentials());
    }

    let access_token = state.jwt.generate_token(user.id, &user.role)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in(),
        user: UserInfo::from(user),
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ForgotPasswordRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let mut reset_token = None;

    if let Some(user) = state.store().find_user_by_email(&payload.email).await? {
        // Failures are logged only; the response must not reveal the account.
        match issue_reset_token(&state, user).await {
            Ok(token) if state.config.expose_reset_tokens => reset_token = Some(token),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to issue password reset token"),
        }
    }

    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE,
        reset_token,
    }))
}

async fn issue_reset_token(state: &AppState, user: User) -> anyhow::Result<String> {
    let token = state.jwt.generate_reset_token(user.id)?;
    state
        .store()
        .insert_reset_token(NewPasswordResetToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            email: user.email,
            token_hash: hash_token(&token),
            expires_at: Utc::now() + state.jwt.reset_expiry(),
        })
        .await?;

    info!(user_id = %user.id, "issued password reset token");
    Ok(token)
}

pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let claims = state
        .jwt
        .verify_reset_token(&payload.token)
        .map_err(|_| invalid_reset_token())?;

    let password_hash = password::hash_password(&payload.new_password)?;
    let redeemed = state
        .store()
        .redeem_reset_token(
            &hash_token(&payload.token),
            claims.sub,
            password_hash,
            Utc::now(),
        )
        .await?;

    if !redeemed {
        return Err(invalid_reset_token());
    }

    info!(user_id = %claims.sub, "password reset completed");
    Ok(Json(MessageResponse::new("password has been reset")))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(payload): ValidJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let account = state
        .store()
        .find_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("user not found"))?;

    let valid = password::verify_password(&payload.current_password, &account.password_hash)?;
    if !valid {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "current password is incorrect",
        ));
    }

    let password_hash = password::hash_password(&payload.new_password)?;
    if !state
        .store()
        .update_user_password(account.id, password_hash)
        .await?
    {
        return Err(AppError::not_found_msg("user not found"));
    }

    info!(user_id = %account.id, "password changed");
    Ok(Json(MessageResponse::new("password changed")))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserInfo>> {
    let account = state
        .store()
        .find_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found_msg("user not found"))?;
    Ok(Json(UserInfo::from(account)))
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Emails are compared case-insensitively, so they are normalized before validation.
fn normalized_email<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|raw| normalize_email(&raw))
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn invalid_credentials() -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "invalid credentials")
}

fn invalid_reset_token() -> AppError {
    AppError::bad_request("invalid or expired reset token")
}

#[cfg(test)]
mod tests {
    use super::{hash_token, normalize_email};

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hashed = hash_token("token");
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_token("token"));
        assert_ne!(hashed, hash_token("other"));
    }
}
