//! Login and logout.
//!
//! `POST /api/auth/login`: unprotected, flat username/password check
//! `POST /api/auth/logout`: protected, invalidates the bearer token

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::models::Role;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// `POST /api/auth/login`: verify credentials, issue a session token.
///
/// Every failure path returns the same generic 401: callers cannot
/// tell an unknown username from a wrong password.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let credentials = ctx.credentials.clone();
    let username = req.username.clone();

    // Password verification is deliberately slow (PBKDF2); keep it off
    // the async worker threads.
    let verification = tokio::task::spawn_blocking(move || {
        credentials.verify(&username, &req.password)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("verify task: {e}")))??;

    let Some(role) = verification.role.filter(|_| verification.authenticated) else {
        return Err(ApiError::Unauthorized);
    };

    let token = {
        let mut tokens = ctx
            .tokens
            .lock()
            .map_err(|_| ApiError::Internal("token lock".into()))?;
        tokens.issue(&req.username, role)
    };

    tracing::info!(user = %req.username, role = role.as_str(), "login");

    Ok(Json(LoginResponse {
        token,
        username: req.username,
        role,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// `POST /api/auth/logout`: invalidate the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<LogoutResponse>, ApiError> {
    {
        let mut tokens = ctx
            .tokens
            .lock()
            .map_err(|_| ApiError::Internal("token lock".into()))?;
        tokens.revoke(&user.token);
    }
    tracing::info!(user = %user.username, "logout");
    Ok(Json(LogoutResponse { logged_out: true }))
}
