//! HTTP 层的凭证提取与登录响应

use axum::http::HeaderMap;
use domain::User;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// 取出 `Authorization: Bearer <token>` 中的 token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 校验请求头中的凭证，返回用户 id
pub(crate) fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let token =
        bearer_token(headers).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    let claims = state.credentials.verify(token)?;
    Ok(Uuid::from(claims.subject))
}

/// 对外暴露的用户资料，不含密码哈希
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub color: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.to_string(),
            email: user.email.to_string(),
            color: user.color.to_string(),
        }
    }
}

/// 登录响应结构
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}
