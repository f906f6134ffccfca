//! Web API 层。
//!
//! 提供 Axum 路由：账号相关的 HTTP 接口，以及承载实时聊天事件的 WebSocket 端点。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{bearer_token, LoginResponse, UserResponse};
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
