use domain::{ConnectionId, DomainError, RepositoryError};
use thiserror::Error;

use crate::connection::ConnectionState;
use crate::password::PasswordHasherError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    /// 凭证缺失、格式错误、签名无效或已过期
    #[error("authentication failed")]
    Unauthenticated,
    /// 凭证有效，但对应的用户记录不存在
    #[error("unknown user")]
    UnknownUser,
    #[error("resource not found")]
    NotFound,
    #[error("only the author may perform this action")]
    NotAuthor,
    #[error("{resource} already exists")]
    Conflict { resource: &'static str },
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    #[error("connection is {0:?}, operation not allowed")]
    InvalidState(ConnectionState),
    /// 下游存储不可达或写入失败
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    /// 是否应当直接断开连接（不创建会话）
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ApplicationError::Unauthenticated | ApplicationError::UnknownUser
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => ApplicationError::NotFound,
            RepositoryError::NotAuthor => ApplicationError::NotAuthor,
            RepositoryError::Conflict { resource } => ApplicationError::Conflict { resource },
            RepositoryError::Storage { message } => ApplicationError::Persistence(message),
        }
    }
}
