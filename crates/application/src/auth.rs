//! 凭证签发与校验抽象
//!
//! 具体实现（JWT）位于基础设施层。

use domain::{User, UserId};

use crate::error::ApplicationError;

/// 校验通过后从凭证中取出的声明。
///
/// 只信任 `subject`，用户名和颜色始终以持久化的用户记录为准。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialClaims {
    pub subject: UserId,
}

#[cfg_attr(test, mockall::automock)]
pub trait CredentialAuthority: Send + Sync {
    /// 为登录成功的用户签发 bearer 凭证
    fn issue(&self, user: &User) -> Result<String, ApplicationError>;

    /// 任何解码、签名或过期失败都返回 `ApplicationError::Unauthenticated`
    fn verify(&self, token: &str) -> Result<CredentialClaims, ApplicationError>;
}
