use std::sync::Arc;

use domain::{HexColor, UserId, Username};

use crate::auth::CredentialAuthority;
use crate::error::ApplicationError;
use crate::repository::UserRepository;

/// 通过校验的连接身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub username: Username,
    pub color: HexColor,
}

/// 身份解析器
///
/// 凭证只用来确定用户 id，用户名与颜色每次都从用户记录读取，
/// 这样资料修改会在下一次连接时生效。只读，无副作用。
pub struct IdentityResolver {
    authority: Arc<dyn CredentialAuthority>,
    users: Arc<dyn UserRepository>,
}

impl IdentityResolver {
    pub fn new(authority: Arc<dyn CredentialAuthority>, users: Arc<dyn UserRepository>) -> Self {
        Self { authority, users }
    }

    pub async fn resolve(
        &self,
        credential: Option<&str>,
    ) -> Result<VerifiedIdentity, ApplicationError> {
        let token = credential
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApplicationError::Unauthenticated)?;

        let claims = self.authority.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "credential rejected");
            ApplicationError::Unauthenticated
        })?;

        let user = self
            .users
            .find_by_id(claims.subject)
            .await?
            .ok_or_else(|| {
                tracing::info!(user_id = %claims.subject, "credential subject has no user record");
                ApplicationError::UnknownUser
            })?;

        Ok(VerifiedIdentity {
            user_id: user.id,
            username: user.username,
            color: user.color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialClaims, MockCredentialAuthority};
    use crate::repository::{memory::MemoryUserRepository, MockUserRepository};
    use domain::{PasswordHash, RepositoryError, User, UserEmail};
    use uuid::Uuid;

    fn stored_user(color: &str) -> User {
        User::register(
            UserId::from(Uuid::new_v4()),
            Username::parse("alice").unwrap(),
            UserEmail::parse("alice@example.com").unwrap(),
            PasswordHash::new("hash").unwrap(),
            HexColor::parse(color).unwrap(),
            chrono::Utc::now(),
        )
    }

    fn authority_for(subject: UserId) -> MockCredentialAuthority {
        let mut authority = MockCredentialAuthority::new();
        authority
            .expect_verify()
            .returning(move |token| match token {
                "good" => Ok(CredentialClaims { subject }),
                _ => Err(ApplicationError::Unauthenticated),
            });
        authority
    }

    #[tokio::test]
    async fn missing_or_blank_credential_is_unauthenticated() {
        let resolver = IdentityResolver::new(
            Arc::new(MockCredentialAuthority::new()),
            Arc::new(MemoryUserRepository::new()),
        );

        for credential in [None, Some(""), Some("   ")] {
            let err = resolver.resolve(credential).await.unwrap_err();
            assert!(matches!(err, ApplicationError::Unauthenticated));
        }
    }

    #[tokio::test]
    async fn invalid_credential_is_unauthenticated() {
        let resolver = IdentityResolver::new(
            Arc::new(authority_for(UserId::from(Uuid::new_v4()))),
            Arc::new(MemoryUserRepository::new()),
        );

        let err = resolver.resolve(Some("forged")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Unauthenticated));
    }

    #[tokio::test]
    async fn subject_without_record_is_unknown_user() {
        let resolver = IdentityResolver::new(
            Arc::new(authority_for(UserId::from(Uuid::new_v4()))),
            Arc::new(MemoryUserRepository::new()),
        );

        let err = resolver.resolve(Some("good")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::UnknownUser));
    }

    #[tokio::test]
    async fn profile_fields_come_from_the_user_record() {
        let user = stored_user("#123abc");
        let users = MemoryUserRepository::new();
        users.create(user.clone()).await.unwrap();
        let resolver = IdentityResolver::new(Arc::new(authority_for(user.id)), Arc::new(users));

        let identity = resolver.resolve(Some("good")).await.unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.username.as_str(), "alice");
        assert_eq!(identity.color.as_str(), "#123abc");
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_persistence_error() {
        let subject = UserId::from(Uuid::new_v4());
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(RepositoryError::storage("connection refused")));
        let resolver = IdentityResolver::new(Arc::new(authority_for(subject)), Arc::new(users));

        let err = resolver.resolve(Some("good")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Persistence(_)));
    }
}
