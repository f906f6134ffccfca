use async_trait::async_trait;
use domain::{
    HexColor, Message, MessageContent, MessageId, NewMessage, RepositoryError, User, UserEmail,
    UserId, Username,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名或邮箱重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
    async fn set_color(&self, id: UserId, color: HexColor) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 保存消息，由存储分配 id 与创建时间
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    // 按创建顺序返回全部消息
    async fn list_all(&self) -> Result<Vec<Message>, RepositoryError>;

    // 无条件更新正文，不校验作者
    async fn update_content(
        &self,
        id: MessageId,
        content: MessageContent,
    ) -> Result<Message, RepositoryError>;

    // 只有作者本人可以删除
    async fn delete_as_author(
        &self,
        id: MessageId,
        acting: &Username,
    ) -> Result<(), RepositoryError>;
}

/// 内存实现的仓储（用于测试和本地开发）
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct MemoryUserRepository {
        users: RwLock<HashMap<UserId, User>>,
    }

    impl MemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl UserRepository for MemoryUserRepository {
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            let mut users = self.users.write().await;
            if users.values().any(|u| u.username == user.username) {
                return Err(RepositoryError::conflict("username"));
            }
            if users.values().any(|u| u.email == user.email) {
                return Err(RepositoryError::conflict("email"));
            }
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
            Ok(self.users.read().await.get(&id).cloned())
        }

        async fn find_by_email(
            &self,
            email: &UserEmail,
        ) -> Result<Option<User>, RepositoryError> {
            let users = self.users.read().await;
            Ok(users.values().find(|u| &u.email == email).cloned())
        }

        async fn find_by_username(
            &self,
            username: &Username,
        ) -> Result<Option<User>, RepositoryError> {
            let users = self.users.read().await;
            Ok(users.values().find(|u| &u.username == username).cloned())
        }

        async fn set_color(&self, id: UserId, color: HexColor) -> Result<(), RepositoryError> {
            let mut users = self.users.write().await;
            let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            user.set_color(color);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MessageTable {
        rows: BTreeMap<MessageId, Message>,
        last_id: i64,
    }

    #[derive(Default)]
    pub struct MemoryMessageRepository {
        table: RwLock<MessageTable>,
    }

    impl MemoryMessageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl MessageRepository for MemoryMessageRepository {
        async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
            let mut table = self.table.write().await;
            table.last_id += 1;
            let stored = Message {
                id: MessageId(table.last_id),
                username: message.username,
                content: message.content,
                color: message.color,
                created_at: chrono::Utc::now(),
            };
            table.rows.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn list_all(&self) -> Result<Vec<Message>, RepositoryError> {
            // BTreeMap 按 id 排序，id 与创建顺序一致
            Ok(self.table.read().await.rows.values().cloned().collect())
        }

        async fn update_content(
            &self,
            id: MessageId,
            content: MessageContent,
        ) -> Result<Message, RepositoryError> {
            let mut table = self.table.write().await;
            let message = table.rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            message.edit(content);
            Ok(message.clone())
        }

        async fn delete_as_author(
            &self,
            id: MessageId,
            acting: &Username,
        ) -> Result<(), RepositoryError> {
            let mut table = self.table.write().await;
            let message = table.rows.get(&id).ok_or(RepositoryError::NotFound)?;
            if !message.is_authored_by(acting) {
                return Err(RepositoryError::NotAuthor);
            }
            table.rows.remove(&id);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn new_message(author: &str, content: &str) -> NewMessage {
            NewMessage {
                username: Username::parse(author).unwrap(),
                content: MessageContent::new(content),
                color: HexColor::default(),
            }
        }

        #[tokio::test]
        async fn assigns_increasing_ids_and_lists_in_order() {
            let repo = MemoryMessageRepository::new();
            let first = repo.create(new_message("alice", "one")).await.unwrap();
            let second = repo.create(new_message("bob", "two")).await.unwrap();
            assert!(second.id > first.id);

            let all = repo.list_all().await.unwrap();
            assert_eq!(all.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        }

        #[tokio::test]
        async fn delete_is_restricted_to_author() {
            let repo = MemoryMessageRepository::new();
            let message = repo.create(new_message("alice", "hi")).await.unwrap();
            let bob = Username::parse("bob").unwrap();
            let alice = Username::parse("alice").unwrap();

            assert_eq!(
                repo.delete_as_author(message.id, &bob).await,
                Err(RepositoryError::NotAuthor)
            );
            assert_eq!(repo.delete_as_author(message.id, &alice).await, Ok(()));
            assert_eq!(
                repo.delete_as_author(message.id, &alice).await,
                Err(RepositoryError::NotFound)
            );
        }

        #[tokio::test]
        async fn update_missing_message_is_not_found() {
            let repo = MemoryMessageRepository::new();
            let result = repo
                .update_content(MessageId(42), MessageContent::new("x"))
                .await;
            assert_eq!(result, Err(RepositoryError::NotFound));
        }
    }
}
