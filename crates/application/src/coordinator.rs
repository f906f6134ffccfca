//! 广播协调器
//!
//! 处理每个入站事件：更新在线注册表和/或调用消息存储，再把结果扇出给单个连接或全部连接。
//! 只有等待身份解析与存储调用时会挂起，挂起期间不持有注册表的锁。

use std::sync::Arc;

use domain::{ConnectionId, HexColor, MessageContent, MessageId, NewMessage};

use crate::error::ApplicationError;
use crate::events::{ClientEvent, ServerEvent};
use crate::identity::{IdentityResolver, VerifiedIdentity};
use crate::presence::{ConnectedSession, Outbox, PresenceRegistry};
use crate::repository::{MessageRepository, UserRepository};

pub struct CoordinatorDependencies {
    pub identity_resolver: Arc<IdentityResolver>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub registry: Arc<PresenceRegistry>,
}

pub struct BroadcastCoordinator {
    deps: CoordinatorDependencies,
}

impl BroadcastCoordinator {
    pub fn new(deps: CoordinatorDependencies) -> Self {
        Self { deps }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.deps.registry
    }

    /// 解析连接出示的凭证
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<VerifiedIdentity, ApplicationError> {
        self.deps.identity_resolver.resolve(credential).await
    }

    /// 注册会话，把完整历史只发给新连接，再向所有连接广播在线列表
    ///
    /// 读取历史期间会话处于待激活状态，发给它的广播先暂存，
    /// 历史入队后再放出，因此新连接收到的第一条事件总是 `history`。
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        identity: VerifiedIdentity,
        outbox: Outbox,
    ) -> Result<(), ApplicationError> {
        let session = ConnectedSession::new(
            connection_id,
            identity.user_id,
            identity.username,
            identity.color,
        );
        self.deps.registry.register_pending(session, outbox).await?;

        let history = match self.deps.message_repository.list_all().await {
            Ok(history) => history,
            Err(err) => {
                tracing::error!(%connection_id, error = %err, "failed to load message history");
                self.deps.registry.unregister(connection_id).await;
                return Err(err.into());
            }
        };

        tracing::debug!(%connection_id, messages = history.len(), "sending history");
        if !self.deps.registry.activate(connection_id, history).await {
            tracing::debug!(%connection_id, "session left before history was delivered");
            return Ok(());
        }
        self.deps.registry.broadcast_presence().await;
        Ok(())
    }

    /// 注销会话并向剩余连接广播在线列表；会话不存在时不广播
    pub async fn leave(&self, connection_id: ConnectionId) {
        let Some(session) = self.deps.registry.unregister(connection_id).await else {
            return;
        };

        if session.typing {
            self.deps
                .registry
                .broadcast(ServerEvent::UserStopTyping(session.username.clone()))
                .await;
        }
        self.deps.registry.broadcast_presence().await;

        tracing::info!(
            %connection_id,
            user_id = %session.user_id,
            username = %session.username,
            "session closed"
        );
    }

    pub async fn handle(&self, connection_id: ConnectionId, event: ClientEvent) {
        // 注册表里找不到会话时按“尚未加入”处理，静默忽略
        let Some(session) = self.deps.registry.get(connection_id).await else {
            tracing::debug!(%connection_id, ?event, "ignoring event from unknown connection");
            return;
        };

        match event {
            ClientEvent::Message(content) => self.send_message(&session, content).await,
            ClientEvent::UpdateColor(color) => self.update_color(&session, color).await,
            ClientEvent::Typing => self.set_typing(&session, true).await,
            ClientEvent::StopTyping => self.set_typing(&session, false).await,
            ClientEvent::EditMessage(payload) => {
                self.edit_message(&session, payload.id, payload.content)
                    .await
            }
            ClientEvent::DeleteMessage(id) => self.delete_message(&session, id).await,
            ClientEvent::MessageSeen(id) => self.message_seen(&session, id).await,
        }
    }

    async fn send_message(&self, session: &ConnectedSession, content: String) {
        let new_message = NewMessage {
            username: session.username.clone(),
            content: MessageContent::new(content),
            color: session.color.clone(),
        };

        let mut message = match self.deps.message_repository.create(new_message).await {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(
                    connection_id = %session.connection_id,
                    error = %err,
                    "failed to persist message, not broadcasting"
                );
                return;
            }
        };

        // 广播使用会话当前的用户名与颜色
        message.username = session.username.clone();
        message.color = session.color.clone();

        tracing::debug!(message_id = %message.id, username = %session.username, "message created");
        self.deps
            .registry
            .broadcast(ServerEvent::Message(message))
            .await;
    }

    async fn update_color(&self, session: &ConnectedSession, raw: String) {
        let color = match HexColor::parse(raw) {
            Ok(color) => color,
            Err(err) => {
                tracing::warn!(connection_id = %session.connection_id, error = %err, "ignoring invalid color");
                return;
            }
        };

        if self
            .deps
            .registry
            .update_color(session.connection_id, color.clone())
            .await
            .is_none()
        {
            return;
        }

        // 先更新内存并广播，持久化异步进行；失败只记录日志，不回滚
        let users = Arc::clone(&self.deps.user_repository);
        let user_id = session.user_id;
        tokio::spawn(async move {
            if let Err(err) = users.set_color(user_id, color).await {
                tracing::warn!(%user_id, error = %err, "failed to persist color change");
            }
        });

        self.deps.registry.broadcast_presence().await;
    }

    async fn set_typing(&self, session: &ConnectedSession, typing: bool) {
        self.deps
            .registry
            .set_typing(session.connection_id, typing)
            .await;

        let username = session.username.clone();
        let event = if typing {
            ServerEvent::UserTyping(username)
        } else {
            ServerEvent::UserStopTyping(username)
        };
        self.deps.registry.broadcast(event).await;
    }

    /// 不校验作者，任何在线用户都可以编辑任意消息
    async fn edit_message(&self, session: &ConnectedSession, id: MessageId, content: String) {
        let result = self
            .deps
            .message_repository
            .update_content(id, MessageContent::new(content))
            .await;

        match result {
            Ok(message) => {
                tracing::debug!(message_id = %id, editor = %session.username, "message edited");
                self.deps
                    .registry
                    .broadcast(ServerEvent::MessageEdited(message))
                    .await;
            }
            Err(err) => {
                let err = ApplicationError::from(err);
                let description = match &err {
                    ApplicationError::NotFound => "message not found",
                    _ => {
                        tracing::error!(message_id = %id, error = %err, "failed to edit message");
                        "failed to edit message"
                    }
                };
                self.deps
                    .registry
                    .send_to(
                        session.connection_id,
                        ServerEvent::EditError(description.to_owned()),
                    )
                    .await;
            }
        }
    }

    async fn delete_message(&self, session: &ConnectedSession, id: MessageId) {
        let result = self
            .deps
            .message_repository
            .delete_as_author(id, &session.username)
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(message_id = %id, username = %session.username, "message deleted");
                self.deps
                    .registry
                    .broadcast(ServerEvent::MessageDeleted(id))
                    .await;
            }
            Err(err) => {
                let err = ApplicationError::from(err);
                let description = match &err {
                    ApplicationError::NotFound => "message not found",
                    ApplicationError::NotAuthor => "you can only delete your own messages",
                    _ => {
                        tracing::error!(message_id = %id, error = %err, "failed to delete message");
                        "failed to delete message"
                    }
                };
                self.deps
                    .registry
                    .send_to(
                        session.connection_id,
                        ServerEvent::DeleteError(description.to_owned()),
                    )
                    .await;
            }
        }
    }

    async fn message_seen(&self, session: &ConnectedSession, id: MessageId) {
        let Some(updated) = self
            .deps
            .registry
            .update_last_seen(session.connection_id, id)
            .await
        else {
            return;
        };

        self.deps
            .registry
            .broadcast(ServerEvent::UserSeen(updated.presence()))
            .await;
    }
}
