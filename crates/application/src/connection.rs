//! 单条连接的生命周期
//!
//! `Connecting -> Authenticated -> Active -> Closed`，状态不会重入，`Closed` 为终态。

use std::sync::Arc;

use domain::ConnectionId;

use crate::coordinator::BroadcastCoordinator;
use crate::error::ApplicationError;
use crate::events::ClientEvent;
use crate::identity::VerifiedIdentity;
use crate::presence::Outbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

pub struct ChatConnection {
    id: ConnectionId,
    state: ConnectionState,
    identity: Option<VerifiedIdentity>,
    coordinator: Arc<BroadcastCoordinator>,
}

impl ChatConnection {
    pub fn new(coordinator: Arc<BroadcastCoordinator>) -> Self {
        Self {
            id: ConnectionId::generate(),
            state: ConnectionState::Connecting,
            identity: None,
            coordinator,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        self.identity.as_ref()
    }

    /// 校验凭证并加入聊天室
    ///
    /// 任何失败都会直接进入 `Closed`，调用方应随即断开传输连接。
    pub async fn open(
        &mut self,
        credential: Option<&str>,
        outbox: Outbox,
    ) -> Result<(), ApplicationError> {
        if self.state != ConnectionState::Connecting {
            return Err(ApplicationError::InvalidState(self.state));
        }

        let identity = match self.coordinator.authenticate(credential).await {
            Ok(identity) => identity,
            Err(err) => {
                self.state = ConnectionState::Closed;
                tracing::info!(connection_id = %self.id, error = %err, "connection refused");
                return Err(err);
            }
        };
        self.state = ConnectionState::Authenticated;

        if let Err(err) = self
            .coordinator
            .join(self.id, identity.clone(), outbox)
            .await
        {
            self.state = ConnectionState::Closed;
            return Err(err);
        }

        tracing::info!(
            connection_id = %self.id,
            user_id = %identity.user_id,
            username = %identity.username,
            "connection active"
        );
        self.identity = Some(identity);
        self.state = ConnectionState::Active;
        Ok(())
    }

    pub async fn handle(&self, event: ClientEvent) {
        if self.state != ConnectionState::Active {
            tracing::debug!(connection_id = %self.id, state = ?self.state, "dropping event, connection not active");
            return;
        }
        self.coordinator.handle(self.id, event).await;
    }

    /// 幂等；只有从 `Active` 关闭时才会注销并广播
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if previous == ConnectionState::Active {
            self.coordinator.leave(self.id).await;
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        // `Authenticated` 时会话可能已注册，正在等待历史
        if !matches!(
            self.state,
            ConnectionState::Authenticated | ConnectionState::Active
        ) {
            return;
        }
        // 任务被中止时仍需注销会话；未注册时 leave 为空操作
        tracing::warn!(connection_id = %self.id, state = ?self.state, "connection dropped before close, cleaning up");
        let coordinator = Arc::clone(&self.coordinator);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { coordinator.leave(id).await });
        }
    }
}
