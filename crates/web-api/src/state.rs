use std::sync::Arc;

use application::{BroadcastCoordinator, CredentialAuthority, UserService};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub coordinator: Arc<BroadcastCoordinator>,
    pub credentials: Arc<dyn CredentialAuthority>,
    /// 每条 WebSocket 连接的发送队列容量
    pub outbox_capacity: usize,
}

impl AppState {
    pub fn new(
        user_service: Arc<UserService>,
        coordinator: Arc<BroadcastCoordinator>,
        credentials: Arc<dyn CredentialAuthority>,
        outbox_capacity: usize,
    ) -> Self {
        Self {
            user_service,
            coordinator,
            credentials,
            outbox_capacity,
        }
    }
}
