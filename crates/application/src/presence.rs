//! 在线状态注册表
//!
//! 以连接 id 为键保存所有活动会话，是“谁在线、谁看到了哪条消息”的唯一来源。
//! 所有变更与扇出都在同一把锁内完成，锁内不做任何 await 外部调用。

use std::collections::{HashMap, HashSet};

use domain::{ConnectionId, HexColor, Message, MessageId, UserId, Username};
use tokio::sync::{mpsc, Mutex};

use crate::error::ApplicationError;
use crate::events::{PresenceView, ServerEvent};

/// 单个连接的出站队列，由传输层的写任务消费
pub type Outbox = mpsc::Sender<ServerEvent>;

/// 一条活动连接的会话状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedSession {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: Username,
    pub color: HexColor,
    pub last_seen_message_id: Option<MessageId>,
    pub typing: bool,
}

impl ConnectedSession {
    pub fn new(
        connection_id: ConnectionId,
        user_id: UserId,
        username: Username,
        color: HexColor,
    ) -> Self {
        Self {
            connection_id,
            user_id,
            username,
            color,
            last_seen_message_id: None,
            typing: false,
        }
    }

    pub fn presence(&self) -> PresenceView {
        PresenceView {
            username: self.username.clone(),
            color: self.color.clone(),
            last_seen_message_id: self.last_seen_message_id,
        }
    }
}

struct Entry {
    session: ConnectedSession,
    outbox: Outbox,
    joined: u64,
    /// 历史尚未入队时暂存的事件；`None` 表示已激活
    pending: Option<Vec<ServerEvent>>,
}

#[derive(Default)]
struct Sessions {
    entries: HashMap<ConnectionId, Entry>,
    next_seq: u64,
}

impl Sessions {
    /// 按加入顺序排列，保证单次快照内顺序稳定
    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.joined);
        entries
    }

    fn ordered_ids(&self) -> Vec<ConnectionId> {
        self.ordered()
            .into_iter()
            .map(|entry| entry.session.connection_id)
            .collect()
    }

    fn deliver(entry: &mut Entry, event: ServerEvent) {
        match entry.pending.as_mut() {
            Some(buffer) => buffer.push(event),
            None => Self::push(entry, event),
        }
    }

    fn push(entry: &Entry, event: ServerEvent) {
        let connection_id = entry.session.connection_id;
        match entry.outbox.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    %connection_id,
                    event = event.name(),
                    "outbox full, dropping event for slow connection"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(%connection_id, "outbox closed, connection is going away");
            }
        }
    }
}

/// 在线状态注册表
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<Sessions>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册后立即开始接收事件
    pub async fn register(
        &self,
        session: ConnectedSession,
        outbox: Outbox,
    ) -> Result<(), ApplicationError> {
        self.insert(session, outbox, None).await
    }

    /// 注册但暂存发往该连接的事件，直到 [`activate`](Self::activate) 把历史放在最前面
    pub async fn register_pending(
        &self,
        session: ConnectedSession,
        outbox: Outbox,
    ) -> Result<(), ApplicationError> {
        self.insert(session, outbox, Some(Vec::new())).await
    }

    /// 先入队历史，再按原顺序放出暂存事件；已包含在历史中的 `Message` 被丢弃。
    /// 连接已不存在时返回 false。
    pub async fn activate(&self, connection_id: ConnectionId, history: Vec<Message>) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.get_mut(&connection_id) else {
            return false;
        };
        let buffered = entry.pending.take().unwrap_or_default();

        let known: HashSet<MessageId> = history.iter().map(|message| message.id).collect();
        Sessions::push(entry, ServerEvent::History(history));
        for event in buffered {
            match &event {
                ServerEvent::Message(message) if known.contains(&message.id) => {
                    tracing::debug!(%connection_id, message_id = %message.id, "message already in history");
                }
                _ => Sessions::push(entry, event),
            }
        }
        true
    }

    async fn insert(
        &self,
        session: ConnectedSession,
        outbox: Outbox,
        pending: Option<Vec<ServerEvent>>,
    ) -> Result<(), ApplicationError> {
        let mut inner = self.inner.lock().await;
        let connection_id = session.connection_id;
        if inner.entries.contains_key(&connection_id) {
            return Err(ApplicationError::DuplicateConnection(connection_id));
        }
        let joined = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            connection_id,
            Entry {
                session,
                outbox,
                joined,
                pending,
            },
        );
        tracing::debug!(%connection_id, online = inner.entries.len(), "session registered");
        Ok(())
    }

    /// 不存在时为空操作，返回被移除的会话
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<ConnectedSession> {
        let mut inner = self.inner.lock().await;
        let removed = inner.entries.remove(&connection_id).map(|entry| entry.session);
        if removed.is_some() {
            tracing::debug!(%connection_id, online = inner.entries.len(), "session unregistered");
        }
        removed
    }

    pub async fn get(&self, connection_id: ConnectionId) -> Option<ConnectedSession> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(&connection_id)
            .map(|entry| entry.session.clone())
    }

    pub async fn update_color(
        &self,
        connection_id: ConnectionId,
        color: HexColor,
    ) -> Option<ConnectedSession> {
        self.modify(connection_id, |session| session.color = color)
            .await
    }

    /// 水位线只前进不后退
    pub async fn update_last_seen(
        &self,
        connection_id: ConnectionId,
        message_id: MessageId,
    ) -> Option<ConnectedSession> {
        self.modify(connection_id, |session| {
            match session.last_seen_message_id {
                Some(seen) if seen >= message_id => {}
                _ => session.last_seen_message_id = Some(message_id),
            }
        })
        .await
    }

    pub async fn set_typing(
        &self,
        connection_id: ConnectionId,
        typing: bool,
    ) -> Option<ConnectedSession> {
        self.modify(connection_id, |session| session.typing = typing)
            .await
    }

    pub async fn snapshot(&self) -> Vec<ConnectedSession> {
        let inner = self.inner.lock().await;
        inner
            .ordered()
            .into_iter()
            .map(|entry| entry.session.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 只发给一个连接；连接不存在时返回 false
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.entries.get_mut(&connection_id) {
            Some(entry) => {
                Sessions::deliver(entry, event);
                true
            }
            None => false,
        }
    }

    /// 扇出给当前所有连接
    pub async fn broadcast(&self, event: ServerEvent) {
        let mut inner = self.inner.lock().await;
        for connection_id in inner.ordered_ids() {
            if let Some(entry) = inner.entries.get_mut(&connection_id) {
                Sessions::deliver(entry, event.clone());
            }
        }
    }

    /// 在同一临界区内生成在线列表并扇出，保证每个接收者最后收到的列表与注册表一致
    pub async fn broadcast_presence(&self) {
        let mut inner = self.inner.lock().await;
        let ids = inner.ordered_ids();
        let users: Vec<PresenceView> = ids
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .map(|entry| entry.session.presence())
            .collect();
        for connection_id in ids {
            if let Some(entry) = inner.entries.get_mut(&connection_id) {
                Sessions::deliver(entry, ServerEvent::Users(users.clone()));
            }
        }
    }

    async fn modify(
        &self,
        connection_id: ConnectionId,
        apply: impl FnOnce(&mut ConnectedSession),
    ) -> Option<ConnectedSession> {
        let mut inner = self.inner.lock().await;
        let entry = inner.entries.get_mut(&connection_id)?;
        apply(&mut entry.session);
        Some(entry.session.clone())
    }
}
