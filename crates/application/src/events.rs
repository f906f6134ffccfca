//! 客户端与服务端之间的实时事件
//!
//! 线上格式为 `{"event": "<name>", "data": <payload>}`，每个事件名对应唯一的载荷结构。

use domain::{HexColor, Message, MessageId, Username};
use serde::{Deserialize, Serialize};

/// 客户端 -> 服务端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Message(String),
    UpdateColor(String),
    Typing,
    StopTyping,
    EditMessage(EditMessagePayload),
    DeleteMessage(MessageId),
    MessageSeen(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMessagePayload {
    pub id: MessageId,
    pub content: String,
}

/// 在线列表中的一项，也是 `userSeen` 的载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub username: Username,
    pub color: HexColor,
    pub last_seen_message_id: Option<MessageId>,
}

/// 服务端 -> 客户端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// 仅发送给新加入的连接
    History(Vec<Message>),
    Users(Vec<PresenceView>),
    Message(Message),
    UserTyping(Username),
    UserStopTyping(Username),
    MessageEdited(Message),
    MessageDeleted(MessageId),
    /// 仅发送给发起删除的连接
    DeleteError(String),
    /// 仅发送给发起编辑的连接
    EditError(String),
    UserSeen(PresenceView),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::History(_) => "history",
            ServerEvent::Users(_) => "users",
            ServerEvent::Message(_) => "message",
            ServerEvent::UserTyping(_) => "userTyping",
            ServerEvent::UserStopTyping(_) => "userStopTyping",
            ServerEvent::MessageEdited(_) => "messageEdited",
            ServerEvent::MessageDeleted(_) => "messageDeleted",
            ServerEvent::DeleteError(_) => "deleteError",
            ServerEvent::EditError(_) => "editError",
            ServerEvent::UserSeen(_) => "userSeen",
        }
    }
}
