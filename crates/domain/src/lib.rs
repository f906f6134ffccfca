//! 聊天室核心领域模型
//!
//! 包含用户、消息等实体，以及连接、颜色等值对象。

pub mod errors;
pub mod message;
pub mod user;
pub mod value_objects;

pub use errors::{DomainError, RepositoryError};
pub use message::{Message, NewMessage};
pub use user::User;
pub use value_objects::{
    ConnectionId, HexColor, MessageContent, MessageId, PasswordHash, Timestamp, UserEmail,
    UserId, Username,
};
