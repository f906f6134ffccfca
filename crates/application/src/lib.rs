//! 应用层实现。
//!
//! 在线注册表、身份解析、广播协调器以及账号用例服务，
//! 并对外部适配器（用户/消息存储、密码哈希、凭证签发）做抽象。

pub mod auth;
pub mod clock;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod identity;
pub mod password;
pub mod presence;
pub mod repository;
pub mod services;

pub use auth::{CredentialAuthority, CredentialClaims};
pub use clock::{Clock, SystemClock};
pub use connection::{ChatConnection, ConnectionState};
pub use coordinator::{BroadcastCoordinator, CoordinatorDependencies};
pub use error::ApplicationError;
pub use events::{ClientEvent, EditMessagePayload, PresenceView, ServerEvent};
pub use identity::{IdentityResolver, VerifiedIdentity};
pub use password::{PasswordHasher, PasswordHasherError};
pub use presence::{ConnectedSession, Outbox, PresenceRegistry};
pub use repository::{MessageRepository, UserRepository};
pub use services::{UserService, UserServiceDependencies};
