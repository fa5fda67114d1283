//! 领域层 - 匿名聊天室的核心业务概念
//!
//! 这一层不依赖任何运行时或存储技术，只定义：
//! - 值对象：会话ID、房间码、时间戳
//! - 参与者身份及展示名轮换
//! - 房间元数据、出席记录、消息等持久化形态
//! - 领域错误

pub mod errors;
pub mod identity;
pub mod message;
pub mod presence;
pub mod room;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
pub use identity::{random_display_name, ParticipantIdentity};
pub use message::{ChatMessage, SYSTEM_SENDER, WELCOME_TEXT};
pub use presence::PresenceRecord;
pub use room::RoomInfo;
pub use value_objects::{RoomCode, SessionId, Timestamp};
