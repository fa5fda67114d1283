//! 消息实体

use chrono::serde::ts_milliseconds;
use serde::{Deserialize, Serialize};

use crate::value_objects::Timestamp;

/// 系统消息的发送者名
pub const SYSTEM_SENDER: &str = "System";

/// 新房间欢迎语
pub const WELCOME_TEXT: &str =
    "Welcome to your new room! Share the code to invite others.";

/// 聊天消息
///
/// 消息只携带发送时刻的展示名，不携带会话ID。
/// 名字轮换后无法把历史消息关联回同一参与者，这是有意的设计。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender_name: String,
    #[serde(with = "ts_milliseconds")]
    pub sent_at: Timestamp,
}

impl ChatMessage {
    pub fn new(
        text: impl Into<String>,
        sender_name: impl Into<String>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            text: text.into(),
            sender_name: sender_name.into(),
            sent_at,
        }
    }

    /// 房间创建时写入的欢迎消息
    pub fn welcome(sent_at: Timestamp) -> Self {
        Self::new(WELCOME_TEXT, SYSTEM_SENDER, sent_at)
    }
}
