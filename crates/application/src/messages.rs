//! 消息视图
//!
//! 消息在存储中按追加键散放，读取侧负责排序。

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use domain::{ChatMessage, Timestamp};

/// 消息视图 - 一条消息及其存储键
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    /// 存储分配的追加键
    pub id: String,
    pub text: String,
    pub sender_name: String,
    pub sent_at: Timestamp,
}

/// 把 messages 子树快照投影成按发送时间升序的消息列表
///
/// 发送时间相同的消息保持存储键的字典序。无法解析的条目跳过。
pub fn project_messages(snapshot: Option<&Value>) -> Vec<MessageView> {
    let Some(entries) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut messages: Vec<MessageView> = entries
        .iter()
        .filter_map(|(key, entry)| {
            match serde_json::from_value::<ChatMessage>(entry.clone()) {
                Ok(message) => Some(MessageView {
                    id: key.clone(),
                    text: message.text,
                    sender_name: message.sender_name,
                    sent_at: message.sent_at,
                }),
                Err(error) => {
                    debug!(%key, %error, "skipping undecodable message entry");
                    None
                }
            }
        })
        .collect();

    // 稳定排序，同一时刻的消息保持键序
    messages.sort_by_key(|message| message.sent_at);
    messages
}
