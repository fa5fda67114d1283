//! 出席视图与心跳
//!
//! 出席记录以 `rooms/{code}/users` 子树为准。这里负责：
//! - 把子树快照投影成在线用户列表
//! - 构造心跳和改名用的部分更新字段

use chrono::TimeZone;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use domain::{PresenceRecord, SessionId, Timestamp};

/// 在线用户视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnlineUser {
    pub session_id: SessionId,
    pub display_name: String,
}

/// 从 users 子树快照推导在线用户列表
///
/// 会话ID取自记录的键，记录体里的同名字段不参与判定。
/// 展示名缺失时按空字符串处理，活跃时间缺失或不可解析的
/// 记录不算在线。键无法解析的条目直接跳过。
pub fn project_online_users(
    snapshot: Option<&Value>,
    now: Timestamp,
    active_window: Duration,
) -> Vec<OnlineUser> {
    let Some(entries) = snapshot.and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut users = Vec::new();
    for (key, entry) in entries {
        let Ok(session_id) = SessionId::from_string(key) else {
            debug!(%key, "skipping presence entry with unusable key");
            continue;
        };
        let Some(last_active_at) = read_last_active(entry) else {
            continue;
        };
        let display_name = entry
            .get("display_name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let record = PresenceRecord::new(session_id, display_name, last_active_at);
        if record.is_active(now, active_window) {
            users.push(OnlineUser {
                session_id,
                display_name: record.display_name,
            });
        }
    }
    users
}

/// 读取记录的 `last_active_at` 字段
pub(crate) fn read_last_active(entry: &Value) -> Option<Timestamp> {
    entry
        .get("last_active_at")
        .and_then(Value::as_i64)
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

/// 心跳：只刷新活跃时间
pub fn heartbeat_fields(now: Timestamp) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("last_active_at".into(), Value::from(now.timestamp_millis()));
    fields
}

/// 改名：写入新展示名并刷新活跃时间
pub fn rename_fields(display_name: &str, now: Timestamp) -> Map<String, Value> {
    let mut fields = heartbeat_fields(now);
    fields.insert("display_name".into(), Value::from(display_name));
    fields
}
