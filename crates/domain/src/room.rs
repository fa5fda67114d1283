//! 房间实体
//!
//! 房间没有独立的生命周期对象，它就是存储中 `rooms/{code}` 子树的内容。
//! 这里定义的 `RoomInfo` 对应其中的 `info` 节点。

use chrono::serde::ts_milliseconds;
use serde::{Deserialize, Serialize};

use crate::value_objects::{SessionId, Timestamp};

/// 房间元数据
///
/// 创建房间时一次性写入，此后只有 `moderation_enabled` 会被创建者改动。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// 创建者的会话ID，用于判定创建者专属操作
    pub creator: SessionId,
    /// 创建时间
    #[serde(with = "ts_milliseconds")]
    pub created_at: Timestamp,
    /// 是否开启内容审核
    pub moderation_enabled: bool,
}

impl RoomInfo {
    /// 新房间的元数据，审核默认关闭
    pub fn new(creator: SessionId, created_at: Timestamp) -> Self {
        Self {
            creator,
            created_at,
            moderation_enabled: false,
        }
    }

    /// 判断给定会话是否为创建者
    pub fn is_creator(&self, session_id: SessionId) -> bool {
        self.creator == session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_new_room_has_moderation_disabled() {
        let creator = SessionId::generate();
        let info = RoomInfo::new(creator, Utc::now());
        assert!(!info.moderation_enabled);
        assert!(info.is_creator(creator));
        assert!(!info.is_creator(SessionId::generate()));
    }

    #[test]
    fn test_serializes_created_at_as_epoch_millis() {
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let info = RoomInfo::new(SessionId::generate(), created_at);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["created_at"], 1_700_000_000_123i64);

        let back: RoomInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back.created_at, created_at);
    }
}
