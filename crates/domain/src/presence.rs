//! 出席记录
//!
//! 每个参与者在房间内有且只有一条出席记录，键为其会话ID。
//! 记录的新鲜度（`last_active_at` 距当前的间隔）决定参与者是否算作在线。

use chrono::serde::ts_milliseconds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::value_objects::{SessionId, Timestamp};

/// 出席记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub session_id: SessionId,
    pub display_name: String,
    /// 最近一次心跳、改名或发言的时间
    #[serde(with = "ts_milliseconds")]
    pub last_active_at: Timestamp,
}

impl PresenceRecord {
    pub fn new(
        session_id: SessionId,
        display_name: impl Into<String>,
        last_active_at: Timestamp,
    ) -> Self {
        Self {
            session_id,
            display_name: display_name.into(),
            last_active_at,
        }
    }

    /// 记录距 `now` 的年龄
    ///
    /// 时钟偏差可能让 `last_active_at` 跑到 `now` 之后，此时按零龄处理。
    pub fn age(&self, now: Timestamp) -> Duration {
        (now - self.last_active_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// 记录在给定活跃窗口内是否算作在线（严格小于窗口）
    pub fn is_active(&self, now: Timestamp, active_window: Duration) -> bool {
        self.age(now) < active_window
    }

    /// 记录是否已陈旧到可以清除（达到或超过陈旧窗口）
    pub fn is_stale(&self, now: Timestamp, stale_window: Duration) -> bool {
        self.age(now) >= stale_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at_millis(millis: i64) -> Timestamp {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_active_window_is_exclusive() {
        let record = PresenceRecord::new(SessionId::generate(), "QuietScout", at_millis(0));
        let window = Duration::from_millis(15_000);

        assert!(record.is_active(at_millis(14_999), window));
        // 恰好等于窗口长度时已不算在线
        assert!(!record.is_active(at_millis(15_000), window));
        assert!(!record.is_active(at_millis(15_001), window));
    }

    #[test]
    fn test_stale_window_is_inclusive() {
        let record = PresenceRecord::new(SessionId::generate(), "HiddenRanger", at_millis(0));
        let window = Duration::from_millis(60_000);

        assert!(!record.is_stale(at_millis(59_999), window));
        // 恰好达到窗口长度时即视为陈旧
        assert!(record.is_stale(at_millis(60_000), window));
        assert!(record.is_stale(at_millis(60_001), window));
    }

    #[test]
    fn test_future_timestamps_count_as_fresh() {
        let record = PresenceRecord::new(SessionId::generate(), "GhostAgent", at_millis(10_000));
        assert_eq!(record.age(at_millis(5_000)), Duration::ZERO);
        assert!(record.is_active(at_millis(5_000), Duration::from_millis(15_000)));
    }

    #[test]
    fn test_serializes_last_active_at_as_epoch_millis() {
        let record = PresenceRecord::new(
            SessionId::generate(),
            "MaskedLurker",
            at_millis(1_700_000_000_500),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["last_active_at"], 1_700_000_000_500i64);
        assert_eq!(json["display_name"], "MaskedLurker");
    }
}
