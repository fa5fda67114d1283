//! 值对象定义
//!
//! 值对象是不可变的，通过值而非身份来区分。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 时间戳统一使用 UTC 时间，毫秒精度在序列化层处理
pub type Timestamp = DateTime<Utc>;

/// 会话ID - 参与者在整个会话期间的稳定标识
///
/// 与展示名不同，会话ID在会话存续期间从不变化，
/// 存储中的出席记录以它为键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// 生成新的随机会话ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// 从字符串解析会话ID
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// 房间码 - 由用户选择的 5 位数字标识
///
/// 房间码是房间的全局地址，知道房间码即可加入。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomCode(String);

impl RoomCode {
    /// 解析并校验房间码
    ///
    /// 合法的房间码恰好由 5 个 ASCII 数字组成，不做任何修剪或归一化。
    pub fn parse(code: impl Into<String>) -> DomainResult<Self> {
        let code = code.into();

        if code.len() != 5 {
            return Err(DomainError::invalid_room_code(
                "must be exactly 5 digits",
            ));
        }

        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::invalid_room_code(
                "must contain only digits",
            ));
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_uniqueness() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::generate();
        let parsed = SessionId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_room_code_valid() {
        let code = RoomCode::parse("12345").unwrap();
        assert_eq!(code.as_str(), "12345");
        assert_eq!(code.to_string(), "12345");

        // 前导零是合法的
        assert!(RoomCode::parse("00000").is_ok());
    }

    #[test]
    fn test_room_code_rejects_wrong_length() {
        assert!(RoomCode::parse("1234").is_err());
        assert!(RoomCode::parse("123456").is_err());
        assert!(RoomCode::parse("").is_err());
    }

    #[test]
    fn test_room_code_rejects_non_digits() {
        assert!(RoomCode::parse("12a45").is_err());
        assert!(RoomCode::parse("12 45").is_err());
        assert!(RoomCode::parse(" 1234").is_err());
        assert!(RoomCode::parse("12.45").is_err());
        // 非 ASCII 数字同样拒绝
        assert!(RoomCode::parse("12٣45").is_err());
    }
}
