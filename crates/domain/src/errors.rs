//! 领域层错误定义
//!
//! 领域错误只描述业务规则本身的违反，不关心存储或网络等技术细节。

use thiserror::Error;

/// 领域错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 房间码不符合格式要求
    #[error("invalid room code: {reason}")]
    InvalidRoomCode { reason: String },

    /// 通用参数校验失败
    #[error("invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    pub fn invalid_room_code(reason: impl Into<String>) -> Self {
        Self::InvalidRoomCode {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域层结果类型
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::invalid_room_code("must be exactly 5 digits");
        assert_eq!(
            err.to_string(),
            "invalid room code: must be exactly 5 digits"
        );

        let err = DomainError::invalid_argument("text", "cannot be empty");
        assert_eq!(err.to_string(), "invalid argument 'text': cannot be empty");
    }
}
