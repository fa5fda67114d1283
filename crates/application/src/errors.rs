//! 应用层错误定义

use thiserror::Error;

use domain::{DomainError, RoomCode};

use crate::store::StoreError;

/// 会话已结束，命令无处投递
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("session closed")]
pub struct SessionClosed;

/// 创建或加入房间失败
#[derive(Error, Debug)]
pub enum JoinError {
    /// 房间码格式非法
    #[error(transparent)]
    InvalidCode(#[from] DomainError),

    /// 创建时房间码已被占用
    #[error("room {code} already exists")]
    RoomExists { code: RoomCode },

    /// 加入时房间不存在
    #[error("room {code} not found")]
    RoomNotFound { code: RoomCode },

    /// 存储操作失败
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 会话已结束
    #[error(transparent)]
    Closed(#[from] SessionClosed),
}

/// 发送消息失败
#[derive(Error, Debug)]
pub enum SendError {
    /// 内容被审核拦截
    #[error("message blocked by moderation")]
    Blocked,

    /// 存储操作失败
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 会话已结束
    #[error(transparent)]
    Closed(#[from] SessionClosed),
}
