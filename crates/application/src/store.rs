//! 实时存储端口
//!
//! 房间的全部状态都挂在一棵以路径寻址的树上：
//!
//! ```text
//! rooms/{code}/info                  房间元数据
//! rooms/{code}/users/{session_id}    出席记录
//! rooms/{code}/messages/{auto_key}   消息，键由存储追加时分配
//! ```
//!
//! 存储本身不理解这些结构，它只提供读写、追加和子树订阅。
//! 订阅语义仿照实时数据库：订阅建立后立即收到一次当前快照，
//! 之后子树内任何变更都会推送整棵子树的最新快照。

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use domain::{RoomCode, SessionId};

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 路径格式非法
    #[error("invalid store path: {reason}")]
    InvalidPath { reason: String },

    /// 存储暂时不可用
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// 值无法序列化或反序列化
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 与存储的连接已关闭
    #[error("store connection closed")]
    Closed,
}

impl StoreError {
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// 存储路径 - 斜杠分隔的树节点地址
///
/// 路径不以斜杠开头或结尾，段不允许为空。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// 解析并校验路径
    pub fn parse(path: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        if path.is_empty() {
            return Err(StoreError::invalid_path("path cannot be empty"));
        }
        if path.split('/').any(|segment| segment.is_empty()) {
            return Err(StoreError::invalid_path(
                "path segments cannot be empty",
            ));
        }
        Ok(Self(path))
    }

    /// 追加一个子段
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        if segment.is_empty() {
            return Err(StoreError::invalid_path("segment cannot be empty"));
        }
        if segment.contains('/') {
            return Err(StoreError::invalid_path(
                "segment cannot contain '/'",
            ));
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// 本路径是否等于 `prefix` 或位于其子树内（按段比较）
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        let mut own = self.segments();
        for expected in prefix.segments() {
            match own.next() {
                Some(segment) if segment == expected => {}
                _ => return false,
            }
        }
        true
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 房间子树的标准路径
pub mod paths {
    use super::*;

    /// `rooms/{code}`
    pub fn room_root(code: &RoomCode) -> StorePath {
        StorePath(format!("rooms/{}", code))
    }

    /// `rooms/{code}/info`
    pub fn room_info(code: &RoomCode) -> StorePath {
        StorePath(format!("rooms/{}/info", code))
    }

    /// `rooms/{code}/users`
    pub fn room_users(code: &RoomCode) -> StorePath {
        StorePath(format!("rooms/{}/users", code))
    }

    /// `rooms/{code}/users/{session_id}`
    pub fn room_user(code: &RoomCode, session_id: SessionId) -> StorePath {
        StorePath(format!("rooms/{}/users/{}", code, session_id))
    }

    /// `rooms/{code}/messages`
    pub fn room_messages(code: &RoomCode) -> StorePath {
        StorePath(format!("rooms/{}/messages", code))
    }
}

/// 子树订阅
///
/// 通道里的每一项都是订阅路径下子树的完整快照，
/// `None` 表示该节点当前不存在。订阅建立时的当前状态
/// 会作为第一项立即送达。
pub struct SubtreeSubscription {
    receiver: mpsc::UnboundedReceiver<Option<Value>>,
}

impl SubtreeSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<Option<Value>>) -> Self {
        Self { receiver }
    }

    /// 等待下一次快照，外层 `None` 表示订阅已被存储端关闭
    pub async fn recv(&mut self) -> Option<Option<Value>> {
        self.receiver.recv().await
    }
}

/// 实时存储特征
///
/// 实现方须保证：`update` 在目标节点缺失时创建它；
/// `subscribe` 返回前已把当前快照放入通道。
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// 整体写入一个节点，覆盖原有内容
    async fn put(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// 部分更新节点的若干字段，节点缺失时创建
    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// 读取节点当前值，不存在时返回 `None`
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// 删除节点及其子树，节点不存在时静默成功
    async fn remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// 在集合节点下追加一个值，返回存储分配的键
    ///
    /// 键在该集合内按分配顺序字典序递增，内容对调用方不透明。
    async fn append(&self, path: &StorePath, value: Value) -> Result<String, StoreError>;

    /// 订阅子树变更
    async fn subscribe(&self, path: &StorePath) -> Result<SubtreeSubscription, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(StorePath::parse("").is_err());
        assert!(StorePath::parse("/rooms").is_err());
        assert!(StorePath::parse("rooms/").is_err());
        assert!(StorePath::parse("rooms//info").is_err());
        assert!(StorePath::parse("rooms/12345/info").is_ok());
    }

    #[test]
    fn test_child_validates_segment() {
        let base = StorePath::parse("rooms/12345").unwrap();
        assert_eq!(base.child("users").unwrap().as_str(), "rooms/12345/users");
        assert!(base.child("").is_err());
        assert!(base.child("a/b").is_err());
    }

    #[test]
    fn test_starts_with_compares_whole_segments() {
        let root = StorePath::parse("rooms/123").unwrap();
        let inside = StorePath::parse("rooms/123/users/abc").unwrap();
        let sibling = StorePath::parse("rooms/12345").unwrap();

        assert!(inside.starts_with(&root));
        assert!(root.starts_with(&root));
        // "rooms/12345" 不在 "rooms/123" 子树内
        assert!(!sibling.starts_with(&root));
        assert!(!root.starts_with(&inside));
    }

    #[test]
    fn test_standard_room_paths() {
        let code = RoomCode::parse("54321").unwrap();
        let session_id = SessionId::generate();

        assert_eq!(paths::room_root(&code).as_str(), "rooms/54321");
        assert_eq!(paths::room_info(&code).as_str(), "rooms/54321/info");
        assert_eq!(paths::room_users(&code).as_str(), "rooms/54321/users");
        assert_eq!(
            paths::room_user(&code, session_id).as_str(),
            format!("rooms/54321/users/{}", session_id)
        );
        assert_eq!(paths::room_messages(&code).as_str(), "rooms/54321/messages");
    }
}
