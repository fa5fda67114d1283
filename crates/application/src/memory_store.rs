//! 内存实时存储
//!
//! `RealtimeStore` 的进程内实现，用于测试和本地开发。
//! 数据保存为一棵 JSON 树，订阅者在每次相关写入后收到
//! 所订阅子树的完整快照。
//!
//! 与真实的实时数据库保持两个关键语义一致：
//! - 空对象节点不存在：删除最后一个子节点会连带删除空的祖先
//! - 未发生实际变化的写入不产生通知

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};

use crate::store::{RealtimeStore, StoreError, StorePath, SubtreeSubscription};

struct Subscriber {
    path: StorePath,
    sender: mpsc::UnboundedSender<Option<Value>>,
}

struct StoreState {
    root: Value,
    subscribers: Vec<Subscriber>,
    append_seq: u64,
}

/// 内存存储
pub struct MemoryRealtimeStore {
    state: RwLock<StoreState>,
}

impl MemoryRealtimeStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                root: Value::Object(Map::new()),
                subscribers: Vec::new(),
                append_seq: 0,
            }),
        }
    }
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 读取路径处的节点
fn node_at<'tree>(root: &'tree Value, path: &StorePath) -> Option<&'tree Value> {
    let mut current = root;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// 写入路径处的节点，缺失的中间节点按对象创建
fn put_at(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Some(child) = entry.as_object_mut() {
                put_at(child, rest, value);
            }
        }
    }
}

/// 删除路径处的节点，顺带删除因此变空的祖先对象
fn remove_at(node: &mut Map<String, Value>, segments: &[&str]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return node.remove(*head).is_some();
    }
    let removed = match node.get_mut(*head).and_then(Value::as_object_mut) {
        Some(child) => remove_at(child, rest),
        None => false,
    };
    if removed {
        let child_empty = node
            .get(*head)
            .and_then(Value::as_object)
            .map(Map::is_empty)
            .unwrap_or(false);
        if child_empty {
            node.remove(*head);
        }
    }
    removed
}

impl StoreState {
    /// 向所有与变更路径相交的订阅者推送其子树的最新快照
    ///
    /// 相交指二者之一位于另一者的子树内。推送失败说明接收端
    /// 已丢弃订阅，对应条目随即移除。
    fn notify(&mut self, changed: &StorePath) {
        let StoreState {
            root, subscribers, ..
        } = self;
        subscribers.retain(|subscriber| {
            let affected =
                changed.starts_with(&subscriber.path) || subscriber.path.starts_with(changed);
            if !affected {
                return true;
            }
            let snapshot = node_at(root, &subscriber.path).cloned();
            subscriber.sender.send(snapshot).is_ok()
        });
    }

    fn apply(&mut self, path: &StorePath, mutate: impl FnOnce(&mut Map<String, Value>)) {
        let before = node_at(&self.root, path).cloned();
        if let Some(map) = self.root.as_object_mut() {
            mutate(map);
        }
        let after = node_at(&self.root, path);
        if before.as_ref() != after {
            self.notify(path);
        }
    }
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn put(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let segments: Vec<&str> = path.segments().collect();
        let mut state = self.state.write().await;
        if value.is_null() {
            // 写入 null 等价于删除
            state.apply(path, |map| {
                remove_at(map, &segments);
            });
        } else {
            state.apply(path, |map| put_at(map, &segments, value));
        }
        Ok(())
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let segments: Vec<&str> = path.segments().collect();
        let mut state = self.state.write().await;
        state.apply(path, |map| {
            for (key, value) in fields {
                let mut child: Vec<&str> = segments.clone();
                child.push(&key);
                if value.is_null() {
                    // 字段值为 null 表示删除该字段
                    remove_at(map, &child);
                } else {
                    put_at(map, &child, value);
                }
            }
        });
        Ok(())
    }

    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let state = self.state.read().await;
        Ok(node_at(&state.root, path).cloned())
    }

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        let segments: Vec<&str> = path.segments().collect();
        let mut state = self.state.write().await;
        state.apply(path, |map| {
            remove_at(map, &segments);
        });
        Ok(())
    }

    async fn append(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let mut state = self.state.write().await;
        let key = format!("m{:016}", state.append_seq);
        state.append_seq += 1;
        let entry = path.child(&key)?;
        let segments: Vec<&str> = entry.segments().collect();
        if let Some(map) = state.root.as_object_mut() {
            put_at(map, &segments, value);
        }
        state.notify(&entry);
        Ok(key)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SubtreeSubscription, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        let snapshot = node_at(&state.root, path).cloned();
        // 当前状态作为第一次通知立即送达
        let _ = sender.send(snapshot);
        state.subscribers.push(Subscriber {
            path: path.clone(),
            sender,
        });
        Ok(SubtreeSubscription::new(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let store = MemoryRealtimeStore::new();
        let info = path("rooms/11111/info");

        store.put(&info, json!({"creator": "a"})).await.unwrap();
        assert_eq!(
            store.get(&info).await.unwrap(),
            Some(json!({"creator": "a"}))
        );

        store.put(&info, json!({"creator": "b"})).await.unwrap();
        assert_eq!(
            store.get(&info).await.unwrap(),
            Some(json!({"creator": "b"}))
        );
    }

    #[tokio::test]
    async fn test_get_missing_node_returns_none() {
        let store = MemoryRealtimeStore::new();
        assert_eq!(store.get(&path("rooms/99999")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_keeps_others() {
        let store = MemoryRealtimeStore::new();
        let user = path("rooms/11111/users/u1");
        store
            .put(&user, json!({"display_name": "GhostAgent", "last_active_at": 100}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("last_active_at".into(), json!(200));
        store.update(&user, fields).await.unwrap();

        assert_eq!(
            store.get(&user).await.unwrap(),
            Some(json!({"display_name": "GhostAgent", "last_active_at": 200}))
        );
    }

    #[tokio::test]
    async fn test_update_creates_missing_node() {
        let store = MemoryRealtimeStore::new();
        let user = path("rooms/11111/users/u1");

        let mut fields = Map::new();
        fields.insert("last_active_at".into(), json!(500));
        store.update(&user, fields).await.unwrap();

        // 部分更新在节点缺失时创建仅含这些字段的节点
        assert_eq!(
            store.get(&user).await.unwrap(),
            Some(json!({"last_active_at": 500}))
        );
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_ancestors() {
        let store = MemoryRealtimeStore::new();
        let user = path("rooms/11111/users/u1");
        store.put(&user, json!({"last_active_at": 1})).await.unwrap();

        store.remove(&user).await.unwrap();

        assert_eq!(store.get(&path("rooms/11111/users")).await.unwrap(), None);
        // users 是 11111 下唯一的子节点，房间节点也随之消失
        assert_eq!(store.get(&path("rooms/11111")).await.unwrap(), None);
        assert_eq!(store.get(&path("rooms")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_missing_node_is_silent() {
        let store = MemoryRealtimeStore::new();
        assert!(store.remove(&path("rooms/11111/users/u1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_append_keys_are_ordered() {
        let store = MemoryRealtimeStore::new();
        let messages = path("rooms/11111/messages");

        let first = store.append(&messages, json!({"n": 1})).await.unwrap();
        let second = store.append(&messages, json!({"n": 2})).await.unwrap();
        let third = store.append(&messages, json!({"n": 3})).await.unwrap();

        assert!(first < second);
        assert!(second < third);

        let snapshot = store.get(&messages).await.unwrap().unwrap();
        let object = snapshot.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object[&first], json!({"n": 1}));
        assert_eq!(object[&third], json!({"n": 3}));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_snapshot_first() {
        let store = MemoryRealtimeStore::new();
        let users = path("rooms/11111/users");
        store
            .put(&path("rooms/11111/users/u1"), json!({"last_active_at": 1}))
            .await
            .unwrap();

        let mut subscription = store.subscribe(&users).await.unwrap();
        let initial = subscription.recv().await.unwrap();
        assert_eq!(initial, Some(json!({"u1": {"last_active_at": 1}})));

        // 订阅空节点时第一次快照是 None
        let mut empty = store.subscribe(&path("rooms/22222/users")).await.unwrap();
        assert_eq!(empty.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscriber_sees_descendant_writes() {
        let store = MemoryRealtimeStore::new();
        let users = path("rooms/11111/users");
        let mut subscription = store.subscribe(&users).await.unwrap();
        assert_eq!(subscription.recv().await.unwrap(), None);

        store
            .put(&path("rooms/11111/users/u1"), json!({"last_active_at": 7}))
            .await
            .unwrap();
        assert_eq!(
            subscription.recv().await.unwrap(),
            Some(json!({"u1": {"last_active_at": 7}}))
        );

        store.remove(&path("rooms/11111/users/u1")).await.unwrap();
        assert_eq!(subscription.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscriber_sees_ancestor_removal() {
        let store = MemoryRealtimeStore::new();
        store
            .put(&path("rooms/11111/users/u1"), json!({"last_active_at": 7}))
            .await
            .unwrap();

        let mut subscription = store.subscribe(&path("rooms/11111/users")).await.unwrap();
        subscription.recv().await.unwrap();

        store.remove(&path("rooms/11111")).await.unwrap();
        assert_eq!(subscription.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unchanged_write_produces_no_event() {
        let store = MemoryRealtimeStore::new();
        let info = path("rooms/11111/info");
        store.put(&info, json!({"flag": true})).await.unwrap();

        let mut subscription = store.subscribe(&info).await.unwrap();
        subscription.recv().await.unwrap();

        // 写入完全相同的值不应产生通知
        store.put(&info, json!({"flag": true})).await.unwrap();
        store.put(&info, json!({"flag": false})).await.unwrap();
        assert_eq!(
            subscription.recv().await.unwrap(),
            Some(json!({"flag": false}))
        );
    }

    #[tokio::test]
    async fn test_sibling_subtrees_are_isolated() {
        let store = MemoryRealtimeStore::new();
        let mut subscription = store.subscribe(&path("rooms/11111")).await.unwrap();
        subscription.recv().await.unwrap();

        store
            .put(&path("rooms/22222/info"), json!({"flag": true}))
            .await
            .unwrap();
        store
            .put(&path("rooms/11111/info"), json!({"flag": true}))
            .await
            .unwrap();

        // 只应收到本房间的那次写入
        assert_eq!(
            subscription.recv().await.unwrap(),
            Some(json!({"info": {"flag": true}}))
        );
    }
}
