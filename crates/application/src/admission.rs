//! 房间准入
//!
//! 创建和加入房间的存储编排。会话层在这之上再挂接订阅和定时器。

use serde_json::to_value;
use std::sync::Arc;
use tracing::info;

use domain::{ChatMessage, ParticipantIdentity, PresenceRecord, RoomCode, RoomInfo, SessionId};

use crate::clock::Clock;
use crate::errors::JoinError;
use crate::store::{paths, RealtimeStore, StoreError};

/// 准入服务
pub struct AdmissionService {
    store: Arc<dyn RealtimeStore>,
    clock: Arc<dyn Clock>,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn RealtimeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 创建房间
    ///
    /// 房间码必须未被占用。成功后房间元数据、创建者的出席记录
    /// 和一条系统欢迎消息都已写入。
    pub async fn create_room(
        &self,
        code: &RoomCode,
        identity: &ParticipantIdentity,
    ) -> Result<RoomInfo, JoinError> {
        let existing = self.store.get(&paths::room_root(code)).await?;
        if existing.is_some() {
            return Err(JoinError::RoomExists { code: code.clone() });
        }

        let info = RoomInfo::new(identity.session_id(), self.clock.now());
        self.store
            .put(&paths::room_info(code), to_value(&info).map_err(StoreError::from)?)
            .await?;

        self.write_presence(code, identity).await?;

        let welcome = ChatMessage::welcome(self.clock.now());
        self.store
            .append(
                &paths::room_messages(code),
                to_value(&welcome).map_err(StoreError::from)?,
            )
            .await?;

        info!(room_code = %code, session_id = %identity.session_id(), "room created");
        Ok(info)
    }

    /// 加入已有房间
    pub async fn join_room(
        &self,
        code: &RoomCode,
        identity: &ParticipantIdentity,
    ) -> Result<RoomInfo, JoinError> {
        let snapshot = self
            .store
            .get(&paths::room_info(code))
            .await?
            .ok_or_else(|| JoinError::RoomNotFound { code: code.clone() })?;
        let info: RoomInfo =
            serde_json::from_value(snapshot).map_err(StoreError::from)?;

        self.write_presence(code, identity).await?;

        info!(room_code = %code, session_id = %identity.session_id(), "joined room");
        Ok(info)
    }

    /// 离开房间，删除自己的出席记录
    pub async fn leave_room(
        &self,
        code: &RoomCode,
        session_id: SessionId,
    ) -> Result<(), StoreError> {
        self.store.remove(&paths::room_user(code, session_id)).await?;
        info!(room_code = %code, %session_id, "left room");
        Ok(())
    }

    async fn write_presence(
        &self,
        code: &RoomCode,
        identity: &ParticipantIdentity,
    ) -> Result<(), JoinError> {
        let record = PresenceRecord::new(
            identity.session_id(),
            identity.display_name(),
            self.clock.now(),
        );
        self.store
            .put(
                &paths::room_user(code, identity.session_id()),
                to_value(&record).map_err(StoreError::from)?,
            )
            .await?;
        Ok(())
    }
}
