//! 会话
//!
//! `RoomSession` 是参与者与房间交互的唯一入口。每个会话在后台
//! 运行一个任务，把命令、定时器和存储订阅汇聚成单一事件流，
//! 一次只处理一个事件，因此不存在内部竞态。
//!
//! 定时行为：
//! - 展示名按固定周期轮换，无论是否在房间里
//! - 在房间里时按心跳周期刷新出席记录
//! - 在房间里时按清扫周期删除陈旧记录；非创建者发现房间里
//!   再无活跃用户时自动离开
//!
//! 丢弃全部句柄或调用 `shutdown` 都会让会话先退出当前房间再结束。

use serde::Serialize;
use serde_json::{to_value, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use config::AppConfig;
use domain::{ChatMessage, ParticipantIdentity, RoomCode, RoomInfo, SessionId};

use crate::admission::AdmissionService;
use crate::clock::Clock;
use crate::errors::{JoinError, SendError, SessionClosed};
use crate::lifecycle::plan_sweep;
use crate::messages::{project_messages, MessageView};
use crate::moderation::{ModerationGate, ModerationOracle};
use crate::presence::{heartbeat_fields, project_online_users, rename_fields, OnlineUser};
use crate::store::{paths, RealtimeStore, StoreError, SubtreeSubscription};

/// 会话运行所需的外部依赖
pub struct SessionDependencies {
    pub store: Arc<dyn RealtimeStore>,
    pub oracle: Arc<dyn ModerationOracle>,
    pub clock: Arc<dyn Clock>,
    pub config: AppConfig,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub display_name: String,
    /// 当前所在房间，未加入时为 `None`
    pub room_code: Option<RoomCode>,
    pub is_creator: bool,
    pub moderation_enabled: bool,
}

enum Command {
    CreateRoom {
        code: RoomCode,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    JoinRoom {
        code: RoomCode,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    LeaveRoom {
        reply: oneshot::Sender<()>,
    },
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    ToggleModeration {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// 会话句柄
///
/// 所有操作都投递给后台任务串行执行。句柄可克隆，
/// 全部句柄丢弃后会话自动离开房间并结束。
#[derive(Clone)]
pub struct RoomSession {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    messages: watch::Receiver<Vec<MessageView>>,
    online_users: watch::Receiver<Vec<OnlineUser>>,
}

impl RoomSession {
    /// 启动新会话，身份当场生成
    pub fn spawn(deps: SessionDependencies) -> Self {
        let identity = ParticipantIdentity::generate();
        let initial = SessionStatus {
            session_id: identity.session_id(),
            display_name: identity.display_name().to_string(),
            room_code: None,
            is_creator: false,
            moderation_enabled: false,
        };

        let (command_tx, command_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(initial);
        let (messages_tx, messages_rx) = watch::channel(Vec::new());
        let (users_tx, users_rx) = watch::channel(Vec::new());

        let admission = AdmissionService::new(deps.store.clone(), deps.clock.clone());
        let gate = ModerationGate::new(deps.oracle.clone(), deps.config.moderation.threshold);
        let rotate_timer = interval_after(deps.config.identity.rotate_interval());

        let actor = SessionActor {
            store: deps.store,
            clock: deps.clock,
            config: deps.config,
            admission,
            gate,
            identity,
            commands: command_rx,
            rotate_timer,
            room: None,
            status_tx,
            messages_tx,
            users_tx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            status: status_rx,
            messages: messages_rx,
            online_users: users_rx,
        }
    }

    /// 创建房间并进入
    pub async fn create_room(&self, code: &str) -> Result<(), JoinError> {
        let code = RoomCode::parse(code)?;
        self.request(|reply| Command::CreateRoom { code, reply })
            .await??;
        Ok(())
    }

    /// 加入已有房间
    pub async fn join_room(&self, code: &str) -> Result<(), JoinError> {
        let code = RoomCode::parse(code)?;
        self.request(|reply| Command::JoinRoom { code, reply })
            .await??;
        Ok(())
    }

    /// 离开当前房间，未加入时为空操作
    pub async fn leave_room(&self) -> Result<(), SessionClosed> {
        self.request(|reply| Command::LeaveRoom { reply }).await
    }

    /// 发送消息
    ///
    /// 未加入房间或文本修剪后为空时静默成功。审核开启时先过闸门。
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SendError> {
        let text = text.into();
        self.request(|reply| Command::SendMessage { text, reply })
            .await??;
        Ok(())
    }

    /// 切换房间的内容审核开关，仅创建者的请求生效
    pub async fn toggle_moderation(&self) -> Result<(), SessionClosed> {
        self.request(|reply| Command::ToggleModeration { reply }).await
    }

    /// 退出房间并结束会话任务
    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn messages(&self) -> watch::Receiver<Vec<MessageView>> {
        self.messages.clone()
    }

    pub fn online_users(&self) -> watch::Receiver<Vec<OnlineUser>> {
        self.online_users.clone()
    }

    pub fn current_status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn current_messages(&self) -> Vec<MessageView> {
        self.messages.borrow().clone()
    }

    pub fn current_online_users(&self) -> Vec<OnlineUser> {
        self.online_users.borrow().clone()
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SessionClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionClosed)?;
        reply_rx.await.map_err(|_| SessionClosed)
    }
}

fn interval_after(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// 已加入房间的运行状态
///
/// 订阅和定时器都归它所有，离开房间即整体丢弃，
/// 不会有定时器或订阅在退出后继续存活。
struct JoinedRoom {
    code: RoomCode,
    info: RoomInfo,
    refresh_timer: Interval,
    sweep_timer: Interval,
    info_sub: SubtreeSubscription,
    users_sub: SubtreeSubscription,
    messages_sub: SubtreeSubscription,
    info_closed: bool,
    users_closed: bool,
    messages_closed: bool,
}

enum Event {
    Command(Option<Command>),
    RotateTick,
    RefreshTick,
    SweepTick,
    InfoUpdate(Option<Option<Value>>),
    UsersUpdate(Option<Option<Value>>),
    MessagesUpdate(Option<Option<Value>>),
}

enum Flow {
    Continue,
    Stop,
}

struct SessionActor {
    store: Arc<dyn RealtimeStore>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    admission: AdmissionService,
    gate: ModerationGate,
    identity: ParticipantIdentity,
    commands: mpsc::Receiver<Command>,
    rotate_timer: Interval,
    room: Option<JoinedRoom>,
    status_tx: watch::Sender<SessionStatus>,
    messages_tx: watch::Sender<Vec<MessageView>>,
    users_tx: watch::Sender<Vec<OnlineUser>>,
}

impl SessionActor {
    async fn run(mut self) {
        info!(session_id = %self.identity.session_id(), "session started");
        loop {
            let event = self.next_event().await;
            match self.handle_event(event).await {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        info!(session_id = %self.identity.session_id(), "session ended");
    }

    /// 等待下一个事件
    ///
    /// 命令通道与轮换定时器始终参与；房间内的定时器和订阅
    /// 只在已加入时参与。已关闭的订阅不再轮询。
    async fn next_event(&mut self) -> Event {
        match self.room.as_mut() {
            Some(room) => {
                tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    _ = self.rotate_timer.tick() => Event::RotateTick,
                    _ = room.refresh_timer.tick() => Event::RefreshTick,
                    _ = room.sweep_timer.tick() => Event::SweepTick,
                    update = room.info_sub.recv(), if !room.info_closed => Event::InfoUpdate(update),
                    update = room.users_sub.recv(), if !room.users_closed => Event::UsersUpdate(update),
                    update = room.messages_sub.recv(), if !room.messages_closed => Event::MessagesUpdate(update),
                }
            }
            None => {
                tokio::select! {
                    command = self.commands.recv() => Event::Command(command),
                    _ = self.rotate_timer.tick() => Event::RotateTick,
                }
            }
        }
    }

    async fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Command(None) => {
                // 全部句柄已丢弃
                self.leave_current("session dropped").await;
                Flow::Stop
            }
            Event::Command(Some(command)) => self.handle_command(command).await,
            Event::RotateTick => {
                self.rotate_identity().await;
                Flow::Continue
            }
            Event::RefreshTick => {
                self.refresh_presence().await;
                Flow::Continue
            }
            Event::SweepTick => {
                self.run_sweep().await;
                Flow::Continue
            }
            Event::InfoUpdate(update) => {
                self.apply_info_update(update);
                Flow::Continue
            }
            Event::UsersUpdate(update) => {
                self.apply_users_update(update);
                Flow::Continue
            }
            Event::MessagesUpdate(update) => {
                self.apply_messages_update(update);
                Flow::Continue
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::CreateRoom { code, reply } => {
                let result = self.create_room(code).await;
                let _ = reply.send(result);
                Flow::Continue
            }
            Command::JoinRoom { code, reply } => {
                let result = self.join_room(code).await;
                let _ = reply.send(result);
                Flow::Continue
            }
            Command::LeaveRoom { reply } => {
                self.leave_current("left by request").await;
                let _ = reply.send(());
                Flow::Continue
            }
            Command::SendMessage { text, reply } => {
                let result = self.send_message(text).await;
                let _ = reply.send(result);
                Flow::Continue
            }
            Command::ToggleModeration { reply } => {
                self.toggle_moderation().await;
                let _ = reply.send(());
                Flow::Continue
            }
            Command::Shutdown { reply } => {
                self.leave_current("session shut down").await;
                let _ = reply.send(());
                Flow::Stop
            }
        }
    }

    async fn create_room(&mut self, code: RoomCode) -> Result<(), JoinError> {
        // 先过准入，失败时现有房间成员身份原样保留
        let info = self.admission.create_room(&code, &self.identity).await?;
        self.switch_to(code, info).await
    }

    async fn join_room(&mut self, code: RoomCode) -> Result<(), JoinError> {
        let info = self.admission.join_room(&code, &self.identity).await?;
        self.switch_to(code, info).await
    }

    /// 准入成功后落位到新房间，需要时先退出旧房间
    ///
    /// 重新进入当前房间不重建订阅和定时器，只同步元数据。
    /// 出席记录在准入时已被重写。
    async fn switch_to(&mut self, code: RoomCode, info: RoomInfo) -> Result<(), JoinError> {
        if let Some(room) = self.room.as_mut() {
            if room.code == code {
                room.info = info;
                self.publish_status();
                return Ok(());
            }
            self.leave_current("switching rooms").await;
        }
        self.enter_room(code, info).await
    }

    async fn enter_room(&mut self, code: RoomCode, info: RoomInfo) -> Result<(), JoinError> {
        let subscriptions = self.subscribe_room(&code).await;
        let (info_sub, users_sub, messages_sub) = match subscriptions {
            Ok(subscriptions) => subscriptions,
            Err(error) => {
                // 订阅失败时撤掉刚写入的出席记录，回到未加入状态
                let _ = self
                    .store
                    .remove(&paths::room_user(&code, self.identity.session_id()))
                    .await;
                return Err(JoinError::Store(error));
            }
        };

        self.room = Some(JoinedRoom {
            code,
            info,
            refresh_timer: interval_after(self.config.presence.refresh_interval()),
            sweep_timer: interval_after(self.config.lifecycle.sweep_interval()),
            info_sub,
            users_sub,
            messages_sub,
            info_closed: false,
            users_closed: false,
            messages_closed: false,
        });
        self.publish_status();
        Ok(())
    }

    async fn subscribe_room(
        &self,
        code: &RoomCode,
    ) -> Result<(SubtreeSubscription, SubtreeSubscription, SubtreeSubscription), StoreError> {
        let info_sub = self.store.subscribe(&paths::room_info(code)).await?;
        let users_sub = self.store.subscribe(&paths::room_users(code)).await?;
        let messages_sub = self.store.subscribe(&paths::room_messages(code)).await?;
        Ok((info_sub, users_sub, messages_sub))
    }

    async fn leave_current(&mut self, reason: &str) {
        let Some(room) = self.room.take() else {
            return;
        };
        if let Err(error) = self
            .admission
            .leave_room(&room.code, self.identity.session_id())
            .await
        {
            warn!(%error, room_code = %room.code, "failed to remove presence record on leave");
        }
        debug!(room_code = %room.code, reason, "room state torn down");
        self.publish_status();
        self.messages_tx.send_replace(Vec::new());
        self.users_tx.send_replace(Vec::new());
    }

    async fn send_message(&mut self, text: String) -> Result<(), SendError> {
        let Some(room) = self.room.as_ref() else {
            // 不在房间里，静默忽略
            return Ok(());
        };
        if text.trim().is_empty() {
            return Ok(());
        }
        if room.info.moderation_enabled && !self.gate.allows(&text).await {
            return Err(SendError::Blocked);
        }

        // 文本原样入库，修剪只用于空白检查
        let message = ChatMessage::new(text, self.identity.display_name(), self.clock.now());
        self.store
            .append(
                &paths::room_messages(&room.code),
                to_value(&message).map_err(StoreError::from)?,
            )
            .await?;
        // 消息已经入库，随带的心跳刷新失败只记日志
        if let Err(error) = self
            .store
            .update(
                &paths::room_user(&room.code, self.identity.session_id()),
                heartbeat_fields(self.clock.now()),
            )
            .await
        {
            warn!(%error, room_code = %room.code, "presence refresh after send failed");
        }
        Ok(())
    }

    async fn toggle_moderation(&mut self) {
        let Some(room) = self.room.as_ref() else {
            return;
        };
        if !room.info.is_creator(self.identity.session_id()) {
            debug!(room_code = %room.code, "ignoring moderation toggle from non-creator");
            return;
        }
        let mut fields = Map::new();
        fields.insert(
            "moderation_enabled".into(),
            Value::Bool(!room.info.moderation_enabled),
        );
        // 本地状态不直接改，等 info 订阅回推
        if let Err(error) = self
            .store
            .update(&paths::room_info(&room.code), fields)
            .await
        {
            warn!(%error, room_code = %room.code, "failed to toggle moderation");
        }
    }

    async fn rotate_identity(&mut self) {
        let new_name = self.identity.rotate_display_name().to_string();
        if let Some(room) = self.room.as_ref() {
            let fields = rename_fields(&new_name, self.clock.now());
            if let Err(error) = self
                .store
                .update(
                    &paths::room_user(&room.code, self.identity.session_id()),
                    fields,
                )
                .await
            {
                warn!(%error, room_code = %room.code, "failed to publish rotated display name");
            }
        }
        debug!(display_name = %new_name, "display name rotated");
        self.publish_status();
    }

    async fn refresh_presence(&mut self) {
        let Some(room) = self.room.as_ref() else {
            return;
        };
        if let Err(error) = self
            .store
            .update(
                &paths::room_user(&room.code, self.identity.session_id()),
                heartbeat_fields(self.clock.now()),
            )
            .await
        {
            warn!(%error, room_code = %room.code, "presence refresh failed");
        }
    }

    /// 一轮清扫：删除陈旧出席记录，必要时自动离开闲置房间
    async fn run_sweep(&mut self) {
        let (code, is_creator) = match self.room.as_ref() {
            Some(room) => (
                room.code.clone(),
                room.info.is_creator(self.identity.session_id()),
            ),
            None => return,
        };

        let users_path = paths::room_users(&code);
        let snapshot = match self.store.get(&users_path).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, room_code = %code, "sweep read failed");
                return;
            }
        };

        let plan = plan_sweep(
            snapshot.as_ref(),
            self.clock.now(),
            self.config.lifecycle.stale_window(),
        );

        for key in &plan.stale_keys {
            let path = match users_path.child(key) {
                Ok(path) => path,
                Err(error) => {
                    debug!(%error, %key, "skipping presence key that does not form a path");
                    continue;
                }
            };
            if let Err(error) = self.store.remove(&path).await {
                warn!(%error, room_code = %code, "failed to remove stale presence record");
            }
        }
        if !plan.stale_keys.is_empty() {
            info!(room_code = %code, removed = plan.stale_keys.len(), "swept stale presence records");
        }

        if !plan.any_remaining && !is_creator {
            info!(room_code = %code, "no presence records remain, leaving idle room");
            self.leave_current("room idle").await;
        }
    }

    fn apply_info_update(&mut self, update: Option<Option<Value>>) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(snapshot) = update else {
            room.info_closed = true;
            warn!(room_code = %room.code, "info subscription closed by store");
            return;
        };
        // 节点缺失时保留上一次已知的元数据
        let Some(value) = snapshot else {
            return;
        };
        match serde_json::from_value::<RoomInfo>(value) {
            Ok(info) => {
                room.info = info;
                self.publish_status();
            }
            Err(error) => {
                debug!(%error, room_code = %room.code, "ignoring undecodable room info");
            }
        }
    }

    fn apply_users_update(&mut self, update: Option<Option<Value>>) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(snapshot) = update else {
            room.users_closed = true;
            warn!(room_code = %room.code, "users subscription closed by store");
            return;
        };
        let users = project_online_users(
            snapshot.as_ref(),
            self.clock.now(),
            self.config.presence.active_window(),
        );
        self.users_tx.send_replace(users);
    }

    fn apply_messages_update(&mut self, update: Option<Option<Value>>) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(snapshot) = update else {
            room.messages_closed = true;
            warn!(room_code = %room.code, "messages subscription closed by store");
            return;
        };
        let messages = project_messages(snapshot.as_ref());
        self.messages_tx.send_replace(messages);
    }

    fn publish_status(&self) {
        let status = SessionStatus {
            session_id: self.identity.session_id(),
            display_name: self.identity.display_name().to_string(),
            room_code: self.room.as_ref().map(|room| room.code.clone()),
            is_creator: self
                .room
                .as_ref()
                .map(|room| room.info.is_creator(self.identity.session_id()))
                .unwrap_or(false),
            moderation_enabled: self
                .room
                .as_ref()
                .map(|room| room.info.moderation_enabled)
                .unwrap_or(false),
        };
        self.status_tx.send_replace(status);
    }
}
