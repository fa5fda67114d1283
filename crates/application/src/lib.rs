//! 应用层 - 会话编排与端口定义
//!
//! 这一层把领域概念组织成可运行的会话：
//! - `store`：实时存储端口，房间状态的唯一事实来源
//! - `memory_store`：存储的进程内实现
//! - `moderation`：内容打分端口与失败关闭的审核闸门
//! - `admission`：创建、加入、离开房间的存储编排
//! - `presence` / `messages` / `lifecycle`：快照到视图的纯投影
//! - `session`：后台会话任务及其句柄
//!
//! 对外部调用方来说，入口是 `RoomSession::spawn`。

pub mod admission;
pub mod clock;
pub mod errors;
pub mod lifecycle;
pub mod memory_store;
pub mod messages;
pub mod moderation;
pub mod presence;
pub mod session;
pub mod store;

pub use admission::AdmissionService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{JoinError, SendError, SessionClosed};
pub use lifecycle::{plan_sweep, SweepPlan};
pub use memory_store::MemoryRealtimeStore;
pub use messages::{project_messages, MessageView};
pub use moderation::{AttributeScores, ModerationGate, ModerationOracle, OracleError};
pub use presence::{heartbeat_fields, project_online_users, rename_fields, OnlineUser};
pub use session::{RoomSession, SessionDependencies, SessionStatus};
pub use store::{paths, RealtimeStore, StoreError, StorePath, SubtreeSubscription};
