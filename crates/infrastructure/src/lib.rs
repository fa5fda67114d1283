//! 基础设施层 - 外部服务适配器
//!
//! 目前只有一个适配器：Perspective API 的内容打分客户端。
//! 实时存储的进程内实现在应用层（`application::memory_store`），
//! 对接真实实时数据库的适配器将来也放在这里。

pub mod perspective;

pub use perspective::PerspectiveClient;
