//! 房间生命周期
//!
//! 房间没有显式的关闭操作。定期清扫删除陈旧的出席记录，
//! 非创建者在清扫后再无出席记录存留时自动离开，最后一条
//! 出席记录被删除后房间子树即自然消亡。

use serde_json::Value;
use std::time::Duration;

use domain::Timestamp;

use crate::presence::read_last_active;

/// 一轮清扫的结论
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepPlan {
    /// 应删除的出席记录键
    pub stale_keys: Vec<String>,
    /// 清扫后是否仍有记录存留
    pub any_remaining: bool,
}

/// 根据 users 子树的当前内容制定清扫计划
///
/// 达到陈旧窗口的记录列入删除，未达到的计为存留。存留判定
/// 只看陈旧窗口：仅仅超出活跃窗口的记录从在线视图隐去，但
/// 房间不算被弃置。没有活跃时间的记录既不删除也不计入存留。
pub fn plan_sweep(snapshot: Option<&Value>, now: Timestamp, stale_window: Duration) -> SweepPlan {
    let Some(entries) = snapshot.and_then(Value::as_object) else {
        return SweepPlan::default();
    };

    let mut plan = SweepPlan::default();
    for (key, entry) in entries {
        let Some(last_active_at) = read_last_active(entry) else {
            continue;
        };
        let age = (now - last_active_at).to_std().unwrap_or(Duration::ZERO);
        if age >= stale_window {
            plan.stale_keys.push(key.clone());
        } else {
            plan.any_remaining = true;
        }
    }
    plan
}
