//! 时钟抽象
//!
//! 所有涉及"现在"的业务判断都通过 `Clock` 获取时间，
//! 这样出席窗口、记录清扫等行为可以在测试中精确控制。

use chrono::Utc;
use domain::Timestamp;
use std::sync::Mutex;
use std::time::Duration;

/// 时钟特征
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// 系统时钟
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// 手动时钟（用于测试）
///
/// 时间只在显式调用 `set` 或 `advance` 时前进。
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += chrono::Duration::from_std(delta).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(5_000));
        assert_eq!(clock.now().timestamp_millis(), 6_000);

        clock.set(Utc.timestamp_millis_opt(100).unwrap());
        assert_eq!(clock.now().timestamp_millis(), 100);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
