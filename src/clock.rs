//! 时钟模块
//!
//! 过期判断与会话时长都依赖当前时间。本模块把时间抽象成可注入的
//! `Clock` trait，测试中可以用 [`ManualClock`] 精确推进时间来模拟过期，
//! 而不需要真实地等待。
//!
//! ## 示例
//!
//! ```rust
//! use authflow::clock::{Clock, ManualClock};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let before = clock.now();
//!
//! clock.advance(Duration::seconds(61));
//! assert_eq!(clock.now() - before, Duration::seconds(61));
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// 时间来源
///
/// 引擎内所有「现在几点」的判断都经过此 trait。
pub trait Clock: Send + Sync {
    /// 返回当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟（默认实现）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟
///
/// 时间固定在设定值，只有显式调用 [`advance`](ManualClock::advance) 或
/// [`set`](ManualClock::set) 时才变化。用于测试中确定性地触发过期。
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// 创建固定在指定时刻的时钟
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// 创建固定在当前系统时间的时钟
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 将时间向前推进
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap();
        *now = *now + duration;
    }

    /// 将时间设置为指定时刻
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write().unwrap() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}
