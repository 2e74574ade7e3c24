//! 审计事件日志模块
//!
//! 认证流程的每一步都会留下一条追加式的审计记录：
//!
//! - `OTP_GENERATED` / `OTP_VALIDATED` / `OTP_VALIDATION_FAILED`
//! - `SESSION_START` / `SESSION_END`
//!
//! 事件通过存储适配器持久化为一个 JSON 数组，核心逻辑只写不读；
//! 读取接口仅用于观测与测试。日志写入失败**不会**阻断认证流程：
//! 故障会通过 `tracing` 记录后被吞掉。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use authflow::clock::SystemClock;
//! use authflow::events::{AuthEvent, EventKind, EventLog};
//! use authflow::storage::InMemoryStore;
//!
//! let log = EventLog::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
//!
//! log.record(AuthEvent::otp_generated("user@example.com"));
//!
//! let events = log.all();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].name, EventKind::OtpGenerated);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::storage::{self, EVENTS_KEY, KeyValueStore};

// ============================================================================
// 事件类型
// ============================================================================

/// 审计事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// 生成了新的验证码
    OtpGenerated,
    /// 验证码校验成功
    OtpValidated,
    /// 验证码校验失败
    OtpValidationFailed,
    /// Session 建立
    SessionStart,
    /// Session 结束
    SessionEnd,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::OtpGenerated => write!(f, "OTP_GENERATED"),
            EventKind::OtpValidated => write!(f, "OTP_VALIDATED"),
            EventKind::OtpValidationFailed => write!(f, "OTP_VALIDATION_FAILED"),
            EventKind::SessionStart => write!(f, "SESSION_START"),
            EventKind::SessionEnd => write!(f, "SESSION_END"),
        }
    }
}

// ============================================================================
// 事件记录
// ============================================================================

/// 一条审计事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// 事件名称
    pub name: EventKind,

    /// 附加信息（保留 JSON 原生类型，次数、时长仍是数字）
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,

    /// 事件时间（入库时由 [`EventLog::record`] 盖章）
    pub timestamp: DateTime<Utc>,
}

impl AuthEvent {
    /// 创建新事件
    pub fn new(name: EventKind) -> Self {
        Self {
            name,
            details: HashMap::new(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// 附加一条详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 验证码生成事件
    pub fn otp_generated(identity: impl Into<String>) -> Self {
        Self::new(EventKind::OtpGenerated).with_detail("identity", identity.into())
    }

    /// 验证码校验成功事件
    pub fn otp_validated(identity: impl Into<String>) -> Self {
        Self::new(EventKind::OtpValidated).with_detail("identity", identity.into())
    }

    /// 验证码校验失败事件
    pub fn otp_validation_failed(identity: impl Into<String>, reason: &str) -> Self {
        Self::new(EventKind::OtpValidationFailed)
            .with_detail("identity", identity.into())
            .with_detail("reason", reason)
    }

    /// Session 建立事件
    pub fn session_start(identity: impl Into<String>) -> Self {
        Self::new(EventKind::SessionStart).with_detail("identity", identity.into())
    }

    /// Session 结束事件，记录持续秒数
    pub fn session_end(identity: impl Into<String>, duration_sec: i64) -> Self {
        Self::new(EventKind::SessionEnd)
            .with_detail("identity", identity.into())
            .with_detail("duration_sec", duration_sec)
    }

    /// 读取字符串类型的详情
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }
}

// ============================================================================
// 事件日志
// ============================================================================

/// 审计事件日志
///
/// 把事件追加写入存储适配器（`EVENTS_KEY` 下的 JSON 数组）。
/// 写入失败只记录诊断日志，不向调用方传播。
#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl EventLog {
    /// 创建事件日志
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 追加一条事件
    ///
    /// 时间戳在此处盖章。损坏的历史日志按空日志处理。
    pub fn record(&self, mut event: AuthEvent) {
        event.timestamp = self.clock.now();

        let mut history: Vec<AuthEvent> =
            storage::read_json(self.store.as_ref(), EVENTS_KEY).unwrap_or_default();
        history.push(event);

        if let Err(e) = storage::write_json(self.store.as_ref(), EVENTS_KEY, &history) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
    }

    /// 返回全部事件（故障时为空）
    pub fn all(&self) -> Vec<AuthEvent> {
        storage::read_json(self.store.as_ref(), EVENTS_KEY).unwrap_or_default()
    }

    /// 返回事件总数
    pub fn count(&self) -> usize {
        self.all().len()
    }

    /// 按类型过滤事件
    pub fn by_kind(&self, kind: EventKind) -> Vec<AuthEvent> {
        self.all().into_iter().filter(|e| e.name == kind).collect()
    }
}
