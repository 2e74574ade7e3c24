//! 认证流程控制器
//!
//! 把 OTP 引擎与 Session 管理器粘合成完整的登录流程，并负责进程
//! 重启后的状态恢复。流程是一个三态状态机：
//!
//! ```text
//!   AwaitingEmail ──(submit_email)──→ AwaitingCode ──(submit_code ✓)──→ Authenticated
//!        ↑                                │  ↑                              │
//!        │                                │  └──(submit_code ✗ / resend)────┘（原地停留）
//!        └────────────(logout / 验证码失效)─────────────────────────────────┘
//! ```
//!
//! 「待验证身份标记」由本模块独占：它记录哪个身份正处在输码环节，
//! 仅用于重启后回到正确的界面，OTP 引擎从不读取它。
//!
//! ## 示例
//!
//! ```rust
//! use authflow::flow::{AuthFlow, FlowState};
//! use authflow::otp::OtpConfig;
//!
//! let flow = AuthFlow::new(OtpConfig::default());
//!
//! // 初始状态：等待输入邮箱
//! assert!(matches!(flow.restore(), FlowState::AwaitingEmail));
//!
//! // 提交邮箱拿到验证码，提交验证码换取 Session
//! let record = flow.submit_email("user@example.com").unwrap();
//! let session = flow.submit_code("user@example.com", &record.code).unwrap();
//! assert_eq!(session.identity, "user@example.com");
//!
//! // 此后重启会直接恢复到已认证态
//! assert!(matches!(flow.restore(), FlowState::Authenticated(_)));
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::EventLog;
use crate::otp::{OtpConfig, OtpEngine, OtpRecord};
use crate::session::{Session, SessionManager};
use crate::storage::{InMemoryStore, KeyValueStore, PENDING_IDENTITY_KEY};

/// 流程所处的阶段
#[derive(Debug, Clone)]
pub enum FlowState {
    /// 等待用户输入邮箱
    AwaitingEmail,

    /// 验证码已发出，等待用户输码
    AwaitingCode {
        /// 输码中的身份
        identity: String,
        /// 验证码过期时刻（供展示层倒计时）
        expires_at: DateTime<Utc>,
        /// 已失败次数
        attempts: u32,
    },

    /// 已认证
    Authenticated(Session),
}

/// 认证流程控制器
///
/// 薄粘合层：状态转换全部委托给 OTP 引擎和 Session 管理器，
/// 自身只维护待验证身份标记。
pub struct AuthFlow {
    store: Arc<dyn KeyValueStore>,
    otp: OtpEngine,
    sessions: SessionManager,
    events: EventLog,
}

impl AuthFlow {
    /// 使用默认内存存储与系统时钟创建流程
    pub fn new(config: OtpConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), Arc::new(SystemClock), config)
    }

    /// 使用自定义存储与时钟创建流程
    ///
    /// 三个组件共享同一个存储与时钟，重启后以同样的参数重建即可恢复。
    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: OtpConfig,
    ) -> Self {
        let otp = OtpEngine::with_store(store.clone(), clock.clone(), config);
        let sessions = SessionManager::new(store.clone(), clock.clone());
        let events = EventLog::new(store.clone(), clock);
        Self {
            store,
            otp,
            sessions,
            events,
        }
    }

    /// 启动时恢复流程状态
    ///
    /// 判定顺序：
    ///
    /// 1. 存在有效 Session → [`FlowState::Authenticated`]
    /// 2. 存在待验证身份标记且其验证码仍存活 → [`FlowState::AwaitingCode`]，
    ///    带出过期时刻与已失败次数
    /// 3. 其余情况 → 清除标记，[`FlowState::AwaitingEmail`]
    pub fn restore(&self) -> FlowState {
        if let Some(session) = self.sessions.current() {
            return FlowState::Authenticated(session);
        }

        let Some(identity) = self.store.get(PENDING_IDENTITY_KEY).ok().flatten() else {
            return FlowState::AwaitingEmail;
        };

        if let Some(record) = self.otp.pending(&identity) {
            tracing::debug!(identity = %identity, code = %record.code, "otp restored");
            return FlowState::AwaitingCode {
                identity,
                expires_at: record.expires_at,
                attempts: record.attempts,
            };
        }

        // 验证码在离开期间失效，标记作废，回到起点
        let _ = self.store.remove(PENDING_IDENTITY_KEY);
        FlowState::AwaitingEmail
    }

    /// 用户提交邮箱
    ///
    /// 先落盘标记（重启安全），再生成验证码。返回的记录携带验证码
    /// 与过期时刻，供展示层提示与倒计时。
    pub fn submit_email(&self, identity: &str) -> Result<OtpRecord> {
        self.store.set(PENDING_IDENTITY_KEY, identity)?;
        self.otp.generate(identity)
    }

    /// 用户提交验证码
    ///
    /// 校验通过则建立 Session 并清除标记。校验失败时错误的
    /// `Display` 即为可展示的提示文案，流程停留在输码环节。
    pub fn submit_code(&self, identity: &str, code: &str) -> Result<Session> {
        self.otp.validate(identity, code)?;

        let session = self.sessions.create(identity)?;
        // 恢复时 Session 优先于标记，残留标记无害
        let _ = self.store.remove(PENDING_IDENTITY_KEY);

        Ok(session)
    }

    /// 用户请求重发验证码
    ///
    /// 生成新码并无条件替换旧记录，失败计数清零。
    pub fn resend(&self, identity: &str) -> Result<OtpRecord> {
        self.otp.generate(identity)
    }

    /// 用户登出
    ///
    /// 销毁 Session 并清除标记，回到等待邮箱状态。
    pub fn logout(&self) -> Result<()> {
        self.sessions.destroy()?;
        self.store.remove(PENDING_IDENTITY_KEY)
    }

    /// OTP 引擎
    pub fn otp(&self) -> &OtpEngine {
        &self.otp
    }

    /// Session 管理器
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 审计事件日志（观测用）
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
