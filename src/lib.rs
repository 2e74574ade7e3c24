//! # AuthFlow
//!
//! 无密码 OTP 认证流程库。
//!
//! 用户提交邮箱，获得一个限时 6 位数字验证码，验证通过后建立
//! Session。核心是验证码生命周期状态机及其持久化契约：生成、过期、
//! 尝试限制、一次性消费、Session 的建立与销毁。
//!
//! ## 功能特性
//!
//! - **OTP 引擎**: 验证码生成、严格有序的校验状态机、失败计数、烧码
//! - **Session 管理**: 单槽位 Session 的建立、读取与销毁
//! - **流程控制**: 邮箱 → 输码 → 已认证 三态流转，进程重启后恢复现场
//! - **存储适配器**: get/set/remove 键值契约，任何后端均可接入
//! - **审计日志**: 每一步认证动作的追加式事件记录
//! - **可注入时钟**: 测试中确定性模拟过期，无需真实等待
//!
//! 验证码的投递（邮件/短信）不在范围内：生成的码通过返回值与
//! 诊断日志暴露，由应用层接入真实的发送渠道。
//!
//! ## 完整流程示例
//!
//! ```rust
//! use authflow::flow::{AuthFlow, FlowState};
//! use authflow::otp::OtpConfig;
//!
//! let flow = AuthFlow::new(OtpConfig::default());
//!
//! // 1. 用户提交邮箱，生成验证码
//! let record = flow.submit_email("user@example.com").unwrap();
//! println!("验证码: {}", record.code); // 例如: "482913"
//!
//! // 2. 用户输码，换取 Session
//! let session = flow.submit_code("user@example.com", &record.code).unwrap();
//! assert!(session.active);
//!
//! // 3. 重启后恢复现场
//! assert!(matches!(flow.restore(), FlowState::Authenticated(_)));
//!
//! // 4. 登出
//! flow.logout().unwrap();
//! assert!(matches!(flow.restore(), FlowState::AwaitingEmail));
//! ```
//!
//! ## 单独使用 OTP 引擎
//!
//! ```rust
//! use authflow::otp::{OtpConfig, OtpEngine};
//!
//! let engine = OtpEngine::new(OtpConfig::default());
//!
//! let record = engine.generate("user@example.com").unwrap();
//!
//! // 错误的验证码：失败计数 +1，错误信息可直接展示
//! let err = engine.validate("user@example.com", "000000").unwrap_err();
//! assert_eq!(err.to_string(), "Incorrect OTP. 2 attempts remaining.");
//!
//! // 正确的验证码：验证成功并烧码
//! assert!(engine.validate("user@example.com", &record.code).is_ok());
//! ```

pub mod clock;
pub mod error;
pub mod events;
pub mod flow;
pub mod otp;
pub mod random;
pub mod session;
pub mod storage;

pub use error::{Error, OtpError, Result, StorageError};

// ============================================================================
// 核心类型导出
// ============================================================================

pub use flow::{AuthFlow, FlowState};
pub use otp::{OtpConfig, OtpEngine, OtpRecord};
pub use session::{Session, SessionManager, format_elapsed};

// ============================================================================
// 基础设施导出
// ============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{AuthEvent, EventKind, EventLog};
pub use storage::{InMemoryStore, KeyValueStore};
