//! Session 管理模块
//!
//! 维护「已登录」状态的唯一证据：一条单槽位的 Session 记录。
//! 记录存在且 `active == true` 即视为已认证；记录缺失、损坏或
//! `active == false` 一律视为未认证，不产生错误。
//!
//! 单客户端进程同一时刻至多一个 Session：新建会覆盖旧记录，
//! 登出直接删除记录。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use authflow::clock::SystemClock;
//! use authflow::session::SessionManager;
//! use authflow::storage::InMemoryStore;
//!
//! let manager = SessionManager::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
//!
//! let session = manager.create("user@example.com").unwrap();
//! assert!(session.active);
//!
//! assert!(manager.current().is_some());
//!
//! manager.destroy().unwrap();
//! assert!(manager.current().is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::Result;
use crate::events::{AuthEvent, EventLog};
use crate::storage::{self, KeyValueStore, SESSION_KEY};

/// Session 数据结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 关联的身份标识
    pub identity: String,

    /// 建立时刻（持久化为 epoch 毫秒），创建后不变
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,

    /// 是否有效。`true` 是已认证的唯一证据
    pub active: bool,
}

impl Session {
    /// 指定时刻的已登录秒数
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }
}

/// 把秒数格式化为 `M:SS` 形式（如 65 秒 → `"1:05"`）
///
/// 供展示层的会话计时器使用。
pub fn format_elapsed(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

// ============================================================================
// Session 管理器
// ============================================================================

/// Session 管理器
///
/// 负责唯一 Session 槽位的建立、读取与销毁。
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    events: EventLog,
}

impl SessionManager {
    /// 创建 Session 管理器
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let events = EventLog::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            events,
        }
    }

    /// 建立新 Session
    ///
    /// 覆盖任何已存在的 Session（单槽位），写入 `SESSION_START` 事件。
    ///
    /// # Errors
    ///
    /// Session 记录写入存储失败时返回存储错误。
    pub fn create(&self, identity: impl Into<String>) -> Result<Session> {
        let identity = identity.into();

        let session = Session {
            identity: identity.clone(),
            start_time: self.clock.now(),
            active: true,
        };

        storage::write_json(self.store.as_ref(), SESSION_KEY, &session)?;
        self.events.record(AuthEvent::session_start(&identity));

        Ok(session)
    }

    /// 读取当前 Session
    ///
    /// 仅当记录存在且 `active == true` 时返回；记录缺失、存储故障、
    /// JSON 损坏都按「未登录」处理，绝不向调用方抛错。
    pub fn current(&self) -> Option<Session> {
        let session: Session = storage::read_json(self.store.as_ref(), SESSION_KEY)?;
        if session.active { Some(session) } else { None }
    }

    /// 销毁当前 Session
    ///
    /// 若存在 Session，先写入携带已登录秒数的 `SESSION_END` 事件；
    /// 随后无条件删除记录；没有 Session 时调用同样成功（幂等）。
    ///
    /// # Errors
    ///
    /// 记录删除失败时返回存储错误。
    pub fn destroy(&self) -> Result<()> {
        if let Some(session) = self.current() {
            let elapsed = session.elapsed_seconds(self.clock.now());
            self.events
                .record(AuthEvent::session_end(&session.identity, elapsed));
        }

        self.store.remove(SESSION_KEY)
    }
}
