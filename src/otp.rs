//! OTP (One-Time Password) 引擎
//!
//! 实现验证码生命周期状态机：生成、过期、尝试计数、一次性消费。
//!
//! ## 工作流程
//!
//! 1. 用户提交邮箱，系统生成随机 6 位数字验证码
//! 2. 应用层将验证码展示/发送给用户（本库只生成与记录，不负责投递）
//! 3. 用户输入验证码，系统依次检查：记录存在 → 未过期 → 次数未超限 → 码值正确
//! 4. 验证成功后记录立即删除，验证码不可重放
//!
//! 检查顺序是接口契约的一部分：一条已过期且次数耗尽的记录永远报告
//! 「过期」而不是「次数超限」。过期采用惰性淘汰：只在读取时拒绝，
//! 由下一次生成覆盖，没有后台清理。
//!
//! ## 示例
//!
//! ```rust
//! use authflow::otp::{OtpConfig, OtpEngine};
//!
//! let engine = OtpEngine::new(OtpConfig::default());
//!
//! // 生成验证码（返回值即「投递通道」）
//! let record = engine.generate("user@example.com").unwrap();
//! assert_eq!(record.code.len(), 6);
//!
//! // 用正确的验证码校验
//! assert!(engine.validate("user@example.com", &record.code).is_ok());
//!
//! // 验证码已被消费，重放失败
//! assert!(engine.validate("user@example.com", &record.code).is_err());
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{OtpError, Result};
use crate::events::{AuthEvent, EventLog};
use crate::random::{constant_time_compare_str, generate_numeric_code};
use crate::storage::{self, InMemoryStore, KeyValueStore, OTP_DATA_KEY};

// ============================================================================
// 配置
// ============================================================================

/// OTP 配置
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// 验证码有效期
    pub validity: std::time::Duration,

    /// 最大失败次数（达到后必须重新生成）
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            validity: std::time::Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

impl OtpConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置有效期
    pub fn with_validity(mut self, validity: std::time::Duration) -> Self {
        self.validity = validity;
        self
    }

    /// 设置最大失败次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 一条 OTP 记录
///
/// 每个身份同一时刻至多一条存活记录，它是该身份验证的唯一依据。
/// 重新生成会无条件替换旧记录并把失败计数清零。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    /// 身份标识（提交的邮箱原样使用，不做归一化）
    pub identity: String,

    /// 验证码，恒为 6 位 ASCII 数字
    pub code: String,

    /// 过期时刻（持久化为 epoch 毫秒）
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// 已失败次数
    pub attempts: u32,

    /// 消费标记。实际实现中验证成功直接删除记录，此字段保留在
    /// 持久化形态中以兼容记录结构。
    pub consumed: bool,
}

impl OtpRecord {
    /// 检查在指定时刻是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 指定时刻的剩余有效秒数
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

// ============================================================================
// OTP 引擎
// ============================================================================

/// OTP 引擎
///
/// 持有存储适配器、时钟与审计日志，负责验证码的完整生命周期。
///
/// 本类型假定单个逻辑写者：同一身份不会有并发的
/// [`generate`](OtpEngine::generate) / [`validate`](OtpEngine::validate)。
/// `validate` 内部是一段读-改-写序列，移植到多客户端服务时必须在外层
/// 增加按身份的互斥（锁或单线程 actor）。
pub struct OtpEngine {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    events: EventLog,
    config: OtpConfig,
}

impl OtpEngine {
    /// 使用默认内存存储与系统时钟创建引擎
    pub fn new(config: OtpConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), Arc::new(SystemClock), config)
    }

    /// 使用自定义存储与时钟创建引擎
    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: OtpConfig,
    ) -> Self {
        let events = EventLog::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            events,
            config,
        }
    }

    /// 生成验证码
    ///
    /// 为 `identity` 抽取一个 [100000, 999999] 范围内的随机码，
    /// 计算过期时刻，失败计数清零，无条件覆盖该身份的旧记录。
    ///
    /// 返回完整记录。返回值与 debug 日志就是本系统的「投递通道」，
    /// 真实的邮件/短信发送不在范围内。
    ///
    /// # Errors
    ///
    /// 记录写入存储失败时返回存储错误。
    pub fn generate(&self, identity: impl Into<String>) -> Result<OtpRecord> {
        let identity = identity.into();
        let now = self.clock.now();

        let record = OtpRecord {
            identity: identity.clone(),
            code: generate_numeric_code(),
            expires_at: now + Duration::seconds(self.config.validity.as_secs() as i64),
            attempts: 0,
            consumed: false,
        };

        let mut records = self.load_records();
        records.insert(identity.clone(), record.clone());
        self.store_records(&records)?;

        self.events.record(AuthEvent::otp_generated(&identity));
        tracing::debug!(identity = %identity, code = %record.code, "otp generated");

        Ok(record)
    }

    /// 校验验证码
    ///
    /// 检查严格按序执行，顺序本身是契约：
    ///
    /// 1. 无记录 → [`OtpError::NotRequested`]
    /// 2. 已过期 → [`OtpError::Expired`]（记录原地保留，等待下次生成覆盖）
    /// 3. 次数超限 → [`OtpError::AttemptsExhausted`]（不再累加计数）
    /// 4. 码值不符 → 计数 +1 并落库，[`OtpError::Incorrect`] 携带剩余次数
    /// 5. 命中 → 删除记录（烧码），返回 `Ok(())`
    ///
    /// 每个分支都会写入对应的审计事件。
    ///
    /// # Errors
    ///
    /// 验证失败返回 [`OtpError`](crate::error::Error::Otp)；
    /// 计数或删除落库失败返回存储错误。
    pub fn validate(&self, identity: &str, submitted: &str) -> Result<()> {
        let mut records = self.load_records();
        let now = self.clock.now();

        let Some(record) = records.get_mut(identity) else {
            return Err(self.reject(identity, OtpError::NotRequested, None));
        };

        if record.is_expired(now) {
            return Err(self.reject(identity, OtpError::Expired, None));
        }

        if record.attempts >= self.config.max_attempts {
            return Err(self.reject(identity, OtpError::AttemptsExhausted, None));
        }

        if !constant_time_compare_str(submitted, &record.code) {
            record.attempts += 1;
            let attempts = record.attempts;
            let remaining = self.config.max_attempts - attempts;

            // 计数必须先落库；失败则如实报告存储错误，
            // 而不是假装已计数地返回「码值不符」
            self.store_records(&records)?;

            return Err(self.reject(identity, OtpError::Incorrect { remaining }, Some(attempts)));
        }

        // 烧码：成功即删除，验证码不可重放
        records.remove(identity);
        self.store_records(&records)?;

        self.events.record(AuthEvent::otp_validated(identity));
        Ok(())
    }

    /// 读取当前存活的记录
    ///
    /// 流程控制器在重启恢复时使用：仅当记录存在且未过期时返回。
    /// 过期记录视同不存在（但不主动删除）。
    pub fn pending(&self, identity: &str) -> Option<OtpRecord> {
        let record = self.load_records().remove(identity)?;
        if record.is_expired(self.clock.now()) {
            return None;
        }
        Some(record)
    }

    /// 撤销指定身份的验证码
    pub fn revoke(&self, identity: &str) -> Result<()> {
        let mut records = self.load_records();
        if records.remove(identity).is_some() {
            self.store_records(&records)?;
        }
        Ok(())
    }

    /// 获取配置
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// 记录失败事件并生成对应错误
    fn reject(&self, identity: &str, error: OtpError, attempts: Option<u32>) -> crate::Error {
        let mut event = AuthEvent::otp_validation_failed(identity, error.reason());
        if let Some(attempts) = attempts {
            event = event.with_detail("attempts", attempts);
        }
        self.events.record(event);
        error.into()
    }

    fn load_records(&self) -> HashMap<String, OtpRecord> {
        storage::read_json(self.store.as_ref(), OTP_DATA_KEY).unwrap_or_default()
    }

    fn store_records(&self, records: &HashMap<String, OtpRecord>) -> Result<()> {
        storage::write_json(self.store.as_ref(), OTP_DATA_KEY, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use chrono::TimeZone;

    fn manual_clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap())
    }

    fn engine_with_clock(clock: &ManualClock) -> OtpEngine {
        OtpEngine::with_store(
            Arc::new(InMemoryStore::new()),
            Arc::new(clock.clone()),
            OtpConfig::default(),
        )
    }

    #[test]
    fn test_generate_record_shape() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();

        assert_eq!(record.identity, "user@example.com");
        assert_eq!(record.code.len(), 6);
        assert!(record.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(record.attempts, 0);
        assert!(!record.consumed);
        assert_eq!(record.expires_at, clock.now() + Duration::seconds(60));
    }

    #[test]
    fn test_generate_then_validate_succeeds() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();
        assert!(engine.validate("user@example.com", &record.code).is_ok());
    }

    #[test]
    fn test_code_burned_after_success() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();
        engine.validate("user@example.com", &record.code).unwrap();

        // 重放同一验证码：记录已删除
        let err = engine
            .validate("user@example.com", &record.code)
            .unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::NotRequested));
    }

    #[test]
    fn test_wrong_code_increments_attempts() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        engine.generate("user@example.com").unwrap();

        // 000000 不在生成范围内，必然是错码
        let err = engine.validate("user@example.com", "000000").unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::Incorrect { remaining: 2 }));
        assert_eq!(err.to_string(), "Incorrect OTP. 2 attempts remaining.");

        let err = engine.validate("user@example.com", "000000").unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::Incorrect { remaining: 1 }));

        let pending = engine.pending("user@example.com").unwrap();
        assert_eq!(pending.attempts, 2);
    }

    #[test]
    fn test_attempts_exhausted_after_cap() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();

        for _ in 0..3 {
            let _ = engine.validate("user@example.com", "000000");
        }

        // 第 4 次起：次数超限，计数不再增长
        let err = engine.validate("user@example.com", "000000").unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::AttemptsExhausted));
        assert_eq!(engine.pending("user@example.com").unwrap().attempts, 3);

        // 正确的验证码同样被拒
        let err = engine
            .validate("user@example.com", &record.code)
            .unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::AttemptsExhausted));
    }

    #[test]
    fn test_expired_code_rejected() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();

        clock.advance(Duration::seconds(61));

        let err = engine
            .validate("user@example.com", &record.code)
            .unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::Expired));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();

        // 恰好到达过期时刻：now > expires_at 不成立，仍然有效
        clock.advance(Duration::seconds(60));
        assert!(engine.validate("user@example.com", &record.code).is_ok());
    }

    #[test]
    fn test_expiry_checked_before_attempt_cap() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        engine.generate("user@example.com").unwrap();

        // 打满失败计数后再推过期
        for _ in 0..3 {
            let _ = engine.validate("user@example.com", "000000");
        }
        clock.advance(Duration::seconds(61));

        // 同时满足「过期」与「次数超限」时必须报告过期
        let err = engine.validate("user@example.com", "000000").unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::Expired));
    }

    #[test]
    fn test_expired_record_left_in_place() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        engine.generate("user@example.com").unwrap();
        clock.advance(Duration::seconds(61));

        let _ = engine.validate("user@example.com", "000000");

        // 过期不主动清除，记录仍在存储中（pending 按不存在处理）
        assert!(engine.pending("user@example.com").is_none());
        let raw = engine.load_records();
        assert!(raw.contains_key("user@example.com"));
    }

    #[test]
    fn test_regenerate_replaces_record() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let first = engine.generate("user@example.com").unwrap();
        let _ = engine.validate("user@example.com", "000000");

        let second = engine.generate("user@example.com").unwrap();

        // 重新生成清零失败计数
        assert_eq!(second.attempts, 0);
        assert_eq!(engine.pending("user@example.com").unwrap().attempts, 0);

        // 旧码失效（极小概率两次抽到同一个码，此处跳过该情形）
        if first.code != second.code {
            let err = engine.validate("user@example.com", &first.code).unwrap_err();
            assert_eq!(
                err,
                Error::Otp(OtpError::Incorrect { remaining: 2 })
            );
        }
    }

    #[test]
    fn test_identities_are_independent() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let a = engine.generate("a@x.com").unwrap();
        let b = engine.generate("b@x.com").unwrap();

        assert!(engine.validate("a@x.com", &a.code).is_ok());
        // a 的消费不影响 b
        assert!(engine.validate("b@x.com", &b.code).is_ok());
    }

    #[test]
    fn test_unknown_identity_not_requested() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let err = engine.validate("nobody@x.com", "123456").unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::NotRequested));
        assert_eq!(err.to_string(), "OTP expired or not requested.");
    }

    #[test]
    fn test_pending_live_and_expired() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        engine.generate("user@example.com").unwrap();
        assert!(engine.pending("user@example.com").is_some());

        clock.advance(Duration::seconds(61));
        assert!(engine.pending("user@example.com").is_none());
    }

    #[test]
    fn test_revoke() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();
        engine.revoke("user@example.com").unwrap();

        let err = engine
            .validate("user@example.com", &record.code)
            .unwrap_err();
        assert_eq!(err, Error::Otp(OtpError::NotRequested));
    }

    #[test]
    fn test_record_persisted_shape() {
        let record = OtpRecord {
            identity: "u@x.com".into(),
            code: "482913".into(),
            expires_at: Utc.timestamp_millis_opt(1_700_000_060_000).unwrap(),
            attempts: 1,
            consumed: false,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identity"], "u@x.com");
        assert_eq!(json["code"], "482913");
        // epoch 毫秒 + camelCase 字段名
        assert_eq!(json["expiresAt"], 1_700_000_060_000_i64);
        assert_eq!(json["attempts"], 1);
        assert_eq!(json["consumed"], false);
    }

    #[test]
    fn test_remaining_seconds() {
        let clock = manual_clock();
        let engine = engine_with_clock(&clock);

        let record = engine.generate("user@example.com").unwrap();
        assert_eq!(record.remaining_seconds(clock.now()), 60);

        clock.advance(Duration::seconds(45));
        assert_eq!(record.remaining_seconds(clock.now()), 15);

        clock.advance(Duration::seconds(100));
        assert_eq!(record.remaining_seconds(clock.now()), 0);
    }

    #[test]
    fn test_config_builders() {
        let config = OtpConfig::new()
            .with_validity(std::time::Duration::from_secs(300))
            .with_max_attempts(5);

        assert_eq!(config.validity, std::time::Duration::from_secs(300));
        assert_eq!(config.max_attempts, 5);
    }
}
