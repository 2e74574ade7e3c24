//! 统一错误类型模块
//!
//! 提供 authflow 库中所有操作的错误类型定义。
//!
//! 验证类错误（`OtpError`）是可恢复的、面向用户的：其 `Display` 输出
//! 就是展示层可以直接渲染的提示文案。存储类错误（`StorageError`）
//! 表示持久化层不可用，由调用方决定如何兜底。

use std::fmt;

/// authflow 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// authflow 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// OTP 验证错误
    Otp(OtpError),

    /// 存储错误
    Storage(StorageError),
}

impl Error {
    /// 创建一个存储不可用错误
    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Error::Storage(StorageError::Unavailable(msg.into()))
    }

    /// 返回可直接渲染给用户的提示文案（仅验证类错误有）
    ///
    /// 存储类错误不面向用户，返回 `None`。
    pub fn user_message(&self) -> Option<String> {
        match self {
            Error::Otp(e) => Some(e.to_string()),
            Error::Storage(_) => None,
        }
    }
}

/// OTP 验证相关错误
///
/// 每个变体对应验证状态机的一个失败分支，检查顺序是接口契约的一部分：
/// 先查记录是否存在，再查过期，再查尝试次数，最后比较验证码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    /// 当前身份没有待验证的验证码
    NotRequested,
    /// 验证码已过期
    Expired,
    /// 失败次数已达上限
    AttemptsExhausted,
    /// 验证码错误，携带剩余尝试次数
    Incorrect {
        /// 剩余尝试次数
        remaining: u32,
    },
}

impl OtpError {
    /// 审计事件中使用的失败原因标签
    pub fn reason(&self) -> &'static str {
        match self {
            OtpError::NotRequested => "NO_DATA",
            OtpError::Expired => "EXPIRED",
            OtpError::AttemptsExhausted => "MAX_ATTEMPTS_EXCEEDED",
            OtpError::Incorrect { .. } => "INCORRECT_VALUE",
        }
    }
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 存储不可用
    Unavailable(String),
    /// 操作失败
    OperationFailed(String),
    /// 序列化失败
    Serialization(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Otp(e) => write!(f, "{}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpError::NotRequested => write!(f, "OTP expired or not requested."),
            OtpError::Expired => write!(f, "OTP has expired. Please request a new one."),
            OtpError::AttemptsExhausted => {
                write!(f, "Too many failed attempts. Please request a new OTP.")
            }
            OtpError::Incorrect { remaining } => {
                write!(f, "Incorrect OTP. {} attempts remaining.", remaining)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {}", msg),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
            StorageError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for OtpError {}
impl std::error::Error for StorageError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<OtpError> for Error {
    fn from(err: OtpError) -> Self {
        Error::Otp(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}
