//! 存储适配器模块
//!
//! 持久化被抽象成一个极小的键值对契约：[`KeyValueStore`]，值统一为
//! JSON 编码的字符串。任何满足 get/set/remove 语义的后端（内存表、
//! 文件、嵌入式 KV）都可以接入。
//!
//! 读取路径的约定：存储故障与损坏的 JSON 一律按「值不存在」处理，
//! 不向上传播；写入路径的故障则以 [`StorageError`](crate::error::StorageError)
//! 的形式返回给调用方。
//!
//! ## 示例
//!
//! ```rust
//! use authflow::storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("greeting", "\"hello\"").unwrap();
//!
//! assert_eq!(store.get("greeting").unwrap(), Some("\"hello\"".to_string()));
//!
//! store.remove("greeting").unwrap();
//! assert_eq!(store.get("greeting").unwrap(), None);
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, StorageError};

// ============================================================================
// 存储键
// ============================================================================

/// 当前 Session 记录（单槽位）
pub const SESSION_KEY: &str = "af_session";

/// OTP 记录表（identity -> 记录 的 JSON 对象）
pub const OTP_DATA_KEY: &str = "af_otp_data";

/// 审计事件日志（JSON 数组，只追加）
pub const EVENTS_KEY: &str = "af_events";

/// 待验证身份标记（裸字符串，流程控制器专用）
pub const PENDING_IDENTITY_KEY: &str = "af_pending_identity";

// ============================================================================
// 存储接口
// ============================================================================

/// 键值存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如文件、嵌入式数据库等）。
/// 值是 JSON 编码后的字符串，适配器本身不关心编码。
pub trait KeyValueStore: Send + Sync {
    /// 读取指定键的值，不存在时返回 `None`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入指定键的值，已存在时覆盖
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除指定键，键不存在时也视为成功
    fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单进程客户端或测试环境。克隆共享同一份底层数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取当前存储的键数量
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::OperationFailed("lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// JSON 读写辅助
// ============================================================================

/// 读取并反序列化一个 JSON 值
///
/// 存储故障、键不存在、JSON 损坏统一返回 `None`。
pub(crate) fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
        _ => None,
    }
}

/// 序列化并写入一个 JSON 值
///
/// 写入失败会向调用方返回存储错误。
pub(crate) fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        name: String,
        count: u32,
    }

    #[test]
    fn test_set_get_remove() {
        let store = InMemoryStore::new();

        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v1".to_string()));

        // 覆盖写
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn test_len_and_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_clones_share_data() {
        let store = InMemoryStore::new();
        let other = store.clone();

        store.set("shared", "yes").unwrap();
        assert_eq!(other.get("shared").unwrap(), Some("yes".to_string()));
    }

    #[test]
    fn test_json_round_trip() {
        let store = InMemoryStore::new();
        let probe = Probe {
            name: "otp".into(),
            count: 3,
        };

        write_json(&store, "probe", &probe).unwrap();
        let read: Option<Probe> = read_json(&store, "probe");
        assert_eq!(read, Some(probe));
    }

    #[test]
    fn test_malformed_json_reads_as_absent() {
        let store = InMemoryStore::new();
        store.set("probe", "{not json").unwrap();

        let read: Option<Probe> = read_json(&store, "probe");
        assert!(read.is_none());
    }

    #[test]
    fn test_missing_key_reads_as_absent() {
        let store = InMemoryStore::new();
        let read: Option<Probe> = read_json(&store, "nothing");
        assert!(read.is_none());
    }
}
