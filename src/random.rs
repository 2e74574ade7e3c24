//! 随机数生成模块
//!
//! 提供验证码的随机生成与常量时间比较功能。

use rand::Rng;

/// 生成指定范围内的随机数
///
/// # Arguments
///
/// * `min` - 最小值（包含）
/// * `max` - 最大值（不包含）
///
/// # Returns
///
/// 返回 [min, max) 范围内的随机数
pub fn generate_random_in_range(min: u64, max: u64) -> u64 {
    rand::rng().random_range(min..max)
}

/// 生成 6 位数字验证码
///
/// 取值范围为 [100000, 999999]，即首位不为 0，验证码恒为 6 位，
/// 不存在补零歧义。
///
/// # Example
///
/// ```rust
/// use authflow::random::generate_numeric_code;
///
/// let code = generate_numeric_code();
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_digit()));
/// assert_ne!(&code[0..1], "0");
/// ```
pub fn generate_numeric_code() -> String {
    generate_random_in_range(100_000, 1_000_000).to_string()
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
///
/// # Example
///
/// ```rust
/// use authflow::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"482913", b"482913"));
/// assert!(!constant_time_compare(b"482913", b"000000"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
