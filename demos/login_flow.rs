//! 登录流程演示
//!
//! 走一遍完整的无密码登录旅程：提交邮箱 → 输错一次 → 输对 →
//! 模拟重启恢复 → 登出，并在最后打印审计轨迹。
//!
//! 运行: cargo run --example login_flow
//!
//! 设置 RUST_LOG=debug 可以看到生成的验证码（投递通道的替身）。

use std::sync::Arc;

use authflow::clock::{Clock, SystemClock};
use authflow::flow::{AuthFlow, FlowState};
use authflow::otp::OtpConfig;
use authflow::session::format_elapsed;
use authflow::storage::InMemoryStore;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(SystemClock);
    let flow = AuthFlow::with_store(store.clone(), clock.clone(), OtpConfig::default());

    let identity = "user@example.com";

    println!("=== 无密码登录演示 ===\n");

    // 1. 提交邮箱，拿到验证码
    let record = flow.submit_email(identity).unwrap();
    println!("已为 {} 生成验证码: {}", identity, record.code);
    println!("有效期 {} 秒，最多可错 3 次\n", record.remaining_seconds(clock.now()));

    // 2. 先输错一次
    match flow.submit_code(identity, "000000") {
        Ok(_) => unreachable!("000000 不在生成范围内"),
        Err(e) => println!("提交 000000 → {}", e),
    }

    // 3. 输入正确的验证码
    let session = flow.submit_code(identity, &record.code).unwrap();
    println!("提交 {} → 登录成功，Session 建立于 {}\n", record.code, session.start_time);

    // 4. 模拟进程重启：用同一份存储重建流程
    let reborn = AuthFlow::with_store(store, clock.clone(), OtpConfig::default());
    match reborn.restore() {
        FlowState::Authenticated(s) => {
            println!(
                "重启恢复 → 仍然在线，已登录 {}",
                format_elapsed(s.elapsed_seconds(clock.now()))
            );
        }
        state => println!("重启恢复 → {:?}", state),
    }

    // 5. 登出
    reborn.logout().unwrap();
    println!("已登出\n");

    // 6. 打印审计轨迹
    println!("=== 审计轨迹 ===");
    for event in reborn.events().all() {
        println!("{} {} {:?}", event.timestamp.to_rfc3339(), event.name, event.details);
    }
}
