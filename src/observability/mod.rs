//! 可观测性：tracing 订阅器初始化
//!
//! 默认级别 info，RUST_LOG 可覆盖；日志写 stderr，stdout 留给最终结果 JSON。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
