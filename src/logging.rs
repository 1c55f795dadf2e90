// ==========================================
// 市场主体关系引擎 - 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 日志写 stderr,stdout 留给命令输出 (JSON 报告)
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量 (`json` 输出结构化日志,其余值为文本)
pub const LOG_FORMAT_ENV: &str = "MARKET_RELATIONS_LOG_FORMAT";

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=market_relations::engine=trace
/// - MARKET_RELATIONS_LOG_FORMAT: `json` 时每行一条 JSON 记录
///
/// # 示例
/// ```no_run
/// use market_relations::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_line_number(true).init();
    }
}

/// 初始化测试环境的日志系统（debug 级别，输出到测试捕获，可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
