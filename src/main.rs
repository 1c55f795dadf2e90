// ==========================================
// 市场主体关系引擎 - 命令行入口
// ==========================================
// 用法:
//   market-relations check-coverage [db_path]
//   market-relations import <csv_path> [db_path]
//   market-relations pending-events [db_path]
// db_path 缺省时使用 MARKET_RELATIONS_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::Utc;
use market_relations::app::{get_default_db_path, AppState};
use market_relations::logging;

const USAGE: &str = "用法: market-relations <check-coverage [db] | import <csv> [db] | pending-events [db]>";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", market_relations::APP_NAME, market_relations::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "check-coverage" => {
            let state = open_state(args.get(1))?;
            let report = state
                .balance_responsibility_api
                .check_coverage(Utc::now())
                .await
                .context("覆盖检查失败")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "import" => {
            let Some(csv_path) = args.get(1) else {
                bail!(USAGE);
            };
            let state = open_state(args.get(2))?;
            let summary = state
                .balance_responsibility_api
                .import_csv(csv_path, Utc::now())
                .await
                .with_context(|| format!("导入失败: {}", csv_path))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "pending-events" => {
            let state = open_state(args.get(1))?;
            let events = state.event_repo.list_pending(1000)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn open_state(db_path: Option<&String>) -> Result<AppState> {
    let db_path = db_path.cloned().unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);
    AppState::new(db_path).map_err(anyhow::Error::msg)
}
