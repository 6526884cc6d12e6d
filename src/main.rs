// ==========================================
// 生产排程与完工履约核销 - 命令行入口
// ==========================================
// 用法:
//   production-scheduling                                 初始化数据库并输出配置快照
//   production-scheduling import <schedule_id> <csv> [actor]  导入排程行
//   production-scheduling progress <schedule_id>              输出排程进度
//
// 数据库路径: 环境变量 PRODUCTION_SCHEDULING_DB > 用户数据目录 > 当前目录
// 日志格式: PRODUCTION_SCHEDULING_LOG_FORMAT=json 时输出 JSON
// ==========================================

use anyhow::{anyhow, bail, Context};
use production_scheduling::app::{get_default_db_path, AppState};
use production_scheduling::logging;
use std::path::Path;

const DEFAULT_ACTOR: &str = "cli";
const LOG_FORMAT_ENV: &str = "PRODUCTION_SCHEDULING_LOG_FORMAT";

fn main() -> anyhow::Result<()> {
    match std::env::var(LOG_FORMAT_ENV) {
        Ok(format) if format.eq_ignore_ascii_case("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{}", production_scheduling::APP_NAME);
    tracing::info!("系统版本: {}", production_scheduling::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => {
            let snapshot = state
                .config_manager
                .get_config_snapshot()
                .context("读取配置快照失败")?;
            println!("{}", snapshot);
        }
        Some("import") => {
            let schedule_id = args.next().context("缺少参数 schedule_id")?;
            let csv_path = args.next().context("缺少参数 csv 文件路径")?;
            let actor = args.next().unwrap_or_else(|| DEFAULT_ACTOR.to_string());

            let items = state
                .production_api
                .import_items_from_csv(&schedule_id, Path::new(&csv_path), &actor)
                .with_context(|| format!("导入失败: {}", csv_path))?;
            println!("imported={}", items.len());
        }
        Some("progress") => {
            let schedule_id = args.next().context("缺少参数 schedule_id")?;
            let progress = state
                .production_api
                .get_schedule_progress(&schedule_id)
                .with_context(|| format!("查询进度失败: {}", schedule_id))?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
        Some(other) => bail!("未知命令: {}", other),
    }

    Ok(())
}
