// ==========================================
// 项目计划导入引擎 - 命令行入口
// ==========================================
// 用法:
//   masterplan-import <model.json>...        按顺序导入，逐个打印文本报告
//   masterplan-import --jobs <jobs.ndjson>   每行一条任务消息，并发导入
// 存储: MASTERPLAN_DB_PATH（或 .env）；任一导入失败时退出码非 0
// ==========================================

use anyhow::{bail, Context};
use masterplan_import::config::ImportConfig;
use masterplan_import::db::{init_schema, open_sqlite_connection};
use masterplan_import::importer::{ImportRequest, JsonProjectReader, MasterplanImporter};
use masterplan_import::service::{ImportJob, ImportService};
use masterplan_import::{logging, VERSION};
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("用法: masterplan-import <model.json>... | --jobs <jobs.ndjson>");
    }

    let config = ImportConfig::from_env().context("加载导入配置失败")?;
    tracing::info!(version = VERSION, db_path = %config.store.db_path, "项目计划导入引擎启动");

    let failed = match args.first().map(String::as_str) {
        Some("--jobs") => {
            let path = args.get(1).context("--jobs 需要任务文件路径")?;
            run_job_file(&config, path).await?
        }
        _ => run_files(&config, &args)?,
    };

    if failed > 0 {
        bail!("{} 个导入失败", failed);
    }
    Ok(())
}

/// 顺序导入，返回失败数
fn run_files(config: &ImportConfig, files: &[String]) -> anyhow::Result<usize> {
    let conn = open_sqlite_connection(&config.store.db_path)
        .with_context(|| format!("打开数据库失败: {}", config.store.db_path))?;
    init_schema(&conn).context("初始化数据库结构失败")?;

    let importer = MasterplanImporter::new(
        Arc::new(Mutex::new(conn)),
        Arc::new(JsonProjectReader),
        config.settings.clone(),
    );

    let mut failed = 0;
    for file in files {
        match importer.import_project(ImportRequest::new(file)) {
            Ok(report) => println!("{}", report.render_text()),
            Err(e) => {
                failed += 1;
                eprintln!("导入失败 [{}]: {}", file, e);
            }
        }
    }
    Ok(failed)
}

/// 读取任务文件并发导入，返回失败数（含无法解析的消息）
async fn run_job_file(config: &ImportConfig, path: &str) -> anyhow::Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("读取任务文件失败: {}", path))?;

    let mut failed = 0;
    let mut jobs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match ImportJob::parse(line) {
            Ok(job) => jobs.push(job),
            Err(e) => {
                failed += 1;
                eprintln!("第 {} 行: {}", line_no + 1, e);
            }
        }
    }

    let service = ImportService::new(config, Arc::new(JsonProjectReader));
    for result in service.run_jobs(jobs).await {
        match result {
            Ok(report) => println!("{}", report.render_text()),
            Err(e) => {
                failed += 1;
                eprintln!("导入失败: {}", e);
            }
        }
    }
    Ok(failed)
}
