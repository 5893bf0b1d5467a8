// ==========================================
// 并发导入服务测试
// ==========================================
// 测试目标: 多个 masterplan 并发导入；同一 masterplan 串行；失败隔离
// ==========================================


use masterplan_import::config::{ImportConfig, ImportSettings, StoreConfig};
use masterplan_import::domain::model::ProjectModel;
use masterplan_import::importer::{ImportError, ImportResult, ProjectReader};
use masterplan_import::logging;
use masterplan_import::service::{ImportJob, ImportService};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use test_helpers::*;

/// 按路径返回不同模型的读取器
struct RoutingReader {
    models: HashMap<String, ProjectModel>,
}

impl ProjectReader for RoutingReader {
    fn read(&self, path: &Path) -> ImportResult<ProjectModel> {
        let key = path.to_string_lossy().to_string();
        self.models
            .get(&key)
            .cloned()
            .ok_or(ImportError::SourceNotFound(key))
    }
}

fn plan(external_id: &str, tasks: usize) -> ProjectModel {
    let mut m = model(external_id, external_id);
    m.resources = vec![resource("R1", "Crew")];
    m.tasks = (1..=tasks).map(|i| task(&format!("T{}", i), "work")).collect();
    m.assignments = (1..=tasks)
        .map(|i| assignment(&format!("A{}", i), &format!("T{}", i), "R1"))
        .collect();
    m
}

fn service(db_path: &str, models: HashMap<String, ProjectModel>) -> ImportService {
    let config = ImportConfig {
        store: StoreConfig {
            db_path: db_path.to_string(),
        },
        settings: ImportSettings::default(),
        max_concurrent_imports: 3,
    };
    ImportService::new(&config, Arc::new(RoutingReader { models }))
}

#[tokio::test]
async fn test_concurrent_jobs_for_different_masterplans() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db();

    let mut models = HashMap::new();
    for i in 1..=6 {
        models.insert(format!("plans/p{}.json", i), plan(&format!("P-{}", i), 20));
    }
    let jobs: Vec<ImportJob> = (1..=6).map(|i| ImportJob::new(format!("plans/p{}.json", i))).collect();

    let start = Instant::now();
    let results = service(&db_path, models).run_jobs(jobs).await;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "并发导入完成");

    assert_eq!(results.len(), 6);
    for result in &results {
        let report = result.as_ref().expect("每个任务都应成功");
        assert_eq!(report.counts.tasks, 20);
        assert_eq!(report.counts.assignments, 20);
    }

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM masterplan"), 6);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task"), 120);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM import_log WHERE status = 'completed'"), 6);
}

#[tokio::test]
async fn test_same_masterplan_jobs_are_serialized() {
    let (_tmp, db_path) = create_test_db();

    let mut models = HashMap::new();
    models.insert("v1.json".to_string(), plan("P-SAME", 5));
    models.insert("v2.json".to_string(), plan("P-SAME", 5));
    models.insert("v3.json".to_string(), plan("P-SAME", 5));
    let jobs = vec![
        ImportJob::new("v1.json"),
        ImportJob::new("v2.json"),
        ImportJob::new("v3.json"),
    ];

    let results = service(&db_path, models).run_jobs(jobs).await;
    let ids: Vec<i64> = results
        .iter()
        .map(|r| r.as_ref().unwrap().masterplan_id.unwrap())
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM masterplan"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task"), 5);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM assignment"), 5);
}

#[tokio::test]
async fn test_failed_job_does_not_abort_others() {
    let (_tmp, db_path) = create_test_db();

    let mut models = HashMap::new();
    models.insert("ok.json".to_string(), plan("P-OK", 3));
    let jobs = vec![
        ImportJob::parse(r#"{"model_path": "missing.json"}"#).unwrap(),
        ImportJob::parse(r#"{"mpp_path": "ok.json", "source_file": "upload.mpp"}"#).unwrap(),
    ];

    let results = service(&db_path, models).run_jobs(jobs).await;
    let err = results[0].as_ref().unwrap_err();
    assert!(err.import_log_id().is_some());
    let report = results[1].as_ref().unwrap();
    assert_eq!(report.source_file, "upload.mpp");
    assert_eq!(report.counts.tasks, 3);

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM import_log WHERE status = 'failed'"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM import_log WHERE status = 'completed'"), 1);
}
