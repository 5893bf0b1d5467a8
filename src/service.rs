// ==========================================
// 项目计划导入 - 并发导入服务
// ==========================================
// 职责: 解析导入任务消息，并发执行多个 masterplan 的导入
// 并发: 信号量限制同时进行的导入数；同一 masterplan external_id 经按键异步锁串行
// 线程: 读取与落库都在 tokio 阻塞线程池执行（rusqlite 为同步 API）
// ==========================================

use crate::config::{ImportConfig, ImportSettings};
use crate::db;
use crate::domain::import_log::ImportReport;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::model_reader::ProjectReader;
use crate::importer::orchestrator::{ImportRequest, MasterplanImporter};
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::{error, info, warn};

/// 服务连接的 busy_timeout：并发导入在 SQLite 单写锁上排队
const SERVICE_BUSY_TIMEOUT_MS: u64 = 120_000;

// ==========================================
// ImportJob - 导入任务消息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportJob {
    #[serde(alias = "mpp_path")]
    pub model_path: String,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub file_storage_path: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
}

impl ImportJob {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            source_file: None,
            file_storage_path: None,
            file_hash: None,
        }
    }

    /// 解析 JSON 任务消息
    ///
    /// # 错误
    /// - 非 JSON / 非对象 / 缺少或为空的 model_path → InvalidJob
    pub fn parse(message: &str) -> ImportResult<Self> {
        let value: serde_json::Value = serde_json::from_str(message)
            .map_err(|e| ImportError::InvalidJob(format!("JSON 解析失败: {}", e)))?;
        if !value.is_object() {
            return Err(ImportError::InvalidJob("消息必须是 JSON 对象".to_string()));
        }

        let job: ImportJob = serde_json::from_value(value)
            .map_err(|e| ImportError::InvalidJob(e.to_string()))?;
        if job.model_path.trim().is_empty() {
            return Err(ImportError::InvalidJob("model_path 不能为空".to_string()));
        }
        Ok(job)
    }

    pub fn into_request(self) -> ImportRequest {
        let mut request = ImportRequest::new(PathBuf::from(self.model_path.trim()));
        request.source_file = self.source_file;
        request.file_storage_path = self.file_storage_path;
        request.file_hash = self.file_hash;
        request
    }
}

// ==========================================
// ImportService - 多任务并发导入
// ==========================================
pub struct ImportService {
    db_path: String,
    reader: Arc<dyn ProjectReader>,
    settings: ImportSettings,
    permits: Arc<Semaphore>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ImportService {
    pub fn new(config: &ImportConfig, reader: Arc<dyn ProjectReader>) -> Self {
        Self {
            db_path: config.store.db_path.clone(),
            reader,
            settings: config.settings.clone(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_imports.max(1))),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 并发执行全部任务；单个任务失败不影响其它任务
    pub async fn run_jobs(&self, jobs: Vec<ImportJob>) -> Vec<ImportResult<ImportReport>> {
        info!(count = jobs.len(), "开始批量导入任务");

        let tasks = jobs.into_iter().map(|job| async move {
            let model_path = job.model_path.clone();
            match self.run_job(job).await {
                Ok(report) => {
                    info!(file = %model_path, masterplan = %report.masterplan_external_id, "任务导入成功");
                    Ok(report)
                }
                Err(e) => {
                    error!(file = %model_path, error = %e, "任务导入失败");
                    Err(e)
                }
            }
        });
        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );
        results
    }

    /// 执行单个任务
    pub async fn run_job(&self, job: ImportJob) -> ImportResult<ImportReport> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ImportError::InternalError(format!("并发许可获取失败: {}", e)))?;

        let importer = Arc::new(self.open_importer()?);
        let request = job.into_request();

        let reading = Arc::clone(&importer);
        let source = tokio::task::spawn_blocking(move || reading.read_source(request))
            .await
            .map_err(|e| ImportError::InternalError(format!("任务执行失败: {}", e)))??;

        // 同一 masterplan 串行：持锁直到落库结束
        let key = source.masterplan_external_id.clone();
        let lock = self.lock_for(&key)?;
        let guard = lock.lock().await;

        let result = tokio::task::spawn_blocking(move || importer.import_model(source))
            .await
            .map_err(|e| ImportError::InternalError(format!("任务执行失败: {}", e)));

        drop(guard);
        drop(lock);
        self.release_lock(&key);
        result?
    }

    fn open_importer(&self) -> ImportResult<MasterplanImporter> {
        let conn = db::open_sqlite_connection(&self.db_path)?;
        conn.busy_timeout(Duration::from_millis(SERVICE_BUSY_TIMEOUT_MS))?;
        db::init_schema(&conn)?;
        Ok(MasterplanImporter::new(
            Arc::new(Mutex::new(conn)),
            Arc::clone(&self.reader),
            self.settings.clone(),
        ))
    }

    fn lock_for(&self, masterplan_external_id: &str) -> ImportResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))?;
        Ok(Arc::clone(
            locks
                .entry(masterplan_external_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        ))
    }

    /// 没有其它任务持有或等待该锁时移除条目
    fn release_lock(&self, masterplan_external_id: &str) {
        match self.locks.lock() {
            Ok(mut locks) => {
                if locks
                    .get(masterplan_external_id)
                    .is_some_and(|lock| Arc::strong_count(lock) == 1)
                {
                    locks.remove(masterplan_external_id);
                }
            }
            Err(e) => warn!(error = %e, "锁表不可用，跳过清理"),
        }
    }

    /// 当前仍在跟踪的 masterplan 锁数量
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
