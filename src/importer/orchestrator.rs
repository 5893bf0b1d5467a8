// ==========================================
// 项目计划导入 - 导入编排器
// ==========================================
// 状态机:
//   读取源文件 → 解析 masterplan 身份 → 日历 → 资源 → 任务(+依赖+任务基线)
//   → 分配 → 分时数据 → 资源基线 → 审计日志 → 提交
//   任一状态出错 → 失败
// 事务: 读取之后的全部状态在同一事务内；失败时整体回滚，
//       另开事务尽力写一条失败审计，再返回原始错误
// ==========================================

use crate::config::ImportSettings;
use crate::domain::import_log::ImportReport;
use crate::domain::model::ProjectModel;
use crate::domain::types::{EntityKind, ImportPhase};
use crate::importer::assignment_upserter::AssignmentUpserter;
use crate::importer::baseline_engine::{discover_indices, BaselineEngine};
use crate::importer::calendar_upserter::CalendarUpserter;
use crate::importer::custom_field_upserter::CustomFieldUpserter;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::dependency_upserter::DependencyUpserter;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::model_reader::ProjectReader;
use crate::importer::observer::{ImportObserver, NoopObserver};
use crate::importer::resource_upserter::ResourceUpserter;
use crate::importer::soft_delete::{ReconcileOutcome, SoftDeleteReconciler};
use crate::importer::task_upserter::TaskUpserter;
use crate::importer::timephased_loader::TimephasedLoader;
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::perf::{PhaseTimer, PhaseTimings, TotalTimer};
use crate::repository::{ImportLogRepository, MasterplanRepository, MasterplanRow};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportRequest - 单次导入请求
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// 本地模型文件路径（传输层已解析）
    pub model_path: PathBuf,
    /// 源描述（缺省取文件名）
    pub source_file: Option<String>,
    pub file_storage_path: Option<String>,
    /// 内容哈希（缺省由引擎计算 SHA-256）
    pub file_hash: Option<String>,
}

impl ImportRequest {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            source_file: None,
            file_storage_path: None,
            file_hash: None,
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<String>) -> Self {
        self.file_storage_path = Some(path.into());
        self
    }

    pub fn with_file_hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }

    fn source_descriptor(&self) -> String {
        self.source_file.clone().unwrap_or_else(|| {
            self.model_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.model_path.display().to_string())
        })
    }
}

// ==========================================
// LoadedSource - 读取完成、尚未落库的源
// ==========================================
pub struct LoadedSource {
    pub model: ProjectModel,
    pub source_file: String,
    pub file_storage_path: Option<String>,
    pub file_hash: Option<String>,
    /// 对账用 masterplan external_id（模型缺省时为新 UUID）
    pub masterplan_external_id: String,
    /// 模型中的项目名称
    pub masterplan_name: Option<String>,
    /// 新建 masterplan 且模型无名称时使用的文件名
    pub fallback_name: String,
    timings: PhaseTimings,
    started: TotalTimer,
}

impl LoadedSource {
    /// 从内存模型构造（不经过 ProjectReader）
    pub fn from_model(model: ProjectModel, source_file: impl Into<String>) -> Self {
        let source_file = source_file.into();
        let masterplan_external_id = DataCleaner::normalize_null(model.project.external_id.as_deref())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let masterplan_name = DataCleaner::normalize_null(model.project.name.as_deref());
        let fallback_name = file_stem(&source_file);
        Self {
            model,
            source_file,
            file_storage_path: None,
            file_hash: None,
            masterplan_external_id,
            masterplan_name,
            fallback_name,
            timings: PhaseTimings::default(),
            started: TotalTimer::start(),
        }
    }
}

fn file_stem(source_file: &str) -> String {
    Path::new(source_file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| source_file.to_string())
}

/// 计算文件 SHA-256（十六进制）
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ==========================================
// MasterplanImporter - 导入编排器
// ==========================================
pub struct MasterplanImporter {
    conn: Arc<Mutex<Connection>>,
    reader: Arc<dyn ProjectReader>,
    settings: ImportSettings,
    observer: Arc<dyn ImportObserver>,
}

impl MasterplanImporter {
    pub fn new(conn: Arc<Mutex<Connection>>, reader: Arc<dyn ProjectReader>, settings: ImportSettings) -> Self {
        Self {
            conn,
            reader,
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 读取 + 落库
    pub fn import_project(&self, request: ImportRequest) -> ImportResult<ImportReport> {
        let source = self.read_source(request)?;
        self.import_model(source)
    }

    /// 读取源文件（不持有数据库锁；失败时写失败审计）
    pub fn read_source(&self, request: ImportRequest) -> ImportResult<LoadedSource> {
        let started = TotalTimer::start();
        let mut timings = PhaseTimings::default();
        let source_file = request.source_descriptor();

        let timer = PhaseTimer::start(ImportPhase::ReadingSource.as_str());
        let read = self
            .observer
            .on_phase(ImportPhase::ReadingSource)
            .and_then(|()| self.reader.read(&request.model_path));
        timer.stop(&mut timings);

        let model = match read {
            Ok(model) => model,
            Err(e) => {
                let mut report = ImportReport::new(source_file);
                report.file_storage_path = request.file_storage_path.clone();
                report.file_hash = request.file_hash.clone();
                report.timings = timings;
                let conn = self.lock_conn()?;
                return Err(self.abort(&conn, report, ImportPhase::ReadingSource, e, None, &started));
            }
        };

        let file_hash = request.file_hash.clone().or_else(|| match sha256_file(&request.model_path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!(error = %e, "源文件哈希计算失败，审计中留空");
                None
            }
        });

        let mut source = LoadedSource::from_model(model, source_file);
        source.file_storage_path = request.file_storage_path;
        source.file_hash = file_hash;
        source.timings = timings;
        source.started = started;

        info!(
            source_file = %source.source_file,
            masterplan = %source.masterplan_external_id,
            tasks = source.model.tasks.len(),
            resources = source.model.resources.len(),
            "源模型读取完成"
        );
        Ok(source)
    }

    /// 在单一事务内把模型同步到库
    #[instrument(skip(self, source), fields(source_file = %source.source_file, masterplan = %source.masterplan_external_id))]
    pub fn import_model(&self, source: LoadedSource) -> ImportResult<ImportReport> {
        let conn = self.lock_conn()?;

        let mut report = ImportReport::new(source.source_file.clone());
        report.file_storage_path = source.file_storage_path.clone();
        report.file_hash = source.file_hash.clone();
        report.timings = source.timings.clone();
        report.masterplan_external_id = source.masterplan_external_id.clone();
        report.masterplan_name = source
            .masterplan_name
            .clone()
            .unwrap_or_else(|| source.fallback_name.clone());

        let mut phase = ImportPhase::ResolvingMasterplan;

        let pre_existing = match MasterplanRepository::new(&conn).find_id_by_external_id(&source.masterplan_external_id) {
            Ok(id) => id,
            Err(e) => return Err(self.abort(&conn, report, phase, e.into(), None, &source.started)),
        };

        // IMMEDIATE: 开始即取得写锁，多个连接并发写时由 busy_timeout 排队而不是升级死锁
        let tx = match Transaction::new_unchecked(&conn, TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(e) => return Err(self.abort(&conn, report, phase, e.into(), pre_existing, &source.started)),
        };

        let outcome = match self.run_phases(&tx, &source, &mut report, &mut phase) {
            Ok(()) => {
                phase = ImportPhase::Committed;
                tx.commit().map_err(ImportError::from)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(error = %rollback_err, "事务回滚失败");
                }
                Err(e)
            }
        };

        if let Err(e) = outcome {
            // 本次新建的 masterplan 已随事务回滚，审计中不引用
            return Err(self.abort(&conn, report, phase, e, pre_existing, &source.started));
        }

        if let Err(e) = self.observer.on_phase(ImportPhase::Committed) {
            warn!(error = %e, "提交后观察者回调失败（已提交，不影响结果）");
        }
        drop(conn);

        info!(
            masterplan_id = ?report.masterplan_id,
            import_log_id = ?report.import_log_id,
            total_ms = report.timings.total_ms,
            "{}",
            report.summary_line()
        );
        self.save_report(&report);
        Ok(report)
    }

    fn lock_conn(&self) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    fn enter(&self, current: &mut ImportPhase, next: ImportPhase) -> ImportResult<PhaseTimer> {
        *current = next;
        debug!(phase = %next, "进入阶段");
        self.observer.on_phase(next)?;
        Ok(PhaseTimer::start(next.as_str()))
    }

    /// 资源/任务空批次不做删除同步（避免源端缺失整类数据时清空库）
    fn reconcile_guarded(
        reconciler: &SoftDeleteReconciler<'_>,
        kind: EntityKind,
        outcome: &UpsertOutcome,
    ) -> ImportResult<ReconcileOutcome> {
        if outcome.keys.is_empty() {
            warn!(kind = %kind, "本批没有有效记录，跳过删除同步");
            return Ok(ReconcileOutcome::default());
        }
        reconciler.reconcile(kind, &outcome.keys)
    }

    fn run_phases(
        &self,
        tx: &Connection,
        source: &LoadedSource,
        report: &mut ImportReport,
        phase: &mut ImportPhase,
    ) -> ImportResult<()> {
        let model = &source.model;
        let actor = self.settings.created_by;

        // ===== 解析 masterplan 身份 =====
        let timer = self.enter(phase, ImportPhase::ResolvingMasterplan)?;
        let project = &model.project;
        let row = MasterplanRow {
            external_id: source.masterplan_external_id.clone(),
            name: source.masterplan_name.clone(),
            fallback_name: source.fallback_name.clone(),
            start_date: project.start,
            finish_date: project.finish,
            author: DataCleaner::normalize_null(project.author.as_deref()),
            company: DataCleaner::normalize_null(project.company.as_deref()),
            comments: DataCleaner::normalize_null(project.comments.as_deref()),
            creation_date: project.creation_date,
            last_saved: project.last_saved,
        };
        let masterplans = MasterplanRepository::new(tx);
        let (masterplan_id, action) = masterplans.upsert(&row, actor)?;
        if row.name.is_none() {
            if let Some(stored) = masterplans.find_by_id(masterplan_id)? {
                report.masterplan_name = stored.name;
            }
        }
        report.masterplan_id = Some(masterplan_id);
        report.masterplan_action = Some(action);
        report.start_date = row.start_date;
        report.finish_date = row.finish_date;
        report.author = row.author.clone();
        report.company = row.company.clone();
        report.creation_date = row.creation_date;
        report.last_saved = row.last_saved;

        let ctx = UpsertContext::new(tx, masterplan_id, self.settings.chunk_size, actor);
        let reconciler = SoftDeleteReconciler::new(&ctx);

        let (definitions, skipped) = CustomFieldUpserter::new(ctx).upsert(&model.custom_field_definitions)?;
        report.counts.custom_field_definitions = definitions;
        report.counts.skipped += skipped;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, action = %action, definitions, elapsed_ms = ms, "masterplan 身份已解析");

        // ===== 日历 =====
        let timer = self.enter(phase, ImportPhase::UpsertingCalendars)?;
        let calendars = CalendarUpserter::new(ctx).upsert(&model.calendars)?;
        report.counts.calendars = calendars.count;
        report.counts.skipped += calendars.skipped;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, calendars = calendars.count, elapsed_ms = ms, "日历写入完成");

        // ===== 资源 =====
        let timer = self.enter(phase, ImportPhase::UpsertingResources)?;
        let resources = ResourceUpserter::new(ctx).upsert(&model.resources, &calendars.identities)?;
        let sync = Self::reconcile_guarded(&reconciler, EntityKind::Resource, &resources)?;
        report.counts.resources = resources.count;
        report.counts.skipped += resources.skipped;
        report.counts.soft_deleted += sync.soft_deleted;
        report.counts.restored += resources.restored + sync.restored;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, resources = resources.count, soft_deleted = sync.soft_deleted, elapsed_ms = ms, "资源写入完成");

        // ===== 任务 + 依赖 + 任务基线 =====
        let timer = self.enter(phase, ImportPhase::UpsertingTasks)?;
        let tasks = TaskUpserter::new(ctx).upsert(&model.tasks, &calendars.identities)?;
        let sync = Self::reconcile_guarded(&reconciler, EntityKind::Task, &tasks)?;
        report.counts.tasks = tasks.count;
        report.counts.skipped += tasks.skipped;
        report.counts.soft_deleted += sync.soft_deleted;
        report.counts.restored += tasks.restored + sync.restored;

        let dependencies = DependencyUpserter::new(ctx).upsert(&model.dependencies, &tasks.identities)?;
        let sync = reconciler.reconcile(EntityKind::Dependency, &dependencies.keys)?;
        report.counts.dependencies = dependencies.count;
        report.counts.skipped += dependencies.skipped;
        report.counts.soft_deleted += sync.soft_deleted;
        report.counts.restored += dependencies.restored + sync.restored;

        let baselines = BaselineEngine::new(ctx);
        let indices = discover_indices(&model.tasks, self.settings.baseline_sample_size);
        let baseline_ids = baselines.upsert_baselines(&indices, &model.baselines)?;
        report.counts.baselines = baseline_ids.len();
        report.counts.task_baselines = baselines.load_task_baselines(&baseline_ids, &model.tasks, &tasks.identities)?;
        let ms = timer.stop(&mut report.timings);
        info!(
            masterplan_id,
            tasks = tasks.count,
            dependencies = dependencies.count,
            baselines = baseline_ids.len(),
            elapsed_ms = ms,
            "任务写入完成"
        );

        // ===== 分配 =====
        let timer = self.enter(phase, ImportPhase::UpsertingAssignments)?;
        let assignments =
            AssignmentUpserter::new(ctx).upsert(&model.assignments, &tasks.identities, &resources.identities)?;
        let sync = reconciler.reconcile(EntityKind::Assignment, &assignments.keys)?;
        report.counts.assignments = assignments.count;
        report.counts.skipped += assignments.skipped;
        report.counts.soft_deleted += sync.soft_deleted;
        report.counts.restored += assignments.restored + sync.restored;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, assignments = assignments.count, soft_deleted = sync.soft_deleted, elapsed_ms = ms, "分配写入完成");

        // ===== 分时数据 =====
        let timer = self.enter(phase, ImportPhase::LoadingTimephased)?;
        let timephased = TimephasedLoader::new(ctx).load(&model.timephased, &assignments.identities)?;
        report.counts.timephased_segments = timephased.segments;
        report.counts.negative_timephased_values = timephased.negative_values;
        report.counts.skipped += timephased.skipped;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, segments = timephased.segments, negative = timephased.negative_values, elapsed_ms = ms, "分时数据装载完成");

        // ===== 资源基线 =====
        let timer = self.enter(phase, ImportPhase::LoadingBaselines)?;
        report.counts.resource_baselines =
            baselines.load_resource_baselines(&baseline_ids, &model.resources, &resources.identities)?;
        let ms = timer.stop(&mut report.timings);
        info!(masterplan_id, resource_baselines = report.counts.resource_baselines, elapsed_ms = ms, "资源基线装载完成");

        // ===== 审计日志 =====
        let timer = self.enter(phase, ImportPhase::WritingAuditLog)?;
        report.success = true;
        source.started.finish(&mut report.timings);
        let logs = ImportLogRepository::new(tx);
        let log_id = logs.insert(report, actor)?;
        timer.stop(&mut report.timings);
        source.started.finish(&mut report.timings);
        logs.update_timings(log_id, &report.timings)?;
        report.import_log_id = Some(log_id);
        Ok(())
    }

    /// 进入失败状态：尽力写失败审计，返回携带审计 id 的错误
    fn abort(
        &self,
        conn: &Connection,
        mut report: ImportReport,
        phase: ImportPhase,
        err: ImportError,
        masterplan_id: Option<i64>,
        started: &TotalTimer,
    ) -> ImportError {
        error!(phase = %phase, error = %err, "导入失败，全部写入已回滚");
        if let Err(e) = self.observer.on_phase(ImportPhase::Failed) {
            debug!(error = %e, "失败状态观察者回调出错");
        }

        let message = err.to_string();
        report.success = false;
        report.masterplan_id = masterplan_id;
        report.import_log_id = None;
        report.error_message = Some(message.clone());
        started.finish(&mut report.timings);

        let import_log_id = match self.write_failure_audit(conn, &report) {
            Ok(id) => Some(id),
            Err(audit_err) => {
                error!(error = %audit_err, "失败审计写入失败");
                None
            }
        };
        report.import_log_id = import_log_id;
        self.save_report(&report);

        ImportError::Aborted {
            phase,
            import_log_id,
            message,
            source: Box::new(err),
        }
    }

    fn write_failure_audit(&self, conn: &Connection, report: &ImportReport) -> ImportResult<i64> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let id = ImportLogRepository::new(&tx).insert(report, self.settings.created_by)?;
        tx.commit()?;
        Ok(id)
    }

    fn save_report(&self, report: &ImportReport) {
        let Some(dir) = self.settings.report_dir.as_deref() else {
            return;
        };
        match report.save_to_dir(dir) {
            Ok((txt, _)) => debug!(path = %txt.display(), "导入报告已保存"),
            Err(e) => warn!(error = %e, "导入报告保存失败"),
        }
    }
}
