// ==========================================
// 项目计划导入 - 导入层（对账引擎）
// ==========================================
// 职责: 把外部标识的对象图同步到按 masterplan 隔离的关系表
// 流程: 读取 → 身份解析 + 实体 upsert（有序）→ 软删除同步 → 审计 → 提交
// ==========================================

// 模块声明
pub mod assignment_upserter;
pub mod baseline_engine;
pub mod calendar_upserter;
pub mod custom_field_upserter;
pub mod data_cleaner;
pub mod dependency_upserter;
pub mod error;
pub mod identity_resolver;
pub mod model_reader;
pub mod observer;
pub mod orchestrator;
pub mod report;
pub mod resource_upserter;
pub mod soft_delete;
pub mod task_upserter;
pub mod timephased_loader;
pub mod upsert;

// 重导出核心类型
pub use assignment_upserter::AssignmentUpserter;
pub use baseline_engine::{discover_indices, BaselineEngine, BaselineSlot, BASELINE_SLOTS};
pub use calendar_upserter::CalendarUpserter;
pub use custom_field_upserter::CustomFieldUpserter;
pub use data_cleaner::DataCleaner;
pub use dependency_upserter::DependencyUpserter;
pub use error::{ImportError, ImportResult};
pub use identity_resolver::{IdentityMap, IdentityResolver};
pub use model_reader::{JsonProjectReader, ProjectReader};
pub use observer::{ImportObserver, NoopObserver};
pub use orchestrator::{sha256_file, ImportRequest, LoadedSource, MasterplanImporter};
pub use resource_upserter::ResourceUpserter;
pub use soft_delete::{ReconcileOutcome, SoftDeleteReconciler};
pub use task_upserter::TaskUpserter;
pub use timephased_loader::{TimephasedLoader, TimephasedOutcome};
pub use upsert::{UpsertContext, UpsertOutcome};
