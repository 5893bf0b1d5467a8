// ==========================================
// 项目计划导入 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑（去重、引用解析、阶段顺序都在 importer 层）
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化；批量写入以 JSON 数组作为单个参数
// ==========================================

pub mod assignment_repo;
pub mod baseline_repo;
pub mod bulk;
pub mod calendar_repo;
pub mod custom_field_repo;
pub mod dependency_repo;
pub mod error;
pub mod identity_repo;
pub mod import_log_repo;
pub mod masterplan_repo;
pub mod resource_repo;
pub mod soft_delete_repo;
pub mod task_repo;
pub mod timephased_repo;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心仓储
pub use assignment_repo::{AssignmentRepository, AssignmentRow};
pub use baseline_repo::{BaselineRepository, BaselineRow, ResourceBaselineRow, TaskBaselineRow};
pub use bulk::DEFAULT_CHUNK_SIZE;
pub use calendar_repo::{
    CalendarParentLink, CalendarRepository, CalendarRow, ExceptionRow, WeekdayRow, WorkingTimeRow,
};
pub use custom_field_repo::{CustomFieldDefinitionRow, CustomFieldRepository};
pub use dependency_repo::{DependencyRepository, DependencyRow};
pub use error::{RepositoryError, RepositoryResult};
pub use identity_repo::IdentityRepository;
pub use import_log_repo::ImportLogRepository;
pub use masterplan_repo::{MasterplanEntity, MasterplanRepository, MasterplanRow};
pub use resource_repo::{ResourceRepository, ResourceRow};
pub use soft_delete_repo::SoftDeleteRepository;
pub use task_repo::{TaskRepository, TaskRow};
pub use timephased_repo::{TimephasedRepository, TimephasedRow};
