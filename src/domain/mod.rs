// ==========================================
// 项目计划导入 - 领域模型层
// ==========================================
// 职责: 定义源模型、领域类型、导入报告
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod import_log;
pub mod model;
pub mod types;

// 重导出核心类型
pub use import_log::{ImportCounts, ImportLogEntry, ImportReport};
pub use model::{
    AssignmentRecord, BaselineMeta, BaselineValues, CalendarExceptionRecord, CalendarRecord,
    CustomFieldDefinitionRecord, CustomFieldMap, DependencyRecord, ProjectInfo, ProjectModel,
    ResourceBaselineValues, ResourceRecord, TaskRecord, TimephasedSegment, WeekdayRecord,
    WorkingTimeRecord,
};
pub use types::{EntityKind, ImportPhase, ImportStatus, MasterplanAction, TimephasedKind};
