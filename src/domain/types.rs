// ==========================================
// 项目计划导入 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体种类 (Entity Kind)
// ==========================================
// 每种实体对应一张表；可软删除的种类带 deleted_at 列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Calendar,
    Resource,
    Task,
    Assignment,
    Dependency,
    Baseline,
    CustomFieldDefinition,
}

impl EntityKind {
    /// 对应表名
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Calendar => "calendar",
            EntityKind::Resource => "resource",
            EntityKind::Task => "task",
            EntityKind::Assignment => "assignment",
            EntityKind::Dependency => "task_dependency",
            EntityKind::Baseline => "baseline",
            EntityKind::CustomFieldDefinition => "custom_field_definition",
        }
    }

    /// 是否参与软删除同步
    ///
    /// masterplan / 日历 / 基线 / 自定义字段定义从不删除
    pub fn soft_deletable(&self) -> bool {
        matches!(
            self,
            EntityKind::Resource | EntityKind::Task | EntityKind::Assignment | EntityKind::Dependency
        )
    }

    /// 对账键的 SQL 表达式
    ///
    /// 依赖没有 external_id，以有序任务对 `pred:succ` 作为键
    pub fn key_expr(&self, alias: &str) -> String {
        match self {
            EntityKind::Dependency => format!(
                "({a}.predecessor_task_id || ':' || {a}.successor_task_id)",
                a = alias
            ),
            EntityKind::Baseline => format!("CAST({}.baseline_index AS TEXT)", alias),
            EntityKind::CustomFieldDefinition => {
                format!("({a}.field_class || ':' || {a}.field_type)", a = alias)
            }
            _ => format!("{}.external_id", alias),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

// ==========================================
// Masterplan 动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasterplanAction {
    Created,
    Updated,
}

impl fmt::Display for MasterplanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterplanAction::Created => write!(f, "created"),
            MasterplanAction::Updated => write!(f, "updated"),
        }
    }
}

// ==========================================
// 导入状态（import_log.status）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 导入阶段（状态机）
// ==========================================
// 顺序固定：每一步依赖前一步产出的身份映射
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    ReadingSource,
    ResolvingMasterplan,
    UpsertingCalendars,
    UpsertingResources,
    UpsertingTasks,
    UpsertingAssignments,
    LoadingTimephased,
    LoadingBaselines,
    WritingAuditLog,
    Committed,
    Failed,
}

impl ImportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::ReadingSource => "reading_source",
            ImportPhase::ResolvingMasterplan => "resolving_masterplan",
            ImportPhase::UpsertingCalendars => "upserting_calendars",
            ImportPhase::UpsertingResources => "upserting_resources",
            ImportPhase::UpsertingTasks => "upserting_tasks",
            ImportPhase::UpsertingAssignments => "upserting_assignments",
            ImportPhase::LoadingTimephased => "loading_timephased",
            ImportPhase::LoadingBaselines => "loading_baselines",
            ImportPhase::WritingAuditLog => "writing_audit_log",
            ImportPhase::Committed => "committed",
            ImportPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 分时数据种类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimephasedKind {
    Planned,
    Actual,
}

impl TimephasedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimephasedKind::Planned => "PLANNED",
            TimephasedKind::Actual => "ACTUAL",
        }
    }
}

impl fmt::Display for TimephasedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
