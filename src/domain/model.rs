// ==========================================
// 项目计划导入 - 源模型（解析器产出）
// ==========================================
// 职责: 描述解析器协作方交付的纯数据对象图
// 红线: 不含数据访问逻辑；external_id 是跨次导入的对账键
// ==========================================

use crate::domain::types::TimephasedKind;
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// 自定义字段取值（字段名 → 值）
pub type CustomFieldMap = BTreeMap<String, JsonValue>;

// ==========================================
// ProjectModel - 完整对象图
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectModel {
    pub project: ProjectInfo,
    pub calendars: Vec<CalendarRecord>,
    pub resources: Vec<ResourceRecord>,
    pub tasks: Vec<TaskRecord>,
    pub assignments: Vec<AssignmentRecord>,
    pub dependencies: Vec<DependencyRecord>,
    pub baselines: Vec<BaselineMeta>,
    pub timephased: Vec<TimephasedSegment>,
    /// 按实体类别分组（TASK / RESOURCE / ASSIGNMENT ...）
    pub custom_field_definitions: BTreeMap<String, Vec<CustomFieldDefinitionRecord>>,
}

// ==========================================
// ProjectInfo - 项目元数据
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    pub author: Option<String>,
    pub company: Option<String>,
    pub comments: Option<String>,
    pub creation_date: Option<NaiveDateTime>,
    pub last_saved: Option<NaiveDateTime>,
}

// ==========================================
// CalendarRecord - 日历（可有父日历）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarRecord {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub parent_external_id: Option<String>,
    pub weekdays: Vec<WeekdayRecord>,
    pub working_times: Vec<WorkingTimeRecord>,
    pub exceptions: Vec<CalendarExceptionRecord>,
}

/// 工作日标记（weekday: 1=周一 … 7=周日）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayRecord {
    pub weekday: u8,
    pub working: bool,
}

/// 工作时段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingTimeRecord {
    pub weekday: u8,
    pub start: NaiveTime,
    pub finish: NaiveTime,
}

/// 日期例外
///
/// from/to 保留原始文本：区间可能畸形，落库时按天展开或回退为仅起始日
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarExceptionRecord {
    pub name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub working: bool,
}

// ==========================================
// ResourceRecord - 资源
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRecord {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub resource_type: Option<String>,
    pub group: Option<String>,
    pub max_units: Option<f64>,
    pub standard_rate: Option<f64>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub calendar_external_id: Option<String>,
    pub custom_fields: CustomFieldMap,
    /// 基线索引 → 基线值
    pub baselines: BTreeMap<u8, ResourceBaselineValues>,
}

// ==========================================
// TaskRecord - 任务
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    pub duration: Option<f64>,
    pub work: Option<f64>,
    pub percent_complete: Option<f64>,
    pub priority: Option<i64>,
    pub notes: Option<String>,
    pub wbs: Option<String>,
    pub outline_level: Option<i64>,
    pub milestone: bool,
    pub summary: bool,
    pub calendar_external_id: Option<String>,
    pub custom_fields: CustomFieldMap,
    /// 基线索引 → 基线值
    pub baselines: BTreeMap<u8, BaselineValues>,
}

/// 任务基线值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineValues {
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    pub duration: Option<f64>,
    pub work: Option<f64>,
    pub cost: Option<f64>,
}

impl BaselineValues {
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.finish.is_none()
            && self.duration.is_none()
            && self.work.is_none()
            && self.cost.is_none()
    }
}

/// 资源基线值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBaselineValues {
    pub work: Option<f64>,
    pub cost: Option<f64>,
}

impl ResourceBaselineValues {
    pub fn is_empty(&self) -> bool {
        self.work.is_none() && self.cost.is_none()
    }
}

// ==========================================
// AssignmentRecord - 资源分配
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentRecord {
    pub external_id: Option<String>,
    pub task_external_id: Option<String>,
    pub resource_external_id: Option<String>,
    pub work: Option<f64>,
    pub cost: Option<f64>,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    pub units: Option<f64>,
    pub percent_complete: Option<f64>,
    pub custom_fields: CustomFieldMap,
}

// ==========================================
// DependencyRecord - 任务依赖（前置 → 后继）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyRecord {
    pub predecessor_external_id: Option<String>,
    pub successor_external_id: Option<String>,
    /// FS / SS / FF / SF
    pub dependency_type: Option<String>,
    pub lag: Option<f64>,
}

// ==========================================
// BaselineMeta - 基线元数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMeta {
    pub index: u8,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// ==========================================
// TimephasedSegment - 分时数据（按分配）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimephasedSegment {
    pub assignment_external_id: Option<String>,
    pub kind: TimephasedKind,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    #[serde(default)]
    pub work: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub units: Option<f64>,
}

// ==========================================
// CustomFieldDefinitionRecord - 自定义字段定义
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldDefinitionRecord {
    /// 字段槽位（如 TEXT1 / NUMBER3）
    pub field_type: Option<String>,
    pub alias: Option<String>,
    pub data_type: Option<String>,
}
