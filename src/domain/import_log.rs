// ==========================================
// 项目计划导入 - 导入审计与报告模型
// ==========================================
// 对齐: schema v0.1 import_log 表
// 红线: import_log 只追加，每次尝试（成功或失败）一行
// ==========================================

use crate::domain::types::{ImportStatus, MasterplanAction};
use crate::perf::PhaseTimings;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportCounts - 各实体写入数量
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub custom_field_definitions: usize,
    pub calendars: usize,
    pub resources: usize,
    pub tasks: usize,
    pub dependencies: usize,
    pub assignments: usize,
    pub baselines: usize,
    pub task_baselines: usize,
    pub resource_baselines: usize,
    pub timephased_segments: usize,
    /// 分时数据中负的工时/成本取值个数（只统计，不拒绝）
    pub negative_timephased_values: usize,
    /// 因缺少主键、引用无法解析、自引用等被跳过的记录数
    pub skipped: usize,
    /// 本次被软删除的行数
    pub soft_deleted: usize,
    /// 本次被恢复的软删除行数
    pub restored: usize,
}

// ==========================================
// ImportReport - 返回给调用方的结构化报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    // ===== 标识 =====
    pub masterplan_id: Option<i64>,
    pub import_log_id: Option<i64>,
    pub source_file: String,
    pub file_storage_path: Option<String>,
    pub file_hash: Option<String>,
    pub imported_at: DateTime<Local>,

    // ===== Masterplan 元数据 =====
    pub masterplan_name: String,
    pub masterplan_external_id: String,
    pub masterplan_action: Option<MasterplanAction>,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub author: Option<String>,
    pub company: Option<String>,
    pub creation_date: Option<NaiveDateTime>,
    pub last_saved: Option<NaiveDateTime>,

    // ===== 统计 =====
    pub counts: ImportCounts,
    pub timings: PhaseTimings,

    // ===== 状态 =====
    pub success: bool,
    pub error_message: Option<String>,
}

impl ImportReport {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            masterplan_id: None,
            import_log_id: None,
            source_file: source_file.into(),
            file_storage_path: None,
            file_hash: None,
            imported_at: Local::now(),
            masterplan_name: String::new(),
            masterplan_external_id: String::new(),
            masterplan_action: None,
            start_date: None,
            finish_date: None,
            author: None,
            company: None,
            creation_date: None,
            last_saved: None,
            counts: ImportCounts::default(),
            timings: PhaseTimings::default(),
            success: false,
            error_message: None,
        }
    }

    pub fn status(&self) -> ImportStatus {
        if self.success {
            ImportStatus::Completed
        } else {
            ImportStatus::Failed
        }
    }

    /// 写入 import_log.stats 的 JSON（分组结构与报告一致）
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::json!({
            "identification": {
                "masterplan_id": self.masterplan_id,
                "source_file": self.source_file,
                "file_storage_path": self.file_storage_path,
                "file_hash": self.file_hash,
                "imported_at": self.imported_at.to_rfc3339(),
            },
            "masterplan": {
                "name": self.masterplan_name,
                "external_id": self.masterplan_external_id,
                "action": self.masterplan_action,
                "start_date": self.start_date,
                "finish_date": self.finish_date,
                "author": self.author,
                "company": self.company,
                "creation_date": self.creation_date,
                "last_saved": self.last_saved,
            },
            "counts": self.counts,
            "status": {
                "success": self.success,
                "error_message": self.error_message,
            },
        })
    }
}

// ==========================================
// ImportLogEntry - import_log 行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub id: i64,
    pub masterplan_id: Option<i64>,
    pub source_file: String,
    pub file_storage_path: Option<String>,
    pub file_hash: Option<String>,
    pub stats: serde_json::Value,
    pub timings: PhaseTimings,
    pub status: ImportStatus,
    pub error_message: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}
