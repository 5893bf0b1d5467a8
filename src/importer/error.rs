// ==========================================
// 项目计划导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 可跳过的记录问题不在这里（记录被丢弃并计数）
// - 事务性失败以 Aborted 返回给调用方，带失败审计行 id
// ==========================================

use crate::config::ConfigError;
use crate::domain::types::ImportPhase;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 源文件相关错误 =====
    #[error("源文件不存在: {0}")]
    SourceNotFound(String),

    #[error("源文件读取失败: {0}")]
    SourceRead(#[from] std::io::Error),

    #[error("项目模型解析失败: {0}")]
    ModelParse(#[from] serde_json::Error),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("数据库操作失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    // ===== 配置/任务错误 =====
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("导入任务消息无效: {0}")]
    InvalidJob(String),

    // ===== 事务性失败 =====
    #[error("导入在阶段 {phase} 失败 (import_log_id={import_log_id:?}): {message}")]
    Aborted {
        phase: ImportPhase,
        import_log_id: Option<i64>,
        message: String,
        #[source]
        source: Box<ImportError>,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 失败审计行 id（仅 Aborted 携带）
    pub fn import_log_id(&self) -> Option<i64> {
        match self {
            ImportError::Aborted { import_log_id, .. } => *import_log_id,
            _ => None,
        }
    }

    /// 失败阶段（仅 Aborted 携带）
    pub fn phase(&self) -> Option<ImportPhase> {
        match self {
            ImportError::Aborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
