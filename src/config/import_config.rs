// ==========================================
// 项目计划导入 - 导入配置
// ==========================================
// 来源: 进程环境变量 + 可选 .env 文件（dotenvy）
// 红线: 配置错误在启动时报告，不在单次导入中出现
// ==========================================

use crate::repository::bulk::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use thiserror::Error;

// ===== 环境变量名 =====
pub const ENV_DB_PATH: &str = "MASTERPLAN_DB_PATH";
pub const ENV_CHUNK_SIZE: &str = "MASTERPLAN_IMPORT_CHUNK_SIZE";
pub const ENV_BASELINE_SAMPLE: &str = "MASTERPLAN_BASELINE_SAMPLE";
pub const ENV_CREATED_BY: &str = "MASTERPLAN_CREATED_BY";
pub const ENV_REPORT_DIR: &str = "MASTERPLAN_REPORT_DIR";
pub const ENV_MAX_CONCURRENT: &str = "MASTERPLAN_MAX_CONCURRENT";

pub const DEFAULT_CREATED_BY: i64 = 1;
pub const DEFAULT_MAX_CONCURRENT_IMPORTS: usize = 4;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("缺少数据库连接配置: 请设置 {0}")]
    MissingStoreConnection(&'static str),

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: String,
}

/// 单次导入使用的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// 批量写入分块大小
    pub chunk_size: usize,
    /// 基线探测抽样任务数；0 = 全量扫描
    pub baseline_sample_size: usize,
    /// 写入 created_by / updated_by 的操作者 id
    pub created_by: i64,
    /// 报告输出目录；None 表示不落盘
    pub report_dir: Option<PathBuf>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            baseline_sample_size: 0,
            created_by: DEFAULT_CREATED_BY,
            report_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub store: StoreConfig,
    pub settings: ImportSettings,
    pub max_concurrent_imports: usize,
}

impl ImportConfig {
    /// 从进程环境加载（先读取 .env，文件不存在不算错误）
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("读取 .env 失败: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = match get(ENV_DB_PATH) {
            Some(path) => path,
            None => default_db_path()
                .ok_or(ConfigError::MissingStoreConnection(ENV_DB_PATH))?,
        };

        let chunk_size = parse_usize(ENV_CHUNK_SIZE, get(ENV_CHUNK_SIZE), DEFAULT_CHUNK_SIZE)?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_CHUNK_SIZE,
                value: "0".to_string(),
                message: "分块大小必须大于 0".to_string(),
            });
        }

        let max_concurrent_imports = parse_usize(
            ENV_MAX_CONCURRENT,
            get(ENV_MAX_CONCURRENT),
            DEFAULT_MAX_CONCURRENT_IMPORTS,
        )?
        .max(1);

        let created_by = match get(ENV_CREATED_BY) {
            Some(v) => v.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_CREATED_BY,
                value: v.clone(),
                message: e.to_string(),
            })?,
            None => DEFAULT_CREATED_BY,
        };

        Ok(Self {
            store: StoreConfig { db_path },
            settings: ImportSettings {
                chunk_size,
                baseline_sample_size: parse_usize(ENV_BASELINE_SAMPLE, get(ENV_BASELINE_SAMPLE), 0)?,
                created_by,
                report_dir: get(ENV_REPORT_DIR).map(PathBuf::from),
            },
            max_concurrent_imports,
        })
    }
}

fn parse_usize(key: &'static str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    match value {
        Some(v) => v.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
            key,
            value: v.clone(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// 默认数据库路径: 用户数据目录/masterplan-import/masterplan.db
fn default_db_path() -> Option<String> {
    let dir = dirs::data_dir()?.join("masterplan-import");
    // 目录创建失败时留给打开数据库时报错
    std::fs::create_dir_all(&dir).ok();
    Some(dir.join("masterplan.db").to_string_lossy().to_string())
}
