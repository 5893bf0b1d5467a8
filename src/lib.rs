// ==========================================
// 项目计划导入引擎 - 核心库
// ==========================================
// 职责: 把解析器产出的项目计划对象图幂等同步到按 masterplan 隔离的关系库
// 技术栈: Rust + SQLite (rusqlite)
// 保证: 单次导入整体提交或整体回滚；重复导入同一文件结果不变
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 源模型与报告
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 对账引擎
pub mod importer;

// 配置层 - 存储连接与导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 阶段计时与 SQL 追踪
pub mod perf;

// 并发导入服务
pub mod service;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EntityKind, ImportPhase, ImportStatus, MasterplanAction, TimephasedKind};

// 领域实体
pub use domain::{ImportCounts, ImportLogEntry, ImportReport, ProjectModel};

// 导入引擎
pub use importer::{
    ImportError, ImportObserver, ImportRequest, ImportResult, JsonProjectReader, LoadedSource,
    MasterplanImporter, ProjectReader,
};

// 配置
pub use config::{ImportConfig, ImportSettings};

// 服务
pub use service::{ImportJob, ImportService};

// ==========================================
// 常量定义
// ==========================================

// 引擎版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
