// ==========================================
// 项目计划导入 - 配置层
// ==========================================
// 职责: 启动时加载存储连接与导入参数
// 存储: 环境变量 / .env
// ==========================================

pub mod import_config;

pub use import_config::{ConfigError, ImportConfig, ImportSettings, StoreConfig};
