// ==========================================
// 项目计划导入 - 实体 upsert 公共约定
// ==========================================
// 契约: upsert(masterplan_id, records) -> (count, identity_map)
// - 缺少自然键（external_id / name）的记录静默跳过并计数
// - 同批同键以后出现者为准
// - 每个分块一条原子 insert-or-update 语句
// ==========================================

use crate::importer::identity_resolver::IdentityMap;
use rusqlite::Connection;

/// 单次导入内所有 upserter 共享的上下文
#[derive(Clone, Copy)]
pub struct UpsertContext<'a> {
    pub conn: &'a Connection,
    pub masterplan_id: i64,
    pub chunk_size: usize,
    /// created_by / updated_by
    pub actor: i64,
}

impl<'a> UpsertContext<'a> {
    pub fn new(conn: &'a Connection, masterplan_id: i64, chunk_size: usize, actor: i64) -> Self {
        Self {
            conn,
            masterplan_id,
            chunk_size,
            actor,
        }
    }
}

/// upsert 结果
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    /// 写入（插入或更新）的记录数
    pub count: usize,
    /// 被跳过的记录数
    pub skipped: usize,
    /// upsert 前恢复的软删除行数
    pub restored: usize,
    /// 本批对账键（去重后，写入顺序）
    pub keys: Vec<String>,
    /// 本批键的身份映射
    pub identities: IdentityMap,
}
