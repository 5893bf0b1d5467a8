// ==========================================
// 项目计划导入 - 任务依赖数据仓储
// ==========================================
// 唯一键: (masterplan_id, predecessor_task_id, successor_task_id) 有序对，仅约束活动行
// ==========================================

use crate::repository::bulk::for_each_chunk;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DependencyRow {
    pub predecessor_task_id: i64,
    pub successor_task_id: i64,
    pub dependency_type: Option<String>,
    pub lag: Option<f64>,
}

impl DependencyRow {
    /// 对账键（与 EntityKind::Dependency 的键表达式一致）
    pub fn key(&self) -> String {
        format!("{}:{}", self.predecessor_task_id, self.successor_task_id)
    }
}

pub struct DependencyRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> DependencyRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    pub fn upsert_batch(&self, masterplan_id: i64, rows: &[DependencyRow], actor: i64) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO task_dependency (
                masterplan_id, predecessor_task_id, successor_task_id, dependency_type, lag,
                created_by, updated_by
            )
            SELECT ?1,
                   json_extract(value, '$.predecessor_task_id'),
                   json_extract(value, '$.successor_task_id'),
                   json_extract(value, '$.dependency_type'),
                   json_extract(value, '$.lag'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, predecessor_task_id, successor_task_id)
                WHERE deleted_at IS NULL DO UPDATE SET
                dependency_type = excluded.dependency_type,
                lag = excluded.lag,
                updated_by = excluded.updated_by,
                updated_at = datetime('now')
            "#,
        )?;

        for_each_chunk(rows, self.chunk_size, |payload| {
            Ok(stmt.execute(params![masterplan_id, actor, payload])?)
        })
    }
}
