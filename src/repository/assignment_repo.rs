// ==========================================
// 项目计划导入 - 资源分配数据仓储
// ==========================================
// 冲突策略: (masterplan_id, external_id) 活动行存在则更新，否则插入
// ==========================================

use crate::repository::bulk::for_each_chunk;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRow {
    pub external_id: String,
    pub task_id: i64,
    pub resource_id: i64,
    pub work: Option<f64>,
    pub cost: Option<f64>,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub units: Option<f64>,
    pub percent_complete: Option<f64>,
    /// JSON 文本
    pub custom_fields: Option<String>,
}

pub struct AssignmentRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> AssignmentRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    pub fn upsert_batch(&self, masterplan_id: i64, rows: &[AssignmentRow], actor: i64) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO assignment (
                masterplan_id, external_id, task_id, resource_id, work, cost, start_date,
                finish_date, units, percent_complete, custom_fields, created_by, updated_by
            )
            SELECT ?1,
                   json_extract(value, '$.external_id'),
                   json_extract(value, '$.task_id'),
                   json_extract(value, '$.resource_id'),
                   json_extract(value, '$.work'),
                   json_extract(value, '$.cost'),
                   json_extract(value, '$.start_date'),
                   json_extract(value, '$.finish_date'),
                   json_extract(value, '$.units'),
                   json_extract(value, '$.percent_complete'),
                   json_extract(value, '$.custom_fields'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, external_id) WHERE deleted_at IS NULL DO UPDATE SET
                task_id = excluded.task_id,
                resource_id = excluded.resource_id,
                work = excluded.work,
                cost = excluded.cost,
                start_date = excluded.start_date,
                finish_date = excluded.finish_date,
                units = excluded.units,
                percent_complete = excluded.percent_complete,
                custom_fields = excluded.custom_fields,
                updated_by = excluded.updated_by,
                updated_at = datetime('now')
            "#,
        )?;

        for_each_chunk(rows, self.chunk_size, |payload| {
            Ok(stmt.execute(params![masterplan_id, actor, payload])?)
        })
    }
}
