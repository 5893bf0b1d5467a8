// ==========================================
// 项目计划导入 - 任务数据仓储
// ==========================================
// 冲突策略: (masterplan_id, external_id) 活动行存在则更新，否则插入
// ==========================================

use crate::repository::bulk::for_each_chunk;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub external_id: String,
    pub name: String,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub duration: Option<f64>,
    pub work: Option<f64>,
    pub percent_complete: Option<f64>,
    pub priority: Option<i64>,
    pub notes: Option<String>,
    pub wbs: Option<String>,
    pub outline_level: Option<i64>,
    pub is_milestone: bool,
    pub is_summary: bool,
    pub calendar_id: Option<i64>,
    /// JSON 文本
    pub custom_fields: Option<String>,
}

pub struct TaskRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> TaskRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    pub fn upsert_batch(&self, masterplan_id: i64, rows: &[TaskRow], actor: i64) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO task (
                masterplan_id, external_id, name, start_date, finish_date, duration, work,
                percent_complete, priority, notes, wbs, outline_level, is_milestone, is_summary,
                calendar_id, custom_fields, created_by, updated_by
            )
            SELECT ?1,
                   json_extract(value, '$.external_id'),
                   json_extract(value, '$.name'),
                   json_extract(value, '$.start_date'),
                   json_extract(value, '$.finish_date'),
                   json_extract(value, '$.duration'),
                   json_extract(value, '$.work'),
                   json_extract(value, '$.percent_complete'),
                   json_extract(value, '$.priority'),
                   json_extract(value, '$.notes'),
                   json_extract(value, '$.wbs'),
                   json_extract(value, '$.outline_level'),
                   json_extract(value, '$.is_milestone'),
                   json_extract(value, '$.is_summary'),
                   json_extract(value, '$.calendar_id'),
                   json_extract(value, '$.custom_fields'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, external_id) WHERE deleted_at IS NULL DO UPDATE SET
                name = excluded.name,
                start_date = excluded.start_date,
                finish_date = excluded.finish_date,
                duration = excluded.duration,
                work = excluded.work,
                percent_complete = excluded.percent_complete,
                priority = excluded.priority,
                notes = excluded.notes,
                wbs = excluded.wbs,
                outline_level = excluded.outline_level,
                is_milestone = excluded.is_milestone,
                is_summary = excluded.is_summary,
                calendar_id = excluded.calendar_id,
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
