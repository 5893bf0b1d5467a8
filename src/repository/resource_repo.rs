// ==========================================
// 项目计划导入 - 资源数据仓储
// ==========================================
// 冲突策略: (masterplan_id, external_id) 活动行存在则更新，否则插入
// ==========================================

use crate::repository::bulk::for_each_chunk;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRow {
    pub external_id: String,
    pub name: String,
    pub email: Option<String>,
    pub resource_type: Option<String>,
    pub group_name: Option<String>,
    pub max_units: Option<f64>,
    pub standard_rate: Option<f64>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
    pub calendar_id: Option<i64>,
    /// JSON 文本
    pub custom_fields: Option<String>,
}

pub struct ResourceRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> ResourceRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    pub fn upsert_batch(&self, masterplan_id: i64, rows: &[ResourceRow], actor: i64) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO resource (
                masterplan_id, external_id, name, email, resource_type, group_name,
                max_units, standard_rate, cost, notes, calendar_id, custom_fields,
                created_by, updated_by
            )
            SELECT ?1,
                   json_extract(value, '$.external_id'),
                   json_extract(value, '$.name'),
                   json_extract(value, '$.email'),
                   json_extract(value, '$.resource_type'),
                   json_extract(value, '$.group_name'),
                   json_extract(value, '$.max_units'),
                   json_extract(value, '$.standard_rate'),
                   json_extract(value, '$.cost'),
                   json_extract(value, '$.notes'),
                   json_extract(value, '$.calendar_id'),
                   json_extract(value, '$.custom_fields'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, external_id) WHERE deleted_at IS NULL DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                resource_type = excluded.resource_type,
                group_name = excluded.group_name,
                max_units = excluded.max_units,
                standard_rate = excluded.standard_rate,
                cost = excluded.cost,
                notes = excluded.notes,
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
