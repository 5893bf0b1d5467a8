// ==========================================
// 项目计划导入 - 自定义字段定义仓储
// ==========================================
// 唯一键: (masterplan_id, field_type, field_class)；定义从不删除
// ==========================================

use crate::repository::bulk::for_each_chunk;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldDefinitionRow {
    pub field_class: String,
    pub field_type: String,
    pub alias: Option<String>,
    pub data_type: String,
}

pub struct CustomFieldRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> CustomFieldRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    pub fn upsert_batch(
        &self,
        masterplan_id: i64,
        rows: &[CustomFieldDefinitionRow],
        actor: i64,
    ) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO custom_field_definition (
                masterplan_id, field_type, field_class, alias, data_type, created_by, updated_by
            )
            SELECT ?1,
                   json_extract(value, '$.field_type'),
                   json_extract(value, '$.field_class'),
                   json_extract(value, '$.alias'),
                   json_extract(value, '$.data_type'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, field_type, field_class) DO UPDATE SET
                alias = excluded.alias,
                data_type = excluded.data_type,
                updated_by = excluded.updated_by,
                updated_at = datetime('now')
            "#,
        )?;

        for_each_chunk(rows, self.chunk_size, |payload| {
            Ok(stmt.execute(params![masterplan_id, actor, payload])?)
        })
    }
}
