// ==========================================
// 项目计划导入 - 分时数据仓储
// ==========================================
// 红线: 分时数据没有独立身份；本批出现的分配先删全部旧分段再插入
// ==========================================

use crate::domain::types::TimephasedKind;
use crate::repository::bulk::{for_each_chunk, json_array};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TimephasedRow {
    pub assignment_id: i64,
    pub segment_kind: TimephasedKind,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub work: Option<f64>,
    pub cost: Option<f64>,
    pub units: Option<f64>,
}

pub struct TimephasedRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> TimephasedRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    /// 删除给定分配的全部分段
    pub fn delete_for_assignments(&self, assignment_ids: &[i64]) -> RepositoryResult<usize> {
        let mut deleted = 0;
        for chunk in assignment_ids.chunks(self.chunk_size.max(1)) {
            let payload = json_array(chunk)?;
            deleted += self.conn.execute(
                "DELETE FROM timephased_segment WHERE assignment_id IN (SELECT value FROM json_each(?1))",
                params![payload],
            )?;
        }
        Ok(deleted)
    }

    pub fn insert_batch(&self, rows: &[TimephasedRow]) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO timephased_segment (
                assignment_id, segment_kind, period_start, period_end, work, cost, units
            )
            SELECT json_extract(value, '$.assignment_id'),
                   json_extract(value, '$.segment_kind'),
                   json_extract(value, '$.period_start'),
                   json_extract(value, '$.period_end'),
                   json_extract(value, '$.work'),
                   json_extract(value, '$.cost'),
                   json_extract(value, '$.units')
            FROM json_each(?1)
            "#,
        )?;
        for_each_chunk(rows, self.chunk_size, |payload| Ok(stmt.execute(params![payload])?))
    }

    pub fn count_for_assignment(&self, assignment_id: i64) -> RepositoryResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM timephased_segment WHERE assignment_id = ?1",
            params![assignment_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
