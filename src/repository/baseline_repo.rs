// ==========================================
// 项目计划导入 - 基线数据仓储
// ==========================================
// 职责: baseline 行 upsert；task_baseline / resource_baseline 按基线整体替换
// 红线: 基线行从不删除；只为实际出现数据的索引建行
// ==========================================

use crate::repository::bulk::{for_each_chunk, json_array};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct BaselineRow {
    pub baseline_index: u8,
    pub external_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskBaselineRow {
    pub baseline_id: i64,
    pub task_id: i64,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub duration: Option<f64>,
    pub work: Option<f64>,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceBaselineRow {
    pub baseline_id: i64,
    pub resource_id: i64,
    pub work: Option<f64>,
    pub cost: Option<f64>,
}

pub struct BaselineRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> BaselineRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    /// upsert 基线行，返回 baseline_index → baseline.id
    pub fn upsert_baselines(
        &self,
        masterplan_id: i64,
        rows: &[BaselineRow],
        actor: i64,
    ) -> RepositoryResult<BTreeMap<u8, i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO baseline (masterplan_id, baseline_index, external_id, name, created_by, updated_by)
            SELECT ?1,
                   json_extract(value, '$.baseline_index'),
                   json_extract(value, '$.external_id'),
                   json_extract(value, '$.name'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, baseline_index) DO UPDATE SET
                external_id = COALESCE(excluded.external_id, baseline.external_id),
                name = excluded.name,
                updated_by = excluded.updated_by,
                updated_at = datetime('now')
            "#,
        )?;
        for_each_chunk(rows, self.chunk_size, |payload| {
            Ok(stmt.execute(params![masterplan_id, actor, payload])?)
        })?;

        self.ids_by_index(masterplan_id)
    }

    /// masterplan 下全部基线的 index → id
    pub fn ids_by_index(&self, masterplan_id: i64) -> RepositoryResult<BTreeMap<u8, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT baseline_index, id FROM baseline WHERE masterplan_id = ?1")?;
        let rows = stmt.query_map(params![masterplan_id], |row| {
            Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (index, id) = row?;
            map.insert(index, id);
        }
        Ok(map)
    }

    /// 替换指定基线下的任务基线值
    pub fn replace_task_baselines(&self, baseline_ids: &[i64], rows: &[TaskBaselineRow]) -> RepositoryResult<usize> {
        self.delete_by_baselines("task_baseline", baseline_ids)?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO task_baseline (baseline_id, task_id, start_date, finish_date, duration, work, cost)
            SELECT json_extract(value, '$.baseline_id'),
                   json_extract(value, '$.task_id'),
                   json_extract(value, '$.start_date'),
                   json_extract(value, '$.finish_date'),
                   json_extract(value, '$.duration'),
                   json_extract(value, '$.work'),
                   json_extract(value, '$.cost')
            FROM json_each(?1) WHERE true
            ON CONFLICT (baseline_id, task_id) DO UPDATE SET
                start_date = excluded.start_date,
                finish_date = excluded.finish_date,
                duration = excluded.duration,
                work = excluded.work,
                cost = excluded.cost
            "#,
        )?;
        for_each_chunk(rows, self.chunk_size, |payload| Ok(stmt.execute(params![payload])?))
    }

    /// 替换指定基线下的资源基线值
    pub fn replace_resource_baselines(
        &self,
        baseline_ids: &[i64],
        rows: &[ResourceBaselineRow],
    ) -> RepositoryResult<usize> {
        self.delete_by_baselines("resource_baseline", baseline_ids)?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO resource_baseline (baseline_id, resource_id, work, cost)
            SELECT json_extract(value, '$.baseline_id'),
                   json_extract(value, '$.resource_id'),
                   json_extract(value, '$.work'),
                   json_extract(value, '$.cost')
            FROM json_each(?1) WHERE true
            ON CONFLICT (baseline_id, resource_id) DO UPDATE SET
                work = excluded.work,
                cost = excluded.cost
            "#,
        )?;
        for_each_chunk(rows, self.chunk_size, |payload| Ok(stmt.execute(params![payload])?))
    }

    fn delete_by_baselines(&self, table: &str, baseline_ids: &[i64]) -> RepositoryResult<usize> {
        if baseline_ids.is_empty() {
            return Ok(0);
        }
        let payload = json_array(baseline_ids)?;
        let n = self.conn.execute(
            &format!("DELETE FROM {table} WHERE baseline_id IN (SELECT value FROM json_each(?1))"),
            params![payload],
        )?;
        Ok(n)
    }
}
