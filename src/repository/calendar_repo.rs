// ==========================================
// 项目计划导入 - 日历数据仓储
// ==========================================
// 职责: 日历行 upsert、父日历链接、子表（工作日/工作时段/例外）整体替换
// 红线: 日历从不删除；子表没有独立身份，先删后插
// ==========================================

use crate::repository::bulk::{for_each_chunk, json_array};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct CalendarRow {
    pub external_id: String,
    pub name: String,
}

/// 父链接（parent_id 为 None 表示清除父日历）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarParentLink {
    pub id: i64,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekdayRow {
    pub calendar_id: i64,
    pub weekday: u8,
    pub working: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkingTimeRow {
    pub calendar_id: i64,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionRow {
    pub calendar_id: i64,
    pub exception_date: NaiveDate,
    pub name: Option<String>,
    pub working: bool,
}

pub struct CalendarRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> CalendarRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    /// 第一遍：不带父链接的 upsert（已有行只更新名称，父链接保持不动）
    pub fn upsert_without_parent(
        &self,
        masterplan_id: i64,
        rows: &[CalendarRow],
        actor: i64,
    ) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO calendar (masterplan_id, external_id, name, created_by, updated_by)
            SELECT ?1,
                   json_extract(value, '$.external_id'),
                   json_extract(value, '$.name'),
                   ?2, ?2
            FROM json_each(?3) WHERE true
            ON CONFLICT (masterplan_id, external_id) DO UPDATE SET
                name = excluded.name,
                updated_by = excluded.updated_by,
                updated_at = datetime('now')
            "#,
        )?;

        for_each_chunk(rows, self.chunk_size, |payload| {
            Ok(stmt.execute(params![masterplan_id, actor, payload])?)
        })
    }

    /// 读取 masterplan 下现有父链接（id → parent_id）
    pub fn load_parent_links(&self, masterplan_id: i64) -> RepositoryResult<HashMap<i64, Option<i64>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, parent_calendar_id FROM calendar WHERE masterplan_id = ?1")?;
        let rows = stmt.query_map(params![masterplan_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?))
        })?;

        let mut links = HashMap::new();
        for row in rows {
            let (id, parent) = row?;
            links.insert(id, parent);
        }
        Ok(links)
    }

    /// 第二遍：写入父链接
    pub fn apply_parent_links(&self, links: &[CalendarParentLink], actor: i64) -> RepositoryResult<usize> {
        let mut stmt = self.conn.prepare(
            r#"
            UPDATE calendar SET
                parent_calendar_id = (
                    SELECT json_extract(l.value, '$.parent_id')
                    FROM json_each(?1) l
                    WHERE json_extract(l.value, '$.id') = calendar.id
                ),
                updated_by = ?2,
                updated_at = datetime('now')
            WHERE id IN (SELECT json_extract(value, '$.id') FROM json_each(?1))
            "#,
        )?;

        for_each_chunk(links, self.chunk_size, |payload| {
            Ok(stmt.execute(params![payload, actor])?)
        })
    }

    /// 第三遍：整体替换子表
    ///
    /// 先按 calendar_id 删除三张子表的全部行，再批量插入本批数据
    pub fn replace_details(
        &self,
        calendar_ids: &[i64],
        weekdays: &[WeekdayRow],
        working_times: &[WorkingTimeRow],
        exceptions: &[ExceptionRow],
    ) -> RepositoryResult<usize> {
        if calendar_ids.is_empty() {
            return Ok(0);
        }

        for chunk in calendar_ids.chunks(self.chunk_size.max(1)) {
            let ids = json_array(chunk)?;
            for table in ["calendar_weekday", "calendar_working_time", "calendar_exception"] {
                self.conn.execute(
                    &format!(
                        "DELETE FROM {table} WHERE calendar_id IN (SELECT value FROM json_each(?1))"
                    ),
                    params![ids],
                )?;
            }
        }

        let mut inserted = 0;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO calendar_weekday (calendar_id, weekday, working)
            SELECT json_extract(value, '$.calendar_id'),
                   json_extract(value, '$.weekday'),
                   json_extract(value, '$.working')
            FROM json_each(?1) WHERE true
            ON CONFLICT (calendar_id, weekday) DO UPDATE SET working = excluded.working
            "#,
        )?;
        inserted += for_each_chunk(weekdays, self.chunk_size, |payload| {
            Ok(stmt.execute(params![payload])?)
        })?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO calendar_working_time (calendar_id, weekday, start_time, end_time)
            SELECT json_extract(value, '$.calendar_id'),
                   json_extract(value, '$.weekday'),
                   json_extract(value, '$.start_time'),
                   json_extract(value, '$.end_time')
            FROM json_each(?1)
            "#,
        )?;
        inserted += for_each_chunk(working_times, self.chunk_size, |payload| {
            Ok(stmt.execute(params![payload])?)
        })?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO calendar_exception (calendar_id, exception_date, name, working)
            SELECT json_extract(value, '$.calendar_id'),
                   json_extract(value, '$.exception_date'),
                   json_extract(value, '$.name'),
                   json_extract(value, '$.working')
            FROM json_each(?1)
            "#,
        )?;
        inserted += for_each_chunk(exceptions, self.chunk_size, |payload| {
            Ok(stmt.execute(params![payload])?)
        })?;

        Ok(inserted)
    }
}
