// ==========================================
// 项目计划导入 - Masterplan 数据仓储
// ==========================================
// 红线: masterplan 从不删除；字段合并规则 = 新值非空则覆盖，空值保留库中旧值
// ==========================================

use crate::domain::types::MasterplanAction;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ==========================================
// MasterplanRow - 写入行
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterplanRow {
    pub external_id: String,
    /// 模型中的名称；缺省时更新保留库中名称
    pub name: Option<String>,
    /// 仅在新建时使用的名称（通常为源文件名）
    pub fallback_name: String,
    pub start_date: Option<NaiveDateTime>,
    pub finish_date: Option<NaiveDateTime>,
    pub author: Option<String>,
    pub company: Option<String>,
    pub comments: Option<String>,
    pub creation_date: Option<NaiveDateTime>,
    pub last_saved: Option<NaiveDateTime>,
}

// ==========================================
// MasterplanEntity - 读取行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterplanEntity {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub start_date: Option<String>,
    pub finish_date: Option<String>,
    pub author: Option<String>,
    pub company: Option<String>,
    pub comments: Option<String>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
}

pub struct MasterplanRepository<'a> {
    conn: &'a Connection,
}

fn fmt_ts(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl<'a> MasterplanRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn find_id_by_external_id(&self, external_id: &str) -> RepositoryResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM masterplan WHERE external_id = ?1 LIMIT 1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// 按 external_id 创建或合并更新
    ///
    /// # 返回
    /// - (masterplan_id, Created | Updated)
    pub fn upsert(&self, row: &MasterplanRow, actor: i64) -> RepositoryResult<(i64, MasterplanAction)> {
        if let Some(id) = self.find_id_by_external_id(&row.external_id)? {
            self.conn.execute(
                r#"
                UPDATE masterplan SET
                    name = COALESCE(?1, name),
                    start_date = COALESCE(?2, start_date),
                    finish_date = COALESCE(?3, finish_date),
                    author = COALESCE(?4, author),
                    company = COALESCE(?5, company),
                    comments = COALESCE(?6, comments),
                    creation_date = COALESCE(?7, creation_date),
                    last_saved = COALESCE(?8, last_saved),
                    updated_at = datetime('now'),
                    updated_by = ?9
                WHERE id = ?10
                "#,
                params![
                    row.name,
                    fmt_ts(&row.start_date),
                    fmt_ts(&row.finish_date),
                    row.author,
                    row.company,
                    row.comments,
                    fmt_ts(&row.creation_date),
                    fmt_ts(&row.last_saved),
                    actor,
                    id,
                ],
            )?;
            return Ok((id, MasterplanAction::Updated));
        }

        self.conn.execute(
            r#"
            INSERT INTO masterplan (
                external_id, name, start_date, finish_date, author, company, comments,
                creation_date, last_saved, created_by, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
            params![
                row.external_id,
                row.name.as_deref().unwrap_or(&row.fallback_name),
                fmt_ts(&row.start_date),
                fmt_ts(&row.finish_date),
                row.author,
                row.company,
                row.comments,
                fmt_ts(&row.creation_date),
                fmt_ts(&row.last_saved),
                actor,
            ],
        )?;
        Ok((self.conn.last_insert_rowid(), MasterplanAction::Created))
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MasterplanEntity>> {
        let entity = self
            .conn
            .query_row(
                r#"
                SELECT id, external_id, name, start_date, finish_date, author, company,
                       comments, created_by, updated_by
                FROM masterplan WHERE id = ?1
                "#,
                params![id],
                |row| {
                    Ok(MasterplanEntity {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        name: row.get(2)?,
                        start_date: row.get(3)?,
                        finish_date: row.get(4)?,
                        author: row.get(5)?,
                        company: row.get(6)?,
                        comments: row.get(7)?,
                        created_by: row.get(8)?,
                        updated_by: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }
}
