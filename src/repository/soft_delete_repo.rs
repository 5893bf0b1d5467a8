// ==========================================
// 项目计划导入 - 软删除同步仓储
// ==========================================
// 职责:
// - 恢复：本批重新出现、且没有活动行的键，取最近一条软删除行清空 deleted_at
// - 标记：masterplan 下不在本批键集合中的活动行写入 deleted_at
// 红线: 只作用于可软删除实体，且只作用于给定 masterplan；从不物理删除
// ==========================================

use crate::domain::types::EntityKind;
use crate::repository::bulk::json_array;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};

pub struct SoftDeleteRepository<'a> {
    conn: &'a Connection,
    chunk_size: usize,
}

impl<'a> SoftDeleteRepository<'a> {
    pub fn new(conn: &'a Connection, chunk_size: usize) -> Self {
        Self { conn, chunk_size }
    }

    fn ensure_soft_deletable(kind: EntityKind) -> RepositoryResult<()> {
        if kind.soft_deletable() {
            Ok(())
        } else {
            Err(RepositoryError::InternalError(format!("实体 {} 不支持软删除", kind)))
        }
    }

    /// 恢复本批重新出现的软删除行
    ///
    /// 同一键有多条软删除行时只恢复 id 最大的一条；已有活动行的键不动
    pub fn restore_reappearing(
        &self,
        kind: EntityKind,
        masterplan_id: i64,
        keys: &[String],
    ) -> RepositoryResult<usize> {
        Self::ensure_soft_deletable(kind)?;
        if keys.is_empty() {
            return Ok(0);
        }

        let table = kind.table();
        let key_t = kind.key_expr("t");
        let key_a = kind.key_expr("a");
        let sql = format!(
            r#"
            UPDATE {table} SET deleted_at = NULL, updated_at = datetime('now')
            WHERE id IN (
                SELECT MAX(t.id) FROM {table} t
                WHERE t.masterplan_id = ?1
                  AND t.deleted_at IS NOT NULL
                  AND {key_t} IN (SELECT value FROM json_each(?2))
                  AND NOT EXISTS (
                      SELECT 1 FROM {table} a
                      WHERE a.masterplan_id = t.masterplan_id
                        AND a.deleted_at IS NULL
                        AND {key_a} = {key_t}
                  )
                GROUP BY {key_t}
            )
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut restored = 0;
        for chunk in keys.chunks(self.chunk_size.max(1)) {
            let payload = json_array(chunk)?;
            restored += stmt.execute(params![masterplan_id, payload])?;
        }
        Ok(restored)
    }

    /// 软删除不在本批键集合中的活动行
    ///
    /// 键集合作为一个 JSON 参数绑定，不受宿主参数个数限制
    pub fn mark_absent(
        &self,
        kind: EntityKind,
        masterplan_id: i64,
        present_keys: &[String],
    ) -> RepositoryResult<usize> {
        Self::ensure_soft_deletable(kind)?;

        let table = kind.table();
        let key = kind.key_expr(table);
        let sql = format!(
            r#"
            UPDATE {table} SET deleted_at = datetime('now'), updated_at = datetime('now')
            WHERE masterplan_id = ?1
              AND deleted_at IS NULL
              AND {key} NOT IN (SELECT value FROM json_each(?2))
            "#
        );

        let payload = json_array(present_keys)?;
        Ok(self.conn.execute(&sql, params![masterplan_id, payload])?)
    }

    /// 活动行数量
    pub fn count_active(&self, kind: EntityKind, masterplan_id: i64) -> RepositoryResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE masterplan_id = ?1 AND deleted_at IS NULL",
            kind.table()
        );
        let n: i64 = self.conn.query_row(&sql, params![masterplan_id], |row| row.get(0))?;
        Ok(n as usize)
    }
}
