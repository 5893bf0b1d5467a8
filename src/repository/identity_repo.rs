// ==========================================
// 项目计划导入 - 身份映射查询
// ==========================================
// 职责: external_id → 库内 id 的批量查询（一次查询，只查本批 id）
// 红线: 只返回活动行；软删除行不参与映射
// ==========================================

use crate::domain::types::EntityKind;
use crate::repository::bulk::json_array;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub struct IdentityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> IdentityRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 查询本批对账键对应的活动行 id
    ///
    /// # 参数
    /// - kind: 实体种类（决定表与键表达式）
    /// - masterplan_id: 所属 masterplan
    /// - keys: 本批对账键（已去重）
    pub fn lookup_active(
        &self,
        kind: EntityKind,
        masterplan_id: i64,
        keys: &[String],
    ) -> RepositoryResult<HashMap<String, i64>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let table = kind.table();
        let key = kind.key_expr("t");
        let active_filter = if kind.soft_deletable() {
            "AND t.deleted_at IS NULL"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT {key}, t.id FROM {table} t
            WHERE t.masterplan_id = ?1 {active_filter}
              AND {key} IN (SELECT value FROM json_each(?2))
            "#
        );

        let payload = json_array(keys)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![masterplan_id, payload], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut map = HashMap::with_capacity(keys.len());
        for row in rows {
            let (k, id) = row?;
            map.insert(k, id);
        }
        Ok(map)
    }
}
