// ==========================================
// 项目计划导入 - 身份解析器
// ==========================================
// 职责: 每种实体 upsert 之后，一次查询重建 external_id → 库内 id 映射
// 红线: 只查询本批刚写入的键；缺失的键表示"父记录未解析"，调用方跳过依赖记录而不是失败
// ==========================================

use crate::domain::types::EntityKind;
use crate::importer::error::ImportResult;
use crate::repository::IdentityRepository;
use rusqlite::Connection;
use std::collections::HashMap;

/// 单一实体种类的身份映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    ids: HashMap<String, i64>,
}

impl IdentityMap {
    pub fn get(&self, external_id: &str) -> Option<i64> {
        self.ids.get(external_id).copied()
    }

    /// 可选键解析；None 或未解析均返回 None
    pub fn resolve_opt(&self, external_id: Option<&str>) -> Option<i64> {
        external_id.and_then(|k| self.get(k))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<HashMap<String, i64>> for IdentityMap {
    fn from(ids: HashMap<String, i64>) -> Self {
        Self { ids }
    }
}

pub struct IdentityResolver<'a> {
    repo: IdentityRepository<'a>,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            repo: IdentityRepository::new(conn),
        }
    }

    pub fn resolve(&self, kind: EntityKind, masterplan_id: i64, keys: &[String]) -> ImportResult<IdentityMap> {
        let ids = self.repo.lookup_active(kind, masterplan_id, keys)?;
        if ids.len() < keys.len() {
            tracing::debug!(
                kind = %kind,
                requested = keys.len(),
                resolved = ids.len(),
                "部分键未解析"
            );
        }
        Ok(IdentityMap::from(ids))
    }
}
