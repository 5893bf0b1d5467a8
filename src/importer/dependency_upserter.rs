// ==========================================
// 项目计划导入 - 任务依赖 upsert
// ==========================================
// 两端经任务身份映射解析；自引用或任一端未解析的记录丢弃，不中断导入
// 唯一键: 有序对 (predecessor_task_id, successor_task_id)
// ==========================================

use crate::domain::model::DependencyRecord;
use crate::domain::types::EntityKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::{IdentityMap, IdentityResolver};
use crate::importer::soft_delete::SoftDeleteReconciler;
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::repository::{DependencyRepository, DependencyRow};

pub struct DependencyUpserter<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> DependencyUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn upsert(&self, records: &[DependencyRecord], tasks: &IdentityMap) -> ImportResult<UpsertOutcome> {
        let mut self_loops = 0;
        let mut unresolved = 0;
        let mut keyed = Vec::with_capacity(records.len());

        for record in records {
            let pred = DataCleaner::normalize_null(record.predecessor_external_id.as_deref());
            let succ = DataCleaner::normalize_null(record.successor_external_id.as_deref());
            let (Some(pred_id), Some(succ_id)) = (
                tasks.resolve_opt(pred.as_deref()),
                tasks.resolve_opt(succ.as_deref()),
            ) else {
                unresolved += 1;
                continue;
            };
            if pred_id == succ_id {
                self_loops += 1;
                continue;
            }

            let row = DependencyRow {
                predecessor_task_id: pred_id,
                successor_task_id: succ_id,
                dependency_type: DataCleaner::normalize_null(record.dependency_type.as_deref()),
                lag: record.lag,
            };
            keyed.push((row.key(), row));
        }
        if self_loops > 0 {
            tracing::warn!(self_loops, "丢弃自引用依赖");
        }
        if unresolved > 0 {
            tracing::warn!(unresolved, "丢弃端点未解析的依赖");
        }

        let (batch, _) = DataCleaner::dedupe_last_wins(keyed);
        let keys: Vec<String> = batch.iter().map(|(k, _)| k.clone()).collect();
        let rows: Vec<DependencyRow> = batch.into_iter().map(|(_, row)| row).collect();

        let restored = SoftDeleteReconciler::new(&self.ctx).restore_reappearing(EntityKind::Dependency, &keys)?;
        DependencyRepository::new(self.ctx.conn, self.ctx.chunk_size).upsert_batch(
            self.ctx.masterplan_id,
            &rows,
            self.ctx.actor,
        )?;
        let identities = IdentityResolver::new(self.ctx.conn).resolve(
            EntityKind::Dependency,
            self.ctx.masterplan_id,
            &keys,
        )?;

        Ok(UpsertOutcome {
            // 计数为去重后的有序对数量
            count: rows.len(),
            skipped: self_loops + unresolved,
            restored,
            keys,
            identities,
        })
    }
}
