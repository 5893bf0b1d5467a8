// ==========================================
// 项目计划导入 - 资源分配 upsert
// ==========================================
// 前置: 任务与资源身份映射已建立
// 任务或资源未解析的分配丢弃；空批次由同步器软删除全部活动分配
// ==========================================

use crate::domain::model::AssignmentRecord;
use crate::domain::types::EntityKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::{IdentityMap, IdentityResolver};
use crate::importer::soft_delete::SoftDeleteReconciler;
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::repository::{AssignmentRepository, AssignmentRow};

pub struct AssignmentUpserter<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> AssignmentUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn upsert(
        &self,
        records: &[AssignmentRecord],
        tasks: &IdentityMap,
        resources: &IdentityMap,
    ) -> ImportResult<UpsertOutcome> {
        let mut missing_key = 0;
        let mut unresolved = 0;
        let mut keyed = Vec::with_capacity(records.len());

        for record in records {
            let Some(external_id) = DataCleaner::normalize_null(record.external_id.as_deref()) else {
                missing_key += 1;
                continue;
            };
            let task = DataCleaner::normalize_null(record.task_external_id.as_deref());
            let resource = DataCleaner::normalize_null(record.resource_external_id.as_deref());
            let (Some(task_id), Some(resource_id)) = (
                tasks.resolve_opt(task.as_deref()),
                resources.resolve_opt(resource.as_deref()),
            ) else {
                unresolved += 1;
                tracing::debug!(assignment = %external_id, "分配的任务或资源未解析，已跳过");
                continue;
            };

            let row = AssignmentRow {
                external_id: external_id.clone(),
                task_id,
                resource_id,
                work: record.work,
                cost: record.cost,
                start_date: record.start,
                finish_date: record.finish,
                units: record.units,
                percent_complete: record.percent_complete,
                custom_fields: DataCleaner::custom_fields_json(&record.custom_fields)?,
            };
            keyed.push((external_id, row));
        }
        if missing_key + unresolved > 0 {
            tracing::warn!(missing_key, unresolved, "跳过无法挂接的分配");
        }

        let (batch, replaced) = DataCleaner::dedupe_last_wins(keyed);
        if replaced > 0 {
            tracing::warn!(replaced, "分配 external_id 重复，以后出现者为准");
        }
        let keys: Vec<String> = batch.iter().map(|(k, _)| k.clone()).collect();
        let rows: Vec<AssignmentRow> = batch.into_iter().map(|(_, row)| row).collect();

        let restored = SoftDeleteReconciler::new(&self.ctx).restore_reappearing(EntityKind::Assignment, &keys)?;
        let count = AssignmentRepository::new(self.ctx.conn, self.ctx.chunk_size).upsert_batch(
            self.ctx.masterplan_id,
            &rows,
            self.ctx.actor,
        )?;
        let identities = IdentityResolver::new(self.ctx.conn).resolve(
            EntityKind::Assignment,
            self.ctx.masterplan_id,
            &keys,
        )?;

        Ok(UpsertOutcome {
            count,
            skipped: missing_key + unresolved,
            restored,
            keys,
            identities,
        })
    }
}
