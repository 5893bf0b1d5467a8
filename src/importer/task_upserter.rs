// ==========================================
// 项目计划导入 - 任务 upsert
// ==========================================
// 必需: external_id + 名称
// 依赖与任务基线在任务身份映射建立后由编排器挂接
// ==========================================

use crate::domain::model::TaskRecord;
use crate::domain::types::EntityKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::{IdentityMap, IdentityResolver};
use crate::importer::soft_delete::SoftDeleteReconciler;
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::repository::{TaskRepository, TaskRow};

pub struct TaskUpserter<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> TaskUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn upsert(&self, records: &[TaskRecord], calendars: &IdentityMap) -> ImportResult<UpsertOutcome> {
        let mut skipped = 0;
        let mut keyed = Vec::with_capacity(records.len());

        for record in records {
            let external_id = DataCleaner::normalize_null(record.external_id.as_deref());
            let name = DataCleaner::normalize_null(record.name.as_deref());
            let (Some(external_id), Some(name)) = (external_id, name) else {
                skipped += 1;
                continue;
            };

            let row = TaskRow {
                external_id: external_id.clone(),
                name,
                start_date: record.start,
                finish_date: record.finish,
                duration: record.duration,
                work: record.work,
                percent_complete: record.percent_complete,
                priority: record.priority,
                notes: record.notes.clone(),
                wbs: DataCleaner::normalize_null(record.wbs.as_deref()),
                outline_level: record.outline_level,
                is_milestone: record.milestone,
                is_summary: record.summary,
                calendar_id: calendars.resolve_opt(record.calendar_external_id.as_deref().map(str::trim)),
                custom_fields: DataCleaner::custom_fields_json(&record.custom_fields)?,
            };
            keyed.push((external_id, row));
        }
        if skipped > 0 {
            tracing::warn!(skipped, "跳过缺少 external_id 或名称的任务");
        }

        let (batch, replaced) = DataCleaner::dedupe_last_wins(keyed);
        if replaced > 0 {
            tracing::warn!(replaced, "任务 external_id 重复，以后出现者为准");
        }
        let keys: Vec<String> = batch.iter().map(|(k, _)| k.clone()).collect();
        let rows: Vec<TaskRow> = batch.into_iter().map(|(_, row)| row).collect();

        let restored = SoftDeleteReconciler::new(&self.ctx).restore_reappearing(EntityKind::Task, &keys)?;
        let count = TaskRepository::new(self.ctx.conn, self.ctx.chunk_size).upsert_batch(
            self.ctx.masterplan_id,
            &rows,
            self.ctx.actor,
        )?;
        let identities =
            IdentityResolver::new(self.ctx.conn).resolve(EntityKind::Task, self.ctx.masterplan_id, &keys)?;

        Ok(UpsertOutcome {
            count,
            skipped,
            restored,
            keys,
            identities,
        })
    }
}
