// ==========================================
// 项目计划导入 - 资源 upsert
// ==========================================
// 必需: external_id + 名称（无名资源跳过）
// 日历引用经日历身份映射解析，未解析时链接为空
// ==========================================

use crate::domain::model::ResourceRecord;
use crate::domain::types::EntityKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::{IdentityMap, IdentityResolver};
use crate::importer::soft_delete::SoftDeleteReconciler;
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::repository::{ResourceRepository, ResourceRow};

pub struct ResourceUpserter<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> ResourceUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn upsert(&self, records: &[ResourceRecord], calendars: &IdentityMap) -> ImportResult<UpsertOutcome> {
        let mut skipped = 0;
        let mut keyed = Vec::with_capacity(records.len());

        for record in records {
            let external_id = DataCleaner::normalize_null(record.external_id.as_deref());
            let name = DataCleaner::normalize_null(record.name.as_deref());
            let (Some(external_id), Some(name)) = (external_id, name) else {
                skipped += 1;
                continue;
            };

            let row = ResourceRow {
                external_id: external_id.clone(),
                name,
                email: DataCleaner::normalize_null(record.email.as_deref()),
                resource_type: DataCleaner::normalize_null(record.resource_type.as_deref()),
                group_name: DataCleaner::normalize_null(record.group.as_deref()),
                max_units: record.max_units,
                standard_rate: record.standard_rate,
                cost: record.cost,
                notes: record.notes.clone(),
                calendar_id: calendars.resolve_opt(record.calendar_external_id.as_deref().map(str::trim)),
                custom_fields: DataCleaner::custom_fields_json(&record.custom_fields)?,
            };
            keyed.push((external_id, row));
        }
        if skipped > 0 {
            tracing::warn!(skipped, "跳过缺少 external_id 或名称的资源");
        }

        let (batch, replaced) = DataCleaner::dedupe_last_wins(keyed);
        if replaced > 0 {
            tracing::warn!(replaced, "资源 external_id 重复，以后出现者为准");
        }
        let keys: Vec<String> = batch.iter().map(|(k, _)| k.clone()).collect();
        let rows: Vec<ResourceRow> = batch.into_iter().map(|(_, row)| row).collect();

        let restored = SoftDeleteReconciler::new(&self.ctx).restore_reappearing(EntityKind::Resource, &keys)?;
        let count = ResourceRepository::new(self.ctx.conn, self.ctx.chunk_size).upsert_batch(
            self.ctx.masterplan_id,
            &rows,
            self.ctx.actor,
        )?;
        let identities =
            IdentityResolver::new(self.ctx.conn).resolve(EntityKind::Resource, self.ctx.masterplan_id, &keys)?;

        Ok(UpsertOutcome {
            count,
            skipped,
            restored,
            keys,
            identities,
        })
    }
}
