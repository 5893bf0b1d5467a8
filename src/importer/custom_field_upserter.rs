// ==========================================
// 项目计划导入 - 自定义字段定义 upsert
// ==========================================
// 来源按实体类别分组（TASK / RESOURCE / ...）；data_type 缺省为 STRING
// 红线: 定义只 upsert，从不删除
// ==========================================

use crate::domain::model::CustomFieldDefinitionRecord;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::upsert::UpsertContext;
use crate::repository::{CustomFieldDefinitionRow, CustomFieldRepository};
use std::collections::BTreeMap;

pub const DEFAULT_DATA_TYPE: &str = "STRING";

pub struct CustomFieldUpserter<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> CustomFieldUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    /// # 返回
    /// - (写入数, 跳过数)
    pub fn upsert(
        &self,
        definitions: &BTreeMap<String, Vec<CustomFieldDefinitionRecord>>,
    ) -> ImportResult<(usize, usize)> {
        let mut skipped = 0;
        let mut keyed = Vec::new();

        for (class, defs) in definitions {
            let Some(field_class) = DataCleaner::normalize_null(Some(class.as_str())).map(|c| c.to_uppercase()) else {
                skipped += defs.len();
                continue;
            };
            for def in defs {
                let Some(field_type) = DataCleaner::normalize_null(def.field_type.as_deref()) else {
                    skipped += 1;
                    continue;
                };
                let row = CustomFieldDefinitionRow {
                    field_class: field_class.clone(),
                    field_type: field_type.clone(),
                    alias: DataCleaner::normalize_null(def.alias.as_deref()),
                    data_type: DataCleaner::normalize_null(def.data_type.as_deref())
                        .map(|t| t.to_uppercase())
                        .unwrap_or_else(|| DEFAULT_DATA_TYPE.to_string()),
                };
                keyed.push((format!("{}:{}", field_class, field_type), row));
            }
        }

        let (batch, _) = DataCleaner::dedupe_last_wins(keyed);
        let rows: Vec<CustomFieldDefinitionRow> = batch.into_iter().map(|(_, row)| row).collect();
        let count = CustomFieldRepository::new(self.ctx.conn, self.ctx.chunk_size).upsert_batch(
            self.ctx.masterplan_id,
            &rows,
            self.ctx.actor,
        )?;
        Ok((count, skipped))
    }
}
