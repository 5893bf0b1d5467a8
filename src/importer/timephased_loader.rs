// ==========================================
// 项目计划导入 - 分时数据装载
// ==========================================
// 策略: 按分配整体替换；本批带分段的分配先删旧分段再插入，未出现的分配不动
// 负的工时/成本只计数并写入报告，从不拒绝
// ==========================================

use crate::domain::model::TimephasedSegment;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::IdentityMap;
use crate::importer::upsert::UpsertContext;
use crate::repository::{TimephasedRepository, TimephasedRow};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimephasedOutcome {
    pub segments: usize,
    pub negative_values: usize,
    pub skipped: usize,
}

/// 单个分段中负的工时/成本取值个数
pub fn count_negative(segment: &TimephasedSegment) -> usize {
    [segment.work, segment.cost]
        .into_iter()
        .filter(|v| matches!(v, Some(x) if *x < 0.0))
        .count()
}

pub struct TimephasedLoader<'a> {
    ctx: UpsertContext<'a>,
}

impl<'a> TimephasedLoader<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn load(&self, segments: &[TimephasedSegment], assignments: &IdentityMap) -> ImportResult<TimephasedOutcome> {
        let mut outcome = TimephasedOutcome::default();
        let mut assignment_ids = BTreeSet::new();
        let mut rows = Vec::with_capacity(segments.len());

        for segment in segments {
            let key = DataCleaner::normalize_null(segment.assignment_external_id.as_deref());
            let Some(assignment_id) = assignments.resolve_opt(key.as_deref()) else {
                outcome.skipped += 1;
                continue;
            };
            outcome.negative_values += count_negative(segment);
            assignment_ids.insert(assignment_id);
            rows.push(TimephasedRow {
                assignment_id,
                segment_kind: segment.kind,
                period_start: segment.period_start,
                period_end: segment.period_end,
                work: segment.work,
                cost: segment.cost,
                units: segment.units,
            });
        }

        if outcome.skipped > 0 {
            tracing::warn!(skipped = outcome.skipped, "跳过分配未解析的分时数据");
        }
        if outcome.negative_values > 0 {
            tracing::warn!(negative = outcome.negative_values, "分时数据含负的工时/成本");
        }

        let repo = TimephasedRepository::new(self.ctx.conn, self.ctx.chunk_size);
        let ids: Vec<i64> = assignment_ids.into_iter().collect();
        let deleted = repo.delete_for_assignments(&ids)?;
        outcome.segments = repo.insert_batch(&rows)?;

        tracing::debug!(assignments = ids.len(), deleted, inserted = outcome.segments, "分时数据已替换");
        Ok(outcome)
    }
}
