// ==========================================
// 项目计划导入 - 软删除同步器
// ==========================================
// 职责:
// - upsert 前: 恢复本批重新出现的软删除行（重新加入的实体保留原库内 id）
// - upsert 后: 标记本批缺失的活动行为已删除，再做一次恢复兜底
// 适用: 资源 / 任务 / 分配 / 依赖；从不作用于 masterplan、日历、基线、自定义字段定义
// ==========================================

use crate::domain::types::EntityKind;
use crate::importer::error::ImportResult;
use crate::importer::upsert::UpsertContext;
use crate::repository::SoftDeleteRepository;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub soft_deleted: usize,
    pub restored: usize,
}

pub struct SoftDeleteReconciler<'a> {
    repo: SoftDeleteRepository<'a>,
    masterplan_id: i64,
}

impl<'a> SoftDeleteReconciler<'a> {
    pub fn new(ctx: &UpsertContext<'a>) -> Self {
        Self {
            repo: SoftDeleteRepository::new(ctx.conn, ctx.chunk_size),
            masterplan_id: ctx.masterplan_id,
        }
    }

    /// 恢复本批重新出现的键
    pub fn restore_reappearing(&self, kind: EntityKind, keys: &[String]) -> ImportResult<usize> {
        let restored = self.repo.restore_reappearing(kind, self.masterplan_id, keys)?;
        if restored > 0 {
            tracing::info!(kind = %kind, restored, "恢复重新出现的软删除记录");
        }
        Ok(restored)
    }

    /// 同步删除状态
    ///
    /// 空键集合表示"本批没有该实体"，全部活动行将被软删除
    pub fn reconcile(&self, kind: EntityKind, present_keys: &[String]) -> ImportResult<ReconcileOutcome> {
        let soft_deleted = self.repo.mark_absent(kind, self.masterplan_id, present_keys)?;
        let restored = self.repo.restore_reappearing(kind, self.masterplan_id, present_keys)?;

        if soft_deleted > 0 {
            tracing::info!(kind = %kind, soft_deleted, "软删除本批缺失的记录");
        }
        Ok(ReconcileOutcome {
            soft_deleted,
            restored,
        })
    }
}
