// ==========================================
// 项目计划导入 - 导入进度观察者
// ==========================================
// on_phase 在进入每个阶段前调用；返回错误等同于该阶段失败（整体回滚 + 失败审计）
// ==========================================

use crate::domain::types::ImportPhase;
use crate::importer::error::ImportResult;

pub trait ImportObserver: Send + Sync {
    fn on_phase(&self, phase: ImportPhase) -> ImportResult<()>;
}

/// 默认观察者：只记录 trace 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ImportObserver for NoopObserver {
    fn on_phase(&self, phase: ImportPhase) -> ImportResult<()> {
        tracing::trace!(phase = %phase, "进入导入阶段");
        Ok(())
    }
}
