// ==========================================
// 项目计划导入 - 基线引擎
// ==========================================
// 职责:
// - 探测: 在任务样本中查找带数据的基线索引（0 = 主基线，1..10 = 命名基线）
// - 建行: 只为探测到的索引建立/更新 baseline 行
// - 值行: 探测到的基线下 task_baseline / resource_baseline 先删后插
// 红线: 没有任何基线数据时不创建基线行
// ==========================================

use crate::domain::model::{BaselineMeta, ResourceRecord, TaskRecord};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::IdentityMap;
use crate::importer::upsert::UpsertContext;
use crate::repository::{BaselineRepository, BaselineRow, ResourceBaselineRow, TaskBaselineRow};
use std::collections::{BTreeMap, BTreeSet};

/// 基线槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineSlot {
    pub index: u8,
    pub label: &'static str,
}

/// 基线索引 → 默认名称（导入时构建一次，按顺序通用遍历）
pub const BASELINE_SLOTS: [BaselineSlot; 11] = [
    BaselineSlot { index: 0, label: "Baseline" },
    BaselineSlot { index: 1, label: "Baseline 1" },
    BaselineSlot { index: 2, label: "Baseline 2" },
    BaselineSlot { index: 3, label: "Baseline 3" },
    BaselineSlot { index: 4, label: "Baseline 4" },
    BaselineSlot { index: 5, label: "Baseline 5" },
    BaselineSlot { index: 6, label: "Baseline 6" },
    BaselineSlot { index: 7, label: "Baseline 7" },
    BaselineSlot { index: 8, label: "Baseline 8" },
    BaselineSlot { index: 9, label: "Baseline 9" },
    BaselineSlot { index: 10, label: "Baseline 10" },
];

pub fn slot(index: u8) -> Option<&'static BaselineSlot> {
    BASELINE_SLOTS.iter().find(|s| s.index == index)
}

/// 探测带数据的基线索引
///
/// # 参数
/// - sample_size: 抽样任务数；0 表示全量扫描
pub fn discover_indices(tasks: &[TaskRecord], sample_size: usize) -> BTreeSet<u8> {
    let take = if sample_size == 0 { tasks.len() } else { sample_size };
    let mut found = BTreeSet::new();

    for task in tasks.iter().take(take) {
        for slot in BASELINE_SLOTS.iter() {
            if found.contains(&slot.index) {
                continue;
            }
            if task.baselines.get(&slot.index).is_some_and(|v| !v.is_empty()) {
                found.insert(slot.index);
            }
        }
        if found.len() == BASELINE_SLOTS.len() {
            break;
        }
    }
    found
}

pub struct BaselineEngine<'a> {
    ctx: UpsertContext<'a>,
    repo: BaselineRepository<'a>,
}

impl<'a> BaselineEngine<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self {
            repo: BaselineRepository::new(ctx.conn, ctx.chunk_size),
            ctx,
        }
    }

    /// 为探测到的索引建立 baseline 行
    ///
    /// 名称取基线元数据，缺省用槽位默认名
    ///
    /// # 返回
    /// - 探测索引 → baseline.id
    pub fn upsert_baselines(
        &self,
        indices: &BTreeSet<u8>,
        metas: &[BaselineMeta],
    ) -> ImportResult<BTreeMap<u8, i64>> {
        if indices.is_empty() {
            return Ok(BTreeMap::new());
        }

        let meta_by_index: BTreeMap<u8, &BaselineMeta> = metas.iter().map(|m| (m.index, m)).collect();
        let rows: Vec<BaselineRow> = indices
            .iter()
            .filter_map(|index| slot(*index))
            .map(|slot| {
                let meta = meta_by_index.get(&slot.index);
                BaselineRow {
                    baseline_index: slot.index,
                    external_id: meta.and_then(|m| DataCleaner::normalize_null(m.external_id.as_deref())),
                    name: meta
                        .and_then(|m| DataCleaner::normalize_null(m.name.as_deref()))
                        .unwrap_or_else(|| slot.label.to_string()),
                }
            })
            .collect();

        let all = self.repo.upsert_baselines(self.ctx.masterplan_id, &rows, self.ctx.actor)?;
        Ok(all.into_iter().filter(|(index, _)| indices.contains(index)).collect())
    }

    /// 替换任务基线值
    pub fn load_task_baselines(
        &self,
        baseline_ids: &BTreeMap<u8, i64>,
        tasks: &[TaskRecord],
        task_ids: &IdentityMap,
    ) -> ImportResult<usize> {
        if baseline_ids.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::new();
        for task in tasks {
            let Some(task_id) = task_ids.resolve_opt(task.external_id.as_deref().map(str::trim)) else {
                continue;
            };
            for (index, baseline_id) in baseline_ids {
                let Some(values) = task.baselines.get(index).filter(|v| !v.is_empty()) else {
                    continue;
                };
                rows.push(TaskBaselineRow {
                    baseline_id: *baseline_id,
                    task_id,
                    start_date: values.start,
                    finish_date: values.finish,
                    duration: values.duration,
                    work: values.work,
                    cost: values.cost,
                });
            }
        }

        let ids: Vec<i64> = baseline_ids.values().copied().collect();
        Ok(self.repo.replace_task_baselines(&ids, &rows)?)
    }

    /// 替换资源基线值
    pub fn load_resource_baselines(
        &self,
        baseline_ids: &BTreeMap<u8, i64>,
        resources: &[ResourceRecord],
        resource_ids: &IdentityMap,
    ) -> ImportResult<usize> {
        if baseline_ids.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::new();
        for resource in resources {
            let Some(resource_id) =
                resource_ids.resolve_opt(resource.external_id.as_deref().map(str::trim))
            else {
                continue;
            };
            for (index, baseline_id) in baseline_ids {
                let Some(values) = resource.baselines.get(index).filter(|v| !v.is_empty()) else {
                    continue;
                };
                rows.push(ResourceBaselineRow {
                    baseline_id: *baseline_id,
                    resource_id,
                    work: values.work,
                    cost: values.cost,
                });
            }
        }

        let ids: Vec<i64> = baseline_ids.values().copied().collect();
        Ok(self.repo.replace_resource_baselines(&ids, &rows)?)
    }
}
