// ==========================================
// 项目计划导入 - 日历 upsert（三遍）
// ==========================================
// 第一遍: 不带父链接写入日历行
// 第二遍: 父子两端都已解析时写入父链接（拒绝自引用与成环）；未声明父日历的清除链接
// 第三遍: 工作日标志 / 工作时段 / 例外日期整体替换（例外区间按天展开）
// ==========================================

use crate::domain::model::{CalendarExceptionRecord, CalendarRecord};
use crate::domain::types::EntityKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::ImportResult;
use crate::importer::identity_resolver::{IdentityMap, IdentityResolver};
use crate::importer::upsert::{UpsertContext, UpsertOutcome};
use crate::repository::{
    CalendarParentLink, CalendarRepository, CalendarRow, ExceptionRow, WeekdayRow, WorkingTimeRow,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// 单个例外区间最多展开的天数；超出视为格式错误，只写入起始日
pub const MAX_EXCEPTION_SPAN_DAYS: i64 = 3_660;

pub struct CalendarUpserter<'a> {
    ctx: UpsertContext<'a>,
    repo: CalendarRepository<'a>,
}

impl<'a> CalendarUpserter<'a> {
    pub fn new(ctx: UpsertContext<'a>) -> Self {
        Self {
            repo: CalendarRepository::new(ctx.conn, ctx.chunk_size),
            ctx,
        }
    }

    pub fn upsert(&self, records: &[CalendarRecord]) -> ImportResult<UpsertOutcome> {
        let mut skipped = 0;
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            let external_id = DataCleaner::normalize_null(record.external_id.as_deref());
            let name = DataCleaner::normalize_null(record.name.as_deref());
            match (external_id, name) {
                (Some(external_id), Some(name)) => keyed.push((external_id, (name, record))),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "跳过缺少 external_id 或名称的日历");
        }

        let (batch, replaced) = DataCleaner::dedupe_last_wins(keyed);
        if replaced > 0 {
            tracing::warn!(replaced, "日历 external_id 重复，以后出现者为准");
        }

        // ===== 第一遍 =====
        let rows: Vec<CalendarRow> = batch
            .iter()
            .map(|(external_id, (name, _))| CalendarRow {
                external_id: external_id.clone(),
                name: name.clone(),
            })
            .collect();
        let count = self.repo.upsert_without_parent(self.ctx.masterplan_id, &rows, self.ctx.actor)?;

        let keys: Vec<String> = batch.iter().map(|(k, _)| k.clone()).collect();
        let identities =
            IdentityResolver::new(self.ctx.conn).resolve(EntityKind::Calendar, self.ctx.masterplan_id, &keys)?;

        // ===== 第二遍 =====
        let records: Vec<(&String, &CalendarRecord)> = batch.iter().map(|(k, (_, r))| (k, *r)).collect();
        let links = self.plan_parent_links(&records, &identities)?;
        self.repo.apply_parent_links(&links, self.ctx.actor)?;

        // ===== 第三遍 =====
        self.replace_details(&records, &identities)?;

        Ok(UpsertOutcome {
            count,
            skipped,
            restored: 0,
            keys,
            identities,
        })
    }

    /// 计算父链接
    ///
    /// 先按本批快照清空所有批内日历的旧链接（父日历未解析的保留原链接），
    /// 再逐条加入批内声明的链接并拒绝成环者，结果与输入顺序无关。
    fn plan_parent_links(
        &self,
        records: &[(&String, &CalendarRecord)],
        identities: &IdentityMap,
    ) -> ImportResult<Vec<CalendarParentLink>> {
        let mut graph = self.repo.load_parent_links(self.ctx.masterplan_id)?;
        let mut links = Vec::with_capacity(records.len());
        let mut candidates = Vec::with_capacity(records.len());

        for (external_id, record) in records {
            let Some(child_id) = identities.get(external_id) else {
                continue;
            };

            let parent_key = DataCleaner::normalize_null(record.parent_external_id.as_deref());
            let Some(parent_key) = parent_key else {
                graph.insert(child_id, None);
                links.push(CalendarParentLink { id: child_id, parent_id: None });
                continue;
            };

            let Some(parent_id) = identities.get(&parent_key) else {
                tracing::warn!(calendar = %external_id, parent = %parent_key, "父日历未解析，保留原链接");
                continue;
            };

            graph.insert(child_id, None);
            candidates.push((*external_id, parent_key, child_id, parent_id));
        }

        for (external_id, parent_key, child_id, parent_id) in candidates {
            if parent_id == child_id || reaches(&graph, parent_id, child_id) {
                tracing::warn!(calendar = %external_id, parent = %parent_key, "父日历链接会形成环，已清除");
                links.push(CalendarParentLink { id: child_id, parent_id: None });
                continue;
            }

            graph.insert(child_id, Some(parent_id));
            links.push(CalendarParentLink {
                id: child_id,
                parent_id: Some(parent_id),
            });
        }
        Ok(links)
    }

    fn replace_details(
        &self,
        records: &[(&String, &CalendarRecord)],
        identities: &IdentityMap,
    ) -> ImportResult<usize> {
        let mut calendar_ids = Vec::with_capacity(records.len());
        let mut weekdays = Vec::new();
        let mut working_times = Vec::new();
        let mut exceptions = Vec::new();

        for (external_id, record) in records {
            let Some(calendar_id) = identities.get(external_id) else {
                continue;
            };
            calendar_ids.push(calendar_id);

            // 同一工作日多次出现时以最后一次为准
            let mut flags: HashMap<u8, bool> = HashMap::new();
            for w in &record.weekdays {
                if is_weekday(w.weekday) {
                    flags.insert(w.weekday, w.working);
                } else {
                    tracing::warn!(calendar = %external_id, weekday = w.weekday, "工作日编号无效，已跳过");
                }
            }
            let mut flags: Vec<(u8, bool)> = flags.into_iter().collect();
            flags.sort_unstable();
            weekdays.extend(flags.into_iter().map(|(weekday, working)| WeekdayRow {
                calendar_id,
                weekday,
                working,
            }));

            for t in &record.working_times {
                if !is_weekday(t.weekday) {
                    tracing::warn!(calendar = %external_id, weekday = t.weekday, "工作时段工作日编号无效，已跳过");
                    continue;
                }
                working_times.push(WorkingTimeRow {
                    calendar_id,
                    weekday: t.weekday,
                    start_time: t.start,
                    end_time: t.finish,
                });
            }

            for exception in &record.exceptions {
                let days = expand_exception(exception);
                if days.is_empty() {
                    tracing::warn!(calendar = %external_id, "例外日期无法解析，已跳过");
                }
                exceptions.extend(days.into_iter().map(|exception_date| ExceptionRow {
                    calendar_id,
                    exception_date,
                    name: DataCleaner::normalize_null(exception.name.as_deref()),
                    working: exception.working,
                }));
            }
        }

        Ok(self
            .repo
            .replace_details(&calendar_ids, &weekdays, &working_times, &exceptions)?)
    }
}

fn is_weekday(value: u8) -> bool {
    (1..=7).contains(&value)
}

/// 沿父链从 start 向上走，是否能到达 target
fn reaches(graph: &HashMap<i64, Option<i64>>, start: i64, target: i64) -> bool {
    let mut current = start;
    // 已有数据若本身成环，步数上限保证终止
    for _ in 0..=graph.len() {
        if current == target {
            return true;
        }
        match graph.get(&current).copied().flatten() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
    false
}

/// 例外区间按天展开
///
/// - 起始日无法解析: 整个例外跳过（返回空）
/// - 结束日缺失/无法解析/早于起始日/跨度超限: 只返回起始日
pub fn expand_exception(exception: &CalendarExceptionRecord) -> Vec<NaiveDate> {
    let Some(from) = exception.from.as_deref().and_then(DataCleaner::parse_date) else {
        return Vec::new();
    };
    let to = exception.to.as_deref().and_then(DataCleaner::parse_date);

    match to {
        Some(to) if to >= from && (to - from).num_days() <= MAX_EXCEPTION_SPAN_DAYS => {
            from.iter_days().take_while(|d| *d <= to).collect()
        }
        _ => vec![from],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exception(from: Option<&str>, to: Option<&str>) -> CalendarExceptionRecord {
        CalendarExceptionRecord {
            name: Some("Holiday".to_string()),
            from: from.map(String::from),
            to: to.map(String::from),
            working: false,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, d).unwrap()
    }

    #[test]
    fn test_range_expands_per_day() {
        let days = expand_exception(&exception(Some("2024-12-24"), Some("2024-12-26")));
        assert_eq!(days, vec![day(24), day(25), day(26)]);
    }

    #[test]
    fn test_malformed_range_falls_back_to_start() {
        assert_eq!(expand_exception(&exception(Some("2024-12-24"), Some("garbage"))), vec![day(24)]);
        assert_eq!(expand_exception(&exception(Some("2024-12-24"), Some("2024-12-01"))), vec![day(24)]);
        assert_eq!(expand_exception(&exception(Some("2024-12-24"), None)), vec![day(24)]);
        assert_eq!(expand_exception(&exception(Some("2024-12-24"), Some("2099-01-01"))), vec![day(24)]);
    }

    #[test]
    fn test_unparseable_start_is_skipped() {
        assert!(expand_exception(&exception(Some("xx"), Some("2024-12-26"))).is_empty());
        assert!(expand_exception(&exception(None, None)).is_empty());
    }

    #[test]
    fn test_reaches_detects_cycle() {
        let mut graph = HashMap::new();
        graph.insert(1, Some(2));
        graph.insert(2, Some(3));
        graph.insert(3, None);
        assert!(reaches(&graph, 1, 3));
        assert!(!reaches(&graph, 3, 1));

        graph.insert(3, Some(1));
        assert!(!reaches(&graph, 1, 99));
    }
}
