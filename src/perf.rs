use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_len: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// 安装 SQLite 语句 trace/profile（用于 SQL 计数 + 慢查询日志）
///
/// 开关：
/// - 默认关闭（批量导入时 trace 回调开销不可忽略）
/// - `MASTERPLAN_IMPORT_PERF_SQL=1` 开启
/// - `MASTERPLAN_IMPORT_SLOW_SQL_MS=200` 配置慢 SQL 阈值（毫秒）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = std::env::var("MASTERPLAN_IMPORT_PERF_SQL")
        .map(|v| is_true(&v))
        .unwrap_or(false);

    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        // 显式清理，避免复用连接导致残留 callback
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("MASTERPLAN_IMPORT_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(200);
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(sql_trace_callback));
    conn.profile(Some(sql_profile_callback));
}

fn sql_trace_callback(_sql: &str) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
}

fn sql_profile_callback(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold > 0 && ms >= threshold {
        let sql_short = truncate_sql(sql, 420);
        tracing::warn!(
            target: "slow_sql",
            duration_ms = ms,
            sql = %sql_short,
            "slow sql"
        );
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

// ==========================================
// PhaseTiming - 单个阶段耗时
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub ms: f64,
}

/// 阶段耗时明细（保持记录顺序，用于报告和审计日志）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub phases: Vec<PhaseTiming>,
    pub total_ms: f64,
}

impl PhaseTimings {
    pub fn record(&mut self, phase: impl Into<String>, ms: f64) {
        self.phases.push(PhaseTiming {
            phase: phase.into(),
            ms,
        });
    }

    pub fn get(&self, phase: &str) -> Option<f64> {
        self.phases.iter().find(|t| t.phase == phase).map(|t| t.ms)
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_ms / 1000.0
    }
}

fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// 阶段计时 Guard：记录 elapsed_ms + SQL 语句数 + 慢 SQL 数
///
/// 使用方式：
/// ```ignore
/// let timer = masterplan_import::perf::PhaseTimer::start("upsert_tasks");
/// // do work...
/// timer.stop(&mut timings);
/// ```
pub struct PhaseTimer {
    phase: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PhaseTimer {
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }

    /// 结束计时并写入明细，返回毫秒数
    pub fn stop(self, timings: &mut PhaseTimings) -> f64 {
        let ms = round_ms(self.start.elapsed());
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::debug!(
            target: "perf",
            phase = self.phase,
            elapsed_ms = ms,
            sql_count,
            slow_sql_count,
            "done"
        );

        timings.record(self.phase, ms);
        ms
    }
}

/// 总耗时计时
pub struct TotalTimer {
    start: Instant,
}

impl TotalTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn finish(&self, timings: &mut PhaseTimings) {
        timings.total_ms = round_ms(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_timer_records_in_order() {
        let mut timings = PhaseTimings::default();
        PhaseTimer::start("first").stop(&mut timings);
        PhaseTimer::start("second").stop(&mut timings);

        let names: Vec<&str> = timings.phases.iter().map(|t| t.phase.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(timings.get("first").is_some());
        assert!(timings.get("missing").is_none());
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql("SELECT\n1", 100), "SELECT 1");
        assert!(truncate_sql(&"x".repeat(500), 10).ends_with('…'));
    }
}
