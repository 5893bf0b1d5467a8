// ==========================================
// 项目计划导入 - 导入报告输出
// ==========================================
// 文本渲染用于运维日志；JSON 与文本可同时落盘
// 文件名: import_report_<名称>_<时间戳>.txt / .json
// ==========================================

use crate::domain::import_log::ImportReport;
use crate::importer::error::ImportResult;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "==================================================";

fn fmt_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// 文件名安全化：非字母数字字符替换为下划线
fn safe_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "masterplan".to_string()
    } else {
        trimmed.chars().take(64).collect()
    }
}

impl ImportReport {
    /// 单行摘要
    pub fn summary_line(&self) -> String {
        let c = &self.counts;
        let status = if self.success { "成功" } else { "失败" };
        format!(
            "导入{} [{}] masterplan={} 日历={} 资源={} 任务={} 依赖={} 分配={} 基线={} 分时={} 跳过={} 软删除={} 耗时={:.2}s",
            status,
            self.source_file,
            self.masterplan_external_id,
            c.calendars,
            c.resources,
            c.tasks,
            c.dependencies,
            c.assignments,
            c.baselines,
            c.timephased_segments,
            c.skipped,
            c.soft_deleted,
            self.timings.total_seconds(),
        )
    }

    pub fn to_json(&self) -> ImportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 人类可读的文本报告
    pub fn render_text(&self) -> String {
        let c = &self.counts;
        let mut out = String::new();

        // 写入 String 不会失败
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "项目计划导入报告");
        let _ = writeln!(out, "{}", RULE);

        let _ = writeln!(out, "[标识]");
        let _ = writeln!(out, "  源文件:       {}", self.source_file);
        let _ = writeln!(out, "  存储路径:     {}", fmt_opt(&self.file_storage_path));
        let _ = writeln!(out, "  文件哈希:     {}", fmt_opt(&self.file_hash));
        let _ = writeln!(out, "  masterplan_id: {}", fmt_opt(&self.masterplan_id));
        let _ = writeln!(out, "  import_log_id: {}", fmt_opt(&self.import_log_id));
        let _ = writeln!(out, "  导入时间:     {}", self.imported_at.format("%Y-%m-%d %H:%M:%S"));

        let _ = writeln!(out, "[Masterplan]");
        let _ = writeln!(out, "  名称:         {}", self.masterplan_name);
        let _ = writeln!(out, "  external_id:  {}", self.masterplan_external_id);
        let _ = writeln!(out, "  动作:         {}", fmt_opt(&self.masterplan_action));
        let _ = writeln!(out, "  开始/完成:    {} / {}", fmt_opt(&self.start_date), fmt_opt(&self.finish_date));
        let _ = writeln!(out, "  作者/公司:    {} / {}", fmt_opt(&self.author), fmt_opt(&self.company));
        let _ = writeln!(out, "  创建/保存:    {} / {}", fmt_opt(&self.creation_date), fmt_opt(&self.last_saved));

        let _ = writeln!(out, "[数量]");
        for (label, value) in [
            ("自定义字段定义", c.custom_field_definitions),
            ("日历", c.calendars),
            ("资源", c.resources),
            ("任务", c.tasks),
            ("依赖", c.dependencies),
            ("分配", c.assignments),
            ("基线", c.baselines),
            ("任务基线", c.task_baselines),
            ("资源基线", c.resource_baselines),
            ("分时分段", c.timephased_segments),
            ("分时负值", c.negative_timephased_values),
            ("跳过", c.skipped),
            ("软删除", c.soft_deleted),
            ("恢复", c.restored),
        ] {
            let _ = writeln!(out, "  {:<16}{}", label, value);
        }

        let _ = writeln!(out, "[耗时]");
        for timing in &self.timings.phases {
            let _ = writeln!(out, "  {:<24}{:>10.2} ms", timing.phase, timing.ms);
        }
        let _ = writeln!(out, "  {:<24}{:>10.2} ms", "total", self.timings.total_ms);

        let _ = writeln!(out, "[状态]");
        let _ = writeln!(out, "  结果:         {}", self.status());
        if let Some(message) = &self.error_message {
            let _ = writeln!(out, "  错误:         {}", message);
        }
        let _ = writeln!(out, "{}", RULE);
        out
    }

    /// 写入 txt + json 两份报告
    ///
    /// # 返回
    /// - (文本报告路径, JSON 报告路径)
    pub fn save_to_dir(&self, dir: &Path) -> ImportResult<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;

        let name = if self.masterplan_name.is_empty() {
            self.source_file.as_str()
        } else {
            self.masterplan_name.as_str()
        };
        let stem = format!(
            "import_report_{}_{}",
            safe_name(name),
            self.imported_at.format("%Y%m%d_%H%M%S")
        );

        let txt = dir.join(format!("{}.txt", stem));
        let json = dir.join(format!("{}.json", stem));
        fs::write(&txt, self.render_text())?;
        fs::write(&json, self.to_json()?)?;
        Ok((txt, json))
    }
}
