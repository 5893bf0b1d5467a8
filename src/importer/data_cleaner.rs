// ==========================================
// 项目计划导入 - 数据清洗器
// ==========================================
// 职责: 主键/文本 TRIM 与 NULL 标准化、批内去重、自定义字段编码、例外日期解析
// ==========================================

use crate::domain::model::CustomFieldMap;
use crate::importer::error::ImportResult;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

pub struct DataCleaner;

impl DataCleaner {
    /// TRIM 后为空视为缺失
    pub fn normalize_null(value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 自定义字段编码为 JSON 文本；空 map 存 NULL
    pub fn custom_fields_json(fields: &CustomFieldMap) -> ImportResult<Option<String>> {
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(fields)?))
    }

    /// 解析例外日期（接受纯日期或带时间的 ISO 文本）
    pub fn parse_date(value: &str) -> Option<NaiveDate> {
        let v = value.trim();
        NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S")
                    .ok()
                    .map(|dt| dt.date())
            })
            .or_else(|| v.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
    }

    /// 批内按键去重（同键后出现者覆盖先出现者，保留首次出现位置）
    ///
    /// # 返回
    /// - (去重后的记录, 被覆盖的记录数)
    pub fn dedupe_last_wins<T>(items: Vec<(String, T)>) -> (Vec<(String, T)>, usize) {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
        let mut out: Vec<(String, T)> = Vec::with_capacity(items.len());
        let mut replaced = 0;

        for (key, item) in items {
            match index.get(&key) {
                Some(&pos) => {
                    out[pos].1 = item;
                    replaced += 1;
                }
                None => {
                    index.insert(key.clone(), out.len());
                    out.push((key, item));
                }
            }
        }
        (out, replaced)
    }
}
