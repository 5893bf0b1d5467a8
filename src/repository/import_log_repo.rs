// ==========================================
// 项目计划导入 - 导入审计日志仓储
// ==========================================
// 红线: import_log 只追加；提交后唯一允许的更新是回填 file_storage_path
//       （审计阶段耗时在同一事务内补写）
// ==========================================

use crate::domain::import_log::{ImportLogEntry, ImportReport};
use crate::domain::types::ImportStatus;
use crate::perf::PhaseTimings;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct ImportLogRepository<'a> {
    conn: &'a Connection,
}

/// 数据库原始行（JSON 列尚未解析）
struct RawImportLog {
    id: i64,
    masterplan_id: Option<i64>,
    source_file: String,
    file_storage_path: Option<String>,
    file_hash: Option<String>,
    stats: String,
    timings: String,
    status: String,
    error_message: Option<String>,
    created_by: Option<i64>,
    created_at: String,
}

const SELECT_COLUMNS: &str = r#"
    id, masterplan_id, source_file, file_storage_path, file_hash, stats, timings,
    status, error_message, created_by, created_at
"#;

fn map_raw(row: &Row<'_>) -> rusqlite::Result<RawImportLog> {
    Ok(RawImportLog {
        id: row.get(0)?,
        masterplan_id: row.get(1)?,
        source_file: row.get(2)?,
        file_storage_path: row.get(3)?,
        file_hash: row.get(4)?,
        stats: row.get(5)?,
        timings: row.get(6)?,
        status: row.get(7)?,
        error_message: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn parse_status(value: &str) -> RepositoryResult<ImportStatus> {
    match value {
        "completed" => Ok(ImportStatus::Completed),
        "failed" => Ok(ImportStatus::Failed),
        other => Err(RepositoryError::InternalError(format!("未知导入状态: {}", other))),
    }
}

impl TryFrom<RawImportLog> for ImportLogEntry {
    type Error = RepositoryError;

    fn try_from(raw: RawImportLog) -> Result<Self, Self::Error> {
        let timings: PhaseTimings = serde_json::from_str(&raw.timings)?;
        Ok(ImportLogEntry {
            id: raw.id,
            masterplan_id: raw.masterplan_id,
            source_file: raw.source_file,
            file_storage_path: raw.file_storage_path,
            file_hash: raw.file_hash,
            stats: serde_json::from_str(&raw.stats)?,
            timings,
            status: parse_status(&raw.status)?,
            error_message: raw.error_message,
            created_by: raw.created_by,
            created_at: raw.created_at,
        })
    }
}

impl<'a> ImportLogRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 追加一条审计记录，返回 import_log.id
    ///
    /// masterplan_id 取报告中的值；失败且 masterplan 已随事务回滚时应为 None
    pub fn insert(&self, report: &ImportReport, created_by: i64) -> RepositoryResult<i64> {
        let stats = report.stats_json().to_string();
        let timings = serde_json::to_string(&report.timings)?;

        self.conn.execute(
            r#"
            INSERT INTO import_log (
                masterplan_id, source_file, file_storage_path, file_hash, stats, timings,
                status, error_message, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                report.masterplan_id,
                report.source_file,
                report.file_storage_path,
                report.file_hash,
                stats,
                timings,
                report.status().as_str(),
                report.error_message,
                created_by,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 补写耗时明细；仅在写入该行的事务内调用
    pub fn update_timings(&self, id: i64, timings: &PhaseTimings) -> RepositoryResult<()> {
        let timings = serde_json::to_string(timings)?;
        let n = self.conn.execute(
            "UPDATE import_log SET timings = ?1 WHERE id = ?2",
            params![timings, id],
        )?;
        if n == 0 {
            return Err(RepositoryError::NotFound {
                entity: "import_log".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 回填文件存储路径（文件归档在导入之后完成）
    pub fn update_storage_path(&self, id: i64, file_storage_path: &str) -> RepositoryResult<()> {
        let n = self.conn.execute(
            "UPDATE import_log SET file_storage_path = ?1 WHERE id = ?2",
            params![file_storage_path, id],
        )?;
        if n == 0 {
            return Err(RepositoryError::NotFound {
                entity: "import_log".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<ImportLogEntry>> {
        let sql = format!("SELECT {} FROM import_log WHERE id = ?1", SELECT_COLUMNS);
        let raw = self.conn.query_row(&sql, params![id], map_raw).optional()?;
        raw.map(ImportLogEntry::try_from).transpose()
    }

    /// 按 masterplan 查询审计记录（最新在前）
    pub fn list_by_masterplan(&self, masterplan_id: i64) -> RepositoryResult<Vec<ImportLogEntry>> {
        let sql = format!(
            "SELECT {} FROM import_log WHERE masterplan_id = ?1 ORDER BY id DESC",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![masterplan_id], map_raw)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(ImportLogEntry::try_from(row?)?);
        }
        Ok(entries)
    }

    pub fn count_by_status(&self, status: ImportStatus) -> RepositoryResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM import_log WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM import_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{setup_test_db, setup_with_masterplan};

    #[test]
    fn test_insert_and_read_back() {
        let (conn, masterplan_id) = setup_with_masterplan();
        let repo = ImportLogRepository::new(&conn);

        let mut report = ImportReport::new("plan.json");
        report.masterplan_id = Some(masterplan_id);
        report.success = true;
        report.counts.tasks = 3;
        report.timings.record("upserting_tasks", 12.5);

        let id = repo.insert(&report, 42).unwrap();
        let entry = repo.find_by_id(id).unwrap().unwrap();

        assert_eq!(entry.status, ImportStatus::Completed);
        assert_eq!(entry.created_by, Some(42));
        assert_eq!(entry.stats["counts"]["tasks"], 3);
        assert_eq!(entry.timings.get("upserting_tasks"), Some(12.5));
        assert_eq!(repo.list_by_masterplan(masterplan_id).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_entry_without_masterplan() {
        let conn = setup_test_db();
        let repo = ImportLogRepository::new(&conn);

        let mut report = ImportReport::new("broken.json");
        report.error_message = Some("读取失败".to_string());
        repo.insert(&report, 1).unwrap();

        assert_eq!(repo.count_by_status(ImportStatus::Failed).unwrap(), 1);
        assert_eq!(repo.count_by_status(ImportStatus::Completed).unwrap(), 0);
    }

    #[test]
    fn test_update_storage_path() {
        let conn = setup_test_db();
        let repo = ImportLogRepository::new(&conn);
        let id = repo.insert(&ImportReport::new("a.json"), 1).unwrap();

        repo.update_storage_path(id, "/archive/a.json").unwrap();
        let entry = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(entry.file_storage_path.as_deref(), Some("/archive/a.json"));

        assert!(matches!(
            repo.update_storage_path(id + 100, "/x"),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
