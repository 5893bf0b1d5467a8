// ==========================================
// 导入对账测试
// ==========================================
// 测试目标: 幂等、身份稳定、软删除收敛与恢复
// ==========================================


use masterplan_import::domain::types::{EntityKind, MasterplanAction};
use masterplan_import::logging;
use masterplan_import::repository::{ImportLogRepository, SoftDeleteRepository, DEFAULT_CHUNK_SIZE};
use masterplan_import::ImportStatus;
use test_helpers::*;

#[test]
fn test_p1_created_then_updated_with_same_ids() {
    logging::init_test();
    let (_tmp, db_path) = create_test_db();
    let m = p1_model();

    let first = import(&db_path, &m).expect("首次导入应成功");
    assert!(first.success);
    assert_eq!(first.masterplan_action, Some(MasterplanAction::Created));
    assert_eq!(first.counts.resources, 2);
    assert_eq!(first.counts.tasks, 3);
    assert_eq!(first.counts.dependencies, 2);
    assert_eq!(first.counts.assignments, 2);
    assert_eq!(first.counts.skipped, 0);

    let conn = open_db(&db_path);
    let tasks_before = active_ids(&conn, "task");
    let resources_before = active_ids(&conn, "resource");
    let assignments_before = active_ids(&conn, "assignment");

    let second = import(&db_path, &m).expect("二次导入应成功");
    assert_eq!(second.masterplan_action, Some(MasterplanAction::Updated));
    assert_eq!(second.masterplan_id, first.masterplan_id);
    assert_eq!(second.counts.soft_deleted, 0);

    assert_eq!(active_ids(&conn, "task"), tasks_before);
    assert_eq!(active_ids(&conn, "resource"), resources_before);
    assert_eq!(active_ids(&conn, "assignment"), assignments_before);

    // 每次尝试一行审计
    let logs = ImportLogRepository::new(&conn);
    assert_eq!(logs.count_by_status(ImportStatus::Completed).unwrap(), 2);
    let entries = logs.list_by_masterplan(first.masterplan_id.unwrap()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, second.import_log_id.unwrap());
    assert_eq!(entries[0].file_hash.as_deref(), Some("test-hash"));
}

#[test]
fn test_reimport_is_idempotent_for_all_tables() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    m.calendars = vec![calendar("C1", None), calendar("C2", Some("C1"))];
    m.tasks[0].calendar_external_id = Some("C2".to_string());

    import(&db_path, &m).unwrap();
    let conn = open_db(&db_path);
    let before = snapshot(&conn);
    let links_before = count(&conn, "SELECT COUNT(*) FROM calendar WHERE parent_calendar_id IS NOT NULL");

    import(&db_path, &m).unwrap();
    assert_eq!(snapshot(&conn), before);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM calendar WHERE parent_calendar_id IS NOT NULL"),
        links_before
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM task t JOIN calendar c ON c.id = t.calendar_id WHERE t.external_id = 'T1' AND c.external_id = 'C2'"),
        1
    );
}

#[test]
fn test_removed_entities_are_soft_deleted_and_restored_with_same_id() {
    let (_tmp, db_path) = create_test_db();
    let full = p1_model();
    import(&db_path, &full).unwrap();

    let conn = open_db(&db_path);
    let t3_id = active_ids(&conn, "task")
        .into_iter()
        .find(|(k, _)| k == "T3")
        .map(|(_, id)| id)
        .unwrap();

    // 去掉 T3 及挂在其上的依赖与分配
    let mut reduced = p1_model();
    reduced.tasks.retain(|t| t.external_id.as_deref() != Some("T3"));
    reduced.dependencies.truncate(1);
    reduced.assignments.truncate(1);

    let report = import(&db_path, &reduced).unwrap();
    assert_eq!(report.counts.tasks, 2);
    assert_eq!(report.counts.soft_deleted, 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task WHERE deleted_at IS NOT NULL"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency WHERE deleted_at IS NULL"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM assignment WHERE deleted_at IS NULL"), 1);

    // 再次出现时恢复原 id，而不是插入新行
    let report = import(&db_path, &full).unwrap();
    assert_eq!(report.counts.soft_deleted, 0);
    assert_eq!(report.counts.restored, 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task"), 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency"), 2);
    let restored_t3 = active_ids(&conn, "task")
        .into_iter()
        .find(|(k, _)| k == "T3")
        .map(|(_, id)| id)
        .unwrap();
    assert_eq!(restored_t3, t3_id);
}

#[test]
fn test_empty_assignment_batch_deletes_all_assignments() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    import(&db_path, &m).unwrap();

    m.assignments.clear();
    let report = import(&db_path, &m).unwrap();
    let conn = open_db(&db_path);
    assert_eq!(report.counts.assignments, 0);
    assert_eq!(report.counts.soft_deleted, 2);

    let mp = report.masterplan_id.unwrap();
    let repo = SoftDeleteRepository::new(&conn, DEFAULT_CHUNK_SIZE);
    assert_eq!(repo.count_active(EntityKind::Assignment, mp).unwrap(), 0);
    assert_eq!(repo.count_active(EntityKind::Task, mp).unwrap(), 3);
}

#[test]
fn test_empty_task_batch_keeps_existing_tasks() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    import(&db_path, &m).unwrap();

    m.tasks.clear();
    m.resources.clear();
    let report = import(&db_path, &m).unwrap();
    assert!(report.success);

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task WHERE deleted_at IS NULL"), 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM resource WHERE deleted_at IS NULL"), 2);
    // 依赖/分配端点全部未解析，按空批次同步
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency WHERE deleted_at IS NULL"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM assignment WHERE deleted_at IS NULL"), 0);
}

#[test]
fn test_duplicate_external_ids_last_record_wins() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-DUP", "Dup");
    m.tasks = vec![task("T1", "first"), task("T2", "other"), task("T1", "second")];

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.tasks, 2);

    let conn = open_db(&db_path);
    let name: String = conn
        .query_row("SELECT name FROM task WHERE external_id = 'T1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "second");
}

#[test]
fn test_records_without_natural_key_are_skipped() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-SKIP", "Skip");
    let mut nameless = task("T2", "x");
    nameless.name = Some("   ".to_string());
    let mut keyless = task("T3", "y");
    keyless.external_id = None;
    m.tasks = vec![task("T1", "ok"), nameless, keyless];
    m.resources = vec![resource("R1", "ok"), resource("", "blank key")];

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.tasks, 1);
    assert_eq!(report.counts.resources, 1);
    assert_eq!(report.counts.skipped, 3);
}

#[test]
fn test_masterplans_are_isolated() {
    let (_tmp, db_path) = create_test_db();
    let a = p1_model();
    let mut b = p1_model();
    b.project.external_id = Some("P-2".to_string());
    b.tasks.truncate(1);
    b.dependencies.clear();
    b.assignments.clear();

    let ra = import(&db_path, &a).unwrap();
    let rb = import(&db_path, &b).unwrap();
    assert_ne!(ra.masterplan_id, rb.masterplan_id);

    let conn = open_db(&db_path);
    let repo = SoftDeleteRepository::new(&conn, DEFAULT_CHUNK_SIZE);
    assert_eq!(repo.count_active(EntityKind::Task, ra.masterplan_id.unwrap()).unwrap(), 3);
    assert_eq!(repo.count_active(EntityKind::Task, rb.masterplan_id.unwrap()).unwrap(), 1);
}

#[test]
fn test_minimal_p1_scenario() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-1", "Scenario");
    let mut standard = calendar("C1", None);
    standard.name = Some("Standard".to_string());
    m.calendars = vec![standard];
    m.resources = vec![resource("R1", "Alice")];
    m.tasks = vec![task("T1", "Design")];

    let first = import(&db_path, &m).unwrap();
    assert_eq!(first.masterplan_action, Some(MasterplanAction::Created));
    assert_eq!(
        (
            first.counts.calendars,
            first.counts.resources,
            first.counts.tasks,
            first.counts.assignments,
            first.counts.dependencies
        ),
        (1, 1, 1, 0, 0)
    );

    let conn = open_db(&db_path);
    let calendar_id: i64 = conn
        .query_row("SELECT id FROM calendar WHERE external_id = 'C1'", [], |row| row.get(0))
        .unwrap();
    let resources = active_ids(&conn, "resource");
    let tasks = active_ids(&conn, "task");

    let second = import(&db_path, &m).unwrap();
    assert_eq!(second.masterplan_action, Some(MasterplanAction::Updated));
    assert_eq!(second.counts, first.counts);
    assert_eq!(
        conn.query_row("SELECT id FROM calendar WHERE external_id = 'C1'", [], |row| row.get::<_, i64>(0))
            .unwrap(),
        calendar_id
    );
    assert_eq!(active_ids(&conn, "resource"), resources);
    assert_eq!(active_ids(&conn, "task"), tasks);
}

#[test]
fn test_absent_project_metadata_does_not_clear_stored_values() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-META", "Meta");
    m.project.author = Some("Planner".to_string());
    import(&db_path, &m).unwrap();

    m.project.author = None;
    m.project.name = None;
    m.project.company = Some("ACME".to_string());
    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.masterplan_action, Some(MasterplanAction::Updated));
    assert_eq!(report.masterplan_name, "Meta");

    let conn = open_db(&db_path);
    let (name, author, company): (String, String, String) = conn
        .query_row(
            "SELECT name, author, company FROM masterplan WHERE external_id = 'P-META'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Meta");
    assert_eq!(author, "Planner");
    assert_eq!(company, "ACME");
}

#[test]
fn test_untitled_masterplan_is_named_after_source_file() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-UNTITLED", "unused");
    m.project.name = None;

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.masterplan_action, Some(MasterplanAction::Created));
    assert_eq!(report.masterplan_name, "plan");
}

#[test]
fn test_audit_write_phase_is_timed() {
    let (_tmp, db_path) = create_test_db();
    let report = import(&db_path, &p1_model()).unwrap();
    assert!(report.timings.get("writing_audit_log").is_some());

    let conn = open_db(&db_path);
    let entry = ImportLogRepository::new(&conn)
        .find_by_id(report.import_log_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(entry.timings, report.timings);
}
