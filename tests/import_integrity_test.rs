// ==========================================
// 导入完整性测试
// ==========================================
// 测试目标: 依赖引用完整、日历父链、基线、分时数据、分块边界
// ==========================================


use chrono::NaiveDate;
use masterplan_import::config::ImportSettings;
use masterplan_import::domain::model::{
    BaselineMeta, CustomFieldDefinitionRecord, ResourceBaselineValues, TimephasedSegment,
};
use masterplan_import::domain::types::TimephasedKind;
use test_helpers::*;

fn segment(assignment: &str, day: u32, work: f64, cost: f64) -> TimephasedSegment {
    let start = NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(8, 0, 0).unwrap();
    TimephasedSegment {
        assignment_external_id: Some(assignment.to_string()),
        kind: TimephasedKind::Planned,
        period_start: start,
        period_end: start + chrono::Duration::hours(8),
        work: Some(work),
        cost: Some(cost),
        units: Some(1.0),
    }
}

// ==========================================
// 依赖
// ==========================================

#[test]
fn test_self_loops_and_dangling_dependencies_are_never_persisted() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-DEP", "Deps");
    m.tasks = vec![task("T1", "A"), task("T2", "B")];
    m.dependencies = vec![
        dependency("T1", "T2"),
        dependency("T1", "T1"),
        dependency("T1", "MISSING"),
        dependency("T1", "T2"),
    ];

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.dependencies, 1);
    assert_eq!(report.counts.skipped, 2);

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency"), 1);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM task_dependency WHERE predecessor_task_id = successor_task_id"),
        0
    );
    // 两端都必须指向本 masterplan 的任务
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM task_dependency d
             JOIN task p ON p.id = d.predecessor_task_id AND p.masterplan_id = d.masterplan_id
             JOIN task s ON s.id = d.successor_task_id AND s.masterplan_id = d.masterplan_id"
        ),
        1
    );
}

#[test]
fn test_dependency_attributes_update_in_place() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-LAG", "Lag");
    m.tasks = vec![task("T1", "A"), task("T2", "B")];
    m.dependencies = vec![dependency("T1", "T2")];
    import(&db_path, &m).unwrap();

    m.dependencies[0].lag = Some(2.5);
    m.dependencies[0].dependency_type = Some("SS".to_string());
    import(&db_path, &m).unwrap();

    let conn = open_db(&db_path);
    let (kind, lag): (String, f64) = conn
        .query_row("SELECT dependency_type, lag FROM task_dependency", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(kind, "SS");
    assert_eq!(lag, 2.5);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency"), 1);
}

// ==========================================
// 日历
// ==========================================

#[test]
fn test_calendar_parent_resolves_regardless_of_order() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-CAL", "Calendars");
    // 子日历先于父日历出现
    m.calendars = vec![calendar("NIGHT", Some("BASE")), calendar("BASE", None)];

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.calendars, 2);

    let conn = open_db(&db_path);
    let parent: String = conn
        .query_row(
            "SELECT p.external_id FROM calendar c JOIN calendar p ON p.id = c.parent_calendar_id
             WHERE c.external_id = 'NIGHT'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(parent, "BASE");
}

#[test]
fn test_calendar_cycle_is_refused() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-CYC", "Cycle");
    m.calendars = vec![
        calendar("A", Some("B")),
        calendar("B", Some("A")),
        calendar("C", Some("C")),
    ];

    import(&db_path, &m).unwrap();
    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar WHERE parent_calendar_id IS NOT NULL"), 1);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM calendar WHERE external_id = 'C' AND parent_calendar_id IS NULL"),
        1
    );
}

fn calendar_parents(conn: &rusqlite::Connection) -> Vec<(String, Option<String>)> {
    let mut stmt = conn
        .prepare(
            "SELECT c.external_id, p.external_id FROM calendar c
             LEFT JOIN calendar p ON p.id = c.parent_calendar_id
             ORDER BY c.external_id",
        )
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn calendar_ids(conn: &rusqlite::Connection) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare("SELECT external_id, id FROM calendar ORDER BY external_id")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_calendar_reparenting_across_imports_follows_snapshot() {
    // 两种输入顺序都应收敛到新快照
    for reversed in [false, true] {
        let (_tmp, db_path) = create_test_db();
        let mut m = model("P-SWAP", "Swap");
        m.calendars = vec![calendar("A", Some("B")), calendar("B", None)];
        import(&db_path, &m).unwrap();

        let conn = open_db(&db_path);
        assert_eq!(
            calendar_parents(&conn),
            vec![("A".to_string(), Some("B".to_string())), ("B".to_string(), None)]
        );
        let ids_before = calendar_ids(&conn);

        m.calendars = vec![calendar("B", Some("A")), calendar("A", None)];
        if reversed {
            m.calendars.reverse();
        }
        import(&db_path, &m).unwrap();

        assert_eq!(
            calendar_parents(&conn),
            vec![("A".to_string(), None), ("B".to_string(), Some("A".to_string()))],
            "reversed = {}",
            reversed
        );
        assert_eq!(calendar_ids(&conn), ids_before);
    }
}

#[test]
fn test_calendar_chain_rotation_across_imports() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-ROT", "Rotation");
    // A <- B <- C
    m.calendars = vec![calendar("C", Some("B")), calendar("B", Some("A")), calendar("A", None)];
    import(&db_path, &m).unwrap();

    // C <- A <- B
    m.calendars = vec![calendar("B", Some("A")), calendar("A", Some("C")), calendar("C", None)];
    import(&db_path, &m).unwrap();

    let conn = open_db(&db_path);
    assert_eq!(
        calendar_parents(&conn),
        vec![
            ("A".to_string(), Some("C".to_string())),
            ("B".to_string(), Some("A".to_string())),
            ("C".to_string(), None),
        ]
    );
}

#[test]
fn test_unresolved_parent_keeps_stored_link_in_cycle_check() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-KEEP", "Keep");
    m.calendars = vec![calendar("A", None), calendar("B", Some("A"))];
    import(&db_path, &m).unwrap();

    // B 的父日历未解析，保留 B -> A；A -> B 会成环而被清除
    m.calendars = vec![calendar("A", Some("B")), calendar("B", Some("GONE"))];
    import(&db_path, &m).unwrap();

    let conn = open_db(&db_path);
    assert_eq!(
        calendar_parents(&conn),
        vec![("A".to_string(), None), ("B".to_string(), Some("A".to_string()))]
    );
}

#[test]
fn test_overlapping_exception_ranges_are_replaced_not_accumulated() {
    use masterplan_import::domain::model::CalendarExceptionRecord;

    let holiday = |from: &str, to: &str| CalendarExceptionRecord {
        name: Some("Holiday".to_string()),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        working: false,
    };

    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-OVL", "Overlap");
    let mut base = calendar("BASE", None);
    base.exceptions = vec![holiday("2024-12-24", "2024-12-26"), holiday("2024-12-25", "2024-12-27")];
    m.calendars = vec![base];

    import(&db_path, &m).unwrap();
    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_exception"), 6);
    assert_eq!(count(&conn, "SELECT COUNT(DISTINCT exception_date) FROM calendar_exception"), 4);

    import(&db_path, &m).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_exception"), 6);

    m.calendars[0].exceptions = vec![holiday("2024-12-31", "2025-01-01")];
    import(&db_path, &m).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_exception"), 2);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM calendar_exception WHERE exception_date LIKE '2024-12-2%'"),
        0
    );
}

#[test]
fn test_calendar_details_are_replaced() {
    use masterplan_import::domain::model::{CalendarExceptionRecord, WeekdayRecord};

    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-DET", "Details");
    let mut base = calendar("BASE", None);
    base.weekdays = vec![
        WeekdayRecord { weekday: 1, working: true },
        WeekdayRecord { weekday: 7, working: false },
        WeekdayRecord { weekday: 9, working: true },
    ];
    base.exceptions = vec![CalendarExceptionRecord {
        name: Some("Holiday".to_string()),
        from: Some("2024-05-01".to_string()),
        to: Some("2024-05-03".to_string()),
        working: false,
    }];
    m.calendars = vec![base];
    import(&db_path, &m).unwrap();

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_weekday"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_exception"), 3);

    m.calendars[0].exceptions[0].to = Some("not a date".to_string());
    import(&db_path, &m).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_weekday"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM calendar_exception"), 1);
}

// ==========================================
// 基线
// ==========================================

#[test]
fn test_no_baseline_rows_without_baseline_data() {
    let (_tmp, db_path) = create_test_db();
    let report = import(&db_path, &p1_model()).unwrap();
    assert_eq!(report.counts.baselines, 0);

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM baseline"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_baseline"), 0);
}

#[test]
fn test_only_discovered_baselines_are_created() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    m.tasks = vec![task_with_baseline("T1", 0, 8.0), task_with_baseline("T2", 3, 4.0), task("T3", "Test")];
    m.baselines = vec![BaselineMeta {
        index: 3,
        external_id: None,
        name: Some("Re-plan".to_string()),
    }];
    m.resources[0].baselines.insert(
        3,
        ResourceBaselineValues {
            work: Some(16.0),
            cost: None,
        },
    );
    // 索引 5 未被任何任务使用，不建基线
    m.resources[1].baselines.insert(
        5,
        ResourceBaselineValues {
            work: Some(1.0),
            cost: None,
        },
    );

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.baselines, 2);
    assert_eq!(report.counts.task_baselines, 2);
    assert_eq!(report.counts.resource_baselines, 1);

    let conn = open_db(&db_path);
    let names: Vec<(i64, String)> = conn
        .prepare("SELECT baseline_index, name FROM baseline ORDER BY baseline_index")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(names, vec![(0, "Baseline".to_string()), (3, "Re-plan".to_string())]);

    // 重导入: 基线值替换而非累加
    import(&db_path, &m).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM baseline"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_baseline"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM resource_baseline"), 1);
}

#[test]
fn test_baseline_sample_limits_discovery() {
    let (_tmp, db_path) = create_test_db();
    let mut m = model("P-SAMPLE", "Sample");
    m.tasks = vec![task("T1", "plain"), task_with_baseline("T2", 1, 2.0)];

    let settings = ImportSettings {
        baseline_sample_size: 1,
        ..Default::default()
    };
    let report = import_with(&db_path, &m, settings).unwrap();
    assert_eq!(report.counts.baselines, 0);

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.baselines, 1);
}

// ==========================================
// 分时数据
// ==========================================

#[test]
fn test_timephased_segments_are_replaced_and_negatives_counted() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    m.timephased = vec![
        segment("A1", 4, 8.0, 100.0),
        segment("A1", 5, -2.0, 50.0),
        segment("A2", 4, 4.0, -10.0),
        segment("UNKNOWN", 4, 1.0, 1.0),
    ];

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.timephased_segments, 3);
    assert_eq!(report.counts.negative_timephased_values, 2);
    assert_eq!(report.counts.skipped, 1);

    let conn = open_db(&db_path);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM timephased_segment"), 3);

    // A1 只剩一段，A2 本批无分段，保持不动
    m.timephased = vec![segment("A1", 6, 8.0, 100.0)];
    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.timephased_segments, 1);
    assert_eq!(report.counts.negative_timephased_values, 0);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM timephased_segment s JOIN assignment a ON a.id = s.assignment_id
             WHERE a.external_id = 'A1'"
        ),
        1
    );
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM timephased_segment"), 2);
}

// ==========================================
// 分块边界
// ==========================================

#[test]
fn test_small_chunks_produce_same_result() {
    let (_tmp_small, small_db) = create_test_db();
    let (_tmp_default, default_db) = create_test_db();

    let mut m = model("P-CHUNK", "Chunks");
    m.resources = (1..=5).map(|i| resource(&format!("R{}", i), "res")).collect();
    m.tasks = (1..=7).map(|i| task(&format!("T{}", i), "task")).collect();
    m.dependencies = (1..7).map(|i| dependency(&format!("T{}", i), &format!("T{}", i + 1))).collect();
    m.assignments = (1..=7)
        .map(|i| assignment(&format!("A{}", i), &format!("T{}", i), &format!("R{}", (i % 5) + 1)))
        .collect();

    let settings = ImportSettings {
        chunk_size: 2,
        ..Default::default()
    };
    let small = import_with(&small_db, &m, settings.clone()).unwrap();
    let full = import(&default_db, &m).unwrap();
    assert_eq!(small.counts, full.counts);
    assert_eq!(small.counts.tasks, 7);
    assert_eq!(small.counts.dependencies, 6);

    // 删除跨越多个分块时同样收敛
    m.tasks.truncate(3);
    let report = import_with(&small_db, &m, settings).unwrap();
    assert_eq!(report.counts.tasks, 3);
    let conn = open_db(&small_db);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task WHERE deleted_at IS NULL"), 3);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM task_dependency WHERE deleted_at IS NULL"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM assignment WHERE deleted_at IS NULL"), 3);
}

// ==========================================
// 自定义字段
// ==========================================

#[test]
fn test_custom_field_definitions_and_values() {
    let (_tmp, db_path) = create_test_db();
    let mut m = p1_model();
    m.custom_field_definitions.insert(
        "task".to_string(),
        vec![
            CustomFieldDefinitionRecord {
                field_type: Some("TEXT1".to_string()),
                alias: Some("Area".to_string()),
                data_type: None,
            },
            CustomFieldDefinitionRecord::default(),
        ],
    );
    m.tasks[0]
        .custom_fields
        .insert("Area".to_string(), serde_json::json!("North"));

    let report = import(&db_path, &m).unwrap();
    assert_eq!(report.counts.custom_field_definitions, 1);

    let conn = open_db(&db_path);
    let (class, data_type): (String, String) = conn
        .query_row("SELECT field_class, data_type FROM custom_field_definition", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(class, "TASK");
    assert_eq!(data_type, "STRING");

    let raw: String = conn
        .query_row("SELECT custom_fields FROM task WHERE external_id = 'T1'", [], |row| row.get(0))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["Area"], "North");
}
