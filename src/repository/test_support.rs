// ==========================================
// 仓储层单元测试夹具（内存数据库）
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema};
use rusqlite::{params, Connection};

pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    configure_sqlite_connection(&conn).unwrap();
    init_schema(&conn).unwrap();
    conn
}

pub fn setup_with_masterplan() -> (Connection, i64) {
    let conn = setup_test_db();
    conn.execute(
        "INSERT INTO masterplan (external_id, name) VALUES ('P-TEST', 'Test Plan')",
        [],
    )
    .unwrap();
    let id = conn.last_insert_rowid();
    (conn, id)
}

pub fn insert_task(conn: &Connection, masterplan_id: i64, external_id: &str) -> i64 {
    conn.execute(
        "INSERT INTO task (masterplan_id, external_id, name) VALUES (?1, ?2, ?2)",
        params![masterplan_id, external_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_resource(conn: &Connection, masterplan_id: i64, external_id: &str) -> i64 {
    conn.execute(
        "INSERT INTO resource (masterplan_id, external_id, name) VALUES (?1, ?2, ?2)",
        params![masterplan_id, external_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}
