//! Migration tests

use mcpgate_storage::Database;
use tests::db::TestDatabase;

#[tokio::test]
async fn test_migrations_run_successfully() {
    // Database::open runs migrations automatically
    let test_db = TestDatabase::new();

    assert!(test_db.db_path().exists());
    assert_eq!(test_db.db.lock().await.schema_version().unwrap(), 1);
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let test_db = TestDatabase::new();

    // Opening the same database again should not re-run anything
    let db2 = Database::open(test_db.db_path()).expect("Failed to reopen database");
    assert_eq!(db2.schema_version().unwrap(), 1);
}

#[test]
fn test_database_creates_parent_directories() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("nested").join("data").join("mcpgate.db");

    assert!(!db_path.exists());

    let _db = Database::open(&db_path).expect("Failed to open database");

    assert!(db_path.exists());
}

#[test]
fn test_in_memory_database_is_migrated() {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");

    let tables: i64 = db
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'server_resources'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}
