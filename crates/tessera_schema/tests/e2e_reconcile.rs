//! End-to-end reconciliation tests: definition tree on disk, real SQLite
//! database, full load -> validate -> migrate -> log passes.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tessera_audit::AuditLogger;
use tessera_db::TesseraDb;
use tessera_schema::{
    load_all, reconcile_all, reconcile_module, DifferenceKind, MigrationKind, SchemaValidator,
};

fn write_definition(root: &Path, tenant: &str, module: &str, definition: &Value) {
    let dir = root.join(tenant).join(module).join("schema");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("definition.json"),
        serde_json::to_string_pretty(definition).unwrap(),
    )
    .unwrap();
}

fn orders_definition() -> Value {
    json!({
        "schema": {
            "name": "pos",
            "tables": [{
                "name": "orders",
                "fields": [
                    { "name": "id", "type": "string", "primaryKey": true },
                    { "name": "total", "type": "number" },
                    { "name": "status", "type": "string" }
                ],
                "indexes": [{ "columns": ["status"] }]
            }]
        }
    })
}

#[tokio::test]
async fn missing_table_is_created_and_revalidates_clean() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    let definitions = load_all(&data_root);
    assert_eq!(definitions.len(), 1);

    // First pass: the table is absent and gets created.
    let outcome = reconcile_module(&db, &audit, &definitions[0]).await;
    assert!(!outcome.report.tables[0].exists);
    assert_eq!(
        outcome.report.tables[0].differences[0].kind,
        DifferenceKind::TableMissing
    );

    let creates: Vec<_> = outcome
        .actions
        .iter()
        .filter(|a| a.kind == MigrationKind::CreateTable)
        .collect();
    assert_eq!(creates.len(), 1);
    assert!(creates[0].success);

    // All three declared columns are now live.
    let columns = db.list_columns("orders").await.unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "total", "status"]);

    // Post-migration validation is clean.
    let validator = SchemaValidator::new(&db);
    let report = validator.validate_schema(&definitions[0]).await;
    assert!(report.tables[0].summary.is_valid);
    assert_eq!(report.summary.total_issues, 0);

    db.close().await;
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    let first = reconcile_all(&db, &audit, &data_root).await;
    assert!(!first[0].actions.is_empty());
    assert!(first[0].report_path.is_some());

    let second = reconcile_all(&db, &audit, &data_root).await;
    assert!(second[0].actions.is_empty(), "repeat pass must be action-free");
    assert!(second[0].report_path.is_none(), "nothing to report");
    assert_eq!(second[0].report.summary.total_issues, 0);
    assert!(second[0]
        .report
        .tables
        .iter()
        .all(|t| t.summary.is_valid));

    // Third validation to be sure the report itself is stable.
    let validator = SchemaValidator::new(&db);
    let report = validator
        .validate_schema(&load_all(&data_root)[0])
        .await;
    assert_eq!(report.summary.valid_tables, report.summary.total_tables);

    db.close().await;
}

#[tokio::test]
async fn new_nullable_field_is_added_without_touching_rows() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    reconcile_all(&db, &audit, &data_root).await;
    db.execute("INSERT INTO orders (id, total, status) VALUES ('o-1', 9.5, 'open')")
        .await
        .unwrap();

    // The schema grows a nullable notes field.
    let mut definition = orders_definition();
    definition["schema"]["tables"][0]["fields"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "notes", "type": "string" }));
    write_definition(&data_root, "branch-a", "pos", &definition);

    let outcomes = reconcile_all(&db, &audit, &data_root).await;
    let adds: Vec<_> = outcomes[0]
        .actions
        .iter()
        .filter(|a| a.kind == MigrationKind::AddColumn)
        .collect();
    assert_eq!(adds.len(), 1);
    assert!(adds[0].success);
    let sql = adds[0].sql.as_deref().unwrap();
    assert!(sql.ends_with("ADD COLUMN notes TEXT"), "got: {sql}");

    // Existing row is untouched, new column reads NULL.
    let row: (String, Option<String>) =
        sqlx::query_as("SELECT status, notes FROM orders WHERE id = 'o-1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(row.0, "open");
    assert!(row.1.is_none());

    db.close().await;
}

#[tokio::test]
async fn new_required_field_backfills_synthesized_default() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    reconcile_all(&db, &audit, &data_root).await;
    db.execute("INSERT INTO orders (id) VALUES ('o-1'), ('o-2')")
        .await
        .unwrap();

    let mut definition = orders_definition();
    definition["schema"]["tables"][0]["fields"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "name": "price_cents", "type": "integer", "nullable": false }));
    write_definition(&data_root, "branch-a", "pos", &definition);

    let outcomes = reconcile_all(&db, &audit, &data_root).await;
    let add = outcomes[0]
        .actions
        .iter()
        .find(|a| a.kind == MigrationKind::AddColumn)
        .unwrap();
    assert!(add.success);
    assert!(add
        .sql
        .as_deref()
        .unwrap()
        .ends_with("ADD COLUMN price_cents INTEGER NOT NULL DEFAULT 0"));

    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE price_cents = 0")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(row.0, 2);

    db.close().await;
}

#[tokio::test]
async fn type_drift_produces_manual_migration_advisory() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");

    // Live table predates the definition with a different type for `code`.
    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    db.execute("CREATE TABLE products (id TEXT PRIMARY KEY, code VARCHAR(50))")
        .await
        .unwrap();

    write_definition(
        &data_root,
        "branch-a",
        "pos",
        &json!({
            "schema": {
                "name": "pos",
                "tables": [{
                    "name": "products",
                    "fields": [
                        { "name": "id", "type": "string", "primaryKey": true },
                        { "name": "code", "type": "integer" }
                    ]
                }]
            }
        }),
    );

    let audit = AuditLogger::new(&data_root);
    let outcomes = reconcile_all(&db, &audit, &data_root).await;

    let mismatches: Vec<_> = outcomes[0].report.tables[0]
        .type_mismatches
        .iter()
        .filter(|d| d.kind == DifferenceKind::TypeMismatch)
        .collect();
    assert_eq!(mismatches.len(), 1);

    let advisories: Vec<_> = outcomes[0]
        .actions
        .iter()
        .filter(|a| a.kind == MigrationKind::ModifyColumnType)
        .collect();
    assert_eq!(advisories.len(), 1);
    assert!(!advisories[0].success);
    assert!(advisories[0].warning);
    assert!(advisories[0].requires_manual_migration);

    // The live column type is untouched.
    let columns = db.list_columns("products").await.unwrap();
    assert_eq!(columns[1].raw_type, "VARCHAR(50)");

    db.close().await;
}

#[tokio::test]
async fn one_corrupt_tenant_never_halts_the_sweep() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());

    // branch-b ships garbage.
    let dir = data_root.join("branch-b").join("pos").join("schema");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("definition.json"), "not json at all").unwrap();

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    let outcomes = reconcile_all(&db, &audit, &data_root).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].tenant_id, "branch-a");
    assert!(db.table_exists("orders").await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn audit_trail_is_partitioned_per_tenant_and_module() {
    let tmp = TempDir::new().unwrap();
    let data_root = tmp.path().join("data");
    write_definition(&data_root, "branch-a", "pos", &orders_definition());
    write_definition(
        &data_root,
        "branch-b",
        "kitchen",
        &json!({
            "schema": {
                "name": "kitchen",
                "tables": [{
                    "name": "tickets",
                    "fields": [
                        { "name": "id", "type": "string", "primaryKey": true },
                        { "name": "station", "type": "string" }
                    ],
                    "indexes": [{ "columns": ["station"] }]
                }]
            }
        }),
    );

    let db = TesseraDb::open(tmp.path().join("store.db")).await.unwrap();
    let audit = AuditLogger::new(&data_root);

    let outcomes = reconcile_all(&db, &audit, &data_root).await;
    assert_eq!(outcomes.len(), 2);

    for (tenant, module) in [("branch-a", "pos"), ("branch-b", "kitchen")] {
        let logs = data_root.join(tenant).join(module).join("logs");
        let files: Vec<String> = fs::read_dir(&logs)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();

        assert!(files.iter().any(|f| f.starts_with("ddl-")), "{files:?}");
        assert!(files.iter().any(|f| f.starts_with("migration-")), "{files:?}");
        assert!(files.iter().any(|f| f.starts_with("validation-")), "{files:?}");
        assert!(
            files.iter().any(|f| f.starts_with("migration-report-") && f.ends_with(".json")),
            "{files:?}"
        );
    }

    db.close().await;
}
