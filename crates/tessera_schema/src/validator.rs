//! Schema validation: diffing the live database against the declared model.
//!
//! Validation never mutates anything and never raises introspection errors
//! to the caller - an unverifiable table is reported as missing, which
//! steers the migrator toward the safe `CREATE TABLE IF NOT EXISTS` path.

use crate::model::{ColumnDefinition, SchemaDefinition};
use crate::typemap::normalize_sql_type;
use serde::Serialize;
use std::collections::HashMap;
use tessera_db::{ActualColumn, TesseraDb};
use tracing::warn;

/// Implicit columns managed by the host store; never reported as drift.
pub const RESERVED_COLUMNS: [&str; 4] = ["tenant_id", "module_id", "payload", "version"];

/// Case-insensitive reserved-column check.
pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// How urgently a difference needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification of one schema difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceKind {
    TableMissing,
    ColumnMissing,
    ColumnExtra,
    TypeMismatch,
    NullableMismatch,
    PrimaryKeyMismatch,
}

/// One observed difference between declared and actual schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub kind: DifferenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
}

/// Issue counts for one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Strictly false when ANY difference exists, LOW severity included.
    pub is_valid: bool,
    pub total_issues: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
}

impl Default for ValidationSummary {
    fn default() -> Self {
        Self {
            is_valid: true,
            total_issues: 0,
            high_severity: 0,
            medium_severity: 0,
            low_severity: 0,
        }
    }
}

/// Validation outcome for one table.
///
/// `differences` holds every difference found; `missing_columns`,
/// `extra_columns`, and `type_mismatches` are filtered views the migrator
/// consumes directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableValidation {
    pub table_name: String,
    pub exists: bool,
    pub missing_columns: Vec<Difference>,
    pub extra_columns: Vec<Difference>,
    pub type_mismatches: Vec<Difference>,
    pub differences: Vec<Difference>,
    pub summary: ValidationSummary,
}

impl TableValidation {
    fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            exists: false,
            missing_columns: Vec::new(),
            extra_columns: Vec::new(),
            type_mismatches: Vec::new(),
            differences: Vec::new(),
            summary: ValidationSummary::default(),
        }
    }

    /// Record a difference, updating counts and the filtered views.
    fn push(&mut self, diff: Difference) {
        match diff.severity {
            Severity::High => self.summary.high_severity += 1,
            Severity::Medium => self.summary.medium_severity += 1,
            Severity::Low => self.summary.low_severity += 1,
        }
        self.summary.total_issues += 1;
        self.summary.is_valid = false;

        match diff.kind {
            DifferenceKind::ColumnMissing => self.missing_columns.push(diff.clone()),
            DifferenceKind::ColumnExtra => self.extra_columns.push(diff.clone()),
            DifferenceKind::TypeMismatch
            | DifferenceKind::NullableMismatch
            | DifferenceKind::PrimaryKeyMismatch => self.type_mismatches.push(diff.clone()),
            DifferenceKind::TableMissing => {}
        }

        self.differences.push(diff);
    }
}

/// Aggregated counts across one schema definition.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_tables: usize,
    pub valid_tables: usize,
    pub invalid_tables: usize,
    pub missing_tables: usize,
    pub total_issues: usize,
}

/// Validation report for one (tenant, module) schema definition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaValidationReport {
    pub tenant_id: String,
    pub module_id: String,
    pub schema_name: String,
    pub tables: Vec<TableValidation>,
    pub summary: ReportSummary,
}

/// Compare one column present in both schemas.
///
/// Types are compared through [`normalize_sql_type`] on both sides, so
/// `VARCHAR(50)` against a declared `string` field is not drift, while
/// `VARCHAR(50)` against a declared `integer` field is.
pub fn compare_columns(actual: &ActualColumn, expected: &ColumnDefinition) -> Vec<Difference> {
    let mut differences = Vec::new();

    let actual_type = normalize_sql_type(&actual.raw_type);
    let expected_type = normalize_sql_type(expected.sql_type.as_str());
    if actual_type != expected_type {
        differences.push(Difference {
            kind: DifferenceKind::TypeMismatch,
            column_name: Some(actual.name.clone()),
            expected: expected_type,
            actual: actual_type,
            severity: Severity::High,
        });
    }

    let actual_nullable = !actual.not_null;
    if actual_nullable != expected.nullable {
        differences.push(Difference {
            kind: DifferenceKind::NullableMismatch,
            column_name: Some(actual.name.clone()),
            expected: nullable_label(expected.nullable).to_string(),
            actual: nullable_label(actual_nullable).to_string(),
            severity: Severity::Medium,
        });
    }

    if actual.is_primary_key != expected.primary_key {
        differences.push(Difference {
            kind: DifferenceKind::PrimaryKeyMismatch,
            column_name: Some(actual.name.clone()),
            expected: pk_label(expected.primary_key).to_string(),
            actual: pk_label(actual.is_primary_key).to_string(),
            severity: Severity::High,
        });
    }

    differences
}

fn nullable_label(nullable: bool) -> &'static str {
    if nullable {
        "NULL"
    } else {
        "NOT NULL"
    }
}

fn pk_label(primary_key: bool) -> &'static str {
    if primary_key {
        "PRIMARY KEY"
    } else {
        "NOT PRIMARY KEY"
    }
}

/// Read-only diff engine over one live database.
pub struct SchemaValidator<'a> {
    db: &'a TesseraDb,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(db: &'a TesseraDb) -> Self {
        Self { db }
    }

    /// Introspection-backed existence probe. Errors fail toward "needs
    /// creation" and are logged, never returned.
    pub async fn table_exists(&self, table: &str) -> bool {
        match self.db.table_exists(table).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(table, error = %e, "Table existence check failed; treating as missing");
                false
            }
        }
    }

    /// Ordered actual columns, or `None` when introspection fails.
    pub async fn actual_columns(&self, table: &str) -> Option<Vec<ActualColumn>> {
        match self.db.list_columns(table).await {
            Ok(columns) => Some(columns),
            Err(e) => {
                warn!(table, error = %e, "Column introspection failed");
                None
            }
        }
    }

    /// Validate one table against its expected columns.
    pub async fn validate_table(
        &self,
        table_name: &str,
        expected: &[ColumnDefinition],
    ) -> TableValidation {
        let mut validation = TableValidation::new(table_name);

        if !self.table_exists(table_name).await {
            validation.push(table_missing(table_name));
            return validation;
        }

        let Some(actual_columns) = self.actual_columns(table_name).await else {
            // Unverifiable table: report as missing so the corrective path
            // is the idempotent CREATE TABLE IF NOT EXISTS.
            validation.push(table_missing(table_name));
            return validation;
        };

        validation.exists = true;

        let actual_by_name: HashMap<String, &ActualColumn> = actual_columns
            .iter()
            .map(|col| (col.name.to_lowercase(), col))
            .collect();
        let expected_by_name: HashMap<String, &ColumnDefinition> = expected
            .iter()
            .map(|col| (col.column_name.to_lowercase(), col))
            .collect();

        // Declared but absent from the live table, in declaration order.
        for col in expected {
            if !actual_by_name.contains_key(&col.column_name.to_lowercase()) {
                validation.push(Difference {
                    kind: DifferenceKind::ColumnMissing,
                    column_name: Some(col.column_name.clone()),
                    expected: col.sql_type.to_string(),
                    actual: "MISSING".to_string(),
                    severity: Severity::High,
                });
            }
        }

        // Present in the live table but undeclared, reserved columns aside.
        for col in &actual_columns {
            let key = col.name.to_lowercase();
            if !expected_by_name.contains_key(&key) && !is_reserved_column(&col.name) {
                validation.push(Difference {
                    kind: DifferenceKind::ColumnExtra,
                    column_name: Some(col.name.clone()),
                    expected: "NOT DECLARED".to_string(),
                    actual: col.raw_type.clone(),
                    severity: Severity::Low,
                });
            }
        }

        // Present in both: compare type, nullability, primary key.
        for col in expected {
            if let Some(actual) = actual_by_name.get(&col.column_name.to_lowercase()) {
                for diff in compare_columns(actual, col) {
                    validation.push(diff);
                }
            }
        }

        validation
    }

    /// Validate every table declared by one schema definition.
    pub async fn validate_schema(&self, definition: &SchemaDefinition) -> SchemaValidationReport {
        let mut report = SchemaValidationReport {
            tenant_id: definition.tenant_id.clone(),
            module_id: definition.module_id.clone(),
            schema_name: definition.name.clone(),
            tables: Vec::with_capacity(definition.tables.len()),
            summary: ReportSummary::default(),
        };

        for table in &definition.tables {
            let resolved = table.resolve();
            let validation = self
                .validate_table(&resolved.table_name, &resolved.columns)
                .await;

            report.summary.total_tables += 1;
            if !validation.exists {
                report.summary.missing_tables += 1;
                report.summary.invalid_tables += 1;
            } else if validation.summary.is_valid {
                report.summary.valid_tables += 1;
            } else {
                report.summary.invalid_tables += 1;
            }
            report.summary.total_issues += validation.summary.total_issues;

            report.tables.push(validation);
        }

        report
    }
}

fn table_missing(table_name: &str) -> Difference {
    Difference {
        kind: DifferenceKind::TableMissing,
        column_name: None,
        expected: format!("table {table_name}"),
        actual: "MISSING".to_string(),
        severity: Severity::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::SqlType;
    use tempfile::TempDir;
    use tessera_db::TesseraDb;

    fn expected_column(name: &str, sql_type: SqlType) -> ColumnDefinition {
        ColumnDefinition {
            column_name: name.to_string(),
            sql_type,
            nullable: true,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    fn actual(name: &str, raw_type: &str, not_null: bool, pk: bool) -> ActualColumn {
        ActualColumn {
            name: name.to_string(),
            raw_type: raw_type.to_string(),
            not_null,
            is_primary_key: pk,
        }
    }

    #[test]
    fn compare_detects_type_mismatch_through_normalization() {
        let diffs = compare_columns(
            &actual("code", "VARCHAR(50)", false, false),
            &expected_column("code", SqlType::Integer),
        );
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceKind::TypeMismatch);
        assert_eq!(diffs[0].severity, Severity::High);
        assert_eq!(diffs[0].expected, "INTEGER");
        assert_eq!(diffs[0].actual, "TEXT");
    }

    #[test]
    fn compare_accepts_alias_types() {
        // VARCHAR(255) and a declared string field are the same bucket
        let diffs = compare_columns(
            &actual("name", "VARCHAR(255)", false, false),
            &expected_column("name", SqlType::Text),
        );
        assert!(diffs.is_empty());
    }

    #[test]
    fn compare_detects_nullable_and_pk_mismatch() {
        let mut expected = expected_column("id", SqlType::Text);
        expected.nullable = false;
        expected.primary_key = true;

        let diffs = compare_columns(&actual("id", "TEXT", false, false), &expected);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].kind, DifferenceKind::NullableMismatch);
        assert_eq!(diffs[0].severity, Severity::Medium);
        assert_eq!(diffs[1].kind, DifferenceKind::PrimaryKeyMismatch);
        assert_eq!(diffs[1].severity, Severity::High);
    }

    #[test]
    fn reserved_columns_are_case_insensitive() {
        assert!(is_reserved_column("tenant_id"));
        assert!(is_reserved_column("Tenant_ID"));
        assert!(is_reserved_column("PAYLOAD"));
        assert!(!is_reserved_column("notes"));
    }

    #[tokio::test]
    async fn missing_table_short_circuits() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        let validator = SchemaValidator::new(&db);

        let validation = validator
            .validate_table("orders", &[expected_column("id", SqlType::Text)])
            .await;

        assert!(!validation.exists);
        assert_eq!(validation.differences.len(), 1);
        assert_eq!(validation.differences[0].kind, DifferenceKind::TableMissing);
        assert_eq!(validation.differences[0].severity, Severity::High);
        assert!(!validation.summary.is_valid);
        assert_eq!(validation.summary.high_severity, 1);

        db.close().await;
    }

    #[tokio::test]
    async fn missing_columns_are_reported_in_declaration_order() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        db.execute("CREATE TABLE orders (id TEXT PRIMARY KEY)")
            .await
            .unwrap();

        let mut id = expected_column("id", SqlType::Text);
        id.primary_key = true;
        id.nullable = false;
        let expected = vec![
            id,
            expected_column("total", SqlType::Real),
            expected_column("notes", SqlType::Text),
        ];

        let validator = SchemaValidator::new(&db);
        let validation = validator.validate_table("orders", &expected).await;

        assert!(validation.exists);
        let names: Vec<_> = validation
            .missing_columns
            .iter()
            .map(|d| d.column_name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["total", "notes"]);
        assert_eq!(validation.summary.high_severity, 2);

        db.close().await;
    }

    #[tokio::test]
    async fn extra_column_keeps_table_invalid() {
        // Pins the strict is_valid semantics: LOW-severity drift alone
        // still marks the table invalid.
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        db.execute("CREATE TABLE orders (id TEXT PRIMARY KEY, legacy_flag INTEGER)")
            .await
            .unwrap();

        let mut id = expected_column("id", SqlType::Text);
        id.primary_key = true;

        let validator = SchemaValidator::new(&db);
        let validation = validator.validate_table("orders", &[id]).await;

        assert!(validation.exists);
        assert_eq!(validation.extra_columns.len(), 1);
        assert_eq!(validation.extra_columns[0].severity, Severity::Low);
        assert_eq!(validation.summary.low_severity, 1);
        assert_eq!(validation.summary.total_issues, 1);
        assert!(!validation.summary.is_valid);

        db.close().await;
    }

    #[tokio::test]
    async fn reserved_columns_are_never_extra() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        db.execute(
            "CREATE TABLE orders (id TEXT PRIMARY KEY, tenant_id TEXT, module_id TEXT, payload TEXT, version INTEGER)",
        )
        .await
        .unwrap();

        let mut id = expected_column("id", SqlType::Text);
        id.primary_key = true;

        let validator = SchemaValidator::new(&db);
        let validation = validator.validate_table("orders", &[id]).await;

        assert!(validation.extra_columns.is_empty());
        assert!(validation.summary.is_valid);

        db.close().await;
    }

    #[tokio::test]
    async fn column_lookup_is_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        db.execute("CREATE TABLE orders (ID TEXT PRIMARY KEY)")
            .await
            .unwrap();

        let mut id = expected_column("id", SqlType::Text);
        id.primary_key = true;

        let validator = SchemaValidator::new(&db);
        let validation = validator.validate_table("orders", &[id]).await;

        assert!(validation.missing_columns.is_empty());
        assert!(validation.summary.is_valid);

        db.close().await;
    }

    #[tokio::test]
    async fn validate_schema_aggregates_counts() {
        let tmp = TempDir::new().unwrap();
        let db = TesseraDb::open(tmp.path().join("t.db")).await.unwrap();
        db.execute("CREATE TABLE present (id TEXT PRIMARY KEY)")
            .await
            .unwrap();

        let raw = serde_json::json!({
            "schema": {
                "name": "pos",
                "tables": [
                    { "name": "present", "fields": [{ "name": "id", "type": "string", "primaryKey": true }] },
                    { "name": "absent", "fields": [{ "name": "id", "type": "string", "primaryKey": true }] }
                ]
            }
        });
        let file: crate::model::DefinitionFile = serde_json::from_value(raw).unwrap();
        let definition = crate::model::SchemaDefinition {
            tenant_id: "branch-a".to_string(),
            module_id: "pos".to_string(),
            name: file.schema.name,
            tables: file.schema.tables,
            path: tmp.path().join("definition.json"),
        };

        let validator = SchemaValidator::new(&db);
        let report = validator.validate_schema(&definition).await;

        assert_eq!(report.summary.total_tables, 2);
        assert_eq!(report.summary.valid_tables, 1);
        assert_eq!(report.summary.invalid_tables, 1);
        assert_eq!(report.summary.missing_tables, 1);
        assert_eq!(report.summary.total_issues, 1);

        db.close().await;
    }
}
