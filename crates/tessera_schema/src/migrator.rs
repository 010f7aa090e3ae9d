//! Additive, never-destructive schema migration.
//!
//! The migrator consumes a validation report and applies only corrections
//! whose risk is reversible: creating tables, adding columns, creating
//! indexes. It never drops anything and never rewrites a column type in
//! place - those cases become advisory actions requiring manual follow-up.
//! Every executed statement writes paired audit entries, success and
//! failure alike; names rejected before SQL is built get a single failed
//! migration entry.

use crate::model::{ColumnDefinition, IndexSpec, SchemaDefinition};
use crate::validator::{DifferenceKind, SchemaValidationReport, TableValidation};
use serde::Serialize;
use serde_json::json;
use tessera_audit::{AuditLogger, AuditStatus};
use tessera_db::{validate_bare_identifier, TesseraDb};
use tracing::warn;

/// What a migration action did (or declined to do).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationKind {
    CreateTable,
    AddColumn,
    ModifyColumnType,
    CreateIndex,
}

/// Record of one migration decision, executed or advisory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationAction {
    pub kind: MigrationKind,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Controlled advisory outcome rather than a failure
    pub warning: bool,
    pub requires_manual_migration: bool,
}

impl MigrationAction {
    fn executed(kind: MigrationKind, table: &str, sql: String) -> Self {
        Self {
            kind,
            table_name: table.to_string(),
            column_name: None,
            index_name: None,
            success: true,
            sql: Some(sql),
            error: None,
            warning: false,
            requires_manual_migration: false,
        }
    }

    fn failed(kind: MigrationKind, table: &str, error: String) -> Self {
        Self {
            kind,
            table_name: table.to_string(),
            column_name: None,
            index_name: None,
            success: false,
            sql: None,
            error: Some(error),
            warning: false,
            requires_manual_migration: false,
        }
    }
}

/// Migration context for one (tenant, module) reconciliation pass.
pub struct SchemaMigrator<'a> {
    db: &'a TesseraDb,
    audit: &'a AuditLogger,
    tenant_id: &'a str,
    module_id: &'a str,
}

impl<'a> SchemaMigrator<'a> {
    pub fn new(
        db: &'a TesseraDb,
        audit: &'a AuditLogger,
        tenant_id: &'a str,
        module_id: &'a str,
    ) -> Self {
        Self {
            db,
            audit,
            tenant_id,
            module_id,
        }
    }

    /// Create a table with one clause per declared column, in declaration
    /// order. Idempotent via IF NOT EXISTS.
    pub async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDefinition],
    ) -> MigrationAction {
        let names = std::iter::once(table).chain(columns.iter().map(|c| c.column_name.as_str()));
        if let Err(error) = check_ddl_identifiers(names) {
            self.audit.log_migration(
                self.tenant_id,
                self.module_id,
                "CREATE_TABLE",
                &format!("Rejected table {table}: {error}"),
                AuditStatus::Failed,
                json!({ "tableName": table, "error": error, "reason": "INVALID_IDENTIFIER" }),
            );
            return MigrationAction::failed(MigrationKind::CreateTable, table, error);
        }

        let clauses: Vec<String> = columns.iter().map(ColumnDefinition::render).collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            table,
            clauses.join(",\n  ")
        );

        match self.db.execute(&sql).await {
            Ok(_) => {
                self.audit.log_ddl(
                    self.tenant_id,
                    self.module_id,
                    "CREATE_TABLE",
                    &sql,
                    AuditStatus::Success,
                    json!({ "tableName": table, "columnCount": columns.len() }),
                );
                self.audit.log_migration(
                    self.tenant_id,
                    self.module_id,
                    "CREATE_TABLE",
                    &format!("Created table {table}"),
                    AuditStatus::Success,
                    json!({ "tableName": table, "sql": sql }),
                );
                MigrationAction::executed(MigrationKind::CreateTable, table, sql)
            }
            Err(e) => {
                let error = e.to_string();
                self.audit.log_ddl(
                    self.tenant_id,
                    self.module_id,
                    "CREATE_TABLE",
                    &sql,
                    AuditStatus::Failed,
                    json!({ "tableName": table, "error": error }),
                );
                self.audit.log_migration(
                    self.tenant_id,
                    self.module_id,
                    "CREATE_TABLE",
                    &format!("Failed to create table {table}"),
                    AuditStatus::Failed,
                    json!({ "tableName": table, "error": error }),
                );
                MigrationAction::failed(MigrationKind::CreateTable, table, error)
            }
        }
    }

    /// Add a missing column under additive-column rules.
    ///
    /// Never emits PRIMARY KEY. NOT NULL is emitted only paired with a
    /// default; when the schema gave none, a type-appropriate default is
    /// synthesized so pre-existing rows remain valid.
    pub async fn add_column(&self, table: &str, column: &ColumnDefinition) -> MigrationAction {
        if let Err(error) = check_ddl_identifiers([table, column.column_name.as_str()]) {
            self.audit.log_migration(
                self.tenant_id,
                self.module_id,
                "ADD_COLUMN",
                &format!("Rejected column {} on {table}: {error}", column.column_name),
                AuditStatus::Failed,
                json!({
                    "tableName": table,
                    "columnName": column.column_name,
                    "error": error,
                    "reason": "INVALID_IDENTIFIER",
                }),
            );
            let mut action = MigrationAction::failed(MigrationKind::AddColumn, table, error);
            action.column_name = Some(column.column_name.clone());
            return action;
        }

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table,
            render_added_column(column)
        );

        let mut action = match self.db.execute(&sql).await {
            Ok(_) => {
                self.audit.log_ddl(
                    self.tenant_id,
                    self.module_id,
                    "ADD_COLUMN",
                    &sql,
                    AuditStatus::Success,
                    json!({
                        "tableName": table,
                        "columnName": column.column_name,
                        "columnType": column.sql_type,
                    }),
                );
                self.audit.log_migration(
                    self.tenant_id,
                    self.module_id,
                    "ADD_COLUMN",
                    &format!("Added column {} to {table}", column.column_name),
                    AuditStatus::Success,
                    json!({ "tableName": table, "columnName": column.column_name, "sql": sql }),
                );
                MigrationAction::executed(MigrationKind::AddColumn, table, sql)
            }
            Err(e) => {
                let error = e.to_string();
                self.audit.log_ddl(
                    self.tenant_id,
                    self.module_id,
                    "ADD_COLUMN",
                    &sql,
                    AuditStatus::Failed,
                    json!({ "tableName": table, "columnName": column.column_name, "error": error }),
                );
                self.audit.log_migration(
                    self.tenant_id,
                    self.module_id,
                    "ADD_COLUMN",
                    &format!("Failed to add column {} to {table}", column.column_name),
                    AuditStatus::Failed,
                    json!({ "tableName": table, "columnName": column.column_name, "error": error }),
                );
                MigrationAction::failed(MigrationKind::AddColumn, table, error)
            }
        };
        action.column_name = Some(column.column_name.clone());
        action
    }

    /// Advisory outcome for an in-place type change. Never executes SQL.
    ///
    /// Changing a column's type requires table reconstruction (build new,
    /// copy, swap) and is intentionally excluded from automation to avoid
    /// silent data loss.
    pub fn modify_column_type(
        &self,
        table: &str,
        column_name: &str,
        expected_type: &str,
    ) -> MigrationAction {
        self.audit.log_migration(
            self.tenant_id,
            self.module_id,
            "MODIFY_COLUMN_TYPE",
            &format!("Column {column_name} in {table} has type mismatch. Manual migration required."),
            AuditStatus::Warning,
            json!({
                "tableName": table,
                "columnName": column_name,
                "expectedType": expected_type,
                "action": "REQUIRES_MANUAL_MIGRATION",
                "reason": "In-place ALTER COLUMN TYPE is not supported. Table reconstruction required.",
            }),
        );

        warn!(
            table,
            column = column_name,
            expected = expected_type,
            "Type mismatch requires manual migration"
        );

        MigrationAction {
            kind: MigrationKind::ModifyColumnType,
            table_name: table.to_string(),
            column_name: Some(column_name.to_string()),
            index_name: None,
            success: false,
            sql: None,
            error: None,
            warning: true,
            requires_manual_migration: true,
        }
    }

    /// Apply the corrective actions for one validated table.
    ///
    /// A missing table becomes a single CREATE_TABLE. Otherwise each
    /// missing column becomes one ADD_COLUMN, and each type mismatch one
    /// advisory. Nullability, primary-key, and extra-column drift is
    /// reported only - never auto-corrected.
    pub async fn migrate_table(
        &self,
        table: &str,
        validation: &TableValidation,
        expected: &[ColumnDefinition],
    ) -> Vec<MigrationAction> {
        let mut actions = Vec::new();

        if !validation.exists {
            actions.push(self.create_table(table, expected).await);
            return actions;
        }

        for missing in &validation.missing_columns {
            let Some(name) = missing.column_name.as_deref() else {
                continue;
            };
            let column = expected
                .iter()
                .find(|col| col.column_name.eq_ignore_ascii_case(name));
            if let Some(column) = column {
                actions.push(self.add_column(table, column).await);
            }
        }

        for mismatch in &validation.type_mismatches {
            if mismatch.kind != DifferenceKind::TypeMismatch {
                continue;
            }
            let Some(name) = mismatch.column_name.as_deref() else {
                continue;
            };
            actions.push(self.modify_column_type(table, name, &mismatch.expected));
        }

        actions
    }

    /// Drive [`Self::migrate_table`] for every table in the report, in
    /// report order.
    pub async fn migrate_schema(
        &self,
        definition: &SchemaDefinition,
        report: &SchemaValidationReport,
    ) -> Vec<MigrationAction> {
        let mut actions = Vec::new();

        for validation in &report.tables {
            let table = definition
                .tables
                .iter()
                .find(|t| t.table_name() == validation.table_name);
            let Some(table) = table else {
                continue;
            };

            let resolved = table.resolve();
            let table_actions = self
                .migrate_table(&resolved.table_name, validation, &resolved.columns)
                .await;
            actions.extend(table_actions);
        }

        actions
    }

    /// Create declared indexes that do not exist yet.
    ///
    /// Index names default to `idx_<table>_<col1>_<col2>...` when the
    /// declaration gives none. Already-present indexes produce no action, so a repeat
    /// pass stays action-free; the SQL keeps IF NOT EXISTS regardless.
    pub async fn create_indexes(
        &self,
        table: &str,
        indexes: &[IndexSpec],
    ) -> Vec<MigrationAction> {
        let mut actions = Vec::new();

        for index in indexes {
            let index_name = index
                .name
                .clone()
                .unwrap_or_else(|| format!("idx_{}_{}", table, index.columns.join("_")));

            let names = std::iter::once(table)
                .chain(std::iter::once(index_name.as_str()))
                .chain(index.columns.iter().map(String::as_str));
            if let Err(error) = check_ddl_identifiers(names) {
                self.audit.log_migration(
                    self.tenant_id,
                    self.module_id,
                    "CREATE_INDEX",
                    &format!("Rejected index {index_name} on {table}: {error}"),
                    AuditStatus::Failed,
                    json!({
                        "tableName": table,
                        "indexName": index_name,
                        "error": error,
                        "reason": "INVALID_IDENTIFIER",
                    }),
                );
                let mut action = MigrationAction::failed(MigrationKind::CreateIndex, table, error);
                action.index_name = Some(index_name);
                actions.push(action);
                continue;
            }

            match self.db.index_exists(&index_name).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(index = %index_name, error = %e, "Index existence check failed");
                }
            }

            let unique = if index.unique { "UNIQUE " } else { "" };
            let sql = format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                unique,
                index_name,
                table,
                index.columns.join(", ")
            );

            let mut action = match self.db.execute(&sql).await {
                Ok(_) => {
                    self.audit.log_ddl(
                        self.tenant_id,
                        self.module_id,
                        "CREATE_INDEX",
                        &sql,
                        AuditStatus::Success,
                        json!({ "tableName": table, "indexName": index_name, "columns": index.columns }),
                    );
                    MigrationAction::executed(MigrationKind::CreateIndex, table, sql)
                }
                Err(e) => {
                    let error = e.to_string();
                    self.audit.log_ddl(
                        self.tenant_id,
                        self.module_id,
                        "CREATE_INDEX",
                        &sql,
                        AuditStatus::Failed,
                        json!({ "tableName": table, "indexName": index_name, "error": error }),
                    );
                    MigrationAction::failed(MigrationKind::CreateIndex, table, error)
                }
            };
            action.index_name = Some(index_name);
            actions.push(action);
        }

        actions
    }
}

/// Screen every name bound for DDL text.
///
/// Rendered DDL uses bare identifiers, so table, column, and index names
/// outside the bare-identifier rules are refused before any SQL is built.
/// The caller turns the message into a failed action; the database is
/// never touched.
fn check_ddl_identifiers<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), String> {
    for name in names {
        validate_bare_identifier(name).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Render the column clause for ALTER TABLE ADD COLUMN.
///
/// Distinct from [`ColumnDefinition::render`]: added columns may not carry
/// PRIMARY KEY, and NOT NULL must come with a default.
fn render_added_column(column: &ColumnDefinition) -> String {
    let mut def = format!("{} {}", column.column_name, column.sql_type);

    let explicit_default = column
        .default_value
        .as_ref()
        .map(crate::typemap::render_default);

    if !column.nullable {
        let default =
            explicit_default.unwrap_or_else(|| column.sql_type.synthesized_default().to_string());
        def.push_str(" NOT NULL DEFAULT ");
        def.push_str(&default);
    } else if let Some(default) = explicit_default {
        def.push_str(" DEFAULT ");
        def.push_str(&default);
    }

    def
}
