//! The reconciliation pass: load -> validate -> migrate -> log.
//!
//! One pass per (tenant, module) definition, tables processed
//! sequentially. Passes are idempotent: re-running against an unchanged
//! target produces zero differences and zero actions. Each pass is
//! independent, so a broken tenant never halts the sweep.

use crate::loader;
use crate::migrator::{MigrationAction, SchemaMigrator};
use crate::model::SchemaDefinition;
use crate::validator::{SchemaValidationReport, SchemaValidator};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tessera_audit::AuditLogger;
use tessera_db::TesseraDb;
use tracing::{error, info};

/// Everything one reconciliation pass produced.
#[derive(Debug)]
pub struct ModuleOutcome {
    pub tenant_id: String,
    pub module_id: String,
    pub report: SchemaValidationReport,
    pub actions: Vec<MigrationAction>,
    /// Written only when the pass performed or advised work
    pub report_path: Option<PathBuf>,
}

/// Run one complete pass for a single schema definition.
pub async fn reconcile_module(
    db: &TesseraDb,
    audit: &AuditLogger,
    definition: &SchemaDefinition,
) -> ModuleOutcome {
    let tenant = definition.tenant_id.as_str();
    let module = definition.module_id.as_str();

    let validator = SchemaValidator::new(db);
    let report = validator.validate_schema(definition).await;

    // One paired validation entry per table, drift or not.
    for table in &report.tables {
        let differences =
            serde_json::to_value(&table.differences).unwrap_or_else(|_| Value::Array(Vec::new()));
        audit.log_schema_validation(
            tenant,
            module,
            &table.table_name,
            differences,
            json!({
                "schemaName": report.schema_name,
                "exists": table.exists,
                "totalIssues": table.summary.total_issues,
            }),
        );
    }

    let migrator = SchemaMigrator::new(db, audit, tenant, module);
    let mut actions = migrator.migrate_schema(definition, &report).await;

    for table in &definition.tables {
        let index_actions = migrator
            .create_indexes(table.table_name(), &table.indexes)
            .await;
        actions.extend(index_actions);
    }

    let report_path = match serde_json::to_value(&actions) {
        Ok(serialized) => audit.create_migration_report(tenant, module, serialized),
        Err(e) => {
            error!(tenant, module, error = %e, "Failed to serialize migration actions");
            None
        }
    };

    info!(
        tenant,
        module,
        tables = report.summary.total_tables,
        issues = report.summary.total_issues,
        actions = actions.len(),
        "Reconciliation pass complete"
    );

    ModuleOutcome {
        tenant_id: definition.tenant_id.clone(),
        module_id: definition.module_id.clone(),
        report,
        actions,
        report_path,
    }
}

/// Reconcile every schema definition found under `root` against one
/// database, in discovery order.
pub async fn reconcile_all(db: &TesseraDb, audit: &AuditLogger, root: &Path) -> Vec<ModuleOutcome> {
    let definitions = loader::load_all(root);
    let mut outcomes = Vec::with_capacity(definitions.len());

    for definition in &definitions {
        outcomes.push(reconcile_module(db, audit, definition).await);
    }

    outcomes
}
