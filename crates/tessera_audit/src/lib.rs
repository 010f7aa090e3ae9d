//! Append-only audit log for DDL, DML, migration, and validation decisions.
//!
//! Entries are partitioned by (tenant, module, category, calendar day) under
//! `<root>/<tenant>/<module>/logs/<category>-<YYYY-MM-DD>.log`. The audit
//! channel is deliberately separate from `tracing`: tracing is the local
//! diagnostic stream, these files are the durable record operators read.
//!
//! Nothing in this crate returns an error to the caller. A migration must
//! never fail because its paper trail could not be written; write failures
//! are routed to `tracing::error!` and swallowed.

mod report;

pub use report::MigrationReport;

use chrono::Utc;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Audit entry category, one log file per category per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// Schema-changing statements (CREATE, ALTER)
    Ddl,
    /// Data statements, mostly recorded on failure
    Dml,
    /// Migration decisions, including advisory-only ones
    Migration,
    /// Validation outcomes per table
    Validation,
}

impl LogCategory {
    /// Lowercase file-name stem for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ddl => "ddl",
            Self::Dml => "dml",
            Self::Migration => "migration",
            Self::Validation => "validation",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Ddl => "DDL",
            Self::Dml => "DML",
            Self::Migration => "MIGRATION",
            Self::Validation => "VALIDATION",
        }
    }
}

/// Outcome of the operation being audited. The entry level derives from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Warning,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }

    fn level(&self) -> &'static str {
        match self {
            Self::Success => "INFO",
            Self::Warning => "WARN",
            Self::Failed => "ERROR",
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writer for the per-tenant/module audit files.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    root: PathBuf,
}

impl AuditLogger {
    /// Create a logger rooted at the tenant data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory the partition tree lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Log a DDL operation (CREATE TABLE, ADD COLUMN, CREATE INDEX).
    pub fn log_ddl(
        &self,
        tenant: &str,
        module: &str,
        operation: &str,
        sql: &str,
        status: AuditStatus,
        metadata: Value,
    ) {
        let Some((tenant, module)) = identity(tenant, module, "DDL") else {
            return;
        };
        let message = format!("DDL Operation: {operation}\nSQL: {sql}\nStatus: {status}");
        let metadata = merge(
            metadata,
            &[("operation", operation.into()), ("status", status.as_str().into()), ("sql", sql.into())],
        );
        self.append(tenant, module, LogCategory::Ddl, status.level(), &message, &metadata);
    }

    /// Log a DML operation against a managed table.
    pub fn log_dml(
        &self,
        tenant: &str,
        module: &str,
        operation: &str,
        table: &str,
        status: AuditStatus,
        metadata: Value,
    ) {
        let Some((tenant, module)) = identity(tenant, module, "DML") else {
            return;
        };
        let message = format!("DML Operation: {operation}\nTable: {table}\nStatus: {status}");
        let metadata = merge(
            metadata,
            &[
                ("operation", operation.into()),
                ("tableName", table.into()),
                ("status", status.as_str().into()),
            ],
        );
        self.append(tenant, module, LogCategory::Dml, status.level(), &message, &metadata);
    }

    /// Log a migration decision, including advisory-only outcomes.
    pub fn log_migration(
        &self,
        tenant: &str,
        module: &str,
        action: &str,
        details: &str,
        status: AuditStatus,
        metadata: Value,
    ) {
        let Some((tenant, module)) = identity(tenant, module, "migration") else {
            return;
        };
        let message = format!("Migration Action: {action}\nDetails: {details}\nStatus: {status}");
        let metadata = merge(
            metadata,
            &[("action", action.into()), ("status", status.as_str().into())],
        );
        self.append(
            tenant,
            module,
            LogCategory::Migration,
            status.level(),
            &message,
            &metadata,
        );
    }

    /// Log the validation outcome for one table.
    ///
    /// `differences` is the serialized difference list; a non-empty list
    /// raises the entry level to WARN.
    pub fn log_schema_validation(
        &self,
        tenant: &str,
        module: &str,
        table: &str,
        differences: Value,
        metadata: Value,
    ) {
        let Some((tenant, module)) = identity(tenant, module, "schema validation") else {
            return;
        };
        let has_differences = differences.as_array().map(|a| !a.is_empty()).unwrap_or(false);
        let level = if has_differences { "WARN" } else { "INFO" };
        let message = format!(
            "Schema Validation: {table}\nDifferences Found: {}",
            if has_differences { "YES" } else { "NO" }
        );
        let metadata = merge(
            metadata,
            &[("tableName", table.into()), ("differences", differences)],
        );
        self.append(tenant, module, LogCategory::Validation, level, &message, &metadata);
    }

    /// Resolve (and create) the log directory for one tenant/module.
    fn log_dir(&self, tenant: &str, module: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join(tenant).join(module).join("logs");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn append(
        &self,
        tenant: &str,
        module: &str,
        category: LogCategory,
        level: &str,
        message: &str,
        metadata: &Value,
    ) {
        let entry = format_entry(level, category.label(), message, metadata);
        if let Err(e) = self.append_raw(tenant, module, category, &entry) {
            error!(
                tenant,
                module,
                category = category.as_str(),
                error = %e,
                "Failed to write audit entry"
            );
        }
    }

    fn append_raw(
        &self,
        tenant: &str,
        module: &str,
        category: LogCategory,
        entry: &str,
    ) -> std::io::Result<()> {
        let dir = self.log_dir(tenant, module)?;
        let date = Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("{}-{}.log", category.as_str(), date));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(entry.as_bytes())
    }
}

/// Reject calls that arrive without a tenant/module identity.
///
/// Returns the trimmed pair, or `None` after a diagnostic warning. Audit
/// calls are best-effort; they must never block the primary operation.
fn identity<'a>(tenant: &'a str, module: &'a str, what: &str) -> Option<(&'a str, &'a str)> {
    let tenant = tenant.trim();
    let module = module.trim();
    if tenant.is_empty() || module.is_empty() {
        warn!("Cannot log {what}: missing tenant or module id");
        return None;
    }
    Some((tenant, module))
}

/// Render one human-readable entry block.
fn format_entry(level: &str, category: &str, message: &str, metadata: &Value) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let meta = match metadata {
        Value::Object(map) if map.is_empty() => String::new(),
        other => match serde_json::to_string_pretty(other) {
            Ok(pretty) => format!("Metadata: {pretty}\n"),
            Err(_) => String::new(),
        },
    };
    format!(
        "[{timestamp}] [{level}] [{category}]\n{message}\n{meta}\n{}\n",
        "=".repeat(80)
    )
}

/// Fold operation-specific fields into the caller-supplied metadata object.
fn merge(metadata: Value, fields: &[(&str, Value)]) -> Value {
    let mut map = match metadata {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("extra".to_string(), other);
            map
        }
    };
    for (key, value) in fields {
        map.entry(key.to_string()).or_insert_with(|| value.clone());
    }
    Value::Object(map)
}
