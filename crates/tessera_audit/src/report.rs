//! On-demand migration report artifact.
//!
//! One timestamped JSON document per reconciliation pass that performed
//! work, written for operator review. Reports are never replayed by the
//! engine.

use crate::AuditLogger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, warn};

/// Machine-readable summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub generated_at: DateTime<Utc>,
    pub tenant_id: String,
    pub module_id: String,
    pub total_actions: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Actions that require manual follow-up (type-change advisories)
    pub advisories: usize,
    pub actions: Value,
}

impl AuditLogger {
    /// Write a migration report for one pass, returning its path.
    ///
    /// `actions` is the serialized action list; each element is expected to
    /// carry `success` and `warning` booleans. Returns `None` when there is
    /// nothing to report or when the report could not be written - like
    /// every audit call, this never fails the pass it is describing.
    pub fn create_migration_report(
        &self,
        tenant: &str,
        module: &str,
        actions: Value,
    ) -> Option<PathBuf> {
        let tenant = tenant.trim();
        let module = module.trim();
        if tenant.is_empty() || module.is_empty() {
            warn!("Cannot create migration report: missing tenant or module id");
            return None;
        }

        let list = actions.as_array()?;
        if list.is_empty() {
            return None;
        }

        let succeeded = list
            .iter()
            .filter(|a| a.get("success").and_then(Value::as_bool) == Some(true))
            .count();
        let advisories = list
            .iter()
            .filter(|a| a.get("warning").and_then(Value::as_bool) == Some(true))
            .count();
        let failed = list.len() - succeeded - advisories;

        let report = MigrationReport {
            generated_at: Utc::now(),
            tenant_id: tenant.to_string(),
            module_id: module.to_string(),
            total_actions: list.len(),
            succeeded,
            failed,
            advisories,
            actions,
        };

        match self.write_report(tenant, module, &report) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(tenant, module, error = %e, "Failed to write migration report");
                None
            }
        }
    }

    fn write_report(
        &self,
        tenant: &str,
        module: &str,
        report: &MigrationReport,
    ) -> std::io::Result<PathBuf> {
        let dir = self.log_dir(tenant, module)?;
        let stamp = report
            .generated_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let path = dir.join(format!("migration-report-{stamp}.json"));
        let body = serde_json::to_string_pretty(report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, body)?;
        Ok(path)
    }
}
