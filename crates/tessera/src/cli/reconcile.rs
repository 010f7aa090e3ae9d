//! `tessera reconcile`: apply additive migrations and write the audit trail.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_audit::AuditLogger;
use tessera_db::TesseraDb;
use tessera_schema::reconcile_all;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Data root containing {tenant}/{module}/schema/definition.json trees
    #[arg(long, env = "TESSERA_ROOT")]
    pub root: PathBuf,

    /// Path to the SQLite database (created if absent)
    #[arg(long, env = "TESSERA_DB")]
    pub db: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ReconcileArgs) -> Result<ExitCode> {
    let db = TesseraDb::open(&args.db)
        .await
        .with_context(|| format!("failed to open database {}", args.db.display()))?;
    let audit = AuditLogger::new(&args.root);

    let outcomes = reconcile_all(&db, &audit, &args.root).await;
    db.close().await;

    let failed: usize = outcomes
        .iter()
        .flat_map(|o| &o.actions)
        .filter(|a| !a.success && !a.warning)
        .count();
    let advisories: usize = outcomes
        .iter()
        .flat_map(|o| &o.actions)
        .filter(|a| a.requires_manual_migration)
        .count();

    info!(
        modules = outcomes.len(),
        failed, advisories, "Reconciliation sweep complete"
    );
    if failed > 0 {
        warn!(failed, "Some migration actions failed; see the audit logs");
    }

    if args.json {
        let entries: Vec<_> = outcomes
            .iter()
            .map(|o| {
                json!({
                    "tenantId": o.tenant_id,
                    "moduleId": o.module_id,
                    "report": o.report,
                    "actions": o.actions,
                    "reportPath": o.report_path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for outcome in &outcomes {
            println!(
                "{}/{}: {} tables, {} issues, {} actions",
                outcome.tenant_id,
                outcome.module_id,
                outcome.report.summary.total_tables,
                outcome.report.summary.total_issues,
                outcome.actions.len(),
            );
            for action in &outcome.actions {
                let status = if action.success {
                    "ok"
                } else if action.warning {
                    "manual"
                } else {
                    "failed"
                };
                println!(
                    "  [{status}] {:?} {} {}",
                    action.kind,
                    action.table_name,
                    action.column_name.as_deref().unwrap_or(""),
                );
            }
            if let Some(path) = &outcome.report_path {
                println!("  report: {}", path.display());
            }
        }
        if advisories > 0 {
            println!("{advisories} change(s) require manual migration; see the migration logs.");
        }
    }

    if failed > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
