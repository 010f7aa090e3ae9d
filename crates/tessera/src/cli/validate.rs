//! `tessera validate`: read-only drift report.
//!
//! Exits non-zero when any table is missing or diverges, so the command
//! can gate deployment pipelines.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_db::TesseraDb;
use tessera_schema::{load_all, SchemaValidator};
use tracing::warn;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Data root containing {tenant}/{module}/schema/definition.json trees
    #[arg(long, env = "TESSERA_ROOT")]
    pub root: PathBuf,

    /// Path to the SQLite database to validate against
    #[arg(long, env = "TESSERA_DB")]
    pub db: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ValidateArgs) -> Result<ExitCode> {
    let db = TesseraDb::open_existing(&args.db)
        .await
        .with_context(|| format!("failed to open database {}", args.db.display()))?;

    let definitions = load_all(&args.root);
    let validator = SchemaValidator::new(&db);

    let mut reports = Vec::with_capacity(definitions.len());
    for definition in &definitions {
        reports.push(validator.validate_schema(definition).await);
    }
    db.close().await;

    let total_issues: usize = reports.iter().map(|r| r.summary.total_issues).sum();
    if total_issues > 0 {
        warn!(total_issues, "Schema drift detected");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "{}/{} ({}): {} tables, {} valid, {} missing, {} issues",
                report.tenant_id,
                report.module_id,
                report.schema_name,
                report.summary.total_tables,
                report.summary.valid_tables,
                report.summary.missing_tables,
                report.summary.total_issues,
            );
            for table in &report.tables {
                for diff in &table.differences {
                    println!(
                        "  [{}] {} {}: expected {}, actual {}",
                        diff.severity,
                        table.table_name,
                        diff.column_name.as_deref().unwrap_or("-"),
                        diff.expected,
                        diff.actual,
                    );
                }
            }
        }
        if total_issues == 0 {
            println!("All schemas match the live database.");
        }
    }

    if total_issues > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
