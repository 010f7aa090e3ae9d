//! `tessera discover`: enumerate schema definitions under the data root.

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tessera_schema::load_all;

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Data root containing {tenant}/{module}/schema/definition.json trees
    #[arg(long, env = "TESSERA_ROOT")]
    pub root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: DiscoverArgs) -> Result<ExitCode> {
    let definitions = load_all(&args.root);

    if args.json {
        let entries: Vec<_> = definitions
            .iter()
            .map(|d| {
                json!({
                    "tenantId": d.tenant_id,
                    "moduleId": d.module_id,
                    "schemaName": d.name,
                    "tables": d.tables.iter().map(|t| t.table_name()).collect::<Vec<_>>(),
                    "path": d.path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::SUCCESS);
    }

    if definitions.is_empty() {
        println!("No schema definitions found under {}", args.root.display());
        return Ok(ExitCode::SUCCESS);
    }

    for definition in &definitions {
        println!(
            "{}/{}: schema '{}' ({} tables)",
            definition.tenant_id,
            definition.module_id,
            definition.name,
            definition.tables.len()
        );
        for table in &definition.tables {
            println!(
                "  {} ({} fields, {} indexes)",
                table.table_name(),
                table.fields.len(),
                table.indexes.len()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
