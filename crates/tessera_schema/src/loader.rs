//! Schema-definition discovery and loading.
//!
//! Sources live at `<root>/<tenant>/<module>/schema/definition.json`.
//! Tenants or modules without a definition are simply absent from the
//! result, and one corrupt artifact never prevents the others from
//! loading - the failure is logged and the source skipped.

use crate::error::SchemaError;
use crate::model::{DefinitionFile, SchemaDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Relative location of the definition artifact inside a module directory.
const DEFINITION_RELATIVE: &str = "schema/definition.json";

/// One discovered (tenant, module) schema source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub tenant_id: String,
    pub module_id: String,
    pub path: PathBuf,
}

/// Enumerate every (tenant, module) pair under `root` that has a schema
/// definition artifact. Never an error: an unreadable root yields an empty
/// list with a diagnostic warning.
pub fn discover(root: &Path) -> Vec<SchemaSource> {
    let mut sources = Vec::new();

    for tenant_dir in subdirectories(root) {
        let tenant_id = match dir_name(&tenant_dir) {
            Some(name) => name,
            None => continue,
        };

        for module_dir in subdirectories(&tenant_dir) {
            let module_id = match dir_name(&module_dir) {
                Some(name) => name,
                None => continue,
            };

            let path = module_dir.join(DEFINITION_RELATIVE);
            if path.is_file() {
                sources.push(SchemaSource {
                    tenant_id: tenant_id.clone(),
                    module_id,
                    path,
                });
            }
        }
    }

    // Deterministic sweep order across platforms.
    sources.sort_by(|a, b| {
        (a.tenant_id.as_str(), a.module_id.as_str())
            .cmp(&(b.tenant_id.as_str(), b.module_id.as_str()))
    });
    sources
}

/// Read and parse one definition artifact.
///
/// Any I/O or JSON failure is logged as a warning and yields `None`;
/// callers skip the source rather than aborting the sweep.
pub fn parse_definition(path: &Path) -> Option<DefinitionFile> {
    match read_definition(path) {
        Ok(definition) => Some(definition),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable schema definition");
            None
        }
    }
}

fn read_definition(path: &Path) -> Result<DefinitionFile, SchemaError> {
    let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SchemaError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every successfully parsed schema definition under `root`.
pub fn load_all(root: &Path) -> Vec<SchemaDefinition> {
    let mut definitions = Vec::new();

    for source in discover(root) {
        let Some(file) = parse_definition(&source.path) else {
            continue;
        };

        debug!(
            tenant = %source.tenant_id,
            module = %source.module_id,
            tables = file.schema.tables.len(),
            "Loaded schema definition"
        );

        definitions.push(SchemaDefinition {
            tenant_id: source.tenant_id,
            module_id: source.module_id,
            name: file.schema.name,
            tables: file.schema.tables,
            path: source.path,
        });
    }

    definitions
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list schema source directory");
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
