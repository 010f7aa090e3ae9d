//! Schema reconciliation engine.
//!
//! Keeps a live SQLite database's physical schema in sync with declarative
//! per-tenant definitions, using only additive, idempotent operations.
//! Drift that cannot be corrected without risking data - type changes,
//! nullability changes, primary-key changes, extra columns - is reported
//! and logged, never auto-fixed.
//!
//! Pipeline: [`loader`] parses definitions, [`validator`] diffs them
//! against the live schema, [`migrator`] applies the additive corrections,
//! and every decision lands in the [`tessera_audit`] trail. [`reconcile`]
//! drives the whole pass.

mod error;
pub mod loader;
pub mod migrator;
pub mod model;
pub mod reconcile;
pub mod typemap;
pub mod validator;

pub use error::SchemaError;
pub use loader::{discover, load_all, parse_definition, SchemaSource};
pub use migrator::{MigrationAction, MigrationKind, SchemaMigrator};
pub use model::{
    ColumnDefinition, DefinitionFile, FieldDefinition, IndexSpec, SchemaDefinition, TableDefinition,
    TableSchema,
};
pub use reconcile::{reconcile_all, reconcile_module, ModuleOutcome};
pub use typemap::{map_field_type, normalize_sql_type, SqlType};
pub use validator::{
    compare_columns, is_reserved_column, Difference, DifferenceKind, SchemaValidationReport,
    SchemaValidator, Severity, TableValidation,
};
