//! In-memory schema model.
//!
//! The declarative side of reconciliation: what a tenant/module says its
//! tables should look like. Parsed from `definition.json` sources and
//! immutable once loaded; every reconciliation run re-reads its sources.

use crate::typemap::{map_field_type, render_default, SqlType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Top-level shape of a `definition.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionFile {
    pub schema: SchemaBody,
}

/// The `schema` object inside a definition artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBody {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

/// One declared table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    /// Physical table name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl TableSchema {
    /// The physical table name: `sqlName` override, else the logical name.
    pub fn table_name(&self) -> &str {
        self.sql_name.as_deref().unwrap_or(&self.name)
    }

    /// Expand this declaration into column definitions and carried-through
    /// index specs.
    pub fn resolve(&self) -> TableDefinition {
        let columns: Vec<ColumnDefinition> =
            self.fields.iter().map(ColumnDefinition::from_field).collect();
        let primary_keys = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.column_name.clone())
            .collect();

        TableDefinition {
            table_name: self.table_name().to_string(),
            columns,
            primary_keys,
            indexes: self.indexes.clone(),
        }
    }
}

/// One declared field, abstract-typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    /// Physical column name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    /// Abstract type string (`string`, `integer`, `timestamp`, ...)
    #[serde(rename = "type")]
    pub field_type: String,
    /// Fields default to nullable unless explicitly declared otherwise
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    /// The physical column name: `columnName` override, else the field name.
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }
}

/// A declared index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// One fully loaded schema definition for a (tenant, module) pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub tenant_id: String,
    pub module_id: String,
    /// Logical schema name from the definition artifact
    pub name: String,
    pub tables: Vec<TableSchema>,
    /// Source artifact this definition was parsed from
    pub path: PathBuf,
}

/// A column with its canonical SQL type, derived from a [`FieldDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub column_name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ColumnDefinition {
    pub fn from_field(field: &FieldDefinition) -> Self {
        Self {
            column_name: field.column_name().to_string(),
            sql_type: map_field_type(&field.field_type),
            nullable: field.nullable,
            primary_key: field.primary_key,
            unique: field.unique,
            default_value: field.default_value.clone(),
        }
    }

    /// Render the CREATE TABLE column clause for this definition.
    ///
    /// Constraint precedence: PRIMARY KEY, then NOT NULL (only when not
    /// primary key), then UNIQUE (only when not primary key), then DEFAULT.
    pub fn render(&self) -> String {
        let mut def = format!("{} {}", self.column_name, self.sql_type);

        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if !self.nullable && !self.primary_key {
            def.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            def.push_str(" UNIQUE");
        }
        if let Some(value) = &self.default_value {
            def.push_str(" DEFAULT ");
            def.push_str(&render_default(value));
        }

        def
    }
}

/// A resolved physical table: columns expanded, indexes carried through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_keys: Vec<String>,
    pub indexes: Vec<IndexSpec>,
}
