//! Canonical SQL type buckets and the mappings into them.
//!
//! All cross-dialect comparison happens over exactly four buckets: TEXT,
//! INTEGER, REAL, BLOB. Both mapping directions are total functions -
//! unrecognized abstract field types collapse to TEXT, unrecognized raw
//! engine types pass through so a mismatch can still be reported against
//! something meaningful.

use serde::{Deserialize, Serialize};

/// One of the four canonical SQL type buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// Default literal used when a NOT NULL column is added to a table that
    /// already has rows and the schema gave no explicit default.
    ///
    /// This is a deliberate policy: existing rows must stay valid, so the
    /// migrator backfills the neutral value for the bucket.
    pub fn synthesized_default(&self) -> &'static str {
        match self {
            Self::Text => "''",
            Self::Integer => "0",
            Self::Real => "0.0",
            Self::Blob => "X''",
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an abstract schema field type to its canonical bucket.
///
/// Case and surrounding whitespace are ignored; anything unrecognized maps
/// to TEXT. Pure and total.
pub fn map_field_type(field_type: &str) -> SqlType {
    match field_type.trim().to_lowercase().as_str() {
        "string" | "text" | "json" => SqlType::Text,
        "integer" | "int" => SqlType::Integer,
        "number" | "real" | "float" | "double" => SqlType::Real,
        "boolean" | "bool" => SqlType::Integer,
        "timestamp" | "datetime" | "date" | "time" => SqlType::Text,
        "blob" => SqlType::Blob,
        _ => SqlType::Text,
    }
}

/// Normalize a raw engine type for comparison.
///
/// Strips any parameter suffix (`VARCHAR(255)` -> `VARCHAR`), uppercases,
/// and folds engine aliases into the canonical buckets. Unknown base types
/// pass through unchanged so TYPE_MISMATCH still compares real names.
pub fn normalize_sql_type(raw: &str) -> String {
    let base = raw
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase();

    match base.as_str() {
        "VARCHAR" | "CHAR" | "CHARACTER" | "NCHAR" | "NVARCHAR" | "CLOB" | "TEXT" => {
            "TEXT".to_string()
        }
        "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "INTEGER" => {
            "INTEGER".to_string()
        }
        "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" | "REAL" => "REAL".to_string(),
        _ => base,
    }
}

/// Render a schema default value as a SQL literal.
///
/// Strings are single-quoted with embedded quotes doubled; booleans render
/// as 1/0 since they live in the INTEGER bucket; structured values are
/// stored as their JSON text.
pub fn render_default(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "NULL".to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_types_map_to_expected_buckets() {
        assert_eq!(map_field_type("string"), SqlType::Text);
        assert_eq!(map_field_type("json"), SqlType::Text);
        assert_eq!(map_field_type("int"), SqlType::Integer);
        assert_eq!(map_field_type("boolean"), SqlType::Integer);
        assert_eq!(map_field_type("number"), SqlType::Real);
        assert_eq!(map_field_type("double"), SqlType::Real);
        assert_eq!(map_field_type("timestamp"), SqlType::Text);
        assert_eq!(map_field_type("blob"), SqlType::Blob);
    }

    #[test]
    fn field_type_mapping_is_case_and_whitespace_insensitive() {
        assert_eq!(map_field_type("  STRING "), SqlType::Text);
        assert_eq!(map_field_type("Integer"), SqlType::Integer);
        assert_eq!(map_field_type("\tBOOL\n"), SqlType::Integer);
    }

    #[test]
    fn unknown_field_types_default_to_text() {
        assert_eq!(map_field_type("geometry"), SqlType::Text);
        assert_eq!(map_field_type(""), SqlType::Text);
    }

    #[test]
    fn raw_types_normalize_to_buckets() {
        assert_eq!(normalize_sql_type("VARCHAR(255)"), "TEXT");
        assert_eq!(normalize_sql_type("varchar"), "TEXT");
        assert_eq!(normalize_sql_type("BIGINT"), "INTEGER");
        assert_eq!(normalize_sql_type("decimal(10, 2)"), "REAL");
        assert_eq!(normalize_sql_type("DOUBLE"), "REAL");
        assert_eq!(normalize_sql_type("TEXT"), "TEXT");
        assert_eq!(normalize_sql_type("BLOB"), "BLOB");
    }

    #[test]
    fn unknown_raw_types_pass_through() {
        assert_eq!(normalize_sql_type("GEOMETRY"), "GEOMETRY");
        assert_eq!(normalize_sql_type("uuid(16)"), "UUID");
    }

    #[test]
    fn synthesized_defaults_per_bucket() {
        assert_eq!(SqlType::Text.synthesized_default(), "''");
        assert_eq!(SqlType::Integer.synthesized_default(), "0");
        assert_eq!(SqlType::Real.synthesized_default(), "0.0");
        assert_eq!(SqlType::Blob.synthesized_default(), "X''");
    }

    #[test]
    fn default_literals_render_safely() {
        use serde_json::json;
        assert_eq!(render_default(&json!("pending")), "'pending'");
        assert_eq!(render_default(&json!("it's")), "'it''s'");
        assert_eq!(render_default(&json!(42)), "42");
        assert_eq!(render_default(&json!(1.5)), "1.5");
        assert_eq!(render_default(&json!(true)), "1");
        assert_eq!(render_default(&json!(null)), "NULL");
    }
}
