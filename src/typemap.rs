//! Oracle → PostgreSQL type mapping
//!
//! Declared type names are canonicalized to lowercase and mapped to the
//! closest PostgreSQL type. `DATE` maps to `timestamp` because Oracle dates
//! carry a time component.

use crate::parser::ast::DataType;

/// Coarse Oracle type categories used by expression inference and by the
/// TRUNC/ROUND date-vs-number disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleType {
    Number,
    Varchar2,
    Char,
    Date,
    Timestamp,
    Boolean,
    Clob,
    Blob,
    /// Object type with its name, for method resolution.
    Object(String),
    /// Inline record / collection (jsonb-encoded).
    Composite,
    Unknown,
}

impl OracleType {
    pub fn is_datetime(&self) -> bool {
        matches!(self, OracleType::Date | OracleType::Timestamp)
    }

    pub fn is_stringy(&self) -> bool {
        matches!(
            self,
            OracleType::Varchar2 | OracleType::Char | OracleType::Clob
        )
    }
}

/// Category of a declared scalar type name.
pub fn scalar_category(name: &str) -> OracleType {
    match name.to_lowercase().as_str() {
        "number" | "integer" | "int" | "smallint" | "pls_integer" | "binary_integer" | "float"
        | "real" | "binary_float" | "binary_double" | "dec" | "decimal" | "numeric" => {
            OracleType::Number
        }
        "varchar2" | "varchar" | "nvarchar2" | "long" | "rowid" => OracleType::Varchar2,
        "char" | "nchar" => OracleType::Char,
        "date" => OracleType::Date,
        "timestamp" => OracleType::Timestamp,
        "boolean" => OracleType::Boolean,
        "clob" | "nclob" => OracleType::Clob,
        "blob" | "raw" => OracleType::Blob,
        _ => OracleType::Unknown,
    }
}

/// PostgreSQL rendering of an Oracle scalar type with optional precision.
pub fn pg_scalar(name: &str, precision: Option<(u64, Option<u64>)>) -> String {
    let lower = name.to_lowercase();
    match lower.as_str() {
        "number" | "dec" | "decimal" | "numeric" => match precision {
            Some((p, Some(s))) => format!("numeric({p},{s})"),
            Some((p, None)) => format!("numeric({p})"),
            None => "numeric".to_string(),
        },
        "integer" | "int" | "pls_integer" | "binary_integer" => "integer".to_string(),
        "smallint" => "smallint".to_string(),
        "varchar2" | "varchar" | "nvarchar2" => match precision {
            Some((p, _)) => format!("varchar({p})"),
            None => "text".to_string(),
        },
        "char" | "nchar" => match precision {
            Some((p, _)) => format!("char({p})"),
            None => "char(1)".to_string(),
        },
        "date" => "timestamp".to_string(),
        "timestamp" => "timestamp".to_string(),
        "clob" | "nclob" | "long" => "text".to_string(),
        "blob" | "raw" => "bytea".to_string(),
        "boolean" => "boolean".to_string(),
        "float" | "binary_double" => "double precision".to_string(),
        "real" | "binary_float" => "real".to_string(),
        "rowid" => "varchar(18)".to_string(),
        "sys_refcursor" => "refcursor".to_string(),
        other => other.to_string(),
    }
}

/// PostgreSQL rendering of a parsed data type. `%TYPE`, `%ROWTYPE` and named
/// inline types are resolved by the declaration translator before reaching
/// this point; the fallbacks here keep the mapping total.
pub fn pg_type(dt: &DataType) -> String {
    match dt {
        DataType::Scalar { name, precision } => pg_scalar(name, *precision),
        DataType::Named(chain) => chain.joined(),
        DataType::TypeOf(_) | DataType::RowOf(_) => "jsonb".to_string(),
    }
}

/// The value a package-variable getter falls back to when the session key is
/// unset and the variable carries no default.
pub fn pg_default_literal(pg_type: &str) -> &'static str {
    let base = pg_type.split('(').next().unwrap_or(pg_type);
    match base {
        "numeric" | "integer" | "smallint" | "double precision" | "real" => "0",
        "boolean" => "false",
        "timestamp" => "CURRENT_TIMESTAMP",
        "jsonb" => "'{}'::jsonb",
        _ => "''",
    }
}

/// Category of a parsed data type, for inference.
pub fn category(dt: &DataType) -> OracleType {
    match dt {
        DataType::Scalar { name, .. } => scalar_category(name),
        DataType::Named(_) => OracleType::Unknown,
        DataType::TypeOf(_) => OracleType::Unknown,
        DataType::RowOf(_) => OracleType::Composite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_precision_renders_into_numeric() {
        assert_eq!(pg_scalar("NUMBER", Some((10, Some(2)))), "numeric(10,2)");
        assert_eq!(pg_scalar("NUMBER", Some((10, None))), "numeric(10)");
        assert_eq!(pg_scalar("NUMBER", None), "numeric");
    }

    #[test]
    fn varchar2_without_length_becomes_text() {
        assert_eq!(pg_scalar("VARCHAR2", Some((100, None))), "varchar(100)");
        assert_eq!(pg_scalar("VARCHAR2", None), "text");
    }

    #[test]
    fn oracle_date_keeps_its_time_component() {
        assert_eq!(pg_scalar("DATE", None), "timestamp");
        assert!(scalar_category("date").is_datetime());
    }

    #[test]
    fn lob_types_map_to_text_and_bytea() {
        assert_eq!(pg_scalar("CLOB", None), "text");
        assert_eq!(pg_scalar("BLOB", None), "bytea");
    }

    #[test]
    fn getter_fallback_literals_by_base_type() {
        assert_eq!(pg_default_literal("numeric(10,2)"), "0");
        assert_eq!(pg_default_literal("varchar(30)"), "''");
        assert_eq!(pg_default_literal("boolean"), "false");
        assert_eq!(pg_default_literal("timestamp"), "CURRENT_TIMESTAMP");
    }
}
