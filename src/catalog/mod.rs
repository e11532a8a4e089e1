//! Metadata catalog and indices
//!
//! The catalog is built once from the extractor's output and is immutable
//! for the lifetime of a translation job, so it can be shared by reference
//! across parallel translations. Every lookup is by case-insensitive name;
//! keys are normalized to lowercase at insert time and lookups normalize the
//! probe, so the hot path stays O(1) hash probes.

pub mod builder;
pub mod load;

pub use builder::CatalogBuilder;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inline collection / record type definition. This is the unit stored in
/// package signatures and in the per-translation type registry. Phase-1
/// conversion is always jsonb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineTypeDef {
    pub name: String,
    pub category: TypeCategory,
    /// Ordered fields for RECORD / ROWTYPE.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Element type (PostgreSQL form) for collections.
    #[serde(default)]
    pub element_type: Option<String>,
    /// Key type (PostgreSQL form) for INDEX BY tables.
    #[serde(default)]
    pub key_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub oracle_type: String,
    pub pg_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Record,
    TableOf,
    Varray,
    IndexBy,
    RowType,
    TypeReference,
}

impl InlineTypeDef {
    pub fn is_collection(&self) -> bool {
        matches!(
            self.category,
            TypeCategory::TableOf | TypeCategory::Varray
        )
    }

    pub fn is_map(&self) -> bool {
        self.category == TypeCategory::IndexBy
    }

    pub fn is_record(&self) -> bool {
        matches!(self.category, TypeCategory::Record | TypeCategory::RowType)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        let name = name.to_lowercase();
        self.fields.iter().find(|f| f.name == name)
    }

    /// The empty-value literal this category initializes to.
    pub fn empty_literal(&self) -> &'static str {
        if self.is_collection() {
            "'[]'::jsonb"
        } else {
            "'{}'::jsonb"
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// `schema.table` → table metadata.
    tables: HashMap<String, TableMeta>,
    /// Object type name → definition.
    types: HashMap<String, TypeMeta>,
    /// `schema.package` → signature.
    packages: HashMap<String, PackageSig>,
    /// `schema.synonym` → (target schema, target object).
    synonyms: HashMap<String, (String, String)>,
}

#[derive(Debug, Clone)]
pub struct TableMeta {
    pub schema: String,
    pub name: String,
    /// Columns in definition order; order matters for `SELECT *` and
    /// `%ROWTYPE` field layout.
    pub columns: Vec<ColumnMeta>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        let name = name.to_lowercase();
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub oracle_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct TypeMeta {
    pub name: String,
    /// Attribute name → Oracle type, in declaration order.
    pub attributes: Vec<(String, String)>,
    pub methods: Vec<MethodSig>,
}

impl TypeMeta {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t.as_str())
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        let name = name.to_lowercase();
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageSig {
    pub schema: String,
    pub name: String,
    pub functions: HashMap<String, SubprogramMeta>,
    pub procedures: HashMap<String, SubprogramMeta>,
    /// Public variable name → Oracle type.
    pub variables: HashMap<String, String>,
    pub types: HashMap<String, InlineTypeDef>,
}

#[derive(Debug, Clone, Default)]
pub struct SubprogramMeta {
    pub params: Vec<ParamMeta>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParamMeta {
    pub name: String,
    pub oracle_type: String,
}

/// A table-position identifier after synonym and schema resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTable {
    pub schema: String,
    pub name: String,
    /// False when the name resolved to nothing in the catalog and the
    /// current schema was assumed.
    pub in_catalog: bool,
}

fn key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema.to_lowercase(), name.to_lowercase())
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, table: TableMeta) {
        self.tables.insert(key(&table.schema, &table.name), table);
    }

    pub fn insert_type(&mut self, ty: TypeMeta) {
        self.types.insert(ty.name.to_lowercase(), ty);
    }

    pub fn insert_package(&mut self, sig: PackageSig) {
        self.packages.insert(key(&sig.schema, &sig.name), sig);
    }

    pub fn insert_synonym(&mut self, schema: &str, name: &str, target_schema: &str, target: &str) {
        self.synonyms.insert(
            key(schema, name),
            (target_schema.to_lowercase(), target.to_lowercase()),
        );
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&TableMeta> {
        self.tables.get(&key(schema, name))
    }

    pub fn has_table(&self, schema: &str, name: &str) -> bool {
        self.tables.contains_key(&key(schema, name))
    }

    /// `schema.table.column` → Oracle type, for `%TYPE` resolution.
    pub fn column_type(&self, schema: &str, table: &str, column: &str) -> Option<&str> {
        self.table(schema, table)?
            .column(column)
            .map(|c| c.oracle_type.as_str())
    }

    pub fn object_type(&self, name: &str) -> Option<&TypeMeta> {
        self.types.get(&name.to_lowercase())
    }

    pub fn package(&self, schema: &str, name: &str) -> Option<&PackageSig> {
        self.packages.get(&key(schema, name))
    }

    pub fn package_function(
        &self,
        schema: &str,
        package: &str,
        name: &str,
    ) -> Option<&SubprogramMeta> {
        let sig = self.package(schema, package)?;
        let name = name.to_lowercase();
        sig.functions.get(&name).or_else(|| sig.procedures.get(&name))
    }

    pub fn package_variable_type(
        &self,
        schema: &str,
        package: &str,
        name: &str,
    ) -> Option<&str> {
        self.package(schema, package)?
            .variables
            .get(&name.to_lowercase())
            .map(|s| s.as_str())
    }

    fn synonym_target(&self, schema: &str, name: &str) -> Option<&(String, String)> {
        self.synonyms
            .get(&key(schema, name))
            .or_else(|| self.synonyms.get(&key("public", name)))
    }

    /// Resolve a table-position identifier.
    ///
    /// Qualified names pass through as written. For unqualified names,
    /// synonym resolution is applied first — a private synonym in the
    /// current schema, then a PUBLIC one — and only then is the name tried
    /// as a table of the current schema. A name matching nothing is assumed
    /// to live in the current schema (`in_catalog: false`) so emission can
    /// still qualify it.
    pub fn resolve_table(&self, current_schema: &str, parts: &[String]) -> ResolvedTable {
        let current = current_schema.to_lowercase();
        if parts.len() >= 2 {
            let schema = parts[0].to_lowercase();
            let name = parts[1].to_lowercase();
            let in_catalog = self.has_table(&schema, &name);
            return ResolvedTable {
                schema,
                name,
                in_catalog,
            };
        }
        let name = parts[0].to_lowercase();
        if let Some((target_schema, target)) = self.synonym_target(&current, &name) {
            let in_catalog = self.has_table(target_schema, target);
            return ResolvedTable {
                schema: target_schema.clone(),
                name: target.clone(),
                in_catalog,
            };
        }
        let in_catalog = self.has_table(&current, &name);
        ResolvedTable {
            schema: current,
            name,
            in_catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false)
                    .column("ename", "VARCHAR2", true)
                    .column("home_addr", "ADDRESS_T", true);
            })
            .object_type("address_t", |t| {
                t.attribute("street", "VARCHAR2")
                    .attribute("city", "VARCHAR2")
                    .method("format", &[]);
            })
            .package("hr", "pay", |p| {
                p.variable("g_rate", "NUMBER")
                    .function("net", &[("p_amt", "NUMBER")], Some("NUMBER"));
            })
            .synonym("public", "e", "hr", "emp")
            .synonym("hr", "staff", "hr", "emp")
            .build()
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let cat = sample();
        assert!(cat.has_table("HR", "EMP"));
        assert_eq!(cat.column_type("hr", "emp", "EMPNO"), Some("NUMBER"));
        assert!(cat.package("HR", "Pay").is_some());
    }

    #[test]
    fn unqualified_table_without_synonym_resolves_in_current_schema() {
        let cat = sample();
        let resolved = cat.resolve_table("hr", &["emp".to_string()]);
        assert_eq!(resolved.schema, "hr");
        assert!(resolved.in_catalog);
    }

    #[test]
    fn private_synonym_wins_over_public() {
        let cat = sample();
        let resolved = cat.resolve_table("hr", &["staff".to_string()]);
        assert_eq!(resolved.name, "emp");
        assert!(resolved.in_catalog);
    }

    #[test]
    fn synonym_resolution_applies_before_the_table_lookup() {
        // A synonym shadowing a same-named local table wins.
        let cat = CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false);
            })
            .table("archive", "emp_old", |t| {
                t.column("empno", "NUMBER", false);
            })
            .synonym("hr", "emp", "archive", "emp_old")
            .build();
        let resolved = cat.resolve_table("hr", &["emp".to_string()]);
        assert_eq!(
            (resolved.schema.as_str(), resolved.name.as_str()),
            ("archive", "emp_old")
        );
        assert!(resolved.in_catalog);
    }

    #[test]
    fn public_synonym_resolves_when_nothing_local_matches() {
        let cat = sample();
        let resolved = cat.resolve_table("scott", &["e".to_string()]);
        assert_eq!((resolved.schema.as_str(), resolved.name.as_str()), ("hr", "emp"));
    }

    #[test]
    fn unknown_table_is_assumed_in_current_schema() {
        let cat = sample();
        let resolved = cat.resolve_table("hr", &["ghost".to_string()]);
        assert_eq!(resolved.schema, "hr");
        assert!(!resolved.in_catalog);
    }

    #[test]
    fn object_type_attribute_and_method_lookup() {
        let cat = sample();
        let ty = cat.object_type("ADDRESS_T").unwrap();
        assert_eq!(ty.attribute("STREET"), Some("VARCHAR2"));
        assert!(ty.method("format").is_some());
    }

    #[test]
    fn package_function_covers_procedures_too() {
        let cat = sample();
        assert!(cat.package_function("hr", "pay", "NET").is_some());
        assert_eq!(
            cat.package_variable_type("hr", "pay", "G_RATE"),
            Some("NUMBER")
        );
    }
}
