//! Catalog intake from extractor JSON
//!
//! The metadata extractor (out of scope here) emits one JSON document per
//! job. This module deserializes it into a [`Catalog`]. Names arrive in
//! whatever case the data dictionary had; normalization happens on insert.

use super::{
    Catalog, ColumnMeta, InlineTypeDef, MethodSig, PackageSig, ParamMeta, SubprogramMeta,
    TableMeta, TypeMeta,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error reading catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    tables: Vec<TableDoc>,
    #[serde(default)]
    types: Vec<TypeDoc>,
    #[serde(default)]
    packages: Vec<PackageDoc>,
    #[serde(default)]
    synonyms: Vec<SynonymDoc>,
}

#[derive(Debug, Deserialize)]
struct TableDoc {
    schema: String,
    name: String,
    #[serde(default)]
    columns: Vec<ColumnDoc>,
}

#[derive(Debug, Deserialize)]
struct ColumnDoc {
    name: String,
    #[serde(rename = "type")]
    oracle_type: String,
    #[serde(default = "default_true")]
    nullable: bool,
}

#[derive(Debug, Deserialize)]
struct TypeDoc {
    name: String,
    #[serde(default)]
    attributes: Vec<AttributeDoc>,
    #[serde(default)]
    methods: Vec<MethodDoc>,
}

#[derive(Debug, Deserialize)]
struct AttributeDoc {
    name: String,
    #[serde(rename = "type")]
    oracle_type: String,
}

#[derive(Debug, Deserialize)]
struct MethodDoc {
    name: String,
    #[serde(default)]
    params: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PackageDoc {
    schema: String,
    name: String,
    #[serde(default)]
    functions: Vec<SubprogramDoc>,
    #[serde(default)]
    procedures: Vec<SubprogramDoc>,
    #[serde(default)]
    variables: Vec<AttributeDoc>,
    #[serde(default)]
    types: Vec<InlineTypeDef>,
}

#[derive(Debug, Deserialize)]
struct SubprogramDoc {
    name: String,
    #[serde(default)]
    params: Vec<AttributeDoc>,
    #[serde(rename = "return", default)]
    return_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SynonymDoc {
    schema: String,
    name: String,
    target_schema: String,
    target: String,
}

fn default_true() -> bool {
    true
}

impl Catalog {
    /// Build a catalog from the extractor's JSON document.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = serde_json::from_str(json)?;
        let mut catalog = Catalog::new();

        for table in doc.tables {
            catalog.insert_table(TableMeta {
                schema: table.schema.to_lowercase(),
                name: table.name.to_lowercase(),
                columns: table
                    .columns
                    .into_iter()
                    .map(|c| ColumnMeta {
                        name: c.name.to_lowercase(),
                        oracle_type: c.oracle_type,
                        nullable: c.nullable,
                    })
                    .collect(),
            });
        }

        for ty in doc.types {
            catalog.insert_type(TypeMeta {
                name: ty.name.to_lowercase(),
                attributes: ty
                    .attributes
                    .into_iter()
                    .map(|a| (a.name.to_lowercase(), a.oracle_type))
                    .collect(),
                methods: ty
                    .methods
                    .into_iter()
                    .map(|m| MethodSig {
                        name: m.name.to_lowercase(),
                        params: m.params.iter().map(|p| p.to_lowercase()).collect(),
                    })
                    .collect(),
            });
        }

        for pkg in doc.packages {
            let mut sig = PackageSig {
                schema: pkg.schema.to_lowercase(),
                name: pkg.name.to_lowercase(),
                ..PackageSig::default()
            };
            for f in pkg.functions {
                sig.functions
                    .insert(f.name.to_lowercase(), subprogram_meta(f));
            }
            for p in pkg.procedures {
                sig.procedures
                    .insert(p.name.to_lowercase(), subprogram_meta(p));
            }
            for v in pkg.variables {
                sig.variables.insert(v.name.to_lowercase(), v.oracle_type);
            }
            for t in pkg.types {
                sig.types.insert(t.name.to_lowercase(), t);
            }
            catalog.insert_package(sig);
        }

        for syn in doc.synonyms {
            catalog.insert_synonym(&syn.schema, &syn.name, &syn.target_schema, &syn.target);
        }

        Ok(catalog)
    }

    /// Load a catalog from a JSON file on disk.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn subprogram_meta(doc: SubprogramDoc) -> SubprogramMeta {
    SubprogramMeta {
        params: doc
            .params
            .into_iter()
            .map(|p| ParamMeta {
                name: p.name.to_lowercase(),
                oracle_type: p.oracle_type,
            })
            .collect(),
        return_type: doc.return_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_full_catalog_document() {
        let json = r#"{
            "tables": [
                {"schema": "HR", "name": "EMP", "columns": [
                    {"name": "EMPNO", "type": "NUMBER", "nullable": false},
                    {"name": "ENAME", "type": "VARCHAR2"}
                ]}
            ],
            "types": [
                {"name": "ADDRESS_T",
                 "attributes": [{"name": "STREET", "type": "VARCHAR2"}],
                 "methods": [{"name": "FORMAT"}]}
            ],
            "packages": [
                {"schema": "HR", "name": "PAY",
                 "functions": [{"name": "NET", "params": [{"name": "P", "type": "NUMBER"}], "return": "NUMBER"}],
                 "variables": [{"name": "G_RATE", "type": "NUMBER"}]}
            ],
            "synonyms": [
                {"schema": "PUBLIC", "name": "E", "target_schema": "HR", "target": "EMP"}
            ]
        }"#;
        let catalog = Catalog::from_json(json).expect("catalog should load");
        assert!(catalog.has_table("hr", "emp"));
        assert_eq!(catalog.column_type("hr", "emp", "ename"), Some("VARCHAR2"));
        assert!(catalog.object_type("address_t").is_some());
        assert!(catalog.package_function("hr", "pay", "net").is_some());
        let resolved = catalog.resolve_table("scott", &["e".to_string()]);
        assert_eq!(resolved.name, "emp");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let catalog = Catalog::from_json("{}").expect("empty catalog should load");
        assert!(!catalog.has_table("hr", "emp"));
    }

    #[test]
    fn bad_json_surfaces_the_serde_error() {
        let err = Catalog::from_json("{not json").unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
    }
}
