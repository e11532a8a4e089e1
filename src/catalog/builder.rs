//! Fluent builder for catalog state
//!
//! Used by tests throughout the crate and by callers that assemble a catalog
//! programmatically instead of loading the extractor's JSON.
//!
//! # Example
//!
//! ```rust
//! use plsql2pg::catalog::CatalogBuilder;
//!
//! let catalog = CatalogBuilder::new()
//!     .table("hr", "emp", |t| {
//!         t.column("empno", "NUMBER", false)
//!             .column("ename", "VARCHAR2", true);
//!     })
//!     .package("hr", "pay", |p| {
//!         p.variable("g_rate", "NUMBER")
//!             .function("net", &[("p_amt", "NUMBER")], Some("NUMBER"));
//!     })
//!     .build();
//! assert!(catalog.has_table("HR", "emp"));
//! ```

use super::{
    Catalog, ColumnMeta, InlineTypeDef, MethodSig, PackageSig, ParamMeta, SubprogramMeta,
    TableMeta, TypeMeta,
};

pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
        }
    }

    /// Add a table. The closure receives a [`TableBuilder`] to configure
    /// columns.
    pub fn table(mut self, schema: &str, name: &str, f: impl FnOnce(&mut TableBuilder)) -> Self {
        let mut builder = TableBuilder::new(schema, name);
        f(&mut builder);
        self.catalog.insert_table(builder.build());
        self
    }

    /// Add an object type with attributes and methods.
    pub fn object_type(mut self, name: &str, f: impl FnOnce(&mut TypeBuilder)) -> Self {
        let mut builder = TypeBuilder::new(name);
        f(&mut builder);
        self.catalog.insert_type(builder.build());
        self
    }

    /// Add a package signature.
    pub fn package(mut self, schema: &str, name: &str, f: impl FnOnce(&mut PackageBuilder)) -> Self {
        let mut builder = PackageBuilder::new(schema, name);
        f(&mut builder);
        self.catalog.insert_package(builder.build());
        self
    }

    pub fn synonym(mut self, schema: &str, name: &str, target_schema: &str, target: &str) -> Self {
        self.catalog
            .insert_synonym(schema, name, target_schema, target);
        self
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TableBuilder {
    meta: TableMeta,
}

impl TableBuilder {
    fn new(schema: &str, name: &str) -> Self {
        Self {
            meta: TableMeta {
                schema: schema.to_lowercase(),
                name: name.to_lowercase(),
                columns: vec![],
            },
        }
    }

    pub fn column(&mut self, name: &str, oracle_type: &str, nullable: bool) -> &mut Self {
        self.meta.columns.push(ColumnMeta {
            name: name.to_lowercase(),
            oracle_type: oracle_type.to_string(),
            nullable,
        });
        self
    }

    fn build(self) -> TableMeta {
        self.meta
    }
}

pub struct TypeBuilder {
    meta: TypeMeta,
}

impl TypeBuilder {
    fn new(name: &str) -> Self {
        Self {
            meta: TypeMeta {
                name: name.to_lowercase(),
                attributes: vec![],
                methods: vec![],
            },
        }
    }

    pub fn attribute(&mut self, name: &str, oracle_type: &str) -> &mut Self {
        self.meta
            .attributes
            .push((name.to_lowercase(), oracle_type.to_string()));
        self
    }

    pub fn method(&mut self, name: &str, params: &[&str]) -> &mut Self {
        self.meta.methods.push(MethodSig {
            name: name.to_lowercase(),
            params: params.iter().map(|p| p.to_lowercase()).collect(),
        });
        self
    }

    fn build(self) -> TypeMeta {
        self.meta
    }
}

pub struct PackageBuilder {
    sig: PackageSig,
}

impl PackageBuilder {
    fn new(schema: &str, name: &str) -> Self {
        Self {
            sig: PackageSig {
                schema: schema.to_lowercase(),
                name: name.to_lowercase(),
                ..PackageSig::default()
            },
        }
    }

    pub fn variable(&mut self, name: &str, oracle_type: &str) -> &mut Self {
        self.sig
            .variables
            .insert(name.to_lowercase(), oracle_type.to_string());
        self
    }

    pub fn function(
        &mut self,
        name: &str,
        params: &[(&str, &str)],
        return_type: Option<&str>,
    ) -> &mut Self {
        let meta = SubprogramMeta {
            params: params
                .iter()
                .map(|(n, t)| ParamMeta {
                    name: n.to_lowercase(),
                    oracle_type: t.to_string(),
                })
                .collect(),
            return_type: return_type.map(|t| t.to_string()),
        };
        self.sig.functions.insert(name.to_lowercase(), meta);
        self
    }

    pub fn procedure(&mut self, name: &str, params: &[(&str, &str)]) -> &mut Self {
        let meta = SubprogramMeta {
            params: params
                .iter()
                .map(|(n, t)| ParamMeta {
                    name: n.to_lowercase(),
                    oracle_type: t.to_string(),
                })
                .collect(),
            return_type: None,
        };
        self.sig.procedures.insert(name.to_lowercase(), meta);
        self
    }

    pub fn public_type(&mut self, def: InlineTypeDef) -> &mut Self {
        self.sig.types.insert(def.name.to_lowercase(), def);
        self
    }

    fn build(self) -> PackageSig {
        self.sig
    }
}
