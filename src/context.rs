//! Transformation context
//!
//! Per-translation state threaded through every translator. Three layers:
//! immutable globals (schema, catalog), per-translation settings (current
//! package/function, package variable map, inline-type registry), and
//! mutable traversal state (variable scopes, table aliases, CTE names,
//! cursor-attribute needs, the assignment-target flag).
//!
//! Scope discipline is strict: every push is paired with a pop on all exit
//! paths, and a pop on an empty stack is an invariant violation, not an
//! expected error — it panics.

use crate::catalog::{Catalog, InlineTypeDef};
use crate::typemap::OracleType;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// What a local name resolves to inside the unit being translated.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub oracle_type: OracleType,
    pub pg_type: String,
    /// Set when the variable is jsonb-encoded (record, collection, map).
    pub inline: Option<InlineTypeDef>,
    pub is_cursor: bool,
}

impl VarInfo {
    pub fn scalar(pg_type: impl Into<String>, oracle_type: OracleType) -> Self {
        Self {
            oracle_type,
            pg_type: pg_type.into(),
            inline: None,
            is_cursor: false,
        }
    }

    pub fn encoded(def: InlineTypeDef) -> Self {
        Self {
            oracle_type: OracleType::Composite,
            pg_type: "jsonb".to_string(),
            inline: Some(def),
            is_cursor: false,
        }
    }

    pub fn cursor() -> Self {
        Self {
            oracle_type: OracleType::Unknown,
            pg_type: String::new(),
            inline: None,
            is_cursor: true,
        }
    }

    /// Loop records and other variables whose shape is only known at run
    /// time (`FOR r IN (...)`).
    pub fn loop_record() -> Self {
        Self {
            oracle_type: OracleType::Unknown,
            pg_type: "record".to_string(),
            inline: None,
            is_cursor: false,
        }
    }
}

/// A package variable visible without qualification in the current package.
#[derive(Debug, Clone)]
pub struct PackageVarInfo {
    pub pg_type: String,
    pub constant: bool,
    /// Pre-translated literal for constants, inlined at every reference.
    pub inline_literal: Option<String>,
}

#[derive(Debug)]
pub struct TransformationContext<'a> {
    // Layer A: immutable globals.
    pub current_schema: String,
    pub catalog: &'a Catalog,

    // Layer B: per-translation, read-only after construction.
    pub current_package: Option<String>,
    pub current_function: Option<String>,
    /// Variables of the current package (public and private), by name.
    package_variables: HashMap<String, PackageVarInfo>,
    inline_types: HashMap<String, InlineTypeDef>,

    // Layer C: mutable traversal state.
    scopes: Vec<HashMap<String, VarInfo>>,
    alias_scopes: Vec<HashMap<String, (String, String)>>,
    cte_scopes: Vec<HashSet<String>>,
    cursor_attr_needs: HashSet<String>,
    pub sql_attribute_needed: bool,
    assignment_depth: u32,
}

impl<'a> TransformationContext<'a> {
    pub fn new(current_schema: &str, catalog: &'a Catalog) -> Self {
        Self {
            current_schema: current_schema.to_lowercase(),
            catalog,
            current_package: None,
            current_function: None,
            package_variables: HashMap::new(),
            inline_types: HashMap::new(),
            scopes: Vec::new(),
            alias_scopes: Vec::new(),
            cte_scopes: Vec::new(),
            cursor_attr_needs: HashSet::new(),
            sql_attribute_needed: false,
            assignment_depth: 0,
        }
    }

    pub fn for_package(mut self, package: &str) -> Self {
        self.current_package = Some(package.to_lowercase());
        self
    }

    pub fn for_function(mut self, function: &str) -> Self {
        self.current_function = Some(function.to_lowercase());
        self
    }

    pub fn with_package_variables(mut self, vars: HashMap<String, PackageVarInfo>) -> Self {
        self.package_variables = vars;
        self
    }

    // --- variable scopes ---

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes
            .pop()
            .expect("scope stack underflow: pop without matching push");
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn declare_variable(&mut self, name: &str, info: VarInfo) {
        let scope = self
            .scopes
            .last_mut()
            .expect("variable declared outside any scope");
        scope.insert(name.to_lowercase(), info);
    }

    /// Innermost-scope-first lookup.
    pub fn lookup_variable(&self, name: &str) -> Option<&VarInfo> {
        let name = name.to_lowercase();
        self.scopes.iter().rev().find_map(|s| s.get(&name))
    }

    // --- table aliases & CTE names (scoped per query block) ---

    pub fn push_query_scope(&mut self) {
        self.alias_scopes.push(HashMap::new());
        self.cte_scopes.push(HashSet::new());
    }

    pub fn pop_query_scope(&mut self) {
        self.alias_scopes
            .pop()
            .expect("alias scope underflow: pop without matching push");
        self.cte_scopes.pop();
    }

    pub fn query_depth(&self) -> usize {
        self.alias_scopes.len()
    }

    pub fn register_alias(&mut self, alias: &str, schema: &str, table: &str) {
        debug!(alias, schema, table, "registering table alias");
        let scope = self
            .alias_scopes
            .last_mut()
            .expect("alias registered outside any query scope");
        scope.insert(
            alias.to_lowercase(),
            (schema.to_lowercase(), table.to_lowercase()),
        );
    }

    /// Resolve an alias, walking outward so correlated subqueries see the
    /// enclosing query's aliases.
    pub fn lookup_alias(&self, alias: &str) -> Option<&(String, String)> {
        let alias = alias.to_lowercase();
        self.alias_scopes.iter().rev().find_map(|s| s.get(&alias))
    }

    /// Every `(schema, table)` bound to an alias in any live query scope.
    /// Used to type bare column names.
    pub fn all_aliases(&self) -> Vec<(String, String)> {
        self.alias_scopes
            .iter()
            .flat_map(|s| s.values().cloned())
            .collect()
    }

    pub fn register_cte(&mut self, name: &str) {
        let scope = self
            .cte_scopes
            .last_mut()
            .expect("CTE registered outside any query scope");
        scope.insert(name.to_lowercase());
    }

    pub fn is_cte(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.cte_scopes.iter().rev().any(|s| s.contains(&name))
    }

    // --- assignment-target flag ---

    pub fn enter_assignment_target(&mut self) {
        self.assignment_depth += 1;
    }

    pub fn leave_assignment_target(&mut self) {
        assert!(
            self.assignment_depth > 0,
            "assignment-target flag underflow"
        );
        self.assignment_depth -= 1;
    }

    pub fn in_assignment_target(&self) -> bool {
        self.assignment_depth > 0
    }

    // --- cursor attributes ---

    pub fn need_cursor_attrs(&mut self, cursor: &str) {
        self.cursor_attr_needs.insert(cursor.to_lowercase());
    }

    pub fn cursor_needs_attrs(&self, cursor: &str) -> bool {
        self.cursor_attr_needs.contains(&cursor.to_lowercase())
    }

    pub fn cursors_needing_attrs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cursor_attr_needs.iter().cloned().collect();
        names.sort();
        names
    }

    // --- package variables ---

    /// True when `name`, unqualified, denotes a variable of the current
    /// package. Local variables shadow package variables; callers check the
    /// scope stack first.
    pub fn is_current_package_variable(&self, name: &str) -> bool {
        self.current_package.is_some() && self.package_variables.contains_key(&name.to_lowercase())
    }

    pub fn current_package_variable(&self, name: &str) -> Option<&PackageVarInfo> {
        self.package_variables.get(&name.to_lowercase())
    }

    // --- inline types ---

    pub fn register_inline_type(&mut self, def: InlineTypeDef) {
        debug!(name = %def.name, "registering inline type");
        self.inline_types.insert(def.name.to_lowercase(), def);
    }

    /// Resolution cascade: locally registered types, then the current
    /// package's public types, then a package-qualified lookup in the
    /// catalog (`pkg.t`).
    pub fn resolve_inline_type(&self, parts: &[String]) -> Option<&InlineTypeDef> {
        match parts {
            [name] => {
                let name = name.to_lowercase();
                if let Some(def) = self.inline_types.get(&name) {
                    return Some(def);
                }
                let pkg = self.current_package.as_deref()?;
                self.catalog
                    .package(&self.current_schema, pkg)?
                    .types
                    .get(&name)
            }
            [pkg, name] => self
                .catalog
                .package(&self.current_schema, pkg)?
                .types
                .get(&name.to_lowercase()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, TypeCategory};
    use crate::typemap::OracleType;

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false);
            })
            .build()
    }

    #[test]
    fn innermost_scope_shadows_outer() {
        let cat = catalog();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.push_scope();
        ctx.declare_variable("v", VarInfo::scalar("numeric", OracleType::Number));
        ctx.push_scope();
        ctx.declare_variable("v", VarInfo::scalar("text", OracleType::Varchar2));
        assert_eq!(ctx.lookup_variable("V").unwrap().pg_type, "text");
        ctx.pop_scope();
        assert_eq!(ctx.lookup_variable("v").unwrap().pg_type, "numeric");
        ctx.pop_scope();
        assert_eq!(ctx.scope_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "scope stack underflow")]
    fn pop_without_push_panics() {
        let cat = catalog();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.pop_scope();
    }

    #[test]
    fn aliases_are_visible_from_nested_query_scopes() {
        let cat = catalog();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.push_query_scope();
        ctx.register_alias("e", "hr", "emp");
        ctx.push_query_scope();
        assert!(ctx.lookup_alias("e").is_some());
        ctx.pop_query_scope();
        ctx.pop_query_scope();
        assert!(ctx.lookup_alias("e").is_none());
    }

    #[test]
    fn assignment_flag_nests() {
        let cat = catalog();
        let mut ctx = TransformationContext::new("hr", &cat);
        assert!(!ctx.in_assignment_target());
        ctx.enter_assignment_target();
        ctx.enter_assignment_target();
        ctx.leave_assignment_target();
        assert!(ctx.in_assignment_target());
        ctx.leave_assignment_target();
        assert!(!ctx.in_assignment_target());
    }

    #[test]
    fn inline_type_cascade_prefers_local_registry() {
        let cat = CatalogBuilder::new()
            .package("hr", "pay", |p| {
                p.public_type(InlineTypeDef {
                    name: "t_rec".to_string(),
                    category: TypeCategory::Record,
                    fields: vec![],
                    element_type: None,
                    key_type: None,
                });
            })
            .build();
        let mut ctx = TransformationContext::new("hr", &cat).for_package("pay");
        assert!(ctx.resolve_inline_type(&["t_rec".to_string()]).is_some());

        ctx.register_inline_type(InlineTypeDef {
            name: "t_rec".to_string(),
            category: TypeCategory::TableOf,
            fields: vec![],
            element_type: Some("numeric".to_string()),
            key_type: None,
        });
        let resolved = ctx.resolve_inline_type(&["t_rec".to_string()]).unwrap();
        assert_eq!(resolved.category, TypeCategory::TableOf);
    }

    #[test]
    fn cursor_needs_are_recorded_and_sorted() {
        let cat = catalog();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.need_cursor_attrs("c_b");
        ctx.need_cursor_attrs("c_a");
        assert!(ctx.cursor_needs_attrs("C_A"));
        assert_eq!(ctx.cursors_needing_attrs(), vec!["c_a", "c_b"]);
    }
}
