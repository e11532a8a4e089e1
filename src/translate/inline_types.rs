//! Inline types as jsonb
//!
//! Records, collections, associative arrays, and `%ROWTYPE` variables are
//! encoded as `jsonb`. Reads cast scalar fields out (`(v->>'f')::T`), writes
//! go through `jsonb_set`, and collection indexes shift from Oracle's 1-based
//! to jsonb's 0-based. `%TYPE` chains resolve through a cascade (local scope
//! → package spec → catalog) with a depth limit instead of cycle detection.

use super::Translator;
use super::expr::quote_str;
use crate::catalog::{FieldDef, InlineTypeDef, TypeCategory};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Pos};
use crate::parser::ast::*;
use crate::typemap;

const TYPE_CHAIN_DEPTH_LIMIT: usize = 16;

impl Translator<'_> {
    /// PostgreSQL type for a declared data type. Named inline types and
    /// `%ROWTYPE` land on jsonb; `%TYPE` resolves to its target's type.
    pub(crate) fn resolved_pg_type(
        &mut self,
        dt: &DataType,
        pos: Pos,
    ) -> Result<String, Diagnostics> {
        match dt {
            DataType::Scalar { name, precision } => Ok(typemap::pg_scalar(name, *precision)),
            DataType::RowOf(_) => Ok("jsonb".to_string()),
            DataType::TypeOf(chain) => self.resolve_type_of(chain, pos, 0),
            DataType::Named(chain) => {
                let parts: Vec<String> = chain.parts.iter().map(|p| p.normalized()).collect();
                if self.ctx.resolve_inline_type(&parts).is_some() {
                    return Ok("jsonb".to_string());
                }
                if chain.len() == 1 && self.ctx.catalog.object_type(&chain.first()).is_some() {
                    return Ok("jsonb".to_string());
                }
                // Unknown named type: assume a domain or composite that
                // exists on the target side.
                Ok(chain.joined())
            }
        }
    }

    /// `x%TYPE` resolution. The referenced declaration may itself carry a
    /// `%TYPE` string (extractor passthrough), so resolution is depth-bounded.
    pub(crate) fn resolve_type_of(
        &mut self,
        chain: &IdentChain,
        pos: Pos,
        depth: usize,
    ) -> Result<String, Diagnostics> {
        if depth >= TYPE_CHAIN_DEPTH_LIMIT {
            return Err(Diagnostics::new(
                DiagnosticKind::CircularTypeReference,
                format!("%TYPE chain exceeds depth {TYPE_CHAIN_DEPTH_LIMIT}"),
                pos,
            )
            .with_object(chain.joined()));
        }

        match chain.len() {
            1 => {
                let name = chain.first();
                if let Some(var) = self.ctx.lookup_variable(&name) {
                    return Ok(var.pg_type.clone());
                }
                if let Some(pkg) = self.ctx.current_package.clone() {
                    let schema = self.ctx.current_schema.clone();
                    if let Some(ty) = self
                        .ctx
                        .catalog
                        .package_variable_type(&schema, &pkg, &name)
                        .map(|t| t.to_string())
                    {
                        return self.resolve_oracle_type_string(&ty, pos, depth + 1);
                    }
                }
                Err(unresolved(chain, pos))
            }
            2 => {
                let (head, tail) = (chain.part(0), chain.part(1));
                let schema = self.ctx.current_schema.clone();
                // table.column in the current schema.
                if let Some(ty) = self
                    .ctx
                    .catalog
                    .column_type(&schema, &head, &tail)
                    .map(|t| t.to_string())
                {
                    return self.resolve_oracle_type_string(&ty, pos, depth + 1);
                }
                // record variable field.
                if let Some(var) = self.ctx.lookup_variable(&head) {
                    if let Some(def) = &var.inline {
                        if let Some(field) = def.field(&tail) {
                            return Ok(field.pg_type.clone());
                        }
                    }
                }
                // package.variable.
                if let Some(ty) = self
                    .ctx
                    .catalog
                    .package_variable_type(&schema, &head, &tail)
                    .map(|t| t.to_string())
                {
                    return self.resolve_oracle_type_string(&ty, pos, depth + 1);
                }
                Err(unresolved(chain, pos))
            }
            3 => {
                let (a, b, c) = (chain.part(0), chain.part(1), chain.part(2));
                if let Some(ty) = self
                    .ctx
                    .catalog
                    .column_type(&a, &b, &c)
                    .map(|t| t.to_string())
                {
                    return self.resolve_oracle_type_string(&ty, pos, depth + 1);
                }
                Err(unresolved(chain, pos))
            }
            _ => Err(unresolved(chain, pos)),
        }
    }

    /// An Oracle type string from the catalog, which may itself be a
    /// `X%TYPE` reference.
    fn resolve_oracle_type_string(
        &mut self,
        oracle_type: &str,
        pos: Pos,
        depth: usize,
    ) -> Result<String, Diagnostics> {
        let trimmed = oracle_type.trim();
        if let Some(target) = trimmed
            .strip_suffix("%TYPE")
            .or_else(|| trimmed.strip_suffix("%type"))
        {
            let parts: Vec<IdentPart> = target
                .trim()
                .split('.')
                .map(|p| IdentPart::new(p.trim()))
                .collect();
            let chain = IdentChain::new(parts, pos);
            return self.resolve_type_of(&chain, pos, depth);
        }
        Ok(typemap::pg_scalar(trimmed, None))
    }

    /// Build an [`InlineTypeDef`] from a parsed `TYPE ... IS ...`
    /// declaration.
    pub(crate) fn inline_def_from_decl(
        &mut self,
        decl: &TypeDecl,
    ) -> Result<InlineTypeDef, Diagnostics> {
        let def = match &decl.kind {
            TypeDeclKind::Record { fields } => {
                let mut out = Vec::new();
                for (name, dt) in fields {
                    let pg_type = self.resolved_pg_type(dt, decl.pos)?;
                    out.push(FieldDef {
                        name: name.clone(),
                        oracle_type: oracle_type_name(dt),
                        pg_type,
                    });
                }
                InlineTypeDef {
                    name: decl.name.clone(),
                    category: TypeCategory::Record,
                    fields: out,
                    element_type: None,
                    key_type: None,
                }
            }
            TypeDeclKind::TableOf { element, index_by } => {
                let element_type = self.resolved_pg_type(element, decl.pos)?;
                match index_by {
                    Some(key) => InlineTypeDef {
                        name: decl.name.clone(),
                        category: TypeCategory::IndexBy,
                        fields: vec![],
                        element_type: Some(element_type),
                        key_type: Some(self.resolved_pg_type(key, decl.pos)?),
                    },
                    None => InlineTypeDef {
                        name: decl.name.clone(),
                        category: TypeCategory::TableOf,
                        fields: vec![],
                        element_type: Some(element_type),
                        key_type: None,
                    },
                }
            }
            TypeDeclKind::Varray { element, .. } => InlineTypeDef {
                name: decl.name.clone(),
                category: TypeCategory::Varray,
                fields: vec![],
                element_type: Some(self.resolved_pg_type(element, decl.pos)?),
                key_type: None,
            },
            TypeDeclKind::RefCursor => InlineTypeDef {
                name: decl.name.clone(),
                category: TypeCategory::TypeReference,
                fields: vec![],
                element_type: None,
                key_type: None,
            },
        };
        Ok(def)
    }

    /// `%ROWTYPE` field layout from the catalog.
    pub(crate) fn rowtype_def(
        &mut self,
        table_chain: &IdentChain,
        pos: Pos,
    ) -> Result<InlineTypeDef, Diagnostics> {
        let parts: Vec<String> = table_chain.parts.iter().map(|p| p.normalized()).collect();
        let resolved = self.ctx.catalog.resolve_table(&self.ctx.current_schema, &parts);
        let Some(table) = self.ctx.catalog.table(&resolved.schema, &resolved.name) else {
            return Err(Diagnostics::new(
                DiagnosticKind::MetadataMissing,
                format!(
                    "%ROWTYPE references '{}' which is not in the catalog",
                    table_chain.joined()
                ),
                pos,
            )
            .with_object(table_chain.joined()));
        };
        let fields = table
            .columns
            .iter()
            .map(|c| FieldDef {
                name: c.name.clone(),
                oracle_type: c.oracle_type.clone(),
                pg_type: typemap::pg_scalar(&c.oracle_type, None),
            })
            .collect();
        Ok(InlineTypeDef {
            name: format!("{}%rowtype", resolved.name),
            category: TypeCategory::RowType,
            fields,
            element_type: None,
            key_type: None,
        })
    }

    // --- jsonb reads ---

    /// RHS field read `v.f`: scalar fields cast out, nested fields stay
    /// jsonb.
    pub(crate) fn json_field_read(
        &mut self,
        var: &str,
        field: &str,
        def: &InlineTypeDef,
        pos: Pos,
    ) -> Result<String, Diagnostics> {
        let Some(field_def) = def.field(field) else {
            return Err(Diagnostics::new(
                DiagnosticKind::UnresolvedIdentifier,
                format!("'{field}' is not a field of '{var}'"),
                pos,
            )
            .with_object(format!("{var}.{field}")));
        };
        if field_def.pg_type == "jsonb" {
            Ok(format!("{var}->'{field}'"))
        } else {
            Ok(format!("({var}->>'{field}')::{}", field_def.pg_type))
        }
    }

    /// Collection/map access spelled like a call: element reads `a(i)`,
    /// pseudo-methods `v.count` / `v.exists(i)` / `v.first` / `v.last`.
    /// Returns `None` when the callee is not a jsonb-encoded local.
    pub(crate) fn collection_access(
        &mut self,
        call: &CallExpr,
    ) -> Result<Option<String>, Diagnostics> {
        match call.name.len() {
            1 => {
                let name = call.name.first();
                let Some(def) = self
                    .ctx
                    .lookup_variable(&name)
                    .and_then(|v| v.inline.clone())
                else {
                    return Ok(None);
                };
                if call.args.len() != 1 {
                    return Ok(None);
                }
                let key = &call.args[0].value;
                if def.is_map() {
                    let key_sql = match key {
                        Expr::StringLit(s) => quote_str(s),
                        other => format!("({})::text", self.expr(other)?),
                    };
                    return Ok(Some(format!("({name}->>{key_sql})")));
                }
                if def.is_collection() {
                    return Ok(Some(element_read(&name, key, self)?));
                }
                Ok(None)
            }
            2 => {
                let head = call.name.first();
                let method = call.name.last();
                let Some(def) = self
                    .ctx
                    .lookup_variable(&head)
                    .and_then(|v| v.inline.clone())
                else {
                    return Ok(None);
                };
                match method.as_str() {
                    "count" => {
                        if def.is_map() {
                            Ok(Some(format!(
                                "(SELECT count(*) FROM jsonb_object_keys({head}))"
                            )))
                        } else {
                            Ok(Some(format!("jsonb_array_length({head})")))
                        }
                    }
                    "first" => Ok(Some("1".to_string())),
                    "last" => Ok(Some(format!("jsonb_array_length({head})"))),
                    "exists" => {
                        let Some(arg) = call.args.first() else {
                            return Ok(None);
                        };
                        if def.is_map() {
                            let key = match &arg.value {
                                Expr::StringLit(s) => quote_str(s),
                                other => format!("({})::text", self.expr(other)?),
                            };
                            Ok(Some(format!("({head} ? {key})")))
                        } else {
                            let read = element_read(&head, &arg.value, self)?;
                            Ok(Some(format!("({read} IS NOT NULL)")))
                        }
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Constructor call `T(a, b, c)` for an inline type: records build an
    /// object keyed by field name; collections build an array. All-literal
    /// argument lists collapse to a JSON literal with exact quoting.
    pub(crate) fn constructor_call(
        &mut self,
        call: &CallExpr,
        def: &InlineTypeDef,
    ) -> Result<String, Diagnostics> {
        if def.is_record() {
            let mut pairs = Vec::new();
            for (field, arg) in def.fields.iter().zip(&call.args) {
                let value = self.jsonb_value(&arg.value)?;
                pairs.push(format!("'{}', {value}", field.name));
            }
            return Ok(format!("jsonb_build_object({})", pairs.join(", ")));
        }

        if call.args.iter().all(|a| is_json_literal(&a.value)) {
            let items: Vec<serde_json::Value> =
                call.args.iter().map(|a| json_literal(&a.value)).collect();
            let literal = serde_json::Value::Array(items).to_string();
            return Ok(format!("'{}'::jsonb", literal.replace('\'', "''")));
        }

        let args = call
            .args
            .iter()
            .map(|a| self.jsonb_value(&a.value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("jsonb_build_array({})", args.join(", ")))
    }

    /// A value headed into jsonb storage. String literals are wrapped as
    /// `to_jsonb('…'::text)` — without the cast PostgreSQL cannot pick the
    /// polymorphic overload.
    pub(crate) fn jsonb_value(&mut self, value: &Expr) -> Result<String, Diagnostics> {
        match value {
            Expr::StringLit(s) => Ok(format!("to_jsonb({}::text)", quote_str(s))),
            other => {
                let sql = self.expr(other)?;
                Ok(format!("to_jsonb({sql})"))
            }
        }
    }
}

/// 1-based Oracle index to 0-based jsonb index; literal indexes fold.
fn element_read(
    var: &str,
    index: &Expr,
    tr: &mut Translator<'_>,
) -> Result<String, Diagnostics> {
    if let Expr::Number(n) = index {
        if let Ok(i) = n.parse::<i64>() {
            return Ok(format!("({var}->{})", i - 1));
        }
    }
    let idx = tr.expr(index)?;
    Ok(format!("({var}->(({idx}) - 1))"))
}

/// Index path for `jsonb_set` on a collection write.
pub(crate) fn element_path(index_sql: &str, index: &Expr) -> String {
    if let Expr::Number(n) = index {
        if let Ok(i) = n.parse::<i64>() {
            return format!("'{{{}}}'", i - 1);
        }
    }
    format!("('{{' || (({index_sql}) - 1) || '}}')::text[]")
}

fn is_json_literal(e: &Expr) -> bool {
    matches!(
        e,
        Expr::Number(_) | Expr::StringLit(_) | Expr::Null | Expr::True | Expr::False
    )
}

fn json_literal(e: &Expr) -> serde_json::Value {
    match e {
        Expr::Number(n) => serde_json::from_str(n)
            .unwrap_or_else(|_| serde_json::Value::String(n.clone())),
        Expr::StringLit(s) => serde_json::Value::String(s.clone()),
        Expr::True => serde_json::Value::Bool(true),
        Expr::False => serde_json::Value::Bool(false),
        _ => serde_json::Value::Null,
    }
}

fn oracle_type_name(dt: &DataType) -> String {
    match dt {
        DataType::Scalar { name, .. } => name.to_uppercase(),
        DataType::Named(chain) | DataType::TypeOf(chain) | DataType::RowOf(chain) => chain.joined(),
    }
}

fn unresolved(chain: &IdentChain, pos: Pos) -> Diagnostics {
    Diagnostics::new(
        DiagnosticKind::UnresolvedIdentifier,
        format!("cannot resolve %TYPE reference '{}'", chain.joined()),
        pos,
    )
    .with_object(chain.joined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::catalog::{Catalog, CatalogBuilder};
    use crate::config::Config;

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false)
                    .column("ename", "VARCHAR2", true)
                    .column("sal", "NUMBER", true);
            })
            .build()
    }

    fn translator<'a>(cat: &'a Catalog, config: &'a Config) -> Translator<'a> {
        Translator::new("hr", cat, config, CancelToken::new())
    }

    #[test]
    fn rowtype_fields_come_from_the_catalog() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let chain = IdentChain::simple("emp", Pos::start());
        let def = tr.rowtype_def(&chain, Pos::start()).unwrap();
        assert_eq!(def.category, TypeCategory::RowType);
        assert_eq!(def.fields.len(), 3);
        assert_eq!(def.fields[0].name, "empno");
        assert_eq!(def.fields[0].pg_type, "numeric");
    }

    #[test]
    fn rowtype_on_unknown_table_is_metadata_missing() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let chain = IdentChain::simple("ghost", Pos::start());
        let err = tr.rowtype_def(&chain, Pos::start()).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::MetadataMissing);
    }

    #[test]
    fn type_of_column_resolves_through_the_catalog() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let chain = IdentChain::new(
            vec![IdentPart::new("emp"), IdentPart::new("sal")],
            Pos::start(),
        );
        let pg = tr.resolve_type_of(&chain, Pos::start(), 0).unwrap();
        assert_eq!(pg, "numeric");
    }

    #[test]
    fn self_referential_type_chain_hits_the_depth_limit() {
        let cat = CatalogBuilder::new()
            .table("hr", "t", |t| {
                // A pathological extractor row: the column's type points at
                // itself through %TYPE.
                t.column("c", "t.c%TYPE", true);
            })
            .build();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let chain = IdentChain::new(
            vec![IdentPart::new("t"), IdentPart::new("c")],
            Pos::start(),
        );
        let err = tr.resolve_type_of(&chain, Pos::start(), 0).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::CircularTypeReference);
    }

    #[test]
    fn literal_constructor_collapses_to_a_json_literal() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let def = InlineTypeDef {
            name: "t_tab".to_string(),
            category: TypeCategory::TableOf,
            fields: vec![],
            element_type: Some("numeric".to_string()),
            key_type: None,
        };
        let call = CallExpr {
            name: IdentChain::simple("t_tab", Pos::start()),
            args: vec![
                Arg::positional(Expr::Number("1".into())),
                Arg::positional(Expr::StringLit("x".into())),
            ],
            distinct: false,
            over: None,
            pos: Pos::start(),
        };
        let sql = tr.constructor_call(&call, &def).unwrap();
        assert_eq!(sql, "'[1,\"x\"]'::jsonb");
    }

    #[test]
    fn string_values_headed_into_jsonb_are_cast_to_text() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = translator(&cat, &config);
        let sql = tr.jsonb_value(&Expr::StringLit("abc".into())).unwrap();
        assert_eq!(sql, "to_jsonb('abc'::text)");
    }

    #[test]
    fn element_path_folds_literal_indexes() {
        assert_eq!(element_path("1", &Expr::Number("1".into())), "'{0}'");
        assert_eq!(
            element_path("i", &Expr::Ident(IdentChain::simple("i", Pos::start()))),
            "('{' || ((i) - 1) || '}')::text[]"
        );
    }
}
