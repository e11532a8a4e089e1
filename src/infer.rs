//! Oracle type inference on expressions
//!
//! Drives cast insertion, jsonb field reads, and the TRUNC/ROUND
//! date-vs-number decision. Inference is best-effort: anything it cannot
//! settle is `Unknown`, and callers fall back to their own defaults.
//!
//! Identifier and call nodes are memoized by source offset; the memo lives
//! and dies with the translation, so repeated queries inside one unit are
//! cheap and nothing accumulates across units.

use crate::context::TransformationContext;
use crate::parser::ast::*;
use crate::typemap::{OracleType, scalar_category};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TypeInference {
    cache: HashMap<usize, OracleType>,
}

/// Identifiers with a fixed type regardless of scope.
fn builtin_ident(name: &str) -> Option<OracleType> {
    match name {
        "sysdate" | "current_date" => Some(OracleType::Date),
        "systimestamp" | "current_timestamp" | "localtimestamp" => Some(OracleType::Timestamp),
        "user" | "session_user" | "current_user" => Some(OracleType::Varchar2),
        _ => None,
    }
}

fn builtin_function(name: &str) -> Option<OracleType> {
    const NUMERIC: [&str; 17] = [
        "abs", "ceil", "floor", "mod", "power", "sqrt", "sign", "exp", "ln", "log", "length",
        "instr", "count", "months_between", "extract", "to_number", "ascii",
    ];
    const STRINGY: [&str; 18] = [
        "upper", "lower", "substr", "trim", "ltrim", "rtrim", "lpad", "rpad", "replace",
        "to_char", "chr", "concat", "initcap", "translate", "regexp_replace", "regexp_substr",
        "soundex", "nls_upper",
    ];
    const DATEY: [&str; 5] = ["to_date", "add_months", "last_day", "next_day", "to_timestamp"];
    if NUMERIC.contains(&name) {
        Some(OracleType::Number)
    } else if STRINGY.contains(&name) {
        Some(OracleType::Varchar2)
    } else if DATEY.contains(&name) {
        Some(OracleType::Date)
    } else {
        None
    }
}

impl TypeInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn type_of(&mut self, expr: &Expr, ctx: &TransformationContext<'_>) -> OracleType {
        match expr {
            Expr::Null => OracleType::Unknown,
            Expr::True | Expr::False => OracleType::Boolean,
            Expr::Number(_) | Expr::Rownum(_) | Expr::Level(_) => OracleType::Number,
            Expr::StringLit(_) => OracleType::Varchar2,
            Expr::Ident(chain) => {
                if let Some(cached) = self.cache.get(&chain.pos.offset) {
                    return cached.clone();
                }
                let inferred = self.ident_type(chain, ctx);
                self.cache.insert(chain.pos.offset, inferred.clone());
                inferred
            }
            Expr::Bind { .. } => OracleType::Unknown,
            Expr::Call(call) => {
                if let Some(cached) = self.cache.get(&call.pos.offset) {
                    return cached.clone();
                }
                let inferred = self.call_type(call, ctx);
                self.cache.insert(call.pos.offset, inferred.clone());
                inferred
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => OracleType::Boolean,
                _ => self.type_of(expr, ctx),
            },
            Expr::Binary { op, left, right } => match op {
                BinOp::Concat => OracleType::Varchar2,
                BinOp::And | BinOp::Or => OracleType::Boolean,
                op if op.is_comparison() => OracleType::Boolean,
                BinOp::Add | BinOp::Sub => {
                    // date + n and date - n stay dates; date - date is a number.
                    let lt = self.type_of(left, ctx);
                    let rt = self.type_of(right, ctx);
                    match (lt.is_datetime(), rt.is_datetime()) {
                        (true, true) => OracleType::Number,
                        (true, false) | (false, true) => OracleType::Date,
                        (false, false) => OracleType::Number,
                    }
                }
                _ => OracleType::Number,
            },
            Expr::Case(case) => {
                let first = case
                    .arms
                    .first()
                    .map(|(_, v)| self.type_of(v, ctx))
                    .unwrap_or(OracleType::Unknown);
                if first != OracleType::Unknown {
                    first
                } else if let Some(else_expr) = &case.else_expr {
                    self.type_of(else_expr, ctx)
                } else {
                    OracleType::Unknown
                }
            }
            Expr::Cast { ty, .. } => crate::typemap::category(ty),
            Expr::Paren(inner) | Expr::OuterJoined(inner) | Expr::Prior(inner) => {
                self.type_of(inner, ctx)
            }
            Expr::CursorAttr { attr, .. } => match attr {
                CursorAttr::RowCount => OracleType::Number,
                _ => OracleType::Boolean,
            },
            Expr::IsNull { .. }
            | Expr::InList { .. }
            | Expr::InSubquery { .. }
            | Expr::Between { .. }
            | Expr::Like { .. }
            | Expr::Exists(_) => OracleType::Boolean,
            Expr::Subquery(_) | Expr::Star | Expr::QualifiedStar(_) => OracleType::Unknown,
        }
    }

    fn ident_type(&mut self, chain: &IdentChain, ctx: &TransformationContext<'_>) -> OracleType {
        match chain.len() {
            1 => {
                let name = chain.first();
                if let Some(builtin) = builtin_ident(&name) {
                    return builtin;
                }
                if let Some(var) = ctx.lookup_variable(&name) {
                    return var.oracle_type.clone();
                }
                if ctx.is_current_package_variable(&name) {
                    if let Some(pkg) = &ctx.current_package {
                        if let Some(ty) =
                            ctx.catalog
                                .package_variable_type(&ctx.current_schema, pkg, &name)
                        {
                            return scalar_category(ty);
                        }
                    }
                    return OracleType::Unknown;
                }
                self.unqualified_column_type(&name, ctx)
            }
            2 => {
                let head = chain.first();
                let tail = chain.last();
                // alias.column
                if let Some((schema, table)) = ctx.lookup_alias(&head) {
                    if let Some(ty) = ctx.catalog.column_type(schema, table, &tail) {
                        return self.column_category(ty, ctx);
                    }
                    return OracleType::Unknown;
                }
                // record.field
                if let Some(var) = ctx.lookup_variable(&head) {
                    if let Some(def) = &var.inline {
                        if let Some(field) = def.field(&tail) {
                            return scalar_category(&field.oracle_type);
                        }
                    }
                    return OracleType::Unknown;
                }
                // package.variable
                if let Some(ty) =
                    ctx.catalog
                        .package_variable_type(&ctx.current_schema, &head, &tail)
                {
                    return scalar_category(ty);
                }
                // table.column in the current schema
                if let Some(ty) = ctx.catalog.column_type(&ctx.current_schema, &head, &tail) {
                    return self.column_category(ty, ctx);
                }
                OracleType::Unknown
            }
            3 => {
                let (schema, table, column) = (chain.part(0), chain.part(1), chain.part(2));
                if let Some(ty) = ctx.catalog.column_type(&schema, &table, &column) {
                    return self.column_category(ty, ctx);
                }
                OracleType::Unknown
            }
            _ => OracleType::Unknown,
        }
    }

    /// A bare name in query context: if exactly one in-scope alias has a
    /// column by this name, use its type.
    fn unqualified_column_type(
        &self,
        name: &str,
        ctx: &TransformationContext<'_>,
    ) -> OracleType {
        let mut found: Option<OracleType> = None;
        for (schema, table) in ctx.all_aliases() {
            if let Some(ty) = ctx.catalog.column_type(&schema, &table, name) {
                let category = self.column_category_raw(ty, ctx);
                match &found {
                    None => found = Some(category),
                    Some(prev) if *prev == category => {}
                    Some(_) => return OracleType::Unknown,
                }
            }
        }
        found.unwrap_or(OracleType::Unknown)
    }

    fn column_category(&self, oracle_type: &str, ctx: &TransformationContext<'_>) -> OracleType {
        self.column_category_raw(oracle_type, ctx)
    }

    fn column_category_raw(
        &self,
        oracle_type: &str,
        ctx: &TransformationContext<'_>,
    ) -> OracleType {
        let category = scalar_category(oracle_type);
        if category == OracleType::Unknown
            && ctx.catalog.object_type(oracle_type).is_some()
        {
            return OracleType::Object(oracle_type.to_lowercase());
        }
        category
    }

    fn call_type(&mut self, call: &CallExpr, ctx: &TransformationContext<'_>) -> OracleType {
        let name = call.name.last();

        // NVL and friends take the type of their first argument.
        if matches!(
            name.as_str(),
            "nvl" | "nvl2" | "coalesce" | "nullif" | "greatest" | "least" | "min" | "max"
                | "sum" | "avg"
        ) {
            if let Some(arg) = call.args.first() {
                return self.type_of(&arg.value, ctx);
            }
            return OracleType::Unknown;
        }

        if call.name.len() == 1 {
            if let Some(builtin) = builtin_function(&name) {
                return builtin;
            }
        }

        // Catalog-driven: pkg.fn or schema.pkg.fn.
        let (schema, pkg) = match call.name.len() {
            2 => (ctx.current_schema.clone(), call.name.part(0)),
            3 => (call.name.part(0), call.name.part(1)),
            _ => return OracleType::Unknown,
        };
        if let Some(meta) = ctx.catalog.package_function(&schema, &pkg, &name) {
            if let Some(ret) = &meta.return_type {
                return scalar_category(ret);
            }
        }
        OracleType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::diagnostics::Pos;

    fn chain(parts: &[&str], offset: usize) -> IdentChain {
        IdentChain::new(
            parts.iter().map(|p| IdentPart::new(*p)).collect(),
            Pos::new(1, 1, offset),
        )
    }

    #[test]
    fn literals_and_pseudo_columns() {
        let cat = CatalogBuilder::new().build();
        let ctx = TransformationContext::new("hr", &cat);
        let mut infer = TypeInference::new();
        assert_eq!(
            infer.type_of(&Expr::Number("1".into()), &ctx),
            OracleType::Number
        );
        assert_eq!(
            infer.type_of(&Expr::StringLit("x".into()), &ctx),
            OracleType::Varchar2
        );
        assert_eq!(
            infer.type_of(&Expr::Rownum(Pos::start()), &ctx),
            OracleType::Number
        );
    }

    #[test]
    fn date_arithmetic_keeps_dates_and_differences_are_numbers() {
        let cat = CatalogBuilder::new().build();
        let ctx = TransformationContext::new("hr", &cat);
        let mut infer = TypeInference::new();
        let sysdate = Expr::Ident(chain(&["sysdate"], 10));
        let plus = Expr::Binary {
            op: BinOp::Add,
            left: Box::new(sysdate.clone()),
            right: Box::new(Expr::Number("7".into())),
        };
        assert!(infer.type_of(&plus, &ctx).is_datetime());

        let diff = Expr::Binary {
            op: BinOp::Sub,
            left: Box::new(sysdate.clone()),
            right: Box::new(sysdate),
        };
        assert_eq!(infer.type_of(&diff, &ctx), OracleType::Number);
    }

    #[test]
    fn alias_column_type_comes_from_the_catalog() {
        let cat = CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("hiredate", "DATE", true).column("sal", "NUMBER", true);
            })
            .build();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.push_query_scope();
        ctx.register_alias("e", "hr", "emp");
        let mut infer = TypeInference::new();
        assert!(
            infer
                .type_of(&Expr::Ident(chain(&["e", "hiredate"], 5)), &ctx)
                .is_datetime()
        );
        assert_eq!(
            infer.type_of(&Expr::Ident(chain(&["e", "sal"], 9)), &ctx),
            OracleType::Number
        );
        ctx.pop_query_scope();
    }

    #[test]
    fn memo_is_keyed_by_source_offset() {
        let cat = CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("sal", "NUMBER", true);
            })
            .build();
        let mut ctx = TransformationContext::new("hr", &cat);
        ctx.push_query_scope();
        ctx.register_alias("e", "hr", "emp");
        let mut infer = TypeInference::new();
        let e = Expr::Ident(chain(&["e", "sal"], 42));
        assert_eq!(infer.type_of(&e, &ctx), OracleType::Number);
        ctx.pop_query_scope();
        // Same offset now answers from the memo even with the alias gone.
        assert_eq!(infer.type_of(&e, &ctx), OracleType::Number);
        infer.clear();
        assert_eq!(infer.type_of(&e, &ctx), OracleType::Unknown);
    }

    #[test]
    fn package_function_return_type_is_catalog_driven() {
        let cat = CatalogBuilder::new()
            .package("hr", "pay", |p| {
                p.function("net", &[("p", "NUMBER")], Some("NUMBER"));
            })
            .build();
        let ctx = TransformationContext::new("hr", &cat);
        let mut infer = TypeInference::new();
        let call = Expr::Call(CallExpr {
            name: chain(&["pay", "net"], 7),
            args: vec![Arg::positional(Expr::Number("1".into()))],
            distinct: false,
            over: None,
            pos: Pos::new(1, 1, 7),
        });
        assert_eq!(infer.type_of(&call, &ctx), OracleType::Number);
    }
}
