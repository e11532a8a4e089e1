//! CONNECT BY lowering
//!
//! A hierarchical query block becomes a recursive CTE with two UNION ALL
//! branches: the base branch filtered by START WITH, and a recursive branch
//! joining the base table to the CTE through the PRIOR equalities. `LEVEL`
//! becomes `1` / `h.level + 1`, `SYS_CONNECT_BY_PATH(col, sep)` becomes the
//! usual accumulated path column. Remaining WHERE predicates apply once to
//! the outer SELECT over the CTE, which matches Oracle's evaluation order
//! (hierarchy first, filters second).

use super::Translator;
use super::query::split_conjuncts;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;

struct ItemPlan {
    base: String,
    recursive: String,
    /// Column name inside the CTE; what the outer SELECT projects.
    name: String,
}

impl Translator<'_> {
    pub(super) fn hierarchical_query(&mut self, qb: &QueryBlock) -> Result<String, Diagnostics> {
        let connect_by = qb.connect_by.as_ref().expect("checked by caller");

        let [TableRef::Table { name, alias }] = qb.from.as_slice() else {
            return Err(Diagnostics::at_start(
                DiagnosticKind::UnsupportedFeature,
                "CONNECT BY over anything but a single table",
            ));
        };
        let table_sql = self.table_name_sql(name, None);
        let cte = format!("{}_hierarchy", name.last());
        let base_alias = alias.clone();
        let rec_alias = alias.clone().unwrap_or_else(|| "t".to_string());
        let parent_alias = if rec_alias == "h" { "hp" } else { "h" }.to_string();

        if connect_by.nocycle {
            self.warn("NOCYCLE dropped; ensure the hierarchy is acyclic", 1);
        }

        self.ctx.push_query_scope();
        self.register_from_aliases(&qb.from);
        let result = self.hierarchical_inner(
            qb,
            connect_by,
            &table_sql,
            &cte,
            base_alias.as_deref(),
            &rec_alias,
            &parent_alias,
        );
        self.ctx.pop_query_scope();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn hierarchical_inner(
        &mut self,
        qb: &QueryBlock,
        connect_by: &ConnectBy,
        table_sql: &str,
        cte: &str,
        base_alias: Option<&str>,
        rec_alias: &str,
        parent_alias: &str,
    ) -> Result<String, Diagnostics> {
        let mut plans = Vec::new();
        for (i, item) in qb.items.iter().enumerate() {
            plans.push(self.plan_item(item, i, rec_alias, parent_alias)?);
        }

        // PRIOR equalities drive the recursive join; plain conjuncts in the
        // CONNECT BY condition filter the recursive branch.
        let mut join_conds = Vec::new();
        for conjunct in split_conjuncts(connect_by.condition.clone()) {
            join_conds.push(self.connect_condition(
                &conjunct,
                &mut plans,
                rec_alias,
                parent_alias,
            )?);
        }

        // Base branch.
        self.level_sql = Some("1".to_string());
        let base_where = match &qb.start_with {
            Some(cond) => format!(" WHERE {}", self.expr(cond)?),
            None => String::new(),
        };
        self.level_sql = None;

        let base_items: Vec<&str> = plans.iter().map(|p| p.base.as_str()).collect();
        let rec_items: Vec<&str> = plans.iter().map(|p| p.recursive.as_str()).collect();
        let base_from_alias = match base_alias {
            Some(a) => format!(" {a}"),
            None => String::new(),
        };

        let mut sql = format!(
            "WITH RECURSIVE {cte} AS (SELECT {} FROM {table_sql}{base_from_alias}{base_where} \
             UNION ALL SELECT {} FROM {table_sql} {rec_alias} JOIN {cte} {parent_alias} ON {})",
            base_items.join(", "),
            rec_items.join(", "),
            join_conds.join(" AND "),
        );

        // Outer SELECT over the CTE.
        let outer_items: Vec<String> = plans
            .iter()
            .filter(|p| !p.name.starts_with('#'))
            .map(|p| p.name.clone())
            .collect();
        sql.push_str(&format!(" SELECT {} FROM {cte}", outer_items.join(", ")));

        if let Some(where_clause) = &qb.where_clause {
            let rewritten = strip_alias(where_clause.clone(), base_alias);
            sql.push_str(&format!(" WHERE {}", self.expr(&rewritten)?));
        }
        if !qb.group_by.is_empty() {
            let cols = qb
                .group_by
                .iter()
                .map(|e| self.expr(&strip_alias(e.clone(), base_alias)))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            sql.push_str(&format!(" GROUP BY {cols}"));
        }
        if let Some(having) = &qb.having {
            let rewritten = strip_alias(having.clone(), base_alias);
            sql.push_str(&format!(" HAVING {}", self.expr(&rewritten)?));
        }
        Ok(sql)
    }

    fn plan_item(
        &mut self,
        item: &SelectItem,
        index: usize,
        rec_alias: &str,
        parent_alias: &str,
    ) -> Result<ItemPlan, Diagnostics> {
        // LEVEL
        if matches!(item.expr, Expr::Level(_)) {
            let name = item.alias.clone().unwrap_or_else(|| "level".to_string());
            return Ok(ItemPlan {
                base: format!("1 AS {name}"),
                recursive: format!("{parent_alias}.{name} + 1"),
                name,
            });
        }

        // SYS_CONNECT_BY_PATH(col, sep)
        if let Expr::Call(call) = &item.expr {
            if call.name.len() == 1 && call.name.first() == "sys_connect_by_path" {
                if call.args.len() != 2 {
                    return Err(Diagnostics::new(
                        DiagnosticKind::ParseError,
                        "SYS_CONNECT_BY_PATH takes two arguments",
                        call.pos,
                    ));
                }
                let name = item.alias.clone().unwrap_or_else(|| "path".to_string());
                let col = self.expr(&call.args[0].value)?;
                let sep = self.expr(&call.args[1].value)?;
                self.qualify_bare_columns = Some(rec_alias.to_string());
                let rec_col = self.expr(&call.args[0].value)?;
                self.qualify_bare_columns = None;
                return Ok(ItemPlan {
                    base: format!("{sep} || {col} AS {name}"),
                    recursive: format!("{parent_alias}.{name} || {sep} || {rec_col}"),
                    name,
                });
            }
        }

        // Ordinary item: base as written, recursive branch qualified with
        // the base-table alias.
        self.level_sql = Some("1".to_string());
        let base_sql = self.expr(&item.expr)?;
        self.level_sql = None;
        let name = match (&item.alias, &item.expr) {
            (Some(alias), _) => alias.clone(),
            (None, Expr::Ident(chain)) => chain.last(),
            _ => format!("col{}", index + 1),
        };
        let base = if base_sql == name {
            base_sql.clone()
        } else {
            format!("{base_sql} AS {name}")
        };

        self.qualify_bare_columns = Some(rec_alias.to_string());
        self.level_sql = Some(format!("{parent_alias}.level + 1"));
        let recursive = self.expr(&item.expr)?;
        self.qualify_bare_columns = None;
        self.level_sql = None;

        Ok(ItemPlan {
            base,
            recursive,
            name,
        })
    }

    /// One CONNECT BY conjunct. PRIOR equalities join child to parent; a
    /// conjunct without PRIOR filters the recursive branch. Columns the join
    /// needs but the projection lacks are appended as hidden CTE columns.
    fn connect_condition(
        &mut self,
        conjunct: &Expr,
        plans: &mut Vec<ItemPlan>,
        rec_alias: &str,
        parent_alias: &str,
    ) -> Result<String, Diagnostics> {
        if let Expr::Binary {
            op: BinOp::Eq,
            left,
            right,
        } = conjunct
        {
            let (prior_side, child_side) = match (strip_prior(left), strip_prior(right)) {
                (Some(p), None) => (p, (**right).clone()),
                (None, Some(p)) => (p, (**left).clone()),
                _ => {
                    // No PRIOR: a plain recursive-branch filter.
                    return self.recursive_filter(conjunct, rec_alias, parent_alias);
                }
            };

            let parent_col = match &prior_side {
                Expr::Ident(chain) => chain.last(),
                _ => {
                    return Err(Diagnostics::at_start(
                        DiagnosticKind::UnsupportedFeature,
                        "PRIOR on a non-column expression",
                    ));
                }
            };
            ensure_cte_column(plans, &parent_col, rec_alias);

            self.qualify_bare_columns = Some(rec_alias.to_string());
            let child_sql = self.expr(&child_side)?;
            self.qualify_bare_columns = None;

            return Ok(format!("{child_sql} = {parent_alias}.{parent_col}"));
        }
        self.recursive_filter(conjunct, rec_alias, parent_alias)
    }

    fn recursive_filter(
        &mut self,
        conjunct: &Expr,
        rec_alias: &str,
        parent_alias: &str,
    ) -> Result<String, Diagnostics> {
        self.qualify_bare_columns = Some(rec_alias.to_string());
        self.level_sql = Some(format!("{parent_alias}.level + 1"));
        let sql = self.expr(conjunct);
        self.qualify_bare_columns = None;
        self.level_sql = None;
        sql
    }
}

/// Unwrap `PRIOR expr`, looking through parentheses.
fn strip_prior(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Prior(inner) => Some((**inner).clone()),
        Expr::Paren(inner) => strip_prior(inner),
        _ => None,
    }
}

/// Rewrite `alias.col` to bare `col` for the outer SELECT over the CTE,
/// where the original table alias is no longer in scope.
fn strip_alias(e: Expr, alias: Option<&str>) -> Expr {
    let Some(alias) = alias else {
        return e;
    };
    map_expr(e, &|node| {
        if let Expr::Ident(chain) = &node {
            if chain.len() == 2 && chain.first() == alias {
                return Expr::Ident(IdentChain::new(vec![chain.parts[1].clone()], chain.pos));
            }
        }
        node
    })
}

/// Bottom-up structural map over the expression shapes the outer clauses of
/// a hierarchical query can contain.
fn map_expr(e: Expr, f: &impl Fn(Expr) -> Expr) -> Expr {
    let mapped = match e {
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(map_expr(*expr, f)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(map_expr(*left, f)),
            right: Box::new(map_expr(*right, f)),
        },
        Expr::Paren(inner) => Expr::Paren(Box::new(map_expr(*inner, f))),
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(map_expr(*expr, f)),
            negated,
        },
        Expr::InList {
            expr,
            items,
            negated,
        } => Expr::InList {
            expr: Box::new(map_expr(*expr, f)),
            items: items.into_iter().map(|i| map_expr(i, f)).collect(),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(map_expr(*expr, f)),
            low: Box::new(map_expr(*low, f)),
            high: Box::new(map_expr(*high, f)),
            negated,
        },
        Expr::Like {
            expr,
            pattern,
            escape,
            negated,
        } => Expr::Like {
            expr: Box::new(map_expr(*expr, f)),
            pattern: Box::new(map_expr(*pattern, f)),
            escape,
            negated,
        },
        Expr::Call(mut call) => {
            call.args = call
                .args
                .into_iter()
                .map(|arg| Arg {
                    name: arg.name,
                    value: map_expr(arg.value, f),
                })
                .collect();
            Expr::Call(call)
        }
        Expr::Case(case) => Expr::Case(CaseExpr {
            operand: case.operand.map(|o| Box::new(map_expr(*o, f))),
            arms: case
                .arms
                .into_iter()
                .map(|(c, v)| (map_expr(c, f), map_expr(v, f)))
                .collect(),
            else_expr: case.else_expr.map(|e| Box::new(map_expr(*e, f))),
        }),
        other => other,
    };
    f(mapped)
}

/// The recursive join needs `parent_alias.col`; add `col` to both branches
/// as a hidden column when the projection does not already carry it.
fn ensure_cte_column(plans: &mut Vec<ItemPlan>, col: &str, rec_alias: &str) {
    let hidden = format!("#{col}");
    if plans.iter().any(|p| p.name == col || p.name == hidden) {
        return;
    }
    plans.push(ItemPlan {
        base: col.to_string(),
        recursive: format!("{rec_alias}.{col}"),
        // A leading '#' keeps hidden columns out of the outer projection.
        name: format!("#{col}"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::catalog::{Catalog, CatalogBuilder};
    use crate::config::Config;
    use crate::parser::{TranslationKind, parse};

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false)
                    .column("ename", "VARCHAR2", true)
                    .column("mgr", "NUMBER", true);
            })
            .build()
    }

    fn translate(src: &str) -> String {
        let cat = catalog();
        let config = Config::default();
        let mut tr = Translator::new("hr", &cat, &config, CancelToken::new());
        let ParsedUnit::View(sel) = parse(src, TranslationKind::ViewSelect).unwrap() else {
            panic!("expected view");
        };
        tr.view_select(&sel).unwrap()
    }

    #[test]
    fn basic_hierarchy_becomes_a_recursive_cte() {
        let sql = translate(
            "SELECT empno, LEVEL FROM emp START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
        );
        assert_eq!(
            sql,
            "WITH RECURSIVE emp_hierarchy AS (\
             SELECT empno, 1 AS level FROM hr.emp WHERE mgr IS NULL \
             UNION ALL SELECT t.empno, h.level + 1 FROM hr.emp t JOIN emp_hierarchy h ON t.mgr = h.empno\
             ) SELECT empno, level FROM emp_hierarchy"
        );
    }

    #[test]
    fn reversed_prior_direction_is_supported() {
        let sql = translate(
            "SELECT empno FROM emp START WITH mgr IS NULL CONNECT BY mgr = PRIOR empno",
        );
        assert!(sql.contains("ON t.mgr = h.empno"));
    }

    #[test]
    fn hidden_join_column_is_added_but_not_projected() {
        let sql = translate(
            "SELECT ename FROM emp START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
        );
        // empno is needed for the join, so it rides along in the CTE...
        assert!(sql.contains("SELECT ename, empno FROM hr.emp"));
        // ...but the outer projection only has ename.
        assert!(sql.ends_with(") SELECT ename FROM emp_hierarchy"));
    }

    #[test]
    fn sys_connect_by_path_accumulates() {
        let sql = translate(
            "SELECT empno, SYS_CONNECT_BY_PATH(ename, '/') p FROM emp \
             START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
        );
        assert!(sql.contains("'/' || ename AS p"));
        assert!(sql.contains("h.p || '/' || t.ename"));
    }

    #[test]
    fn level_filter_in_connect_by_bounds_recursion() {
        let sql = translate(
            "SELECT empno FROM emp START WITH mgr IS NULL \
             CONNECT BY PRIOR empno = mgr AND LEVEL <= 3",
        );
        assert!(sql.contains("ON t.mgr = h.empno AND h.level + 1 <= 3"));
    }

    #[test]
    fn outer_where_applies_after_the_hierarchy() {
        let sql = translate(
            "SELECT empno, LEVEL FROM emp WHERE ename LIKE 'A%' \
             START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
        );
        assert!(sql.contains("FROM emp_hierarchy WHERE ename LIKE 'A%'"));
        // The hierarchy itself is built unfiltered.
        assert!(sql.contains("FROM hr.emp WHERE mgr IS NULL UNION ALL"));
    }

    #[test]
    fn multi_table_from_with_connect_by_is_unsupported() {
        let cat = catalog();
        let config = Config::default();
        let mut tr = Translator::new("hr", &cat, &config, CancelToken::new());
        let ParsedUnit::View(sel) = parse(
            "SELECT e.empno FROM emp e, emp m START WITH e.mgr IS NULL CONNECT BY PRIOR e.empno = e.mgr",
            TranslationKind::ViewSelect,
        )
        .unwrap() else {
            panic!("expected view");
        };
        let err = tr.view_select(&sel).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::UnsupportedFeature);
    }
}
