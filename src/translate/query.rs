//! Query-block emission
//!
//! Table-position identifiers pick up synonym resolution and schema
//! qualification, `FROM DUAL` disappears, `MINUS` becomes `EXCEPT`, WITH
//! lists gain `RECURSIVE` when a CTE references itself, and `ROWNUM`
//! filters lower to `LIMIT`. Alias and CTE scopes are pushed per query
//! block and popped on every exit path.

use super::Translator;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;

impl Translator<'_> {
    /// Emit a full SELECT. `into` carries the rendered PL/pgSQL INTO list
    /// for `SELECT ... INTO` statements; it lands in the outermost block.
    pub(crate) fn select(
        &mut self,
        sel: &Select,
        into: Option<&str>,
    ) -> Result<String, Diagnostics> {
        self.ctx.push_query_scope();
        let result = self.select_inner(sel, into);
        self.ctx.pop_query_scope();
        result
    }

    fn select_inner(&mut self, sel: &Select, into: Option<&str>) -> Result<String, Diagnostics> {
        let mut sql = String::new();

        if !sel.with.is_empty() {
            let recursive = sel
                .with
                .iter()
                .any(|cte| select_references_name(&cte.query, &cte.name));
            // Register CTE names before translating bodies so that a
            // recursive self-reference is not schema-qualified.
            for cte in &sel.with {
                self.ctx.register_cte(&cte.name);
            }
            let mut parts = Vec::new();
            for cte in &sel.with {
                let body = self.select(&cte.query, None)?;
                let cols = if cte.columns.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", cte.columns.join(", "))
                };
                parts.push(format!("{}{} AS ({})", cte.name, cols, body));
            }
            let recursive_kw = if recursive { "RECURSIVE " } else { "" };
            sql.push_str(&format!("WITH {recursive_kw}{} ", parts.join(", ")));
        }

        let (body, limit) = self.query_expr_sql(&sel.body, into)?;
        sql.push_str(&body);

        if !sel.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by_sql(&sel.order_by)?));
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(sql)
    }

    fn query_expr_sql(
        &mut self,
        body: &QueryExpr,
        into: Option<&str>,
    ) -> Result<(String, Option<i64>), Diagnostics> {
        match body {
            QueryExpr::Block(block) => self.query_block_sql(block, into),
            QueryExpr::Compound { op, left, right } => {
                let (lhs, l_limit) = self.query_expr_sql(left, into)?;
                let (rhs, r_limit) = self.query_expr_sql(right, None)?;
                if l_limit.is_some() || r_limit.is_some() {
                    return Err(Diagnostics::at_start(
                        DiagnosticKind::UnsupportedFeature,
                        "ROWNUM filter inside a compound query",
                    ));
                }
                let op_sql = match op {
                    SetOp::Union => "UNION",
                    SetOp::UnionAll => "UNION ALL",
                    SetOp::Intersect => "INTERSECT",
                    SetOp::Minus => "EXCEPT",
                };
                Ok((format!("{lhs} {op_sql} {rhs}"), None))
            }
        }
    }

    fn query_block_sql(
        &mut self,
        qb: &QueryBlock,
        into: Option<&str>,
    ) -> Result<(String, Option<i64>), Diagnostics> {
        self.ctx.push_query_scope();
        let result = self.query_block_inner(qb, into);
        self.ctx.pop_query_scope();
        result
    }

    fn query_block_inner(
        &mut self,
        qb: &QueryBlock,
        into: Option<&str>,
    ) -> Result<(String, Option<i64>), Diagnostics> {
        if qb.connect_by.is_some() {
            return self.hierarchical_query(qb).map(|sql| (sql, None));
        }

        self.register_from_aliases(&qb.from);

        // Oracle (+) predicates first: they rewrite FROM and consume the
        // predicates they translate.
        let mut where_expr = qb.where_clause.clone();
        let mut from_override = None;
        if where_expr.as_ref().is_some_and(has_outer_marker) {
            let (from_sql, remaining) =
                self.rewrite_outer_joins(&qb.from, where_expr.take().unwrap())?;
            from_override = Some(from_sql);
            where_expr = remaining;
        }

        let (where_expr, limit) = extract_rownum_limit(where_expr);

        let mut items = Vec::new();
        for item in &qb.items {
            let mut sql = self.expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                sql.push_str(&format!(" AS {alias}"));
            }
            items.push(sql);
        }

        let distinct = if qb.distinct { "DISTINCT " } else { "" };
        let mut sql = format!("SELECT {distinct}{}", items.join(", "));

        if let Some(into) = into {
            sql.push_str(&format!(" INTO {into}"));
        }

        match from_override {
            Some(from_sql) => sql.push_str(&format!(" FROM {from_sql}")),
            None => {
                if let Some(from_sql) = self.from_sql(&qb.from)? {
                    sql.push_str(&format!(" FROM {from_sql}"));
                }
            }
        }

        if let Some(where_expr) = &where_expr {
            sql.push_str(&format!(" WHERE {}", self.expr(where_expr)?));
        }
        if !qb.group_by.is_empty() {
            let cols = qb
                .group_by
                .iter()
                .map(|e| self.expr(e))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            sql.push_str(&format!(" GROUP BY {cols}"));
        }
        if let Some(having) = &qb.having {
            sql.push_str(&format!(" HAVING {}", self.expr(having)?));
        }

        Ok((sql, limit))
    }

    /// `FROM DUAL` with no other source elides the clause entirely.
    pub(crate) fn from_sql(&mut self, from: &[TableRef]) -> Result<Option<String>, Diagnostics> {
        if let [TableRef::Table { name, .. }] = from {
            if name.len() == 1 && name.first() == "dual" {
                return Ok(None);
            }
        }
        if from.is_empty() {
            return Ok(None);
        }
        let parts = from
            .iter()
            .map(|t| self.table_ref_sql(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(parts.join(", ")))
    }

    fn table_ref_sql(&mut self, table: &TableRef) -> Result<String, Diagnostics> {
        match table {
            TableRef::Table { name, alias } => Ok(self.table_name_sql(name, alias.as_deref())),
            TableRef::Subquery { query, alias } => {
                let body = self.select(query, None)?;
                let alias = alias.clone().unwrap_or_else(|| "subq".to_string());
                Ok(format!("({body}) {alias}"))
            }
            TableRef::Join {
                left,
                kind,
                right,
                on,
            } => {
                let lhs = self.table_ref_sql(left)?;
                let rhs = self.table_ref_sql(right)?;
                let kw = match kind {
                    JoinKind::Inner => "JOIN",
                    JoinKind::Left => "LEFT JOIN",
                    JoinKind::Right => "RIGHT JOIN",
                    JoinKind::Full => "FULL JOIN",
                    JoinKind::Cross => "CROSS JOIN",
                };
                let mut sql = format!("{lhs} {kw} {rhs}");
                if let Some(on) = on {
                    sql.push_str(&format!(" ON {}", self.expr(on)?));
                }
                Ok(sql)
            }
        }
    }

    /// A table-position name: CTEs stay bare, everything else resolves
    /// through synonyms and picks up its schema.
    pub(crate) fn table_name_sql(&mut self, name: &IdentChain, alias: Option<&str>) -> String {
        let suffix = match alias {
            Some(alias) => format!(" {alias}"),
            None => String::new(),
        };
        if name.len() == 1 && self.ctx.is_cte(&name.first()) {
            return format!("{}{suffix}", name.first());
        }
        let parts: Vec<String> = name.parts.iter().map(|p| p.normalized()).collect();
        let resolved = self
            .ctx
            .catalog
            .resolve_table(&self.ctx.current_schema, &parts);
        format!("{}.{}{suffix}", resolved.schema, resolved.name)
    }

    /// Bind aliases (and bare table names) to resolved tables for the
    /// current query scope. CTE and subquery aliases bind with an empty
    /// schema so column typing simply misses.
    pub(crate) fn register_from_aliases(&mut self, from: &[TableRef]) {
        for table in from {
            self.register_table_aliases(table);
        }
    }

    fn register_table_aliases(&mut self, table: &TableRef) {
        match table {
            TableRef::Table { name, alias } => {
                let bound = alias.clone().unwrap_or_else(|| name.last());
                if name.len() == 1 && self.ctx.is_cte(&name.first()) {
                    self.ctx.register_alias(&bound, "", &name.first());
                    return;
                }
                let parts: Vec<String> = name.parts.iter().map(|p| p.normalized()).collect();
                let resolved = self
                    .ctx
                    .catalog
                    .resolve_table(&self.ctx.current_schema, &parts);
                self.ctx
                    .register_alias(&bound, &resolved.schema, &resolved.name);
            }
            TableRef::Subquery { alias, .. } => {
                if let Some(alias) = alias {
                    self.ctx.register_alias(alias, "", alias);
                }
            }
            TableRef::Join { left, right, .. } => {
                self.register_table_aliases(left);
                self.register_table_aliases(right);
            }
        }
    }
}

fn has_outer_marker(e: &Expr) -> bool {
    match e {
        Expr::OuterJoined(_) => true,
        Expr::Binary { left, right, .. } => has_outer_marker(left) || has_outer_marker(right),
        Expr::Unary { expr, .. } | Expr::Paren(expr) => has_outer_marker(expr),
        Expr::IsNull { expr, .. } => has_outer_marker(expr),
        Expr::InList { expr, items, .. } => {
            has_outer_marker(expr) || items.iter().any(has_outer_marker)
        }
        Expr::Between {
            expr, low, high, ..
        } => has_outer_marker(expr) || has_outer_marker(low) || has_outer_marker(high),
        Expr::Like { expr, pattern, .. } => has_outer_marker(expr) || has_outer_marker(pattern),
        Expr::Call(call) => call.args.iter().any(|a| has_outer_marker(&a.value)),
        _ => false,
    }
}

/// Split top-level AND conjuncts.
pub(crate) fn split_conjuncts(e: Expr) -> Vec<Expr> {
    match e {
        Expr::Binary {
            op: BinOp::And,
            left,
            right,
        } => {
            let mut out = split_conjuncts(*left);
            out.extend(split_conjuncts(*right));
            out
        }
        other => vec![other],
    }
}

pub(crate) fn join_conjuncts(mut conjuncts: Vec<Expr>) -> Option<Expr> {
    let first = conjuncts.pop()?;
    Some(conjuncts.into_iter().rev().fold(first, |acc, e| Expr::Binary {
        op: BinOp::And,
        left: Box::new(e),
        right: Box::new(acc),
    }))
}

/// Lower `ROWNUM <= N` (and friends) to a LIMIT, keeping every other
/// conjunct in WHERE.
fn extract_rownum_limit(where_expr: Option<Expr>) -> (Option<Expr>, Option<i64>) {
    let Some(where_expr) = where_expr else {
        return (None, None);
    };
    let mut remaining = Vec::new();
    let mut limit: Option<i64> = None;
    for conjunct in split_conjuncts(where_expr) {
        match rownum_limit(&conjunct) {
            Some(n) => {
                let n = n.max(0);
                limit = Some(limit.map_or(n, |prev: i64| prev.min(n)));
            }
            None => remaining.push(conjunct),
        }
    }
    (join_conjuncts(remaining), limit)
}

fn rownum_limit(e: &Expr) -> Option<i64> {
    let Expr::Binary { op, left, right } = e else {
        return None;
    };
    let (op, n) = match (&**left, &**right) {
        (Expr::Rownum(_), Expr::Number(n)) => (*op, n),
        // Reversed comparison: `N >= ROWNUM`.
        (Expr::Number(n), Expr::Rownum(_)) => {
            let flipped = match op {
                BinOp::Ge => BinOp::Le,
                BinOp::Gt => BinOp::Lt,
                BinOp::Eq => BinOp::Eq,
                _ => return None,
            };
            (flipped, n)
        }
        _ => return None,
    };
    let n: i64 = n.parse().ok()?;
    match op {
        BinOp::Le => Some(n),
        BinOp::Lt => Some(n - 1),
        BinOp::Eq if n == 1 => Some(1),
        _ => None,
    }
}

/// Does any FROM position inside `sel` reference `name`? Drives the
/// `WITH RECURSIVE` decision.
fn select_references_name(sel: &Select, name: &str) -> bool {
    fn query_expr(body: &QueryExpr, name: &str) -> bool {
        match body {
            QueryExpr::Block(block) => block.from.iter().any(|t| table_ref(t, name)),
            QueryExpr::Compound { left, right, .. } => {
                query_expr(left, name) || query_expr(right, name)
            }
        }
    }
    fn table_ref(t: &TableRef, name: &str) -> bool {
        match t {
            TableRef::Table { name: n, .. } => {
                n.len() == 1 && n.first().eq_ignore_ascii_case(name)
            }
            TableRef::Subquery { query, .. } => select_references_name(query, name),
            TableRef::Join { left, right, .. } => table_ref(left, name) || table_ref(right, name),
        }
    }
    sel.with
        .iter()
        .any(|cte| select_references_name(&cte.query, name))
        || query_expr(&sel.body, name)
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
                    .column("deptno", "NUMBER", true);
            })
            .table("hr", "dept", |t| {
                t.column("deptno", "NUMBER", false)
                    .column("dname", "VARCHAR2", true);
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
        let sql = tr.view_select(&sel).unwrap();
        assert_eq!(tr.ctx.query_depth(), 0, "query scope leaked");
        sql
    }

    #[test]
    fn unqualified_tables_gain_the_current_schema() {
        insta::assert_snapshot!(
            translate("SELECT ename FROM emp"),
            @"SELECT ename FROM hr.emp"
        );
    }

    #[test]
    fn from_dual_is_elided() {
        insta::assert_snapshot!(translate("SELECT 1 FROM dual"), @"SELECT 1");
    }

    #[test]
    fn rownum_filter_lowers_to_limit() {
        insta::assert_snapshot!(
            translate("SELECT * FROM t WHERE ROWNUM <= 5"),
            @"SELECT * FROM hr.t LIMIT 5"
        );
    }

    #[test]
    fn rownum_boundary_cases() {
        assert!(translate("SELECT * FROM t WHERE ROWNUM <= 0").ends_with("LIMIT 0"));
        assert!(translate("SELECT * FROM t WHERE ROWNUM < 1").ends_with("LIMIT 0"));
        assert!(translate("SELECT * FROM t WHERE ROWNUM = 1").ends_with("LIMIT 1"));
    }

    #[test]
    fn mixed_rownum_predicate_keeps_the_rest_in_where() {
        let sql = translate("SELECT * FROM emp WHERE ROWNUM <= 5 AND deptno = 10");
        assert_eq!(sql, "SELECT * FROM hr.emp WHERE deptno = 10 LIMIT 5");
    }

    #[test]
    fn rownum_in_select_list_becomes_row_number() {
        let sql = translate("SELECT ROWNUM, ename FROM emp");
        assert_eq!(sql, "SELECT row_number() OVER (), ename FROM hr.emp");
    }

    #[test]
    fn minus_becomes_except() {
        let sql = translate("SELECT empno FROM emp MINUS SELECT deptno FROM dept");
        assert_eq!(
            sql,
            "SELECT empno FROM hr.emp EXCEPT SELECT deptno FROM hr.dept"
        );
    }

    #[test]
    fn self_referencing_cte_gains_recursive() {
        let sql = translate(
            "WITH r (n) AS (SELECT 1 FROM dual UNION ALL SELECT n + 1 FROM r) SELECT n FROM r",
        );
        assert!(sql.starts_with("WITH RECURSIVE r (n) AS ("));
        assert!(sql.contains("UNION ALL SELECT n + 1 FROM r"));
        assert!(sql.ends_with("SELECT n FROM r"));
    }

    #[test]
    fn plain_cte_stays_non_recursive_and_unqualified() {
        let sql = translate("WITH top_emps AS (SELECT empno FROM emp) SELECT empno FROM top_emps");
        assert!(sql.starts_with("WITH top_emps AS ("));
        assert!(!sql.contains("RECURSIVE"));
        assert!(sql.ends_with("SELECT empno FROM top_emps"));
    }

    #[test]
    fn ansi_joins_pass_through_with_qualification() {
        let sql = translate(
            "SELECT e.ename, d.dname FROM emp e JOIN dept d ON e.deptno = d.deptno",
        );
        assert_eq!(
            sql,
            "SELECT e.ename, d.dname FROM hr.emp e JOIN hr.dept d ON e.deptno = d.deptno"
        );
    }

    #[test]
    fn order_by_with_nulls_placement() {
        let sql = translate("SELECT ename FROM emp ORDER BY ename DESC NULLS LAST");
        assert_eq!(
            sql,
            "SELECT ename FROM hr.emp ORDER BY ename DESC NULLS LAST"
        );
    }
}
