//! Cursor-attribute pre-scan
//!
//! Runs before statement translation. Every `c%FOUND` / `%NOTFOUND` /
//! `%ROWCOUNT` / `%ISOPEN` sighting marks its cursor as needing tracking
//! variables, and any `SQL%…` sets the implicit-cursor flag so DML
//! translation emits `GET DIAGNOSTICS`. PL/pgSQL has no cursor attributes,
//! so the declaration translator later injects `c__found` / `c__rowcount` /
//! `c__isopen` locals and the OPEN/FETCH/CLOSE translators keep them
//! current in program order.
//!
//! Cursor attributes are ordinary primary expressions, so the walk must
//! reach every expression position — including SELECT statements embedded
//! in `SELECT INTO`, `INSERT ... SELECT`, cursor declarations, and
//! subqueries. Missing one would emit a reference to a tracking variable
//! that was never declared.

use crate::context::TransformationContext;
use crate::parser::ast::*;

pub(crate) fn prescan(block: &Block, ctx: &mut TransformationContext<'_>) {
    walk_block(block, &mut |expr| {
        if let Expr::CursorAttr { cursor, .. } = expr {
            match cursor {
                Some(name) => ctx.need_cursor_attrs(name),
                None => ctx.sql_attribute_needed = true,
            }
        }
    });
}

fn walk_block(block: &Block, f: &mut impl FnMut(&Expr)) {
    for decl in &block.declarations {
        match decl {
            Declaration::Variable(var) => {
                if let Some(default) = &var.default {
                    walk_expr(default, f);
                }
            }
            Declaration::Cursor { query, .. } => walk_select(query, f),
            _ => {}
        }
    }
    for stmt in &block.statements {
        walk_stmt(stmt, f);
    }
    for handler in &block.handlers {
        for stmt in &handler.statements {
            walk_stmt(stmt, f);
        }
    }
}

fn walk_stmt(stmt: &Stmt, f: &mut impl FnMut(&Expr)) {
    match &stmt.kind {
        StmtKind::Assign { target, value } => {
            if let Target::Index { index, .. } = target {
                walk_expr(index, f);
            }
            walk_expr(value, f);
        }
        StmtKind::If { arms, else_branch } => {
            for (cond, body) in arms {
                walk_expr(cond, f);
                for s in body {
                    walk_stmt(s, f);
                }
            }
            if let Some(body) = else_branch {
                for s in body {
                    walk_stmt(s, f);
                }
            }
        }
        StmtKind::CaseSimple {
            operand,
            arms,
            else_branch,
        } => {
            walk_expr(operand, f);
            for (cond, body) in arms {
                walk_expr(cond, f);
                for s in body {
                    walk_stmt(s, f);
                }
            }
            if let Some(body) = else_branch {
                for s in body {
                    walk_stmt(s, f);
                }
            }
        }
        StmtKind::CaseSearched { arms, else_branch } => {
            for (cond, body) in arms {
                walk_expr(cond, f);
                for s in body {
                    walk_stmt(s, f);
                }
            }
            if let Some(body) = else_branch {
                for s in body {
                    walk_stmt(s, f);
                }
            }
        }
        StmtKind::Loop { body } => {
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::While { condition, body } => {
            walk_expr(condition, f);
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::ForRange {
            low, high, body, ..
        } => {
            walk_expr(low, f);
            walk_expr(high, f);
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::ForCursor { source, body, .. } => {
            if let CursorSource::Inline(query) = source {
                walk_select(query, f);
            }
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::Exit { when } | StmtKind::Continue { when } => {
            if let Some(cond) = when {
                walk_expr(cond, f);
            }
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                walk_expr(value, f);
            }
        }
        StmtKind::Call(call) => {
            for arg in &call.args {
                walk_expr(&arg.value, f);
            }
        }
        StmtKind::SelectInto { query, into } => {
            walk_select(query, f);
            for target in into {
                if let Target::Index { index, .. } = target {
                    walk_expr(index, f);
                }
            }
        }
        StmtKind::Insert(insert) => match &insert.source {
            InsertSource::Values(rows) => {
                for row in rows {
                    for value in row {
                        walk_expr(value, f);
                    }
                }
            }
            InsertSource::Query(query) => walk_select(query, f),
        },
        StmtKind::Update(update) => {
            for (_, value) in &update.set {
                walk_expr(value, f);
            }
            if let Some(where_clause) = &update.where_clause {
                walk_expr(where_clause, f);
            }
        }
        StmtKind::Delete(delete) => {
            if let Some(where_clause) = &delete.where_clause {
                walk_expr(where_clause, f);
            }
        }
        StmtKind::Block(block) => walk_block(block, f),
        StmtKind::ExecuteImmediate { sql } => walk_expr(sql, f),
        StmtKind::Raise { .. }
        | StmtKind::Null
        | StmtKind::Open { .. }
        | StmtKind::Fetch { .. }
        | StmtKind::Close { .. }
        | StmtKind::Commit
        | StmtKind::Rollback
        | StmtKind::Unsupported { .. } => {}
    }
}

/// Every expression position of a SELECT: CTE bodies, select list, FROM
/// subqueries and join conditions, WHERE, hierarchical clauses, GROUP
/// BY/HAVING, ORDER BY.
fn walk_select(sel: &Select, f: &mut impl FnMut(&Expr)) {
    for cte in &sel.with {
        walk_select(&cte.query, f);
    }
    walk_query_expr(&sel.body, f);
    for item in &sel.order_by {
        walk_expr(&item.expr, f);
    }
}

fn walk_query_expr(body: &QueryExpr, f: &mut impl FnMut(&Expr)) {
    match body {
        QueryExpr::Block(block) => {
            for item in &block.items {
                walk_expr(&item.expr, f);
            }
            for table in &block.from {
                walk_table_ref(table, f);
            }
            if let Some(where_clause) = &block.where_clause {
                walk_expr(where_clause, f);
            }
            if let Some(start_with) = &block.start_with {
                walk_expr(start_with, f);
            }
            if let Some(connect_by) = &block.connect_by {
                walk_expr(&connect_by.condition, f);
            }
            for group in &block.group_by {
                walk_expr(group, f);
            }
            if let Some(having) = &block.having {
                walk_expr(having, f);
            }
        }
        QueryExpr::Compound { left, right, .. } => {
            walk_query_expr(left, f);
            walk_query_expr(right, f);
        }
    }
}

fn walk_table_ref(table: &TableRef, f: &mut impl FnMut(&Expr)) {
    match table {
        TableRef::Table { .. } => {}
        TableRef::Subquery { query, .. } => walk_select(query, f),
        TableRef::Join {
            left, right, on, ..
        } => {
            walk_table_ref(left, f);
            walk_table_ref(right, f);
            if let Some(on) = on {
                walk_expr(on, f);
            }
        }
    }
}

fn walk_expr(e: &Expr, f: &mut impl FnMut(&Expr)) {
    f(e);
    match e {
        Expr::Unary { expr, .. }
        | Expr::Paren(expr)
        | Expr::OuterJoined(expr)
        | Expr::Prior(expr)
        | Expr::Cast { expr, .. } => walk_expr(expr, f),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Call(call) => {
            for arg in &call.args {
                walk_expr(&arg.value, f);
            }
        }
        Expr::Case(case) => {
            if let Some(operand) = &case.operand {
                walk_expr(operand, f);
            }
            for (cond, value) in &case.arms {
                walk_expr(cond, f);
                walk_expr(value, f);
            }
            if let Some(else_expr) = &case.else_expr {
                walk_expr(else_expr, f);
            }
        }
        Expr::IsNull { expr, .. } => walk_expr(expr, f),
        Expr::InList { expr, items, .. } => {
            walk_expr(expr, f);
            for item in items {
                walk_expr(item, f);
            }
        }
        Expr::InSubquery { expr, query, .. } => {
            walk_expr(expr, f);
            walk_select(query, f);
        }
        Expr::Subquery(query) => walk_select(query, f),
        Expr::Exists(query) => walk_select(query, f),
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, f);
            walk_expr(low, f);
            walk_expr(high, f);
        }
        Expr::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            walk_expr(expr, f);
            walk_expr(pattern, f);
            if let Some(escape) = escape {
                walk_expr(escape, f);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::parser::{TranslationKind, parse};

    fn prescan_function(src: &str) -> (Vec<String>, bool) {
        let cat = CatalogBuilder::new().build();
        let mut ctx = TransformationContext::new("hr", &cat);
        let ParsedUnit::Function(def) = parse(src, TranslationKind::Function).unwrap() else {
            panic!("expected function");
        };
        prescan(&def.block, &mut ctx);
        (ctx.cursors_needing_attrs(), ctx.sql_attribute_needed)
    }

    #[test]
    fn explicit_cursor_attributes_are_collected() {
        let (cursors, sql) = prescan_function(
            "FUNCTION f RETURN NUMBER IS
               CURSOR c IS SELECT 1 FROM dual;
               v NUMBER;
             BEGIN
               OPEN c;
               LOOP
                 FETCH c INTO v;
                 EXIT WHEN c%NOTFOUND;
               END LOOP;
               CLOSE c;
               RETURN c%ROWCOUNT;
             END;",
        );
        assert_eq!(cursors, vec!["c"]);
        assert!(!sql);
    }

    #[test]
    fn implicit_sql_attribute_sets_the_flag_only() {
        let (cursors, sql) = prescan_function(
            "FUNCTION f RETURN NUMBER IS BEGIN
               UPDATE t SET a = 1;
               RETURN SQL%ROWCOUNT;
             END;",
        );
        assert!(cursors.is_empty());
        assert!(sql);
    }

    #[test]
    fn attributes_inside_nested_blocks_and_handlers_count() {
        let (cursors, _) = prescan_function(
            "FUNCTION f RETURN NUMBER IS
               CURSOR c1 IS SELECT 1 FROM dual;
               CURSOR c2 IS SELECT 2 FROM dual;
             BEGIN
               BEGIN
                 EXIT WHEN c1%NOTFOUND;
               END;
               RETURN 0;
             EXCEPTION
               WHEN OTHERS THEN
                 IF c2%ISOPEN THEN
                   CLOSE c2;
                 END IF;
                 RETURN -1;
             END;",
        );
        assert_eq!(cursors, vec!["c1", "c2"]);
    }

    #[test]
    fn attributes_inside_select_into_queries_count() {
        let (cursors, sql) = prescan_function(
            "FUNCTION f RETURN NUMBER IS
               CURSOR c IS SELECT 1 FROM dual;
               v NUMBER;
             BEGIN
               SELECT a INTO v FROM t WHERE b = c%ROWCOUNT;
               RETURN v;
             END;",
        );
        assert_eq!(cursors, vec!["c"]);
        assert!(!sql);
    }

    #[test]
    fn attributes_inside_insert_select_count() {
        let (cursors, sql) = prescan_function(
            "FUNCTION f RETURN NUMBER IS BEGIN
               UPDATE t SET a = 1;
               INSERT INTO log SELECT SYSDATE, SQL%ROWCOUNT FROM dual;
               RETURN 1;
             END;",
        );
        assert!(cursors.is_empty());
        assert!(sql);
    }

    #[test]
    fn attributes_inside_subqueries_and_cursor_declarations_count() {
        let (cursors, _) = prescan_function(
            "FUNCTION f RETURN NUMBER IS
               CURSOR c1 IS SELECT 1 FROM dual;
               CURSOR c2 IS SELECT a FROM t WHERE b = c1%ROWCOUNT;
               v NUMBER;
             BEGIN
               v := (SELECT MAX(a) FROM t WHERE b = c1%ROWCOUNT);
               RETURN v;
             END;",
        );
        assert_eq!(cursors, vec!["c1"]);
    }

    #[test]
    fn untouched_cursor_needs_no_tracking() {
        let (cursors, sql) = prescan_function(
            "FUNCTION f RETURN NUMBER IS
               CURSOR c IS SELECT 1 FROM dual;
               v NUMBER;
             BEGIN
               OPEN c;
               FETCH c INTO v;
               CLOSE c;
               RETURN v;
             END;",
        );
        assert!(cursors.is_empty());
        assert!(!sql);
    }
}
