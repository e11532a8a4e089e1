//! Oracle `(+)` to ANSI joins
//!
//! Two-phase rewrite over a query block: enumerate the FROM tables, then
//! classify each WHERE conjunct by its outer-join markers. Marked
//! predicates move into LEFT JOIN ... ON clauses (the marker side is the
//! outer table); everything else stays in WHERE. Tables that stay
//! comma-joined are emitted as CROSS JOIN so the ON clauses may reference
//! them. Predicates that disagree on the outer side of a table pair fail
//! with `AmbiguousOuterJoin`.

use super::Translator;
use super::query::{join_conjuncts, split_conjuncts};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;
use std::collections::{HashMap, HashSet};

struct TableSlot {
    binding: String,
    sql: String,
    outer: bool,
    on: Vec<String>,
    partners: HashSet<String>,
}

impl Translator<'_> {
    /// Rewrite `FROM a, b WHERE a.x = b.y(+)` into ANSI joins. Returns the
    /// FROM clause text and whatever WHERE conjuncts were not consumed.
    pub(super) fn rewrite_outer_joins(
        &mut self,
        from: &[TableRef],
        where_expr: Expr,
    ) -> Result<(String, Option<Expr>), Diagnostics> {
        let mut slots = Vec::new();
        for table in from {
            let TableRef::Table { name, alias } = table else {
                return Err(Diagnostics::at_start(
                    DiagnosticKind::UnsupportedFeature,
                    "(+) mixed with ANSI join syntax or inline views",
                ));
            };
            let binding = alias.clone().unwrap_or_else(|| name.last());
            let sql = self.table_name_sql(name, alias.as_deref());
            slots.push(TableSlot {
                binding,
                sql,
                outer: false,
                on: Vec::new(),
                partners: HashSet::new(),
            });
        }
        let bindings: HashSet<String> = slots.iter().map(|s| s.binding.clone()).collect();

        // Orientation per table pair, to catch contradicting markers.
        let mut orientation: HashMap<(String, String), String> = HashMap::new();
        let mut remaining = Vec::new();

        for conjunct in split_conjuncts(where_expr) {
            let mut refs = HashSet::new();
            let mut marked = HashSet::new();
            collect_refs(&conjunct, &bindings, false, &mut refs, &mut marked);

            if marked.is_empty() {
                remaining.push(conjunct);
                continue;
            }
            if marked.len() > 1 {
                return Err(Diagnostics::at_start(
                    DiagnosticKind::AmbiguousOuterJoin,
                    "(+) on both sides of a predicate",
                ));
            }
            let outer_binding = marked.into_iter().next().unwrap();
            let partners: HashSet<String> =
                refs.difference(&outer_binding_set(&outer_binding)).cloned().collect();

            for partner in &partners {
                let key = pair_key(&outer_binding, partner);
                match orientation.get(&key) {
                    Some(existing) if *existing != outer_binding => {
                        return Err(Diagnostics::at_start(
                            DiagnosticKind::AmbiguousOuterJoin,
                            format!(
                                "conflicting outer sides between '{partner}' and '{outer_binding}'"
                            ),
                        ));
                    }
                    _ => {
                        orientation.insert(key, outer_binding.clone());
                    }
                }
            }

            // Emitting the conjunct drops the markers.
            let sql = self.expr(&conjunct)?;
            let slot = slots
                .iter_mut()
                .find(|s| s.binding == outer_binding)
                .expect("marked binding must be a FROM table");
            slot.outer = true;
            slot.on.push(sql);
            slot.partners
                .extend(partners.into_iter().filter(|p| *p != outer_binding));
        }

        // Assemble FROM: plain tables first (CROSS JOIN keeps them visible
        // to later ON clauses), then LEFT JOIN each outer table once its
        // partners are in place.
        let anchors: Vec<&TableSlot> = slots.iter().filter(|s| !s.outer).collect();
        if anchors.is_empty() {
            return Err(Diagnostics::at_start(
                DiagnosticKind::AmbiguousOuterJoin,
                "every table in the query block carries (+)",
            ));
        }
        let mut emitted: HashSet<String> = anchors.iter().map(|s| s.binding.clone()).collect();
        let mut from_sql = anchors
            .iter()
            .map(|s| s.sql.clone())
            .collect::<Vec<_>>()
            .join(" CROSS JOIN ");

        let mut pending: Vec<&TableSlot> = slots.iter().filter(|s| s.outer).collect();
        while !pending.is_empty() {
            let mut progressed = false;
            pending.retain(|slot| {
                if slot.partners.is_empty() {
                    // No join predicate ties this outer table to the rest.
                    return true;
                }
                if slot.partners.iter().all(|p| emitted.contains(p)) {
                    from_sql.push_str(&format!(
                        " LEFT JOIN {} ON {}",
                        slot.sql,
                        slot.on.join(" AND ")
                    ));
                    emitted.insert(slot.binding.clone());
                    progressed = true;
                    return false;
                }
                true
            });
            if !progressed {
                return Err(Diagnostics::at_start(
                    DiagnosticKind::AmbiguousOuterJoin,
                    "outer-joined tables cannot be ordered into a join chain",
                ));
            }
        }

        Ok((from_sql, join_conjuncts(remaining)))
    }
}

fn outer_binding_set(binding: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    set.insert(binding.to_string());
    set
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Collect table bindings referenced by qualified identifiers, tracking
/// which ones sit under a `(+)` marker.
fn collect_refs(
    e: &Expr,
    bindings: &HashSet<String>,
    under_marker: bool,
    refs: &mut HashSet<String>,
    marked: &mut HashSet<String>,
) {
    match e {
        Expr::Ident(chain) => {
            if chain.len() >= 2 {
                let head = chain.first();
                if bindings.contains(&head) {
                    refs.insert(head.clone());
                    if under_marker {
                        marked.insert(head);
                    }
                }
            }
        }
        Expr::OuterJoined(inner) => collect_refs(inner, bindings, true, refs, marked),
        Expr::Unary { expr, .. } | Expr::Paren(expr) => {
            collect_refs(expr, bindings, under_marker, refs, marked)
        }
        Expr::Binary { left, right, .. } => {
            collect_refs(left, bindings, under_marker, refs, marked);
            collect_refs(right, bindings, under_marker, refs, marked);
        }
        Expr::IsNull { expr, .. } => collect_refs(expr, bindings, under_marker, refs, marked),
        Expr::InList { expr, items, .. } => {
            collect_refs(expr, bindings, under_marker, refs, marked);
            for item in items {
                collect_refs(item, bindings, under_marker, refs, marked);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_refs(expr, bindings, under_marker, refs, marked);
            collect_refs(low, bindings, under_marker, refs, marked);
            collect_refs(high, bindings, under_marker, refs, marked);
        }
        Expr::Like { expr, pattern, .. } => {
            collect_refs(expr, bindings, under_marker, refs, marked);
            collect_refs(pattern, bindings, under_marker, refs, marked);
        }
        Expr::Call(call) => {
            for arg in &call.args {
                collect_refs(&arg.value, bindings, under_marker, refs, marked);
            }
        }
        Expr::Case(case) => {
            if let Some(operand) = &case.operand {
                collect_refs(operand, bindings, under_marker, refs, marked);
            }
            for (cond, value) in &case.arms {
                collect_refs(cond, bindings, under_marker, refs, marked);
                collect_refs(value, bindings, under_marker, refs, marked);
            }
            if let Some(else_expr) = &case.else_expr {
                collect_refs(else_expr, bindings, under_marker, refs, marked);
            }
        }
        _ => {}
    }
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
                t.column("n", "VARCHAR2", true).column("d", "NUMBER", true);
            })
            .table("hr", "dept", |t| {
                t.column("d", "NUMBER", false)
                    .column("loc", "VARCHAR2", true)
                    .column("active", "NUMBER", true);
            })
            .table("hr", "loc", |t| {
                t.column("id", "NUMBER", false).column("city", "VARCHAR2", true);
            })
            .build()
    }

    fn translate(src: &str) -> Result<String, Diagnostics> {
        let cat = catalog();
        let config = Config::default();
        let mut tr = Translator::new("hr", &cat, &config, CancelToken::new());
        let ParsedUnit::View(sel) = parse(src, TranslationKind::ViewSelect).unwrap() else {
            panic!("expected view");
        };
        tr.view_select(&sel)
    }

    #[test]
    fn simple_left_join_rewrite() {
        let sql = translate("SELECT e.n, d.loc FROM emp e, dept d WHERE e.d = d.d(+)").unwrap();
        assert_eq!(
            sql,
            "SELECT e.n, d.loc FROM hr.emp e LEFT JOIN hr.dept d ON e.d = d.d"
        );
    }

    #[test]
    fn marker_side_table_is_the_outer_one_regardless_of_order() {
        let sql = translate("SELECT e.n FROM emp e, dept d WHERE d.d(+) = e.d").unwrap();
        assert_eq!(sql, "SELECT e.n FROM hr.emp e LEFT JOIN hr.dept d ON d.d = e.d");
    }

    #[test]
    fn single_table_filter_with_marker_lands_in_on() {
        let sql = translate(
            "SELECT e.n FROM emp e, dept d WHERE e.d = d.d(+) AND d.active(+) = 1",
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT e.n FROM hr.emp e LEFT JOIN hr.dept d ON e.d = d.d AND d.active = 1"
        );
    }

    #[test]
    fn plain_predicates_stay_in_where() {
        let sql = translate(
            "SELECT e.n FROM emp e, dept d WHERE e.d = d.d(+) AND e.n LIKE 'A%'",
        )
        .unwrap();
        assert!(sql.contains("LEFT JOIN hr.dept d ON e.d = d.d"));
        assert!(sql.ends_with("WHERE e.n LIKE 'A%'"));
    }

    #[test]
    fn chained_outer_joins_order_themselves() {
        let sql = translate(
            "SELECT e.n FROM emp e, dept d, loc l \
             WHERE e.d = d.d(+) AND d.d = l.id(+)",
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT e.n FROM hr.emp e LEFT JOIN hr.dept d ON e.d = d.d \
             LEFT JOIN hr.loc l ON d.d = l.id"
        );
    }

    #[test]
    fn conflicting_outer_sides_are_ambiguous() {
        let err = translate(
            "SELECT e.n FROM emp e, dept d WHERE e.d = d.d(+) AND d.loc = e.n(+)",
        )
        .unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::AmbiguousOuterJoin);
    }

    #[test]
    fn markers_on_both_sides_are_ambiguous() {
        let err = translate("SELECT e.n FROM emp e, dept d WHERE e.d(+) = d.d(+)").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::AmbiguousOuterJoin);
    }

    #[test]
    fn no_remaining_marker_in_the_output() {
        let sql = translate("SELECT e.n, d.loc FROM emp e, dept d WHERE e.d = d.d(+)").unwrap();
        assert!(!sql.contains("(+)"));
    }
}
