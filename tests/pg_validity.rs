//! Emitted SQL must parse as PostgreSQL.
//!
//! pg_query wraps the real PostgreSQL parser, so a parse failure here means
//! the transpiler produced text the target server would reject — a defect,
//! not a formatting nit. Function bodies are `$$`-quoted strings to the
//! outer parser; the structural statements (SELECTs, helper DDL wrappers)
//! are what this suite pins down.

use plsql2pg::catalog::CatalogBuilder;
use plsql2pg::{Catalog, Config, Transpiler};

fn hr_catalog() -> Catalog {
    CatalogBuilder::new()
        .table("hr", "emp", |t| {
            t.column("empno", "NUMBER", false)
                .column("ename", "VARCHAR2", true)
                .column("sal", "NUMBER", true)
                .column("d", "NUMBER", true)
                .column("mgr", "NUMBER", true)
                .column("hiredate", "DATE", true);
        })
        .table("hr", "dept", |t| {
            t.column("d", "NUMBER", false).column("loc", "VARCHAR2", true);
        })
        .package("hr", "pkg", |p| {
            p.variable("g_counter", "NUMBER");
        })
        .build()
}

fn assert_parses(sql: &str) {
    if let Err(e) = pg_query::parse(sql) {
        panic!("emitted SQL does not parse as PostgreSQL: {e}\n--- sql ---\n{sql}");
    }
}

fn view_sql(src: &str) -> String {
    Transpiler::new(hr_catalog(), Config::default())
        .translate_view(src, "hr")
        .expect("view should translate")
        .sql
}

#[test]
fn plain_qualified_select_parses() {
    assert_parses(&view_sql("SELECT ename FROM emp WHERE sal > 100"));
}

#[test]
fn rownum_limit_parses() {
    assert_parses(&view_sql("SELECT * FROM emp WHERE ROWNUM <= 5"));
}

#[test]
fn rewritten_outer_join_parses() {
    assert_parses(&view_sql(
        "SELECT e.ename, d.loc FROM emp e, dept d WHERE e.d = d.d(+)",
    ));
}

#[test]
fn recursive_hierarchy_parses() {
    assert_parses(&view_sql(
        "SELECT empno, LEVEL FROM emp START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
    ));
}

#[test]
fn oracle_function_mappings_parse() {
    assert_parses(&view_sql(
        "SELECT NVL(ename, 'x'), DECODE(d, 10, 'A', 'B'), SUBSTR(ename, 1, 3), \
         INSTR(ename, 'a'), TO_CHAR(hiredate, 'YYYY-MM-DD'), ename || '!' \
         FROM emp",
    ));
}

#[test]
fn date_arithmetic_parses() {
    assert_parses(&view_sql(
        "SELECT hiredate + 7, ADD_MONTHS(hiredate, 3), LAST_DAY(hiredate), \
         TRUNC(hiredate, 'MM') FROM emp",
    ));
}

#[test]
fn set_operations_and_ctes_parse() {
    assert_parses(&view_sql(
        "WITH top_emps AS (SELECT empno FROM emp WHERE ROWNUM <= 10) \
         SELECT empno FROM top_emps MINUS SELECT d FROM dept",
    ));
}

#[test]
fn function_ddl_wrapper_parses() {
    let out = Transpiler::new(hr_catalog(), Config::default())
        .translate_function(
            "FUNCTION bump(p_id NUMBER) RETURN NUMBER IS \
               v_sal NUMBER := 0; \
             BEGIN \
               SELECT sal INTO v_sal FROM emp WHERE empno = p_id; \
               RETURN v_sal * 1.1; \
             END;",
            "hr",
        )
        .unwrap();
    assert_parses(&out.sql);
}

#[test]
fn package_helper_ddl_parses() {
    let out = Transpiler::new(hr_catalog(), Config::default())
        .translate_package_body(
            "PACKAGE BODY pkg IS \
               g_hits NUMBER := 0; \
               FUNCTION inc RETURN NUMBER IS BEGIN \
                 g_hits := g_hits + 1; \
                 RETURN g_hits; \
               END; \
             END pkg;",
            "hr",
        )
        .unwrap();
    // The output is a sequence of CREATE FUNCTION statements.
    assert_parses(&out.sql);
}

#[test]
fn trigger_function_ddl_parses() {
    let out = Transpiler::new(hr_catalog(), Config::default())
        .translate_trigger(
            "BEGIN :NEW.sal := COALESCE(:OLD.sal, 0) + 100; END;",
            "hr",
            "emp_biu",
            plsql2pg::TriggerKind {
                row_level: true,
                event: plsql2pg::TriggerEvent::Update,
            },
        )
        .unwrap();
    assert_parses(&out.sql);
}
