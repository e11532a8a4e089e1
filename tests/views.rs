//! End-to-end view translations through the public pipeline.

use plsql2pg::catalog::CatalogBuilder;
use plsql2pg::{Catalog, Config, Transpiler};

fn hr_catalog() -> Catalog {
    CatalogBuilder::new()
        .table("hr", "emp", |t| {
            t.column("empno", "NUMBER", false)
                .column("n", "VARCHAR2", true)
                .column("ename", "VARCHAR2", true)
                .column("sal", "NUMBER", true)
                .column("d", "NUMBER", true)
                .column("mgr", "NUMBER", true)
                .column("hiredate", "DATE", true);
        })
        .table("hr", "dept", |t| {
            t.column("d", "NUMBER", false)
                .column("dname", "VARCHAR2", true)
                .column("loc", "VARCHAR2", true);
        })
        .synonym("public", "employees", "hr", "emp")
        .build()
}

fn translate(src: &str) -> String {
    let mut transpiler = Transpiler::new(hr_catalog(), Config::default());
    transpiler
        .translate_view(src, "hr")
        .expect("view should translate")
        .sql
}

#[test]
fn outer_join_seed_scenario() {
    let sql = translate("SELECT e.n, d.loc FROM emp e, dept d WHERE e.d = d.d(+)");
    assert!(sql.contains("FROM hr.emp e LEFT JOIN hr.dept d ON e.d = d.d"));
    assert!(!sql.contains("(+)"));
}

#[test]
fn rownum_seed_scenario() {
    let sql = translate("SELECT * FROM t WHERE ROWNUM <= 5");
    assert_eq!(sql, "SELECT * FROM hr.t LIMIT 5");
}

#[test]
fn connect_by_seed_scenario() {
    let sql = translate(
        "SELECT empno, LEVEL FROM emp START WITH mgr IS NULL CONNECT BY PRIOR empno = mgr",
    );
    assert!(sql.starts_with("WITH RECURSIVE emp_hierarchy AS ("));
    assert!(sql.contains("SELECT empno, 1 AS level FROM hr.emp WHERE mgr IS NULL"));
    assert!(sql.contains(
        "UNION ALL SELECT t.empno, h.level + 1 FROM hr.emp t JOIN emp_hierarchy h ON t.mgr = h.empno"
    ));
    assert!(sql.ends_with("SELECT empno, level FROM emp_hierarchy"));
}

#[test]
fn already_compatible_view_is_near_identity() {
    // Modulo schema qualification, a PostgreSQL-compatible SELECT passes
    // through unchanged.
    let sql = translate("SELECT e.ename, d.dname FROM emp e JOIN dept d ON e.d = d.d");
    assert_eq!(
        sql,
        "SELECT e.ename, d.dname FROM hr.emp e JOIN hr.dept d ON e.d = d.d"
    );
}

#[test]
fn translation_is_deterministic() {
    let src = "SELECT e.n, d.loc FROM emp e, dept d WHERE e.d = d.d(+) AND ROWNUM <= 10";
    assert_eq!(translate(src), translate(src));
}

#[test]
fn synonyms_resolve_before_schema_qualification() {
    let sql = translate("SELECT ename FROM employees");
    assert_eq!(sql, "SELECT ename FROM hr.emp");
}

#[test]
fn dual_and_oracle_functions_in_views() {
    let sql = translate("SELECT NVL(SYSDATE, TO_DATE('2024-01-01', 'YYYY-MM-DD')) FROM dual");
    assert_eq!(
        sql,
        "SELECT COALESCE(CURRENT_TIMESTAMP, TO_TIMESTAMP('2024-01-01', 'YYYY-MM-DD'))"
    );
}

#[test]
fn minus_and_order_by_compose() {
    let sql = translate(
        "SELECT empno FROM emp MINUS SELECT d FROM dept ORDER BY 1",
    );
    assert_eq!(
        sql,
        "SELECT empno FROM hr.emp EXCEPT SELECT d FROM hr.dept ORDER BY 1"
    );
}

#[test]
fn decode_and_concat_in_a_view() {
    let sql = translate("SELECT DECODE(d, 10, 'ACC', 'OTHER') || '!' FROM emp");
    assert_eq!(
        sql,
        "SELECT CONCAT(CASE d WHEN 10 THEN 'ACC' ELSE 'OTHER' END, '!') FROM hr.emp"
    );
}

#[test]
fn correlated_subquery_sees_outer_alias() {
    let sql = translate(
        "SELECT e.ename FROM emp e WHERE e.sal > (SELECT AVG(sal) FROM emp x WHERE x.d = e.d)",
    );
    assert_eq!(
        sql,
        "SELECT e.ename FROM hr.emp e WHERE e.sal > \
         (SELECT AVG(sal) FROM hr.emp x WHERE x.d = e.d)"
    );
}

#[test]
fn window_functions_pass_through() {
    let sql = translate("SELECT ename, RANK() OVER (PARTITION BY d ORDER BY sal DESC) FROM emp");
    assert_eq!(
        sql,
        "SELECT ename, rank() OVER (PARTITION BY d ORDER BY sal DESC) FROM hr.emp"
    );
}
