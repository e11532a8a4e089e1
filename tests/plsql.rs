//! End-to-end PL/SQL translations: functions, procedures, package members,
//! triggers, and the session-state and jsonb encodings behind them.

use plsql2pg::catalog::CatalogBuilder;
use plsql2pg::{
    Catalog, Config, DiagnosticKind, TriggerEvent, TriggerKind, Transpiler,
};

fn hr_catalog() -> Catalog {
    CatalogBuilder::new()
        .table("hr", "emp", |t| {
            t.column("empno", "NUMBER", false)
                .column("ename", "VARCHAR2", true)
                .column("sal", "NUMBER", true)
                .column("s", "NUMBER", true)
                .column("d", "NUMBER", true);
        })
        .package("hr", "pkg", |p| {
            p.variable("g_counter", "NUMBER")
                .function("inc", &[], Some("NUMBER"));
        })
        .build()
}

fn transpiler() -> Transpiler {
    Transpiler::new(hr_catalog(), Config::default())
}

#[test]
fn package_variable_seed_scenario() {
    let out = transpiler()
        .translate_package_member(
            "FUNCTION inc RETURN NUMBER IS BEGIN \
               g_counter := g_counter + 1; \
               RETURN g_counter; \
             END;",
            "hr",
            "pkg",
        )
        .unwrap();
    assert!(out.sql.contains("PERFORM hr.pkg__initialize();"));
    assert!(
        out.sql
            .contains("PERFORM hr.pkg__set_g_counter(hr.pkg__get_g_counter() + 1);")
    );
    assert!(out.sql.contains("RETURN hr.pkg__get_g_counter();"));
}

#[test]
fn inline_record_seed_scenario() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS \
               TYPE r IS RECORD (a NUMBER, b VARCHAR2(10)); \
               v r; \
             BEGIN \
               v.a := 3; \
               RETURN v.a; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("v jsonb := '{}'::jsonb;"));
    assert!(out.sql.contains("v := jsonb_set(v, '{a}', to_jsonb(3));"));
    assert!(out.sql.contains("RETURN (v->>'a')::numeric;"));
}

#[test]
fn implicit_sql_rowcount_seed_scenario() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS BEGIN \
               UPDATE emp SET s = s * 1.1 WHERE d = 10; \
               RETURN SQL%ROWCOUNT; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("sql__rowcount integer"));
    assert!(out.sql.contains("UPDATE hr.emp SET s = s * 1.1 WHERE d = 10;"));
    assert!(out.sql.contains("GET DIAGNOSTICS sql__rowcount = ROW_COUNT;"));
    assert!(out.sql.contains("RETURN sql__rowcount;"));
}

#[test]
fn explicit_cursor_tracking_in_program_order() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS \
               CURSOR c IS SELECT empno FROM emp; \
               v NUMBER; \
             BEGIN \
               OPEN c; \
               LOOP \
                 FETCH c INTO v; \
                 EXIT WHEN c%NOTFOUND; \
               END LOOP; \
               CLOSE c; \
               RETURN c%ROWCOUNT; \
             END;",
            "hr",
        )
        .unwrap();
    let sql = &out.sql;
    assert!(sql.contains("c CURSOR FOR SELECT empno FROM hr.emp;"));
    assert!(sql.contains("c__found boolean;"));
    assert!(sql.contains("c__rowcount integer := 0;"));
    assert!(sql.contains("c__isopen boolean := false;"));

    let open_at = sql.find("OPEN c;").unwrap();
    let isopen_true = sql.find("c__isopen := true;").unwrap();
    let fetch_at = sql.find("FETCH c INTO v;").unwrap();
    let found_at = sql.find("c__found := FOUND;").unwrap();
    let exit_at = sql.find("EXIT WHEN NOT c__found;").unwrap();
    let close_at = sql.find("CLOSE c;").unwrap();
    let isopen_false = sql.find("c__isopen := false;").unwrap();
    assert!(open_at < isopen_true);
    assert!(isopen_true < fetch_at);
    assert!(fetch_at < found_at);
    assert!(found_at < exit_at);
    assert!(exit_at < close_at);
    assert!(close_at < isopen_false);
}

#[test]
fn returning_into_is_a_hard_error_by_default() {
    let err = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS v NUMBER; BEGIN \
               UPDATE emp SET s = 1 WHERE d = 2 RETURNING s INTO v; \
               RETURN v; \
             END;",
            "hr",
        )
        .unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedReturning);
}

#[test]
fn returning_into_recovers_to_a_stub_when_opted_in() {
    let config: Config = toml::from_str(
        r#"
        [transpile]
        recover = ["unsupported-returning"]
        "#,
    )
    .unwrap();
    let out = Transpiler::new(hr_catalog(), config)
        .translate_function(
            "FUNCTION f RETURN NUMBER IS v NUMBER; BEGIN \
               UPDATE emp SET s = 1 WHERE d = 2 RETURNING s INTO v; \
               RETURN v; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("RAISE EXCEPTION 'plsql2pg:"));
    assert!(!out.warnings.is_empty());
}

#[test]
fn multi_row_values_keeps_every_list() {
    let out = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN \
               INSERT INTO emp (empno, sal) VALUES (1, 10), (2, 20), (3, 30); \
             END;",
            "hr",
        )
        .unwrap();
    assert!(
        out.sql
            .contains("INSERT INTO hr.emp (empno, sal) VALUES (1, 10), (2, 20), (3, 30);")
    );
}

#[test]
fn named_exceptions_and_pragma_codes_map() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS \
               e_dead EXCEPTION; \
               PRAGMA EXCEPTION_INIT(e_dead, -20404); \
               v NUMBER; \
             BEGIN \
               SELECT sal INTO v FROM emp WHERE empno = 1; \
               RETURN v; \
             EXCEPTION \
               WHEN NO_DATA_FOUND THEN RETURN 0; \
               WHEN DUP_VAL_ON_INDEX THEN RETURN -1; \
               WHEN e_dead THEN RETURN -2; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("WHEN NO_DATA_FOUND THEN"));
    assert!(out.sql.contains("WHEN UNIQUE_VIOLATION THEN"));
    assert!(out.sql.contains("WHEN SQLSTATE 'P0404' THEN"));
}

#[test]
fn out_of_range_pragma_codes_get_distinct_states() {
    // Built-in ORA codes (-1 unique constraint, -942 table not found) sit
    // outside the -20000 window; each must get its own SQLSTATE, and RAISE
    // must agree with the handler.
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS \
               e_dup EXCEPTION; \
               PRAGMA EXCEPTION_INIT(e_dup, -1); \
               e_missing EXCEPTION; \
               PRAGMA EXCEPTION_INIT(e_missing, -942); \
             BEGIN \
               RAISE e_dup; \
             EXCEPTION \
               WHEN e_dup THEN RETURN 1; \
               WHEN e_missing THEN RETURN 2; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("RAISE SQLSTATE 'P9001';"));
    assert!(out.sql.contains("WHEN SQLSTATE 'P9001' THEN"));
    assert!(out.sql.contains("WHEN SQLSTATE 'P9002' THEN"));
    // Neither collides with the -20000 window used elsewhere.
    assert!(!out.sql.contains("'P0001'"));
}

#[test]
fn select_into_is_strict() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS v NUMBER; BEGIN \
               SELECT sal INTO v FROM emp WHERE empno = 1; \
               RETURN v; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(
        out.sql
            .contains("SELECT sal INTO STRICT v FROM hr.emp WHERE empno = 1;")
    );
}

#[test]
fn raise_application_error_maps_code_and_message() {
    let out = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN \
               RAISE_APPLICATION_ERROR(-20001, 'broken'); \
             END;",
            "hr",
        )
        .unwrap();
    assert!(
        out.sql
            .contains("RAISE EXCEPTION USING ERRCODE = 'P0001', MESSAGE = 'broken';")
    );
}

#[test]
fn commit_is_dropped_with_a_warning() {
    let out = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN \
               UPDATE emp SET s = 0; \
               COMMIT; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.warnings.iter().any(|w| w.message.contains("COMMIT")));
    assert!(!out.sql.contains("COMMIT;"));
}

#[test]
fn row_trigger_gets_new_old_and_implicit_return() {
    let out = transpiler()
        .translate_trigger(
            "BEGIN :NEW.sal := NVL(:OLD.sal, 0) + 100; END;",
            "hr",
            "emp_biu",
            TriggerKind {
                row_level: true,
                event: TriggerEvent::Update,
            },
        )
        .unwrap();
    assert!(out.sql.contains("hr.emp_biu_func() RETURNS trigger"));
    assert!(out.sql.contains("NEW.sal := COALESCE(OLD.sal, 0) + 100;"));
    assert!(out.sql.contains("RETURN NEW;"));
}

#[test]
fn delete_trigger_returns_old() {
    let out = transpiler()
        .translate_trigger(
            "BEGIN NULL; END;",
            "hr",
            "emp_bd",
            TriggerKind {
                row_level: true,
                event: TriggerEvent::Delete,
            },
        )
        .unwrap();
    assert!(out.sql.contains("RETURN OLD;"));
}

#[test]
fn statement_trigger_with_binds_is_unsupported() {
    let err = transpiler()
        .translate_trigger(
            "BEGIN :NEW.sal := 1; END;",
            "hr",
            "emp_stmt",
            TriggerKind {
                row_level: false,
                event: TriggerEvent::Update,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedFeature);
}

#[test]
fn rowtype_resolves_through_the_catalog() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN VARCHAR2 IS \
               r emp%ROWTYPE; \
             BEGIN \
               r.ename := 'X'; \
               RETURN r.ename; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("r jsonb := '{}'::jsonb;"));
    assert!(
        out.sql
            .contains("r := jsonb_set(r, '{ename}', to_jsonb('X'::text));")
    );
    assert!(out.sql.contains("RETURN (r->>'ename')::text;"));
}

#[test]
fn rowtype_on_missing_table_is_metadata_missing() {
    let err = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS r ghost%ROWTYPE; BEGIN RETURN 1; END;",
            "hr",
        )
        .unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::MetadataMissing);
}

#[test]
fn collection_reads_and_writes_shift_to_zero_based() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN NUMBER IS \
               TYPE t_tab IS TABLE OF NUMBER; \
               a t_tab := t_tab(10, 20, 30); \
               i NUMBER := 2; \
             BEGIN \
               a(1) := 99; \
               a(i) := 100; \
               RETURN a(1); \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("a jsonb := '[10,20,30]'::jsonb;"));
    assert!(out.sql.contains("a := jsonb_set(a, '{0}', to_jsonb(99));"));
    assert!(
        out.sql
            .contains("a := jsonb_set(a, ('{' || ((i) - 1) || '}')::text[], to_jsonb(100));")
    );
    assert!(out.sql.contains("RETURN (a->0);"));
}

#[test]
fn associative_array_uses_string_keys() {
    let out = transpiler()
        .translate_function(
            "FUNCTION f RETURN VARCHAR2 IS \
               TYPE t_map IS TABLE OF VARCHAR2(30) INDEX BY VARCHAR2(10); \
               m t_map; \
             BEGIN \
               m('k') := 'hello'; \
               RETURN m('k'); \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("m jsonb := '{}'::jsonb;"));
    assert!(
        out.sql
            .contains("m := jsonb_set(m, '{k}', to_jsonb('hello'::text));")
    );
    assert!(out.sql.contains("RETURN (m->>'k');"));
}

#[test]
fn execute_immediate_is_unsupported() {
    let err = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN EXECUTE IMMEDIATE 'DROP TABLE x'; END;",
            "hr",
        )
        .unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedFeature);
}

#[test]
fn package_body_translation_emits_helpers_and_members() {
    let out = transpiler()
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
    assert!(out.sql.contains("FUNCTION hr.pkg__initialize()"));
    assert!(out.sql.contains("FUNCTION hr.pkg__get_g_hits()"));
    assert!(out.sql.contains("FUNCTION hr.pkg__set_g_hits(p numeric)"));
    assert!(out.sql.contains("CREATE OR REPLACE FUNCTION hr.pkg__inc()"));
    assert!(out.sql.contains("PERFORM hr.pkg__set_g_hits(hr.pkg__get_g_hits() + 1);"));
}

#[test]
fn dbms_output_becomes_raise_notice() {
    let out = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN DBMS_OUTPUT.PUT_LINE('hi'); END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("RAISE NOTICE '%', 'hi';"));
}

#[test]
fn for_loops_translate_with_reverse_bounds_swapped() {
    let out = transpiler()
        .translate_procedure(
            "PROCEDURE p IS BEGIN \
               FOR i IN 1..10 LOOP NULL; END LOOP; \
               FOR i IN REVERSE 1..10 LOOP NULL; END LOOP; \
             END;",
            "hr",
        )
        .unwrap();
    assert!(out.sql.contains("FOR i IN 1..10 LOOP"));
    assert!(out.sql.contains("FOR i IN REVERSE 10..1 LOOP"));
}
