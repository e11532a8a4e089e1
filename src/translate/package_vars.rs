//! Package variables as session state
//!
//! Oracle package variables live for a session; the PostgreSQL rendering
//! keeps that lifetime with `set_config`/`current_setting` custom GUCs.
//! Each package gets an idempotent `pkg__initialize()` plus a typed getter
//! and setter per non-constant variable. Constants never materialize: they
//! are inlined at every reference.

use super::Translator;
use crate::diagnostics::Diagnostics;
use crate::package_ctx::PackageContext;
use crate::typemap;

pub fn getter_call(schema: &str, pkg: &str, var: &str) -> String {
    format!("{schema}.{pkg}__get_{var}()")
}

pub fn setter_call(schema: &str, pkg: &str, var: &str, rhs: &str) -> String {
    format!("{schema}.{pkg}__set_{var}({rhs})")
}

pub fn initializer_call(schema: &str, pkg: &str) -> String {
    format!("{schema}.{pkg}__initialize()")
}

pub fn session_key(schema: &str, pkg: &str, var: &str) -> String {
    format!("{schema}.{pkg}.{var}")
}

/// The complete helper DDL for one package: initializer first, then a
/// getter/setter pair per non-constant variable, in declaration order.
pub fn generate_helpers(
    context: &PackageContext,
    translator: &mut Translator<'_>,
) -> Result<Vec<String>, Diagnostics> {
    let schema = &context.schema;
    let pkg = &context.name;
    let mut ddl = Vec::new();

    let mut init_body = String::new();
    init_body.push_str(&format!(
        "  IF current_setting('{schema}.{pkg}.__initialized', true) = '1' THEN\n    RETURN;\n  END IF;\n"
    ));
    for var in &context.variables {
        if var.constant {
            continue;
        }
        if let Some(default) = &var.default {
            let value = translator.expr(default)?;
            init_body.push_str(&format!(
                "  PERFORM set_config('{}', ({value})::text, false);\n",
                session_key(schema, pkg, &var.name)
            ));
        }
    }
    init_body.push_str(&format!(
        "  PERFORM set_config('{schema}.{pkg}.__initialized', '1', false);\n"
    ));
    ddl.push(format!(
        "CREATE OR REPLACE FUNCTION {schema}.{pkg}__initialize() RETURNS void LANGUAGE plpgsql AS $$\nBEGIN\n{init_body}END;\n$$;\n"
    ));

    for var in &context.variables {
        if var.constant {
            continue;
        }
        let key = session_key(schema, pkg, &var.name);
        let fallback = typemap::pg_default_literal(&var.pg_type);
        ddl.push(format!(
            "CREATE OR REPLACE FUNCTION {schema}.{pkg}__get_{name}() RETURNS {ty} LANGUAGE plpgsql AS $$\n\
             BEGIN\n  RETURN current_setting('{key}', true)::{ty};\nEXCEPTION WHEN OTHERS THEN\n  RETURN {fallback};\nEND;\n$$;\n",
            name = var.name,
            ty = var.pg_type,
        ));
        ddl.push(format!(
            "CREATE OR REPLACE FUNCTION {schema}.{pkg}__set_{name}(p {ty}) RETURNS void LANGUAGE plpgsql AS $$\n\
             BEGIN\n  PERFORM set_config('{key}', p::text, false);\nEND;\n$$;\n",
            name = var.name,
            ty = var.pg_type,
        ));
    }

    Ok(ddl)
}
