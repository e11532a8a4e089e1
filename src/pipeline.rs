//! Transpile pipeline — the one-stop entry point per translation kind.
//!
//! The [`Transpiler`] owns the immutable catalog, the configuration, the
//! per-job package-context cache, and the optional environment used to
//! fetch package sources and apply helper DDL. Each `translate_*` call is a
//! pure function of (source, kind, schema, catalog): it builds a fresh
//! [`Translator`], so no traversal state survives between calls. Packages
//! sighted during a translation get their session-state helpers ensured
//! right after it succeeds.

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::context::PackageVarInfo;
use crate::diagnostics::{Diagnostics, Translated, parse_failure};
use crate::package_ctx::{PackageCache, PackageContext, PackageEnvironment};
use crate::parser::ast::ParsedUnit;
use crate::parser::{self, TranslationKind};
use crate::translate::{Translator, TriggerKind};
use crate::typemap;
use std::collections::{HashMap, HashSet};

pub struct Transpiler {
    catalog: Catalog,
    config: Config,
    packages: PackageCache,
    env: Option<Box<dyn PackageEnvironment>>,
    cancel: CancelToken,
}

impl Transpiler {
    pub fn new(catalog: Catalog, config: Config) -> Self {
        Self {
            catalog,
            config,
            packages: PackageCache::new(),
            env: None,
            cancel: CancelToken::new(),
        }
    }

    /// Attach the environment used for package-source fetches and helper
    /// DDL. Without one, package contexts degrade to the catalog signature
    /// and no DDL is applied.
    pub fn with_environment(mut self, env: Box<dyn PackageEnvironment>) -> Self {
        self.env = Some(env);
        self
    }

    /// Token shared by every translation this pipeline runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Translate the defining SELECT of a view.
    pub fn translate_view(&mut self, source: &str, schema: &str) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::ViewSelect)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::View(select) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let sql = translator.view_select(&select)?;
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate a standalone function into `CREATE OR REPLACE FUNCTION`.
    pub fn translate_function(
        &mut self,
        source: &str,
        schema: &str,
    ) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::Function)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::Function(def) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let sql = translator.function_ddl(&def, None)?;
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate a standalone procedure (emitted as a void function).
    pub fn translate_procedure(
        &mut self,
        source: &str,
        schema: &str,
    ) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::Procedure)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::Procedure(def) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let sql = translator.function_ddl(&def, None)?;
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate one member of a package. The member is flattened to
    /// `schema.package__name`, sees the package's variables, and starts
    /// with the initializer call.
    pub fn translate_package_member(
        &mut self,
        source: &str,
        schema: &str,
        package: &str,
    ) -> Result<Translated, Diagnostics> {
        self.ensure_package_context(schema, package)?;
        let vars = {
            let context = self
                .packages
                .get(schema, package)
                .expect("context ensured above");
            self.package_var_infos(context, schema)?
        };

        let kind = sniff_member_kind(source)?;
        let unit = parser::parse(source, kind).map_err(|e| parse_failure(&e))?;
        let def = match unit {
            ParsedUnit::Function(def) | ParsedUnit::Procedure(def) => def,
            _ => unreachable!("facade returns the requested unit kind"),
        };

        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone())
                .for_package(package, vars);
        let sql = translator.function_ddl(&def, Some(package))?;
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate a trigger body into a `schema.name_func()` trigger
    /// function.
    pub fn translate_trigger(
        &mut self,
        source: &str,
        schema: &str,
        trigger_name: &str,
        kind: TriggerKind,
    ) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::TriggerBody)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::TriggerBody(block) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let sql = translator.trigger_ddl(&block, trigger_name, kind)?;
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate a whole package body: session-state helper DDL first, then
    /// one flattened function per member. The caller already has the source,
    /// so the context is built from it directly rather than fetched through
    /// the environment.
    pub fn translate_package_body(
        &mut self,
        source: &str,
        schema: &str,
    ) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::PackageBody)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::PackageBody(body) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let package = body.name.last();

        // Public variables from the catalog signature, private ones from
        // the parsed body.
        let mut context = PackageContext {
            schema: schema.to_lowercase(),
            name: package.clone(),
            ..PackageContext::default()
        };
        if let Some(sig) = self.catalog.package(schema, &package) {
            let mut names: Vec<&String> = sig.variables.keys().collect();
            names.sort();
            for name in names {
                context.variables.push(crate::package_ctx::PackageVar {
                    name: name.clone(),
                    pg_type: typemap::pg_scalar(&sig.variables[name], None),
                    constant: false,
                    default: None,
                    declared_in_spec: true,
                });
            }
        }
        {
            let mut translator =
                Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
            for var in &body.variables {
                let pg_type = translator
                    .resolved_pg_type(&var.data_type, var.pos)
                    .unwrap_or_else(|_| "text".to_string());
                context.variables.push(crate::package_ctx::PackageVar {
                    name: var.name.clone(),
                    pg_type,
                    constant: var.constant,
                    default: var.default.clone(),
                    declared_in_spec: false,
                });
            }
        }

        let vars = self.package_var_infos(&context, schema)?;

        let mut ddl = {
            let mut translator =
                Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
            crate::translate::package_vars::generate_helpers(&context, &mut translator)?
        };
        if let Some(env) = self.env.as_deref() {
            for statement in &ddl {
                env.apply_ddl(statement).map_err(|e| {
                    Diagnostics::at_start(
                        crate::diagnostics::DiagnosticKind::EnvironmentError,
                        format!("applying helper DDL for {schema}.{package}: {e}"),
                    )
                })?;
            }
        }

        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone())
                .for_package(&package, vars);
        for decl in &body.types {
            if let Ok(def) = translator.inline_def_from_decl(decl) {
                translator.ctx.register_inline_type(def);
            }
        }
        for member in &body.members {
            ddl.push(translator.function_ddl(member, Some(&package))?);
        }
        if body.initializer.is_some() {
            translator.warn(
                "package initialization block dropped; defaults run via the initializer",
                1,
            );
        }

        let sql = ddl.join("\n");
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Translate a type body: one `schema.type__member(self jsonb, ...)`
    /// function per member.
    pub fn translate_type_body(
        &mut self,
        source: &str,
        schema: &str,
    ) -> Result<Translated, Diagnostics> {
        let unit = parser::parse(source, TranslationKind::TypeBody)
            .map_err(|e| parse_failure(&e))?;
        let ParsedUnit::TypeBody(body) = unit else {
            unreachable!("facade returns the requested unit kind");
        };
        let type_name = body.name.last();

        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let mut ddl = Vec::new();
        for member in &body.members {
            ddl.push(translator.type_method_ddl(member, &type_name)?);
        }
        let sql = ddl.join("\n");
        let (warnings, referenced) = drain(translator);
        self.finish(warnings, referenced, sql)
    }

    /// Pre-warm (or lazily build) the context and session-state helpers for
    /// a package.
    pub fn ensure_package_context(
        &mut self,
        schema: &str,
        package: &str,
    ) -> Result<(), Diagnostics> {
        self.packages.ensure(
            schema,
            package,
            &self.catalog,
            &self.config,
            self.env.as_deref(),
            &self.cancel,
        )?;
        Ok(())
    }

    /// Make sure every package the translation touched has its helpers in
    /// place, then package up the result.
    fn finish(
        &mut self,
        warnings: Vec<crate::diagnostics::Warning>,
        referenced: HashSet<(String, String)>,
        sql: String,
    ) -> Result<Translated, Diagnostics> {
        for (schema, package) in referenced {
            self.ensure_package_context(&schema, &package)?;
        }
        Ok(Translated { sql, warnings })
    }

    /// The package-variable map handed to the translator: types, constness,
    /// and pre-rendered literals for constants (inlined at reference
    /// sites).
    fn package_var_infos(
        &self,
        context: &PackageContext,
        schema: &str,
    ) -> Result<HashMap<String, PackageVarInfo>, Diagnostics> {
        let mut translator =
            Translator::new(schema, &self.catalog, &self.config, self.cancel.clone());
        let mut vars = HashMap::new();
        for var in &context.variables {
            let inline_literal = if var.constant {
                Some(match &var.default {
                    Some(default) => translator.expr(default)?,
                    None => typemap::pg_default_literal(&var.pg_type).to_string(),
                })
            } else {
                None
            };
            vars.insert(
                var.name.clone(),
                PackageVarInfo {
                    pg_type: var.pg_type.clone(),
                    constant: var.constant,
                    inline_literal,
                },
            );
        }
        Ok(vars)
    }
}

/// Take what the pipeline still needs out of a finished translator and drop
/// it, releasing its borrows of the catalog and configuration.
fn drain(
    mut translator: Translator<'_>,
) -> (Vec<crate::diagnostics::Warning>, HashSet<(String, String)>) {
    let warnings = translator.take_warnings();
    let referenced = translator.referenced_packages().clone();
    (warnings, referenced)
}

/// A package member source starts with FUNCTION or PROCEDURE (possibly
/// behind CREATE OR REPLACE); pick the matching parse kind.
fn sniff_member_kind(source: &str) -> Result<TranslationKind, Diagnostics> {
    let tokens = crate::lexer::tokenize(source).map_err(|e| parse_failure(&[e]))?;
    for token in &tokens {
        if token.is_kw("function") {
            return Ok(TranslationKind::Function);
        }
        if token.is_kw("procedure") {
            return Ok(TranslationKind::Procedure);
        }
    }
    Err(Diagnostics::at_start(
        crate::diagnostics::DiagnosticKind::ParseError,
        "expected FUNCTION or PROCEDURE",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;

    fn transpiler() -> Transpiler {
        let catalog = CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("empno", "NUMBER", false)
                    .column("sal", "NUMBER", true)
                    .column("deptno", "NUMBER", true);
            })
            .package("hr", "pkg", |p| {
                p.variable("g_counter", "NUMBER")
                    .function("inc", &[], Some("NUMBER"));
            })
            .build();
        Transpiler::new(catalog, Config::default())
    }

    #[test]
    fn view_translation_is_schema_qualified() {
        let mut t = transpiler();
        let out = t.translate_view("SELECT sal FROM emp", "hr").unwrap();
        assert_eq!(out.sql, "SELECT sal FROM hr.emp");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn parse_errors_fold_into_a_diagnostic() {
        let mut t = transpiler();
        let err = t.translate_view("SELECT FROM", "hr").unwrap_err();
        assert_eq!(err.kind, crate::diagnostics::DiagnosticKind::ParseError);
    }

    #[test]
    fn package_member_gets_initializer_and_state_rewrites() {
        let mut t = transpiler();
        let out = t
            .translate_package_member(
                "FUNCTION inc RETURN NUMBER IS BEGIN \
                   g_counter := g_counter + 1; \
                   RETURN g_counter; \
                 END;",
                "hr",
                "pkg",
            )
            .unwrap();
        assert!(out.sql.contains("CREATE OR REPLACE FUNCTION hr.pkg__inc()"));
        assert!(out.sql.contains("PERFORM hr.pkg__initialize();"));
        assert!(
            out.sql
                .contains("PERFORM hr.pkg__set_g_counter(hr.pkg__get_g_counter() + 1);")
        );
        assert!(out.sql.contains("RETURN hr.pkg__get_g_counter();"));
    }

    #[test]
    fn member_kind_is_sniffed_through_create_or_replace() {
        assert_eq!(
            sniff_member_kind("CREATE OR REPLACE PROCEDURE p IS BEGIN NULL; END;").unwrap(),
            TranslationKind::Procedure
        );
        assert_eq!(
            sniff_member_kind("FUNCTION f RETURN NUMBER IS BEGIN RETURN 1; END;").unwrap(),
            TranslationKind::Function
        );
        assert!(sniff_member_kind("BEGIN NULL; END;").is_err());
    }

    #[test]
    fn trigger_translation_names_the_function_after_the_trigger() {
        let mut t = transpiler();
        let out = t
            .translate_trigger(
                "BEGIN :NEW.sal := :NEW.sal * 1.1; END;",
                "hr",
                "emp_biu",
                TriggerKind {
                    row_level: true,
                    event: crate::translate::TriggerEvent::Update,
                },
            )
            .unwrap();
        assert!(
            out.sql
                .contains("CREATE OR REPLACE FUNCTION hr.emp_biu_func() RETURNS trigger")
        );
        assert!(out.sql.contains("NEW.sal := NEW.sal * 1.1;"));
        assert!(out.sql.contains("RETURN NEW;"));
    }
}
