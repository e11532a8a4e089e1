//! Package context pipeline
//!
//! A `PackageContext` is assembled on the first sighting of a package:
//! fetch and parse the spec, fetch the body (segmenting instead of parsing
//! when it is large), collect variables and inline types, then emit the
//! session-state helper DDL through the caller's environment. Contexts are
//! cached per job; nothing survives the job.

use crate::cancel::CancelToken;
use crate::catalog::{Catalog, InlineTypeDef};
use crate::config::Config;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Pos};
use crate::parser::ast::{Expr, ParsedUnit, TypeDecl, VarDecl};
use crate::parser::{self, TranslationKind};
use crate::segment::{self, MemberSlice};
use crate::translate::{Translator, package_vars};
use crate::typemap;
use std::collections::HashMap;
use tracing::debug;

pub type EnvError = Box<dyn std::error::Error + Send + Sync>;

/// What the core needs from its surroundings: source text for packages and
/// a sink for generated DDL. Errors pass through unchanged as
/// `EnvironmentError` diagnostics.
pub trait PackageEnvironment {
    fn fetch_package_spec(&self, schema: &str, name: &str) -> Result<String, EnvError>;
    fn fetch_package_body(&self, schema: &str, name: &str) -> Result<String, EnvError>;
    fn apply_ddl(&self, sql: &str) -> Result<(), EnvError>;
}

#[derive(Debug, Clone)]
pub struct PackageVar {
    pub name: String,
    pub pg_type: String,
    pub constant: bool,
    pub default: Option<Expr>,
    pub declared_in_spec: bool,
}

#[derive(Debug, Default)]
pub struct PackageContext {
    pub schema: String,
    pub name: String,
    /// Spec variables first, then body-private ones, in declaration order.
    pub variables: Vec<PackageVar>,
    pub inline_types: Vec<InlineTypeDef>,
    /// Member slices when the body was segmented instead of parsed.
    pub member_slices: Vec<MemberSlice>,
    pub body_source: Option<String>,
    pub helpers_generated: bool,
}

impl PackageContext {
    pub fn variable(&self, name: &str) -> Option<&PackageVar> {
        let name = name.to_lowercase();
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Per-job package context cache. Keys are `(schema, package)` lowercase.
#[derive(Default)]
pub struct PackageCache {
    map: HashMap<(String, String), PackageContext>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schema: &str, name: &str) -> Option<&PackageContext> {
        self.map
            .get(&(schema.to_lowercase(), name.to_lowercase()))
    }

    /// Build (or return) the context for `(schema, name)`, emitting helper
    /// DDL through `env` exactly once per job.
    #[allow(clippy::too_many_arguments)]
    pub fn ensure(
        &mut self,
        schema: &str,
        name: &str,
        catalog: &Catalog,
        config: &Config,
        env: Option<&dyn PackageEnvironment>,
        cancel: &CancelToken,
    ) -> Result<&PackageContext, Diagnostics> {
        let key = (schema.to_lowercase(), name.to_lowercase());
        if self.map.contains_key(&key) {
            return Ok(&self.map[&key]);
        }
        debug!(schema = %key.0, package = %key.1, "building package context");

        let mut context = match env {
            Some(env) => {
                build_from_sources(&key.0, &key.1, catalog, config, env, cancel)?
            }
            None => build_from_catalog(&key.0, &key.1, catalog),
        };

        if let Some(env) = env {
            if cancel.is_cancelled() {
                return Err(Diagnostics::at_start(
                    DiagnosticKind::Cancelled,
                    "translation cancelled",
                ));
            }
            let mut translator =
                Translator::new(&key.0, catalog, config, cancel.clone());
            let ddl = package_vars::generate_helpers(&context, &mut translator)?;
            for statement in &ddl {
                env.apply_ddl(statement).map_err(|e| {
                    Diagnostics::at_start(
                        DiagnosticKind::EnvironmentError,
                        format!("applying helper DDL for {}.{}: {e}", key.0, key.1),
                    )
                })?;
            }
            context.helpers_generated = true;
        }

        Ok(self.map.entry(key).or_insert(context))
    }
}

fn build_from_sources(
    schema: &str,
    name: &str,
    catalog: &Catalog,
    config: &Config,
    env: &dyn PackageEnvironment,
    cancel: &CancelToken,
) -> Result<PackageContext, Diagnostics> {
    if cancel.is_cancelled() {
        return Err(Diagnostics::at_start(
            DiagnosticKind::Cancelled,
            "translation cancelled",
        ));
    }

    let mut context = PackageContext {
        schema: schema.to_string(),
        name: name.to_string(),
        ..PackageContext::default()
    };

    let spec_source = env.fetch_package_spec(schema, name).map_err(|e| {
        Diagnostics::at_start(
            DiagnosticKind::EnvironmentError,
            format!("fetching spec of {schema}.{name}: {e}"),
        )
    })?;
    let spec = parser::parse(&spec_source, TranslationKind::PackageSpec)
        .map_err(|errors| crate::diagnostics::parse_failure(&errors))?;
    let ParsedUnit::PackageSpec(spec) = spec else {
        unreachable!("facade returns the requested unit kind");
    };

    let mut translator = Translator::new(schema, catalog, config, cancel.clone());
    for var in &spec.variables {
        context
            .variables
            .push(package_var(var, true, &mut translator));
    }
    for decl in &spec.types {
        push_inline_type(&mut context.inline_types, decl, &mut translator);
    }

    if cancel.is_cancelled() {
        return Err(Diagnostics::at_start(
            DiagnosticKind::Cancelled,
            "translation cancelled",
        ));
    }

    let body_source = env.fetch_package_body(schema, name).map_err(|e| {
        Diagnostics::at_start(
            DiagnosticKind::EnvironmentError,
            format!("fetching body of {schema}.{name}: {e}"),
        )
    })?;

    if body_source.len() > config.transpile.segmentation_threshold {
        // Too large to parse whole; slice members now, parse on demand.
        context.member_slices = segment::split_members(&body_source)?;
        context.body_source = Some(body_source);
        return Ok(context);
    }

    let body = parser::parse(&body_source, TranslationKind::PackageBody)
        .map_err(|errors| crate::diagnostics::parse_failure(&errors))?;
    let ParsedUnit::PackageBody(body) = body else {
        unreachable!("facade returns the requested unit kind");
    };
    for var in &body.variables {
        context
            .variables
            .push(package_var(var, false, &mut translator));
    }
    for decl in &body.types {
        push_inline_type(&mut context.inline_types, decl, &mut translator);
    }
    context.body_source = Some(body_source);
    Ok(context)
}

/// No environment: fall back to the public signature in the catalog. Good
/// enough for pure-translation runs that never apply DDL.
fn build_from_catalog(schema: &str, name: &str, catalog: &Catalog) -> PackageContext {
    let mut context = PackageContext {
        schema: schema.to_string(),
        name: name.to_string(),
        ..PackageContext::default()
    };
    if let Some(sig) = catalog.package(schema, name) {
        let mut names: Vec<&String> = sig.variables.keys().collect();
        names.sort();
        for var_name in names {
            context.variables.push(PackageVar {
                name: var_name.clone(),
                pg_type: typemap::pg_scalar(&sig.variables[var_name], None),
                constant: false,
                default: None,
                declared_in_spec: true,
            });
        }
        context.inline_types = sig.types.values().cloned().collect();
    }
    context
}

fn package_var(var: &VarDecl, in_spec: bool, translator: &mut Translator<'_>) -> PackageVar {
    // %TYPE chains that cannot be resolved without more context degrade to
    // text; the session-state encoding is text underneath anyway.
    let pg_type = translator
        .resolved_pg_type(&var.data_type, Pos::start())
        .unwrap_or_else(|_| "text".to_string());
    PackageVar {
        name: var.name.clone(),
        pg_type,
        constant: var.constant,
        default: var.default.clone(),
        declared_in_spec: in_spec,
    }
}

fn push_inline_type(
    types: &mut Vec<InlineTypeDef>,
    decl: &TypeDecl,
    translator: &mut Translator<'_>,
) {
    if let Ok(def) = translator.inline_def_from_decl(decl) {
        types.push(def);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use std::cell::RefCell;

    struct FakeEnv {
        spec: String,
        body: String,
        applied: RefCell<Vec<String>>,
    }

    impl PackageEnvironment for FakeEnv {
        fn fetch_package_spec(&self, _schema: &str, _name: &str) -> Result<String, EnvError> {
            Ok(self.spec.clone())
        }
        fn fetch_package_body(&self, _schema: &str, _name: &str) -> Result<String, EnvError> {
            Ok(self.body.clone())
        }
        fn apply_ddl(&self, sql: &str) -> Result<(), EnvError> {
            self.applied.borrow_mut().push(sql.to_string());
            Ok(())
        }
    }

    fn env() -> FakeEnv {
        FakeEnv {
            spec: "PACKAGE pay IS
                     g_rate NUMBER := 1.5;
                     c_max CONSTANT NUMBER := 100;
                     FUNCTION net(p NUMBER) RETURN NUMBER;
                   END pay;"
                .to_string(),
            body: "PACKAGE BODY pay IS
                     g_calls NUMBER := 0;
                     FUNCTION net(p NUMBER) RETURN NUMBER IS
                     BEGIN
                       RETURN p * g_rate;
                     END;
                   END pay;"
                .to_string(),
            applied: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn context_collects_spec_and_body_variables() {
        let catalog = CatalogBuilder::new().build();
        let config = Config::default();
        let mut cache = PackageCache::new();
        let env = env();
        let ctx = cache
            .ensure("hr", "pay", &catalog, &config, Some(&env), &CancelToken::new())
            .unwrap();
        assert_eq!(ctx.variables.len(), 3);
        assert!(ctx.variable("g_rate").unwrap().declared_in_spec);
        assert!(ctx.variable("c_max").unwrap().constant);
        assert!(!ctx.variable("g_calls").unwrap().declared_in_spec);
    }

    #[test]
    fn helper_ddl_is_applied_once_per_job() {
        let catalog = CatalogBuilder::new().build();
        let config = Config::default();
        let mut cache = PackageCache::new();
        let env = env();
        cache
            .ensure("hr", "pay", &catalog, &config, Some(&env), &CancelToken::new())
            .unwrap();
        let first_count = env.applied.borrow().len();
        assert!(first_count > 0, "helper DDL should be emitted");

        cache
            .ensure("hr", "pay", &catalog, &config, Some(&env), &CancelToken::new())
            .unwrap();
        assert_eq!(
            env.applied.borrow().len(),
            first_count,
            "cache hit must not re-apply DDL"
        );
    }

    #[test]
    fn oversized_bodies_are_segmented_not_parsed() {
        let catalog = CatalogBuilder::new().build();
        let mut config = Config::default();
        config.transpile.segmentation_threshold = 10;
        let mut cache = PackageCache::new();
        let env = env();
        let ctx = cache
            .ensure("hr", "pay", &catalog, &config, Some(&env), &CancelToken::new())
            .unwrap();
        assert_eq!(ctx.member_slices.len(), 1);
        assert_eq!(ctx.member_slices[0].name, "net");
        // Body-private variables are not discovered on the segmented path.
        assert!(ctx.variable("g_calls").is_none());
    }

    #[test]
    fn cancelled_jobs_do_not_touch_the_environment() {
        let catalog = CatalogBuilder::new().build();
        let config = Config::default();
        let mut cache = PackageCache::new();
        let env = env();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = cache
            .ensure("hr", "pay", &catalog, &config, Some(&env), &cancel)
            .unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Cancelled);
        assert!(env.applied.borrow().is_empty());
    }

    #[test]
    fn without_an_environment_the_catalog_signature_is_used() {
        let catalog = CatalogBuilder::new()
            .package("hr", "pay", |p| {
                p.variable("g_rate", "NUMBER");
            })
            .build();
        let config = Config::default();
        let mut cache = PackageCache::new();
        let ctx = cache
            .ensure("hr", "pay", &catalog, &config, None, &CancelToken::new())
            .unwrap();
        assert_eq!(ctx.variables.len(), 1);
        assert_eq!(ctx.variables[0].pg_type, "numeric");
    }
}
