//! Syntax-directed translation to PostgreSQL
//!
//! [`Translator`] walks a parsed unit top-down and emits PostgreSQL text
//! node by node. Each visitor method returns the text for its subtree and
//! restores any context it changes before returning; the same AST and
//! context always produce the same output.

mod connect_by;
mod cursor_attrs;
mod datetime;
mod dml;
mod expr;
mod inline_types;
mod outer_join;
pub mod package_vars;
mod plsql;
mod query;

use crate::cancel::CancelToken;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::context::{PackageVarInfo, TransformationContext};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Pos, Warning};
use crate::infer::TypeInference;
use crate::parser::ast::*;
use crate::typemap;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Shape of the trigger a body is translated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerKind {
    pub row_level: bool,
    pub event: TriggerEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

pub struct Translator<'a> {
    pub(crate) ctx: TransformationContext<'a>,
    pub(crate) infer: TypeInference,
    pub(crate) config: &'a Config,
    pub(crate) cancel: CancelToken,
    pub(crate) warnings: Vec<Warning>,
    /// Packages whose members or variables were referenced; the pipeline
    /// ensures their session-state helpers exist after the translation.
    pub(crate) referenced_packages: HashSet<(String, String)>,
    /// Declared user exception name → SQLSTATE.
    pub(crate) user_exceptions: HashMap<String, String>,
    next_exception_code: u32,
    next_external_code: u32,
    /// When set, bare column identifiers are prefixed with this alias
    /// (used by the hierarchical rewriter's recursive branch).
    pub(crate) qualify_bare_columns: Option<String>,
    /// Rendering of `LEVEL` in the current branch of a hierarchical query
    /// (`1` in the base branch, `h.level + 1` in the recursive one).
    pub(crate) level_sql: Option<String>,
}

impl<'a> Translator<'a> {
    pub fn new(schema: &str, catalog: &'a Catalog, config: &'a Config, cancel: CancelToken) -> Self {
        Self {
            ctx: TransformationContext::new(schema, catalog),
            infer: TypeInference::new(),
            config,
            cancel,
            warnings: Vec::new(),
            referenced_packages: HashSet::new(),
            user_exceptions: HashMap::new(),
            next_exception_code: 1,
            next_external_code: 1,
            qualify_bare_columns: None,
            level_sql: None,
        }
    }

    pub fn for_package(mut self, package: &str, vars: HashMap<String, PackageVarInfo>) -> Self {
        self.ctx = self.ctx.for_package(package).with_package_variables(vars);
        self
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn referenced_packages(&self) -> &HashSet<(String, String)> {
        &self.referenced_packages
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>, line: usize) {
        self.warnings.push(Warning::new(message, line));
    }

    pub(crate) fn check_cancelled(&self, pos: Pos) -> Result<(), Diagnostics> {
        if self.cancel.is_cancelled() {
            Err(Diagnostics::new(
                DiagnosticKind::Cancelled,
                "translation cancelled",
                pos,
            ))
        } else {
            Ok(())
        }
    }

    /// Fail with `kind`, or — when the configuration opts that kind into
    /// recovery — degrade to a commented `RAISE EXCEPTION` stub so the
    /// emitted unit fails loudly at run time instead of silently differing.
    pub(crate) fn recover_or_fail(
        &mut self,
        kind: DiagnosticKind,
        message: &str,
        pos: Pos,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        if self.config.can_recover(kind) {
            self.warn(format!("{message} (stubbed)"), pos.line);
            let pad = "  ".repeat(indent);
            Ok(format!(
                "{pad}-- plsql2pg: {message}\n{pad}RAISE EXCEPTION '{}';\n",
                format!("plsql2pg: {message}").replace('\'', "''"),
            ))
        } else {
            Err(Diagnostics::new(kind, message, pos))
        }
    }

    /// Next deterministic SQLSTATE for a user-declared exception without an
    /// `EXCEPTION_INIT` code.
    pub(crate) fn allocate_exception_code(&mut self) -> String {
        let code = format!("P1{:03}", self.next_exception_code);
        self.next_exception_code += 1;
        code
    }

    /// Next deterministic SQLSTATE for an `EXCEPTION_INIT` code outside the
    /// -20000..-20999 user range (built-in ORA codes like -1 or -942).
    /// Sequential P9xxx states keep two such exceptions in one unit from
    /// colliding with each other or with the P0xxx/P1xxx windows.
    pub(crate) fn allocate_external_code(&mut self) -> String {
        let code = format!("P9{:03}", self.next_external_code);
        self.next_external_code += 1;
        code
    }

    /// The defining SELECT of a view.
    pub fn view_select(&mut self, select: &Select) -> Result<String, Diagnostics> {
        let depth = self.ctx.query_depth();
        let sql = self.select(select, None)?;
        debug_assert_eq!(self.ctx.query_depth(), depth, "query scope leaked");
        Ok(sql)
    }

    /// Full `CREATE OR REPLACE FUNCTION` DDL for a standalone subprogram or
    /// a package member (`package` set ⇒ double-underscore flattening and an
    /// initializer call prepended).
    pub fn function_ddl(
        &mut self,
        def: &FunctionDef,
        package: Option<&str>,
    ) -> Result<String, Diagnostics> {
        self.check_cancelled(def.pos)?;
        let schema = self.ctx.current_schema.clone();
        let fname = def.name.last();
        let qualified = match package {
            Some(pkg) => format!("{schema}.{}__{fname}", pkg.to_lowercase()),
            None => format!("{schema}.{fname}"),
        };
        debug!(name = %qualified, "translating subprogram");

        cursor_attrs::prescan(&def.block, &mut self.ctx);

        self.ctx.push_scope();
        let result = self.function_ddl_inner(def, package, &schema, &qualified);
        self.ctx.pop_scope();
        let sql = result?;
        debug_assert_eq!(self.ctx.scope_depth(), 0, "variable scope leaked");
        Ok(sql)
    }

    fn function_ddl_inner(
        &mut self,
        def: &FunctionDef,
        package: Option<&str>,
        schema: &str,
        qualified: &str,
    ) -> Result<String, Diagnostics> {
        let mut params = Vec::new();
        for param in &def.params {
            params.push(self.param_sql(param)?);
        }

        let returns = match &def.return_type {
            Some(dt) => self.resolved_pg_type(dt, def.pos)?,
            None => "void".to_string(),
        };

        let mut prelude = Vec::new();
        if let Some(pkg) = package {
            prelude.push(format!("PERFORM {schema}.{}__initialize();", pkg.to_lowercase()));
            self.referenced_packages
                .insert((schema.to_string(), pkg.to_lowercase()));
        }

        let mut extra_decls = Vec::new();
        if self.ctx.sql_attribute_needed {
            extra_decls.push("sql__rowcount integer := 0;".to_string());
        }

        let body = self.emit_block(&def.block, 0, &extra_decls, &prelude)?;

        Ok(format!(
            "CREATE OR REPLACE FUNCTION {qualified}({}) RETURNS {returns} LANGUAGE plpgsql AS $$\n{body}$$;\n",
            params.join(", "),
        ))
    }

    fn param_sql(&mut self, param: &Param) -> Result<String, Diagnostics> {
        let pg_type = self.resolved_pg_type(&param.data_type, Pos::start())?;
        let mode = match param.mode {
            ParamMode::In => "",
            ParamMode::Out => "OUT ",
            ParamMode::InOut => "INOUT ",
        };
        let name = param.name.to_lowercase();
        self.ctx.declare_variable(
            &name,
            crate::context::VarInfo::scalar(pg_type.clone(), typemap::category(&param.data_type)),
        );
        let mut sql = format!("{mode}{name} {pg_type}");
        if let Some(default) = &param.default {
            let value = self.expr(default)?;
            sql.push_str(&format!(" DEFAULT {value}"));
        }
        Ok(sql)
    }

    /// A type-body member, flattened to `schema.type__member(self jsonb, ...)`.
    /// Bare attribute names in the body read from `self`.
    pub fn type_method_ddl(
        &mut self,
        def: &FunctionDef,
        type_name: &str,
    ) -> Result<String, Diagnostics> {
        self.check_cancelled(def.pos)?;
        let schema = self.ctx.current_schema.clone();
        let type_name = type_name.to_lowercase();
        let member = def.name.last();
        let qualified = format!("{schema}.{type_name}__{member}");

        let Some(ty) = self.ctx.catalog.object_type(&type_name) else {
            return Err(Diagnostics::new(
                DiagnosticKind::MetadataMissing,
                format!("object type '{type_name}' is not in the catalog"),
                def.pos,
            )
            .with_object(type_name));
        };
        let fields = ty
            .attributes
            .iter()
            .map(|(name, oracle_type)| crate::catalog::FieldDef {
                name: name.clone(),
                oracle_type: oracle_type.clone(),
                pg_type: typemap::pg_scalar(oracle_type, None),
            })
            .collect();
        let self_def = crate::catalog::InlineTypeDef {
            name: type_name.clone(),
            category: crate::catalog::TypeCategory::Record,
            fields,
            element_type: None,
            key_type: None,
        };

        cursor_attrs::prescan(&def.block, &mut self.ctx);

        self.ctx.push_scope();
        let result = (|| {
            self.ctx
                .declare_variable("self", crate::context::VarInfo::encoded(self_def));
            let mut params = vec!["self jsonb".to_string()];
            for param in &def.params {
                params.push(self.param_sql(param)?);
            }
            let returns = match &def.return_type {
                Some(dt) => self.resolved_pg_type(dt, def.pos)?,
                None => "void".to_string(),
            };
            let mut extra_decls = Vec::new();
            if self.ctx.sql_attribute_needed {
                extra_decls.push("sql__rowcount integer := 0;".to_string());
            }
            let body = self.emit_block(&def.block, 0, &extra_decls, &[])?;
            Ok(format!(
                "CREATE OR REPLACE FUNCTION {qualified}({}) RETURNS {returns} LANGUAGE plpgsql AS $$\n{body}$$;\n",
                params.join(", "),
            ))
        })();
        self.ctx.pop_scope();
        result
    }

    /// Trigger function DDL: `schema.trigname_func()` returning `trigger`.
    pub fn trigger_ddl(
        &mut self,
        block: &Block,
        trigger_name: &str,
        kind: TriggerKind,
    ) -> Result<String, Diagnostics> {
        if !kind.row_level && block_uses_binds(block) {
            return Err(Diagnostics::at_start(
                DiagnosticKind::UnsupportedFeature,
                "statement-level trigger uses :NEW/:OLD; transition tables are not lowered",
            )
            .with_object(trigger_name));
        }

        cursor_attrs::prescan(block, &mut self.ctx);

        let mut extra_decls = Vec::new();
        if self.ctx.sql_attribute_needed {
            extra_decls.push("sql__rowcount integer := 0;".to_string());
        }

        self.ctx.push_scope();
        let body = {
            let result = self.emit_block(block, 0, &extra_decls, &[]);
            self.ctx.pop_scope();
            result?
        };

        // Row-level trigger functions must return the row; append the
        // conventional RETURN when the body does not end with one.
        let tail = if kind.row_level && !ends_with_return(block) {
            match kind.event {
                TriggerEvent::Delete => "  RETURN OLD;\n",
                _ => "  RETURN NEW;\n",
            }
        } else {
            ""
        };
        let body = inject_before_final_end(&body, tail);

        let schema = &self.ctx.current_schema;
        Ok(format!(
            "CREATE OR REPLACE FUNCTION {schema}.{}_func() RETURNS trigger LANGUAGE plpgsql AS $$\n{body}$$;\n",
            trigger_name.to_lowercase(),
        ))
    }
}

fn ends_with_return(block: &Block) -> bool {
    matches!(
        block.statements.last().map(|s| &s.kind),
        Some(StmtKind::Return { .. })
    )
}

/// Insert `tail` just before the block's final `END;` line.
fn inject_before_final_end(body: &str, tail: &str) -> String {
    if tail.is_empty() {
        return body.to_string();
    }
    match body.rfind("END;") {
        Some(at) => format!("{}{}{}", &body[..at], tail, &body[at..]),
        None => format!("{body}{tail}"),
    }
}

fn block_uses_binds(block: &Block) -> bool {
    fn stmt_uses(stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                matches!(target, Target::Bind { .. }) || expr_uses(value)
            }
            StmtKind::If { arms, else_branch } => {
                arms.iter()
                    .any(|(c, body)| expr_uses(c) || body.iter().any(stmt_uses))
                    || else_branch
                        .as_ref()
                        .is_some_and(|body| body.iter().any(stmt_uses))
            }
            StmtKind::CaseSimple {
                operand,
                arms,
                else_branch,
            } => {
                expr_uses(operand)
                    || arms
                        .iter()
                        .any(|(c, body)| expr_uses(c) || body.iter().any(stmt_uses))
                    || else_branch
                        .as_ref()
                        .is_some_and(|body| body.iter().any(stmt_uses))
            }
            StmtKind::CaseSearched { arms, else_branch } => {
                arms.iter()
                    .any(|(c, body)| expr_uses(c) || body.iter().any(stmt_uses))
                    || else_branch
                        .as_ref()
                        .is_some_and(|body| body.iter().any(stmt_uses))
            }
            StmtKind::Loop { body }
            | StmtKind::While { body, .. }
            | StmtKind::ForRange { body, .. }
            | StmtKind::ForCursor { body, .. } => body.iter().any(stmt_uses),
            StmtKind::Exit { when } | StmtKind::Continue { when } => {
                when.as_ref().is_some_and(expr_uses)
            }
            StmtKind::Return { value } => value.as_ref().is_some_and(expr_uses),
            StmtKind::Call(call) => call.args.iter().any(|a| expr_uses(&a.value)),
            StmtKind::Block(inner) => {
                inner.statements.iter().any(stmt_uses)
                    || inner
                        .handlers
                        .iter()
                        .any(|h| h.statements.iter().any(stmt_uses))
            }
            _ => false,
        }
    }
    fn expr_uses(expr: &Expr) -> bool {
        match expr {
            Expr::Bind { .. } => true,
            Expr::Unary { expr, .. }
            | Expr::Paren(expr)
            | Expr::OuterJoined(expr)
            | Expr::Prior(expr) => expr_uses(expr),
            Expr::Binary { left, right, .. } => expr_uses(left) || expr_uses(right),
            Expr::Call(call) => call.args.iter().any(|a| expr_uses(&a.value)),
            Expr::Case(case) => {
                case.operand.as_deref().is_some_and(expr_uses)
                    || case
                        .arms
                        .iter()
                        .any(|(c, v)| expr_uses(c) || expr_uses(v))
                    || case.else_expr.as_deref().is_some_and(expr_uses)
            }
            Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => expr_uses(expr),
            Expr::InList { expr, items, .. } => {
                expr_uses(expr) || items.iter().any(expr_uses)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr_uses(expr) || expr_uses(low) || expr_uses(high),
            Expr::Like { expr, pattern, .. } => expr_uses(expr) || expr_uses(pattern),
            _ => false,
        }
    }
    block.statements.iter().any(stmt_uses)
        || block
            .handlers
            .iter()
            .any(|h| h.statements.iter().any(stmt_uses))
}
