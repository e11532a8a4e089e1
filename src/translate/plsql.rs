//! PL/SQL block and statement emission
//!
//! Declarations resolve their types (registering inline types and cursor
//! tracking variables on the way), statements emit PL/pgSQL line by line in
//! program order, and exception handlers go through the fixed Oracle →
//! PostgreSQL condition table. Every scope push is paired with a pop on all
//! exit paths; the cancellation token is checked at each statement entry.

use super::Translator;
use super::inline_types::element_path;
use super::package_vars;
use crate::catalog::{FieldDef, InlineTypeDef, TypeCategory};
use crate::context::VarInfo;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Pos};
use crate::parser::ast::*;
use crate::typemap;

/// Oracle predefined exceptions and their PL/pgSQL condition names.
const ORACLE_CONDITIONS: [(&str, &str); 21] = [
    ("no_data_found", "NO_DATA_FOUND"),
    ("too_many_rows", "TOO_MANY_ROWS"),
    ("dup_val_on_index", "UNIQUE_VIOLATION"),
    ("zero_divide", "DIVISION_BY_ZERO"),
    ("invalid_number", "INVALID_TEXT_REPRESENTATION"),
    ("value_error", "DATA_EXCEPTION"),
    ("invalid_cursor", "INVALID_CURSOR_STATE"),
    ("cursor_already_open", "DUPLICATE_CURSOR"),
    ("timeout_on_resource", "LOCK_NOT_AVAILABLE"),
    ("storage_error", "OUT_OF_MEMORY"),
    ("program_error", "INTERNAL_ERROR"),
    ("access_into_null", "NULL_VALUE_NOT_ALLOWED"),
    ("collection_is_null", "NULL_VALUE_NOT_ALLOWED"),
    ("self_is_null", "NULL_VALUE_NOT_ALLOWED"),
    ("subscript_beyond_count", "ARRAY_SUBSCRIPT_ERROR"),
    ("subscript_outside_limit", "ARRAY_SUBSCRIPT_ERROR"),
    ("case_not_found", "CASE_NOT_FOUND"),
    ("login_denied", "INVALID_AUTHORIZATION_SPECIFICATION"),
    ("not_logged_on", "INVALID_AUTHORIZATION_SPECIFICATION"),
    ("rowtype_mismatch", "DATATYPE_MISMATCH"),
    ("sys_invalid_rowid", "INVALID_TEXT_REPRESENTATION"),
];

fn oracle_condition(name: &str) -> Option<&'static str> {
    ORACLE_CONDITIONS
        .iter()
        .find(|(oracle, _)| *oracle == name)
        .map(|(_, pg)| *pg)
}

/// SQLSTATE for an `EXCEPTION_INIT` code in the -20000..-20999 user range,
/// mapped onto P0000..P0999. Codes outside that range (built-in ORA codes)
/// have no stable window here; the translator allocates them sequential
/// P9xxx states instead, so two of them can never collide.
fn sqlstate_for_user_range(code: i64) -> Option<String> {
    let n = code.unsigned_abs();
    if (20000..21000).contains(&n) {
        Some(format!("P{:04}", n - 20000))
    } else {
        None
    }
}

enum AssignPlan {
    Plain(String),
    JsonField { var: String, path: Vec<String> },
    PackageSet { schema: String, pkg: String, var: String },
}

impl Translator<'_> {
    /// Emit a PL/pgSQL block. `extra_decls` and `prelude` are injected by
    /// the top-level entry points (implicit-cursor counter, package
    /// initializer call).
    pub(super) fn emit_block(
        &mut self,
        block: &Block,
        indent: usize,
        extra_decls: &[String],
        prelude: &[String],
    ) -> Result<String, Diagnostics> {
        self.ctx.push_scope();
        let result = self.emit_block_inner(block, indent, extra_decls, prelude);
        self.ctx.pop_scope();
        result
    }

    fn emit_block_inner(
        &mut self,
        block: &Block,
        indent: usize,
        extra_decls: &[String],
        prelude: &[String],
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);
        let inner_pad = "  ".repeat(indent + 1);
        let mut sql = String::new();

        let decls = self.emit_declarations(&block.declarations, indent + 1)?;
        if !decls.is_empty() || !extra_decls.is_empty() {
            sql.push_str(&format!("{pad}DECLARE\n"));
            for extra in extra_decls {
                sql.push_str(&format!("{inner_pad}{extra}\n"));
            }
            sql.push_str(&decls);
        }

        sql.push_str(&format!("{pad}BEGIN\n"));
        for line in prelude {
            sql.push_str(&format!("{inner_pad}{line}\n"));
        }
        sql.push_str(&self.emit_statements(&block.statements, indent + 1)?);

        if !block.handlers.is_empty() {
            sql.push_str(&format!("{pad}EXCEPTION\n"));
            for handler in &block.handlers {
                sql.push_str(&self.emit_handler(handler, indent + 1)?);
            }
        }
        sql.push_str(&format!("{pad}END;\n"));
        Ok(sql)
    }

    // --- declarations ---

    fn emit_declarations(
        &mut self,
        decls: &[Declaration],
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);
        let mut sql = String::new();

        for decl in decls {
            match decl {
                Declaration::Type(type_decl) => {
                    let def = self.inline_def_from_decl(type_decl)?;
                    self.ctx.register_inline_type(def);
                }
                Declaration::Variable(var) => {
                    sql.push_str(&self.emit_variable(var, &pad)?);
                }
                Declaration::Cursor { name, query, pos } => {
                    self.check_cancelled(*pos)?;
                    let body = self.select(query, None)?;
                    sql.push_str(&format!("{pad}{name} CURSOR FOR {body};\n"));
                    self.ctx.declare_variable(name, VarInfo::cursor());
                    if self.ctx.cursor_needs_attrs(name) {
                        sql.push_str(&format!("{pad}{name}__found boolean;\n"));
                        sql.push_str(&format!("{pad}{name}__rowcount integer := 0;\n"));
                        sql.push_str(&format!("{pad}{name}__isopen boolean := false;\n"));
                    }
                }
                Declaration::Exception { name, .. } => {
                    let code = self.allocate_exception_code();
                    self.user_exceptions.insert(name.clone(), code);
                }
                Declaration::PragmaExceptionInit { name, code, .. } => {
                    let state = sqlstate_for_user_range(*code)
                        .unwrap_or_else(|| self.allocate_external_code());
                    self.user_exceptions.insert(name.clone(), state);
                }
                Declaration::Pragma { name, pos } => {
                    if name == "autonomous_transaction" {
                        return Err(Diagnostics::new(
                            DiagnosticKind::UnsupportedFeature,
                            "PRAGMA AUTONOMOUS_TRANSACTION",
                            *pos,
                        ));
                    }
                    self.warn(format!("PRAGMA {} dropped", name.to_uppercase()), pos.line);
                }
                Declaration::Subprogram { name, pos } => {
                    return Err(Diagnostics::new(
                        DiagnosticKind::UnsupportedFeature,
                        format!("nested subprogram '{name}'"),
                        *pos,
                    )
                    .with_object(name.clone()));
                }
            }
        }
        Ok(sql)
    }

    fn emit_variable(&mut self, var: &VarDecl, pad: &str) -> Result<String, Diagnostics> {
        // jsonb-encoded shapes first: named inline types, %ROWTYPE, object
        // types used as variables.
        if let Some(def) = self.encoded_def_for(&var.data_type)? {
            if def.category == TypeCategory::TypeReference {
                self.ctx
                    .declare_variable(&var.name, VarInfo::scalar("refcursor", typemap::OracleType::Unknown));
                return Ok(format!("{pad}{} refcursor;\n", var.name));
            }
            let init = match &var.default {
                Some(default) => self.expr(default)?,
                None => def.empty_literal().to_string(),
            };
            let line = format!("{pad}{} jsonb := {init};\n", var.name);
            self.ctx.declare_variable(&var.name, VarInfo::encoded(def));
            return Ok(line);
        }

        let pg_type = self.resolved_pg_type(&var.data_type, var.pos)?;
        let mut line = format!("{pad}{}", var.name);
        if var.constant {
            line.push_str(" CONSTANT");
        }
        line.push_str(&format!(" {pg_type}"));
        if var.not_null && var.default.is_some() {
            line.push_str(" NOT NULL");
        } else if var.not_null {
            self.warn(
                format!("NOT NULL dropped on '{}' (no initializer)", var.name),
                var.pos.line,
            );
        }
        if let Some(default) = &var.default {
            line.push_str(&format!(" := {}", self.expr(default)?));
        }
        line.push_str(";\n");
        self.ctx.declare_variable(
            &var.name,
            VarInfo::scalar(pg_type, typemap::category(&var.data_type)),
        );
        Ok(line)
    }

    /// The inline definition behind a declared type, when the declaration
    /// needs the jsonb encoding.
    fn encoded_def_for(
        &mut self,
        dt: &DataType,
    ) -> Result<Option<InlineTypeDef>, Diagnostics> {
        match dt {
            DataType::RowOf(chain) => {
                let chain = chain.clone();
                Ok(Some(self.rowtype_def(&chain, chain.pos)?))
            }
            DataType::Named(chain) => {
                let parts: Vec<String> = chain.parts.iter().map(|p| p.normalized()).collect();
                if let Some(def) = self.ctx.resolve_inline_type(&parts).cloned() {
                    return Ok(Some(def));
                }
                if chain.len() == 1 {
                    if let Some(ty) = self.ctx.catalog.object_type(&chain.first()) {
                        let fields = ty
                            .attributes
                            .iter()
                            .map(|(name, oracle_type)| FieldDef {
                                name: name.clone(),
                                oracle_type: oracle_type.clone(),
                                pg_type: typemap::pg_scalar(oracle_type, None),
                            })
                            .collect();
                        return Ok(Some(InlineTypeDef {
                            name: ty.name.clone(),
                            category: TypeCategory::Record,
                            fields,
                            element_type: None,
                            key_type: None,
                        }));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    // --- statements ---

    pub(super) fn emit_statements(
        &mut self,
        stmts: &[Stmt],
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let mut sql = String::new();
        for stmt in stmts {
            sql.push_str(&self.emit_stmt(stmt, indent)?);
        }
        Ok(sql)
    }

    fn emit_stmt(&mut self, stmt: &Stmt, indent: usize) -> Result<String, Diagnostics> {
        self.check_cancelled(stmt.pos)?;
        let pad = "  ".repeat(indent);

        match &stmt.kind {
            StmtKind::Assign { target, value } => self.emit_assign(target, value, indent),
            StmtKind::If { arms, else_branch } => {
                let mut sql = String::new();
                for (i, (cond, body)) in arms.iter().enumerate() {
                    let kw = if i == 0 { "IF" } else { "ELSIF" };
                    sql.push_str(&format!("{pad}{kw} {} THEN\n", self.expr(cond)?));
                    sql.push_str(&self.emit_statements(body, indent + 1)?);
                }
                if let Some(body) = else_branch {
                    sql.push_str(&format!("{pad}ELSE\n"));
                    sql.push_str(&self.emit_statements(body, indent + 1)?);
                }
                sql.push_str(&format!("{pad}END IF;\n"));
                Ok(sql)
            }
            StmtKind::CaseSimple {
                operand,
                arms,
                else_branch,
            } => {
                let mut sql = format!("{pad}CASE {}\n", self.expr(operand)?);
                sql.push_str(&self.emit_case_arms(arms, else_branch, indent)?);
                Ok(sql)
            }
            StmtKind::CaseSearched { arms, else_branch } => {
                let mut sql = format!("{pad}CASE\n");
                sql.push_str(&self.emit_case_arms(arms, else_branch, indent)?);
                Ok(sql)
            }
            StmtKind::Loop { body } => {
                let mut sql = format!("{pad}LOOP\n");
                sql.push_str(&self.emit_statements(body, indent + 1)?);
                sql.push_str(&format!("{pad}END LOOP;\n"));
                Ok(sql)
            }
            StmtKind::While { condition, body } => {
                let mut sql = format!("{pad}WHILE {} LOOP\n", self.expr(condition)?);
                sql.push_str(&self.emit_statements(body, indent + 1)?);
                sql.push_str(&format!("{pad}END LOOP;\n"));
                Ok(sql)
            }
            StmtKind::ForRange {
                var,
                reverse,
                low,
                high,
                body,
            } => {
                let low_sql = self.expr(low)?;
                let high_sql = self.expr(high)?;
                // PostgreSQL REVERSE iterates from the first bound down to
                // the second, so the Oracle bounds swap.
                let range = if *reverse {
                    format!("REVERSE {high_sql}..{low_sql}")
                } else {
                    format!("{low_sql}..{high_sql}")
                };
                self.ctx.push_scope();
                self.ctx.declare_variable(
                    var,
                    VarInfo::scalar("integer", typemap::OracleType::Number),
                );
                let body_sql = self.emit_statements(body, indent + 1);
                self.ctx.pop_scope();
                let mut sql = format!("{pad}FOR {var} IN {range} LOOP\n");
                sql.push_str(&body_sql?);
                sql.push_str(&format!("{pad}END LOOP;\n"));
                Ok(sql)
            }
            StmtKind::ForCursor { var, source, body } => {
                let source_sql = match source {
                    CursorSource::Named(name) => name.clone(),
                    CursorSource::Inline(query) => format!("({})", self.select(query, None)?),
                };
                self.ctx.push_scope();
                self.ctx.declare_variable(var, VarInfo::loop_record());
                let body_sql = self.emit_statements(body, indent + 1);
                self.ctx.pop_scope();
                let mut sql = format!("{pad}FOR {var} IN {source_sql} LOOP\n");
                sql.push_str(&body_sql?);
                sql.push_str(&format!("{pad}END LOOP;\n"));
                Ok(sql)
            }
            StmtKind::Exit { when } => match when {
                Some(cond) => Ok(format!("{pad}EXIT WHEN {};\n", self.expr(cond)?)),
                None => Ok(format!("{pad}EXIT;\n")),
            },
            StmtKind::Continue { when } => match when {
                Some(cond) => Ok(format!("{pad}CONTINUE WHEN {};\n", self.expr(cond)?)),
                None => Ok(format!("{pad}CONTINUE;\n")),
            },
            StmtKind::Return { value } => match value {
                Some(value) => Ok(format!("{pad}RETURN {};\n", self.expr(value)?)),
                None => Ok(format!("{pad}RETURN;\n")),
            },
            StmtKind::Null => Ok(format!("{pad}NULL;\n")),
            StmtKind::Raise { exception } => self.emit_raise(exception.as_ref(), &pad),
            StmtKind::Call(call) => self.emit_call(call, stmt.pos, indent),
            StmtKind::SelectInto { query, into } => {
                let targets = self.into_targets_sql(into)?;
                let select = self.select(query, Some(&format!("STRICT {targets}")))?;
                let mut sql = format!("{pad}{select};\n");
                if self.ctx.sql_attribute_needed {
                    sql.push_str(&format!(
                        "{pad}GET DIAGNOSTICS sql__rowcount = ROW_COUNT;\n"
                    ));
                }
                Ok(sql)
            }
            StmtKind::Insert(insert) => self.emit_insert(insert, indent),
            StmtKind::Update(update) => self.emit_update(update, indent),
            StmtKind::Delete(delete) => self.emit_delete(delete, indent),
            StmtKind::Open { cursor } => {
                let mut sql = format!("{pad}OPEN {cursor};\n");
                if self.ctx.cursor_needs_attrs(cursor) {
                    sql.push_str(&format!("{pad}{cursor}__isopen := true;\n"));
                }
                Ok(sql)
            }
            StmtKind::Fetch { cursor, into } => {
                let targets = self.into_targets_sql(into)?;
                let mut sql = format!("{pad}FETCH {cursor} INTO {targets};\n");
                if self.ctx.cursor_needs_attrs(cursor) {
                    sql.push_str(&format!("{pad}{cursor}__found := FOUND;\n"));
                    sql.push_str(&format!(
                        "{pad}IF {cursor}__found THEN {cursor}__rowcount := {cursor}__rowcount + 1; END IF;\n"
                    ));
                }
                Ok(sql)
            }
            StmtKind::Close { cursor } => {
                let mut sql = format!("{pad}CLOSE {cursor};\n");
                if self.ctx.cursor_needs_attrs(cursor) {
                    sql.push_str(&format!("{pad}{cursor}__isopen := false;\n"));
                }
                Ok(sql)
            }
            StmtKind::Block(block) => self.emit_block(block, indent, &[], &[]),
            StmtKind::Commit => {
                self.warn("COMMIT dropped (functions cannot control transactions)", stmt.pos.line);
                Ok(format!("{pad}NULL; -- COMMIT\n"))
            }
            StmtKind::Rollback => {
                self.warn(
                    "ROLLBACK dropped (functions cannot control transactions)",
                    stmt.pos.line,
                );
                Ok(format!("{pad}NULL; -- ROLLBACK\n"))
            }
            StmtKind::ExecuteImmediate { .. } => self.recover_or_fail(
                DiagnosticKind::UnsupportedFeature,
                "EXECUTE IMMEDIATE (dynamic SQL is not transpiled)",
                stmt.pos,
                indent,
            ),
            StmtKind::Unsupported { feature } => self.recover_or_fail(
                DiagnosticKind::UnsupportedFeature,
                feature,
                stmt.pos,
                indent,
            ),
        }
    }

    fn emit_case_arms(
        &mut self,
        arms: &[(Expr, Vec<Stmt>)],
        else_branch: &Option<Vec<Stmt>>,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);
        let mut sql = String::new();
        for (cond, body) in arms {
            sql.push_str(&format!("{pad}WHEN {} THEN\n", self.expr(cond)?));
            sql.push_str(&self.emit_statements(body, indent + 1)?);
        }
        if let Some(body) = else_branch {
            sql.push_str(&format!("{pad}ELSE\n"));
            sql.push_str(&self.emit_statements(body, indent + 1)?);
        }
        sql.push_str(&format!("{pad}END CASE;\n"));
        Ok(sql)
    }

    // --- assignment ---

    fn emit_assign(
        &mut self,
        target: &Target,
        value: &Expr,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);

        if let Target::Bind { target, field, .. } = target {
            let row = match target {
                BindTarget::New => "NEW",
                BindTarget::Old => "OLD",
            };
            let value_sql = self.expr(value)?;
            return Ok(format!("{pad}{row}.{field} := {value_sql};\n"));
        }

        if let Target::Index { base, index } = target {
            return self.emit_indexed_assign(base, index, value, &pad);
        }

        let Target::Name(chain) = target else {
            unreachable!("bind and index targets handled above");
        };

        self.ctx.enter_assignment_target();
        let plan = self.assign_plan(chain);
        self.ctx.leave_assignment_target();

        match plan? {
            AssignPlan::Plain(name) => {
                let value_sql = self.expr(value)?;
                Ok(format!("{pad}{name} := {value_sql};\n"))
            }
            AssignPlan::JsonField { var, path } => {
                let value_sql = self.jsonb_value(value)?;
                if path.len() == 1 {
                    Ok(format!(
                        "{pad}{var} := jsonb_set({var}, '{{{}}}', {value_sql});\n",
                        path[0]
                    ))
                } else {
                    Ok(format!(
                        "{pad}{var} := jsonb_set({var}, '{{{}}}', {value_sql}, true);\n",
                        path.join(",")
                    ))
                }
            }
            AssignPlan::PackageSet { schema, pkg, var } => {
                let value_sql = self.expr(value)?;
                self.referenced_packages.insert((schema.clone(), pkg.clone()));
                Ok(format!(
                    "{pad}PERFORM {};\n",
                    package_vars::setter_call(&schema, &pkg, &var, &value_sql)
                ))
            }
        }
    }

    fn assign_plan(&mut self, chain: &IdentChain) -> Result<AssignPlan, Diagnostics> {
        match chain.len() {
            1 => {
                let name = chain.first();
                if self.ctx.lookup_variable(&name).is_some() {
                    return Ok(AssignPlan::Plain(name));
                }
                if self.ctx.is_current_package_variable(&name) {
                    let info = self.ctx.current_package_variable(&name).unwrap();
                    if info.constant {
                        return Err(Diagnostics::new(
                            DiagnosticKind::AmbiguousReference,
                            format!("assignment to package constant '{name}'"),
                            chain.pos,
                        )
                        .with_object(name));
                    }
                    return Ok(AssignPlan::PackageSet {
                        schema: self.ctx.current_schema.clone(),
                        pkg: self.ctx.current_package.clone().unwrap_or_default(),
                        var: name,
                    });
                }
                Ok(AssignPlan::Plain(name))
            }
            2 => {
                let head = chain.first();
                let tail = chain.last();
                if let Some(var) = self.ctx.lookup_variable(&head) {
                    if var.inline.is_some() {
                        return Ok(AssignPlan::JsonField {
                            var: head,
                            path: vec![tail],
                        });
                    }
                    return Ok(AssignPlan::Plain(format!("{head}.{tail}")));
                }
                let schema = self.ctx.current_schema.clone();
                if self
                    .ctx
                    .catalog
                    .package_variable_type(&schema, &head, &tail)
                    .is_some()
                {
                    return Ok(AssignPlan::PackageSet {
                        schema,
                        pkg: head,
                        var: tail,
                    });
                }
                Ok(AssignPlan::Plain(format!("{head}.{tail}")))
            }
            3 => {
                let (a, b, c) = (chain.part(0), chain.part(1), chain.part(2));
                // v.f.g — nested record field.
                if let Some(var) = self.ctx.lookup_variable(&a) {
                    if var.inline.is_some() {
                        return Ok(AssignPlan::JsonField {
                            var: a,
                            path: vec![b, c],
                        });
                    }
                }
                if a == self.ctx.current_schema
                    && self
                        .ctx
                        .catalog
                        .package_variable_type(&a, &b, &c)
                        .is_some()
                {
                    return Ok(AssignPlan::PackageSet {
                        schema: a,
                        pkg: b,
                        var: c,
                    });
                }
                Ok(AssignPlan::Plain(chain.joined()))
            }
            _ => Ok(AssignPlan::Plain(chain.joined())),
        }
    }

    fn emit_indexed_assign(
        &mut self,
        base: &IdentChain,
        index: &Expr,
        value: &Expr,
        pad: &str,
    ) -> Result<String, Diagnostics> {
        let name = base.first();
        let Some(def) = self
            .ctx
            .lookup_variable(&name)
            .and_then(|v| v.inline.clone())
        else {
            return Err(Diagnostics::new(
                DiagnosticKind::UnresolvedIdentifier,
                format!("'{name}' is not a collection variable"),
                base.pos,
            )
            .with_object(name));
        };
        let value_sql = self.jsonb_value(value)?;
        if def.is_map() {
            let path = match index {
                Expr::StringLit(key) => format!("'{{{key}}}'"),
                other => {
                    let key = self.expr(other)?;
                    format!("('{{' || ({key})::text || '}}')::text[]")
                }
            };
            return Ok(format!(
                "{pad}{name} := jsonb_set({name}, {path}, {value_sql});\n"
            ));
        }
        let index_sql = self.expr(index)?;
        let path = element_path(&index_sql, index);
        Ok(format!(
            "{pad}{name} := jsonb_set({name}, {path}, {value_sql});\n"
        ))
    }

    // --- calls as statements ---

    fn emit_call(
        &mut self,
        call: &CallExpr,
        pos: Pos,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);

        // RAISE_APPLICATION_ERROR(code, message)
        if call.name.len() == 1 && call.name.first() == "raise_application_error" {
            if call.args.len() != 2 {
                return Err(Diagnostics::new(
                    DiagnosticKind::ParseError,
                    "RAISE_APPLICATION_ERROR takes two arguments",
                    pos,
                ));
            }
            // RAISE_APPLICATION_ERROR codes are -20000..-20999 by contract;
            // anything else falls back to the generic user condition.
            let errcode = error_code_literal(&call.args[0].value)
                .and_then(sqlstate_for_user_range)
                .unwrap_or_else(|| "P0001".to_string());
            let message = self.expr(&call.args[1].value)?;
            return Ok(format!(
                "{pad}RAISE EXCEPTION USING ERRCODE = '{errcode}', MESSAGE = {message};\n"
            ));
        }

        // DBMS_OUTPUT
        if call.name.len() == 2 && call.name.first() == "dbms_output" {
            match call.name.last().as_str() {
                "put_line" | "put" => {
                    let arg = match call.args.first() {
                        Some(arg) => self.expr(&arg.value)?,
                        None => "''".to_string(),
                    };
                    return Ok(format!("{pad}RAISE NOTICE '%', {arg};\n"));
                }
                _ => {
                    self.warn("DBMS_OUTPUT control call dropped", pos.line);
                    return Ok(format!("{pad}NULL; -- dbms_output\n"));
                }
            }
        }

        // Collection mutation pseudo-methods.
        if call.name.len() == 2 {
            let head = call.name.first();
            if let Some(def) = self
                .ctx
                .lookup_variable(&head)
                .and_then(|v| v.inline.clone())
            {
                if call.name.last() == "delete" && call.args.is_empty() {
                    return Ok(format!(
                        "{pad}{head} := {};\n",
                        def.empty_literal()
                    ));
                }
            }
        }

        let sql = self.call(call)?;
        Ok(format!("{pad}PERFORM {sql};\n"))
    }

    fn emit_raise(
        &mut self,
        exception: Option<&IdentChain>,
        pad: &str,
    ) -> Result<String, Diagnostics> {
        let Some(chain) = exception else {
            return Ok(format!("{pad}RAISE;\n"));
        };
        let name = chain.last();
        if let Some(code) = self.user_exceptions.get(&name) {
            return Ok(format!("{pad}RAISE SQLSTATE '{code}';\n"));
        }
        if let Some(condition) = oracle_condition(&name) {
            return Ok(format!("{pad}RAISE {condition};\n"));
        }
        Ok(format!(
            "{pad}RAISE EXCEPTION '{}';\n",
            name.replace('\'', "''")
        ))
    }

    fn emit_handler(
        &mut self,
        handler: &ExceptionHandler,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        let pad = "  ".repeat(indent);
        let when = if handler.is_others {
            "OTHERS".to_string()
        } else {
            handler
                .names
                .iter()
                .map(|chain| {
                    let name = chain.last();
                    if let Some(code) = self.user_exceptions.get(&name) {
                        format!("SQLSTATE '{code}'")
                    } else if let Some(condition) = oracle_condition(&name) {
                        condition.to_string()
                    } else {
                        name.to_uppercase()
                    }
                })
                .collect::<Vec<_>>()
                .join(" OR ")
        };
        let mut sql = format!("{pad}WHEN {when} THEN\n");
        sql.push_str(&self.emit_statements(&handler.statements, indent + 1)?);
        Ok(sql)
    }

    pub(super) fn into_targets_sql(&mut self, targets: &[Target]) -> Result<String, Diagnostics> {
        let mut out = Vec::new();
        for target in targets {
            match target {
                Target::Name(chain) => out.push(chain.joined()),
                Target::Bind { target, field, .. } => {
                    let row = match target {
                        BindTarget::New => "NEW",
                        BindTarget::Old => "OLD",
                    };
                    out.push(format!("{row}.{field}"));
                }
                Target::Index { base, .. } => {
                    return Err(Diagnostics::new(
                        DiagnosticKind::UnsupportedFeature,
                        "collection element as an INTO target",
                        base.pos,
                    ));
                }
            }
        }
        Ok(out.join(", "))
    }
}

/// Integer literal (possibly negated) of a RAISE_APPLICATION_ERROR code.
fn error_code_literal(e: &Expr) -> Option<i64> {
    match e {
        Expr::Number(n) => n.parse().ok(),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => match &**expr {
            Expr::Number(n) => n.parse::<i64>().ok().map(|v| -v),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_codes_map_into_the_p_class() {
        assert_eq!(sqlstate_for_user_range(-20001).as_deref(), Some("P0001"));
        assert_eq!(sqlstate_for_user_range(-20999).as_deref(), Some("P0999"));
    }

    #[test]
    fn out_of_range_codes_have_no_fixed_window() {
        // -1 must not alias -20001, nor -30000 alias -20000; those get
        // allocated states instead.
        assert_eq!(sqlstate_for_user_range(-1), None);
        assert_eq!(sqlstate_for_user_range(-942), None);
        assert_eq!(sqlstate_for_user_range(-30000), None);
    }

    #[test]
    fn predefined_exception_table_covers_the_common_ones() {
        assert_eq!(oracle_condition("no_data_found"), Some("NO_DATA_FOUND"));
        assert_eq!(oracle_condition("dup_val_on_index"), Some("UNIQUE_VIOLATION"));
        assert_eq!(oracle_condition("zero_divide"), Some("DIVISION_BY_ZERO"));
        assert_eq!(oracle_condition("made_up"), None);
    }

    #[test]
    fn negative_error_code_literals_fold() {
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::Number("20404".to_string())),
        };
        assert_eq!(error_code_literal(&neg), Some(-20404));
    }
}
