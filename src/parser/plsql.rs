//! PL/SQL parsing
//!
//! Declarations, statements, blocks, and the program units (standalone
//! subprograms, package spec/body, trigger body, type body). Statement lists
//! run until one of the closing keywords (`END`, `ELSIF`, `ELSE`,
//! `EXCEPTION`, `WHEN`) so every caller can pick up its own terminator.

use super::Parser;
use crate::diagnostics::SyntaxError;
use crate::lexer::TokenKind;
use crate::parser::ast::*;

const SCALAR_TYPES: [&str; 28] = [
    "number",
    "varchar2",
    "varchar",
    "nvarchar2",
    "char",
    "nchar",
    "date",
    "timestamp",
    "clob",
    "nclob",
    "blob",
    "raw",
    "long",
    "boolean",
    "pls_integer",
    "binary_integer",
    "integer",
    "int",
    "smallint",
    "float",
    "real",
    "binary_float",
    "binary_double",
    "dec",
    "decimal",
    "numeric",
    "rowid",
    "sys_refcursor",
];

impl Parser {
    // --- types ---

    pub(super) fn data_type(&mut self) -> Result<DataType, SyntaxError> {
        let chain = self.ident_chain()?;

        if self.at(TokenKind::Percent) {
            let next = self.peek_at(1).clone();
            if next.is_kw("type") {
                self.bump();
                self.bump();
                return Ok(DataType::TypeOf(chain));
            }
            if next.is_kw("rowtype") {
                self.bump();
                self.bump();
                return Ok(DataType::RowOf(chain));
            }
            return Err(self.error_here("expected TYPE or ROWTYPE after '%'"));
        }

        if chain.len() == 1 {
            let name = chain.first();
            if SCALAR_TYPES.contains(&name.as_str()) {
                let precision = self.type_precision()?;
                if name == "timestamp" && self.eat_kw("with") {
                    self.eat_kw("local");
                    self.expect_kw("time")?;
                    self.expect_kw("zone")?;
                }
                return Ok(DataType::Scalar { name, precision });
            }
        }
        Ok(DataType::Named(chain))
    }

    fn type_precision(&mut self) -> Result<Option<(u64, Option<u64>)>, SyntaxError> {
        if !self.eat(TokenKind::LParen) {
            return Ok(None);
        }
        let first = self.expect(TokenKind::Number, "precision")?;
        let p: u64 = first
            .text
            .parse()
            .map_err(|_| SyntaxError::new("invalid precision", first.pos))?;
        // VARCHAR2(10 CHAR) / VARCHAR2(10 BYTE)
        if self.at_kw("char") || self.at_kw("byte") {
            self.bump();
        }
        let s = if self.eat(TokenKind::Comma) {
            let second = self.expect(TokenKind::Number, "scale")?;
            Some(
                second
                    .text
                    .parse()
                    .map_err(|_| SyntaxError::new("invalid scale", second.pos))?,
            )
        } else {
            None
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Some((p, s)))
    }

    // --- declarations ---

    /// Parse the declaration section of a block, stopping at BEGIN or END.
    pub(super) fn declarations(&mut self) -> Result<Vec<Declaration>, SyntaxError> {
        let mut decls = Vec::new();
        while !self.at_kw("begin") && !self.at_kw("end") && !self.at(TokenKind::Eof) {
            decls.push(self.declaration()?);
        }
        Ok(decls)
    }

    fn declaration(&mut self) -> Result<Declaration, SyntaxError> {
        let pos = self.pos();

        if self.at_kw("type") {
            return self.type_declaration().map(Declaration::Type);
        }
        if self.at_kw("cursor") {
            self.bump();
            let name = self.expect_ident("cursor name")?.text.to_lowercase();
            self.expect_kw("is")?;
            let query = self.select_statement()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(Declaration::Cursor { name, query, pos });
        }
        if self.at_kw("pragma") {
            self.bump();
            let name = self.expect_ident("pragma name")?.text.to_lowercase();
            if name == "exception_init" {
                self.expect(TokenKind::LParen, "'('")?;
                let exc = self.expect_ident("exception name")?.text.to_lowercase();
                self.expect(TokenKind::Comma, "','")?;
                let negative = self.eat(TokenKind::Minus);
                let num = self.expect(TokenKind::Number, "error code")?;
                let mut code: i64 = num
                    .text
                    .parse()
                    .map_err(|_| SyntaxError::new("invalid error code", num.pos))?;
                if negative {
                    code = -code;
                }
                self.expect(TokenKind::RParen, "')'")?;
                self.expect(TokenKind::Semi, "';'")?;
                return Ok(Declaration::PragmaExceptionInit {
                    name: exc,
                    code,
                    pos,
                });
            }
            // Other pragmas have no arguments we care about.
            if self.eat(TokenKind::LParen) {
                let mut depth = 1usize;
                while depth > 0 {
                    match self.peek().kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => depth -= 1,
                        TokenKind::Eof => return Err(self.error_here("expected ')'")),
                        _ => {}
                    }
                    self.bump();
                }
            }
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(Declaration::Pragma { name, pos });
        }
        if self.at_kw("function") || self.at_kw("procedure") {
            let def = self.subprogram_def()?;
            return Ok(Declaration::Subprogram {
                name: def.name.last(),
                pos,
            });
        }

        let name = self.expect_ident("declaration name")?.text.to_lowercase();

        if self.at_kw("exception") {
            self.bump();
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(Declaration::Exception { name, pos });
        }

        let constant = self.eat_kw("constant");
        let data_type = self.data_type()?;
        let not_null = if self.eat_kw("not") {
            self.expect_kw("null")?;
            true
        } else {
            false
        };
        let default = if self.eat(TokenKind::Assign) || self.eat_kw("default") {
            Some(self.expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Declaration::Variable(VarDecl {
            name,
            data_type,
            constant,
            not_null,
            default,
            pos,
        }))
    }

    pub(super) fn type_declaration(&mut self) -> Result<TypeDecl, SyntaxError> {
        let pos = self.pos();
        self.expect_kw("type")?;
        let name = self.expect_ident("type name")?.text.to_lowercase();
        self.expect_kw("is")?;

        let kind = if self.eat_kw("record") {
            self.expect(TokenKind::LParen, "'('")?;
            let mut fields = Vec::new();
            loop {
                let field = self.expect_ident("field name")?.text.to_lowercase();
                let ty = self.data_type()?;
                // Field defaults are irrelevant to the jsonb encoding.
                if self.eat(TokenKind::Assign) || self.eat_kw("default") {
                    self.expr()?;
                }
                fields.push((field, ty));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            TypeDeclKind::Record { fields }
        } else if self.eat_kw("table") {
            self.expect_kw("of")?;
            let element = self.data_type()?;
            let index_by = if self.eat_kw("index") {
                self.expect_kw("by")?;
                Some(self.data_type()?)
            } else {
                None
            };
            TypeDeclKind::TableOf { element, index_by }
        } else if self.eat_kw("varray") || self.eat_kw("varying") {
            // VARRAY(n) or VARYING ARRAY(n)
            self.eat_kw("array");
            self.expect(TokenKind::LParen, "'('")?;
            let num = self.expect(TokenKind::Number, "varray limit")?;
            let limit: u64 = num
                .text
                .parse()
                .map_err(|_| SyntaxError::new("invalid varray limit", num.pos))?;
            self.expect(TokenKind::RParen, "')'")?;
            self.expect_kw("of")?;
            let element = self.data_type()?;
            TypeDeclKind::Varray { limit, element }
        } else if self.eat_kw("ref") {
            self.expect_kw("cursor")?;
            if self.eat_kw("return") {
                self.data_type()?;
            }
            TypeDeclKind::RefCursor
        } else {
            return Err(self.error_here("expected RECORD, TABLE, VARRAY or REF CURSOR"));
        };
        self.expect(TokenKind::Semi, "';'")?;
        Ok(TypeDecl { name, kind, pos })
    }

    // --- statements ---

    pub(super) fn statements(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            if self.at(TokenKind::Eof)
                || self.at_kw("end")
                || self.at_kw("elsif")
                || self.at_kw("else")
                || self.at_kw("exception")
                || self.at_kw("when")
            {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        let pos = self.pos();
        let kind = self.statement_kind()?;
        Ok(Stmt { pos, kind })
    }

    fn statement_kind(&mut self) -> Result<StmtKind, SyntaxError> {
        if self.at_kw("if") {
            return self.if_statement();
        }
        if self.at_kw("case") {
            return self.case_statement();
        }
        if self.at_kw("loop") {
            self.bump();
            let body = self.statements()?;
            self.expect_kw("end")?;
            self.expect_kw("loop")?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Loop { body });
        }
        if self.at_kw("while") {
            self.bump();
            let condition = self.expr()?;
            self.expect_kw("loop")?;
            let body = self.statements()?;
            self.expect_kw("end")?;
            self.expect_kw("loop")?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::While { condition, body });
        }
        if self.at_kw("for") {
            return self.for_statement();
        }
        if self.at_kw("exit") {
            self.bump();
            let when = if self.eat_kw("when") {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Exit { when });
        }
        if self.at_kw("continue") {
            self.bump();
            let when = if self.eat_kw("when") {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Continue { when });
        }
        if self.at_kw("return") {
            self.bump();
            let value = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Return { value });
        }
        if self.at_kw("null") {
            self.bump();
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Null);
        }
        if self.at_kw("raise") {
            self.bump();
            let exception = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.ident_chain()?)
            };
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Raise { exception });
        }
        if self.at_kw("open") {
            self.bump();
            let cursor = self.expect_ident("cursor name")?.text.to_lowercase();
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Open { cursor });
        }
        if self.at_kw("fetch") {
            self.bump();
            let cursor = self.expect_ident("cursor name")?.text.to_lowercase();
            self.expect_kw("into")?;
            let mut into = vec![self.into_target()?];
            while self.eat(TokenKind::Comma) {
                into.push(self.into_target()?);
            }
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Fetch { cursor, into });
        }
        if self.at_kw("close") {
            self.bump();
            let cursor = self.expect_ident("cursor name")?.text.to_lowercase();
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Close { cursor });
        }
        if self.at_kw("begin") || self.at_kw("declare") {
            let block = self.block()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Block(block));
        }
        if self.at_kw("commit") {
            self.bump();
            self.eat_kw("work");
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Commit);
        }
        if self.at_kw("rollback") {
            self.bump();
            self.eat_kw("work");
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Rollback);
        }
        if self.at_kws("execute", "immediate") {
            self.bump();
            self.bump();
            let sql = self.expr()?;
            // INTO / USING clauses are irrelevant once the statement is
            // rejected; consume them so parsing can continue.
            while !self.at(TokenKind::Semi) && !self.at(TokenKind::Eof) {
                self.bump();
            }
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::ExecuteImmediate { sql });
        }
        if self.at_kw("select") || self.at_kw("with") {
            let (query, into) = self.select_into_statement()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::SelectInto { query, into });
        }
        if self.at_kw("insert") {
            return self.insert_statement();
        }
        if self.at_kw("update") {
            return self.update_statement();
        }
        if self.at_kw("delete") {
            return self.delete_statement();
        }
        if self.at_kw("merge") {
            return Err(self.error_here("MERGE is not supported"));
        }
        if self.at(TokenKind::Colon) {
            // `:NEW.col := expr` in a trigger body.
            let pos = self.pos();
            self.bump();
            let name = self.expect_ident("NEW or OLD after ':'")?;
            let target = if name.is_kw("new") {
                BindTarget::New
            } else if name.is_kw("old") {
                BindTarget::Old
            } else {
                return Err(SyntaxError::new(
                    format!("unsupported bind variable ':{}'", name.text),
                    name.pos,
                ));
            };
            self.expect(TokenKind::Dot, "'.'")?;
            let field = self.expect_ident("column name")?.text.to_lowercase();
            self.expect(TokenKind::Assign, "':='")?;
            let value = self.expr()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Assign {
                target: Target::Bind { target, field, pos },
                value,
            });
        }

        self.assignment_or_call()
    }

    fn if_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.expect_kw("if")?;
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect_kw("then")?;
        arms.push((cond, self.statements()?));
        let mut else_branch = None;
        loop {
            if self.eat_kw("elsif") {
                let cond = self.expr()?;
                self.expect_kw("then")?;
                arms.push((cond, self.statements()?));
            } else if self.eat_kw("else") {
                else_branch = Some(self.statements()?);
                break;
            } else {
                break;
            }
        }
        self.expect_kw("end")?;
        self.expect_kw("if")?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(StmtKind::If { arms, else_branch })
    }

    fn case_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.expect_kw("case")?;
        let operand = if self.at_kw("when") {
            None
        } else {
            Some(self.expr()?)
        };
        let mut arms = Vec::new();
        while self.eat_kw("when") {
            let cond = self.expr()?;
            self.expect_kw("then")?;
            arms.push((cond, self.statements()?));
        }
        let else_branch = if self.eat_kw("else") {
            Some(self.statements()?)
        } else {
            None
        };
        self.expect_kw("end")?;
        self.expect_kw("case")?;
        self.expect(TokenKind::Semi, "';'")?;
        match operand {
            Some(operand) => Ok(StmtKind::CaseSimple {
                operand,
                arms,
                else_branch,
            }),
            None => Ok(StmtKind::CaseSearched { arms, else_branch }),
        }
    }

    fn for_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        self.expect_kw("for")?;
        let var = self.expect_ident("loop variable")?.text.to_lowercase();
        self.expect_kw("in")?;

        let reverse = self.eat_kw("reverse");

        // `FOR r IN (SELECT ...)` — inline cursor.
        if !reverse
            && self.at(TokenKind::LParen)
            && (self.peek_at(1).is_kw("select") || self.peek_at(1).is_kw("with"))
        {
            self.bump();
            let query = self.select_statement()?;
            self.expect(TokenKind::RParen, "')'")?;
            self.expect_kw("loop")?;
            let body = self.statements()?;
            self.expect_kw("end")?;
            self.expect_kw("loop")?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::ForCursor {
                var,
                source: CursorSource::Inline(Box::new(query)),
                body,
            });
        }

        let low = self.additive()?;
        if self.eat(TokenKind::DotDot) {
            let high = self.additive()?;
            self.expect_kw("loop")?;
            let body = self.statements()?;
            self.expect_kw("end")?;
            self.expect_kw("loop")?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::ForRange {
                var,
                reverse,
                low,
                high,
                body,
            });
        }

        // No range: the expression must be a plain cursor name.
        let cursor = match low {
            Expr::Ident(chain) if chain.len() == 1 => chain.first(),
            _ => return Err(self.error_here("expected '..' or cursor name in FOR loop")),
        };
        self.expect_kw("loop")?;
        let body = self.statements()?;
        self.expect_kw("end")?;
        self.expect_kw("loop")?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(StmtKind::ForCursor {
            var,
            source: CursorSource::Named(cursor),
            body,
        })
    }

    fn insert_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        let pos = self.pos();
        self.expect_kw("insert")?;
        if self.at_kw("all") || self.at_kw("first") {
            // Multi-table INSERT; recognized, rejected at translation.
            self.skip_to_semi()?;
            return Ok(StmtKind::Unsupported {
                feature: "multi-table INSERT".to_string(),
            });
        }
        self.expect_kw("into")?;
        let table = self.ident_chain()?;
        let mut columns = Vec::new();
        if self.at(TokenKind::LParen) && !self.peek_at(1).is_kw("select") {
            self.bump();
            loop {
                columns.push(self.expect_ident("column name")?.text.to_lowercase());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
        }

        let source = if self.eat_kw("values") {
            let mut rows = Vec::new();
            loop {
                self.expect(TokenKind::LParen, "'('")?;
                let mut row = vec![self.expr()?];
                while self.eat(TokenKind::Comma) {
                    row.push(self.expr()?);
                }
                self.expect(TokenKind::RParen, "')'")?;
                rows.push(row);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            InsertSource::Values(rows)
        } else {
            self.eat(TokenKind::LParen);
            let query = self.select_statement()?;
            self.eat(TokenKind::RParen);
            InsertSource::Query(Box::new(query))
        };

        let has_returning = self.returning_clause()?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(StmtKind::Insert(InsertStmt {
            table,
            columns,
            source,
            has_returning,
            pos,
        }))
    }

    fn update_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        let pos = self.pos();
        self.expect_kw("update")?;
        let table = self.ident_chain()?;
        let alias = self.dml_alias();
        self.expect_kw("set")?;
        let mut set = Vec::new();
        loop {
            let col = self.ident_chain()?;
            self.expect(TokenKind::Eq, "'='")?;
            let value = self.expr()?;
            set.push((col, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let where_clause = if self.eat_kw("where") {
            Some(self.expr()?)
        } else {
            None
        };
        let has_returning = self.returning_clause()?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(StmtKind::Update(UpdateStmt {
            table,
            alias,
            set,
            where_clause,
            has_returning,
            pos,
        }))
    }

    fn delete_statement(&mut self) -> Result<StmtKind, SyntaxError> {
        let pos = self.pos();
        self.expect_kw("delete")?;
        self.eat_kw("from");
        let table = self.ident_chain()?;
        let alias = self.dml_alias();
        let where_clause = if self.eat_kw("where") {
            Some(self.expr()?)
        } else {
            None
        };
        let has_returning = self.returning_clause()?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(StmtKind::Delete(DeleteStmt {
            table,
            alias,
            where_clause,
            has_returning,
            pos,
        }))
    }

    fn dml_alias(&mut self) -> Option<String> {
        if self.at(TokenKind::Ident)
            && !self.at_kw("set")
            && !self.at_kw("where")
            && !self.at_kw("returning")
        {
            Some(self.bump().text.to_lowercase())
        } else {
            None
        }
    }

    /// Consume a `RETURNING ... INTO ...` clause if present. The clause is a
    /// hard error downstream; only its presence matters.
    fn returning_clause(&mut self) -> Result<bool, SyntaxError> {
        if !self.at_kw("returning") {
            return Ok(false);
        }
        while !self.at(TokenKind::Semi) && !self.at(TokenKind::Eof) {
            self.bump();
        }
        Ok(true)
    }

    fn skip_to_semi(&mut self) -> Result<(), SyntaxError> {
        while !self.at(TokenKind::Semi) {
            if self.at(TokenKind::Eof) {
                return Err(self.error_here("expected ';'"));
            }
            self.bump();
        }
        self.bump();
        Ok(())
    }

    fn assignment_or_call(&mut self) -> Result<StmtKind, SyntaxError> {
        let chain = self.ident_chain()?;

        if self.at(TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            if !self.at(TokenKind::RParen) {
                loop {
                    args.push(self.argument()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;

            if self.at(TokenKind::Assign) {
                // `a(i) := e` — collection element assignment.
                self.bump();
                if args.len() != 1 || args[0].name.is_some() {
                    return Err(self.error_here("expected a single index expression"));
                }
                let index = args.remove(0).value;
                let value = self.expr()?;
                self.expect(TokenKind::Semi, "';'")?;
                return Ok(StmtKind::Assign {
                    target: Target::Index { base: chain, index },
                    value,
                });
            }

            self.expect(TokenKind::Semi, "';'")?;
            let pos = chain.pos;
            return Ok(StmtKind::Call(CallExpr {
                name: chain,
                args,
                distinct: false,
                over: None,
                pos,
            }));
        }

        if self.eat(TokenKind::Assign) {
            let value = self.expr()?;
            self.expect(TokenKind::Semi, "';'")?;
            return Ok(StmtKind::Assign {
                target: Target::Name(chain),
                value,
            });
        }

        // Parameterless procedure call without parentheses.
        self.expect(TokenKind::Semi, "';'")?;
        let pos = chain.pos;
        Ok(StmtKind::Call(CallExpr {
            name: chain,
            args: Vec::new(),
            distinct: false,
            over: None,
            pos,
        }))
    }

    fn argument(&mut self) -> Result<Arg, SyntaxError> {
        if (self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent))
            && self.peek_at(1).kind == TokenKind::Arrow
        {
            let name = self.bump().text.to_lowercase();
            self.bump();
            let value = self.expr()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg::positional(self.expr()?))
    }

    // --- blocks ---

    /// `[DECLARE decls] BEGIN stmts [EXCEPTION handlers] END [label]`.
    pub(super) fn block(&mut self) -> Result<Block, SyntaxError> {
        let declarations = if self.eat_kw("declare") {
            self.declarations()?
        } else {
            Vec::new()
        };
        self.expect_kw("begin")?;
        let statements = self.statements()?;
        let handlers = if self.eat_kw("exception") {
            self.exception_handlers()?
        } else {
            Vec::new()
        };
        self.expect_kw("end")?;
        // Optional end label.
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            self.bump();
        }
        Ok(Block {
            declarations,
            statements,
            handlers,
        })
    }

    fn exception_handlers(&mut self) -> Result<Vec<ExceptionHandler>, SyntaxError> {
        let mut handlers = Vec::new();
        while self.eat_kw("when") {
            if self.eat_kw("others") {
                self.expect_kw("then")?;
                let statements = self.statements()?;
                handlers.push(ExceptionHandler {
                    names: Vec::new(),
                    is_others: true,
                    statements,
                });
                continue;
            }
            let mut names = vec![self.ident_chain()?];
            while self.eat_kw("or") {
                names.push(self.ident_chain()?);
            }
            self.expect_kw("then")?;
            let statements = self.statements()?;
            handlers.push(ExceptionHandler {
                names,
                is_others: false,
                statements,
            });
        }
        Ok(handlers)
    }

    // --- program units ---

    /// Standalone function or procedure, with or without the
    /// `CREATE OR REPLACE` prefix.
    pub(super) fn function_unit(&mut self, is_function: bool) -> Result<FunctionDef, SyntaxError> {
        self.create_or_replace();
        self.subprogram_def_checked(is_function)
    }

    fn create_or_replace(&mut self) {
        if self.eat_kw("create") {
            if self.eat_kw("or") {
                self.eat_kw("replace");
            }
            self.eat_kw("editionable");
            self.eat_kw("noneditionable");
        }
    }

    fn subprogram_def_checked(&mut self, is_function: bool) -> Result<FunctionDef, SyntaxError> {
        let def = self.subprogram_def()?;
        if is_function && def.return_type.is_none() {
            return Err(SyntaxError::new("expected RETURN clause", def.pos));
        }
        if !is_function && def.return_type.is_some() {
            return Err(SyntaxError::new(
                "procedure cannot have a RETURN type",
                def.pos,
            ));
        }
        Ok(def)
    }

    /// `FUNCTION|PROCEDURE name [(params)] [RETURN type] IS|AS body END [name]`.
    pub(super) fn subprogram_def(&mut self) -> Result<FunctionDef, SyntaxError> {
        let pos = self.pos();
        let is_function = self.at_kw("function");
        if !self.eat_kw("function") && !self.eat_kw("procedure") {
            return Err(self.error_here("expected FUNCTION or PROCEDURE"));
        }
        let name = self.ident_chain()?;
        let params = self.param_list()?;
        let return_type = if is_function {
            self.expect_kw("return")?;
            if self.at_kws("self", "as") {
                // `RETURN SELF AS RESULT` on a constructor.
                self.bump();
                self.bump();
                self.expect_kw("result")?;
                Some(DataType::Named(IdentChain::simple("self", pos)))
            } else {
                Some(self.data_type()?)
            }
        } else {
            None
        };
        // DETERMINISTIC and friends carry no translation weight.
        loop {
            if self.eat_kw("deterministic")
                || self.eat_kw("parallel_enable")
                || self.eat_kw("result_cache")
            {
                continue;
            }
            break;
        }
        if !self.eat_kw("is") && !self.eat_kw("as") {
            return Err(self.error_here("expected IS or AS"));
        }
        let declarations = self.declarations()?;
        self.expect_kw("begin")?;
        let statements = self.statements()?;
        let handlers = if self.eat_kw("exception") {
            self.exception_handlers()?
        } else {
            Vec::new()
        };
        self.expect_kw("end")?;
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            self.bump();
        }
        self.expect(TokenKind::Semi, "';'")?;
        Ok(FunctionDef {
            name,
            params,
            return_type,
            block: Block {
                declarations,
                statements,
                handlers,
            },
            pos,
        })
    }

    fn param_list(&mut self) -> Result<Vec<Param>, SyntaxError> {
        let mut params = Vec::new();
        if !self.eat(TokenKind::LParen) {
            return Ok(params);
        }
        if self.eat(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.expect_ident("parameter name")?.text.to_lowercase();
            let mode = if self.eat_kw("in") {
                if self.eat_kw("out") {
                    ParamMode::InOut
                } else {
                    ParamMode::In
                }
            } else if self.eat_kw("out") {
                ParamMode::Out
            } else {
                ParamMode::In
            };
            self.eat_kw("nocopy");
            let data_type = self.data_type()?;
            let default = if self.eat(TokenKind::Assign) || self.eat_kw("default") {
                Some(self.expr()?)
            } else {
                None
            };
            params.push(Param {
                name,
                mode,
                data_type,
                default,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(params)
    }

    pub(super) fn package_spec(&mut self) -> Result<PackageSpec, SyntaxError> {
        self.create_or_replace();
        self.expect_kw("package")?;
        let name = self.ident_chain()?;
        if !self.eat_kw("is") && !self.eat_kw("as") {
            return Err(self.error_here("expected IS or AS"));
        }

        let mut variables = Vec::new();
        let mut types = Vec::new();
        let mut functions = Vec::new();
        let mut procedures = Vec::new();

        while !self.at_kw("end") && !self.at(TokenKind::Eof) {
            if self.at_kw("function") || self.at_kw("procedure") {
                let sig = self.subprogram_sig()?;
                if sig.return_type.is_some() {
                    functions.push(sig);
                } else {
                    procedures.push(sig);
                }
            } else if self.at_kw("type") {
                types.push(self.type_declaration()?);
            } else {
                match self.declaration()? {
                    Declaration::Variable(v) => variables.push(v),
                    // Cursors, pragmas and exceptions in a spec don't feed
                    // the session-state helpers.
                    _ => {}
                }
            }
        }
        self.expect_kw("end")?;
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            self.bump();
        }
        self.eat(TokenKind::Semi);
        Ok(PackageSpec {
            name,
            variables,
            types,
            functions,
            procedures,
        })
    }

    /// Subprogram signature without a body (spec entry): terminated by `;`.
    fn subprogram_sig(&mut self) -> Result<SubprogramSig, SyntaxError> {
        let pos = self.pos();
        let is_function = self.at_kw("function");
        self.bump();
        let name = self.expect_ident("subprogram name")?.text.to_lowercase();
        let params = self.param_list()?;
        let return_type = if is_function {
            self.expect_kw("return")?;
            Some(self.data_type()?)
        } else {
            None
        };
        self.eat_kw("deterministic");
        self.expect(TokenKind::Semi, "';'")?;
        Ok(SubprogramSig {
            name,
            params,
            return_type,
            pos,
        })
    }

    pub(super) fn package_body(&mut self) -> Result<PackageBody, SyntaxError> {
        self.create_or_replace();
        self.expect_kw("package")?;
        self.expect_kw("body")?;
        let name = self.ident_chain()?;
        if !self.eat_kw("is") && !self.eat_kw("as") {
            return Err(self.error_here("expected IS or AS"));
        }

        let mut variables = Vec::new();
        let mut types = Vec::new();
        let mut members = Vec::new();
        let mut initializer = None;

        loop {
            if self.at(TokenKind::Eof) || self.at_kw("end") {
                break;
            }
            if self.at_kw("begin") {
                self.bump();
                initializer = Some(self.statements()?);
                break;
            }
            if self.at_kw("function") || self.at_kw("procedure") {
                members.push(self.subprogram_def()?);
            } else if self.at_kw("type") {
                types.push(self.type_declaration()?);
            } else {
                match self.declaration()? {
                    Declaration::Variable(v) => variables.push(v),
                    _ => {}
                }
            }
        }
        self.expect_kw("end")?;
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            self.bump();
        }
        self.eat(TokenKind::Semi);
        Ok(PackageBody {
            name,
            variables,
            types,
            members,
            initializer,
        })
    }

    /// A trigger body is a bare PL/SQL block, with or without DECLARE.
    pub(super) fn trigger_body(&mut self) -> Result<Block, SyntaxError> {
        if self.at_kw("declare") || self.at_kw("begin") {
            let block = self.block()?;
            self.eat(TokenKind::Semi);
            return Ok(block);
        }
        Err(self.error_here("expected DECLARE or BEGIN"))
    }

    pub(super) fn type_body(&mut self) -> Result<TypeBody, SyntaxError> {
        self.create_or_replace();
        self.expect_kw("type")?;
        self.expect_kw("body")?;
        let name = self.ident_chain()?;
        if !self.eat_kw("is") && !self.eat_kw("as") {
            return Err(self.error_here("expected IS or AS"));
        }
        let mut members = Vec::new();
        while !self.at_kw("end") && !self.at(TokenKind::Eof) {
            self.eat_kw("overriding");
            self.eat_kw("member");
            if self.at_kw("constructor") {
                // Constructors materialize through the jsonb encoding, not
                // as translated members.
                self.bump();
                self.subprogram_def()?;
                continue;
            }
            members.push(self.subprogram_def()?);
        }
        self.expect_kw("end")?;
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            self.bump();
        }
        self.eat(TokenKind::Semi);
        Ok(TypeBody { name, members })
    }
}
