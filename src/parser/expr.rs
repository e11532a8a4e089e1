//! Expression parsing
//!
//! Precedence climbing: OR < AND < NOT < predicates < additive/concat <
//! multiplicative < unary < postfix. `PRIOR` is a unary prefix; `(+)` and
//! cursor attributes are postfixes on primaries.

use super::Parser;
use crate::diagnostics::SyntaxError;
use crate::lexer::TokenKind;
use crate::parser::ast::*;

const CURSOR_ATTRS: [(&str, CursorAttr); 4] = [
    ("found", CursorAttr::Found),
    ("notfound", CursorAttr::NotFound),
    ("rowcount", CursorAttr::RowCount),
    ("isopen", CursorAttr::IsOpen),
];

impl Parser {
    pub(crate) fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_expr()?;
        while self.eat_kw("or") {
            let right = self.and_expr()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.not_expr()?;
        while self.eat_kw("and") {
            let right = self.not_expr()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_kw("not") {
            let inner = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(inner),
            });
        }
        self.predicate()
    }

    /// A comparison or SQL predicate over additive operands.
    fn predicate(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.additive()?;

        let cmp = match self.peek().kind {
            TokenKind::Eq => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            _ => None,
        };
        if let Some(op) = cmp {
            self.bump();
            let right = self.additive()?;
            return Ok(Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        if self.at_kw("is") {
            self.bump();
            let negated = self.eat_kw("not");
            self.expect_kw("null")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = if self.at_kw("not")
            && (self.peek_at(1).is_kw("in")
                || self.peek_at(1).is_kw("between")
                || self.peek_at(1).is_kw("like"))
        {
            self.bump();
            true
        } else {
            false
        };

        if self.eat_kw("in") {
            self.expect(TokenKind::LParen, "'('")?;
            if self.at_kw("select") || self.at_kw("with") {
                let query = self.select_statement()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::InSubquery {
                    expr: Box::new(left),
                    query: Box::new(query),
                    negated,
                });
            }
            let mut items = vec![self.expr()?];
            while self.eat(TokenKind::Comma) {
                items.push(self.expr()?);
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                items,
                negated,
            });
        }

        if self.eat_kw("between") {
            let low = self.additive()?;
            self.expect_kw("and")?;
            let high = self.additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }

        if self.eat_kw("like") {
            let pattern = self.additive()?;
            let escape = if self.eat_kw("escape") {
                Some(Box::new(self.additive()?))
            } else {
                None
            };
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                escape,
                negated,
            });
        }

        if negated {
            return Err(self.error_here("expected IN, BETWEEN or LIKE after NOT"));
        }
        Ok(left)
    }

    pub(super) fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::Concat => BinOp::Concat,
                _ => break,
            };
            self.bump();
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.bump();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat(TokenKind::Minus) {
            let inner = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(inner),
            });
        }
        if self.eat(TokenKind::Plus) {
            let inner = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(inner),
            });
        }
        if self.at_kw("prior") {
            self.bump();
            let inner = self.unary()?;
            return Ok(Expr::Prior(Box::new(inner)));
        }
        let mut expr = self.primary()?;
        // `(+)` marks the preceding column reference as outer-joined.
        if self.eat(TokenKind::OuterJoin) {
            expr = Expr::OuterJoined(Box::new(expr));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let pos = self.pos();

        if self.at_kw("null") {
            self.bump();
            return Ok(Expr::Null);
        }
        if self.at_kw("true") {
            self.bump();
            return Ok(Expr::True);
        }
        if self.at_kw("false") {
            self.bump();
            return Ok(Expr::False);
        }
        if self.at(TokenKind::Number) {
            return Ok(Expr::Number(self.bump().text));
        }
        if self.at(TokenKind::String) {
            return Ok(Expr::StringLit(self.bump().text));
        }
        if self.at(TokenKind::Star) {
            self.bump();
            return Ok(Expr::Star);
        }
        if self.at_kw("case") {
            return self.case_expr();
        }
        if self.at_kw("cast") {
            self.bump();
            self.expect(TokenKind::LParen, "'('")?;
            let inner = self.expr()?;
            self.expect_kw("as")?;
            let ty = self.data_type()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Cast {
                expr: Box::new(inner),
                ty,
            });
        }
        if self.at_kw("exists") {
            self.bump();
            self.expect(TokenKind::LParen, "'('")?;
            let query = self.select_statement()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Exists(Box::new(query)));
        }
        if self.at(TokenKind::LParen) {
            self.bump();
            if self.at_kw("select") || self.at_kw("with") {
                let query = self.select_statement()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::Subquery(Box::new(query)));
            }
            let inner = self.expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Paren(Box::new(inner)));
        }
        if self.at(TokenKind::Colon) {
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
            let field = self.expect_ident("column name")?;
            return Ok(Expr::Bind {
                target,
                field: field.text.to_lowercase(),
                pos,
            });
        }

        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            // Standalone pseudo-columns; `x.rownum` stays an ordinary chain.
            if self.at_kw("rownum") && self.peek_at(1).kind != TokenKind::Dot {
                self.bump();
                return Ok(Expr::Rownum(pos));
            }
            if self.at_kw("level")
                && self.peek_at(1).kind != TokenKind::Dot
                && self.peek_at(1).kind != TokenKind::LParen
            {
                self.bump();
                return Ok(Expr::Level(pos));
            }
            let chain = self.ident_chain()?;

            if self.at(TokenKind::LParen) {
                return self.call_expr(chain, pos);
            }

            if self.at(TokenKind::Percent) {
                if let Some(attr) = self.peek_cursor_attr() {
                    self.bump(); // %
                    self.bump(); // attribute
                    let cursor = if chain.len() == 1 && chain.first() == "sql" {
                        None
                    } else {
                        Some(chain.joined())
                    };
                    return Ok(Expr::CursorAttr { cursor, attr, pos });
                }
                return Err(self.error_here("expected cursor attribute after '%'"));
            }

            return Ok(Expr::Ident(chain));
        }

        Err(self.error_here("expected expression"))
    }

    fn peek_cursor_attr(&self) -> Option<CursorAttr> {
        if !self.at(TokenKind::Percent) {
            return None;
        }
        let next = self.peek_at(1);
        CURSOR_ATTRS
            .iter()
            .find(|(kw, _)| next.is_kw(kw))
            .map(|(_, attr)| *attr)
    }

    pub(super) fn ident_chain(&mut self) -> Result<IdentChain, SyntaxError> {
        let pos = self.pos();
        let mut parts = Vec::new();
        loop {
            let token = self.expect_ident("identifier")?;
            parts.push(IdentPart {
                name: token.text,
                quoted: token.kind == TokenKind::QuotedIdent,
            });
            // `.delete`/`.count` collection methods are chain parts too; a
            // trailing `.*` belongs to the select-list parser.
            if self.at(TokenKind::Dot) && self.peek_at(1).kind != TokenKind::Star {
                self.bump();
            } else {
                break;
            }
        }
        Ok(IdentChain::new(parts, pos))
    }

    fn call_expr(&mut self, name: IdentChain, pos: crate::diagnostics::Pos) -> Result<Expr, SyntaxError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut distinct = false;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            if self.eat_kw("distinct") {
                distinct = true;
            }
            loop {
                args.push(self.call_arg()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let over = if self.at_kw("over") {
            self.bump();
            Some(self.over_clause()?)
        } else {
            None
        };

        Ok(Expr::Call(CallExpr {
            name,
            args,
            distinct,
            over,
            pos,
        }))
    }

    fn call_arg(&mut self) -> Result<Arg, SyntaxError> {
        if (self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent))
            && self.peek_at(1).kind == TokenKind::Arrow
        {
            let name = self.bump().text.to_lowercase();
            self.bump(); // =>
            let value = self.expr()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg::positional(self.expr()?))
    }

    fn over_clause(&mut self) -> Result<OverClause, SyntaxError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut partition_by = Vec::new();
        let mut order_by = Vec::new();
        if self.at_kws("partition", "by") {
            self.bump();
            self.bump();
            partition_by.push(self.expr()?);
            while self.eat(TokenKind::Comma) {
                partition_by.push(self.expr()?);
            }
        }
        if self.at_kws("order", "by") {
            self.bump();
            self.bump();
            order_by = self.order_items()?;
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(OverClause {
            partition_by,
            order_by,
        })
    }

    pub(super) fn order_items(&mut self) -> Result<Vec<OrderItem>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let desc = if self.eat_kw("desc") {
                true
            } else {
                self.eat_kw("asc");
                false
            };
            let nulls_first = if self.eat_kw("nulls") {
                if self.eat_kw("first") {
                    Some(true)
                } else {
                    self.expect_kw("last")?;
                    Some(false)
                }
            } else {
                None
            };
            items.push(OrderItem {
                expr,
                desc,
                nulls_first,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn case_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.expect_kw("case")?;
        let operand = if self.at_kw("when") {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        let mut arms = Vec::new();
        while self.eat_kw("when") {
            let cond = self.expr()?;
            self.expect_kw("then")?;
            let value = self.expr()?;
            arms.push((cond, value));
        }
        if arms.is_empty() {
            return Err(self.error_here("expected WHEN in CASE expression"));
        }
        let else_expr = if self.eat_kw("else") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_kw("end")?;
        Ok(Expr::Case(CaseExpr {
            operand,
            arms,
            else_expr,
        }))
    }
}
