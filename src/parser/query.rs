//! SELECT parsing
//!
//! Query blocks, WITH lists, set operations, FROM (comma lists and ANSI
//! joins), and the Oracle hierarchical clauses. `SELECT ... INTO` is only
//! legal on the outermost block of a PL/SQL query statement, so the INTO list
//! is captured there and nowhere else.

use super::Parser;
use crate::diagnostics::SyntaxError;
use crate::lexer::TokenKind;
use crate::parser::ast::*;

/// Keywords that terminate a table alias position. An identifier in alias
/// position that matches one of these is a clause keyword, not an alias.
const ALIAS_STOPWORDS: [&str; 22] = [
    "where", "group", "having", "order", "connect", "start", "union", "minus", "intersect", "on",
    "join", "inner", "left", "right", "full", "cross", "when", "into", "from", "set", "for",
    "loop",
];

impl Parser {
    /// A full SELECT statement: WITH list, set-operation body, ORDER BY.
    pub(crate) fn select_statement(&mut self) -> Result<Select, SyntaxError> {
        let with = if self.at_kw("with") {
            self.bump();
            self.cte_list()?
        } else {
            Vec::new()
        };

        let body = self.query_expr()?;

        let order_by = if self.at_kws("order", "by") {
            self.bump();
            self.bump();
            self.order_items()?
        } else {
            Vec::new()
        };

        Ok(Select {
            with,
            body,
            order_by,
        })
    }

    /// `SELECT ... INTO ...` for PL/SQL. The INTO list is captured from the
    /// outermost query block only.
    pub(super) fn select_into_statement(&mut self) -> Result<(Select, Vec<Target>), SyntaxError> {
        let with = if self.at_kw("with") {
            self.bump();
            self.cte_list()?
        } else {
            Vec::new()
        };

        let (block, into) = self.query_block(true)?;
        let mut body = QueryExpr::Block(Box::new(block));
        while let Some(op) = self.peek_set_op() {
            self.consume_set_op(op);
            let (right, _) = self.query_block(false)?;
            body = QueryExpr::Compound {
                op,
                left: Box::new(body),
                right: Box::new(QueryExpr::Block(Box::new(right))),
            };
        }

        let order_by = if self.at_kws("order", "by") {
            self.bump();
            self.bump();
            self.order_items()?
        } else {
            Vec::new()
        };

        Ok((
            Select {
                with,
                body,
                order_by,
            },
            into,
        ))
    }

    fn cte_list(&mut self) -> Result<Vec<Cte>, SyntaxError> {
        let mut ctes = Vec::new();
        loop {
            let name = self.expect_ident("CTE name")?.text.to_lowercase();
            let mut columns = Vec::new();
            if self.eat(TokenKind::LParen) {
                loop {
                    columns.push(self.expect_ident("column name")?.text.to_lowercase());
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
            }
            self.expect_kw("as")?;
            self.expect(TokenKind::LParen, "'('")?;
            let query = self.select_statement()?;
            self.expect(TokenKind::RParen, "')'")?;
            ctes.push(Cte {
                name,
                columns,
                query,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(ctes)
    }

    fn query_expr(&mut self) -> Result<QueryExpr, SyntaxError> {
        let (block, _) = self.query_block(false)?;
        let mut left = QueryExpr::Block(Box::new(block));
        while let Some(op) = self.peek_set_op() {
            self.consume_set_op(op);
            let (right, _) = self.query_block(false)?;
            left = QueryExpr::Compound {
                op,
                left: Box::new(left),
                right: Box::new(QueryExpr::Block(Box::new(right))),
            };
        }
        Ok(left)
    }

    fn peek_set_op(&self) -> Option<SetOp> {
        if self.at_kw("union") {
            if self.peek_at(1).is_kw("all") {
                Some(SetOp::UnionAll)
            } else {
                Some(SetOp::Union)
            }
        } else if self.at_kw("minus") {
            Some(SetOp::Minus)
        } else if self.at_kw("intersect") {
            Some(SetOp::Intersect)
        } else {
            None
        }
    }

    fn consume_set_op(&mut self, op: SetOp) {
        self.bump();
        if op == SetOp::UnionAll {
            self.bump();
        }
    }

    fn query_block(&mut self, allow_into: bool) -> Result<(QueryBlock, Vec<Target>), SyntaxError> {
        self.expect_kw("select")?;
        let distinct = if self.eat_kw("distinct") || self.eat_kw("unique") {
            true
        } else {
            self.eat_kw("all");
            false
        };

        let mut items = vec![self.select_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.select_item()?);
        }

        let mut into = Vec::new();
        if allow_into && self.eat_kw("into") {
            loop {
                into.push(self.into_target()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut from = Vec::new();
        if self.eat_kw("from") {
            from.push(self.table_ref()?);
            while self.eat(TokenKind::Comma) {
                from.push(self.table_ref()?);
            }
        }

        let mut where_clause = None;
        if self.eat_kw("where") {
            where_clause = Some(self.expr()?);
        }

        // START WITH and CONNECT BY accept either order.
        let mut start_with = None;
        let mut connect_by = None;
        for _ in 0..2 {
            if start_with.is_none() && self.at_kws("start", "with") {
                self.bump();
                self.bump();
                start_with = Some(self.expr()?);
            } else if connect_by.is_none() && self.at_kws("connect", "by") {
                self.bump();
                self.bump();
                let nocycle = self.eat_kw("nocycle");
                let condition = self.expr()?;
                connect_by = Some(ConnectBy { nocycle, condition });
            }
        }

        let mut group_by = Vec::new();
        if self.at_kws("group", "by") {
            self.bump();
            self.bump();
            group_by.push(self.expr()?);
            while self.eat(TokenKind::Comma) {
                group_by.push(self.expr()?);
            }
        }

        let mut having = None;
        if self.eat_kw("having") {
            having = Some(self.expr()?);
        }

        Ok((
            QueryBlock {
                distinct,
                items,
                from,
                where_clause,
                start_with,
                connect_by,
                group_by,
                having,
            },
            into,
        ))
    }

    fn select_item(&mut self) -> Result<SelectItem, SyntaxError> {
        if self.at(TokenKind::Star) {
            self.bump();
            return Ok(SelectItem {
                expr: Expr::Star,
                alias: None,
            });
        }
        // `alias.*`
        if (self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent))
            && self.peek_at(1).kind == TokenKind::Dot
            && self.peek_at(2).kind == TokenKind::Star
        {
            let chain = self.ident_chain()?;
            self.expect(TokenKind::Dot, "'.'")?;
            self.expect(TokenKind::Star, "'*'")?;
            return Ok(SelectItem {
                expr: Expr::QualifiedStar(chain),
                alias: None,
            });
        }

        let expr = self.expr()?;
        let alias = self.optional_alias()?;
        Ok(SelectItem { expr, alias })
    }

    /// `[AS] alias`, rejecting clause keywords in alias position.
    fn optional_alias(&mut self) -> Result<Option<String>, SyntaxError> {
        if self.eat_kw("as") {
            let token = self.expect_ident("alias")?;
            return Ok(Some(token.text.to_lowercase()));
        }
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            let text = &self.peek().text;
            if self.at(TokenKind::Ident)
                && ALIAS_STOPWORDS
                    .iter()
                    .any(|kw| text.eq_ignore_ascii_case(kw))
            {
                return Ok(None);
            }
            return Ok(Some(self.bump().text.to_lowercase()));
        }
        Ok(None)
    }

    fn table_ref(&mut self) -> Result<TableRef, SyntaxError> {
        let mut left = self.primary_table()?;
        loop {
            let kind = if self.at_kw("join") || self.at_kws("inner", "join") {
                self.eat_kw("inner");
                JoinKind::Inner
            } else if self.at_kw("left") {
                self.bump();
                self.eat_kw("outer");
                JoinKind::Left
            } else if self.at_kw("right") {
                self.bump();
                self.eat_kw("outer");
                JoinKind::Right
            } else if self.at_kw("full") {
                self.bump();
                self.eat_kw("outer");
                JoinKind::Full
            } else if self.at_kws("cross", "join") {
                self.bump();
                JoinKind::Cross
            } else {
                break;
            };
            self.expect_kw("join")?;
            let right = self.primary_table()?;
            let on = if kind != JoinKind::Cross {
                self.expect_kw("on")?;
                Some(self.expr()?)
            } else {
                None
            };
            left = TableRef::Join {
                left: Box::new(left),
                kind,
                right: Box::new(right),
                on,
            };
        }
        Ok(left)
    }

    fn primary_table(&mut self) -> Result<TableRef, SyntaxError> {
        if self.at(TokenKind::LParen) {
            self.bump();
            let query = self.select_statement()?;
            self.expect(TokenKind::RParen, "')'")?;
            let alias = self.optional_alias()?;
            return Ok(TableRef::Subquery {
                query: Box::new(query),
                alias,
            });
        }
        let name = self.ident_chain()?;
        let alias = self.optional_alias()?;
        Ok(TableRef::Table { name, alias })
    }

    /// An INTO / FETCH INTO / assignment target.
    pub(super) fn into_target(&mut self) -> Result<Target, SyntaxError> {
        let base = self.ident_chain()?;
        if self.eat(TokenKind::LParen) {
            let index = self.expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Target::Index { base, index });
        }
        Ok(Target::Name(base))
    }
}
