//! Parser facade
//!
//! Accepts a source string and a [`TranslationKind`] and returns either a
//! [`ParsedUnit`] or the list of syntax errors. The parser is a hand-written
//! recursive-descent over the Oracle subset the transpiler understands; it is
//! constructed per call and dropped on return, so no parse-time state (and in
//! particular no prediction cache) survives a parse.

pub mod ast;
mod expr;
mod plsql;
mod query;


use crate::diagnostics::{Pos, SyntaxError};
use crate::lexer::{self, Token, TokenKind};
use ast::ParsedUnit;
use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The kind of source unit being parsed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TranslationKind {
    /// The defining SELECT of a view (no CREATE VIEW wrapper).
    ViewSelect,
    Function,
    Procedure,
    PackageSpec,
    PackageBody,
    TriggerBody,
    TypeBody,
}

/// Parse `source` as a unit of the given kind.
pub fn parse(source: &str, kind: TranslationKind) -> Result<ParsedUnit, Vec<SyntaxError>> {
    let tokens = lexer::tokenize(source).map_err(|e| vec![e])?;
    let mut parser = Parser::new(tokens);
    let result = match kind {
        TranslationKind::ViewSelect => parser.select_statement().map(ParsedUnit::View),
        TranslationKind::Function => parser.function_unit(true).map(ParsedUnit::Function),
        TranslationKind::Procedure => parser.function_unit(false).map(ParsedUnit::Procedure),
        TranslationKind::PackageSpec => parser.package_spec().map(ParsedUnit::PackageSpec),
        TranslationKind::PackageBody => parser.package_body().map(ParsedUnit::PackageBody),
        TranslationKind::TriggerBody => parser.trigger_body().map(ParsedUnit::TriggerBody),
        TranslationKind::TypeBody => parser.type_body().map(ParsedUnit::TypeBody),
    };
    match result {
        Ok(unit) => {
            if let Err(e) = parser.expect_end_of_unit() {
                return Err(vec![e]);
            }
            Ok(unit)
        }
        Err(e) => Err(vec![e]),
    }
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, idx: 0 }
    }

    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.idx]
    }

    pub(super) fn peek_at(&self, ahead: usize) -> &Token {
        let i = (self.idx + ahead).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    pub(super) fn pos(&self) -> Pos {
        self.peek().pos
    }

    pub(super) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(super) fn at_kw(&self, kw: &str) -> bool {
        self.peek().is_kw(kw)
    }

    /// True if the current and next tokens are the given keywords.
    pub(super) fn at_kws(&self, first: &str, second: &str) -> bool {
        self.at_kw(first) && self.peek_at(1).is_kw(second)
    }

    pub(super) fn bump(&mut self) -> Token {
        let token = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    pub(super) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(super) fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    pub(super) fn expect_kw(&mut self, kw: &str) -> Result<(), SyntaxError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}", kw.to_uppercase())))
        }
    }

    pub(super) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let token = self.peek();
        let mut message = message.into();
        if token.kind == TokenKind::Eof {
            message.push_str(", found end of input");
        } else {
            message.push_str(&format!(", found '{}'", token.text));
        }
        SyntaxError::new(message, token.pos)
    }

    /// An identifier token (quoted or not), consumed.
    pub(super) fn expect_ident(&mut self, what: &str) -> Result<Token, SyntaxError> {
        if self.at(TokenKind::Ident) || self.at(TokenKind::QuotedIdent) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    /// After the unit, only a trailing `;` or `/` line is allowed.
    pub(crate) fn expect_end_of_unit(&mut self) -> Result<(), SyntaxError> {
        self.eat(TokenKind::Semi);
        self.eat(TokenKind::Slash);
        if self.at(TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here("expected end of input"))
        }
    }
}
