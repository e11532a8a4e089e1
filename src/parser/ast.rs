//! Oracle AST
//!
//! Tagged sums for expressions, queries, PL/SQL statements, and program
//! units. The translator owns all dialect knowledge; nodes here record what
//! the source said, including Oracle-only constructs (`(+)`, PRIOR, ROWNUM,
//! cursor attributes) that have no direct PostgreSQL form.

use crate::diagnostics::Pos;
use std::fmt;

// --- identifiers ---

/// One segment of a dotted name. Unquoted parts compare case-insensitively;
/// quoted parts preserve case exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentPart {
    pub name: String,
    pub quoted: bool,
}

impl IdentPart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: false,
        }
    }

    /// The catalog/emission form: lowercased unless quoted.
    pub fn normalized(&self) -> String {
        if self.quoted {
            self.name.clone()
        } else {
            self.name.to_lowercase()
        }
    }
}

/// A dotted identifier chain `a.b.c` with the source position of its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentChain {
    pub parts: Vec<IdentPart>,
    pub pos: Pos,
}

impl IdentChain {
    pub fn new(parts: Vec<IdentPart>, pos: Pos) -> Self {
        Self { parts, pos }
    }

    /// Single unquoted part, for synthesized names.
    pub fn simple(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            parts: vec![IdentPart::new(name)],
            pos,
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Normalized form of part `i`. Panics if out of range.
    pub fn part(&self, i: usize) -> String {
        self.parts[i].normalized()
    }

    pub fn first(&self) -> String {
        self.part(0)
    }

    pub fn last(&self) -> String {
        self.part(self.parts.len() - 1)
    }

    /// Dotted normalized form, e.g. `hr.emp`.
    pub fn joined(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.normalized())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for IdentChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

// --- expressions ---

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    True,
    False,
    /// Numeric literal, original text.
    Number(String),
    /// String literal, unescaped value.
    StringLit(String),
    Ident(IdentChain),
    /// Trigger correlation reference `:NEW.col` / `:OLD.col`.
    Bind {
        target: BindTarget,
        field: String,
        pos: Pos,
    },
    Call(CallExpr),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Case(CaseExpr),
    Cast {
        expr: Box<Expr>,
        ty: DataType,
    },
    Paren(Box<Expr>),
    Subquery(Box<Select>),
    Exists(Box<Select>),
    InList {
        expr: Box<Expr>,
        items: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<Select>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// `c%FOUND` etc.; `cursor` is `None` for the implicit `SQL%` cursor.
    CursorAttr {
        cursor: Option<String>,
        attr: CursorAttr,
        pos: Pos,
    },
    /// `expr(+)` — Oracle outer-join marker, consumed by the join rewriter.
    OuterJoined(Box<Expr>),
    /// `PRIOR expr` inside CONNECT BY.
    Prior(Box<Expr>),
    /// `*` in a select list or `COUNT(*)`.
    Star,
    /// `alias.*` in a select list.
    QualifiedStar(IdentChain),
    Rownum(Pos),
    Level(Pos),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget {
    New,
    Old,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorAttr {
    Found,
    NotFound,
    RowCount,
    IsOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub name: IdentChain,
    pub args: Vec<Arg>,
    /// `COUNT(DISTINCT x)`.
    pub distinct: bool,
    pub over: Option<OverClause>,
    pub pos: Pos,
}

/// A call argument, possibly named (`p => 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverClause {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub operand: Option<Box<Expr>>,
    pub arms: Vec<(Expr, Expr)>,
    pub else_expr: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

// --- queries ---

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub with: Vec<Cte>,
    pub body: QueryExpr,
    pub order_by: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Select,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Block(Box<QueryBlock>),
    Compound {
        op: SetOp,
        left: Box<QueryExpr>,
        right: Box<QueryExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBlock {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub start_with: Option<Expr>,
    pub connect_by: Option<ConnectBy>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectBy {
    pub nocycle: bool,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub desc: bool,
    pub nulls_first: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: IdentChain,
        alias: Option<String>,
    },
    Subquery {
        query: Box<Select>,
        alias: Option<String>,
    },
    Join {
        left: Box<TableRef>,
        kind: JoinKind,
        right: Box<TableRef>,
        on: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

// --- PL/SQL ---

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub declarations: Vec<Declaration>,
    pub statements: Vec<Stmt>,
    pub handlers: Vec<ExceptionHandler>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Variable(VarDecl),
    Cursor {
        name: String,
        query: Select,
        pos: Pos,
    },
    Type(TypeDecl),
    Exception {
        name: String,
        pos: Pos,
    },
    PragmaExceptionInit {
        name: String,
        code: i64,
        pos: Pos,
    },
    /// Any other PRAGMA (AUTONOMOUS_TRANSACTION, ...). Recognized so the
    /// translator can reject the unsupported ones by name.
    Pragma {
        name: String,
        pos: Pos,
    },
    /// Nested FUNCTION/PROCEDURE in a DECLARE section. Recognized so the
    /// translator can reject it with a precise diagnostic.
    Subprogram {
        name: String,
        pos: Pos,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub data_type: DataType,
    pub constant: bool,
    pub not_null: bool,
    pub default: Option<Expr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeDeclKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Record { fields: Vec<(String, DataType)> },
    TableOf {
        element: DataType,
        index_by: Option<DataType>,
    },
    Varray {
        limit: u64,
        element: DataType,
    },
    RefCursor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// Built-in scalar: `NUMBER(10,2)`, `VARCHAR2(100)`, `DATE`, ...
    Scalar {
        name: String,
        precision: Option<(u64, Option<u64>)>,
    },
    /// `x%TYPE`.
    TypeOf(IdentChain),
    /// `t%ROWTYPE`.
    RowOf(IdentChain),
    /// A declared type name: inline type, package type, or object type.
    Named(IdentChain),
}

impl DataType {
    pub fn scalar(name: impl Into<String>) -> Self {
        DataType::Scalar {
            name: name.into(),
            precision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Named exceptions this arm catches; empty iff `is_others`.
    pub names: Vec<IdentChain>,
    pub is_others: bool,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assign {
        target: Target,
        value: Expr,
    },
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    CaseSimple {
        operand: Expr,
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    CaseSearched {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    ForRange {
        var: String,
        reverse: bool,
        low: Expr,
        high: Expr,
        body: Vec<Stmt>,
    },
    ForCursor {
        var: String,
        source: CursorSource,
        body: Vec<Stmt>,
    },
    Exit {
        when: Option<Expr>,
    },
    Continue {
        when: Option<Expr>,
    },
    Return {
        value: Option<Expr>,
    },
    Null,
    Raise {
        exception: Option<IdentChain>,
    },
    /// Procedure call statement. `RAISE_APPLICATION_ERROR` arrives here and
    /// is special-cased by the translator.
    Call(CallExpr),
    SelectInto {
        query: Select,
        into: Vec<Target>,
    },
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Open {
        cursor: String,
    },
    Fetch {
        cursor: String,
        into: Vec<Target>,
    },
    Close {
        cursor: String,
    },
    Block(Block),
    Commit,
    Rollback,
    /// Recognized so the translator can reject it with a precise diagnostic.
    ExecuteImmediate {
        sql: Expr,
    },
    /// A construct the grammar recognizes but the transpiler does not lower
    /// (INSERT ALL, MERGE, ...).
    Unsupported {
        feature: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CursorSource {
    Named(String),
    Inline(Box<Select>),
}

/// An assignment / INTO target.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(IdentChain),
    /// `a(i)` — collection element or associative-array key.
    Index { base: IdentChain, index: Expr },
    /// `:NEW.col` / `:OLD.col` on a trigger assignment LHS.
    Bind {
        target: BindTarget,
        field: String,
        pos: Pos,
    },
}

impl Target {
    pub fn pos(&self) -> Pos {
        match self {
            Target::Name(chain) => chain.pos,
            Target::Index { base, .. } => base.pos,
            Target::Bind { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: IdentChain,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub has_returning: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// One expression list per row; multi-row VALUES keeps every list.
    Values(Vec<Vec<Expr>>),
    Query(Box<Select>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: IdentChain,
    pub alias: Option<String>,
    pub set: Vec<(IdentChain, Expr)>,
    pub where_clause: Option<Expr>,
    pub has_returning: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: IdentChain,
    pub alias: Option<String>,
    pub where_clause: Option<Expr>,
    pub has_returning: bool,
    pub pos: Pos,
}

// --- program units ---

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedUnit {
    View(Select),
    Function(FunctionDef),
    Procedure(FunctionDef),
    PackageSpec(PackageSpec),
    PackageBody(PackageBody),
    TriggerBody(Block),
    TypeBody(TypeBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: IdentChain,
    pub params: Vec<Param>,
    /// `None` for procedures.
    pub return_type: Option<DataType>,
    pub block: Block,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub mode: ParamMode,
    pub data_type: DataType,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubprogramSig {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<DataType>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageSpec {
    pub name: IdentChain,
    pub variables: Vec<VarDecl>,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<SubprogramSig>,
    pub procedures: Vec<SubprogramSig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageBody {
    pub name: IdentChain,
    pub variables: Vec<VarDecl>,
    pub types: Vec<TypeDecl>,
    pub members: Vec<FunctionDef>,
    /// Trailing `BEGIN ... END` initialization section, if present.
    pub initializer: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeBody {
    pub name: IdentChain,
    pub members: Vec<FunctionDef>,
}
