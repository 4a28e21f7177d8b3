//! Abstract syntax tree for Verifpal models.
//!
//! Names are normalized by the parser: constants are lowercase, principals
//! are title case and primitive names are uppercase.

use crate::token::Span;

/// A parsed model file.
#[derive(Debug, Clone)]
pub struct Model {
    pub attacker: AttackerKind,
    /// Principal, message and phase blocks in declaration order.
    pub blocks: Vec<Block>,
    pub queries: Vec<Query>,
    /// Span covering the entire model.
    pub span: Span,
}

/// An identifier with its source span.
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackerKind {
    Passive,
    Active,
}

impl AttackerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackerKind::Passive => "passive",
            AttackerKind::Active => "active",
        }
    }
}

/// A top-level block.
#[derive(Debug, Clone)]
pub enum Block {
    /// `principal Name[ ... ]`
    Principal(PrincipalBlock),
    /// `Sender -> Recipient: a, [b]`
    Message(MessageBlock),
    /// `phase[n]`
    Phase(PhaseBlock),
}

impl Block {
    pub fn span(&self) -> Span {
        match self {
            Block::Principal(b) => b.span,
            Block::Message(b) => b.span,
            Block::Phase(b) => b.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrincipalBlock {
    pub name: Ident,
    pub expressions: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MessageBlock {
    pub sender: Ident,
    pub recipient: Ident,
    pub constants: Vec<GuardedIdent>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PhaseBlock {
    pub number: u32,
    pub span: Span,
}

/// A constant reference in a message, optionally guarded with `[c]`.
#[derive(Debug, Clone)]
pub struct GuardedIdent {
    pub ident: Ident,
    pub guard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Public,
    Private,
    Password,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Public => "public",
            Qualifier::Private => "private",
            Qualifier::Password => "password",
        }
    }
}

/// An expression inside a principal block.
#[derive(Debug, Clone)]
pub enum Expression {
    /// `knows <qualifier> a, b`
    Knows {
        qualifier: Qualifier,
        constants: Vec<Ident>,
        span: Span,
    },
    /// `generates a, b`
    Generates { constants: Vec<Ident>, span: Span },
    /// `leaks a, b`
    Leaks { constants: Vec<Ident>, span: Span },
    /// `a, b = VALUE`
    Assignment {
        left: Vec<Ident>,
        right: ValueExpr,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Knows { span, .. }
            | Expression::Generates { span, .. }
            | Expression::Leaks { span, .. }
            | Expression::Assignment { span, .. } => *span,
        }
    }
}

/// The right-hand side of an assignment, or an argument of a primitive.
#[derive(Debug, Clone)]
pub enum ValueExpr {
    Constant(Ident),
    /// `NAME(args)` with `?` when checked.
    Primitive {
        name: Ident,
        arguments: Vec<ValueExpr>,
        check: bool,
        span: Span,
    },
    /// `a^b^c`
    Equation { values: Vec<Ident>, span: Span },
}

impl ValueExpr {
    pub fn span(&self) -> Span {
        match self {
            ValueExpr::Constant(ident) => ident.span,
            ValueExpr::Primitive { span, .. } | ValueExpr::Equation { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Confidentiality,
    Authentication,
    Freshness,
    Unlinkability,
    Equivalence,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Confidentiality => "confidentiality",
            QueryKind::Authentication => "authentication",
            QueryKind::Freshness => "freshness",
            QueryKind::Unlinkability => "unlinkability",
            QueryKind::Equivalence => "equivalence",
        }
    }
}

/// `Sender -> Recipient: a` as used by queries and their options.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub sender: Ident,
    pub recipient: Ident,
    pub constants: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    /// Queried constants; empty for authentication, whose constant lives in `message`.
    pub constants: Vec<Ident>,
    pub message: Option<MessageRef>,
    pub options: Vec<QueryOption>,
    pub span: Span,
}

/// `precondition[A -> B: c]`
#[derive(Debug, Clone)]
pub struct QueryOption {
    pub message: MessageRef,
    pub span: Span,
}
