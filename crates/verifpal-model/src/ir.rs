//! Lowered model: the AST with names interned, principals resolved to ids and
//! right-hand sides turned into [`Value`]s.

use crate::intern::Interner;
use crate::value::{Constant, PrincipalId, Qualifier, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use verifpal_syntax::Span;

/// Maximum number of principals a model may declare.
pub const MAX_PRINCIPALS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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

#[derive(Debug)]
pub struct Model {
    pub file_name: String,
    pub attacker: AttackerKind,
    pub blocks: Vec<Block>,
    pub queries: Vec<Query>,
    /// Principal names indexed by [`PrincipalId`]; slot 0 is the attacker.
    pub principals: Vec<Arc<str>>,
    pub names: Interner,
}

impl Model {
    pub fn principal_name(&self, id: PrincipalId) -> &str {
        self.principals.get(id.index()).map_or("Attacker", |n| n)
    }

    /// Ids of the declared principals, in declaration order.
    pub fn principal_ids(&self) -> impl Iterator<Item = PrincipalId> + '_ {
        (1..self.principals.len()).map(|i| PrincipalId(i as u8))
    }

    pub fn principal_id(&self, name: &str) -> Option<PrincipalId> {
        self.principals
            .iter()
            .skip(1)
            .position(|n| &**n == name)
            .map(|i| PrincipalId((i + 1) as u8))
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Message(m) => Some(m),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: Arc<str>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Principal(PrincipalBlock),
    Message(Message),
    Phase(PhaseBlock),
}

#[derive(Debug, Clone)]
pub struct PrincipalBlock {
    pub principal: Principal,
    pub expressions: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    Knows,
    Generates,
    Leaks,
    Assignment,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Only set for `knows`.
    pub qualifier: Option<Qualifier>,
    pub constants: Vec<Constant>,
    /// Right-hand side of an assignment.
    pub assigned: Option<Value>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: Principal,
    pub recipient: Principal,
    pub constants: Vec<Constant>,
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PhaseBlock {
    pub number: u32,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOptionKind {
    Precondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOption {
    pub kind: QueryOptionKind,
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub kind: QueryKind,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub options: Vec<QueryOption>,
    #[serde(skip)]
    pub span: Span,
}

impl Query {
    /// The constant the query is about: the message constant for
    /// authentication, the first listed constant otherwise.
    pub fn subject(&self) -> Option<&Constant> {
        match self.kind {
            QueryKind::Authentication => self.message.as_ref()?.constants.first(),
            _ => self.constants.first(),
        }
    }
}
