//! Token types and source span tracking for the model lexer.

use std::fmt;

/// A span in the source code, tracking byte offsets and line/column.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, in characters not bytes).
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span for values synthesised outside of any source text.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Self) -> Self {
        let (line, column) = if (self.line, self.column) <= (other.line, other.column) {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of token.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // === Block keywords ===
    /// `attacker`
    Attacker,
    /// `active`
    Active,
    /// `passive`
    Passive,
    /// `principal`
    Principal,
    /// `phase`
    Phase,
    /// `queries`
    Queries,

    // === Expression keywords ===
    /// `knows`
    Knows,
    /// `generates`
    Generates,
    /// `leaks`
    Leaks,
    /// `public`
    Public,
    /// `private`
    Private,
    /// `password`
    Password,

    // === Query keywords ===
    /// `confidentiality`
    Confidentiality,
    /// `authentication`
    Authentication,
    /// `freshness`
    Freshness,
    /// `unlinkability`
    Unlinkability,
    /// `equivalence`
    Equivalence,
    /// `precondition`
    Precondition,

    // === Literals ===
    /// Identifier, as written.
    Ident(String),
    /// Phase number.
    Integer(u64),

    // === Punctuation ===
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `=`
    Assign,
    /// `^`
    Caret,
    /// `?`
    Question,
    /// `->` or `→`
    Arrow,

    // === Trivia ===
    /// `// ...` comment, content without the slashes.
    Comment(String),

    // === Special ===
    Eof,
    /// Lexical error carrying its message.
    Error(String),
}

impl TokenKind {
    /// Look up a keyword. Matching is case-insensitive, as model identifiers are.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident.to_ascii_lowercase().as_str() {
            "attacker" => TokenKind::Attacker,
            "active" => TokenKind::Active,
            "passive" => TokenKind::Passive,
            "principal" => TokenKind::Principal,
            "phase" => TokenKind::Phase,
            "queries" => TokenKind::Queries,
            "knows" => TokenKind::Knows,
            "generates" => TokenKind::Generates,
            "leaks" => TokenKind::Leaks,
            "public" => TokenKind::Public,
            "private" => TokenKind::Private,
            "password" => TokenKind::Password,
            "confidentiality" => TokenKind::Confidentiality,
            "authentication" => TokenKind::Authentication,
            "freshness" => TokenKind::Freshness,
            "unlinkability" => TokenKind::Unlinkability,
            "equivalence" => TokenKind::Equivalence,
            "precondition" => TokenKind::Precondition,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Attacker
                | TokenKind::Active
                | TokenKind::Passive
                | TokenKind::Principal
                | TokenKind::Phase
                | TokenKind::Queries
                | TokenKind::Knows
                | TokenKind::Generates
                | TokenKind::Leaks
                | TokenKind::Public
                | TokenKind::Private
                | TokenKind::Password
                | TokenKind::Confidentiality
                | TokenKind::Authentication
                | TokenKind::Freshness
                | TokenKind::Unlinkability
                | TokenKind::Equivalence
                | TokenKind::Precondition
        )
    }

    /// Comments are dropped before parsing.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Comment(_))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Attacker => write!(f, "attacker"),
            TokenKind::Active => write!(f, "active"),
            TokenKind::Passive => write!(f, "passive"),
            TokenKind::Principal => write!(f, "principal"),
            TokenKind::Phase => write!(f, "phase"),
            TokenKind::Queries => write!(f, "queries"),
            TokenKind::Knows => write!(f, "knows"),
            TokenKind::Generates => write!(f, "generates"),
            TokenKind::Leaks => write!(f, "leaks"),
            TokenKind::Public => write!(f, "public"),
            TokenKind::Private => write!(f, "private"),
            TokenKind::Password => write!(f, "password"),
            TokenKind::Confidentiality => write!(f, "confidentiality"),
            TokenKind::Authentication => write!(f, "authentication"),
            TokenKind::Freshness => write!(f, "freshness"),
            TokenKind::Unlinkability => write!(f, "unlinkability"),
            TokenKind::Equivalence => write!(f, "equivalence"),
            TokenKind::Precondition => write!(f, "precondition"),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Assign => write!(f, "="),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Comment(s) => write!(f, "// {}", s),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// A token with its kind and source location.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }
}
