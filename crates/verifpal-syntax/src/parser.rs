//! Recursive descent parser for Verifpal models.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// Parser error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token at {span}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unexpected end of file at {span}")]
    UnexpectedEof { span: Span },
    #[error("invalid syntax at {span}: {message}")]
    InvalidSyntax { message: String, span: Span },
    #[error("invalid model file name: {message}")]
    InvalidFileName { message: String },
}

impl ParseError {
    /// Get the source span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => *span,
            ParseError::UnexpectedEof { span } => *span,
            ParseError::InvalidSyntax { span, .. } => *span,
            ParseError::InvalidFileName { .. } => Span::dummy(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Names that may not be declared as constants or principals. Primitive
/// names are compared case-insensitively.
const RESERVED: &[&str] = &[
    "attacker",
    "passive",
    "active",
    "principal",
    "knows",
    "generates",
    "leaks",
    "phase",
    "public",
    "private",
    "password",
    "confidentiality",
    "authentication",
    "freshness",
    "unlinkability",
    "equivalence",
    "precondition",
    "queries",
    "primitive",
    "assert",
    "concat",
    "split",
    "pw_hash",
    "hash",
    "hkdf",
    "aead_enc",
    "aead_dec",
    "enc",
    "dec",
    "mac",
    "sign",
    "signverif",
    "pke_enc",
    "pke_dec",
    "shamir_split",
    "shamir_join",
    "ringsign",
    "ringsignverif",
    "blind",
    "unblind",
    "unnamed",
];

/// Sentinel constants: usable in values, never declarable.
const SENTINELS: &[&str] = &["g", "nil"];

/// Maximum length of a model file name, extension included.
pub const MAX_FILE_NAME_LEN: usize = 64;

fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED.contains(&lower.as_str()) || lower.starts_with("attacker") || lower.starts_with("unnamed")
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => std::iter::once(first.to_ascii_uppercase())
            .chain(chars.map(|c| c.to_ascii_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Parser for model source text.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
    /// Counter for `_` left-hand sides.
    unnamed: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let tokens: Vec<_> = Lexer::new(source)
            .tokenize()
            .into_iter()
            .filter(|t| !t.kind.is_trivia())
            .collect();
        let eof_span = tokens.last().map(|t| t.span).unwrap_or_default();
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, eof_span),
            unnamed: 0,
        }
    }

    /// Parse a complete model.
    pub fn parse_model(&mut self) -> ParseResult<Model> {
        let start = self.current_span();
        let attacker = self.parse_attacker()?;

        let mut blocks = Vec::new();
        while !self.check(TokenKind::Queries) {
            if self.is_at_end() {
                return Err(ParseError::UnexpectedEof {
                    span: self.current_span(),
                });
            }
            blocks.push(self.parse_block()?);
        }
        if blocks.is_empty() {
            return Err(ParseError::InvalidSyntax {
                message: "a model must declare at least one block".to_string(),
                span: self.current_span(),
            });
        }

        let queries = self.parse_queries()?;
        if !self.is_at_end() {
            return Err(ParseError::UnexpectedToken {
                expected: "end of file".to_string(),
                found: self.peek_kind().to_string(),
                span: self.current_span(),
            });
        }

        let span = start.merge(self.prev_span());
        Ok(Model {
            attacker,
            blocks,
            queries,
            span,
        })
    }

    /// `attacker[active]` or `attacker[passive]`
    fn parse_attacker(&mut self) -> ParseResult<AttackerKind> {
        self.expect(TokenKind::Attacker)?;
        self.expect(TokenKind::LBracket)?;
        let kind = match self.peek_kind() {
            TokenKind::Active => AttackerKind::Active,
            TokenKind::Passive => AttackerKind::Passive,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "active or passive".to_string(),
                    found: other.to_string(),
                    span: self.current_span(),
                })
            }
        };
        self.advance();
        self.expect(TokenKind::RBracket)?;
        Ok(kind)
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        match self.peek_kind() {
            TokenKind::Principal => self.parse_principal().map(Block::Principal),
            TokenKind::Phase => self.parse_phase().map(Block::Phase),
            TokenKind::Ident(_) if self.peek_ahead_kind(1) == TokenKind::Arrow => {
                self.parse_message().map(Block::Message)
            }
            TokenKind::Error(message) => Err(ParseError::InvalidSyntax {
                message,
                span: self.current_span(),
            }),
            other => Err(ParseError::UnexpectedToken {
                expected: "principal, message or phase block".to_string(),
                found: other.to_string(),
                span: self.current_span(),
            }),
        }
    }

    fn parse_principal(&mut self) -> ParseResult<PrincipalBlock> {
        let start = self.current_span();
        self.expect(TokenKind::Principal)?;
        let name = self.parse_principal_name()?;
        self.expect(TokenKind::LBracket)?;
        let mut expressions = Vec::new();
        while !self.check(TokenKind::RBracket) {
            if self.is_at_end() {
                return Err(ParseError::UnexpectedEof {
                    span: self.current_span(),
                });
            }
            expressions.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RBracket)?;
        let span = start.merge(self.prev_span());
        Ok(PrincipalBlock {
            name,
            expressions,
            span,
        })
    }

    fn parse_phase(&mut self) -> ParseResult<PhaseBlock> {
        let start = self.current_span();
        self.expect(TokenKind::Phase)?;
        self.expect(TokenKind::LBracket)?;
        let number = match self.peek_kind() {
            TokenKind::Integer(n) => u32::try_from(n).map_err(|_| ParseError::InvalidSyntax {
                message: format!("phase number {} is too large", n),
                span: self.current_span(),
            })?,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "phase number".to_string(),
                    found: other.to_string(),
                    span: self.current_span(),
                })
            }
        };
        self.advance();
        self.expect(TokenKind::RBracket)?;
        let span = start.merge(self.prev_span());
        Ok(PhaseBlock { number, span })
    }

    /// `Sender -> Recipient: a, [b]`
    fn parse_message(&mut self) -> ParseResult<MessageBlock> {
        let start = self.current_span();
        let sender = self.parse_principal_name()?;
        self.expect(TokenKind::Arrow)?;
        let recipient = self.parse_principal_name()?;
        self.expect(TokenKind::Colon)?;

        let mut constants = Vec::new();
        loop {
            let guard = self.match_token(TokenKind::LBracket);
            let ident = self.parse_constant_ref()?;
            if guard {
                self.expect(TokenKind::RBracket)?;
            }
            constants.push(GuardedIdent { ident, guard });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let span = start.merge(self.prev_span());
        Ok(MessageBlock {
            sender,
            recipient,
            constants,
            span,
        })
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        match self.peek_kind() {
            TokenKind::Knows => {
                self.advance();
                let qualifier = match self.peek_kind() {
                    TokenKind::Public => Qualifier::Public,
                    TokenKind::Private => Qualifier::Private,
                    TokenKind::Password => Qualifier::Password,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "public, private or password".to_string(),
                            found: other.to_string(),
                            span: self.current_span(),
                        })
                    }
                };
                self.advance();
                let constants = self.parse_declared_list()?;
                let span = start.merge(self.prev_span());
                Ok(Expression::Knows {
                    qualifier,
                    constants,
                    span,
                })
            }
            TokenKind::Generates => {
                self.advance();
                let constants = self.parse_declared_list()?;
                let span = start.merge(self.prev_span());
                Ok(Expression::Generates { constants, span })
            }
            TokenKind::Leaks => {
                self.advance();
                let constants = self.parse_constant_list()?;
                let span = start.merge(self.prev_span());
                Ok(Expression::Leaks { constants, span })
            }
            _ => self.parse_assignment(),
        }
    }

    /// `a, _, b = VALUE`
    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let start = self.current_span();
        let mut left = Vec::new();
        loop {
            let ident = match self.peek_kind() {
                TokenKind::Ident(name) if name == "_" => {
                    let span = self.current_span();
                    self.advance();
                    let ident = Ident::new(format!("unnamed_{}", self.unnamed), span);
                    self.unnamed += 1;
                    ident
                }
                _ => self.parse_declared_name()?,
            };
            left.push(ident);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Assign)?;
        let right = self.parse_value()?;
        if matches!(right, ValueExpr::Constant(_)) {
            return Err(ParseError::InvalidSyntax {
                message: "cannot assign value to value".to_string(),
                span: right.span(),
            });
        }
        let span = start.merge(self.prev_span());
        Ok(Expression::Assignment { left, right, span })
    }

    /// A constant, a primitive application, or an equation chain.
    fn parse_value(&mut self) -> ParseResult<ValueExpr> {
        let start = self.current_span();
        let TokenKind::Ident(raw) = self.peek_kind() else {
            return Err(self.unexpected("value"));
        };

        if self.peek_ahead_kind(1) == TokenKind::LParen {
            self.advance();
            let name = Ident::new(raw.to_ascii_uppercase(), start);
            self.expect(TokenKind::LParen)?;
            let mut arguments = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    arguments.push(self.parse_value()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
            let check = self.match_token(TokenKind::Question);
            let span = start.merge(self.prev_span());
            return Ok(ValueExpr::Primitive {
                name,
                arguments,
                check,
                span,
            });
        }

        let first = self.parse_constant_ref()?;
        if !self.check(TokenKind::Caret) {
            return Ok(ValueExpr::Constant(first));
        }
        let mut values = vec![first];
        while self.match_token(TokenKind::Caret) {
            values.push(self.parse_constant_ref()?);
        }
        let span = start.merge(self.prev_span());
        Ok(ValueExpr::Equation { values, span })
    }

    fn parse_queries(&mut self) -> ParseResult<Vec<Query>> {
        self.expect(TokenKind::Queries)?;
        self.expect(TokenKind::LBracket)?;
        let mut queries = Vec::new();
        while !self.check(TokenKind::RBracket) {
            if self.is_at_end() {
                return Err(ParseError::UnexpectedEof {
                    span: self.current_span(),
                });
            }
            queries.push(self.parse_query()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(queries)
    }

    fn parse_query(&mut self) -> ParseResult<Query> {
        let start = self.current_span();
        let kind = match self.peek_kind() {
            TokenKind::Confidentiality => QueryKind::Confidentiality,
            TokenKind::Authentication => QueryKind::Authentication,
            TokenKind::Freshness => QueryKind::Freshness,
            TokenKind::Unlinkability => QueryKind::Unlinkability,
            TokenKind::Equivalence => QueryKind::Equivalence,
            _ => return Err(self.unexpected("query")),
        };
        self.advance();
        self.expect(TokenKind::Question)?;

        let (constants, message) = match kind {
            QueryKind::Authentication => (Vec::new(), Some(self.parse_message_ref()?)),
            QueryKind::Unlinkability | QueryKind::Equivalence => {
                (self.parse_constant_list()?, None)
            }
            QueryKind::Confidentiality | QueryKind::Freshness => {
                (vec![self.parse_constant_ref()?], None)
            }
        };

        let mut options = Vec::new();
        if self.match_token(TokenKind::LBracket) {
            while !self.check(TokenKind::RBracket) {
                options.push(self.parse_query_option()?);
                self.match_token(TokenKind::Comma);
            }
            self.expect(TokenKind::RBracket)?;
        }

        let span = start.merge(self.prev_span());
        Ok(Query {
            kind,
            constants,
            message,
            options,
            span,
        })
    }

    /// `precondition[A -> B: c]`
    fn parse_query_option(&mut self) -> ParseResult<QueryOption> {
        let start = self.current_span();
        self.expect(TokenKind::Precondition)?;
        self.expect(TokenKind::LBracket)?;
        let message = self.parse_message_ref()?;
        self.expect(TokenKind::RBracket)?;
        let span = start.merge(self.prev_span());
        Ok(QueryOption { message, span })
    }

    fn parse_message_ref(&mut self) -> ParseResult<MessageRef> {
        let start = self.current_span();
        let sender = self.parse_principal_name()?;
        self.expect(TokenKind::Arrow)?;
        let recipient = self.parse_principal_name()?;
        self.expect(TokenKind::Colon)?;
        let constants = self.parse_constant_list()?;
        let span = start.merge(self.prev_span());
        Ok(MessageRef {
            sender,
            recipient,
            constants,
            span,
        })
    }

    fn parse_constant_list(&mut self) -> ParseResult<Vec<Ident>> {
        let mut constants = vec![self.parse_constant_ref()?];
        while self.match_token(TokenKind::Comma) {
            constants.push(self.parse_constant_ref()?);
        }
        Ok(constants)
    }

    fn parse_declared_list(&mut self) -> ParseResult<Vec<Ident>> {
        let mut constants = vec![self.parse_declared_name()?];
        while self.match_token(TokenKind::Comma) {
            constants.push(self.parse_declared_name()?);
        }
        Ok(constants)
    }

    /// A constant being declared: sentinels are rejected on top of reserved names.
    fn parse_declared_name(&mut self) -> ParseResult<Ident> {
        let ident = self.parse_constant_ref()?;
        if SENTINELS.contains(&ident.name.as_str()) {
            return Err(ParseError::InvalidSyntax {
                message: format!("cannot use reserved keyword in name: {}", ident.name),
                span: ident.span,
            });
        }
        Ok(ident)
    }

    /// A constant occurrence, lowercased.
    fn parse_constant_ref(&mut self) -> ParseResult<Ident> {
        let raw = self.parse_raw_name("constant")?;
        Ok(Ident::new(raw.name.to_ascii_lowercase(), raw.span))
    }

    /// A principal name, title-cased.
    fn parse_principal_name(&mut self) -> ParseResult<Ident> {
        let raw = self.parse_raw_name("principal name")?;
        Ok(Ident::new(title_case(&raw.name), raw.span))
    }

    fn parse_raw_name(&mut self, expected: &str) -> ParseResult<Ident> {
        let span = self.current_span();
        match self.peek_kind() {
            TokenKind::Ident(name) => {
                if is_reserved(&name) {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("cannot use reserved keyword in name: {}", name),
                        span,
                    });
                }
                self.advance();
                Ok(Ident::new(name, span))
            }
            kind if kind.is_keyword() => Err(ParseError::InvalidSyntax {
                message: format!("cannot use reserved keyword in name: {}", kind),
                span,
            }),
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek_kind() {
            TokenKind::Eof => ParseError::UnexpectedEof {
                span: self.current_span(),
            },
            TokenKind::Error(message) => ParseError::InvalidSyntax {
                message,
                span: self.current_span(),
            },
            found => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
                span: self.current_span(),
            },
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    /// Peek ahead by `offset` tokens (0 = current token).
    fn peek_ahead_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind.clone())
            .unwrap_or(TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::dummy()
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.peek_kind()) == std::mem::discriminant(&kind)
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.check(kind.clone()) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }
}

/// Parse source text into a model.
pub fn parse(source: &str) -> ParseResult<Model> {
    Parser::new(source).parse_model()
}

/// Model files carry a `.vp` extension and a bounded name.
pub fn validate_file_name(file_name: &str) -> ParseResult<()> {
    if file_name.len() > MAX_FILE_NAME_LEN {
        return Err(ParseError::InvalidFileName {
            message: format!(
                "model file name must be {} characters or less",
                MAX_FILE_NAME_LEN
            ),
        });
    }
    if !file_name.ends_with(".vp") {
        return Err(ParseError::InvalidFileName {
            message: "model file name must have a '.vp' extension".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "
        attacker[active]
        principal Alice[
            knows private k
            generates m
            e = ENC(k, m)
        ]
        Alice -> Bob: e
        queries[
            confidentiality? m
        ]
    ";

    #[test]
    fn test_parse_simple_model() {
        let model = parse(SIMPLE).unwrap();
        assert_eq!(model.attacker, AttackerKind::Active);
        assert_eq!(model.blocks.len(), 2);
        assert_eq!(model.queries.len(), 1);
        match &model.blocks[0] {
            Block::Principal(p) => {
                assert_eq!(p.name.name, "Alice");
                assert_eq!(p.expressions.len(), 3);
            }
            _ => panic!("expected principal block"),
        }
        match &model.blocks[1] {
            Block::Message(m) => {
                assert_eq!(m.sender.name, "Alice");
                assert_eq!(m.recipient.name, "Bob");
                assert_eq!(m.constants[0].ident.name, "e");
                assert!(!m.constants[0].guard);
            }
            _ => panic!("expected message block"),
        }
    }

    #[test]
    fn test_names_are_normalized() {
        let model = parse(
            "attacker[passive]
             principal alice[ knows private KEY  h = hash(KEY) ]
             queries[ confidentiality? Key ]",
        )
        .unwrap();
        let Block::Principal(p) = &model.blocks[0] else {
            panic!("expected principal block");
        };
        assert_eq!(p.name.name, "Alice");
        match &p.expressions[1] {
            Expression::Assignment { right, .. } => match right {
                ValueExpr::Primitive {
                    name, arguments, ..
                } => {
                    assert_eq!(name.name, "HASH");
                    assert!(matches!(&arguments[0], ValueExpr::Constant(c) if c.name == "key"));
                }
                _ => panic!("expected primitive"),
            },
            _ => panic!("expected assignment"),
        }
        assert_eq!(model.queries[0].constants[0].name, "key");
    }

    #[test]
    fn test_checked_primitive_and_unnamed() {
        let model = parse(
            "attacker[active]
             principal B[ knows private a, b  _ = ASSERT(a, b)?  _ = HASH(a) ]
             queries[ freshness? a ]",
        )
        .unwrap();
        let Block::Principal(p) = &model.blocks[0] else {
            panic!("expected principal block");
        };
        let Expression::Assignment { left, right, .. } = &p.expressions[1] else {
            panic!("expected assignment");
        };
        assert_eq!(left[0].name, "unnamed_0");
        assert!(matches!(right, ValueExpr::Primitive { check: true, .. }));
        let Expression::Assignment { left, .. } = &p.expressions[2] else {
            panic!("expected assignment");
        };
        assert_eq!(left[0].name, "unnamed_1");
    }

    #[test]
    fn test_equation_chain() {
        let model = parse(
            "attacker[active]
             principal A[ generates a  ga = G^a ]
             principal B[ generates b ]
             A -> B: ga
             principal B[ s = ga^b ]
             queries[ confidentiality? s ]",
        )
        .unwrap();
        let Block::Principal(p) = &model.blocks[3] else {
            panic!("expected principal block");
        };
        let Expression::Assignment { right, .. } = &p.expressions[0] else {
            panic!("expected assignment");
        };
        match right {
            ValueExpr::Equation { values, .. } => {
                let names: Vec<_> = values.iter().map(|v| v.name.as_str()).collect();
                assert_eq!(names, vec!["ga", "b"]);
            }
            _ => panic!("expected equation"),
        }
    }

    #[test]
    fn test_guarded_message_and_phase() {
        let model = parse(
            "attacker[active]
             principal A[ knows public x, y ]
             A -> B: [x], y
             phase[1]
             queries[ confidentiality? x ]",
        )
        .unwrap();
        let Block::Message(m) = &model.blocks[1] else {
            panic!("expected message block");
        };
        assert!(m.constants[0].guard);
        assert!(!m.constants[1].guard);
        assert!(matches!(&model.blocks[2], Block::Phase(PhaseBlock { number: 1, .. })));
    }

    #[test]
    fn test_queries_with_precondition() {
        let model = parse(
            "attacker[active]
             principal A[ generates x ]
             A -> B: x
             queries[
                authentication? A -> B: x[
                    precondition[A -> B: x]
                ]
                unlinkability? x, x
             ]",
        )
        .unwrap();
        let q = &model.queries[0];
        assert_eq!(q.kind, QueryKind::Authentication);
        let message = q.message.as_ref().unwrap();
        assert_eq!(message.recipient.name, "B");
        assert_eq!(q.options.len(), 1);
        assert_eq!(model.queries[1].constants.len(), 2);
    }

    #[test]
    fn test_equivalence_query() {
        let model = parse(
            "attacker[passive]
             principal A[ knows private k  h1 = HASH(k)  h2 = HASH(k) ]
             queries[ equivalence? h1, h2 ]",
        )
        .unwrap();
        let q = &model.queries[0];
        assert_eq!(q.kind, QueryKind::Equivalence);
        assert!(q.message.is_none());
        let names: Vec<_> = q.constants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["h1", "h2"]);
    }

    #[test]
    fn test_reserved_names_rejected() {
        let err = parse(
            "attacker[active]
             principal A[ knows private hash ]
             queries[ confidentiality? hash ]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("reserved keyword"));

        let err = parse(
            "attacker[active]
             principal A[ knows private phase ]
             queries[ confidentiality? phase ]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("reserved keyword"));

        let err = parse(
            "attacker[active]
             principal A[ generates g ]
             queries[ confidentiality? g ]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("reserved keyword"));
    }

    #[test]
    fn test_value_to_value_assignment_rejected() {
        let err = parse(
            "attacker[active]
             principal A[ knows private a  b = a ]
             queries[ confidentiality? a ]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot assign value to value"));
    }

    #[test]
    fn test_missing_queries_is_eof_error() {
        let err = parse("attacker[active] principal A[ generates a ]").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_file_name_validation() {
        assert!(validate_file_name("model.vp").is_ok());
        assert!(validate_file_name("model.txt").is_err());
        let long = format!("{}.vp", "a".repeat(MAX_FILE_NAME_LEN));
        assert!(validate_file_name(&long).is_err());
    }
}
