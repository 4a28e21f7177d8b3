//! Lexer for Verifpal models.
//!
//! Converts source text into a stream of tokens.

use crate::token::{Span, Token, TokenKind};
use std::str::Chars;

/// Lexer for model source text.
pub struct Lexer<'a> {
    /// Source text being lexed.
    source: &'a str,
    /// Character iterator.
    chars: Chars<'a>,
    /// Current byte position.
    pos: usize,
    /// Current line number (1-indexed).
    line: u32,
    /// Current column number (1-indexed).
    column: u32,
    /// Start position of current token.
    token_start: usize,
    /// Start line of current token.
    token_start_line: u32,
    /// Start column of current token.
    token_start_column: u32,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            pos: 0,
            line: 1,
            column: 1,
            token_start: 0,
            token_start_line: 1,
            token_start_column: 1,
        }
    }

    /// Tokenize the entire source, returning all tokens including EOF.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    /// Lex the next token, or `Eof` once the source is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.mark_token_start();

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        if c == '/' && self.peek_next() == Some('/') {
            return self.lex_comment();
        }

        if c.is_ascii_digit() {
            return self.lex_number();
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return self.lex_identifier();
        }

        self.lex_punctuation()
    }

    /// Skip whitespace, newlines included.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Record where the token being lexed begins.
    fn mark_token_start(&mut self) {
        self.token_start = self.pos;
        self.token_start_line = self.line;
        self.token_start_column = self.column;
    }

    /// Look at the current character without consuming it.
    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// Look one character past the current one.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    /// Consume one character, updating line and column.
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Build a token spanning from the marked start to the current position.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(
                self.token_start,
                self.pos,
                self.token_start_line,
                self.token_start_column,
            ),
        )
    }

    /// Source text of the token being lexed.
    fn token_text(&self) -> &'a str {
        &self.source[self.token_start..self.pos]
    }

    /// Lex a `//` comment up to the end of the line.
    fn lex_comment(&mut self) -> Token {
        self.advance();
        self.advance();
        if self.peek() == Some(' ') {
            self.advance();
        }
        let content_start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let content = self.source[content_start..self.pos].trim_end().to_string();
        self.make_token(TokenKind::Comment(content))
    }

    /// Lex a phase number.
    fn lex_number(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.token_text();
        match text.parse::<u64>() {
            Ok(n) => self.make_token(TokenKind::Integer(n)),
            Err(_) => self.make_token(TokenKind::Error(format!("invalid integer: {}", text))),
        }
    }

    /// Lex an identifier or keyword. Keywords match case-insensitively.
    fn lex_identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.token_text();
        match TokenKind::keyword(text) {
            Some(keyword) => self.make_token(keyword),
            None => self.make_token(TokenKind::Ident(text.to_string())),
        }
    }

    /// Lex punctuation, including both arrow spellings.
    fn lex_punctuation(&mut self) -> Token {
        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '[' => self.make_token(TokenKind::LBracket),
            ']' => self.make_token(TokenKind::RBracket),
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            ',' => self.make_token(TokenKind::Comma),
            ':' => self.make_token(TokenKind::Colon),
            '=' => self.make_token(TokenKind::Assign),
            '^' => self.make_token(TokenKind::Caret),
            '?' => self.make_token(TokenKind::Question),
            '→' => self.make_token(TokenKind::Arrow),
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::Arrow)
                } else {
                    self.make_token(TokenKind::Error("expected '>' after '-'".to_string()))
                }
            }
            _ => self.make_token(TokenKind::Error(format!("unexpected character: {}", c))),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.is_eof() {
            None
        } else {
            Some(token)
        }
    }
}
