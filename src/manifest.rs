//! Neutral manifest model shared by the Berksfile and Policyfile parsers,
//! plus the small hand-written lexer both grammars are built on.
//!
//! The lexer recognizes the shared lexical rules from `spec.md` §4.2: line
//! comments starting with `#`, single/double-quoted strings, bare
//! identifiers, Ruby symbols (`:ident`), the hash-rocket (`=>`), and the
//! keyword-argument form (`ident:`).

use crate::version::ConstraintSet;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A source variant a cookbook, or the manifest's default source, can come
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Supermarket,
    ChefServer,
    Git,
    Path,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Supermarket => "supermarket",
            Self::ChefServer => "chef_server",
            Self::Git => "git",
            Self::Path => "path",
        };
        write!(f, "{s}")
    }
}

/// A tagged source location: a remote registry, a Chef server, a git
/// repository, or a local path, with an open map of string-keyed options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub kind: SourceKind,
    pub url: Option<String>,
    pub git_ref: Option<String>,
    pub local_path: Option<String>,
    pub options: HashMap<String, String>,
}

impl SourceLocation {
    #[must_use]
    pub fn supermarket(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Supermarket,
            url: Some(url.into()),
            git_ref: None,
            local_path: None,
            options: HashMap::new(),
        }
    }

    #[must_use]
    pub fn git(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Git,
            url: Some(url.into()),
            git_ref: None,
            local_path: None,
            options: HashMap::new(),
        }
    }

    #[must_use]
    pub fn path(local_path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Path,
            url: None,
            git_ref: None,
            local_path: Some(local_path.into()),
            options: HashMap::new(),
        }
    }

    #[must_use]
    pub fn chef_server(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::ChefServer,
            url: Some(url.into()),
            git_ref: None,
            local_path: None,
            options: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// A stable label used for adapter naming and lock file source keys.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.kind, &self.url, &self.local_path) {
            (SourceKind::Path, _, Some(p)) => format!("path:{p}"),
            (_, Some(url), _) => url.clone(),
            _ => self.kind.to_string(),
        }
    }
}

/// A top-level cookbook requirement: name, constraint, and an optional
/// source override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: ConstraintSet,
    pub source: Option<SourceLocation>,
}

impl Requirement {
    #[must_use]
    pub fn new(name: impl Into<String>, constraint: ConstraintSet) -> Self {
        Self {
            name: name.into(),
            constraint,
            source: None,
        }
    }
}

/// A named bucket of requirements (Berksfile `group :NAME do ... end`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub requirements: Vec<Requirement>,
}

/// The neutral manifest both grammars lower to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub sources: Vec<SourceLocation>,
    pub cookbooks: Vec<Requirement>,
    pub groups: HashMap<String, Vec<Requirement>>,
    pub has_metadata: bool,
}

impl Manifest {
    #[must_use]
    pub fn all_requirements(&self) -> Vec<&Requirement> {
        let mut all: Vec<&Requirement> = self.cookbooks.iter().collect();
        for reqs in self.groups.values() {
            all.extend(reqs.iter());
        }
        all
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at line {line}, column {column}: {message}\n{rendered}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub rendered: String,
}

impl ParseError {
    #[must_use]
    pub fn new(line: usize, column: usize, message: impl Into<String>, source_line: &str) -> Self {
        let caret = " ".repeat(column.saturating_sub(1)) + "^";
        let rendered = format!("{source_line}\n{caret}");
        Self {
            line,
            column,
            message: message.into(),
            rendered,
        }
    }
}

// --- shared lexer -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Symbol(String),
    Comma,
    Colon,
    FatArrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn source_line(&self, line: usize) -> String {
        self.source
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or("")
            .to_string()
    }

    pub(crate) fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(line, column, message, &self.source_line(line))
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                break;
            };

            if c == '\'' || c == '"' {
                let s = self.read_string(c)?;
                tokens.push(Token {
                    kind: TokenKind::Str(s),
                    line,
                    column,
                });
                continue;
            }

            if c == ',' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::Comma,
                    line,
                    column,
                });
                continue;
            }

            if c == '(' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::LParen,
                    line,
                    column,
                });
                continue;
            }

            if c == ')' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::RParen,
                    line,
                    column,
                });
                continue;
            }

            if c == '[' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::LBracket,
                    line,
                    column,
                });
                continue;
            }

            if c == ']' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::RBracket,
                    line,
                    column,
                });
                continue;
            }

            if c == '{' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::LBrace,
                    line,
                    column,
                });
                continue;
            }

            if c == '}' {
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::RBrace,
                    line,
                    column,
                });
                continue;
            }

            if c == '=' && self.peek_at(1) == Some('>') {
                self.advance();
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::FatArrow,
                    line,
                    column,
                });
                continue;
            }

            if c == ':' {
                if self.peek_at(1).is_some_and(is_ident_start) {
                    // Symbol literal: :name
                    self.advance();
                    let ident = self.read_ident();
                    tokens.push(Token {
                        kind: TokenKind::Symbol(ident),
                        line,
                        column,
                    });
                    continue;
                }
                self.advance();
                tokens.push(Token {
                    kind: TokenKind::Colon,
                    line,
                    column,
                });
                continue;
            }

            if is_ident_start(c) {
                let ident = self.read_ident();
                tokens.push(Token {
                    kind: TokenKind::Ident(ident),
                    line,
                    column,
                });
                continue;
            }

            return Err(self.error_at(line, column, format!("unexpected character '{c}'")));
        }

        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let (start_line, start_col) = (self.line, self.column);
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error_at(
                        start_line,
                        start_col,
                        "unterminated string literal",
                    ));
                }
                Some('\\') if self.peek_at(1) == Some(quote) => {
                    self.advance();
                    s.push(self.advance().unwrap_or(quote));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    s.push(self.advance().expect("peeked char exists"));
                }
            }
        }
        Ok(s)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// A cursor over a token stream shared by both grammar parsers.
pub(crate) struct TokenCursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenCursor {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream always has EOF"))
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn peek_nth(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(&self.tokens.last().expect("token stream always has EOF").kind, |t| &t.kind)
    }

    /// True if the current token is a bare identifier equal to `ident`.
    pub(crate) fn at_ident(&self, ident: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(s) if s == ident)
    }
}

/// A scalar argument value: a string literal or a Ruby symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Str(String),
    Symbol(String),
}

impl Value {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Str(s) | Self::Symbol(s) => s,
        }
    }
}

/// One argument in a statement's argument list: either positional or a
/// `key: value` / `:key => value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Arg {
    Positional(Value),
    KeyValue(String, Value),
}

/// Parse a value token (string or symbol) at the cursor, advancing past it.
pub(crate) fn parse_value(cursor: &mut TokenCursor) -> Result<Value, ParseError> {
    match cursor.peek_kind().clone() {
        TokenKind::Str(s) => {
            cursor.advance();
            Ok(Value::Str(s))
        }
        TokenKind::Symbol(s) => {
            cursor.advance();
            Ok(Value::Symbol(s))
        }
        other => {
            let tok = cursor.peek();
            Err(ParseError::new(
                tok.line,
                tok.column,
                format!("expected a string or symbol, found {other:?}"),
                "",
            ))
        }
    }
}

/// Parse a comma-separated argument list (optionally wrapped in parens),
/// stopping when the next bare identifier names a top-level statement
/// keyword (since statements have no terminator other than the next
/// statement or `end`).
pub(crate) fn parse_args(
    cursor: &mut TokenCursor,
    stop_keywords: &[&str],
) -> Result<Vec<Arg>, ParseError> {
    let had_paren = matches!(cursor.peek_kind(), TokenKind::LParen);
    if had_paren {
        cursor.advance();
    }

    let mut args = Vec::new();
    loop {
        // A trailing `{:key => value, ...}` hash literal, e.g. a git
        // options hash passed in braces rather than as bare keywords.
        if matches!(cursor.peek_kind(), TokenKind::LBrace) {
            cursor.advance();
            loop {
                if matches!(cursor.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
                    break;
                }
                match cursor.peek_kind().clone() {
                    TokenKind::Symbol(name) if matches!(cursor.peek_nth(1), TokenKind::FatArrow) => {
                        cursor.advance();
                        cursor.advance();
                        let value = parse_value(cursor)?;
                        args.push(Arg::KeyValue(name, value));
                    }
                    TokenKind::Ident(name) if matches!(cursor.peek_nth(1), TokenKind::Colon) => {
                        cursor.advance();
                        cursor.advance();
                        let value = parse_value(cursor)?;
                        args.push(Arg::KeyValue(name, value));
                    }
                    other => {
                        let tok = cursor.peek();
                        return Err(ParseError::new(
                            tok.line,
                            tok.column,
                            format!("expected a key/value pair in hash literal, found {other:?}"),
                            "",
                        ));
                    }
                }
                if matches!(cursor.peek_kind(), TokenKind::Comma) {
                    cursor.advance();
                    continue;
                }
                break;
            }
            if matches!(cursor.peek_kind(), TokenKind::RBrace) {
                cursor.advance();
            }
            if matches!(cursor.peek_kind(), TokenKind::Comma) {
                cursor.advance();
                continue;
            }
            break;
        }

        let is_stop = match cursor.peek_kind() {
            TokenKind::Eof | TokenKind::RParen => true,
            TokenKind::Ident(s) => stop_keywords.contains(&s.as_str()),
            _ => false,
        };
        if is_stop {
            break;
        }

        // key: value
        if let TokenKind::Ident(name) = cursor.peek_kind().clone()
            && matches!(cursor.peek_nth(1), TokenKind::Colon)
        {
            cursor.advance(); // ident
            cursor.advance(); // colon
            let value = parse_value(cursor)?;
            args.push(Arg::KeyValue(name, value));
        } else if let TokenKind::Symbol(name) = cursor.peek_kind().clone()
            && matches!(cursor.peek_nth(1), TokenKind::FatArrow)
        {
            cursor.advance(); // symbol
            cursor.advance(); // fat arrow
            let value = parse_value(cursor)?;
            args.push(Arg::KeyValue(name, value));
        } else {
            let value = parse_value(cursor)?;
            args.push(Arg::Positional(value));
        }

        if matches!(cursor.peek_kind(), TokenKind::Comma) {
            cursor.advance();
            continue;
        }
        break;
    }

    if had_paren && matches!(cursor.peek_kind(), TokenKind::RParen) {
        cursor.advance();
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_strings_and_idents() {
        let tokens = kinds(r#"cookbook 'nginx', '= 2.7.6'"#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("cookbook".to_string()),
                TokenKind::Str("nginx".to_string()),
                TokenKind::Comma,
                TokenKind::Str("= 2.7.6".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_symbol_vs_keyword_colon() {
        let tokens = kinds("group :base do");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("group".to_string()),
                TokenKind::Symbol("base".to_string()),
                TokenKind::Ident("do".to_string()),
                TokenKind::Eof,
            ]
        );

        let tokens = kinds("path: 'foo'");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("path".to_string()),
                TokenKind::Colon,
                TokenKind::Str("foo".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let tokens = kinds("# a comment\ncookbook 'nginx' # trailing\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("cookbook".to_string()),
                TokenKind::Str("nginx".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hash_rocket() {
        let tokens = kinds("{:git => 'url'}");
        assert!(tokens.contains(&TokenKind::FatArrow));
    }
}
