// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer shared by the FHIRPath and CQL parsers.
//!
//! Tokens own their text (no lifetime parameter): CQL's delimited
//! identifiers and multi-line library source make zero-copy slicing more
//! trouble than it's worth at this layer, so the simplification is
//! deliberate.

use crate::error::{ParseError, ParseResult};
use nom::character::complete::{digit1, one_of};
use nom::combinator::recognize;
use nom::sequence::tuple;
use nom::IResult;
use octofhir_cql_diagnostics::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Long(i128),
    Decimal(String),
    String(String),
    /// CQL `"delimited identifier"`.
    DelimitedIdentifier(String),
    Identifier(String),
    Boolean(bool),
    Date(String),
    DateTime(String),
    Time(String),
    Quantity { value: String, unit: String },
    Null,

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Pipe,
    Ampersand,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Semicolon,
    Arrow,
    Dollar,
    DollarThis,
    DollarIndex,
    DollarTotal,

    And,
    Or,
    Xor,
    Implies,
    Not,
    In,
    Contains,
    Is,
    As,
    Mod,
    Div,

    Define,
    Function,
    Context,
    Library,
    Using,
    Include,
    Called,
    Version,
    Parameter,
    Default,
    Valueset,
    Codesystem,
    CodeKw,
    ConceptKw,
    Public,
    Private,
    Where,
    Return,
    Distinct,
    With,
    Without,
    Let,
    Sort,
    By,
    Asc,
    Desc,
    From,
    Such,
    That,
    If,
    Then,
    Else,
    Case,
    When,
    End,
    Exists,
    Aggregate,
    Starting,
    Tuple,
    List,
    Interval,
    Between,
    Difference,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: SourceSpan,
}

pub struct Tokenizer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(mut self) -> ParseResult<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let (line, col) = (self.line, self.col);
            if self.pos >= self.bytes.len() {
                tokens.push(SpannedToken {
                    token: Token::Eof,
                    span: SourceSpan::point(start, line, col),
                });
                break;
            }
            let token = self.next_token()?;
            let span = SourceSpan::new(start, self.pos, line, col);
            tokens.push(SpannedToken { token, span });
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/')) {
                        if self.advance().is_none() {
                            break;
                        }
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn current_span_start(&self) -> (usize, u32, u32) {
        (self.pos, self.line, self.col)
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        let b = self.peek().expect("checked by caller");
        match b {
            b'@' => self.lex_temporal_literal(),
            b'\'' => self.lex_string_literal(b'\'').map(Token::String),
            b'"' => self
                .lex_string_literal(b'"')
                .map(Token::DelimitedIdentifier),
            b'$' => self.lex_variable(),
            b'0'..=b'9' => self.lex_number(),
            b if is_identifier_start(b) => self.lex_identifier_or_keyword(),
            b'`' => self.lex_string_literal(b'`').map(Token::Identifier),
            _ => self.lex_punctuation(),
        }
    }

    fn lex_variable(&mut self) -> ParseResult<Token> {
        self.advance();
        if self.match_word("this") {
            return Ok(Token::DollarThis);
        }
        if self.match_word("index") {
            return Ok(Token::DollarIndex);
        }
        if self.match_word("total") {
            return Ok(Token::DollarTotal);
        }
        Ok(Token::Dollar)
    }

    fn match_word(&mut self, word: &str) -> bool {
        let rest = &self.input[self.pos..];
        if rest.starts_with(word) {
            let after = rest.as_bytes().get(word.len()).copied();
            if after.map_or(true, |b| !is_identifier_continue(b)) {
                for _ in 0..word.len() {
                    self.advance();
                }
                return true;
            }
        }
        false
    }

    fn lex_string_literal(&mut self, quote: u8) -> ParseResult<String> {
        let (start, line, col) = self.current_span_start();
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::UnclosedString {
                        span: SourceSpan::new(start, self.pos, line, col),
                    });
                }
                Some(b) if b == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    out.push(self.lex_escape()?);
                }
                Some(_) => {
                    let ch_start = self.pos;
                    let ch = self.input[ch_start..].chars().next().unwrap();
                    for _ in 0..ch.len_utf8() {
                        self.advance();
                    }
                    out.push(ch);
                }
            }
        }
        Ok(out)
    }

    fn lex_escape(&mut self) -> ParseResult<char> {
        let (start, line, col) = self.current_span_start();
        match self.advance() {
            Some(b'\\') => Ok('\\'),
            Some(b'\'') => Ok('\''),
            Some(b'"') => Ok('"'),
            Some(b'`') => Ok('`'),
            Some(b'n') => Ok('\n'),
            Some(b'r') => Ok('\r'),
            Some(b't') => Ok('\t'),
            Some(b'f') => Ok('\u{000C}'),
            Some(b'/') => Ok('/'),
            Some(b'u') => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = self.advance().ok_or(ParseError::InvalidEscape {
                        span: SourceSpan::new(start, self.pos, line, col),
                        escape: "\\u".to_string(),
                    })?;
                    let value = (digit as char)
                        .to_digit(16)
                        .ok_or_else(|| ParseError::InvalidEscape {
                            span: SourceSpan::new(start, self.pos, line, col),
                            escape: "\\u".to_string(),
                        })?;
                    code = code * 16 + value;
                }
                char::from_u32(code).ok_or(ParseError::InvalidEscape {
                    span: SourceSpan::new(start, self.pos, line, col),
                    escape: format!("\\u{code:04x}"),
                })
            }
            other => Err(ParseError::InvalidEscape {
                span: SourceSpan::new(start, self.pos, line, col),
                escape: other.map(|b| (b as char).to_string()).unwrap_or_default(),
            }),
        }
    }

    fn lex_number(&mut self) -> ParseResult<Token> {
        let (start, line, col) = self.current_span_start();
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        let mut is_decimal = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_decimal = true;
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        let text = &self.input[start..self.pos];
        if is_decimal {
            return Ok(self.maybe_quantity(text.to_string(), true));
        }
        if self.peek() == Some(b'L') {
            self.advance();
            let value = text.parse::<i128>().map_err(|_| ParseError::InvalidNumber {
                span: SourceSpan::new(start, self.pos, line, col),
                text: text.to_string(),
            })?;
            return Ok(Token::Long(value));
        }
        match text.parse::<i64>() {
            Ok(v) => Ok(self.maybe_quantity_int(v, text.to_string())),
            Err(_) => Err(ParseError::InvalidNumber {
                span: SourceSpan::new(start, self.pos, line, col),
                text: text.to_string(),
            }),
        }
    }

    fn maybe_quantity_int(&mut self, value: i64, text: String) -> Token {
        self.skip_inline_space();
        if let Some(unit) = self.try_lex_unit() {
            return Token::Quantity { value: text, unit };
        }
        Token::Integer(value)
    }

    fn maybe_quantity(&mut self, text: String, _is_decimal: bool) -> Token {
        self.skip_inline_space();
        if let Some(unit) = self.try_lex_unit() {
            return Token::Quantity { value: text, unit };
        }
        Token::Decimal(text)
    }

    fn skip_inline_space(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }

    fn try_lex_unit(&mut self) -> Option<String> {
        match self.peek() {
            Some(b'\'') => self.lex_string_literal(b'\'').ok(),
            Some(b) if is_identifier_start(b) => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if is_identifier_continue(b)) {
                    self.advance();
                }
                let word = &self.input[start..self.pos];
                const CALENDAR_WORDS: &[&str] = &[
                    "year", "years", "month", "months", "week", "weeks", "day", "days", "hour",
                    "hours", "minute", "minutes", "second", "seconds", "millisecond",
                    "milliseconds",
                ];
                if CALENDAR_WORDS.contains(&word) {
                    Some(word.to_string())
                } else {
                    self.pos = start;
                    None
                }
            }
            _ => None,
        }
    }

    fn lex_temporal_literal(&mut self) -> ParseResult<Token> {
        let (start, line, col) = self.current_span_start();
        self.advance();
        let text_start = self.pos;
        if self.peek() == Some(b'T') {
            self.advance();
            while matches!(self.peek(), Some(b) if b.is_ascii_digit() || matches!(b, b':' | b'.' | b'+' | b'-' | b'Z')) {
                self.advance();
            }
            return Ok(Token::Time(self.input[text_start..self.pos].to_string()));
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b':' | b'.' | b'T' | b'+' | b'Z')) {
            self.advance();
        }
        let text = self.input[text_start..self.pos].to_string();
        if text.is_empty() {
            return Err(ParseError::InvalidDateTime {
                span: SourceSpan::new(start, self.pos, line, col),
                text,
            });
        }
        if text.contains('T') {
            Ok(Token::DateTime(text))
        } else {
            Ok(Token::Date(text))
        }
    }

    fn lex_identifier_or_keyword(&mut self) -> ParseResult<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_identifier_continue(b)) {
            self.advance();
        }
        let word = &self.input[start..self.pos];
        Ok(keyword_or_identifier(word))
    }

    fn lex_punctuation(&mut self) -> ParseResult<Token> {
        let (start, line, col) = self.current_span_start();
        let b = self.advance().unwrap();
        let token = match b {
            b'+' => Token::Plus,
            b'-' => {
                if self.peek() == Some(b'>') {
                    self.advance();
                    Token::Arrow
                } else {
                    Token::Minus
                }
            }
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'^' => Token::Caret,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::Equivalent
                } else if self.peek() == Some(b'>') {
                    self.advance();
                    Token::Arrow
                } else {
                    Token::Equal
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::NotEqual
                } else if self.peek() == Some(b'~') {
                    self.advance();
                    Token::NotEquivalent
                } else {
                    return Err(ParseError::Lex {
                        span: SourceSpan::new(start, self.pos, line, col),
                        reason: "unexpected '!'".to_string(),
                    });
                }
            }
            b'~' => Token::Equivalent,
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::LessOrEqual
                } else {
                    Token::Less
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    Token::GreaterOrEqual
                } else {
                    Token::Greater
                }
            }
            b'|' => Token::Pipe,
            b'&' => Token::Ampersand,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'.' => Token::Dot,
            b',' => Token::Comma,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            other => {
                return Err(ParseError::Lex {
                    span: SourceSpan::new(start, self.pos, line, col),
                    reason: format!("unexpected character '{}'", other as char),
                });
            }
        };
        Ok(token)
    }
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_identifier_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword_or_identifier(word: &str) -> Token {
    match word {
        "true" => Token::Boolean(true),
        "false" => Token::Boolean(false),
        "null" => Token::Null,
        "and" => Token::And,
        "or" => Token::Or,
        "xor" => Token::Xor,
        "implies" => Token::Implies,
        "not" => Token::Not,
        "in" => Token::In,
        "contains" => Token::Contains,
        "is" => Token::Is,
        "as" => Token::As,
        "mod" => Token::Mod,
        "div" => Token::Div,
        "define" => Token::Define,
        "function" => Token::Function,
        "context" => Token::Context,
        "library" => Token::Library,
        "using" => Token::Using,
        "include" => Token::Include,
        "called" => Token::Called,
        "version" => Token::Version,
        "parameter" => Token::Parameter,
        "default" => Token::Default,
        "valueset" => Token::Valueset,
        "codesystem" => Token::Codesystem,
        "code" => Token::CodeKw,
        "concept" => Token::ConceptKw,
        "public" => Token::Public,
        "private" => Token::Private,
        "where" => Token::Where,
        "return" => Token::Return,
        "distinct" => Token::Distinct,
        "with" => Token::With,
        "without" => Token::Without,
        "let" => Token::Let,
        "sort" => Token::Sort,
        "by" => Token::By,
        "asc" => Token::Asc,
        "ascending" => Token::Asc,
        "desc" => Token::Desc,
        "descending" => Token::Desc,
        "from" => Token::From,
        "such" => Token::Such,
        "that" => Token::That,
        "if" => Token::If,
        "then" => Token::Then,
        "else" => Token::Else,
        "case" => Token::Case,
        "when" => Token::When,
        "end" => Token::End,
        "exists" => Token::Exists,
        "aggregate" => Token::Aggregate,
        "starting" => Token::Starting,
        "tuple" => Token::Tuple,
        "list" => Token::List,
        "interval" => Token::Interval,
        "between" => Token::Between,
        "difference" => Token::Difference,
        _ => Token::Identifier(word.to_string()),
    }
}

/// nom-based helper retained for numeric sub-grammars that benefit from
/// combinator composition (exponent suffixes in scientific literals, should
/// the grammar grow to need them).
#[allow(dead_code)]
fn signed_digits(input: &str) -> IResult<&str, &str> {
    recognize(tuple((nom::combinator::opt(one_of("+-")), digit1)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Tokenizer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn tokenizes_arithmetic_expression() {
        assert_eq!(
            tokens("1 + 2 * 3"),
            vec![
                Token::Integer(1),
                Token::Plus,
                Token::Integer(2),
                Token::Star,
                Token::Integer(3),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_quantity_literal() {
        assert_eq!(
            tokens("150 '[lb_av]'"),
            vec![
                Token::Quantity {
                    value: "150".to_string(),
                    unit: "[lb_av]".to_string()
                },
                Token::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_calendar_quantity_without_quotes() {
        assert_eq!(
            tokens("3 years"),
            vec![
                Token::Quantity {
                    value: "3".to_string(),
                    unit: "years".to_string()
                },
                Token::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_date_and_datetime_literals() {
        assert_eq!(
            tokens("@1990-01-01"),
            vec![Token::Date("1990-01-01".to_string()), Token::Eof]
        );
        assert_eq!(
            tokens("@2024-06-15T00:00:00Z"),
            vec![
                Token::DateTime("2024-06-15T00:00:00Z".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn tokenizes_string_with_escapes() {
        assert_eq!(
            tokens(r"'a\nb'"),
            vec![Token::String("a\nb".to_string()), Token::Eof]
        );
    }

    #[test]
    fn delimited_identifier_is_distinct_from_string() {
        assert_eq!(
            tokens("\"DM\""),
            vec![Token::DelimitedIdentifier("DM".to_string()), Token::Eof]
        );
    }

    #[test]
    fn recognizes_dollar_variables() {
        assert_eq!(
            tokens("$this $index $total"),
            vec![
                Token::DollarThis,
                Token::DollarIndex,
                Token::DollarTotal,
                Token::Eof
            ]
        );
    }
}
