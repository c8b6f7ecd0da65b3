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

//! Recursive-descent parser with Pratt precedence climbing for binary and
//! unary operators.
//!
//! The parser never returns partial success silently: [`Parser::parse_expression`]
//! either returns a complete tree, or accumulates [`Diagnostic`]s into
//! `self.diagnostics` and returns a best-effort tree rooted at an error
//! placeholder so the caller always has something to lower.

use crate::lexer::{SpannedToken, Token, Tokenizer};
use octofhir_cql_ast::*;
use octofhir_cql_diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, SourceSpan};
use smallvec::SmallVec;

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    pub diagnostics: Diagnostics,
}

/// Binding power pair for Pratt parsing: `(left, right)`. A `right < left`
/// makes the operator left-associative (the common case); reversing makes
/// it right-associative.
fn binary_binding_power(token: &Token) -> Option<(BinaryOperator, u8, u8)> {
    use Token::*;
    Some(match token {
        Implies => (BinaryOperator::Implies, 1, 2),
        Or => (BinaryOperator::Or, 3, 4),
        Xor => (BinaryOperator::Xor, 3, 4),
        And => (BinaryOperator::And, 5, 6),
        In => (BinaryOperator::In, 7, 8),
        Contains => (BinaryOperator::Contains, 7, 8),
        Equal => (BinaryOperator::Equal, 9, 10),
        NotEqual => (BinaryOperator::NotEqual, 9, 10),
        Equivalent => (BinaryOperator::Equivalent, 9, 10),
        NotEquivalent => (BinaryOperator::NotEquivalent, 9, 10),
        Less => (BinaryOperator::Less, 11, 12),
        Greater => (BinaryOperator::Greater, 11, 12),
        LessOrEqual => (BinaryOperator::LessOrEqual, 11, 12),
        GreaterOrEqual => (BinaryOperator::GreaterOrEqual, 11, 12),
        Pipe => (BinaryOperator::Union, 13, 14),
        Ampersand => (BinaryOperator::Concat, 15, 16),
        Plus => (BinaryOperator::Add, 17, 18),
        Minus => (BinaryOperator::Subtract, 17, 18),
        Star => (BinaryOperator::Multiply, 19, 20),
        Slash => (BinaryOperator::Divide, 19, 20),
        Div => (BinaryOperator::TruncatedDivide, 19, 20),
        Mod => (BinaryOperator::Modulo, 19, 20),
        Caret => (BinaryOperator::Power, 23, 22), // right-associative
        _ => return None,
    })
}

const UNARY_BINDING_POWER: u8 = 21;
const POSTFIX_BINDING_POWER: u8 = 25;

impl Parser {
    pub fn new(input: &str) -> Result<Self, crate::error::ParseError> {
        let tokens = Tokenizer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            diagnostics: Diagnostics::new(),
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    /// True at `<precision> between ...` (e.g. `years between a and b`), the
    /// one construct where a bare identifier is a reserved precision word
    /// rather than an expression.
    fn at_duration_between_prefix(&self) -> bool {
        matches!(self.peek(), Token::Identifier(name) if duration_precision(name).is_some())
            && matches!(self.peek_at(1), Token::Between)
    }

    fn peek_at(&self, offset: usize) -> Token {
        self.tokens.get(self.pos + offset).map(|t| t.token.clone()).unwrap_or(Token::Eof)
    }

    fn peek_span(&self) -> SourceSpan {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn expect(&mut self, expected: &Token, label: &str) -> bool {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(expected) {
            self.advance();
            true
        } else {
            let found = format!("{:?}", self.peek());
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::ExpectedToken,
                    format!("expected {label}, found {found}"),
                )
                .with_span(self.peek_span()),
            );
            false
        }
    }

    fn error_node(&mut self, message: impl Into<String>) -> ExpressionNode {
        self.diagnostics.push(
            Diagnostic::error(DiagnosticCode::UnexpectedToken, message).with_span(self.peek_span()),
        );
        ExpressionNode::Literal(LiteralValue::Null)
    }

    /// Recover to the next statement boundary (`define`, `context`, EOF) so
    /// a library with one broken definition still yields the rest.
    fn recover_to_statement_boundary(&mut self) {
        while !self.at_eof() && !matches!(self.peek(), Token::Define | Token::Context) {
            self.advance();
        }
    }

    pub fn parse_expression(&mut self) -> ExpressionNode {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_bp: u8) -> ExpressionNode {
        let mut lhs = self.parse_unary();
        loop {
            let Some((op, left_bp, right_bp)) = binary_binding_power(self.peek()) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(right_bp);
            lhs = ExpressionNode::binary_op(op, lhs, rhs);
        }
        lhs
    }

    fn parse_unary(&mut self) -> ExpressionNode {
        match self.peek() {
            Token::Minus => {
                self.advance();
                let operand = self.parse_binary(UNARY_BINDING_POWER);
                ExpressionNode::unary_op(UnaryOperator::Negate, operand)
            }
            Token::Plus => {
                self.advance();
                let operand = self.parse_binary(UNARY_BINDING_POWER);
                ExpressionNode::unary_op(UnaryOperator::Positive, operand)
            }
            Token::Not => {
                self.advance();
                let operand = self.parse_binary(UNARY_BINDING_POWER);
                ExpressionNode::unary_op(UnaryOperator::Not, operand)
            }
            Token::Exists => {
                self.advance();
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let inner = self.parse_expression();
                    self.expect(&Token::RParen, ")");
                    ExpressionNode::Exists(Box::new(inner))
                } else {
                    let inner = self.parse_binary(UNARY_BINDING_POWER);
                    ExpressionNode::Exists(Box::new(inner))
                }
            }
            Token::If => self.parse_if(),
            Token::Case => self.parse_case(),
            Token::Difference => self.parse_difference_between(),
            _ if self.at_duration_between_prefix() => {
                let precision = match self.advance() {
                    Token::Identifier(name) => duration_precision(&name).unwrap_or("day"),
                    _ => "day",
                };
                self.advance(); // `between`
                self.parse_between_tail("DurationBetween", precision)
            }
            _ => self.parse_postfix(),
        }
    }

    /// `difference in <precision> between <a> and <b>`; calendar "difference"
    /// truncates a partial final unit where elapsed "duration" would count it.
    fn parse_difference_between(&mut self) -> ExpressionNode {
        self.advance();
        self.expect(&Token::In, "'in'");
        let precision = match self.advance() {
            Token::Identifier(name) => duration_precision(&name).unwrap_or("day"),
            other => {
                self.diagnostics.push(
                    Diagnostic::error(DiagnosticCode::ExpectedToken, format!("expected duration precision, found {other:?}"))
                        .with_span(self.peek_span()),
                );
                "day"
            }
        };
        self.expect(&Token::Between, "'between'");
        self.parse_between_tail("DifferenceBetween", precision)
    }

    /// Shared tail for `<op> between <a> and <b>`, parsed at a binding power
    /// above `and`/`or` so the separator `and` is never mistaken for the
    /// boolean operator.
    fn parse_between_tail(&mut self, function_name: &str, precision: &str) -> ExpressionNode {
        const BETWEEN_OPERAND_BP: u8 = 7;
        let low = self.parse_binary(BETWEEN_OPERAND_BP);
        self.expect(&Token::And, "'and'");
        let high = self.parse_binary(BETWEEN_OPERAND_BP);
        let args = SmallVec::from_vec(vec![
            Argument { name: None, value: low },
            Argument { name: None, value: high },
            Argument { name: None, value: ExpressionNode::literal(LiteralValue::String(precision.to_string())) },
        ]);
        ExpressionNode::function_call(function_name, args)
    }

    fn parse_if(&mut self) -> ExpressionNode {
        self.advance();
        let condition = self.parse_expression();
        self.expect(&Token::Then, "'then'");
        let then_expr = self.parse_expression();
        let else_expr = if matches!(self.peek(), Token::Else) {
            self.advance();
            self.parse_expression()
        } else {
            ExpressionNode::Literal(LiteralValue::Null)
        };
        ExpressionNode::conditional(condition, then_expr, else_expr)
    }

    fn parse_case(&mut self) -> ExpressionNode {
        self.advance();
        let selector = if matches!(self.peek(), Token::When) {
            None
        } else {
            Some(self.parse_expression())
        };
        let mut items = Vec::new();
        while matches!(self.peek(), Token::When) {
            self.advance();
            let when = self.parse_expression();
            self.expect(&Token::Then, "'then'");
            let then = self.parse_expression();
            items.push(CaseItem { when, then });
        }
        self.expect(&Token::Else, "'else'");
        let else_expr = self.parse_expression();
        self.expect(&Token::End, "'end'");
        ExpressionNode::Case(Box::new(CaseData {
            selector,
            items,
            else_expr,
        }))
    }

    fn parse_postfix(&mut self) -> ExpressionNode {
        let mut expr = self.parse_primary();
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    expr = self.parse_member_access(expr);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expression();
                    self.expect(&Token::RBracket, "']'");
                    expr = ExpressionNode::index(expr, index);
                }
                Token::Is => {
                    self.advance();
                    let type_name = self.parse_type_name();
                    expr = ExpressionNode::type_check(expr, type_name);
                }
                Token::As => {
                    self.advance();
                    let type_name = self.parse_type_name();
                    expr = ExpressionNode::type_cast(expr, type_name);
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_type_name(&mut self) -> String {
        match self.advance() {
            Token::Identifier(name) => name,
            other => {
                self.diagnostics.push(
                    Diagnostic::error(DiagnosticCode::ExpectedToken, format!("expected type name, found {other:?}"))
                        .with_span(self.peek_span()),
                );
                String::new()
            }
        }
    }

    fn parse_member_access(&mut self, base: ExpressionNode) -> ExpressionNode {
        let name = match self.advance() {
            Token::Identifier(name) => name,
            Token::DelimitedIdentifier(name) => name,
            other => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticCode::ExpectedToken,
                        format!("expected member name, found {other:?}"),
                    )
                    .with_span(self.peek_span()),
                );
                return base;
            }
        };
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let args = self.parse_arguments();
            self.expect(&Token::RParen, "')'");
            ExpressionNode::method_call(base, name, args)
        } else {
            ExpressionNode::path(base, name)
        }
    }

    fn parse_arguments(&mut self) -> SmallVec<[Argument; 4]> {
        let mut args = SmallVec::new();
        if matches!(self.peek(), Token::RParen) {
            return args;
        }
        loop {
            let name = if let Token::Identifier(ident) = self.peek().clone() {
                if self.tokens.get(self.pos + 1).map(|t| &t.token) == Some(&Token::Colon) {
                    self.advance();
                    self.advance();
                    Some(ident)
                } else {
                    None
                }
            } else {
                None
            };
            let value = self.parse_expression();
            args.push(Argument { name, value });
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> ExpressionNode {
        match self.advance() {
            Token::Integer(v) => ExpressionNode::literal(LiteralValue::Integer(v)),
            Token::Long(v) => ExpressionNode::literal(LiteralValue::Long(v)),
            Token::Decimal(v) => ExpressionNode::literal(LiteralValue::Decimal(v)),
            Token::String(v) => ExpressionNode::literal(LiteralValue::String(v)),
            Token::Boolean(v) => ExpressionNode::literal(LiteralValue::Boolean(v)),
            Token::Date(v) => ExpressionNode::literal(LiteralValue::Date(v)),
            Token::DateTime(v) => ExpressionNode::literal(LiteralValue::DateTime(v)),
            Token::Time(v) => ExpressionNode::literal(LiteralValue::Time(v)),
            Token::Quantity { value, unit } => ExpressionNode::literal(LiteralValue::Quantity { value, unit }),
            Token::Null => ExpressionNode::literal(LiteralValue::Null),
            Token::DollarThis => ExpressionNode::variable("$this"),
            Token::DollarIndex => ExpressionNode::variable("$index"),
            Token::DollarTotal => ExpressionNode::variable("$total"),
            Token::LParen => {
                let expr = self.parse_expression();
                self.expect(&Token::RParen, "')'");
                expr
            }
            Token::LBrace => self.parse_list_literal(),
            Token::LBracket => self.parse_retrieve(),
            Token::Tuple => self.parse_tuple_literal(),
            Token::List => self.parse_typed_list_literal(),
            Token::Interval => self.parse_interval_literal(),
            Token::Identifier(name) => self.parse_identifier_led(name),
            Token::Colon => {
                // CQL parameter reference: `%name` is not used; bare `:` is malformed here.
                self.error_node("unexpected ':'")
            }
            other => self.error_node(format!("unexpected token {other:?}")),
        }
    }

    fn parse_identifier_led(&mut self, name: String) -> ExpressionNode {
        if matches!(self.peek(), Token::LParen) {
            self.advance();
            let args = self.parse_arguments();
            self.expect(&Token::RParen, "')'");
            return ExpressionNode::function_call(name, args);
        }
        if matches!(self.peek(), Token::Dot) && name == "from" {
            // `from` handled by query parsing; not reachable in expression position.
        }
        ExpressionNode::identifier(name)
    }

    fn parse_list_literal(&mut self) -> ExpressionNode {
        // A bare `{from ... where ...}` is a query; otherwise this is a list literal.
        if matches!(self.peek(), Token::From) || self.looks_like_query() {
            return self.parse_query_body();
        }
        let mut elements = Vec::new();
        if !matches!(self.peek(), Token::RBrace) {
            loop {
                elements.push(self.parse_expression());
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace, "'}'");
        ExpressionNode::ListLiteral {
            element_type: None,
            elements,
        }
    }

    fn looks_like_query(&self) -> bool {
        // Single identifier immediately followed by `in`/`from` marks a query
        // source clause (`{c in [Condition] where ...}`); a plain list
        // literal never has a bare `in`/`from` at top level.
        matches!(self.peek(), Token::Identifier(_))
            && matches!(
                self.tokens.get(self.pos + 1).map(|t| &t.token),
                Some(Token::In) | Some(Token::From)
            )
    }

    fn parse_query_body(&mut self) -> ExpressionNode {
        let sources = self.parse_query_sources();
        let mut relationships = Vec::new();
        while matches!(self.peek(), Token::With) || matches!(self.peek(), Token::Without) {
            let negate = matches!(self.peek(), Token::Without);
            self.advance();
            let source = self.parse_single_source();
            self.expect(&Token::Such, "'such'");
            self.expect(&Token::That, "'that'");
            let condition = self.parse_expression();
            relationships.push(RelationshipClause {
                negate,
                source,
                condition,
            });
        }
        let mut lets = Vec::new();
        while matches!(self.peek(), Token::Let) {
            self.advance();
            let name = self.parse_plain_identifier();
            self.expect(&Token::Colon, "':'");
            let expression = self.parse_expression();
            lets.push(LetClause { name, expression });
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            }
        }
        let where_clause = if matches!(self.peek(), Token::Where) {
            self.advance();
            Some(self.parse_expression())
        } else {
            None
        };
        let mut return_distinct = false;
        let return_clause = if matches!(self.peek(), Token::Return) {
            self.advance();
            if matches!(self.peek(), Token::Distinct) {
                return_distinct = true;
                self.advance();
            }
            Some(self.parse_expression())
        } else {
            None
        };
        let sort = if matches!(self.peek(), Token::Sort) {
            self.advance();
            if matches!(self.peek(), Token::By) {
                self.advance();
            }
            let mut items = Vec::new();
            loop {
                let expression = self.parse_expression();
                let direction = match self.peek() {
                    Token::Asc => {
                        self.advance();
                        SortDirection::Ascending
                    }
                    Token::Desc => {
                        self.advance();
                        SortDirection::Descending
                    }
                    _ => SortDirection::Ascending,
                };
                items.push(SortItem { expression, direction });
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            items
        } else {
            Vec::new()
        };
        self.expect(&Token::RBrace, "'}'");
        ExpressionNode::Query(Box::new(QueryData {
            sources,
            relationships,
            lets,
            where_clause,
            return_clause,
            return_distinct,
            aggregate_clause: None,
            sort,
        }))
    }

    fn parse_query_sources(&mut self) -> Vec<QuerySource> {
        let mut sources = vec![self.parse_single_source()];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            sources.push(self.parse_single_source());
        }
        sources
    }

    fn parse_single_source(&mut self) -> QuerySource {
        let alias = self.parse_plain_identifier();
        let expression = if matches!(self.peek(), Token::In) {
            self.advance();
            self.parse_binary(UNARY_BINDING_POWER)
        } else if matches!(self.peek(), Token::From) {
            self.advance();
            self.parse_binary(UNARY_BINDING_POWER)
        } else {
            // Bare `[Condition]` with no alias: use the retrieve itself and
            // synthesize `$this` as the alias.
            self.parse_binary(UNARY_BINDING_POWER)
        };
        QuerySource { alias, expression }
    }

    fn parse_plain_identifier(&mut self) -> String {
        match self.advance() {
            Token::Identifier(name) => name,
            Token::DelimitedIdentifier(name) => name,
            other => {
                self.diagnostics.push(
                    Diagnostic::error(DiagnosticCode::ExpectedToken, format!("expected identifier, found {other:?}"))
                        .with_span(self.peek_span()),
                );
                String::new()
            }
        }
    }

    fn parse_tuple_literal(&mut self) -> ExpressionNode {
        self.expect(&Token::LBrace, "'{'");
        let mut fields = Vec::new();
        if !matches!(self.peek(), Token::RBrace) {
            loop {
                let name = self.parse_plain_identifier();
                self.expect(&Token::Colon, "':'");
                let value = self.parse_expression();
                fields.push((name, value));
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace, "'}'");
        ExpressionNode::TupleLiteral(fields)
    }

    fn parse_typed_list_literal(&mut self) -> ExpressionNode {
        let element_type = if matches!(self.peek(), Token::Less) {
            self.advance();
            let name = self.parse_type_name();
            self.expect(&Token::Greater, "'>'");
            Some(name)
        } else {
            None
        };
        self.expect(&Token::LBrace, "'{'");
        let mut elements = Vec::new();
        if !matches!(self.peek(), Token::RBrace) {
            loop {
                elements.push(self.parse_expression());
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace, "'}'");
        ExpressionNode::ListLiteral { element_type, elements }
    }

    fn parse_interval_literal(&mut self) -> ExpressionNode {
        let low_closed = match self.peek() {
            Token::LBracket => {
                self.advance();
                true
            }
            Token::LParen => {
                self.advance();
                false
            }
            _ => {
                self.expect(&Token::LBracket, "'[' or '('");
                true
            }
        };
        let low = self.parse_expression();
        self.expect(&Token::Comma, "','");
        let high = self.parse_expression();
        let high_closed = match self.peek() {
            Token::RBracket => {
                self.advance();
                true
            }
            Token::RParen => {
                self.advance();
                false
            }
            _ => {
                self.expect(&Token::RBracket, "']' or ')'");
                true
            }
        };
        ExpressionNode::IntervalLiteral(Box::new(IntervalLiteralData {
            low,
            high,
            low_closed,
            high_closed,
        }))
    }

    fn parse_retrieve(&mut self) -> ExpressionNode {
        let resource_type = self.parse_type_name();
        let mut code_filter = None;
        let mut code_path = None;
        if matches!(self.peek(), Token::Colon) {
            self.advance();
            if let Token::Identifier(path) = self.peek().clone() {
                if self.tokens.get(self.pos + 1).map(|t| &t.token) == Some(&Token::Colon) {
                    self.advance();
                    self.advance();
                    code_path = Some(path);
                }
            }
            code_filter = Some(self.parse_expression());
        }
        self.expect(&Token::RBracket, "']'");
        ExpressionNode::Retrieve(Box::new(RetrieveData {
            resource_type,
            code_filter,
            code_path,
        }))
    }

    /// Parse a standalone library (CQL source file): declarations followed
    /// by `define`d expressions and functions.
    pub fn parse_library(&mut self) -> LibraryAst {
        let mut library = LibraryAst::new();
        if matches!(self.peek(), Token::Library) {
            self.advance();
            let id = self.parse_plain_identifier();
            let version = self.parse_optional_version();
            library.identifier = Some(LibraryIdentifier { id, version });
        }
        let mut current_context: Option<String> = None;
        while !self.at_eof() {
            match self.peek().clone() {
                Token::Using => {
                    self.advance();
                    let model = self.parse_plain_identifier();
                    let version = self.parse_optional_version();
                    library.usings.push(UsingDef { model, version });
                }
                Token::Include => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    let version = self.parse_optional_version();
                    let alias = if matches!(self.peek(), Token::Called) {
                        self.advance();
                        self.parse_plain_identifier()
                    } else {
                        name.clone()
                    };
                    library.includes.push(IncludeDef { name, version, alias });
                }
                Token::Parameter => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    let declared_type = self.parse_optional_type_annotation();
                    let default = if matches!(self.peek(), Token::Default) {
                        self.advance();
                        Some(self.parse_expression())
                    } else {
                        None
                    };
                    library.parameters.push(ParameterDef { name, declared_type, default });
                }
                Token::Codesystem => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    self.expect(&Token::Colon, "':'");
                    let id = self.parse_plain_string();
                    let version = self.parse_optional_version();
                    library.code_systems.push(CodeSystemDef { name, id, version });
                }
                Token::Valueset => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    self.expect(&Token::Colon, "':'");
                    let id = self.parse_plain_string();
                    let version = self.parse_optional_version();
                    library.valuesets.push(ValuesetDef {
                        name,
                        id,
                        version,
                        code_systems: Vec::new(),
                    });
                }
                Token::CodeKw => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    self.expect(&Token::Colon, "':'");
                    let code = self.parse_plain_string();
                    self.expect(&Token::From, "'from'");
                    let system = self.parse_plain_identifier();
                    library.codes.push(CodeDef { name, code, system, display: None });
                }
                Token::Context => {
                    self.advance();
                    let name = self.parse_plain_identifier();
                    current_context = Some(name.clone());
                    library.contexts.push(ContextDef { name });
                }
                Token::Define => {
                    self.advance();
                    let is_public = !matches!(self.peek(), Token::Private);
                    if matches!(self.peek(), Token::Public | Token::Private) {
                        self.advance();
                    }
                    if matches!(self.peek(), Token::Function) {
                        self.advance();
                        let name = self.parse_plain_identifier();
                        self.expect(&Token::LParen, "'('");
                        let params = self.parse_function_params();
                        self.expect(&Token::RParen, "')'");
                        self.parse_optional_type_annotation();
                        self.expect(&Token::Colon, "':'");
                        let body = self.parse_expression();
                        library.functions.push(FunctionDef {
                            name,
                            context: current_context.clone(),
                            is_public,
                            params,
                            body,
                        });
                    } else {
                        let name = self.parse_plain_identifier();
                        self.expect(&Token::Colon, "':'");
                        let expression = self.parse_expression();
                        library.expressions.push(ExpressionDef {
                            name,
                            context: current_context.clone(),
                            is_public,
                            expression,
                        });
                    }
                }
                Token::Eof => break,
                _ => {
                    self.diagnostics.push(
                        Diagnostic::error(
                            DiagnosticCode::ParseError,
                            format!("unexpected top-level token {:?}", self.peek()),
                        )
                        .with_span(self.peek_span()),
                    );
                    self.recover_to_statement_boundary();
                }
            }
        }
        library
    }

    fn parse_optional_version(&mut self) -> Option<String> {
        if matches!(self.peek(), Token::Version) {
            self.advance();
            Some(self.parse_plain_string())
        } else {
            None
        }
    }

    fn parse_optional_type_annotation(&mut self) -> Option<String> {
        if matches!(self.peek(), Token::Identifier(_)) {
            Some(self.parse_type_name())
        } else {
            None
        }
    }

    fn parse_plain_string(&mut self) -> String {
        match self.advance() {
            Token::String(s) => s,
            other => {
                self.diagnostics.push(
                    Diagnostic::error(DiagnosticCode::ExpectedToken, format!("expected string literal, found {other:?}"))
                        .with_span(self.peek_span()),
                );
                String::new()
            }
        }
    }

    fn parse_function_params(&mut self) -> Vec<FunctionParameter> {
        let mut params = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            return params;
        }
        loop {
            let name = self.parse_plain_identifier();
            let declared_type = self.parse_optional_type_annotation();
            params.push(FunctionParameter { name, declared_type });
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        params
    }
}

/// Normalizes `years`/`year` (and the other calendar precision words) to the
/// singular form the evaluator's precision dispatch matches on; `None` for
/// anything else so the caller can tell a precision word from a plain
/// identifier used in expression position.
fn duration_precision(word: &str) -> Option<&'static str> {
    Some(match word {
        "year" | "years" => "year",
        "month" | "months" => "month",
        "week" | "weeks" => "week",
        "day" | "days" => "day",
        "hour" | "hours" => "hour",
        "minute" | "minutes" => "minute",
        "second" | "seconds" => "second",
        "millisecond" | "milliseconds" => "millisecond",
        _ => return None,
    })
}

/// Parse a single FHIRPath/CQL expression, returning the tree plus whatever
/// diagnostics accumulated (always either a complete tree with an empty
/// diagnostic list, or a best-effort tree with a non-empty one).
pub fn parse_expression(input: &str) -> (ExpressionNode, Diagnostics) {
    match Parser::new(input) {
        Ok(mut parser) => {
            let expr = parser.parse_expression();
            (expr, parser.diagnostics)
        }
        Err(err) => {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(Diagnostic::error(DiagnosticCode::LexError, err.to_string()));
            (ExpressionNode::Literal(LiteralValue::Null), diagnostics)
        }
    }
}

/// Parse a full CQL library source.
pub fn parse_library(input: &str) -> (LibraryAst, Diagnostics) {
    match Parser::new(input) {
        Ok(mut parser) => {
            let library = parser.parse_library();
            (library, parser.diagnostics)
        }
        Err(err) => {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(Diagnostic::error(DiagnosticCode::LexError, err.to_string()));
            (LibraryAst::new(), diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_matches_arithmetic_expectation() {
        let (expr, diags) = parse_expression("1 + 2 * 3");
        assert!(diags.is_empty());
        match expr {
            ExpressionNode::BinaryOp(data) => {
                assert_eq!(data.op, BinaryOperator::Add);
                assert_eq!(data.left, ExpressionNode::literal(LiteralValue::Integer(1)));
                match data.right {
                    ExpressionNode::BinaryOp(inner) => assert_eq!(inner.op, BinaryOperator::Multiply),
                    _ => panic!("expected nested multiply"),
                }
            }
            _ => panic!("expected BinaryOp"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let (expr, _) = parse_expression("true or false and true");
        match expr {
            ExpressionNode::BinaryOp(data) => assert_eq!(data.op, BinaryOperator::Or),
            _ => panic!("expected top-level Or"),
        }
    }

    #[test]
    fn path_and_method_call_chain() {
        let (expr, diags) = parse_expression("Patient.name.given.first()");
        assert!(diags.is_empty());
        assert!(matches!(expr, ExpressionNode::MethodCall(_)));
    }

    #[test]
    fn parses_if_then_else() {
        let (expr, diags) = parse_expression("if true then 1 else 2");
        assert!(diags.is_empty());
        assert!(matches!(expr, ExpressionNode::Conditional(_)));
    }

    #[test]
    fn parses_retrieve_with_valueset_filter() {
        let (expr, diags) = parse_expression("[Condition: \"DM\"]");
        assert!(diags.is_empty());
        match expr {
            ExpressionNode::Retrieve(data) => assert_eq!(data.resource_type, "Condition"),
            _ => panic!("expected Retrieve"),
        }
    }

    #[test]
    fn parses_simple_library_with_define() {
        let source = r#"
            library L using FHIR version '4.0.1'
            context Patient
            valueset "DM": 'vs/diabetes'
            define HasDM: exists([Condition: "DM"])
        "#;
        let (library, diags) = parse_library(source);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(library.identifier.unwrap().id, "L");
        assert_eq!(library.valuesets.len(), 1);
        assert_eq!(library.expressions.len(), 1);
        assert_eq!(library.expressions[0].name, "HasDM");
        assert_eq!(library.expressions[0].context.as_deref(), Some("Patient"));
    }

    #[test]
    fn error_recovery_yields_diagnostics_and_continues() {
        let source = r#"
            define X: (
            define Y: 1 + 1
        "#;
        let (library, diags) = parse_library(source);
        assert!(!diags.is_empty());
        assert!(library.expressions.iter().any(|d| d.name == "Y"));
    }

    #[test]
    fn parses_years_between_as_duration_between_with_precision() {
        let (expr, diags) = parse_expression("years between @1990-01-01 and @2024-06-15");
        assert!(diags.is_empty(), "{diags:?}");
        match expr {
            ExpressionNode::FunctionCall(data) => {
                assert_eq!(data.name, "DurationBetween");
                assert_eq!(data.args.len(), 3);
                assert_eq!(data.args[2].value, ExpressionNode::literal(LiteralValue::String("year".to_string())));
            }
            _ => panic!("expected FunctionCall"),
        }
    }

    #[test]
    fn parses_difference_in_days_between() {
        let (expr, diags) = parse_expression("difference in days between @2024-01-01 and @2024-01-10");
        assert!(diags.is_empty(), "{diags:?}");
        match expr {
            ExpressionNode::FunctionCall(data) => {
                assert_eq!(data.name, "DifferenceBetween");
                assert_eq!(data.args[2].value, ExpressionNode::literal(LiteralValue::String("day".to_string())));
            }
            _ => panic!("expected FunctionCall"),
        }
    }

    #[test]
    fn between_stops_before_a_following_and_operator() {
        let (expr, diags) = parse_expression("(years between @1990-01-01 and @2024-06-15) and true");
        assert!(diags.is_empty(), "{diags:?}");
        match expr {
            ExpressionNode::BinaryOp(data) => assert_eq!(data.op, BinaryOperator::And),
            _ => panic!("expected top-level And"),
        }
    }
}
