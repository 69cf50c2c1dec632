//! Recursive descent parser for executable GraphQL documents.

use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parser for operation text.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    errors: Vec<SyntaxError>,
}

/// Result of parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    /// Returns the document if parsing produced no errors.
    pub fn into_result(self) -> Result<Document, Vec<SyntaxError>> {
        if self.errors.is_empty() {
            Ok(self.document)
        } else {
            Err(self.errors)
        }
    }
}

/// Parses operation text into a document.
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        errors: parser.errors,
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            errors: Vec::new(),
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            self.error_expected(kind.as_str());
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors
            .push(SyntaxError::new(message, self.current.span));
    }

    fn error_expected(&mut self, expected: &str) {
        let message = format!("expected {}, found {}", expected, self.at());
        self.error(message);
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let start = self.current.span.start;
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            let before = self.errors.len();
            match self.parse_definition() {
                Some(def) => definitions.push(def),
                None => self.advance(),
            }
            // Stop after the first broken definition rather than cascading.
            if self.errors.len() > before {
                break;
            }
        }

        if definitions.is_empty() && self.errors.is_empty() {
            self.error("document does not contain any operation");
        }

        Document {
            definitions,
            span: Span::new(start, self.current.span.end),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        match self.at() {
            TokenKind::LBrace
            | TokenKind::Query
            | TokenKind::Mutation
            | TokenKind::Subscription => Some(Definition::Operation(self.parse_operation())),
            TokenKind::Fragment => Some(Definition::Fragment(self.parse_fragment_definition())),
            _ => {
                self.error_expected("operation or fragment definition");
                None
            }
        }
    }

    fn parse_name(&mut self) -> Name {
        let span = self.current.span;
        if self.at().is_name() {
            let value = self.current_text().to_string();
            self.advance();
            Name::new(value, span)
        } else {
            self.error_expected("name");
            Name::new(String::new(), span)
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        let (operation, name) = if self.at_kind(TokenKind::LBrace) {
            (OperationType::Query, None)
        } else {
            let op = match self.at() {
                TokenKind::Mutation => OperationType::Mutation,
                TokenKind::Subscription => OperationType::Subscription,
                _ => OperationType::Query,
            };
            self.advance();

            let name = if self.at().is_name() {
                Some(self.parse_name())
            } else {
                None
            };
            (op, name)
        };

        let variables = if self.at_kind(TokenKind::LParen) {
            self.advance();
            let mut vars = Vec::new();
            while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
                vars.push(self.parse_variable_definition());
            }
            self.expect(TokenKind::RParen);
            vars
        } else {
            Vec::new()
        };

        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variables,
            directives,
            selection_set,
            span: Span::new(start, self.current.span.start),
        }
    }

    fn parse_variable_definition(&mut self) -> VariableDefinition {
        let start = self.current.span.start;
        self.expect(TokenKind::Dollar);
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.at_kind(TokenKind::Eq) {
            self.advance();
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives();

        VariableDefinition {
            name,
            ty,
            default_value,
            directives,
            span: Span::new(start, self.current.span.start),
        }
    }

    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;
        let ty = if self.at_kind(TokenKind::LBracket) {
            self.advance();
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), Span::new(start, self.current.span.start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.at_kind(TokenKind::Bang) {
            self.advance();
            Type::NonNull(Box::new(ty), Span::new(start, self.current.span.start))
        } else {
            ty
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.advance(); // fragment

        let name = self.parse_name();
        if name.value == "on" {
            self.errors
                .push(SyntaxError::new("fragment cannot be named `on`", name.span));
        }
        self.expect(TokenKind::On);
        let type_condition = self.parse_name();
        let directives = self.parse_directives();
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: Span::new(start, self.current.span.start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        self.expect(TokenKind::LBrace);

        let mut selections = Vec::new();
        while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
            let before = self.errors.len();
            selections.push(self.parse_selection());
            if self.errors.len() > before {
                // Recovery: skip the offending token so the loop always advances.
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace);

        if selections.is_empty() {
            self.errors.push(SyntaxError::new(
                "selection set must not be empty",
                Span::new(start, self.current.span.start),
            ));
        }

        SelectionSet {
            selections,
            span: Span::new(start, self.current.span.start),
        }
    }

    fn parse_selection(&mut self) -> Selection {
        let start = self.current.span.start;
        if !self.at_kind(TokenKind::Spread) {
            return Selection::Field(self.parse_field());
        }

        self.advance();
        if self.at_kind(TokenKind::On) {
            self.advance();
            let type_condition = Some(self.parse_name());
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: Span::new(start, self.current.span.start),
            })
        } else if self.at_kind(TokenKind::LBrace) || self.at_kind(TokenKind::At) {
            let directives = self.parse_directives();
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: Span::new(start, self.current.span.start),
            })
        } else {
            let name = self.parse_name();
            let directives = self.parse_directives();
            Selection::FragmentSpread(FragmentSpread {
                name,
                directives,
                span: Span::new(start, self.current.span.start),
            })
        }
    }

    fn parse_field(&mut self) -> Field {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.at_kind(TokenKind::Colon) {
            self.advance();
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives();

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: Span::new(start, self.current.span.start),
        }
    }

    fn parse_directives(&mut self) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance();
            let name = self.parse_name();
            let arguments = self.parse_arguments(false);
            directives.push(Directive {
                name,
                arguments,
                span: Span::new(start, self.current.span.start),
            });
        }
        directives
    }

    fn parse_arguments(&mut self, constant: bool) -> Vec<Argument> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.advance();

        let mut args = Vec::new();
        while !self.at_kind(TokenKind::RParen) && !self.at_kind(TokenKind::Eof) {
            let start = self.current.span.start;
            let before = self.errors.len();
            let name = self.parse_name();
            self.expect(TokenKind::Colon);
            let value = self.parse_value(constant);
            args.push(Argument {
                name,
                value,
                span: Span::new(start, self.current.span.start),
            });
            if self.errors.len() > before {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        args
    }

    /// Parses a value; `constant` rejects variable references.
    fn parse_value(&mut self, constant: bool) -> Value {
        let start = self.current.span.start;

        match self.at() {
            TokenKind::Dollar => {
                if constant {
                    self.error("variables are not allowed in constant values");
                }
                self.advance();
                Value::Variable(self.parse_name())
            }
            TokenKind::IntLiteral => {
                let text = self.current_text();
                let value = match text.parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error(format!("integer literal `{text}` is out of range"));
                        0
                    }
                };
                self.advance();
                Value::Int(value, Span::new(start, self.current.span.start))
            }
            TokenKind::FloatLiteral => {
                let value = self.current_text().parse().unwrap_or(0.0);
                self.advance();
                Value::Float(value, Span::new(start, self.current.span.start))
            }
            TokenKind::StringLiteral => {
                let text = self.current_text();
                let value = match unescape(&text[1..text.len() - 1]) {
                    Some(value) => value,
                    None => {
                        self.error("invalid escape sequence in string literal");
                        String::new()
                    }
                };
                self.advance();
                Value::String(value, Span::new(start, self.current.span.start))
            }
            TokenKind::BlockStringLiteral => {
                let text = self.current_text();
                let value = block_string_value(&text[3..text.len() - 3]);
                self.advance();
                Value::String(value, Span::new(start, self.current.span.start))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at_kind(TokenKind::True);
                self.advance();
                Value::Boolean(value, Span::new(start, self.current.span.start))
            }
            TokenKind::Null => {
                self.advance();
                Value::Null(Span::new(start, self.current.span.start))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                while !self.at_kind(TokenKind::RBracket) && !self.at_kind(TokenKind::Eof) {
                    let before = self.errors.len();
                    values.push(self.parse_value(constant));
                    if self.errors.len() > before {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket);
                Value::List(values, Span::new(start, self.current.span.start))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.at_kind(TokenKind::RBrace) && !self.at_kind(TokenKind::Eof) {
                    let before = self.errors.len();
                    let name = self.parse_name();
                    self.expect(TokenKind::Colon);
                    let value = self.parse_value(constant);
                    fields.push((name, value));
                    if self.errors.len() > before {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace);
                Value::Object(fields, Span::new(start, self.current.span.start))
            }
            kind if kind.is_name() => Value::Enum(self.parse_name()),
            _ => {
                self.error_expected("value");
                self.advance();
                Value::Null(Span::new(start, self.current.span.start))
            }
        }
    }
}

/// Resolves escape sequences in a quoted string body.
fn unescape(raw: &str) -> Option<String> {
    if !raw.contains('\\') {
        return Some(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Computes the value of a block string: common indentation and blank
/// leading/trailing lines are removed.
fn block_string_value(raw: &str) -> String {
    let raw = raw.replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = raw.lines().collect();

    let indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else {
                line.get(indent..).unwrap_or("")
            }
        })
        .collect();

    while out.first().is_some_and(|l| l.trim().is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    out.join("\n")
}
