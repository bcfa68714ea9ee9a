use crate::{BinaryOperation, Expression};
use num_bigint::BigInt;
use std::{ops::Range, str::FromStr};

/// The deepest nesting [`Parser`] accepts unless told otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Parse an [`Expression`] tree from some text.
///
/// Returns `Ok(None)` when the text contains no tokens at all.
pub fn parse(s: &str) -> Result<Option<Expression>, ParseError> {
    let tokens = tokenize(s);
    parse_tokens(&tokens)
}

/// Parse an [`Expression`] from an already tokenized input.
pub fn parse_tokens(
    tokens: &[Token<'_>],
) -> Result<Option<Expression>, ParseError> {
    Parser::new(tokens).parse()
}

/// Split some text into [`Token`]s, silently dropping whitespace and any
/// character that isn't part of the expression language.
pub fn tokenize(src: &str) -> Vec<Token<'_>> { Tokens::new(src).collect() }

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)?.ok_or(ParseError::EmptyInput)
    }
}

/// A recursive descent parser for converting a token stream into an
/// expression tree.
///
/// The grammar, from loosest to tightest binding:
///
/// ```text
/// subtraction    := addition ("-" addition)*
/// addition       := division ("+" division)*
/// division       := multiplication ("/" multiplication)*
/// multiplication := root ("*" root | implicit_multiplication)*
///
/// implicit_multiplication := <lookahead IDENTIFIER | "(" | "√"> root
///
/// root           := "√" root
///                 | exponent
///
/// exponent       := primary "^" exponent
///                 | primary
///
/// primary        := NUMBER
///                 | IDENTIFIER
///                 | "(" subtraction ")"
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    cursor: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Parser {
            tokens,
            cursor: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Parser { max_depth, ..self }
    }

    pub fn parse(mut self) -> Result<Option<Expression>, ParseError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let expr = self.subtraction()?;

        match self.tokens.get(self.cursor) {
            None => Ok(Some(expr)),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.kind,
                span: token.span.clone(),
                expected: &[],
            }),
        }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.cursor).map(|tok| tok.kind)
    }

    fn advance(&mut self) -> Result<&'t Token<'a>, ParseError> {
        let token = self
            .tokens
            .get(self.cursor)
            .ok_or(ParseError::UnexpectedEndOfInput)?;
        self.cursor += 1;
        Ok(token)
    }

    /// Run `then` one level deeper, bailing out before the call stack gets
    /// too deep.
    fn nested<F>(&mut self, then: F) -> Result<Expression, ParseError>
    where
        F: FnOnce(&mut Self) -> Result<Expression, ParseError>,
    {
        if self.depth >= self.max_depth {
            return Err(ParseError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        self.depth += 1;
        let got = then(self);
        self.depth -= 1;

        got
    }

    fn subtraction(&mut self) -> Result<Expression, ParseError> {
        self.nested(|p| {
            p.left_associative(TokenKind::Minus, |p| p.addition())
        })
    }

    fn addition(&mut self) -> Result<Expression, ParseError> {
        self.left_associative(TokenKind::Plus, |p| p.division())
    }

    fn division(&mut self) -> Result<Expression, ParseError> {
        self.left_associative(TokenKind::Divide, |p| p.multiplication())
    }

    /// Parse a chain of `operand (operator operand)*`, folding it into a
    /// left-leaning tree.
    fn left_associative<F>(
        &mut self,
        operator: TokenKind,
        mut operand: F,
    ) -> Result<Expression, ParseError>
    where
        F: FnMut(&mut Self) -> Result<Expression, ParseError>,
    {
        let mut node = operand(self)?;

        while self.peek() == Some(operator) {
            // skip past the operator
            let _ = self.advance()?;
            let right = operand(self)?;
            node = Expression::binary(node, operator.as_binary_op(), right);
        }

        Ok(node)
    }

    fn multiplication(&mut self) -> Result<Expression, ParseError> {
        let mut node = self.root()?;

        loop {
            match self.peek() {
                Some(TokenKind::Times) => {
                    let _ = self.advance()?;
                },
                // implicit multiplication, e.g. "2x", "x(y + 1)" or "3√x"
                Some(TokenKind::Identifier)
                | Some(TokenKind::OpenParen)
                | Some(TokenKind::Root) => {},
                _ => return Ok(node),
            }

            let right = self.root()?;
            node = node * right;
        }
    }

    fn root(&mut self) -> Result<Expression, ParseError> {
        if self.peek() == Some(TokenKind::Root) {
            let _ = self.advance()?;
            let radicand = self.nested(|p| p.root())?;
            Ok(radicand.sqrt())
        } else {
            self.exponent()
        }
    }

    fn exponent(&mut self) -> Result<Expression, ParseError> {
        let base = self.primary()?;

        if self.peek() == Some(TokenKind::Caret) {
            let _ = self.advance()?;
            let exponent = self.nested(|p| p.exponent())?;
            Ok(base.pow(exponent))
        } else {
            Ok(base)
        }
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.advance()?;

        match token.kind {
            TokenKind::Number => {
                let value = BigInt::parse_bytes(token.text.as_bytes(), 10)
                    .ok_or_else(|| ParseError::InvalidNumber {
                        span: token.span.clone(),
                    })?;
                Ok(Expression::Number(value))
            },
            TokenKind::Identifier => Ok(Expression::identifier(token.text)),
            TokenKind::OpenParen => {
                let open_paren = token.span.clone();
                let expr = self.subtraction()?;

                match self.tokens.get(self.cursor) {
                    Some(tok) if tok.kind == TokenKind::CloseParen => {
                        self.cursor += 1;
                        Ok(expr)
                    },
                    Some(tok) => Err(ParseError::UnexpectedToken {
                        found: tok.kind,
                        span: tok.span.clone(),
                        expected: &[TokenKind::CloseParen],
                    }),
                    None => {
                        Err(ParseError::UnterminatedGroup { span: open_paren })
                    },
                }
            },
            other => Err(ParseError::UnexpectedToken {
                found: other,
                span: token.span.clone(),
                expected: &[
                    TokenKind::Number,
                    TokenKind::Identifier,
                    TokenKind::OpenParen,
                    TokenKind::Root,
                ],
            }),
        }
    }
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unterminated group, the \"(\" at {span:?} is never closed")]
    UnterminatedGroup { span: Range<usize> },
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("found {found} at {span:?} but expected {}", describe(.expected))]
    UnexpectedToken {
        found: TokenKind,
        span: Range<usize>,
        expected: &'static [TokenKind],
    },
    #[error("\"{span:?}\" is not a valid integer")]
    InvalidNumber { span: Range<usize> },
    #[error("the expression is nested more than {limit} levels deep")]
    DepthExceeded { limit: usize },
    #[error("there is no expression to parse")]
    EmptyInput,
}

fn describe(expected: &[TokenKind]) -> String {
    if expected.is_empty() {
        return String::from("the end of input");
    }

    let names: Vec<_> = expected.iter().map(ToString::to_string).collect();
    names.join(" or ")
}

#[derive(Debug, Clone, PartialEq)]
struct Tokens<'a> {
    src: &'a str,
    cursor: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self { Tokens { src, cursor: 0 } }

    fn rest(&self) -> &'a str { &self.src[self.cursor..] }

    fn peek(&self) -> Option<char> { self.rest().chars().next() }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    fn chomp(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        let start = self.cursor;
        self.advance()?;
        let end = self.cursor;

        Some(Token::from_text(self.src, start..end, kind))
    }

    fn chomp_integer(&mut self) -> Token<'a> {
        let start = self.cursor;

        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }

            self.advance();
        }

        Token::from_text(self.src, start..self.cursor, TokenKind::Number)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let kind = match self.peek()? {
                '(' => TokenKind::OpenParen,
                ')' => TokenKind::CloseParen,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Times,
                '/' => TokenKind::Divide,
                '^' => TokenKind::Caret,
                '√' => TokenKind::Root,
                'a'..='z' | 'A'..='Z' => TokenKind::Identifier,
                '0'..='9' => return Some(self.chomp_integer()),
                _ => {
                    // whitespace and unknown characters are dropped
                    self.advance();
                    continue;
                },
            };

            return self.chomp(kind);
        }
    }
}

/// A single lexical unit of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub span: Range<usize>,
    pub kind: TokenKind,
}

impl<'a> Token<'a> {
    fn from_text(
        original_source: &'a str,
        span: Range<usize>,
        kind: TokenKind,
    ) -> Self {
        Token {
            text: &original_source[span.clone()],
            span,
            kind,
        }
    }
}

/// The kinds of token that can appear in an [`Expression`]'s text form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    OpenParen,
    CloseParen,
    Plus,
    Minus,
    Times,
    Divide,
    Caret,
    Root,
}

impl TokenKind {
    /// Everything that isn't a literal is an operator.
    pub fn is_operator(self) -> bool {
        !matches!(self, TokenKind::Identifier | TokenKind::Number)
    }

    fn as_binary_op(self) -> BinaryOperation {
        match self {
            TokenKind::Plus => BinaryOperation::Plus,
            TokenKind::Minus => BinaryOperation::Minus,
            TokenKind::Times => BinaryOperation::Times,
            TokenKind::Divide => BinaryOperation::Divide,
            other => unreachable!("{:?} is not a binary op", other),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Identifier => "an identifier",
            TokenKind::Number => "a number",
            TokenKind::OpenParen => "\"(\"",
            TokenKind::CloseParen => "\")\"",
            TokenKind::Plus => "\"+\"",
            TokenKind::Minus => "\"-\"",
            TokenKind::Times => "\"*\"",
            TokenKind::Divide => "\"/\"",
            TokenKind::Caret => "\"^\"",
            TokenKind::Root => "\"√\"",
        };

        f.write_str(name)
    }
}
