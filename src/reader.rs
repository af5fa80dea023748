use crate::collections::Map;
use crate::intern::{Keyword, Symbol};
use crate::lexer::{LexerError, Token, TokenKind, tokenize};
use crate::source::{Origin, Span};
use crate::value::{Pair, Value};
use std::iter::Peekable;
use std::rc::Rc;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("Unexpected token '{found}', expected {expected}")]
    UnexpectedToken {
        found: TokenKind,
        span: Span,
        expected: String,
    },
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("Invalid syntax for dotted pair")]
    InvalidDotSyntax(Span),
    #[error("Map literal has an odd number of elements")]
    UnevenMapLiteral(Span),
}

impl SyntaxError {
    /// The span to point a diagnostic at, if one is known.
    pub fn span(&self) -> Option<Span> {
        match self {
            SyntaxError::UnexpectedToken { span, .. } => Some(*span),
            SyntaxError::UnexpectedEof(_) => None,
            SyntaxError::Lexer(err) => Some(err.span),
            SyntaxError::InvalidDotSyntax(span) => Some(*span),
            SyntaxError::UnevenMapLiteral(span) => Some(*span),
        }
    }
}

type ReadResult<T> = Result<T, SyntaxError>;

/// Turns a token stream into `Value` trees. Each list cell is stamped with
/// an `Origin` naming the source and covering the cell's span, which is what
/// evaluation diagnostics point back at.
pub struct Reader {
    tokens: Peekable<IntoIter<Token>>,
    source: Rc<str>,
}

impl Reader {
    pub fn new(source_name: &str, input: &str) -> ReadResult<Reader> {
        let tokens = tokenize(input)?;
        Ok(Reader {
            tokens: tokens.into_iter().peekable(),
            source: Rc::from(source_name),
        })
    }

    fn origin(&self, span: Span) -> Origin {
        Origin::new(span, Rc::clone(&self.source))
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Reads the next top-level form, or `None` at end of input.
    pub fn read(&mut self) -> ReadResult<Option<Value>> {
        match self.next_token() {
            Some(token) => self.read_form(token).map(Some),
            None => Ok(None),
        }
    }

    /// Reads every remaining top-level form.
    pub fn read_all(&mut self) -> ReadResult<Vec<Value>> {
        let mut forms = Vec::new();
        while let Some(form) = self.read()? {
            forms.push(form);
        }
        Ok(forms)
    }

    fn read_form(&mut self, token: Token) -> ReadResult<Value> {
        let span = token.span;
        match token.kind {
            TokenKind::LParen => self.read_list(span),
            TokenKind::LBracket => self.read_vector(span),
            TokenKind::LBrace => self.read_map(span),
            TokenKind::Quote => self.read_quoted("quote", span),
            TokenKind::QuasiQuote => self.read_quoted("quasiquote", span),
            TokenKind::Unquote => self.read_quoted("unquote", span),
            TokenKind::UnquoteSplicing => self.read_quoted("unquote-splicing", span),
            TokenKind::Bool(b) => Ok(Value::Bool(b)),
            TokenKind::Int(n) => Ok(Value::Int(n)),
            TokenKind::Float(n) => Ok(Value::Float(n)),
            TokenKind::Char(c) => Ok(Value::Char(c)),
            TokenKind::Str(s) => Ok(Value::str(&s)),
            TokenKind::Keyword(text) => Ok(Value::Keyword(Keyword::parse(&text))),
            TokenKind::Symbol(text) => Ok(Value::Symbol(Symbol::parse(&text))),
            TokenKind::Dot => Err(SyntaxError::InvalidDotSyntax(span)),
            found @ (TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace) => {
                Err(SyntaxError::UnexpectedToken {
                    found,
                    span,
                    expected: "a form".to_string(),
                })
            }
        }
    }

    fn read_list(&mut self, open: Span) -> ReadResult<Value> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(Value::Nil),
            Some(token) => {
                let car = self.read_form(token)?;
                self.read_list_tail(open.start, car)
            }
            None => Err(SyntaxError::UnexpectedEof("')'".to_string())),
        }
    }

    fn read_list_tail(&mut self, start: usize, car: Value) -> ReadResult<Value> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::Dot,
                span: dot_span,
            }) => {
                let cdr = match self.next_token() {
                    Some(token) => self.read_form(token)?,
                    None => return Err(SyntaxError::UnexpectedEof("a form after '.'".to_string())),
                };
                match self.next_token() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        span: close,
                    }) => Ok(Value::Pair(Pair::new(
                        car,
                        cdr,
                        self.origin(Span::new(start, close.end)),
                    ))),
                    Some(found) => Err(SyntaxError::UnexpectedToken {
                        found: found.kind,
                        span: found.span,
                        expected: "')' after dotted pair".to_string(),
                    }),
                    None => Err(SyntaxError::InvalidDotSyntax(dot_span)),
                }
            }
            Some(Token {
                kind: TokenKind::RParen,
                span: close,
            }) => Ok(Value::Pair(Pair::new(
                car,
                Value::Nil,
                self.origin(Span::new(start, close.end)),
            ))),
            Some(token) => {
                let next_start = token.span.start;
                let next_car = self.read_form(token)?;
                let cdr = self.read_list_tail(next_start, next_car)?;
                let end = match &cdr {
                    Value::Pair(pair) => pair.origin.span.end,
                    _ => next_start,
                };
                Ok(Value::Pair(Pair::new(
                    car,
                    cdr,
                    self.origin(Span::new(start, end)),
                )))
            }
            None => Err(SyntaxError::UnexpectedEof("')'".to_string())),
        }
    }

    fn read_delimited(&mut self, closing: TokenKind) -> ReadResult<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            match self.next_token() {
                Some(token) if token.kind == closing => return Ok(items),
                Some(token) => items.push(self.read_form(token)?),
                None => return Err(SyntaxError::UnexpectedEof(format!("'{}'", closing))),
            }
        }
    }

    fn read_vector(&mut self, _open: Span) -> ReadResult<Value> {
        let items = self.read_delimited(TokenKind::RBracket)?;
        Ok(Value::Vector(items.into_iter().collect()))
    }

    fn read_map(&mut self, open: Span) -> ReadResult<Value> {
        let items = self.read_delimited(TokenKind::RBrace)?;
        if items.len() % 2 != 0 {
            return Err(SyntaxError::UnevenMapLiteral(open));
        }
        let mut map = Map::builder();
        let mut items = items.into_iter();
        while let (Some(k), Some(v)) = (items.next(), items.next()) {
            map.insert(k, v);
        }
        Ok(Value::Map(map.frozen()))
    }

    /// `'x` and friends expand to their two-element list form.
    fn read_quoted(&mut self, name: &str, quote_span: Span) -> ReadResult<Value> {
        let form = match self.next_token() {
            Some(token) => self.read_form(token)?,
            None => {
                return Err(SyntaxError::UnexpectedEof(format!(
                    "a form after '{}'",
                    name
                )));
            }
        };
        let span = match form.origin() {
            Some(origin) => quote_span.merge(origin.span),
            None => quote_span,
        };
        Ok(Value::list_from(
            vec![Value::Symbol(Symbol::new(name)), form],
            &self.origin(span),
        ))
    }
}

/// Read a single form from text, requiring the input to hold exactly one.
pub fn read_str(source_name: &str, input: &str) -> ReadResult<Value> {
    let mut reader = Reader::new(source_name, input)?;
    let form = reader
        .read()?
        .ok_or_else(|| SyntaxError::UnexpectedEof("a form".to_string()))?;
    if let Some(found) = reader.next_token() {
        return Err(SyntaxError::UnexpectedToken {
            found: found.kind,
            span: found.span,
            expected: "end of input".to_string(),
        });
    }
    Ok(form)
}
