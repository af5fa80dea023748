use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::source::Span;

/// Token set for script source. Commas count as whitespace, so map literals
/// read naturally either way: `{1 2, 3 4}`.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r,]+")] // Skip whitespace (comma included)
#[logos(skip r";[^\n\r]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".", priority = 10)]
    Dot,
    #[token("'")]
    Quote,
    #[token("`")]
    QuasiQuote,
    #[token("~")]
    Unquote,
    #[token("~@")]
    UnquoteSplicing,
    #[token("#t", |_| true, priority = 10)]
    #[token("#f", |_| false, priority = 10)]
    Bool(bool),
    // Decimal, or #b/#o/#d/#x radix form with an optional trailing L
    // (accepted and ignored: every integer is an i64).
    #[regex(r"[-+]?[0-9]+[lL]?", |lex| {
        let slice = lex.slice();
        let digits = slice.strip_suffix(['l', 'L']).unwrap_or(slice);
        digits
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 5)]
    #[regex(r"#[bodxBODX][0-9a-zA-Z]+", |lex| {
        let slice = lex.slice();
        parse_radix(slice).ok_or_else(|| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 5)]
    Int(i64),
    #[regex(r"[-+]?(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 6)]
    #[regex(r"[-+]?[0-9]+[eE][-+]?[0-9]+", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    }, priority = 6)]
    Float(f64),
    #[regex(r"#\\[a-zA-Z0-9]+|#\\.", |lex| {
        let name = &lex.slice()[2..];
        parse_char(name).ok_or_else(|| LexerErrorKind::InvalidCharacterName(name.to_string()))
    }, priority = 8)]
    Char(char),
    #[regex(r#""([^"\\]|\\.)*.?"#, |lex| {
        let slice = lex.slice();
        let len = slice.len();
        // make sure string was terminated
        if len == 1 || &slice[len-1..] != "\"" {
            return Err(LexerErrorKind::UnterminatedString);
        }
        unescape::unescape(&slice[1..len-1])
    })]
    Str(String),
    // Text after the colon; namespace splitting happens at read time.
    #[regex(r":[a-zA-Z0-9!$%&*/<=>?_^+.#-]+", |lex| lex.slice()[1..].to_string(), priority = 5)]
    Keyword(String),
    #[regex(r"[a-zA-Z0-9!$%&*/:<=>?_^+.#-]+", |lex| lex.slice().to_string(), priority = 2)]
    Symbol(String),
}

fn parse_radix(slice: &str) -> Option<i64> {
    let radix = match slice.as_bytes()[1].to_ascii_lowercase() {
        b'b' => 2,
        b'o' => 8,
        b'd' => 10,
        b'x' => 16,
        _ => return None,
    };
    let digits = slice[2..].strip_suffix(['l', 'L']).unwrap_or(&slice[2..]);
    i64::from_str_radix(digits, radix).ok()
}

fn parse_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => match name {
            "space" => Some(' '),
            "newline" => Some('\n'),
            "tab" => Some('\t'),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

mod unescape {
    use super::LexerErrorKind;

    pub fn unescape(s: &str) -> Result<String, LexerErrorKind> {
        // un-escaping should only ever reduce the length of the string.
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(c) => return Err(LexerErrorKind::UnknownEscapeSequence(c)),
                    None => return Err(LexerErrorKind::UnterminatedString),
                }
            } else {
                result.push(c);
            }
        }
        Ok(result)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::QuasiQuote => write!(f, "`"),
            TokenKind::Unquote => write!(f, "~"),
            TokenKind::UnquoteSplicing => write!(f, "~@"),
            TokenKind::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            TokenKind::Int(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Char(c) => write!(f, "#\\{}", c),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Keyword(s) => write!(f, ":{}", s),
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("Unknown character name: '#\\{0}'")]
    InvalidCharacterName(String),
    #[error("Unknown escape sequence: '\\{0}'")]
    UnknownEscapeSequence(char),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Helper function to tokenize a string directly (useful for tests and reader)
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: Span::new(range.start, range.end),
            }),
            Err(error) => Err(LexerError {
                error,
                span: Span::new(range.start, range.end),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected_error_variant: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e.error),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn sym(s: &str) -> TokenKind {
        TokenKind::Symbol(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("; only comment", vec![]);
    }

    #[test]
    fn test_delimiters() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens("[]", vec![TokenKind::LBracket, TokenKind::RBracket]);
        assert_tokens("{}", vec![TokenKind::LBrace, TokenKind::RBrace]);
        assert_tokens(
            "[{(",
            vec![TokenKind::LBracket, TokenKind::LBrace, TokenKind::LParen],
        );
    }

    #[test]
    fn test_quote_family() {
        assert_tokens(" ' ", vec![TokenKind::Quote]);
        assert_tokens(" ` ", vec![TokenKind::QuasiQuote]);
        assert_tokens(" ~ ", vec![TokenKind::Unquote]);
        assert_tokens(" ~@ ", vec![TokenKind::UnquoteSplicing]);
        assert_tokens(
            "`(~@(1 2) ~x)",
            vec![
                TokenKind::QuasiQuote,
                TokenKind::LParen,
                TokenKind::UnquoteSplicing,
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::Int(2),
                TokenKind::RParen,
                TokenKind::Unquote,
                sym("x"),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_comma_is_whitespace() {
        assert_tokens(
            "{1 2, 3 4}",
            vec![
                TokenKind::LBrace,
                TokenKind::Int(1),
                TokenKind::Int(2),
                TokenKind::Int(3),
                TokenKind::Int(4),
                TokenKind::RBrace,
            ],
        );
    }

    #[test]
    fn test_integers() {
        assert_tokens("123", vec![TokenKind::Int(123)]);
        assert_tokens("-45", vec![TokenKind::Int(-45)]);
        assert_tokens("+10", vec![TokenKind::Int(10)]);
        assert_tokens("#x1F", vec![TokenKind::Int(31)]);
        assert_tokens("#b1010", vec![TokenKind::Int(10)]);
        assert_tokens("#o777", vec![TokenKind::Int(511)]);
        assert_tokens("#d42", vec![TokenKind::Int(42)]);
        // The L suffix is tolerated on decimal and radix forms alike and
        // changes nothing.
        assert_tokens("42L", vec![TokenKind::Int(42)]);
        assert_tokens("-7l", vec![TokenKind::Int(-7)]);
        assert_tokens("#x10L", vec![TokenKind::Int(16)]);
    }

    #[test]
    fn test_floats() {
        assert_tokens("6.78", vec![TokenKind::Float(6.78)]);
        assert_tokens("-0.9", vec![TokenKind::Float(-0.9)]);
        assert_tokens(".5", vec![TokenKind::Float(0.5)]);
        assert_tokens("1.", vec![TokenKind::Float(1.0)]);
        assert_tokens("-1e-5", vec![TokenKind::Float(-1e-5)]);
        assert_tokens("2e3", vec![TokenKind::Float(2e3)]);
    }

    #[test]
    fn test_chars() {
        assert_tokens("#\\a", vec![TokenKind::Char('a')]);
        assert_tokens("#\\Z", vec![TokenKind::Char('Z')]);
        assert_tokens("#\\space", vec![TokenKind::Char(' ')]);
        assert_tokens("#\\newline", vec![TokenKind::Char('\n')]);
        assert_tokens("#\\(", vec![TokenKind::Char('(')]);
        assert_lexer_error("#\\frobnicate", LexerErrorKind::InvalidCharacterName(String::new()));
    }

    #[test]
    fn test_keywords() {
        assert_tokens(":enabled", vec![TokenKind::Keyword("enabled".to_string())]);
        assert_tokens(
            ":jmx/bean",
            vec![TokenKind::Keyword("jmx/bean".to_string())],
        );
    }

    #[test]
    fn test_symbols() {
        assert_tokens("foo", vec![sym("foo")]);
        assert_tokens("+", vec![sym("+")]);
        assert_tokens("-", vec![sym("-")]);
        assert_tokens("<=?", vec![sym("<=?")]);
        assert_tokens("agent/poll", vec![sym("agent/poll")]);
        assert_tokens("trace-depth", vec![sym("trace-depth")]);
        assert_tokens(".invoke", vec![sym(".invoke")]);
        assert_tokens("sym123", vec![sym("sym123")]);
    }

    #[test]
    fn test_dot_token() {
        assert_tokens(".", vec![TokenKind::Dot]);
        assert_tokens(
            " a . b ",
            vec![sym("a"), TokenKind::Dot, sym("b")],
        );
        assert_tokens("1.2", vec![TokenKind::Float(1.2)]);
        assert_tokens("sym.bol", vec![sym("sym.bol")]);
    }

    #[test]
    fn test_number_like_symbols() {
        // These fail numeric parsing and fall back to symbols
        assert_tokens("1-2", vec![sym("1-2")]);
        assert_tokens("+-", vec![sym("+-")]);
        assert_tokens("1.2.3", vec![sym("1.2.3")]);
        assert_tokens("1e", vec![sym("1e")]);
        assert_tokens("#true", vec![sym("#true")]);
        assert_tokens("#t1", vec![sym("#t1")]);
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![TokenKind::Str("hello".to_string())]);
        assert_tokens(
            r#""esc \" \n \t \\""#,
            vec![TokenKind::Str("esc \" \n \t \\".to_string())],
        );
    }

    #[test]
    fn test_comments() {
        let input = "
            (def x 10) ; bind x
            ; a full comment line
            (+ x 5)";
        assert_tokens(
            input,
            vec![
                TokenKind::LParen,
                sym("def"),
                sym("x"),
                TokenKind::Int(10),
                TokenKind::RParen,
                TokenKind::LParen,
                sym("+"),
                sym("x"),
                TokenKind::Int(5),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_lexer_error(r#""hello"#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#""hello\""#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#"""#, LexerErrorKind::UnterminatedString);
    }

    #[test]
    fn test_invalid_escape() {
        assert_lexer_error(r#""hello \a""#, LexerErrorKind::UnknownEscapeSequence('a'));
    }

    #[test]
    fn test_invalid_radix_digits() {
        assert_lexer_error("#b102", LexerErrorKind::InvalidNumberFormat(String::new()));
        assert_lexer_error("#xZZ", LexerErrorKind::InvalidNumberFormat(String::new()));
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "(+ 1)";
        let tokens = tokenize(input).expect("should tokenize");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(1, 2));
        assert_eq!(tokens[2].span, Span::new(3, 4));
        assert_eq!(tokens[3].span, Span::new(4, 5));
    }
}
