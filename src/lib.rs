// Declare modules publicly so they are part of the library interface
pub mod collections;
pub mod env;
pub mod eval;
pub mod host;
pub mod install;
pub mod intern;
pub mod interp;
pub mod lexer;
pub mod primitives;
pub mod reader;
pub mod seq;
pub mod source;
pub mod value;

mod destructure;

pub use collections::{Map, TrieVector};
pub use env::Environment;
pub use eval::{EvalError, EvalErrorKind, EvalOutcome, Unwind, special_form_names};
pub use host::{ForeignTable, HostValue};
pub use install::{Library, PrimitiveDef, PrimitiveKind};
pub use intern::{Interner, Keyword, Symbol};
pub use interp::{Interpreter, SpyglassError};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use reader::{Reader, SyntaxError, read_str};
pub use seq::Seq;
pub use source::{Origin, Span};
pub use value::Value;
