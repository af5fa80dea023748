//! The embedding surface: one `Interpreter` per agent worker, driven
//! entirely from its owning thread.

use crate::env::Environment;
use crate::eval::{EvalError, EvalErrorKind, Forms, TraceFrame, Unwind};
use crate::host::ForeignTable;
use crate::install::Library;
use crate::intern::Symbol;
use crate::primitives::CoreLibrary;
use crate::reader::{Reader, SyntaxError};
use crate::value::Value;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Anything `eval_str` or `eval_script` can fail with.
#[derive(Debug, Error)]
pub enum SpyglassError {
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("could not read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpyglassError {
    pub fn eval_kind(&self) -> Option<EvalErrorKind> {
        match self {
            SpyglassError::Eval(e) => Some(e.kind.clone()),
            _ => None,
        }
    }

    pub fn eval_trace(&self) -> Option<&[TraceFrame]> {
        match self {
            SpyglassError::Eval(e) => Some(&e.trace),
            _ => None,
        }
    }
}

/// A script evaluator plus everything installed into it. Values are
/// `Rc`-based, so an interpreter and everything it produces stay on the
/// thread that created them.
pub struct Interpreter {
    pub(crate) global: Rc<Environment>,
    pub(crate) forms: Forms,
    pub(crate) foreign: ForeignTable,
    /// Source text by name, kept for error reports.
    sources: HashMap<String, String>,
    /// Name of the most recently read source; syntax errors do not carry
    /// one themselves.
    last_source: String,
    continuations: u64,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let mut interp = Interpreter {
            global: Environment::new(),
            forms: Forms::new(),
            foreign: ForeignTable::new(),
            sources: HashMap::new(),
            last_source: String::new(),
            continuations: 0,
        };
        interp.install(&CoreLibrary);
        interp
    }

    /// Install a batch of native bindings. Namespaced primitives land in the
    /// foreign-function table; bare ones in the global environment.
    pub fn install(&mut self, library: &dyn Library) {
        let default_ns = library.namespace();
        for mut def in library.primitives() {
            if def.namespace.is_none() {
                def.namespace = default_ns;
            }
            let name = def.name;
            let namespace = def.namespace;
            let value = Value::Primitive(Rc::new(def));
            match namespace {
                Some(ns) => self.foreign.register(ns, name, value),
                None => self.global.define(&Symbol::new(name), value),
            }
        }
    }

    /// Register a single host value under a namespace.
    pub fn register(&mut self, namespace: &str, name: &str, value: Value) {
        self.foreign.register(namespace, name, value);
    }

    pub fn global_env(&self) -> &Rc<Environment> {
        &self.global
    }

    pub(crate) fn fresh_token(&mut self) -> u64 {
        self.continuations += 1;
        self.continuations
    }

    /// Read every form in `input` and evaluate them in order in the global
    /// environment, returning the last result.
    pub fn eval_str(&mut self, name: &str, input: &str) -> Result<Value, SpyglassError> {
        self.sources.insert(name.to_string(), input.to_string());
        self.last_source = name.to_string();
        let mut reader = Reader::new(name, input)?;
        let env = Rc::clone(&self.global);
        let mut last = Value::Nil;
        while let Some(form) = reader.read()? {
            last = self.eval(&form, &env).map_err(unwind_to_error)?;
        }
        Ok(last)
    }

    pub fn eval_script(&mut self, path: &Path) -> Result<Value, SpyglassError> {
        let input = load_script(path)?;
        let name = path.display().to_string();
        self.eval_str(&name, &input)
    }

    /// Read every form in a script file without evaluating anything.
    pub fn read_script(&mut self, path: &Path) -> Result<Vec<Value>, SpyglassError> {
        let input = load_script(path)?;
        let name = path.display().to_string();
        self.sources.insert(name.clone(), input.clone());
        self.last_source = name.clone();
        let mut reader = Reader::new(&name, &input)?;
        Ok(reader.read_all()?)
    }

    /// Evaluate one expression and render the outcome as text. Failures come
    /// back as a rendered diagnostic, never as an `Err`; this is the entry
    /// point operator consoles poll, and it must always produce something
    /// printable.
    pub fn query(&mut self, input: &str) -> String {
        match self.eval_str("<query>", input) {
            Ok(value) => value.to_string(),
            Err(err) => self.render_error(&err),
        }
    }

    /// Render a failure as an annotated source report when the source text
    /// is on file, or as the bare message when it is not.
    pub fn render_error(&self, err: &SpyglassError) -> String {
        let (message, source_name, range, trace) = match err {
            SpyglassError::Syntax(e) => (
                e.to_string(),
                self.last_source.clone(),
                e.span().unwrap_or_default().to_range(),
                &[][..],
            ),
            SpyglassError::Eval(e) => (
                e.kind.to_string(),
                e.origin.source.to_string(),
                e.origin.span.to_range(),
                e.trace.as_slice(),
            ),
            SpyglassError::Io { .. } => return err.to_string(),
        };
        let Some(text) = self.sources.get(&source_name) else {
            return message;
        };
        let mut buf = Vec::new();
        let report = Report::build(ReportKind::Error, range.clone())
            .with_message(&message)
            .with_label(
                Label::new(range)
                    .with_message(&message)
                    .with_color(Color::Red),
            )
            .finish();
        if report.write(Source::from(text.as_str()), &mut buf).is_err() {
            return message;
        }
        let mut out = String::from_utf8_lossy(&buf).into_owned();
        for frame in trace {
            let _ = write!(
                out,
                "\n  in {} ({}:{})",
                frame.form, frame.origin.source, frame.origin.span.start
            );
        }
        out
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

fn unwind_to_error(unwind: Unwind) -> SpyglassError {
    match unwind {
        Unwind::Error(err) => SpyglassError::Eval(err),
        // A continuation disarms before its call/cc returns, so an armed
        // escape cannot outlive the evaluation that would catch it.
        Unwind::Escape { .. } => SpyglassError::Eval(EvalError::host(
            "escape continuation crossed the evaluator boundary",
        )),
    }
}

fn load_script(path: &Path) -> Result<String, SpyglassError> {
    std::fs::read_to_string(path).map_err(|source| SpyglassError::Io {
        path: path.to_path_buf(),
        source,
    })
}
