use std::rc::Rc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., for lists)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn to_range(self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Where a form came from: its span plus the name of the source it was read
/// from (a file path, "REPL", a connection id, ...). Every list cell carries
/// one of these so evaluation errors can point back at script text.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub span: Span,
    pub source: Rc<str>,
}

impl Origin {
    pub fn new(span: Span, source: Rc<str>) -> Origin {
        Origin { span, source }
    }

    /// Origin for values built at runtime rather than read from text.
    pub fn synthetic() -> Origin {
        Origin {
            span: Span::default(),
            source: Rc::from("<runtime>"),
        }
    }
}
