use std::io;
use thiserror::Error;
use crate::reader::Position;


/// Structural problem found while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {position}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub position: Position,
}

impl SyntaxError {
    pub(crate) fn new(kind: SyntaxErrorKind, position: Position) -> Self {
        SyntaxError { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    /// A closing or continuation tag with no matching open tag.
    #[error("unexpected `{0}`")]
    Unexpected(String),

    /// `elif`/`else` after the `else` branch of the same `if`.
    #[error("unexpected `{0}` after `else`")]
    ElseNotLast(String),

    #[error("malformed `{tag}` tag: {reason}")]
    Malformed { tag: String, reason: &'static str },

    /// End of input reached with this tag still open.
    #[error("unclosed `{0}` tag")]
    Unclosed(String),

    #[error("`endblock {found}` closes block `{expected}`")]
    MismatchedEndblock { expected: String, found: String },
}


#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error in template `{path}`: {source}")]
    Syntax {
        path: String,
        #[source]
        source: SyntaxError,
    },

    #[error("cannot load template `{path}`")]
    Load {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A template that extends itself, directly or through its parents.
    #[error("`extends` cycle at template `{path}`: {}", .chain.join(" -> "))]
    Recursion { path: String, chain: Vec<String> },

    #[error("include of `{path}` nested deeper than {limit} templates: {}", .chain.join(" -> "))]
    IncludeDepth { path: String, limit: usize, chain: Vec<String> },

    #[error("context must be a mapping, got {0}")]
    ContextNotMapping(&'static str),

    #[error("cannot build context")]
    Context(#[from] serde_json::Error),
}

impl Error {
    /// Position of the offending tag, for syntax errors.
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Syntax { source, .. } => Some(source.position),
            _ => None
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
