use crate::context::Context;
use crate::error::{Error, Result, SyntaxError, SyntaxErrorKind};
use crate::expression::{is_identifier, parse_quoted, Expression, Test};
use crate::filters::FilterRegistry;
use crate::processor::Processor;
use crate::reader::{Position, Reader, Token, TokenKind};
use crate::store::{MemoryLoader, TemplateStore};


/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Variable { expression: Expression, position: Position },
    Conditional { branches: Vec<Branch> },
    Loop { bindings: Vec<String>, iterable: Expression, body: Vec<Node> },
    Include { path: String },
    Block { name: String, body: Vec<Node> },
    Extends { path: String },
}

/// One arm of a conditional; `test` is `None` for `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub test: Option<Test>,
    pub body: Vec<Node>,
}


/// A parsed template, immutable once built.
#[derive(Debug)]
pub struct Template {
    path: String,
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template that is not backed by a store.
    pub fn from(input: &str) -> Result<Self, SyntaxError> {
        let nodes = parse(Reader::new(input))?;
        Ok(Template {
            path: String::new(),
            source: input.to_owned(),
            nodes,
        })
    }

    pub fn parse(path: &str, input: &str) -> Result<Self> {
        let nodes = parse(Reader::new(input)).map_err(|source| Error::Syntax {
            path: path.to_owned(),
            source,
        })?;
        Ok(Template {
            path: path.to_owned(),
            source: input.to_owned(),
            nodes,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Parent template path; the last top-level `extends` wins.
    pub fn extends(&self) -> Option<&str> {
        self.nodes.iter().rev().find_map(|node| match node {
            Node::Extends { path } => Some(path.as_str()),
            _ => None
        })
    }

    /// Render with the built-in filters and no other template available,
    /// so `include` and `extends` fail with [Error::Load].
    pub fn render(&self, context: &Context) -> Result<String> {
        let store = TemplateStore::new(MemoryLoader::new());
        let filters = FilterRegistry::default();
        Processor::new(&store, &filters).render(self, context)
    }
}


#[derive(Debug)]
enum Frame {
    Conditional { branches: Vec<Branch>, current: Branch, position: Position },
    Loop { bindings: Vec<String>, iterable: Expression, body: Vec<Node>, position: Position },
    Block { name: String, body: Vec<Node>, position: Position },
}

impl Frame {
    fn keyword(&self) -> &'static str {
        match self {
            Frame::Conditional { .. } => "if",
            Frame::Loop { .. } => "for",
            Frame::Block { .. } => "block",
        }
    }

    fn position(&self) -> Position {
        match self {
            Frame::Conditional { position, .. }
            | Frame::Loop { position, .. }
            | Frame::Block { position, .. } => *position,
        }
    }

    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Conditional { current, .. } => &mut current.body,
            Frame::Loop { body, .. } | Frame::Block { body, .. } => body,
        }
    }

    fn finish(self) -> Node {
        match self {
            Frame::Conditional { mut branches, current, .. } => {
                branches.push(current);
                Node::Conditional { branches }
            },
            Frame::Loop { bindings, iterable, body, .. } => Node::Loop { bindings, iterable, body },
            Frame::Block { name, body, .. } => Node::Block { name, body },
        }
    }
}


struct Parser {
    nodes: Vec<Node>,
    frames: Vec<Frame>,
}

fn parse(reader: Reader<'_>) -> Result<Vec<Node>, SyntaxError> {
    let mut parser = Parser {
        nodes: Vec::new(),
        frames: Vec::new(),
    };
    for token in reader {
        match token.kind {
            TokenKind::Text => parser.insert(Node::Text(token.content.to_owned())),
            TokenKind::Variable => parser.insert(Node::Variable {
                expression: Expression::parse(token.content),
                position: token.position,
            }),
            TokenKind::Tag => parser.tag(&token)?,
            TokenKind::Comment => {}
        }
    }
    match parser.frames.last() {
        Some(frame) => Err(SyntaxError::new(
            SyntaxErrorKind::Unclosed(frame.keyword().to_owned()),
            frame.position()
        )),
        None => Ok(parser.nodes)
    }
}

impl Parser {
    fn insert(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(frame) => frame.body_mut().push(node),
            None => self.nodes.push(node)
        }
    }

    fn tag(&mut self, token: &Token<'_>) -> Result<(), SyntaxError> {
        let position = token.position;
        let (keyword, args) = match token.content.split_once(char::is_whitespace) {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (token.content, "")
        };
        if matches!(keyword, "else" | "endif" | "endfor") && !args.is_empty() {
            return Err(malformed(keyword, "takes no arguments", position));
        }
        match keyword {
            "if" => self.frames.push(Frame::Conditional {
                branches: Vec::new(),
                current: Branch { test: Some(Test::parse(args)), body: Vec::new() },
                position,
            }),
            "elif" | "else" => {
                let test = (keyword == "elif").then(|| Test::parse(args));
                match self.frames.last_mut() {
                    Some(Frame::Conditional { current, .. }) if current.test.is_none() => {
                        return Err(SyntaxError::new(
                            SyntaxErrorKind::ElseNotLast(keyword.to_owned()), position
                        ));
                    },
                    Some(Frame::Conditional { branches, current, .. }) => {
                        let done = std::mem::replace(current, Branch { test, body: Vec::new() });
                        branches.push(done);
                    },
                    _ => return Err(unexpected(keyword, position))
                }
            },
            "endif" => self.close(keyword, position, |frame| matches!(frame, Frame::Conditional { .. }))?,
            "for" => {
                let (bindings, iterable) = parse_for(args).ok_or_else(|| malformed(
                    keyword, "expected `name in expression` or `key, value in expression`", position
                ))?;
                self.frames.push(Frame::Loop { bindings, iterable, body: Vec::new(), position });
            },
            "endfor" => self.close(keyword, position, |frame| matches!(frame, Frame::Loop { .. }))?,
            "block" => {
                if !is_identifier(args) {
                    return Err(malformed(keyword, "expected a block name", position));
                }
                self.frames.push(Frame::Block { name: args.to_owned(), body: Vec::new(), position });
            },
            "endblock" => {
                if let Some(Frame::Block { name, .. }) = self.frames.last() {
                    if !args.is_empty() && args != name.as_str() {
                        return Err(SyntaxError::new(
                            SyntaxErrorKind::MismatchedEndblock {
                                expected: name.clone(),
                                found: args.to_owned(),
                            },
                            position
                        ));
                    }
                }
                self.close(keyword, position, |frame| matches!(frame, Frame::Block { .. }))?
            },
            "include" | "extends" => {
                let path = parse_quoted(args)
                    .filter(|path| !path.is_empty())
                    .ok_or_else(|| malformed(keyword, "expected a quoted template path", position))?
                    .to_owned();
                self.insert(match keyword {
                    "include" => Node::Include { path },
                    _ => Node::Extends { path },
                });
            },
            _ => {
                tracing::debug!(tag = keyword, %position, "unknown tag kept as text");
                self.insert(Node::Text(token.raw.to_owned()));
            }
        }
        Ok(())
    }

    // pop the innermost frame if `is_match` accepts it and insert its node
    // at the enclosing insertion point
    fn close<F>(&mut self, keyword: &str, position: Position, is_match: F) -> Result<(), SyntaxError>
    where F: Fn(&Frame) -> bool {
        match self.frames.pop() {
            Some(frame) if is_match(&frame) => {
                let node = frame.finish();
                self.insert(node);
                Ok(())
            },
            _ => Err(unexpected(keyword, position))
        }
    }
}

fn unexpected(keyword: &str, position: Position) -> SyntaxError {
    SyntaxError::new(SyntaxErrorKind::Unexpected(keyword.to_owned()), position)
}

fn malformed(keyword: &str, reason: &'static str, position: Position) -> SyntaxError {
    SyntaxError::new(
        SyntaxErrorKind::Malformed { tag: keyword.to_owned(), reason },
        position
    )
}

// `item in items` or `key, value in pairs`
fn parse_for(args: &str) -> Option<(Vec<String>, Expression)> {
    let at = args.match_indices("in").map(|(i, _)| i).find(|&i| {
        let before = args[..i].chars().next_back();
        let after = args[i + 2..].chars().next();
        before.is_some_and(char::is_whitespace) && after.is_some_and(char::is_whitespace)
    })?;
    let iterable = args[at + 2..].trim();
    let bindings = args[..at]
        .split(',')
        .map(str::trim)
        .map(str::to_owned)
        .collect::<Vec<_>>();
    let valid = (1..=2).contains(&bindings.len())
        && bindings.iter().all(|name| is_identifier(name))
        && !iterable.is_empty();
    valid.then(|| (bindings, Expression::parse(iterable)))
}
