use std::fmt;


/// Kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Variable,
    Tag,
    Comment,
}

/// 1-indexed line and column of a token's first character, plus its byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub(crate) fn start() -> Self {
        Position { line: 1, column: 1, offset: 0 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A slice of template source.
///
/// `content` is the verbatim text for [TokenKind::Text] tokens and the
/// whitespace-trimmed delimiter body otherwise. `raw` always holds the
/// exact source span, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub content: &'a str,
    pub raw: &'a str,
    pub position: Position,
}

impl<'a> Token<'a> {
    fn text(text: &'a str, position: Position) -> Self {
        Token { kind: TokenKind::Text, content: text, raw: text, position }
    }

    fn delimited(kind: TokenKind, body: &'a str, raw: &'a str, position: Position) -> Self {
        Token { kind, content: body.trim(), raw, position }
    }
}


const DELIMITERS: [(TokenKind, &str, &str); 3] = [
    (TokenKind::Variable, "{{", "}}"),
    (TokenKind::Tag, "{%", "%}"),
    (TokenKind::Comment, "{#", "#}"),
];


/// Splits template source into tokens.
///
/// An open delimiter without a matching close delimiter is not a tag:
/// its characters are returned as ordinary text.
#[derive(Clone)]
pub struct Reader<'a> {
    input: &'a str,
    pos: usize,
    position: Position,
    // close delimiters known to be absent from the rest of the input
    unclosed: [bool; DELIMITERS.len()],
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        Reader {
            input,
            pos: 0,
            position: Position::start(),
            unclosed: [false; DELIMITERS.len()],
        }
    }

    pub fn pop_front(&mut self) -> Option<Token<'a>> {
        if self.pos == self.input.len() {
            return None;
        }
        let tail = &self.input[self.pos..];
        let position = self.position;
        let token = match tail.span_tag(&mut self.unclosed) {
            Some(span) if span.start == 0 => {
                let raw = &tail[..span.end];
                self.advance(span.end);
                Token::delimited(span.kind, &tail[span.body_start..span.body_end], raw, position)
            },
            Some(span) => {
                self.advance(span.start);
                Token::text(&tail[..span.start], position)
            },
            None => {
                self.advance(tail.len());
                Token::text(tail, position)
            }
        };
        Some(token)
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.input[self.pos..self.pos + len];
        for c in consumed.chars() {
            if c == '\n' {
                self.position.line += 1;
                self.position.column = 1;
            } else {
                self.position.column += 1;
            }
        }
        self.pos += len;
        self.position.offset = self.pos;
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop_front()
    }
}


/// Lex a whole template.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Reader::new(input).collect()
}


struct TagSpan {
    kind: TokenKind,
    start: usize,
    body_start: usize,
    body_end: usize,
    end: usize,
}

trait ReaderStringOps {
    fn span_tag(&self, unclosed: &mut [bool; DELIMITERS.len()]) -> Option<TagSpan>;
}

impl ReaderStringOps for str {
    // return the first delimited span that has a closing delimiter,
    // the earliest open delimiter winning and the first close ending it;
    // a close delimiter missing after some offset is missing after every
    // later one, so each is searched for in vain at most once
    fn span_tag(&self, unclosed: &mut [bool; DELIMITERS.len()]) -> Option<TagSpan> {
        let mut from = 0;
        while let Some(p) = self[from..].find('{') {
            let start = from + p;
            let rest = &self[start..];
            for (i, (kind, open, close)) in DELIMITERS.iter().enumerate() {
                if unclosed[i] || !rest.starts_with(open) {
                    continue;
                }
                let Some(q) = rest[open.len()..].find(close) else {
                    unclosed[i] = true;
                    continue;
                };
                let body_start = start + open.len();
                let body_end = body_start + q;
                return Some(TagSpan {
                    kind: *kind,
                    start,
                    body_start,
                    body_end,
                    end: body_end + close.len(),
                });
            }
            from = start + 1;
        }
        None
    }
}
