//! The value sublanguage used inside `{{ }}` and by `if`/`elif` tests.
//!
//! An expression is a literal (`true`, `null`, `-1.5`, `"text"`) or a path
//! chain (`user.friends[0].name`, `items[key]`, `clock.now()`), optionally
//! followed by filters (`name | upper`, `list | join:sep`). Expressions are
//! compiled when the template is parsed and never fail to evaluate: anything
//! that cannot be resolved becomes [Value::Undefined].

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use crate::context::Stack;
use crate::filters::FilterRegistry;
use crate::value::Value;


#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path { root: String, steps: Vec<Step> },
    Filtered { base: Box<Expr>, filters: Vec<FilterCall> },
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Property(String),
    Index(Box<Expr>),
    Call,
}

#[derive(Debug, Clone, PartialEq)]
struct FilterCall {
    name: String,
    argument: Option<Expr>,
}


/// A compiled value expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        Expression {
            source: source.to_owned(),
            expr: parse_expr(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            CompareOp::Eq => ordering == Some(Ordering::Equal),
            CompareOp::Ne => ordering != Some(Ordering::Equal),
            CompareOp::Gt => ordering == Some(Ordering::Greater),
            CompareOp::Lt => ordering == Some(Ordering::Less),
            CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TestKind {
    Compare { lhs: Expr, op: CompareOp, rhs: Expr },
    Truthy(Expr),
}

/// A compiled `if`/`elif` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    source: String,
    kind: TestKind,
}

impl Test {
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        let kind = match find_comparison(source) {
            Some((at, op, len)) => TestKind::Compare {
                lhs: parse_expr(&source[..at]),
                op,
                rhs: parse_expr(&source[at + len..]),
            },
            None => TestKind::Truthy(parse_expr(source))
        };
        Test {
            source: source.to_owned(),
            kind,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}


/// Evaluates compiled expressions against the names visible in a render.
pub(crate) struct Evaluator<'s, 'c> {
    stack: &'s Stack<'c>,
    filters: &'s FilterRegistry,
}

impl<'s, 'c> Evaluator<'s, 'c> {
    pub(crate) fn new(stack: &'s Stack<'c>, filters: &'s FilterRegistry) -> Self {
        Evaluator { stack, filters }
    }

    pub(crate) fn value(&self, expression: &Expression) -> Cow<'s, Value> {
        self.eval(&expression.expr)
    }

    pub(crate) fn test(&self, test: &Test) -> bool {
        match &test.kind {
            TestKind::Compare { lhs, op, rhs } => {
                let lhs = self.eval(lhs);
                let rhs = self.eval(rhs);
                op.holds(compare(&lhs, &rhs))
            },
            TestKind::Truthy(expr) => self.eval(expr).is_truthy()
        }
    }

    fn eval(&self, expr: &Expr) -> Cow<'s, Value> {
        match expr {
            Expr::Literal(value) => Cow::Owned(value.clone()),
            Expr::Path { root, steps } => self.walk(root, steps),
            Expr::Filtered { base, filters } => {
                let mut value = self.eval(base).into_owned();
                for filter in filters {
                    let argument = filter.argument.as_ref()
                        .map(|arg| self.eval(arg).into_owned());
                    value = self.filters.apply(&filter.name, value, argument);
                }
                Cow::Owned(value)
            },
            Expr::Invalid => Cow::Owned(Value::Undefined)
        }
    }

    fn walk(&self, root: &str, steps: &[Step]) -> Cow<'s, Value> {
        let mut current = match self.stack.get(root) {
            Some(value) => Cow::Borrowed(value),
            None => return Cow::Owned(Value::Undefined)
        };
        let mut receiver: Option<Cow<'s, Value>> = None;
        for step in steps {
            if matches!(*current, Value::Undefined | Value::Null) {
                return Cow::Owned(Value::Undefined);
            }
            let next = match step {
                Step::Property(name) => descend(&current, |v| by_name(v, name)),
                Step::Index(key) => {
                    let key = self.eval(key);
                    descend(&current, |v| by_key(v, &key))
                },
                Step::Call => {
                    let result = call(&current, receiver.as_deref());
                    receiver = None;
                    current = Cow::Owned(result);
                    continue;
                }
            };
            receiver = Some(current);
            current = next.unwrap_or(Cow::Owned(Value::Undefined));
        }
        current
    }
}

fn descend<'v, F>(current: &Cow<'v, Value>, child: F) -> Option<Cow<'v, Value>>
where F: for<'x> Fn(&'x Value) -> Option<Cow<'x, Value>> {
    match current {
        Cow::Borrowed(value) => child(*value),
        Cow::Owned(value) => child(value).map(|it| Cow::Owned(it.into_owned()))
    }
}

fn by_name<'v>(value: &'v Value, name: &str) -> Option<Cow<'v, Value>> {
    match value {
        Value::Map(map) => map.get(name).map(Cow::Borrowed),
        Value::Seq(_) | Value::Str(_) | Value::Safe(_) if name == "length" => {
            length(value).map(|len| Cow::Owned(Value::from(len)))
        },
        Value::Seq(_) | Value::Str(_) | Value::Safe(_) => {
            name.parse::<usize>().ok().and_then(|i| at(value, i))
        },
        _ => None
    }
}

fn by_key<'v>(value: &'v Value, key: &Value) -> Option<Cow<'v, Value>> {
    match key {
        Value::Str(_) | Value::Safe(_) => by_name(value, key.as_str().unwrap_or_default()),
        Value::Int(_) | Value::Float(_) => match value {
            Value::Map(map) => map.get(&key.to_string()).map(Cow::Borrowed),
            _ => key.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .and_then(|f| at(value, f as usize))
        },
        _ => None
    }
}

fn at(value: &Value, index: usize) -> Option<Cow<'_, Value>> {
    match value {
        Value::Seq(items) => items.get(index).map(Cow::Borrowed),
        Value::Str(_) | Value::Safe(_) => value.as_str()
            .and_then(|s| s.chars().nth(index))
            .map(|c| Cow::Owned(Value::Str(c.to_string()))),
        _ => None
    }
}

pub(crate) fn length(value: &Value) -> Option<usize> {
    match value {
        Value::Seq(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        Value::Str(_) | Value::Safe(_) => value.as_str().map(|s| s.chars().count()),
        _ => None
    }
}

fn call(value: &Value, receiver: Option<&Value>) -> Value {
    match value {
        Value::Function(fun) => fun.call(receiver).unwrap_or_else(|err| {
            tracing::trace!(error = %err, "callable failed, evaluating to undefined");
            Value::Undefined
        }),
        _ => Value::Undefined
    }
}

/// Numbers compare numerically; anything else compares by string form.
fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(lhs.to_string().cmp(&rhs.to_string()))
        }
    }
}


fn parse_expr(source: &str) -> Expr {
    let mut segments = split_top_level(source, '|').into_iter();
    let base = parse_operand(segments.next().unwrap_or_default());
    let filters = segments.map(parse_filter).collect::<Vec<_>>();
    if filters.is_empty() {
        base
    } else {
        Expr::Filtered {
            base: Box::new(base),
            filters,
        }
    }
}

fn parse_filter(segment: &str) -> FilterCall {
    match top_level(segment).into_iter().find(|(_, c)| *c == ':') {
        Some((at, _)) => FilterCall {
            name: segment[..at].trim().to_owned(),
            argument: Some(parse_expr(&segment[at + 1..])),
        },
        None => FilterCall {
            name: segment.trim().to_owned(),
            argument: None,
        }
    }
}

fn parse_operand(source: &str) -> Expr {
    let source = source.trim();
    match source {
        "true" => return Expr::Literal(Value::Bool(true)),
        "false" => return Expr::Literal(Value::Bool(false)),
        "null" => return Expr::Literal(Value::Null),
        "undefined" => return Expr::Literal(Value::Undefined),
        _ => {}
    }
    if let Some(number) = parse_number(source) {
        return Expr::Literal(number);
    }
    if let Some(text) = parse_quoted(source) {
        return Expr::Literal(Value::Str(text.to_owned()));
    }
    parse_path(source).unwrap_or(Expr::Invalid)
}

fn parse_number(source: &str) -> Option<Value> {
    let digits = source.strip_prefix('-').unwrap_or(source);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None)
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int) || !frac.map_or(true, all_digits) {
        return None;
    }
    match frac {
        None => source.parse::<i64>().ok().map(Value::Int)
            .or_else(|| source.parse::<f64>().ok().map(Value::Float)),
        Some(_) => source.parse::<f64>().ok().map(Value::Float)
    }
}

/// `"text"` or `'text'`; the delimiting quote cannot appear inside.
pub(crate) fn parse_quoted(source: &str) -> Option<&str> {
    let quote = source.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = source.get(1..source.len() - 1).filter(|_| source.len() >= 2)?;
    if source.ends_with(quote) && !inner.contains(quote) {
        Some(inner)
    } else {
        None
    }
}

fn parse_path(source: &str) -> Option<Expr> {
    let root_len = identifier_len(source, false);
    if root_len == 0 {
        return None;
    }
    let root = source[..root_len].to_owned();
    let mut rest = &source[root_len..];
    let mut steps = Vec::new();
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('.') {
            let len = identifier_len(tail, true);
            if len == 0 {
                return None;
            }
            steps.push(Step::Property(tail[..len].to_owned()));
            rest = &tail[len..];
        } else if rest.starts_with('[') {
            let close = matching_bracket(rest)?;
            steps.push(Step::Index(Box::new(parse_expr(&rest[1..close]))));
            rest = &rest[close + 1..];
        } else if let Some(tail) = rest.strip_prefix("()") {
            steps.push(Step::Call);
            rest = tail;
        } else {
            return None;
        }
    }
    Some(Expr::Path { root, steps })
}

pub(crate) fn is_identifier(source: &str) -> bool {
    !source.is_empty() && identifier_len(source, false) == source.len()
}

fn identifier_len(source: &str, allow_leading_digit: bool) -> usize {
    let is_start = |c: char| c.is_alphabetic() || c == '_' || c == '$';
    let is_part = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let mut len = 0;
    for (i, c) in source.char_indices() {
        let ok = if i == 0 && !allow_leading_digit { is_start(c) } else { is_part(c) };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

// byte offset of the `]` closing the `[` that starts `source`
fn matching_bracket(source: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    for (i, c) in source.char_indices() {
        match quote {
            Some(q) => if c == q {
                quote = None;
            },
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                },
                _ => {}
            }
        }
    }
    None
}

// characters outside string literals and brackets, with their byte offsets
fn top_level(source: &str) -> Vec<(usize, char)> {
    let mut chars = Vec::new();
    let mut quote = None;
    let mut depth = 0usize;
    for (i, c) in source.char_indices() {
        match quote {
            Some(q) => if c == q {
                quote = None;
            },
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '(' => depth += 1,
                ']' | ')' => depth = depth.saturating_sub(1),
                _ if depth == 0 => chars.push((i, c)),
                _ => {}
            }
        }
    }
    chars
}

fn split_top_level(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(source) {
        if c == separator {
            parts.push(&source[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&source[start..]);
    parts
}

fn find_comparison(source: &str) -> Option<(usize, CompareOp, usize)> {
    for (i, c) in top_level(source) {
        if !matches!(c, '=' | '!' | '>' | '<') {
            continue;
        }
        let followed_by_eq = source[i + 1..].starts_with('=');
        let found = match (c, followed_by_eq) {
            ('=', true) => Some((CompareOp::Eq, 2)),
            ('!', true) => Some((CompareOp::Ne, 2)),
            ('>', true) => Some((CompareOp::Ge, 2)),
            ('<', true) => Some((CompareOp::Le, 2)),
            ('>', false) => Some((CompareOp::Gt, 1)),
            ('<', false) => Some((CompareOp::Lt, 1)),
            _ => None
        };
        if let Some((op, len)) = found {
            return Some((i, op, len));
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn context() -> Context {
        let user: Value = Value::from_iter([
            ("name", Value::from("Ada")),
            ("tags", Value::from(vec!["x", "y"])),
            ("greet", Value::function(|receiver| {
                match receiver {
                    Some(Value::Map(map)) => Ok(Value::from(format!("hi {}", map["name"]))),
                    _ => Err("no receiver".to_owned())
                }
            })),
        ]);
        Context::new()
            .with("user", user)
            .with("key", "name")
            .with("idx", 1)
            .with("n", 5)
            .with("s", "b")
            .with("nothing", Value::Null)
            .with("empty", Value::Seq(vec![]))
            .with("fail", Value::function(|_| Err("boom".to_owned())))
            .with("counts", Value::from_iter([("1", "one")]))
    }

    fn eval(source: &str) -> Value {
        let context = context();
        let stack = Stack::new(&context);
        let filters = FilterRegistry::default();
        Evaluator::new(&stack, &filters).value(&Expression::parse(source)).into_owned()
    }

    fn test(source: &str) -> bool {
        let context = context();
        let stack = Stack::new(&context);
        let filters = FilterRegistry::default();
        Evaluator::new(&stack, &filters).test(&Test::parse(source))
    }

    #[test]
    fn literals() {
        assert_eq!(eval("true"), Value::Bool(true));
        assert_eq!(eval(" false "), Value::Bool(false));
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("undefined"), Value::Undefined);
        assert_eq!(eval("-12"), Value::Int(-12));
        assert_eq!(eval("3.25"), Value::Float(3.25));
        assert_eq!(eval("'a|b'"), Value::from("a|b"));
        assert_eq!(eval(r#""it's""#), Value::from("it's"));
    }

    #[test]
    fn malformed_expressions_are_undefined() {
        assert_eq!(eval("1.2.3"), Value::Undefined);
        assert_eq!(eval("\"open"), Value::Undefined);
        assert_eq!(eval("user..name"), Value::Undefined);
        assert_eq!(eval("user[0"), Value::Undefined);
        assert_eq!(eval(""), Value::Undefined);
    }

    #[test]
    fn path_chains() {
        assert_eq!(eval("user.name"), Value::from("Ada"));
        assert_eq!(eval("user['name']"), Value::from("Ada"));
        assert_eq!(eval("user[key]"), Value::from("Ada"));
        assert_eq!(eval("user.tags[idx]"), Value::from("y"));
        assert_eq!(eval("user.tags.0"), Value::from("x"));
        assert_eq!(eval("user.tags.length"), Value::Int(2));
        assert_eq!(eval("user.name[0]"), Value::from("A"));
        assert_eq!(eval("counts[1]"), Value::from("one"));
    }

    #[test]
    fn missing_steps_short_circuit() {
        assert_eq!(eval("missing"), Value::Undefined);
        assert_eq!(eval("missing.deeper.still"), Value::Undefined);
        assert_eq!(eval("nothing.x"), Value::Undefined);
        assert_eq!(eval("n.x"), Value::Undefined);
        assert_eq!(eval("n[0]"), Value::Undefined);
        assert_eq!(eval("user.tags[9]"), Value::Undefined);
        assert_eq!(eval("user.tags[true]"), Value::Undefined);
    }

    #[test]
    fn calls_receive_their_owner() {
        assert_eq!(eval("user.greet()"), Value::from("hi Ada"));
        assert_eq!(eval("user.greet().length"), Value::Int(6));
        assert_eq!(eval("fail()"), Value::Undefined);
        assert_eq!(eval("user.name()"), Value::Undefined);
    }

    #[test]
    fn filters_apply_left_to_right() {
        assert_eq!(eval("user.name | upper"), Value::from("ADA"));
        assert_eq!(eval("user.name | upper | lower"), Value::from("ada"));
        assert_eq!(eval("'a|b' | upper"), Value::from("A|B"));
        assert_eq!(eval("user.name | no_such_filter"), Value::from("Ada"));
        assert_eq!(eval("missing | default:user.name"), Value::from("Ada"));
        assert_eq!(eval("user.tags | join:' | '"), Value::from("x | y"));
    }

    #[test]
    fn comparisons() {
        assert!(test("n > 3"));
        assert!(test("n >= 5"));
        assert!(!test("n < 5"));
        assert!(test("n <= 5.0"));
        assert!(test("n == 5"));
        assert!(test("n != 6"));
        assert!(test("s == 'b'"));
        assert!(test("s > 'a'"));
        assert!(test("'10' < '9'"));
        assert!(test("nothing == ''"));
        assert!(test("missing == undefined"));
        assert!(!test("s == 'a>b' | default:'b'"));
    }

    #[test]
    fn truthiness_tests() {
        assert!(test("n"));
        assert!(test("empty"));
        assert!(test("user"));
        assert!(!test("nothing"));
        assert!(!test("missing"));
        assert!(!test("0"));
        assert!(!test("''"));
    }

    #[test]
    fn operator_inside_literal_is_not_a_comparison() {
        assert_eq!(Test::parse("'a>b'").kind, TestKind::Truthy(Expr::Literal(Value::from("a>b"))));
        let Some((at, op, _)) = find_comparison("x['<'] >= 2") else {
            panic!("no comparison found");
        };
        assert_eq!((at, op), (7, CompareOp::Ge));
    }

    #[test]
    fn evaluation_does_not_touch_context() {
        let context = context();
        let mut stack = Stack::new(&context);
        stack.push(Map::from_iter([("n".to_owned(), Value::Int(50))]));
        let filters = FilterRegistry::default();
        assert!(Evaluator::new(&stack, &filters).test(&Test::parse("n > 10")));
        assert_eq!(context.get("n"), Some(&Value::Int(5)));
    }
}
