use std::collections::HashMap;
use std::sync::Arc;
use crate::context::{Context, Stack};
use crate::error::{Error, Result};
use crate::expression::Evaluator;
use crate::filters::FilterRegistry;
use crate::store::TemplateStore;
use crate::template::{Node, Template};
use crate::value::{Map, Value};


// block name -> body that replaces the block's own body
type Overrides<'t> = HashMap<&'t str, &'t [Node]>;

/// Deepest chain of nested includes before rendering gives up.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Walks template trees and produces text.
pub(crate) struct Processor<'e> {
    store: &'e TemplateStore,
    filters: &'e FilterRegistry,
    // includes being rendered, outermost first
    includes: Vec<String>,
}

impl<'e> Processor<'e> {
    pub(crate) fn new(store: &'e TemplateStore, filters: &'e FilterRegistry) -> Self {
        Processor {
            store,
            filters,
            includes: Vec::new(),
        }
    }

    pub(crate) fn render(&mut self, template: &Template, context: &Context) -> Result<String> {
        let mut stack = Stack::new(context);
        self.compose(template, &mut stack)
    }

    // bounded by depth, not by name: a template may include itself for
    // nested data
    fn include(&mut self, path: &str, stack: &mut Stack<'_>) -> Result<String> {
        if self.includes.len() >= MAX_INCLUDE_DEPTH {
            let mut chain = self.includes.clone();
            chain.push(path.to_owned());
            return Err(Error::IncludeDepth { path: path.to_owned(), limit: MAX_INCLUDE_DEPTH, chain });
        }
        tracing::trace!(path, depth = self.includes.len(), "including template");
        let included = self.store.load(path)?;
        self.includes.push(path.to_owned());
        let rendered = self.compose(&included, stack);
        self.includes.pop();
        rendered
    }

    // resolve the extends chain up to its root, then render the root with
    // block bodies taken from the template closest to the leaf
    fn compose(&mut self, template: &Template, stack: &mut Stack<'_>) -> Result<String> {
        let mut parents: Vec<Arc<Template>> = Vec::new();
        let mut seen = vec![template.path().to_owned()];
        let mut next = template.extends().map(str::to_owned);
        while let Some(path) = next {
            tracing::trace!(template = template.path(), parent = %path, "resolving extends");
            if seen.contains(&path) {
                seen.push(path.clone());
                return Err(Error::Recursion { path, chain: seen });
            }
            seen.push(path.clone());
            let parent = self.store.load(&path)?;
            next = parent.extends().map(str::to_owned);
            parents.push(parent);
        }

        let mut overrides = Overrides::new();
        let chain = std::iter::once(template)
            .chain(parents.iter().map(Arc::as_ref))
            .take(parents.len());
        for descendant in chain {
            let mut blocks = Overrides::new();
            collect_blocks(descendant.nodes(), &mut blocks);
            for (name, body) in blocks {
                overrides.entry(name).or_insert(body);
            }
        }
        let root = parents.last().map_or(template, Arc::as_ref);
        self.render_nodes(root.nodes(), stack, &overrides)
    }

    fn render_nodes(
        &mut self, nodes: &[Node], stack: &mut Stack<'_>, overrides: &Overrides<'_>
    ) -> Result<String> {
        let mut result = String::new();
        for node in nodes {
            self.render_node(node, stack, overrides, &mut result)?;
        }
        Ok(result)
    }

    fn render_node(
        &mut self, node: &Node, stack: &mut Stack<'_>, overrides: &Overrides<'_>, out: &mut String
    ) -> Result<()> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { expression, .. } => {
                let value = Evaluator::new(stack, self.filters).value(expression);
                match value.as_ref() {
                    Value::Safe(markup) => out.push_str(markup.as_str()),
                    other => out.push_str(&html_escape(&other.to_string())),
                }
            },
            Node::Conditional { branches } => {
                let evaluator = Evaluator::new(stack, self.filters);
                let chosen = branches.iter().find(|branch| {
                    branch.test.as_ref().map_or(true, |test| evaluator.test(test))
                });
                if let Some(branch) = chosen {
                    out.push_str(&self.render_nodes(&branch.body, stack, overrides)?);
                }
            },
            Node::Loop { bindings, iterable, body } => {
                let iterable = Evaluator::new(stack, self.filters).value(iterable).into_owned();
                let len = stack.len();
                for frame in loop_frames(&iterable, bindings) {
                    stack.push(frame);
                    let rendered = self.render_nodes(body, stack, overrides);
                    stack.truncate(len);
                    out.push_str(&rendered?);
                }
            },
            Node::Include { path } => out.push_str(&self.include(path, stack)?),
            Node::Block { name, body } => {
                let body = overrides.get(name.as_str()).copied().unwrap_or(body.as_slice());
                out.push_str(&self.render_nodes(body, stack, overrides)?);
            },
            Node::Extends { .. } => {}
        }
        Ok(())
    }
}

// top-level blocks only; a later block of the same name replaces an
// earlier one
fn collect_blocks<'t>(nodes: &'t [Node], blocks: &mut Overrides<'t>) {
    for node in nodes {
        if let Node::Block { name, body } = node {
            blocks.insert(name.as_str(), body.as_slice());
        }
    }
}

// one frame of bindings per iteration; anything that is neither a
// sequence nor a mapping iterates zero times
fn loop_frames(iterable: &Value, bindings: &[String]) -> Vec<Map> {
    let frame = |values: Vec<Value>| -> Map {
        bindings.iter().cloned().zip(values).collect()
    };
    match (iterable, bindings.len()) {
        (Value::Seq(items), 1) => items.iter()
            .map(|item| frame(vec![item.clone()]))
            .collect(),
        (Value::Seq(items), _) => items.iter()
            .map(|item| match item {
                Value::Seq(pair) => frame(vec![
                    pair.first().cloned().unwrap_or(Value::Null),
                    pair.get(1).cloned().unwrap_or(Value::Null),
                ]),
                _ => frame(vec![Value::Null, Value::Null]),
            })
            .collect(),
        (Value::Map(entries), 1) => entries.values()
            .map(|value| frame(vec![value.clone()]))
            .collect(),
        (Value::Map(entries), _) => entries.iter()
            .map(|(key, value)| frame(vec![Value::Str(key.clone()), value.clone()]))
            .collect(),
        _ => Vec::new()
    }
}

pub(crate) fn html_escape(input: &str) -> String {
    input.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
