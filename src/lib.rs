//! A small tag-based templating engine for HTML.
//!
//! Template source is lexed by a [Reader] into tokens, parsed into a tree of
//! [Node]s, and rendered against a [Context]. An [Engine] loads templates by
//! path through a [Loader], caches each parsed [Template] for its lifetime,
//! and resolves `include` and `extends` through that cache.
//!
//! Supported syntax:
//!
//! - `{{ expression }}` interpolation, HTML-escaped unless the value is [Markup]
//! - `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}`
//! - `{% for item in items %}` and `{% for key, value in mapping %}` / `{% endfor %}`
//! - `{% block name %}` / `{% endblock %}` with `{% extends "base.html" %}`
//! - `{% include "part.html" %}`
//! - `{# comments #}`
//! - filters: `{{ name | upper }}`, `{{ items | join:", " }}`
//!
//! Evaluation never fails: unknown names, bad indices and unknown filters
//! simply produce empty output. Only syntax errors and templates that cannot
//! be loaded are errors.
//!
//!
//! # Samples
//!
//! ## Hello world
//!
//! ```
//! use tagtmpl::{Context, Template};
//!
//! let template = Template::from("hello, {{ you }}!").unwrap();
//! let context = Context::new().with("you", "world");
//!
//! assert_eq!(template.render(&context).unwrap(), "hello, world!");
//! ```
//!
//! ## Hello team
//!
//! ```
//! use tagtmpl::{Context, Template, YamlValue};
//!
//! let text = "{% for member in team %}hello, {{ member.address }} {{ member.name }}!\n{% endfor %}";
//! let data = r#"
//!   team:
//!     - name: john
//!       address: little
//!     - name: 42
//!       address: citizen
//! "#;
//!
//! let template = Template::from(text).unwrap();
//! let yaml = serde_yaml::from_str::<YamlValue>(data).unwrap();
//! let context = Context::try_from(yaml).unwrap();
//!
//! assert_eq!(template.render(&context).unwrap(), "hello, little john!\nhello, citizen 42!\n");
//! ```
//!
//! ## Inheritance
//!
//! ```
//! use tagtmpl::{Context, Engine, MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with("base.html", "<html>{% block body %}DEFAULT{% endblock %}</html>")
//!     .with("page.html", r#"{% extends "base.html" %}{% block body %}{{ title | upper }}{% endblock %}"#);
//! let engine = Engine::new(loader);
//! let context = Context::new().with("title", "<hi>");
//!
//! assert_eq!(engine.render_template("page.html", &context).unwrap(), "<html>&lt;HI&gt;</html>");
//! ```
mod context;
mod engine;
mod error;
mod expression;
mod filters;
mod json;
mod processor;
mod reader;
mod store;
mod template;
mod value;
mod yaml;

pub use self::context::Context;
pub use self::engine::Engine;
pub use self::error::{Error, Result, SyntaxError, SyntaxErrorKind};
pub use self::expression::{Expression, Test};
pub use self::filters::{FilterRegistry, DEFAULT_JSON_SCRIPT_ID};
pub use self::json::JsonValue;
pub use self::processor::MAX_INCLUDE_DEPTH;
pub use self::reader::{tokenize, Position, Reader, Token, TokenKind};
pub use self::store::{FileLoader, Loader, MemoryLoader, TemplateStore};
pub use self::template::{Branch, Node, Template};
pub use self::value::{Function, Map, Markup, Value};
pub use self::yaml::YamlValue;
