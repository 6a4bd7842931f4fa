use tagtmpl::{Context, Engine, Error, MemoryLoader, Value, MAX_INCLUDE_DEPTH};
use pretty_assertions::assert_eq;


fn engine(templates: &[(&str, &str)]) -> Engine {
    let loader = templates.iter().fold(MemoryLoader::new(), |loader, (path, source)| {
        loader.with(*path, *source)
    });
    Engine::new(loader)
}

#[test]
fn layout_with_many_pages() {
    let engine = engine(&[
        ("layout.html", "<title>{% block title %}Site{% endblock %}</title><main>{% block main %}{% endblock %}</main>"),
        ("home.html", r#"{% extends "layout.html" %}{% block main %}Welcome, {{ user }}{% endblock %}"#),
        ("about.html", r#"{% extends "layout.html" %}{% block title %}About{% endblock %}{% block main %}Us{% endblock %}"#),
    ]);
    let context = Context::new().with("user", "<ann>");
    assert_eq!(
        engine.render_template("home.html", &context).unwrap(),
        "<title>Site</title><main>Welcome, &lt;ann&gt;</main>"
    );
    assert_eq!(
        engine.render_template("about.html", &context).unwrap(),
        "<title>About</title><main>Us</main>"
    );
    // the shared layout is parsed once
    assert_eq!(engine.store().len(), 3);
}

#[test]
fn closest_override_wins() {
    let engine = engine(&[
        ("a.html", "{% block x %}a{% endblock %}"),
        ("b.html", r#"{% extends "a.html" %}{% block x %}b{% endblock %}"#),
        ("c.html", r#"{% extends "b.html" %}{% block x %}c{% endblock %}"#),
    ]);
    let context = Context::new();
    assert_eq!(engine.render_template("a.html", &context).unwrap(), "a");
    assert_eq!(engine.render_template("b.html", &context).unwrap(), "b");
    assert_eq!(engine.render_template("c.html", &context).unwrap(), "c");
}

#[test]
fn include_gets_current_bindings() {
    let engine = engine(&[
        ("row.html", "{{ key }}:{{ value }} "),
        ("table.html", r#"{% for key, value in rows %}{% include "row.html" %}{% endfor %}"#),
    ]);
    let rows = vec![("a", 1), ("b", 2)]
        .into_iter()
        .collect::<Value>();
    let context = Context::new().with("rows", rows);
    assert_eq!(engine.render_template("table.html", &context).unwrap(), "a:1 b:2 ");
}

#[test]
fn missing_parent_is_a_load_error() {
    let engine = engine(&[
        ("child.html", r#"{% extends "nowhere.html" %}{% block a %}{% endblock %}"#),
    ]);
    let err = engine.render_template("child.html", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Load { ref path, .. } if path == "nowhere.html"), "{}", err);
}

#[test]
fn missing_include_is_a_load_error() {
    let engine = engine(&[("page.html", r#"a{% include "gone.html" %}"#)]);
    let err = engine.render_template("page.html", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Load { ref path, .. } if path == "gone.html"), "{}", err);
}

#[test]
fn recursive_include_renders_a_tree() {
    let engine = engine(&[
        ("tree.html", r#"<li>{{ node.name }}<ul>{% for node in node.children %}{% include "tree.html" %}{% endfor %}</ul></li>"#),
    ]);
    let data = serde_json::json!({
        "node": {
            "name": "root",
            "children": [
                { "name": "a", "children": [{ "name": "a1", "children": [] }] },
                { "name": "b", "children": [] }
            ]
        }
    });
    let context = Context::try_from(data).unwrap();
    assert_eq!(
        engine.render_template("tree.html", &context).unwrap(),
        "<li>root<ul><li>a<ul><li>a1<ul></ul></li></ul></li><li>b<ul></ul></li></ul></li>"
    );
}

#[test]
fn runaway_include_cycle_hits_the_depth_limit() {
    let engine = engine(&[
        ("a.html", r#"A{% include "b.html" %}"#),
        ("b.html", r#"B{% include "a.html" %}"#),
    ]);
    let err = engine.render_template("a.html", &Context::new()).unwrap_err();
    match err {
        Error::IncludeDepth { path, limit, chain } => {
            assert_eq!(limit, MAX_INCLUDE_DEPTH);
            assert_eq!(chain.len(), MAX_INCLUDE_DEPTH + 1);
            assert_eq!(&chain[..3], &["b.html", "a.html", "b.html"]);
            assert_eq!(chain.last(), Some(&path));
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn unconditional_self_include_hits_the_depth_limit() {
    let engine = engine(&[("loop.html", r#"{% include "loop.html" %}"#)]);
    let err = engine.render_template("loop.html", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::IncludeDepth { ref path, .. } if path == "loop.html"), "{}", err);
}

#[test]
fn extends_cycle_is_reported() {
    let engine = engine(&[
        ("a.html", r#"{% extends "b.html" %}"#),
        ("b.html", r#"{% extends "a.html" %}"#),
    ]);
    let err = engine.render_template("a.html", &Context::new()).unwrap_err();
    match err {
        Error::Recursion { path, chain } => {
            assert_eq!(path, "a.html");
            assert_eq!(chain, vec!["a.html", "b.html", "a.html"]);
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn blocks_nested_in_child_overrides_do_not_override_the_root() {
    let engine = engine(&[
        ("base.html", "[{% block title %}R{% endblock %}]{% block body %}{% endblock %}"),
        ("child.html", r#"{% extends "base.html" %}{% block body %}{% if false %}{% block title %}C{% endblock %}{% endif %}B{% endblock %}"#),
    ]);
    assert_eq!(engine.render_template("child.html", &Context::new()).unwrap(), "[R]B");
}

#[test]
fn syntax_error_in_parent_is_reported_with_its_path() {
    let engine = engine(&[
        ("base.html", "{% block a %}"),
        ("child.html", r#"{% extends "base.html" %}"#),
    ]);
    let err = engine.render_template("child.html", &Context::new()).unwrap_err();
    assert!(matches!(err, Error::Syntax { ref path, .. } if path == "base.html"), "{}", err);
}
