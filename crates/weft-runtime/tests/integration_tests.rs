use std::cell::Cell;
use std::rc::Rc;

use rstest::{fixture, rstest};
use weft_compiler::{Options as CompileOptions, compile_fragment};
use weft_lang::Value;
use weft_markup::{Document, markers};
use weft_runtime::{
    MemoryHost, Options, Request, RequestError, Response, Runtime, RuntimeError, ScopeId, mount_fragment,
};

#[fixture]
fn compile_options() -> CompileOptions {
    CompileOptions {
        file_name: "test.html".to_string(),
        ..CompileOptions::default()
    }
}

fn mount(source: &str) -> Runtime<MemoryHost> {
    let _ = tracing_subscriber::fmt::try_init();
    let (runtime, compilation) = mount_fragment(source, &compile_options());
    assert!(compilation.is_ok(), "{:?}", compilation.errors);
    runtime
}

fn mount_with(source: &str, options: Options) -> Runtime<MemoryHost> {
    let _ = tracing_subscriber::fmt::try_init();
    let (document, compilation) = compile_fragment(source, &compile_options());
    assert!(compilation.is_ok(), "{:?}", compilation.errors);
    let mut runtime = Runtime::new(compilation.program, MemoryHost::new(document)).with_options(options);
    runtime.mount();
    runtime
}

fn html(runtime: &Runtime<MemoryHost>) -> String {
    runtime.host().document().to_string()
}

fn root(runtime: &Runtime<MemoryHost>) -> ScopeId {
    runtime.root().unwrap()
}

fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

#[rstest]
fn test_cascade_is_synchronous() {
    let mut runtime = mount(r#"<div :name="[['John']]" :title="[['Hello ' + name]]"><p>[[title]]</p></div>"#);
    let root = root(&runtime);

    assert_eq!(html(&runtime), r#"<div data-weft="0"><p data-weft="1">Hello John</p></div>"#);

    assert!(runtime.write(root, "name", Value::from("Jane")));

    assert_eq!(runtime.output(runtime.lookup(root, "title").unwrap()), Some(&Value::from("Hello Jane")));
    assert_eq!(html(&runtime), r#"<div data-weft="0"><p data-weft="1">Hello Jane</p></div>"#);
}

#[rstest]
fn test_get_is_cached_within_a_cycle() {
    let mut runtime = mount(r#"<div :a="[[2]]" :b="[[a * 3]]"></div>"#);
    let b = runtime.lookup(root(&runtime), "b").unwrap();
    let before = runtime.stats();

    assert_eq!(runtime.get(b), Value::from(6.0));
    assert_eq!(runtime.get(b), Value::from(6.0));
    assert_eq!(runtime.stats(), before);

    runtime.start();
    assert!(runtime.stats().evaluations > before.evaluations);
    assert_eq!(runtime.get(b), Value::from(6.0));
}

#[rstest]
fn test_setting_an_equal_value_is_a_no_op() {
    let mut runtime = mount(r#"<div :name="[['John']]"><p class="x" :class-on="[[name]]">[[name]]</p></div>"#);
    let name = runtime.lookup(root(&runtime), "name").unwrap();
    let (cycle, stats) = (runtime.cycle(), runtime.stats());

    runtime.set(name, Value::from("John"));

    assert_eq!(runtime.cycle(), cycle);
    assert_eq!(runtime.stats(), stats);

    runtime.set(name, Value::from("Jane"));

    assert_eq!(runtime.cycle(), cycle + 1);
    assert!(runtime.stats().effects > stats.effects);
}

#[rstest]
fn test_nearest_declaration() {
    let runtime = mount(r#"<div :x="[[1]]"><section :x="[[2]]"><p>[[x]]</p></section><p>[[x]]</p></div>"#);

    assert_eq!(
        html(&runtime),
        r#"<div data-weft="0"><section data-weft="1"><p data-weft="2">2</p></section><p data-weft="3">1</p></div>"#
    );
}

#[rstest]
fn test_aliases_reach_into_child_scopes() {
    let mut runtime = mount(
        r#"<div><p>[[menu.open ? 'open' : 'closed']]</p><nav :aka="menu" :open="[[false]]"></nav></div>"#,
    );
    let root = root(&runtime);
    let nav = runtime.children(root)[1];

    assert!(html(&runtime).contains(">closed</p>"));

    runtime.write(nav, "open", Value::from(true));

    assert!(html(&runtime).contains(">open</p>"));
}

#[rstest]
fn test_replication() {
    let mut runtime = mount(r#"<ul :items="[[['a', 'b', 'c']]]"><li :data="[[items]]">[[data]]</li></ul>"#);
    let root = root(&runtime);
    let li = runtime.children(root)[0];

    assert_eq!(runtime.clones(li).len(), 2);
    assert_eq!(
        html(&runtime),
        concat!(
            r#"<ul data-weft="0">"#,
            r#"<li data-weft="1" data-weft-clone="0">a</li>"#,
            r#"<li data-weft="1" data-weft-clone="1">b</li>"#,
            r#"<li data-weft="1">c</li>"#,
            "</ul>"
        )
    );
    assert_eq!(runtime.read(li, "data"), Some(Value::from("c")));

    runtime.write(root, "items", json(serde_json::json!(["x"])));

    assert!(runtime.clones(li).is_empty());
    assert_eq!(html(&runtime), r#"<ul data-weft="0"><li data-weft="1">x</li></ul>"#);
}

#[rstest]
fn test_replication_updates_and_grows() {
    let mut runtime = mount(r#"<ul :items="[[[1, 2]]]"><li :data="[[items]]">[[data * 10]]</li></ul>"#);
    let root = root(&runtime);
    let li = runtime.children(root)[0];
    let first_clone = runtime.clones(li)[0];

    runtime.write(root, "items", json(serde_json::json!([3, 4, 5, 6])));

    assert_eq!(runtime.clones(li).len(), 3);
    assert_eq!(runtime.clones(li)[0], first_clone);
    assert_eq!(runtime.clone_index(runtime.clones(li)[2]), Some(2));
    assert_eq!(runtime.host().document().text_content(runtime.host().document().root()), "30405060");
}

#[rstest]
#[case::offset(r#":data-offset="[[1]]""#, "bc")]
#[case::length(r#":data-length="[[2]]""#, "ab")]
#[case::window(r#":data-offset="[[1]]" :data-length="[[1]]""#, "b")]
#[case::empty_window(r#":data-offset="[[5]]""#, "")]
fn test_replication_window(#[case] window: &str, #[case] expected: &str) {
    let runtime = mount(&format!(
        r#"<ul :items="[[['a', 'b', 'c']]]"><li :data="[[items]]" {window}>[[data]]</li></ul>"#
    ));

    assert_eq!(runtime.host().document().text_content(runtime.host().document().root()), expected);
}

#[rstest]
fn test_non_array_data_removes_clones() {
    let mut runtime = mount(r#"<ul :items="[[[1, 2, 3]]]"><li :data="[[items]]">[[data]]</li></ul>"#);
    let root = root(&runtime);
    let li = runtime.children(root)[0];

    runtime.write(root, "items", Value::from("solo"));

    assert!(runtime.clones(li).is_empty());
    assert_eq!(html(&runtime), r#"<ul data-weft="0"><li data-weft="1">solo</li></ul>"#);
}

#[rstest]
fn test_nested_replication() {
    let mut runtime = mount(
        r#"<ul :rows="[[[{items: [1, 2]}, {items: [3]}]]]"><li :data="[[rows]]"><span :data="[[data.items]]">[[data]]</span></li></ul>"#,
    );
    let root = root(&runtime);

    assert_eq!(
        html(&runtime),
        concat!(
            r#"<ul data-weft="0">"#,
            r#"<li data-weft="1" data-weft-clone="0">"#,
            r#"<span data-weft="2" data-weft-clone="0">1</span><span data-weft="2">2</span>"#,
            "</li>",
            r#"<li data-weft="1"><span data-weft="2">3</span></li>"#,
            "</ul>"
        )
    );
    let values = runtime.values_len();

    runtime.write(root, "rows", json(serde_json::json!([{"items": [4]}])));

    assert_eq!(
        html(&runtime),
        r#"<ul data-weft="0"><li data-weft="1"><span data-weft="2">4</span></li></ul>"#
    );
    assert!(runtime.values_len() < values);
}

#[rstest]
fn test_rehydration_adopts_existing_clones() {
    let source = r#"<ul :items="[[['a', 'b', 'c']]]"><li :data="[[items]]">[[data]]</li></ul>"#;
    let (first, compilation) = mount_fragment(source, &compile_options());
    let rendered = first.into_host().into_document();
    let nodes = rendered.len();
    let expected = rendered.to_string();

    let mut runtime = Runtime::new(compilation.program, MemoryHost::new(rendered));
    let root = runtime.mount().unwrap();
    let li = runtime.children(root)[0];

    assert_eq!(runtime.clones(li).len(), 2);
    assert_eq!(runtime.host().document().len(), nodes);
    assert_eq!(html(&runtime), expected);

    runtime.write(root, "items", json(serde_json::json!(["a", "z"])));

    assert_eq!(
        html(&runtime),
        r#"<ul data-weft="0"><li data-weft="1" data-weft-clone="0">a</li><li data-weft="1">z</li></ul>"#
    );
}

#[rstest]
fn test_handler_fires_once_per_distinct_assignment() {
    let mut runtime = mount(r#"<div :name="[['a']]" :count="[[0]]" :handle-name="[[count++]]"><p>[[count]]</p></div>"#);
    let root = root(&runtime);

    assert_eq!(runtime.read(root, "count"), Some(Value::from(0.0)));

    for (name, expected) in [("b", 1.0), ("b", 1.0), ("c", 2.0), ("c", 2.0), ("a", 3.0)] {
        runtime.write(root, "name", Value::from(name));
        assert_eq!(runtime.read(root, "count"), Some(Value::from(expected)), "after {name}");
    }
    assert!(html(&runtime).contains(">3</p>"));
}

#[rstest]
fn test_handler_ignores_restart_without_assignment() {
    let mut runtime = mount(r#"<div :name="[['a']]" :count="[[0]]" :handle-name="[[count++]]"></div>"#);
    let root = root(&runtime);

    runtime.start();
    runtime.start();
    assert_eq!(runtime.read(root, "count"), Some(Value::from(0.0)));

    runtime.write(root, "count", Value::from(5.0));
    assert_eq!(runtime.read(root, "count"), Some(Value::from(5.0)));

    runtime.write(root, "name", Value::from("b"));
    runtime.start();
    assert_eq!(runtime.read(root, "count"), Some(Value::from(6.0)));
}

#[rstest]
fn test_text_after_replicated_sibling() {
    let mut runtime = mount(r#"<ul :footer="[['f1']]"><li :data="[[['a', 'b', 'c']]]">[[data]]</li>[[footer]]</ul>"#);
    let root = root(&runtime);

    runtime.write(root, "footer", Value::from("f2"));

    assert_eq!(
        html(&runtime),
        r#"<ul data-weft="0"><li data-weft="1" data-weft-clone="0">a</li><li data-weft="1" data-weft-clone="1">b</li><li data-weft="1">c</li>f2</ul>"#
    );
    assert!(runtime.diagnostics().is_empty(), "{:?}", runtime.diagnostics());
}

#[rstest]
fn test_text_in_clone_with_nested_replication() {
    let mut runtime = mount(
        r#"<div :groups="[[[[1], [2, 3]]]]"><section :data="[[groups]]"><i :data="[[data]]">[[data]]</i>[[data.length]]</section></div>"#,
    );
    let root = root(&runtime);

    runtime.write(root, "groups", json(serde_json::json!([[1, 2], [3, 4], [5, 6]])));

    let text = {
        let document = runtime.host().document();
        document.text_content(document.root())
    };
    assert_eq!(text, "122342562");
    assert!(runtime.diagnostics().is_empty(), "{:?}", runtime.diagnostics());
}

#[rstest]
#[case::false_literal(Value::from(false), false)]
#[case::null(Value::Null, false)]
#[case::false_string(Value::from("false"), false)]
#[case::empty_string(Value::from(""), true)]
#[case::zero(Value::from(0.0), true)]
#[case::text(Value::from("yes"), true)]
fn test_class_truthiness(#[case] value: Value, #[case] present: bool) {
    let mut runtime = mount(r#"<div :on="[[true]]" :class-active="[[on]]"></div>"#);
    let root = root(&runtime);
    let node = runtime.scope_node(root).unwrap();
    assert!(runtime.host().document().has_class(node, "active"));

    runtime.write(root, "on", value);

    assert_eq!(runtime.host().document().has_class(node, "active"), present);
}

#[rstest]
fn test_style_and_attribute_bindings() {
    let mut runtime = mount(r#"<a :url="[['/x']]" :attr-href="[[url]]" :style-color="[[url ? 'red' : null]]">go</a>"#);
    let root = root(&runtime);
    let a = runtime.scope_node(root).unwrap();

    let document = runtime.host().document();
    assert_eq!(document.attribute(a, "href"), Some("/x"));
    assert_eq!(document.style(a, "color").as_deref(), Some("red"));

    runtime.write(root, "url", Value::Null);

    assert_eq!(html(&runtime), r#"<a data-weft="0">go</a>"#);
}

#[rstest]
fn test_events() {
    let mut runtime = mount(r#"<button :count="[[0]]" :on-click="[[count += event.step]]">[[count]]</button>"#);
    let root = root(&runtime);
    let button = runtime.scope_node(root).unwrap();

    assert!(runtime.host().is_listening(button, "click"));
    assert_eq!(runtime.dispatch(button, "click", json(serde_json::json!({"step": 2}))), 1);
    assert_eq!(runtime.dispatch(button, "click", json(serde_json::json!({"step": 3}))), 1);
    assert_eq!(runtime.dispatch(button, "keyup", Value::Undefined), 0);

    assert_eq!(html(&runtime), r#"<button data-weft="0">5</button>"#);
}

#[rstest]
fn test_removed_clones_detach_listeners() {
    let mut runtime = mount(r#"<ul :items="[[[1, 2, 3]]]"><li :data="[[items]]" :on-click="[[data]]">[[data]]</li></ul>"#);
    let root = root(&runtime);

    assert_eq!(runtime.host().listeners().len(), 3);

    runtime.write(root, "items", json(serde_json::json!([1])));

    assert_eq!(runtime.host().listeners().len(), 1);
}

#[rstest]
fn test_request_completion() {
    let mut runtime = mount(r#"<div :request="[['/api/stats']]"><p>[[data ? data.count : 'loading']]</p></div>"#);
    let settled = Rc::new(Cell::new(0));
    let counter = Rc::clone(&settled);
    runtime.on_settle(move || counter.set(counter.get() + 1));

    assert!(html(&runtime).contains(">loading</p>"));
    let requests = runtime.host_mut().take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, Request::get("/api/stats"));
    assert!(!runtime.is_settled());

    assert!(runtime.complete_request(requests[0].0, Ok(Response::ok(r#"{"count": 3}"#))));
    assert!(!runtime.complete_request(requests[0].0, Ok(Response::ok("{}"))));

    assert!(html(&runtime).contains(">3</p>"));
    assert!(runtime.is_settled());
    assert_eq!(settled.get(), 1);
}

#[rstest]
#[case::status(Ok(Response { status: 503, body: String::new() }), "Request failed with status 503|503")]
#[case::transport(Err(RequestError::Transport("offline".into())), "Request failed: offline|")]
#[case::invalid_json(Ok(Response::ok("nope")), "|")]
fn test_request_failure_payload(#[case] result: Result<Response, RequestError>, #[case] expected: &str) {
    let mut runtime = mount(r#"<div :request="[['/x']]"><p>[[data && data.status]]</p><i>[[data && data.error]]</i></div>"#);
    let (id, _) = runtime.host_mut().take_requests().remove(0);

    runtime.complete_request(id, result);

    let document = runtime.host().document();
    let text = document.text_content(document.root());
    let (error, status) = expected.split_once('|').unwrap();
    assert!(text.starts_with(status), "{text}");
    if !error.is_empty() {
        assert!(text.ends_with(error), "{text}");
    }
    assert!(matches!(
        runtime.take_diagnostics().as_slice(),
        [RuntimeError::Request { .. }]
    ));
}

#[rstest]
fn test_request_echo_rehydrates_without_fetching() {
    let source = r#"<div :request="[['/a']]" :request-echo="[[true]]"><p>[[data && data.n]]</p></div>"#;
    let (mut first, compilation) = mount_fragment(source, &compile_options());
    let (id, _) = first.host_mut().take_requests().remove(0);
    first.complete_request(id, Ok(Response::ok(r#"{"n": 7}"#)));

    let rendered = first.into_host().into_document();
    let div = rendered.document_element().unwrap();
    assert_eq!(rendered.attribute(div, markers::ECHO), Some(r#"{"n": 7}"#));

    let mut runtime = Runtime::new(compilation.program, MemoryHost::new(rendered));
    runtime.mount();

    assert!(runtime.host_mut().take_requests().is_empty());
    assert_eq!(runtime.pending_requests(), 0);
    assert!(html(&runtime).contains(">7</p>"));
}

#[rstest]
fn test_request_object_form() {
    let mut runtime = mount(
        r#"<div :q="[['rust']]" :request="[[{url: '/search', method: 'POST', params: {q: q}}]]"></div>"#,
    );

    let requests = runtime.host_mut().take_requests();

    assert_eq!(
        requests[0].1,
        Request {
            url: "/search".into(),
            method: weft_runtime::Method::Post,
            params: serde_json::json!({"q": "rust"}),
        }
    );

    runtime.write(root(&runtime), "q", Value::from("wasm"));
    assert_eq!(runtime.pending_requests(), 2);
}

#[rstest]
fn test_cycles_are_rejected_at_link_time() {
    let mut runtime = mount(r#"<div :a="[[b + 1]]" :b="[[a + 1]]"></div>"#);

    let diagnostics = runtime.take_diagnostics();

    assert!(
        diagnostics
            .iter()
            .any(|d| matches!(d, RuntimeError::Cycle { observer, .. } if observer == "b")),
        "{diagnostics:?}"
    );
}

#[rstest]
fn test_cycles_terminate_without_detection() {
    let mut runtime = mount_with(
        r#"<div :a="[[b + 1]]" :b="[[a + 1]]"><p>[[a]]</p></div>"#,
        Options {
            detect_cycles: false,
            ..Options::default()
        },
    );

    assert!(runtime.take_diagnostics().is_empty());
    assert!(runtime.root().is_some());
}

#[rstest]
fn test_depth_limit() {
    let mut runtime = mount_with(
        r#"<div :a="[[1]]" :b="[[a + 1]]" :c="[[b + 1]]" :d="[[c + 1]]"></div>"#,
        Options {
            max_depth: 2,
            ..Options::default()
        },
    );

    assert!(
        runtime
            .take_diagnostics()
            .iter()
            .any(|d| matches!(d, RuntimeError::DepthExceeded { depth: 2, .. }))
    );
}

#[rstest]
fn test_failed_recompute_keeps_previous_output() {
    let mut runtime = mount(r#"<div :a="[[{x: {y: 1}}]]" :b="[[a.x.y]]"><p>[[b]]</p></div>"#);
    let root = root(&runtime);

    runtime.write(root, "a", Value::from(1.0));

    assert_eq!(runtime.read(root, "b"), Some(Value::from(1.0)));
    assert!(html(&runtime).contains(">1</p>"));
    assert!(matches!(
        runtime.take_diagnostics().as_slice(),
        [RuntimeError::Recompute { name, .. }] if name == "b"
    ));

    runtime.write(root, "a", json(serde_json::json!({"x": {"y": 5}})));
    assert_eq!(runtime.read(root, "b"), Some(Value::from(5.0)));
}

#[rstest]
fn test_mount_without_program() {
    let mut runtime = Runtime::new(
        weft_compiler::Program {
            root: None,
            scope_attribute: markers::SCOPE.into(),
        },
        MemoryHost::new(Document::new()),
    );

    assert_eq!(runtime.mount(), None);
    assert_eq!(runtime.values_len(), 0);
}
