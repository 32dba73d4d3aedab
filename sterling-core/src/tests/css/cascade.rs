use super::util::*;

#[test]
fn cascade_type_only_identity() {
    let result = attach_css("#hello { propA: 8; } .foo { propB: hello; } bar { propC: 5; }", Identity::new("bar"));
    assert_eq!(result.properties(), &props!("propC": 5));
    assert_eq!(result.matched_rule_count(), 1);
}

#[test]
fn cascade_merges_all_matching_rules() {
    let identity = Identity::new("myrenderableobject").with_id(Some("stephen")).with_classes(["red"]);
    let result = attach_css(".red { background: red; } #stephen { width: heavy; } myrenderableobject { foo: bar; }", identity);

    assert_eq!(result.matched_rule_count(), 3);
    let properties = result.properties();
    assert_eq!(properties.len(), 3);
    assert_eq!(properties.get("foo"), Some(&Value::from("bar")));
    assert_eq!(properties.get("width"), Some(&Value::from("heavy")));
    assert_eq!(properties.get("background"), Some(&Value::from("red")));
}

#[test]
fn cascade_specificity_beats_source_order() {
    let identity = || Identity::new("label").with_id(Some("x")).with_classes(["c"]);

    let forwards = attach_css("* { v: 0; } label { v: 1; } .c { v: 2; } #x { v: 3; }", identity());
    let backwards = attach_css("#x { v: 3; } .c { v: 2; } label { v: 1; } * { v: 0; }", identity());
    assert_eq!(forwards.properties().get("v"), Some(&Value::Int(3)));
    assert_eq!(backwards.properties().get("v"), Some(&Value::Int(3)));

    let result = attach_css("* { v: 0; } label { v: 1; } .c { v: 2; }", identity());
    assert_eq!(result.properties().get("v"), Some(&Value::Int(2)));
    let result = attach_css(".c { v: 2; } label { v: 1; } * { v: 0; }", Identity::new("label"));
    assert_eq!(result.properties().get("v"), Some(&Value::Int(1)));
    let result = attach_css("label { v: 1; } * { v: 0; }", Identity::new("panel"));
    assert_eq!(result.properties().get("v"), Some(&Value::Int(0)));

    // contributing rules come out lightest first
    let weights: Vec<Specificity> = forwards.rules().map(Rule::specificity).collect();
    assert!(weights.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn cascade_ties_go_to_later_rule() {
    let result = attach_css(".a { v: 1; } .b { v: 2; }", Identity::new("x").with_classes(["a", "b"]));
    assert_eq!(result.properties().get("v"), Some(&Value::Int(2)));

    let result = attach_css(".b { v: 2; } .a { v: 1; }", Identity::new("x").with_classes(["a", "b"]));
    assert_eq!(result.properties().get("v"), Some(&Value::Int(1)));
}

#[test]
fn cascade_is_deterministic() {
    let sheet = Stylesheet::from_str("* { a: 1; } label { a: 2; b: x; } .c { b: y; c: 1.5; } panel label { d: true; }").unwrap();
    let identity = Arc::new(Identity::new("label").with_classes(["c"]).with_ancestor(Some(Arc::new(Identity::new("panel")))));

    let first = sheet.attach_identity(Arc::clone(&identity)).properties().clone();
    for _ in 0..10 {
        let again = sheet.attach_identity(Arc::clone(&identity));
        assert_eq!(again.properties(), &first);
        assert_eq!(again.properties().to_string(), first.to_string());
    }
}

#[test]
fn cascade_pseudo_states() {
    let css = "button { color: black; } button:hover { color: red; } button:pressed { color: blue; border: 1; }";

    let idle = attach_css(css, Identity::new("button"));
    assert_eq!(idle.matched_rule_count(), 1);
    assert_eq!(idle.properties(), &props!("color": "black"));

    let hovered = attach_css(css, Identity::new("button").with_states(["hover"]));
    assert_eq!(hovered.matched_rule_count(), 2);
    assert_eq!(hovered.properties(), &props!("color": "red"));

    let mut result = attach_css(css, Identity::new("button"));
    result.set_states(["pressed"]);
    assert_eq!(result.properties(), &props!("color": "blue", "border": 1));
    result.set_states([]);
    assert_eq!(result.properties(), &props!("color": "black"));
}

#[test]
fn cascade_multi_state_selector_needs_any_one_state() {
    let css = "a { color: black; } a:focus:hover { color: red; }";

    let hovered = attach_css(css, Identity::new("a").with_states(["hover"]));
    assert_eq!(hovered.matched_rule_count(), 2);
    assert_eq!(hovered.properties(), &props!("color": "red"));

    let both = attach_css(css, Identity::new("a").with_states(["focus", "hover"]));
    assert_eq!(both.properties(), &props!("color": "red"));

    let other = attach_css(css, Identity::new("a").with_states(["pressed"]));
    assert_eq!(other.matched_rule_count(), 1);
    assert_eq!(other.properties(), &props!("color": "black"));
}

#[test]
fn apply_layers_defaults_base_and_states() {
    init_logger();
    let mut parser = StyleParser::new();
    parser.defaults_mut().set("*", "color", "gray").set("button", "padding", 2);
    let sheet = parser.parse("button { color: black; } button:hover { color: red; }").unwrap();

    let mut node = TestNode::new("Button").states("hover");
    let mut result = sheet.apply(&mut node, None);

    let names: Vec<&str> = node.props.layer_names().collect();
    assert_eq!(names, [DEFAULT_LAYER, BASE_LAYER, state_layer("hover").as_str()]);
    assert_eq!(node.props.get("color"), Some(&Value::from("red")));
    assert_eq!(node.props.get("padding"), Some(&Value::Int(2)));

    result.set_state(&mut node.props, "hover", false);
    assert_eq!(node.props.get("color"), Some(&Value::from("black")));
    assert!(result.states().is_empty());

    result.set_state(&mut node.props, "hover", true);
    assert_eq!(node.props.get("color"), Some(&Value::from("red")));

    node.props.remove_layer(BASE_LAYER);
    node.props.remove_layer(&state_layer("hover"));
    assert_eq!(node.props.get("color"), Some(&Value::from("gray")));
}

#[test]
fn apply_keeps_user_values() {
    init_logger();
    let sheet = stylesheet!("src/tests/css/test.css");

    let mut node = TestNode::new("name");
    node.props.set("sticky", 2);
    sheet.apply(&mut node, None);

    assert_eq!(node.props.get("sticky"), Some(&Value::Int(2)));
    assert_eq!(node.props.get("value"), Some(&Value::Int(1)));

    node.props.delete("sticky");
    assert_eq!(node.props.get("sticky"), Some(&Value::Int(-1)));
}

#[test]
fn apply_states_named_like_reserved_layers() {
    init_logger();
    let mut parser = StyleParser::new();
    parser.defaults_mut().set("*", "color", "gray");
    let sheet = parser.parse("input:default { border: 1; } input:user { color: red; }").unwrap();

    let mut node = TestNode::new("input").states("default");
    let mut result = sheet.apply(&mut node, None);

    let names: Vec<&str> = node.props.layer_names().collect();
    assert_eq!(names, [DEFAULT_LAYER, BASE_LAYER, state_layer("default").as_str()]);
    assert_eq!(node.props.get("color"), Some(&Value::from("gray")));
    assert_eq!(node.props.get("border"), Some(&Value::Int(1)));

    result.set_state(&mut node.props, "default", false);
    assert_eq!(node.props.get("color"), Some(&Value::from("gray")));
    assert_eq!(node.props.get("border"), None);
    assert!(node.props.layer(DEFAULT_LAYER).is_some());

    node.props.set("color", "mine");
    result.set_state(&mut node.props, "user", true);
    assert_eq!(node.props.get("color"), Some(&Value::from("mine")));
    result.set_state(&mut node.props, "user", false);
    assert_eq!(node.props.get("color"), Some(&Value::from("mine")));
    assert_eq!(node.props.layer(USER_LAYER), Some(&props!("color": "mine")));

    node.props.delete("color");
    assert_eq!(node.props.get("color"), Some(&Value::from("gray")));
}

#[test]
fn apply_again_drops_inactive_state_layers() {
    init_logger();
    let sheet = Stylesheet::from_str("button { color: black; } button:hover { color: red; }").unwrap();

    let mut node = TestNode::new("button").states("hover");
    sheet.apply(&mut node, None);
    assert_eq!(node.props.get("color"), Some(&Value::from("red")));

    node.states.clear();
    let result = sheet.apply(&mut node, None);
    assert_eq!(result.properties(), &props!("color": "black"));
    assert_eq!(node.props.get("color"), Some(&Value::from("black")));

    let names: Vec<&str> = node.props.layer_names().collect();
    assert_eq!(names, [BASE_LAYER]);
}

#[test]
fn apply_store_agrees_with_cascade() {
    init_logger();
    let sheet = Stylesheet::from_str("#ok { color: blue; } button:hover { color: red; padding: 3; } button { padding: 1; }").unwrap();

    let mut node = TestNode::new("button").id("ok").states("hover");
    let mut result = sheet.apply(&mut node, None);

    // the id rule outweighs the hover rule, the hover rule outweighs the type rule
    assert_eq!(result.properties(), &props!("padding": 3, "color": "blue"));
    assert_eq!(node.props.get("color"), Some(&Value::from("blue")));
    assert_eq!(node.props.get("padding"), Some(&Value::Int(3)));
    assert_eq!(node.props.layer(&state_layer("hover")), Some(&props!("padding": 3)));

    result.set_state(&mut node.props, "hover", false);
    assert_eq!(node.props.get("color"), Some(&Value::from("blue")));
    assert_eq!(node.props.get("padding"), Some(&Value::Int(1)));

    result.set_state(&mut node.props, "hover", true);
    for (name, value) in result.properties().iter() {
        assert_eq!(node.props.get(name), Some(value));
    }
}

#[test]
fn apply_all_fixture() {
    init_logger();
    let sheet = stylesheet!("src/tests/css/test.css");

    let mut root = TestNode::new("name").id("parent").children([
        TestNode::new("name").id("child"),
        TestNode::new("box").children([TestNode::new("name").id("child")]),
        TestNode::new("name").id("name").classes("name"),
    ]);
    let identity = sheet.apply_all(&mut root, None);
    assert_eq!(identity.id().map(|id| id.to_string()), Some("parent".to_string()));

    assert_eq!(root.props.get("value"), Some(&Value::Int(1)));
    assert_eq!(root.children[0].props.get("value"), Some(&Value::Int(5)));
    assert!(root.children[1].props.get("value").is_none());
    assert_eq!(root.children[1].children[0].props.get("value"), Some(&Value::Int(5)));
    assert_eq!(root.children[2].props.get("value"), Some(&Value::Int(4)));

    // a #child outside any #parent only gets the type rule
    let mut lone = TestNode::new("name").id("child");
    sheet.apply(&mut lone, None);
    assert_eq!(lone.props.get("value"), Some(&Value::Int(1)));
}

#[test]
fn apply_all_passes_ancestor() {
    let css = "window > panel { depth: 1; } window label { depth: 2; } outer window { nested: true; }";
    let sheet = Stylesheet::from_str(css).unwrap();

    let outer = Arc::new(Identity::new("outer"));
    let mut root = TestNode::new("window").children([TestNode::new("panel").children([TestNode::new("label")])]);
    sheet.apply_all(&mut root, Some(outer));

    assert_eq!(root.props.get("nested"), Some(&Value::Bool(true)));
    assert_eq!(root.children[0].props.get("depth"), Some(&Value::Int(1)));
    assert_eq!(root.children[0].children[0].props.get("depth"), Some(&Value::Int(2)));
}

#[test]
fn rematch_narrows_matches() {
    let sheet = Stylesheet::from_str("* { a: 1; } panel > * { b: 2; } label { c: 3; }").unwrap();

    let panel = Arc::new(Identity::new("panel"));
    let broad = sheet.attach_identity(Arc::new(Identity::new("label").with_ancestor(Some(Arc::clone(&panel)))));
    assert_eq!(broad.matched_rule_count(), 3);

    // same object, now under a different parent: only rules that still hold survive
    let moved = broad.rematch(Arc::new(Identity::new("label").with_ancestor(Some(Arc::new(Identity::new("box"))))));
    assert_eq!(moved.properties(), &props!("a": 1, "c": 3));

    // rules excluded earlier are never brought back
    let narrowed = moved.rematch(Arc::new(Identity::new("label").with_ancestor(Some(panel))));
    assert_eq!(narrowed.matched_rule_count(), 2);
}

#[test]
fn style_check_reports_unused_rules() {
    init_logger();
    let sheet = Stylesheet::from_str("label { a: 1; } panel { b: 2; } .ghost { c: 3; }").unwrap();
    assert_eq!(sheet.style_check().len(), 3);

    sheet.attach_identity(Arc::new(Identity::new("label")));
    let clone = sheet.clone();
    clone.attach_identity(Arc::new(Identity::new("panel")));

    assert_eq!(sheet.style_check(), [".ghost"]);
    assert!(sheet.rules().filter(|rule| rule.is_used()).count() == 2);
}

#[test]
fn attach_styleable() {
    let sheet = Stylesheet::from_str("panel > label.child { x: 1; }").unwrap();
    let tree = one_child_tree();

    let parent = sheet.attach(&tree, None);
    assert_eq!(parent.matched_rule_count(), 0);

    let child = sheet.attach(&tree.children[0], Some(Arc::clone(parent.identity())));
    assert_eq!(child.properties(), &props!("x": 1));
    assert_eq!(child.identity().to_string(), "panel.parent > label.child");
}

#[test]
fn single_node_defaults_only() {
    let mut parser = StyleParser::new();
    parser.defaults_mut().set("ROOT", "size", 4);
    let sheet = parser.parse("").unwrap();

    let mut node = single_node_tree();
    sheet.apply_all(&mut node, None);
    assert_eq!(node.props.get("size"), Some(&Value::Int(4)));
    assert_eq!(sheet.defaults().get("root", "size"), Some(&Value::Int(4)));
}

#[cfg(feature = "serde")]
#[test]
fn stylesheet_serde() {
    let sheet = Stylesheet::from_str("label { width: 1; } #x { on: true; }").unwrap();
    let json = serde_json::to_string(&sheet).unwrap();
    assert!(json.starts_with("{\"css\":"));

    let back: Stylesheet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sheet);

    let err = serde_json::from_str::<Stylesheet>(r#"{"css": "a#b#c { x: 1; }"}"#);
    assert!(err.is_err());
    let err = serde_json::from_str::<Stylesheet>(r#"{"css": "a {}", "path": "x.css"}"#);
    assert!(err.is_err());

    let json = serde_json::to_string(&props!("a": 1, "b": "x")).unwrap();
    assert_eq!(json, r#"{"a":1,"b":"x"}"#);
    let back: PropertyMap = serde_json::from_str(&json).unwrap();
    assert_eq!(back, props!("a": 1, "b": "x"));

    let value: Value = serde_json::from_str("2.5").unwrap();
    assert_eq!(value, Value::Float(2.5));
}
