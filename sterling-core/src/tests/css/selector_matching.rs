use super::util::*;

fn green() -> PropertyMap {
    props!("background": "green")
}

#[test]
fn selector_matching() {
    // Simple Wildcard
    let styles = apply_css_to_tree("* { background: green; }", two_child_tree);
    assert_eq!(styles[0], green());
    assert_eq!(styles[1], green());
    assert_eq!(styles[2], green());

    // Wildcard Descendant
    let styles = apply_css_to_tree(".parent * { background: green; }", two_child_tree);
    assert!(styles[0].is_empty());
    assert_eq!(styles[1], green());
    assert_eq!(styles[2], green());

    // Wildcard Direct Descendant
    let styles = apply_css_to_tree(".child > * { background: green; }", || {
        TestNode::new("panel").classes("parent").children([TestNode::new("box").classes("child").children([
            TestNode::new("label").classes("inner_one"),
            TestNode::new("label").classes("inner_two"),
        ])])
    });
    assert!(styles[0].is_empty());
    assert!(styles[1].is_empty());
    assert_eq!(styles[2], green());
    assert_eq!(styles[3], green());

    // Multiple Classes
    let styles = apply_css_to_tree(".item.special { background: green; }", || {
        TestNode::new("panel").children([
            TestNode::new("label").classes("item special"),
            TestNode::new("label").classes("item"),
            TestNode::new("label").classes("special"),
        ])
    });
    assert!(styles[0].is_empty());
    assert_eq!(styles[1], green());
    assert!(styles[2].is_empty());
    assert!(styles[3].is_empty());

    // Specific Parent
    let styles = apply_css_to_tree(".container .p { background: green; }", || {
        TestNode::new("panel")
            .classes("container")
            .children([TestNode::new("label").classes("p"), TestNode::new("box").children([TestNode::new("label").classes("p")])])
    });
    assert!(styles[0].is_empty());
    assert_eq!(styles[1], green());
    assert!(styles[2].is_empty());
    assert_eq!(styles[3], green());

    // Direct Children
    let styles = apply_css_to_tree(".parent > .p { background: green; }", || {
        TestNode::new("panel")
            .classes("parent")
            .children([TestNode::new("label").classes("p"), TestNode::new("box").children([TestNode::new("label").classes("p")])])
    });
    assert!(styles[0].is_empty());
    assert_eq!(styles[1], green());
    assert!(styles[2].is_empty());
    assert!(styles[3].is_empty());
}

#[test]
fn type_names_ignore_case() {
    let styles = apply_css_to_tree("LABEL { background: green; }", one_child_tree);
    assert!(styles[0].is_empty());
    assert_eq!(styles[1], green());

    // classes do not
    let styles = apply_css_to_tree(".Child { background: green; }", one_child_tree);
    assert!(styles[1].is_empty());
}

#[test]
fn id_selectors() {
    let styles = apply_css_to_tree("#main { background: green; } label#main { size: 2; }", || {
        TestNode::new("panel").id("main").children([TestNode::new("label").id("main"), TestNode::new("label").id("other")])
    });
    assert_eq!(styles[0], green());
    assert_eq!(styles[1], props!("background": "green", "size": 2));
    assert!(styles[2].is_empty());
}

#[test]
fn matching_without_ancestors_ignores_chain() {
    let sheet = Stylesheet::from_str("label#x.a { x: 1; }").unwrap();
    let selector = sheet.rules().next().unwrap().selector();

    let bare = Identity::new("label").with_id(Some("x")).with_classes(["a", "b"]);
    let parent = Arc::new(Identity::new("panel").with_classes(["a"]));
    let nested = bare.clone().with_ancestor(Some(Arc::new(Identity::new("window").with_ancestor(Some(parent)))));

    assert!(selector.matches(&bare));
    assert!(selector.matches(&nested));

    let other = Identity::new("label").with_id(Some("y")).with_classes(["a"]);
    assert!(!selector.matches(&other));
    assert!(!selector.matches(&other.with_ancestor(Some(Arc::new(bare)))));
}

fn chain(types: &[&str]) -> Identity {
    let mut ancestor: Option<Arc<Identity>> = None;
    for type_name in &types[..types.len() - 1] {
        ancestor = Some(Arc::new(Identity::new(type_name).with_ancestor(ancestor)));
    }
    Identity::new(types[types.len() - 1]).with_ancestor(ancestor)
}

fn selector_matches(selector: &str, identity: &Identity) -> bool {
    let sheet = Stylesheet::from_str(&format!("{selector} {{ x: 1; }}")).unwrap();
    sheet.rules().next().unwrap().selector().matches(identity)
}

#[test]
fn child_versus_descendant() {
    let c = chain(&["a", "b", "c"]);

    assert!(!selector_matches("a > c", &c));
    assert!(selector_matches("a c", &c));
    assert!(selector_matches("b > c", &c));
    assert!(selector_matches("a > b > c", &c));
    assert!(selector_matches("a b c", &c));
    assert!(!selector_matches("c > b", &c));

    // missing ancestors never match, and never error
    let lone = Identity::new("c");
    assert!(!selector_matches("a > c", &lone));
    assert!(!selector_matches("a c", &lone));
    assert!(selector_matches("c", &lone));
}

#[test]
fn mixed_combinators() {
    // outermost ancestor first: `a > b` must hold somewhere above `d`
    let d = chain(&["a", "b", "c", "d"]);
    assert!(selector_matches("a > b d", &d));
    assert!(selector_matches("a b > c > d", &d));
    assert!(selector_matches("a > b c > d", &d));
    assert!(!selector_matches("a > c d", &d));
    assert!(!selector_matches("a b > d", &d));

    // the descendant step has to backtrack past the first matching `b`
    let e = chain(&["a", "b", "x", "b", "e"]);
    assert!(selector_matches("a > b e", &e));
    assert!(selector_matches("a > b > x b > e", &e));
    assert!(!selector_matches("x > b > x e", &e));
}

#[test]
fn deep_descendant_chains_fail_fast() {
    let selector = format!("y{}", " x".repeat(10));

    let mut types = vec!["x"; 200];
    let start = std::time::Instant::now();
    assert!(!selector_matches(&selector, &chain(&types)));
    assert!(!selector_matches(&format!("y > {selector}"), &chain(&types)));
    assert!(start.elapsed() < std::time::Duration::from_secs(1), "took {:?}", start.elapsed());

    types[0] = "y";
    assert!(selector_matches(&selector, &chain(&types)));
    types[0] = "x";
    types[150] = "y";
    assert!(selector_matches(&selector, &chain(&types)));
    types[150] = "x";
    types[195] = "y";
    assert!(!selector_matches(&selector, &chain(&types)));
}

#[test]
fn states_are_not_structural() {
    let hovered = Identity::new("button").with_states(["hover"]);
    let idle = Identity::new("button");

    assert!(selector_matches("button:hover", &hovered));
    assert!(selector_matches("button:hover", &idle));
}

#[test]
fn specificity_weights() {
    let weight = |selector: &str| {
        let sheet = Stylesheet::from_str(&format!("{selector} {{ x: 1; }}")).unwrap();
        sheet.rules().next().unwrap().specificity()
    };

    assert!(weight("#a") > weight(".a.b.c.d"));
    assert!(weight(".a") > weight("a b c d"));
    assert!(weight("a") > weight("*"));
    assert!(weight("a:hover") > weight("b"));
    assert!(weight("a > b") > weight("a b"));
    assert_eq!(weight("a.b"), weight("a:b"));
    assert_eq!(
        weight("p#x.a > q.b:hover"),
        Specificity {
            ids: 1,
            classes: 3,
            types: 2,
            children: 1
        }
    );
}
