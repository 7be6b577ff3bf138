use router_core::{HttpMethod, RouteOptions, Tree};

#[test]
fn tree_when_static_and_param_siblings_then_static_wins_priority() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/products/{id}", "by_id", RouteOptions::default())
        .unwrap();
    tree.insert(HttpMethod::Get, "/products/new", "new", RouteOptions::default())
        .unwrap();

    let new_match = tree.lookup(HttpMethod::Get, "", "/products/new").unwrap();
    assert_eq!(new_match.route.handler, "new");
    assert!(new_match.params.is_empty());

    let id_match = tree.lookup(HttpMethod::Get, "", "/products/123").unwrap();
    assert_eq!(id_match.route.handler, "by_id");
    assert_eq!(id_match.params.get("id"), Some("123"));
}

#[test]
fn tree_when_deeply_nested_backtracking_needed_then_correct_route_wins() {
    // spec.md §8 scenario 3.
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/{base}/val1/{id}", "a", RouteOptions::default())
        .unwrap();
    tree.insert(
        HttpMethod::Get,
        "/{base}/val1/123/{a}/bar",
        "b",
        RouteOptions::default(),
    )
    .unwrap();
    tree.insert(
        HttpMethod::Get,
        "/{base}/val1/{id}/new/{name}",
        "c",
        RouteOptions::default(),
    )
    .unwrap();
    tree.insert(HttpMethod::Get, "/{base}/val2", "d", RouteOptions::default())
        .unwrap();

    let matched = tree
        .lookup(HttpMethod::Get, "", "/base/val1/123/new/barr")
        .expect("should backtrack past the /123/{a}/bar branch");

    assert_eq!(matched.route.handler, "c");
    assert_eq!(matched.params.get("base"), Some("base"));
    assert_eq!(matched.params.get("id"), Some("123"));
    assert_eq!(matched.params.get("name"), Some("barr"));
}

#[test]
fn tree_when_param_has_literal_suffix_then_capture_stops_at_suffix() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/files/{name}.json", "file", RouteOptions::default())
        .unwrap();

    let matched = tree.lookup(HttpMethod::Get, "", "/files/report.json").unwrap();
    assert_eq!(matched.params.get("name"), Some("report"));
}

#[test]
fn tree_when_param_regex_rejects_value_then_lookup_misses() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(
        HttpMethod::Get,
        "/users/{id:[0-9]+}",
        "by_numeric_id",
        RouteOptions::default(),
    )
    .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/users/42").is_some());
    assert!(tree.lookup(HttpMethod::Get, "", "/users/abc").is_none());
}

#[test]
fn tree_when_empty_param_segment_then_lookup_misses() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/users/{id}", "by_id", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/users/").is_none());
}

#[test]
fn tree_when_lazy_lookup_used_then_params_are_not_captured() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/users/{id}", "by_id", RouteOptions::default())
        .unwrap();

    let matched = tree.lookup_lazy(HttpMethod::Get, "", "/users/42").unwrap();
    assert_eq!(matched.route.handler, "by_id");
    assert!(matched.params.is_empty());
}
