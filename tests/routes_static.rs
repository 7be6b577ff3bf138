use router_core::{HttpMethod, RouteOptions, Tree};

#[test]
fn tree_when_static_route_registered_then_returns_match() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/hello", "hello_handler", RouteOptions::default())
        .expect("static route should register");

    let matched = tree
        .lookup(HttpMethod::Get, "", "/hello")
        .expect("static route should match");

    assert_eq!(matched.route.handler, "hello_handler");
    assert!(matched.params.is_empty());
    assert!(!matched.tsr);
}

#[test]
fn tree_when_pattern_already_registered_then_insert_fails() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/dup", "first", RouteOptions::default())
        .unwrap();

    let err = tree
        .insert(HttpMethod::Get, "/dup", "second", RouteOptions::default())
        .unwrap_err();
    assert!(matches!(err, router_core::RouterError::RouteExist { .. }));
}

#[test]
fn tree_when_two_routes_share_a_prefix_then_both_match() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/users/list", "list", RouteOptions::default())
        .unwrap();
    tree.insert(HttpMethod::Get, "/users/create", "create", RouteOptions::default())
        .unwrap();

    assert_eq!(
        tree.lookup(HttpMethod::Get, "", "/users/list").unwrap().route.handler,
        "list"
    );
    assert_eq!(
        tree.lookup(HttpMethod::Get, "", "/users/create")
            .unwrap()
            .route
            .handler,
        "create"
    );
}

#[test]
fn tree_when_unregistered_path_looked_up_then_returns_none() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/known", "known", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/unknown").is_none());
}

#[test]
fn tree_when_route_updated_then_lookup_sees_new_handler() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/users", "v1", RouteOptions::default())
        .unwrap();
    tree.update(HttpMethod::Get, "/users", "v2", RouteOptions::default())
        .unwrap();

    assert_eq!(
        tree.lookup(HttpMethod::Get, "", "/users").unwrap().route.handler,
        "v2"
    );
}

#[test]
fn tree_when_update_targets_missing_route_then_errors() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    let err = tree
        .update(HttpMethod::Get, "/missing", "v2", RouteOptions::default())
        .unwrap_err();
    assert!(matches!(err, router_core::RouterError::RouteNotFound { .. }));
}

#[test]
fn tree_when_route_deleted_then_lookup_misses() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/gone", "gone", RouteOptions::default())
        .unwrap();
    tree.delete(HttpMethod::Get, "/gone").unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/gone").is_none());
}

#[test]
fn tree_when_sibling_deleted_then_remaining_sibling_still_matches() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/users/list", "list", RouteOptions::default())
        .unwrap();
    tree.insert(HttpMethod::Get, "/users/create", "create", RouteOptions::default())
        .unwrap();

    tree.delete(HttpMethod::Get, "/users/create").unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/users/create").is_none());
    assert_eq!(
        tree.lookup(HttpMethod::Get, "", "/users/list").unwrap().route.handler,
        "list"
    );
}

#[test]
fn tree_when_intermediate_node_left_childless_then_collapses_and_still_matches_parent() {
    // "/a" and "/ab" share node "a" as an ancestor of "b"; deleting "/ab"
    // should leave "/a" intact and collapse the now-empty "b" branch.
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/a", "a", RouteOptions::default()).unwrap();
    tree.insert(HttpMethod::Get, "/ab", "ab", RouteOptions::default()).unwrap();

    tree.delete(HttpMethod::Get, "/ab").unwrap();

    assert_eq!(tree.lookup(HttpMethod::Get, "", "/a").unwrap().route.handler, "a");
    assert!(tree.lookup(HttpMethod::Get, "", "/ab").is_none());
}

#[test]
fn tree_when_truncated_then_every_method_is_empty() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/x", "x", RouteOptions::default()).unwrap();
    tree.insert(HttpMethod::Post, "/y", "y", RouteOptions::default()).unwrap();
    assert_eq!(tree.len(), 2);

    tree.truncate(&[]).unwrap();

    assert!(tree.is_empty());
    assert!(tree.lookup(HttpMethod::Get, "", "/x").is_none());
    assert!(tree.lookup(HttpMethod::Post, "", "/y").is_none());
}
