use router_core::{HttpMethod, RouteOptions, Tree};

#[test]
fn tree_when_route_has_trailing_slash_then_missing_slash_lookup_recommends_add_slash() {
    // spec.md §8 scenario 4.
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/foo/bar/", "bar", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/foo/bar/").is_some());

    let outcome = tree
        .lookup(HttpMethod::Get, "", "/foo/bar")
        .expect("should recommend a trailing-slash redirect rather than miss outright");
    assert!(outcome.tsr);
    assert_eq!(outcome.route.handler, "bar");
}

#[test]
fn tree_when_route_has_no_trailing_slash_then_extra_slash_lookup_recommends_remove_slash() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/foo/bar", "bar", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/foo/bar").is_some());

    let outcome = tree
        .lookup(HttpMethod::Get, "", "/foo/bar/")
        .expect("should recommend a trailing-slash redirect rather than miss outright");
    assert!(outcome.tsr);
    assert_eq!(outcome.route.handler, "bar");
}

#[test]
fn tree_when_tsr_disabled_then_no_tsr_route_is_recommended() {
    let options = router_core::RouterOptions::builder()
        .compute_tsr(false)
        .build()
        .unwrap();
    let tree: Tree<&'static str> = Tree::new(options);
    tree.insert(HttpMethod::Get, "/foo/bar/", "bar", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "", "/foo/bar").is_none());
}

#[test]
fn tree_when_root_registered_then_trailing_slash_boundary_behaves() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "/", "root", RouteOptions::default())
        .unwrap();

    assert_eq!(tree.lookup(HttpMethod::Get, "", "/").unwrap().route.handler, "root");
}
