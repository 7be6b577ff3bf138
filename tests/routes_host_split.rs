use router_core::{HttpMethod, RouteOptions, Tree};

#[test]
fn tree_when_host_qualified_and_path_only_routes_coexist_then_host_picks_its_own_route() {
    // spec.md §8 scenario 5.
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "a.b.c/x", "host_scoped", RouteOptions::default())
        .unwrap();
    tree.insert(HttpMethod::Get, "/x", "path_only", RouteOptions::default())
        .unwrap();

    let host_match = tree.lookup(HttpMethod::Get, "a.b.c", "/x").unwrap();
    assert_eq!(host_match.route.handler, "host_scoped");

    let other_host_match = tree.lookup(HttpMethod::Get, "other", "/x").unwrap();
    assert_eq!(other_host_match.route.handler, "path_only");

    let no_host_match = tree.lookup(HttpMethod::Get, "", "/x").unwrap();
    assert_eq!(no_host_match.route.handler, "path_only");
}

#[test]
fn tree_when_only_host_qualified_route_registered_then_mismatched_host_misses() {
    let tree: Tree<&'static str> = Tree::with_default_options();
    tree.insert(HttpMethod::Get, "a.b.c/x", "host_scoped", RouteOptions::default())
        .unwrap();

    assert!(tree.lookup(HttpMethod::Get, "d.e.f", "/x").is_none());
    assert!(tree.lookup(HttpMethod::Get, "a.b.c", "/x").is_some());
}
