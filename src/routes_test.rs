use super::*;

fn table() -> RouteTable {
    RouteTable::new("/login", ["/profile", "/events/new", "/borrow-requests"])
}

#[test]
fn location_parse_splits_query() {
    let loc = Location::parse("/games?sort=rating");
    assert_eq!(loc.path, "/games");
    assert_eq!(loc.query.as_deref(), Some("sort=rating"));
    assert_eq!(loc.to_string(), "/games?sort=rating");
}

#[test]
fn location_parse_without_query() {
    let loc = Location::parse("/profile");
    assert_eq!(loc, Location { path: "/profile".into(), query: None });
}

#[test]
fn location_parse_empty_path_and_query() {
    assert_eq!(Location::parse("").path, "/");
    assert_eq!(Location::parse("/events?").query, None);
}

#[test]
fn protected_exact_and_nested_paths() {
    let routes = table();
    assert!(routes.is_protected("/profile"));
    assert!(routes.is_protected("/profile/settings"));
    assert!(routes.is_protected("/events/new"));
}

#[test]
fn public_paths_not_protected() {
    let routes = table();
    assert!(!routes.is_protected("/"));
    assert!(!routes.is_protected("/games/42"));
    assert!(!routes.is_protected("/events"));
    assert!(!routes.is_protected("/events/17"));
    assert!(!routes.is_protected("/profiles"));
}

#[test]
fn login_path_never_protected() {
    let routes = RouteTable::new("/login", ["/login"]);
    assert!(!routes.is_protected("/login"));
}

#[test]
fn post_login_destination_returns_remembered_location() {
    let from = Location::parse("/borrow-requests?tab=incoming");
    assert_eq!(post_login_destination(Some(&from), &table()), "/borrow-requests?tab=incoming");
}

#[test]
fn post_login_destination_defaults_to_root() {
    assert_eq!(post_login_destination(None, &table()), "/");
    let login = Location::parse("/login");
    assert_eq!(post_login_destination(Some(&login), &table()), "/");
}
