use request_context::{make_context, ContextKey, RequestScope};
use pretty_assertions::assert_eq;

#[test]
fn test_same_name_does_not_share_storage() {
    let (get_a, set_a) = make_context::<i32>("shared");
    let (get_b, _set_b) = make_context::<i32>("shared");

    let mut scope = RequestScope::new();
    set_a.set(&mut scope, 1);

    assert_eq!(get_a.get(&scope), Ok(&1));
    assert!(get_b.get(&scope).is_err());
    assert_eq!(scope.context_names(), vec!["shared".to_string()]);
}

#[test]
fn test_clone_of_key_shares_storage() {
    let key = ContextKey::<bool>::new("flag");
    let alias = key.clone();
    let mut scope = RequestScope::new();
    key.set(&mut scope, false);
    assert_eq!(alias.get(&scope), Ok(&false));
}

#[test]
fn test_concurrent_requests_are_independent() {
    let (get, set) = make_context::<usize>("worker");

    let seen: Vec<usize> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (get, set) = (get.clone(), set.clone());
                s.spawn(move || {
                    RequestScope::run(|scope| {
                        assert!(get.get(scope).is_err());
                        set.set(scope, i);
                        get.get_cloned(scope).unwrap()
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(seen, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_scope_moves_across_threads() {
    let (get, set) = make_context::<String>("tenant");
    let mut scope = RequestScope::new();
    set.set(&mut scope, "acme".into());

    let scope = std::thread::spawn(move || scope).join().unwrap();
    assert_eq!(get.get(&scope).map(String::as_str), Ok("acme"));
}
