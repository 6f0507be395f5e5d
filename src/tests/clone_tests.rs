//! Contexts created from another context's globals

use super::helpers::{capture_context, quiet_context};
use crate::{Context, ContextOptions};

#[test]
fn test_clone_copies_enumerable_globals() {
    let source = quiet_context();
    source
        .eval("var count = 3; var config = { name: 'a', nested: [1, 2] }; function helper() {}")
        .unwrap();

    let copy = Context::clone_of(&source).unwrap();
    assert_ne!(copy.id(), source.id());
    assert_eq!(copy.resolve::<i64>("count"), Some(3));
    assert_eq!(
        copy.resolve_json("config").as_deref(),
        Some(r#"{"name":"a","nested":[1,2]}"#)
    );
    // functions are not transferable between contexts
    assert_eq!(copy.resolve::<String>("typeof helper").as_deref(), Some("undefined"));
}

#[test]
fn test_clone_is_a_copy() {
    let source = quiet_context();
    source.eval("var config = { port: 1 };").unwrap();
    let copy = Context::clone_of(&source).unwrap();

    copy.eval("config.port = 2;").unwrap();
    assert_eq!(copy.resolve::<i64>("config.port"), Some(2));
    assert_eq!(source.resolve::<i64>("config.port"), Some(1));

    source.eval("var late = true;").unwrap();
    assert_eq!(copy.resolve::<String>("typeof late").as_deref(), Some("undefined"));
}

#[test]
fn test_clone_keeps_builtins_and_options() {
    let (source, printed) = capture_context();
    let copy = Context::clone_of(&source).unwrap();
    assert_eq!(copy.options(), source.options());

    copy.eval("console.log('from copy'); global.marker = 1;").unwrap();
    assert_eq!(*printed.lock().unwrap(), vec!["from copy"]);
    assert_eq!(copy.resolve::<i64>("marker"), Some(1));
}

#[test]
fn test_read_only_globals_are_not_cloned() {
    let source = quiet_context();
    source.set_global("hidden", 1).unwrap();
    let copy = Context::clone_of(&source).unwrap();
    assert_eq!(copy.resolve::<String>("typeof hidden").as_deref(), Some("undefined"));
}

#[test]
fn test_builder_clone_globals_with_options() {
    let source = quiet_context();
    source.eval("var answer = 42;").unwrap();
    let options = ContextOptions {
        console: false,
        ..Default::default()
    };
    let copy = Context::builder()
        .options(options)
        .clone_globals(&source)
        .build()
        .unwrap();
    assert_eq!(copy.resolve::<i64>("answer"), Some(42));
    assert_eq!(copy.resolve::<String>("typeof print").as_deref(), Some("undefined"));
}
