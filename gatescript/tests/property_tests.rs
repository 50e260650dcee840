use proptest::prelude::*;

use gatescript::script::{Interpreter, Script, Value};
use gatescript::services::Services;
use gatescript::topic;

proptest! {
    /// The tokenizer accepts arbitrary input; it may produce any token
    /// sequence, but it must not panic.
    #[test]
    fn tokenizer_does_not_panic(s in "\\PC*") {
        let script = Script::tokenize(&s);
        for i in 0..script.token_count() {
            let _ = script.token_bytes(i);
        }
    }

    /// A full syntax check over arbitrary printable input returns Ok or a
    /// SyntaxError, never a panic.
    #[test]
    fn syntax_check_does_not_panic(s in "\\PC{0,200}") {
        let mut ip = Interpreter::new(&s, Services::null());
        let _ = ip.syntax_check();
    }

    /// Rendering a token stream and re-tokenizing it yields the same tokens.
    #[test]
    fn render_round_trips(s in "\\PC{0,200}") {
        let a = Script::tokenize(&s);
        let b = Script::tokenize(&a.render());
        prop_assert_eq!(a.token_count(), b.token_count());
        for i in 0..a.token_count() {
            prop_assert_eq!(a.token_bytes(i), b.token_bytes(i));
        }
    }
}

proptest! {
    /// `#` matches every topic; a topic used as its own filter matches.
    #[test]
    fn topic_matching_laws(segs in prop::collection::vec("[a-z]{1,4}", 1..5)) {
        let t = format!("/{}", segs.join("/"));
        prop_assert!(topic::matches("#", &t));
        prop_assert!(topic::matches(&t, &t));
        prop_assert!(!topic::has_wildcards(&t));
    }

    /// Replacing any one level with `+` still matches.
    #[test]
    fn plus_matches_any_single_level(
        segs in prop::collection::vec("[a-z]{1,4}", 1..5),
        idx in 0usize..4,
    ) {
        let t = format!("/{}", segs.join("/"));
        let mut wild = segs.clone();
        let idx = idx % wild.len();
        wild[idx] = "+".to_owned();
        let f = format!("/{}", wild.join("/"));
        prop_assert!(topic::matches(&f, &t), "{f} should match {t}");
    }

    /// Integer formatting and atoi coercion agree.
    #[test]
    fn int_value_round_trips(n in any::<i32>()) {
        prop_assert_eq!(Value::int(n as i64).as_int(), n as i64);
    }

    /// Arithmetic over arbitrary operand text never panics, and the result
    /// is always decimal text.
    #[test]
    fn arithmetic_never_panics(a in "\\PC{0,10}", b in "\\PC{0,10}") {
        let src = format!("on init do setvar $r = \"{}\" + \"{}\"",
                          a.replace('\\', "").replace('"', ""),
                          b.replace('\\', "").replace('"', ""));
        let mut ip = Interpreter::new(&src, Services::null());
        if ip.syntax_check().is_ok() && ip.init().is_ok() {
            if let Some(v) = ip.var("r") {
                let _ = v.as_int();
            }
        }
    }
}
