use proptest::prelude::*;

use cmdlang::alias::{expand, has_placeholders};
use cmdlang::lexer::lex;
use cmdlang::tokenizer::tokenize;
use cmdlang::Shell;

fn template() -> impl Strategy<Value = String> {
    let literal = "[a-zA-Z ,.'-]{0,8}".prop_map(|s| s);
    let placeholder = (1usize..5, proptest::option::of("[a-z]{1,5}")).prop_map(|(n, fallback)| {
        match fallback {
            Some(f) => format!("${}[{}]", n, f),
            None => format!("${}", n),
        }
    });
    proptest::collection::vec(prop_oneof![literal, placeholder], 0..6)
        .prop_map(|parts| format!("print {}", parts.concat()))
}

proptest! {
    #[test]
    fn tokenizing_twice_gives_the_same_fragments(input in r#"[a-z0-9 '"$=+;\[\]{}()\n-]{0,40}"#) {
        prop_assert_eq!(tokenize(&input), tokenize(&input));
    }

    #[test]
    fn token_offsets_never_go_backwards(input in r#"[a-z0-9 '"$=+;\[\]{}()\n-]{0,40}"#) {
        let shell = Shell::new();
        if let Ok(tokens) = lex(&input, &shell) {
            let mut last_end = 0;
            for (i, token) in tokens.iter().enumerate() {
                prop_assert!(token.start < token.end);
                prop_assert!(token.start >= last_end);
                prop_assert!(token.end <= input.len());
                prop_assert_eq!(token.index, i);
                last_end = token.end;
            }
        }
    }

    #[test]
    fn alias_expansion_is_idempotent(
        template in template(),
        params in proptest::collection::vec("[a-zA-Z ]{0,6}", 0..4),
    ) {
        let expanded = expand(&template, &params);
        prop_assert!(!has_placeholders(&expanded));
        prop_assert_eq!(&expand(&expanded, &params), &expanded);

        let shell = Shell::new();
        let first = shell.parse(&expanded).ok();
        let second = shell.parse(&expand(&template, &params)).ok();
        prop_assert_eq!(first, second);
    }
}
