//! Property tests: the lexer, parser facade, and member slicer must never
//! panic, and member slices must stay ordered and in bounds, no matter what
//! bytes arrive.

use plsql2pg::parser::TranslationKind;
use proptest::prelude::*;

proptest! {
    #[test]
    fn lexer_never_panics(src in ".*") {
        let _ = plsql2pg::lexer::tokenize(&src);
    }

    #[test]
    fn parser_never_panics(src in ".*") {
        let _ = plsql2pg::parser::parse(&src, TranslationKind::ViewSelect);
        let _ = plsql2pg::parser::parse(&src, TranslationKind::Function);
    }

    #[test]
    fn segmenter_never_panics_and_slices_are_ordered(src in ".*") {
        if let Ok(slices) = plsql2pg::segment::split_members(&src) {
            for slice in &slices {
                prop_assert!(slice.start <= slice.end);
                prop_assert!(slice.end <= src.len());
            }
            for pair in slices.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
    }

    #[test]
    fn segmenter_handles_plausible_bodies(
        // Prefixed so generated names never collide with scanner keywords.
        names in proptest::collection::vec("fn_[a-z0-9_]{0,8}", 1..5)
    ) {
        let mut body = String::from("PACKAGE BODY p IS\n");
        for name in &names {
            body.push_str(&format!(
                "FUNCTION {name} RETURN NUMBER IS BEGIN RETURN 1; END;\n"
            ));
        }
        body.push_str("END;\n");
        let slices = plsql2pg::segment::split_members(&body).expect("well-formed body");
        prop_assert_eq!(slices.len(), names.len());
        for (slice, name) in slices.iter().zip(&names) {
            prop_assert_eq!(&slice.name, name);
        }
    }
}
