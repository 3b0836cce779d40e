//! Property tests for the markup parser.
//!
//! The interesting surface is the payload boundary: content is verbatim,
//! so lone `</file>` or `</replace>` markers inside a payload must come
//! back byte-for-byte. Only the full `</replace>` + whitespace +
//! `</file>` sequence ends a block, which is the documented limit of
//! what a payload can carry.

use proptest::prelude::*;

use graft::core::markup::{ChangeOperation, ParseError, parse};

/// Render entries in the grammar the parser accepts, one block per pair.
fn render(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (path, content) in entries {
        out.push_str(&format!(
            "<file name=\"{path}\"><replace>{content}</replace></file>\n"
        ));
    }
    out
}

/// True when `s` embeds the combined close sequence and would therefore
/// end its block early. Mirrors the parser's bridge scan.
fn has_early_terminator(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(found) = s[from..].find("</replace>") {
        let at = from + found;
        let mut j = at + "</replace>".len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if s[j..].starts_with("</file>") {
            return true;
        }
        from = at + 1;
    }
    false
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,8}(/[a-z][a-z0-9_]{0,8}){0,3}")
        .expect("valid path regex")
}

fn content_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        // Bias toward the adversarial cases: markers embedded mid-payload.
        (any::<String>(), any::<String>()).prop_map(|(a, b)| format!("{a}</file>{b}")),
        (any::<String>(), any::<String>()).prop_map(|(a, b)| format!("{a}</replace>{b}")),
    ]
    .prop_filter("payload must not embed the combined close sequence", |s| {
        !has_early_terminator(s)
    })
}

proptest! {
    /// Anything renderable in the grammar parses back to the same
    /// document: same paths, same contents, same order.
    #[test]
    fn prop_render_parse_round_trip(
        entries in prop::collection::vec((path_strategy(), content_strategy()), 0..5)
    ) {
        let markup = render(&entries);
        let doc = parse(&markup).expect("rendered markup parses");
        prop_assert_eq!(doc.len(), entries.len());
        for (op, (path, content)) in doc.operations.iter().zip(&entries) {
            let ChangeOperation::Replace { content: got, .. } = op;
            prop_assert_eq!(op.path().as_str(), path.as_str());
            prop_assert_eq!(got, content);
        }
    }

    /// Surrounding prose and a `<root>` wrapper never change the result.
    #[test]
    fn prop_prose_and_wrapper_are_ignored(
        entries in prop::collection::vec((path_strategy(), content_strategy()), 1..4)
    ) {
        let bare = parse(&render(&entries)).expect("bare parses");
        let wrapped = format!(
            "Here is the change set.\n<root>\n{}</root>\nThat is all.\n",
            render(&entries)
        );
        let doc = parse(&wrapped).expect("wrapped parses");
        prop_assert_eq!(doc, bare);
    }

    /// A lone `</file>` marker in the payload survives verbatim.
    #[test]
    fn prop_lone_file_close_survives(
        prefix in "[a-zA-Z0-9 \n]{0,40}",
        suffix in "[a-zA-Z0-9 \n]{0,40}",
    ) {
        let content = format!("{prefix}</file>{suffix}");
        let markup = format!("<file name=\"cfg.xml\"><replace>{content}</replace></file>");
        let doc = parse(&markup).expect("payload with lone </file> parses");
        let ChangeOperation::Replace { content: got, .. } = &doc.operations[0];
        prop_assert_eq!(got, &content);
    }

    /// The parser is total: arbitrary input returns Ok or Err, never panics.
    #[test]
    fn prop_parse_never_panics(input in any::<String>()) {
        let _ = parse(&input);
    }
}

#[test]
fn combined_close_inside_payload_ends_the_block_there() {
    // The one sequence a payload cannot carry. The block ends at the
    // embedded close and the trailing text is treated as prose.
    let markup = "<file name=\"a.txt\"><replace>x</replace></file>y</replace></file>";
    let doc = parse(markup).expect("parses as one short block");
    assert_eq!(doc.len(), 1);
    let ChangeOperation::Replace { content, .. } = &doc.operations[0];
    assert_eq!(content, "x");
}

#[test]
fn later_error_discards_the_entire_document() {
    let markup = concat!(
        "<file name=\"good.txt\"><replace>ok</replace></file>\n",
        "<file name=\"bad.txt\"><replace>never closed",
    );
    assert!(matches!(
        parse(markup),
        Err(ParseError::MalformedBlock { index: 2, .. })
    ));
}
