//! AI edit markup parsing.
//!
//! Turns the `<file name="...">` block format emitted by code-assistant
//! models into typed change operations:
//! - `<file name="PATH">` envelopes, exactly one operation tag per block
//! - `<replace>` payloads taken verbatim (no entity decoding, no trimming)
//! - optional root wrapper and surrounding prose are skipped
//!
//! Payload boundary strategy: an operation's payload ends at the *first*
//! occurrence of its close tag followed (after optional whitespace) by
//! `</file>`. A payload may therefore contain a literal `</file>` or a
//! lone `</replace>` without breaking the block; only the full terminator
//! sequence itself is unrepresentable, since the grammar has no escaping.

use camino::{Utf8Path, Utf8PathBuf};
use memchr::{memchr, memmem};
use tracing::{debug, instrument, trace};

const FILE_OPEN: &[u8] = b"<file";
const FILE_CLOSE: &[u8] = b"</file>";

/// One requested mutation of a single file.
///
/// Closed enum on purpose: the markup only ever names whole-file
/// operations, and anything unrecognized must fail parsing instead of
/// being guessed at. New tags (delete, rename) slot in as new variants
/// plus one dispatch arm in [`parse`]; the envelope scanning and the
/// apply loop stay untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOperation {
    /// Overwrite the file's entire content, creating it (and missing
    /// parent directories) when absent.
    Replace { path: Utf8PathBuf, content: String },
}

impl ChangeOperation {
    /// Target path as written in the markup, unvalidated.
    pub fn path(&self) -> &Utf8Path {
        match self {
            ChangeOperation::Replace { path, .. } => path,
        }
    }

    /// Short operation name for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeOperation::Replace { .. } => "replace",
        }
    }
}

/// Ordered change operations, insertion order = document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub operations: Vec<ChangeOperation>,
}

impl ParsedDocument {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Markup parsing errors. All are terminal for the whole document;
/// a partially parsed document is never returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A `<file>` tag without a usable `name` attribute.
    #[error("file block #{index}: missing required name attribute")]
    MissingName { index: usize },

    /// The operation element inside a block is absent or not one we
    /// support. `tag` is `None` when the block has no operation at all.
    #[error("file `{file}`: {}", unsupported_detail(.tag))]
    UnknownOperation { file: String, tag: Option<String> },

    /// Structurally broken markup: truncated attributes, unterminated
    /// tags, a missing close terminator.
    #[error("file block #{index}: {detail}")]
    MalformedBlock { index: usize, detail: String },
}

fn unsupported_detail(tag: &Option<String>) -> String {
    match tag {
        Some(t) => format!("unsupported operation `<{t}>` (expected <replace>)"),
        None => "missing operation tag (expected <replace>)".to_string(),
    }
}

fn malformed(index: usize, detail: impl Into<String>) -> ParseError {
    ParseError::MalformedBlock {
        index,
        detail: detail.into(),
    }
}

/// Parse a markup document into ordered change operations.
///
/// Pure computation over the input string; no filesystem access. Input
/// with zero `<file>` blocks yields an empty document, which callers
/// treat as "nothing to apply" rather than an error. Text outside the
/// blocks (a wrapper element, prose before or after) is ignored, but a
/// `<file` opener always commits to block parsing so structural problems
/// surface as errors instead of being skipped.
#[instrument(skip(markup), fields(len = markup.len()))]
pub fn parse(markup: &str) -> Result<ParsedDocument, ParseError> {
    let bytes = markup.as_bytes();
    let opener = memmem::Finder::new(FILE_OPEN);

    let mut operations = Vec::new();
    let mut pos = 0usize;
    let mut index = 0usize;

    while let Some(hit) = opener.find(&bytes[pos..]) {
        let open = pos + hit;
        let after = open + FILE_OPEN.len();

        // Word boundary: `<filename>` or `<filed>` must not open a block.
        // EOF right after the keyword is a truncated tag, not prose.
        match bytes.get(after) {
            Some(&b) if b.is_ascii_whitespace() || b == b'>' || b == b'/' => {}
            None => {}
            Some(_) => {
                pos = after;
                continue;
            }
        }

        index += 1;
        trace!(index, offset = open, "file block opener");
        let (op, end) = parse_block(markup, bytes, after, index)?;
        operations.push(op);
        pos = end;
    }

    debug!(blocks = operations.len(), "markup parsed");
    Ok(ParsedDocument { operations })
}

/// Parse one `<file ...>` block starting just past the `<file` token.
/// Returns the operation and the byte offset past the block's `</file>`.
fn parse_block(
    src: &str,
    bytes: &[u8],
    attrs_from: usize,
    index: usize,
) -> Result<(ChangeOperation, usize), ParseError> {
    let file_tag = scan_attrs(src, bytes, attrs_from, index)?;
    let Some(name) = file_tag.name else {
        return Err(ParseError::MissingName { index });
    };
    if file_tag.self_closing {
        // `<file .../>` carries no operation element
        return Err(ParseError::UnknownOperation {
            file: name,
            tag: None,
        });
    }

    let mut pos = skip_ws(bytes, file_tag.end);
    if pos >= bytes.len() {
        return Err(malformed(
            index,
            "unterminated <file> block: reached end of input",
        ));
    }
    if bytes[pos..].starts_with(b"</") || bytes[pos] != b'<' {
        // A closing tag or bare text sits where the operation belongs.
        return Err(ParseError::UnknownOperation {
            file: name,
            tag: None,
        });
    }

    let tag_start = pos + 1;
    let tag_end = scan_ident(bytes, tag_start);
    if tag_end == tag_start {
        return Err(malformed(index, "expected an operation tag after `<`"));
    }
    let tag = &src[tag_start..tag_end];

    // Operation dispatch. Extending the grammar means adding an arm here
    // and a variant to ChangeOperation; envelope matching stays as is.
    match tag {
        "replace" => {}
        _ => {
            return Err(ParseError::UnknownOperation {
                file: name,
                tag: Some(tag.to_string()),
            });
        }
    }

    let op_tag = scan_attrs(src, bytes, tag_end, index)?;
    let (content, end) = if op_tag.self_closing {
        // `<replace/>` empties the file; the envelope must close right after.
        pos = skip_ws(bytes, op_tag.end);
        if !bytes[pos..].starts_with(FILE_CLOSE) {
            return Err(malformed(
                index,
                "expected </file> after self-closing operation",
            ));
        }
        (String::new(), pos + FILE_CLOSE.len())
    } else {
        let Some((content_end, block_end)) = find_block_close(bytes, op_tag.end, tag) else {
            return Err(malformed(
                index,
                format!("unterminated <{tag}>: no </{tag}></file> terminator found"),
            ));
        };
        (src[op_tag.end..content_end].to_string(), block_end)
    };

    debug!(file = %name, bytes = content.len(), "parsed replace block");
    Ok((
        ChangeOperation::Replace {
            path: Utf8PathBuf::from(name),
            content,
        },
        end,
    ))
}

/// Attribute list of a single tag, scanned up to and including the
/// closing `>` (or `/>`).
struct TagAttrs {
    /// First `name="..."` value, if any. Later duplicates are ignored.
    name: Option<String>,
    /// Offset just past the tag's `>`.
    end: usize,
    self_closing: bool,
}

/// Generic `key="value"` attribute scan. Single or double quotes are
/// accepted; values are taken verbatim with no escape processing, which
/// matches how the payloads are treated.
fn scan_attrs(
    src: &str,
    bytes: &[u8],
    from: usize,
    index: usize,
) -> Result<TagAttrs, ParseError> {
    let mut pos = from;
    let mut name: Option<String> = None;

    loop {
        pos = skip_ws(bytes, pos);
        match bytes.get(pos) {
            None => {
                return Err(malformed(
                    index,
                    "unterminated tag: reached end of input inside attributes",
                ));
            }
            Some(b'>') => {
                return Ok(TagAttrs {
                    name,
                    end: pos + 1,
                    self_closing: false,
                });
            }
            Some(b'/') => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    return Ok(TagAttrs {
                        name,
                        end: pos + 2,
                        self_closing: true,
                    });
                }
                return Err(malformed(index, "stray `/` inside tag attributes"));
            }
            Some(&b) if b.is_ascii_alphabetic() => {
                let key_end = scan_ident(bytes, pos);
                let key = &src[pos..key_end];
                pos = skip_ws(bytes, key_end);
                if bytes.get(pos) != Some(&b'=') {
                    return Err(malformed(
                        index,
                        format!("attribute `{key}` is missing =\"value\""),
                    ));
                }
                pos = skip_ws(bytes, pos + 1);
                let quote = match bytes.get(pos) {
                    Some(&q @ (b'"' | b'\'')) => q,
                    _ => {
                        return Err(malformed(
                            index,
                            format!("attribute `{key}` value must be quoted"),
                        ));
                    }
                };
                pos += 1;
                let Some(rel) = memchr(quote, &bytes[pos..]) else {
                    return Err(malformed(
                        index,
                        format!("unterminated value for attribute `{key}`"),
                    ));
                };
                let value = &src[pos..pos + rel];
                if key == "name" && name.is_none() {
                    name = Some(value.to_string());
                }
                pos += rel + 1;
            }
            Some(_) => return Err(malformed(index, "malformed attribute list")),
        }
    }
}

/// Locate the combined `</tag>` + whitespace + `</file>` terminator,
/// starting the search at `from`. Returns (payload end, offset past
/// `</file>`). Taking the *first* combined terminator is what lets a
/// payload contain either close tag on its own.
fn find_block_close(bytes: &[u8], from: usize, tag: &str) -> Option<(usize, usize)> {
    let close = format!("</{tag}>");
    let close_finder = memmem::Finder::new(close.as_bytes());

    let mut at = from;
    while let Some(hit) = close_finder.find(&bytes[at..]) {
        let content_end = at + hit;
        let bridge = skip_ws(bytes, content_end + close.len());
        if bytes[bridge..].starts_with(FILE_CLOSE) {
            return Some((content_end, bridge + FILE_CLOSE.len()));
        }
        at = content_end + close.len();
    }
    None
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn scan_ident(bytes: &[u8], from: usize) -> usize {
    let mut end = from;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-' || bytes[end] == b'_')
    {
        end += 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(path: &str, content: &str) -> ChangeOperation {
        ChangeOperation::Replace {
            path: Utf8PathBuf::from(path),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_parse_single_block() {
        let doc = parse(r#"<file name="src/a.txt"><replace>hello</replace></file>"#).unwrap();
        assert_eq!(doc.operations, vec![replace("src/a.txt", "hello")]);
    }

    #[test]
    fn test_parse_multiple_blocks_in_order() {
        let input = r#"
<file name="a.txt"><replace>one</replace></file>
<file name="b/c.txt"><replace>two</replace></file>
<file name="a.txt"><replace>three</replace></file>
"#;
        let doc = parse(input).unwrap();
        assert_eq!(
            doc.operations,
            vec![
                replace("a.txt", "one"),
                replace("b/c.txt", "two"),
                replace("a.txt", "three"),
            ]
        );
    }

    #[test]
    fn test_content_is_verbatim() {
        let input = "<file name=\"x\"><replace>\n  indented\n\ttabbed  \n</replace></file>";
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations[0], replace("x", "\n  indented\n\ttabbed  \n"));
    }

    #[test]
    fn test_no_entity_decoding() {
        let input = r#"<file name="x"><replace>a &lt; b &amp;&amp; c</replace></file>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations[0], replace("x", "a &lt; b &amp;&amp; c"));
    }

    #[test]
    fn test_root_wrapper_is_ignored() {
        let input = r#"<changes>
<file name="a.txt"><replace>one</replace></file>
</changes>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations, vec![replace("a.txt", "one")]);
    }

    #[test]
    fn test_surrounding_prose_is_ignored() {
        let input = "Here are the edits you asked for:\n\
                     <file name=\"a.txt\"><replace>one</replace></file>\n\
                     Let me know if anything else is needed.";
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations.len(), 1);
    }

    #[test]
    fn test_empty_input_is_empty_document() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("no markup here at all").unwrap().is_empty());
        assert!(parse("<other><tags/></other>").unwrap().is_empty());
    }

    #[test]
    fn test_missing_name_fails() {
        let err = parse("<file><replace>x</replace></file>").unwrap_err();
        assert_eq!(err, ParseError::MissingName { index: 1 });

        // Second block is the offender
        let input = r#"<file name="ok"><replace>x</replace></file><file id="2"><replace>y</replace></file>"#;
        assert_eq!(parse(input).unwrap_err(), ParseError::MissingName { index: 2 });
    }

    #[test]
    fn test_unknown_operation_fails() {
        let err = parse(r#"<file name="a.txt"><delete/></file>"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownOperation {
                file: "a.txt".to_string(),
                tag: Some("delete".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_operation_fails() {
        // Empty block
        let err = parse(r#"<file name="a.txt"></file>"#).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownOperation {
                file: "a.txt".to_string(),
                tag: None,
            }
        );

        // Bare text where the operation belongs
        let err = parse(r#"<file name="a.txt">hello</file>"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOperation { tag: None, .. }));

        // Self-closing file tag
        let err = parse(r#"<file name="a.txt"/>"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownOperation { tag: None, .. }));
    }

    #[test]
    fn test_unterminated_block_fails() {
        let err = parse(r#"<file name="a.txt"><replace>never closed"#).unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { index: 1, .. }));

        let err = parse(r#"<file name="a.txt"><replace>x</replace>"#).unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { .. }));
    }

    #[test]
    fn test_truncated_attributes_fail() {
        let err = parse(r#"<file name="a.txt"#).unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { .. }));

        let err = parse(r#"<file name=unquoted><replace>x</replace></file>"#).unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { .. }));
    }

    #[test]
    fn test_opener_at_end_of_input_is_malformed() {
        // `<file` at EOF commits to a block; the truncated tag is an
        // error, not trailing prose.
        let err = parse("<file").unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { index: 1, .. }));

        let err = parse("prose, then <file").unwrap_err();
        assert!(matches!(err, ParseError::MalformedBlock { .. }));

        // A word continuation is still prose.
        assert!(parse("mind the <filet mignon").unwrap().is_empty());
    }

    #[test]
    fn test_error_never_returns_partial_document() {
        // First block fine, second broken: the whole parse fails.
        let input = r#"<file name="ok"><replace>x</replace></file><file name="bad"><replace>y"#;
        assert!(parse(input).is_err());
    }

    #[test]
    fn test_payload_containing_file_close_survives() {
        let payload = "example grammar:\n<file name=\"demo\">\n  ...\n</file>\ndone";
        let input = format!("<file name=\"doc.md\"><replace>{payload}</replace></file>");
        let doc = parse(&input).unwrap();
        assert_eq!(doc.operations, vec![replace("doc.md", payload)]);
    }

    #[test]
    fn test_payload_containing_lone_replace_close_survives() {
        // `</replace>` inside the payload is not followed by `</file>`,
        // so it does not terminate the block.
        let payload = "before </replace> after";
        let input = format!("<file name=\"x\"><replace>{payload}</replace></file>");
        let doc = parse(&input).unwrap();
        assert_eq!(doc.operations, vec![replace("x", payload)]);
    }

    #[test]
    fn test_whitespace_between_close_tags() {
        let input = "<file name=\"x\">\n<replace>body</replace>\n  \n</file>";
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations, vec![replace("x", "body")]);
    }

    #[test]
    fn test_crlf_markup() {
        let input = "<file name=\"x\">\r\n<replace>a\r\nb</replace>\r\n</file>\r\n";
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations, vec![replace("x", "a\r\nb")]);
    }

    #[test]
    fn test_single_quoted_name() {
        let doc = parse("<file name='a b.txt'><replace>x</replace></file>").unwrap();
        assert_eq!(doc.operations[0].path(), Utf8Path::new("a b.txt"));
    }

    #[test]
    fn test_extra_attributes_are_ignored() {
        let input = r#"<file id="7" name="a.txt" mode="w"><replace>x</replace></file>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations[0].path(), Utf8Path::new("a.txt"));
    }

    #[test]
    fn test_duplicate_name_attribute_first_wins() {
        let input = r#"<file name="first.txt" name="second.txt"><replace>x</replace></file>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations[0].path(), Utf8Path::new("first.txt"));
    }

    #[test]
    fn test_empty_name_parses() {
        // Path validity is the applier's concern; the attribute exists.
        let doc = parse(r#"<file name=""><replace>x</replace></file>"#).unwrap();
        assert_eq!(doc.operations[0].path(), Utf8Path::new(""));
    }

    #[test]
    fn test_self_closing_replace_is_empty_content() {
        let doc = parse(r#"<file name="a.txt"><replace/></file>"#).unwrap();
        assert_eq!(doc.operations, vec![replace("a.txt", "")]);
    }

    #[test]
    fn test_empty_payload() {
        let doc = parse(r#"<file name="a.txt"><replace></replace></file>"#).unwrap();
        assert_eq!(doc.operations, vec![replace("a.txt", "")]);
    }

    #[test]
    fn test_filename_prefix_is_not_an_opener() {
        let input = r#"<filename>nope</filename><file name="a"><replace>x</replace></file>"#;
        let doc = parse(input).unwrap();
        assert_eq!(doc.operations.len(), 1);
        assert_eq!(doc.operations[0].path(), Utf8Path::new("a"));
    }
}
