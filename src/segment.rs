//! Package / type body member slicing
//!
//! Splits a large package or type body into per-member source slices without
//! parsing. A small state machine tracks string literals, comments, and
//! BEGIN/END balance; FUNCTION and PROCEDURE keywords seen outside any block
//! open a member, and the END that restores the balance closes it. Forward
//! declarations (a signature ending in `;` before any IS/AS) are dropped.
//!
//! The scanner is not a parser. On input it cannot account for (unbalanced
//! blocks, unterminated literals) it reports `SegmentationFailed` instead of
//! guessing at slice boundaries.

use crate::diagnostics::{DiagnosticKind, Diagnostics, Pos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Function,
    Procedure,
    MemberFunction,
    MemberProcedure,
    ConstructorFunction,
}

/// One member's source slice: `source[start..end]` is the full member text
/// including its terminating semicolon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSlice {
    pub name: String,
    pub kind: MemberKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Normal,
    SingleQuote,
    LineComment,
    BlockComment,
}

struct Word {
    text: String,
    start: usize,
}

/// A subprogram currently open in the scan.
struct OpenSubprogram {
    awaiting_is: bool,
}

pub fn split_members(source: &str) -> Result<Vec<MemberSlice>, Diagnostics> {
    let words = scan_words(source)?;
    let mut slices = Vec::new();

    let mut depth: i64 = 0;
    let mut stack: Vec<OpenSubprogram> = Vec::new();
    // Pending member being captured: (name, kind, start offset).
    let mut capture: Option<(String, MemberKind, usize)> = None;

    let mut i = 0;
    while i < words.len() {
        let word = &words[i];
        let lower = word.text.to_lowercase();
        match lower.as_str() {
            "function" | "procedure" if depth == 0 => {
                let is_function = lower == "function";
                // MEMBER / CONSTRUCTOR prefix belongs to the slice.
                let (kind, start) = member_kind(&words, i, is_function);
                let name = match words.get(i + 1) {
                    Some(w) if w.text != ";" && w.text != "(" => w.text.to_lowercase(),
                    _ => {
                        return Err(segmentation_error(
                            source,
                            word.start,
                            "subprogram keyword without a name",
                        ));
                    }
                };
                if stack.is_empty() {
                    capture = Some((name, kind, start));
                }
                stack.push(OpenSubprogram { awaiting_is: true });
            }
            "is" | "as" => {
                if let Some(open) = stack.last_mut() {
                    open.awaiting_is = false;
                }
            }
            "begin" | "if" | "loop" | "case" => {
                // Declared-but-unopened subprograms cannot still be pending
                // once a block opens.
                depth += 1;
            }
            "end" => {
                // `END IF` / `END LOOP` / `END CASE` close their opener in
                // one step; skip the suffix word.
                if let Some(next) = words.get(i + 1) {
                    let next_lower = next.text.to_lowercase();
                    if matches!(next_lower.as_str(), "if" | "loop" | "case") {
                        i += 1;
                    }
                }
                depth -= 1;
                if depth < 0 {
                    // The unit's own END (package body / type body footer).
                    depth = 0;
                    if !stack.is_empty() {
                        return Err(segmentation_error(
                            source,
                            word.start,
                            "unbalanced END while a subprogram is open",
                        ));
                    }
                } else if depth == 0 && !stack.is_empty() {
                    stack.pop();
                    if stack.is_empty() {
                        if let Some((name, kind, start)) = capture.take() {
                            let end = slice_end(source, &words, i);
                            slices.push(MemberSlice {
                                name,
                                kind,
                                start,
                                end,
                            });
                        }
                    }
                }
            }
            ";" if depth == 0 => {
                // A signature that reaches `;` before IS/AS is a forward
                // declaration, not a member.
                if stack.last().is_some_and(|open| open.awaiting_is) {
                    stack.pop();
                    if stack.is_empty() {
                        capture = None;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 || !stack.is_empty() {
        return Err(segmentation_error(
            source,
            source.len().saturating_sub(1),
            "unbalanced blocks at end of source",
        ));
    }
    Ok(slices)
}

fn member_kind(words: &[Word], at: usize, is_function: bool) -> (MemberKind, usize) {
    if at > 0 {
        let prev = words[at - 1].text.to_lowercase();
        if prev == "member" {
            let kind = if is_function {
                MemberKind::MemberFunction
            } else {
                MemberKind::MemberProcedure
            };
            return (kind, words[at - 1].start);
        }
        if prev == "constructor" && is_function {
            return (MemberKind::ConstructorFunction, words[at - 1].start);
        }
    }
    let kind = if is_function {
        MemberKind::Function
    } else {
        MemberKind::Procedure
    };
    (kind, words[at].start)
}

/// End of the member slice: past the optional end label and the terminating
/// semicolon after the closing END.
fn slice_end(source: &str, words: &[Word], end_index: usize) -> usize {
    let mut j = end_index + 1;
    // Optional end label.
    if words
        .get(j)
        .is_some_and(|w| w.text != ";" && w.text.chars().next().is_some_and(|c| c.is_alphabetic()))
    {
        j += 1;
    }
    if words.get(j).is_some_and(|w| w.text == ";") {
        return words[j].start + 1;
    }
    words
        .get(end_index)
        .map(|w| w.start + w.text.len())
        .unwrap_or(source.len())
}

fn segmentation_error(source: &str, offset: usize, message: &str) -> Diagnostics {
    // Byte-wise count: `offset` may sit inside a multibyte character.
    let clamped = offset.min(source.len());
    let line = source.as_bytes()[..clamped]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1;
    Diagnostics::new(
        DiagnosticKind::SegmentationFailed,
        message,
        Pos::new(line, 1, offset),
    )
}

/// Scan the source into words (identifiers/numbers) plus the two separator
/// tokens the splitter cares about (`;` and `(`), skipping strings and
/// comments entirely.
fn scan_words(source: &str) -> Result<Vec<Word>, Diagnostics> {
    let bytes = source.as_bytes();
    let mut words = Vec::new();
    let mut state = State::Normal;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => match b {
                b'\'' => {
                    state = State::SingleQuote;
                    i += 1;
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    i += 2;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    i += 2;
                }
                b'"' => {
                    // Quoted identifiers cannot contain keywords we track;
                    // skip to the closing quote.
                    let start = i;
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'"' {
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return Err(segmentation_error(
                            source,
                            start,
                            "unterminated quoted identifier",
                        ));
                    }
                    i += 1;
                }
                b';' | b'(' => {
                    words.push(Word {
                        text: (b as char).to_string(),
                        start: i,
                    });
                    i += 1;
                }
                b if b.is_ascii_alphabetic() || b == b'_' => {
                    let start = i;
                    while i < bytes.len()
                        && (bytes[i].is_ascii_alphanumeric()
                            || bytes[i] == b'_'
                            || bytes[i] == b'$'
                            || bytes[i] == b'#')
                    {
                        i += 1;
                    }
                    words.push(Word {
                        text: source[start..i].to_string(),
                        start,
                    });
                }
                _ => i += 1,
            },
            State::SingleQuote => {
                if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                    } else {
                        state = State::Normal;
                        i += 1;
                    }
                } else {
                    i += 1;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
                i += 1;
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::Normal;
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }
    match state {
        State::SingleQuote => Err(segmentation_error(
            source,
            source.len().saturating_sub(1),
            "unterminated string literal",
        )),
        State::BlockComment => Err(segmentation_error(
            source,
            source.len().saturating_sub(1),
            "unterminated block comment",
        )),
        _ => Ok(words),
    }
}
