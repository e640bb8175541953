//! Math delimiter normalization for model answers.
//!
//! Hosted models mix `\[ .. \]`, `\( .. \)` and bare `[ .. ]` lines for LaTeX.
//! Everything is rewritten to `$$..$$` (block) and `$..$` (inline).

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BLOCK_RE: Regex = Regex::new(r"(?s)\\\[\s*(.*?)\s*\\\]").unwrap();
    static ref INLINE_RE: Regex = Regex::new(r"\\\(\s*(.+?)\s*\\\)").unwrap();
    // A whole line wrapped in [ ] that contains at least one LaTeX command
    static ref BRACKET_LINE_RE: Regex =
        Regex::new(r"(?m)^([ \t]*)\[[ \t]*([^\n]*\\[^\n]*?)[ \t]*\][ \t]*$").unwrap();
}

fn rewrite_once(text: &str) -> String {
    let text = BLOCK_RE.replace_all(text, "$$$$${1}$$$$");
    let text = BRACKET_LINE_RE.replace_all(&text, "${1}$$$$${2}$$$$");
    INLINE_RE.replace_all(&text, "$$${1}$$").into_owned()
}

/// Rewrites model math delimiters into `$$`/`$` form.
///
/// Every rewrite removes a backslash or bracket pair, so the loop reaches a
/// fixed point and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = rewrite_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
