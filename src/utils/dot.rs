//! DOT format helpers for graph visualization.
//!
//! Both the control flow graph and the region graph can be dumped as Graphviz DOT to
//! inspect a function while it is being structured.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Quotes, backslashes, line breaks and the record-shape delimiters (`<`, `>`, `{`,
/// `}`, `|`) are escaped. Carriage returns are dropped.
///
/// # Examples
///
/// ```rust
/// use dsoscope::utils::escape_dot;
///
/// assert_eq!(escape_dot("[@4, LoadVar, \"$x\"]"), "[@4, LoadVar, \\\"$x\\\"]");
/// assert_eq!(escape_dot("a < b"), "a \\< b");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '<' | '>' | '{' | '}' | '|' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Joins label lines into a left-justified DOT label body.
pub(crate) fn dot_label<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut label = String::new();
    for line in lines {
        label.push_str(&escape_dot(line.as_ref()));
        label.push_str("\\l");
    }
    label
}
