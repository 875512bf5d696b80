//! Whitespace normalization applied to every extracted document.
//!
//! Rules, in order:
//! 1. non-breaking spaces become regular spaces,
//! 2. runs of spaces and tabs collapse to one space,
//! 3. three or more consecutive newlines collapse to exactly two,
//! 4. leading and trailing whitespace is trimmed.

/// Normalize extracted text for chunking.
///
/// ```rust
/// use corpus_harness_core::normalize::clean_text;
///
/// assert_eq!(clean_text("  a\u{a0}\t b\n\n\n\nc  "), "a b\n\nc");
/// ```
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    let mut newlines = 0usize;

    for ch in raw.chars() {
        let ch = if ch == '\u{a0}' { ' ' } else { ch };
        match ch {
            ' ' | '\t' => {
                newlines = 0;
                if !in_space {
                    out.push(' ');
                    in_space = true;
                }
            }
            '\n' => {
                in_space = false;
                newlines += 1;
                if newlines <= 2 {
                    out.push('\n');
                }
            }
            other => {
                in_space = false;
                newlines = 0;
                out.push(other);
            }
        }
    }

    out.trim().to_string()
}
