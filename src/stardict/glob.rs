//! Shell-style glob queries, compiled to regular expressions.
//!
//! Supported syntax: `*` (any run of non-separator characters), `**` (any run
//! of characters), `?` (one non-separator character), `[…]`/`[!…]` character
//! classes with `a-z` ranges, `{p,q}` alternation, and `\c` escapes. The
//! separator character is `/`.

use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;

use super::error::{Result, StardictError};
use super::fold::Folder;

const META: &[char] = &['*', '?', '[', '{', '\\'];

/// Whether the pattern contains any glob meta-character.
pub(crate) fn has_meta(pattern: &str) -> bool {
    pattern.contains(META)
}

/// The maximal leading run of the pattern containing no meta-character.
pub(crate) fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(META) {
        Some(i) => &pattern[..i],
        None => pattern,
    }
}

/// Fold a query while keeping its glob syntax intact.
///
/// Literal runs fold through the full pipeline and meta constructs pass
/// through structurally: `*`, `?`, and escapes are untouched, character
/// classes keep their brackets and ranges while class members are
/// case-folded, and alternation keeps its braces and commas while the
/// alternatives fold individually. `Fu[G]A*` folds to `fu[g]a*`.
pub(crate) fn fold_query(query: &str, folder: &dyn Folder) -> String {
    let mut out = String::with_capacity(query.len());
    let mut run = String::new();
    let mut chars = query.chars().peekable();
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                flush(folder, &mut run, &mut out);
                out.push('\\');
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '*' | '?' => {
                flush(folder, &mut run, &mut out);
                out.push(c);
            }
            '[' => {
                flush(folder, &mut run, &mut out);
                fold_class(&mut chars, &mut out, folder);
            }
            '{' => {
                flush(folder, &mut run, &mut out);
                depth += 1;
                out.push('{');
            }
            '}' if depth > 0 => {
                flush(folder, &mut run, &mut out);
                depth -= 1;
                out.push('}');
            }
            ',' if depth > 0 => {
                flush(folder, &mut run, &mut out);
                out.push(',');
            }
            _ => run.push(c),
        }
    }
    flush(folder, &mut run, &mut out);
    out
}

fn flush(folder: &dyn Folder, run: &mut String, out: &mut String) {
    if !run.is_empty() {
        out.push_str(&folder.fold(run));
        run.clear();
    }
}

// Copy a character class, folding its members one at a time. The structural
// `-` and `]` stay untouched, and a member whose folded form is empty (for
// example punctuation) keeps its original spelling rather than vanishing
// from the class.
fn fold_class(chars: &mut Peekable<Chars>, out: &mut String, folder: &dyn Folder) {
    out.push('[');
    if chars.peek() == Some(&'!') {
        out.push('!');
        chars.next();
    }
    if chars.peek() == Some(&']') {
        out.push(']');
        chars.next();
    }
    let mut member = [0u8; 4];
    for c in chars.by_ref() {
        match c {
            ']' => {
                out.push(']');
                return;
            }
            '-' => out.push('-'),
            other => {
                let folded = folder.fold(other.encode_utf8(&mut member));
                if folded.is_empty() {
                    out.push(other);
                } else {
                    out.push_str(&folded);
                }
            }
        }
    }
    // Unclosed class: emitted as-is, rejected later by compile().
}

/// Compile a glob pattern into an anchored regular expression.
pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    translate(&mut chars, &mut re, false).map_err(|reason| glob_error(pattern, reason))?;
    re.push('$');
    Regex::new(&re).map_err(|e| glob_error(pattern, e.to_string()))
}

fn glob_error(pattern: &str, reason: impl Into<String>) -> StardictError {
    StardictError::InvalidGlob {
        pattern: pattern.to_owned(),
        reason: reason.into(),
    }
}

// Translate tokens until the end of input or, inside an alternation branch,
// until the `,` or `}` delimiter (left for the caller to consume).
fn translate(
    chars: &mut Peekable<Chars>,
    re: &mut String,
    in_brace: bool,
) -> std::result::Result<(), String> {
    while let Some(&c) = chars.peek() {
        if in_brace && (c == ',' || c == '}') {
            return Ok(());
        }
        chars.next();
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '[' => translate_class(chars, re)?,
            '{' => {
                re.push_str("(?:");
                loop {
                    translate(chars, re, true)?;
                    match chars.next() {
                        Some(',') => re.push('|'),
                        Some('}') => break,
                        _ => return Err("unclosed alternation".to_owned()),
                    }
                }
                re.push(')');
            }
            '\\' => match chars.next() {
                Some(escaped) => push_literal(re, escaped),
                None => return Err("trailing backslash".to_owned()),
            },
            other => push_literal(re, other),
        }
    }
    Ok(())
}

fn translate_class(
    chars: &mut Peekable<Chars>,
    re: &mut String,
) -> std::result::Result<(), String> {
    re.push('[');
    if chars.peek() == Some(&'!') {
        chars.next();
        re.push('^');
    }
    if chars.peek() == Some(&']') {
        chars.next();
        re.push_str("\\]");
    }
    while let Some(c) = chars.next() {
        match c {
            ']' => {
                re.push(']');
                return Ok(());
            }
            '-' => re.push('-'),
            '\\' => match chars.next() {
                Some(escaped) => push_class_literal(re, escaped),
                None => return Err("trailing backslash in character class".to_owned()),
            },
            other => push_class_literal(re, other),
        }
    }
    Err("unclosed character class".to_owned())
}

fn push_literal(re: &mut String, c: char) {
    re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
}

fn push_class_literal(re: &mut String, c: char) {
    if matches!(c, '[' | ']' | '\\' | '^' | '&' | '~' | '-') {
        re.push('\\');
    }
    re.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stardict::fold::{NopFolder, UnicodeFolder};

    fn matches(pattern: &str, text: &str) -> bool {
        compile(pattern).expect("compile").is_match(text)
    }

    #[test]
    fn meta_detection() {
        assert!(!has_meta("fuga"));
        assert!(has_meta("fu*"));
        assert!(has_meta("fu[g]a"));
        assert!(has_meta("a\\b"));
    }

    #[test]
    fn literal_prefix_stops_at_meta() {
        assert_eq!(literal_prefix("fu[g]a*"), "fu");
        assert_eq!(literal_prefix("*uga"), "");
        assert_eq!(literal_prefix("fuga"), "fuga");
    }

    #[test]
    fn star_does_not_cross_separator() {
        assert!(matches("fu*", "fuga"));
        assert!(matches("fu*", "fuga hoge"));
        assert!(!matches("fu*", "fu/ga"));
        assert!(matches("fu**", "fu/ga"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("h?ge", "hoge"));
        assert!(!matches("h?ge", "hge"));
        assert!(!matches("h?ge", "h/ge"));
    }

    #[test]
    fn character_classes() {
        assert!(matches("fu[g]a", "fuga"));
        assert!(matches("fu[a-z]a", "fuga"));
        assert!(!matches("fu[!a-z]a", "fuga"));
        assert!(matches("fu[!xyz]a", "fuga"));
    }

    #[test]
    fn alternation() {
        assert!(matches("{foo,bar}", "foo"));
        assert!(matches("{foo,bar}", "bar"));
        assert!(!matches("{foo,bar}", "baz"));
        assert!(matches("a{b,c{d,e}}f", "acef"));
    }

    #[test]
    fn escapes_are_literal() {
        assert!(matches("a\\*b", "a*b"));
        assert!(!matches("a\\*b", "axb"));
    }

    #[test]
    fn malformed_patterns_fail() {
        assert!(compile("[fuga").is_err());
        assert!(compile("{a,b").is_err());
        assert!(compile("a\\").is_err());
    }

    #[test]
    fn fold_query_preserves_glob_syntax() {
        let folder = UnicodeFolder;
        assert_eq!(fold_query("Fu[G]A*", &folder), "fu[g]a*");
        assert_eq!(fold_query("Grüßen?", &folder), "grussen?");
        assert_eq!(fold_query("{Foo,BAR}baz", &folder), "{foo,bar}baz");
        assert_eq!(fold_query("A\\*B", &folder), "a\\*b");
        assert_eq!(fold_query("[A-Z]x", &folder), "[a-z]x");
    }

    #[test]
    fn fold_query_with_nop_folder() {
        assert_eq!(fold_query("Fu[G]A*", &NopFolder), "Fu[G]A*");
    }
}
