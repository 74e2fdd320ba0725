//! Text folding applied to headwords and queries before comparison.
//!
//! The index never compares raw headwords. Both the indexed words and the
//! query pass through the same folding pipeline so that case, accent,
//! whitespace, and punctuation variants of a word compare equal while the
//! stored entry keeps the original spelling.

use caseless::Caseless;
use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategory, GeneralCategoryGroup, UnicodeGeneralCategory};

/// Folds text into the canonical form used for key comparison.
///
/// Implementations must be deterministic: the index folds every headword once
/// at construction time and folds each query on demand, and the two sides
/// only match if the folder maps them to the same string.
pub trait Folder: Send + Sync {
    fn fold(&self, text: &str) -> String;
}

/// The default folding pipeline.
///
/// Stages, in order:
/// 1. Canonical decomposition (NFD).
/// 2. Full Unicode case folding.
/// 3. Whitespace folding: leading and trailing whitespace is dropped and
///    every internal whitespace run collapses to a single ASCII space.
/// 4. Removal of nonspacing marks (category `Mn`).
/// 5. Removal of punctuation (category `P`).
/// 6. Canonical composition (NFC). Case folding does not preserve a normal
///    form, so composition must run after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeFolder;

impl Folder for UnicodeFolder {
    fn fold(&self, text: &str) -> String {
        WhitespaceFold::new(text.chars().nfd().default_case_fold())
            .filter(|c| c.general_category() != GeneralCategory::NonspacingMark)
            .filter(|c| c.general_category_group() != GeneralCategoryGroup::Punctuation)
            .nfc()
            .collect()
    }
}

/// A folder that leaves text untouched. Useful for case- and
/// accent-sensitive indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopFolder;

impl Folder for NopFolder {
    fn fold(&self, text: &str) -> String {
        text.to_owned()
    }
}

/// Iterator adapter implementing the whitespace folding stage.
///
/// The replacement character U+FFFD is not whitespace and passes through.
struct WhitespaceFold<I> {
    inner: I,
    // Held back while deciding whether a whitespace run is internal or trailing.
    pending: Option<char>,
    started: bool,
    in_span: bool,
}

impl<I: Iterator<Item = char>> WhitespaceFold<I> {
    fn new(inner: I) -> Self {
        WhitespaceFold {
            inner,
            pending: None,
            started: false,
            in_span: false,
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for WhitespaceFold<I> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if let Some(c) = self.pending.take() {
            return Some(c);
        }
        loop {
            let c = self.inner.next()?;
            if c.is_whitespace() {
                // Leading whitespace is dropped outright. An internal span is
                // only emitted once a following non-whitespace character
                // proves it is not trailing.
                if self.started {
                    self.in_span = true;
                }
                continue;
            }
            self.started = true;
            if self.in_span {
                self.in_span = false;
                self.pending = Some(c);
                return Some(' ');
            }
            return Some(c);
        }
    }
}
