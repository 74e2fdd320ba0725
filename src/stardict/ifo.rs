//! Reading `.ifo` metadata files.
//!
//! The `.ifo` file is a small UTF-8 text header: a magic line followed by
//! `key=value` lines. This module only parses the raw structure; semantic
//! validation (magic equality, version whitelist, numeric keys) belongs to
//! [`Stardict::open`](crate::stardict::Stardict::open).

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;

use super::error::{Result, StardictError};

fn key_pattern() -> &'static Regex {
    static KEY_PATTERN: OnceLock<Regex> = OnceLock::new();
    KEY_PATTERN.get_or_init(|| Regex::new("^[A-Za-z0-9_-]+$").unwrap())
}

/// Metadata read from an `.ifo` file.
#[derive(Debug)]
pub struct Ifo {
    magic: String,
    metadata: HashMap<String, String>,
}

impl Ifo {
    /// Parse an `.ifo` stream.
    ///
    /// Lines are `\n`-terminated with an optional trailing `\r`. The first
    /// line is the magic string, stored verbatim. Lines that are blank after
    /// trimming ASCII spaces are skipped; every other line splits on the
    /// first `=` with the key right-trimmed and the value left-trimmed of
    /// ASCII spaces. The first key must be `version`, and a file with no
    /// keys at all is rejected.
    pub fn read<R: BufRead>(r: R) -> Result<Ifo> {
        let mut lines = r.lines();

        let magic = match lines.next() {
            Some(line) => line?,
            None => return Err(StardictError::MissingVersion),
        };

        let mut metadata = HashMap::new();
        for line in lines {
            let line = line?;
            if line.trim_matches(' ').is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| StardictError::InvalidLine(line.clone()))?;
            let key = key.trim_end_matches(' ');
            let value = value.trim_start_matches(' ');
            if !key_pattern().is_match(key) {
                return Err(StardictError::InvalidKey(key.to_owned()));
            }
            if metadata.is_empty() && key != "version" {
                return Err(StardictError::MissingVersion);
            }
            metadata.insert(key.to_owned(), value.to_owned());
        }
        if metadata.is_empty() {
            return Err(StardictError::MissingVersion);
        }

        Ok(Ifo { magic, metadata })
    }

    /// The magic string from the first line, verbatim.
    pub fn magic(&self) -> &str {
        &self.magic
    }

    /// Look up a metadata value by key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Result<Ifo> {
        Ifo::read(text.as_bytes())
    }

    #[test]
    fn parses_magic_and_keys() {
        let ifo = read("StarDict's dict ifo file\nversion=2.4.2\nbookname=Test Dict\n").unwrap();
        assert_eq!(ifo.magic(), "StarDict's dict ifo file");
        assert_eq!(ifo.value("version"), Some("2.4.2"));
        assert_eq!(ifo.value("bookname"), Some("Test Dict"));
        assert_eq!(ifo.value("missing"), None);
    }

    #[test]
    fn trims_carriage_returns_and_spaces() {
        let ifo = read("magic\r\nversion = 3.0.0 \r\n").unwrap();
        // Key is right-trimmed, value left-trimmed; trailing spaces in the
        // value are preserved.
        assert_eq!(ifo.value("version"), Some("3.0.0 "));
    }

    #[test]
    fn skips_blank_lines() {
        let ifo = read("magic\n   \nversion=2.4.2\n\nbookname=x\n").unwrap();
        assert_eq!(ifo.value("bookname"), Some("x"));
    }

    #[test]
    fn first_key_must_be_version() {
        assert!(matches!(
            read("magic\nbookname=x\nversion=2.4.2\n"),
            Err(StardictError::MissingVersion)
        ));
    }

    #[test]
    fn missing_separator_is_an_error() {
        assert!(matches!(
            read("magic\nversion=2.4.2\nbookname\n"),
            Err(StardictError::InvalidLine(_))
        ));
    }

    #[test]
    fn invalid_key_is_an_error() {
        assert!(matches!(
            read("magic\nversion=2.4.2\nbook name=x\n"),
            Err(StardictError::InvalidKey(_))
        ));
    }

    #[test]
    fn empty_file_is_missing_version() {
        assert!(matches!(read(""), Err(StardictError::MissingVersion)));
        assert!(matches!(read("magic\n"), Err(StardictError::MissingVersion)));
    }

    #[test]
    fn value_containing_equals_splits_on_first() {
        let ifo = read("magic\nversion=2.4.2\ndescription=a=b=c\n").unwrap();
        assert_eq!(ifo.value("description"), Some("a=b=c"));
    }
}
