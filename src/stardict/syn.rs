//! Reading `.syn` synonym index files.

use std::io::BufRead;

use byteorder::{BigEndian, ByteOrder};

use super::error::Result;
use super::scanner;

/// A single `.syn` entry.
///
/// The synonym borrows the payload coordinates of the `.idx` entry at
/// `original_word_index` (a zero-based position in `.idx` file order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynEntry {
    pub word: String,
    pub original_word_index: u32,
}

/// Streaming scanner over the raw `.syn` byte stream.
///
/// Each record is a NUL-terminated UTF-8 word followed by 4 bytes of
/// big-endian index.
pub struct SynScanner<R> {
    reader: R,
}

impl<R: BufRead> SynScanner<R> {
    pub fn new(reader: R) -> Self {
        SynScanner { reader }
    }
}

impl<R: BufRead> Iterator for SynScanner<R> {
    type Item = Result<SynEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match scanner::next_record(&mut self.reader, 4, ".syn") {
            Ok(None) => None,
            Ok(Some((word, trailer))) => Some(Ok(SynEntry {
                word,
                original_word_index: BigEndian::read_u32(&trailer),
            })),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stardict::error::StardictError;

    #[test]
    fn scans_synonym_records() {
        let data: &[u8] = b"foo\0\x00\x00\x00\x00bar\0\x00\x00\x01\x02";
        let entries: Vec<SynEntry> = SynScanner::new(data).collect::<Result<_>>().unwrap();
        assert_eq!(
            entries,
            vec![
                SynEntry {
                    word: "foo".to_string(),
                    original_word_index: 0,
                },
                SynEntry {
                    word: "bar".to_string(),
                    original_word_index: 0x0102,
                },
            ]
        );
    }

    #[test]
    fn truncated_trailer_is_an_error() {
        let data: &[u8] = b"foo\0\x00\x00";
        let result: Result<Vec<SynEntry>> = SynScanner::new(data).collect();
        assert!(matches!(
            result,
            Err(StardictError::TruncatedRecord { .. })
        ));
    }
}
