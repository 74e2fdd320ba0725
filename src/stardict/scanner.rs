//! NUL-framed record scanning shared by the `.idx` and `.syn` readers.

use std::io::{BufRead, ErrorKind};

use super::error::{Result, StardictError};

/// Read one record from `r`: a NUL-terminated word followed by a fixed-size
/// trailer of `trailer_len` bytes.
///
/// Returns `Ok(None)` at a clean end of stream. A word missing its terminator
/// or a short trailer while bytes remain is a truncated-record error. Invalid
/// UTF-8 in the word decodes as U+FFFD.
pub(crate) fn next_record<R: BufRead>(
    r: &mut R,
    trailer_len: usize,
    context: &'static str,
) -> Result<Option<(String, Vec<u8>)>> {
    let mut word = Vec::new();
    let n = r.read_until(0, &mut word)?;
    if n == 0 {
        return Ok(None);
    }
    if word.last() != Some(&0) {
        return Err(StardictError::TruncatedRecord { context });
    }
    word.pop();

    let mut trailer = vec![0u8; trailer_len];
    r.read_exact(&mut trailer).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            StardictError::TruncatedRecord { context }
        } else {
            StardictError::Io(e)
        }
    })?;

    Ok(Some((String::from_utf8_lossy(&word).into_owned(), trailer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_records_until_end() {
        let data: &[u8] = b"abc\0\x01\x02xy\0\x03\x04";
        let mut r = data;
        assert_eq!(
            next_record(&mut r, 2, ".idx").unwrap(),
            Some(("abc".to_string(), vec![1, 2]))
        );
        assert_eq!(
            next_record(&mut r, 2, ".idx").unwrap(),
            Some(("xy".to_string(), vec![3, 4]))
        );
        assert_eq!(next_record(&mut r, 2, ".idx").unwrap(), None);
    }

    #[test]
    fn word_without_terminator_is_truncated() {
        let mut r: &[u8] = b"abc";
        assert!(matches!(
            next_record(&mut r, 2, ".idx"),
            Err(StardictError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn short_trailer_is_truncated() {
        let mut r: &[u8] = b"abc\0\x01";
        assert!(matches!(
            next_record(&mut r, 2, ".idx"),
            Err(StardictError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn invalid_utf8_becomes_replacement_character() {
        let mut r: &[u8] = b"a\xFF\0\x01\x02";
        let (word, _) = next_record(&mut r, 2, ".idx").unwrap().unwrap();
        assert_eq!(word, "a\u{FFFD}");
    }
}
