//! Reading and searching the `.idx` headword index.

use std::io::BufRead;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use log::debug;

use super::error::{Result, StardictError};
use super::fold::Folder;
use super::glob;
use super::index::SortedIndex;
use super::scanner;
use super::syn::SynScanner;

/// Width of the offset field in `.idx` records.
///
/// Version 3.0.0 dictionaries may declare 64-bit offsets through the
/// `idxoffsetbits` key; everything else uses 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetBits {
    Bits32,
    Bits64,
}

impl OffsetBits {
    /// The offset field width in bytes.
    pub fn width(self) -> usize {
        match self {
            OffsetBits::Bits32 => 4,
            OffsetBits::Bits64 => 8,
        }
    }
}

impl TryFrom<u64> for OffsetBits {
    type Error = StardictError;

    fn try_from(bits: u64) -> Result<Self> {
        match bits {
            32 => Ok(OffsetBits::Bits32),
            64 => Ok(OffsetBits::Bits64),
            _ => Err(StardictError::InvalidOffsetBits(bits)),
        }
    }
}

/// A single `.idx` entry: the headword as it appears in the index, and the
/// payload coordinates of the corresponding article in the `.dict` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxEntry {
    pub word: String,
    pub offset: u64,
    pub size: u32,
}

/// Streaming scanner over the raw `.idx` byte stream.
///
/// Each record is a NUL-terminated UTF-8 word followed by a big-endian
/// offset (4 or 8 bytes per [`OffsetBits`]) and a 4-byte big-endian size.
pub struct IdxScanner<R> {
    reader: R,
    offset_bits: OffsetBits,
}

impl<R: BufRead> IdxScanner<R> {
    pub fn new(reader: R, offset_bits: OffsetBits) -> Self {
        IdxScanner {
            reader,
            offset_bits,
        }
    }
}

impl<R: BufRead> Iterator for IdxScanner<R> {
    type Item = Result<IdxEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let width = self.offset_bits.width();
        match scanner::next_record(&mut self.reader, width + 4, ".idx") {
            Ok(None) => None,
            Ok(Some((word, trailer))) => {
                let offset = match self.offset_bits {
                    OffsetBits::Bits32 => u64::from(BigEndian::read_u32(&trailer[..4])),
                    OffsetBits::Bits64 => BigEndian::read_u64(&trailer[..8]),
                };
                let size = BigEndian::read_u32(&trailer[width..]);
                Some(Ok(IdxEntry { word, offset, size }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// An in-memory search index over headwords and, optionally, synonyms.
///
/// Every headword is folded through the configured [`Folder`] and stored
/// with its original spelling. Synonyms fold the same way and share the
/// `.idx` entry they point at, so a synonym hit resolves to the canonical
/// headword's payload.
pub struct Idx {
    // .idx entries in file order; the sorted index stores positions into
    // this arena so synonyms can share entries without copying them.
    entries: Vec<IdxEntry>,
    index: SortedIndex<usize>,
    folder: Arc<dyn Folder>,
}

impl Idx {
    /// Build the index by consuming an [`IdxScanner`] and, when the
    /// dictionary has a `.syn` file, a [`SynScanner`].
    ///
    /// A synonym whose `original_word_index` is out of range fails
    /// construction.
    pub fn new<R, S>(
        idx: IdxScanner<R>,
        syn: Option<SynScanner<S>>,
        folder: Arc<dyn Folder>,
    ) -> Result<Idx>
    where
        R: BufRead,
        S: BufRead,
    {
        let mut entries = Vec::new();
        let mut keys = Vec::new();
        for entry in idx {
            let entry = entry?;
            keys.push((folder.fold(&entry.word), entries.len()));
            entries.push(entry);
        }

        if let Some(syn) = syn {
            for entry in syn {
                let entry = entry?;
                let i = entry.original_word_index as usize;
                if i >= entries.len() {
                    return Err(StardictError::SynIndexOutOfRange {
                        index: entry.original_word_index,
                        len: entries.len(),
                    });
                }
                keys.push((folder.fold(&entry.word), i));
            }
        }

        debug!("indexed {} folded keys over {} entries", keys.len(), entries.len());

        Ok(Idx {
            entries,
            index: SortedIndex::new(keys),
            folder,
        })
    }

    /// Number of `.idx` entries backing the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Search the index for a query and return the matching entries with
    /// their original (unfolded) words.
    ///
    /// A query without glob meta-characters matches entries whose folded
    /// key equals the folded query. A query containing `*`, `?`, `[`, `{`,
    /// or `\` is a glob: its literal runs fold while the glob syntax stays
    /// intact, the static prefix narrows the candidate range, and the
    /// compiled pattern filters the candidates' folded keys. A glob with an
    /// empty static prefix or a malformed pattern is an error.
    pub fn search(&self, query: &str) -> Result<Vec<&IdxEntry>> {
        let folded = glob::fold_query(query, self.folder.as_ref());

        if !glob::has_meta(&folded) {
            let hits = self.index.equal_range(&folded);
            return Ok(hits.iter().map(|&(_, i)| &self.entries[i]).collect());
        }

        let prefix = glob::literal_prefix(&folded);
        if prefix.is_empty() {
            return Err(StardictError::EmptyGlobPrefix(query.to_owned()));
        }
        let pattern = glob::compile(&folded)?;

        Ok(self
            .index
            .prefix_range(prefix)
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .map(|&(_, i)| &self.entries[i])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stardict::fold::{NopFolder, UnicodeFolder};

    fn make_idx_bytes(words: &[(&str, u64, u32)], bits: OffsetBits) -> Vec<u8> {
        let mut b = Vec::new();
        for &(word, offset, size) in words {
            b.extend_from_slice(word.as_bytes());
            b.push(0);
            match bits {
                OffsetBits::Bits32 => {
                    b.extend_from_slice(&u32::try_from(offset).unwrap().to_be_bytes())
                }
                OffsetBits::Bits64 => b.extend_from_slice(&offset.to_be_bytes()),
            }
            b.extend_from_slice(&size.to_be_bytes());
        }
        b
    }

    fn make_syn_bytes(words: &[(&str, u32)]) -> Vec<u8> {
        let mut b = Vec::new();
        for &(word, index) in words {
            b.extend_from_slice(word.as_bytes());
            b.push(0);
            b.extend_from_slice(&index.to_be_bytes());
        }
        b
    }

    fn build(words: &[(&str, u64, u32)], syn: Option<&[(&str, u32)]>) -> Result<Idx> {
        let idx_bytes = make_idx_bytes(words, OffsetBits::Bits32);
        let scanner = IdxScanner::new(idx_bytes.as_slice(), OffsetBits::Bits32);
        let syn_bytes = syn.map(make_syn_bytes);
        let syn_scanner = syn_bytes
            .as_ref()
            .map(|b| SynScanner::new(b.as_slice()));
        Idx::new(scanner, syn_scanner, Arc::new(UnicodeFolder))
    }

    fn words(hits: &[&IdxEntry]) -> Vec<String> {
        hits.iter().map(|e| e.word.clone()).collect()
    }

    #[test]
    fn scanner_yields_all_records_32() {
        let bytes = make_idx_bytes(&[("hoge", 6, 10), ("fuga", 0, 6)], OffsetBits::Bits32);
        let entries: Vec<IdxEntry> = IdxScanner::new(bytes.as_slice(), OffsetBits::Bits32)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            entries,
            vec![
                IdxEntry {
                    word: "hoge".to_string(),
                    offset: 6,
                    size: 10,
                },
                IdxEntry {
                    word: "fuga".to_string(),
                    offset: 0,
                    size: 6,
                },
            ]
        );
    }

    #[test]
    fn scanner_round_trips_32_bit_offsets() {
        let bytes = make_idx_bytes(&[("w", u64::from(u32::MAX), 9)], OffsetBits::Bits32);
        let entries: Vec<IdxEntry> = IdxScanner::new(bytes.as_slice(), OffsetBits::Bits32)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries[0].offset, u64::from(u32::MAX));
    }

    #[test]
    fn scanner_round_trips_64_bit_offsets() {
        let big = u64::MAX - 7;
        let bytes = make_idx_bytes(&[("w", big, u32::MAX)], OffsetBits::Bits64);
        let entries: Vec<IdxEntry> = IdxScanner::new(bytes.as_slice(), OffsetBits::Bits64)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries[0].offset, big);
        assert_eq!(entries[0].size, u32::MAX);
    }

    #[test]
    fn scanner_rejects_truncated_trailing_record() {
        let mut bytes = make_idx_bytes(&[("hoge", 0, 6)], OffsetBits::Bits32);
        bytes.extend_from_slice(b"fug");
        let result: Result<Vec<IdxEntry>> =
            IdxScanner::new(bytes.as_slice(), OffsetBits::Bits32).collect();
        assert!(matches!(
            result,
            Err(StardictError::TruncatedRecord { .. })
        ));
    }

    #[test]
    fn offset_bits_whitelist() {
        assert_eq!(OffsetBits::try_from(32).unwrap(), OffsetBits::Bits32);
        assert_eq!(OffsetBits::try_from(64).unwrap(), OffsetBits::Bits64);
        assert!(matches!(
            OffsetBits::try_from(48),
            Err(StardictError::InvalidOffsetBits(48))
        ));
    }

    #[test]
    fn exact_search_folds_both_sides() {
        let idx = build(&[("Hoge", 0, 4), ("fuga", 4, 4)], None).unwrap();
        assert_eq!(words(&idx.search("hoge").unwrap()), vec!["Hoge"]);
        assert_eq!(words(&idx.search("HOGE").unwrap()), vec!["Hoge"]);
        assert!(idx.search("piyo").unwrap().is_empty());
    }

    #[test]
    fn exact_search_keeps_duplicate_keys() {
        let idx = build(&[("hoge", 0, 1), ("Hoge", 1, 1), ("HOGE", 2, 1)], None).unwrap();
        assert_eq!(idx.search("hoge").unwrap().len(), 3);
    }

    #[test]
    fn sharp_s_query_matches() {
        let idx = build(&[("grüßen", 0, 4)], None).unwrap();
        assert_eq!(words(&idx.search("grussen").unwrap()), vec!["grüßen"]);
    }

    #[test]
    fn glob_search_filters_prefix_range() {
        let idx = build(
            &[("fuga", 0, 1), ("fUga hoge", 1, 1), ("piyo", 2, 1)],
            None,
        )
        .unwrap();
        let hits = idx.search("Fu[G]A*").unwrap();
        assert_eq!(words(&hits), vec!["fuga", "fUga hoge"]);
    }

    #[test]
    fn glob_without_prefix_fails() {
        let idx = build(&[("fuga", 0, 1)], None).unwrap();
        assert!(matches!(
            idx.search("*uga"),
            Err(StardictError::EmptyGlobPrefix(_))
        ));
    }

    #[test]
    fn malformed_glob_fails() {
        let idx = build(&[("fuga", 0, 1)], None).unwrap();
        assert!(matches!(
            idx.search("[fuga"),
            Err(StardictError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn synonyms_share_the_original_entry() {
        let idx = build(&[("hoge", 3, 7)], Some(&[("foo", 0)])).unwrap();
        let direct = idx.search("hoge").unwrap();
        let via_syn = idx.search("foo").unwrap();
        assert_eq!(via_syn.len(), 1);
        assert!(std::ptr::eq(direct[0], via_syn[0]));
        assert_eq!(via_syn[0].word, "hoge");
    }

    #[test]
    fn synonym_out_of_range_fails_construction() {
        let result = build(&[("hoge", 0, 1)], Some(&[("foo", 1)]));
        assert!(matches!(
            result,
            Err(StardictError::SynIndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn nop_folder_is_case_sensitive() {
        let bytes = make_idx_bytes(&[("Hoge", 0, 1)], OffsetBits::Bits32);
        let idx = Idx::new(
            IdxScanner::new(bytes.as_slice(), OffsetBits::Bits32),
            None::<SynScanner<&[u8]>>,
            Arc::new(NopFolder),
        )
        .unwrap();
        assert!(idx.search("hoge").unwrap().is_empty());
        assert_eq!(words(&idx.search("Hoge").unwrap()), vec!["Hoge"]);
    }
}
