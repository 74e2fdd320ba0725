//! Reading typed article payloads from `.dict` files.
//!
//! The `.dict` file is an opaque byte stream addressed by the
//! `(offset, size)` coordinates of an `.idx` entry. Each addressed range is
//! a sequence of typed data blocks, framed either by inline type tags or by
//! the dictionary's `sametypesequence` declaration.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::sync::Mutex;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use super::dictzip::DictzipReader;
use super::error::{Result, StardictError};
use super::idx::IdxEntry;

/// A type of data block in a dictionary article.
///
/// The type is a single byte whose ASCII case controls framing: lowercase
/// tags are string-like data terminated by NUL, uppercase tags are file-like
/// data preceded by a 4-byte big-endian size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// `m`: UTF-8 text.
    UtfText,
    /// `l`: text in a locale encoding.
    LocaleText,
    /// `g`: Pango markup.
    Pango,
    /// `t`: English phonetic string.
    Phonetic,
    /// `x`: XDXF XML.
    Xdxf,
    /// `y`: Yin Biao or Kana phonetic string.
    YinBiaoOrKana,
    /// `p`: KingSoft PowerWord XML.
    PowerWord,
    /// `w`: MediaWiki markup.
    MediaWiki,
    /// `h`: HTML text.
    Html,
    /// `n`: WordNet data.
    WordNet,
    /// `r`: list of files in resource storage.
    ResourceList,
    /// `W`: .wav sound data.
    Wav,
    /// `P`: image data.
    Picture,
    /// `X`: reserved for experimental features.
    Experimental,
}

impl DataType {
    /// The tag byte as it appears on disk.
    pub fn byte(self) -> u8 {
        match self {
            DataType::UtfText => b'm',
            DataType::LocaleText => b'l',
            DataType::Pango => b'g',
            DataType::Phonetic => b't',
            DataType::Xdxf => b'x',
            DataType::YinBiaoOrKana => b'y',
            DataType::PowerWord => b'p',
            DataType::MediaWiki => b'w',
            DataType::Html => b'h',
            DataType::WordNet => b'n',
            DataType::ResourceList => b'r',
            DataType::Wav => b'W',
            DataType::Picture => b'P',
            DataType::Experimental => b'X',
        }
    }

    /// String-like blocks are NUL-delimited; file-like blocks carry a
    /// length prefix.
    pub fn is_string_like(self) -> bool {
        self.byte().is_ascii_lowercase()
    }
}

impl TryFrom<u8> for DataType {
    type Error = StardictError;

    fn try_from(b: u8) -> Result<Self> {
        match b {
            b'm' => Ok(DataType::UtfText),
            b'l' => Ok(DataType::LocaleText),
            b'g' => Ok(DataType::Pango),
            b't' => Ok(DataType::Phonetic),
            b'x' => Ok(DataType::Xdxf),
            b'y' => Ok(DataType::YinBiaoOrKana),
            b'p' => Ok(DataType::PowerWord),
            b'w' => Ok(DataType::MediaWiki),
            b'h' => Ok(DataType::Html),
            b'n' => Ok(DataType::WordNet),
            b'r' => Ok(DataType::ResourceList),
            b'W' => Ok(DataType::Wav),
            b'P' => Ok(DataType::Picture),
            b'X' => Ok(DataType::Experimental),
            other => Err(StardictError::InvalidType(other as char)),
        }
    }
}

/// One typed data block of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    kind: DataType,
    data: Vec<u8>,
}

impl Data {
    pub fn new(kind: DataType, data: Vec<u8>) -> Data {
        Data { kind, data }
    }

    pub fn kind(&self) -> DataType {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Render the block as plain display text.
    ///
    /// Text-like blocks decode as UTF-8, HTML converts to text, and the
    /// remaining formats render as the empty string.
    pub fn render(&self) -> String {
        match self.kind {
            DataType::UtfText
            | DataType::LocaleText
            | DataType::Phonetic
            | DataType::YinBiaoOrKana
            | DataType::MediaWiki => String::from_utf8_lossy(&self.data).into_owned(),
            DataType::Html => html2text::from_read(self.data.as_slice(), 80),
            _ => String::new(),
        }
    }
}

/// Parse one article's raw bytes into its typed data blocks.
///
/// With a non-empty `same_type_sequence` the tags come from the sequence and
/// no tag bytes appear in the buffer; the final string-like block may omit
/// its NUL terminator. Otherwise each block starts with its inline tag byte.
/// String-like data never includes the terminator.
pub fn parse_article(buf: &[u8], same_type_sequence: &[DataType]) -> Result<Vec<Data>> {
    let mut blocks = Vec::new();
    let mut buf = buf;

    if !same_type_sequence.is_empty() {
        for (i, &kind) in same_type_sequence.iter().enumerate() {
            let last = i + 1 == same_type_sequence.len();
            buf = parse_block(buf, kind, last, &mut blocks)?;
        }
    } else {
        while !buf.is_empty() {
            let kind = DataType::try_from(buf[0])?;
            buf = parse_block(&buf[1..], kind, false, &mut blocks)?;
        }
    }

    Ok(blocks)
}

fn parse_block<'a>(
    buf: &'a [u8],
    kind: DataType,
    nul_optional: bool,
    blocks: &mut Vec<Data>,
) -> Result<&'a [u8]> {
    if kind.is_string_like() {
        let (data, rest) = match buf.iter().position(|&b| b == 0) {
            Some(i) => (&buf[..i], &buf[i + 1..]),
            None if nul_optional => (buf, &buf[buf.len()..]),
            None => return Err(StardictError::TruncatedData),
        };
        blocks.push(Data::new(kind, data.to_vec()));
        Ok(rest)
    } else {
        if buf.len() < 4 {
            return Err(StardictError::TruncatedData);
        }
        let size = BigEndian::read_u32(&buf[..4]) as usize;
        let rest = &buf[4..];
        if rest.len() < size {
            return Err(StardictError::TruncatedData);
        }
        blocks.push(Data::new(kind, rest[..size].to_vec()));
        Ok(&rest[size..])
    }
}

/// Serialize data blocks back into article bytes.
///
/// The inverse of [`parse_article`]: with a `same_type_sequence` the tag
/// bytes are omitted and the final string-like block drops its terminator.
pub fn write_article(blocks: &[Data], same_type_sequence: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if !same_type_sequence {
            out.push(block.kind().byte());
        }
        if block.kind().is_string_like() {
            out.extend_from_slice(block.data());
            if !(same_type_sequence && i + 1 == blocks.len()) {
                out.push(0);
            }
        } else {
            out.extend_from_slice(&(block.data().len() as u32).to_be_bytes());
            out.extend_from_slice(block.data());
        }
    }
    out
}

enum Backend {
    Plain(Mutex<File>),
    Dictzip(DictzipReader),
}

/// Random-access reader over the `.dict` payload.
///
/// Articles are fetched by positioned reads so that a single dictionary can
/// serve parallel readers without racing on a file cursor.
pub struct Dict {
    backend: Backend,
    same_type_sequence: Vec<DataType>,
}

impl Dict {
    /// A reader over an uncompressed `.dict` file.
    pub(crate) fn plain(file: File, same_type_sequence: Vec<DataType>) -> Dict {
        Dict {
            backend: Backend::Plain(Mutex::new(file)),
            same_type_sequence,
        }
    }

    /// A reader over a dictzip-compressed `.dict.dz` file.
    pub(crate) fn dictzip(file: File, same_type_sequence: Vec<DataType>) -> Result<Dict> {
        Ok(Dict {
            backend: Backend::Dictzip(DictzipReader::new(file)?),
            same_type_sequence,
        })
    }

    /// Read `size` bytes at absolute `offset` in the uncompressed payload.
    pub fn read_at(&self, offset: u64, size: u32) -> Result<Vec<u8>> {
        // Reject offsets beyond the signed 63-bit range instead of letting
        // them wrap in platform seek arithmetic.
        if offset > i64::MAX as u64 {
            return Err(StardictError::OffsetTooLarge(offset));
        }
        trace!("dict read: offset={offset}, size={size}");
        match &self.backend {
            Backend::Plain(file) => {
                let mut file = file.lock().map_err(|_| StardictError::LockPoisoned)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; size as usize];
                file.read_exact(&mut buf).map_err(|e| {
                    if e.kind() == ErrorKind::UnexpectedEof {
                        StardictError::ShortRead {
                            expected: u64::from(size),
                        }
                    } else {
                        StardictError::Io(e)
                    }
                })?;
                Ok(buf)
            }
            Backend::Dictzip(dz) => dz.read_at(offset, u64::from(size)),
        }
    }

    /// Fetch and parse the article for an `.idx` entry.
    pub fn word(&self, entry: &IdxEntry) -> Result<Vec<Data>> {
        let buf = self.read_at(entry.offset, entry.size)?;
        parse_article(&buf, &self.same_type_sequence)
    }
}
