//! Random access over dictzip-compressed `.dict` files.
//!
//! Dictzip is gzip (RFC 1952) whose extra field carries an `RA` subfield
//! describing fixed-size chunks that were compressed independently. A byte
//! range of the uncompressed payload can therefore be served by inflating
//! only the chunks that cover it instead of streaming the whole member.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::{Decompress, FlushDecompress};
use log::trace;

use super::error::{Result, StardictError};

const GZ_MAGIC: [u8; 2] = [0x1F, 0x8B];

// Gzip FLG bits.
const GZ_FHCRC: u8 = 0b0000_0010;
const GZ_FEXTRA: u8 = 0b0000_0100;
const GZ_FNAME: u8 = 0b0000_1000;
const GZ_FCOMMENT: u8 = 0b0001_0000;

/// A positioned reader over one dictzip member.
///
/// The chunk table is parsed once at construction; `read_at` only touches
/// the chunks covering the requested range. The file handle lives behind a
/// mutex so concurrent readers never race on the cursor.
pub(crate) struct DictzipReader {
    file: Mutex<File>,
    /// Uncompressed length of every chunk except possibly the last.
    chunk_len: usize,
    /// File offset where each compressed chunk starts.
    chunk_offsets: Vec<u64>,
    /// File offset one past the final compressed chunk.
    end_of_data: u64,
    /// Total uncompressed payload length (from the gzip ISIZE trailer).
    uncompressed_len: u64,
}

fn invalid(msg: impl Into<String>) -> StardictError {
    StardictError::InvalidFormat(msg.into())
}

impl DictzipReader {
    pub fn new(mut file: File) -> Result<Self> {
        // Fixed gzip header: magic, CM, FLG, MTIME, XFL, OS.
        let mut header = [0u8; 10];
        file.read_exact(&mut header)?;
        if header[0..2] != GZ_MAGIC {
            return Err(invalid("not a gzip file"));
        }
        let flags = header[3];
        if flags & GZ_FEXTRA == 0 {
            return Err(invalid("gzip extra field missing, not a dictzip file"));
        }

        let xlen = file.read_u16::<LittleEndian>()?;
        let mut fextra = vec![0u8; xlen as usize];
        file.read_exact(&mut fextra)?;
        if fextra.len() < 10 || &fextra[0..2] != b"RA" {
            return Err(invalid("no RA subfield in gzip extra field"));
        }
        let subfield_len = LittleEndian::read_u16(&fextra[2..4]);
        if subfield_len != xlen - 4 {
            return Err(invalid("RA subfield length disagrees with extra field length"));
        }
        let version = LittleEndian::read_u16(&fextra[4..6]);
        if version != 1 {
            return Err(invalid(format!("unsupported dictzip version: {version}")));
        }
        let chunk_len = LittleEndian::read_u16(&fextra[6..8]) as usize;
        let chunk_count = LittleEndian::read_u16(&fextra[8..10]) as usize;
        if chunk_len == 0 || chunk_count == 0 {
            return Err(invalid("empty dictzip chunk table"));
        }
        if (fextra.len() - 10) / 2 != chunk_count {
            return Err(invalid(format!(
                "chunk table truncated: {} chunks declared, room for {}",
                chunk_count,
                (fextra.len() - 10) / 2
            )));
        }

        // Skip the optional name, comment, and header CRC.
        if flags & GZ_FNAME != 0 {
            while file.read_u8()? != 0 {}
        }
        if flags & GZ_FCOMMENT != 0 {
            while file.read_u8()? != 0 {}
        }
        if flags & GZ_FHCRC != 0 {
            file.seek(SeekFrom::Current(2))?;
        }

        let mut next_offset = file.stream_position()?;
        let mut chunk_offsets = Vec::with_capacity(chunk_count);
        for sizes in fextra[10..10 + chunk_count * 2].chunks(2) {
            chunk_offsets.push(next_offset);
            next_offset += u64::from(LittleEndian::read_u16(sizes));
        }
        let end_of_data = next_offset;

        // The gzip trailer ends with ISIZE, the uncompressed length mod 2^32.
        file.seek(SeekFrom::End(-4))?;
        let uncompressed_len = u64::from(file.read_u32::<LittleEndian>()?);

        trace!(
            "dictzip member: {} chunks of {} bytes, {} bytes uncompressed",
            chunk_offsets.len(),
            chunk_len,
            uncompressed_len
        );

        Ok(DictzipReader {
            file: Mutex::new(file),
            chunk_len,
            chunk_offsets,
            end_of_data,
            uncompressed_len,
        })
    }

    /// Read `len` bytes of the uncompressed payload starting at `offset`.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset
            .checked_add(len)
            .ok_or(StardictError::OffsetTooLarge(offset))?;
        if end > self.uncompressed_len {
            return Err(StardictError::ShortRead { expected: len });
        }

        let first = (offset / self.chunk_len as u64) as usize;
        let last = ((end - 1) / self.chunk_len as u64) as usize;

        let mut data = Vec::with_capacity((last - first + 1) * self.chunk_len);
        let mut file = self.file.lock().map_err(|_| StardictError::LockPoisoned)?;
        for chunk in first..=last {
            let start = *self
                .chunk_offsets
                .get(chunk)
                .ok_or_else(|| invalid("read past the dictzip chunk table"))?;
            let next = self
                .chunk_offsets
                .get(chunk + 1)
                .copied()
                .unwrap_or(self.end_of_data);

            let mut compressed = vec![0u8; (next - start) as usize];
            file.seek(SeekFrom::Start(start))?;
            file.read_exact(&mut compressed)?;
            data.extend_from_slice(&inflate_chunk(&compressed, self.chunk_len)?);
        }

        let skip = (offset - first as u64 * self.chunk_len as u64) as usize;
        if data.len() < skip + len as usize {
            return Err(StardictError::ShortRead { expected: len });
        }
        Ok(data[skip..skip + len as usize].to_vec())
    }
}

// Each chunk is raw deflate data that a fresh inflater can decode in
// isolation, at most `chunk_len` bytes long once inflated.
fn inflate_chunk(compressed: &[u8], chunk_len: usize) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = vec![0u8; chunk_len];
    inflater
        .decompress(compressed, &mut out, FlushDecompress::None)
        .map_err(|e| invalid(format!("inflating dictzip chunk: {e}")))?;
    out.truncate(inflater.total_out() as usize);
    Ok(out)
}
