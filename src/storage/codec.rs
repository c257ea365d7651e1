//! Binary record codec
//!
//! A recipe file is a plain sequence of records with no header:
//!
//! ```text
//! [id_length   : u64]
//! [id_bytes    : id_length bytes, not NUL-terminated]
//! [data_length : u64]
//! [data_bytes  : data_length bytes, raw memory image]
//! [pad         : one 0x00 byte iff id_length + data_length is odd]
//! ```
//!
//! Length words are always 8 bytes wide regardless of the host's `usize`, and are
//! stored in native byte order. Files are therefore not portable across hosts of
//! different endianness.

use std::io::{self, Read, Write};

use crate::error::{RecipeError, RecipeResult, RecordField};

/// Width of the id and data length prefixes
pub const SIZE_WORD: usize = std::mem::size_of::<u64>();

const PAD_BYTE: [u8; 1] = [0];

/// Whether a record with these lengths carries a trailing pad byte
pub fn needs_padding(id_len: u64, data_len: u64) -> bool {
    (id_len.wrapping_add(data_len)) % 2 != 0
}

/// Total encoded size of a record
pub fn encoded_len(id_len: usize, data_len: usize) -> usize {
    let pad = needs_padding(id_len as u64, data_len as u64) as usize;
    SIZE_WORD + id_len + SIZE_WORD + data_len + pad
}

/// Write one record
pub fn write_record<W: Write>(writer: &mut W, id: &[u8], data: &[u8]) -> io::Result<()> {
    let id_len = id.len() as u64;
    let data_len = data.len() as u64;

    writer.write_all(&id_len.to_ne_bytes())?;
    writer.write_all(id)?;
    writer.write_all(&data_len.to_ne_bytes())?;
    writer.write_all(data)?;
    if needs_padding(id_len, data_len) {
        writer.write_all(&PAD_BYTE)?;
    }
    Ok(())
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Raw identifier bytes as stored on disk
    pub id: Vec<u8>,
    pub data: Vec<u8>,
    /// Byte offset of the record's first length word
    pub offset: u64,
    pub padded: bool,
}

impl Record {
    /// Identifier as a string, if it is valid UTF-8
    pub fn id_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.id).ok()
    }
}

/// Sequential reader over the records of a recipe stream
///
/// Yields `Ok(record)` per complete record and stops cleanly when the stream ends on a
/// record boundary. A stream that ends inside a record yields a single
/// [`RecipeError::TruncatedRecord`] and then fuses.
pub struct RecordReader<R> {
    reader: R,
    offset: u64,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            reader,
            offset: 0,
            done: false,
        }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next record, `Ok(None)` at a clean end of stream
    pub fn read_record(&mut self) -> RecipeResult<Option<Record>> {
        let start = self.offset;

        // A stream that ends before the first byte of a record is a clean boundary
        let mut word = [0u8; SIZE_WORD];
        let got = self.fill(&mut word)?;
        if got == 0 {
            return Ok(None);
        }
        if got < SIZE_WORD {
            return Err(truncated(start, RecordField::IdLength));
        }
        let id_len = u64::from_ne_bytes(word);
        let id = self.read_exact_vec(id_len, start, RecordField::Id)?;

        if self.fill(&mut word)? < SIZE_WORD {
            return Err(truncated(start, RecordField::DataLength));
        }
        let data_len = u64::from_ne_bytes(word);
        let data = self.read_exact_vec(data_len, start, RecordField::Data)?;

        let padded = needs_padding(id_len, data_len);
        if padded {
            let mut pad = [0u8; 1];
            if self.fill(&mut pad)? < 1 {
                return Err(truncated(start, RecordField::Padding));
            }
        }

        Ok(Some(Record {
            id,
            data,
            offset: start,
            padded,
        }))
    }

    /// Read until `buf` is full or the stream ends, returning the byte count
    fn fill(&mut self, buf: &mut [u8]) -> RecipeResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RecipeError::io("<record stream>", e)),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }

    /// Read exactly `len` bytes into a fresh buffer
    /// Grows with the data actually present, so a corrupt length cannot force a huge allocation
    fn read_exact_vec(
        &mut self,
        len: u64,
        start: u64,
        field: RecordField,
    ) -> RecipeResult<Vec<u8>> {
        let mut buf = Vec::new();
        let got = (&mut self.reader)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(|e| RecipeError::io("<record stream>", e))?;
        self.offset += got as u64;
        if (got as u64) < len {
            return Err(truncated(start, field));
        }
        Ok(buf)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = RecipeResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn truncated(offset: u64, field: RecordField) -> RecipeError {
    RecipeError::TruncatedRecord { offset, field }
}
