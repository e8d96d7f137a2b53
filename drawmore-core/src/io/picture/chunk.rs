//! PNG chunk stream: just enough to find, verify, and insert chunks. No pixel decoding here.
//!
//! After the 8 byte signature, a PNG is a sequence of
//! `{len: u32 BE, id: [u8; 4], data: [u8; len], crc: u32 BE}`
//! where the CRC covers `id` and `data`.

use crate::io::DecodeError;
use az::CheckedAs;

/// The PNG file signature.
pub const SIGNATURE: [u8; 8] = *b"\x89PNG\r\n\x1a\n";

/// CRC-32 as used by PNG (and zlib, and ethernet...)
const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
#[repr(transparent)]
pub struct ChunkID(pub [u8; 4]);
impl ChunkID {
    pub const IHDR: Self = ChunkID(*b"IHDR");
    pub const IDAT: Self = ChunkID(*b"IDAT");
    pub const IEND: Self = ChunkID(*b"IEND");
    /// Compressed text. Drawmore hides its document in one of these.
    pub const ZTXT: Self = ChunkID(*b"zTXt");
    pub fn id_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
    /// Ancillary chunks may be skipped by readers that don't understand them.
    #[must_use]
    pub fn is_ancillary(&self) -> bool {
        self.0[0].is_ascii_lowercase()
    }
}
impl std::fmt::Display for ChunkID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write as a string if possible, otherwise as a hex string.
        if let Some(str) = self.id_str() {
            f.write_str(str)
        } else {
            write!(f, "{:x?}", self.0)
        }
    }
}
impl std::ops::Deref for ChunkID {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Checksum of a chunk, over its id and data.
#[must_use]
pub fn checksum(id: ChunkID, data: &[u8]) -> u32 {
    let mut digest = CRC.digest();
    digest.update(&id.0);
    digest.update(data);
    digest.finalize()
}

/// A chunk borrowed from a PNG byte stream.
#[derive(Clone, Copy, Debug)]
pub struct Chunk<'a> {
    id: ChunkID,
    /// Byte offset of the length field of this chunk within the stream.
    offset: usize,
    data: &'a [u8],
    crc: u32,
}
impl<'a> Chunk<'a> {
    pub fn id(&self) -> ChunkID {
        self.id
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
    /// Size of the chunk including length, ID, and CRC sections
    pub fn self_len(&self) -> usize {
        self.data.len() + 12
    }
    /// Recompute the checksum and compare against the stored one.
    pub fn verify(&self) -> bool {
        checksum(self.id, self.data) == self.crc
    }
}

/// Iterator over the chunks of a PNG, in file order. Does not verify checksums.
///
/// Yields an error and then ends if a chunk runs past the end of the data.
pub struct Chunks<'a> {
    bytes: &'a [u8],
    cursor: usize,
    failed: bool,
}
impl<'a> Chunks<'a> {
    /// # Errors
    /// [`DecodeError::NotAPicture`] if the PNG signature is missing.
    pub fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if !bytes.starts_with(&SIGNATURE) {
            return Err(DecodeError::NotAPicture);
        }
        Ok(Self {
            bytes,
            cursor: SIGNATURE.len(),
            failed: false,
        })
    }
    fn read_u32(&self, at: usize) -> Option<u32> {
        let word = self.bytes.get(at..at.checked_add(4)?)?;
        Some(u32::from_be_bytes(word.try_into().ok()?))
    }
    fn next_chunk(&self) -> Option<Chunk<'a>> {
        let offset = self.cursor;
        let len: usize = self.read_u32(offset)?.checked_as()?;
        let id = self.bytes.get(offset + 4..offset + 8)?;
        let data_start = offset + 8;
        let data_end = data_start.checked_add(len)?;
        let data = self.bytes.get(data_start..data_end)?;
        let crc = self.read_u32(data_end)?;
        Some(Chunk {
            id: ChunkID(id.try_into().ok()?),
            offset,
            data,
            crc,
        })
    }
}
impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, DecodeError>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.bytes.len() {
            return None;
        }
        if let Some(chunk) = self.next_chunk() {
            self.cursor += chunk.self_len();
            Some(Ok(chunk))
        } else {
            log::debug!("chunk at {} runs past the end of the stream", self.cursor);
            self.failed = true;
            Some(Err(DecodeError::CorruptPicture))
        }
    }
}

/// Append a complete chunk, with checksum, onto `out`.
/// # Errors
/// If `data` is too long to be described by a chunk.
pub fn write_chunk(
    out: &mut Vec<u8>,
    id: ChunkID,
    data: &[u8],
) -> Result<(), crate::io::EncodeError> {
    let len: u32 = data
        .len()
        .checked_as()
        // PNG further limits lengths to 2^31-1
        .filter(|len| *len <= i32::MAX as u32)
        .ok_or(crate::io::EncodeError::TooLong)?;
    out.reserve(data.len() + 12);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&id.0);
    out.extend_from_slice(data);
    out.extend_from_slice(&checksum(id, data).to_be_bytes());
    Ok(())
}
