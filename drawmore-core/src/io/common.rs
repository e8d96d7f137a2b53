//! Little-endian word helpers shared by the binary container and the snapshot table.
//! Everything in those is laid out in 4-byte words, and every section starts word-aligned.

use az::CheckedAs;

/// Round `len` up to the next multiple of four.
#[must_use]
pub fn align4(len: usize) -> Option<usize> {
    len.checked_add(3).map(|len| len & !3)
}

/// Zero-pad `buf` out to a multiple of four bytes.
pub fn pad4(buf: &mut Vec<u8>) {
    let padded = buf.len().next_multiple_of(4);
    buf.resize(padded, 0);
}

/// Append a length or count as a little-endian u32, or `None` if it does not fit.
pub fn push_len(buf: &mut Vec<u8>, value: usize) -> Option<()> {
    let value: u32 = value.checked_as()?;
    buf.extend_from_slice(&value.to_le_bytes());
    Some(())
}

/// A bounds-checked cursor over a byte slice, reading little-endian words.
///
/// Reads past the end return `None` and leave the cursor where it was.
pub struct WordReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}
impl<'a> WordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }
    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
    pub fn u32(&mut self) -> Option<u32> {
        let word = self.take(4)?;
        Some(u32::from_le_bytes(word.try_into().ok()?))
    }
    /// Borrow the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.cursor.checked_add(len)?;
        let slice = self.bytes.get(self.cursor..end)?;
        self.cursor = end;
        Some(slice)
    }
    /// Skip up to the next word boundary. Fails if the padding itself is cut off.
    pub fn align(&mut self) -> Option<()> {
        let aligned = align4(self.cursor)?;
        if aligned > self.bytes.len() {
            return None;
        }
        self.cursor = aligned;
        Some(())
    }
}
