//! Thin adapter over zlib, used for the whole-container wrapper and the picture metadata chunk.

use std::io::{Read, Write};

/// Refuse to inflate past this many bytes. A document this large is not a document.
pub const MAX_INFLATED_LEN: u64 = 1 << 30;

/// zlib-compress `bytes` at the given level (0-9, clamped).
/// # Errors
/// Never for a `Vec`, but the encoder is fallible in general and is reported as such.
pub fn compress(bytes: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    compress_into(Vec::with_capacity(bytes.len() / 2), bytes, level)
}

/// [`compress`] into any writer, handing it back once the stream is finished.
/// # Errors
/// Any error from `writer`.
pub fn compress_into<W: Write>(writer: W, bytes: &[u8], level: u32) -> std::io::Result<W> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(writer, flate2::Compression::new(level.min(9)));
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Inflate a zlib stream.
/// # Errors
/// If the stream is corrupt, or inflates past [`MAX_INFLATED_LEN`].
pub fn decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut decoder = flate2::read::ZlibDecoder::new(bytes).take(MAX_INFLATED_LEN + 1);
    decoder.read_to_end(&mut decoded)?;
    if decoded.len() as u64 > MAX_INFLATED_LEN {
        return Err(std::io::Error::other("inflated data exceeds size limit"));
    }
    log::trace!("inflated {} bytes into {}", bytes.len(), decoded.len());
    Ok(decoded)
}

/// Whether `bytes` begins with a plausible zlib header (RFC 1950 §2.2).
#[must_use]
pub fn is_zlib(bytes: &[u8]) -> bool {
    let [cmf, flg, ..] = *bytes else {
        return false;
    };
    // Deflate with at most a 32K window, no preset dictionary.
    (cmf & 0x0F) == 8
        && (cmf >> 4) <= 7
        && (flg & 0x20) == 0
        && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn inflates_what_it_deflates() {
        let data = b"drawmore drawmore drawmore drawmore".repeat(20);
        let packed = compress(&data, 6).unwrap();
        assert!(packed.len() < data.len());
        assert!(is_zlib(&packed));
        assert_eq!(decompress(&packed).unwrap(), data);
    }
    #[test]
    fn writer_failures_surface() {
        let data = b"drawmore".repeat(1000);
        // Room for the header and not much else.
        let mut small = [0_u8; 4];
        let err = compress_into(&mut small[..], &data, 0).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WriteZero);

        let mut roomy = vec![0_u8; data.len() * 2];
        let free = compress_into(&mut roomy[..], &data, 0).unwrap().len();
        let written = roomy.len() - free;
        assert_eq!(decompress(&roomy[..written]).unwrap(), data);
    }
    #[test]
    fn rejects_garbage() {
        assert!(decompress(b"not zlib at all").is_err());
        assert!(!is_zlib(b"\x04\0\0\0"));
        assert!(!is_zlib(b"x"));
    }
}
