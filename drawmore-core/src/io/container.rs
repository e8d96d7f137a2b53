//! # Binary container
//!
//! All integers are little-endian u32 words, and every section starts on a word boundary.
//!
//! | offset | contents |
//! |--------|----------|
//! | 0 | version, 3 or 4 |
//! | 4 | `data_len`, length in bytes of the draw array text |
//! | 8 | draw end index |
//! | 12 | draw array JSON, one byte per character, zero-padded to a word |
//! | ... | snapshot table, see [`super::snapshots`] |
//!
//! Version 4 delta-packs the draw array before writing it, version 3 writes it as-is.

use super::common::{pad4, push_len, WordReader};
use super::raster::{ImageDecoder, ImageEncoder};
use super::{delta, snapshots, DecodeError, EncodeError, Version};
use crate::document::Document;

const HEADER_LEN: usize = 12;

/// Text is stored a byte per character, so only U+0000 - U+00FF survive.
fn latin1_bytes(text: &str) -> Result<Vec<u8>, EncodeError> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| EncodeError::UnrepresentableText(c)))
        .collect()
}
fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Encode a document into a binary container.
///
/// Snapshots past the baseline and the latest are dropped, see [`snapshots::truncate`].
/// Textures are stored raw unless a `texture_encoder` is given.
/// # Errors
/// If the document is malformed, the draw array contains text outside of Latin-1, or a
/// section is too long to describe.
pub fn encode(
    document: &Document,
    version: Version,
    texture_encoder: Option<&dyn ImageEncoder>,
) -> Result<Vec<u8>, EncodeError> {
    document.validate()?;

    let text = if version.packs_deltas() {
        serde_json::to_string(&delta::pack(&document.draw_array))?
    } else {
        serde_json::to_string(&document.draw_array)?
    };
    let text = latin1_bytes(&text)?;

    let mut out = Vec::with_capacity(HEADER_LEN + text.len() + 8);
    out.extend_from_slice(&u32::from(version).to_le_bytes());
    push_len(&mut out, text.len()).ok_or(EncodeError::TooLong)?;
    out.extend_from_slice(&document.draw_end_index.to_le_bytes());
    out.extend_from_slice(&text);
    pad4(&mut out);
    let table_start = out.len();

    snapshots::encode(&document.snapshots, texture_encoder, &mut out)?;

    log::debug!(
        "container {version:?}: {} commands in {} bytes, snapshot table {} bytes",
        document.draw_array.len(),
        text.len(),
        out.len() - table_start,
    );
    Ok(out)
}

/// Decode a binary container.
/// # Errors
/// On any structural problem, or if a nested picture fails to decode.
pub async fn decode(bytes: &[u8], decoder: &dyn ImageDecoder) -> Result<Document, DecodeError> {
    let mut reader = WordReader::new(bytes);
    let version = reader.u32().ok_or(DecodeError::Truncated)?;
    let version = Version::try_from(version)?;
    let data_len = reader.u32().ok_or(DecodeError::Truncated)?;
    let draw_end_index = reader.u32().ok_or(DecodeError::Truncated)?;
    let text = reader
        .take(data_len as usize)
        .ok_or(DecodeError::Truncated)?;
    reader.align().ok_or(DecodeError::Truncated)?;

    let value: serde_json::Value =
        serde_json::from_str(&latin1_string(text)).map_err(|err| {
            log::debug!("draw array text is not JSON: {err}");
            DecodeError::CorruptDrawArray
        })?;
    let draw_array = super::finish_draw_array(value, version.packs_deltas())?;
    super::check_end_index(draw_end_index, draw_array.len())?;

    let snapshots = snapshots::decode(&bytes[reader.position()..], decoder).await?;

    Ok(Document {
        draw_array,
        snapshots,
        draw_end_index,
    })
}
