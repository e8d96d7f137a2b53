//! # Snapshot table
//!
//! A sequence of word-aligned records running to the end of the container:
//!
//! `{index: u32, payload_len: u32, [width: u32, height: u32, payload: [u8; payload_len - 8]]}`
//!
//! A `payload_len` of zero means the snapshot had no texture, and the dimensions are absent.
//! When the payload is not exactly `width * height * 4` bytes it is a nested picture instead of
//! raw RGBA8.

use super::common::{pad4, push_len, WordReader};
use super::raster::{ImageDecoder, ImageEncoder};
use super::{DecodeError, EncodeError};
use crate::document::{Snapshot, SnapshotState, Texture};

/// Only the baseline and the latest snapshot are worth keeping. Everything between can be
/// rebuilt by replaying the draw array from the baseline.
#[must_use]
pub fn truncate(snapshots: &[Snapshot]) -> Vec<&Snapshot> {
    match snapshots {
        [] => Vec::new(),
        [only] => vec![only],
        [first, .., last] => vec![first, last],
    }
}

/// Append the snapshot table for `snapshots` onto `out`, truncating as per [`truncate`].
///
/// With a `texture_encoder`, textures are stored as nested pictures.
/// # Errors
/// If a texture fails to encode or is too large to describe.
pub fn encode(
    snapshots: &[Snapshot],
    texture_encoder: Option<&dyn ImageEncoder>,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    for snapshot in truncate(snapshots) {
        out.extend_from_slice(&snapshot.index.to_le_bytes());
        let Some(texture) = &snapshot.state.texture else {
            out.extend_from_slice(&0u32.to_le_bytes());
            continue;
        };

        let encoded = texture_encoder
            .map(|encoder| encoder.encode(texture))
            .transpose()?
            // A nested picture exactly the size of the raw pixels would be read back as raw.
            .filter(|encoded| encoded.len() != texture.pixels().len());
        let payload = encoded.as_deref().unwrap_or(texture.pixels());

        let payload_len = payload.len().checked_add(8).ok_or(EncodeError::TooLong)?;
        push_len(out, payload_len).ok_or(EncodeError::TooLong)?;
        out.extend_from_slice(&texture.width().to_le_bytes());
        out.extend_from_slice(&texture.height().to_le_bytes());
        out.extend_from_slice(payload);
        pad4(out);
    }
    Ok(())
}

enum Pixels<'a> {
    Raw(&'a [u8]),
    Nested(&'a [u8]),
}
struct Record<'a> {
    index: u32,
    texture: Option<(u32, u32, Pixels<'a>)>,
}

fn read_record<'a>(reader: &mut WordReader<'a>) -> Option<Record<'a>> {
    let index = reader.u32()?;
    let payload_len = reader.u32()? as usize;
    if payload_len == 0 {
        return Some(Record {
            index,
            texture: None,
        });
    }
    // Must at least hold the dimensions.
    let pixels_len = payload_len.checked_sub(8)?;
    let width = reader.u32()?;
    let height = reader.u32()?;
    let payload = reader.take(pixels_len)?;
    reader.align()?;

    let pixels = if Texture::byte_len(width, height) == Some(pixels_len) {
        Pixels::Raw(payload)
    } else {
        Pixels::Nested(payload)
    };
    Some(Record {
        index,
        texture: Some((width, height, pixels)),
    })
}

/// Read a snapshot table spanning all of `table`.
///
/// Every nested picture is decoded concurrently, and the table is only done once all of them
/// are. The first failure fails the whole table.
/// # Errors
/// [`DecodeError::CorruptSnapshot`] if the table is malformed, or the error of a failed nested
/// decode.
pub async fn decode(
    table: &[u8],
    decoder: &dyn ImageDecoder,
) -> Result<Vec<Snapshot>, DecodeError> {
    let mut reader = WordReader::new(table);
    let mut records = Vec::with_capacity(2);
    while !reader.is_empty() {
        let Some(record) = read_record(&mut reader) else {
            log::debug!(
                "snapshot record at {} overruns the table ({} bytes)",
                reader.position(),
                table.len()
            );
            return Err(DecodeError::CorruptSnapshot);
        };
        records.push(record);
    }
    if records.first().map(|record| record.index) != Some(0) {
        return Err(DecodeError::CorruptSnapshot);
    }

    let nested: Vec<_> = records
        .iter()
        .filter_map(|record| match &record.texture {
            Some((_, _, Pixels::Nested(bytes))) => Some(decoder.decode(bytes)),
            _ => None,
        })
        .collect();
    if !nested.is_empty() {
        log::trace!("decoding {} nested snapshot pictures", nested.len());
    }
    let mut nested = futures_util::future::try_join_all(nested).await?.into_iter();

    records
        .into_iter()
        .map(|record| {
            let texture = match record.texture {
                None => None,
                Some((width, height, Pixels::Raw(pixels))) => Some(
                    Texture::new(width, height, pixels.to_vec())
                        .map_err(|_| DecodeError::CorruptSnapshot)?,
                ),
                Some((width, height, Pixels::Nested(_))) => {
                    let texture = nested.next().ok_or(DecodeError::CorruptSnapshot)?;
                    if texture.width() != width || texture.height() != height {
                        log::debug!(
                            "nested snapshot picture is {}x{}, header says {width}x{height}",
                            texture.width(),
                            texture.height()
                        );
                        return Err(DecodeError::CorruptSnapshot);
                    }
                    Some(texture)
                }
            };
            Ok(Snapshot {
                index: record.index,
                state: SnapshotState {
                    texture,
                    ..SnapshotState::default()
                },
            })
        })
        .collect()
}
