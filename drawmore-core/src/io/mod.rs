//! # IO
//!
//! Reading and writing drawmore documents. Three encodings exist on disk:
//! * The binary container, versions 3 and 4 ([`container`]).
//! * The same container wrapped in zlib ([`compress`]).
//! * A PNG of the latest snapshot that carries the document in a `zTXt` chunk ([`picture`]).
//!
//! [`decode`] sniffs which one it was handed, so callers never need to know.

pub mod common;
pub mod compress;
pub mod container;
pub mod delta;
pub mod picture;
pub mod raster;
pub mod snapshots;

use crate::document::{Document, DocumentError};
use picture::chunk::ChunkID;
use raster::{ImageDecoder, ImageEncoder, ImageError};
use serde_json::Value;

/// Binary container format version.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum Version {
    /// Draw array stored as-is.
    V3 = 3,
    /// Draw array delta-packed.
    V4 = 4,
}
impl Version {
    pub const CURRENT: Self = Self::V4;
    #[must_use]
    pub fn packs_deltas(self) -> bool {
        self >= Self::V4
    }
}
impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        u32::from(*self).cmp(&u32::from(*other))
    }
}
impl From<Version> for u32 {
    fn from(value: Version) -> Self {
        value as u32
    }
}
impl TryFrom<u32> for Version {
    type Error = DecodeError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::V3),
            4 => Ok(Self::V4),
            other => Err(DecodeError::UnknownVersion(other)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unknown format version {0}")]
    UnknownVersion(u32),
    #[error("data ends unexpectedly")]
    Truncated,
    #[error("draw array is missing or corrupt")]
    CorruptDrawArray,
    #[error("draw end index {index} is past the end of the draw array ({len})")]
    CorruptIndex { index: u32, len: usize },
    #[error("snapshot table is corrupt")]
    CorruptSnapshot,
    #[error("not a picture")]
    NotAPicture,
    #[error("unrecognized format")]
    UnrecognizedFormat,
    #[error("picture chunk stream is corrupt")]
    CorruptPicture,
    #[error("chunk {0} failed its checksum")]
    ChecksumMismatch(ChunkID),
    #[error("picture metadata is corrupt")]
    Manifest(#[source] serde_json::Error),
    #[error("failed to decompress")]
    Decompress(#[source] std::io::Error),
    #[error(transparent)]
    Image(#[from] ImageError),
}
impl From<delta::DeltaError> for DecodeError {
    fn from(value: delta::DeltaError) -> Self {
        log::debug!("delta unpacking failed: {value}");
        Self::CorruptDrawArray
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("character {0:?} cannot be stored as a single byte")]
    UnrepresentableText(char),
    #[error("section exceeds 4GiB")]
    TooLong,
    #[error("latest snapshot has no texture to use as the picture")]
    MissingThumbnail,
    #[error("host picture is not a well-formed PNG")]
    MalformedHost,
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("compression failed")]
    Compress(#[source] std::io::Error),
}

/// Knobs for the writers. Readers need none, everything they need is in the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// Store snapshot textures as nested PNGs rather than raw pixels.
    pub compress_textures: bool,
    /// zlib level, 0-9. Also picks the PNG compression effort.
    pub compression_level: u32,
}
impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            compress_textures: false,
            compression_level: 6,
        }
    }
}

/// What a byte stream turned out to be.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// A binary container. The version is checked by the container reader.
    Container,
    /// zlib wrapping a binary container.
    Compressed,
    /// PNG, possibly carrying a document.
    Picture,
}
impl Format {
    /// Peek at the start of `bytes` to decide how to read it.
    /// # Errors
    /// [`DecodeError::UnrecognizedFormat`] if it looks like none of them.
    pub fn sniff(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.starts_with(&picture::chunk::SIGNATURE[..4]) {
            return Ok(Self::Picture);
        }
        if compress::is_zlib(bytes) {
            return Ok(Self::Compressed);
        }
        match bytes.get(..4) {
            // Versions are small, leave the exact check to the container reader so it can
            // report which version it was.
            Some(word) if u32::from_le_bytes([word[0], word[1], word[2], word[3]]) < 256 => {
                Ok(Self::Container)
            }
            _ => Err(DecodeError::UnrecognizedFormat),
        }
    }
}

/// Which encoding to write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Container(Version),
    Compressed(Version),
    Picture,
}

/// Encode a document, using PNG for any pictures involved.
/// # Errors
/// If the document is malformed or something in it cannot be represented.
pub fn encode(
    document: &Document,
    target: Target,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, EncodeError> {
    let codec = raster::PngCodec::with_level(settings.compression_level);
    let texture_encoder = settings
        .compress_textures
        .then_some(&codec as &dyn ImageEncoder);
    let bytes = match target {
        Target::Container(version) => container::encode(document, version, texture_encoder)?,
        Target::Compressed(version) => {
            let container = container::encode(document, version, texture_encoder)?;
            compress::compress(&container, settings.compression_level)
                .map_err(EncodeError::Compress)?
        }
        Target::Picture => picture::embed(document, &codec, settings.compression_level)?,
    };
    log::debug!("encoded {target:?}, {} bytes", bytes.len());
    Ok(bytes)
}

/// Decode any of the supported encodings.
///
/// Nested pictures are decoded with `decoder`, all at once. If any of them fail, so does the
/// whole decode.
/// # Errors
/// See [`DecodeError`]. No partial document is ever returned.
pub async fn decode(bytes: &[u8], decoder: &dyn ImageDecoder) -> Result<Document, DecodeError> {
    let format = Format::sniff(bytes)?;
    log::trace!("decoding {} bytes as {format:?}", bytes.len());
    match format {
        Format::Container => container::decode(bytes, decoder).await,
        Format::Picture => picture::extract(bytes, decoder).await,
        Format::Compressed => {
            let inner = compress::decompress(bytes).map_err(DecodeError::Decompress)?;
            // Only one level of wrapping exists.
            match Format::sniff(&inner)? {
                Format::Container => container::decode(&inner, decoder).await,
                other => {
                    log::debug!("compressed payload is a {other:?}, refusing to unwrap again");
                    Err(DecodeError::UnrecognizedFormat)
                }
            }
        }
    }
}

/// Turn the parsed draw array text back into commands, rejecting anything absent or holey.
pub(crate) fn finish_draw_array(value: Value, packed: bool) -> Result<Vec<Value>, DecodeError> {
    let commands = match value {
        Value::Null => return Err(DecodeError::CorruptDrawArray),
        value if packed => delta::unpack(value)?,
        Value::Array(commands) => commands,
        _ => return Err(DecodeError::CorruptDrawArray),
    };
    if commands.iter().any(Value::is_null) {
        return Err(DecodeError::CorruptDrawArray);
    }
    Ok(commands)
}

pub(crate) fn check_end_index(index: u32, len: usize) -> Result<(), DecodeError> {
    if index as usize > len {
        Err(DecodeError::CorruptIndex { index, len })
    } else {
        Ok(())
    }
}
