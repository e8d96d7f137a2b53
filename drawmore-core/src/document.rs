//! # Document
//!
//! Plain value objects exchanged with the editor. The codec in [`crate::io`] only ever
//! reads and builds these, it never keeps them around between calls.

/// A single recorded drawing operation.
///
/// The schema belongs to the editor, the codec treats every command as an opaque JSON value.
pub type DrawCommand = serde_json::Value;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("expected {expected} bytes of RGBA8 pixels, got {got}")]
    SizeMismatch { expected: usize, got: usize },
    #[error("texture dimensions overflow")]
    TooLarge,
}

/// An RGBA8 raster, row-major with the top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}
impl Texture {
    /// Wrap a pixel buffer.
    /// # Errors
    /// If `pixels` is not exactly `width * height * 4` bytes long.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, TextureError> {
        let expected = Self::byte_len(width, height).ok_or(TextureError::TooLarge)?;
        if pixels.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                got: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
    /// Number of bytes an RGBA8 image of the given size takes, or None on overflow.
    #[must_use]
    pub fn byte_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
    #[must_use]
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
    /// A copy with the row order reversed, so row 0 becomes the bottom row.
    #[must_use]
    pub fn flipped_vertically(&self) -> Self {
        let stride = self.width as usize * 4;
        let mut pixels = Vec::with_capacity(self.pixels.len());
        // A zero-width image has no rows to speak of, and chunks_exact panics on zero.
        if stride != 0 {
            for row in self.pixels.chunks_exact(stride).rev() {
                pixels.extend_from_slice(row);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}
impl std::fmt::Debug for Texture {
    // Don't dump megabytes of pixels into the log.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &format_args!("[{} bytes]", self.pixels.len()))
            .finish()
    }
}

/// Named sub-states cached by a snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotState {
    /// The reserved `texture` sub-state.
    pub texture: Option<Texture>,
    /// `(width, height)` of a texture whose pixels were not stored, only its size.
    pub elided_texture: Option<(u32, u32)>,
    /// Every other sub-state, carried verbatim by formats that support it.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Cached state after the first `index` commands of the draw array were applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub index: u32,
    pub state: SnapshotState,
}
impl Snapshot {
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self {
            index,
            state: SnapshotState::default(),
        }
    }
    #[must_use]
    pub fn with_texture(index: u32, texture: Texture) -> Self {
        Self {
            index,
            state: SnapshotState {
                texture: Some(texture),
                ..SnapshotState::default()
            },
        }
    }
}
impl SnapshotState {
    /// Size of the texture, whether or not its pixels are present.
    #[must_use]
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.texture
            .as_ref()
            .map(|texture| (texture.width(), texture.height()))
            .or(self.elided_texture)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("draw end index {index} is past the end of the draw array ({len})")]
    EndIndexOutOfRange { index: u32, len: usize },
    #[error("document has no snapshots")]
    NoSnapshots,
    #[error("first snapshot is at index {0}, expected 0")]
    MissingBaseline(u32),
    #[error("snapshots are not in ascending order")]
    Unordered,
}

/// A drawing session: the log of commands and the raster caches along it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub draw_array: Vec<DrawCommand>,
    pub snapshots: Vec<Snapshot>,
    /// How many commands of `draw_array` are live. Those past it are redo history.
    pub draw_end_index: u32,
}
impl Document {
    /// Check the structural invariants the codec relies on.
    /// # Errors
    /// The first violated invariant.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.draw_end_index as usize > self.draw_array.len() {
            return Err(DocumentError::EndIndexOutOfRange {
                index: self.draw_end_index,
                len: self.draw_array.len(),
            });
        }
        let first = self.snapshots.first().ok_or(DocumentError::NoSnapshots)?;
        if first.index != 0 {
            return Err(DocumentError::MissingBaseline(first.index));
        }
        if self.snapshots.windows(2).any(|w| w[0].index > w[1].index) {
            return Err(DocumentError::Unordered);
        }
        Ok(())
    }
    /// The most recent snapshot, if any.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}
