//! # Raster codec seam
//!
//! The container never rasterizes anything itself, it only needs to turn a [`Texture`] into a
//! standalone picture and back. Decoding is async, as the image may be handed off elsewhere to
//! be decoded and there's no promise when it comes back.

use crate::document::{Texture, TextureError};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error("image task failed: {0}")]
    Task(String),
}

/// Encodes a texture as a standalone picture.
pub trait ImageEncoder {
    /// # Errors
    /// Implementation defined.
    fn encode(&self, texture: &Texture) -> Result<Vec<u8>, ImageError>;
}

/// Decodes a standalone picture into RGBA8, top row first.
#[async_trait::async_trait]
pub trait ImageDecoder: Send + Sync {
    /// # Errors
    /// Implementation defined. Failures are reported to the caller verbatim.
    async fn decode(&self, bytes: &[u8]) -> Result<Texture, ImageError>;
}

/// PNG implementation of both halves of the seam.
#[derive(Clone, Copy, Debug)]
pub struct PngCodec {
    compression: CompressionType,
}
impl Default for PngCodec {
    fn default() -> Self {
        Self {
            compression: CompressionType::Default,
        }
    }
}
impl PngCodec {
    /// Choose a compression effort from a zlib-style level, 0-9.
    #[must_use]
    pub fn with_level(level: u32) -> Self {
        let compression = match level {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        };
        Self { compression }
    }
}
impl ImageEncoder for PngCodec {
    fn encode(&self, texture: &Texture) -> Result<Vec<u8>, ImageError> {
        let mut out = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut out, self.compression, FilterType::Adaptive);
        // Name clash with our own trait, call through the full path.
        image::ImageEncoder::write_image(
            encoder,
            texture.pixels(),
            texture.width(),
            texture.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}
#[async_trait::async_trait]
impl ImageDecoder for PngCodec {
    async fn decode(&self, bytes: &[u8]) -> Result<Texture, ImageError> {
        // Off to the blocking pool if there's a runtime to own it, otherwise just do it here.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let owned = bytes.to_vec();
                handle
                    .spawn_blocking(move || decode_png(&owned))
                    .await
                    .map_err(|join| ImageError::Task(join.to_string()))?
            }
            Err(_) => decode_png(bytes),
        }
    }
}

/// Synchronously decode a PNG of any color type or depth into RGBA8.
/// # Errors
/// On a malformed PNG.
pub fn decode_png(bytes: &[u8]) -> Result<Texture, ImageError> {
    let rgba = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.into_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Texture::new(width, height, rgba.into_raw())?)
}

#[cfg(test)]
mod test {
    use super::*;

    fn checker() -> Texture {
        #[rustfmt::skip]
        let pixels = vec![
            255, 0, 0, 255,    0, 255, 0, 128,
            0, 0, 255, 0,      10, 20, 30, 40,
            1, 2, 3, 4,        5, 6, 7, 8,
        ];
        Texture::new(2, 3, pixels).unwrap()
    }

    #[test]
    fn png_encode_decode_sync() {
        let tex = checker();
        let png = PngCodec::default().encode(&tex).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(decode_png(&png).unwrap(), tex);
    }
    #[tokio::test]
    async fn png_decode_on_runtime() {
        let tex = checker();
        let codec = PngCodec::with_level(9);
        let png = codec.encode(&tex).unwrap();
        assert_eq!(codec.decode(&png).await.unwrap(), tex);
    }
    #[test]
    fn png_decode_without_runtime() {
        // No runtime here, the codec must fall back to decoding inline.
        let tex = checker();
        let codec = PngCodec::default();
        let png = codec.encode(&tex).unwrap();
        let decoded = futures_util::FutureExt::now_or_never(codec.decode(&png))
            .expect("inline decode should be immediately ready")
            .unwrap();
        assert_eq!(decoded, tex);
    }
    fn png_of(
        pixels: &[u8],
        (width, height): (u32, u32),
        color: image::ExtendedColorType,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        image::ImageEncoder::write_image(PngEncoder::new(&mut out), pixels, width, height, color)
            .unwrap();
        out
    }
    #[test]
    fn expands_rgb_and_gray() {
        let rgb = png_of(&[1, 2, 3, 4, 5, 6], (2, 1), image::ExtendedColorType::Rgb8);
        assert_eq!(
            decode_png(&rgb).unwrap().pixels(),
            &[1, 2, 3, 255, 4, 5, 6, 255]
        );

        let gray = png_of(&[9, 100, 7, 200], (2, 1), image::ExtendedColorType::La8);
        assert_eq!(
            decode_png(&gray).unwrap().pixels(),
            &[9, 9, 9, 100, 7, 7, 7, 200]
        );

        let luma = png_of(&[0, 42, 255], (1, 3), image::ExtendedColorType::L8);
        let luma = decode_png(&luma).unwrap();
        assert_eq!((luma.width(), luma.height()), (1, 3));
        assert_eq!(
            luma.pixels(),
            &[0, 0, 0, 255, 42, 42, 42, 255, 255, 255, 255, 255]
        );
    }
    #[test]
    fn narrows_sixteen_bit() {
        // Samples are handed over native-endian, rounded to the nearest 8 bit value on decode.
        let samples: Vec<u8> = [0xABCD_u16, 0x1234, 0x0001, 0xFFFF]
            .iter()
            .flat_map(|sample| sample.to_ne_bytes())
            .collect();
        let wide = png_of(&samples, (1, 1), image::ExtendedColorType::Rgba16);
        assert_eq!(decode_png(&wide).unwrap().pixels(), &[0xAB, 0x12, 0x00, 0xFF]);
    }
    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_png(b"definitely not a png"),
            Err(ImageError::Image(_))
        ));
    }
}
