//! # Picture-embedded documents
//!
//! An ordinary PNG of the latest snapshot, viewable anywhere, with the whole document riding
//! along in a `zTXt` chunk just before `IEND`. The chunk body is [`MAGIC`] followed by the
//! zlib-compressed JSON [`Manifest`]. Since the picture itself *is* the latest texture, the
//! manifest only records texture sizes, never their pixels.
//!
//! Since `MAGIC` is the keyword `Drawmore`, a null, and compression method zero, the chunk is a
//! well-formed `zTXt` to any other reader.

pub mod chunk;

use super::raster::{ImageDecoder, ImageEncoder};
use super::{compress, delta, snapshots, DecodeError, EncodeError};
use crate::document::{Document, Snapshot, SnapshotState, Texture};
use chunk::{ChunkID, Chunks};
use serde_json::{Map, Value};

/// Prefix of the chunk body that marks it as ours.
pub const MAGIC: &[u8; 10] = b"Drawmore\0\0";
/// Version of the manifest schema. Unrelated to the container [`super::Version`].
pub const SCHEMA_VERSION: u32 = 6;

/// Key of the texture sub-state within a snapshot's state.
const TEXTURE_KEY: &str = "texture";

#[derive(serde::Serialize, serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    version: u32,
    /// Delta packed, see [`delta::pack`].
    draw_array: Value,
    draw_end_index: u32,
    snapshots: Vec<ManifestSnapshot>,
}
#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct ManifestSnapshot {
    index: u32,
    #[serde(default)]
    state: Map<String, Value>,
}
impl ManifestSnapshot {
    fn new(snapshot: &Snapshot) -> Self {
        let mut state = snapshot.state.extra.clone();
        // Pixels or not, the manifest only ever records the size.
        if let Some((width, height)) = snapshot.state.texture_size() {
            state.insert(
                TEXTURE_KEY.to_owned(),
                serde_json::json!({
                    "width": width,
                    "height": height,
                    "data": 0,
                }),
            );
        }
        Self {
            index: snapshot.index,
            state,
        }
    }
    /// Recorded `(width, height)` of the elided texture, if there was one.
    fn texture_size(&self) -> Option<(u32, u32)> {
        let texture = self.state.get(TEXTURE_KEY)?;
        let dimension = |key: &str| u32::try_from(texture.get(key)?.as_u64()?).ok();
        Some((dimension("width")?, dimension("height")?))
    }
    /// Texture pixels were never stored, so only their size and the rest of the state survive.
    fn into_snapshot(mut self) -> Snapshot {
        let elided_texture = self.texture_size();
        self.state.remove(TEXTURE_KEY);
        Snapshot {
            index: self.index,
            state: SnapshotState {
                texture: None,
                elided_texture,
                extra: self.state,
            },
        }
    }
}

/// Insert a chunk right before the `IEND` of `host`.
fn insert_before_end(host: &[u8], id: ChunkID, data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let end = Chunks::new(host)
        .map_err(|_| EncodeError::MalformedHost)?
        .map_while(Result::ok)
        .find(|chunk| chunk.id() == ChunkID::IEND)
        .ok_or(EncodeError::MalformedHost)?
        .offset();

    let mut out = Vec::with_capacity(host.len() + data.len() + 12);
    out.extend_from_slice(&host[..end]);
    chunk::write_chunk(&mut out, id, data)?;
    out.extend_from_slice(&host[end..]);
    Ok(out)
}

/// Render the document as a PNG of its latest snapshot, with the document embedded.
///
/// Like the container, only the baseline and latest snapshots are kept.
/// # Errors
/// * [`EncodeError::MissingThumbnail`] if the latest snapshot has no texture to show.
/// * If the document is malformed, or the picture fails to encode.
pub fn embed(
    document: &Document,
    encoder: &dyn ImageEncoder,
    compression_level: u32,
) -> Result<Vec<u8>, EncodeError> {
    document.validate()?;
    let kept = snapshots::truncate(&document.snapshots);
    let thumbnail = kept
        .last()
        .and_then(|latest| latest.state.texture.as_ref())
        .ok_or(EncodeError::MissingThumbnail)?;
    // The picture is the latest texture upside down, so row 0 lands at the bottom.
    let host = encoder.encode(&thumbnail.flipped_vertically())?;

    let manifest = Manifest {
        version: SCHEMA_VERSION,
        draw_array: delta::pack(&document.draw_array),
        draw_end_index: document.draw_end_index,
        snapshots: kept.into_iter().map(ManifestSnapshot::new).collect(),
    };
    let json = serde_json::to_vec(&manifest)?;
    let mut body = MAGIC.to_vec();
    body.extend_from_slice(
        &compress::compress(&json, compression_level).map_err(EncodeError::Compress)?,
    );

    let out = insert_before_end(&host, ChunkID::ZTXT, &body)?;
    log::debug!(
        "embedded {} byte manifest ({} compressed) into {}x{} picture",
        json.len(),
        body.len() - MAGIC.len(),
        thumbnail.width(),
        thumbnail.height(),
    );
    Ok(out)
}

/// Find our chunk's body, stopping at `IEND`.
fn find_body(bytes: &[u8]) -> Result<Option<&[u8]>, DecodeError> {
    for chunk in Chunks::new(bytes)? {
        let chunk = chunk?;
        match chunk.id() {
            ChunkID::IEND => break,
            ChunkID::ZTXT if chunk.data().starts_with(MAGIC) => {
                if !chunk.verify() {
                    return Err(DecodeError::ChecksumMismatch(chunk.id()));
                }
                return Ok(Some(&chunk.data()[MAGIC.len()..]));
            }
            _ => (),
        }
    }
    Ok(None)
}

fn read_manifest(json: &[u8], image: Texture) -> Result<Document, DecodeError> {
    let value: Value = serde_json::from_slice(json).map_err(DecodeError::Manifest)?;
    // Check the version before the shape, a different schema is expected to have a different
    // shape. A missing version is left for the shape check to report.
    match value.get("version").and_then(Value::as_u64) {
        Some(version) if version != u64::from(SCHEMA_VERSION) => {
            return Err(DecodeError::UnknownVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
        _ => (),
    }
    let manifest: Manifest = serde_json::from_value(value).map_err(DecodeError::Manifest)?;

    let draw_array = super::finish_draw_array(manifest.draw_array, true)?;
    super::check_end_index(manifest.draw_end_index, draw_array.len())?;

    let mut snapshots: Vec<_> = manifest
        .snapshots
        .into_iter()
        .map(ManifestSnapshot::into_snapshot)
        .collect();
    let latest = snapshots.last_mut().ok_or(DecodeError::CorruptSnapshot)?;
    let actual_size = (image.width(), image.height());
    if let Some(recorded) = latest.state.elided_texture.take() {
        if recorded != actual_size {
            log::warn!(
                "picture is {}x{}, but the manifest recorded {}x{}",
                actual_size.0,
                actual_size.1,
                recorded.0,
                recorded.1
            );
        }
    }
    latest.state.texture = Some(image);

    let document = Document {
        draw_array,
        snapshots,
        draw_end_index: manifest.draw_end_index,
    };
    document.validate().map_err(|err| {
        log::debug!("embedded document is invalid: {err}");
        DecodeError::CorruptSnapshot
    })?;
    Ok(document)
}

/// Read a document out of a picture.
///
/// A picture carrying no document still makes a valid, empty one, with the picture as its
/// baseline.
/// # Errors
/// * [`DecodeError::NotAPicture`] if `bytes` is not a PNG.
/// * [`DecodeError::ChecksumMismatch`] if the embedded chunk is damaged.
/// * If the picture fails to decode, or the embedded document is malformed.
pub async fn extract(bytes: &[u8], decoder: &dyn ImageDecoder) -> Result<Document, DecodeError> {
    let body = find_body(bytes)?;
    let image = decoder.decode(bytes).await?.flipped_vertically();

    let Some(body) = body else {
        log::warn!("picture carries no document, starting one from it");
        return Ok(Document {
            draw_array: Vec::new(),
            snapshots: vec![Snapshot::with_texture(0, image)],
            draw_end_index: 0,
        });
    };
    let json = compress::decompress(body).map_err(DecodeError::Decompress)?;
    log::trace!("manifest inflated to {} bytes", json.len());
    read_manifest(&json, image)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::raster::{decode_png, PngCodec};
    use crate::io::test::{document, scattered_strokes, texture};
    use serde_json::json;

    fn embed_default(document: &Document) -> Vec<u8> {
        embed(document, &PngCodec::default(), 6).unwrap()
    }
    /// A picture of `host` carrying an arbitrary manifest.
    fn with_manifest(host: &Texture, manifest: &Value) -> Vec<u8> {
        let picture = PngCodec::default().encode(host).unwrap();
        let mut body = MAGIC.to_vec();
        body.extend(compress::compress(manifest.to_string().as_bytes(), 6).unwrap());
        insert_before_end(&picture, ChunkID::ZTXT, &body).unwrap()
    }
    fn our_chunk(picture: &[u8]) -> chunk::Chunk<'_> {
        Chunks::new(picture)
            .unwrap()
            .map(Result::unwrap)
            .find(|chunk| chunk.id() == ChunkID::ZTXT)
            .unwrap()
    }

    #[test]
    fn is_a_plain_png() {
        let doc = document();
        let picture = embed_default(&doc);
        let latest = doc.snapshots[1].state.texture.as_ref().unwrap();
        // Any reader sees the latest snapshot, right side up.
        assert_eq!(decode_png(&picture).unwrap(), latest.flipped_vertically());

        let chunks: Vec<_> = Chunks::new(&picture)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(chunks.iter().all(chunk::Chunk::verify));
        let [.., ours, end] = chunks.as_slice() else {
            panic!("too few chunks")
        };
        assert_eq!(ours.id(), ChunkID::ZTXT);
        assert!(ours.id().is_ancillary());
        assert!(ours.data().starts_with(MAGIC));
        assert_eq!(end.id(), ChunkID::IEND);
        assert_eq!(end.offset() + end.self_len(), picture.len());
    }
    #[test]
    fn manifest_contents() {
        let picture = embed_default(&document());
        let body = &our_chunk(&picture).data()[MAGIC.len()..];
        let manifest: Value =
            serde_json::from_slice(&compress::decompress(body).unwrap()).unwrap();
        assert_eq!(manifest["version"], 6);
        assert_eq!(manifest["drawEndIndex"], 3);
        assert_eq!(manifest["drawArray"], delta::pack(&document().draw_array));
        assert_eq!(
            manifest["snapshots"],
            json!([
                {"index": 0, "state": {"texture": {"width": 4, "height": 3, "data": 0}}},
                {"index": 3, "state": {"texture": {"width": 4, "height": 3, "data": 0}}},
            ])
        );
    }
    #[tokio::test]
    async fn extract_round_trip() {
        let mut doc = document();
        doc.snapshots[1]
            .state
            .extra
            .insert("layers".to_owned(), json!([{"name": "ink", "opacity": 0.5}]));
        let extracted = extract(&embed_default(&doc), &PngCodec::default())
            .await
            .unwrap();

        assert_eq!(extracted.draw_array, doc.draw_array);
        assert_eq!(extracted.draw_end_index, doc.draw_end_index);
        assert_eq!(extracted.snapshots.len(), 2);
        // Baseline pixels are not stored anywhere in a picture, only their size.
        let baseline = &extracted.snapshots[0];
        assert_eq!(baseline.index, 0);
        assert_eq!(baseline.state.texture, None);
        assert_eq!(baseline.state.elided_texture, Some((4, 3)));
        assert_eq!(baseline.state.texture_size(), Some((4, 3)));
        assert!(baseline.state.extra.is_empty());
        assert_eq!(extracted.snapshots[1], doc.snapshots[1]);

        // Re-embedding a read picture keeps the baseline's recorded size.
        let again = extract(&embed_default(&extracted), &PngCodec::default())
            .await
            .unwrap();
        assert_eq!(again, extracted);
    }
    #[tokio::test]
    async fn floats_survive_exactly() {
        let doc = scattered_strokes(20_000);
        let extracted = extract(&embed_default(&doc), &PngCodec::default())
            .await
            .unwrap();
        let mismatch = doc
            .draw_array
            .iter()
            .zip(&extracted.draw_array)
            .position(|(a, b)| a != b);
        assert_eq!(mismatch, None);
        assert_eq!(extracted.draw_array.len(), doc.draw_array.len());
    }
    #[tokio::test]
    async fn plain_png_becomes_a_new_document() {
        let image = texture(3, 2, 5);
        let picture = PngCodec::default().encode(&image).unwrap();
        let doc = extract(&picture, &PngCodec::default()).await.unwrap();
        assert!(doc.draw_array.is_empty());
        assert_eq!(doc.draw_end_index, 0);
        assert_eq!(
            doc.snapshots,
            [Snapshot::with_texture(0, image.flipped_vertically())]
        );
    }
    #[tokio::test]
    async fn foreign_text_is_ignored() {
        let image = texture(2, 2, 1);
        let picture = PngCodec::default().encode(&image).unwrap();
        let mut comment = b"Comment\0\0".to_vec();
        comment.extend(compress::compress(b"hello", 6).unwrap());
        let picture = insert_before_end(&picture, ChunkID::ZTXT, &comment).unwrap();
        let doc = extract(&picture, &PngCodec::default()).await.unwrap();
        assert!(doc.draw_array.is_empty());
    }
    #[tokio::test]
    async fn not_a_picture() {
        let container =
            crate::io::container::encode(&document(), crate::io::Version::V4, None).unwrap();
        assert!(matches!(
            extract(&container, &PngCodec::default()).await,
            Err(DecodeError::NotAPicture)
        ));
    }
    #[tokio::test]
    async fn damaged_chunk() {
        let mut picture = embed_default(&document());
        let at = our_chunk(&picture).offset() + 8 + MAGIC.len() + 4;
        picture[at] ^= 0x10;
        assert!(matches!(
            extract(&picture, &PngCodec::default()).await,
            Err(DecodeError::ChecksumMismatch(ChunkID::ZTXT))
        ));
    }
    #[tokio::test]
    async fn unknown_schema() {
        let manifest = json!({"version": 5, "draw": []});
        let picture = with_manifest(&texture(1, 1, 0), &manifest);
        assert!(matches!(
            extract(&picture, &PngCodec::default()).await,
            Err(DecodeError::UnknownVersion(5))
        ));

        let manifest = json!({"drawArray": [], "drawEndIndex": 0, "snapshots": []});
        let picture = with_manifest(&texture(1, 1, 0), &manifest);
        assert!(matches!(
            extract(&picture, &PngCodec::default()).await,
            Err(DecodeError::Manifest(_))
        ));
    }
    #[tokio::test]
    async fn corrupt_manifests() {
        let codec = PngCodec::default();
        let host = texture(1, 1, 0);
        let cases = [
            json!({"version": 6, "drawArray": [], "drawEndIndex": 2, "snapshots": [{"index": 0}]}),
            json!({"version": 6, "drawArray": null, "drawEndIndex": 0, "snapshots": [{"index": 0}]}),
            json!({"version": 6, "drawArray": [], "drawEndIndex": 0, "snapshots": []}),
            json!({"version": 6, "drawArray": [], "drawEndIndex": 0, "snapshots": [{"index": 1}]}),
        ];
        let mut results = Vec::new();
        for manifest in &cases {
            let picture = with_manifest(&host, manifest);
            results.push(extract(&picture, &codec).await);
        }
        assert!(matches!(
            results[0],
            Err(DecodeError::CorruptIndex { index: 2, len: 0 })
        ));
        assert!(matches!(results[1], Err(DecodeError::CorruptDrawArray)));
        assert!(matches!(results[2], Err(DecodeError::CorruptSnapshot)));
        assert!(matches!(results[3], Err(DecodeError::CorruptSnapshot)));
    }
    #[test]
    fn needs_a_thumbnail() {
        let mut doc = document();
        doc.snapshots[1].state.texture = None;
        assert!(matches!(
            embed(&doc, &PngCodec::default(), 6),
            Err(EncodeError::MissingThumbnail)
        ));
    }
    #[test]
    fn needs_a_png_host() {
        struct NotPng;
        impl ImageEncoder for NotPng {
            fn encode(&self, _: &Texture) -> Result<Vec<u8>, crate::io::raster::ImageError> {
                Ok(b"GIF89a".to_vec())
            }
        }
        assert!(matches!(
            embed(&document(), &NotPng, 6),
            Err(EncodeError::MalformedHost)
        ));
    }
}
