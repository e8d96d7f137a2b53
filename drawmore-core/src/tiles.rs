//! # Tiles
//!
//! Sparse storage for layers that are painted in fixed-size square tiles. Only tiles that were
//! ever touched exist.

use crate::brush::Rect;
use std::num::NonZeroU32;

pub const DEFAULT_TILE_SIZE: NonZeroU32 = match NonZeroU32::new(64) {
    Some(size) => size,
    None => unreachable!(),
};

/// Tile coordinates packed into one integer. Both halves are the full signed range, so
/// there's no limit on how far from the origin one may paint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TileKey(u64);
impl TileKey {
    #[must_use]
    pub fn new(tx: i32, ty: i32) -> Self {
        // Through u32 so the sign doesn't extend into the other half.
        Self((u64::from(tx as u32) << 32) | u64::from(ty as u32))
    }
    #[must_use]
    pub fn x(self) -> i32 {
        (self.0 >> 32) as u32 as i32
    }
    #[must_use]
    pub fn y(self) -> i32 {
        self.0 as u32 as i32
    }
    #[must_use]
    pub fn packed(self) -> u64 {
        self.0
    }
    /// The tile containing a point.
    #[must_use]
    pub fn containing(x: f32, y: f32, tile_size: NonZeroU32) -> Self {
        let size = tile_size.get() as f32;
        // Float to int casts saturate, so far-off points land on the edge tiles.
        Self::new((x / size).floor() as i32, (y / size).floor() as i32)
    }
    /// Canvas position of the tile's top-left corner.
    #[must_use]
    pub fn origin(self, tile_size: NonZeroU32) -> (i64, i64) {
        let size = i64::from(tile_size.get());
        (i64::from(self.x()) * size, i64::from(self.y()) * size)
    }
}
impl std::fmt::Debug for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TileKey({}, {})", self.x(), self.y())
    }
}

/// Tiles by key, remembering the order they were first inserted in.
///
/// Iteration follows that order, so compositing is deterministic.
#[derive(Clone, Debug)]
pub struct TileMap<T> {
    tile_size: NonZeroU32,
    tiles: hashbrown::HashMap<TileKey, T>,
    order: Vec<TileKey>,
}
impl<T> Default for TileMap<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}
impl<T> TileMap<T> {
    #[must_use]
    pub fn new(tile_size: NonZeroU32) -> Self {
        Self {
            tile_size,
            tiles: hashbrown::HashMap::new(),
            order: Vec::new(),
        }
    }
    #[must_use]
    pub fn tile_size(&self) -> NonZeroU32 {
        self.tile_size
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
    #[must_use]
    pub fn get(&self, key: TileKey) -> Option<&T> {
        self.tiles.get(&key)
    }
    pub fn get_mut(&mut self, key: TileKey) -> Option<&mut T> {
        self.tiles.get_mut(&key)
    }
    /// Insert or replace a tile, returning the old one. Replacing keeps the original position.
    pub fn insert(&mut self, key: TileKey, tile: T) -> Option<T> {
        let old = self.tiles.insert(key, tile);
        if old.is_none() {
            self.order.push(key);
        }
        old
    }
    /// Fetch a tile, creating it first if it was never touched.
    pub fn get_or_insert_with(&mut self, key: TileKey, make: impl FnOnce() -> T) -> &mut T {
        match self.tiles.entry(key) {
            hashbrown::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hashbrown::hash_map::Entry::Vacant(entry) => {
                self.order.push(key);
                entry.insert(make())
            }
        }
    }
    pub fn remove(&mut self, key: TileKey) -> Option<T> {
        let tile = self.tiles.remove(&key)?;
        self.order.retain(|k| *k != key);
        Some(tile)
    }
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.order.clear();
    }
    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.order.iter().copied()
    }
    /// Tiles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TileKey, &T)> + '_ {
        self.order
            .iter()
            .filter_map(|key| Some((*key, self.tiles.get(key)?)))
    }
    /// Every tile key touched by `rect`, column by column. Empty for an inverted or non-finite
    /// rect.
    pub fn keys_covering(rect: Rect, tile_size: NonZeroU32) -> impl Iterator<Item = TileKey> {
        let (first, last) = match rect.validated() {
            Some(rect) => (
                TileKey::containing(rect.left, rect.top, tile_size),
                TileKey::containing(rect.right, rect.bottom, tile_size),
            ),
            None => {
                log::trace!("no tiles for degenerate rect {rect:?}");
                // first > last on both axes, so both ranges are empty.
                (TileKey::new(0, 0), TileKey::new(-1, -1))
            }
        };
        (first.x()..=last.x())
            .flat_map(move |tx| (first.y()..=last.y()).map(move |ty| TileKey::new(tx, ty)))
    }
    /// Fetch every tile under `rect`, creating the missing ones.
    pub fn touch(&mut self, rect: Rect, make: impl Fn(TileKey) -> T) -> Vec<TileKey> {
        let keys: Vec<_> = Self::keys_covering(rect, self.tile_size).collect();
        for key in &keys {
            self.get_or_insert_with(*key, || make(*key));
        }
        keys
    }
}
