//! # Brush
//!
//! Brush shapes as recorded in brush commands. This is only the geometry, rasterizing the
//! stamps is up to the renderer.

#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}
impl Point {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    #[must_use]
    fn lerp(self, other: Self, f: f32) -> Self {
        Self {
            x: self.x * (1.0 - f) + other.x * f,
            y: self.y * (1.0 - f) + other.y * f,
        }
    }
}

/// Axis-aligned, edges inclusive. Y grows downward.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}
impl Rect {
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
    /// Length of the diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f32 {
        self.width().hypot(self.height())
    }
    /// `None` if the rect is inverted or not finite.
    #[must_use]
    pub fn validated(self) -> Option<Self> {
        let finite = [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite());
        (finite && self.left <= self.right && self.top <= self.bottom).then_some(self)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum BrushError {
    #[error("polygon brush needs at least one point")]
    EmptyPath,
    #[error("bad spacing {0}")]
    BadSpacing(f32),
    #[error("brush image has no area")]
    EmptyImage,
}

/// A brush described by a closed outline, in brush-local units scaled by the stroke radius.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolygonBrush {
    path: Vec<Point>,
    bounds: Rect,
    diameter: f32,
    /// Stamp only at stroke endpoints, rather than sweeping the outline between them.
    pub stipple: bool,
}
impl PolygonBrush {
    /// # Errors
    /// [`BrushError::EmptyPath`] if there are no points to bound.
    pub fn new(path: Vec<Point>) -> Result<Self, BrushError> {
        let first = *path.first().ok_or(BrushError::EmptyPath)?;
        let bounds = path.iter().skip(1).fold(
            Rect {
                left: first.x,
                top: first.y,
                right: first.x,
                bottom: first.y,
            },
            |bounds, p| Rect {
                left: bounds.left.min(p.x),
                top: bounds.top.min(p.y),
                right: bounds.right.max(p.x),
                bottom: bounds.bottom.max(p.y),
            },
        );
        Ok(Self {
            diameter: bounds.diagonal(),
            path,
            bounds,
            stipple: false,
        })
    }
    #[must_use]
    pub fn path(&self) -> &[Point] {
        &self.path
    }
    /// The path under a row-major 2x2 linear transform.
    #[must_use]
    pub fn transformed_path(&self, transform: [f32; 4]) -> Vec<Point> {
        let [a, b, c, d] = transform;
        self.path
            .iter()
            .map(|p| Point::new(p.x * a + p.y * b, p.x * c + p.y * d))
            .collect()
    }
}

/// Placement of one image stamp, top-left corner and size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stamp {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}
impl Stamp {
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect {
            left: self.x,
            top: self.y,
            right: self.x + self.width,
            bottom: self.y + self.height,
        }
    }
}

/// A brush that stamps an image repeatedly along the stroke.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageBrush {
    width: u32,
    height: u32,
    spacing: f32,
}
impl ImageBrush {
    /// Distance between stamps, as a fraction of the radius.
    pub const DEFAULT_SPACING: f32 = 0.2;
    /// # Errors
    /// If the image has no area or the spacing is not a positive, finite number.
    pub fn new(width: u32, height: u32, spacing: f32) -> Result<Self, BrushError> {
        if width == 0 || height == 0 {
            return Err(BrushError::EmptyImage);
        }
        let mut this = Self {
            width,
            height,
            spacing: Self::DEFAULT_SPACING,
        };
        this.set_spacing(spacing)?;
        Ok(this)
    }
    #[must_use]
    pub fn spacing(&self) -> f32 {
        self.spacing
    }
    /// # Errors
    /// [`BrushError::BadSpacing`] if not a positive, finite number. The old spacing is kept.
    pub fn set_spacing(&mut self, spacing: f32) -> Result<(), BrushError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(BrushError::BadSpacing(spacing));
        }
        self.spacing = spacing;
        Ok(())
    }
    /// Stamps along a segment, radius interpolated from `r1` to `r2`. The image is scaled so its
    /// longer side matches the radius at each stamp.
    ///
    /// A segment of zero length stamps once. Non-finite input stamps nothing.
    #[must_use]
    pub fn stamps(&self, from: Point, r1: f32, to: Point, r2: f32) -> Vec<Stamp> {
        let distance = (to.x - from.x).hypot(to.y - from.y);
        if !(distance.is_finite() && r1.is_finite() && r2.is_finite()) {
            return Vec::new();
        }
        let longest = self.width.max(self.height) as f32;
        let stamp_at = |f: f32| {
            let r = r1 * (1.0 - f) + r2 * f;
            let center = from.lerp(to, f);
            let scale = r / longest;
            let (width, height) = (self.width as f32 * scale, self.height as f32 * scale);
            (
                r,
                Stamp {
                    x: center.x - width / 2.0,
                    y: center.y - height / 2.0,
                    width,
                    height,
                },
            )
        };
        if distance == 0.0 {
            return vec![stamp_at(0.0).1];
        }

        let mut stamps = Vec::new();
        let mut traveled = 0.0;
        while traveled <= distance {
            let (r, stamp) = stamp_at(traveled / distance);
            stamps.push(stamp);
            traveled += (self.spacing * r).max(0.5);
        }
        stamps
    }
}

/// The brush a stroke is drawn with.
///
/// Cloning is deep, a clone never shares a path with the original.
#[derive(Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum Brush {
    /// A circle of the stroke radius.
    #[default]
    Round,
    Polygon(PolygonBrush),
    Image(ImageBrush),
}
impl Brush {
    /// Extent in brush-local units, for a radius of one.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Polygon(polygon) => polygon.bounds,
            Self::Round | Self::Image(_) => Rect {
                left: -0.5,
                top: -0.5,
                right: 0.5,
                bottom: 0.5,
            },
        }
    }
    #[must_use]
    pub fn diameter(&self) -> f32 {
        match self {
            Self::Polygon(polygon) => polygon.diameter,
            Self::Round | Self::Image(_) => 1.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn polygon_bounds() {
        // Descending X then ascending, so each extreme is found independently.
        let brush = PolygonBrush::new(vec![
            Point::new(0.0, 0.0),
            Point::new(-3.0, 1.0),
            Point::new(2.0, -4.0),
            Point::new(1.0, 2.0),
        ])
        .unwrap();
        assert_eq!(
            brush.bounds,
            Rect {
                left: -3.0,
                top: -4.0,
                right: 2.0,
                bottom: 2.0
            }
        );
        assert!((brush.diameter - 61f32.sqrt()).abs() < 1e-5);

        let single = PolygonBrush::new(vec![Point::new(1.0, 1.0)]).unwrap();
        assert_eq!(single.diameter, 0.0);
        assert_eq!(PolygonBrush::new(vec![]), Err(BrushError::EmptyPath));
    }
    #[test]
    fn transformed() {
        let brush = PolygonBrush::new(vec![Point::new(1.0, 0.0), Point::new(0.0, 2.0)]).unwrap();
        // Quarter turn
        let path = brush.transformed_path([0.0, -1.0, 1.0, 0.0]);
        assert_eq!(path, [Point::new(0.0, 1.0), Point::new(-2.0, 0.0)]);
    }
    #[test]
    fn clones_are_independent() {
        let brush = Brush::Polygon(
            PolygonBrush::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap(),
        );
        let mut copy = brush.clone();
        if let Brush::Polygon(polygon) = &mut copy {
            polygon.path.push(Point::new(5.0, 5.0));
            polygon.stipple = true;
        }
        let Brush::Polygon(original) = &brush else {
            unreachable!()
        };
        assert_eq!(original.path().len(), 2);
        assert!(!original.stipple);
        assert_eq!(Brush::default().diameter(), 1.0);
    }
    #[test]
    fn spacing_validation() {
        assert_eq!(ImageBrush::new(4, 4, 0.0), Err(BrushError::BadSpacing(0.0)));
        assert_eq!(ImageBrush::new(4, 4, -1.0), Err(BrushError::BadSpacing(-1.0)));
        assert!(ImageBrush::new(4, 4, f32::NAN).is_err());
        assert!(ImageBrush::new(4, 4, f32::INFINITY).is_err());
        assert_eq!(ImageBrush::new(0, 4, 1.0), Err(BrushError::EmptyImage));

        let mut brush = ImageBrush::new(4, 4, 0.5).unwrap();
        assert!(brush.set_spacing(0.0).is_err());
        assert_eq!(brush.spacing(), 0.5);
    }
    #[test]
    fn stamp_size_follows_image() {
        let brush = ImageBrush::new(20, 10, 1.0).unwrap();
        let stamps = brush.stamps(Point::new(0.0, 0.0), 4.0, Point::new(0.0, 0.0), 4.0);
        assert_eq!(
            stamps,
            [Stamp {
                x: -2.0,
                y: -1.0,
                width: 4.0,
                height: 2.0
            }]
        );
    }
    #[test]
    fn stamp_spacing() {
        let brush = ImageBrush::new(8, 8, 0.5).unwrap();
        // Step of 0.5 * 4 = 2 over a length of 10 is 6 stamps, ends included.
        let stamps = brush.stamps(Point::new(0.0, 0.0), 4.0, Point::new(10.0, 0.0), 4.0);
        assert_eq!(stamps.len(), 6);
        assert_eq!(stamps[0].x, -2.0);
        assert_eq!(stamps[5].x, 8.0);
        assert!(stamps.iter().all(|stamp| stamp.width == 4.0));

        // Tiny radius still advances by at least half a unit.
        let stamps = brush.stamps(Point::new(0.0, 0.0), 0.1, Point::new(2.0, 0.0), 0.1);
        assert_eq!(stamps.len(), 5);

        assert!(brush
            .stamps(Point::new(0.0, 0.0), 1.0, Point::new(f32::INFINITY, 0.0), 1.0)
            .is_empty());
    }
}
