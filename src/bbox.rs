//! Face bounding boxes in flat (XYWH) and corner (XYXY) form.

use serde::Serialize;

/// An axis-aligned face box as stored in WIDER tables: top-left corner plus
/// width and height, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if all fields are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Returns true if width or height is negative.
    #[inline]
    pub fn has_negative_size(&self) -> bool {
        self.width < 0.0 || self.height < 0.0
    }

    /// Flip negative extents so the box covers the same area with a
    /// non-negative width and height.
    pub fn normalized(&self) -> Self {
        let (x, width) = flip_extent(self.x, self.width);
        let (y, height) = flip_extent(self.y, self.height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Corner form with every coordinate rounded half away from zero.
    ///
    /// Rounding is applied to the sums `x + width` and `y + height`, not to
    /// the width and height on their own.
    #[inline]
    pub fn to_corners(&self) -> CornerBox {
        CornerBox {
            xmin: self.x.round() as i64,
            ymin: self.y.round() as i64,
            xmax: (self.x + self.width).round() as i64,
            ymax: (self.y + self.height).round() as i64,
        }
    }
}

fn flip_extent(origin: f64, extent: f64) -> (f64, f64) {
    if extent < 0.0 {
        (origin + extent, -extent)
    } else {
        (origin, extent)
    }
}

/// Integer corner coordinates written to `<bndbox>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CornerBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl CornerBox {
    /// Returns true if the box is properly ordered (min <= max for both axes).
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }
}
