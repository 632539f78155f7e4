//! Focus band selection
//!
//! The region of reference is a fixed, resolution-relative band across the
//! lower-middle of the frame. Recognized lines count only when the center of
//! their bounding box falls inside it.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a rectangle from its edges
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// True when the rectangle encloses no pixels
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Center point, rounded toward zero on both axes.
    ///
    /// Computed in `i64`: edges come from the recognizer and may sit anywhere
    /// in the `i32` range.
    pub fn center(&self) -> (i64, i64) {
        (
            (self.left as i64 + self.right as i64) / 2,
            (self.top as i64 + self.bottom as i64) / 2,
        )
    }

    /// Half-open containment: `left <= x < right` and `top <= y < bottom`
    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        !self.is_empty()
            && x >= self.left as i64
            && x < self.right as i64
            && y >= self.top as i64
            && y < self.bottom as i64
    }
}

/// Compute the focus band for a frame of the given size.
///
/// Horizontally the central 80%. Vertically a band starting two thirds of the
/// way down the frame's upper three quarters, a quarter of the height tall plus
/// a further tenth. The math runs in `f32` and each edge is truncated toward
/// zero at the end.
pub fn region_of_reference(width: u32, height: u32) -> Rect {
    let w = width as f32;
    let h = height as f32;

    let quarter_height = h / 4.0;
    let base_top = (h - quarter_height) * 2.0 / 3.0;

    Rect {
        left: (w * 0.1) as i32,
        top: base_top as i32,
        right: (w * 0.9) as i32,
        bottom: (base_top + quarter_height + h * 0.1) as i32,
    }
}

/// Decide whether a recognized line belongs to the region.
///
/// Lines without geometry are never inside.
pub fn contains(region: &Rect, bounding_box: Option<&Rect>) -> bool {
    match bounding_box {
        Some(bounds) => {
            let (cx, cy) = bounds.center();
            region.contains_point(cx, cy)
        }
        None => false,
    }
}
