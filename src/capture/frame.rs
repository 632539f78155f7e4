//! Frame data structures for camera content
//!
//! A [`Frame`] is a planar YUV 4:2:0 image owned by whoever holds it. The
//! producer attaches a release hook when it creates the frame; the hook runs
//! exactly once, either through [`Frame::release`] or when the frame is
//! dropped on any other path.

use std::fmt;
use std::time::Instant;

use image::RgbImage;
use tracing::trace;

use crate::error::FrameError;

/// Callback run when a frame's resources are given back to the producer
pub type ReleaseHook = Box<dyn FnOnce(u64) + Send>;

/// One pixel plane with its stride metadata
#[derive(Debug, Clone)]
pub struct Plane {
    /// Raw plane bytes
    pub data: Vec<u8>,
    /// Bytes between the starts of two consecutive rows
    pub row_stride: usize,
    /// Bytes between two consecutive samples of the same row
    pub pixel_stride: usize,
}

impl Plane {
    /// Create a plane from raw bytes and its strides
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Check that the buffer holds `cols` x `rows` samples at the declared strides.
    ///
    /// The last row only needs to reach its last sample, so buffers whose final
    /// row is not padded out to `row_stride` are accepted.
    pub fn validate(&self, name: &'static str, cols: usize, rows: usize) -> Result<(), FrameError> {
        if cols == 0 || rows == 0 {
            return Ok(());
        }
        let invalid_stride = || FrameError::InvalidStride {
            plane: name,
            row_stride: self.row_stride,
            pixel_stride: self.pixel_stride,
        };

        // Offset of the last sample in a row; strides are producer data, so checked
        let row_span = (cols - 1)
            .checked_mul(self.pixel_stride)
            .ok_or_else(invalid_stride)?;
        if self.pixel_stride == 0 || self.row_stride <= row_span {
            return Err(invalid_stride());
        }

        let required = self
            .row_stride
            .checked_mul(rows - 1)
            .and_then(|rows_span| rows_span.checked_add(row_span))
            .and_then(|last| last.checked_add(1))
            .ok_or_else(invalid_stride)?;
        if self.data.len() < required {
            return Err(FrameError::PlaneTooSmall {
                plane: name,
                required,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Sample at column `x`, row `y` (caller validated the layout)
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_stride + x * self.pixel_stride]
    }
}

/// A camera frame: luma plus two quarter-resolution chroma planes
pub struct Frame {
    /// Producer-assigned sequence number
    id: u64,
    /// Frame width in pixels
    width: u32,
    /// Frame height in pixels
    height: u32,
    /// Clockwise rotation the image needs to be upright, in degrees
    rotation_degrees: u32,
    /// Luma plane
    y: Plane,
    /// Chroma-U (Cb) plane
    u: Plane,
    /// Chroma-V (Cr) plane
    v: Plane,
    /// Timestamp when the frame was captured
    timestamp: Instant,
    /// Pending release hook, taken when it runs
    release: Option<ReleaseHook>,
}

impl Frame {
    /// Create a new frame without a release hook
    pub fn new(
        id: u64,
        width: u32,
        height: u32,
        rotation_degrees: u32,
        y: Plane,
        u: Plane,
        v: Plane,
    ) -> Self {
        Self {
            id,
            width,
            height,
            rotation_degrees,
            y,
            u,
            v,
            timestamp: Instant::now(),
            release: None,
        }
    }

    /// Attach the hook that hands the frame's resources back to the producer
    pub fn with_release(mut self, hook: impl FnOnce(u64) + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Build a tightly packed I420 frame from an RGB image (BT.601 full range)
    pub fn from_rgb(id: u64, image: &RgbImage, rotation_degrees: u32) -> Self {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

        let mut y = vec![0u8; w * h];
        for (x, row, pixel) in image.enumerate_pixels() {
            let [r, g, b] = pixel.0.map(f32::from);
            y[row as usize * w + x as usize] = clamp_u8(0.299 * r + 0.587 * g + 0.114 * b);
        }

        // Chroma is taken from the top-left pixel of each 2x2 block
        let mut u = vec![0u8; cw * ch];
        let mut v = vec![0u8; cw * ch];
        for cy in 0..ch {
            for cx in 0..cw {
                let [r, g, b] = image.get_pixel((cx * 2) as u32, (cy * 2) as u32).0.map(f32::from);
                u[cy * cw + cx] = clamp_u8(-0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0);
                v[cy * cw + cx] = clamp_u8(0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0);
            }
        }

        Self::new(
            id,
            width,
            height,
            rotation_degrees,
            Plane::new(y, w, 1),
            Plane::new(u, cw, 1),
            Plane::new(v, cw, 1),
        )
    }

    /// Producer-assigned sequence number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Rotation reported by the producer, in degrees
    pub fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }

    /// Planes in (Y, U, V) order
    pub fn planes(&self) -> (&Plane, &Plane, &Plane) {
        (&self.y, &self.u, &self.v)
    }

    /// When the frame was created
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Hand the frame's resources back to the producer now
    pub fn release(self) {
        // Drop runs the hook
        drop(self);
    }

    fn run_release(&mut self) {
        if let Some(hook) = self.release.take() {
            trace!("Releasing frame {}", self.id);
            hook(self.id);
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation_degrees", &self.rotation_degrees)
            .field("has_release_hook", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Solid-color test frame whose release bumps `counter`
    pub(crate) fn counted_frame(id: u64, width: u32, height: u32, counter: &Arc<AtomicUsize>) -> Frame {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
        let counter = counter.clone();
        Frame::from_rgb(id, &image, 0).with_release(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_release_runs_once_on_explicit_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let frame = counted_frame(1, 4, 4, &released);

        frame.release();

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_runs_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let _frame = counted_frame(2, 4, 4, &released);
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_hook_receives_frame_id() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = seen.clone();
        let image = RgbImage::new(2, 2);
        Frame::from_rgb(42, &image, 0)
            .with_release(move |id| *sink.lock() = Some(id))
            .release();

        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn test_from_rgb_plane_sizes_odd_dimensions() {
        let image = RgbImage::new(5, 3);
        let frame = Frame::from_rgb(0, &image, 90);
        let (y, u, v) = frame.planes();

        assert_eq!(y.data.len(), 15);
        assert_eq!(u.data.len(), 6);
        assert_eq!(v.data.len(), 6);
        assert_eq!(u.row_stride, 3);
        assert_eq!(frame.rotation_degrees(), 90);
    }

    #[test]
    fn test_from_rgb_gray_has_neutral_chroma() {
        let image = RgbImage::from_pixel(2, 2, image::Rgb([128, 128, 128]));
        let frame = Frame::from_rgb(0, &image, 0);
        let (y, u, v) = frame.planes();

        assert_eq!(y.sample(1, 1), 128);
        assert_eq!(u.sample(0, 0), 128);
        assert_eq!(v.sample(0, 0), 128);
    }

    #[test]
    fn test_plane_validate_too_small() {
        let plane = Plane::new(vec![0; 10], 4, 1);
        let err = plane.validate("Y", 4, 4).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PlaneTooSmall { required: 16, actual: 10, .. }
        ));
    }

    #[test]
    fn test_plane_validate_unpadded_last_row() {
        // Interleaved chroma: 2 samples per row, pixel stride 2, last row unpadded
        let plane = Plane::new(vec![0; 4 + 3], 4, 2);
        assert!(plane.validate("U", 2, 2).is_ok());
    }

    #[test]
    fn test_plane_validate_stride_shorter_than_row() {
        let plane = Plane::new(vec![0; 64], 2, 1);
        assert!(matches!(
            plane.validate("Y", 4, 4),
            Err(FrameError::InvalidStride { .. })
        ));
    }

    #[test]
    fn test_plane_validate_huge_strides_are_errors() {
        let plane = Plane::new(vec![0; 64], usize::MAX / 2, 1);
        assert!(matches!(
            plane.validate("Y", 4, 3),
            Err(FrameError::InvalidStride { .. })
        ));

        let plane = Plane::new(vec![0; 64], 8, usize::MAX / 2);
        assert!(matches!(
            plane.validate("U", 4, 2),
            Err(FrameError::InvalidStride { .. })
        ));

        // Row span fits, total layout does not
        let plane = Plane::new(vec![0; 64], usize::MAX / 4, 1);
        assert!(matches!(
            plane.validate("V", 4, 8),
            Err(FrameError::InvalidStride { .. })
        ));
    }
}
