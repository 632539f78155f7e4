//! Planar frame to JPEG conversion
//!
//! Frames are first packed into NV21 (full luma plane, then interleaved
//! V/U pairs), converted to RGB and compressed at JPEG quality 100. The JPEG
//! buffer is what the recognition service receives; decoding it again gives
//! the raster used to size the focus band.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage};
use tracing::trace;

use crate::capture::frame::Frame;
use crate::error::FrameError;

/// Quality used for every encoded frame
pub const JPEG_QUALITY: u8 = 100;

/// A compressed full-frame image
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// JPEG bytes
    pub jpeg: Vec<u8>,
    /// Width of the encoded area
    pub width: u32,
    /// Height of the encoded area
    pub height: u32,
}

/// Encode the whole frame (`{0, 0, width, height}`) as a JPEG
pub fn encode(frame: &Frame) -> Result<CompressedImage, FrameError> {
    let (width, height) = frame.dimensions();
    let nv21 = to_nv21(frame)?;
    let rgb = nv21_to_rgb(&nv21, width, height);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        rgb.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;

    trace!("Encoded frame {} ({}x{}) to {} JPEG bytes", frame.id(), width, height, jpeg.len());

    Ok(CompressedImage { jpeg, width, height })
}

/// Decode a compressed frame back into a raster bitmap
pub fn decode(image: &CompressedImage) -> Result<RgbImage, FrameError> {
    let decoded = image::load_from_memory_with_format(&image.jpeg, ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

/// Pack a frame into an NV21 buffer: Y rows, then V,U pairs per chroma sample.
///
/// Strides are honored on every plane. Chroma planes are quarter resolution,
/// rounded up for odd dimensions.
pub fn to_nv21(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyFrame { width, height });
    }

    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let (y, u, v) = frame.planes();

    y.validate("Y", w, h)?;
    u.validate("U", cw, ch)?;
    v.validate("V", cw, ch)?;

    let mut nv21 = Vec::with_capacity(w * h + 2 * cw * ch);

    for row in 0..h {
        for col in 0..w {
            nv21.push(y.sample(col, row));
        }
    }

    // V before U: swapping them shifts every hue toward its complement
    for row in 0..ch {
        for col in 0..cw {
            nv21.push(v.sample(col, row));
            nv21.push(u.sample(col, row));
        }
    }

    Ok(nv21)
}

/// Convert a tightly packed NV21 buffer to RGB (BT.601 full range)
fn nv21_to_rgb(nv21: &[u8], width: u32, height: u32) -> RgbImage {
    let (w, h) = (width as usize, height as usize);
    let cw = w.div_ceil(2);
    let chroma = &nv21[w * h..];

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let luma = nv21[y * w + x] as f32;
        let offset = ((y / 2) * cw + x / 2) * 2;
        let cr = chroma[offset] as f32 - 128.0;
        let cb = chroma[offset + 1] as f32 - 128.0;

        image::Rgb([
            clamp_u8(luma + 1.402 * cr),
            clamp_u8(luma - 0.344_136 * cb - 0.714_136 * cr),
            clamp_u8(luma + 1.772 * cb),
        ])
    })
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
