use std::io::Cursor;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{MontageError, MontageResult};
use crate::session::CacheFormat;

/// A rendered frame as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameBuffer {
    /// A frame filled with one straight-alpha color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
            premultiplied: false,
        }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn validate(&self) -> MontageResult<()> {
        if self.data.len() != Self::byte_len(self.width, self.height) {
            return Err(MontageError::validation(format!(
                "frame data is {} bytes, expected {} for {}x{} rgba8",
                self.data.len(),
                Self::byte_len(self.width, self.height),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// An encoded frame travelling from the frame stream to the synthesis.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePayload {
    pub index: FrameIndex,
    pub format: CacheFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Flatten `frame` over `bg_rgba` and encode it as `format`.
///
/// `Raw` yields opaque RGBA8; `Jpg` honours `quality` (1..=100).
pub fn encode_payload(
    index: FrameIndex,
    frame: &FrameBuffer,
    format: CacheFormat,
    quality: u8,
    bg_rgba: [u8; 4],
) -> MontageResult<FramePayload> {
    frame.validate()?;
    let mut opaque = vec![0u8; frame.data.len()];
    flatten_to_opaque_rgba8(&mut opaque, &frame.data, frame.premultiplied, bg_rgba)?;

    let bytes = match format {
        CacheFormat::Raw => opaque,
        CacheFormat::Png => {
            let img = image::RgbaImage::from_raw(frame.width, frame.height, opaque)
                .ok_or_else(|| MontageError::validation("frame buffer too small for png"))?;
            let mut buf = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| MontageError::synthesis(format!("png encode failed: {e}")))?;
            buf
        }
        CacheFormat::Jpg => {
            let img = image::RgbaImage::from_raw(frame.width, frame.height, opaque)
                .ok_or_else(|| MontageError::validation("frame buffer too small for jpeg"))?;
            let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
            let mut buf = Vec::new();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                .encode_image(&rgb)
                .map_err(|e| MontageError::synthesis(format!("jpeg encode failed: {e}")))?;
            buf
        }
    };

    Ok(FramePayload {
        index,
        format,
        width: frame.width,
        height: frame.height,
        bytes,
    })
}

pub(crate) fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> MontageResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(MontageError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
