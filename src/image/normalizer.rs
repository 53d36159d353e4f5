use crate::Result;
use base64::Engine as _;
use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// A frame normalized for transport to the vision API.
pub struct NormalizedImage {
    /// Base64 of the PNG payload.
    pub base64: String,
    /// `max(width, height)` of the image as loaded, before any resize.
    /// Used downstream to pick the detail tier.
    pub original_max: u32,
}

/// Normalize the image at `path` for transport.
///
/// Images that are already PNG and within `max_dimension` on both sides pass
/// through byte-identical, avoiding a needless recompression. Everything else
/// is converted to true color, downscaled proportionally so the longer side
/// equals `max_dimension` when oversized, and re-encoded to PNG.
///
/// Errors here are per-image and non-fatal to a batch; the request builder
/// logs and drops the offending frame.
pub fn normalize(path: &Path, max_dimension: u32) -> Result<NormalizedImage> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format();
    let img = reader.decode()?;

    let (width, height) = (img.width(), img.height());
    let original_max = width.max(height);

    if format == Some(ImageFormat::Png) && width <= max_dimension && height <= max_dimension {
        let bytes = fs::read(path)?;
        return Ok(NormalizedImage {
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            original_max,
        });
    }

    // Paletted sources are already expanded by the decoder; this forces the
    // remaining modes (grayscale, 16-bit) to true color as well.
    let img = to_true_color(img);

    let img = if width > max_dimension || height > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    Ok(NormalizedImage {
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        original_max,
    })
}

fn to_true_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}
