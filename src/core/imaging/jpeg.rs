//! JPEG probing with zune-jpeg.
//!
//! zune-jpeg exposes the *input* colorspace after parsing headers only, and
//! has a strict mode that turns truncated scans into errors instead of
//! gray-filling them.

use super::ColorMode;
use crate::error::CorruptError;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

const EOI: [u8; 2] = [0xFF, 0xD9];

/// Read the stored colorspace without decoding pixels
pub(super) fn color_mode(path: &Path, bytes: &[u8]) -> Result<ColorMode, CorruptError> {
    let mut decoder = JpegDecoder::new_with_options(bytes, DecoderOptions::default());
    decoder
        .decode_headers()
        .map_err(|e| CorruptError::Decode {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg header parse failed: {:?}", e),
        })?;

    let colorspace = decoder.get_input_colorspace().ok_or_else(|| CorruptError::Decode {
        path: path.to_path_buf(),
        reason: "JPEG has no colorspace".to_string(),
    })?;

    Ok(match colorspace {
        ColorSpace::YCbCr | ColorSpace::RGB => ColorMode::Rgb,
        ColorSpace::Luma => ColorMode::Luma,
        ColorSpace::LumaA => ColorMode::LumaAlpha,
        ColorSpace::RGBA => ColorMode::Rgba,
        ColorSpace::CMYK | ColorSpace::YCCK => ColorMode::Cmyk,
        other => ColorMode::Other(format!("{:?}", other)),
    })
}

/// Fully decode the scan data
pub(super) fn verify(path: &Path, bytes: &[u8], tolerate_truncated: bool) -> Result<(), CorruptError> {
    if !tolerate_truncated && !has_end_marker(bytes) {
        return Err(CorruptError::Truncated {
            path: path.to_path_buf(),
        });
    }

    let options = DecoderOptions::default().set_strict_mode(!tolerate_truncated);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    decoder.decode().map_err(|e| CorruptError::Decode {
        path: path.to_path_buf(),
        reason: format!("zune-jpeg decode failed: {:?}", e),
    })?;

    Ok(())
}

/// Whether the file ends with an EOI marker, ignoring zero padding
fn has_end_marker(bytes: &[u8]) -> bool {
    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    bytes[..end].ends_with(&EOI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_marker_detection() {
        assert!(has_end_marker(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]));
        assert!(has_end_marker(&[0xFF, 0xD8, 0xFF, 0xD9, 0x00, 0x00]));
        assert!(!has_end_marker(&[0xFF, 0xD8, 0x12, 0x34]));
        assert!(!has_end_marker(&[]));
    }
}
