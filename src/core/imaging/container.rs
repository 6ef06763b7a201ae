//! Facts about how an image is stored that decoding hides.
//!
//! The image crate expands palettes into RGB(A) and reports a failed decode
//! as an opaque error, so palette storage and missing end markers are read
//! from the container itself.

use image::ImageFormat;
use std::io::Cursor;

/// PNG `IEND` chunk: zero length, type, CRC
const PNG_IEND: [u8; 12] = [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82];

const GIF_TRAILER: u8 = 0x3B;

/// Whether pixels are stored as indices into a palette
pub(super) fn is_palette(format: ImageFormat, bytes: &[u8]) -> bool {
    match format {
        ImageFormat::Gif => true,
        ImageFormat::Png => png::Decoder::new(Cursor::new(bytes))
            .read_info()
            .map(|reader| reader.info().color_type == png::ColorType::Indexed)
            .unwrap_or(false),
        _ => false,
    }
}

/// Whether the stream stops before the container's end marker
pub(super) fn ends_early(format: ImageFormat, bytes: &[u8]) -> bool {
    match format {
        ImageFormat::Png => !bytes.ends_with(&PNG_IEND),
        ImageFormat::Gif => bytes.last() != Some(&GIF_TRAILER),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_end_marker() {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        assert!(ends_early(ImageFormat::Png, &bytes));
        bytes.extend_from_slice(&PNG_IEND);
        assert!(!ends_early(ImageFormat::Png, &bytes));
    }

    #[test]
    fn gif_trailer() {
        assert!(!ends_early(ImageFormat::Gif, b"GIF89a\x3B"));
        assert!(ends_early(ImageFormat::Gif, b"GIF89a\x00"));
    }

    #[test]
    fn other_formats_never_end_early() {
        assert!(!ends_early(ImageFormat::Bmp, b""));
        assert!(!is_palette(ImageFormat::Bmp, b""));
    }
}
