//! Embedded EXIF validation with kamadak-exif.
//!
//! The parser only runs when the container actually carries an EXIF block;
//! a file without one is fine, a block that fails to parse is not.

use crate::error::CorruptError;
use exif::Reader;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

/// Signature that marks an EXIF block in each supported container
fn exif_signature(format: ImageFormat) -> Option<&'static [u8]> {
    match format {
        ImageFormat::Jpeg => Some(&b"Exif\0\0"[..]),
        ImageFormat::Png => Some(&b"eXIf"[..]),
        ImageFormat::WebP => Some(&b"EXIF"[..]),
        _ => None,
    }
}

/// Whether `bytes` appear to embed EXIF metadata
pub(super) fn has_exif(format: ImageFormat, bytes: &[u8]) -> bool {
    if format == ImageFormat::Tiff {
        // A TIFF file is itself an EXIF structure
        return true;
    }
    match exif_signature(format) {
        Some(signature) => bytes.windows(signature.len()).any(|w| w == signature),
        None => false,
    }
}

/// Parse the EXIF block
pub(super) fn validate_exif(path: &Path, bytes: &[u8]) -> Result<(), CorruptError> {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(_) => Ok(()),
        Err(exif::Error::NotFound(_)) => Ok(()),
        Err(e) => Err(CorruptError::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_with_app1(tiff: &[u8]) -> Vec<u8> {
        let length = (2 + 6 + tiff.len()) as u16;
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1];
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(b"Exif\0\0");
        bytes.extend_from_slice(tiff);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    #[test]
    fn presence_is_detected_per_container() {
        assert!(has_exif(ImageFormat::Jpeg, &jpeg_with_app1(&[0; 8])));
        assert!(!has_exif(ImageFormat::Jpeg, &[0xFF, 0xD8, 0xFF, 0xD9]));
        assert!(has_exif(ImageFormat::Tiff, &[]));
        assert!(!has_exif(ImageFormat::Bmp, b"Exif\0\0"));
    }

    #[test]
    fn malformed_exif_segment_is_rejected() {
        // TIFF header with a bogus byte order mark
        let bytes = jpeg_with_app1(&[0x51, 0x51, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);

        let result = validate_exif(Path::new("bad-exif.jpg"), &bytes);
        assert!(matches!(result, Err(CorruptError::Metadata { .. })));
    }
}
