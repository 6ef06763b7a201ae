//! # Imaging Module
//!
//! Opens images, reports their color mode and validates their pixel data
//! and embedded metadata.
//!
//! ## Decoders
//! - JPEG: zune-jpeg (header-only colorspace, strict or lenient scan decode)
//! - Everything else: the image crate, with palette storage and end markers
//!   read from the container
//! - EXIF: kamadak-exif, only when an EXIF block is present
//!
//! Truncation leniency is a [`ProbeConfig`] value handed to the probe at
//! construction, so two probes with different policies can coexist.

mod container;
mod jpeg;
mod metadata;

use crate::error::CorruptError;
use image::{ImageDecoder, ImageError, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

/// Color mode of an image as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Luma,
    LumaAlpha,
    Rgb,
    Rgba,
    Cmyk,
    /// Indexed color (palette PNG, GIF)
    Palette,
    Other(String),
}

impl ColorMode {
    pub fn is_rgb(&self) -> bool {
        matches!(self, ColorMode::Rgb)
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Luma => write!(f, "L"),
            ColorMode::LumaAlpha => write!(f, "LA"),
            ColorMode::Rgb => write!(f, "RGB"),
            ColorMode::Rgba => write!(f, "RGBA"),
            ColorMode::Cmyk => write!(f, "CMYK"),
            ColorMode::Palette => write!(f, "P"),
            ColorMode::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<image::ColorType> for ColorMode {
    fn from(color: image::ColorType) -> Self {
        use image::ColorType;
        match color {
            ColorType::L8 | ColorType::L16 => ColorMode::Luma,
            ColorType::La8 | ColorType::La16 => ColorMode::LumaAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorMode::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => ColorMode::Rgba,
            other => ColorMode::Other(format!("{:?}", other)),
        }
    }
}

/// Validation policy for the image probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Accept images whose data ends early
    pub tolerate_truncated: bool,
    /// Parse embedded EXIF and treat a malformed block as corruption
    pub check_metadata: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tolerate_truncated: true,
            check_metadata: true,
        }
    }
}

/// An opened image: its bytes and detected container format
#[derive(Debug)]
pub struct ImageHandle {
    path: PathBuf,
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// Image-decoding collaborator used by the chunk workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProbe {
    config: ProbeConfig,
}

impl ImageProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Read the file and sniff its format from the content
    pub fn open(&self, path: &Path) -> Result<ImageHandle, CorruptError> {
        let bytes = fs::read(path).map_err(|e| CorruptError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        let format = image::guess_format(&bytes).map_err(|e| CorruptError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(ImageHandle {
            path: path.to_path_buf(),
            bytes,
            format,
        })
    }

    /// Color mode from the headers, without decoding pixels
    pub fn mode(&self, handle: &ImageHandle) -> Result<ColorMode, CorruptError> {
        if handle.format == ImageFormat::Jpeg {
            return jpeg::color_mode(&handle.path, &handle.bytes);
        }
        if container::is_palette(handle.format, &handle.bytes) {
            return Ok(ColorMode::Palette);
        }

        let decoder = ImageReader::with_format(Cursor::new(&handle.bytes), handle.format)
            .into_decoder()
            .map_err(|e| decode_error(&handle.path, e))?;
        Ok(decoder.color_type().into())
    }

    /// Decode the pixel data and, if enabled, the embedded metadata
    pub fn verify(&self, handle: &ImageHandle) -> Result<(), CorruptError> {
        if handle.format == ImageFormat::Jpeg {
            jpeg::verify(&handle.path, &handle.bytes, self.config.tolerate_truncated)?;
        } else {
            let decoded = ImageReader::with_format(Cursor::new(&handle.bytes), handle.format).decode();
            match decoded {
                Ok(_) => {}
                Err(e) if is_truncation(&e, handle) => {
                    if !self.config.tolerate_truncated {
                        return Err(CorruptError::Truncated {
                            path: handle.path.clone(),
                        });
                    }
                    tracing::debug!(path = %handle.path.display(), "tolerating truncated image");
                }
                Err(e) => return Err(decode_error(&handle.path, e)),
            }
        }

        if self.config.check_metadata && metadata::has_exif(handle.format, &handle.bytes) {
            metadata::validate_exif(&handle.path, &handle.bytes)?;
        }

        Ok(())
    }

    /// Full corruption check; returns the color mode of a healthy image
    pub fn check(&self, path: &Path) -> Result<ColorMode, CorruptError> {
        let handle = self.open(path)?;
        self.verify(&handle)?;
        self.mode(&handle)
    }

    /// Color mode only, for separating non-RGB images
    pub fn color_mode(&self, path: &Path) -> Result<ColorMode, CorruptError> {
        let handle = self.open(path)?;
        self.mode(&handle)
    }
}

fn decode_error(path: &Path, error: ImageError) -> CorruptError {
    CorruptError::Decode {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

/// Whether a decode failure means "the data ended early"
fn is_truncation(error: &ImageError, handle: &ImageHandle) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::UnexpectedEof {
                return true;
            }
        }
        source = e.source();
    }
    container::ends_early(handle.format, &handle.bytes)
}
