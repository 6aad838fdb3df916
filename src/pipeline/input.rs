//! Input capture: validate uploaded bytes and wrap them in an [`ImageAsset`].
//!
//! Validation happens once, here, before anything touches the network. The
//! magic bytes decide the format (file extensions lie) and the image header is
//! decoded for its dimensions, which both rejects truncated uploads and gives
//! the document exporter the aspect ratio it needs. Pixel data is never
//! decoded.

use crate::error::ScanReportError;
use image::{ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Image encodings accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// An uploaded scan: immutable bytes plus what we learned validating them.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone)]
pub struct ImageAsset {
    bytes: Arc<[u8]>,
    kind: ImageKind,
    width: u32,
    height: u32,
    fingerprint: String,
    name: Option<String>,
}

impl ImageAsset {
    /// Validate raw bytes as a PNG or JPEG image.
    ///
    /// # Errors
    /// [`ScanReportError::InvalidInput`] when the bytes are empty, not a
    /// supported format, or the header cannot be read.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ScanReportError> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(ScanReportError::invalid_input("image is empty"));
        }

        let kind = sniff_kind(&bytes)?;
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes[..]), kind.image_format())
            .into_dimensions()
            .map_err(|e| ScanReportError::invalid_input(format!("unreadable {} header: {e}", kind.extension())))?;
        if width == 0 || height == 0 {
            return Err(ScanReportError::invalid_input(format!(
                "image has zero size ({width}×{height})"
            )));
        }

        let fingerprint = fingerprint(&bytes);
        debug!(
            "Captured {} image {}×{} ({} bytes, {})",
            kind.extension(),
            width,
            height,
            bytes.len(),
            &fingerprint[..12]
        );

        Ok(Self {
            bytes: bytes.into(),
            kind,
            width,
            height,
            fingerprint,
            name: None,
        })
    }

    /// Read and validate an image file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanReportError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanReportError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ScanReportError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ScanReportError::invalid_input(format!("cannot read '{}': {e}", path.display())),
        })?;

        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let mut asset = Self::from_bytes(bytes)?;
        asset.name = name;
        Ok(asset)
    }

    /// Attach a display name (e.g. the uploaded file name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: empty uploads are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Pixel dimensions `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Lowercase hex SHA-256 of the bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Height matching `width` at this image's aspect ratio.
    pub fn scaled_height(&self, width: u64) -> u64 {
        width * u64::from(self.height) / u64::from(self.width)
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("fingerprint", &self.fingerprint)
            .field("name", &self.name)
            .finish()
    }
}

impl PartialEq for ImageAsset {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for ImageAsset {}

fn sniff_kind(bytes: &[u8]) -> Result<ImageKind, ScanReportError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(ImageKind::Png),
        Ok(ImageFormat::Jpeg) => Ok(ImageKind::Jpeg),
        Ok(other) => Err(ScanReportError::invalid_input(format!(
            "unsupported image format {other:?}"
        ))),
        Err(_) => {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            Err(ScanReportError::invalid_input(format!(
                "not an image (first bytes: {magic:02x?})"
            )))
        }
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Does the path carry an extension we accept? Used by the CLI for an early
/// hint; the authoritative check is the magic-byte sniff.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Encode a solid-colour image in memory.
    pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255])));
        let img = match format {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .expect("in-memory encode");
        buf
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        encoded_image(width, height, ImageFormat::Png)
    }
}
