//! Captured still images, decoded to 8-bit RGB.

use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("cannot read image {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

/// A decoded RGB capture handed to the embedding backend.
#[derive(Debug, Clone)]
pub struct FaceImage {
    pixels: RgbImage,
}

impl FaceImage {
    /// Wrap an already-decoded RGB buffer.
    pub fn from_rgb(pixels: RgbImage) -> Result<Self, ImageLoadError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ImageLoadError::Empty {
                width: pixels.width(),
                height: pixels.height(),
            });
        }
        Ok(Self { pixels })
    }

    /// Decode an encoded image (JPEG, PNG, ...), guessing the format from its header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgb(decoded.to_rgb8())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ImageLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let image = Self::from_bytes(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "decoded capture"
        );
        Ok(image)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_from_bytes_png() {
        let src = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let image = FaceImage::from_bytes(&encode_png(&src)).unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert_eq!(image.rgb().get_pixel(2, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_from_bytes_garbage() {
        let err = FaceImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageLoadError::Decode(_)));
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = FaceImage::from_rgb(RgbImage::new(0, 5)).unwrap_err();
        assert!(matches!(err, ImageLoadError::Empty { width: 0, height: 5 }));
    }

    #[test]
    fn test_open_missing_file() {
        let err = FaceImage::open("/nonexistent/rollcall/capture.jpg").unwrap_err();
        assert!(matches!(err, ImageLoadError::Read { .. }));
    }
}
