//! Prepared bitmaps on disk.
//!
//! An artifact is an 8-bit grayscale PNG with exactly the panel resolution
//! whose pixels are all palette levels, so it can go to the panel unchanged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat};

use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, PanelGeometry};

/// Directory of prepared artifacts for one panel geometry.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    geometry: PanelGeometry,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, geometry: PanelGeometry) -> Self {
        Self {
            root: root.into(),
            geometry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    /// Relative paths live under the store root, absolute ones are kept.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    /// Read an artifact and check it against the panel contract.
    pub fn load(&self, path: &Path) -> Result<FrameBuffer> {
        let path = self.resolve(path);
        if !path.is_file() {
            return Err(Error::MissingArtifact(path));
        }

        let image = image::open(&path).map_err(|e| match e {
            image::ImageError::IoError(io) if io.kind() == io::ErrorKind::NotFound => {
                Error::MissingArtifact(path.clone())
            }
            other => Error::from(other),
        })?;

        let gray = match image {
            DynamicImage::ImageLuma8(gray) => gray,
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} is {:?}, expected 8-bit grayscale",
                    path.display(),
                    other.color()
                )))
            }
        };

        let (width, height) = gray.dimensions();
        if (width, height) != (u32::from(self.geometry.width), u32::from(self.geometry.height)) {
            return Err(Error::BufferSizeMismatch {
                expected: self.geometry.pixel_count(),
                actual: width as usize * height as usize,
            });
        }

        let frame = FrameBuffer::from_pixels(gray.into_raw());
        frame.validate(self.geometry)?;
        log::debug!("Loaded artifact {}", path.display());
        Ok(frame)
    }

    /// Write `frame` as an artifact, creating parent directories.
    ///
    /// Returns the resolved path that was written.
    pub fn save(&self, path: &Path, frame: &FrameBuffer) -> Result<PathBuf> {
        frame.validate(self.geometry)?;
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let image = GrayImage::from_raw(
            u32::from(self.geometry.width),
            u32::from(self.geometry.height),
            frame.as_bytes().to_vec(),
        )
        .ok_or(Error::BufferSizeMismatch {
            expected: self.geometry.pixel_count(),
            actual: frame.len(),
        })?;
        image.save_with_format(&path, ImageFormat::Png)?;

        log::info!("Saved artifact {}", path.display());
        Ok(path)
    }
}
