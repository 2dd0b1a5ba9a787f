// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image file discovery and probing.
//!
//! Images are never decoded in full for annotation work: only the header is
//! read to learn the pixel dimensions. Full decoding happens only when a
//! batch job writes a rotated or flipped copy.

use crate::error::{AnnotationError, Result};
use crate::models::project::ImageInfo;
use crate::util::geometry::Transform;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

/// Dimensions of the sentinel used when an image cannot be read.
pub const PLACEHOLDER_SIZE: (u32, u32) = (32, 32);

/// Check if a path has a supported image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read the pixel dimensions from the image header.
pub fn read_image_info(path: &Path) -> Result<ImageInfo> {
    let (width, height) = image::image_dimensions(path).map_err(|source| AnnotationError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ImageInfo::new(width, height))
}

/// Stand-in for an unreadable image.
pub fn placeholder_info() -> ImageInfo {
    ImageInfo {
        is_placeholder: true,
        ..ImageInfo::new(PLACEHOLDER_SIZE.0, PLACEHOLDER_SIZE.1)
    }
}

/// Inclusion/exclusion filter applied to image paths when a project opens.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ImageFilter {
    /// Build a filter; blank patterns are ignored.
    pub fn new(inclusion: &str, exclusion: &str) -> std::result::Result<Self, regex::Error> {
        let compile = |pattern: &str| -> std::result::Result<Option<Regex>, regex::Error> {
            if pattern.trim().is_empty() {
                Ok(None)
            } else {
                Regex::new(pattern).map(Some)
            }
        };
        Ok(Self {
            include: compile(inclusion)?,
            exclude: compile(exclusion)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.include.is_some() || self.exclude.is_some()
    }

    pub fn matches(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        if let Some(include) = &self.include {
            if !include.is_match(&text) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(&text),
            None => true,
        }
    }

    pub fn apply(&self, images: Vec<PathBuf>) -> Vec<PathBuf> {
        if !self.is_active() {
            return images;
        }
        let before = images.len();
        let kept: Vec<PathBuf> = images.into_iter().filter(|p| self.matches(p)).collect();
        log::info!("image filter kept {} of {} images", kept.len(), before);
        kept
    }
}

fn is_skipped_dir(entry: &DirEntry, skip_dirs: &[&str]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || skip_dirs.iter().any(|d| *d == name)
}

/// Recursively list images under `dir`, skipping hidden directories and
/// any directory named in `skip_dirs`.
pub fn find_images(dir: &Path, skip_dirs: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnnotationError::io(
            "scanning",
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e, skip_dirs))
    {
        match entry {
            Ok(e) if e.file_type().is_file() && is_image(e.path()) => {
                images.push(e.into_path());
            }
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable entry: {}", e),
        }
    }
    log::info!("found {} images in {}", images.len(), dir.display());
    Ok(images)
}

/// Modification time in milliseconds since the epoch, 0 if unavailable.
pub fn modified_millis(path: &Path) -> u128 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Path of the derived image `<stem><suffix>.<ext>` next to `image`.
pub fn derived_path(image: &Path, transform: Transform) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match image.extension() {
        Some(ext) => format!("{}{}.{}", stem, transform.suffix(), ext.to_string_lossy()),
        None => format!("{}{}", stem, transform.suffix()),
    };
    image.with_file_name(name)
}

/// Decode `source`, apply `transform` and save to `target`. Returns the new dimensions.
pub fn write_transformed_image(source: &Path, target: &Path, transform: Transform) -> Result<ImageInfo> {
    let img = image::open(source).map_err(|e| AnnotationError::Image {
        path: source.to_path_buf(),
        source: e,
    })?;
    let out = match transform {
        Transform::Rotate90 => img.rotate90(),
        Transform::Rotate180 => img.rotate180(),
        Transform::Rotate270 => img.rotate270(),
        Transform::FlipHorizontal => img.fliph(),
        Transform::FlipVertical => img.flipv(),
    };
    out.save(target).map_err(|e| AnnotationError::Image {
        path: target.to_path_buf(),
        source: e,
    })?;
    Ok(ImageInfo::new(out.width(), out.height()))
}
