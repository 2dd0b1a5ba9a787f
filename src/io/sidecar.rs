// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sidecar file naming.

use std::path::{Path, PathBuf};

pub const JSON_EXTENSION: &str = "json";
pub const TEXT_EXTENSION: &str = "txt";

/// An image and the two annotation files sharing its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecars {
    pub image: PathBuf,
    pub json: PathBuf,
    pub text: PathBuf,
}

impl Sidecars {
    pub fn for_image(image: &Path) -> Self {
        Self {
            image: image.to_path_buf(),
            json: image.with_extension(JSON_EXTENSION),
            text: image.with_extension(TEXT_EXTENSION),
        }
    }

    /// Image followed by both sidecars, for moving or trashing as a unit.
    pub fn all(&self) -> [&Path; 3] {
        [&self.image, &self.json, &self.text]
    }
}
