// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Project state types.
//!
//! Small value types shared by the store, the navigator and the batch
//! operations: the dimensions of the image being annotated, the collection
//! sort order and traversal direction.

use serde::{Deserialize, Serialize};

/// Size of the current image, as recorded in the structured sidecar file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Display scale of the editor when the file was written.
    pub scale: f64,
    /// The real image could not be read and a sentinel size stands in for it.
    pub is_placeholder: bool,
}

impl ImageInfo {
    /// Create image info for an image of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
            is_placeholder: false,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Order in which the image collection is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Alphabetical,
    Random,
    CountMarks,
    Timestamp,
}

impl SortOrder {
    /// Orders that need a pass over every file to compute their keys.
    pub fn needs_full_pass(self) -> bool {
        matches!(self, SortOrder::CountMarks | SortOrder::Timestamp)
    }
}

/// Traversal direction for navigation and selection cycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}
