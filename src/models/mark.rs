// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Mark data structures.
//!
//! A mark is one annotated region (a rectangle or polygon in normalized
//! image coordinates) with a class label and a provenance flag telling
//! machine predictions apart from confirmed marks.

use crate::util::geometry::{grid_key, normalize_coordinates, PixelRect, Rect};

/// A 2D point with normalized coordinates (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into the unit square.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

/// A single annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub class_idx: usize,
    /// Canonical class name.
    pub name: String,
    /// Display label; predictions carry the detector's label here.
    pub description: String,
    pub normalized_all_points: Vec<Point>,
    /// Machine generated and not yet accepted by a human.
    pub is_prediction: bool,
}

impl Mark {
    /// Create a confirmed rectangular mark.
    pub fn from_rect(rect: Rect, class_idx: usize, name: impl Into<String>) -> Self {
        Self::from_points(rect.corners().to_vec(), class_idx, name)
    }

    /// Create a confirmed mark from an arbitrary point list.
    pub fn from_points(points: Vec<Point>, class_idx: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            class_idx,
            description: name.clone(),
            name,
            normalized_all_points: points,
            is_prediction: false,
        }
    }

    /// Create a mark from a pixel-space box, clamped to the image.
    pub fn from_pixel_rect(
        pixels: PixelRect,
        image_width: u32,
        image_height: u32,
        class_idx: usize,
        name: impl Into<String>,
    ) -> Self {
        let (x, y) = (pixels.x as f64, pixels.y as f64);
        let tl = normalize_coordinates(x, y, image_width, image_height).clamped();
        let br = normalize_coordinates(x + pixels.w as f64, y + pixels.h as f64, image_width, image_height)
            .clamped();
        let rect = Rect::new(tl.x, tl.y, br.x - tl.x, br.y - tl.y);
        Self::from_rect(rect, class_idx, name)
    }

    pub fn is_confirmed(&self) -> bool {
        !self.is_prediction
    }

    /// Normalized bounding rectangle of all points.
    pub fn bounding_rect(&self) -> Rect {
        Rect::from_points(&self.normalized_all_points).unwrap_or_default()
    }

    pub fn midpoint(&self) -> Point {
        self.bounding_rect().center()
    }

    /// Sort key placing marks top-to-bottom then left-to-right on a coarse grid.
    pub fn grid_position(&self) -> (i64, i64) {
        grid_key(&self.midpoint())
    }

    /// Same class and same bounding rectangle (within the geometry tolerance).
    pub fn same_geometry(&self, other: &Mark) -> bool {
        self.class_idx == other.class_idx && self.bounding_rect().approx_eq(&other.bounding_rect())
    }

    /// Turn a prediction into a confirmed mark named after its class.
    pub fn accept(&mut self, canonical_name: &str) {
        self.is_prediction = false;
        self.rename(canonical_name);
    }

    /// Reassign the class, snapping both display strings to the class name.
    pub fn set_class(&mut self, class_idx: usize, canonical_name: &str) {
        self.class_idx = class_idx;
        self.rename(canonical_name);
    }

    fn rename(&mut self, canonical_name: &str) {
        self.name = canonical_name.to_string();
        self.description = canonical_name.to_string();
    }
}
