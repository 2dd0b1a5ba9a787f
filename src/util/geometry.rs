// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides utilities for coordinate transformations between
//! pixel coordinates and normalized coordinates, plus the rectangle math
//! used by the codecs, the prediction merge and the review pass.

use crate::models::mark::Point;

/// Tolerance used when comparing normalized geometry for equality.
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// Number of buckets across the image used to order marks top-to-bottom,
/// left-to-right.
pub const GRID_BUCKETS: f64 = 15.0;

/// Axis-aligned rectangle in normalized coordinates (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Axis-aligned rectangle in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Build a rectangle from its center point and size.
    pub fn from_center(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    /// Bounding rectangle of a point list, or `None` for an empty list.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    /// Overlapping region of two rectangles, if they overlap at all.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Component-wise comparison within `GEOMETRY_EPSILON`.
    pub fn approx_eq(&self, other: &Rect) -> bool {
        (self.x - other.x).abs() < GEOMETRY_EPSILON
            && (self.y - other.y).abs() < GEOMETRY_EPSILON
            && (self.w - other.w).abs() < GEOMETRY_EPSILON
            && (self.h - other.h).abs() < GEOMETRY_EPSILON
    }

    /// True when every edge lies inside the unit square.
    pub fn is_within_unit(&self) -> bool {
        self.x >= -GEOMETRY_EPSILON
            && self.y >= -GEOMETRY_EPSILON
            && self.right() <= 1.0 + GEOMETRY_EPSILON
            && self.bottom() <= 1.0 + GEOMETRY_EPSILON
    }

    /// Convert to whole pixels for an image of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let (x, y) = denormalize_coordinates(&Point::new(self.x, self.y), width, height);
        PixelRect {
            x: x.round() as i32,
            y: y.round() as i32,
            w: (self.w * width as f64).round() as i32,
            h: (self.h * height as f64).round() as i32,
        }
    }
}

/// Convert pixel coordinates to normalized coordinates (0.0 to 1.0).
pub fn normalize_coordinates(pixel_x: f64, pixel_y: f64, width: u32, height: u32) -> Point {
    Point {
        x: pixel_x / width as f64,
        y: pixel_y / height as f64,
    }
}

/// Convert normalized coordinates to pixel coordinates.
pub fn denormalize_coordinates(point: &Point, width: u32, height: u32) -> (f64, f64) {
    (point.x * width as f64, point.y * height as f64)
}

/// Coarse (row, column) bucket of a normalized point.
///
/// Rounding to a 15-cell grid keeps the order stable when midpoints jitter
/// by a fraction of a pixel between loads.
pub fn grid_key(point: &Point) -> (i64, i64) {
    (
        (GRID_BUCKETS * point.y).round() as i64,
        (GRID_BUCKETS * point.x).round() as i64,
    )
}

/// Rotations and mirrorings applied when deriving new training images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
}

impl Transform {
    pub const ALL: [Transform; 5] = [
        Transform::Rotate90,
        Transform::Rotate180,
        Transform::Rotate270,
        Transform::FlipHorizontal,
        Transform::FlipVertical,
    ];

    /// Filename stem suffix given to derived images.
    pub fn suffix(&self) -> &'static str {
        match self {
            Transform::Rotate90 => "_r090",
            Transform::Rotate180 => "_r180",
            Transform::Rotate270 => "_r270",
            Transform::FlipHorizontal => "_fh",
            Transform::FlipVertical => "_fv",
        }
    }

    /// Map a normalized point into the transformed image (rotations are clockwise).
    pub fn apply(&self, p: &Point) -> Point {
        match self {
            Transform::Rotate90 => Point::new(1.0 - p.y, p.x),
            Transform::Rotate180 => Point::new(1.0 - p.x, 1.0 - p.y),
            Transform::Rotate270 => Point::new(p.y, 1.0 - p.x),
            Transform::FlipHorizontal => Point::new(1.0 - p.x, p.y),
            Transform::FlipVertical => Point::new(p.x, 1.0 - p.y),
        }
    }

    /// Whether the transformed image swaps width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Transform::Rotate90 | Transform::Rotate270)
    }

    /// True when the file stem already carries one of the derived-image suffixes.
    pub fn is_derived_stem(stem: &str) -> bool {
        Self::ALL.iter().any(|t| stem.ends_with(t.suffix()))
    }
}
