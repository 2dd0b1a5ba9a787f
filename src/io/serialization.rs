// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sidecar annotation serialization and deserialization.
//!
//! Each image has up to two sidecar files sharing its base name:
//!
//! - a structured JSON file, lossless for full point lists, carrying both
//!   normalized and pixel coordinates;
//! - a plain-text file for Darknet/YOLO trainers, one
//!   `class_idx center_x center_y width height` line per confirmed mark.
//!
//! The structured file is authoritative when both exist. Predictions are
//! never written. An image with no confirmed marks that is not flagged as
//! completely empty has no sidecar files at all.

use crate::error::{AnnotationError, Result};
use crate::io::files::{remove_if_exists, write_whole_file};
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::models::mark::{Mark, Point};
use crate::models::project::ImageInfo;
use crate::util::geometry::Rect;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Version string stamped into every structured file.
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Structured per-image annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mark: Vec<MarkRecord>,
    #[serde(default)]
    pub image: ImageRecord,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub completely_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRecord {
    pub class_idx: usize,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rect: RectRecord,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: Vec<PointRecord>,
}

/// Bounding rectangle; the `int_*` fields are informational pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RectRecord {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub int_x: i32,
    pub int_y: i32,
    pub int_w: i32,
    pub int_h: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub int_x: i32,
    #[serde(default)]
    pub int_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecord {
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AnnotationFile {
    /// Build the structured record for the confirmed marks in `marks`.
    ///
    /// Returns `None` when there is nothing worth storing: zero confirmed
    /// marks on an image that is not flagged as completely empty.
    pub fn from_marks(
        marks: &[Mark],
        image: &ImageInfo,
        timestamp: i64,
        completely_empty: bool,
    ) -> Option<Self> {
        let records: Vec<MarkRecord> = marks
            .iter()
            .filter(|m| m.is_confirmed())
            .map(|m| MarkRecord::from_mark(m, image))
            .collect();

        if records.is_empty() && !completely_empty {
            return None;
        }

        Some(Self {
            completely_empty: records.is_empty() && completely_empty,
            mark: records,
            image: ImageRecord {
                scale: image.scale,
                width: image.width,
                height: image.height,
            },
            timestamp,
            version: FORMAT_VERSION.to_string(),
        })
    }

    /// Rebuild confirmed marks. Records without points fall back to their rectangle.
    pub fn to_marks(&self, classes: &ClassTable) -> Vec<Mark> {
        self.mark.iter().map(|r| r.to_mark(classes)).collect()
    }

    /// True when the image was explicitly flagged as a negative sample.
    pub fn is_completely_empty(&self) -> bool {
        self.mark.is_empty() && self.completely_empty
    }
}

impl MarkRecord {
    fn from_mark(mark: &Mark, image: &ImageInfo) -> Self {
        let r = mark.bounding_rect();
        let px = r.to_pixels(image.width, image.height);
        let points = mark
            .normalized_all_points
            .iter()
            .map(|p| PointRecord {
                x: p.x,
                y: p.y,
                // not used when loading, kept for third-party readers
                int_x: (p.x * image.width as f64).round() as i32,
                int_y: (p.y * image.height as f64).round() as i32,
            })
            .collect();

        Self {
            class_idx: mark.class_idx,
            name: mark.name.clone(),
            rect: RectRecord {
                x: r.x,
                y: r.y,
                w: r.w,
                h: r.h,
                int_x: px.x,
                int_y: px.y,
                int_w: px.w,
                int_h: px.h,
            },
            points,
        }
    }

    fn to_mark(&self, classes: &ClassTable) -> Mark {
        let name = if self.name.is_empty() {
            classes.display_name(self.class_idx)
        } else {
            self.name.clone()
        };

        if self.points.is_empty() {
            let rect = Rect::new(self.rect.x, self.rect.y, self.rect.w, self.rect.h);
            return Mark::from_rect(rect, self.class_idx, name);
        }

        let points = self.points.iter().map(|p| Point::new(p.x, p.y)).collect();
        Mark::from_points(points, self.class_idx, name)
    }

    /// Normalized bounding rectangle, derived from the points when present.
    pub fn normalized_rect(&self) -> Rect {
        let points: Vec<Point> = self.points.iter().map(|p| Point::new(p.x, p.y)).collect();
        Rect::from_points(&points)
            .unwrap_or_else(|| Rect::new(self.rect.x, self.rect.y, self.rect.w, self.rect.h))
    }
}

/// Encode as tab-indented JSON followed by a newline.
pub fn encode_json(file: &AnnotationFile) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    file.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Parse the content of a structured file.
pub fn parse_json(content: &str, path: &Path) -> Result<AnnotationFile> {
    serde_json::from_str(content).map_err(|source| AnnotationError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a structured file; `Ok(None)` means the image is not annotated yet.
pub fn read_annotation_file(path: &Path) -> Result<Option<AnnotationFile>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_json(&content, path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AnnotationError::io("loading json file", path, e)),
    }
}

/// Count the marks recorded in a structured file.
///
/// A completely-empty image counts as one mark. With `for_sorting`, images
/// with marks get one extra so they never tie with completely-empty ones.
pub fn count_marks(path: &Path, for_sorting: bool) -> Result<usize> {
    let Some(file) = read_annotation_file(path)? else {
        return Ok(0);
    };
    let mut count = file.mark.len();
    if count > 0 && for_sorting {
        count += 1;
    }
    if count == 0 && file.completely_empty {
        count = 1;
    }
    Ok(count)
}

/// Plain-text lines for every record: `class cx cy w h`, 10 decimals.
pub fn encode_text(file: &AnnotationFile) -> String {
    let mut out = String::new();
    for record in &file.mark {
        let r = record.normalized_rect();
        let c = r.center();
        out.push_str(&format!(
            "{} {:.10} {:.10} {:.10} {:.10}\n",
            record.class_idx, c.x, c.y, r.w, r.h
        ));
    }
    out
}

/// Parse a plain-text sidecar. Any invalid line invalidates the whole file.
pub fn parse_text(content: &str, path: &Path, classes: &ClassTable) -> Result<Vec<Mark>> {
    let mut marks = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let invalid = |message: String| AnnotationError::MalformedText {
            path: path.to_path_buf(),
            line: line_idx + 1,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        }
        let class_idx: usize = fields[0]
            .parse()
            .map_err(|_| invalid(format!("invalid class \"{}\"", fields[0])))?;
        let mut values = [0.0f64; 4];
        for (value, field) in values.iter_mut().zip(&fields[1..5]) {
            *value = field
                .parse()
                .map_err(|_| invalid(format!("invalid number \"{}\"", field)))?;
        }
        let [x, y, w, h] = values;

        if !classes.is_assignable(class_idx) {
            return Err(invalid(format!(
                "references class #{} but only {} classes are defined",
                class_idx,
                classes.len()
            )));
        }
        if x <= 0.0 || y <= 0.0 || w <= 0.0 || h <= 0.0 {
            return Err(invalid(format!(
                "invalid coordinates x={} y={} w={} h={}",
                x, y, w, h
            )));
        }

        marks.push(Mark::from_rect(
            Rect::from_center(x, y, w, h),
            class_idx,
            classes.display_name(class_idx),
        ));
    }
    Ok(marks)
}

/// Read a plain-text sidecar; `Ok(None)` when it does not exist.
pub fn read_text_file(path: &Path, classes: &ClassTable) -> Result<Option<Vec<Mark>>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_text(&content, path, classes).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AnnotationError::io("importing text file", path, e)),
    }
}

/// What was found on disk for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAnnotations {
    Structured(AnnotationFile),
    /// Text-only marks; an empty list means an explicit negative sample.
    Text(Vec<Mark>),
    Missing,
}

/// Load the structured file, falling back to the text file only when the
/// structured file does not exist.
pub fn read_sidecars(sidecars: &Sidecars, classes: &ClassTable) -> Result<LoadedAnnotations> {
    if let Some(file) = read_annotation_file(&sidecars.json)? {
        return Ok(LoadedAnnotations::Structured(file));
    }
    match read_text_file(&sidecars.text, classes)? {
        Some(marks) => Ok(LoadedAnnotations::Text(marks)),
        None => Ok(LoadedAnnotations::Missing),
    }
}

/// Write both sidecars from `file`, or delete both when `file` is `None`.
pub fn write_sidecars(sidecars: &Sidecars, file: Option<&AnnotationFile>) -> Result<()> {
    match file {
        Some(file) => {
            let json = encode_json(file)
                .map_err(|e| AnnotationError::io("encoding json file", &sidecars.json, e.into()))?;
            write_whole_file(&sidecars.json, &json)?;
            write_whole_file(&sidecars.text, encode_text(file).as_bytes())?;
        }
        None => {
            remove_if_exists(&sidecars.json)?;
            remove_if_exists(&sidecars.text)?;
        }
    }
    Ok(())
}
