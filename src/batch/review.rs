// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Review pass: one row per mark across the whole collection.

use super::{BatchOutcome, JobControl};
use crate::io::serialization::{read_annotation_file, AnnotationFile};
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::util::geometry::{Rect, GEOMETRY_EPSILON};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Overlap share from which a mark is flagged as a possible duplicate.
pub const OVERLAP_WARNING: f64 = 0.10;

/// Marks narrower or shorter than this share of the image are flagged.
pub const TINY_WARNING: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub image: PathBuf,
    pub mark_index: usize,
    pub class_idx: usize,
    pub name: String,
    pub rect: Rect,
    pub pixel_width: i32,
    pub pixel_height: i32,
    pub aspect_ratio: f64,
    /// Sum of intersections with the other marks of the image, as a share
    /// of this mark's own area.
    pub overlap_sum: f64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewReport {
    pub rows: Vec<ReviewRow>,
    /// Structured files that could not be parsed.
    pub unreadable: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewColumn {
    Image,
    Class,
    Size,
    AspectRatio,
    Overlap,
    Warnings,
    Errors,
}

fn rows_for_file(image: &Path, file: &AnnotationFile, classes: &ClassTable) -> Vec<ReviewRow> {
    let rects: Vec<Rect> = file.mark.iter().map(|r| r.normalized_rect()).collect();

    file.mark
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let rect = rects[idx];
            let px = rect.to_pixels(file.image.width, file.image.height);
            let aspect_ratio = if px.h > 0 { px.w as f64 / px.h as f64 } else { 0.0 };

            let area = rect.area();
            let overlap_sum = if area > GEOMETRY_EPSILON {
                rects
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != idx)
                    .filter_map(|(_, r)| rect.intersection(r))
                    .map(|i| i.area())
                    .sum::<f64>()
                    / area
            } else {
                0.0
            };

            let mut warnings = Vec::new();
            let mut errors = Vec::new();
            if overlap_sum >= OVERLAP_WARNING {
                warnings.push(format!("overlaps other marks by {:.0}%", overlap_sum * 100.0));
            }
            if rect.w < TINY_WARNING || rect.h < TINY_WARNING {
                warnings.push("very small mark".to_string());
            }
            if !rect.is_within_unit() {
                errors.push("mark extends outside the image".to_string());
            }
            if area <= GEOMETRY_EPSILON * GEOMETRY_EPSILON {
                errors.push("mark has zero area".to_string());
            }
            if !classes.is_assignable(record.class_idx) {
                errors.push(format!("class #{} is not defined", record.class_idx));
            }

            ReviewRow {
                image: image.to_path_buf(),
                mark_index: idx,
                class_idx: record.class_idx,
                name: classes.display_name(record.class_idx),
                rect,
                pixel_width: px.w,
                pixel_height: px.h,
                aspect_ratio,
                overlap_sum,
                warnings,
                errors,
            }
        })
        .collect()
}

/// Build the review table for every image.
pub fn review_marks(
    images: &[PathBuf],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<ReviewReport> {
    let total = images.len();
    let mut report = ReviewReport::default();

    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        control.report(i + 1, total);

        let json = Sidecars::for_image(image).json;
        match read_annotation_file(&json) {
            Ok(Some(file)) => report.rows.extend(rows_for_file(image, &file, classes)),
            Ok(None) => {}
            Err(e) => {
                log::warn!("{}", e);
                report.unreadable.push(json);
            }
        }
    }

    log::info!("review: {} marks in {} images", report.rows.len(), total);
    BatchOutcome::Completed(report)
}

fn compare(a: &ReviewRow, b: &ReviewRow, column: ReviewColumn) -> Ordering {
    match column {
        ReviewColumn::Image => a.image.cmp(&b.image).then(a.mark_index.cmp(&b.mark_index)),
        ReviewColumn::Class => a.class_idx.cmp(&b.class_idx),
        ReviewColumn::Size => (a.pixel_width as i64 * a.pixel_height as i64)
            .cmp(&(b.pixel_width as i64 * b.pixel_height as i64)),
        ReviewColumn::AspectRatio => a.aspect_ratio.total_cmp(&b.aspect_ratio),
        ReviewColumn::Overlap => a.overlap_sum.total_cmp(&b.overlap_sum),
        ReviewColumn::Warnings => a.warnings.len().cmp(&b.warnings.len()),
        ReviewColumn::Errors => a.errors.len().cmp(&b.errors.len()),
    }
}

/// Stable re-sort of the table by one column.
pub fn sort_rows(rows: &mut [ReviewRow], column: ReviewColumn, ascending: bool) {
    rows.sort_by(|a, b| {
        let ord = compare(a, b, column);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}
