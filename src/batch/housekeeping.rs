// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Collection-wide housekeeping: importing and re-saving annotations,
//! moving negative samples aside, and creating or removing rotated and
//! flipped copies of annotated images.
//!
//! Every file is written whole. A cancelled job leaves the files it already
//! finished untouched and never starts the next one.

use super::{BatchOutcome, JobControl};
use crate::error::Result;
use crate::io::files::move_group_with_unique_stem;
use crate::io::media::{derived_path, placeholder_info, read_image_info, write_transformed_image};
use crate::io::serialization::{
    read_annotation_file, read_sidecars, read_text_file, write_sidecars, AnnotationFile,
    LoadedAnnotations,
};
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::models::mark::Mark;
use crate::models::project::ImageInfo;
use crate::util::geometry::Transform;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HousekeepingReport {
    /// Images looked at.
    pub examined: usize,
    /// Images written, moved or created.
    pub changed: Vec<PathBuf>,
    /// Images that could not be processed.
    pub failed: usize,
}

fn image_info_or_placeholder(image: &Path) -> ImageInfo {
    read_image_info(image).unwrap_or_else(|e| {
        log::warn!("{}", e);
        placeholder_info()
    })
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Run `step` for each image, handling cancellation, progress and failures.
/// `step` returns true when it changed something for that image.
fn for_each_image<F>(images: &[PathBuf], control: &JobControl, mut step: F) -> BatchOutcome<HousekeepingReport>
where
    F: FnMut(&Path) -> Result<bool>,
{
    let total = images.len();
    let mut report = HousekeepingReport::default();
    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        match step(image) {
            Ok(true) => report.changed.push(image.clone()),
            Ok(false) => {}
            Err(e) => {
                log::warn!("{}", e);
                report.failed += 1;
            }
        }
        report.examined += 1;
        control.report(i + 1, total);
    }
    BatchOutcome::Completed(report)
}

/// Create the structured file for images that only have a plain-text one.
pub fn import_text_annotations(
    images: &[PathBuf],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    for_each_image(images, control, |image| {
        let sidecars = Sidecars::for_image(image);
        if sidecars.json.exists() {
            return Ok(false);
        }
        let Some(marks) = read_text_file(&sidecars.text, classes)? else {
            return Ok(false);
        };
        let info = image_info_or_placeholder(image);
        let file = AnnotationFile::from_marks(&marks, &info, now(), marks.is_empty());
        write_sidecars(&sidecars, file.as_ref())?;
        Ok(true)
    })
}

/// Load and save every image so both sidecars are in the current format.
pub fn reload_resave_every_image(
    images: &[PathBuf],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    for_each_image(images, control, |image| {
        let sidecars = Sidecars::for_image(image);
        let file = match read_sidecars(&sidecars, classes)? {
            LoadedAnnotations::Structured(file) => {
                let info = if file.image.width > 0 && file.image.height > 0 {
                    ImageInfo::new(file.image.width, file.image.height).with_scale(file.image.scale)
                } else {
                    image_info_or_placeholder(image)
                };
                AnnotationFile::from_marks(
                    &file.to_marks(classes),
                    &info,
                    file.timestamp,
                    file.is_completely_empty(),
                )
            }
            LoadedAnnotations::Text(marks) => {
                let info = image_info_or_placeholder(image);
                AnnotationFile::from_marks(&marks, &info, now(), marks.is_empty())
            }
            LoadedAnnotations::Missing => return Ok(false),
        };
        write_sidecars(&sidecars, file.as_ref())?;
        Ok(true)
    })
}

fn move_with_sidecars(image: &Path, dir: &Path) -> Result<()> {
    move_group_with_unique_stem(&Sidecars::for_image(image).all(), dir)?;
    Ok(())
}

/// Move `selected` images and their sidecars into `dir`, refusing when that
/// would leave the collection without images.
fn move_selected(
    images: &[PathBuf],
    selected: Vec<PathBuf>,
    dir: &Path,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    if !selected.is_empty() && selected.len() == images.len() {
        return BatchOutcome::Failed("refusing to move every image out of the project".to_string());
    }
    let mut outcome = for_each_image(&selected, control, |image| {
        move_with_sidecars(image, dir)?;
        Ok(true)
    });
    if let BatchOutcome::Completed(report) = &mut outcome {
        report.examined = images.len();
    }
    outcome
}

/// Move negative-sample images into `dir`.
pub fn move_empty_images(
    images: &[PathBuf],
    dir: &Path,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    let mut empty = Vec::new();
    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        match read_annotation_file(&Sidecars::for_image(image).json) {
            Ok(Some(file)) if file.is_completely_empty() => empty.push(image.clone()),
            Ok(_) => {}
            Err(e) => log::warn!("{}", e),
        }
    }
    log::info!("moving {} empty images to {}", empty.len(), dir.display());
    move_selected(images, empty, dir, control)
}

fn is_derived(image: &Path) -> bool {
    image
        .file_stem()
        .map(|s| Transform::is_derived_stem(&s.to_string_lossy()))
        .unwrap_or(false)
}

/// Move every rotated or flipped image, with its sidecars, into `trash_dir`.
pub fn delete_rotate_and_flip_images(
    images: &[PathBuf],
    trash_dir: &Path,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    let derived: Vec<PathBuf> = images.iter().filter(|p| is_derived(p)).cloned().collect();
    log::info!("removing {} rotated and flipped images", derived.len());
    move_selected(images, derived, trash_dir, control)
}

fn transformed_marks(marks: &[Mark], transform: Transform) -> Vec<Mark> {
    marks
        .iter()
        .map(|m| {
            let mut copy = m.clone();
            copy.normalized_all_points = m
                .normalized_all_points
                .iter()
                .map(|p| transform.apply(p))
                .collect();
            copy
        })
        .collect()
}

/// Write a transformed copy of every annotated, non-derived image.
/// Returns the new image paths in `changed`. Existing outputs are kept.
pub fn transform_images(
    images: &[PathBuf],
    transforms: &[Transform],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    let total = images.len();
    let mut report = HousekeepingReport::default();

    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        report.examined += 1;
        control.report(i + 1, total);
        if is_derived(image) {
            continue;
        }

        let file = match read_annotation_file(&Sidecars::for_image(image).json) {
            Ok(Some(file)) if !file.mark.is_empty() || file.is_completely_empty() => file,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("{}", e);
                report.failed += 1;
                continue;
            }
        };
        let marks = file.to_marks(classes);

        for &transform in transforms {
            let target = derived_path(image, transform);
            if target.exists() {
                log::debug!("{} already exists", target.display());
                continue;
            }
            let written = write_transformed_image(image, &target, transform).and_then(|info| {
                let new_file = AnnotationFile::from_marks(
                    &transformed_marks(&marks, transform),
                    &info,
                    now(),
                    file.is_completely_empty(),
                );
                write_sidecars(&Sidecars::for_image(&target), new_file.as_ref())
            });
            match written {
                Ok(()) => report.changed.push(target),
                Err(e) => {
                    log::warn!("{}", e);
                    report.failed += 1;
                }
            }
        }
    }

    log::info!("created {} transformed images", report.changed.len());
    BatchOutcome::Completed(report)
}

/// Rotate by the requested clockwise angles (90, 180, 270).
pub fn rotate_images(
    images: &[PathBuf],
    angles: &[u32],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    let transforms: Vec<Transform> = angles
        .iter()
        .filter_map(|a| match a {
            90 => Some(Transform::Rotate90),
            180 => Some(Transform::Rotate180),
            270 => Some(Transform::Rotate270),
            other => {
                log::warn!("ignoring unsupported rotation of {} degrees", other);
                None
            }
        })
        .collect();
    transform_images(images, &transforms, classes, control)
}

pub fn flip_images(
    images: &[PathBuf],
    horizontal: bool,
    vertical: bool,
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<HousekeepingReport> {
    let mut transforms = Vec::new();
    if horizontal {
        transforms.push(Transform::FlipHorizontal);
    }
    if vertical {
        transforms.push(Transform::FlipVertical);
    }
    transform_images(images, &transforms, classes, control)
}
