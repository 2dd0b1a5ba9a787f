// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Per-class statistics gathered from every structured annotation file.

use super::{BatchOutcome, JobControl};
use crate::io::serialization::read_annotation_file;
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Pixel size of a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub class_idx: usize,
    pub name: String,
    /// Number of marks.
    pub count: usize,
    /// Number of images with at least one mark of this class.
    pub images: usize,
    pub min_size: Size,
    pub avg_width: f64,
    pub avg_height: f64,
    pub max_size: Size,
    pub sd_width: f64,
    pub sd_height: f64,
    /// Image holding the smallest mark.
    pub min_filename: PathBuf,
    /// Image holding the largest mark.
    pub max_filename: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsReport {
    pub classes: Vec<ClassStats>,
    pub images: usize,
    pub annotated: usize,
    pub completely_empty: usize,
    /// Files that could not be parsed.
    pub unreadable: usize,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    images: usize,
    sum_w: f64,
    sum_h: f64,
    sum_w2: f64,
    sum_h2: f64,
    min: Option<(Size, PathBuf)>,
    max: Option<(Size, PathBuf)>,
}

impl Accumulator {
    fn add(&mut self, size: Size, image: &Path) {
        self.count += 1;
        let (w, h) = (size.width as f64, size.height as f64);
        self.sum_w += w;
        self.sum_h += h;
        self.sum_w2 += w * w;
        self.sum_h2 += h * h;
        if self.min.as_ref().map_or(true, |(s, _)| size.area() < s.area()) {
            self.min = Some((size, image.to_path_buf()));
        }
        if self.max.as_ref().map_or(true, |(s, _)| size.area() > s.area()) {
            self.max = Some((size, image.to_path_buf()));
        }
    }

    fn finish(self, class_idx: usize, classes: &ClassTable) -> ClassStats {
        let n = self.count.max(1) as f64;
        let (avg_w, avg_h) = (self.sum_w / n, self.sum_h / n);
        let sd = |sum2: f64, avg: f64| (sum2 / n - avg * avg).max(0.0).sqrt();
        let (min_size, min_filename) = self.min.unwrap_or_default();
        let (max_size, max_filename) = self.max.unwrap_or_default();
        ClassStats {
            class_idx,
            name: classes.display_name(class_idx),
            count: self.count,
            images: self.images,
            min_size,
            avg_width: avg_w,
            avg_height: avg_h,
            max_size,
            sd_width: sd(self.sum_w2, avg_w),
            sd_height: sd(self.sum_h2, avg_h),
            min_filename,
            max_filename,
        }
    }
}

/// Read every structured file and accumulate per-class numbers.
pub fn gather_statistics(
    images: &[PathBuf],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<StatsReport> {
    let total = images.len();
    let mut report = StatsReport {
        images: total,
        ..Default::default()
    };
    let mut per_class: BTreeMap<usize, Accumulator> = BTreeMap::new();

    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        control.report(i + 1, total);

        let file = match read_annotation_file(&Sidecars::for_image(image).json) {
            Ok(Some(file)) => file,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("{}", e);
                report.unreadable += 1;
                continue;
            }
        };

        if file.is_completely_empty() {
            report.completely_empty += 1;
            continue;
        }
        if file.mark.is_empty() {
            continue;
        }
        report.annotated += 1;

        let mut seen_here = Vec::new();
        for record in &file.mark {
            let px = record.normalized_rect().to_pixels(file.image.width, file.image.height);
            let size = Size {
                width: px.w.max(0) as u32,
                height: px.h.max(0) as u32,
            };
            let acc = per_class.entry(record.class_idx).or_default();
            acc.add(size, image);
            if !seen_here.contains(&record.class_idx) {
                seen_here.push(record.class_idx);
                acc.images += 1;
            }
        }
    }

    report.classes = per_class
        .into_iter()
        .map(|(class_idx, acc)| acc.finish(class_idx, classes))
        .collect();
    log::info!(
        "statistics: {} images, {} annotated, {} empty, {} classes in use",
        report.images,
        report.annotated,
        report.completely_empty,
        report.classes.len()
    );
    BatchOutcome::Completed(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serialization::{write_sidecars, AnnotationFile};
    use crate::models::mark::Mark;
    use crate::models::project::ImageInfo;
    use crate::util::geometry::Rect;

    #[test]
    fn test_statistics_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        let c = dir.path().join("c.jpg");
        let info = ImageInfo::new(100, 100);

        let marks_a = vec![
            Mark::from_rect(Rect::new(0.0, 0.0, 0.1, 0.2), 0, "car"),
            Mark::from_rect(Rect::new(0.5, 0.5, 0.3, 0.4), 0, "car"),
        ];
        let marks_b = vec![
            Mark::from_rect(Rect::new(0.0, 0.0, 0.2, 0.3), 0, "car"),
            Mark::from_rect(Rect::new(0.5, 0.5, 0.1, 0.1), 1, "person"),
        ];
        write_sidecars(&Sidecars::for_image(&a), AnnotationFile::from_marks(&marks_a, &info, 0, false).as_ref()).unwrap();
        write_sidecars(&Sidecars::for_image(&b), AnnotationFile::from_marks(&marks_b, &info, 0, false).as_ref()).unwrap();
        write_sidecars(&Sidecars::for_image(&c), AnnotationFile::from_marks(&[], &info, 0, true).as_ref()).unwrap();

        let classes = ClassTable::new(["car", "person"]);
        let report = gather_statistics(&[a.clone(), b.clone(), c], &classes, &JobControl::detached())
            .completed()
            .unwrap();

        assert_eq!(report.images, 3);
        assert_eq!(report.annotated, 2);
        assert_eq!(report.completely_empty, 1);
        assert_eq!(report.classes.len(), 2);

        let car = &report.classes[0];
        assert_eq!(car.name, "car");
        assert_eq!(car.count, 3);
        assert_eq!(car.images, 2);
        assert_eq!(car.min_size, Size { width: 10, height: 20 });
        assert_eq!(car.max_size, Size { width: 30, height: 40 });
        assert_eq!(car.min_filename, a);
        assert_eq!(car.max_filename, a);
        assert!((car.avg_width - 20.0).abs() < 1e-6);
        assert!((car.avg_height - 30.0).abs() < 1e-6);
        assert!((car.sd_width - (200.0f64 / 3.0).sqrt()).abs() < 1e-6);

        let person = &report.classes[1];
        assert_eq!(person.count, 1);
        assert_eq!(person.min_filename, b);
        assert_eq!(person.sd_width, 0.0);
    }
}
