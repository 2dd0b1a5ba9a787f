// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Neural-network predictions.
//!
//! The inference engine itself is external: anything implementing
//! [`Detector`] can be plugged into a session. This module turns its raw
//! pixel-space output into provisional marks and merges them with the
//! confirmed marks already loaded for the image.

use crate::error::Result;
use crate::models::classes::ClassTable;
use crate::models::mark::Mark;
use crate::models::project::ImageInfo;
use crate::util::geometry::PixelRect;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const THRESHOLD_STEP: f32 = 0.05;
pub const MIN_THRESHOLD: f32 = 0.05;
pub const MAX_THRESHOLD: f32 = 0.95;

/// One object found by the detector, in pixels of the untiled image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rect: PixelRect,
    pub class_idx: usize,
    /// Label shown for the prediction, usually name and confidence.
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub threshold: f32,
    pub hierarchy_threshold: f32,
    pub nms_threshold: f32,
    pub enable_tiles: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            hierarchy_threshold: 0.5,
            nms_threshold: 0.45,
            enable_tiles: false,
        }
    }
}

impl DetectorConfig {
    /// Step the detection threshold up or down. Returns true if it changed.
    pub fn adjust_threshold(&mut self, increase: bool) -> bool {
        let step = if increase { THRESHOLD_STEP } else { -THRESHOLD_STEP };
        // round to whole percent so repeated steps do not drift
        let value = ((self.threshold + step) * 100.0).round() / 100.0;
        let value = value.clamp(MIN_THRESHOLD, MAX_THRESHOLD);
        if (value - self.threshold).abs() < f32::EPSILON {
            return false;
        }
        log::info!("detection threshold changed from {:.2} to {:.2}", self.threshold, value);
        self.threshold = value;
        true
    }
}

/// Black-box inference engine.
pub trait Detector {
    fn config(&self) -> &DetectorConfig;

    fn config_mut(&mut self) -> &mut DetectorConfig;

    /// Run inference on one image. Blocks until the engine answers.
    fn predict(&mut self, image: &Path, info: &ImageInfo) -> Result<Vec<Detection>>;
}

/// Outcome of merging one batch of detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub added: usize,
    /// Dropped because a confirmed mark already covers the same box and class.
    pub duplicates: usize,
    /// Dropped because the class index is not in the class table.
    pub unknown_class: usize,
}

/// Convert one detection into a provisional mark.
pub fn detection_to_mark(detection: &Detection, image: &ImageInfo, classes: &ClassTable) -> Mark {
    let name = classes.display_name(detection.class_idx);
    let mut mark = Mark::from_pixel_rect(
        detection.rect,
        image.width,
        image.height,
        detection.class_idx,
        name.clone(),
    );
    mark.is_prediction = true;
    mark.description = if detection.label.is_empty() {
        format!("{} {:.0}%", name, detection.confidence * 100.0)
    } else {
        detection.label.clone()
    };
    mark
}

/// Add detections to `marks` as predictions, skipping any that duplicate a
/// confirmed mark, then re-sort the whole list.
pub fn merge_predictions(
    marks: &mut Vec<Mark>,
    detections: &[Detection],
    image: &ImageInfo,
    classes: &ClassTable,
) -> MergeReport {
    let mut report = MergeReport::default();

    for detection in detections {
        if !classes.is_assignable(detection.class_idx) {
            log::warn!(
                "ignoring prediction with class #{} beyond the class table",
                detection.class_idx
            );
            report.unknown_class += 1;
            continue;
        }

        let candidate = detection_to_mark(detection, image, classes);
        let duplicate = marks
            .iter()
            .any(|m| m.is_confirmed() && m.same_geometry(&candidate));
        if duplicate {
            report.duplicates += 1;
            continue;
        }
        marks.push(candidate);
        report.added += 1;
    }

    sort_marks(marks);
    log::debug!(
        "merged predictions: {} added, {} duplicates, {} unknown class",
        report.added,
        report.duplicates,
        report.unknown_class
    );
    report
}

/// Order marks top-to-bottom then left-to-right on the coarse grid.
/// The sort is stable, so marks sharing a cell keep their relative order.
pub fn sort_marks(marks: &mut [Mark]) {
    marks.sort_by_key(|m| m.grid_position());
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AnnotationError;
    use crate::util::geometry::Rect;

    /// Detector returning a fixed answer, or failing when `fail` is set.
    pub(crate) struct FakeDetector {
        pub config: DetectorConfig,
        pub detections: Vec<Detection>,
        pub fail: bool,
        pub calls: usize,
    }

    impl FakeDetector {
        pub(crate) fn new(detections: Vec<Detection>) -> Self {
            Self {
                config: DetectorConfig::default(),
                detections,
                fail: false,
                calls: 0,
            }
        }
    }

    impl Detector for FakeDetector {
        fn config(&self) -> &DetectorConfig {
            &self.config
        }

        fn config_mut(&mut self) -> &mut DetectorConfig {
            &mut self.config
        }

        fn predict(&mut self, _image: &Path, _info: &ImageInfo) -> Result<Vec<Detection>> {
            self.calls += 1;
            if self.fail {
                return Err(AnnotationError::Detector("engine crashed".to_string()));
            }
            Ok(self.detections.clone())
        }
    }

    pub(crate) fn detection(x: i32, y: i32, w: i32, h: i32, class_idx: usize) -> Detection {
        Detection {
            rect: PixelRect { x, y, w, h },
            class_idx,
            label: String::new(),
            confidence: 0.9,
        }
    }

    fn classes() -> ClassTable {
        ClassTable::new(["car", "person", "dog"])
    }

    #[test]
    fn test_detection_becomes_prediction() {
        let image = ImageInfo::new(200, 100);
        let mark = detection_to_mark(&detection(20, 10, 40, 50, 1), &image, &classes());
        assert!(mark.is_prediction);
        assert_eq!(mark.name, "person");
        assert_eq!(mark.description, "person 90%");
        assert!(mark.bounding_rect().approx_eq(&Rect::new(0.1, 0.1, 0.2, 0.5)));
    }

    #[test]
    fn test_duplicate_of_confirmed_mark_is_dropped() {
        let image = ImageInfo::new(200, 100);
        let mut marks = vec![Mark::from_rect(Rect::new(0.1, 0.1, 0.2, 0.5), 1, "person")];
        let report = merge_predictions(
            &mut marks,
            &[detection(20, 10, 40, 50, 1), detection(20, 10, 40, 50, 0)],
            &image,
            &classes(),
        );
        assert_eq!(report, MergeReport { added: 1, duplicates: 1, unknown_class: 0 });
        assert_eq!(marks.len(), 2);
        assert_eq!(marks.iter().filter(|m| m.is_confirmed()).count(), 1);
        assert!(marks.iter().any(|m| m.is_prediction && m.class_idx == 0));
    }

    #[test]
    fn test_unknown_class_is_skipped() {
        let mut marks = Vec::new();
        let report = merge_predictions(
            &mut marks,
            &[detection(0, 0, 10, 10, 3)],
            &ImageInfo::new(100, 100),
            &classes(),
        );
        assert_eq!(report.unknown_class, 1);
        assert!(marks.is_empty());
    }

    #[test]
    fn test_merged_marks_are_in_reading_order() {
        let image = ImageInfo::new(100, 100);
        let mut marks = vec![Mark::from_rect(Rect::new(0.7, 0.7, 0.1, 0.1), 0, "car")];
        merge_predictions(
            &mut marks,
            &[detection(70, 5, 10, 10, 2), detection(5, 5, 10, 10, 1)],
            &image,
            &classes(),
        );
        let order: Vec<usize> = marks.iter().map(|m| m.class_idx).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_threshold_steps_are_clamped() {
        let mut config = DetectorConfig::default();
        assert!(config.adjust_threshold(true));
        assert!((config.threshold - 0.55).abs() < 1e-6);

        config.threshold = 0.95;
        assert!(!config.adjust_threshold(true));
        config.threshold = 0.05;
        assert!(!config.adjust_threshold(false));
        assert!((config.threshold - 0.05).abs() < 1e-6);
    }
}
