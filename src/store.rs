// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation store for the image currently being edited.
//!
//! The store is the single owner of the marks of one image at a time. Every
//! edit goes through it and sets the dirty flag; switching images flushes
//! pending changes before anything else is read from disk.

use crate::error::{AnnotationError, Result};
use crate::io::files::remove_if_exists;
use crate::io::serialization::{read_sidecars, write_sidecars, AnnotationFile, LoadedAnnotations};
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::models::mark::Mark;
use crate::models::project::{Direction, ImageInfo};
use crate::predict::{merge_predictions, sort_marks, Detection, MergeReport};
use std::path::Path;
use std::sync::Arc;

/// Lifecycle of the per-image session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unloaded,
    Loaded,
    LoadFailed,
    Dirty,
    Saved,
}

/// Which file the marks came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSource {
    Structured,
    Text,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub source: AnnotationSource,
    pub confirmed: usize,
    pub completely_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptTarget {
    One(usize),
    All,
}

pub struct AnnotationStore {
    classes: Arc<ClassTable>,
    sidecars: Option<Sidecars>,
    image: ImageInfo,
    marks: Vec<Mark>,
    selected_mark: Option<usize>,
    image_is_completely_empty: bool,
    need_to_save: bool,
    state: StoreState,
    /// Unix time of the last mutation, or the value read from disk.
    timestamp: i64,
    /// Confirmed marks take part in selection cycling.
    pub marks_are_shown: bool,
    /// Predictions take part in selection cycling.
    pub predictions_are_shown: bool,
}

impl AnnotationStore {
    pub fn new(classes: Arc<ClassTable>) -> Self {
        Self {
            classes,
            sidecars: None,
            image: ImageInfo::default(),
            marks: Vec::new(),
            selected_mark: None,
            image_is_completely_empty: false,
            need_to_save: false,
            state: StoreState::Unloaded,
            timestamp: 0,
            marks_are_shown: true,
            predictions_are_shown: true,
        }
    }

    pub fn classes(&self) -> &Arc<ClassTable> {
        &self.classes
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected_mark
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn need_to_save(&self) -> bool {
        self.need_to_save
    }

    pub fn is_completely_empty(&self) -> bool {
        self.image_is_completely_empty
    }

    pub fn image_info(&self) -> &ImageInfo {
        &self.image
    }

    pub fn current_image(&self) -> Option<&Path> {
        self.sidecars.as_ref().map(|s| s.image.as_path())
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn confirmed_count(&self) -> usize {
        self.marks.iter().filter(|m| m.is_confirmed()).count()
    }

    pub fn prediction_count(&self) -> usize {
        self.marks.iter().filter(|m| m.is_prediction).count()
    }

    fn touch(&mut self) {
        self.need_to_save = true;
        self.state = StoreState::Dirty;
        self.timestamp = chrono::Utc::now().timestamp();
    }

    fn reset(&mut self) {
        self.marks.clear();
        self.selected_mark = None;
        self.image_is_completely_empty = false;
        self.need_to_save = false;
        self.timestamp = 0;
    }

    /// Flush pending changes, then load the marks for `image`.
    ///
    /// A missing annotation is not an error. A malformed one is returned as
    /// an error with the store left on the new image with zero marks.
    pub fn load(&mut self, image: &Path, info: ImageInfo) -> Result<LoadReport> {
        self.flush()?;

        self.reset();
        let sidecars = Sidecars::for_image(image);
        self.image = info;

        let loaded = read_sidecars(&sidecars, &self.classes);
        let json_exists = sidecars.json.exists();
        let text_exists = sidecars.text.exists();
        self.sidecars = Some(sidecars);

        let source = match loaded {
            Ok(LoadedAnnotations::Structured(file)) => {
                self.marks = file.to_marks(&self.classes);
                self.image_is_completely_empty = file.is_completely_empty();
                self.timestamp = file.timestamp;
                // a file holding nothing should not exist; flushing removes it
                if self.marks.is_empty() && !self.image_is_completely_empty {
                    self.need_to_save = true;
                }
                AnnotationSource::Structured
            }
            Ok(LoadedAnnotations::Text(marks)) => {
                self.image_is_completely_empty = marks.is_empty();
                self.marks = marks;
                self.timestamp = chrono::Utc::now().timestamp();
                AnnotationSource::Text
            }
            Ok(LoadedAnnotations::Missing) => AnnotationSource::None,
            Err(e) => {
                self.state = StoreState::LoadFailed;
                log::warn!("{}", e);
                return Err(e);
            }
        };

        if json_exists != text_exists {
            // re-create the missing twin on the next flush
            self.need_to_save = true;
        }
        sort_marks(&mut self.marks);
        self.state = if self.need_to_save {
            StoreState::Dirty
        } else {
            StoreState::Loaded
        };

        Ok(LoadReport {
            source,
            confirmed: self.marks.len(),
            completely_empty: self.image_is_completely_empty,
        })
    }

    /// Write both sidecars from the confirmed marks, or delete them when
    /// there is nothing to store.
    pub fn save(&mut self) -> Result<()> {
        let Some(sidecars) = &self.sidecars else {
            return Ok(());
        };
        let file = AnnotationFile::from_marks(
            &self.marks,
            &self.image,
            self.timestamp,
            self.image_is_completely_empty,
        );
        write_sidecars(sidecars, file.as_ref())?;
        log::debug!(
            "saved {} marks for {}",
            file.as_ref().map(|f| f.mark.len()).unwrap_or(0),
            sidecars.image.display()
        );
        self.need_to_save = false;
        self.state = StoreState::Saved;
        Ok(())
    }

    /// Save only if there are unsaved changes.
    pub fn flush(&mut self) -> Result<()> {
        if self.need_to_save {
            self.save()?;
        }
        Ok(())
    }

    fn mark_mut(&mut self, mark_index: usize) -> Result<&mut Mark> {
        self.marks
            .get_mut(mark_index)
            .ok_or(AnnotationError::NoSuchMark(mark_index))
    }

    pub fn set_class(&mut self, mark_index: usize, class_idx: usize) -> Result<()> {
        if let Err(e) = self.classes.check_assignable(class_idx) {
            log::warn!("{}", e);
            return Err(e);
        }
        let name = self.classes.display_name(class_idx);
        self.mark_mut(mark_index)?.set_class(class_idx, &name);
        self.touch();
        Ok(())
    }

    pub fn delete_mark(&mut self, mark_index: usize) -> Result<Mark> {
        if mark_index >= self.marks.len() {
            return Err(AnnotationError::NoSuchMark(mark_index));
        }
        let mark = self.marks.remove(mark_index);
        self.selected_mark = None;
        self.touch();
        Ok(mark)
    }

    /// Confirm predictions. Returns how many marks changed.
    ///
    /// Accepting a single mark when that index does not exist falls back to
    /// accepting all. Accepting all does nothing while any confirmed mark
    /// exists.
    pub fn accept(&mut self, target: AcceptTarget) -> usize {
        match target {
            AcceptTarget::One(i) if i < self.marks.len() => {
                if !self.marks[i].is_prediction {
                    return 0;
                }
                let name = self.classes.display_name(self.marks[i].class_idx);
                self.marks[i].accept(&name);
                self.touch();
                1
            }
            _ => self.accept_all(),
        }
    }

    fn accept_all(&mut self) -> usize {
        if self.marks.is_empty() || self.marks.iter().any(|m| m.is_confirmed()) {
            return 0;
        }
        let classes = Arc::clone(&self.classes);
        for mark in &mut self.marks {
            mark.accept(&classes.display_name(mark.class_idx));
        }
        self.image_is_completely_empty = false;
        self.touch();
        self.marks.len()
    }

    /// Drop every mark and delete both sidecars unconditionally.
    pub fn erase_all(&mut self) -> Result<()> {
        log::info!(
            "deleting all marks for {}",
            self.current_image().map(|p| p.display().to_string()).unwrap_or_default()
        );
        self.marks.clear();
        self.selected_mark = None;
        self.image_is_completely_empty = false;
        self.need_to_save = false;
        if let Some(sidecars) = &self.sidecars {
            remove_if_exists(&sidecars.json)?;
            remove_if_exists(&sidecars.text)?;
        }
        self.state = StoreState::Saved;
        Ok(())
    }

    fn is_visible(&self, mark: &Mark) -> bool {
        if mark.is_prediction {
            self.predictions_are_shown
        } else {
            self.marks_are_shown
        }
    }

    /// Move the selection to the next visible mark, wrapping around.
    pub fn select_next(&mut self, direction: Direction) -> Option<usize> {
        let len = self.marks.len();
        if len == 0 {
            self.selected_mark = None;
            return None;
        }

        let mut candidate = self.selected_mark;
        for _ in 0..len {
            let next = match (direction, candidate) {
                (Direction::Forward, Some(i)) if i + 1 < len => i + 1,
                (Direction::Forward, _) => 0,
                (Direction::Backward, Some(i)) if i > 0 && i <= len => i - 1,
                (Direction::Backward, _) => len - 1,
            };
            if self.is_visible(&self.marks[next]) {
                self.selected_mark = Some(next);
                return self.selected_mark;
            }
            candidate = Some(next);
        }

        self.selected_mark = None;
        None
    }

    pub fn select(&mut self, mark_index: Option<usize>) -> Result<()> {
        if let Some(i) = mark_index {
            if i >= self.marks.len() {
                return Err(AnnotationError::NoSuchMark(i));
            }
        }
        self.selected_mark = mark_index;
        Ok(())
    }

    /// Append a confirmed mark.
    pub fn add_mark(&mut self, mut mark: Mark) -> Result<()> {
        self.classes.check_assignable(mark.class_idx)?;
        mark.is_prediction = false;
        self.marks.push(mark);
        self.image_is_completely_empty = false;
        self.selected_mark = Some(self.marks.len() - 1);
        self.touch();
        Ok(())
    }

    /// Flag or unflag the image as a negative sample. Only allowed without
    /// confirmed marks.
    pub fn set_completely_empty(&mut self, empty: bool) -> Result<()> {
        if empty && self.confirmed_count() > 0 {
            log::warn!("{}", AnnotationError::MarksPresent);
            return Err(AnnotationError::MarksPresent);
        }
        if self.image_is_completely_empty != empty {
            self.image_is_completely_empty = empty;
            self.touch();
        }
        Ok(())
    }

    /// Import confirmed marks from elsewhere, skipping any already present.
    /// Returns `(added, skipped)`.
    pub fn import_marks(&mut self, marks: &[Mark]) -> (usize, usize) {
        let (mut added, mut skipped) = (0, 0);
        for mark in marks {
            let exists = self
                .marks
                .iter()
                .any(|m| m.is_confirmed() && m.same_geometry(mark));
            if exists {
                skipped += 1;
                continue;
            }
            let mut copy = mark.clone();
            copy.is_prediction = false;
            self.marks.push(copy);
            added += 1;
        }
        if added > 0 {
            self.image_is_completely_empty = false;
            self.selected_mark = None;
            sort_marks(&mut self.marks);
            self.touch();
        }
        (added, skipped)
    }

    /// Merge detector output as predictions. Does not dirty the store.
    pub fn apply_predictions(&mut self, detections: &[Detection]) -> MergeReport {
        let report = merge_predictions(&mut self.marks, detections, &self.image, &self.classes);
        self.selected_mark = None;
        report
    }

    /// Forget the current image without saving.
    pub fn unload(&mut self) {
        self.reset();
        self.sidecars = None;
        self.image = ImageInfo::default();
        self.state = StoreState::Unloaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::tests::detection;
    use crate::util::geometry::Rect;
    use std::path::PathBuf;

    fn store() -> AnnotationStore {
        AnnotationStore::new(Arc::new(ClassTable::new(["car", "person"])))
    }

    fn five_classes() -> AnnotationStore {
        AnnotationStore::new(Arc::new(ClassTable::new([
            "car", "person", "bicycle", "dog", "cat",
        ])))
    }

    fn image_in(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    fn info() -> ImageInfo {
        ImageInfo::new(640, 480)
    }

    fn prediction(x: f64, class_idx: usize) -> Mark {
        let mut m = Mark::from_rect(Rect::new(x, 0.1, 0.1, 0.1), class_idx, "x");
        m.is_prediction = true;
        m.description = "x 80%".to_string();
        m
    }

    #[test]
    fn test_load_without_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store();
        let report = s.load(&image_in(&dir, "a.jpg"), info()).unwrap();
        assert_eq!(report.source, AnnotationSource::None);
        assert_eq!(s.marks().len(), 0);
        assert!(!s.is_completely_empty());
        assert_eq!(s.state(), StoreState::Loaded);
    }

    #[test]
    fn test_load_structured_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        std::fs::write(
            image.with_extension("json"),
            r#"{"mark":[{"class_idx":0,"name":"car","rect":{"x":0.1,"y":0.1,"w":0.2,"h":0.2,"int_x":64,"int_y":48,"int_w":128,"int_h":96},"points":[]}],"completely_empty":false}"#,
        )
        .unwrap();
        std::fs::write(image.with_extension("txt"), "0 0.2 0.2 0.2 0.2\n").unwrap();

        let mut s = store();
        let report = s.load(&image, info()).unwrap();
        assert_eq!(report.source, AnnotationSource::Structured);
        assert_eq!(s.marks().len(), 1);
        assert_eq!(s.marks()[0].class_idx, 0);
        assert!(s.marks()[0].is_confirmed());
        assert!(!s.need_to_save());
    }

    #[test]
    fn test_set_class_beyond_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = five_classes();
        s.load(&image_in(&dir, "a.jpg"), info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.2, 0.2), 1, "person"))
            .unwrap();
        s.save().unwrap();

        let err = s.set_class(0, 99).unwrap_err();
        assert!(matches!(err, AnnotationError::ClassOutOfRange { class_idx: 99, last: 4 }));
        assert!(matches!(s.set_class(0, 5), Err(AnnotationError::ClassOutOfRange { .. })));
        assert_eq!(s.marks()[0].class_idx, 1);
        assert!(!s.need_to_save());

        s.set_class(0, 3).unwrap();
        assert_eq!(s.marks()[0].name, "dog");
        assert!(s.need_to_save());
    }

    #[test]
    fn test_accept_all_scenario() {
        let mut s = five_classes();
        s.marks = vec![prediction(0.1, 1), prediction(0.5, 2)];
        assert_eq!(s.accept(AcceptTarget::All), 2);
        assert!(s.marks().iter().all(|m| m.is_confirmed()));
        assert_eq!(s.marks()[0].name, "person");
        assert_eq!(s.marks()[0].description, "person");
        assert_eq!(s.marks()[1].name, "bicycle");
        assert!(s.need_to_save());
    }

    #[test]
    fn test_accept_all_is_noop_with_confirmed_marks() {
        let mut s = store();
        s.marks = vec![
            prediction(0.1, 1),
            Mark::from_rect(Rect::new(0.5, 0.5, 0.1, 0.1), 0, "car"),
        ];
        assert_eq!(s.accept(AcceptTarget::All), 0);
        assert!(s.marks()[0].is_prediction);
        assert!(!s.need_to_save());

        // a single prediction can still be accepted
        assert_eq!(s.accept(AcceptTarget::One(0)), 1);
        assert!(s.marks()[0].is_confirmed());
    }

    #[test]
    fn test_accept_missing_index_falls_back_to_all() {
        let mut s = store();
        s.marks = vec![prediction(0.1, 0), prediction(0.5, 1)];
        assert_eq!(s.accept(AcceptTarget::One(9)), 2);
        assert_eq!(s.confirmed_count(), 2);
    }

    #[test]
    fn test_save_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        let mut s = store();
        s.load(&image, info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.2, 0.3, 0.4), 0, "car"))
            .unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.5, 0.5, 0.1, 0.1), 1, "person"))
            .unwrap();

        s.save().unwrap();
        let json1 = std::fs::read(image.with_extension("json")).unwrap();
        let text1 = std::fs::read(image.with_extension("txt")).unwrap();
        assert!(!s.need_to_save());

        s.save().unwrap();
        assert_eq!(std::fs::read(image.with_extension("json")).unwrap(), json1);
        assert_eq!(std::fs::read(image.with_extension("txt")).unwrap(), text1);
        assert!(!s.need_to_save());
        assert_eq!(s.state(), StoreState::Saved);
    }

    #[test]
    fn test_predictions_are_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        let mut s = store();
        s.load(&image, info()).unwrap();
        s.apply_predictions(&[detection(10, 10, 50, 50, 0)]);
        assert_eq!(s.prediction_count(), 1);
        s.save().unwrap();
        assert!(!image.with_extension("json").exists());
        assert!(!image.with_extension("txt").exists());
    }

    #[test]
    fn test_saving_nothing_deletes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        let mut s = store();
        s.load(&image, info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"))
            .unwrap();
        s.save().unwrap();
        assert!(image.with_extension("json").exists());

        s.delete_mark(0).unwrap();
        s.save().unwrap();
        assert!(!image.with_extension("json").exists());
        assert!(!image.with_extension("txt").exists());
    }

    #[test]
    fn test_erase_all_deletes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        let mut s = store();
        s.load(&image, info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"))
            .unwrap();
        s.save().unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.5, 0.5, 0.1, 0.1), 0, "car"))
            .unwrap();

        s.erase_all().unwrap();
        assert!(s.marks().is_empty());
        assert!(!s.need_to_save());
        assert!(!image.with_extension("json").exists());
        assert!(!image.with_extension("txt").exists());
    }

    #[test]
    fn test_completely_empty_requires_no_marks() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        let mut s = store();
        s.load(&image, info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"))
            .unwrap();
        assert!(matches!(s.set_completely_empty(true), Err(AnnotationError::MarksPresent)));

        s.delete_mark(0).unwrap();
        s.set_completely_empty(true).unwrap();
        s.save().unwrap();
        assert!(image.with_extension("json").exists());
        assert_eq!(std::fs::read_to_string(image.with_extension("txt")).unwrap(), "");

        let mut reloaded = store();
        reloaded.load(&image, info()).unwrap();
        assert!(reloaded.is_completely_empty());

        // adding a mark clears the flag
        reloaded
            .add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"))
            .unwrap();
        assert!(!reloaded.is_completely_empty());
    }

    #[test]
    fn test_text_only_load_recreates_structured_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        std::fs::write(image.with_extension("txt"), "1 0.5 0.5 0.2 0.2\n").unwrap();

        let mut s = store();
        let report = s.load(&image, info()).unwrap();
        assert_eq!(report.source, AnnotationSource::Text);
        assert_eq!(s.marks()[0].name, "person");
        assert_eq!(s.state(), StoreState::Dirty);

        s.flush().unwrap();
        assert!(image.with_extension("json").exists());
    }

    #[test]
    fn test_empty_text_file_means_completely_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        std::fs::write(image.with_extension("txt"), "").unwrap();
        let mut s = store();
        s.load(&image, info()).unwrap();
        assert!(s.is_completely_empty());
    }

    #[test]
    fn test_malformed_json_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        std::fs::write(image.with_extension("json"), "{ not json").unwrap();
        std::fs::write(image.with_extension("txt"), "0 0.5 0.5 0.2 0.2\n").unwrap();

        let mut s = store();
        let err = s.load(&image, info()).unwrap_err();
        assert!(matches!(err, AnnotationError::Malformed { .. }));
        assert!(s.marks().is_empty());
        assert_eq!(s.state(), StoreState::LoadFailed);
        assert_eq!(s.current_image(), Some(image.as_path()));
    }

    #[test]
    fn test_invalid_text_line_discards_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = image_in(&dir, "a.jpg");
        std::fs::write(image.with_extension("txt"), "0 0.5 0.5 0.2 0.2\n5 0.5 0.5 0.1 0.1\n").unwrap();
        let mut s = store();
        assert!(matches!(
            s.load(&image, info()),
            Err(AnnotationError::MalformedText { line: 2, .. })
        ));
        assert!(s.marks().is_empty());
    }

    #[test]
    fn test_loading_next_image_flushes_changes() {
        let dir = tempfile::tempdir().unwrap();
        let first = image_in(&dir, "a.jpg");
        let second = image_in(&dir, "b.jpg");
        let mut s = store();
        s.load(&first, info()).unwrap();
        s.add_mark(Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"))
            .unwrap();

        s.load(&second, info()).unwrap();
        assert!(first.with_extension("json").exists());
        assert!(s.marks().is_empty());
        assert_eq!(s.current_image(), Some(second.as_path()));
    }

    #[test]
    fn test_select_next_skips_hidden_marks() {
        let mut s = store();
        s.marks = vec![
            Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"),
            prediction(0.3, 1),
            Mark::from_rect(Rect::new(0.5, 0.1, 0.1, 0.1), 0, "car"),
        ];
        s.predictions_are_shown = false;
        assert_eq!(s.select_next(Direction::Forward), Some(0));
        assert_eq!(s.select_next(Direction::Forward), Some(2));
        assert_eq!(s.select_next(Direction::Forward), Some(0));
        assert_eq!(s.select_next(Direction::Backward), Some(2));

        s.marks_are_shown = false;
        assert_eq!(s.select_next(Direction::Forward), None);
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut s = store();
        s.marks = vec![
            Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car"),
            Mark::from_rect(Rect::new(0.5, 0.1, 0.1, 0.1), 1, "person"),
        ];
        s.select(Some(1)).unwrap();
        let removed = s.delete_mark(1).unwrap();
        assert_eq!(removed.class_idx, 1);
        assert_eq!(s.selected(), None);
        assert!(matches!(s.delete_mark(4), Err(AnnotationError::NoSuchMark(4))));
    }

    #[test]
    fn test_import_skips_existing_marks() {
        let mut s = store();
        let existing = Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 0, "car");
        s.marks = vec![existing.clone()];
        let incoming = vec![
            existing,
            Mark::from_rect(Rect::new(0.1, 0.1, 0.1, 0.1), 1, "person"),
        ];
        assert_eq!(s.import_marks(&incoming), (1, 1));
        assert_eq!(s.confirmed_count(), 2);
        assert!(s.need_to_save());
    }
}
