// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Editing session: the single owner of all per-project state.
//!
//! A `Session` ties the annotation store, the image navigator, the settings,
//! the optional detector and the batch worker together. Every interactive
//! operation goes through it, sequenced as flush, then move, then load.
//! Recovered errors are logged and queued as notices for the user.

use crate::batch::copy::{find_neighbor_marks, CopyReport};
use crate::batch::housekeeping::{
    delete_rotate_and_flip_images, flip_images, import_text_annotations, move_empty_images,
    reload_resave_every_image, rotate_images,
};
use crate::batch::review::review_marks;
use crate::batch::sort::compute_sort_keys;
use crate::batch::stats::gather_statistics;
use crate::batch::{BatchOutcome, BatchWorker, HousekeepingKind, JobControl, JobOutput, Progress};
use crate::config::Settings;
use crate::error::{AnnotationError, Result};
use crate::io::export::{write_training_files, ExportOptions, ExportSummary};
use crate::io::files::move_group_with_unique_stem;
use crate::io::media::{find_images, placeholder_info, read_image_info, ImageFilter};
use crate::io::serialization::count_marks;
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::models::mark::Mark;
use crate::models::project::{Direction, SortOrder};
use crate::models::toggle::{effective_visibility, Toggle, VisibilityContext};
use crate::navigator::ImageNavigator;
use crate::predict::Detector;
use crate::store::{AcceptTarget, AnnotationStore};
use log::Level;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A message for the user about something that happened in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

pub struct Session {
    project_dir: PathBuf,
    classes: Arc<ClassTable>,
    store: AnnotationStore,
    navigator: ImageNavigator,
    settings: Settings,
    detector: Option<Box<dyn Detector>>,
    predictions_enabled: bool,
    worker: BatchWorker,
    notices: Vec<Notice>,
    read_only: bool,
}

impl Session {
    /// Open every image under `project_dir`, after the settings' regex filter.
    pub fn open(
        project_dir: &Path,
        classes: ClassTable,
        settings: Settings,
        detector: Option<Box<dyn Detector>>,
    ) -> Result<Self> {
        let skip = [
            settings.trash_dir_name.as_str(),
            settings.empty_images_dir_name.as_str(),
        ];
        let mut images = find_images(project_dir, &skip)?;

        let mut notices = Vec::new();
        match ImageFilter::new(&settings.inclusion_regex, &settings.exclusion_regex) {
            Ok(filter) => images = filter.apply(images),
            Err(e) => {
                let text = format!("image filter ignored: {}", e);
                log::warn!("{}", text);
                notices.push(Notice {
                    level: Level::Warn,
                    text,
                });
            }
        }

        let mut session = Self::with_images(project_dir, images, classes, settings, detector)?;
        notices.append(&mut session.notices);
        session.notices = notices;
        Ok(session)
    }

    /// Open an explicit image list.
    pub fn with_images(
        project_dir: &Path,
        images: Vec<PathBuf>,
        classes: ClassTable,
        settings: Settings,
        mut detector: Option<Box<dyn Detector>>,
    ) -> Result<Self> {
        let navigator = ImageNavigator::new(images)?;
        let classes = Arc::new(classes);
        if let Some(d) = detector.as_mut() {
            *d.config_mut() = settings.detector;
        }

        let mut session = Self {
            project_dir: project_dir.to_path_buf(),
            store: AnnotationStore::new(Arc::clone(&classes)),
            classes,
            navigator,
            predictions_enabled: detector.is_some(),
            detector,
            settings,
            worker: BatchWorker::new(),
            notices: Vec::new(),
            read_only: false,
        };
        log::info!(
            "opened {} with {} images",
            session.project_dir.display(),
            session.navigator.len()
        );

        match session.settings.sort_order {
            SortOrder::Alphabetical => session.navigator.sort_alphabetical(),
            SortOrder::Random => session.navigator.shuffle(),
            order if order.needs_full_pass() => {
                let images = session.navigator.images().to_vec();
                if let Some(result) = compute_sort_keys(&images, order, &JobControl::detached()).completed() {
                    session.navigator.apply_keyed(order, &result.keys);
                    session.notify_unreadable(&result.unreadable);
                }
            }
            _ => {}
        }
        session.navigator.goto_first();
        session.load_current();
        Ok(session)
    }

    pub(crate) fn notify(&mut self, level: Level, text: impl Into<String>) {
        let text = text.into();
        log::log!(level, "{}", text);
        self.notices.push(Notice { level, text });
    }

    fn notify_unreadable(&mut self, paths: &[PathBuf]) {
        for path in paths {
            self.notify(
                Level::Warn,
                format!("failed to parse {}; treated as unannotated", path.display()),
            );
        }
    }

    /// Drain the queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn navigator(&self) -> &ImageNavigator {
        &self.navigator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_image(&self) -> &Path {
        self.navigator.current()
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// False once the detector failed; predictions stay off for the session.
    pub fn predictions_enabled(&self) -> bool {
        self.predictions_enabled
    }

    /// In read-only mode annotation edits stay in memory and no sidecar is
    /// written by the session itself. Batch jobs that write files still do.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_busy(&self) -> bool {
        self.worker.is_busy()
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.worker.is_busy() {
            log::warn!(
                "rejected while \"{}\" is running",
                self.worker.job_name().unwrap_or_default()
            );
            return Err(AnnotationError::Busy);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        if let Err(e) = self.store.flush() {
            self.notify(Level::Error, e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Load the navigator's current image into the store and run the
    /// detector if predictions apply. Every failure becomes a notice.
    fn load_current(&mut self) {
        let path = self.navigator.current().to_path_buf();
        if self.read_only {
            // forget pending edits so the store's own flush has nothing to write
            self.store.unload();
        }
        let info = match read_image_info(&path) {
            Ok(info) => info.with_scale(self.settings.display_scale),
            Err(e) => {
                self.notify(Level::Warn, e.to_string());
                placeholder_info()
            }
        };

        if let Err(e) = self.store.load(&path, info) {
            self.notify(Level::Warn, e.to_string());
        }

        let context = VisibilityContext::new(self.store.confirmed_count());
        let show_predictions = effective_visibility(self.settings.show_predictions, &context);
        self.store.marks_are_shown = self.settings.show_marks;
        self.store.predictions_are_shown = show_predictions;

        if show_predictions && self.predictions_enabled {
            self.run_detector(&path);
        }
    }

    fn run_detector(&mut self, path: &Path) {
        let Some(detector) = self.detector.as_mut() else {
            return;
        };
        let info = *self.store.image_info();
        match detector.predict(path, &info) {
            Ok(detections) => {
                let report = self.store.apply_predictions(&detections);
                if report.unknown_class > 0 {
                    self.notify(
                        Level::Warn,
                        format!(
                            "{} predictions referenced classes beyond the class table",
                            report.unknown_class
                        ),
                    );
                }
            }
            Err(e) => {
                self.predictions_enabled = false;
                self.notify(
                    Level::Error,
                    format!("{}; predictions are disabled for this session", e),
                );
            }
        }
    }

    /// Flush then reload the current image.
    fn reload_current(&mut self) -> Result<()> {
        self.flush()?;
        self.load_current();
        Ok(())
    }

    // navigation

    pub fn goto_index(&mut self, index: usize) -> Result<usize> {
        self.ensure_idle()?;
        self.flush()?;
        self.navigator.goto_index(index);
        self.load_current();
        Ok(self.navigator.index())
    }

    pub fn goto_relative(&mut self, delta: isize) -> Result<usize> {
        let target = (self.navigator.index() as isize + delta).max(0) as usize;
        self.goto_index(target)
    }

    pub fn goto_first(&mut self) -> Result<usize> {
        self.goto_index(0)
    }

    pub fn goto_last(&mut self) -> Result<usize> {
        self.goto_index(self.navigator.len() - 1)
    }

    /// Jump to the next image whose structured file records no marks.
    pub fn skip_to_next_unannotated(&mut self, direction: Direction) -> Result<usize> {
        self.ensure_idle()?;
        self.flush()?;
        let mut errors = Vec::new();
        let target = self.navigator.find_unannotated(direction, |image| {
            count_marks(&Sidecars::for_image(image).json, false).unwrap_or_else(|e| {
                errors.push(e.to_string());
                0
            })
        });
        for error in errors {
            self.notify(Level::Warn, error);
        }
        self.goto_index(target)
    }

    /// Move the current image and its sidecars to the trash directory.
    pub fn delete_current_image(&mut self) -> Result<PathBuf> {
        self.ensure_idle()?;
        if self.navigator.len() <= 1 {
            self.notify(Level::Warn, AnnotationError::LastImage.to_string());
            return Err(AnnotationError::LastImage);
        }
        self.flush()?;

        let image = self.navigator.current().to_path_buf();
        let trash = self.project_dir.join(&self.settings.trash_dir_name);
        if let Err(e) = move_group_with_unique_stem(&Sidecars::for_image(&image).all(), &trash) {
            self.notify(Level::Error, e.to_string());
            return Err(e);
        }

        self.store.unload();
        let removed = self.navigator.remove_current()?;
        self.load_current();
        Ok(removed)
    }

    /// Change the sort order. Orders needing a full pass run on the worker;
    /// the list is reordered when [`poll_batch`](Self::poll_batch) sees the result.
    pub fn set_sort_order(&mut self, order: SortOrder) -> Result<()> {
        self.ensure_idle()?;
        self.flush()?;
        self.settings.sort_order = order;
        if order.needs_full_pass() {
            let images = self.navigator.images().to_vec();
            self.worker.spawn("sort images", move |control| {
                compute_sort_keys(&images, order, control).map(|keys| JobOutput::SortKeys(order, keys))
            })?;
        } else if order == SortOrder::Random {
            self.navigator.shuffle();
            self.load_current();
        } else {
            self.navigator.sort_alphabetical();
        }
        Ok(())
    }

    // annotation editing

    pub fn set_class(&mut self, mark_index: usize, class_idx: usize) -> Result<()> {
        self.ensure_idle()?;
        self.store.set_class(mark_index, class_idx).inspect_err(|e| {
            self.notices.push(Notice {
                level: Level::Warn,
                text: e.to_string(),
            })
        })
    }

    /// Set the class of the selected mark.
    pub fn set_selected_class(&mut self, class_idx: usize) -> Result<()> {
        let selected = self.store.selected().ok_or(AnnotationError::NoSuchMark(0))?;
        self.set_class(selected, class_idx)
    }

    pub fn delete_mark(&mut self, mark_index: usize) -> Result<Mark> {
        self.ensure_idle()?;
        self.store.delete_mark(mark_index)
    }

    pub fn delete_selected_mark(&mut self) -> Result<Mark> {
        let selected = self.store.selected().ok_or(AnnotationError::NoSuchMark(0))?;
        self.delete_mark(selected)
    }

    pub fn accept(&mut self, target: AcceptTarget) -> Result<usize> {
        self.ensure_idle()?;
        Ok(self.store.accept(target))
    }

    /// Accept the selected prediction, or all predictions when nothing is selected.
    pub fn accept_current(&mut self) -> Result<usize> {
        let target = match self.store.selected() {
            Some(i) => AcceptTarget::One(i),
            None => AcceptTarget::All,
        };
        self.accept(target)
    }

    /// Delete all marks and both sidecars, then reload so predictions can
    /// be offered again.
    pub fn erase_all(&mut self) -> Result<()> {
        self.ensure_idle()?;
        if let Err(e) = self.store.erase_all() {
            self.notify(Level::Error, e.to_string());
            return Err(e);
        }
        self.load_current();
        Ok(())
    }

    pub fn select_next(&mut self, direction: Direction) -> Result<Option<usize>> {
        self.ensure_idle()?;
        Ok(self.store.select_next(direction))
    }

    pub fn select(&mut self, mark_index: Option<usize>) -> Result<()> {
        self.ensure_idle()?;
        self.store.select(mark_index)
    }

    pub fn add_mark(&mut self, mark: Mark) -> Result<()> {
        self.ensure_idle()?;
        self.store.add_mark(mark).inspect_err(|e| {
            self.notices.push(Notice {
                level: Level::Warn,
                text: e.to_string(),
            })
        })
    }

    pub fn set_completely_empty(&mut self, empty: bool) -> Result<()> {
        self.ensure_idle()?;
        self.store.set_completely_empty(empty).inspect_err(|e| {
            self.notices.push(Notice {
                level: Level::Warn,
                text: e.to_string(),
            })
        })
    }

    /// Flag the image as a negative sample and move on to the next
    /// unannotated image.
    pub fn mark_empty_and_advance(&mut self) -> Result<usize> {
        self.set_completely_empty(true)?;
        self.skip_to_next_unannotated(Direction::Forward)
    }

    /// Import the marks of the nearest annotated image in alphabetical order.
    pub fn copy_marks_from_neighbor(&mut self, direction: Direction) -> Result<Option<CopyReport>> {
        self.ensure_idle()?;
        let candidates = self.navigator.alphabetical_neighbors(direction);
        let search = find_neighbor_marks(&candidates, &self.classes, &JobControl::detached())
            .completed()
            .unwrap_or_default();
        self.notify_unreadable(&search.unreadable);
        let Some(neighbor) = search.found else {
            self.notify(Level::Info, "no annotated image found to copy from");
            return Ok(None);
        };

        let (added, skipped) = self.store.import_marks(&neighbor.marks);
        let name = neighbor
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.notify(
            Level::Info,
            format!("copied {} marks from {} (skipped {})", added, name, skipped),
        );
        Ok(Some(CopyReport {
            source: neighbor.source,
            added,
            skipped,
        }))
    }

    // display and detector settings

    pub fn set_show_predictions(&mut self, toggle: Toggle) -> Result<()> {
        self.ensure_idle()?;
        self.settings.show_predictions = toggle;
        self.reload_current()
    }

    pub fn cycle_show_predictions(&mut self) -> Result<Toggle> {
        let next = self.settings.show_predictions.next();
        self.set_show_predictions(next)?;
        self.notify(Level::Info, format!("show predictions: {}", next.label()));
        Ok(next)
    }

    pub fn set_show_marks(&mut self, show: bool) {
        self.settings.show_marks = show;
        self.store.marks_are_shown = show;
    }

    pub fn set_show_labels(&mut self, toggle: Toggle) {
        self.settings.show_labels = toggle;
    }

    pub fn set_train_percentage(&mut self, percentage: u32) {
        self.settings.train_percentage = percentage.min(100);
    }

    fn ensure_detector(&mut self) -> Result<()> {
        if self.detector.is_none() {
            let e = AnnotationError::DetectorUnavailable("no detector is loaded".to_string());
            self.notify(Level::Warn, e.to_string());
            return Err(e);
        }
        Ok(())
    }

    fn sync_detector_config(&mut self) {
        if let Some(d) = self.detector.as_mut() {
            *d.config_mut() = self.settings.detector;
        }
    }

    /// Step the detection threshold. Reloads when it changed.
    pub fn adjust_threshold(&mut self, increase: bool) -> Result<bool> {
        self.ensure_idle()?;
        self.ensure_detector()?;
        if !self.settings.detector.adjust_threshold(increase) {
            return Ok(false);
        }
        self.sync_detector_config();
        self.notify(
            Level::Info,
            format!(
                "detection threshold: {:.0}%",
                self.settings.detector.threshold * 100.0
            ),
        );
        self.reload_current()?;
        Ok(true)
    }

    pub fn toggle_tiling(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        self.ensure_detector()?;
        self.settings.detector.enable_tiles = !self.settings.detector.enable_tiles;
        self.sync_detector_config();
        self.reload_current()?;
        Ok(self.settings.detector.enable_tiles)
    }

    // batch operations

    fn start_job<F>(&mut self, name: &str, job: F) -> Result<()>
    where
        F: FnOnce(&[PathBuf], &ClassTable, &JobControl) -> BatchOutcome<JobOutput> + Send + 'static,
    {
        self.ensure_idle()?;
        self.flush()?;
        let images = self.navigator.images().to_vec();
        let classes = Arc::clone(&self.classes);
        self.worker
            .spawn(name, move |control| job(&images[..], classes.as_ref(), control))?;
        Ok(())
    }

    pub fn start_statistics(&mut self) -> Result<()> {
        self.start_job("gather statistics", |images, classes, control| {
            gather_statistics(images, classes, control).map(JobOutput::Stats)
        })
    }

    pub fn start_review(&mut self) -> Result<()> {
        self.start_job("review marks", |images, classes, control| {
            review_marks(images, classes, control).map(JobOutput::Review)
        })
    }

    pub fn start_import_text_annotations(&mut self) -> Result<()> {
        self.start_job("import text annotations", |images, classes, control| {
            import_text_annotations(images, classes, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::ImportText, r))
        })
    }

    pub fn start_reload_resave(&mut self) -> Result<()> {
        self.start_job("reload and resave", |images, classes, control| {
            reload_resave_every_image(images, classes, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::Resave, r))
        })
    }

    pub fn start_move_empty_images(&mut self) -> Result<()> {
        let dest = self.project_dir.join(&self.settings.empty_images_dir_name);
        self.start_job("move empty images", move |images, _, control| {
            move_empty_images(images, &dest, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::MoveEmpty, r))
        })
    }

    pub fn start_delete_rotate_and_flip(&mut self) -> Result<()> {
        let trash = self.project_dir.join(&self.settings.trash_dir_name);
        self.start_job("delete rotated and flipped images", move |images, _, control| {
            delete_rotate_and_flip_images(images, &trash, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::DeleteDerived, r))
        })
    }

    pub fn start_rotate_images(&mut self, angles: Vec<u32>) -> Result<()> {
        self.start_job("rotate images", move |images, classes, control| {
            rotate_images(images, &angles, classes, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::Transform, r))
        })
    }

    pub fn start_flip_images(&mut self, horizontal: bool, vertical: bool) -> Result<()> {
        self.start_job("flip images", move |images, classes, control| {
            flip_images(images, horizontal, vertical, classes, control)
                .map(|r| JobOutput::Housekeeping(HousekeepingKind::Transform, r))
        })
    }

    pub fn batch_progress(&mut self) -> Option<Progress> {
        self.worker.progress()
    }

    pub fn cancel_batch(&self) {
        self.worker.cancel();
    }

    /// Non-blocking: apply and return the result of a finished job.
    pub fn poll_batch(&mut self) -> Option<BatchOutcome<JobOutput>> {
        let outcome = self.worker.poll()?;
        self.finish_batch(&outcome);
        Some(outcome)
    }

    /// Block until the running job finishes, then apply its result.
    pub fn wait_batch(&mut self) -> Option<BatchOutcome<JobOutput>> {
        let outcome = self.worker.wait()?;
        self.finish_batch(&outcome);
        Some(outcome)
    }

    fn finish_batch(&mut self, outcome: &BatchOutcome<JobOutput>) {
        let output = match outcome {
            BatchOutcome::Completed(output) => output,
            BatchOutcome::Cancelled { processed } => {
                self.notify(Level::Info, format!("cancelled after {} files", processed));
                // a cancelled move job leaves no report; drop whatever is gone
                let missing: Vec<PathBuf> = self
                    .navigator
                    .images()
                    .iter()
                    .filter(|p| !p.exists())
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    if let Err(e) = self.navigator.remove_paths(&missing) {
                        self.notify(Level::Error, e.to_string());
                    }
                }
                self.store.unload();
                self.load_current();
                return;
            }
            BatchOutcome::Failed(e) => {
                self.notify(Level::Error, e.clone());
                return;
            }
        };

        match output {
            JobOutput::SortKeys(order, result) => {
                self.navigator.apply_keyed(*order, &result.keys);
                self.notify_unreadable(&result.unreadable);
            }
            JobOutput::Stats(report) => {
                if report.unreadable > 0 {
                    self.notify(
                        Level::Warn,
                        format!("{} annotation files could not be parsed", report.unreadable),
                    );
                }
                self.notify(
                    Level::Info,
                    format!(
                        "statistics gathered for {} classes in {} images",
                        report.classes.len(),
                        report.images
                    ),
                )
            }
            JobOutput::Review(report) => {
                self.notify_unreadable(&report.unreadable);
                self.notify(
                    Level::Info,
                    format!("{} marks ready for review", report.rows.len()),
                )
            }
            JobOutput::Housekeeping(kind, report) => {
                match kind {
                    HousekeepingKind::MoveEmpty | HousekeepingKind::DeleteDerived => {
                        if let Err(e) = self.navigator.remove_paths(&report.changed) {
                            self.notify(Level::Error, e.to_string());
                        }
                    }
                    HousekeepingKind::Transform => {
                        self.navigator.add_paths(&report.changed);
                    }
                    HousekeepingKind::ImportText | HousekeepingKind::Resave => {}
                }
                let mut text = format!("{} of {} images changed", report.changed.len(), report.examined);
                if report.failed > 0 {
                    text.push_str(&format!(", {} failed", report.failed));
                }
                self.notify(Level::Info, text);
                // sidecars may have changed underneath the store
                self.store.unload();
                self.load_current();
            }
        }
    }

    /// Write the trainer's configuration and image lists into the project directory.
    pub fn export_training_files(&mut self) -> Result<ExportSummary> {
        self.ensure_idle()?;
        self.flush()?;
        let mut options = ExportOptions::new(&self.project_dir);
        options.train_percentage = self.settings.train_percentage;
        let summary = write_training_files(self.navigator.images(), &self.classes, &options)?;
        self.notify(
            Level::Info,
            format!(
                "training files written: {} train, {} valid, {} skipped",
                summary.train, summary.valid, summary.skipped
            ),
        );
        Ok(summary)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.worker.cancel();
        if self.read_only {
            return;
        }
        if let Err(e) = self.store.flush() {
            log::error!("failed to save annotations on close: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::tests::{detection, FakeDetector};
    use crate::store::StoreState;
    use crate::util::geometry::Rect;

    fn make_images(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let path = dir.join(n);
                image::RgbImage::new(100, 100).save(&path).unwrap();
                path
            })
            .collect()
    }

    fn classes() -> ClassTable {
        ClassTable::new(["car", "person", "dog"])
    }

    fn open(dir: &Path, detector: Option<Box<dyn Detector>>) -> Session {
        Session::open(dir, classes(), Settings::default(), detector).unwrap()
    }

    fn car(x: f64) -> Mark {
        Mark::from_rect(Rect::new(x, 0.1, 0.1, 0.1), 0, "car")
    }

    #[test]
    fn test_open_without_images_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Session::open(dir.path(), classes(), Settings::default(), None);
        assert!(matches!(result, Err(AnnotationError::NoImages)));
    }

    #[test]
    fn test_open_loads_first_image() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["b.png", "a.png"]);
        let session = open(dir.path(), None);
        assert_eq!(session.current_image(), dir.path().join("a.png"));
        assert_eq!(session.store().state(), StoreState::Loaded);
        assert_eq!(session.store().image_info().width, 100);
    }

    #[test]
    fn test_bad_filter_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png"]);
        let mut settings = Settings::default();
        settings.inclusion_regex = "(".to_string();
        let mut session = Session::open(dir.path(), classes(), settings, None).unwrap();
        assert_eq!(session.navigator().len(), 2);
        let notices = session.take_notices();
        assert!(notices.iter().any(|n| n.level == Level::Warn && n.text.contains("filter")));
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_navigation_saves_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();
        assert_eq!(session.goto_relative(1).unwrap(), 1);
        assert!(images[0].with_extension("json").exists());
        assert!(session.store().marks().is_empty());

        session.goto_first().unwrap();
        assert_eq!(session.store().marks().len(), 1);
    }

    #[test]
    fn test_predictions_only_without_confirmed_marks() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png"]);
        let detector = FakeDetector::new(vec![detection(10, 10, 20, 20, 1), detection(60, 60, 20, 20, 2)]);
        let mut session = open(dir.path(), Some(Box::new(detector)));

        assert_eq!(session.store().prediction_count(), 2);
        assert_eq!(session.accept(AcceptTarget::All).unwrap(), 2);
        session.goto_last().unwrap();
        session.goto_first().unwrap();

        // auto: confirmed marks on disk, so no predictions are merged
        assert_eq!(session.store().confirmed_count(), 2);
        assert_eq!(session.store().prediction_count(), 0);
    }

    #[test]
    fn test_always_show_predictions_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png"]);
        let detector = FakeDetector::new(vec![detection(10, 10, 20, 20, 1), detection(60, 60, 20, 20, 2)]);
        let mut session = open(dir.path(), Some(Box::new(detector)));
        session.accept(AcceptTarget::All).unwrap();
        session.delete_mark(1).unwrap();

        session.set_show_predictions(Toggle::On).unwrap();
        let marks = session.store().marks();
        assert_eq!(marks.len(), 2);
        assert_eq!(session.store().confirmed_count(), 1);
        assert!(marks.iter().any(|m| m.is_prediction && m.class_idx == 2));
    }

    #[test]
    fn test_detector_failure_disables_predictions() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png"]);
        let mut detector = FakeDetector::new(Vec::new());
        detector.fail = true;
        let mut session = open(dir.path(), Some(Box::new(detector)));
        assert!(!session.predictions_enabled());
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, Level::Error);

        session.goto_last().unwrap();
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_threshold_changes_reach_detector() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png"]);
        let mut session = open(dir.path(), Some(Box::new(FakeDetector::new(Vec::new()))));
        assert!(session.adjust_threshold(false).unwrap());
        assert!((session.settings().detector.threshold - 0.45).abs() < 1e-6);
        assert!(session.toggle_tiling().unwrap());
        assert!(session.settings().detector.enable_tiles);
    }

    #[test]
    fn test_set_class_rejection_is_a_notice() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();
        assert!(session.set_selected_class(3).is_err());
        assert_eq!(session.store().marks()[0].class_idx, 0);
        assert_eq!(session.take_notices().len(), 1);
    }

    #[test]
    fn test_delete_current_image_moves_to_trash() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png", "c.png"]);
        let mut session = open(dir.path(), None);
        session.goto_index(1).unwrap();
        session.add_mark(car(0.1)).unwrap();

        let removed = session.delete_current_image().unwrap();
        assert_eq!(removed, images[1]);
        assert!(!images[1].exists());
        let trash = dir.path().join(".trash");
        assert!(trash.join("b.png").exists());
        assert!(trash.join("b.json").exists());
        assert_eq!(session.current_image(), images[2]);
        assert_eq!(session.navigator().index(), 1);

        session.delete_current_image().unwrap();
        assert_eq!(session.current_image(), images[0]);
        assert!(matches!(session.delete_current_image(), Err(AnnotationError::LastImage)));
    }

    #[test]
    fn test_mark_empty_and_advance() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png", "c.png"]);
        let mut session = open(dir.path(), None);
        session.goto_index(1).unwrap();
        session.add_mark(car(0.1)).unwrap();
        session.goto_first().unwrap();

        assert_eq!(session.mark_empty_and_advance().unwrap(), 2);
        assert_eq!(count_marks(&images[0].with_extension("json"), false).unwrap(), 1);
        assert_eq!(session.current_image(), images[2]);
    }

    #[test]
    fn test_copy_marks_from_neighbor() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png", "c.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();
        session.add_mark(car(0.5)).unwrap();
        session.goto_last().unwrap();
        session.add_mark(car(0.1)).unwrap();

        let report = session
            .copy_marks_from_neighbor(Direction::Backward)
            .unwrap()
            .unwrap();
        assert_eq!(report.source, dir.path().join("a.png"));
        assert_eq!((report.added, report.skipped), (1, 1));
        assert_eq!(session.store().confirmed_count(), 2);

        session.goto_first().unwrap();
        assert!(session.copy_marks_from_neighbor(Direction::Backward).unwrap().is_none());
    }

    #[test]
    fn test_sort_by_count_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png", "c.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();
        session.add_mark(car(0.5)).unwrap();
        session.goto_index(1).unwrap();
        session.add_mark(car(0.1)).unwrap();

        session.set_sort_order(SortOrder::CountMarks).unwrap();
        assert!(matches!(session.wait_batch(), Some(BatchOutcome::Completed(_))));
        assert_eq!(
            session.navigator().images(),
            &[images[2].clone(), images[1].clone(), images[0].clone()]
        );
        assert_eq!(session.current_image(), images[1]);

        session.set_sort_order(SortOrder::CountMarks).unwrap();
        session.wait_batch();
        assert_eq!(session.current_image(), images[1]);
        assert_eq!(session.navigator().images()[0], images[2]);
    }

    #[test]
    fn test_batch_jobs_reload_current_image() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png"]);
        std::fs::write(images[0].with_extension("txt"), "1 0.5 0.5 0.2 0.2\n").unwrap();
        let mut session = open(dir.path(), None);
        // text-only sidecar: loaded and flushed when the job starts
        assert_eq!(session.store().confirmed_count(), 1);

        session.start_import_text_annotations().unwrap();
        assert!(matches!(session.wait_batch(), Some(BatchOutcome::Completed(_))));
        assert!(images[0].with_extension("json").exists());
        assert_eq!(session.store().confirmed_count(), 1);
        assert!(!session.store().need_to_save());
    }

    #[test]
    fn test_rotate_adds_new_images() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();

        session.start_rotate_images(vec![90, 270]).unwrap();
        session.wait_batch();
        assert_eq!(session.navigator().len(), 4);
        assert!(dir.path().join("a_r270.png").exists());

        session.start_delete_rotate_and_flip().unwrap();
        session.wait_batch();
        assert_eq!(session.navigator().len(), 2);
        assert!(!dir.path().join("a_r270.png").exists());
    }

    #[test]
    fn test_export_from_session() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png"]);
        let mut session = open(dir.path(), None);
        session.add_mark(car(0.1)).unwrap();
        let summary = session.export_training_files().unwrap();
        assert_eq!(summary.train + summary.valid, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_trash_keeps_sidecars_with_their_image() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png", "b.png", "c.png"]);
        {
            let mut session = open(dir.path(), None);
            session.goto_index(1).unwrap();
            session.delete_current_image().unwrap();
        }
        make_images(dir.path(), &["b.png"]);
        let mut session = open(dir.path(), None);
        session.goto_index(1).unwrap();
        session.add_mark(car(0.1)).unwrap();
        session.delete_current_image().unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join(".trash"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["b.png", "b_1.json", "b_1.png", "b_1.txt"]);
    }

    fn has_parse_warning(notices: &[Notice], name: &str) -> bool {
        notices
            .iter()
            .any(|n| n.level == Level::Warn && n.text.contains("failed to parse") && n.text.contains(name))
    }

    fn open_with_broken_file(dir: &Path) -> (Vec<PathBuf>, Session) {
        let images = make_images(dir, &["a.png", "b.png", "c.png"]);
        std::fs::write(images[1].with_extension("json"), "{ broken").unwrap();
        let mut session = open(dir, None);
        session.add_mark(car(0.1)).unwrap();
        assert!(session.take_notices().is_empty());
        (images, session)
    }

    #[test]
    fn test_count_sort_reports_unparsable_files() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut session) = open_with_broken_file(dir.path());
        session.set_sort_order(SortOrder::CountMarks).unwrap();
        session.wait_batch();
        assert!(has_parse_warning(&session.take_notices(), "b.json"));
    }

    #[test]
    fn test_review_reports_unparsable_files() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut session) = open_with_broken_file(dir.path());
        session.start_review().unwrap();
        assert!(matches!(session.wait_batch(), Some(BatchOutcome::Completed(_))));
        let notices = session.take_notices();
        assert!(has_parse_warning(&notices, "b.json"));
        assert!(notices.iter().any(|n| n.text == "1 marks ready for review"));
    }

    #[test]
    fn test_neighbor_search_reports_unparsable_files() {
        let dir = tempfile::tempdir().unwrap();
        let (images, mut session) = open_with_broken_file(dir.path());
        session.goto_last().unwrap();
        session.take_notices();

        let report = session.copy_marks_from_neighbor(Direction::Backward).unwrap().unwrap();
        assert_eq!(report.source, images[0]);
        assert!(has_parse_warning(&session.take_notices(), "b.json"));
    }

    #[test]
    fn test_skip_scan_reports_unparsable_files() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut session) = open_with_broken_file(dir.path());
        session.skip_to_next_unannotated(Direction::Forward).unwrap();
        assert!(has_parse_warning(&session.take_notices(), "b.json"));
    }

    #[test]
    fn test_unreadable_image_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        std::fs::write(&image, b"not a jpeg at all").unwrap();
        {
            let mut session = open(dir.path(), None);
            let info = session.store().image_info();
            assert!(info.is_placeholder);
            assert_eq!((info.width, info.height), (32, 32));
            let notices = session.take_notices();
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0].level, Level::Warn);

            session.add_mark(car(0.1)).unwrap();
            assert_eq!(session.store().confirmed_count(), 1);
        }
        assert_eq!(count_marks(&image.with_extension("json"), false).unwrap(), 1);
    }

    #[test]
    fn test_detector_settings_need_a_detector() {
        let dir = tempfile::tempdir().unwrap();
        make_images(dir.path(), &["a.png"]);
        let mut session = open(dir.path(), None);
        assert!(matches!(
            session.adjust_threshold(true),
            Err(AnnotationError::DetectorUnavailable(_))
        ));
        assert!(matches!(session.toggle_tiling(), Err(AnnotationError::DetectorUnavailable(_))));
        assert!(!session.settings().detector.enable_tiles);
        assert_eq!(session.take_notices().len(), 2);

        assert_eq!(session.cycle_show_predictions().unwrap(), Toggle::Off);
        let notices = session.take_notices();
        assert_eq!(notices.last().unwrap().text, "show predictions: off");
    }

    #[test]
    fn test_read_only_session_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png", "b.png"]);
        std::fs::write(images[0].with_extension("txt"), "1 0.5 0.5 0.2 0.2\n").unwrap();
        {
            let mut session = open(dir.path(), None);
            session.set_read_only(true);
            assert!(session.store().need_to_save());

            session.start_statistics().unwrap();
            assert!(matches!(session.wait_batch(), Some(BatchOutcome::Completed(_))));
            session.start_review().unwrap();
            session.wait_batch();
            session.set_sort_order(SortOrder::Random).unwrap();
            session.set_sort_order(SortOrder::CountMarks).unwrap();
            session.wait_batch();
        }
        assert!(!images[0].with_extension("json").exists());
        assert!(!images[1].with_extension("json").exists());
    }

    #[test]
    fn test_drop_flushes_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let images = make_images(dir.path(), &["a.png"]);
        {
            let mut session = open(dir.path(), None);
            session.add_mark(car(0.1)).unwrap();
        }
        assert!(images[0].with_extension("json").exists());
    }
}
