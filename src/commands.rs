// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Commands and menu state for whatever front end drives a session.
//!
//! `MenuState` is a pure snapshot used to enable or check menu entries.
//! `Command` names every interactive operation so key bindings and menu
//! entries can share one dispatch point.

use crate::error::Result;
use crate::models::project::{Direction, SortOrder};
use crate::models::toggle::Toggle;
use crate::session::Session;
use crate::store::AcceptTarget;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuState {
    /// A batch job holds the collection; every entry below is disabled.
    pub busy: bool,
    pub can_set_class: bool,
    pub can_accept: bool,
    pub pending_predictions: usize,
    pub can_erase: bool,
    pub mark_count: usize,
    pub can_mark_empty: bool,
    pub is_empty_image: bool,
    pub can_delete_image: bool,
    pub active_sort_order: SortOrder,
    pub show_predictions: Toggle,
    pub show_marks: bool,
    pub show_labels: Toggle,
    pub predictions_available: bool,
    pub threshold: f32,
    pub tiling: bool,
}

impl MenuState {
    pub fn query(session: &Session) -> Self {
        let store = session.store();
        let settings = session.settings();
        let busy = session.is_busy();
        let confirmed = store.confirmed_count();
        let pending = store.prediction_count();
        let selected_is_prediction = store
            .selected()
            .and_then(|i| store.marks().get(i))
            .is_some_and(|m| m.is_prediction);

        Self {
            busy,
            can_set_class: !busy && store.selected().is_some(),
            can_accept: !busy && (selected_is_prediction || (pending > 0 && confirmed == 0)),
            pending_predictions: pending,
            can_erase: !busy && (!store.marks().is_empty() || store.is_completely_empty()),
            mark_count: store.marks().len(),
            can_mark_empty: !busy && confirmed == 0 && !store.is_completely_empty(),
            is_empty_image: store.is_completely_empty(),
            can_delete_image: !busy && session.navigator().len() > 1,
            active_sort_order: session.navigator().sort_order(),
            show_predictions: settings.show_predictions,
            show_marks: settings.show_marks,
            show_labels: settings.show_labels,
            predictions_available: session.has_detector() && session.predictions_enabled(),
            threshold: settings.detector.threshold,
            tiling: settings.detector.enable_tiles,
        }
    }
}

/// One interactive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    First,
    Last,
    Goto(usize),
    SkipToUnannotated(Direction),
    DeleteImage,
    MarkEmptyAndAdvance,
    SetEmpty(bool),
    /// Assign a class to the selected mark.
    SetClass(usize),
    DeleteSelectedMark,
    AcceptCurrent,
    AcceptAll,
    EraseAll,
    SelectNext(Direction),
    ClearSelection,
    CopyFromNeighbor(Direction),
    SetSortOrder(SortOrder),
    CycleShowPredictions,
    SetShowPredictions(Toggle),
    ToggleShowMarks,
    CycleShowLabels,
    ThresholdUp,
    ThresholdDown,
    ToggleTiling,
    CancelBatch,
}

impl Session {
    pub fn execute(&mut self, command: Command) -> Result<()> {
        log::debug!("command {:?}", command);
        match command {
            Command::Next => {
                self.goto_relative(1)?;
            }
            Command::Previous => {
                self.goto_relative(-1)?;
            }
            Command::First => {
                self.goto_first()?;
            }
            Command::Last => {
                self.goto_last()?;
            }
            Command::Goto(index) => {
                self.goto_index(index)?;
            }
            Command::SkipToUnannotated(direction) => {
                self.skip_to_next_unannotated(direction)?;
            }
            Command::DeleteImage => {
                self.delete_current_image()?;
            }
            Command::MarkEmptyAndAdvance => {
                self.mark_empty_and_advance()?;
            }
            Command::SetEmpty(empty) => self.set_completely_empty(empty)?,
            Command::SetClass(class_idx) => self.set_selected_class(class_idx)?,
            Command::DeleteSelectedMark => {
                self.delete_selected_mark()?;
            }
            Command::AcceptCurrent => {
                self.accept_current()?;
            }
            Command::AcceptAll => {
                self.accept(AcceptTarget::All)?;
            }
            Command::EraseAll => self.erase_all()?,
            Command::SelectNext(direction) => {
                self.select_next(direction)?;
            }
            Command::ClearSelection => self.select(None)?,
            Command::CopyFromNeighbor(direction) => {
                self.copy_marks_from_neighbor(direction)?;
            }
            Command::SetSortOrder(order) => self.set_sort_order(order)?,
            Command::CycleShowPredictions => {
                self.cycle_show_predictions()?;
            }
            Command::SetShowPredictions(toggle) => self.set_show_predictions(toggle)?,
            Command::ToggleShowMarks => {
                let show = !self.settings().show_marks;
                self.set_show_marks(show);
            }
            Command::CycleShowLabels => {
                let next = self.settings().show_labels.next();
                self.set_show_labels(next);
            }
            Command::ThresholdUp => {
                self.adjust_threshold(true)?;
            }
            Command::ThresholdDown => {
                self.adjust_threshold(false)?;
            }
            Command::ToggleTiling => {
                self.toggle_tiling()?;
            }
            Command::CancelBatch => self.cancel_batch(),
        }
        Ok(())
    }
}
