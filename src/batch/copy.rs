// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Copy marks from the nearest annotated neighbour.

use super::{BatchOutcome, JobControl};
use crate::io::serialization::read_annotation_file;
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use crate::models::mark::Mark;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborMarks {
    pub source: PathBuf,
    pub marks: Vec<Mark>,
}

/// Result of a neighbour search: the marks found, if any, and the
/// structured files skipped because they could not be parsed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeighborSearch {
    pub found: Option<NeighborMarks>,
    pub unreadable: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyReport {
    pub source: PathBuf,
    pub added: usize,
    pub skipped: usize,
}

/// Walk `candidates` (nearest first) and return the confirmed marks of the
/// first one that has any. `found` is `None` when no candidate qualifies.
pub fn find_neighbor_marks(
    candidates: &[PathBuf],
    classes: &ClassTable,
    control: &JobControl,
) -> BatchOutcome<NeighborSearch> {
    let total = candidates.len();
    let mut search = NeighborSearch::default();
    for (i, image) in candidates.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        control.report(i + 1, total);

        let json = Sidecars::for_image(image).json;
        match read_annotation_file(&json) {
            Ok(Some(file)) if !file.mark.is_empty() => {
                log::info!("copying {} marks from {}", file.mark.len(), image.display());
                search.found = Some(NeighborMarks {
                    source: image.clone(),
                    marks: file.to_marks(classes),
                });
                break;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("{}", e);
                search.unreadable.push(json);
            }
        }
    }
    BatchOutcome::Completed(search)
}
