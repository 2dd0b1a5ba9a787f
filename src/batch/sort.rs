// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Sort keys for the orders that need a pass over every file.

use super::{BatchOutcome, JobControl};
use crate::error::Result;
use crate::io::media::modified_millis;
use crate::io::serialization::count_marks;
use crate::io::sidecar::Sidecars;
use crate::models::project::SortOrder;
use std::path::{Path, PathBuf};

/// Keys for every image, plus the structured files that could not be parsed.
/// Unparsable files sort as 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortKeys {
    pub keys: Vec<(PathBuf, u128)>,
    pub unreadable: Vec<PathBuf>,
}

/// Key of one image. Only the field relevant to `order` is read.
pub fn sort_key(image: &Path, order: SortOrder) -> Result<u128> {
    match order {
        SortOrder::CountMarks => {
            let json = Sidecars::for_image(image).json;
            Ok(count_marks(&json, true)? as u128)
        }
        SortOrder::Timestamp => Ok(modified_millis(image)),
        SortOrder::Alphabetical | SortOrder::Random => Ok(0),
    }
}

/// Compute the key of every image for `order`.
pub fn compute_sort_keys(
    images: &[PathBuf],
    order: SortOrder,
    control: &JobControl,
) -> BatchOutcome<SortKeys> {
    let total = images.len();
    let mut result = SortKeys {
        keys: Vec::with_capacity(total),
        unreadable: Vec::new(),
    };
    for (i, image) in images.iter().enumerate() {
        if control.is_cancelled() {
            return BatchOutcome::Cancelled { processed: i };
        }
        let key = sort_key(image, order).unwrap_or_else(|e| {
            log::warn!("{}", e);
            result.unreadable.push(Sidecars::for_image(image).json);
            0
        });
        result.keys.push((image.clone(), key));
        control.report(i + 1, total);
    }
    BatchOutcome::Completed(result)
}
