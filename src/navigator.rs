// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image navigator: ordering and traversal of the image collection.
//!
//! The navigator owns the list of image paths, the cursor and the active
//! sort order. It never touches annotations itself; callers pair every
//! cursor move with a store flush and load.

use crate::error::{AnnotationError, Result};
use crate::models::project::{Direction, SortOrder};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ImageNavigator {
    image_filenames: Vec<PathBuf>,
    image_filename_index: usize,
    sort_order: SortOrder,
}

impl ImageNavigator {
    /// Create a navigator over `images`. Duplicate paths are dropped; an
    /// empty collection is refused.
    pub fn new(images: Vec<PathBuf>) -> Result<Self> {
        let mut seen = HashSet::new();
        let image_filenames: Vec<PathBuf> = images
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        if image_filenames.is_empty() {
            return Err(AnnotationError::NoImages);
        }
        Ok(Self {
            image_filenames,
            image_filename_index: 0,
            sort_order: SortOrder::Alphabetical,
        })
    }

    pub fn len(&self) -> usize {
        self.image_filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_filenames.is_empty()
    }

    pub fn index(&self) -> usize {
        self.image_filename_index
    }

    pub fn current(&self) -> &Path {
        &self.image_filenames[self.image_filename_index]
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.image_filenames
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.image_filenames.iter().position(|p| p == path)
    }

    /// Move the cursor, clamping into range. Returns the new index.
    pub fn goto_index(&mut self, index: usize) -> usize {
        self.image_filename_index = index.min(self.len() - 1);
        self.image_filename_index
    }

    pub fn goto_relative(&mut self, delta: isize) -> usize {
        let target = self.image_filename_index as isize + delta;
        self.goto_index(target.max(0) as usize)
    }

    pub fn goto_first(&mut self) -> usize {
        self.goto_index(0)
    }

    pub fn goto_last(&mut self) -> usize {
        self.goto_index(self.len() - 1)
    }

    fn restore_cursor(&mut self, previous: &Path) {
        self.image_filename_index = self.position_of(previous).unwrap_or(0);
    }

    /// Lexicographic path order; the cursor stays on the same image.
    pub fn sort_alphabetical(&mut self) {
        let previous = self.current().to_path_buf();
        self.image_filenames.sort();
        self.sort_order = SortOrder::Alphabetical;
        self.restore_cursor(&previous);
    }

    /// Uniform shuffle; the cursor resets to the first image.
    pub fn shuffle(&mut self) {
        self.image_filenames.shuffle(&mut rand::thread_rng());
        self.sort_order = SortOrder::Random;
        self.image_filename_index = 0;
    }

    /// Order by precomputed keys, ties broken by path. Images without a key
    /// sort as 0. The cursor stays on the same image.
    pub fn apply_keyed(&mut self, order: SortOrder, keys: &[(PathBuf, u128)]) {
        let previous = self.current().to_path_buf();
        let lookup: HashMap<&Path, u128> = keys.iter().map(|(p, k)| (p.as_path(), *k)).collect();
        self.image_filenames.sort_by(|a, b| {
            let ka = lookup.get(a.as_path()).copied().unwrap_or(0);
            let kb = lookup.get(b.as_path()).copied().unwrap_or(0);
            ka.cmp(&kb).then_with(|| a.cmp(b))
        });
        self.sort_order = order;
        self.restore_cursor(&previous);
    }

    /// Index of the next image in `direction` for which `count_marks`
    /// returns 0, or the collection boundary when there is none.
    pub fn find_unannotated<F>(&self, direction: Direction, mut count_marks: F) -> usize
    where
        F: FnMut(&Path) -> usize,
    {
        let mut idx = self.image_filename_index;
        loop {
            match direction {
                Direction::Forward if idx + 1 < self.len() => idx += 1,
                Direction::Backward if idx > 0 => idx -= 1,
                _ => return idx,
            }
            if count_marks(&self.image_filenames[idx]) == 0 {
                return idx;
            }
        }
    }

    /// Drop the current image from the list. The cursor stays at the same
    /// index, or moves to the new last image.
    pub fn remove_current(&mut self) -> Result<PathBuf> {
        if self.len() <= 1 {
            return Err(AnnotationError::LastImage);
        }
        let removed = self.image_filenames.remove(self.image_filename_index);
        self.image_filename_index = self.image_filename_index.min(self.len() - 1);
        Ok(removed)
    }

    /// Drop every listed path. Refused if nothing would remain.
    pub fn remove_paths(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let doomed: HashSet<&PathBuf> = paths.iter().collect();
        let remaining = self
            .image_filenames
            .iter()
            .filter(|p| !doomed.contains(p))
            .count();
        if remaining == 0 {
            return Err(AnnotationError::NoImages);
        }

        let previous = self.current().to_path_buf();
        let index = self.image_filename_index;
        let before = self.len();
        self.image_filenames.retain(|p| !doomed.contains(p));
        match self.position_of(&previous) {
            Some(i) => self.image_filename_index = i,
            None => self.image_filename_index = index.min(self.len() - 1),
        }
        Ok(before - self.len())
    }

    /// Append new images. Alphabetical order is kept up to date; other
    /// orders receive them at the end until the next re-sort.
    pub fn add_paths(&mut self, paths: &[PathBuf]) -> usize {
        let mut seen: HashSet<PathBuf> = self.image_filenames.iter().cloned().collect();
        let mut added = 0;
        for path in paths {
            if seen.insert(path.clone()) {
                self.image_filenames.push(path.clone());
                added += 1;
            }
        }
        if added > 0 && self.sort_order == SortOrder::Alphabetical {
            self.sort_alphabetical();
        }
        added
    }

    /// Images next to the current one in alphabetical order, nearest first,
    /// regardless of the active sort order.
    pub fn alphabetical_neighbors(&self, direction: Direction) -> Vec<PathBuf> {
        let mut sorted = self.image_filenames.clone();
        sorted.sort();
        let Some(pos) = sorted.iter().position(|p| p == self.current()) else {
            return Vec::new();
        };
        match direction {
            Direction::Forward => sorted[pos + 1..].to_vec(),
            Direction::Backward => sorted[..pos].iter().rev().cloned().collect(),
        }
    }
}
