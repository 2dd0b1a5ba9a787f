// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Class-name table.
//!
//! The table is loaded once per session. One synthetic trailing entry stands
//! for "empty image"; it can be displayed but is never an assignable class.

use crate::error::{AnnotationError, Result};
use std::path::Path;

/// Display name of the synthetic trailing entry.
pub const EMPTY_IMAGE_NAME: &str = "* empty image *";

/// Names used when no class list is available at all.
pub const FALLBACK_NAMES: [&str; 5] = ["car", "person", "bicycle", "dog", "cat"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    /// Real class names followed by `EMPTY_IMAGE_NAME`.
    names: Vec<String>,
}

impl ClassTable {
    /// Build a table from real class names. An empty list falls back to
    /// `FALLBACK_NAMES`.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            log::warn!("classes/names is empty, creating some dummy entries");
            names = FALLBACK_NAMES.iter().map(|s| s.to_string()).collect();
        }
        log::info!("number of name entries: {}", names.len());
        names.push(EMPTY_IMAGE_NAME.to_string());
        Self { names }
    }

    /// Read a `.names` file: one class per line, stopping at the first blank line.
    pub fn from_names_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnnotationError::io("reading class names", path, e))?;
        let names: Vec<String> = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .take_while(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self::new(names))
    }

    /// Number of real (assignable) classes.
    pub fn len(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the synthetic "empty image" entry.
    pub fn empty_image_index(&self) -> usize {
        self.len()
    }

    pub fn is_assignable(&self, class_idx: usize) -> bool {
        class_idx < self.len()
    }

    /// Reject indices at or beyond the synthetic entry.
    pub fn check_assignable(&self, class_idx: usize) -> Result<()> {
        if self.is_assignable(class_idx) {
            Ok(())
        } else {
            Err(AnnotationError::ClassOutOfRange {
                class_idx,
                last: self.len().saturating_sub(1),
            })
        }
    }

    /// Name of any entry, including the synthetic one.
    pub fn name(&self, class_idx: usize) -> Option<&str> {
        self.names.get(class_idx).map(String::as_str)
    }

    /// Name for display, tolerating indices the table does not know.
    pub fn display_name(&self, class_idx: usize) -> String {
        self.name(class_idx)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", class_idx))
    }

    /// Real class names, without the synthetic entry.
    pub fn real_names(&self) -> &[String] {
        &self.names[..self.len()]
    }
}
