// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Tri-state display toggles.

use serde::{Deserialize, Serialize};

/// An on/off/auto switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Off,
    On,
    #[default]
    Auto,
}

impl Toggle {
    /// Cycle Off -> On -> Auto -> Off.
    pub fn next(self) -> Self {
        match self {
            Toggle::Off => Toggle::On,
            Toggle::On => Toggle::Auto,
            Toggle::Auto => Toggle::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Toggle::Off => "off",
            Toggle::On => "on",
            Toggle::Auto => "auto",
        }
    }
}

/// Facts about the current image that `Auto` resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityContext {
    pub confirmed_marks: usize,
}

impl VisibilityContext {
    pub fn new(confirmed_marks: usize) -> Self {
        Self { confirmed_marks }
    }
}

/// Resolve a toggle to a concrete decision. `Auto` means "only while the
/// image has no confirmed marks".
pub fn effective_visibility(toggle: Toggle, context: &VisibilityContext) -> bool {
    match toggle {
        Toggle::On => true,
        Toggle::Off => false,
        Toggle::Auto => context.confirmed_marks == 0,
    }
}
