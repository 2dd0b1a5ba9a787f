// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data models for marks, classes and project state.

pub mod classes;
pub mod mark;
pub mod project;
pub mod toggle;
