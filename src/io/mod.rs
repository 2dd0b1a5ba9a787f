// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations for images, sidecar annotation files and training exports.

pub mod export;
pub mod files;
pub mod media;
pub mod serialization;
pub mod sidecar;
