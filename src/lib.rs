// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! BOXMARK - bounding-box annotation engine
//!
//! The editing core behind an object-detection labelling tool: marks and
//! their sidecar files, the image collection, detector predictions and
//! collection-wide batch jobs. Rendering and mouse editing live elsewhere
//! and drive the core through [`session::Session`] and [`commands::Command`].

pub mod batch;
pub mod commands;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod navigator;
pub mod predict;
pub mod session;
pub mod store;
pub mod util;
