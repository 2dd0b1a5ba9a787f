// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for the annotation engine.
//!
//! Every variant is recoverable except `NoImages`, which stops a session
//! from opening. Cancelling a batch job is not an error and never shows up
//! here.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotationError {
    /// A structured sidecar file could not be parsed.
    #[error("failed to parse {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A plain-text sidecar file holds an invalid line.
    #[error("invalid annotation in {} line {line}: {message}", .path.display())]
    MalformedText {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("neural network unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("failed to get predictions: {0}")]
    Detector(String),

    #[error("failure while {operation} {}: {source}", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failure while reading image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("class id #{class_idx} is beyond the highest defined class #{last}")]
    ClassOutOfRange { class_idx: usize, last: usize },

    #[error("mark #{0} does not exist")]
    NoSuchMark(usize),

    #[error("delete annotations before marking the image as empty")]
    MarksPresent,

    #[error("cannot delete the last remaining image")]
    LastImage,

    #[error("a batch operation is still running")]
    Busy,

    #[error("no images found")]
    NoImages,
}

impl AnnotationError {
    /// Wrap an I/O failure with the operation that was being attempted.
    pub fn io(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = AnnotationError> = std::result::Result<T, E>;
