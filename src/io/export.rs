// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Training-file export for Darknet-style trainers.
//!
//! Produces `obj.names`, `obj.data`, the `train.txt`/`valid.txt` image
//! lists and a `train.sh` script that starts the external trainer. Training
//! itself is never run from here.

use crate::error::{AnnotationError, Result};
use crate::io::files::write_whole_file;
use crate::io::serialization::read_annotation_file;
use crate::io::sidecar::Sidecars;
use crate::models::classes::ClassTable;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

pub const NAMES_FILE: &str = "obj.names";
pub const DATA_FILE: &str = "obj.data";
pub const TRAIN_LIST_FILE: &str = "train.txt";
pub const VALID_LIST_FILE: &str = "valid.txt";
pub const SCRIPT_FILE: &str = "train.sh";
pub const BACKUP_DIR: &str = "backup";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Where the generated files go.
    pub output_dir: PathBuf,
    /// Share of images placed in the training list, 0..=100.
    pub train_percentage: u32,
    /// Network configuration handed to the trainer.
    pub cfg_file: String,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            train_percentage: 85,
            cfg_file: "yolov4-tiny.cfg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub train: usize,
    pub valid: usize,
    /// Images left out because they have no confirmed marks.
    pub skipped: usize,
}

fn has_confirmed_marks(image: &Path) -> bool {
    let sidecars = Sidecars::for_image(image);
    match read_annotation_file(&sidecars.json) {
        Ok(Some(file)) => !file.mark.is_empty(),
        Ok(None) => false,
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}

/// Number of images that go into the training list.
fn train_count(total: usize, train_percentage: u32) -> usize {
    if total == 0 {
        return 0;
    }
    let pct = train_percentage.min(100) as f64 / 100.0;
    let count = (total as f64 * pct).round() as usize;
    count.clamp(1, total)
}

fn path_list(images: &[PathBuf]) -> String {
    images
        .iter()
        .map(|p| format!("{}\n", p.display()))
        .collect()
}

/// Write every training file for `images` into `options.output_dir`.
pub fn write_training_files(
    images: &[PathBuf],
    classes: &ClassTable,
    options: &ExportOptions,
) -> Result<ExportSummary> {
    let out = &options.output_dir;
    std::fs::create_dir_all(out.join(BACKUP_DIR))
        .map_err(|e| AnnotationError::io("creating directory", out, e))?;

    let mut selected: Vec<PathBuf> = images
        .iter()
        .filter(|p| has_confirmed_marks(p))
        .cloned()
        .collect();
    let skipped = images.len() - selected.len();
    selected.shuffle(&mut rand::thread_rng());

    let split = train_count(selected.len(), options.train_percentage);
    let (train, valid) = selected.split_at(split);

    let names_path = out.join(NAMES_FILE);
    let data_path = out.join(DATA_FILE);
    let train_path = out.join(TRAIN_LIST_FILE);
    let valid_path = out.join(VALID_LIST_FILE);

    let names: String = classes
        .real_names()
        .iter()
        .map(|n| format!("{}\n", n))
        .collect();
    write_whole_file(&names_path, names.as_bytes())?;

    let data = format!(
        "classes = {}\ntrain = {}\nvalid = {}\nnames = {}\nbackup = {}\n",
        classes.len(),
        train_path.display(),
        valid_path.display(),
        names_path.display(),
        out.join(BACKUP_DIR).display()
    );
    write_whole_file(&data_path, data.as_bytes())?;
    write_whole_file(&train_path, path_list(train).as_bytes())?;
    write_whole_file(&valid_path, path_list(valid).as_bytes())?;

    let script = format!(
        "#!/bin/bash\n\ncd {}\n\ndarknet detector -map -dont_show train {} {}\n",
        out.display(),
        data_path.display(),
        options.cfg_file
    );
    let script_path = out.join(SCRIPT_FILE);
    write_whole_file(&script_path, script.as_bytes())?;
    make_executable(&script_path)?;

    let summary = ExportSummary {
        train: train.len(),
        valid: valid.len(),
        skipped,
    };
    log::info!(
        "training files written to {}: {} train, {} valid, {} skipped",
        out.display(),
        summary.train,
        summary.valid,
        summary.skipped
    );
    Ok(summary)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| AnnotationError::io("setting permissions on", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
