// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! File-system helpers shared by the codecs and batch operations.
//!
//! Writes always replace the whole target file: content goes to a temporary
//! file in the same directory which is then renamed over the target, so a
//! reader never sees a half-written sidecar.

use crate::error::{AnnotationError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents`.
pub fn write_whole_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let operation = "writing";

    let mut tmp = tempfile::Builder::new()
        .prefix(".boxmark-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| AnnotationError::io(operation, path, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.flush())
        .map_err(|e| AnnotationError::io(operation, path, e))?;
    tmp.persist(path)
        .map_err(|e| AnnotationError::io(operation, path, e.error))?;
    Ok(())
}

/// Delete a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AnnotationError::io("deleting", path, e)),
    }
}

fn rename_or_copy(path: &Path, target: &Path) -> Result<()> {
    if std::fs::rename(path, target).is_err() {
        // rename fails across file systems; fall back to copy + delete
        std::fs::copy(path, target).map_err(|e| AnnotationError::io("moving", path, e))?;
        std::fs::remove_file(path).map_err(|e| AnnotationError::io("moving", path, e))?;
    }
    log::info!("moved {} to {}", path.display(), target.display());
    Ok(())
}

fn target_name(path: &Path, stem: &str) -> String {
    match path.extension() {
        Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
        None => stem.to_string(),
    }
}

/// Move `paths` into `dir` under one shared stem, so an image and its
/// sidecars stay paired. The stem is the first `<stem>` or `<stem>_N` for
/// which no target name exists yet. Missing sources are skipped. Returns
/// the new locations of the files that were moved.
pub fn move_group_with_unique_stem(paths: &[&Path], dir: &Path) -> Result<Vec<PathBuf>> {
    let Some(first) = paths.first() else {
        return Ok(Vec::new());
    };
    std::fs::create_dir_all(dir).map_err(|e| AnnotationError::io("creating directory", dir, e))?;

    let base = first
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut stem = base.clone();
    let mut counter = 1;
    while paths.iter().any(|p| dir.join(target_name(p, &stem)).exists()) {
        stem = format!("{}_{}", base, counter);
        counter += 1;
    }

    let mut moved = Vec::new();
    for path in paths.iter().filter(|p| p.exists()) {
        let target = dir.join(target_name(path, &stem));
        rename_or_copy(path, &target)?;
        moved.push(target);
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_whole_file(&path, b"first version, quite long").unwrap();
        write_whole_file(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&dir.path().join("missing.json")).is_ok());
    }

    #[test]
    fn test_move_keeps_both_when_names_collide() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join(".trash");
        let first = dir.path().join("img.jpg");
        std::fs::write(&first, b"1").unwrap();
        let moved1 = move_group_with_unique_stem(&[&first], &trash).unwrap();
        std::fs::write(&first, b"2").unwrap();
        let moved2 = move_group_with_unique_stem(&[&first], &trash).unwrap();
        assert_ne!(moved1, moved2);
        assert_eq!(moved2[0].file_name().unwrap(), "img_1.jpg");
        assert!(!first.exists());
    }

    #[test]
    fn test_group_move_keeps_one_stem() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join(".trash");
        let image = dir.path().join("b.png");
        let json = dir.path().join("b.json");
        let text = dir.path().join("b.txt");

        // first an unannotated image, then one with both sidecars
        std::fs::write(&image, b"1").unwrap();
        move_group_with_unique_stem(&[&image, &json, &text], &trash).unwrap();
        for path in [&image, &json, &text] {
            std::fs::write(path, b"2").unwrap();
        }
        let moved = move_group_with_unique_stem(&[&image, &json, &text], &trash).unwrap();

        let names: Vec<String> = moved
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b_1.png", "b_1.json", "b_1.txt"]);
        let mut in_trash: Vec<String> = std::fs::read_dir(&trash)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        in_trash.sort();
        assert_eq!(in_trash, vec!["b.png", "b_1.json", "b_1.png", "b_1.txt"]);
        assert!(!image.exists() && !json.exists() && !text.exists());
    }
}
