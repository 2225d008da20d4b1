//! Course loading pipeline.
//!
//! Coordinates the load flow: folder scan → text extraction → parsing and
//! chunking → catalog and content upserts.
//!
//! A file that cannot be read or parsed is recorded in
//! [`LoadSummary::failed`] and the batch continues. A file whose course
//! title is already in the catalog is skipped. An unavailable index
//! aborts the load, since every later file would fail the same way.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::document::DocumentProcessor;
use crate::error::{RagError, RagResult};
use crate::extract::{extract_text, DocumentKind};
use crate::models::Course;
use crate::vector_store::VectorIndex;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Titles already present in the catalog.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Files under `root` matching `include_globs`, sorted by relative path.
pub fn scan_course_files(root: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Course folder does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(&["**/.*/**".to_string(), "**/.*".to_string()])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

/// Read and extract the text of one course file.
pub fn read_course_file(path: &Path) -> Result<String> {
    let kind = DocumentKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    Ok(extract_text(&bytes, kind)?)
}

/// Parse `text`, then write its catalog entry and chunks. Returns the
/// course and its chunk count.
pub async fn index_course_text(
    index: &VectorIndex,
    processor: &DocumentProcessor,
    text: &str,
) -> RagResult<(Course, usize)> {
    let (course, chunks) = processor.process(text)?;
    index.upsert_chunks(&chunks).await?;
    index.upsert_course(&course).await?;
    Ok((course, chunks.len()))
}

/// Load every matching file under `root`.
///
/// With `clear_existing` the whole index is dropped first. A missing
/// folder loads nothing.
pub async fn load_folder(
    index: &VectorIndex,
    processor: &DocumentProcessor,
    root: &Path,
    include_globs: &[String],
    clear_existing: bool,
) -> RagResult<LoadSummary> {
    let mut summary = LoadSummary::default();

    if clear_existing {
        index.clear().await?;
    }

    if !root.is_dir() {
        tracing::warn!(folder = %root.display(), "course folder not found, nothing loaded");
        return Ok(summary);
    }

    let files = scan_course_files(root, include_globs).map_err(|e| {
        RagError::Format(format!("scanning {}: {}", root.display(), e))
    })?;
    let mut existing: HashSet<String> = index.course_titles().await?.into_iter().collect();

    for path in files {
        let file_path = path.display().to_string();
        let text = match read_course_file(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %file_path, error = %e, "failed to read course file");
                summary.failed.push(FailedFile {
                    path: file_path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let (course, chunks) = match processor.process(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(file = %file_path, error = %e, "skipping malformed course file");
                summary.failed.push(FailedFile {
                    path: file_path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if existing.contains(&course.title) {
            tracing::info!(course = %course.title, "course already indexed, skipping");
            summary.skipped.push(course.title);
            continue;
        }

        // Content first: the catalog entry marks the course as loaded.
        index.upsert_chunks(&chunks).await?;
        index.upsert_course(&course).await?;
        tracing::info!(
            course = %course.title,
            chunks = chunks.len(),
            file = %file_path,
            "course indexed"
        );

        summary.courses_added += 1;
        summary.chunks_added += chunks.len();
        existing.insert(course.title);
    }

    Ok(summary)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
