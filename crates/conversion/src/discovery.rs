//! Recursive discovery of image files and their label siblings.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ConversionError, Result};

/// One image and, when labels are requested, its paired mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPair {
    pub image: PathBuf,
    pub label: Option<PathBuf>,
}

impl InputPair {
    /// File stem of the image, used as its stored name.
    pub fn name(&self) -> String {
        self.image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| {
        ConversionError::InputDiscovery(format!("invalid glob '{}': {}", pattern, e))
    })
}

fn file_name_matches(path: &Path, pattern: &Pattern) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| pattern.matches(n))
        .unwrap_or(false)
}

/// Find every file below `root` whose name matches `file_glob`.
///
/// Symlinks are followed. Files whose name also matches `label_glob` are
/// labels, not images. With a label glob, each image is paired with the
/// matching file in its own directory. The result is sorted by image path.
pub fn discover_inputs(
    root: &Path,
    file_glob: &str,
    label_glob: Option<&str>,
) -> Result<Vec<InputPair>> {
    if !root.is_dir() {
        return Err(ConversionError::InputDiscovery(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let image_pattern = compile(file_glob)?;
    let label_pattern = label_glob.map(compile).transpose()?;

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| ConversionError::InputDiscovery(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !file_name_matches(path, &image_pattern) {
            continue;
        }
        if let Some(label_pattern) = &label_pattern {
            if file_name_matches(path, label_pattern) {
                continue;
            }
        }
        images.push(path.to_path_buf());
    }
    images.sort();

    let mut pairs = Vec::with_capacity(images.len());
    for image in images {
        let label = match (&label_pattern, label_glob) {
            (Some(pattern), Some(glob)) => Some(find_label(&image, pattern, glob)?),
            _ => None,
        };
        debug!(image = %image.display(), label = ?label, "Discovered input");
        pairs.push(InputPair { image, label });
    }
    Ok(pairs)
}

/// The label file matching `pattern` in the image's directory.
fn find_label(image: &Path, pattern: &Pattern, glob: &str) -> Result<PathBuf> {
    let dir = image.parent().unwrap_or_else(|| Path::new("."));

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path != image && file_name_matches(&path, pattern) {
            candidates.push(path);
        }
    }
    candidates.sort();

    if candidates.len() > 1 {
        warn!(
            image = %image.display(),
            candidates = candidates.len(),
            label = %candidates[0].display(),
            "Multiple label candidates, using the first"
        );
    }

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ConversionError::MissingLabel {
            image: image.to_path_buf(),
            pattern: glob.to_string(),
        })
}
