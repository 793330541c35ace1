//! Joins converted Markdown parts back into one document.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Concatenate every `*.md` file in `dir`, sorted by file name, into
/// `out`. Each part is preceded by a divider header naming its stem:
///
/// ```text
/// ---
/// # <stem>
/// ---
/// ```
///
/// Returns the number of parts joined.
pub fn concat_markdown(dir: &Path, out: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Err(Error::NotFound {
            kind: "input directory",
            name: dir.display().to_string(),
        });
    }

    let mut parts: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p != out && p.extension().is_some_and(|ext| ext == "md")
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        return Err(Error::NotFound {
            kind: "Markdown parts",
            name: format!("*.md in {}", dir.display()),
        });
    }

    let mut joined = String::new();
    for part in &parts {
        let stem = part
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        joined.push_str(&format!("---\n# {stem}\n---\n\n"));
        joined.push_str(std::fs::read_to_string(part)?.trim_end());
        joined.push_str("\n\n");
    }

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, joined.trim_end().to_string() + "\n")?;
    tracing::info!(parts = parts.len(), out = %out.display(), "concatenated");
    Ok(parts.len())
}
