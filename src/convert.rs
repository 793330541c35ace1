//! PDF to Markdown conversion.
//!
//! Text extraction uses the embedded text layer via `pdf-extract`. For
//! scanned documents an OCR pre-pass is delegated to the external
//! `ocrmypdf` tool, which rewrites the PDF with a text layer before
//! extraction. Directory inputs are converted file by file; one bad PDF
//! is logged and skipped, not fatal.

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::LazyLock,
};

use regex::Regex;

use crate::error::{Error, Result};

/// How the conversion treats scanned pages.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Run the OCR pre-pass at all.
    pub ocr: bool,
    /// OCR every page, replacing any existing text layer, instead of
    /// only pages without one.
    pub force_full_page_ocr: bool,
    /// Tesseract language code(s) passed through to the OCR tool.
    pub ocr_lang: Option<String>,
}

/// Outcome of a directory conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertStats {
    pub converted: usize,
    pub total: usize,
}

static TRAILING_LINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Arguments for one `ocrmypdf` invocation, input and output last.
fn ocr_args(opts: &ConvertOptions, input: &Path, output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    if opts.force_full_page_ocr {
        args.push("--force-ocr".to_string());
    } else {
        args.push("--skip-text".to_string());
    }
    if let Some(lang) = &opts.ocr_lang {
        args.push("-l".to_string());
        args.push(lang.clone());
    }
    args.push(input.display().to_string());
    args.push(output.display().to_string());
    args
}

fn run_ocr(input: &Path, opts: &ConvertOptions) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let out = std::env::temp_dir()
        .join(format!("ragmill-ocr-{}-{stem}.pdf", std::process::id()));

    tracing::debug!(input = %input.display(), "running ocrmypdf");
    let result = Command::new("ocrmypdf")
        .args(ocr_args(opts, input, &out))
        .output();

    let output = match result {
        Ok(output) => output,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::Tool(
                "ocrmypdf not found on PATH; install it or drop --ocr"
                    .to_string(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Tool(format!(
            "ocrmypdf exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(out)
}

/// Normalize extracted text for Markdown output: unix line endings, no
/// trailing spaces, at most one blank line between paragraphs.
fn normalize_extracted(text: &str) -> String {
    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = TRAILING_LINE_SPACE.replace_all(&s, "\n");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    let mut s = s.trim().to_string();
    s.push('\n');
    s
}

/// Convert a single PDF to a Markdown file at `out`.
pub fn convert_file(
    input: &Path,
    out: &Path,
    opts: &ConvertOptions,
) -> Result<()> {
    if !input.exists() {
        return Err(Error::NotFound {
            kind: "input PDF",
            name: input.display().to_string(),
        });
    }

    let (source, ocr_tmp) = if opts.ocr {
        let tmp = run_ocr(input, opts)?;
        (tmp.clone(), Some(tmp))
    } else {
        (input.to_path_buf(), None)
    };

    let text = pdf_extract::extract_text(&source);
    if let Some(tmp) = ocr_tmp {
        let _ = std::fs::remove_file(tmp);
    }
    let text = text?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, normalize_extracted(&text))?;
    tracing::info!(input = %input.display(), out = %out.display(), "converted");
    Ok(())
}

/// Default Markdown output path for a PDF: same stem, `.md`, in `out_dir`.
pub fn markdown_path_for(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    out_dir.join(format!("{stem}.md"))
}

/// Convert every `*.pdf` in `dir`, in name order, writing Markdown
/// files into `out_dir`. Per-file failures are logged and counted, not
/// propagated.
pub fn convert_dir(
    dir: &Path,
    out_dir: &Path,
    opts: &ConvertOptions,
) -> Result<ConvertStats> {
    if !dir.is_dir() {
        return Err(Error::NotFound {
            kind: "input directory",
            name: dir.display().to_string(),
        });
    }

    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();

    let mut stats = ConvertStats {
        total: pdfs.len(),
        ..Default::default()
    };
    for pdf in &pdfs {
        let out = markdown_path_for(pdf, out_dir);
        match convert_file(pdf, &out, opts) {
            Ok(()) => stats.converted += 1,
            Err(err) => {
                tracing::warn!(
                    file = %pdf.display(),
                    %err,
                    "conversion failed, skipping"
                );
            }
        }
    }
    Ok(stats)
}
