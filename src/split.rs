//! Splits a PDF into fixed-size page-range parts.
//!
//! Each part is produced by reloading the source document, deleting
//! every page outside the part's range, and pruning unreachable
//! objects, so shared resources stay intact in each output file.

use std::path::{Path, PathBuf};

use lopdf::Document;

use crate::error::{Error, Result};

/// Output filename for one part: `<stem>_partNNN.pdf`, 1-based.
fn part_path(input: &Path, outdir: &Path, part: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "part".to_string());
    outdir.join(format!("{stem}_part{part:03}.pdf"))
}

/// Split `input` into parts of `pages_per_part` pages each, written to
/// `outdir`. Returns the part paths in order. The final part may be
/// shorter.
pub fn split_pdf(
    input: &Path,
    pages_per_part: usize,
    outdir: &Path,
) -> Result<Vec<PathBuf>> {
    if pages_per_part == 0 {
        return Err(Error::Config(
            "pages per part must be at least 1".to_string(),
        ));
    }
    if !input.exists() {
        return Err(Error::NotFound {
            kind: "input PDF",
            name: input.display().to_string(),
        });
    }

    let page_count = Document::load(input)?.get_pages().len();
    if page_count == 0 {
        return Err(Error::Config(format!(
            "{} has no pages",
            input.display()
        )));
    }
    std::fs::create_dir_all(outdir)?;

    let mut parts = Vec::new();
    let mut start = 1usize;
    while start <= page_count {
        let end = (start + pages_per_part - 1).min(page_count);

        let mut doc = Document::load(input)?;
        let delete: Vec<u32> = (1..=page_count)
            .filter(|p| *p < start || *p > end)
            .map(|p| p as u32)
            .collect();
        doc.delete_pages(&delete);
        doc.prune_objects();

        let path = part_path(input, outdir, parts.len() + 1);
        doc.save(&path)?;
        tracing::debug!(
            part = %path.display(),
            pages = end - start + 1,
            "wrote part"
        );
        parts.push(path);

        start = end + 1;
    }

    tracing::info!(
        input = %input.display(),
        parts = parts.len(),
        "split complete"
    );
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};

    fn make_pdf(pages: usize) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content_id = doc
                .add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![
                0.into(), 0.into(), 612.into(), 792.into()
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn splits_into_expected_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("manual.pdf");
        make_pdf(5).save(&input).unwrap();

        let outdir = tmp.path().join("parts");
        let parts = split_pdf(&input, 2, &outdir).unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0].file_name().unwrap().to_str().unwrap(),
            "manual_part001.pdf"
        );

        let page_counts: Vec<usize> = parts
            .iter()
            .map(|p| Document::load(p).unwrap().get_pages().len())
            .collect();
        assert_eq!(page_counts, vec![2, 2, 1]);
    }

    #[test]
    fn single_part_when_range_covers_document() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("short.pdf");
        make_pdf(3).save(&input).unwrap();

        let parts = split_pdf(&input, 10, tmp.path()).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(Document::load(&parts[0]).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn zero_pages_per_part_rejected() {
        let err = split_pdf(Path::new("x.pdf"), 0, Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_input_rejected() {
        let err =
            split_pdf(Path::new("/nonexistent/x.pdf"), 5, Path::new("/tmp"))
                .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
