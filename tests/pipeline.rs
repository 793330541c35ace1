//! End-to-end pipeline test over real files in a temp directory:
//! chunk a Markdown manual, dirty it with conversion artifacts, tidy it
//! in place, and check what a retrieval stage would read back.

use std::path::Path;

use ragmill::{
    ingest::{chunk_directory, chunk_markdown_file},
    record::read_chunk_file,
    tidy::process_chunks,
};

fn write(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}

#[test]
fn markdown_to_tidied_chunks() {
    let tmp = tempfile::tempdir().unwrap();
    let manual = tmp.path().join("manual.md");
    write(
        &manual,
        "# Input Format\n\n\
         The keyword line begins with an exclamation mark.\n\n\
         <!-- image -->\n\n\
         ## Geometry Input\n\n\
         Coordinates are given in a block opened with star xyz and \
         closed with a bare star.\n",
    );

    let chunks = tmp.path().join("chunks.jsonl");
    let written =
        chunk_markdown_file(&manual, "manual", 6000, 600, &chunks).unwrap();
    assert!(written >= 1);

    let stats = process_chunks(&chunks, true).unwrap();
    assert_eq!(stats.total, written);
    assert_eq!(stats.skipped, 0);

    let records = read_chunk_file(&chunks).unwrap();
    assert_eq!(records.len(), written);
    for (i, rec) in records.iter().enumerate() {
        assert_eq!(rec.id, format!("manual_{i:05}"));
        assert_eq!(rec.meta.doc, "manual");
        assert!(!rec.text.contains("<!-- image -->"));
    }
    // Heading structure survived into metadata.
    assert!(records.iter().any(|r| {
        r.meta
            .section_path
            .as_ref()
            .is_some_and(|p| p.contains(&"Input Format".to_string()))
    }));

    // The tidy pass left a timestamped backup of the pre-clean file.
    let backups = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".jsonl.bak_"))
        .count();
    assert_eq!(backups, 1);
}

#[test]
fn mixed_directory_to_chunks_with_figures() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("converted");
    std::fs::create_dir_all(&src).unwrap();

    write(
        &src.join("basics.md"),
        "The SCF section controls convergence.\n\n\
         Use tighter thresholds for small gaps.\n",
    );
    write(
        &src.join("plots.html"),
        r#"<html><body>
           <p>Orbital plots are produced by the plot module.</p>
           <figure><img src="orbitals.png">
           <figcaption>HOMO of water</figcaption></figure>
           </body></html>"#,
    );

    let chunks = tmp.path().join("chunks.jsonl");
    let written = chunk_directory(
        &src,
        &chunks,
        Some(&tmp.path().join("assets")),
        4000,
        400,
    )
    .unwrap();
    assert_eq!(written, 3);

    let records = read_chunk_file(&chunks).unwrap();
    let figures: Vec<_> =
        records.iter().filter(|r| r.is_figure()).collect();
    assert_eq!(figures.len(), 1);
    assert!(figures[0].text.contains("HOMO of water"));
    assert!(
        figures[0]
            .meta
            .asset_path
            .as_deref()
            .unwrap()
            .ends_with("orbitals.png")
    );

    // Text records hold the plain text, not markup.
    let html_text = records
        .iter()
        .find(|r| r.meta.doc == "plots" && !r.is_figure())
        .unwrap();
    assert!(html_text.text.contains("plot module"));
    assert!(!html_text.text.contains('<'));

    // A rerun rotates the previous output rather than appending.
    let rewritten = chunk_directory(&src, &chunks, None, 4000, 400).unwrap();
    assert_eq!(rewritten, 3);
    assert_eq!(read_chunk_file(&chunks).unwrap().len(), 3);
    assert!(tmp.path().join("chunks.jsonl.bak").exists());
}
