//! Streaming HTML to plain text, plus figure harvesting.
//!
//! Converter output is consumed in a single forward pass with quick-xml;
//! no DOM is built. Script and style content is suppressed, block-level
//! tags become paragraph breaks, and whitespace is normalized afterwards.
//! Figures are harvested in a separate pass over the same input: each
//! `<figure>` yields one record with its `<img src>` and `<figcaption>`
//! text, dropped only when both are empty.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

/// Tags whose opening edge inserts a paragraph break.
const BREAK_ON_OPEN: &[&str] =
    &["p", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5"];

/// Tags whose closing edge inserts a paragraph break.
const BREAK_ON_CLOSE: &[&str] = &["p", "li", "tr"];

/// Tags whose content never reaches the text stream. Figures are
/// harvested separately, so their captions would otherwise appear in
/// both a text chunk and the figure record.
const SUPPRESSED: &[&str] = &["script", "style", "figure"];

static CR_OR_NBSP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n?|\u{00A0}").unwrap());
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0C\x0B]+").unwrap());
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

fn html_reader(html: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(html.as_bytes());
    // Converter HTML is not XML: void elements like <img> and <br>
    // never close, so name matching must be off.
    reader.config_mut().check_end_names = false;
    reader
}

/// Reduce an HTML document to normalized plain text.
///
/// Best effort: a parse error ends the pass with whatever was collected
/// so far rather than failing the document.
pub fn html_to_text(html: &str) -> String {
    let mut reader = html_reader(html);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut suppress_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = tag_name(e);
                if SUPPRESSED.contains(&name.as_str()) {
                    suppress_depth += 1;
                }
                if suppress_depth == 0
                    && BREAK_ON_OPEN.contains(&name.as_str())
                {
                    out.push('\n');
                }
            }
            Ok(Event::Empty(ref e)) => {
                // Self-closing, so no depth to track.
                let name = tag_name(e);
                if suppress_depth == 0
                    && BREAK_ON_OPEN.contains(&name.as_str())
                {
                    out.push('\n');
                }
            }
            Ok(Event::End(ref e)) => {
                let name =
                    String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if SUPPRESSED.contains(&name.as_str()) {
                    suppress_depth = suppress_depth.saturating_sub(1);
                }
                if suppress_depth == 0
                    && BREAK_ON_CLOSE.contains(&name.as_str())
                {
                    out.push('\n');
                }
            }
            Ok(Event::Text(e)) => {
                if suppress_depth == 0 {
                    out.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(e)) => {
                if suppress_depth == 0 {
                    out.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    normalize_whitespace(&out)
}

fn normalize_whitespace(s: &str) -> String {
    let s = CR_OR_NBSP.replace_all(s, "\n");
    let s = SPACE_RUNS.replace_all(&s, " ");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// An image reference harvested from a `<figure>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub src: Option<String>,
    pub caption: String,
}

/// Collect one [`Figure`] per `<figure>` element, in document order.
///
/// Figures with neither a source nor a caption are dropped.
pub fn harvest_figures(html: &str) -> Vec<Figure> {
    let mut reader = html_reader(html);
    let mut buf = Vec::new();

    let mut figures = Vec::new();
    let mut in_figure = false;
    let mut in_caption = false;
    let mut src: Option<String> = None;
    let mut caption = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match tag_name(e).as_str() {
                    "figure" => {
                        in_figure = true;
                        src = None;
                        caption.clear();
                    }
                    "img" if in_figure => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"src" {
                                src = Some(
                                    String::from_utf8_lossy(&attr.value)
                                        .to_string(),
                                );
                            }
                        }
                    }
                    "figcaption" if in_figure => in_caption = true,
                    "br" if in_caption => caption.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name =
                    String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                match name.as_str() {
                    "figcaption" => in_caption = false,
                    "figure" => {
                        let cap = caption.trim().to_string();
                        if src.is_some() || !cap.is_empty() {
                            figures.push(Figure {
                                src: src.take(),
                                caption: cap,
                            });
                        }
                        in_figure = false;
                        in_caption = false;
                        src = None;
                        caption.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_caption {
                    caption.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    figures
}
