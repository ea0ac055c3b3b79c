//! Text extraction for uploaded documents (PDF, OOXML, plain text).
//!
//! Every format is first split into pages: PDF pages, PPTX slides, or the
//! whole file for DOCX and text. Each page is whitespace-collapsed; pages
//! with no text are skipped; the rest are joined with a single space.
//! At least one page must yield text.

use std::io::Read;
use std::path::Path;

use query_assistant_core::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Page accounting for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionReport {
    pub pages: usize,
    /// Pages that produced no text (e.g. scanned images).
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub report: ExtractionReport,
}

/// Guess the content type from a file extension.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "docx" => Some(MIME_DOCX),
        "pptx" => Some(MIME_PPTX),
        "txt" | "text" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Extract normalized text from `bytes`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String> {
    extract(bytes, content_type).map(|e| e.text)
}

/// Extract normalized text from `bytes` along with page accounting.
///
/// Parameters after `;` in `content_type` (e.g. `; charset=utf-8`) are ignored.
pub fn extract(bytes: &[u8], content_type: &str) -> Result<Extraction> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let pages = match mime.as_str() {
        MIME_PDF => pdf_pages(bytes)?,
        MIME_DOCX => vec![docx_text(bytes)?],
        MIME_PPTX => pptx_slides(bytes)?,
        MIME_TEXT | MIME_MARKDOWN => vec![utf8_text(bytes)?],
        _ => {
            return Err(RagError::Extraction(format!(
                "unsupported content type: {}",
                content_type
            )))
        }
    };

    let extraction = join_pages(&pages)?;
    if extraction.report.skipped > 0 {
        tracing::info!(
            pages = extraction.report.pages,
            skipped = extraction.report.skipped,
            "skipped pages without extractable text"
        );
    }
    Ok(extraction)
}

/// Collapse whitespace within each page, drop empty pages, join the rest
/// with a single space.
pub fn join_pages(pages: &[String]) -> Result<Extraction> {
    let mut kept = Vec::with_capacity(pages.len());
    for page in pages {
        let collapsed = page.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            kept.push(collapsed);
        }
    }
    if kept.is_empty() {
        return Err(RagError::EmptyDocument);
    }
    Ok(Extraction {
        report: ExtractionReport {
            pages: pages.len(),
            skipped: pages.len() - kept.len(),
        },
        text: kept.join(" "),
    })
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF extraction failed: {}", e)))
}

fn utf8_text(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| RagError::Extraction(format!("text is not valid UTF-8: {}", e)))
}

fn ooxml_err(e: impl std::fmt::Display) -> RagError {
    RagError::Extraction(format!("OOXML extraction failed: {}", e))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ooxml_err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    if !archive.file_names().any(|n| n == "word/document.xml") {
        return Err(ooxml_err("word/document.xml not found"));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    text_runs(&xml, b"p")
}

fn pptx_slides(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    if slide_names.is_empty() {
        return Err(ooxml_err("no slides found"));
    }

    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        slides.push(text_runs(&xml, b"p")?);
    }
    Ok(slides)
}

/// Concatenate the text of every `<*:t>` element, inserting a space at the
/// end of each `paragraph` element so words from adjacent paragraphs stay
/// separated.
fn text_runs(xml: &[u8], paragraph: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text = false;
                } else if name.as_ref() == paragraph {
                    out.push(' ');
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(ooxml_err)?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
