//! Integration tests for multi-format text extraction.
//!
//! Office fixtures are built in memory with the `zip` crate.

use std::io::Write;

use query_assistant::extract::{extract, extract_text, MIME_DOCX, MIME_PDF, MIME_PPTX};
use query_assistant_core::RagError;

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_with(&[("word/document.xml", xml)])
}

fn slide_xml(text: &str) -> String {
    let runs = if text.is_empty() {
        String::new()
    } else {
        format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", text)
    };
    format!(
        "<?xml version=\"1.0\"?><p:sld xmlns:p=\"p\" xmlns:a=\"a\"><p:cSld><p:spTree><p:sp><p:txBody>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
        runs
    )
}

#[test]
fn docx_paragraphs_become_one_normalized_page() {
    let bytes = docx_with_paragraphs(&["Quarterly results", "Revenue   grew\tsteadily."]);
    let out = extract(&bytes, MIME_DOCX).unwrap();
    assert_eq!(out.text, "Quarterly results Revenue grew steadily.");
    assert_eq!(out.report.pages, 1);
    assert_eq!(out.report.skipped, 0);
}

#[test]
fn docx_without_document_xml_is_extraction_error() {
    let bytes = zip_with(&[("word/other.xml", "<x/>".to_string())]);
    let err = extract_text(&bytes, MIME_DOCX).unwrap_err();
    assert!(matches!(err, RagError::Extraction(_)));
}

#[test]
fn pptx_slides_in_numeric_order_and_blank_slides_skipped() {
    let bytes = zip_with(&[
        ("ppt/slides/slide10.xml", slide_xml("Ten")),
        ("ppt/slides/slide2.xml", slide_xml("Two")),
        ("ppt/slides/slide1.xml", slide_xml("One")),
        ("ppt/slides/slide3.xml", slide_xml("")),
    ]);
    let out = extract(&bytes, MIME_PPTX).unwrap();
    assert_eq!(out.text, "One Two Ten");
    assert_eq!(out.report.pages, 4);
    assert_eq!(out.report.skipped, 1);
}

#[test]
fn pptx_with_only_blank_slides_is_empty_document() {
    let bytes = zip_with(&[
        ("ppt/slides/slide1.xml", slide_xml("")),
        ("ppt/slides/slide2.xml", slide_xml("")),
    ]);
    assert_eq!(extract_text(&bytes, MIME_PPTX), Err(RagError::EmptyDocument));
}

#[test]
fn corrupt_pdf_is_extraction_error() {
    let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
    assert!(matches!(err, RagError::Extraction(_)));
}

#[test]
fn markdown_newlines_collapse_to_spaces() {
    let text = extract_text(b"# Title\n\nFirst line\nsecond line\n", "text/markdown").unwrap();
    assert_eq!(text, "# Title First line second line");
}
