use std::io::Read;
use std::path::Path;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentFormat {
    Pdf,
    Html,
    Json,
    PlainText,
}

impl DocumentFormat {
    /// Dispatches on the declared extension only; unknown extensions are plain text.
    pub(crate) fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("html") | Some("htm") => Self::Html,
            Some("json") => Self::Json,
            _ => Self::PlainText,
        }
    }
}

/// Turns an uploaded document into plain text for the generation prompt.
///
/// Malformed documents degrade to partial or raw output instead of failing;
/// only an unreadable input stream is an error.
#[derive(Debug, Clone)]
pub(crate) struct ContentExtractor {
    max_pdf_pages: usize,
    max_text_bytes: usize,
}

impl ContentExtractor {
    pub(crate) fn new(max_pdf_pages: usize, max_text_bytes: usize) -> Self {
        Self { max_pdf_pages: max_pdf_pages.max(1), max_text_bytes: max_text_bytes.max(1) }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.extraction().max_pdf_pages, settings.extraction().max_text_bytes)
    }

    pub(crate) fn extract_reader(
        &self,
        mut reader: impl Read,
        filename: &str,
    ) -> Result<String, ExtractionError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(self.extract(&bytes, filename))
    }

    pub(crate) fn extract(&self, bytes: &[u8], filename: &str) -> String {
        let format = DocumentFormat::from_filename(filename);
        let text = match format {
            DocumentFormat::Pdf => self.extract_pdf(bytes),
            DocumentFormat::Html => self.extract_html(bytes),
            DocumentFormat::Json => extract_json(bytes),
            DocumentFormat::PlainText => self.extract_plain_text(bytes),
        };

        tracing::debug!(
            filename = %filename,
            format = ?format,
            input_bytes = bytes.len(),
            output_chars = text.chars().count(),
            "Content extracted"
        );

        text
    }

    fn extract_pdf(&self, bytes: &[u8]) -> String {
        let document = match lopdf::Document::load_mem(bytes) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "Unreadable PDF; falling back to raw bytes");
                return self.extract_plain_text(bytes);
            }
        };

        let mut content = String::new();
        for page_number in document.get_pages().keys().take(self.max_pdf_pages) {
            match document.extract_text(&[*page_number]) {
                Ok(text) => {
                    content.push_str(&text);
                    content.push('\n');
                }
                Err(err) => {
                    tracing::debug!(page = page_number, error = %err, "Skipping undecodable PDF page");
                }
            }
        }

        content
    }

    fn extract_html(&self, bytes: &[u8]) -> String {
        let mut input = bytes;
        let dom = match parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut input)
        {
            Ok(dom) => dom,
            Err(err) => {
                tracing::warn!(error = %err, "Unreadable HTML; falling back to raw bytes");
                return self.extract_plain_text(bytes);
            }
        };

        collect_text_nodes(&dom.document).join(" ")
    }

    fn extract_plain_text(&self, bytes: &[u8]) -> String {
        let slice = &bytes[..bytes.len().min(self.max_text_bytes)];
        match std::str::from_utf8(slice) {
            Ok(text) => text.to_string(),
            // The cap cut a multi-byte character in half.
            Err(err) if err.error_len().is_none() => {
                String::from_utf8_lossy(&slice[..err.valid_up_to()]).into_owned()
            }
            Err(_) => String::from_utf8_lossy(slice).into_owned(),
        }
    }
}

fn extract_json(bytes: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

/// Document-order walk without recursion so deeply nested markup cannot blow the stack.
fn collect_text_nodes(root: &Handle) -> Vec<String> {
    let mut parts = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if let NodeData::Text { contents } = &node.data {
            let text = contents.borrow();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }

        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    parts
}

/// Content sniffing over the leading bytes, refined by extension for text formats.
pub(crate) fn detect_mime_type(bytes: &[u8], filename: &str) -> &'static str {
    const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    if bytes.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
        let lowered = filename.to_ascii_lowercase();
        if lowered.ends_with(".docx") || lowered.ends_with(".pptx") || lowered.ends_with(".xlsx") {
            return "application/vnd.openxmlformats-officedocument";
        }
        return "application/zip";
    }
    if bytes.starts_with(OLE_MAGIC) {
        return "application/msword";
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif";
    }

    let head = &bytes[..bytes.len().min(512)];
    let looks_textual = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    };
    if !looks_textual {
        return "application/octet-stream";
    }

    match DocumentFormat::from_filename(filename) {
        DocumentFormat::Html => "text/html",
        DocumentFormat::Json => "application/json",
        _ => {
            let lowered = String::from_utf8_lossy(head).trim_start().to_ascii_lowercase();
            if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") {
                "text/html"
            } else {
                "text/plain"
            }
        }
    }
}

/// Archive and office containers the generation service cannot read.
pub(crate) fn is_unsupported_container(mime_type: &str) -> bool {
    mime_type.contains("zip") || mime_type.contains("officedocument") || mime_type.contains("msword")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pdf_with_pages;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(10, 50_000)
    }

    #[test]
    fn format_dispatch_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_filename("Notes.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("page.HtM"), DocumentFormat::Html);
        assert_eq!(DocumentFormat::from_filename("data.Json"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_filename("notes.txt"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_filename("README"), DocumentFormat::PlainText);
    }

    #[test]
    fn pdf_pages_are_joined_with_newlines() {
        let pdf = pdf_with_pages(&["Photosynthesis basics", "Chlorophyll absorbs light"]);
        let text = extractor().extract(&pdf, "biology.pdf");

        let first = text.find("Photosynthesis").expect("page one text");
        let second = text.find("Chlorophyll").expect("page two text");
        assert!(first < second);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn pdf_page_cap_is_respected() {
        let pdf = pdf_with_pages(&["Alpha page", "Beta page", "Gamma page"]);
        let text = ContentExtractor::new(2, 50_000).extract(&pdf, "capped.pdf");

        assert!(text.contains("Alpha"));
        assert!(text.contains("Beta"));
        assert!(!text.contains("Gamma"));
    }

    #[test]
    fn malformed_pdf_degrades_to_raw_text() {
        let text = extractor().extract(b"%PDF-1.4 this is not really a pdf", "broken.pdf");
        assert_eq!(text, "%PDF-1.4 this is not really a pdf");
    }

    #[test]
    fn html_text_nodes_are_trimmed_and_space_joined() {
        let html = b"<html><head><title> Cells </title></head>\
            <body><h1>Mitosis</h1>\n<p>  Prophase   </p><p></p><ul><li>Anaphase</li></ul></body></html>";
        let text = extractor().extract(html, "lesson.html");
        assert_eq!(text, "Cells Mitosis Prophase Anaphase");
    }

    #[test]
    fn unbalanced_html_still_yields_text() {
        let text = extractor().extract(b"<div><p>Open tags <b>everywhere", "broken.htm");
        assert_eq!(text, "Open tags everywhere");
    }

    #[test]
    fn json_is_pretty_printed() {
        let text = extractor().extract(br#"{"topic":"atoms","facts":[1,2]}"#, "facts.json");
        assert!(text.contains("\n  \"topic\": \"atoms\""));
    }

    #[test]
    fn invalid_json_falls_back_to_raw_bytes() {
        let text = extractor().extract(b"{not json", "facts.json");
        assert_eq!(text, "{not json");
    }

    #[test]
    fn plain_text_is_capped_on_a_char_boundary() {
        let extractor = ContentExtractor::new(10, 5);
        assert_eq!(extractor.extract("abcdefgh".as_bytes(), "notes.txt"), "abcde");
        // 'é' occupies bytes 1..3, so a cap of 2 must drop it entirely.
        let narrow = ContentExtractor::new(10, 2);
        assert_eq!(narrow.extract("héllo".as_bytes(), "notes.txt"), "h");
    }

    #[test]
    fn unknown_extension_reads_as_text() {
        assert_eq!(extractor().extract(b"plain words", "notes.md"), "plain words");
    }

    #[test]
    fn extract_reader_does_not_touch_source() {
        let source = b"read me".to_vec();
        let text = extractor().extract_reader(&source[..], "notes.txt").expect("read");
        assert_eq!(text, "read me");
        assert_eq!(source, b"read me");
    }

    #[test]
    fn extract_reader_surfaces_io_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }
        assert!(matches!(
            extractor().extract_reader(Broken, "notes.txt"),
            Err(ExtractionError::Io(_))
        ));
    }

    #[test]
    fn mime_sniffing_flags_containers() {
        assert_eq!(detect_mime_type(b"%PDF-1.7\n...", "a.pdf"), "application/pdf");
        assert!(is_unsupported_container(detect_mime_type(b"PK\x03\x04rest", "a.zip")));
        assert!(is_unsupported_container(detect_mime_type(b"PK\x03\x04rest", "a.docx")));
        assert!(is_unsupported_container(detect_mime_type(
            &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0],
            "a.doc"
        )));
        assert_eq!(detect_mime_type(b"<!DOCTYPE html><p>x</p>", "page"), "text/html");
        assert_eq!(detect_mime_type(b"just words", "notes.txt"), "text/plain");
        assert_eq!(detect_mime_type(&[0x00, 0xFF, 0xFE, 0x80], "blob.bin"), "application/octet-stream");
        assert!(!is_unsupported_container("application/pdf"));
    }
}
