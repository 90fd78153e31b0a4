//! Content loader: turns a file on disk into normalized text segments.
//!
//! Dispatch is by file extension (case-insensitive):
//!
//! | Extension | Segments | Extra metadata |
//! |-----------|----------|----------------|
//! | `pdf` | one per page | `page` (1-based) |
//! | `docx` | one for the body, paragraphs separated by newlines | |
//! | `html`, `htm` | readability article text, falling back to stripped markup | `title` when found |
//! | `txt`, `md` | the whole file | |
//! | `csv` | one per data row, rendered as `header: value` lines | `row` (1-based) |
//!
//! Every segment carries `source` (the file name). An unrecognized extension
//! fails with [`Error::UnsupportedFormat`] before the file is read. Loading
//! only reads the filesystem.

use std::io::Read;
use std::path::Path;

use docchat_core::models::Segment;
use docchat_core::{Error, Result};

/// Default bound on decompressed bytes read from a single DOCX entry.
pub const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions the loader can dispatch on.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "html", "htm", "txt", "md", "csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Docx,
    Html,
    Text,
    Csv,
}

impl Format {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Format::Pdf),
            "docx" => Some(Format::Docx),
            "html" | "htm" => Some(Format::Html),
            "txt" | "md" => Some(Format::Text),
            "csv" => Some(Format::Csv),
            _ => None,
        }
    }
}

/// Reads supported document formats into [`Segment`]s.
#[derive(Debug, Clone)]
pub struct Loader {
    max_entry_bytes: u64,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            max_entry_bytes: MAX_XML_ENTRY_BYTES,
        }
    }
}

/// Lower-cased extension of `path`, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether the loader has a handler for this path's extension.
pub fn is_supported(path: &Path) -> bool {
    Format::from_extension(&extension_of(path)).is_some()
}

impl Loader {
    pub fn new(max_entry_bytes: u64) -> Self {
        Self { max_entry_bytes }
    }

    /// Load `path` into segments.
    pub fn load(&self, path: &Path) -> Result<Vec<Segment>> {
        let ext = extension_of(path);
        let format = Format::from_extension(&ext).ok_or_else(|| {
            Error::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", ext)
            })
        })?;

        let bytes = std::fs::read(path).map_err(|e| load_failed(path, e))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let segments = match format {
            Format::Pdf => load_pdf(&bytes).map_err(|e| load_failed(path, e))?,
            Format::Docx => {
                load_docx(&bytes, self.max_entry_bytes).map_err(|e| load_failed(path, e))?
            }
            Format::Html => vec![load_html(&decode_utf8(&bytes))],
            Format::Text => vec![Segment::new(decode_utf8(&bytes))],
            Format::Csv => load_csv(&bytes).map_err(|e| load_failed(path, e))?,
        };

        Ok(segments
            .into_iter()
            .map(|s| s.with_meta("source", source.clone()))
            .collect())
    }
}

fn load_failed(path: &Path, message: impl ToString) -> Error {
    Error::LoadFailed {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

fn decode_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn load_pdf(bytes: &[u8]) -> std::result::Result<Vec<Segment>, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| Segment::new(text).with_meta("page", i + 1))
        .collect())
}

fn load_docx(bytes: &[u8], max_bytes: u64) -> std::result::Result<Vec<Segment>, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 > max_bytes {
        return Err(format!(
            "word/document.xml exceeds size limit ({} bytes)",
            max_bytes
        ));
    }

    Ok(vec![Segment::new(docx_body_text(&xml)?)])
}

/// Collect `w:t` runs, one line per `w:p` paragraph.
fn docx_body_text(xml: &[u8]) -> std::result::Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn load_html(html: &str) -> Segment {
    let config = dom_smoothie::Config {
        text_mode: dom_smoothie::TextMode::Markdown,
        ..Default::default()
    };
    let article = dom_smoothie::Readability::new(html.to_string(), None, Some(config))
        .and_then(|mut readability| readability.parse());

    match article {
        Ok(article) => {
            let text: String = article.text_content.into();
            if text.trim().is_empty() {
                return Segment::new(strip_markup(html));
            }
            let segment = Segment::new(text);
            if article.title.is_empty() {
                segment
            } else {
                segment.with_meta("title", article.title)
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "readability failed, stripping markup");
            Segment::new(strip_markup(html))
        }
    }
}

/// Text nodes of an HTML document outside `script` and `style`.
///
/// The reader is lenient about unbalanced tags; on a hard parse error the
/// text collected so far is returned.
fn strip_markup(html: &str) -> String {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(html);
    reader.config_mut().check_end_names = false;
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut skip_depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if skip_depth > 0 || matches!(name.as_ref(), b"script" | b"style") {
                    skip_depth += 1;
                }
            }
            Ok(Event::End(_)) => {
                skip_depth = skip_depth.saturating_sub(1);
            }
            Ok(Event::Text(te)) if skip_depth == 0 => {
                let text = te.unescape().unwrap_or_default();
                if !text.trim().is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text.trim());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    out
}

fn load_csv(bytes: &[u8]) -> std::result::Result<Vec<Segment>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let mut segments = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let text = record
            .iter()
            .enumerate()
            .map(|(col, value)| {
                let header = headers.get(col).unwrap_or("");
                format!("{}: {}", header, value)
            })
            .collect::<Vec<_>>()
            .join("\n");
        segments.push(Segment::new(text).with_meta("row", i + 1));
    }
    Ok(segments)
}
