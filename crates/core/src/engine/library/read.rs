//! Readers that extract plain paragraphs from supported document formats.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};

use super::TextDocument;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;

/// Reads plain text. Every line becomes a paragraph.
pub(crate) fn read_txt(bytes: &[u8]) -> TextDocument {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    TextDocument::from_lines(text.lines())
}

/// Reads the body paragraphs of a DOCX package.
pub(crate) fn read_docx<R: Read + Seek>(reader: R) -> Result<TextDocument, EngineError> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| EngineError::parse("DOCX", e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| EngineError::parse("DOCX", e))?
        .read_to_string(&mut xml)?;
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<TextDocument, EngineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader
            .read_event()
            .map_err(|e| EngineError::parse("DOCX body", e))?
        {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| EngineError::parse("DOCX text", e))?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(TextDocument::new(paragraphs))
}

/// Reads the visible text of an RTF document.
pub(crate) fn read_rtf(bytes: &[u8]) -> Result<TextDocument, EngineError> {
    let source = String::from_utf8_lossy(bytes);
    if !source.trim_start().starts_with("{\\rtf") {
        return Err(EngineError::parse("RTF", "missing {\\rtf header"));
    }
    let text = RtfParser::new(&source).run();
    Ok(TextDocument::from_lines(text.lines()))
}

/// Reads the text layer of a PDF, page by page.
///
/// Scanned PDFs without a text layer are rejected rather than producing an
/// empty document.
pub(crate) fn read_pdf(
    bytes: &[u8],
    progress: &ProgressReporter,
) -> Result<TextDocument, EngineError> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| EngineError::parse("PDF", e))?;
    let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();

    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        progress.report(
            (20 + i * 30 / pages.len()) as u8,
            format!("Reading page {} of {}", i + 1, pages.len()),
        );
        let page_text = pdf
            .extract_text(&[*page])
            .map_err(|e| EngineError::parse("PDF text", e))?;
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&page_text);
    }

    let doc = TextDocument::from_lines(text.lines());
    if doc.paragraphs().iter().all(|p| p.trim().is_empty()) {
        return Err(EngineError::conversion_failed("PDF has no extractable text", None));
    }
    Ok(doc)
}

/// Destinations whose content is never visible text.
const RTF_SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
];

struct RtfParser {
    chars: Vec<char>,
    pos: usize,
    out: String,
    /// Saved (skip, uc) per open group.
    stack: Vec<(bool, usize)>,
    skip: bool,
    /// Fallback characters emitted after each `\u` keyword.
    uc: usize,
    pending_fallback: usize,
}

impl RtfParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            out: String::new(),
            stack: Vec::new(),
            skip: false,
            uc: 1,
            pending_fallback: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn emit(&mut self, c: char) {
        if self.skip {
            return;
        }
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        self.out.push(c);
    }

    fn run(mut self) -> String {
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => {
                    self.stack.push((self.skip, self.uc));
                    if self.peek() == Some('\\') && self.chars.get(self.pos + 1) == Some(&'*') {
                        self.skip = true;
                        self.pos += 2;
                    }
                }
                '}' => {
                    if let Some((skip, uc)) = self.stack.pop() {
                        self.skip = skip;
                        self.uc = uc;
                    }
                    self.pending_fallback = 0;
                }
                '\\' => self.control(),
                '\r' | '\n' => {}
                _ => self.emit(c),
            }
        }
        self.out
    }

    fn control(&mut self) {
        let Some(next) = self.peek() else {
            return;
        };

        if !next.is_ascii_alphabetic() {
            self.pos += 1;
            match next {
                '\'' => {
                    let hex: String = self.chars.iter().skip(self.pos).take(2).collect();
                    self.pos += hex.len().min(2);
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        // cp1252 and latin-1 agree on the printable range we care about
                        self.emit(char::from(byte));
                    }
                }
                '\\' | '{' | '}' => self.emit(next),
                '~' => self.emit('\u{a0}'),
                '_' => self.emit('-'),
                '\r' | '\n' => self.emit('\n'),
                _ => {}
            }
            return;
        }

        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        let negative = self.peek() == Some('-');
        if negative {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let param = if self.pos > digits_start {
            self.chars[digits_start..self.pos]
                .iter()
                .collect::<String>()
                .parse::<i32>()
                .ok()
                .map(|v| if negative { -v } else { v })
        } else {
            if negative {
                self.pos -= 1;
            }
            None
        };

        if self.peek() == Some(' ') {
            self.pos += 1;
        }

        match word.as_str() {
            "par" | "line" | "sect" | "page" => self.emit('\n'),
            "tab" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201c}'),
            "rdblquote" => self.emit('\u{201d}'),
            "uc" => self.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(value) = param {
                    // Values above 32767 are written as negative numbers
                    let code = if value < 0 { value + 65536 } else { value };
                    if let Some(c) = char::from_u32(code as u32) {
                        self.emit(c);
                    }
                    self.pending_fallback = self.uc;
                }
            }
            w if RTF_SKIPPED_DESTINATIONS.contains(&w) => self.skip = true,
            _ => {}
        }
    }
}

/// Reads the visible text of an HTML document.
///
/// Block level tags start a new paragraph; `script`, `style` and `title`
/// contents are dropped.
pub(crate) fn read_html(bytes: &[u8]) -> TextDocument {
    let html = String::from_utf8_lossy(bytes);
    let mut text = String::new();
    let mut rest: &str = &html;

    while let Some(open) = rest.find('<') {
        push_collapsed(&mut text, &decode_entities(&rest[..open]));
        rest = &rest[open..];

        if rest.starts_with("<!--") {
            rest = rest.find("-->").map(|end| &rest[end + 3..]).unwrap_or("");
            continue;
        }

        let Some(close) = rest.find('>') else {
            rest = "";
            break;
        };
        let tag = tag_name(&rest[1..close]);
        rest = &rest[close + 1..];

        if matches!(tag.as_str(), "script" | "style" | "title") {
            let end_tag = format!("</{}", tag);
            rest = match find_ignore_case(rest, &end_tag) {
                Some(end) => rest[end..]
                    .find('>')
                    .map(|gt| &rest[end + gt + 1..])
                    .unwrap_or(""),
                None => "",
            };
            continue;
        }

        if is_block_tag(&tag) {
            text.push('\n');
        }
    }
    push_collapsed(&mut text, &decode_entities(rest));

    TextDocument::new(
        text.split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn tag_name(inner: &str) -> String {
    inner
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "li"
            | "tr"
            | "blockquote"
            | "pre"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "ul"
            | "ol"
            | "table"
            | "hr"
    )
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Appends `s` with whitespace runs collapsed to single spaces.
fn push_collapsed(out: &mut String, s: &str) {
    for c in s.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !out.ends_with(' ') && !out.ends_with('\n') && !out.is_empty() {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_txt() {
        let doc = read_txt("\u{feff}first line\r\nsecond line\n".as_bytes());
        assert_eq!(doc.paragraphs(), ["first line", "second line"]);
    }

    #[test]
    fn test_parse_document_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world &amp; more</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let doc = parse_document_xml(xml).unwrap();
        assert_eq!(doc.paragraphs(), ["Hello world & more", "", "a\tb\nc"]);
    }

    #[test]
    fn test_read_rtf() {
        let rtf = br"{\rtf1\ansi\deff0{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}
{\*\generator Writer;}\f0\fs24 Hello {\b bold} world\par
Caf\'e9 \u8364? costs 5\par
Tab\tab here\par}";
        let doc = read_rtf(rtf).unwrap();
        assert_eq!(
            doc.paragraphs(),
            ["Hello bold world", "Caf\u{e9} \u{20ac} costs 5", "Tab\there"]
        );
    }

    #[test]
    fn test_read_rtf_escapes() {
        let doc = read_rtf(br"{\rtf1 braces \{ \} and \\ backslash}").unwrap();
        assert_eq!(doc.paragraphs(), ["braces { } and \\ backslash"]);
    }

    #[test]
    fn test_read_rtf_rejects_non_rtf() {
        assert!(read_rtf(b"plain text").is_err());
    }

    #[test]
    fn test_read_html() {
        let html = br#"<!DOCTYPE html>
<html><head><title>Ignored</title><style>p { color: red; }</style></head>
<body>
  <h1>Heading</h1>
  <!-- a comment -->
  <p>Some   <b>bold</b>
     text &amp; entities&nbsp;&#8364;</p>
  <script>var x = "<p>";</script>
  <ul><li>one</li><li>two</li></ul>
</body></html>"#;
        let doc = read_html(html);
        assert_eq!(
            doc.paragraphs(),
            [
                "Heading",
                "Some bold text & entities\u{a0}\u{20ac}",
                "one",
                "two"
            ]
        );
    }

    #[test]
    fn test_read_pdf_rejects_garbage() {
        let err = read_pdf(b"%PDF-1.4 truncated", &ProgressReporter::disabled()).unwrap_err();
        assert!(matches!(err, EngineError::Parse { .. }));
    }

    #[test]
    fn test_read_pdf_without_text_layer() {
        let mut buffer = Vec::new();
        super::super::write::write_pdf(&TextDocument::default(), "blank", &mut buffer).unwrap();

        let err = read_pdf(&buffer, &ProgressReporter::disabled()).unwrap_err();
        assert!(err.to_string().contains("no extractable text"));
    }

    #[test]
    fn test_decode_entities_keeps_unknown() {
        assert_eq!(decode_entities("a &unknown; b &amp; c & d"), "a &unknown; b & c & d");
    }
}
