//! Writers for the formats the library engine can produce.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::TextDocument;
use crate::engine::error::EngineError;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const WORDML_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Renders paragraphs as UTF-8 text, one per line.
pub(crate) fn write_txt(doc: &TextDocument) -> String {
    let mut text = doc.paragraphs().join("\n");
    text.push('\n');
    text
}

/// Renders paragraphs as a standalone HTML5 page.
pub(crate) fn write_html(doc: &TextDocument, title: &str) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    html.push_str("</head>\n<body>\n");
    for paragraph in doc.paragraphs() {
        let lines: Vec<_> = paragraph.split('\n').map(|line| escape(line)).collect();
        html.push_str(&format!("<p>{}</p>\n", lines.join("<br>")));
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Writes paragraphs as a minimal DOCX package.
pub(crate) fn write_docx<W: Write + Seek>(
    doc: &TextDocument,
    writer: W,
) -> Result<(), EngineError> {
    let zip_err = |e: zip::result::ZipError| EngineError::parse("DOCX package", e);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(writer);
    zip.start_file("[Content_Types].xml", options).map_err(zip_err)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
    zip.start_file("_rels/.rels", options).map_err(zip_err)?;
    zip.write_all(PACKAGE_RELS_XML.as_bytes())?;
    zip.start_file("word/document.xml", options).map_err(zip_err)?;
    zip.write_all(&document_xml(doc)?)?;
    zip.finish().map_err(zip_err)?;
    Ok(())
}

/// Builds `word/document.xml`.
fn document_xml(doc: &TextDocument) -> Result<Vec<u8>, EngineError> {
    let xml_err = |e| EngineError::parse("DOCX body", e);
    let mut buffer = Vec::new();
    let mut writer = Writer::new(Cursor::new(&mut buffer));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("w:document");
    root.push_attribute(("xmlns:w", WORDML_NAMESPACE));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:body")))
        .map_err(xml_err)?;

    for paragraph in doc.paragraphs() {
        writer
            .write_event(Event::Start(BytesStart::new("w:p")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("w:r")))
            .map_err(xml_err)?;

        for (i, line) in paragraph.split('\n').enumerate() {
            if i > 0 {
                writer
                    .write_event(Event::Empty(BytesStart::new("w:br")))
                    .map_err(xml_err)?;
            }
            for (j, segment) in line.split('\t').enumerate() {
                if j > 0 {
                    writer
                        .write_event(Event::Empty(BytesStart::new("w:tab")))
                        .map_err(xml_err)?;
                }
                if segment.is_empty() {
                    continue;
                }
                let mut text = BytesStart::new("w:t");
                text.push_attribute(("xml:space", "preserve"));
                writer.write_event(Event::Start(text)).map_err(xml_err)?;
                writer
                    .write_event(Event::Text(BytesText::new(segment)))
                    .map_err(xml_err)?;
                writer
                    .write_event(Event::End(BytesEnd::new("w:t")))
                    .map_err(xml_err)?;
            }
        }

        writer
            .write_event(Event::End(BytesEnd::new("w:r")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("w:p")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::Empty(BytesStart::new("w:sectPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:body")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:document")))
        .map_err(xml_err)?;

    Ok(buffer)
}

/// A4 portrait, in points.
const PAGE_SIZE: (i64, i64) = (595, 842);
const PAGE_MARGIN: i64 = 72;
const FONT_SIZE: i64 = 11;
const LINE_HEIGHT: i64 = 14;
/// Columns of 11pt Helvetica that fit between the margins.
const WRAP_COLUMNS: usize = 80;

/// Lays paragraphs out as wrapped Helvetica lines on A4 pages.
pub(crate) fn write_pdf<W: Write>(
    doc: &TextDocument,
    title: &str,
    writer: &mut W,
) -> Result<(), EngineError> {
    let lines: Vec<String> = doc
        .paragraphs()
        .iter()
        .flat_map(|p| p.split('\n'))
        .flat_map(|line| wrap_line(&line.replace('\t', "    "), WRAP_COLUMNS))
        .collect();
    let lines_per_page = ((PAGE_SIZE.1 - 2 * PAGE_MARGIN) / LINE_HEIGHT) as usize;

    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let font_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    let mut chunks: Vec<&[String]> = lines.chunks(lines_per_page).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    for page_lines in chunks {
        let mut operations = Vec::new();
        let mut y = PAGE_SIZE.1 - PAGE_MARGIN;
        for line in page_lines {
            if !line.trim().is_empty() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
                operations.push(Operation::new("Td", vec![PAGE_MARGIN.into(), y.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(win_ansi(line))],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            y -= LINE_HEIGHT;
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| EngineError::parse("PDF content", e))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_SIZE.0.into(), PAGE_SIZE.1.into()],
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(title)),
        "Producer" => Object::string_literal("multiconvert"),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();
    pdf.save_to(writer).map_err(|e| EngineError::parse("PDF output", e))?;
    Ok(())
}

/// Greedy word wrap by character count. Overlong words are split.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            wrapped.push(word.into_iter().collect());
            word = rest;
        }
        let needed = match current.chars().count() {
            0 => word.len(),
            used => used + 1 + word.len(),
        };
        if needed > width {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() || wrapped.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

/// Encodes text for the standard fonts. Characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::library::read::{read_docx, read_pdf};
    use crate::engine::progress::ProgressReporter;

    fn sample() -> TextDocument {
        TextDocument::new(vec![
            "Title & <intro>".to_string(),
            String::new(),
            "col1\tcol2\nsecond line".to_string(),
        ])
    }

    #[test]
    fn test_write_txt() {
        assert_eq!(
            write_txt(&sample()),
            "Title & <intro>\n\ncol1\tcol2\nsecond line\n"
        );
    }

    #[test]
    fn test_write_html_escapes() {
        let html = write_html(&sample(), "a < b");
        assert!(html.contains("<title>a &lt; b</title>"));
        assert!(html.contains("<p>Title &amp; &lt;intro&gt;</p>"));
        assert!(html.contains("<p>col1\tcol2<br>second line</p>"));
    }

    #[test]
    fn test_docx_is_readable_back() {
        let mut buffer = Cursor::new(Vec::new());
        write_docx(&sample(), &mut buffer).unwrap();

        buffer.set_position(0);
        let doc = read_docx(buffer).unwrap();
        assert_eq!(doc.paragraphs(), sample().paragraphs());
    }

    #[test]
    fn test_docx_package_parts() {
        let mut buffer = Cursor::new(Vec::new());
        write_docx(&sample(), &mut buffer).unwrap();

        buffer.set_position(0);
        let mut archive = zip::ZipArchive::new(buffer).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());
        assert!(archive.by_name("word/document.xml").is_ok());
    }

    #[test]
    fn test_pdf_text_is_readable_back() {
        let mut buffer = Vec::new();
        write_pdf(&sample(), "notes", &mut buffer).unwrap();
        assert!(buffer.starts_with(b"%PDF-1.5"));

        let doc = read_pdf(&buffer, &ProgressReporter::disabled()).unwrap();
        let text = doc.paragraphs().join("\n");
        assert!(text.contains("Title & <intro>"));
        assert!(text.contains("col1 col2"));
        assert!(text.contains("second line"));
    }

    #[test]
    fn test_pdf_paginates_long_documents() {
        let doc = TextDocument::new((1..=120).map(|i| format!("Line {}", i)).collect());
        let mut buffer = Vec::new();
        write_pdf(&doc, "long", &mut buffer).unwrap();

        let pdf = lopdf::Document::load_mem(&buffer).unwrap();
        assert_eq!(pdf.get_pages().len(), 3);
    }

    #[test]
    fn test_wrap_line() {
        assert_eq!(wrap_line("", 10), [""]);
        assert_eq!(wrap_line("one two three four", 9), ["one two", "three", "four"]);
        assert_eq!(wrap_line("abcdefghijkl xy", 5), ["abcde", "fghij", "kl xy"]);
    }

    #[test]
    fn test_win_ansi_replaces_unmappable() {
        assert_eq!(win_ansi("caf\u{e9} \u{20ac}1"), b"caf\xe9 ?1");
    }
}
