//! DOCX body extraction: paragraphs plus tables.
//!
//! A .docx file is a zip archive; the body lives in `word/document.xml`.
//! Paragraph runs are concatenated per paragraph. Each table is emitted
//! under a `## Table N` heading with one pipe-joined line per row, in row
//! order; empty cells are omitted rather than padded.

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

pub(super) fn extract(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid zip archive")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("missing word/document.xml")?
        .read_to_string(&mut xml)
        .context("document.xml is not valid UTF-8")?;
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);

    let mut parts: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut table_rows: Vec<String> = Vec::new();
    let mut table_depth = 0usize;
    let mut table_count = 0usize;
    // Only text inside <w:p> is document content; whitespace between
    // structural elements must not leak into the output.
    let mut in_paragraph = false;

    loop {
        match reader.read_event().context("malformed document.xml")? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table_count += 1;
                        table_rows.clear();
                    }
                }
                b"w:tr" if table_depth == 1 => row.clear(),
                b"w:tc" if table_depth == 1 => cell.clear(),
                b"w:p" => in_paragraph = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !table_rows.is_empty() {
                        parts.push(format!("## Table {table_count}\n{}", table_rows.join("\n")));
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if !row.is_empty() {
                        table_rows.push(row.join(" | "));
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    let text = cell.trim().to_string();
                    if !text.is_empty() {
                        row.push(text);
                    }
                }
                b"w:p" => {
                    in_paragraph = false;
                    if table_depth == 0 {
                        let text = paragraph.trim().to_string();
                        if !text.is_empty() {
                            parts.push(text);
                        }
                        paragraph.clear();
                    } else if !cell.is_empty() && !cell.ends_with(' ') {
                        // Paragraph break inside a cell becomes a space.
                        cell.push(' ');
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_paragraph => {
                let text = t.unescape().context("bad entity in document.xml")?;
                if table_depth > 0 {
                    cell.push_str(&text);
                } else {
                    paragraph.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(parts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn docx_with_body(body_xml: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body_xml}</w:body>
</w:document>"#
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", FileOptions::default())
            .unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    fn table_cell(text: &str) -> String {
        format!("<w:tc>{}</w:tc>", paragraph(text))
    }

    #[test]
    fn paragraphs_are_concatenated_in_order() {
        let bytes = docx_with_body(&format!(
            "{}{}{}",
            paragraph("Jane Doe"),
            paragraph("Software Engineer"),
            paragraph("Shanghai")
        ));
        let text = extract(&bytes).unwrap();
        assert_eq!(text, "Jane Doe\n\nSoftware Engineer\n\nShanghai");
    }

    #[test]
    fn runs_within_a_paragraph_are_joined() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>",
        );
        let text = extract(&bytes).unwrap();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn table_rows_are_pipe_joined_in_row_order() {
        let bytes = docx_with_body(&format!(
            "{}<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            paragraph("Courses"),
            table_cell("Course"),
            table_cell("Grade"),
            table_cell("Algorithms"),
            table_cell("A")
        ));
        let text = extract(&bytes).unwrap();
        assert_eq!(
            text,
            "Courses\n\n## Table 1\nCourse | Grade\nAlgorithms | A"
        );
    }

    #[test]
    fn empty_cells_are_omitted_not_padded() {
        let bytes = docx_with_body(&format!(
            "<w:tbl><w:tr>{}<w:tc><w:p/></w:tc>{}</w:tr></w:tbl>",
            table_cell("GPA"),
            table_cell("3.9")
        ));
        let text = extract(&bytes).unwrap();
        assert_eq!(text, "## Table 1\nGPA | 3.9");
    }

    #[test]
    fn cell_text_is_not_duplicated_as_body_paragraphs() {
        let bytes = docx_with_body(&format!(
            "<w:tbl><w:tr>{}</w:tr></w:tbl>",
            table_cell("only-in-table")
        ));
        let text = extract(&bytes).unwrap();
        assert_eq!(text.matches("only-in-table").count(), 1);
    }

    #[test]
    fn two_tables_get_distinct_headings() {
        let table = format!("<w:tbl><w:tr>{}</w:tr></w:tbl>", table_cell("x"));
        let bytes = docx_with_body(&format!("{table}{table}"));
        let text = extract(&bytes).unwrap();
        assert!(text.contains("## Table 1"));
        assert!(text.contains("## Table 2"));
    }

    #[test]
    fn not_a_zip_is_an_error() {
        assert!(extract(b"plain bytes").is_err());
    }
}
